//! Logging setup for the daemon.
//!
//! Call [`init_journald_or_stdout`] once at startup. Everything else uses
//! `use crate::tracing::prelude::*` for the `trace!()` .. `error!()` macros.

use std::fmt;

use time::OffsetDateTime;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{
        format::{DefaultFields, Writer},
        time::FormatTime,
        FmtContext, FormatEvent, FormatFields,
    },
    prelude::*,
    registry::LookupSpan,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Target prefix of this crate, left out of stdout lines.
const CRATE_PREFIX: &str = "sensorbridge::";

/// Initialize logging.
///
/// Under systemd (`JOURNAL_STREAM` set) events go to journald, otherwise to
/// stdout filtered by `RUST_LOG` with INFO as the default level.
pub fn init_journald_or_stdout() {
    if std::env::var_os("JOURNAL_STREAM").is_none() {
        use_stdout();
        return;
    }
    match tracing_journald::layer() {
        Ok(layer) => tracing_subscriber::registry().with(layer).init(),
        Err(e) => {
            use_stdout();
            error!(error = %e, "Failed to initialize journald logging, using stdout");
        }
    }
}

fn use_stdout() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(LocalTimer)
                .fmt_fields(DefaultFields::new())
                .event_format(CompactFormatter),
        )
        .init();
}

/// Collects the message and structured fields of one event.
#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields.push((field.name(), format!("{value:?}")));
        }
    }
}

/// One line per event: time, level, short target, message, then the
/// structured fields as `key=value` pairs.
struct CompactFormatter;

impl<S, N> FormatEvent<S, N> for CompactFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        LocalTimer.format_time(&mut writer)?;

        let level = match *event.metadata().level() {
            Level::ERROR => "\x1b[31mERROR",
            Level::WARN => "\x1b[33mWARN ",
            Level::INFO => "\x1b[32mINFO ",
            Level::DEBUG => "\x1b[34mDEBUG",
            Level::TRACE => "\x1b[35mTRACE",
        };
        let target = event.metadata().target();
        let target = target.strip_prefix(CRATE_PREFIX).unwrap_or(target);
        write!(writer, " {level}\x1b[0m {target}: ")?;

        if let Some(message) = &collector.message {
            write!(writer, "{message}")?;
        }

        let mut fields = collector
            .fields
            .iter()
            .filter(|(name, _)| !name.starts_with("log."))
            .peekable();
        if fields.peek().is_some() {
            write!(writer, "\x1b[90m")?;
            for (name, value) in fields {
                write!(writer, " {name}={value}")?;
            }
            write!(writer, "\x1b[0m")?;
        }

        writeln!(writer)
    }
}

/// Local wall-clock time to the second.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let formatted = now
            .format(time::macros::format_description!(
                "[hour]:[minute]:[second]"
            ))
            .map_err(|_| fmt::Error)?;
        write!(w, "{formatted}")
    }
}

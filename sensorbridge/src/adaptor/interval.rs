//! Arbitration between client interval requests.

use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier of one client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub i32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interval chosen from the outstanding requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalDecision {
    /// Interval to apply, in milliseconds.
    pub interval: u32,
    /// Session whose request won, `None` when the default was used.
    pub session: Option<SessionId>,
}

/// Pick the interval to apply.
///
/// The smallest positive request wins. A request of 0 expresses no
/// preference and never wins over a positive one; when no positive request
/// exists the default is used. Equal requests resolve to the lowest
/// session id.
pub fn evaluate_interval_requests(
    requests: &BTreeMap<SessionId, u32>,
    default_interval: u32,
) -> IntervalDecision {
    let winner = requests
        .iter()
        .filter(|(_, &interval)| interval > 0)
        .fold(None::<(SessionId, u32)>, |best, (&session, &interval)| match best {
            Some((_, shortest)) if shortest <= interval => best,
            _ => Some((session, interval)),
        });

    match winner {
        Some((session, interval)) => IntervalDecision {
            interval,
            session: Some(session),
        },
        None => IntervalDecision {
            interval: default_interval,
            session: None,
        },
    }
}

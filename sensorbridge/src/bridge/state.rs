//! Per physical sensor runtime state and delay normalization.

use crate::hal::{SensorDescriptor, SensorEvent};
use crate::sensor_type::SensorType;
use crate::tracing::prelude::*;

/// Operating delay applied to every adjustable sensor at startup.
pub const DEFAULT_DELAY_MS: i32 = 200;

/// Smallest maximum delay synthesized for sensors that do not report one.
const SYNTHESIZED_MAX_DELAY_FLOOR_MS: i32 = 1000;

/// Minimum delays below this get the floor as synthesized maximum,
/// larger ones get twice the minimum.
const SYNTHESIZED_MAX_DELAY_THRESHOLD_MS: i32 = 500;

/// Fallback illuminance, roughly indoor lighting.
const FALLBACK_LIGHT_LUX: f32 = 400.0;

/// Normalized delay bounds of one sensor, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: i32,
    pub max: i32,
    /// Delay applied at startup. Zero when the delay is not adjustable.
    pub default: i32,
}

/// Microseconds to milliseconds, rounding up.
pub fn us_to_ms(us: i32) -> i32 {
    (us + 999) / 1000
}

/// Normalize vendor delay bounds.
///
/// `max_delay_us` is `None` when the device does not report maximum delays.
/// Returns `None` for sensors with a negative minimum delay, which are left
/// unconfigured.
pub fn normalize_delays(min_delay_us: i32, max_delay_us: Option<i32>) -> Option<DelayRange> {
    let min = us_to_ms(min_delay_us);
    let mut max = max_delay_us.map(us_to_ms).unwrap_or(-1);

    // Without a reported maximum, invent one so that callers see a range
    // instead of a single point.
    if max < 0 && min > 0 {
        max = if min < SYNTHESIZED_MAX_DELAY_THRESHOLD_MS {
            SYNTHESIZED_MAX_DELAY_FLOOR_MS
        } else {
            min * 2
        };
        debug!(max_delay_ms = max, "Max delay not reported, using fallback");
    }

    if min < 0 {
        return None;
    }
    max = max.max(min);

    let default = if min == 0 {
        0
    } else {
        DEFAULT_DELAY_MS.clamp(min, max)
    };

    Some(DelayRange { min, max, default })
}

/// Synthetic first sample for sensor types whose consumers expect a reading
/// right away.
pub fn fallback_event(sensor: &SensorDescriptor) -> Option<SensorEvent> {
    let value = match sensor.sensor_type {
        SensorType::LIGHT => FALLBACK_LIGHT_LUX,
        // Not covered
        SensorType::PROXIMITY => sensor.max_range,
        _ => return None,
    };
    Some(SensorEvent::new(sensor.handle, sensor.sensor_type, 0).with_value(value))
}

/// Mutable state of one physical sensor, owned by the bridge.
#[derive(Debug, Clone, Default)]
pub struct PhysicalSensorState {
    pub min_delay: i32,
    pub max_delay: i32,
    /// Delay last applied to the hardware, `None` until one is applied.
    pub delay: Option<i32>,
    /// Activation last applied to the hardware, `None` until known.
    pub active: Option<bool>,
    /// Armed fallback sample, cleared on first real or fallback delivery.
    pub fallback: Option<SensorEvent>,
}

impl PhysicalSensorState {
    /// Take the armed fallback if it belongs to the given sensor.
    pub fn take_fallback(&mut self, event_of: &SensorEvent) -> Option<SensorEvent> {
        match self.fallback {
            Some(fallback)
                if fallback.sensor == event_of.sensor
                    && fallback.sensor_type == event_of.sensor_type =>
            {
                self.fallback.take()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{sim, SensorHandle};

    #[test]
    fn test_synthesized_max_uses_floor_for_short_min_delay() {
        let range = normalize_delays(100_000, None).unwrap();
        assert_eq!(
            range,
            DelayRange {
                min: 100,
                max: 1000,
                default: 200
            }
        );
    }

    #[test]
    fn test_synthesized_max_doubles_long_min_delay() {
        let range = normalize_delays(600_000, None).unwrap();
        assert_eq!(
            range,
            DelayRange {
                min: 600,
                max: 1200,
                default: 600
            }
        );
    }

    #[test]
    fn test_min_delay_rounds_up() {
        let range = normalize_delays(1, None).unwrap();
        assert_eq!(range.min, 1);
        assert_eq!(range.max, 1000);
        assert_eq!(range.default, 200);
    }

    #[test]
    fn test_on_change_sensor_is_not_adjustable() {
        let range = normalize_delays(0, None).unwrap();
        assert_eq!(
            range,
            DelayRange {
                min: 0,
                max: 0,
                default: 0
            }
        );
    }

    #[test]
    fn test_reported_max_delay_is_used() {
        let range = normalize_delays(10_000, Some(50_000)).unwrap();
        assert_eq!(range.min, 10);
        assert_eq!(range.max, 50);
        assert_eq!(range.default, 50);
    }

    #[test]
    fn test_reported_max_below_min_is_raised() {
        let range = normalize_delays(300_000, Some(100_000)).unwrap();
        assert_eq!(range.max, 300);
        assert_eq!(range.default, 300);
    }

    #[test]
    fn test_negative_min_delay_is_left_unconfigured() {
        assert_eq!(normalize_delays(-5_000, None), None);
    }

    #[test]
    fn test_default_always_within_range() {
        for min_us in [1, 999, 1_000, 150_000, 499_000, 500_000, 2_000_000] {
            for max_us in [None, Some(0), Some(40_000), Some(5_000_000)] {
                let range = normalize_delays(min_us, max_us).unwrap();
                assert!(range.max >= range.min, "{min_us} {max_us:?}");
                assert!(
                    (range.min..=range.max).contains(&range.default),
                    "{min_us} {max_us:?}"
                );
            }
        }
    }

    #[test]
    fn test_fallback_values() {
        let light = fallback_event(&sim::descriptor(1, SensorType::LIGHT)).unwrap();
        assert_eq!(light.light(), 400.0);
        assert_eq!(light.sensor, SensorHandle(1));

        let proximity = sim::descriptor(2, SensorType::PROXIMITY);
        let event = fallback_event(&proximity).unwrap();
        assert_eq!(event.distance(), proximity.max_range);

        assert!(fallback_event(&sim::descriptor(3, SensorType::ACCELEROMETER)).is_none());
    }

    #[test]
    fn test_take_fallback_requires_matching_sensor() {
        let descriptor = sim::descriptor(4, SensorType::LIGHT);
        let mut state = PhysicalSensorState {
            fallback: fallback_event(&descriptor),
            ..Default::default()
        };

        let other = SensorEvent::new(SensorHandle(4), SensorType::PROXIMITY, 0);
        assert!(state.take_fallback(&other).is_none());

        let real = SensorEvent::new(SensorHandle(4), SensorType::LIGHT, 0);
        assert!(state.take_fallback(&real).is_some());
        assert!(state.take_fallback(&real).is_none());
    }
}

use std::time::Duration;

use tracing::warn;

use crate::ByteSize;

/// A value that can be read from an environment variable string, falling back to a default.
///
/// Implemented for the value types used in configuration groups.  A malformed value is never an
/// error: it is logged and the default is used instead.
pub trait ParsableConfigValue: Sized {
    fn parse_user_value(value: &str) -> Option<Self>;

    fn parse(variable_name: &str, value: Option<String>, default: Self) -> Self {
        match value {
            None => default,
            Some(v) => match Self::parse_user_value(v.trim()) {
                Some(parsed) => parsed,
                None => {
                    warn!("Configuration value {v:?} for {variable_name} could not be parsed; using default.");
                    default
                },
            },
        }
    }
}

macro_rules! impl_parsable_from_str {
    ($($t:ty),*) => {
        $(
            impl ParsableConfigValue for $t {
                fn parse_user_value(value: &str) -> Option<Self> {
                    value.parse::<$t>().ok()
                }
            }
        )*
    };
}

impl_parsable_from_str!(usize, u64, u32, i64, f64);

impl ParsableConfigValue for bool {
    fn parse_user_value(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "on" => Some(true),
            "0" | "false" | "no" | "n" | "off" => Some(false),
            _ => None,
        }
    }
}

impl ParsableConfigValue for String {
    fn parse_user_value(value: &str) -> Option<Self> {
        Some(value.to_owned())
    }
}

impl ParsableConfigValue for ByteSize {
    fn parse_user_value(value: &str) -> Option<Self> {
        value.parse().ok()
    }
}

/// Durations accept a bare number of milliseconds or a number with one of the suffixes
/// `ms`, `s`, `m` or `h`.
impl ParsableConfigValue for Duration {
    fn parse_user_value(value: &str) -> Option<Self> {
        let split = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
        let (num, unit) = value.split_at(split);
        let n: u64 = num.parse().ok()?;

        match unit.trim() {
            "" | "ms" => Some(Duration::from_millis(n)),
            "s" => Some(Duration::from_secs(n)),
            "m" => Some(Duration::from_secs(n.checked_mul(60)?)),
            "h" => Some(Duration::from_secs(n.checked_mul(3600)?)),
            _ => None,
        }
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const KB: u64 = 1000;
const KIB: u64 = 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ByteSizeParseError {
    #[error("empty byte size string")]
    Empty,

    #[error("invalid number in byte size '{0}'")]
    InvalidNumber(String),

    #[error("unknown byte size unit '{0}'")]
    UnknownUnit(String),

    #[error("byte size '{0}' overflows u64")]
    Overflow(String),
}

/// A number of bytes, parsable from human-friendly strings such as `2mib`, `256mb` or `4096`.
///
/// Decimal units (`kb`, `mb`, `gb`, `tb`) are powers of 1000, binary units (`kib`, `mib`, `gib`,
/// `tib`) are powers of 1024.  Unit names are case-insensitive and may be separated from the number
/// by whitespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ByteSize(u64);

impl ByteSize {
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn kib(n: u64) -> Self {
        Self(n * KIB)
    }

    pub const fn mib(n: u64) -> Self {
        Self(n * KIB * KIB)
    }

    pub const fn gib(n: u64) -> Self {
        Self(n * KIB * KIB * KIB)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The size as a `usize`, saturating on 32-bit targets.
    pub fn as_usize(&self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl From<ByteSize> for u64 {
    fn from(value: ByteSize) -> Self {
        value.0
    }
}

impl FromStr for ByteSize {
    type Err = ByteSizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ByteSizeParseError::Empty);
        }

        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (num, unit) = s.split_at(split);

        let num: u64 = num.parse().map_err(|_| ByteSizeParseError::InvalidNumber(s.to_owned()))?;

        let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kb" => KB,
            "m" | "mb" => KB.pow(2),
            "g" | "gb" => KB.pow(3),
            "t" | "tb" => KB.pow(4),
            "ki" | "kib" => KIB,
            "mi" | "mib" => KIB.pow(2),
            "gi" | "gib" => KIB.pow(3),
            "ti" | "tib" => KIB.pow(4),
            other => return Err(ByteSizeParseError::UnknownUnit(other.to_owned())),
        };

        num.checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| ByteSizeParseError::Overflow(s.to_owned()))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = [(KIB.pow(4), "tib"), (KIB.pow(3), "gib"), (KIB.pow(2), "mib"), (KIB, "kib")];
        for (size, unit) in units {
            if self.0 >= size && self.0 % size == 0 {
                return write!(f, "{}{unit}", self.0 / size);
            }
        }
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!("4096".parse::<ByteSize>().unwrap(), ByteSize::new(4096));
        assert_eq!("2mib".parse::<ByteSize>().unwrap(), ByteSize::mib(2));
        assert_eq!("2 MiB".parse::<ByteSize>().unwrap(), ByteSize::mib(2));
        assert_eq!("256mb".parse::<ByteSize>().unwrap(), ByteSize::new(256_000_000));
        assert_eq!("1gib".parse::<ByteSize>().unwrap(), ByteSize::gib(1));
        assert_eq!("3k".parse::<ByteSize>().unwrap(), ByteSize::new(3000));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<ByteSize>(), Err(ByteSizeParseError::Empty));
        assert!(matches!("mib".parse::<ByteSize>(), Err(ByteSizeParseError::InvalidNumber(_))));
        assert!(matches!("12 parsecs".parse::<ByteSize>(), Err(ByteSizeParseError::UnknownUnit(_))));
        assert!(matches!("99999999999tib".parse::<ByteSize>(), Err(ByteSizeParseError::Overflow(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(ByteSize::mib(2).to_string(), "2mib");
        assert_eq!(ByteSize::kib(3).to_string(), "3kib");
        assert_eq!(ByteSize::new(1000).to_string(), "1000");
        assert_eq!(ByteSize::new(0).to_string(), "0");
    }

    #[test]
    fn test_serde_is_transparent() {
        let s = serde_json::to_string(&ByteSize::kib(1)).unwrap();
        assert_eq!(s, "1024");
        let back: ByteSize = serde_json::from_str(&s).unwrap();
        assert_eq!(back, ByteSize::kib(1));
    }
}

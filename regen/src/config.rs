//! Compilation flags and configuration validation.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A flag letter that does not name any compilation flag
    UnknownFlag(char),
    /// Invalid number of shrink iterations (must be > 0)
    InvalidShrinkIterations(usize),
    /// Invalid timeout (must be > 0)
    InvalidTimeout,
    /// Invalid thread count (must be > 0)
    InvalidThreads(usize),
    /// Invalid batch size (must be > 0)
    InvalidBatchSize(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownFlag(letter) => {
                write!(f, "Unknown flag letter: '{}' (expected one of idmsuxl)", letter)
            }
            ConfigError::InvalidShrinkIterations(n) => {
                write!(f, "Invalid shrink iterations count: {} (must be > 0)", n)
            }
            ConfigError::InvalidTimeout => {
                write!(f, "Invalid timeout (must be > 0)")
            }
            ConfigError::InvalidThreads(n) => {
                write!(f, "Invalid thread count: {} (must be > 0)", n)
            }
            ConfigError::InvalidBatchSize(n) => {
                write!(f, "Invalid batch size: {} (must be > 0)", n)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Pattern compilation flags
///
/// The bit values mirror the flag constants of `java.util.regex.Pattern`, so
/// a numeric flag word taken from that dialect can be passed to
/// [`Flags::from_bits_truncate`] unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// Only `\n` is a line terminator for `.`, `^` and `$`
    pub const UNIX_LINES: Flags = Flags(0x01);
    /// Case-insensitive matching
    pub const CASE_INSENSITIVE: Flags = Flags(0x02);
    /// Whitespace and `#` comments in the pattern are ignored
    pub const COMMENTS: Flags = Flags(0x04);
    /// `^` and `$` match at line boundaries
    pub const MULTILINE: Flags = Flags(0x08);
    /// The whole pattern is literal text
    pub const LITERAL: Flags = Flags(0x10);
    /// `.` also matches line terminators
    pub const DOTALL: Flags = Flags(0x20);
    /// Case folding follows Unicode rather than ASCII only
    pub const UNICODE_CASE: Flags = Flags(0x40);

    const ALL: u32 = 0x7f;

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Build a flag set from raw bits, dropping unknown ones
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Flags(bits & Self::ALL)
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn with(self, other: Flags) -> Self {
        Flags(self.0 | other.0)
    }

    #[must_use]
    pub const fn without(self, other: Flags) -> Self {
        Flags(self.0 & !other.0)
    }

    /// The flag an inline modifier letter (`(?i)`, `(?x-s)` ...) stands for
    pub fn for_inline_letter(letter: char) -> Option<Flags> {
        match letter {
            'i' => Some(Self::CASE_INSENSITIVE),
            'd' => Some(Self::UNIX_LINES),
            'm' => Some(Self::MULTILINE),
            's' => Some(Self::DOTALL),
            'u' => Some(Self::UNICODE_CASE),
            'x' => Some(Self::COMMENTS),
            _ => None,
        }
    }

    /// Parse a string of flag letters such as `"is"`
    ///
    /// Accepts the inline modifier letters plus `l` for [`Flags::LITERAL`].
    pub fn from_letters(letters: &str) -> Result<Self, ConfigError> {
        letters.chars().try_fold(Flags::NONE, |flags, letter| {
            let flag = match letter {
                'l' => Some(Self::LITERAL),
                other => Self::for_inline_letter(other),
            };
            flag.map(|flag| flags.with(flag))
                .ok_or(ConfigError::UnknownFlag(letter))
        })
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        self.with(rhs)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        *self = self.with(rhs);
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const LETTERS: [(Flags, char); 7] = [
            (Flags::CASE_INSENSITIVE, 'i'),
            (Flags::UNIX_LINES, 'd'),
            (Flags::MULTILINE, 'm'),
            (Flags::DOTALL, 's'),
            (Flags::UNICODE_CASE, 'u'),
            (Flags::COMMENTS, 'x'),
            (Flags::LITERAL, 'l'),
        ];
        for (flag, letter) in LETTERS {
            if self.contains(flag) {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_algebra() {
        let flags = Flags::CASE_INSENSITIVE | Flags::DOTALL;
        assert!(flags.contains(Flags::CASE_INSENSITIVE));
        assert!(flags.contains(Flags::DOTALL));
        assert!(!flags.contains(Flags::COMMENTS));
        assert!(!flags.without(Flags::DOTALL).contains(Flags::DOTALL));
        assert!(Flags::NONE.is_empty());
        assert_eq!(Flags::default(), Flags::NONE);
    }

    #[test]
    fn test_from_letters() {
        let flags = Flags::from_letters("isx").unwrap();
        assert_eq!(
            flags,
            Flags::CASE_INSENSITIVE | Flags::DOTALL | Flags::COMMENTS
        );
        assert_eq!(Flags::from_letters("").unwrap(), Flags::NONE);
        assert_eq!(Flags::from_letters("l").unwrap(), Flags::LITERAL);
        assert_eq!(
            Flags::from_letters("iq"),
            Err(ConfigError::UnknownFlag('q'))
        );
    }

    #[test]
    fn test_bits_round_trip() {
        let flags = Flags::from_bits_truncate(0x02 | 0x20 | 0x1000);
        assert_eq!(flags, Flags::CASE_INSENSITIVE | Flags::DOTALL);
        assert_eq!(flags.bits(), 0x22);
    }

    #[test]
    fn test_flags_display() {
        let flags = Flags::MULTILINE | Flags::CASE_INSENSITIVE;
        assert_eq!(flags.to_string(), "im");
        assert_eq!(Flags::NONE.to_string(), "");
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::InvalidThreads(0).to_string(),
            "Invalid thread count: 0 (must be > 0)"
        );
        assert_eq!(
            ConfigError::UnknownFlag('z').to_string(),
            "Unknown flag letter: 'z' (expected one of idmsuxl)"
        );
    }
}

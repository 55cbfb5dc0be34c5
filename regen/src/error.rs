//! Error types for pattern compilation and string generation.

use std::fmt;

use crate::ast::GroupId;

/// Error raised while compiling pattern text into a [`Node`](crate::ast::Node) tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The pattern is malformed
    Syntax {
        message: String,
        pattern: String,
        position: usize,
    },

    /// The pattern is well-formed but uses a construct that cannot be generated
    Unsupported {
        construct: String,
        pattern: String,
        position: usize,
    },
}

impl CompileError {
    /// Create a syntax error at the given character position
    pub fn syntax(message: impl Into<String>, pattern: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            pattern: pattern.into(),
            position,
        }
    }

    /// Create an unsupported-construct error at the given character position
    pub fn unsupported(
        construct: impl Into<String>,
        pattern: impl Into<String>,
        position: usize,
    ) -> Self {
        Self::Unsupported {
            construct: construct.into(),
            pattern: pattern.into(),
            position,
        }
    }

    /// Character offset of the offending token
    pub fn position(&self) -> usize {
        match self {
            Self::Syntax { position, .. } | Self::Unsupported { position, .. } => *position,
        }
    }

    /// The pattern text that failed to compile
    pub fn pattern(&self) -> &str {
        match self {
            Self::Syntax { pattern, .. } | Self::Unsupported { pattern, .. } => pattern,
        }
    }

    /// Human readable description without the position rendering
    pub fn description(&self) -> &str {
        match self {
            Self::Syntax { message, .. } => message,
            Self::Unsupported { construct, .. } => construct,
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Render the pattern with a caret under the offending position
    ///
    /// ```text
    /// (ab
    ///    ^
    /// ```
    pub fn caret(&self) -> String {
        let pattern = self.pattern();
        let offset = self.position().min(pattern.chars().count());
        format!("{}\n{}^", pattern, " ".repeat(offset))
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Syntax {
                message, position, ..
            } => {
                write!(f, "Syntax error: {} near index {}", message, position)?;
            }
            CompileError::Unsupported {
                construct,
                position,
                ..
            } => {
                write!(
                    f,
                    "Unsupported construct: {} near index {}",
                    construct, position
                )?;
            }
        }
        write!(f, "\n{}", self.caret())
    }
}

impl std::error::Error for CompileError {}

/// Internal invariant violation detected while generating a string
///
/// Trees produced by the parser never trigger these; they indicate a
/// hand-built tree that breaks the invariants of [`Node`](crate::ast::Node).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// A character class with no members was asked for a character
    EmptyCharSet,

    /// A backreference was reached before its group produced any output
    UnresolvedBackReference { group: GroupId },
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::EmptyCharSet => {
                write!(f, "Generation failed: cannot sample an empty character set")
            }
            GenerationError::UnresolvedBackReference { group } => {
                write!(
                    f,
                    "Generation failed: backreference {} used before its group captured",
                    group
                )
            }
        }
    }
}

impl std::error::Error for GenerationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let error = CompileError::syntax("Unclosed group", "(ab", 3);
        assert_eq!(
            format!("{}", error),
            "Syntax error: Unclosed group near index 3\n(ab\n   ^"
        );
        assert!(error.is_syntax());
        assert!(!error.is_unsupported());
    }

    #[test]
    fn test_unsupported_error_display() {
        let error = CompileError::unsupported("\\G anchor", "a\\Gb", 1);
        assert_eq!(
            format!("{}", error),
            "Unsupported construct: \\G anchor near index 1\na\\Gb\n ^"
        );
        assert_eq!(error.position(), 1);
        assert_eq!(error.pattern(), "a\\Gb");
        assert_eq!(error.description(), "\\G anchor");
    }

    #[test]
    fn test_caret_is_clamped_to_pattern_end() {
        let error = CompileError::syntax("Unexpected end", "ab", 40);
        assert_eq!(error.caret(), "ab\n  ^");
    }

    #[test]
    fn test_generation_error_display() {
        let error = GenerationError::UnresolvedBackReference {
            group: GroupId::Index(2),
        };
        assert_eq!(
            format!("{}", error),
            "Generation failed: backreference \\2 used before its group captured"
        );
        assert_eq!(
            format!("{}", GenerationError::EmptyCharSet),
            "Generation failed: cannot sample an empty character set"
        );
    }
}

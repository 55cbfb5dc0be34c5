//! Bracketed character classes: `[a-z]`, `[^\d]`, `[a-z&&[^aeiou]]`.

use super::Parser;
use super::escape::Escape;
use crate::charset::{CharSet, CharSetBuilder};
use crate::error::CompileError;

const ILLEGAL_RANGE: &str = "Illegal character range";

impl Parser<'_> {
    /// Parse a class after its opening `[`
    ///
    /// `&&` splits the class into operands that are intersected left to
    /// right; operands with no members listed are skipped. A leading `^`
    /// negates the whole result.
    pub(super) fn parse_class(&mut self) -> Result<CharSet, CompileError> {
        let negated = self.raw_peek() == Some('^');
        if negated {
            self.pos += 1;
        }

        let mut operands: Vec<CharSet> = Vec::new();
        let mut current = CharSetBuilder::with_folding(self.folding());
        let mut listed = false;
        let mut first = true;

        loop {
            self.skip_ignored();
            let position = self.pos;
            let Some(c) = self.next() else {
                return Err(self.syntax("Unclosed character class", self.chars.len()));
            };
            match c {
                ']' if !first => break,
                '[' => {
                    let nested = self.parse_class()?;
                    current.union(&nested);
                }
                '&' if self.raw_peek() == Some('&') => {
                    self.pos += 1;
                    if listed {
                        operands.push(current.build());
                    }
                    current = CharSetBuilder::with_folding(self.folding());
                    listed = false;
                    first = false;
                    continue;
                }
                '\\' => match self.parse_escape(position, true)? {
                    Escape::Char(lo) => self.class_range(&mut current, lo, position)?,
                    Escape::Set(set) => {
                        current.union(&set);
                    }
                    Escape::Quoted(text) => {
                        let mut quoted = text.chars().peekable();
                        while let Some(c) = quoted.next() {
                            if quoted.peek().is_some() {
                                current.single(self.class_member(c, position)?);
                            } else {
                                self.class_range(&mut current, c, position)?;
                            }
                        }
                    }
                    Escape::Node(_) => {
                        return Err(self.syntax("Illegal/unsupported escape sequence", position));
                    }
                },
                lo => self.class_range(&mut current, lo, position)?,
            }
            listed = true;
            first = false;
        }

        if listed {
            operands.push(current.build());
        }
        let set = operands
            .into_iter()
            .reduce(|acc, operand| acc.intersect(&operand))
            .unwrap_or_else(CharSet::empty);
        Ok(if negated { set.negate() } else { set })
    }

    /// Add `lo` alone, or the range `lo-hi` when a `-` and an upper bound follow
    fn class_range(&mut self, builder: &mut CharSetBuilder, lo: char, position: usize) -> Result<(), CompileError> {
        let lo = self.class_member(lo, position)?;
        let resume = self.pos;
        if !self.eat('-') {
            builder.single(lo);
            return Ok(());
        }
        let hi_position = self.pos;
        let hi = match self.peek() {
            // a trailing '-' is literal
            None | Some(']') => {
                self.pos = resume;
                builder.single(lo);
                return Ok(());
            }
            Some('[') => return Err(self.syntax(ILLEGAL_RANGE, hi_position)),
            Some('\\') => {
                self.pos += 1;
                match self.parse_escape(hi_position, true)? {
                    Escape::Char(hi) => hi,
                    _ => return Err(self.syntax(ILLEGAL_RANGE, hi_position)),
                }
            }
            Some(hi) => {
                self.pos += 1;
                hi
            }
        };
        let hi = self.class_member(hi, hi_position)?;
        if hi < lo {
            return Err(self.syntax(ILLEGAL_RANGE, hi_position));
        }
        builder.range(lo, hi);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::NodeKind;
    use crate::charset::{CharSet, UNIVERSE_SIZE};
    use crate::config::Flags;
    use crate::error::CompileError;
    use crate::parser::parse;

    fn class(pattern: &str) -> CharSet {
        class_with(pattern, Flags::NONE)
    }

    fn class_with(pattern: &str, flags: Flags) -> CharSet {
        match parse(pattern, flags).unwrap().simplify().kind() {
            NodeKind::Class(set) => set.clone(),
            other => panic!("expected a class for {:?}, got {:?}", pattern, other),
        }
    }

    fn error(pattern: &str) -> CompileError {
        parse(pattern, Flags::NONE).unwrap_err()
    }

    #[test]
    fn test_members_and_ranges() {
        assert_eq!(class("[abc]"), CharSet::range('a', 'c'));
        assert_eq!(class("[a-cx-z]").weight(), 6);
        assert_eq!(class("[\\d_]").weight(), 11);
        assert_eq!(class("[\\x41-\\x43]"), CharSet::range('A', 'C'));
        assert_eq!(class("[\\Q-]\\E]"), CharSet::from_chars(['-', ']']));
    }

    #[test]
    fn test_quoted_section_starts_range() {
        let set = class("[\\Qab\\E-z]");
        assert_eq!(set, CharSet::range('a', 'z'));
        assert!(!set.contains('-'));
        assert_eq!(class("[\\Qxa\\E-c]"), CharSet::from_chars(['a', 'b', 'c', 'x']));
        assert_eq!(class("[\\Qa\\E-]"), CharSet::from_chars(['-', 'a']));
        assert_eq!(error("[\\Qbz\\E-a]").description(), "Illegal character range");
    }

    #[test]
    fn test_literal_brackets_and_dashes() {
        assert_eq!(class("[]a]"), CharSet::from_chars([']', 'a']));
        assert_eq!(class("[^]a]").weight(), UNIVERSE_SIZE - 2);
        assert_eq!(class("[-a]"), CharSet::from_chars(['-', 'a']));
        assert_eq!(class("[a-]"), CharSet::from_chars(['-', 'a']));
        assert_eq!(class("[a&b]"), CharSet::from_chars(['&', 'a', 'b']));
    }

    #[test]
    fn test_negation() {
        let set = class("[^a-z]");
        assert_eq!(set.weight(), UNIVERSE_SIZE - 26);
        assert!(!set.contains('q'));
        assert_eq!(class("[^\\D]"), class("\\d"));
    }

    #[test]
    fn test_nested_union_and_intersection() {
        assert_eq!(class("[a-c[x-z]]").weight(), 6);
        assert_eq!(class("[a-z&&[def]]"), CharSet::range('d', 'f'));
        assert_eq!(class("[a-z&&[^aeiou]]").weight(), 21);
        assert_eq!(class("[a-z&&d-f&&e]"), CharSet::single('e'));
        assert_eq!(class("[a-c&&]"), CharSet::range('a', 'c'));
    }

    #[test]
    fn test_case_insensitive_classes() {
        let set = class_with("[a-c]", Flags::CASE_INSENSITIVE);
        assert_eq!(set, CharSet::from_chars("abcABC".chars()));
        let set = class_with("[^a]", Flags::CASE_INSENSITIVE);
        assert!(!set.contains('A'));
        assert!(!set.contains('a'));
        let set = class("(?i)[\\p{Lower}]");
        assert_eq!(set.weight(), 26);
        let set = class_with("[\u{3B1}]", Flags::CASE_INSENSITIVE | Flags::UNICODE_CASE);
        assert!(set.contains('\u{391}'));
    }

    #[test]
    fn test_class_errors() {
        let unclosed = error("[abc");
        assert_eq!(unclosed.description(), "Unclosed character class");
        assert_eq!(unclosed.position(), 4);
        assert_eq!(error("[z-a]").description(), "Illegal character range");
        assert_eq!(error("[a-\\d]").description(), "Illegal character range");
        assert!(error("[\\b]").is_syntax());
        assert!(error("[\\1]").is_syntax());
        assert!(error("[\u{1F600}]").is_unsupported());
        assert!(error("[a-\\x{1F600}]").is_unsupported());
        assert!(error("[]").is_syntax());
    }
}

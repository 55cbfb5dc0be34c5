//! Backslash escapes, shared by the top level and character classes.

use super::Parser;
use crate::ast::{GroupId, Node};
use crate::charset::{
    CharSet, DIGIT, HORIZONTAL_SPACE, SPACE, VERTICAL_SPACE, WORD, in_universe,
};
use crate::error::CompileError;

/// What a backslash sequence stands for
pub(super) enum Escape {
    Char(char),
    Set(CharSet),
    /// Anchors, backreferences and `\R`; never produced inside a class
    Node(Node),
    /// The text of a `\Q...\E` section
    Quoted(String),
}

const ILLEGAL_ESCAPE: &str = "Illegal/unsupported escape sequence";

impl Parser<'_> {
    /// An escape used as a unit outside any character class
    pub(super) fn parse_escape_unit(&mut self, start: usize) -> Result<Node, CompileError> {
        Ok(match self.parse_escape(start, false)? {
            Escape::Char(c) => self.literal_char(c),
            Escape::Set(set) => Node::class(set),
            Escape::Node(node) => node,
            Escape::Quoted(text) => Node::literal(text, self.case_insensitive()),
        })
    }

    /// Parse the escape whose backslash sits at `start`
    pub(super) fn parse_escape(&mut self, start: usize, in_class: bool) -> Result<Escape, CompileError> {
        let Some(c) = self.raw_next() else {
            return Err(self.syntax("Trailing backslash", start));
        };
        let escape = match c {
            '0' => Escape::Char(self.parse_octal(start)?),
            '1'..='9' if !in_class => {
                let first = c as usize - '0' as usize;
                Escape::Node(self.parse_numbered_backref(first, start)?)
            }
            'a' => Escape::Char('\u{07}'),
            'e' => Escape::Char('\u{1B}'),
            'f' => Escape::Char('\u{0C}'),
            'n' => Escape::Char('\n'),
            'r' => Escape::Char('\r'),
            't' => Escape::Char('\t'),
            'c' => {
                let control = self
                    .raw_next()
                    .and_then(|c| char::from_u32(c as u32 ^ 64))
                    .ok_or_else(|| self.syntax("Illegal control escape sequence", start))?;
                Escape::Char(control)
            }
            'x' => Escape::Char(self.parse_hex_escape(start)?),
            'u' => Escape::Char(self.parse_unicode_escape(start)?),
            'N' => return Err(self.unsupported("named character escape \\N{...}", start)),
            'd' => Escape::Set(DIGIT.clone()),
            'D' => Escape::Set(DIGIT.negate()),
            'w' => Escape::Set(WORD.clone()),
            'W' => Escape::Set(WORD.negate()),
            's' => Escape::Set(SPACE.clone()),
            'S' => Escape::Set(SPACE.negate()),
            'h' => Escape::Set(HORIZONTAL_SPACE.clone()),
            'H' => Escape::Set(HORIZONTAL_SPACE.negate()),
            'v' => Escape::Set(VERTICAL_SPACE.clone()),
            'V' => Escape::Set(VERTICAL_SPACE.negate()),
            'p' | 'P' => Escape::Set(self.parse_property(c == 'P', start)?),
            'b' | 'B' | 'A' | 'Z' | 'z' if !in_class => Escape::Node(Node::empty()),
            'G' => return Err(self.unsupported("\\G anchor", start)),
            'X' => return Err(self.unsupported("\\X grapheme cluster", start)),
            // A lone '\r' is left out: `\R` is atomic, so "\r" followed by
            // "\n" only ever matches as one linebreak.
            'R' if !in_class => Escape::Node(Node::union(vec![
                Node::literal("\r\n", false),
                Node::class(VERTICAL_SPACE.intersect(&CharSet::single('\r').negate())),
            ])),
            'k' if !in_class => Escape::Node(self.parse_named_backref(start)?),
            'Q' => Escape::Quoted(self.parse_quoted()),
            c if c.is_ascii_alphanumeric() => return Err(self.syntax(ILLEGAL_ESCAPE, start)),
            c => Escape::Char(c),
        };
        Ok(escape)
    }

    /// `\0n`, `\0nn` or `\0mnn` with `m <= 3`
    fn parse_octal(&mut self, start: usize) -> Result<char, CompileError> {
        let octal = |c: Option<char>| c.and_then(|c| c.to_digit(8));
        let Some(first) = octal(self.raw_peek()) else {
            return Err(self.syntax("Illegal octal escape sequence", start));
        };
        self.pos += 1;
        let mut value = first;
        if let Some(second) = octal(self.raw_peek()) {
            self.pos += 1;
            value = value * 8 + second;
            if first <= 3 {
                if let Some(third) = octal(self.raw_peek()) {
                    self.pos += 1;
                    value = value * 8 + third;
                }
            }
        }
        char::from_u32(value).ok_or_else(|| self.syntax("Illegal octal escape sequence", start))
    }

    fn hex_digits(&mut self, count: usize, start: usize) -> Result<u32, CompileError> {
        let mut value = 0;
        for _ in 0..count {
            let digit = self
                .raw_next()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.syntax("Illegal hexadecimal escape sequence", start))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    /// `\xhh` or `\x{h...h}`
    fn parse_hex_escape(&mut self, start: usize) -> Result<char, CompileError> {
        if self.raw_peek() != Some('{') {
            let value = self.hex_digits(2, start)?;
            return self.code_point(value, start);
        }
        self.pos += 1;
        let mut value: u32 = 0;
        let mut digits = 0;
        while let Some(digit) = self.raw_peek().and_then(|c| c.to_digit(16)) {
            self.pos += 1;
            digits += 1;
            value = value.saturating_mul(16).saturating_add(digit);
            if value > 0x10FFFF {
                return Err(self.syntax("Hexadecimal codepoint is too big", start));
            }
        }
        if digits == 0 || self.raw_next() != Some('}') {
            return Err(self.syntax("Unclosed hexadecimal escape sequence", start));
        }
        self.code_point(value, start)
    }

    /// `\uhhhh`, joining an escaped surrogate pair into one character
    fn parse_unicode_escape(&mut self, start: usize) -> Result<char, CompileError> {
        let high = self.hex_digits(4, start)?;
        if (0xD800..0xDC00).contains(&high)
            && self.chars.get(self.pos) == Some(&'\\')
            && self.chars.get(self.pos + 1) == Some(&'u')
        {
            let resume = self.pos;
            self.pos += 2;
            let low = self.hex_digits(4, start)?;
            if (0xDC00..0xE000).contains(&low) {
                let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                return self.code_point(combined, start);
            }
            self.pos = resume;
        }
        self.code_point(high, start)
    }

    fn code_point(&self, value: u32, start: usize) -> Result<char, CompileError> {
        char::from_u32(value).ok_or_else(|| self.unsupported("unpaired surrogate code point", start))
    }

    /// `\p{Name}`, `\P{Name}` or the one-letter form `\pL`
    fn parse_property(&mut self, negated: bool, start: usize) -> Result<CharSet, CompileError> {
        let name = if self.raw_peek() == Some('{') {
            self.pos += 1;
            let mut name = String::new();
            loop {
                match self.raw_next() {
                    Some('}') => break name,
                    Some(c) => name.push(c),
                    None => return Err(self.syntax("Unclosed character family", start)),
                }
            }
        } else {
            match self.raw_next() {
                Some(c) => c.to_string(),
                None => return Err(self.syntax("Illegal character family", start)),
            }
        };
        let set = CharSet::named(&name)
            .ok_or_else(|| self.unsupported(format!("character property \\p{{{}}}", name), start))?;
        Ok(if negated { set.negate() } else { set })
    }

    /// Extend `\n` with further digits while the number names an existing group
    fn parse_numbered_backref(&mut self, first: usize, start: usize) -> Result<Node, CompileError> {
        let mut index = first;
        while let Some(digit) = self.raw_peek().and_then(|c| c.to_digit(10)) {
            let candidate = index * 10 + digit as usize;
            if candidate > self.group_count {
                break;
            }
            index = candidate;
            self.pos += 1;
        }
        self.backref(GroupId::Index(index), index, start)
    }

    /// `\k<name>`, positioned after the `k`
    fn parse_named_backref(&mut self, start: usize) -> Result<Node, CompileError> {
        if self.raw_next() != Some('<') {
            return Err(self.syntax(
                "\\k is not followed by '<' for named capturing group",
                start,
            ));
        }
        let name = self.parse_group_name()?;
        let Some(&index) = self.names.get(&name) else {
            return Err(self.syntax(
                format!("named capturing group <{}> does not exist", name),
                start,
            ));
        };
        self.backref(GroupId::Name(name), index, start)
    }

    /// Raw text up to `\E` or the end of the pattern
    fn parse_quoted(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.raw_next() {
            if c == '\\' && self.raw_peek() == Some('E') {
                self.pos += 1;
                break;
            }
            text.push(c);
        }
        text
    }

    /// Reject characters a class cannot hold
    pub(super) fn class_member(&self, c: char, position: usize) -> Result<char, CompileError> {
        if in_universe(c) {
            Ok(c)
        } else {
            Err(self.unsupported("supplementary code point in a character class", position))
        }
    }
}

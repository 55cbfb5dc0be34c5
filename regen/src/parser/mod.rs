//! Recursive-descent compiler from pattern text to [`Node`] trees.
//!
//! The grammar is the `java.util.regex` dialect:
//!
//! ```text
//! regex      := branch ('|' branch)*
//! branch     := (unit quantifier?)*
//! quantifier := ('*' | '+' | '?' | '{' int (',' int?)? '}') ('?' | '+')?
//! unit       := '.' | class | group | anchor | backref | escape | literal
//! ```
//!
//! Positions reported in errors count characters, not bytes.

mod class;
mod escape;

use std::collections::{HashMap, HashSet};

use crate::ast::{Bound, GroupId, GroupKind, Node, NodeKind, QuantifierKind};
use crate::charset::{
    ANY, ANY_EXCEPT_LINE_TERMINATORS, ANY_EXCEPT_NEWLINE, CaseFolding, CharSet,
};
use crate::config::Flags;
use crate::error::CompileError;

/// Parse `pattern` under `flags` into an unsimplified tree
pub fn parse(pattern: &str, flags: Flags) -> Result<Node, CompileError> {
    if flags.contains(Flags::LITERAL) {
        return Ok(Node::literal(
            pattern,
            flags.contains(Flags::CASE_INSENSITIVE),
        ));
    }

    let mut parser = Parser::new(pattern, flags);
    let root = parser.parse_alternation()?;
    if parser.peek().is_some() {
        return Err(parser.syntax("Unmatched closing ')'", parser.pos));
    }
    parser.validate_backrefs(&root)?;
    root.prune().ok_or_else(|| {
        let position = parser.empty_class.unwrap_or(0);
        parser.unsupported("character class that matches nothing", position)
    })
}

pub(crate) struct Parser<'a> {
    pattern: &'a str,
    chars: Vec<char>,
    pos: usize,
    flags: Flags,
    group_count: usize,
    names: HashMap<String, usize>,
    /// Length bounds of every group whose closing parenthesis has been read
    closed: HashMap<usize, (usize, Bound)>,
    /// Positions of backreferences in order of appearance
    backrefs: Vec<usize>,
    /// Position of the first class with no members
    empty_class: Option<usize>,
}

impl<'a> Parser<'a> {
    fn new(pattern: &'a str, flags: Flags) -> Self {
        Self {
            pattern,
            chars: pattern.chars().collect(),
            pos: 0,
            flags,
            group_count: 0,
            names: HashMap::new(),
            closed: HashMap::new(),
            backrefs: Vec::new(),
            empty_class: None,
        }
    }

    fn syntax(&self, message: impl Into<String>, position: usize) -> CompileError {
        CompileError::syntax(message, self.pattern, position)
    }

    fn unsupported(&self, construct: impl Into<String>, position: usize) -> CompileError {
        CompileError::unsupported(construct, self.pattern, position)
    }

    fn case_insensitive(&self) -> bool {
        self.flags.contains(Flags::CASE_INSENSITIVE)
    }

    fn folding(&self) -> CaseFolding {
        match (
            self.case_insensitive(),
            self.flags.contains(Flags::UNICODE_CASE),
        ) {
            (false, _) => CaseFolding::None,
            (true, false) => CaseFolding::Ascii,
            (true, true) => CaseFolding::Unicode,
        }
    }

    /// Skip empty `\Q\E` sections, plus whitespace and `#` comments when
    /// comments mode is on
    fn skip_ignored(&mut self) {
        let comments = self.flags.contains(Flags::COMMENTS);
        while let Some(&c) = self.chars.get(self.pos) {
            match c {
                '\\' if self.chars.get(self.pos + 1..self.pos + 4) == Some(&['Q', '\\', 'E'][..]) => {
                    self.pos += 4;
                }
                ' ' | '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r' if comments => self.pos += 1,
                '#' if comments => {
                    while let Some(&c) = self.chars.get(self.pos) {
                        self.pos += 1;
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ignored();
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn raw_peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn raw_next(&mut self) -> Option<char> {
        let c = self.raw_peek()?;
        self.pos += 1;
        Some(c)
    }

    fn raw_eat(&mut self, expected: char) -> bool {
        if self.raw_peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_alternation(&mut self) -> Result<Node, CompileError> {
        let mut branches = vec![self.parse_branch()?];
        while self.eat('|') {
            branches.push(self.parse_branch()?);
        }
        if branches.len() == 1 {
            Ok(branches.remove(0))
        } else {
            Ok(Node::union(branches))
        }
    }

    fn parse_branch(&mut self) -> Result<Node, CompileError> {
        let mut items = Vec::new();
        while !matches!(self.peek(), None | Some('|') | Some(')')) {
            if let Some(unit) = self.parse_unit()? {
                items.push(self.parse_quantifier(unit)?);
            }
        }
        Ok(Node::concat(items))
    }

    /// Parse one atom; inline flag switches such as `(?i)` yield `None`
    fn parse_unit(&mut self) -> Result<Option<Node>, CompileError> {
        self.skip_ignored();
        let start = self.pos;
        let Some(c) = self.next() else {
            return Ok(None);
        };
        match c {
            '(' => self.parse_group(start),
            '[' => {
                let set = self.parse_class()?;
                Ok(Some(self.class_node(set, start)))
            }
            '.' => Ok(Some(Node::class(self.dot()))),
            '^' | '$' => Ok(Some(Node::empty())),
            '\\' => self.parse_escape_unit(start).map(Some),
            '*' | '+' | '?' => Err(self.syntax(format!("Dangling meta character '{}'", c), start)),
            // a counted quantifier with nothing before it repeats the empty string
            '{' => {
                self.pos = start;
                Ok(Some(Node::empty()))
            }
            c => Ok(Some(self.literal_char(c))),
        }
    }

    fn class_node(&mut self, set: CharSet, start: usize) -> Node {
        if set.is_empty() && self.empty_class.is_none() {
            self.empty_class = Some(start);
        }
        Node::class(set)
    }

    fn literal_char(&self, c: char) -> Node {
        Node::literal(c.to_string(), self.case_insensitive())
    }

    fn dot(&self) -> CharSet {
        if self.flags.contains(Flags::DOTALL) {
            ANY.clone()
        } else if self.flags.contains(Flags::UNIX_LINES) {
            ANY_EXCEPT_NEWLINE.clone()
        } else {
            ANY_EXCEPT_LINE_TERMINATORS.clone()
        }
    }

    fn parse_quantifier(&mut self, unit: Node) -> Result<Node, CompileError> {
        let Some(c) = self.peek() else {
            return Ok(unit);
        };
        let start = self.pos;
        let (min, max) = match c {
            '*' | '+' | '?' => {
                self.pos += 1;
                match c {
                    '*' => (0, Bound::Unbounded),
                    '+' => (1, Bound::Unbounded),
                    _ => (0, Bound::Finite(1)),
                }
            }
            '{' => {
                self.pos += 1;
                self.parse_counted(start)?
            }
            _ => return Ok(unit),
        };
        let kind = if self.eat('?') {
            QuantifierKind::Reluctant
        } else if self.eat('+') {
            QuantifierKind::Possessive
        } else {
            QuantifierKind::Greedy
        };

        // a quantifier after quoted text binds to its last character only
        if let NodeKind::Literal {
            text,
            case_insensitive,
        } = unit.kind()
        {
            let mut chars: Vec<char> = text.chars().collect();
            if chars.len() > 1 {
                if let Some(last) = chars.pop() {
                    let head: String = chars.into_iter().collect();
                    let tail = Node::literal(last.to_string(), *case_insensitive);
                    return Ok(Node::concat(vec![
                        Node::literal(head, *case_insensitive),
                        Node::quantified(tail, min, max, kind),
                    ]));
                }
            }
        }
        Ok(Node::quantified(unit, min, max, kind))
    }

    /// The body of `{m}`, `{m,}` or `{m,n}` after the opening brace
    ///
    /// Read without skipping, so comments mode allows no whitespace inside.
    fn parse_counted(&mut self, start: usize) -> Result<(usize, Bound), CompileError> {
        let min = self
            .parse_count()?
            .ok_or_else(|| self.syntax("Illegal repetition", start))?;
        let max = if self.raw_eat(',') {
            self.parse_count()?.map_or(Bound::Unbounded, Bound::Finite)
        } else {
            Bound::Finite(min)
        };
        if !self.raw_eat('}') {
            return Err(self.syntax("Unclosed counted closure", self.pos));
        }
        if max < Bound::Finite(min) {
            return Err(self.syntax("Illegal repetition range", start));
        }
        Ok((min, max))
    }

    fn parse_count(&mut self) -> Result<Option<usize>, CompileError> {
        let start = self.pos;
        let mut value: Option<usize> = None;
        while let Some(digit) = self.raw_peek().and_then(|c| c.to_digit(10)) {
            self.pos += 1;
            let next = value
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit as usize))
                .filter(|&v| v <= i32::MAX as usize);
            match next {
                Some(next) => value = Some(next),
                None => return Err(self.syntax("Illegal repetition range", start)),
            }
        }
        Ok(value)
    }

    fn parse_group(&mut self, start: usize) -> Result<Option<Node>, CompileError> {
        let saved_flags = self.flags;
        let kind = if self.raw_peek() == Some('?') {
            self.pos += 1;
            let position = self.pos;
            match self.raw_next() {
                Some(':') => GroupKind::NonCapturing,
                Some('>') => GroupKind::Atomic,
                Some('=') => GroupKind::LookAhead { negated: false },
                Some('!') => GroupKind::LookAhead { negated: true },
                Some('<') => match self.raw_peek() {
                    Some('=') => {
                        self.pos += 1;
                        GroupKind::LookBehind { negated: false }
                    }
                    Some('!') => {
                        self.pos += 1;
                        GroupKind::LookBehind { negated: true }
                    }
                    _ => {
                        let name = self.parse_group_name()?;
                        self.open_capture(Some(name), start)?
                    }
                },
                Some(c) if c == '-' || c.is_ascii_alphabetic() => {
                    self.pos = position;
                    return self.parse_inline_flags(saved_flags);
                }
                _ => return Err(self.syntax("Unknown inline modifier", position)),
            }
        } else {
            self.open_capture(None, start)?
        };

        let inner = self.parse_alternation()?;
        if !self.eat(')') {
            return Err(self.syntax("Unclosed group", self.chars.len()));
        }
        self.flags = saved_flags;

        if kind.is_lookaround() && inner.max_length().is_unbounded() {
            return Err(self.unsupported("lookaround with unbounded length", start));
        }
        if let GroupKind::Capturing { index, .. } = kind {
            self.closed
                .insert(index, (inner.min_length(), inner.max_length()));
        }
        Ok(Some(Node::group(kind, inner)))
    }

    fn open_capture(&mut self, name: Option<String>, start: usize) -> Result<GroupKind, CompileError> {
        self.group_count += 1;
        let index = self.group_count;
        if let Some(name) = &name {
            if self.names.insert(name.clone(), index).is_some() {
                return Err(self.syntax(
                    format!("Named capturing group <{}> is already defined", name),
                    start,
                ));
            }
        }
        Ok(GroupKind::Capturing { index, name })
    }

    /// A group name after `<`, consuming the closing `>`
    fn parse_group_name(&mut self) -> Result<String, CompileError> {
        let start = self.pos;
        let mut name = String::new();
        while let Some(c) = self.raw_peek().filter(char::is_ascii_alphanumeric) {
            name.push(c);
            self.pos += 1;
        }
        if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(self.syntax(
                "capturing group name does not start with a Latin letter",
                start,
            ));
        }
        if self.raw_next() != Some('>') {
            return Err(self.syntax(
                "named capturing group is missing trailing '>'",
                self.pos.saturating_sub(1),
            ));
        }
        Ok(name)
    }

    /// `(?idmsux-idmsux)` or `(?idmsux-idmsux:X)`, positioned after `(?`
    fn parse_inline_flags(&mut self, saved_flags: Flags) -> Result<Option<Node>, CompileError> {
        let mut flags = self.flags;
        let mut clearing = false;
        loop {
            let position = self.pos;
            match self.raw_next() {
                Some(')') => {
                    // lasts until the enclosing group closes
                    self.flags = flags;
                    return Ok(None);
                }
                Some(':') => {
                    self.flags = flags;
                    let inner = self.parse_alternation()?;
                    if !self.eat(')') {
                        return Err(self.syntax("Unclosed group", self.chars.len()));
                    }
                    self.flags = saved_flags;
                    return Ok(Some(Node::group(GroupKind::NonCapturing, inner)));
                }
                Some('-') if !clearing => clearing = true,
                Some('U') => {
                    return Err(self.unsupported("Unicode character class flag (?U)", position));
                }
                Some(letter) => match Flags::for_inline_letter(letter) {
                    Some(flag) if clearing => flags = flags.without(flag),
                    Some(flag) => flags = flags.with(flag),
                    None => return Err(self.syntax("Unknown inline modifier", position)),
                },
                None => return Err(self.syntax("Unclosed group", self.chars.len())),
            }
        }
    }

    /// Build a backreference node to group `index`, addressed as `id`
    fn backref(&mut self, id: GroupId, index: usize, start: usize) -> Result<Node, CompileError> {
        if index == 0 || index > self.group_count {
            return Err(self.unsupported(format!("backreference {} to an undefined group", id), start));
        }
        let Some(&(min, max)) = self.closed.get(&index) else {
            return Err(self.unsupported(format!("backreference {} inside its own group", id), start));
        };
        self.backrefs.push(start);
        Ok(Node::backref(id, min, max))
    }

    /// Reject backreferences whose group may not have captured when they run
    fn validate_backrefs(&self, root: &Node) -> Result<(), CompileError> {
        let mut cursor = 0;
        self.definitely_captured(root, HashSet::new(), &mut cursor)?;
        Ok(())
    }

    /// Groups guaranteed to have captured after `node` runs, given `captured` before
    fn definitely_captured(
        &self,
        node: &Node,
        captured: HashSet<usize>,
        cursor: &mut usize,
    ) -> Result<HashSet<usize>, CompileError> {
        match node.kind() {
            NodeKind::Empty | NodeKind::Literal { .. } | NodeKind::Class(_) => Ok(captured),
            NodeKind::BackRef(id) => {
                let position = self.backrefs.get(*cursor).copied().unwrap_or(0);
                *cursor += 1;
                let index = match id {
                    GroupId::Index(index) => Some(*index),
                    GroupId::Name(name) => self.names.get(name).copied(),
                };
                if index.is_some_and(|index| captured.contains(&index)) {
                    Ok(captured)
                } else {
                    Err(self.unsupported(
                        format!("backreference {} to a group that may not have captured", id),
                        position,
                    ))
                }
            }
            NodeKind::Concat(children) => children
                .iter()
                .try_fold(captured, |set, child| self.definitely_captured(child, set, cursor)),
            NodeKind::Union(children) => {
                let mut common: Option<HashSet<usize>> = None;
                for child in children {
                    let branch = self.definitely_captured(child, captured.clone(), cursor)?;
                    common = Some(match common {
                        None => branch,
                        Some(common) => common.intersection(&branch).copied().collect(),
                    });
                }
                Ok(common.unwrap_or(captured))
            }
            NodeKind::Quantified { inner, min, .. } => {
                let after = self.definitely_captured(inner, captured.clone(), cursor)?;
                Ok(if *min == 0 { captured } else { after })
            }
            NodeKind::Group { kind, inner } => match kind {
                GroupKind::Capturing { index, .. } => {
                    let mut set = self.definitely_captured(inner, captured, cursor)?;
                    set.insert(*index);
                    Ok(set)
                }
                GroupKind::NonCapturing | GroupKind::Atomic => {
                    self.definitely_captured(inner, captured, cursor)
                }
                GroupKind::LookAhead { .. } | GroupKind::LookBehind { .. } => {
                    // never generated, so nothing inside needs to resolve
                    *cursor += count_backrefs(inner);
                    Ok(captured)
                }
            },
        }
    }
}

fn count_backrefs(node: &Node) -> usize {
    match node.kind() {
        NodeKind::Empty | NodeKind::Literal { .. } | NodeKind::Class(_) => 0,
        NodeKind::BackRef(_) => 1,
        NodeKind::Concat(children) | NodeKind::Union(children) => {
            children.iter().map(count_backrefs).sum()
        }
        NodeKind::Quantified { inner, .. } | NodeKind::Group { inner, .. } => count_backrefs(inner),
    }
}

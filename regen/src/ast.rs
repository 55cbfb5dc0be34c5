//! Pattern syntax tree with cached length bounds.
//!
//! Nodes are immutable. Every constructor computes the shortest and longest
//! string the node can produce, so length queries never walk the tree.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Mul};

use crate::charset::CharSet;

/// Upper bound on a length or repetition count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bound {
    Finite(usize),
    Unbounded,
}

impl Bound {
    pub fn finite(self) -> Option<usize> {
        match self {
            Bound::Finite(n) => Some(n),
            Bound::Unbounded => None,
        }
    }

    pub fn is_unbounded(self) -> bool {
        self == Bound::Unbounded
    }
}

impl From<usize> for Bound {
    fn from(n: usize) -> Self {
        Bound::Finite(n)
    }
}

impl Add for Bound {
    type Output = Bound;

    fn add(self, rhs: Bound) -> Bound {
        match (self, rhs) {
            (Bound::Finite(a), Bound::Finite(b)) => a.checked_add(b).map_or(Bound::Unbounded, Bound::Finite),
            _ => Bound::Unbounded,
        }
    }
}

impl Mul for Bound {
    type Output = Bound;

    /// Zero absorbs even an unbounded factor
    fn mul(self, rhs: Bound) -> Bound {
        match (self, rhs) {
            (Bound::Finite(0), _) | (_, Bound::Finite(0)) => Bound::Finite(0),
            (Bound::Finite(a), Bound::Finite(b)) => a.checked_mul(b).map_or(Bound::Unbounded, Bound::Finite),
            _ => Bound::Unbounded,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Finite(n) => write!(f, "{}", n),
            Bound::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// How a capturing group is addressed by a backreference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupId {
    Index(usize),
    Name(String),
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupId::Index(index) => write!(f, "\\{}", index),
            GroupId::Name(name) => write!(f, "\\k<{}>", name),
        }
    }
}

/// Quantifier flavour; it affects matching only, never generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuantifierKind {
    #[default]
    Greedy,
    Reluctant,
    Possessive,
}

impl QuantifierKind {
    fn suffix(self) -> &'static str {
        match self {
            QuantifierKind::Greedy => "",
            QuantifierKind::Reluctant => "?",
            QuantifierKind::Possessive => "+",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Capturing { index: usize, name: Option<String> },
    NonCapturing,
    Atomic,
    LookAhead { negated: bool },
    LookBehind { negated: bool },
}

impl GroupKind {
    /// Zero-width assertions produce no characters
    pub fn is_lookaround(&self) -> bool {
        matches!(self, GroupKind::LookAhead { .. } | GroupKind::LookBehind { .. })
    }

    fn prefix(&self) -> String {
        match self {
            GroupKind::Capturing { name: Some(name), .. } => format!("?<{}>", name),
            GroupKind::Capturing { name: None, .. } => String::new(),
            GroupKind::NonCapturing => "?:".to_string(),
            GroupKind::Atomic => "?>".to_string(),
            GroupKind::LookAhead { negated: false } => "?=".to_string(),
            GroupKind::LookAhead { negated: true } => "?!".to_string(),
            GroupKind::LookBehind { negated: false } => "?<=".to_string(),
            GroupKind::LookBehind { negated: true } => "?<!".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Empty,
    Literal {
        text: String,
        case_insensitive: bool,
    },
    Class(CharSet),
    Concat(Vec<Node>),
    Union(Vec<Node>),
    Quantified {
        inner: Box<Node>,
        min: usize,
        max: Bound,
        kind: QuantifierKind,
    },
    Group {
        kind: GroupKind,
        inner: Box<Node>,
    },
    BackRef(GroupId),
}

/// A node of the compiled pattern together with its length bounds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    kind: NodeKind,
    min_length: usize,
    max_length: Bound,
}

impl Node {
    pub fn empty() -> Self {
        Self {
            kind: NodeKind::Empty,
            min_length: 0,
            max_length: Bound::Finite(0),
        }
    }

    pub fn literal(text: impl Into<String>, case_insensitive: bool) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::empty();
        }
        let length = text.chars().count();
        Self {
            kind: NodeKind::Literal {
                text,
                case_insensitive,
            },
            min_length: length,
            max_length: Bound::Finite(length),
        }
    }

    pub fn class(set: CharSet) -> Self {
        Self {
            kind: NodeKind::Class(set),
            min_length: 1,
            max_length: Bound::Finite(1),
        }
    }

    pub fn concat(children: Vec<Node>) -> Self {
        if children.is_empty() {
            return Self::empty();
        }
        let min_length = children
            .iter()
            .fold(0usize, |sum, child| sum.saturating_add(child.min_length));
        let max_length = children
            .iter()
            .fold(Bound::Finite(0), |sum, child| sum + child.max_length);
        Self {
            kind: NodeKind::Concat(children),
            min_length,
            max_length,
        }
    }

    pub fn union(children: Vec<Node>) -> Self {
        let (Some(min_length), Some(max_length)) = (
            children.iter().map(|child| child.min_length).min(),
            children.iter().map(|child| child.max_length).max(),
        ) else {
            return Self::empty();
        };
        Self {
            kind: NodeKind::Union(children),
            min_length,
            max_length,
        }
    }

    /// Repeat `inner` between `min` and `max` times
    ///
    /// A `max` below `min` is raised to `min`.
    pub fn quantified(inner: Node, min: usize, max: Bound, kind: QuantifierKind) -> Self {
        let max = max.max(Bound::Finite(min));
        let min_length = inner.min_length.saturating_mul(min);
        let max_length = inner.max_length * max;
        Self {
            kind: NodeKind::Quantified {
                inner: Box::new(inner),
                min,
                max,
                kind,
            },
            min_length,
            max_length,
        }
    }

    pub fn group(kind: GroupKind, inner: Node) -> Self {
        let (min_length, max_length) = if kind.is_lookaround() {
            (0, Bound::Finite(0))
        } else {
            (inner.min_length, inner.max_length)
        };
        Self {
            kind: NodeKind::Group {
                kind,
                inner: Box::new(inner),
            },
            min_length,
            max_length,
        }
    }

    /// A reference to a group whose lengths are `min..=max`
    pub fn backref(id: GroupId, min_length: usize, max_length: Bound) -> Self {
        Self {
            kind: NodeKind::BackRef(id),
            min_length,
            max_length,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn max_length(&self) -> Bound {
        self.max_length
    }

    /// Rebuild the tree with every character class passed through `f`
    pub fn map_classes(&self, f: &impl Fn(&CharSet) -> CharSet) -> Node {
        match &self.kind {
            NodeKind::Empty | NodeKind::Literal { .. } | NodeKind::BackRef(_) => self.clone(),
            NodeKind::Class(set) => Node::class(f(set)),
            NodeKind::Concat(children) => {
                Node::concat(children.iter().map(|child| child.map_classes(f)).collect())
            }
            NodeKind::Union(children) => {
                Node::union(children.iter().map(|child| child.map_classes(f)).collect())
            }
            NodeKind::Quantified {
                inner,
                min,
                max,
                kind,
            } => Node::quantified(inner.map_classes(f), *min, *max, *kind),
            NodeKind::Group { kind, inner } => Node::group(kind.clone(), inner.map_classes(f)),
        }
    }

    /// Remove the parts of the tree that can never match
    ///
    /// Only an empty character class matches nothing. Optional repetitions of
    /// it become `Empty` and alternatives containing it are dropped. `None`
    /// means the whole node is impossible. Negative lookarounds around such a
    /// class always succeed and are kept as they are.
    pub(crate) fn prune(&self) -> Option<Node> {
        match &self.kind {
            NodeKind::Empty | NodeKind::Literal { .. } | NodeKind::BackRef(_) => Some(self.clone()),
            NodeKind::Class(set) => (!set.is_empty()).then(|| self.clone()),
            NodeKind::Concat(children) => children
                .iter()
                .map(Node::prune)
                .collect::<Option<Vec<_>>>()
                .map(Node::concat),
            NodeKind::Union(children) => {
                let branches: Vec<Node> = children.iter().filter_map(Node::prune).collect();
                (!branches.is_empty()).then(|| Node::union(branches))
            }
            NodeKind::Quantified {
                inner,
                min,
                max,
                kind,
            } => match inner.prune() {
                Some(inner) => Some(Node::quantified(inner, *min, *max, *kind)),
                None if *min == 0 => Some(Node::empty()),
                None => None,
            },
            NodeKind::Group { kind, inner } => match kind {
                GroupKind::LookAhead { negated: true } | GroupKind::LookBehind { negated: true } => {
                    Some(self.clone())
                }
                _ => inner.prune().map(|inner| Node::group(kind.clone(), inner)),
            },
        }
    }

    /// Structural normalisation that never changes the generated language
    ///
    /// Flattens nested sequences and alternations, drops empty nodes and
    /// non-capturing groups, merges adjacent literals and removes trivial
    /// quantifiers.
    pub fn simplify(&self) -> Node {
        match &self.kind {
            NodeKind::Empty
            | NodeKind::Literal { .. }
            | NodeKind::Class(_)
            | NodeKind::BackRef(_) => self.clone(),
            NodeKind::Concat(children) => {
                let mut flat = Vec::with_capacity(children.len());
                for child in children {
                    push_concat(&mut flat, child.simplify());
                }
                match flat.len() {
                    0 => Node::empty(),
                    1 => flat.remove(0),
                    _ => Node::concat(flat),
                }
            }
            NodeKind::Union(children) => {
                let mut flat = Vec::with_capacity(children.len());
                for child in children {
                    let child = child.simplify();
                    match child.kind {
                        NodeKind::Union(nested) => flat.extend(nested),
                        _ => flat.push(child),
                    }
                }
                if flat.len() == 1 {
                    flat.remove(0)
                } else {
                    Node::union(flat)
                }
            }
            NodeKind::Quantified {
                inner,
                min,
                max,
                kind,
            } => {
                let inner = inner.simplify();
                if *max == Bound::Finite(0) || inner.kind == NodeKind::Empty {
                    Node::empty()
                } else if *min == 1 && *max == Bound::Finite(1) {
                    inner
                } else {
                    Node::quantified(inner, *min, *max, *kind)
                }
            }
            NodeKind::Group { kind, inner } => {
                let inner = inner.simplify();
                match kind {
                    GroupKind::NonCapturing => inner,
                    _ => Node::group(kind.clone(), inner),
                }
            }
        }
    }

    /// Restructure the tree so no generated string exceeds `target`
    ///
    /// The minimum length is preserved. Whenever `target >= min_length` the
    /// result has `max_length <= target`; a node that already fits is returned
    /// unchanged. Capturing groups are capped by the budget their
    /// backreferences receive, so repeated captures fit as well.
    pub fn sized(&self, target: usize) -> Node {
        let mut planner = Resizer::default();
        planner.resize(self, target);

        let mut resizer = Resizer {
            caps: planner.backref_targets,
            ..Resizer::default()
        };
        resizer.resize(self, target)
    }
}

fn push_concat(flat: &mut Vec<Node>, node: Node) {
    match node.kind {
        NodeKind::Empty => {}
        NodeKind::Concat(children) => {
            for child in children {
                push_concat(flat, child);
            }
        }
        NodeKind::Literal {
            text,
            case_insensitive,
        } => {
            if let Some(Node {
                kind:
                    NodeKind::Literal {
                        text: previous,
                        case_insensitive: previous_ci,
                    },
                min_length,
                max_length,
            }) = flat.last_mut()
            {
                if *previous_ci == case_insensitive {
                    previous.push_str(&text);
                    *min_length = previous.chars().count();
                    *max_length = Bound::Finite(*min_length);
                    return;
                }
            }
            flat.push(Node::literal(text, case_insensitive));
        }
        _ => flat.push(node),
    }
}

/// Split `target` between `children`: each gets its minimum plus a share of
/// the slack proportional to how much longer it can grow.
pub(crate) fn apportion(children: &[Node], target: usize) -> Vec<usize> {
    let floor = children
        .iter()
        .fold(0usize, |sum, child| sum.saturating_add(child.min_length));
    let extra = target.saturating_sub(floor);
    let ranges: Vec<usize> = children
        .iter()
        .map(|child| match child.max_length {
            Bound::Finite(max) => (max - child.min_length).min(extra),
            Bound::Unbounded => extra,
        })
        .collect();
    let total: u128 = ranges.iter().map(|&range| range as u128).sum();
    if total == 0 {
        return children.iter().map(|child| child.min_length).collect();
    }

    let mut shares: Vec<usize> = ranges
        .iter()
        .map(|&range| (extra as u128 * range as u128 / total) as usize)
        .collect();
    let mut remainder = extra - shares.iter().sum::<usize>();
    for (share, &range) in shares.iter_mut().zip(&ranges) {
        if remainder == 0 {
            break;
        }
        if *share < range {
            *share += 1;
            remainder -= 1;
        }
    }
    children
        .iter()
        .zip(shares)
        .map(|(child, share)| child.min_length + share)
        .collect()
}

#[derive(Default)]
struct Resizer {
    /// Largest budget each referenced group may use
    caps: HashMap<GroupId, usize>,
    /// Lengths of groups already resized, for their backreferences
    groups: HashMap<GroupId, (usize, Bound)>,
    /// Smallest budget each backreference received
    backref_targets: HashMap<GroupId, usize>,
}

impl Resizer {
    fn resize(&mut self, node: &Node, target: usize) -> Node {
        match &node.kind {
            NodeKind::Empty | NodeKind::Literal { .. } | NodeKind::Class(_) => node.clone(),
            NodeKind::BackRef(id) => {
                self.backref_targets
                    .entry(id.clone())
                    .and_modify(|cap| *cap = (*cap).min(target))
                    .or_insert(target);
                match self.groups.get(id) {
                    Some(&(min, max)) => Node::backref(id.clone(), min, max),
                    None => node.clone(),
                }
            }
            NodeKind::Concat(children) => {
                let targets = apportion(children, target);
                let resized = children
                    .iter()
                    .zip(targets)
                    .map(|(child, child_target)| self.resize(child, child_target))
                    .collect();
                Node::concat(resized)
            }
            NodeKind::Union(children) => {
                let viable: Vec<&Node> = children
                    .iter()
                    .filter(|child| child.min_length <= target)
                    .collect();
                let kept = if viable.is_empty() {
                    children
                        .iter()
                        .filter(|child| child.min_length == node.min_length)
                        .collect()
                } else {
                    viable
                };
                let resized = kept
                    .into_iter()
                    .map(|child| self.resize(child, target))
                    .collect();
                Node::union(resized)
            }
            NodeKind::Quantified {
                inner,
                min,
                max,
                kind,
            } => {
                let (count, inner_target) = plan_repetition(node, inner, *min, *max, target);
                let inner = self.resize(inner, inner_target);
                Node::quantified(inner, *min, count, *kind)
            }
            NodeKind::Group { kind, inner } => match kind {
                GroupKind::Capturing { index, name } => {
                    let index_id = GroupId::Index(*index);
                    let name_id = name.clone().map(GroupId::Name);
                    let cap = [Some(&index_id), name_id.as_ref()]
                        .into_iter()
                        .flatten()
                        .filter_map(|id| self.caps.get(id).copied())
                        .min()
                        .unwrap_or(target);
                    let inner = self.resize(inner, target.min(cap));
                    let lengths = (inner.min_length, inner.max_length);
                    self.groups.insert(index_id, lengths);
                    if let Some(name_id) = name_id {
                        self.groups.insert(name_id, lengths);
                    }
                    Node::group(kind.clone(), inner)
                }
                GroupKind::NonCapturing | GroupKind::Atomic => {
                    let inner = self.resize(inner, target);
                    Node::group(kind.clone(), inner)
                }
                GroupKind::LookAhead { .. } | GroupKind::LookBehind { .. } => node.clone(),
            },
        }
    }
}

/// Pick the repetition bound and per-repetition budget for a quantifier
fn plan_repetition(node: &Node, inner: &Node, min: usize, max: Bound, target: usize) -> (Bound, usize) {
    if node.max_length <= Bound::Finite(target) {
        let inner_target = inner.max_length.finite().unwrap_or(inner.min_length);
        return (max, inner_target);
    }
    let most = max.finite().unwrap_or(usize::MAX);
    if target < min.saturating_mul(inner.min_length) {
        return (Bound::Finite(min), inner.min_length);
    }
    if let Bound::Finite(each) = inner.max_length {
        if each > 0 && min.saturating_mul(each) <= target {
            let count = (target / each).min(most).max(min);
            return (Bound::Finite(count), each);
        }
    }
    let count = target
        .isqrt()
        .max(1)
        .min(most)
        .min(target / inner.min_length.max(1))
        .max(min);
    let inner_target = if count == 0 {
        inner.min_length
    } else {
        (target / count).max(inner.min_length)
    };
    (Bound::Finite(count), inner_target)
}

fn needs_wrapping(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Empty | NodeKind::Concat(_) | NodeKind::Union(_) | NodeKind::Quantified { .. } => true,
        NodeKind::Literal {
            text,
            case_insensitive,
        } => !case_insensitive && text.chars().count() > 1,
        NodeKind::Class(_) | NodeKind::Group { .. } | NodeKind::BackRef(_) => false,
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    for c in text.chars() {
        match c {
            '\\' | '.' | '[' | ']' | '{' | '}' | '(' | ')' | '*' | '+' | '?' | '^' | '$' | '|' => {
                write!(f, "\\{}", c)?
            }
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\x{{{:x}}}", c as u32)?,
            c => write!(f, "{}", c)?,
        }
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Empty => Ok(()),
            NodeKind::Literal {
                text,
                case_insensitive: true,
            } => {
                f.write_str("(?i:")?;
                write_literal(f, text)?;
                f.write_str(")")
            }
            NodeKind::Literal { text, .. } => write_literal(f, text),
            NodeKind::Class(set) => write!(f, "{}", set),
            NodeKind::Concat(children) => {
                for child in children {
                    match child.kind {
                        NodeKind::Union(_) => write!(f, "(?:{})", child)?,
                        _ => write!(f, "{}", child)?,
                    }
                }
                Ok(())
            }
            NodeKind::Union(children) => {
                for (position, child) in children.iter().enumerate() {
                    if position > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{}", child)?;
                }
                Ok(())
            }
            NodeKind::Quantified {
                inner,
                min,
                max,
                kind,
            } => {
                if needs_wrapping(inner) {
                    write!(f, "(?:{})", inner)?;
                } else {
                    write!(f, "{}", inner)?;
                }
                match (min, max) {
                    (0, Bound::Unbounded) => f.write_str("*")?,
                    (1, Bound::Unbounded) => f.write_str("+")?,
                    (0, Bound::Finite(1)) => f.write_str("?")?,
                    (m, Bound::Unbounded) => write!(f, "{{{},}}", m)?,
                    (m, Bound::Finite(n)) if m == n => write!(f, "{{{}}}", m)?,
                    (m, Bound::Finite(n)) => write!(f, "{{{},{}}}", m, n)?,
                }
                f.write_str(kind.suffix())
            }
            NodeKind::Group { kind, inner } => write!(f, "({}{})", kind.prefix(), inner),
            NodeKind::BackRef(id) => write!(f, "{}", id),
        }
    }
}

//! Deterministic string generation from pattern trees.

use std::collections::HashMap;

use crate::ast::{Bound, GroupId, GroupKind, Node, NodeKind, apportion};
use crate::error::GenerationError;
use crate::rng::RandomSource;

/// Generate one string matching `node`
///
/// With a `target`, the tree is first [sized](Node::sized) so the output is
/// no longer than `max(target, node.min_length())`. Without one, unbounded
/// repetitions run their minimum number of times. Returns the output and the
/// source state after the last draw.
pub fn generate<R: RandomSource>(
    node: &Node,
    source: R,
    target: Option<usize>,
) -> Result<(String, R), GenerationError> {
    let mut context = GenerationContext::new(source);
    match target {
        Some(target) => context.emit(&node.sized(target), Some(target))?,
        None => context.emit(node, None)?,
    }
    Ok(context.finish())
}

/// Per-call generation state: the random source and the captures so far
#[derive(Debug)]
pub struct GenerationContext<R> {
    source: R,
    captures: HashMap<GroupId, String>,
    output: String,
    length: usize,
}

impl<R: RandomSource> GenerationContext<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            captures: HashMap::new(),
            output: String::new(),
            length: 0,
        }
    }

    fn draw_long(&mut self) -> i64 {
        let (next, value) = self.source.draw_long();
        self.source = next;
        value
    }

    fn draw_int(&mut self, lo: usize, hi: usize) -> usize {
        let (next, value) = self.source.draw_int(lo, hi);
        self.source = next;
        value
    }

    fn push(&mut self, c: char) {
        self.output.push(c);
        self.length += 1;
    }

    fn push_str(&mut self, text: &str) {
        self.output.push_str(text);
        self.length += text.chars().count();
    }

    /// Characters produced so far
    pub fn length(&self) -> usize {
        self.length
    }

    /// The most recent text captured by a group
    pub fn capture(&self, id: &GroupId) -> Option<&str> {
        self.captures.get(id).map(String::as_str)
    }

    /// Append a string for `node`, trying to stay within `budget` characters
    pub fn emit(&mut self, node: &Node, budget: Option<usize>) -> Result<(), GenerationError> {
        match node.kind() {
            NodeKind::Empty => {}
            NodeKind::Literal { text, .. } => self.push_str(text),
            NodeKind::Class(set) => {
                let seed = self.draw_long();
                self.push(set.sample(seed)?);
            }
            NodeKind::Concat(children) => {
                let mut remaining = budget;
                for (position, child) in children.iter().enumerate() {
                    let child_budget = remaining
                        .map(|left| apportion(&children[position..], left)[0]);
                    let before = self.length;
                    self.emit(child, child_budget)?;
                    let produced = self.length - before;
                    remaining = remaining.map(|left| left.saturating_sub(produced));
                }
            }
            NodeKind::Union(children) => {
                let choice = self.draw_int(0, children.len());
                if let Some(child) = children.get(choice) {
                    self.emit(child, budget)?;
                }
            }
            NodeKind::Quantified {
                inner, min, max, ..
            } => {
                let most = repetition_limit(inner, *min, *max, budget);
                let count = if most > *min {
                    self.draw_int(*min, most + 1)
                } else {
                    *min
                };
                let each_min = inner.min_length();
                let mut remaining = budget;
                for done in 0..count {
                    let left = count - done;
                    let each = remaining
                        .map(|budget| each_min + budget.saturating_sub(left * each_min) / left);
                    let before = self.length;
                    self.emit(inner, each)?;
                    let produced = self.length - before;
                    remaining = remaining.map(|budget| budget.saturating_sub(produced));
                }
            }
            NodeKind::Group { kind, inner } => match kind {
                GroupKind::Capturing { index, name } => {
                    let start = self.output.len();
                    self.emit(inner, budget)?;
                    let captured = self.output[start..].to_string();
                    if let Some(name) = name {
                        self.captures
                            .insert(GroupId::Name(name.clone()), captured.clone());
                    }
                    self.captures.insert(GroupId::Index(*index), captured);
                }
                GroupKind::NonCapturing | GroupKind::Atomic => self.emit(inner, budget)?,
                GroupKind::LookAhead { .. } | GroupKind::LookBehind { .. } => {}
            },
            NodeKind::BackRef(id) => {
                let captured = self
                    .captures
                    .get(id)
                    .cloned()
                    .ok_or_else(|| GenerationError::UnresolvedBackReference { group: id.clone() })?;
                self.push_str(&captured);
            }
        }
        Ok(())
    }

    /// The generated text and the final source state
    pub fn finish(self) -> (String, R) {
        (self.output, self.source)
    }
}

/// Largest repetition count worth drawing for a quantifier
fn repetition_limit(inner: &Node, min: usize, max: Bound, budget: Option<usize>) -> usize {
    match (max, budget) {
        (Bound::Finite(most), _) => most,
        (Bound::Unbounded, None) => min,
        (Bound::Unbounded, Some(budget)) => {
            let each = inner
                .max_length()
                .finite()
                .filter(|&each| each > 0)
                .unwrap_or(inner.min_length().max(1));
            (budget / each).max(min)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::QuantifierKind;
    use crate::charset::{CharSet, DIGIT};
    use crate::rng::Lcg;

    fn run(node: &Node, seed: i64, target: Option<usize>) -> String {
        generate(node, Lcg::new(seed), target).unwrap().0
    }

    fn digits(min: usize, max: Bound) -> Node {
        Node::quantified(Node::class(DIGIT.clone()), min, max, QuantifierKind::Greedy)
    }

    #[test]
    fn test_literal_uses_no_randomness() {
        let source = Lcg::new(3);
        let (text, after) = generate(&Node::literal("abc", true), source, None).unwrap();
        assert_eq!(text, "abc");
        assert_eq!(after, source);
    }

    #[test]
    fn test_class_draws_member() {
        let set = CharSet::from_chars(['x', 'y', 'z']);
        for seed in 0..20 {
            let text = run(&Node::class(set.clone()), seed, None);
            assert_eq!(text.chars().count(), 1);
            assert!(set.contains(text.chars().next().unwrap()));
        }
    }

    #[test]
    fn test_union_picks_one_branch() {
        let node = Node::union(vec![
            Node::literal("one", false),
            Node::literal("two", false),
            Node::literal("three", false),
        ]);
        let mut seen = std::collections::HashSet::new();
        for seed in 0..50 {
            let text = run(&node, seed, None);
            assert!(["one", "two", "three"].contains(&text.as_str()));
            seen.insert(text);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_counted_repetition_stays_in_range() {
        let node = digits(2, Bound::Finite(5));
        for seed in 0..50 {
            let text = run(&node, seed, None);
            assert!((2..=5).contains(&text.len()), "{:?}", text);
            assert!(text.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_unbounded_without_budget_uses_minimum() {
        let node = digits(3, Bound::Unbounded);
        for seed in 0..10 {
            assert_eq!(run(&node, seed, None).len(), 3);
        }
    }

    #[test]
    fn test_budget_limits_length() {
        let node = Node::concat(vec![
            digits(1, Bound::Unbounded),
            Node::literal("-", false),
            digits(0, Bound::Unbounded),
        ]);
        for target in [0, 2, 5, 40] {
            for seed in 0..20 {
                let text = run(&node, seed, Some(target));
                assert!(text.chars().count() <= target.max(2), "{} > {}", text, target);
            }
        }
    }

    #[test]
    fn test_backreference_repeats_capture() {
        let group = Node::group(
            GroupKind::Capturing {
                index: 1,
                name: Some("d".to_string()),
            },
            digits(1, Bound::Finite(4)),
        );
        let node = Node::concat(vec![
            group,
            Node::backref(GroupId::Index(1), 1, Bound::Finite(4)),
            Node::backref(GroupId::Name("d".to_string()), 1, Bound::Finite(4)),
        ]);
        for seed in 0..20 {
            let text = run(&node, seed, None);
            let third = text.len() / 3;
            assert_eq!(&text[..third], &text[third..2 * third]);
            assert_eq!(&text[..third], &text[2 * third..]);
        }
    }

    #[test]
    fn test_lookaround_emits_nothing() {
        let node = Node::concat(vec![
            Node::group(GroupKind::LookAhead { negated: false }, Node::literal("zz", false)),
            Node::literal("a", false),
        ]);
        let source = Lcg::new(1);
        let (text, after) = generate(&node, source, None).unwrap();
        assert_eq!(text, "a");
        assert_eq!(after, source);
    }

    #[test]
    fn test_hand_built_invariant_violations() {
        let orphan = Node::backref(GroupId::Index(1), 0, Bound::Finite(0));
        assert_eq!(
            generate(&orphan, Lcg::new(0), None).unwrap_err(),
            GenerationError::UnresolvedBackReference {
                group: GroupId::Index(1)
            }
        );
        let empty = Node::class(CharSet::empty());
        assert_eq!(
            generate(&empty, Lcg::new(0), None).unwrap_err(),
            GenerationError::EmptyCharSet
        );
    }

    #[test]
    fn test_deterministic_for_same_source() {
        let node = Node::concat(vec![digits(0, Bound::Unbounded), Node::class(CharSet::range('a', 'z'))]);
        for seed in [-5i64, 0, 8, i64::MAX] {
            assert_eq!(run(&node, seed, Some(12)), run(&node, seed, Some(12)));
        }
    }

    #[test]
    fn test_context_tracks_captures() {
        let mut context = GenerationContext::new(Lcg::new(0));
        let node = Node::group(
            GroupKind::Capturing { index: 2, name: None },
            Node::literal("hé", false),
        );
        context.emit(&node, None).unwrap();
        assert_eq!(context.length(), 2);
        assert_eq!(context.capture(&GroupId::Index(2)), Some("hé"));
    }
}

//! Bitset character sets over the Basic Multilingual Plane.
//!
//! The universe is every UTF-16 code unit except the surrogate block, which is
//! exactly the set of `char`s up to `U+FFFF`. Sets are immutable once built;
//! [`CharSetBuilder`] is the incremental construction path used by the parser.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use crate::error::GenerationError;

const WORDS: usize = 0x10000 / 64;
const SURROGATE_WORDS: std::ops::Range<usize> = (0xD800 / 64)..(0xE000 / 64);

/// Largest character inside the universe
pub const UNIVERSE_MAX: char = '\u{FFFF}';

/// Number of characters in the universe
pub const UNIVERSE_SIZE: usize = 0x10000 - 0x800;

/// Characters the dialect treats as line terminators outside Unix-lines mode
pub const LINE_TERMINATORS: [char; 5] = ['\n', '\r', '\u{85}', '\u{2028}', '\u{2029}'];

type Bits = [u64; WORDS];

/// Every character, as matched by `.` in dot-all mode
pub static ANY: LazyLock<CharSet> = LazyLock::new(|| CharSet::empty().negate());

/// Every character except the line terminators
pub static ANY_EXCEPT_LINE_TERMINATORS: LazyLock<CharSet> =
    LazyLock::new(|| CharSet::from_chars(LINE_TERMINATORS).negate());

/// Every character except `\n`, as matched by `.` in Unix-lines mode
pub static ANY_EXCEPT_NEWLINE: LazyLock<CharSet> =
    LazyLock::new(|| CharSet::single('\n').negate());

/// `\d`
pub static DIGIT: LazyLock<CharSet> = LazyLock::new(|| CharSet::range('0', '9'));

/// `\w`
pub static WORD: LazyLock<CharSet> = LazyLock::new(|| {
    CharSetBuilder::new()
        .range('a', 'z')
        .range('A', 'Z')
        .range('0', '9')
        .single('_')
        .build()
});

/// `\s`
pub static SPACE: LazyLock<CharSet> =
    LazyLock::new(|| CharSet::from_chars([' ', '\t', '\n', '\u{0B}', '\u{0C}', '\r']));

/// `\h`
pub static HORIZONTAL_SPACE: LazyLock<CharSet> = LazyLock::new(|| {
    CharSetBuilder::new()
        .single(' ')
        .single('\t')
        .single('\u{A0}')
        .single('\u{1680}')
        .single('\u{180E}')
        .range('\u{2000}', '\u{200A}')
        .single('\u{202F}')
        .single('\u{205F}')
        .single('\u{3000}')
        .build()
});

/// `\v`
pub static VERTICAL_SPACE: LazyLock<CharSet> = LazyLock::new(|| {
    CharSet::from_chars([
        '\n', '\u{0B}', '\u{0C}', '\r', '\u{85}', '\u{2028}', '\u{2029}',
    ])
});

/// ASCII letters and digits
pub static ALPHANUMERIC: LazyLock<CharSet> = LazyLock::new(|| {
    CharSetBuilder::new()
        .range('0', '9')
        .range('A', 'Z')
        .range('a', 'z')
        .build()
});

/// Whether a character is representable in a [`CharSet`]
pub fn in_universe(c: char) -> bool {
    c <= UNIVERSE_MAX
}

/// How a set is closed over letter case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaseFolding {
    /// No closure
    #[default]
    None,
    /// Only ASCII letters gain their opposite case
    Ascii,
    /// Every character with a single-character case mapping gains it
    Unicode,
}

/// An immutable set of characters with O(1) cardinality
#[derive(Clone)]
pub struct CharSet {
    bits: Arc<Bits>,
    weight: usize,
}

impl CharSet {
    fn from_bits(mut bits: Box<Bits>) -> Self {
        for word in &mut bits[SURROGATE_WORDS] {
            *word = 0;
        }
        let weight = bits.iter().map(|word| word.count_ones() as usize).sum();
        Self {
            bits: Arc::from(bits),
            weight,
        }
    }

    fn map_words(&self, other: &CharSet, op: impl Fn(u64, u64) -> u64) -> Self {
        let mut bits = zeroed();
        for (index, word) in bits.iter_mut().enumerate() {
            *word = op(self.bits[index], other.bits[index]);
        }
        Self::from_bits(bits)
    }

    /// The set with no members
    pub fn empty() -> Self {
        Self::from_bits(zeroed())
    }

    /// A set holding one character (empty if the character is outside the universe)
    pub fn single(c: char) -> Self {
        Self::range(c, c)
    }

    /// All characters from `lo` to `hi` inclusive, clipped to the universe
    pub fn range(lo: char, hi: char) -> Self {
        let mut bits = zeroed();
        set_range(&mut bits, lo, hi);
        Self::from_bits(bits)
    }

    pub fn from_chars(chars: impl IntoIterator<Item = char>) -> Self {
        let mut bits = zeroed();
        for c in chars {
            set_range(&mut bits, c, c);
        }
        Self::from_bits(bits)
    }

    /// Every character of the universe accepted by `predicate`
    pub fn from_predicate(predicate: impl Fn(char) -> bool) -> Self {
        Self::from_chars(ANY.iter().filter(|&c| predicate(c)))
    }

    /// Look up a POSIX or `java.lang.Character` property class by name
    ///
    /// Returns `None` for names outside the supported table.
    ///
    /// The `java*` and `Is*` properties are built from the Unicode tables of
    /// the Rust standard library (`char::is_lowercase` and friends). Those
    /// track a newer Unicode version than a given JDK does, so membership can
    /// differ from `java.util.regex` for characters assigned in between. A
    /// generated character may then be rejected by an older JVM matcher.
    pub fn named(name: &str) -> Option<Self> {
        let set = match name {
            "Lower" => Self::range('a', 'z'),
            "Upper" => Self::range('A', 'Z'),
            "ASCII" => Self::range('\0', '\u{7F}'),
            "Alpha" => CharSetBuilder::new()
                .range('a', 'z')
                .range('A', 'Z')
                .build(),
            "Digit" => DIGIT.clone(),
            "Alnum" => ALPHANUMERIC.clone(),
            "Punct" => Self::from_predicate(|c| c.is_ascii_punctuation()),
            "Graph" => Self::from_predicate(|c| c.is_ascii_graphic()),
            "Print" => Self::range(' ', '~'),
            "Blank" => Self::from_chars([' ', '\t']),
            "Cntrl" => CharSetBuilder::new()
                .range('\0', '\u{1F}')
                .single('\u{7F}')
                .build(),
            "XDigit" => Self::from_predicate(|c| c.is_ascii_hexdigit()),
            "Space" => SPACE.clone(),
            "javaLowerCase" | "IsLowercase" => Self::from_predicate(char::is_lowercase),
            "javaUpperCase" | "IsUppercase" => Self::from_predicate(char::is_uppercase),
            "javaWhitespace" => Self::from_predicate(is_java_whitespace),
            "IsAlphabetic" => Self::from_predicate(char::is_alphabetic),
            "IsWhite_Space" | "IsWhiteSpace" => Self::from_predicate(char::is_whitespace),
            _ => return None,
        };
        Some(set)
    }

    pub fn union(&self, other: &CharSet) -> CharSet {
        self.map_words(other, |a, b| a | b)
    }

    pub fn intersect(&self, other: &CharSet) -> CharSet {
        self.map_words(other, |a, b| a & b)
    }

    /// Complement within the universe; `negate` twice is the identity
    pub fn negate(&self) -> CharSet {
        let mut bits = zeroed();
        for (index, word) in bits.iter_mut().enumerate() {
            *word = !self.bits[index];
        }
        Self::from_bits(bits)
    }

    /// Add the opposite-case form of every member
    pub fn case_closure(&self, folding: CaseFolding) -> CharSet {
        if folding == CaseFolding::None {
            return self.clone();
        }
        let mut bits = Box::new(*self.bits);
        for c in self.iter() {
            for variant in case_variants(c, folding).into_iter().flatten() {
                set_range(&mut bits, variant, variant);
            }
        }
        Self::from_bits(bits)
    }

    /// Number of members
    pub fn weight(&self) -> usize {
        self.weight
    }

    pub fn is_empty(&self) -> bool {
        self.weight == 0
    }

    pub fn contains(&self, c: char) -> bool {
        let code = c as usize;
        in_universe(c) && self.bits[code / 64] & (1 << (code % 64)) != 0
    }

    /// The member with ordinal `k` in code point order
    pub fn nth(&self, mut k: usize) -> Option<char> {
        if k >= self.weight {
            return None;
        }
        for (index, &word) in self.bits.iter().enumerate() {
            let ones = word.count_ones() as usize;
            if k < ones {
                let bit = BitIter(word).nth(k)?;
                return char::from_u32((index * 64 + bit) as u32);
            }
            k -= ones;
        }
        None
    }

    /// Pick the member with ordinal `|seed| mod weight`
    pub fn sample(&self, seed: i64) -> Result<char, GenerationError> {
        if self.weight == 0 {
            return Err(GenerationError::EmptyCharSet);
        }
        let k = (seed.unsigned_abs() % self.weight as u64) as usize;
        self.nth(k).ok_or(GenerationError::EmptyCharSet)
    }

    /// Members in code point order
    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.bits.iter().enumerate().flat_map(|(index, &word)| {
            BitIter(word).filter_map(move |bit| char::from_u32((index * 64 + bit) as u32))
        })
    }

    /// Maximal runs of consecutive members as inclusive `(lo, hi)` pairs
    pub fn ranges(&self) -> Vec<(char, char)> {
        let mut ranges: Vec<(char, char)> = Vec::new();
        for c in self.iter() {
            match ranges.last_mut() {
                Some((_, hi)) if *hi as u32 + 1 == c as u32 => *hi = c,
                _ => ranges.push((c, c)),
            }
        }
        ranges
    }
}

impl PartialEq for CharSet {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bits, &other.bits)
            || (self.weight == other.weight && self.bits[..] == other.bits[..])
    }
}

impl Eq for CharSet {}

impl Hash for CharSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits[..].hash(state);
    }
}

impl fmt::Debug for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CharSet({}, weight = {})", self, self.weight)
    }
}

impl fmt::Display for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weight == UNIVERSE_SIZE {
            return f.write_str("[\\x00-\\uffff]");
        }
        if self.weight == 0 {
            return f.write_str("[^\\x00-\\uffff]");
        }
        let negated = self.weight * 2 > UNIVERSE_SIZE;
        let ranges = if negated {
            self.negate().ranges()
        } else {
            self.ranges()
        };
        f.write_str(if negated { "[^" } else { "[" })?;
        for (lo, hi) in ranges {
            write_class_char(f, lo)?;
            if hi != lo {
                if hi as u32 > lo as u32 + 1 {
                    f.write_str("-")?;
                }
                write_class_char(f, hi)?;
            }
        }
        f.write_str("]")
    }
}

/// Incremental construction of a [`CharSet`]
///
/// Case folding applies to the characters and ranges listed explicitly, not
/// to sets merged with [`CharSetBuilder::union`]. Folding happens before
/// negation, so `[^a]` under case-insensitivity excludes both `a` and `A`.
#[derive(Debug, Clone)]
pub struct CharSetBuilder {
    bits: Box<Bits>,
    folding: CaseFolding,
    negated: bool,
}

impl CharSetBuilder {
    pub fn new() -> Self {
        Self::with_folding(CaseFolding::None)
    }

    pub fn with_folding(folding: CaseFolding) -> Self {
        Self {
            bits: zeroed(),
            folding,
            negated: false,
        }
    }

    pub fn single(&mut self, c: char) -> &mut Self {
        self.range(c, c)
    }

    pub fn range(&mut self, lo: char, hi: char) -> &mut Self {
        if self.folding == CaseFolding::None {
            set_range(&mut self.bits, lo, hi);
        } else {
            let folded = CharSet::range(lo, hi).case_closure(self.folding);
            self.union(&folded);
        }
        self
    }

    pub fn union(&mut self, set: &CharSet) -> &mut Self {
        for (word, other) in self.bits.iter_mut().zip(set.bits.iter()) {
            *word |= other;
        }
        self
    }

    pub fn intersect(&mut self, set: &CharSet) -> &mut Self {
        for (word, other) in self.bits.iter_mut().zip(set.bits.iter()) {
            *word &= other;
        }
        self
    }

    /// Toggle complementation of the finished set
    pub fn negate(&mut self) -> &mut Self {
        self.negated = !self.negated;
        self
    }

    pub fn build(&self) -> CharSet {
        let set = CharSet::from_bits(self.bits.clone());
        if self.negated { set.negate() } else { set }
    }
}

impl Default for CharSetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct BitIter(u64);

impl Iterator for BitIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let bit = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

fn zeroed() -> Box<Bits> {
    Box::new([0; WORDS])
}

fn set_range(bits: &mut Bits, lo: char, hi: char) {
    let hi = hi.min(UNIVERSE_MAX) as usize;
    for code in lo as usize..=hi {
        bits[code / 64] |= 1 << (code % 64);
    }
}

fn single_mapping(mut mapped: impl Iterator<Item = char>) -> Option<char> {
    let first = mapped.next()?;
    (mapped.next().is_none() && in_universe(first)).then_some(first)
}

fn case_variants(c: char, folding: CaseFolding) -> [Option<char>; 2] {
    match folding {
        CaseFolding::None => [None, None],
        CaseFolding::Ascii if c.is_ascii_alphabetic() => {
            [Some(c.to_ascii_lowercase()), Some(c.to_ascii_uppercase())]
        }
        CaseFolding::Ascii => [None, None],
        CaseFolding::Unicode => [
            single_mapping(c.to_lowercase()),
            single_mapping(c.to_uppercase()),
        ],
    }
}

fn is_java_whitespace(c: char) -> bool {
    match c {
        '\u{A0}' | '\u{2007}' | '\u{202F}' | '\u{85}' => false,
        '\u{1C}'..='\u{1F}' => true,
        c => c.is_whitespace(),
    }
}

fn write_class_char(f: &mut fmt::Formatter<'_>, c: char) -> fmt::Result {
    match c {
        '\\' | '[' | ']' | '^' | '-' | '&' => write!(f, "\\{}", c),
        '\n' => f.write_str("\\n"),
        '\r' => f.write_str("\\r"),
        '\t' => f.write_str("\\t"),
        c if c == ' ' || c.is_ascii_graphic() => write!(f, "{}", c),
        c if (c as u32) <= 0xFF => write!(f, "\\x{:02x}", c as u32),
        c => write!(f, "\\u{:04x}", c as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universe_excludes_surrogates() {
        assert_eq!(ANY.weight(), UNIVERSE_SIZE);
        assert!(ANY.contains('\u{D7FF}'));
        assert!(ANY.contains('\u{E000}'));
        assert!(!ANY.contains('\u{1F600}'));
        assert_eq!(CharSet::range('\u{D000}', '\u{E0FF}').weight(), 0x1100 - 0x800);
    }

    #[test]
    fn test_basic_construction() {
        let lower = CharSet::range('a', 'z');
        assert_eq!(lower.weight(), 26);
        assert!(lower.contains('m'));
        assert!(!lower.contains('M'));
        assert!(CharSet::range('z', 'a').is_empty());
        assert_eq!(CharSet::single('x').weight(), 1);
        assert!(CharSet::single('\u{1F600}').is_empty());
    }

    #[test]
    fn test_structural_equality() {
        let by_range = CharSet::range('a', 'c');
        let by_chars = CharSet::from_chars("cab".chars());
        assert_eq!(by_range, by_chars);

        let mut builder = CharSetBuilder::new();
        builder.single('a').range('b', 'c');
        assert_eq!(builder.build(), by_range);
    }

    #[test]
    fn test_union_intersect() {
        let letters = CharSet::range('a', 'f');
        let hex = CharSet::from_predicate(|c| c.is_ascii_hexdigit());
        assert_eq!(letters.intersect(&hex), CharSet::range('a', 'f'));
        assert_eq!(letters.union(&DIGIT).weight(), 16);
        assert!(letters.intersect(&DIGIT).is_empty());
    }

    #[test]
    fn test_negation_is_involution() {
        let sets = [
            CharSet::range('a', 'z'),
            CharSet::empty(),
            ANY.clone(),
            SPACE.clone(),
            CharSet::single('\u{FFFF}'),
        ];
        for set in sets {
            let twice = set.negate().negate();
            assert_eq!(twice, set);
            for seed in [-7i64, 0, 1, 42, i64::MAX, i64::MIN] {
                assert_eq!(twice.sample(seed), set.sample(seed));
            }
        }
    }

    #[test]
    fn test_negate_weight() {
        let set = CharSet::range('a', 'z');
        assert_eq!(set.negate().weight(), UNIVERSE_SIZE - 26);
        assert!(!set.negate().contains('q'));
        assert!(set.negate().contains('Q'));
    }

    #[test]
    fn test_sample_selects_ordinal() {
        let set = CharSet::from_chars(['b', 'd', 'f']);
        assert_eq!(set.sample(0), Ok('b'));
        assert_eq!(set.sample(1), Ok('d'));
        assert_eq!(set.sample(5), Ok('f'));
        assert_eq!(set.sample(-4), Ok('d'));
        assert_eq!(set.sample(i64::MIN), set.sample(i64::MIN));
    }

    #[test]
    fn test_sample_empty_fails() {
        assert_eq!(
            CharSet::empty().sample(3),
            Err(GenerationError::EmptyCharSet)
        );
    }

    #[test]
    fn test_nth_across_words() {
        let set = CharSet::from_chars(['\u{1}', '\u{100}', '\u{FFFF}']);
        assert_eq!(set.nth(0), Some('\u{1}'));
        assert_eq!(set.nth(1), Some('\u{100}'));
        assert_eq!(set.nth(2), Some('\u{FFFF}'));
        assert_eq!(set.nth(3), None);
    }

    #[test]
    fn test_case_closure_ascii() {
        let set = CharSet::range('a', 'c').case_closure(CaseFolding::Ascii);
        assert_eq!(set, CharSet::from_chars("abcABC".chars()));

        let greek = CharSet::single('\u{3B1}').case_closure(CaseFolding::Ascii);
        assert_eq!(greek.weight(), 1);
    }

    #[test]
    fn test_case_closure_unicode() {
        let greek = CharSet::single('\u{3B1}').case_closure(CaseFolding::Unicode);
        assert!(greek.contains('\u{391}'));
        assert_eq!(greek.weight(), 2);
    }

    #[test]
    fn test_closure_happens_before_negation() {
        let mut builder = CharSetBuilder::with_folding(CaseFolding::Ascii);
        builder.single('a').negate();
        let set = builder.build();
        assert!(!set.contains('a'));
        assert!(!set.contains('A'));
        assert_eq!(set.weight(), UNIVERSE_SIZE - 2);

        let other_order = CharSet::single('a')
            .negate()
            .case_closure(CaseFolding::Ascii);
        assert_ne!(set, other_order);
    }

    #[test]
    fn test_folding_skips_merged_sets() {
        let mut builder = CharSetBuilder::with_folding(CaseFolding::Ascii);
        builder.single('q').union(&CharSet::range('a', 'c'));
        let set = builder.build();
        assert!(set.contains('Q'));
        assert!(!set.contains('B'));
        assert_eq!(set.weight(), 5);
    }

    #[test]
    fn test_builder_intersect() {
        let mut builder = CharSetBuilder::new();
        builder.range('a', 'z').intersect(&CharSet::from_chars("aeiouxyz".chars()));
        assert_eq!(builder.build().weight(), 8);
    }

    #[test]
    fn test_named_classes() {
        assert_eq!(CharSet::named("Lower").unwrap().weight(), 26);
        assert_eq!(CharSet::named("XDigit").unwrap().weight(), 22);
        assert_eq!(CharSet::named("Punct").unwrap().weight(), 32);
        assert_eq!(CharSet::named("Print").unwrap().weight(), 95);
        assert_eq!(CharSet::named("Cntrl").unwrap().weight(), 33);
        assert!(CharSet::named("javaWhitespace").unwrap().contains('\u{1F}'));
        assert!(!CharSet::named("javaWhitespace").unwrap().contains('\u{A0}'));
        assert!(CharSet::named("Greek").is_none());
    }

    #[test]
    fn test_unicode_properties_follow_std_tables() {
        let lower = CharSet::named("javaLowerCase").unwrap();
        assert!(lower.contains('\u{E9}'));
        assert!(!lower.contains('\u{C9}'));
        assert_eq!(lower, CharSet::named("IsLowercase").unwrap());
        assert_eq!(lower, CharSet::from_predicate(char::is_lowercase));

        let white = CharSet::named("IsWhite_Space").unwrap();
        assert!(white.contains('\u{2028}'));
        assert!(white.contains('\u{A0}'));
        assert_eq!(white, CharSet::named("IsWhiteSpace").unwrap());
    }

    #[test]
    fn test_predefined_sets() {
        assert_eq!(WORD.weight(), 63);
        assert_eq!(SPACE.weight(), 6);
        assert_eq!(VERTICAL_SPACE.weight(), 7);
        assert_eq!(HORIZONTAL_SPACE.weight(), 19);
        assert_eq!(ANY_EXCEPT_NEWLINE.weight(), UNIVERSE_SIZE - 1);
        assert_eq!(ANY_EXCEPT_LINE_TERMINATORS.weight(), UNIVERSE_SIZE - 5);
    }

    #[test]
    fn test_ranges_and_display() {
        let set = CharSetBuilder::new()
            .range('a', 'c')
            .single('x')
            .single('-')
            .range('0', '1')
            .build();
        assert_eq!(set.ranges(), vec![('-', '-'), ('0', '1'), ('a', 'c'), ('x', 'x')]);
        assert_eq!(set.to_string(), "[\\-01a-cx]");
        assert_eq!(CharSet::single('\n').negate().to_string(), "[^\\n]");
        assert_eq!(ANY.to_string(), "[\\x00-\\uffff]");
    }
}

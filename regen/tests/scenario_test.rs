use regen::{CompileError, Flags, Pattern, compile, generate, generate_sized};

const UUID: &str =
    "[0-9a-f]{8}-[0-9a-f]{4}-[0-5][0-9a-f]{3}-[089ab][0-9a-f]{3}-[0-9a-f]{12}";

#[test]
fn test_uuid_pattern() {
    let pattern = compile(UUID, Flags::NONE).unwrap();
    assert_eq!(pattern.min_length(), 36);

    for seed in -100..100 {
        let value = generate(&pattern, seed).unwrap();
        assert_eq!(value.len(), 36);

        let groups: Vec<&str> = value.split('-').collect();
        let widths: Vec<usize> = groups.iter().map(|group| group.len()).collect();
        assert_eq!(widths, vec![8, 4, 4, 4, 12]);
        assert!(
            groups
                .iter()
                .all(|group| group.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()))
        );
        assert!(u128::from_str_radix(&groups.concat(), 16).is_ok());
        assert!(('0'..='5').contains(&groups[2].chars().next().unwrap()));
        assert!("089ab".contains(groups[3].chars().next().unwrap()));
    }
}

#[test]
fn test_quoted_literal() {
    let pattern = compile("\\Qa.b\\E", Flags::NONE).unwrap();
    for seed in -20..20 {
        assert_eq!(generate(&pattern, seed).unwrap(), "a.b");
        assert_eq!(generate_sized(&pattern, seed, 0).unwrap(), "a.b");
    }
}

#[test]
fn test_backreference_repeats_choice() {
    let pattern = compile("(a|b|c)\\1", Flags::NONE).unwrap();
    let mut seen = std::collections::HashSet::new();
    for seed in 0..100 {
        let value = generate(&pattern, seed).unwrap();
        let chars: Vec<char> = value.chars().collect();
        assert_eq!(chars.len(), 2);
        assert_eq!(chars[0], chars[1]);
        assert!("abc".contains(chars[0]));
        seen.insert(chars[0]);
    }
    assert_eq!(seen.len(), 3);
}

#[test]
fn test_unbounded_lookahead_is_unsupported() {
    let error = compile("(?!.{255,}).+", Flags::NONE).unwrap_err();
    assert!(error.is_unsupported(), "{}", error);
    assert!(matches!(error, CompileError::Unsupported { position: 0, .. }));
}

#[test]
fn test_bounded_lookahead_is_zero_width() {
    let pattern = compile("(?=[a-z]{3})[a-z]{3}[0-9]", Flags::NONE).unwrap();
    assert_eq!(pattern.min_length(), 4);
    for seed in 0..20 {
        assert_eq!(generate(&pattern, seed).unwrap().len(), 4);
    }
}

#[test]
fn test_named_groups_and_backreferences() {
    let pattern: Pattern = "(?<tag>[a-z]{1,5})=\\k<tag>;\\1".parse().unwrap();
    for seed in 0..50 {
        let value = generate(&pattern, seed).unwrap();
        let (tag, rest) = value.split_once('=').unwrap();
        let (named, numbered) = rest.split_once(';').unwrap();
        assert_eq!(tag, named);
        assert_eq!(tag, numbered);
    }
}

#[test]
fn test_syntax_errors_carry_position() {
    let cases = [
        ("(ab", 3),
        ("ab)", 2),
        ("[a-", 3),
        ("a{3,1}", 1),
        ("*a", 0),
    ];
    for (source, position) in cases {
        let error = compile(source, Flags::NONE).unwrap_err();
        assert!(error.is_syntax(), "{:?}: {}", source, error);
        assert_eq!(error.position(), position, "{:?}: {}", source, error);
        assert_eq!(error.pattern(), source);
    }
}

#[test]
fn test_unsupported_constructs() {
    for source in ["\\Gabc", "a\\X", "(?<=a*)b", "\\N{LATIN SMALL LETTER A}", "\\p{InGreek}"] {
        let error = compile(source, Flags::NONE).unwrap_err();
        assert!(error.is_unsupported(), "{:?}: {}", source, error);
    }
}

#[test]
fn test_impossible_class_generation() {
    let pattern = compile("[^\\s\\S]?a(b|[a&&c])", Flags::NONE).unwrap();
    assert_eq!(pattern.min_length(), 2);
    for seed in -20..20 {
        assert_eq!(generate(&pattern, seed).unwrap(), "ab");
        assert_eq!(generate_sized(&pattern, seed, 10).unwrap(), "ab");
        assert_eq!(pattern.shrink(seed, "ab").count(), 0);
    }

    let error = compile("a[a&&b]", Flags::NONE).unwrap_err();
    assert!(error.is_unsupported(), "{}", error);
    assert_eq!(error.position(), 1);
}

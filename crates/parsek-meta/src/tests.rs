use indoc::indoc;
use parsek_core::{ClauseKind, Expr, GrammarBuilder};

use crate::{bpeg, canonical, unparse};

#[test]
fn canonical_parses_a_literal_sequence() {
    let grammar = canonical::parse(r#"top <- "a" "b" "c""#).unwrap();
    let ClauseKind::Sequence(xs) = grammar.kind(body_of(&grammar)) else {
        panic!("expected a Sequence body");
    };
    assert_eq!(xs.len(), 3);
}

#[test]
fn canonical_choice_tries_alternatives_in_order() {
    let grammar = canonical::parse(r#"r <- "a" / "ab""#).unwrap();
    let ClauseKind::Choice(xs) = grammar.kind(body_of(&grammar)) else {
        panic!("expected a Choice body");
    };
    assert_eq!(xs.len(), 2);
}

#[test]
fn canonical_quantifiers_desugar_through_the_builder() {
    let grammar = canonical::parse(r#"r <- "a"? "b"* "c"+"#).unwrap();
    let ClauseKind::Sequence(xs) = grammar.kind(body_of(&grammar)) else {
        panic!("expected a Sequence body");
    };
    assert_eq!(xs.len(), 3);
    // `?` and `*` both desugar to Choice(_, Empty); `+` stays a bare Repeat.
    assert!(matches!(grammar.kind(xs[0]), ClauseKind::Choice(_)));
    assert!(matches!(grammar.kind(xs[1]), ClauseKind::Choice(_)));
    assert!(matches!(grammar.kind(xs[2]), ClauseKind::Repeat(_)));
}

#[test]
fn canonical_char_class_with_range_and_literal_escape() {
    let grammar = canonical::parse(r#"r <- [a-z\-]"#).unwrap();
    let ClauseKind::Choice(xs) = grammar.kind(body_of(&grammar)) else {
        panic!("expected a Choice body");
    };
    assert_eq!(xs.len(), 2);
    assert!(matches!(grammar.kind(xs[0]), ClauseKind::Range('a', 'z')));
    assert!(matches!(grammar.kind(xs[1]), ClauseKind::Value(v) if v == &vec!['-']));
}

#[test]
fn canonical_single_range_class_is_not_wrapped_in_a_choice() {
    let grammar = canonical::parse(r#"r <- [0-9]"#).unwrap();
    assert!(matches!(grammar.kind(body_of(&grammar)), ClauseKind::Range('0', '9')));
}

#[test]
fn canonical_cut_and_predicates() {
    let grammar = canonical::parse(r#"p <- "(" ~ [a-z]+ !"x" ")""#).unwrap();
    let ClauseKind::Sequence(xs) = grammar.kind(body_of(&grammar)) else {
        panic!("expected a Sequence body");
    };
    assert_eq!(xs.len(), 4);
    assert!(matches!(grammar.kind(xs[1]), ClauseKind::Entail(_)));
    assert!(matches!(grammar.kind(xs[2]), ClauseKind::Not(_)));
}

#[test]
fn canonical_capture_and_action() {
    let grammar = canonical::parse(r#"integer <- digits=[0-9]+ { int(digits) }"#).unwrap();
    let ClauseKind::Transform(inner, token) = grammar.kind(body_of(&grammar)) else {
        panic!("expected a Transform body");
    };
    assert_eq!(grammar.name_str(token.0), "int(digits)");
    assert!(matches!(grammar.kind(*inner), ClauseKind::Capture(_, _, false)));
}

#[test]
fn canonical_variadic_capture() {
    let grammar = canonical::parse(r#"list <- *item="a""#).unwrap();
    let ClauseKind::Capture(_, _, variadic) = grammar.kind(body_of(&grammar)) else {
        panic!("expected a Capture body");
    };
    assert!(variadic);
}

#[test]
fn canonical_comments_are_ignored() {
    let src = indoc! {"
        # a line comment
        top <- \"a\" # trailing comment
    "};
    let grammar = canonical::parse(src).unwrap();
    assert!(matches!(grammar.kind(body_of(&grammar)), ClauseKind::Value(_)));
}

#[test]
fn bpeg_parses_cases_with_actions() {
    let src = indoc! {"
        digit:
        | \"0\" { zero }
        | \"1\" { one }
    "};
    let grammar = bpeg::parse(src).unwrap();
    let ClauseKind::Choice(xs) = grammar.kind(body_of(&grammar)) else {
        panic!("expected a Choice body");
    };
    assert_eq!(xs.len(), 2);
    assert!(xs.iter().all(|&x| matches!(grammar.kind(x), ClauseKind::Transform(_, _))));
}

#[test]
fn bpeg_optional_and_range_sugar() {
    let grammar = bpeg::parse("digit:\n| [\"-\"] \"0\" - \"9\"\n").unwrap();
    let ClauseKind::Sequence(xs) = grammar.kind(body_of(&grammar)) else {
        panic!("expected a Sequence body");
    };
    assert!(matches!(grammar.kind(xs[0]), ClauseKind::Choice(_)));
    assert!(matches!(grammar.kind(xs[1]), ClauseKind::Range('0', '9')));
}

#[test]
fn bpeg_delimited_literal_desugars_to_scan_until_close() {
    let grammar = bpeg::parse(r#"comment:
| "/*" :: "*/"
"#)
    .unwrap();
    let ClauseKind::Sequence(xs) = grammar.kind(body_of(&grammar)) else {
        panic!("expected a Sequence body");
    };
    assert_eq!(xs.len(), 3);
    assert!(matches!(grammar.kind(xs[0]), ClauseKind::Value(v) if v == &vec!['/', '*']));
    assert!(matches!(grammar.kind(xs[2]), ClauseKind::Value(v) if v == &vec!['*', '/']));
}

#[test]
fn left_recursive_arithmetic_round_trips_through_canonical_unparse() {
    let src = indoc! {"
        factor <- [0-9]+
        term <- term \"*\" factor / factor
        expr <- expr \"+\" term / term
    "};
    let grammar = canonical::parse(src).unwrap();
    let rendered = unparse::to_canonical(&grammar);
    let reparsed = canonical::parse(&rendered).unwrap();
    assert!(grammar.equal_to(&reparsed));
}

#[test]
fn unparse_matches_a_hand_built_grammar() {
    let mut b = GrammarBuilder::new();
    b.rule(
        "r",
        Expr::Sequence(vec![Expr::Value(vec!['a']), Expr::Value(vec!['b'])]),
    );
    let built = b.build().unwrap();

    let rendered = unparse::to_canonical(&built);
    let reparsed = canonical::parse(&rendered).unwrap();
    assert!(built.equal_to(&reparsed));
}

fn body_of(grammar: &parsek_core::Grammar) -> parsek_core::ClauseId {
    let ClauseKind::Rule(_, body) = grammar.kind(grammar.entry()) else {
        panic!("entry clause is not a Rule");
    };
    *body
}

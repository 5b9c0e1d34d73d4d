use super::*;

fn lit(s: &str) -> Expr {
    Expr::Value(s.chars().collect())
}

#[test]
fn build_simple_grammar() {
    let mut b = GrammarBuilder::new();
    b.rule("top", lit("ok"));
    let g = b.build().unwrap();

    assert_eq!(g.name_str(g.rule_name(g.entry()).unwrap()), "top");
}

#[test]
fn duplicate_rule_is_rejected() {
    let mut b = GrammarBuilder::new();
    b.rule("top", Expr::Empty);
    b.rule("top", Expr::Empty);
    let err = b.build().unwrap_err();
    assert_eq!(err, GrammarError::DuplicateRule("top".into()));
}

#[test]
fn unknown_reference_is_rejected() {
    let mut b = GrammarBuilder::new();
    b.rule("top", Expr::Reference("missing".into()));
    let err = b.build().unwrap_err();
    assert_eq!(err, GrammarError::UnknownRule("missing".into()));
}

#[test]
fn empty_grammar_is_rejected() {
    let b = GrammarBuilder::new();
    assert_eq!(b.build().unwrap_err(), GrammarError::Empty);
}

#[test]
fn star_desugars_to_choice_of_repeat_and_empty() {
    let mut b = GrammarBuilder::new();
    b.rule("top", Expr::Star(Box::new(lit("a"))));
    let g = b.build().unwrap();

    let top_body = match g.kind(g.entry()) {
        ClauseKind::Rule(_, body) => *body,
        _ => unreachable!(),
    };
    match g.kind(top_body) {
        ClauseKind::Choice(xs) => {
            assert_eq!(xs.len(), 2);
            assert!(matches!(g.kind(xs[0]), ClauseKind::Repeat(_)));
            assert!(matches!(g.kind(xs[1]), ClauseKind::Empty));
        }
        other => panic!("expected Choice, got {other:?}"),
    }
}

#[test]
fn optional_desugars_to_choice_with_empty() {
    let mut b = GrammarBuilder::new();
    b.rule("top", Expr::Optional(Box::new(lit("a"))));
    let g = b.build().unwrap();

    let top_body = match g.kind(g.entry()) {
        ClauseKind::Rule(_, body) => *body,
        _ => unreachable!(),
    };
    assert!(matches!(g.kind(top_body), ClauseKind::Choice(xs) if xs.len() == 2));
}

#[test]
fn nullable_propagates_through_sequence_and_choice() {
    let mut b = GrammarBuilder::new();
    b.rule(
        "top",
        Expr::Sequence(vec![Expr::Optional(Box::new(lit("a"))), Expr::Empty]),
    );
    let g = b.build().unwrap();
    assert!(g.nullable(g.entry()));
}

#[test]
fn non_nullable_value_blocks_sequence() {
    let mut b = GrammarBuilder::new();
    b.rule("top", Expr::Sequence(vec![lit("a"), Expr::Empty]));
    let g = b.build().unwrap();
    assert!(!g.nullable(g.entry()));
}

#[test]
fn left_recursive_rule_is_flagged_by_seeds() {
    let mut b = GrammarBuilder::new();
    // top <- top "a" / "a"
    b.rule(
        "top",
        Expr::Choice(vec![
            Expr::Sequence(vec![Expr::Reference("top".into()), lit("a")]),
            lit("a"),
        ]),
    );
    let g = b.build().unwrap();
    let top_name = g.rule_name(g.entry()).unwrap();
    assert!(g.seeds(top_name));
}

#[test]
fn non_recursive_rule_is_not_flagged_by_seeds() {
    let mut b = GrammarBuilder::new();
    b.rule("top", lit("a"));
    let g = b.build().unwrap();
    let top_name = g.rule_name(g.entry()).unwrap();
    assert!(!g.seeds(top_name));
}

#[test]
fn equal_to_ignores_arena_layout() {
    let mut b1 = GrammarBuilder::new();
    b1.rule("top", Expr::Sequence(vec![lit("a"), lit("b")]));
    b1.rule("decoy", Expr::Empty);
    let g1 = b1.build().unwrap();

    let mut b2 = GrammarBuilder::new();
    // Same two rules, inserted in the opposite order, so every clause ends up
    // at a different arena index; structure is still the same.
    b2.rule("decoy", Expr::Empty);
    b2.rule("top", Expr::Sequence(vec![lit("a"), lit("b")]));
    let g2 = b2.build_with_entry("top".into()).unwrap();

    assert!(g1.equal_to(&g2));
}

#[test]
fn equal_to_detects_structural_difference() {
    let mut b1 = GrammarBuilder::new();
    b1.rule("top", lit("a"));
    let g1 = b1.build().unwrap();

    let mut b2 = GrammarBuilder::new();
    b2.rule("top", lit("b"));
    let g2 = b2.build().unwrap();

    assert!(!g1.equal_to(&g2));
}

#[test]
fn captures_and_transform_round_trip_through_lowering() {
    let mut b = GrammarBuilder::new();
    b.rule(
        "top",
        Expr::Transform(
            Box::new(Expr::Capture(Box::new(lit("a")), "x".into(), false)),
            "make_value".into(),
        ),
    );
    let g = b.build().unwrap();
    let top_body = match g.kind(g.entry()) {
        ClauseKind::Rule(_, body) => *body,
        _ => unreachable!(),
    };
    match g.kind(top_body) {
        ClauseKind::Transform(inner, _) => {
            assert!(matches!(g.kind(*inner), ClauseKind::Capture(_, _, false)));
        }
        other => panic!("expected Transform, got {other:?}"),
    }
}

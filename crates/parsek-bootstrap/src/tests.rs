use indoc::indoc;

use crate::host::parse_and_reconstruct;
use crate::seed::{SEED_TEXT, seed_grammar};
use crate::{bootstrap, self_host};
use parsek_core::Expr;

#[test]
fn seed_reconstructs_a_small_hand_authored_grammar() {
    let seed = seed_grammar();
    let text = indoc! {r#"
        greeting <- "hello" ws name
        name <- "world" / "there"
    "#}
    .trim_end();

    let rules = parse_and_reconstruct(&seed, text).expect("seed should validate and reconstruct");
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].0, "greeting");
    assert_eq!(rules[1].0, "name");

    match &rules[1].1 {
        Expr::Choice(alts) => assert_eq!(alts.len(), 2),
        other => panic!("expected a Choice, got {other:?}"),
    }
}

#[test]
fn seed_accepts_leading_and_trailing_whitespace() {
    let seed = seed_grammar();
    assert!(parse_and_reconstruct(&seed, " greeting <- \"hi\"\n").is_ok());
}

#[test]
fn quantifier_suffix_must_be_adjacent_to_its_primary() {
    let seed = seed_grammar();
    let rules = parse_and_reconstruct(&seed, "r <- \"a\"+").expect("plus suffix should parse");
    match &rules[0].1 {
        Expr::Repeat(inner) => assert!(matches!(**inner, Expr::Value(_))),
        other => panic!("expected a Repeat, got {other:?}"),
    }

    assert!(parse_and_reconstruct(&seed, "r <- \"a\" +").is_err());
}

#[test]
fn seed_reconstructs_an_action_tagged_sequence() {
    let seed = seed_grammar();
    let rules = parse_and_reconstruct(&seed, "r <- a=\"x\" b=\"y\" {pair}").expect("action-tagged rule should parse");
    match &rules[0].1 {
        Expr::Transform(_, token) => assert_eq!(token, "pair"),
        other => panic!("expected a Transform, got {other:?}"),
    }
}

#[test]
fn bootstrap_converges_on_the_seed_grammars_own_description() {
    // SEED_TEXT describes the very productions `seed_grammar` builds by
    // hand, so parsing it with itself is already a fixed point: the first
    // richer-text pass reproduces the grammar the minimal pass built.
    let grammar = bootstrap(SEED_TEXT, SEED_TEXT).expect("the seed's own description should converge immediately");
    let name = grammar.rule_name(grammar.entry()).expect("entry is a Rule");
    assert_eq!(grammar.name_str(name), "grammar");
    assert_eq!(grammar.rules().count(), 10);
}

#[test]
fn bootstrap_fails_when_minimal_text_cannot_parse_richer_text() {
    // A minimal grammar that only describes a one-off target language (not a
    // grammar-describing language) can't serve as the parser richer_text's
    // iteration needs -- the loop now wires the derived grammar back in as
    // that parser, so this surfaces as a parse failure, not a silent no-op.
    let err = bootstrap("start <- \"x\"", SEED_TEXT).unwrap_err();
    assert!(matches!(err, crate::BootstrapError::Parse(_)));
}

#[test]
fn bootstrap_surfaces_a_reconstruction_error_on_malformed_text() {
    let err = bootstrap("start <- \"x\"", "start <- ").unwrap_err();
    assert!(matches!(err, crate::BootstrapError::Parse(_) | crate::BootstrapError::Reconstruction(_)));
}

#[test]
fn self_host_accepts_the_seed_grammars_own_description() {
    // The central self-hosting claim: bootstrapping SEED_TEXT from itself
    // and parsing it with parsek_meta's own canonical-dialect parser must
    // land on the same grammar -- the meta-parser and the bootstrap pipeline
    // agree on what this text means.
    self_host(SEED_TEXT).expect("the seed's own description must self-host against the canonical dialect");
}

#[test]
fn self_host_rejects_malformed_text() {
    assert!(self_host("expr <- ").is_err());
}

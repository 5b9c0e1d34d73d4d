use parsek_core::{ActionToken, CaptureName, ClauseKind, Expr, Grammar, GrammarBuilder};

use super::action::{ActionHost, ActionOutcome, ActionScope, evaluate};
use super::error::ParseError;
use super::matcher::Engine;

fn seq(xs: Vec<Expr>) -> Expr {
    Expr::Sequence(xs)
}

fn lit(s: &str) -> Expr {
    Expr::Value(s.chars().collect())
}

fn reference(name: &str) -> Expr {
    Expr::Reference(name.to_string())
}

/// Recovers the `CaptureName` symbol a built grammar assigned to the single
/// `Capture` node directly under its entry rule's `Transform`. The builder
/// doesn't hand capture symbols back at build time, so tests that need one
/// dig it out of the arena instead.
fn entry_capture_name(grammar: &Grammar) -> CaptureName {
    let ClauseKind::Rule(_, body) = grammar.kind(grammar.entry()) else {
        panic!("entry clause is not a Rule");
    };
    let ClauseKind::Transform(child, _) = grammar.kind(*body) else {
        panic!("entry rule's body is not a Transform");
    };
    let ClauseKind::Capture(_, name, _) = grammar.kind(*child) else {
        panic!("entry rule's Transform child is not a Capture");
    };
    *name
}

#[derive(Debug, thiserror::Error)]
#[error("test host error: {0}")]
struct TestHostError(String);

#[test]
fn literal_sequence_matches_full_input() {
    let mut b = GrammarBuilder::new();
    b.rule("top", seq(vec![lit("a"), lit("b"), lit("c")]));
    let grammar = b.build().unwrap();

    let mut engine = Engine::new();
    let m = engine.parse(&grammar, "abc").unwrap();
    assert_eq!(m.span(), (0, 3));
}

#[test]
fn choice_does_not_backtrack_across_a_successful_alternative() {
    // r <- "a" / "ab", input "ab": PEG ordered choice commits to the first
    // alternative that succeeds, so only "a" is consumed and the trailing
    // "b" is left over -- the whole parse fails.
    let mut b = GrammarBuilder::new();
    b.rule("r", Expr::Choice(vec![lit("a"), lit("ab")]));
    let grammar = b.build().unwrap();

    let mut engine = Engine::new();
    let err = engine.parse(&grammar, "ab").unwrap_err();
    match err {
        ParseError::MatchFailed(f) => assert_eq!(f.farthest, 1),
        other => panic!("expected MatchFailed, got {other:?}"),
    }
}

#[test]
fn repeat_with_nullable_body_stops_after_one_non_advancing_iteration() {
    let mut b = GrammarBuilder::new();
    b.rule("top", Expr::Repeat(Box::new(Expr::Empty)));
    let grammar = b.build().unwrap();

    let mut engine = Engine::new();
    let m = engine.parse(&grammar, "").unwrap();
    assert_eq!(m.span(), (0, 0));
    assert_eq!(m.children.len(), 1);
}

#[test]
fn left_recursive_rule_converges_over_full_input() {
    // as <- as as / "a", input "aaaa": grow-the-seed must converge to a
    // match spanning the whole input without looping forever.
    let mut b = GrammarBuilder::new();
    b.rule(
        "as",
        Expr::Choice(vec![seq(vec![reference("as"), reference("as")]), lit("a")]),
    );
    let grammar = b.build().unwrap();

    let mut engine = Engine::new();
    let m = engine.parse(&grammar, "aaaa").unwrap();
    assert_eq!(m.span(), (0, 4));
}

#[test]
fn cut_commits_the_remainder_of_the_enclosing_sequence() {
    // p <- "(" ~ [a-z]+ ")", input "(1)": the cut commits after "(" matches,
    // so the subsequent [a-z]+ failure is reported committed rather than
    // letting a (nonexistent) sibling choice branch be tried.
    let mut b = GrammarBuilder::new();
    b.rule(
        "p",
        seq(vec![
            lit("("),
            Expr::Entail(Box::new(Expr::Repeat(Box::new(Expr::Range('a', 'z'))))),
            lit(")"),
        ]),
    );
    let grammar = b.build().unwrap();

    let mut engine = Engine::new();
    let err = engine.parse(&grammar, "(1)").unwrap_err();
    match err {
        ParseError::CommittedFailure(f) => assert_eq!(f.farthest, 1),
        other => panic!("expected CommittedFailure, got {other:?}"),
    }
}

struct IntHost {
    digits: CaptureName,
}

impl ActionHost for IntHost {
    type Value = i64;
    type Error = TestHostError;

    fn invoke(
        &mut self,
        _token: ActionToken,
        scope: &ActionScope<'_>,
    ) -> Result<ActionOutcome<Self::Value>, Self::Error> {
        let text = scope
            .text(self.digits)
            .ok_or_else(|| TestHostError("missing `digits` capture".to_string()))?;
        let value: i64 = text
            .parse()
            .map_err(|_| TestHostError(format!("not an integer: {text}")))?;
        Ok(ActionOutcome::Value(value))
    }
}

#[test]
fn single_digit_integer_action_produces_its_numeric_value() {
    // integer <- [0-9]+ { int(*) }, input "42" -> action value 42.
    let mut b = GrammarBuilder::new();
    b.rule(
        "integer",
        Expr::Transform(
            Box::new(Expr::Capture(
                Box::new(Expr::Repeat(Box::new(Expr::Range('0', '9')))),
                "digits".to_string(),
                false,
            )),
            "int".to_string(),
        ),
    );
    let grammar = b.build().unwrap();

    let mut engine = Engine::new();
    let m = engine.parse(&grammar, "42").unwrap();

    let digits = entry_capture_name(&grammar);
    let mut host = IntHost { digits };
    let result = evaluate(&grammar, "42", &m, &mut host).unwrap();
    assert_eq!(result, Some(42));
}

/// Minimal standard-precedence arithmetic evaluator over `+ - * /` and
/// unsigned integers, used only to let `ArithHost` re-derive a value from
/// captured source text without depending on the engine's internal capture
/// tree -- the same trick a hand-written expression evaluator would use.
fn eval_arith(input: &str) -> i64 {
    let bytes = input.as_bytes();

    fn number(bytes: &[u8], pos: &mut usize) -> i64 {
        let start = *pos;
        while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
            *pos += 1;
        }
        std::str::from_utf8(&bytes[start..*pos]).unwrap().parse().unwrap()
    }

    fn term(bytes: &[u8], pos: &mut usize) -> i64 {
        let mut value = number(bytes, pos);
        loop {
            match bytes.get(*pos) {
                Some(b'*') => {
                    *pos += 1;
                    value *= number(bytes, pos);
                }
                Some(b'/') => {
                    *pos += 1;
                    value /= number(bytes, pos);
                }
                _ => break,
            }
        }
        value
    }

    let mut pos = 0usize;
    let mut value = term(bytes, &mut pos);
    loop {
        match bytes.get(pos) {
            Some(b'+') => {
                pos += 1;
                value += term(bytes, &mut pos);
            }
            Some(b'-') => {
                pos += 1;
                value -= term(bytes, &mut pos);
            }
            _ => break,
        }
    }
    value
}

struct ArithHost {
    text: CaptureName,
}

impl ActionHost for ArithHost {
    type Value = i64;
    type Error = TestHostError;

    fn invoke(
        &mut self,
        _token: ActionToken,
        scope: &ActionScope<'_>,
    ) -> Result<ActionOutcome<Self::Value>, Self::Error> {
        let text = scope
            .text(self.text)
            .ok_or_else(|| TestHostError("missing `text` capture".to_string()))?;
        Ok(ActionOutcome::Value(eval_arith(text)))
    }
}

#[test]
fn precedence_climbing_left_recursive_arithmetic_computes_expected_value() {
    // factor <- [0-9]+
    // term   <- term "*" factor / term "/" factor / factor
    // expr   <- expr "+" term / expr "-" term / term
    // program <- Transform(Capture(expr, "text"), "compute")
    //
    // Two mutually nested left-recursive rules (term inside expr, and term
    // itself left-recursive) must both converge for "1+2*3" to parse at all.
    let digit = Expr::Repeat(Box::new(Expr::Range('0', '9')));

    let mut b = GrammarBuilder::new();
    b.rule("factor", digit);
    b.rule(
        "term",
        Expr::Choice(vec![
            seq(vec![reference("term"), lit("*"), reference("factor")]),
            seq(vec![reference("term"), lit("/"), reference("factor")]),
            reference("factor"),
        ]),
    );
    b.rule(
        "expr",
        Expr::Choice(vec![
            seq(vec![reference("expr"), lit("+"), reference("term")]),
            seq(vec![reference("expr"), lit("-"), reference("term")]),
            reference("term"),
        ]),
    );
    b.rule(
        "program",
        Expr::Transform(
            Box::new(Expr::Capture(
                Box::new(reference("expr")),
                "text".to_string(),
                false,
            )),
            "compute".to_string(),
        ),
    );
    let grammar = b.build_with_entry("program".to_string()).unwrap();

    let mut engine = Engine::new();
    let input = "1+2*3";
    let m = engine.parse(&grammar, input).unwrap();
    assert_eq!(m.span(), (0, input.len()));

    let text = entry_capture_name(&grammar);
    let mut host = ArithHost { text };
    let result = evaluate(&grammar, input, &m, &mut host).unwrap();
    assert_eq!(result, Some(7));
}

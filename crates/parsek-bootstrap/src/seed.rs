//! The hand-built seed grammar: enough Clause IR, wired by hand through
//! [`parsek_core::GrammarBuilder`], to parse a small rule-definition
//! language -- identifiers, quoted literals (with `\n`/`\t`/`\r`/`\\`/`\"`
//! escapes), single-range character classes (`[a-z]`), parenthesized
//! grouping, `/` choice, `?`/`*`/`+` quantifiers, `!`-negation and `.` (any
//! char), and `name=expr`/`*name=expr` captures wrapping an `{action}` token
//! -- and, by composing each production's own `Capture`/`Transform` nodes,
//! directly build the `(name, Expr)` pairs a described grammar's rules
//! denote.
//!
//! This surface is a deliberate subset of the canonical textual dialect (no
//! multi-item character classes, no cut): every construct it supports
//! parses identically under `parsek_meta::canonical`, which is what lets
//! this micro-language describe its own seed grammar as ordinary text. Every
//! whitespace gap a production needs is written as a `Reference("ws")`, the
//! same node a described text produces when it writes `ws` as a bare item,
//! so a hand-built production and its text-described counterpart reduce to
//! the same `Expr` tree.

use parsek_core::{Expr, Grammar, GrammarBuilder};

fn ws() -> Expr {
    Expr::Star(Box::new(Expr::Choice(vec![
        Expr::Value(vec![' ']),
        Expr::Value(vec!['\n']),
        Expr::Value(vec!['\t']),
        Expr::Value(vec!['\r']),
    ])))
}

fn capture(inner: Expr, name: &str, variadic: bool) -> Expr {
    Expr::Capture(Box::new(inner), name.to_string(), variadic)
}

fn transform(inner: Expr, token: &str) -> Expr {
    Expr::Transform(Box::new(inner), token.to_string())
}

fn reference(name: &str) -> Expr {
    Expr::Reference(name.to_string())
}

fn value(c: char) -> Expr {
    Expr::Value(vec![c])
}

pub fn seed_grammar() -> Grammar {
    let mut b = GrammarBuilder::new();

    b.rule("ws", ws());

    let ident_start = Expr::Choice(vec![Expr::Range('a', 'z'), Expr::Range('A', 'Z'), value('_')]);
    let ident_rest = Expr::Choice(vec![Expr::Range('a', 'z'), Expr::Range('A', 'Z'), Expr::Range('0', '9'), value('_')]);
    b.rule("ident", Expr::Sequence(vec![ident_start, Expr::Star(Box::new(ident_rest))]));

    // Each content char is either a plain char (not a quote or a backslash)
    // or a backslash followed by anything, so a `\"` inside the literal
    // doesn't end it early.
    let lit_char = Expr::Choice(vec![
        Expr::Sequence(vec![
            Expr::Not(Box::new(Expr::Choice(vec![value('"'), value('\\')]))),
            Expr::Any(1),
        ]),
        Expr::Sequence(vec![value('\\'), Expr::Any(1)]),
    ]);
    b.rule("lit", Expr::Sequence(vec![value('"'), Expr::Star(Box::new(lit_char)), value('"')]));

    // A bare identifier only reads as a reference if it isn't the start of
    // the *next* rule -- without this lookahead, `seq`'s trailing-item loop
    // would swallow the following rule's name into this rule's own body.
    let not_next_rule_header = Expr::Not(Box::new(Expr::Sequence(vec![
        reference("ident"),
        reference("ws"),
        value('<'),
        value('-'),
    ])));

    b.rule(
        "primary",
        Expr::Choice(vec![
            transform(
                Expr::Sequence(vec![
                    value('('),
                    reference("ws"),
                    capture(reference("choice"), "inner", false),
                    reference("ws"),
                    value(')'),
                ]),
                "primary_group",
            ),
            transform(
                Expr::Sequence(vec![
                    value('['),
                    capture(Expr::Any(1), "lo", false),
                    value('-'),
                    capture(Expr::Any(1), "hi", false),
                    value(']'),
                ]),
                "primary_range",
            ),
            transform(value('.'), "primary_any"),
            transform(capture(reference("lit"), "text", false), "primary_lit"),
            transform(
                Expr::Sequence(vec![not_next_rule_header, capture(reference("ident"), "name", false)]),
                "primary_ref",
            ),
        ]),
    );

    // The suffix capture's own `Optional` sits inside the `Capture`, not
    // around it -- the same nesting every other capture in this grammar
    // uses (a capture wraps a quantified expression, and an optional suffix
    // is part of what that expression already denotes), which is also the
    // only nesting the surface syntax's `name=quantified` form can produce.
    b.rule(
        "quantified",
        transform(
            Expr::Sequence(vec![
                capture(reference("primary"), "base", false),
                capture(
                    Expr::Optional(Box::new(Expr::Choice(vec![value('?'), value('*'), value('+')]))),
                    "suffix",
                    false,
                ),
            ]),
            "quant",
        ),
    );

    // `!quantified` / `name=quantified` / `*name=quantified` / a bare
    // `quantified`. The negation and capture-name alternatives are tried
    // before the bare form, and each backtracks cleanly when its leading
    // marker (`!`, or an identifier followed by `=`) isn't present.
    // Each alternative carries its own `item` transform (rather than one
    // transform wrapping the whole choice) so this production's shape is one
    // a described grammar's text can reproduce: the surface syntax only ever
    // attaches an action to a single sequence, never to a bare choice.
    b.rule(
        "item",
        Expr::Choice(vec![
            transform(
                Expr::Sequence(vec![value('!'), capture(reference("quantified"), "neg", false)]),
                "item",
            ),
            transform(
                Expr::Sequence(vec![
                    capture(Expr::Optional(Box::new(value('*'))), "star", false),
                    capture(reference("ident"), "name", false),
                    value('='),
                    capture(reference("quantified"), "body", false),
                ]),
                "item",
            ),
            transform(capture(reference("quantified"), "bare", false), "item"),
        ]),
    );

    // A trailing ` {name}` wraps the whole sequence body in a `Transform`
    // carrying that name as its action token -- the only place a described
    // grammar's text can attach an action, same as the canonical dialect's
    // own sequence-level `{action}` suffix.
    b.rule(
        "seq",
        transform(
            Expr::Sequence(vec![
                capture(reference("item"), "first", false),
                Expr::Star(Box::new(Expr::Sequence(vec![
                    reference("ws"),
                    capture(reference("item"), "rest", true),
                ]))),
                Expr::Optional(Box::new(Expr::Sequence(vec![
                    reference("ws"),
                    value('{'),
                    capture(reference("ident"), "action", false),
                    value('}'),
                ]))),
            ]),
            "seq",
        ),
    );

    b.rule(
        "choice",
        transform(
            Expr::Sequence(vec![
                capture(reference("seq"), "first", false),
                Expr::Star(Box::new(Expr::Sequence(vec![
                    reference("ws"),
                    value('/'),
                    reference("ws"),
                    capture(reference("seq"), "alt", true),
                ]))),
            ]),
            "choice",
        ),
    );

    b.rule(
        "rule",
        transform(
            Expr::Sequence(vec![
                capture(reference("ident"), "name", false),
                reference("ws"),
                value('<'),
                value('-'),
                reference("ws"),
                capture(reference("choice"), "body", false),
            ]),
            "rule",
        ),
    );

    b.rule(
        "grammar",
        transform(
            Expr::Sequence(vec![
                reference("ws"),
                capture(reference("rule"), "first", false),
                Expr::Star(Box::new(Expr::Sequence(vec![
                    reference("ws"),
                    capture(reference("rule"), "rest", true),
                ]))),
                reference("ws"),
            ]),
            "grammar",
        ),
    );

    b.build_with_entry("grammar".to_string())
        .expect("hand-built seed grammar is well formed")
}

/// The seed grammar's own ten productions, written in the very surface
/// syntax they describe. Every `Expr` this text reconstructs is the same
/// tree `seed_grammar` builds by hand -- `grammar` first, so reconstructing
/// this text picks the same rule as this grammar's own entry.
pub const SEED_TEXT: &str = r#"grammar <- ws first=rule (ws *rest=rule)* ws {grammar}
rule <- name=ident ws "<" "-" ws body=choice {rule}
choice <- first=seq (ws "/" ws *alt=seq)* {choice}
seq <- first=item (ws *rest=item)* (ws "{" action=ident "}")? {seq}
item <- "!" neg=quantified {item}
      / star="*"? name=ident "=" body=quantified {item}
      / bare=quantified {item}
quantified <- base=primary suffix=("?" / "*" / "+")? {quant}
primary <- "(" ws inner=choice ws ")" {primary_group}
         / "[" lo=. "-" hi=. "]" {primary_range}
         / "." {primary_any}
         / text=lit {primary_lit}
         / !(ident ws "<" "-") name=ident {primary_ref}
ident <- ([a-z] / [A-Z] / "_") ([a-z] / [A-Z] / [0-9] / "_")*
lit <- "\"" (!("\"" / "\\") . / "\\" .)* "\""
ws <- (" " / "\n" / "\t" / "\r")*
"#;

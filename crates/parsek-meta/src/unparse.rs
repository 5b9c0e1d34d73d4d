//! Canonical-dialect pretty-printer. Existing only to support round-tripping
//! (parse, unparse, reparse should be a no-op on the grammar's structure),
//! `to_canonical` does not try to reproduce a grammar's original formatting,
//! comments, or dialect.

use parsek_core::{ClauseId, ClauseKind, Grammar};

/// Render `grammar` as canonical-dialect source text. Character classes that
/// came from a dialect without them (or from manually built grammars) are
/// rendered back as a `Choice` of single-char literals and ranges, which
/// parses back to an equal `Grammar` even though it isn't byte-identical to
/// whatever text, if any, produced the original.
pub fn to_canonical(grammar: &Grammar) -> String {
    let mut out = String::new();
    for (name, id) in grammar.rules() {
        let ClauseKind::Rule(_, body) = grammar.kind(id) else {
            unreachable!("rules() only yields Rule clauses");
        };
        out.push_str(name);
        out.push_str(" <- ");
        write_expr(grammar, *body, &mut out);
        out.push('\n');
    }
    out
}

fn write_expr(grammar: &Grammar, id: ClauseId, out: &mut String) {
    match grammar.kind(id) {
        ClauseKind::Empty => out.push_str("''"),
        ClauseKind::Any(_) => out.push('.'),
        ClauseKind::Value(chars) => {
            out.push('"');
            for c in chars {
                write_escaped_char(*c, out);
            }
            out.push('"');
        }
        ClauseKind::Range(lo, hi) => {
            out.push('[');
            write_escaped_char(*lo, out);
            out.push('-');
            write_escaped_char(*hi, out);
            out.push(']');
        }
        ClauseKind::Reference(name) => out.push_str(grammar.name_str(*name)),
        ClauseKind::Sequence(xs) => write_joined(grammar, xs, " ", out),
        ClauseKind::Choice(xs) => write_joined(grammar, xs, " / ", out),
        ClauseKind::Repeat(c) => {
            write_grouped(grammar, *c, out);
            out.push('+');
        }
        ClauseKind::Not(c) => {
            out.push('!');
            write_grouped(grammar, *c, out);
        }
        ClauseKind::And(c) => {
            out.push('&');
            write_grouped(grammar, *c, out);
        }
        ClauseKind::Entail(c) => {
            out.push_str("~ ");
            write_grouped(grammar, *c, out);
        }
        ClauseKind::Capture(c, name, variadic) => {
            if *variadic {
                out.push('*');
            }
            out.push_str(grammar.name_str(*name));
            out.push('=');
            write_grouped(grammar, *c, out);
        }
        ClauseKind::Transform(c, token) => {
            write_expr(grammar, *c, out);
            out.push_str(" { ");
            out.push_str(grammar.name_str(token.0));
            out.push_str(" }");
        }
        ClauseKind::Rule(_, c) => write_expr(grammar, *c, out),
    }
}

fn write_joined(grammar: &Grammar, xs: &[ClauseId], sep: &str, out: &mut String) {
    for (i, &x) in xs.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        write_grouped(grammar, x, out);
    }
}

/// Wrap `id` in parens when its top-level operator would otherwise bind
/// differently once re-parsed as a child of a Sequence/Choice/quantifier.
fn write_grouped(grammar: &Grammar, id: ClauseId, out: &mut String) {
    let needs_parens = matches!(grammar.kind(id), ClauseKind::Sequence(_) | ClauseKind::Choice(_));
    if needs_parens {
        out.push('(');
        write_expr(grammar, id, out);
        out.push(')');
    } else {
        write_expr(grammar, id, out);
    }
}

fn write_escaped_char(c: char, out: &mut String) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '"' => out.push_str("\\\""),
        '\'' => out.push_str("\\'"),
        '\\' => out.push_str("\\\\"),
        _ => out.push(c),
    }
}

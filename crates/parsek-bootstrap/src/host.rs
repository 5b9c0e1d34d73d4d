//! Composes the seed grammar's per-production actions into `(name, Expr)`
//! rule pairs. Each action reads the already-evaluated values its captures
//! carry (`ActionScope::value`/`values`), never raw text beyond the leaf
//! productions (`ident`, `lit`, quantifier suffixes) that have no structure
//! of their own to compose.

use parsek_core::{ActionToken, CaptureName, Expr, Grammar};
use parsek_engine::{ActionHost, ActionOutcome, ActionScope, Engine, evaluate};

use crate::error::BootstrapError;

/// What one production's action produced. A single host value type has to
/// cover every production, since `ActionHost` fixes one `Value` type per
/// grammar.
#[derive(Clone, Debug)]
pub(crate) enum Node {
    Expr(Expr),
    Rule(String, Expr),
    Rules(Vec<(String, Expr)>),
}

#[derive(Debug, thiserror::Error)]
#[error("bootstrap action host error: {0}")]
pub struct HostError(String);

fn expr_of(node: Option<Node>, what: &str) -> Result<Expr, HostError> {
    match node {
        Some(Node::Expr(e)) => Ok(e),
        _ => Err(HostError(format!("expected `{what}` to carry an Expr"))),
    }
}

struct ComposeHost<'g> {
    grammar: &'g Grammar,
}

impl ActionHost for ComposeHost<'_> {
    type Value = Node;
    type Error = HostError;

    fn invoke(&mut self, token: ActionToken, scope: &ActionScope<'_>) -> Result<ActionOutcome<Self::Value>, Self::Error> {
        let name = self.grammar.name_str(token.0);
        let value = match name {
            "primary_group" => Node::Expr(expr_of(scope.value::<Node>(capture_name(self.grammar, "inner")), "inner")?),
            "primary_range" => {
                let lo = scope
                    .text(capture_name(self.grammar, "lo"))
                    .and_then(|s| s.chars().next())
                    .ok_or_else(|| HostError("missing `lo` capture".to_string()))?;
                let hi = scope
                    .text(capture_name(self.grammar, "hi"))
                    .and_then(|s| s.chars().next())
                    .ok_or_else(|| HostError("missing `hi` capture".to_string()))?;
                Node::Expr(Expr::Range(lo, hi))
            }
            "primary_any" => Node::Expr(Expr::Any(1)),
            "primary_lit" => {
                let text = scope
                    .text(capture_name(self.grammar, "text"))
                    .ok_or_else(|| HostError("missing `text` capture".to_string()))?;
                let body = &text[1..text.len() - 1];
                let chars = decode_literal_body(body)?;
                Node::Expr(if chars.is_empty() { Expr::Empty } else { Expr::Value(chars) })
            }
            "primary_ref" => {
                let name = scope
                    .text(capture_name(self.grammar, "name"))
                    .ok_or_else(|| HostError("missing `name` capture".to_string()))?;
                Node::Expr(Expr::Reference(name.to_string()))
            }
            "quant" => {
                let base = expr_of(scope.value::<Node>(capture_name(self.grammar, "base")), "base")?;
                let e = match scope.text(capture_name(self.grammar, "suffix")) {
                    Some("?") => Expr::Optional(Box::new(base)),
                    Some("*") => Expr::Star(Box::new(base)),
                    Some("+") => Expr::Repeat(Box::new(base)),
                    _ => base,
                };
                Node::Expr(e)
            }
            "item" => {
                if let Some(neg) = scope.value::<Node>(capture_name(self.grammar, "neg")) {
                    Node::Expr(Expr::Not(Box::new(expr_of(Some(neg), "neg")?)))
                } else if let Some(name) = scope.text(capture_name(self.grammar, "name")) {
                    let variadic = scope.text(capture_name(self.grammar, "star")) == Some("*");
                    let body = expr_of(scope.value::<Node>(capture_name(self.grammar, "body")), "body")?;
                    Node::Expr(Expr::Capture(Box::new(body), name.to_string(), variadic))
                } else {
                    Node::Expr(expr_of(scope.value::<Node>(capture_name(self.grammar, "bare")), "bare")?)
                }
            }
            "seq" => {
                let first = expr_of(scope.value::<Node>(capture_name(self.grammar, "first")), "first")?;
                let mut rest = Vec::new();
                for n in scope.values::<Node>(capture_name(self.grammar, "rest")) {
                    rest.push(expr_of(Some(n), "rest")?);
                }
                let body = if rest.is_empty() {
                    first
                } else {
                    let mut items = vec![first];
                    items.extend(rest);
                    Expr::Sequence(items)
                };
                Node::Expr(match scope.text(capture_name(self.grammar, "action")) {
                    Some(action) => Expr::Transform(Box::new(body), action.to_string()),
                    None => body,
                })
            }
            "choice" => {
                let first = expr_of(scope.value::<Node>(capture_name(self.grammar, "first")), "first")?;
                let mut alts = Vec::new();
                for n in scope.values::<Node>(capture_name(self.grammar, "alt")) {
                    alts.push(expr_of(Some(n), "alt")?);
                }
                Node::Expr(if alts.is_empty() {
                    first
                } else {
                    let mut all = vec![first];
                    all.extend(alts);
                    Expr::Choice(all)
                })
            }
            "rule" => {
                let name = scope
                    .text(capture_name(self.grammar, "name"))
                    .ok_or_else(|| HostError("missing rule `name` capture".to_string()))?;
                let body = expr_of(scope.value::<Node>(capture_name(self.grammar, "body")), "body")?;
                Node::Rule(name.to_string(), body)
            }
            "grammar" => {
                let first = match scope.value::<Node>(capture_name(self.grammar, "first")) {
                    Some(Node::Rule(n, e)) => (n, e),
                    _ => return Err(HostError("expected `first` to carry a Rule".to_string())),
                };
                let mut rules = vec![first];
                for n in scope.values::<Node>(capture_name(self.grammar, "rest")) {
                    match n {
                        Node::Rule(n, e) => rules.push((n, e)),
                        _ => return Err(HostError("expected `rest` to carry Rules".to_string())),
                    }
                }
                Node::Rules(rules)
            }
            other => return Err(HostError(format!("unknown action token `{other}`"))),
        };
        Ok(ActionOutcome::Value(value))
    }
}

/// Decode `\n \t \r \\ \"` escapes in a literal's inner text; any other
/// backslashed char is kept literally, same as the grammar's own `lit`
/// production accepting `\` followed by anything.
fn decode_literal_body(body: &str) -> Result<Vec<char>, HostError> {
    let mut out = Vec::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => return Err(HostError("dangling escape in literal".to_string())),
        }
    }
    Ok(out)
}

fn capture_name(grammar: &Grammar, name: &str) -> CaptureName {
    grammar.intern_get(name).unwrap_or_else(|| panic!("`{name}` is not an interned name in this grammar"))
}

/// Run `grammar` (which must carry the seed's production shapes) over `text`
/// through the engine, composing each `Transform`'s action result bottom-up
/// into the `(name, Expr)` pairs the text's rules describe.
pub fn parse_and_reconstruct(grammar: &Grammar, text: &str) -> Result<Vec<(String, parsek_core::Expr)>, BootstrapError> {
    let mut engine = Engine::new();
    let m = engine.parse(grammar, text)?;

    let mut host = ComposeHost { grammar };
    let result = evaluate(grammar, text, &m, &mut host)?;
    match result {
        Some(Node::Rules(rules)) => Ok(rules),
        Some(_) => Err(BootstrapError::Reconstruction("entry action did not produce a rule set".to_string())),
        None => Err(BootstrapError::Reconstruction("action never fired".to_string())),
    }
}

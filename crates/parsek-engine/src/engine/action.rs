//! Action binding: evaluating a successful parse tree's `Transform` nodes
//! against a caller-supplied host. The engine never interprets action bodies
//! itself -- `ActionToken` is opaque text forwarded verbatim.
//!
//! Actions compose two ways. An action can read the raw source text its
//! captures matched (`ActionScope::text`/`texts`), or, when a capture wraps a
//! `Transform` of its own, the already-evaluated value that inner action
//! produced (`ActionScope::value`/`values`). The latter is what lets one
//! grammar's productions build a typed result directly -- a `primary` rule's
//! action reading the `Expr` a nested `choice` rule already built, rather than
//! re-deriving it from a captured span.

use std::sync::Arc;

use indexmap::IndexMap;
use parsek_core::{ActionToken, Binding, CaptureName, CaptureValue, ClauseId, ClauseKind, Grammar, Match, RuleName};

use super::error::ParseError;

/// What an action produced: a value to bind, or a deliberate discard (e.g. an
/// action whose only purpose is a side effect on the host).
pub enum ActionOutcome<V> {
    Value(V),
    Discard,
}

/// Bound names visible to one action invocation, with the source text needed
/// to read text captures and the evaluated values of any capture that wraps
/// a `Transform`.
pub struct ActionScope<'a> {
    input: &'a str,
    captures: IndexMap<CaptureName, Binding>,
}

impl<'a> ActionScope<'a> {
    /// The text a non-variadic capture matched.
    pub fn text(&self, name: CaptureName) -> Option<&'a str> {
        match self.captures.get(&name)? {
            Binding::One(CaptureValue::Slice(s, e)) => Some(&self.input[*s..*e]),
            _ => None,
        }
    }

    /// The text each iteration of a variadic capture matched, in order.
    pub fn texts(&self, name: CaptureName) -> Vec<&'a str> {
        match self.captures.get(&name) {
            Some(Binding::Many(values)) => values
                .iter()
                .filter_map(|v| match v {
                    CaptureValue::Slice(s, e) => Some(&self.input[*s..*e]),
                    CaptureValue::Evaluated(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The evaluated value of a non-variadic capture wrapping a `Transform`,
    /// downcast to `T`. `None` if the capture bound plain text instead, or
    /// `T` doesn't match what the inner action produced.
    pub fn value<T: Clone + 'static>(&self, name: CaptureName) -> Option<T> {
        match self.captures.get(&name)? {
            Binding::One(CaptureValue::Evaluated(v)) => v.downcast_ref::<T>().cloned(),
            _ => None,
        }
    }

    /// The evaluated values of a variadic capture wrapping a `Transform`, in
    /// order, skipping any iteration that bound plain text instead.
    pub fn values<T: Clone + 'static>(&self, name: CaptureName) -> Vec<T> {
        match self.captures.get(&name) {
            Some(Binding::Many(values)) => values
                .iter()
                .filter_map(|v| match v {
                    CaptureValue::Evaluated(e) => e.downcast_ref::<T>().cloned(),
                    CaptureValue::Slice(_, _) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// The contract boundary between the engine and whatever evaluates action
/// bodies. The engine walks the parse tree bottom-up and calls `invoke` once
/// per `Transform` node; the host decides what an action token means.
pub trait ActionHost {
    type Value: Clone + Send + Sync + 'static;
    type Error: std::error::Error;

    fn invoke(
        &mut self,
        token: ActionToken,
        scope: &ActionScope<'_>,
    ) -> Result<ActionOutcome<Self::Value>, Self::Error>;
}

/// Bottom-up result of evaluating one `Match` node.
struct Eval<V> {
    /// The nearest action value looking down from this node: `Some` if this
    /// node is a `Transform`, or a wrapper node (`Rule`, `And`, a `Choice`'s
    /// winning branch, ...) whose single child produced one.
    value: Option<V>,
    /// How many distinct `Transform` results reached this node without
    /// crossing a nested `Capture` boundary. Used only to police a `Capture`'s
    /// own cardinality; irrelevant once a `Capture` absorbs its child into a
    /// named binding.
    count: u32,
    /// This node's captures, seeded from the matcher's parse-time bindings
    /// and upgraded to `CaptureValue::Evaluated` wherever a `Capture`'s child
    /// produced exactly one action result.
    captures: IndexMap<CaptureName, Binding>,
}

/// Does `id`'s subtree contain a `Transform`, without crossing into a nested
/// `Capture` (a nested capture's action belongs to that capture, not this
/// one)? Used to tell "this capture wraps plain input matching" (any
/// cardinality of action results is moot, fall back to the matched text) from
/// "this capture wraps an action that dynamically didn't fire" (an error).
fn wraps_transform(grammar: &Grammar, id: ClauseId) -> bool {
    wraps_transform_visit(grammar, id, &mut std::collections::HashSet::new())
}

fn wraps_transform_visit(grammar: &Grammar, id: ClauseId, visiting: &mut std::collections::HashSet<RuleName>) -> bool {
    match grammar.kind(id) {
        ClauseKind::Transform(_, _) => true,
        ClauseKind::Capture(_, _, _) => false,
        // A Reference has no static children of its own; follow it into the
        // target rule, breaking cycles conservatively (a rule already being
        // visited on this path is treated as action-free, same style as
        // `Grammar::seeds`'s own over-approximation).
        ClauseKind::Reference(name) => {
            if !visiting.insert(*name) {
                return false;
            }
            grammar
                .resolve(*name)
                .is_some_and(|target| wraps_transform_visit(grammar, target, visiting))
        }
        _ => grammar
            .children(id)
            .iter()
            .any(|&c| wraps_transform_visit(grammar, c, visiting)),
    }
}

fn merge_into(into: &mut IndexMap<CaptureName, Binding>, from: &IndexMap<CaptureName, Binding>) {
    for (name, binding) in from {
        into.entry(*name)
            .and_modify(|existing| {
                *existing = match (existing.clone(), binding.clone()) {
                    (Binding::Many(mut a), Binding::Many(b)) => {
                        a.extend(b);
                        Binding::Many(a)
                    }
                    (Binding::Many(mut a), Binding::One(b)) => {
                        a.push(b);
                        Binding::Many(a)
                    }
                    (Binding::One(a), Binding::Many(mut b)) => {
                        b.insert(0, a);
                        Binding::Many(b)
                    }
                    (Binding::One(a), Binding::One(b)) => Binding::Many(vec![a, b]),
                }
            })
            .or_insert_with(|| binding.clone());
    }
}

fn eval_node<H: ActionHost>(
    grammar: &Grammar,
    input: &str,
    m: &Match,
    host: &mut H,
) -> Result<Eval<H::Value>, ParseError> {
    let mut children = Vec::with_capacity(m.children.len());
    for child in &m.children {
        children.push(eval_node(grammar, input, child, host)?);
    }

    match grammar.kind(m.clause) {
        ClauseKind::Transform(_, token) => {
            let mut captures = IndexMap::new();
            for child in &children {
                merge_into(&mut captures, &child.captures);
            }
            let scope = ActionScope {
                input,
                captures: captures.clone(),
            };
            let value = match host.invoke(*token, &scope) {
                Ok(ActionOutcome::Value(v)) => Some(v),
                Ok(ActionOutcome::Discard) => None,
                Err(e) => return Err(ParseError::ActionError(e.to_string())),
            };
            Ok(Eval {
                value,
                count: 1,
                captures,
            })
        }
        ClauseKind::Capture(child_clause, name, variadic) => {
            // `match_capture` always wraps exactly one child. Seed from the
            // child's own (possibly upgraded) captures, not `m.captures`'s
            // raw parse-time snapshot, so a deeper nested capture's
            // `Evaluated` upgrade isn't lost on the way up.
            let child = &children[0];
            let mut captures = child.captures.clone();

            if wraps_transform(grammar, *child_clause) {
                match (*variadic, child.count, &child.value) {
                    (false, 1, Some(v)) => {
                        captures.insert(*name, Binding::One(CaptureValue::Evaluated(Arc::new(v.clone()))));
                    }
                    (false, _, _) => {
                        return Err(ParseError::CaptureArity {
                            name: grammar.name_str(*name).to_string(),
                            detail: format!("expected exactly one action result, got {}", child.count),
                        });
                    }
                    (true, 0, _) => {
                        captures.insert(*name, Binding::Many(Vec::new()));
                    }
                    (true, _, Some(v)) => {
                        captures.insert(*name, Binding::Many(vec![CaptureValue::Evaluated(Arc::new(v.clone()))]));
                    }
                    (true, _, None) => {
                        captures.insert(*name, Binding::Many(Vec::new()));
                    }
                }
                // The capture absorbs its child's action result into this
                // named binding; it doesn't bubble further as an anonymous
                // value; an enclosing Transform reads it back by name.
                Ok(Eval {
                    value: None,
                    count: 0,
                    captures,
                })
            } else {
                // Plain input matching: keep the parse-time Slice binding,
                // nothing to bubble.
                Ok(Eval {
                    value: None,
                    count: 0,
                    captures,
                })
            }
        }
        _ => {
            // Rule/Sequence/Choice/And/Entail: no captures of their own, only
            // whatever their children already gathered (a leaf with no
            // children naturally yields an empty map here).
            let mut captures = IndexMap::new();
            for child in &children {
                merge_into(&mut captures, &child.captures);
            }
            let value = children.iter().find_map(|c| c.value.clone());
            let count = children.iter().map(|c| c.count).sum();
            Ok(Eval { value, count, captures })
        }
    }
}

/// Walk `m` bottom-up, invoking `host` for every `Transform` node, and return
/// the nearest action's result looking down from `m`. A `Capture`'s own
/// cardinality (spec: a non-variadic capture whose child matches but yields
/// zero or multiple action results) is enforced as each `Capture` node is
/// reached, surfacing as `ParseError::CaptureArity`.
pub fn evaluate<H: ActionHost>(
    grammar: &Grammar,
    input: &str,
    m: &Match,
    host: &mut H,
) -> Result<Option<H::Value>, ParseError> {
    Ok(eval_node(grammar, input, m, host)?.value)
}

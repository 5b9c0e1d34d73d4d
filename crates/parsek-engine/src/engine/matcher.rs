//! The parsing engine: a memoizing, left-recursion-capable PEG interpreter
//! that walks a [`Grammar`]'s clause arena directly.
//!
//! Unlike a bytecode VM, there is no separate instruction stream here --
//! `Engine::parse` recurses over `ClauseId`s, and backtracking through a
//! `Choice` is expressed with native `Result` returns rather than an explicit
//! checkpoint stack. That is sound for a tree-walking interpreter: Rust's own
//! call stack already is the backtracking stack.

use indexmap::IndexMap;
use parsek_core::{
    Binding, CaptureValue, ClauseId, ClauseKind, Failure, Grammar, Match, Position,
};

use super::error::ParseError;
use super::memo::{MemoSlot, MemoTable, Outcome};

/// Step and call-depth ceilings for one parse, mirroring the fuel/recursion
/// guard pattern used throughout this workspace's ambient stack. A grammar
/// that cannot terminate (or a pathological input) fails loudly with
/// `ExecFuelExhausted`/`RecursionLimitExceeded` instead of hanging or
/// overflowing the stack.
#[derive(Debug, Clone, Copy)]
pub struct FuelLimits {
    exec_fuel: u32,
    recursion_limit: u32,
}

impl Default for FuelLimits {
    fn default() -> Self {
        Self {
            exec_fuel: 1_000_000,
            recursion_limit: 1_024,
        }
    }
}

impl FuelLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exec_fuel(mut self, fuel: u32) -> Self {
        self.exec_fuel = fuel;
        self
    }

    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }
}

/// Builder for [`Engine`] instances.
#[derive(Debug, Default)]
pub struct EngineBuilder {
    limits: FuelLimits,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limits(mut self, limits: FuelLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn exec_fuel(mut self, fuel: u32) -> Self {
        self.limits = self.limits.exec_fuel(fuel);
        self
    }

    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.limits = self.limits.recursion_limit(limit);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            limits: self.limits,
            memo: MemoTable::new(0, 1),
            fuel: self.limits.exec_fuel,
            depth: 0,
            growing: 0,
            recursion_exceeded: false,
            capture_arity: None,
        }
    }
}

/// Runs a [`Grammar`] against input text. One `Engine` can be reused across
/// parses; each `parse` call resets its memo table and fuel counter.
pub struct Engine {
    limits: FuelLimits,
    memo: MemoTable,
    fuel: u32,
    depth: u32,
    /// Nonzero while any ancestor rule application is mid grow-the-seed.
    /// Clause-level memo writes are skipped in that window, since a result
    /// computed against a provisional seed must not outlive the seed that
    /// produced it -- see `match_rule`.
    growing: u32,
    recursion_exceeded: bool,
    /// Set the first time two non-variadic bindings for the same capture
    /// collide while merging siblings (a `Capture` directly under a `Repeat`
    /// or repeated `Sequence` item without its `variadic` marker). Checked at
    /// the top of `parse`, same as `recursion_exceeded`.
    capture_arity: Option<parsek_core::CaptureName>,
}

impl Engine {
    pub fn new() -> Self {
        EngineBuilder::new().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Parse `input` against `grammar`'s entry rule. Succeeds only if the
    /// entry rule matches the *entire* input.
    pub fn parse(&mut self, grammar: &Grammar, input: &str) -> Result<Match, ParseError> {
        self.memo = MemoTable::new(grammar.len(), input.len() + 1);
        self.fuel = self.limits.exec_fuel;
        self.depth = 0;
        self.growing = 0;
        self.recursion_exceeded = false;
        self.capture_arity = None;

        let outcome = self.match_clause(grammar, input, grammar.entry(), 0);

        if self.fuel == 0 {
            return Err(ParseError::ExecFuelExhausted(self.limits.exec_fuel));
        }
        if self.recursion_exceeded {
            return Err(ParseError::RecursionLimitExceeded(self.limits.recursion_limit));
        }
        if let Some(name) = self.capture_arity.take() {
            return Err(ParseError::CaptureArity {
                name: grammar.name_str(name).to_string(),
                detail: "bound more than once without a variadic marker".to_string(),
            });
        }

        match outcome {
            Ok(m) if m.end == input.len() => Ok(m),
            Ok(m) => Err(ParseError::MatchFailed(Failure {
                farthest: m.end,
                expected: vec![grammar.entry()],
                committed: false,
            })),
            Err(f) if f.committed => Err(ParseError::CommittedFailure(f)),
            Err(f) => Err(ParseError::MatchFailed(f)),
        }
    }

    fn match_clause(
        &mut self,
        grammar: &Grammar,
        input: &str,
        id: ClauseId,
        pos: Position,
    ) -> Result<Match, Failure> {
        if self.fuel == 0 {
            // Fuel exhaustion surfaces as a ParseError only at the top level;
            // deep in the recursion we can only report ordinary failure.
            return Err(Failure::new(pos));
        }
        self.fuel -= 1;

        match grammar.kind(id) {
            ClauseKind::Rule(_, body) => self.match_rule(grammar, input, id, *body, pos),
            ClauseKind::Reference(name) => {
                let target = grammar
                    .resolve(*name)
                    .expect("GrammarBuilder guarantees every Reference resolves");
                self.match_clause(grammar, input, target, pos)
            }
            ClauseKind::Empty => Ok(Match::leaf(id, pos, pos)),
            ClauseKind::Any(n) => self.match_any(id, input, *n, pos),
            ClauseKind::Value(v) => self.match_value(id, input, v, pos),
            ClauseKind::Range(a, b) => self.match_range(id, input, *a, *b, pos),
            ClauseKind::Sequence(xs) => self.match_sequence(grammar, input, id, xs, pos),
            ClauseKind::Choice(xs) => self.match_choice(grammar, input, id, xs, pos),
            ClauseKind::Repeat(c) => self.match_repeat(grammar, input, id, *c, pos),
            ClauseKind::Not(c) => self.match_not(grammar, input, id, *c, pos),
            ClauseKind::And(c) => self.match_and(grammar, input, id, *c, pos),
            ClauseKind::Entail(c) => self.match_entail(grammar, input, id, *c, pos),
            ClauseKind::Capture(c, name, variadic) => {
                self.match_capture(grammar, input, id, *c, *name, *variadic, pos)
            }
            ClauseKind::Transform(c, _) => self.match_transform(grammar, input, id, *c, pos),
        }
    }

    fn match_any(&mut self, id: ClauseId, input: &str, n: usize, pos: Position) -> Outcome {
        let mut cur = pos;
        for _ in 0..n {
            match input[cur..].chars().next() {
                Some(c) => cur += c.len_utf8(),
                None => return Err(Failure::new(pos)),
            }
        }
        Ok(Match::leaf(id, pos, cur))
    }

    fn match_value(&mut self, id: ClauseId, input: &str, value: &[char], pos: Position) -> Outcome {
        let mut cur = pos;
        for &expected in value {
            match input[cur..].chars().next() {
                Some(c) if c == expected => cur += c.len_utf8(),
                _ => return Err(Failure::new(pos)),
            }
        }
        Ok(Match::leaf(id, pos, cur))
    }

    fn match_range(&mut self, id: ClauseId, input: &str, a: char, b: char, pos: Position) -> Outcome {
        match input[pos..].chars().next() {
            Some(c) if a <= c && c <= b => Ok(Match::leaf(id, pos, pos + c.len_utf8())),
            _ => Err(Failure::new(pos)),
        }
    }

    fn match_rule(
        &mut self,
        grammar: &Grammar,
        input: &str,
        rule_id: ClauseId,
        body: ClauseId,
        pos: Position,
    ) -> Outcome {
        if let MemoSlot::Done(outcome) = self.memo.get(rule_id, pos) {
            return outcome.clone();
        }
        if let MemoSlot::InProgress { seed } = self.memo.get(rule_id, pos) {
            // Re-entering a rule that's currently being evaluated at this
            // position is the left-recursion case: hand back the current
            // seed (FAIL on the very first entry) without recursing further.
            return seed.clone().unwrap_or_else(|| Err(Failure::new(pos)));
        }

        let name = grammar
            .rule_name(rule_id)
            .expect("match_rule is only called on Rule clauses");

        if !grammar.seeds(name) {
            self.check_recursion_limit(pos)?;
            self.depth += 1;
            let result = self.match_clause(grammar, input, body, pos);
            self.depth -= 1;
            let result = result.map(|m| wrap_as_rule(rule_id, m));
            self.memo.set(rule_id, pos, MemoSlot::Done(result.clone()));
            return result;
        }

        // Grow-the-seed: start from FAIL, re-evaluate the body under the
        // growing seed until an iteration fails to extend the match.
        self.memo.set(rule_id, pos, MemoSlot::InProgress { seed: None });
        let mut best: Outcome = Err(Failure::new(pos));
        loop {
            self.memo.set(
                rule_id,
                pos,
                MemoSlot::InProgress {
                    seed: Some(best.clone()),
                },
            );
            self.check_recursion_limit(pos)?;
            self.depth += 1;
            self.growing += 1;
            let candidate = self.match_clause(grammar, input, body, pos);
            self.growing -= 1;
            self.depth -= 1;

            let grew = match (&candidate, &best) {
                (Ok(c), Ok(b)) => c.end > b.end,
                (Ok(_), Err(_)) => true,
                _ => false,
            };
            if grew {
                best = candidate;
                continue;
            }
            break;
        }

        let result = best.map(|m| wrap_as_rule(rule_id, m));
        self.memo.set(rule_id, pos, MemoSlot::Done(result.clone()));
        result
    }

    fn check_recursion_limit(&mut self, pos: Position) -> Result<(), Failure> {
        if self.depth >= self.limits.recursion_limit {
            // Fails ordinarily here, so a `Choice` can still try a sibling
            // alternative; `parse` checks the flag and reports the precise
            // `RecursionLimitExceeded` error once the whole parse unwinds.
            self.recursion_exceeded = true;
            return Err(Failure::new(pos));
        }
        Ok(())
    }

    /// Cache a non-head clause's result, unless we're currently inside a
    /// grow-the-seed loop -- a result computed against a provisional seed
    /// must not be memoized past that seed's lifetime.
    fn remember(&mut self, id: ClauseId, pos: Position, result: &Outcome) {
        if self.growing == 0 {
            self.memo.set(id, pos, MemoSlot::Done(result.clone()));
        }
    }

    fn match_sequence(
        &mut self,
        grammar: &Grammar,
        input: &str,
        id: ClauseId,
        children: &[ClauseId],
        pos: Position,
    ) -> Outcome {
        if let MemoSlot::Done(outcome) = self.memo.get(id, pos) {
            return outcome.clone();
        }

        let mut cur = pos;
        let mut matches = Vec::with_capacity(children.len());
        let mut captures = IndexMap::new();
        let mut committed = false;

        for &child in children {
            let is_entail = matches!(grammar.kind(child), ClauseKind::Entail(_));
            match self.match_clause(grammar, input, child, cur) {
                Ok(m) => {
                    cur = m.end;
                    self.merge_captures(&mut captures, &m.captures);
                    matches.push(m);
                    if is_entail {
                        committed = true;
                    }
                }
                Err(mut f) => {
                    if committed {
                        f.committed = true;
                    }
                    self.remember(id, pos, &Err(f.clone()));
                    return Err(f);
                }
            }
        }

        let result = Ok(Match {
            clause: id,
            start: pos,
            end: cur,
            children: matches,
            captures,
        });
        self.remember(id, pos, &result);
        result
    }

    fn match_choice(
        &mut self,
        grammar: &Grammar,
        input: &str,
        id: ClauseId,
        children: &[ClauseId],
        pos: Position,
    ) -> Outcome {
        if let MemoSlot::Done(outcome) = self.memo.get(id, pos) {
            return outcome.clone();
        }

        let mut last_failure: Option<Failure> = None;
        for &child in children {
            // A failed alternative's partial work (including any
            // `capture_arity` flag raised while merging captures along the
            // way) must not leak into whichever alternative actually wins.
            let capture_arity_before = self.capture_arity;
            match self.match_clause(grammar, input, child, pos) {
                Ok(m) => {
                    let result = Ok(Match {
                        clause: id,
                        start: m.start,
                        end: m.end,
                        children: vec![m],
                        captures: IndexMap::new(),
                    });
                    let result = promote_single_child_captures(result);
                    self.remember(id, pos, &result);
                    return result;
                }
                Err(f) => {
                    self.capture_arity = capture_arity_before;
                    let stop = f.committed;
                    last_failure = Some(match last_failure {
                        Some(prev) => prev.merge(f),
                        None => f,
                    });
                    if stop {
                        break;
                    }
                }
            }
        }
        let result = Err(last_failure.unwrap_or_else(|| Failure::new(pos)));
        self.remember(id, pos, &result);
        result
    }

    fn match_repeat(
        &mut self,
        grammar: &Grammar,
        input: &str,
        id: ClauseId,
        child: ClauseId,
        pos: Position,
    ) -> Outcome {
        if let MemoSlot::Done(outcome) = self.memo.get(id, pos) {
            return outcome.clone();
        }

        let mut cur = pos;
        let mut matches = Vec::new();
        let mut captures = IndexMap::new();

        loop {
            match self.match_clause(grammar, input, child, cur) {
                Ok(m) => {
                    let made_progress = m.end > cur;
                    cur = m.end;
                    self.merge_captures(&mut captures, &m.captures);
                    matches.push(m);
                    if !made_progress {
                        // A nullable body matched without consuming input;
                        // repeating it again would loop forever.
                        break;
                    }
                }
                Err(_) => break,
            }
        }

        let result = if matches.is_empty() {
            Err(Failure::new(pos))
        } else {
            Ok(Match {
                clause: id,
                start: pos,
                end: cur,
                children: matches,
                captures,
            })
        };
        self.remember(id, pos, &result);
        result
    }

    fn match_not(
        &mut self,
        grammar: &Grammar,
        input: &str,
        id: ClauseId,
        child: ClauseId,
        pos: Position,
    ) -> Outcome {
        // Zero-width: never memoized on the failure path alone would be
        // fine, but we memoize both outcomes like every other clause.
        let result = match self.match_clause(grammar, input, child, pos) {
            Ok(_) => Err(Failure::new(pos)),
            Err(_) => Ok(Match::leaf(id, pos, pos)),
        };
        self.remember(id, pos, &result);
        result
    }

    fn match_and(
        &mut self,
        grammar: &Grammar,
        input: &str,
        id: ClauseId,
        child: ClauseId,
        pos: Position,
    ) -> Outcome {
        let result = match self.match_clause(grammar, input, child, pos) {
            Ok(m) => Ok(Match {
                clause: id,
                start: pos,
                end: pos,
                children: Vec::new(),
                captures: m.captures,
            }),
            Err(f) => Err(f),
        };
        self.remember(id, pos, &result);
        result
    }

    fn match_entail(
        &mut self,
        grammar: &Grammar,
        input: &str,
        id: ClauseId,
        child: ClauseId,
        pos: Position,
    ) -> Outcome {
        // Standalone (outside a Sequence) an `Entail` just forwards the
        // child's match and commits its own failure for diagnostics; the
        // "commit the rest of the sequence" behavior lives in
        // `match_sequence`, which inspects sibling clause kinds directly.
        match self.match_clause(grammar, input, child, pos) {
            Ok(m) => Ok(Match {
                clause: id,
                ..m
            }),
            Err(f) => Err(f.commit()),
        }
    }

    fn match_capture(
        &mut self,
        grammar: &Grammar,
        input: &str,
        id: ClauseId,
        child: ClauseId,
        name: parsek_core::CaptureName,
        variadic: bool,
        pos: Position,
    ) -> Outcome {
        match self.match_clause(grammar, input, child, pos) {
            Ok(m) => {
                let value = CaptureValue::Slice(m.start, m.end);
                let mut captures = m.captures.clone();
                let binding = if variadic {
                    Binding::Many(vec![value])
                } else {
                    Binding::One(value)
                };
                captures.insert(name, binding);
                Ok(Match {
                    clause: id,
                    start: m.start,
                    end: m.end,
                    children: vec![m],
                    captures,
                })
            }
            Err(f) => Err(f),
        }
    }

    /// Merge a child's captures into an accumulating sequence/repeat's map.
    /// Flags `capture_arity` the first time a non-variadic capture (a
    /// `Binding::One`) collides with an earlier binding of the same name --
    /// `match_capture` only ever produces `Binding::One` for a capture
    /// declared non-variadic, so such a collision can only mean the same
    /// capture fired more than once without its `variadic` marker.
    fn merge_captures(
        &mut self,
        into: &mut IndexMap<parsek_core::CaptureName, Binding>,
        from: &IndexMap<parsek_core::CaptureName, Binding>,
    ) {
        for (name, binding) in from {
            match into.get(name) {
                None => {
                    into.insert(*name, binding.clone());
                }
                Some(existing) => {
                    if self.capture_arity.is_none()
                        && matches!((existing, binding), (Binding::One(_), Binding::One(_)))
                    {
                        self.capture_arity = Some(*name);
                    }
                    let combined = combine(existing.clone(), binding.clone());
                    into.insert(*name, combined);
                }
            }
        }
    }

    fn match_transform(
        &mut self,
        grammar: &Grammar,
        input: &str,
        id: ClauseId,
        child: ClauseId,
        pos: Position,
    ) -> Outcome {
        match self.match_clause(grammar, input, child, pos) {
            Ok(m) => Ok(Match {
                clause: id,
                start: m.start,
                end: m.end,
                captures: m.captures.clone(),
                children: vec![m],
            }),
            Err(f) => Err(f),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a rule body's match as the rule's own node, the same way `Transform`
/// and `Capture` wrap their child: keep the body's match intact as the sole
/// child rather than overwriting its clause id, so a caller walking the tree
/// can still see the body's own clause (e.g. a `Transform` directly under a
/// `Rule`, with no intervening `Sequence`/`Choice`).
fn wrap_as_rule(rule_id: ClauseId, body: Match) -> Match {
    Match {
        clause: rule_id,
        start: body.start,
        end: body.end,
        captures: body.captures.clone(),
        children: vec![body],
    }
}

/// A `Choice`'s own match carries no captures of its own; whatever the
/// winning alternative captured should read as if the `Choice` weren't there.
fn promote_single_child_captures(result: Outcome) -> Outcome {
    result.map(|m| {
        let captures = m.children[0].captures.clone();
        Match { captures, ..m }
    })
}

/// Combine two bindings for the same capture name across sibling matches.
/// Never drops a value: a `(One, One)` collision (only possible for a
/// non-variadic capture bound more than once -- see `Engine::merge_captures`,
/// which flags this as a `CaptureArity` violation) still keeps both values
/// rather than silently discarding the first.
fn combine(existing: Binding, incoming: Binding) -> Binding {
    match (existing, incoming) {
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
}

//! Clause IR and grammar construction.
//!
//! A grammar is an arena of [`ClauseKind`] nodes addressed by [`ClauseId`], plus a
//! name table mapping each rule to its body. The only cycles the arena can hold are
//! indirect, through a `Reference(name)` resolved against the name table — there is
//! no way to build a clause that points at itself by index.

use std::collections::HashMap;

use crate::interner::{Interner, Symbol};

/// Interned rule name. Two `RuleName`s compare equal iff they were interned from
/// the same string by the same `Grammar`'s interner.
pub type RuleName = Symbol;

/// Stable index of a clause within a [`Grammar`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClauseId(u32);

impl ClauseId {
    #[inline]
    fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Build a `ClauseId` from a raw arena index. Exposed for callers (the
    /// engine's memoization table, mainly) that need to index parallel arrays
    /// by clause identity.
    #[inline]
    pub fn from_usize(index: usize) -> Self {
        Self::new(index)
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }

    /// The clause's position in the grammar's arena, for use as a dense array
    /// index.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.index()
    }
}

/// A single PEG operator node. Matches the Clause IR variant table: every surface
/// expression in either textual dialect desugars to some composition of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseKind {
    /// Matches the empty string, always succeeds without consuming input.
    Empty,
    /// Matches any `n` items (chars), failing if fewer remain.
    Any(usize),
    /// Matches an exact literal sequence of chars.
    Value(Vec<char>),
    /// Matches a single char in the inclusive range `[a, b]`.
    Range(char, char),
    /// Matches by invoking the named rule. The only indirection the arena allows.
    Reference(RuleName),
    /// Matches each child in order; fails if any child fails.
    Sequence(Vec<ClauseId>),
    /// Matches the first child that succeeds, trying children in order.
    Choice(Vec<ClauseId>),
    /// Matches the child one or more times, greedily, stopping on first failure
    /// or on an iteration that consumed no input.
    Repeat(ClauseId),
    /// Zero-width negative lookahead: succeeds iff the child fails, consuming nothing.
    Not(ClauseId),
    /// Zero-width positive lookahead: succeeds iff the child succeeds, consuming nothing.
    And(ClauseId),
    /// Cut: once the child succeeds, a later failure in the enclosing sequence is
    /// committed and will not be retried by an enclosing choice.
    Entail(ClauseId),
    /// Binds the child's match under `name`. `variadic` captures collect every
    /// match produced when the child is retried under a `Repeat`, instead of
    /// keeping only the last.
    Capture(ClauseId, CaptureName, bool),
    /// Wraps the child's match with an action token, evaluated post-parse by an
    /// `ActionHost` supplied by the caller.
    Transform(ClauseId, ActionToken),
    /// Names a rule body for reference and diagnostics.
    Rule(RuleName, ClauseId),
}

/// Interned capture name.
pub type CaptureName = Symbol;

/// Opaque handle to an action body. The core never interprets the bytes behind
/// this token; it is forwarded verbatim to whatever `ActionHost` evaluates the
/// parse tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionToken(pub Symbol);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("rule `{0}` is defined more than once")]
    DuplicateRule(String),
    #[error("rule `{0}` is referenced but never defined")]
    UnknownRule(String),
    #[error("grammar has no rules")]
    Empty,
}

/// An immutable, normalized PEG grammar: a clause arena plus a name table mapping
/// each rule name to its `Rule` clause. Built only through [`GrammarBuilder`].
#[derive(Debug, Clone)]
pub struct Grammar {
    arena: Vec<ClauseKind>,
    rules: indexmap::IndexMap<RuleName, ClauseId>,
    interner: Interner,
    top: RuleName,
    nullable: Vec<bool>,
    seeds: Vec<bool>,
}

impl Grammar {
    #[inline]
    pub fn kind(&self, id: ClauseId) -> &ClauseKind {
        &self.arena[id.index()]
    }

    /// The designated entry rule, i.e. the first rule the builder was given.
    pub fn entry(&self) -> ClauseId {
        self.rules[&self.top]
    }

    pub fn resolve(&self, name: RuleName) -> Option<ClauseId> {
        self.rules.get(&name).copied()
    }

    pub fn resolve_str(&self, name: &str) -> Option<ClauseId> {
        let sym = self.interner.get(name)?;
        self.resolve(sym)
    }

    /// Look up the interned symbol for `name`, if this grammar interned it
    /// anywhere -- as a rule, a capture, or an action token. `None` if `name`
    /// was never used. Lets a caller that knows a capture's name as a string
    /// literal (an `ActionHost` built against a known grammar shape, say)
    /// recover the `CaptureName` to query `ActionScope` with, without having
    /// threaded the symbol through some other channel.
    pub fn intern_get(&self, name: &str) -> Option<CaptureName> {
        self.interner.get(name)
    }

    pub fn rule_name(&self, id: ClauseId) -> Option<RuleName> {
        match self.kind(id) {
            ClauseKind::Rule(name, _) => Some(*name),
            _ => None,
        }
    }

    pub fn name_str(&self, name: RuleName) -> &str {
        self.interner.resolve(name)
    }

    pub fn rules(&self) -> impl Iterator<Item = (&str, ClauseId)> {
        self.rules
            .iter()
            .map(|(name, id)| (self.interner.resolve(*name), *id))
    }

    /// Number of clauses in the arena. A memoization table sized `len() x
    /// input.len()` has one slot per `(clause, position)` pair.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Direct children of a clause, in canonical evaluation order. `Reference`,
    /// `Empty`, `Any`, `Value`, and `Range` have none.
    pub fn children(&self, id: ClauseId) -> &[ClauseId] {
        match self.kind(id) {
            ClauseKind::Sequence(xs) | ClauseKind::Choice(xs) => xs.as_slice(),
            ClauseKind::Repeat(c)
            | ClauseKind::Not(c)
            | ClauseKind::And(c)
            | ClauseKind::Entail(c)
            | ClauseKind::Capture(c, _, _)
            | ClauseKind::Transform(c, _)
            | ClauseKind::Rule(_, c) => std::slice::from_ref(c),
            ClauseKind::Empty
            | ClauseKind::Any(_)
            | ClauseKind::Value(_)
            | ClauseKind::Range(_, _)
            | ClauseKind::Reference(_) => &[],
        }
    }

    /// Whether `id` can match the empty string, per the least fixed point over
    /// the grammar described for `Sequence`/`Choice`/`Repeat`/`Reference`.
    #[inline]
    pub fn nullable(&self, id: ClauseId) -> bool {
        self.nullable[id.index()]
    }

    /// Whether rule `name` is reachable from its own leftmost position — a static
    /// over-approximation of which rules might left-recurse. A `false` result is
    /// a correctness guarantee (the engine can skip seed-growth bookkeeping); a
    /// `true` result is only a hint, since not every leftmost self-reference
    /// actually recurses at runtime.
    pub fn seeds(&self, name: RuleName) -> bool {
        match self.rules.get(&name) {
            Some(&id) => self.seeds[id.index()],
            None => false,
        }
    }

    /// Structural equality independent of arena layout: two grammars are equal
    /// iff they define the same rule names with structurally equal bodies. Used
    /// by the bootstrap driver to detect fixed-point convergence.
    pub fn equal_to(&self, other: &Grammar) -> bool {
        if self.rules.len() != other.rules.len() {
            return false;
        }
        for (name, &id) in &self.rules {
            let name_str = self.interner.resolve(*name);
            let Some(other_id) = other.resolve_str(name_str) else {
                return false;
            };
            if !self.clause_eq(id, other, other_id) {
                return false;
            }
        }
        true
    }

    fn clause_eq(&self, id: ClauseId, other: &Grammar, other_id: ClauseId) -> bool {
        match (self.kind(id), other.kind(other_id)) {
            (ClauseKind::Empty, ClauseKind::Empty) => true,
            (ClauseKind::Any(a), ClauseKind::Any(b)) => a == b,
            (ClauseKind::Value(a), ClauseKind::Value(b)) => a == b,
            (ClauseKind::Range(a1, a2), ClauseKind::Range(b1, b2)) => a1 == b1 && a2 == b2,
            (ClauseKind::Reference(a), ClauseKind::Reference(b)) => {
                self.interner.resolve(*a) == other.interner.resolve(*b)
            }
            (ClauseKind::Sequence(a), ClauseKind::Sequence(b))
            | (ClauseKind::Choice(a), ClauseKind::Choice(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(&x, &y)| self.clause_eq(x, other, y))
            }
            (ClauseKind::Repeat(a), ClauseKind::Repeat(b))
            | (ClauseKind::Not(a), ClauseKind::Not(b))
            | (ClauseKind::And(a), ClauseKind::And(b))
            | (ClauseKind::Entail(a), ClauseKind::Entail(b)) => self.clause_eq(*a, other, *b),
            (ClauseKind::Capture(a, an, av), ClauseKind::Capture(b, bn, bv)) => {
                av == bv
                    && self.interner.resolve(*an) == other.interner.resolve(*bn)
                    && self.clause_eq(*a, other, *b)
            }
            (ClauseKind::Transform(a, at), ClauseKind::Transform(b, bt)) => {
                self.interner.resolve(at.0) == other.interner.resolve(bt.0)
                    && self.clause_eq(*a, other, *b)
            }
            (ClauseKind::Rule(an, a), ClauseKind::Rule(bn, b)) => {
                self.interner.resolve(*an) == other.interner.resolve(*bn)
                    && self.clause_eq(*a, other, *b)
            }
            _ => false,
        }
    }
}

/// A not-yet-normalized clause tree, as produced by a meta-parser front end
/// before it is handed to [`GrammarBuilder`]. Unlike `ClauseKind`, this tree owns
/// its children directly and is allowed to include the sugar forms (`?`, `*`,
/// `[e]`) that `GrammarBuilder` desugars away.
#[derive(Debug, Clone)]
pub enum Expr {
    Empty,
    Any(usize),
    Value(Vec<char>),
    Range(char, char),
    Reference(String),
    Sequence(Vec<Expr>),
    Choice(Vec<Expr>),
    Repeat(Box<Expr>),
    /// Sugar: `e*`, desugars to `Choice(Repeat(e), Empty)`.
    Star(Box<Expr>),
    /// Sugar: `e?` or bpeg's `[e]`, desugars to `Choice(e, Empty)`.
    Optional(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>),
    Entail(Box<Expr>),
    Capture(Box<Expr>, String, bool),
    Transform(Box<Expr>, String),
}

/// Builds a [`Grammar`] from a sequence of named rule bodies. Desugars `Star`/
/// `Optional` at build time, checks that every `Reference` resolves, and rejects
/// duplicate rule names. This is the only way to construct a `Grammar`.
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    interner: Interner,
    order: Vec<RuleName>,
    rules: HashMap<RuleName, Expr>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. The first rule added becomes the grammar's entry point unless
    /// a later `build_with_entry` call overrides it.
    pub fn rule(&mut self, name: &str, body: Expr) -> &mut Self {
        let sym = self.interner.intern(name);
        if !self.rules.contains_key(&sym) {
            self.order.push(sym);
        }
        self.rules.insert(sym, body);
        self
    }

    pub fn build(self) -> Result<Grammar, GrammarError> {
        let top = *self.order.first().ok_or(GrammarError::Empty)?;
        self.build_with_entry(self.interner.resolve(top).to_owned())
    }

    pub fn build_with_entry(mut self, entry: String) -> Result<Grammar, GrammarError> {
        if self.order.len() != self.rules.len() {
            // `rule()` keeps `order` and `rules` in lockstep; this only trips if
            // a caller mutated `rules` directly, which the API doesn't allow.
            unreachable!("rule bookkeeping desynchronized");
        }

        let mut seen = std::collections::HashSet::new();
        for &name in &self.order {
            if !seen.insert(name) {
                return Err(GrammarError::DuplicateRule(
                    self.interner.resolve(name).to_owned(),
                ));
            }
        }

        let top = self.interner.intern(&entry);
        if !self.rules.contains_key(&top) {
            return Err(GrammarError::UnknownRule(entry));
        }

        let mut arena = Vec::new();
        let mut rule_ids = indexmap::IndexMap::new();

        // Lower each rule body into the arena, wrapped in a `Rule` node so
        // `Reference`s have something stable to point at via the name table.
        for &name in &self.order {
            let body = self.rules.remove(&name).expect("order/rules in lockstep");
            let body_id = lower(&mut arena, &mut self.interner, body)?;
            let rule_id = push(&mut arena, ClauseKind::Rule(name, body_id));
            rule_ids.insert(name, rule_id);
        }

        // Every Reference must resolve against the completed name table.
        for kind in &arena {
            if let ClauseKind::Reference(name) = kind
                && !rule_ids.contains_key(name)
            {
                return Err(GrammarError::UnknownRule(
                    self.interner.resolve(*name).to_owned(),
                ));
            }
        }

        let nullable = compute_nullable(&arena, &rule_ids);
        let seeds = compute_seeds(&arena, &rule_ids);

        Ok(Grammar {
            arena,
            rules: rule_ids,
            interner: self.interner,
            top,
            nullable,
            seeds,
        })
    }
}

fn push(arena: &mut Vec<ClauseKind>, kind: ClauseKind) -> ClauseId {
    let id = ClauseId::new(arena.len());
    arena.push(kind);
    id
}

fn lower(
    arena: &mut Vec<ClauseKind>,
    interner: &mut Interner,
    expr: Expr,
) -> Result<ClauseId, GrammarError> {
    let kind = match expr {
        Expr::Empty => ClauseKind::Empty,
        Expr::Any(n) => ClauseKind::Any(n),
        Expr::Value(v) => ClauseKind::Value(v),
        Expr::Range(a, b) => ClauseKind::Range(a, b),
        Expr::Reference(name) => ClauseKind::Reference(interner.intern(&name)),
        Expr::Sequence(xs) => {
            let ids = xs
                .into_iter()
                .map(|x| lower(arena, interner, x))
                .collect::<Result<Vec<_>, _>>()?;
            ClauseKind::Sequence(ids)
        }
        Expr::Choice(xs) => {
            let ids = xs
                .into_iter()
                .map(|x| lower(arena, interner, x))
                .collect::<Result<Vec<_>, _>>()?;
            ClauseKind::Choice(ids)
        }
        Expr::Repeat(e) => {
            let id = lower(arena, interner, *e)?;
            ClauseKind::Repeat(id)
        }
        Expr::Star(e) => {
            let id = lower(arena, interner, *e)?;
            let rep = push(arena, ClauseKind::Repeat(id));
            let empty = push(arena, ClauseKind::Empty);
            ClauseKind::Choice(vec![rep, empty])
        }
        Expr::Optional(e) => {
            let id = lower(arena, interner, *e)?;
            let empty = push(arena, ClauseKind::Empty);
            ClauseKind::Choice(vec![id, empty])
        }
        Expr::Not(e) => {
            let id = lower(arena, interner, *e)?;
            ClauseKind::Not(id)
        }
        Expr::And(e) => {
            let id = lower(arena, interner, *e)?;
            ClauseKind::And(id)
        }
        Expr::Entail(e) => {
            let id = lower(arena, interner, *e)?;
            ClauseKind::Entail(id)
        }
        Expr::Capture(e, name, variadic) => {
            let id = lower(arena, interner, *e)?;
            ClauseKind::Capture(id, interner.intern(&name), variadic)
        }
        Expr::Transform(e, action) => {
            let id = lower(arena, interner, *e)?;
            ClauseKind::Transform(id, ActionToken(interner.intern(&action)))
        }
    };
    Ok(push(arena, kind))
}

fn compute_nullable(
    arena: &[ClauseKind],
    rules: &indexmap::IndexMap<RuleName, ClauseId>,
) -> Vec<bool> {
    let mut nullable = vec![false; arena.len()];
    let name_to_id: HashMap<RuleName, ClauseId> = rules.iter().map(|(&n, &i)| (n, i)).collect();

    loop {
        let mut changed = false;
        for (i, kind) in arena.iter().enumerate() {
            let id = ClauseId::new(i);
            let value = match kind {
                ClauseKind::Empty | ClauseKind::Not(_) | ClauseKind::And(_) => true,
                ClauseKind::Any(n) => *n == 0,
                ClauseKind::Value(v) => v.is_empty(),
                ClauseKind::Range(_, _) => false,
                ClauseKind::Reference(name) => name_to_id
                    .get(name)
                    .is_some_and(|&target| nullable[target.index()]),
                ClauseKind::Sequence(xs) => xs.iter().all(|c| nullable[c.index()]),
                ClauseKind::Choice(xs) => xs.iter().any(|c| nullable[c.index()]),
                ClauseKind::Repeat(c) => nullable[c.index()],
                ClauseKind::Entail(c)
                | ClauseKind::Capture(c, _, _)
                | ClauseKind::Transform(c, _)
                | ClauseKind::Rule(_, c) => nullable[c.index()],
            };
            if value && !nullable[id.index()] {
                nullable[id.index()] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    nullable
}

/// A rule `seeds` if it is reachable from its own leftmost (first-matched)
/// position through some chain of `Sequence`/`Choice`/`Reference` edges. This is
/// a static over-approximation: it flags every rule that *could* left-recurse,
/// including ones that never actually do at runtime once prefixes are
/// considered, but it never misses one that does.
fn compute_seeds(arena: &[ClauseKind], rules: &indexmap::IndexMap<RuleName, ClauseId>) -> Vec<bool> {
    let mut seeds = vec![false; arena.len()];
    let name_to_id: HashMap<RuleName, ClauseId> = rules.iter().map(|(&n, &i)| (n, i)).collect();

    for (&rule_name, &rule_id) in rules {
        let mut visited = std::collections::HashSet::new();
        if reaches_self(arena, &name_to_id, rule_name, rule_id, &mut visited) {
            seeds[rule_id.index()] = true;
        }
    }
    seeds
}

fn reaches_self(
    arena: &[ClauseKind],
    name_to_id: &HashMap<RuleName, ClauseId>,
    target: RuleName,
    id: ClauseId,
    visited: &mut std::collections::HashSet<RuleName>,
) -> bool {
    match &arena[id.index()] {
        ClauseKind::Reference(name) => {
            if *name == target {
                return true;
            }
            if !visited.insert(*name) {
                return false;
            }
            name_to_id
                .get(name)
                .is_some_and(|&next| reaches_self(arena, name_to_id, target, next, visited))
        }
        ClauseKind::Sequence(xs) => {
            for &child in xs {
                if reaches_self(arena, name_to_id, target, child, visited) {
                    return true;
                }
                // Only leftmost position propagates into a later item once an
                // earlier one is non-nullable; seeds() is a static hint so we
                // conservatively keep scanning the whole sequence.
            }
            false
        }
        ClauseKind::Choice(xs) => xs
            .iter()
            .any(|&c| reaches_self(arena, name_to_id, target, c, visited)),
        ClauseKind::Repeat(c)
        | ClauseKind::Not(c)
        | ClauseKind::And(c)
        | ClauseKind::Entail(c)
        | ClauseKind::Capture(c, _, _)
        | ClauseKind::Transform(c, _)
        | ClauseKind::Rule(_, c) => reaches_self(arena, name_to_id, target, *c, visited),
        ClauseKind::Empty | ClauseKind::Any(_) | ClauseKind::Value(_) | ClauseKind::Range(_, _) => {
            false
        }
    }
}

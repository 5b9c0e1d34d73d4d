//! Match, capture, and failure shapes produced by a parse.
//!
//! These types describe the *result* of running a grammar; the engine that
//! produces them lives in `parsek-engine`. Keeping them here means a caller can
//! inspect a parse tree without depending on the engine crate at all.

use indexmap::IndexMap;

use crate::grammar::{CaptureName, ClauseId};

/// Byte offset into the source `&str` being parsed. Always kept on a char
/// boundary by the engine.
pub type Position = usize;

/// The value bound to a capture. A plain capture holds the input span it
/// matched; once an enclosing `Transform` has been evaluated by an
/// `ActionHost`, the span is replaced by the action's result.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureValue {
    /// `[start, end)` byte span of the input the capture matched.
    Slice(Position, Position),
    /// The result of evaluating an enclosing `Transform`, forced by an
    /// `ActionHost`. `Value` is generic over the host's output type.
    Evaluated(std::sync::Arc<dyn std::any::Any + Send + Sync>),
}

/// One binding produced by a `Capture` clause: either a single value, or — for
/// a capture whose clause sits under a `Repeat` — the sequence of values
/// produced across every iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    One(CaptureValue),
    Many(Vec<CaptureValue>),
}

/// An immutable node in the parse forest: the clause it matched, the span it
/// covered, its child matches in evaluation order, and the captures bound
/// directly under it.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub clause: ClauseId,
    pub start: Position,
    pub end: Position,
    pub children: Vec<Match>,
    pub captures: IndexMap<CaptureName, Binding>,
}

impl Match {
    pub fn leaf(clause: ClauseId, start: Position, end: Position) -> Self {
        Self {
            clause,
            start,
            end,
            children: Vec::new(),
            captures: IndexMap::new(),
        }
    }

    pub fn span(&self) -> (Position, Position) {
        (self.start, self.end)
    }
}

/// The result of a failed match attempt: how far into the input parsing got
/// before giving up, which clauses were expected at that point, and whether
/// the failure was committed by a cut (`Entail`) and so must not be retried by
/// an enclosing `Choice`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub farthest: Position,
    pub expected: Vec<ClauseId>,
    pub committed: bool,
}

impl Failure {
    pub fn new(at: Position) -> Self {
        Self {
            farthest: at,
            expected: Vec::new(),
            committed: false,
        }
    }

    /// Merge another failure observed at the same or an earlier point: the
    /// engine keeps only the farthest-reaching failure's `expected` set,
    /// matching spec's "report the failure that got furthest" rule, merging
    /// `expected` when both reach the same position.
    pub fn merge(mut self, other: Failure) -> Self {
        if other.farthest > self.farthest {
            return other;
        }
        if other.farthest == self.farthest {
            self.expected.extend(other.expected);
            self.committed |= other.committed;
        }
        self
    }

    pub fn commit(mut self) -> Self {
        self.committed = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_farthest_failure() {
        let near = Failure::new(2);
        let far = Failure::new(5);
        assert_eq!(near.merge(far.clone()).farthest, 5);
        assert_eq!(far.merge(Failure::new(2)).farthest, 5);
    }

    #[test]
    fn merge_combines_expected_at_same_position() {
        let mut a = Failure::new(3);
        a.expected.push(ClauseId::from_usize(0));
        let mut b = Failure::new(3);
        b.expected.push(ClauseId::from_usize(1));

        let merged = a.merge(b);
        assert_eq!(merged.expected.len(), 2);
    }

    #[test]
    fn commit_marks_committed() {
        let f = Failure::new(0).commit();
        assert!(f.committed);
    }
}

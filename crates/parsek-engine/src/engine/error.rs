use parsek_core::Failure;

/// Everything that can go wrong running a grammar against input.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The grammar's entry rule failed, or matched only a prefix of the input.
    #[error("parse failed at byte {}", .0.farthest)]
    MatchFailed(Failure),
    /// A cut (`Entail`) committed to a branch that then failed; no sibling
    /// alternative was tried.
    #[error("committed failure at byte {}", .0.farthest)]
    CommittedFailure(Failure),
    /// A non-variadic `Capture` clause was invoked more than once without an
    /// enclosing `Repeat`, or a variadic capture was read as a single value.
    #[error("capture `{name}` arity mismatch: {detail}")]
    CaptureArity { name: String, detail: String },
    /// The supplied `ActionHost` returned an error while evaluating a
    /// `Transform` node.
    #[error("action evaluation failed: {0}")]
    ActionError(String),
    /// The step budget (`FuelLimits::exec_fuel`) was exhausted before the
    /// parse finished.
    #[error("execution fuel exhausted after {0} steps")]
    ExecFuelExhausted(u32),
    /// Rule-call nesting exceeded `FuelLimits::recursion_limit`.
    #[error("recursion limit of {0} exceeded")]
    RecursionLimitExceeded(u32),
}

use parsek_core::GrammarError;
use parsek_engine::ParseError;
use parsek_meta::MetaError;

/// Everything that can go wrong running the fixed-point bootstrap loop.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The loop ran its bound without the rebuilt grammar settling to a fixed
    /// point.
    #[error("bootstrap did not converge within {0} iterations")]
    BootstrapDivergence(u32),

    /// The action host's composition pass produced no rule set -- only
    /// happens if the seed grammar and `host.rs`'s dispatch have drifted out
    /// of sync with each other.
    #[error("could not reconstruct a grammar from validated text: {0}")]
    Reconstruction(String),

    /// `self_host` bootstrapped a grammar that doesn't structurally match
    /// what `parsek_meta::canonical` parses the same text into.
    #[error("bootstrapped grammar disagrees with the canonical-dialect parse of the same text")]
    SelfHostMismatch,

    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Meta(#[from] MetaError),
}

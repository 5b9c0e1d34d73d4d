use parsek_core::GrammarError;

/// Everything that can go wrong turning grammar text into a [`parsek_core::Grammar`].
/// Every variant carries the byte offset its diagnostic should point at.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetaError {
    #[error("unexpected token")]
    UnexpectedToken(usize),
    #[error("unterminated character class")]
    UnterminatedClass(usize),
    #[error("unterminated action body")]
    UnterminatedAction(usize),
    #[error("invalid escape sequence")]
    InvalidEscape(usize),
    #[error("recursion limit exceeded while parsing grammar text")]
    RecursionLimit(usize),
    #[error("parser ran out of fuel while parsing grammar text")]
    FuelExhausted(usize),
    #[error("could not tokenize input")]
    Lex(usize),
    #[error(transparent)]
    Grammar(#[from] GrammarError),
}

impl MetaError {
    /// Byte offset the diagnostic should be rendered at. `GrammarError` has no
    /// notion of a source position (it operates on an already-built grammar),
    /// so it's anchored at the start of the file.
    pub fn offset(&self) -> usize {
        match self {
            MetaError::UnexpectedToken(o)
            | MetaError::UnterminatedClass(o)
            | MetaError::UnterminatedAction(o)
            | MetaError::InvalidEscape(o)
            | MetaError::RecursionLimit(o)
            | MetaError::FuelExhausted(o)
            | MetaError::Lex(o) => *o,
            MetaError::Grammar(_) => 0,
        }
    }
}

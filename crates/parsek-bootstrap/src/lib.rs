//! Fixed-point bootstrap driver: derives a [`parsek_core::Grammar`] for a
//! tiny rule-definition micro-language from a hand-built seed, then uses each
//! iteration's own derived grammar as the parser for the next.
//!
//! [`seed_grammar`] is built directly through `GrammarBuilder` (no text
//! parsing involved) and carries real `Capture`/`Transform` nodes per
//! production, so parsing with it -- or with any grammar derived from it --
//! builds a `(name, Expr)` rule set directly via [`host::parse_and_reconstruct`],
//! with no side-channel reparse. [`bootstrap`] derives a grammar from
//! `minimal_text` using the seed, then repeatedly re-derives from
//! `richer_text` using the *previous iteration's own derived grammar* as the
//! parser, until two consecutive derivations agree ([`Grammar::equal_to`]) or
//! [`MAX_ITERATIONS`] is exceeded. [`self_host`] checks the stronger
//! invariant: that bootstrapping a dialect's own grammar text produces a
//! grammar structurally equal to what `parsek_meta`'s own canonical-dialect
//! parser builds from the same text.

mod error;
mod host;
mod seed;

pub use error::BootstrapError;
pub use seed::{SEED_TEXT, seed_grammar};

use parsek_core::{Grammar, GrammarBuilder};

/// Bound on the fixed-point loop in [`bootstrap`].
pub const MAX_ITERATIONS: u32 = 5;

fn build_grammar(rules: Vec<(String, parsek_core::Expr)>) -> Result<Grammar, BootstrapError> {
    let mut b = GrammarBuilder::new();
    for (name, body) in rules {
        b.rule(&name, body);
    }
    Ok(b.build()?)
}

/// Derive a grammar from `minimal_text` using the hand-built seed, then
/// iterate re-deriving from `richer_text` -- each pass parsing with the
/// *grammar the previous pass produced*, not the seed -- until two
/// consecutive derivations agree ([`Grammar::equal_to`]), or
/// [`MAX_ITERATIONS`] is exceeded.
pub fn bootstrap(minimal_text: &str, richer_text: &str) -> Result<Grammar, BootstrapError> {
    let seed = seed_grammar();

    let stage1 = host::parse_and_reconstruct(&seed, minimal_text)?;
    let mut current = build_grammar(stage1)?;

    for _ in 0..MAX_ITERATIONS {
        let rules = host::parse_and_reconstruct(&current, richer_text)?;
        let next = build_grammar(rules)?;
        if next.equal_to(&current) {
            return Ok(next);
        }
        current = next;
    }

    Err(BootstrapError::BootstrapDivergence(MAX_ITERATIONS))
}

/// Assert the self-hosting invariant for `dialect_text`: bootstrapping it
/// from itself (seeded, then refined against itself) must produce a grammar
/// structurally equal to what `parsek_meta::canonical` parses it into
/// directly. `dialect_text` must stay within this micro-language's subset of
/// the canonical surface (the subset [`SEED_TEXT`] itself is written in), or
/// the two pipelines have no reason to agree.
pub fn self_host(dialect_text: &str) -> Result<(), BootstrapError> {
    let bootstrapped = bootstrap(dialect_text, dialect_text)?;
    let canonical = parsek_meta::canonical::parse(dialect_text)?;

    if bootstrapped.equal_to(&canonical) {
        Ok(())
    } else {
        Err(BootstrapError::SelfHostMismatch)
    }
}

#[cfg(test)]
mod tests;

//! A memoizing PEG parsing engine with left-recursion support and action
//! binding.
//!
//! [`Engine::parse`] walks a [`parsek_core::Grammar`]'s clause arena directly
//! against an input string, producing a [`parsek_core::Match`] tree or a
//! [`ParseError`]. Left-recursive rules are handled with Warth et al.'s
//! grow-the-seed technique; binding parsed text to a caller's own value type
//! goes through the [`ActionHost`] trait in the [`engine`] module.

pub mod engine;

pub use engine::{ActionHost, ActionOutcome, ActionScope, Engine, EngineBuilder, FuelLimits, ParseError, evaluate};

//! Shared token stream for both textual dialects. `logos` splits the input
//! into punctuation, identifiers, and quoted-string tokens; character classes
//! and action bodies are NOT tokenized here -- they're scanned directly
//! against the source in `parser.rs`, since their contents (ranges, nested
//! braces, arbitrary text) don't fit a flat token grammar.

use std::ops::Range;

use logos::Logos;

use crate::error::MetaError;

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token("<-")]
    Arrow,
    #[token("::")]
    DoubleColon,
    #[token(":")]
    Colon,
    #[token("/")]
    Slash,
    #[token("|")]
    Pipe,
    #[token("?")]
    Question,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("&")]
    Amp,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("-")]
    Minus,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(".")]
    Dot,
    #[token("=")]
    Equals,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice().to_string())]
    DString(String),
    #[regex(r"'([^'\\]|\\.)*'", |lex| lex.slice().to_string())]
    SString(String),
}

pub type Spanned = (Token, Range<usize>);

/// Run `logos` over the whole input up front. Both dialects' parsers walk
/// this token vector with an index rather than pulling from the lexer lazily,
/// so a parser can jump the cursor past raw-scanned regions (character
/// classes, action bodies) by binary-searching for the next token whose span
/// starts past the scanned range.
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, MetaError> {
    let mut lexer = Token::lexer(src);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => return Err(MetaError::Lex(lexer.span().start)),
        }
    }
    Ok(tokens)
}

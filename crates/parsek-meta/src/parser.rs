//! Recursive-descent parsers for both textual dialects, sharing one
//! expression grammar (`Cursor`'s `parse_choice`/`parse_sequence`/
//! `parse_prefixed`/`parse_quantified`/`parse_primary` chain). Only the
//! top-level rule syntax, and a handful of dialect-only primary forms, differ
//! between canonical and bpeg; everything else -- literals, escapes,
//! character classes, captures, predicates, cut, actions -- is one
//! implementation both dialects fall through to.
//!
//! Neither dialect builds an intermediate lossless tree: a successful parse
//! produces `parsek_core::Expr` nodes directly, handed straight to
//! `GrammarBuilder`.

use std::ops::Range;

use parsek_core::{Expr, Grammar, GrammarBuilder};

use crate::error::MetaError;
use crate::lexer::{Token, tokenize};

const MAX_RECURSION: u32 = 256;
const MAX_FUEL: u32 = 1_000_000;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Canonical,
    Bpeg,
}

struct Cursor<'s> {
    src: &'s str,
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    depth: u32,
    fuel: u32,
    dialect: Dialect,
}

impl<'s> Cursor<'s> {
    fn new(src: &'s str, dialect: Dialect) -> Result<Self, MetaError> {
        let tokens = tokenize(src)?;
        Ok(Self {
            src,
            tokens,
            pos: 0,
            depth: 0,
            fuel: MAX_FUEL,
            dialect,
        })
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(t, _)| t)
    }

    fn current_span(&self) -> Range<usize> {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| s.clone())
            .unwrap_or(self.src.len()..self.src.len())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].0.clone();
        self.pos += 1;
        t
    }

    fn eat(&mut self, t: Token) -> bool {
        if self.current() == Some(&t) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, t: Token) -> Result<(), MetaError> {
        if self.eat(t) {
            Ok(())
        } else {
            Err(MetaError::UnexpectedToken(self.current_span().start))
        }
    }

    fn expect_ident(&mut self) -> Result<String, MetaError> {
        match self.current().cloned() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(MetaError::UnexpectedToken(self.current_span().start)),
        }
    }

    fn tick(&mut self) -> Result<(), MetaError> {
        if self.fuel == 0 {
            return Err(MetaError::FuelExhausted(self.current_span().start));
        }
        self.fuel -= 1;
        Ok(())
    }

    fn enter_recursion(&mut self) -> bool {
        if self.depth >= MAX_RECURSION {
            false
        } else {
            self.depth += 1;
            true
        }
    }

    fn exit_recursion(&mut self) {
        self.depth -= 1;
    }

    /// Advance `self.pos` past every token whose span starts before
    /// `byte_pos`, after a raw scan (character class, action body) consumed
    /// source text the token stream doesn't line up with.
    fn resync_to(&mut self, byte_pos: usize) {
        while let Some((_, span)) = self.tokens.get(self.pos) {
            if span.start >= byte_pos {
                break;
            }
            self.pos += 1;
        }
    }

    // ---- shared expression grammar ----

    fn parse_choice(&mut self) -> Result<Expr, MetaError> {
        self.tick()?;
        if !self.enter_recursion() {
            return Err(MetaError::RecursionLimit(self.current_span().start));
        }
        let mut alts = vec![self.parse_sequence()?];
        let sep = match self.dialect {
            Dialect::Canonical => Token::Slash,
            Dialect::Bpeg => Token::Pipe,
        };
        while self.eat(sep.clone()) {
            alts.push(self.parse_sequence()?);
        }
        self.exit_recursion();
        Ok(if alts.len() == 1 {
            alts.pop().expect("just pushed")
        } else {
            Expr::Choice(alts)
        })
    }

    fn parse_sequence(&mut self) -> Result<Expr, MetaError> {
        self.tick()?;
        let mut items = Vec::new();
        while self.at_prefixed_start() {
            items.push(self.parse_prefixed()?);
        }
        if items.is_empty() {
            return Err(MetaError::UnexpectedToken(self.current_span().start));
        }
        let mut body = if items.len() == 1 {
            items.pop().expect("just pushed")
        } else {
            Expr::Sequence(items)
        };
        if let Some(Token::LBrace) = self.current() {
            let span = self.current_span();
            self.pos += 1;
            let action = self.scan_action_body(span)?;
            body = Expr::Transform(Box::new(body), action);
        }
        Ok(body)
    }

    fn at_prefixed_start(&self) -> bool {
        match self.current() {
            // An identifier followed by `<-` starts the *next* rule, not a
            // reference inside this one -- this lookahead is what lets a
            // whitespace-insignificant grammar know where a sequence ends.
            Some(Token::Ident(_)) => {
                !matches!(self.peek(1), Some(Token::Arrow))
                    && !(self.dialect == Dialect::Bpeg && matches!(self.peek(1), Some(Token::Colon)))
            }
            Some(
                Token::Amp
                | Token::Bang
                | Token::Tilde
                | Token::LParen
                | Token::LBracket
                | Token::Dot
                | Token::DString(_)
                | Token::SString(_)
                | Token::Star,
            ) => true,
            _ => false,
        }
    }

    fn parse_prefixed(&mut self) -> Result<Expr, MetaError> {
        self.tick()?;
        if !self.enter_recursion() {
            return Err(MetaError::RecursionLimit(self.current_span().start));
        }
        let result = if self.eat(Token::Amp) {
            Expr::And(Box::new(self.parse_prefixed()?))
        } else if self.eat(Token::Bang) {
            Expr::Not(Box::new(self.parse_prefixed()?))
        } else if self.eat(Token::Tilde) {
            Expr::Entail(Box::new(self.parse_prefixed()?))
        } else {
            self.parse_captured()?
        };
        self.exit_recursion();
        Ok(result)
    }

    fn parse_captured(&mut self) -> Result<Expr, MetaError> {
        if matches!(self.current(), Some(Token::Star))
            && matches!(self.peek(1), Some(Token::Ident(_)))
            && matches!(self.peek(2), Some(Token::Equals))
        {
            self.pos += 1; // '*'
            let name = self.expect_ident()?;
            self.pos += 1; // '='
            let inner = self.parse_quantified()?;
            return Ok(Expr::Capture(Box::new(inner), name, true));
        }
        if matches!(self.current(), Some(Token::Ident(_))) && matches!(self.peek(1), Some(Token::Equals)) {
            let name = self.expect_ident()?;
            self.pos += 1; // '='
            let inner = self.parse_quantified()?;
            return Ok(Expr::Capture(Box::new(inner), name, false));
        }
        self.parse_quantified()
    }

    fn parse_quantified(&mut self) -> Result<Expr, MetaError> {
        let mut e = self.parse_primary()?;

        if self.dialect == Dialect::Bpeg
            && matches!(self.current(), Some(Token::Minus))
            && single_char(&e).is_some()
        {
            self.pos += 1;
            let hi = self.parse_primary()?;
            let (lo, hi) = match (single_char(&e), single_char(&hi)) {
                (Some(lo), Some(hi)) => (lo, hi),
                _ => return Err(MetaError::UnexpectedToken(self.current_span().start)),
            };
            e = Expr::Range(lo, hi);
        }

        loop {
            if self.eat(Token::Question) {
                e = Expr::Optional(Box::new(e));
            } else if self.eat(Token::Star) {
                e = Expr::Star(Box::new(e));
            } else if self.eat(Token::Plus) {
                e = Expr::Repeat(Box::new(e));
            } else {
                break;
            }
        }
        Ok(e)
    }

    fn parse_primary(&mut self) -> Result<Expr, MetaError> {
        self.tick()?;
        match self.current().cloned() {
            Some(Token::LParen) => {
                self.pos += 1;
                let e = self.parse_choice()?;
                self.expect(Token::RParen)?;
                Ok(e)
            }
            Some(Token::LBracket) if self.dialect == Dialect::Bpeg => {
                // bpeg's `[ e ]` optional, distinct from canonical's `[...]`
                // character class -- the two dialects never overlap here.
                self.pos += 1;
                let e = self.parse_choice()?;
                self.expect(Token::RBracket)?;
                Ok(Expr::Optional(Box::new(e)))
            }
            Some(Token::LBracket) => self.parse_char_class(),
            Some(Token::Dot) => {
                self.pos += 1;
                Ok(Expr::Any(1))
            }
            Some(Token::DString(_)) | Some(Token::SString(_)) => self.parse_string_literal(),
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(Expr::Reference(name))
            }
            _ => Err(MetaError::UnexpectedToken(self.current_span().start)),
        }
    }

    fn parse_string_literal(&mut self) -> Result<Expr, MetaError> {
        let (tok, span) = self.tokens[self.pos].clone();
        self.pos += 1;
        let raw = match &tok {
            Token::DString(s) | Token::SString(s) => s.clone(),
            _ => unreachable!("caller checked token kind"),
        };
        let chars = decode_string_body(&raw, span.start)?;

        if self.dialect == Dialect::Bpeg && self.eat(Token::DoubleColon) {
            let close = self.parse_primary()?;
            let close_chars = match close {
                Expr::Value(v) => v,
                _ => return Err(MetaError::UnexpectedToken(span.start)),
            };
            return Ok(delimited_literal(chars, close_chars));
        }

        Ok(if chars.is_empty() {
            Expr::Empty
        } else {
            Expr::Value(chars)
        })
    }

    fn parse_char_class(&mut self) -> Result<Expr, MetaError> {
        let open_span = self.current_span();
        self.pos += 1; // consume the `[` token itself

        let bytes = self.src.as_bytes();
        let mut i = open_span.end;
        loop {
            if i >= bytes.len() {
                return Err(MetaError::UnterminatedClass(open_span.start));
            }
            if bytes[i] == b'\\' {
                i += 2;
                continue;
            }
            if bytes[i] == b']' {
                break;
            }
            i += 1;
        }
        let content = &self.src[open_span.end..i];
        let class_end = i + 1;
        self.resync_to(class_end);

        let items = scan_class_items(content, open_span.start)?;
        Ok(if items.len() == 1 {
            items.into_iter().next().expect("len == 1")
        } else {
            Expr::Choice(items)
        })
    }

    fn scan_action_body(&mut self, open_span: Range<usize>) -> Result<String, MetaError> {
        let bytes = self.src.as_bytes();
        let mut depth = 1i32;
        let mut i = open_span.end;
        let start = i;
        while i < bytes.len() {
            match bytes[i] {
                b'{' => {
                    depth += 1;
                    i += 1;
                }
                b'}' => {
                    depth -= 1;
                    i += 1;
                    if depth == 0 {
                        break;
                    }
                }
                b'"' | b'\'' => {
                    let quote = bytes[i];
                    i += 1;
                    while i < bytes.len() && bytes[i] != quote {
                        if bytes[i] == b'\\' {
                            i += 1;
                        }
                        i += 1;
                    }
                    i += 1;
                }
                _ => i += 1,
            }
        }
        if depth != 0 {
            return Err(MetaError::UnterminatedAction(open_span.start));
        }
        let end = i - 1;
        let text = self.src[start..end].trim().to_string();
        self.resync_to(end + 1);
        Ok(text)
    }
}

/// `e - e` range sugar (bpeg) is only valid when both operands lowered to a
/// single-char literal; this recovers that char, or `None` if `e` is
/// anything else.
fn single_char(e: &Expr) -> Option<char> {
    match e {
        Expr::Value(v) if v.len() == 1 => Some(v[0]),
        _ => None,
    }
}

/// `open :: close` desugars to "match `open`, then anything up to the next
/// occurrence of `close`, then `close`" -- expressible entirely in terms of
/// existing clause kinds, so it needs no new `ClauseKind` variant.
fn delimited_literal(open: Vec<char>, close: Vec<char>) -> Expr {
    Expr::Sequence(vec![
        Expr::Value(open),
        Expr::Star(Box::new(Expr::Sequence(vec![
            Expr::Not(Box::new(Expr::Value(close.clone()))),
            Expr::Any(1),
        ]))),
        Expr::Value(close),
    ])
}

fn decode_string_body(raw: &str, origin: usize) -> Result<Vec<char>, MetaError> {
    let inner = &raw[1..raw.len() - 1];
    let chars: Vec<char> = inner.chars().collect();
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' {
            let (c, next) = decode_escape(&chars, i, origin)?;
            out.push(c);
            i = next;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    Ok(out)
}

fn scan_class_items(content: &str, origin: usize) -> Result<Vec<Expr>, MetaError> {
    let chars: Vec<char> = content.chars().collect();
    let mut items = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (lo, next) = decode_class_char(&chars, i, origin)?;
        i = next;
        if i < chars.len() && chars[i] == '-' && i + 1 < chars.len() {
            i += 1;
            let (hi, next) = decode_class_char(&chars, i, origin)?;
            i = next;
            items.push(Expr::Range(lo, hi));
        } else {
            items.push(Expr::Value(vec![lo]));
        }
    }
    if items.is_empty() {
        return Err(MetaError::UnterminatedClass(origin));
    }
    Ok(items)
}

fn decode_class_char(chars: &[char], i: usize, origin: usize) -> Result<(char, usize), MetaError> {
    if chars[i] == '\\' {
        decode_escape(chars, i, origin)
    } else {
        Ok((chars[i], i + 1))
    }
}

/// Decodes one escape sequence starting at the backslash `chars[i]`. Covers
/// `\n \r \t \ooo \uhhhh \Uhhhhhhhh` plus the literal-char escapes
/// `\' \" \[ \] \\`; any other backslashed punctuation (notably `\-`, needed
/// inside character classes to write a literal hyphen without it reading as
/// a range) is accepted and yields that character literally.
fn decode_escape(chars: &[char], i: usize, origin: usize) -> Result<(char, usize), MetaError> {
    debug_assert_eq!(chars[i], '\\');
    let next = i + 1;
    let c = *chars.get(next).ok_or(MetaError::InvalidEscape(origin))?;
    match c {
        'n' => Ok(('\n', next + 1)),
        'r' => Ok(('\r', next + 1)),
        't' => Ok(('\t', next + 1)),
        'u' => decode_hex_escape(chars, next + 1, 4, origin),
        'U' => decode_hex_escape(chars, next + 1, 8, origin),
        '0'..='7' => {
            let digits: String = chars[next..].iter().take_while(|c| ('0'..='7').contains(c)).take(3).collect();
            let code = u32::from_str_radix(&digits, 8).map_err(|_| MetaError::InvalidEscape(origin))?;
            let ch = char::from_u32(code).ok_or(MetaError::InvalidEscape(origin))?;
            Ok((ch, next + digits.len()))
        }
        other if !other.is_alphanumeric() => Ok((other, next + 1)),
        _ => Err(MetaError::InvalidEscape(origin)),
    }
}

fn decode_hex_escape(chars: &[char], start: usize, width: usize, origin: usize) -> Result<(char, usize), MetaError> {
    let digits: String = chars.get(start..start + width).ok_or(MetaError::InvalidEscape(origin))?.iter().collect();
    let code = u32::from_str_radix(&digits, 16).map_err(|_| MetaError::InvalidEscape(origin))?;
    let ch = char::from_u32(code).ok_or(MetaError::InvalidEscape(origin))?;
    Ok((ch, start + width))
}

// ---- dialect-specific top level ----

/// Parse canonical `name <- expr` rules until the input is exhausted, then
/// hand the result to `GrammarBuilder`.
pub fn parse_canonical(src: &str) -> Result<Grammar, MetaError> {
    let mut cur = Cursor::new(src, Dialect::Canonical)?;
    let mut builder = GrammarBuilder::new();
    while !cur.at_end() {
        let name = cur.expect_ident()?;
        cur.expect(Token::Arrow)?;
        let body = cur.parse_choice()?;
        builder.rule(&name, body);
    }
    Ok(builder.build()?)
}

/// Parse bpeg `name:` headers, each followed by one or more `| expr { action }`
/// cases. `|` doubles as both the case separator and, within an expression,
/// ordered choice -- structurally the same operator at the same precedence
/// level, since bpeg's line breaks carry no syntactic weight.
pub fn parse_bpeg(src: &str) -> Result<Grammar, MetaError> {
    let mut cur = Cursor::new(src, Dialect::Bpeg)?;
    let mut builder = GrammarBuilder::new();
    while !cur.at_end() {
        let name = cur.expect_ident()?;
        cur.expect(Token::Colon)?;
        cur.eat(Token::Pipe);
        let body = cur.parse_choice()?;
        builder.rule(&name, body);
    }
    Ok(builder.build()?)
}

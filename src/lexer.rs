//! Single-pass recursive-descent-friendly lexer.
//!
//! Produces a token stream ending with `Eof`. Keywords are reserved exactly.
//! Comments (`//`, `--`, `/* */`) are skipped. Failures (invalid character,
//! unterminated comment, invalid number) are recorded as diagnostics and
//! lexing continues so later phases can still surface further errors.

use crate::diagnostics::{Code, Diagnostic, DiagnosticCollector};
use crate::intern::Interner;
use crate::token::{Pos, Span, Token, TokenKind};

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
    interner: &'a mut Interner,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, interner: &'a mut Interner) -> Self {
        Self { source, bytes: source.as_bytes(), pos: 0, line: 1, col: 1, interner }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, DiagnosticCollector) {
        let mut out = Vec::new();
        let mut diags = DiagnosticCollector::new();
        loop {
            self.skip_trivia(&mut diags);
            let start = self.pos;
            let start_pos = self.here();
            if self.pos >= self.bytes.len() {
                out.push(Token::new(TokenKind::Eof, self.span(start, start_pos)));
                break;
            }
            let c = self.bytes[self.pos] as char;
            let kind = if c.is_ascii_alphabetic() || c == '_' {
                self.lex_ident()
            } else if c.is_ascii_digit() {
                self.lex_number(&mut diags)
            } else {
                self.lex_operator(&mut diags)
            };
            out.push(Token::new(kind, self.span(start, start_pos)));
        }
        (out, diags)
    }

    fn here(&self) -> Pos {
        Pos { line: self.line, col: self.col }
    }

    fn span(&self, start: usize, start_pos: Pos) -> Span {
        Span::new(start, self.pos, start_pos, self.here())
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn skip_trivia(&mut self, diags: &mut DiagnosticCollector) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while self.peek().is_some() && self.peek() != Some(b'\n') {
                        self.advance();
                    }
                }
                Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    while self.peek().is_some() && self.peek() != Some(b'\n') {
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    let start_pos = self.here();
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while self.peek().is_some() {
                        if self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/') {
                            self.advance();
                            self.advance();
                            closed = true;
                            break;
                        }
                        self.advance();
                    }
                    if !closed {
                        diags.push(Diagnostic::new(
                            Code::UnterminatedComment,
                            self.span(start, start_pos),
                            "unterminated block comment",
                        ));
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_ident(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(b) = self.peek() {
            let c = b as char;
            if c.is_ascii_alphanumeric() || c == '_' || c == '\'' && false {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        keyword_or_ident(text, self.interner)
    }

    fn lex_number(&mut self, diags: &mut DiagnosticCollector) -> TokenKind {
        let start = self.pos;
        let start_pos = self.here();
        while matches!(self.peek(), Some(b) if (b as char).is_ascii_digit()) {
            self.advance();
        }
        let text = &self.source[start..self.pos];
        match text.parse::<i64>() {
            Ok(v) => TokenKind::Integer(v),
            Err(_) => {
                diags.push(Diagnostic::new(
                    Code::InvalidNumber,
                    self.span(start, start_pos),
                    format!("invalid integer literal '{text}'"),
                ));
                TokenKind::Integer(0)
            }
        }
    }

    fn lex_operator(&mut self, diags: &mut DiagnosticCollector) -> TokenKind {
        let start = self.pos;
        let start_pos = self.here();
        let c = self.advance().unwrap() as char;
        macro_rules! two {
            ($next:expr, $then:expr, $else_:expr) => {{
                if self.peek() == Some($next as u8) {
                    self.advance();
                    $then
                } else {
                    $else_
                }
            }};
        }
        match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ':' => two!(':', unreachable!(), {
                if self.peek() == Some(b'>') {
                    self.advance();
                    TokenKind::ColonGt
                } else {
                    TokenKind::Colon
                }
            }),
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semicolon,
            '|' => two!('|', TokenKind::OrOr, TokenKind::Bar),
            '@' => TokenKind::At,
            '\'' => TokenKind::Quote,
            '^' => TokenKind::Caret,
            '*' => TokenKind::Star,
            '~' => TokenKind::Tilde,
            '#' => TokenKind::Hash,
            '+' => two!('+', TokenKind::PlusPlus, TokenKind::Plus),
            '-' => {
                if self.peek() == Some(b'>') {
                    self.advance();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '&' => two!('&', TokenKind::AndAnd, TokenKind::Amp),
            '<' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    if self.peek() == Some(b'>') {
                        self.advance();
                        TokenKind::IffArrow
                    } else {
                        TokenKind::Le
                    }
                } else if self.peek() == Some(b':') {
                    self.advance();
                    TokenKind::LtColon
                } else {
                    TokenKind::Lt
                }
            }
            '=' => {
                if self.peek() == Some(b'>') {
                    self.advance();
                    TokenKind::ImpliesArrow
                } else if self.peek() == Some(b'<') {
                    // legacy `=<` spelling of `<=`
                    self.advance();
                    TokenKind::Le
                } else {
                    TokenKind::Eq
                }
            }
            '>' => two!('=', TokenKind::Ge, TokenKind::Gt),
            '!' => two!('=', TokenKind::Neq, TokenKind::Bang),
            other => {
                diags.push(Diagnostic::new(
                    Code::InvalidCharacter,
                    self.span(start, start_pos),
                    format!("invalid character '{other}'"),
                ));
                TokenKind::Invalid
            }
        }
    }
}

fn keyword_or_ident(text: &str, interner: &mut Interner) -> TokenKind {
    use TokenKind::*;
    match text {
        "module" => Module,
        "open" => Open,
        "as" => As,
        "sig" => Sig,
        "abstract" => Abstract,
        "extends" => Extends,
        "in" => In,
        "enum" => Enum,
        "var" => Var,
        "private" => Private,
        "disj" => Disj,
        "fact" => Fact,
        "pred" => Pred,
        "fun" => Fun,
        "assert" => Assert,
        "run" => Run,
        "check" => Check,
        "for" => For,
        "but" => But,
        "exactly" => Exactly,
        "steps" => Steps,
        "expect" => Expect,
        "int" => IntKw,
        "set" => Set,
        "one" => One,
        "lone" => Lone,
        "some" => SomeKw,
        "no" => NoKw,
        "all" => AllKw,
        "sum" => Sum,
        "and" => And,
        "or" => Or,
        "not" => Not,
        "iff" => Iff,
        "implies" => Implies,
        "else" => Else,
        "let" => Let,
        "univ" => Univ,
        "none" => None_,
        "iden" => Iden,
        "Int" => IntType,
        "always" => Always,
        "eventually" => Eventually,
        "after" => After,
        "until" => Until,
        "releases" => Releases,
        "historically" => Historically,
        "once" => Once,
        "before" => Before,
        "since" => Since,
        "triggered" => Triggered,
        _ => Ident(interner.intern(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> (Vec<TokenKind>, Interner) {
        let mut interner = Interner::new();
        let (tokens, diags) = Lexer::new(src, &mut interner).tokenize();
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags.sorted());
        (tokens.into_iter().map(|t| t.kind).collect(), interner)
    }

    #[test]
    fn lexes_signature_declaration() {
        let (kinds, _) = toks("sig Person { friends: set Person }");
        let shapes: Vec<&str> = kinds.iter().map(token_shape).collect();
        assert_eq!(
            shapes,
            vec!["sig", "ident", "{", "ident", ":", "set", "ident", "}", "eof"]
        );
    }

    fn token_shape(k: &TokenKind) -> &'static str {
        match k {
            TokenKind::Sig => "sig",
            TokenKind::Ident(_) => "ident",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Colon => ":",
            TokenKind::Set => "set",
            TokenKind::Eof => "eof",
            _ => "other",
        }
    }

    #[test]
    fn operators_le_ge_and_legacy_spelling() {
        let (kinds, _) = toks("<= >= =< <=> => <: :>");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Le,
                TokenKind::IffArrow,
                TokenKind::ImpliesArrow,
                TokenKind::LtColon,
                TokenKind::ColonGt,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let (kinds, _) = toks("sig // line\nA -- also line\n{} /* block */");
        let shapes: Vec<&str> = kinds.iter().map(token_shape).collect();
        assert_eq!(shapes, vec!["sig", "ident", "{", "}", "eof"]);
    }

    #[test]
    fn unterminated_comment_is_reported() {
        let mut interner = Interner::new();
        let (_tokens, diags) = Lexer::new("sig A {} /* oops", &mut interner).tokenize();
        assert!(!diags.is_empty());
        assert_eq!(diags.sorted()[0].code, Code::UnterminatedComment);
    }

    #[test]
    fn minus_is_a_separate_token_from_integer() {
        let (kinds, _) = toks("-5");
        assert_eq!(kinds, vec![TokenKind::Minus, TokenKind::Integer(5), TokenKind::Eof]);
    }

    #[test]
    fn invalid_character_is_reported_and_lexing_continues() {
        let mut interner = Interner::new();
        let (tokens, diags) = Lexer::new("sig $ A", &mut interner).tokenize();
        assert!(!diags.is_empty());
        assert_eq!(diags.sorted()[0].code, Code::InvalidCharacter);
        // the bad character gets its own token kind, distinct from `Eof`, so
        // the real end of the stream is still only the last token.
        let eof_positions: Vec<usize> =
            tokens.iter().enumerate().filter(|(_, t)| matches!(t.kind, TokenKind::Eof)).map(|(i, _)| i).collect();
        assert_eq!(eof_positions, vec![tokens.len() - 1]);
        assert!(tokens.iter().any(|t| matches!(t.kind, TokenKind::Invalid)));
        // lexing continued past the bad character to the trailing identifier
        assert!(tokens.iter().any(|t| matches!(t.kind, TokenKind::Ident(_))));
    }
}

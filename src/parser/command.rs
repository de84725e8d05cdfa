//! `run`/`check` command and scope parsing.

use super::{span_between, Parser};
use crate::ast::*;
use crate::token::TokenKind;

impl<'a> Parser<'a> {
    pub(crate) fn parse_command(&mut self) -> CommandDecl {
        let start = self.current_span();
        let kind = if self.eat(&TokenKind::Run) {
            let target = if let TokenKind::Ident(s) = self.peek().clone() {
                self.advance();
                Some(s)
            } else {
                None
            };
            let mut inline_body = None;
            let args = if self.eat(&TokenKind::LBracket) {
                let mut args = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        args.push(self.parse_expr());
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket, "']'");
                args
            } else if self.eat(&TokenKind::LBrace) {
                // inline `run { formula }` body; represented as a single
                // anonymous predicate body rather than a named target.
                inline_body = Some(self.parse_block_formula());
                self.expect(TokenKind::RBrace, "'}'");
                Vec::new()
            } else {
                Vec::new()
            };
            CommandKind::Run { target, args, inline_body }
        } else {
            self.expect(TokenKind::Check, "'check'");
            let target = self.expect_ident("assertion name");
            CommandKind::Check { target }
        };

        let scope = self.parse_scope();
        let end = self.current_span();
        CommandDecl { name: None, kind, scope, span: span_between(start, end) }
    }

    fn parse_scope(&mut self) -> Scope {
        let mut scope = Scope::default();
        if !self.eat(&TokenKind::For) {
            return scope;
        }
        // `for N` or `for N but ...` or `for N int`
        if let TokenKind::Integer(n) = self.peek().clone() {
            self.advance();
            if self.eat(&TokenKind::IntKw) {
                scope.int_bitwidth = Some(n as u32);
            } else {
                scope.default_scope = Some(n as u32);
            }
        }

        if self.eat(&TokenKind::But) {
            loop {
                self.parse_scope_clause(&mut scope);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        while self.eat(&TokenKind::Comma) {
            self.parse_scope_clause(&mut scope);
        }

        scope
    }

    fn parse_scope_clause(&mut self, scope: &mut Scope) {
        if self.eat(&TokenKind::Expect) {
            if let TokenKind::Integer(n) = self.peek().clone() {
                self.advance();
                scope.expect = Some(n);
            }
            return;
        }
        let exact = self.eat(&TokenKind::Exactly);
        if let TokenKind::Integer(n) = self.peek().clone() {
            self.advance();
            if self.eat(&TokenKind::Steps) {
                scope.steps = Some(n as u32);
            } else if self.eat(&TokenKind::IntKw) {
                scope.int_bitwidth = Some(n as u32);
            } else {
                let span = self.current_span();
                let sig = self.expect_ident("signature name");
                scope.per_sig.push(SigScope { sig, count: n as u32, exact, span });
            }
        }
    }
}

//! Expression precedence climbing.

use super::{span_between, Parser};
use crate::ast::*;
use crate::diagnostics::{Code, Diagnostic};
use crate::token::TokenKind;

impl<'a> Parser<'a> {
    pub fn parse_expr(&mut self) -> Expr {
        self.parse_union_diff()
    }

    fn parse_union_diff(&mut self) -> Expr {
        let start = self.current_span();
        let mut lhs = self.parse_intersect();
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Union,
                TokenKind::Minus => BinOp::Diff,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_intersect();
            let span = span_between(start, self.current_span());
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn parse_intersect(&mut self) -> Expr {
        let start = self.current_span();
        let mut lhs = self.parse_override();
        while self.eat(&TokenKind::Amp) {
            let rhs = self.parse_override();
            let span = span_between(start, self.current_span());
            lhs = Expr::new(ExprKind::Binary(BinOp::Intersect, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn parse_override(&mut self) -> Expr {
        let start = self.current_span();
        let mut lhs = self.parse_product();
        while self.eat(&TokenKind::PlusPlus) {
            let rhs = self.parse_product();
            let span = span_between(start, self.current_span());
            lhs = Expr::new(ExprKind::Binary(BinOp::Override, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn parse_product(&mut self) -> Expr {
        let start = self.current_span();
        let mut lhs = self.parse_restrict();
        while self.eat(&TokenKind::Arrow) {
            let rhs = self.parse_restrict();
            let span = span_between(start, self.current_span());
            lhs = Expr::new(ExprKind::Binary(BinOp::Product, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn parse_restrict(&mut self) -> Expr {
        let start = self.current_span();
        let mut lhs = self.parse_join();
        loop {
            let op = match self.peek() {
                TokenKind::LtColon => BinOp::DomainRestrict,
                TokenKind::ColonGt => BinOp::RangeRestrict,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_join();
            let span = span_between(start, self.current_span());
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn parse_join(&mut self) -> Expr {
        let start = self.current_span();
        let mut lhs = self.parse_unary();
        while self.eat(&TokenKind::Dot) {
            let rhs = self.parse_unary();
            let span = span_between(start, self.current_span());
            lhs = Expr::new(ExprKind::Binary(BinOp::Join, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        let start = self.current_span();
        let op = match self.peek() {
            TokenKind::Tilde => Some(UnOp::Transpose),
            TokenKind::Caret => Some(UnOp::Closure),
            TokenKind::Star => Some(UnOp::ReflexiveClosure),
            TokenKind::Hash => Some(UnOp::Cardinality),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let inner = self.parse_unary();
            let span = span_between(start, self.current_span());
            return Expr::new(ExprKind::Unary(op, Box::new(inner)), span);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Expr {
        let start = self.current_span();
        let mut expr = match self.peek().clone() {
            TokenKind::Integer(v) => {
                self.advance();
                Expr::new(ExprKind::IntLiteral(v), start)
            }
            TokenKind::Minus => {
                self.advance();
                if let TokenKind::Integer(v) = self.peek().clone() {
                    self.advance();
                    Expr::new(ExprKind::IntLiteral(-v), span_between(start, self.current_span()))
                } else {
                    let inner = self.parse_unary();
                    Expr::new(
                        ExprKind::Binary(BinOp::Diff, Box::new(zero_expr(start)), Box::new(inner)),
                        span_between(start, self.current_span()),
                    )
                }
            }
            TokenKind::Univ => {
                self.advance();
                Expr::new(ExprKind::Univ, start)
            }
            TokenKind::None_ => {
                self.advance();
                Expr::new(ExprKind::None_, start)
            }
            TokenKind::Iden => {
                self.advance();
                Expr::new(ExprKind::Iden, start)
            }
            TokenKind::IntType => {
                self.advance();
                Expr::new(ExprKind::IntType, start)
            }
            TokenKind::At => {
                self.advance();
                let name = self.expect_ident("name after '@'");
                Expr::new(ExprKind::AtName(name), span_between(start, self.current_span()))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(TokenKind::RParen, "')'");
                inner
            }
            TokenKind::LBrace => self.parse_comprehension(),
            TokenKind::Let => self.parse_let_expr(),
            TokenKind::Sum => self.parse_sum_expr(),
            TokenKind::Ident(name) => {
                self.advance();
                Expr::new(ExprKind::Name(name), start)
            }
            _ => {
                let span = self.current_span();
                self.diags.push(Diagnostic::new(
                    Code::UnexpectedToken,
                    span,
                    format!("expected an expression, found {:?}", self.peek()),
                ));
                self.advance();
                Expr::new(ExprKind::None_, span)
            }
        };

        loop {
            if self.eat(&TokenKind::LBracket) {
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
                let span = span_between(start, self.current_span());
                expr = Expr::new(ExprKind::BoxJoin { base: Box::new(expr), args }, span);
            } else if self.eat(&TokenKind::Quote) {
                let span = span_between(start, self.current_span());
                expr = Expr::new(ExprKind::Prime(Box::new(expr)), span);
            } else {
                break;
            }
        }
        expr
    }

    fn parse_comprehension(&mut self) -> Expr {
        let start = self.current_span();
        self.expect(TokenKind::LBrace, "'{'");
        let decls = self.parse_quant_decls();
        self.expect(TokenKind::Bar, "'|'");
        let body = self.parse_formula();
        self.expect(TokenKind::RBrace, "'}'");
        let span = span_between(start, self.current_span());
        Expr::new(ExprKind::Comprehension { decls, body: Box::new(body) }, span)
    }

    fn parse_let_expr(&mut self) -> Expr {
        let start = self.current_span();
        self.expect(TokenKind::Let, "'let'");
        let name = self.expect_ident("let-bound name");
        self.expect(TokenKind::Eq, "'='");
        let value = self.parse_expr();
        self.expect(TokenKind::Bar, "'|'");
        let body = self.parse_expr();
        let span = span_between(start, self.current_span());
        Expr::new(ExprKind::Let { name, value: Box::new(value), body: Box::new(body) }, span)
    }

    fn parse_sum_expr(&mut self) -> Expr {
        let start = self.current_span();
        self.expect(TokenKind::Sum, "'sum'");
        let decls = self.parse_quant_decls();
        self.expect(TokenKind::Bar, "'|'");
        let body = self.parse_expr();
        let span = span_between(start, self.current_span());
        Expr::new(ExprKind::Sum { decls, body: Box::new(body) }, span)
    }

    /// `[disj] x, y: T, [disj] z: U, ...`
    pub(crate) fn parse_quant_decls(&mut self) -> Vec<QuantDecl> {
        let mut decls = Vec::new();
        loop {
            let start = self.current_span();
            let disj = self.eat(&TokenKind::Disj);
            let mut names = vec![self.expect_ident("bound variable")];
            while self.eat(&TokenKind::Comma) {
                if matches!(self.peek(), TokenKind::Ident(_))
                    && names_share_type_ahead(self)
                {
                    names.push(self.expect_ident("bound variable"));
                } else {
                    self.unadvance();
                    break;
                }
            }
            self.expect(TokenKind::Colon, "':'");
            let ty = self.parse_expr();
            let span = span_between(start, self.current_span());
            decls.push(QuantDecl { names, disj, ty, span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            // if what follows isn't a bindable start, this comma belonged to
            // an outer construct; step back.
            if !matches!(self.peek(), TokenKind::Ident(_)) && !matches!(self.peek(), TokenKind::Disj) {
                self.unadvance();
                break;
            }
        }
        decls
    }

    pub(crate) fn unadvance(&mut self) {
        self.step_back();
    }
}

fn names_share_type_ahead(p: &Parser) -> bool {
    // `x, y: T` vs `x, T2 decl-start-of-next-thing`: a following `,` or `:`
    // after the next identifier means it's still a name list.
    matches!(p.peek_at(1), TokenKind::Comma | TokenKind::Colon)
}

fn zero_expr(span: crate::token::Span) -> Expr {
    Expr::new(ExprKind::IntLiteral(0), span)
}

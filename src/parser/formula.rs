//! Formula precedence climbing.

use super::{span_between, Parser};
use crate::ast::*;
use crate::token::TokenKind;

fn continues_as_expr(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Eq
            | TokenKind::Neq
            | TokenKind::Lt
            | TokenKind::Le
            | TokenKind::Gt
            | TokenKind::Ge
            | TokenKind::In
            | TokenKind::Not
            | TokenKind::Dot
            | TokenKind::Amp
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Arrow
            | TokenKind::PlusPlus
            | TokenKind::LtColon
            | TokenKind::ColonGt
            | TokenKind::Quote
            | TokenKind::LBracket
    )
}

impl<'a> Parser<'a> {
    pub fn parse_formula(&mut self) -> Formula {
        self.parse_iff()
    }

    fn parse_iff(&mut self) -> Formula {
        let start = self.current_span();
        let mut lhs = self.parse_implies();
        while self.eat_iff() {
            let rhs = self.parse_implies();
            let span = span_between(start, self.current_span());
            lhs = Formula::new(FormulaKind::Binary(FormulaBinOp::Iff, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn eat_iff(&mut self) -> bool {
        matches!(self.peek(), TokenKind::IffArrow | TokenKind::Iff) && {
            self.advance();
            true
        }
    }

    fn parse_implies(&mut self) -> Formula {
        let start = self.current_span();
        let lhs = self.parse_or();
        if self.eat_implies() {
            let then_branch = self.parse_implies();
            let else_branch = if self.eat(&TokenKind::Else) { Some(Box::new(self.parse_implies())) } else { None };
            let span = span_between(start, self.current_span());
            return Formula::new(
                FormulaKind::IfElse { cond: Box::new(lhs), then_branch: Box::new(then_branch), else_branch },
                span,
            );
        }
        lhs
    }

    fn eat_implies(&mut self) -> bool {
        matches!(self.peek(), TokenKind::ImpliesArrow | TokenKind::Implies) && {
            self.advance();
            true
        }
    }

    fn parse_or(&mut self) -> Formula {
        let start = self.current_span();
        let mut lhs = self.parse_and();
        while matches!(self.peek(), TokenKind::OrOr | TokenKind::Or) {
            self.advance();
            let rhs = self.parse_and();
            let span = span_between(start, self.current_span());
            lhs = Formula::new(FormulaKind::Binary(FormulaBinOp::Or, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn parse_and(&mut self) -> Formula {
        let start = self.current_span();
        let mut lhs = self.parse_temporal_binary();
        while matches!(self.peek(), TokenKind::AndAnd | TokenKind::And) {
            self.advance();
            let rhs = self.parse_temporal_binary();
            let span = span_between(start, self.current_span());
            lhs = Formula::new(FormulaKind::Binary(FormulaBinOp::And, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn parse_temporal_binary(&mut self) -> Formula {
        let start = self.current_span();
        let mut lhs = self.parse_prefix();
        loop {
            let op = match self.peek() {
                TokenKind::Until => TemporalBinOp::Until,
                TokenKind::Releases => TemporalBinOp::Releases,
                TokenKind::Since => TemporalBinOp::Since,
                TokenKind::Triggered => TemporalBinOp::Triggered,
                TokenKind::Semicolon => TemporalBinOp::Sequence,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_prefix();
            let span = span_between(start, self.current_span());
            lhs = Formula::new(FormulaKind::TemporalBinary(op, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn parse_prefix(&mut self) -> Formula {
        let start = self.current_span();
        if matches!(self.peek(), TokenKind::Not | TokenKind::Bang) {
            self.advance();
            let inner = self.parse_prefix();
            let span = span_between(start, self.current_span());
            return Formula::new(FormulaKind::Not(Box::new(inner)), span);
        }
        let temporal_op = match self.peek() {
            TokenKind::Always => Some(TemporalUnOp::Always),
            TokenKind::Eventually => Some(TemporalUnOp::Eventually),
            TokenKind::After => Some(TemporalUnOp::After),
            TokenKind::Historically => Some(TemporalUnOp::Historically),
            TokenKind::Once => Some(TemporalUnOp::Once),
            TokenKind::Before => Some(TemporalUnOp::Before),
            _ => None,
        };
        if let Some(op) = temporal_op {
            self.advance();
            let inner = self.parse_prefix();
            let span = span_between(start, self.current_span());
            return Formula::new(FormulaKind::TemporalUnary(op, Box::new(inner)), span);
        }
        self.parse_quantified_or_let()
    }

    /// Handles the quantifier / let primary forms, then falls through to
    /// comparison/multiplicity parsing. Also resolves the `one|lone|some|no`
    /// multiplicity-vs-quantifier ambiguity.
    fn parse_quantified_or_let(&mut self) -> Formula {
        let start = self.current_span();
        if self.check(&TokenKind::Let) {
            self.advance();
            let name = self.expect_ident("let-bound name");
            self.expect(TokenKind::Eq, "'='");
            let value = self.parse_expr();
            self.expect(TokenKind::Bar, "'|'");
            let body = self.parse_formula();
            let span = span_between(start, self.current_span());
            return Formula::new(FormulaKind::Let { name, value: Box::new(value), body: Box::new(body) }, span);
        }

        let quantifier = match self.peek() {
            TokenKind::AllKw => Some(Quantifier::All),
            TokenKind::SomeKw if self.looks_like_quantifier_decl(1) => Some(Quantifier::Some),
            TokenKind::NoKw if self.looks_like_quantifier_decl(1) => Some(Quantifier::No),
            TokenKind::One if self.looks_like_quantifier_decl(1) => Some(Quantifier::One),
            TokenKind::Lone if self.looks_like_quantifier_decl(1) => Some(Quantifier::Lone),
            TokenKind::Sum => Some(Quantifier::Some), // `sum` as a formula quantifier does not exist; handled in expr.
            _ => None,
        };
        if let Some(q) = quantifier {
            self.advance();
            let decls = self.parse_quant_decls();
            self.expect(TokenKind::Bar, "'|'");
            let body = self.parse_formula();
            let span = span_between(start, self.current_span());
            return Formula::new(FormulaKind::Quantified { quantifier: q, decls, body: Box::new(body) }, span);
        }

        self.parse_comparison_or_mult()
    }

    /// Lookahead: does `[disj] name(, name)* :` follow at `self.peek_at(offset)`?
    fn looks_like_quantifier_decl(&self, offset: usize) -> bool {
        let mut i = offset;
        if matches!(self.peek_at(i), TokenKind::Disj) {
            i += 1;
        }
        if !matches!(self.peek_at(i), TokenKind::Ident(_)) {
            return false;
        }
        i += 1;
        loop {
            match self.peek_at(i) {
                TokenKind::Colon => return true,
                TokenKind::Comma => {
                    i += 1;
                    if matches!(self.peek_at(i), TokenKind::Ident(_)) {
                        i += 1;
                        continue;
                    }
                    return false;
                }
                _ => return false,
            }
        }
    }

    fn parse_comparison_or_mult(&mut self) -> Formula {
        let start = self.current_span();

        let mult = match self.peek() {
            TokenKind::SomeKw => Some(Mult::Some),
            TokenKind::NoKw => Some(Mult::No),
            TokenKind::One => Some(Mult::One),
            TokenKind::Lone => Some(Mult::Lone),
            _ => None,
        };
        if let Some(m) = mult {
            self.advance();
            let expr = self.parse_expr();
            let span = span_between(start, self.current_span());
            return Formula::new(FormulaKind::Multiplicity(m, Box::new(expr)), span);
        }

        if self.check(&TokenKind::LParen) {
            // Could be a parenthesized formula or a parenthesized expression
            // used as the left operand of a comparison (`(a.b) = c`). Try
            // the formula interpretation; if what follows the closing paren
            // continues an expression (a comparison or further expr-level
            // operator), the parens were around an expression instead, so
            // backtrack and let `parse_expr` own them.
            let pos_mark = self.position();
            let diag_mark = self.diag_mark();
            self.advance();
            let inner = self.parse_formula();
            if self.eat(&TokenKind::RParen) && !continues_as_expr(self.peek()) {
                return inner;
            }
            self.set_position(pos_mark);
            self.diag_truncate(diag_mark);
        }

        let lhs = self.parse_expr();
        self.finish_comparison_expr(lhs, start)
    }

    fn finish_comparison_expr(&mut self, lhs: crate::ast::Expr, start: crate::token::Span) -> Formula {
        let op = match self.peek() {
            TokenKind::Eq => Some(CompareOp::Eq),
            TokenKind::Neq => Some(CompareOp::Neq),
            TokenKind::Lt => Some(CompareOp::Lt),
            TokenKind::Le => Some(CompareOp::Le),
            TokenKind::Gt => Some(CompareOp::Gt),
            TokenKind::Ge => Some(CompareOp::Ge),
            TokenKind::In => Some(CompareOp::In),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let rhs = self.parse_expr();
            let span = span_between(start, self.current_span());
            return Formula::new(FormulaKind::Comparison(op, Box::new(lhs), Box::new(rhs)), span);
        }
        if self.check(&TokenKind::Not) && matches!(self.peek_at(1), TokenKind::In) {
            self.advance();
            self.advance();
            let rhs = self.parse_expr();
            let span = span_between(start, self.current_span());
            return Formula::new(FormulaKind::Comparison(CompareOp::NotIn, Box::new(lhs), Box::new(rhs)), span);
        }
        let span = span_between(start, self.current_span());
        Formula::new(FormulaKind::ExprAsFormula(Box::new(lhs)), span)
    }
}

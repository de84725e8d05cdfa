//! Paragraph-level declarations.

use crate::ast::expr::{Expr, Formula, Mult, QuantDecl};
use crate::intern::Symbol;
use crate::token::Span;

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: Symbol,
    pub mult: Option<Mult>,
    pub disj: bool,
    pub var: bool,
    pub ty: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SigDecl {
    pub name: Symbol,
    pub abstract_: bool,
    pub mult: Option<Mult>,
    pub var: bool,
    pub private: bool,
    pub extends: Option<Symbol>,
    pub in_parents: Vec<Symbol>,
    pub fields: Vec<FieldDecl>,
    pub sig_facts: Vec<Formula>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: Symbol,
    pub values: Vec<Symbol>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FactDecl {
    pub name: Option<Symbol>,
    pub body: Formula,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: Symbol,
    pub mult: Option<Mult>,
    pub ty: Expr,
    pub span: Span,
}

/// A predicate/function receiver `Sig.name(...)`. The receiver is always
/// bound to the name `this` inside the body.
#[derive(Debug, Clone)]
pub struct Receiver {
    pub sig: Symbol,
}

#[derive(Debug, Clone)]
pub struct PredDecl {
    pub name: Symbol,
    pub receiver: Option<Receiver>,
    pub params: Vec<ParamDecl>,
    pub body: Formula,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunDecl {
    pub name: Symbol,
    pub receiver: Option<Receiver>,
    pub params: Vec<ParamDecl>,
    pub return_mult: Option<Mult>,
    pub return_ty: Expr,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AssertDecl {
    pub name: Symbol,
    pub body: Formula,
    pub span: Span,
}

/// Per-signature scope override: `N Sig` or `exactly N Sig`.
#[derive(Debug, Clone)]
pub struct SigScope {
    pub sig: Symbol,
    pub count: u32,
    pub exact: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub default_scope: Option<u32>,
    pub per_sig: Vec<SigScope>,
    pub steps: Option<u32>,
    pub int_bitwidth: Option<u32>,
    pub expect: Option<i64>,
}

#[derive(Debug, Clone)]
pub enum CommandKind {
    Run { target: Option<Symbol>, args: Vec<Expr>, inline_body: Option<Formula> },
    Check { target: Symbol },
}

#[derive(Debug, Clone)]
pub struct CommandDecl {
    pub name: Option<Symbol>,
    pub kind: CommandKind,
    pub scope: Scope,
    pub span: Span,
}

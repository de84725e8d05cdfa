//! Formula Encoder: walks the formula AST and returns a
//! `BooleanFormula`, deferring to `expr_encoder` for relational/integer
//! sub-expressions and to `temporal` for LTL operators.

use crate::ast::{CompareOp, Formula, FormulaBinOp, FormulaKind, Mult, Quantifier};
use crate::context::TranslationContext;
use crate::encode::expr_encoder::{encode_expr, encode_predicate_call, flatten_decls, for_each_assignment, resolve_call, EncodedExpr};
use crate::encode::temporal::{encode_temporal_binary, encode_temporal_unary};
use crate::encode::Declarations;
use crate::kernel::bool_formula::BooleanFormula;
use crate::semantics::symtab::{ScopeId, ScopeKind, SymbolKind, SymbolRecord};
use crate::semantics::types::Type;

pub fn encode_formula(formula: &Formula, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> BooleanFormula {
    match &formula.kind {
        FormulaKind::Const(b) => BooleanFormula::Const(*b),
        FormulaKind::Binary(op, l, r) => {
            let lf = encode_formula(l, scope, decls, ctx);
            let rf = encode_formula(r, scope, decls, ctx);
            match op {
                FormulaBinOp::And => BooleanFormula::and(vec![lf, rf]),
                FormulaBinOp::Or => BooleanFormula::or(vec![lf, rf]),
                FormulaBinOp::Implies => BooleanFormula::implies(lf, rf),
                FormulaBinOp::Iff => BooleanFormula::iff(lf, rf),
            }
        }
        FormulaKind::Not(inner) => encode_formula(inner, scope, decls, ctx).not(),
        FormulaKind::IfElse { cond, then_branch, else_branch } => {
            let c = encode_formula(cond, scope, decls, ctx);
            let t = encode_formula(then_branch, scope, decls, ctx);
            let e = match else_branch {
                Some(e) => encode_formula(e, scope, decls, ctx),
                None => BooleanFormula::TRUE,
            };
            BooleanFormula::ite(c, t, e)
        }
        FormulaKind::Quantified { quantifier, decls: qdecls, body } => encode_quantified(*quantifier, qdecls, body, scope, decls, ctx),
        FormulaKind::Let { name, value, body } => {
            let v = encode_expr(value, scope, decls, ctx).as_matrix(ctx);
            let let_scope = ctx.symtab.push_scope(ScopeKind::Let, scope);
            let id = ctx.symtab.declare(let_scope, SymbolRecord { kind: SymbolKind::LetVar, name: *name, span: formula.span, ty: Type::Unknown(1), owner: None, var: false, private: false });
            ctx.push_scope();
            ctx.bind(id, v);
            let result = encode_formula(body, let_scope, decls, ctx);
            ctx.pop_scope();
            result
        }
        FormulaKind::TemporalUnary(op, inner) => encode_temporal_unary(*op, inner, scope, decls, ctx),
        FormulaKind::TemporalBinary(op, l, r) => encode_temporal_binary(*op, l, r, scope, decls, ctx),
        FormulaKind::Comparison(op, l, r) => encode_comparison(*op, l, r, scope, decls, ctx),
        FormulaKind::Multiplicity(mult, e) => {
            let m = encode_expr(e, scope, decls, ctx).as_matrix(ctx);
            match mult {
                Mult::Some => m.some(&mut ctx.cnf),
                Mult::No => m.no(&mut ctx.cnf),
                Mult::One => m.one(&mut ctx.cnf),
                Mult::Lone => m.lone(&mut ctx.cnf),
                Mult::Set => BooleanFormula::TRUE,
            }
        }
        FormulaKind::ExprAsFormula(e) => {
            if let Some(call) = resolve_call_as_predicate(e, scope, ctx) {
                let (call, args) = call;
                return encode_predicate_call(&call, args, scope, decls, ctx);
            }
            let m = encode_expr(e, scope, decls, ctx).as_matrix(ctx);
            m.some(&mut ctx.cnf)
        }
        FormulaKind::Block(formulas) => {
            let parts: Vec<BooleanFormula> = formulas.iter().map(|f| encode_formula(f, scope, decls, ctx)).collect();
            BooleanFormula::and(parts)
        }
    }
}

/// Detects `pred[args]`/`recv.pred[args]` shape at the top of an
/// `ExprAsFormula`, returning the call target alongside its argument list
/// so the caller can encode it as a formula directly instead of routing it
/// through `encode_expr`'s relational box-join fallback.
fn resolve_call_as_predicate<'e>(e: &'e crate::ast::Expr, scope: ScopeId, ctx: &TranslationContext) -> Option<(crate::encode::expr_encoder::CallTarget, &'e [crate::ast::Expr])> {
    let crate::ast::ExprKind::BoxJoin { base, args } = &e.kind else {
        return None;
    };
    let call = resolve_call(base, scope, ctx)?;
    if !matches!(ctx.symtab.get(call.target).kind, SymbolKind::Predicate) {
        return None;
    }
    Some((call, args.as_slice()))
}

fn encode_quantified(quantifier: Quantifier, qdecls: &[crate::ast::QuantDecl], body: &Formula, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> BooleanFormula {
    let (qscope, vars) = flatten_decls(qdecls, scope, decls, ctx);
    let mut hits: Vec<BooleanFormula> = Vec::new();
    for_each_assignment(&vars, ctx, &mut |ctx, atoms| {
        ctx.push_scope();
        for ((id, _, _), atom) in vars.iter().zip(atoms.iter().copied()) {
            ctx.bind(*id, singleton_matrix(ctx, atom));
        }
        hits.push(encode_formula(body, qscope, decls, ctx));
        ctx.pop_scope();
    });
    match quantifier {
        Quantifier::All => BooleanFormula::and(hits),
        Quantifier::Some => BooleanFormula::or(hits),
        Quantifier::No => BooleanFormula::and(hits.into_iter().map(|f| f.not())),
        Quantifier::One => exactly_one_formula(hits),
        Quantifier::Lone => at_most_one_formula(hits),
    }
}

fn singleton_matrix(ctx: &TranslationContext, atom: crate::tupleset::Atom) -> crate::kernel::matrix::BooleanMatrix {
    let mut m = crate::kernel::matrix::BooleanMatrix::constant(1, ctx.universe.total, false);
    m.set_cell(&[atom], crate::kernel::matrix::BooleanValue::Const(true));
    m
}

fn exactly_one_formula(hits: Vec<BooleanFormula>) -> BooleanFormula {
    BooleanFormula::and(vec![at_least_one_formula(&hits), at_most_one_formula(hits)])
}

fn at_least_one_formula(hits: &[BooleanFormula]) -> BooleanFormula {
    BooleanFormula::or(hits.to_vec())
}

fn at_most_one_formula(hits: Vec<BooleanFormula>) -> BooleanFormula {
    let mut clauses = Vec::new();
    for i in 0..hits.len() {
        for j in (i + 1)..hits.len() {
            clauses.push(BooleanFormula::or(vec![hits[i].clone().not(), hits[j].clone().not()]));
        }
    }
    BooleanFormula::and(clauses)
}

fn encode_comparison(op: CompareOp, l: &crate::ast::Expr, r: &crate::ast::Expr, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> BooleanFormula {
    let le = encode_expr(l, scope, decls, ctx);
    let re = encode_expr(r, scope, decls, ctx);
    match (le, re) {
        (EncodedExpr::Int(a), EncodedExpr::Int(b)) => match op {
            CompareOp::Eq => a.equals(&b, &mut ctx.cnf),
            CompareOp::Neq => a.equals(&b, &mut ctx.cnf).not(),
            CompareOp::Lt => a.lt(&b, &mut ctx.cnf),
            CompareOp::Le => a.le(&b, &mut ctx.cnf),
            CompareOp::Gt => a.gt(&b, &mut ctx.cnf),
            CompareOp::Ge => a.ge(&b, &mut ctx.cnf),
            CompareOp::In | CompareOp::NotIn => panic!("integer expressions do not support 'in'; semantic analysis should have rejected this"),
        },
        (le, re) => {
            let lm = le.as_matrix(ctx);
            let rm = re.as_matrix(ctx);
            match op {
                CompareOp::Eq => lm.equals(&rm, &mut ctx.cnf),
                CompareOp::Neq => lm.equals(&rm, &mut ctx.cnf).not(),
                CompareOp::In => lm.is_subset_of(&rm, &mut ctx.cnf),
                CompareOp::NotIn => lm.is_subset_of(&rm, &mut ctx.cnf).not(),
                CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
                    panic!("ordering comparisons require integer operands; semantic analysis should have rejected this")
                }
            }
        }
    }
}

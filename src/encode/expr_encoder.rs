//! Expression Encoder: walks expression AST and returns a
//! `BooleanMatrix`, or for integer-valued expressions a `BitVector`.
//!
//! Quantifier, `let`, and call-parameter scopes are created fresh by this
//! module rather than reused from semantic analysis: only arity and binding
//! matter once encoding starts, not the checked `Type`, so the encoder
//! grows its own scope/symbol chain in lockstep with its own traversal.

use crate::ast::{BinOp, Expr, ExprKind, ParamDecl, QuantDecl, UnOp};
use crate::bitvector::BitVector;
use crate::context::TranslationContext;
use crate::encode::formula_encoder::encode_formula;
use crate::encode::Declarations;
use crate::intern::Symbol;
use crate::kernel::matrix::{BooleanMatrix, BooleanValue};
use crate::kernel::ops::{apply_binop, apply_unop};
use crate::semantics::symtab::{ScopeId, ScopeKind, SymbolId, SymbolKind, SymbolRecord};
use crate::semantics::types::Type;
use crate::tupleset::Atom;

pub enum EncodedExpr {
    Matrix(BooleanMatrix),
    Int(BitVector),
}

impl EncodedExpr {
    pub fn as_matrix(self, ctx: &mut TranslationContext) -> BooleanMatrix {
        match self {
            EncodedExpr::Matrix(m) => m,
            EncodedExpr::Int(bv) => {
                let v = const_value_of(&bv).expect("a fully symbolic integer cannot be widened back into a set");
                let factory = ctx.universe.int_factory.as_ref().expect("Int expression encoded without an integer factory present");
                let atom = factory.atom_of(v).expect("integer literal out of bit-width range");
                singleton(ctx.universe.total, atom)
            }
        }
    }

    pub fn as_bitvector(self, ctx: &mut TranslationContext) -> BitVector {
        match self {
            EncodedExpr::Int(bv) => bv,
            EncodedExpr::Matrix(m) => {
                let factory = ctx.universe.int_factory.as_ref().expect("matrix-to-integer bridge requires an integer factory");
                BitVector::from_matrix(&m, factory, &mut ctx.cnf)
            }
        }
    }
}

fn const_value_of(bv: &BitVector) -> Option<i64> {
    let mut v = 0i64;
    for i in 0..bv.width() {
        match bv.bit(i) {
            BooleanValue::Const(true) => v |= 1 << i,
            BooleanValue::Const(false) => {}
            BooleanValue::Var(_) => return None,
        }
    }
    let sign_bit = bv.width() - 1;
    if (v >> sign_bit) & 1 == 1 {
        v -= 1i64 << bv.width();
    }
    Some(v)
}

fn singleton(universe_size: usize, atom: Atom) -> BooleanMatrix {
    let mut m = BooleanMatrix::constant(1, universe_size, false);
    m.set_cell(&[atom], BooleanValue::Const(true));
    m
}

pub fn encode_expr(expr: &Expr, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> EncodedExpr {
    match &expr.kind {
        ExprKind::IntLiteral(n) => {
            let bw = ctx.universe.int_factory.as_ref().map(|f| f.bitwidth).unwrap_or(crate::universe::DEFAULT_BITWIDTH);
            EncodedExpr::Int(BitVector::from_const(*n, bw))
        }
        ExprKind::None_ => EncodedExpr::Matrix(BooleanMatrix::constant(1, ctx.universe.total, false)),
        ExprKind::Univ => EncodedExpr::Matrix(univ_matrix(ctx)),
        ExprKind::Iden => EncodedExpr::Matrix(BooleanMatrix::identity(ctx.universe.total)),
        ExprKind::IntType => EncodedExpr::Matrix(int_matrix(ctx)),
        ExprKind::This => EncodedExpr::Matrix(ctx.current_this().cloned().expect("'this' encoded outside a receiver-bound call")),
        ExprKind::Name(name) => EncodedExpr::Matrix(encode_name(*name, scope, ctx, true)),
        ExprKind::AtName(name) => EncodedExpr::Matrix(encode_name(*name, scope, ctx, false)),
        ExprKind::Unary(op, inner) => encode_unary(*op, inner, scope, decls, ctx),
        ExprKind::Binary(op, l, r) => encode_binary(*op, l, r, scope, decls, ctx),
        ExprKind::Prime(inner) => encode_prime(inner, scope, decls, ctx),
        ExprKind::BoxJoin { base, args } => encode_box_join(base, args, scope, decls, ctx),
        ExprKind::Comprehension { decls: qdecls, body } => EncodedExpr::Matrix(encode_comprehension(qdecls, body, scope, decls, ctx)),
        ExprKind::Let { name, value, body } => {
            let v = encode_expr(value, scope, decls, ctx).as_matrix(ctx);
            let let_scope = ctx.symtab.push_scope(ScopeKind::Let, scope);
            let id = ctx.symtab.declare(let_scope, SymbolRecord { kind: SymbolKind::LetVar, name: *name, span: expr.span, ty: Type::Unknown(1), owner: None, var: false, private: false });
            ctx.push_scope();
            ctx.bind(id, v);
            let result = encode_expr(body, let_scope, decls, ctx);
            ctx.pop_scope();
            result
        }
        ExprKind::IfElse { cond, then_branch, else_branch } => {
            let cond_lit = encode_formula(cond, scope, decls, ctx).encode(&mut ctx.cnf);
            let then_m = encode_expr(then_branch, scope, decls, ctx).as_matrix(ctx);
            let else_m = encode_expr(else_branch, scope, decls, ctx).as_matrix(ctx);
            EncodedExpr::Matrix(BooleanMatrix::ite(cond_lit, &then_m, &else_m, &mut ctx.cnf))
        }
        ExprKind::Sum { decls: qdecls, body } => EncodedExpr::Int(encode_sum(qdecls, body, scope, decls, ctx)),
        ExprKind::Block(formulas) => {
            let mut lits = Vec::new();
            for f in formulas {
                lits.push(encode_formula(f, scope, decls, ctx).encode(&mut ctx.cnf));
            }
            let all_hold = ctx.cnf.and_gate(&lits);
            let univ = univ_matrix(ctx);
            let none = BooleanMatrix::constant(1, ctx.universe.total, false);
            EncodedExpr::Matrix(BooleanMatrix::ite(all_hold, &univ, &none, &mut ctx.cnf))
        }
    }
}

fn univ_matrix(ctx: &TranslationContext) -> BooleanMatrix {
    let mut m = BooleanMatrix::constant(1, ctx.universe.total, false);
    for i in 0..ctx.universe.total {
        m.set_cell(&[Atom(i as u32)], BooleanValue::Const(true));
    }
    m
}

fn int_matrix(ctx: &TranslationContext) -> BooleanMatrix {
    let mut m = BooleanMatrix::constant(1, ctx.universe.total, false);
    if let Some(factory) = &ctx.universe.int_factory {
        for (_, atom) in factory.all_atoms() {
            m.set_cell(&[atom], BooleanValue::Const(true));
        }
    }
    m
}

/// Name resolution order: local bindings (quantifier/let/parameter/receiver),
/// signature matrix, field matrix (with signature-fact auto-expansion to
/// `this.field`), enum atom.
fn encode_name(name: Symbol, scope: ScopeId, ctx: &mut TranslationContext, allow_auto_expand: bool) -> BooleanMatrix {
    let Some(id) = ctx.symtab.lookup(scope, name) else {
        panic!("encoder reached an unresolved name; semantic analysis should have rejected this model");
    };
    if let Some(m) = ctx.lookup_binding(id) {
        return m.clone();
    }
    let record_kind = ctx.symtab.get(id).kind;
    match record_kind {
        SymbolKind::Signature | SymbolKind::EnumType => ctx.sig_matrix(id, ctx.current_state),
        SymbolKind::EnumValue => {
            let atom = ctx.universe.atoms_of(id)[0];
            singleton(ctx.universe.total, atom)
        }
        SymbolKind::Field => {
            let owner = ctx.symtab.get(id).owner;
            if allow_auto_expand && ctx.current_sig_fact_owner.is_some() && ctx.current_sig_fact_owner == owner {
                let this = ctx.current_this().cloned().expect("signature fact encodes with 'this' bound");
                let field = ctx.field_matrix(id, ctx.current_state);
                this.join(&field, &mut ctx.cnf)
            } else {
                ctx.field_matrix(id, ctx.current_state)
            }
        }
        _ => panic!("name '{name:?}' resolved to a non-relational symbol in expression position"),
    }
}

fn encode_unary(op: UnOp, inner: &Expr, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> EncodedExpr {
    if op == UnOp::Cardinality {
        let m = encode_expr(inner, scope, decls, ctx).as_matrix(ctx);
        let cells: Vec<BooleanValue> = m.cells_iter().map(|(_, v)| v).collect();
        let bw = ctx.universe.int_factory.as_ref().map(|f| f.bitwidth).unwrap_or(crate::universe::DEFAULT_BITWIDTH);
        return EncodedExpr::Int(BitVector::cardinality(&cells, bw, &mut ctx.cnf));
    }
    let m = encode_expr(inner, scope, decls, ctx).as_matrix(ctx);
    EncodedExpr::Matrix(apply_unop(op, &m, &mut ctx.cnf))
}

fn encode_binary(op: BinOp, l: &Expr, r: &Expr, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> EncodedExpr {
    let lm = encode_expr(l, scope, decls, ctx).as_matrix(ctx);
    let rm = encode_expr(r, scope, decls, ctx).as_matrix(ctx);
    EncodedExpr::Matrix(apply_binop(op, &lm, &rm, &mut ctx.cnf))
}

enum PrimeTarget {
    State(u32),
    LoopSelect(Vec<u32>),
}

fn next_state_for_prime(ctx: &TranslationContext) -> PrimeTarget {
    let trace = ctx.trace.as_ref().expect("prime used outside a temporal (steps-bearing) command");
    if ctx.current_state + 1 < trace.length {
        PrimeTarget::State(ctx.current_state + 1)
    } else {
        PrimeTarget::LoopSelect((0..trace.length).collect())
    }
}

fn encode_prime(inner: &Expr, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> EncodedExpr {
    match next_state_for_prime(ctx) {
        PrimeTarget::State(s) => {
            let saved = ctx.current_state;
            ctx.current_state = s;
            let result = encode_expr(inner, scope, decls, ctx);
            ctx.current_state = saved;
            result
        }
        PrimeTarget::LoopSelect(states) => {
            // At the trace's final state, `e'` resolves via the one-hot
            // loop selector: mux over every looped-to state.
            let saved = ctx.current_state;
            let mut acc: Option<BooleanMatrix> = None;
            for s in states {
                ctx.current_state = s;
                let at_s = encode_expr(inner, scope, decls, ctx).as_matrix(ctx);
                let loop_lit = ctx.trace.as_ref().unwrap().loop_lits[s as usize];
                let gated = match acc {
                    None => {
                        let empty = BooleanMatrix::constant(at_s.arity(), at_s.universe_size(), false);
                        BooleanMatrix::ite(loop_lit, &at_s, &empty, &mut ctx.cnf)
                    }
                    Some(prev) => BooleanMatrix::ite(loop_lit, &at_s, &prev, &mut ctx.cnf),
                };
                acc = Some(gated);
            }
            ctx.current_state = saved;
            EncodedExpr::Matrix(acc.expect("a lasso trace always has at least one loop-start candidate"))
        }
    }
}

/// `e[a1,..., an]`: predicate/function call when `base`
/// resolves to one (built-in arithmetic name, then a declared function),
/// otherwise ordinary box-join sugar for `an . ... . a1 . e`.
fn encode_box_join(base: &Expr, args: &[Expr], scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> EncodedExpr {
    if let ExprKind::Name(n) = &base.kind {
        if let Some(result) = try_builtin_arith(*n, args, scope, decls, ctx) {
            return result;
        }
    }
    if let Some(call) = resolve_call(base, scope, ctx) {
        let fun = decls.funs.get(&call.target).copied().unwrap_or_else(|| panic!("box-join call target is not a function in expression position"));
        let call_scope = push_call_bindings(&call, args, scope, ctx.root, decls, ctx, &fun.params);
        let result = encode_expr(&fun.body, call_scope, decls, ctx);
        ctx.pop_scope();
        if call.receiver_expr.is_some() {
            ctx.pop_this();
        }
        return result;
    }
    let mut cur = encode_expr(base, scope, decls, ctx).as_matrix(ctx);
    for a in args {
        let am = encode_expr(a, scope, decls, ctx).as_matrix(ctx);
        cur = am.join(&cur, &mut ctx.cnf);
    }
    EncodedExpr::Matrix(cur)
}

enum BuiltinArith {
    Plus,
    Minus,
    Mul,
    Div,
    Rem,
    Negate,
}

fn builtin_arith_op(name: Symbol, b: &crate::context::BuiltinFns) -> Option<BuiltinArith> {
    if name == b.plus {
        Some(BuiltinArith::Plus)
    } else if name == b.minus {
        Some(BuiltinArith::Minus)
    } else if name == b.mul {
        Some(BuiltinArith::Mul)
    } else if name == b.div {
        Some(BuiltinArith::Div)
    } else if name == b.rem {
        Some(BuiltinArith::Rem)
    } else if name == b.negate {
        Some(BuiltinArith::Negate)
    } else {
        None
    }
}

/// `plus[a,b]`/`minus[a,b]`/`mul[a,b]`/`div[a,b]`/`rem[a,b]`/`negate[a]`
///: the only way integer arithmetic is written, since
/// `BinOp` has no arithmetic variants. Returns `None` when `n` doesn't name
/// one of these, so the caller falls through to ordinary call/join
/// resolution (a user signature or predicate could shadow these names).
fn try_builtin_arith(n: Symbol, args: &[Expr], scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> Option<EncodedExpr> {
    if ctx.symtab.lookup(scope, n).is_some() {
        return None;
    }
    let op = builtin_arith_op(n, &ctx.builtins)?;
    if let BuiltinArith::Negate = op {
        let a = encode_expr(&args[0], scope, decls, ctx).as_bitvector(ctx);
        let (result, overflow) = a.negate(&mut ctx.cnf);
        assert_no_overflow(overflow, ctx);
        return Some(EncodedExpr::Int(result));
    }
    let a = encode_expr(&args[0], scope, decls, ctx).as_bitvector(ctx);
    let b = encode_expr(&args[1], scope, decls, ctx).as_bitvector(ctx);
    let result = match op {
        BuiltinArith::Plus => {
            let (r, overflow) = a.add(&b, &mut ctx.cnf);
            assert_no_overflow(overflow, ctx);
            r
        }
        BuiltinArith::Minus => {
            let (r, overflow) = a.sub(&b, &mut ctx.cnf);
            assert_no_overflow(overflow, ctx);
            r
        }
        BuiltinArith::Mul => {
            let (r, overflow) = a.mul(&b, &mut ctx.cnf);
            assert_no_overflow(overflow, ctx);
            r
        }
        BuiltinArith::Div => {
            let (q, _r, div_by_zero) = a.div_rem(&b, &mut ctx.cnf);
            assert_not(div_by_zero, ctx);
            q
        }
        BuiltinArith::Rem => {
            let (_q, r, div_by_zero) = a.div_rem(&b, &mut ctx.cnf);
            assert_not(div_by_zero, ctx);
            r
        }
        BuiltinArith::Negate => unreachable!(),
    };
    Some(EncodedExpr::Int(result))
}

fn assert_no_overflow(overflow: crate::kernel::bool_formula::BooleanFormula, ctx: &mut TranslationContext) {
    assert_not(overflow, ctx);
}

fn assert_not(formula: crate::kernel::bool_formula::BooleanFormula, ctx: &mut TranslationContext) {
    let lit = formula.not().encode(&mut ctx.cnf);
    ctx.cnf.assert_true(lit);
}

pub struct CallTarget {
    pub target: SymbolId,
    pub receiver_expr: Option<Expr>,
}

/// Recognizes `pred[args]`/`fun[args]` and `recv.pred[args]`/`recv.fun[args]`:
/// call syntax is ordinary box-join syntax resolved by looking up the base
/// name.
pub fn resolve_call(base: &Expr, scope: ScopeId, ctx: &TranslationContext) -> Option<CallTarget> {
    match &base.kind {
        ExprKind::Name(n) | ExprKind::AtName(n) => {
            let id = ctx.symtab.lookup(scope, *n)?;
            matches!(ctx.symtab.get(id).kind, SymbolKind::Predicate | SymbolKind::Function).then_some(CallTarget { target: id, receiver_expr: None })
        }
        ExprKind::Binary(BinOp::Join, recv, r) => {
            let name = match &r.kind {
                ExprKind::Name(n) | ExprKind::AtName(n) => *n,
                _ => return None,
            };
            let id = ctx.symtab.lookup(scope, name)?;
            matches!(ctx.symtab.get(id).kind, SymbolKind::Predicate | SymbolKind::Function)
                .then(|| CallTarget { target: id, receiver_expr: Some((**recv).clone()) })
        }
        _ => None,
    }
}

/// Binds a call's receiver (if any) and arguments, declaring fresh
/// parameter symbols in a new scope child of `root` and returning it as
/// the scope to encode the callee's body in. Caller must `ctx.pop_scope()`
/// (and `ctx.pop_this()` if a receiver was bound) once done with the body.
pub fn push_call_bindings(call: &CallTarget, args: &[Expr], scope: ScopeId, root: ScopeId, decls: &Declarations, ctx: &mut TranslationContext, params: &[ParamDecl]) -> ScopeId {
    if let Some(recv_expr) = &call.receiver_expr {
        let recv_m = encode_expr(recv_expr, scope, decls, ctx).as_matrix(ctx);
        ctx.push_this(recv_m);
    }
    let arg_mats: Vec<BooleanMatrix> = args.iter().map(|a| encode_expr(a, scope, decls, ctx).as_matrix(ctx)).collect();
    let body_scope = ctx.symtab.push_scope(ScopeKind::Predicate, root);
    ctx.push_scope();
    for (param, matrix) in params.iter().zip(arg_mats) {
        let id = ctx.symtab.declare(body_scope, SymbolRecord { kind: SymbolKind::Parameter, name: param.name, span: param.span, ty: Type::Unknown(1), owner: None, var: false, private: false });
        ctx.bind(id, matrix);
    }
    body_scope
}

/// Encodes a predicate call (`pred[args]`/`recv.pred[args]`) as a
/// `BooleanFormula` directly, for `formula_encoder.rs`'s `ExprAsFormula`
/// handling — predicates have no `Expr`-typed position, only
/// `FormulaKind::ExprAsFormula` ever reaches a call shaped like this.
pub fn encode_predicate_call(call: &CallTarget, args: &[Expr], scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> crate::kernel::bool_formula::BooleanFormula {
    let pred = *decls.preds.get(&call.target).expect("resolve_call only returns predicate targets for declared predicates");
    let call_scope = push_call_bindings(call, args, scope, ctx.root, decls, ctx, &pred.params);
    let result = encode_formula(&pred.body, call_scope, decls, ctx);
    ctx.pop_scope();
    if call.receiver_expr.is_some() {
        ctx.pop_this();
    }
    result
}

fn encode_comprehension(qdecls: &[QuantDecl], body: &crate::ast::Formula, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> BooleanMatrix {
    let (qscope, vars) = flatten_decls(qdecls, scope, decls, ctx);
    let arity = vars.len();
    let mut out = BooleanMatrix::constant(arity, ctx.universe.total, false);
    for_each_assignment(&vars, ctx, &mut |ctx, atoms| {
        ctx.push_scope();
        for ((id, _, _), atom) in vars.iter().zip(atoms.iter().copied()) {
            ctx.bind(*id, singleton(ctx.universe.total, atom));
        }
        let lit = encode_formula(body, qscope, decls, ctx).encode(&mut ctx.cnf);
        ctx.pop_scope();
        out.set_cell(atoms, BooleanValue::Var(lit));
    });
    out
}

fn encode_sum(qdecls: &[QuantDecl], body: &Expr, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> BitVector {
    let (qscope, vars) = flatten_decls(qdecls, scope, decls, ctx);
    let bw = ctx.universe.int_factory.as_ref().map(|f| f.bitwidth).unwrap_or(crate::universe::DEFAULT_BITWIDTH);
    let mut total = BitVector::from_const(0, bw);
    for_each_assignment(&vars, ctx, &mut |ctx, atoms| {
        ctx.push_scope();
        for ((id, _, _), atom) in vars.iter().zip(atoms.iter().copied()) {
            ctx.bind(*id, singleton(ctx.universe.total, atom));
        }
        let value = encode_expr(body, qscope, decls, ctx).as_bitvector(ctx);
        ctx.pop_scope();
        let (sum, _overflow) = total.add(&value, &mut ctx.cnf);
        total = sum;
    });
    total
}

/// One flattened quantifier variable: its symbol, bound matrix, and (when
/// its source decl was `disj`) a group id shared with its siblings so
/// enumeration can skip assignments that collide within the group.
pub type QuantVar = (SymbolId, BooleanMatrix, Option<usize>);

/// Flattens `x, y: S, z: T` into one `(symbol, bound matrix, disj group)`
/// triple per variable, declaring each name in a fresh quantifier scope.
/// Bound-type expressions are evaluated against the outer `scope`, not
/// against each other — sibling decls referencing an earlier one (`y:
/// x.r`) aren't supported, matching the "no dependent quantifier bounds"
/// simplification.
pub fn flatten_decls(qdecls: &[QuantDecl], scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> (ScopeId, Vec<QuantVar>) {
    let qscope = ctx.symtab.push_scope(ScopeKind::Quantifier, scope);
    let mut vars = Vec::new();
    for (group, decl) in qdecls.iter().enumerate() {
        let bound = encode_expr(&decl.ty, scope, decls, ctx).as_matrix(ctx);
        let group_id = if decl.disj && decl.names.len() > 1 { Some(group) } else { None };
        for &name in &decl.names {
            let id = ctx.symtab.declare(qscope, SymbolRecord { kind: SymbolKind::QuantifierVar, name, span: decl.span, ty: Type::Unknown(1), owner: None, var: false, private: false });
            vars.push((id, bound.clone(), group_id));
        }
    }
    (qscope, vars)
}

/// Enumerates every atom assignment over `vars`' bound matrices, invoking
/// `f` once per tuple with the atoms to bind. Skips tuples a bound matrix
/// marks as constant-`false` so disjoint-sort quantification (`x: Dog`)
/// doesn't visit the whole universe per variable, and skips tuples that
/// assign the same atom to two variables sharing a `disj` group.
pub fn for_each_assignment(vars: &[QuantVar], ctx: &mut TranslationContext, f: &mut impl FnMut(&mut TranslationContext, &[Atom])) {
    fn go(i: usize, vars: &[QuantVar], universe_size: usize, acc: &mut Vec<Atom>, ctx: &mut TranslationContext, f: &mut impl FnMut(&mut TranslationContext, &[Atom])) {
        if i == vars.len() {
            f(ctx, acc);
            return;
        }
        let (_, bound, group) = &vars[i];
        'atoms: for a in 0..universe_size {
            if matches!(bound.cell(&[Atom(a as u32)]), BooleanValue::Const(false)) {
                continue;
            }
            if let Some(g) = group {
                for j in 0..i {
                    if vars[j].2 == Some(*g) && acc[j].0 == a as u32 {
                        continue 'atoms;
                    }
                }
            }
            acc.push(Atom(a as u32));
            go(i + 1, vars, universe_size, acc, ctx, f);
            acc.pop();
        }
    }
    let universe_size = ctx.universe.total;
    let mut acc = Vec::with_capacity(vars.len());
    go(0, vars, universe_size, &mut acc, ctx, f);
}

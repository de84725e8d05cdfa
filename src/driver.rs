//! Top-level driver: scopes a command, builds the universe
//! and bounds, encodes structural constraints plus every fact/assertion/
//! command body, hands the resulting CNF to a `SatOracle`, and reads back
//! an instance on SAT.

use std::ops::Range;

use crate::ast::{AssertDecl, CommandDecl, CommandKind, Expr, ExprKind, Formula, FormulaKind, Module, Mult, Paragraph, PredDecl, Scope, TemporalBinOp, UnOp};
use crate::bounds::Bounds;
use crate::cnf::CnfBuilder;
use crate::context::{Trace, TranslationContext};
use crate::diagnostics::DiagnosticCollector;
use crate::encode::expr_encoder::{push_call_bindings, CallTarget};
use crate::encode::formula_encoder::encode_formula;
use crate::encode::Declarations;
use crate::instance::{extract_instance, Instance};
use crate::intern::Interner;
use crate::kernel::bool_formula::BooleanFormula;
use crate::kernel::matrix::{BooleanMatrix, BooleanValue};
use crate::semantics::{analyze, AnalysisResult};
use crate::semantics::symtab::{ScopeId, SymbolId, SymbolKind, SymbolTable};
use crate::solver::{SatOracle, SolveResult};
use crate::tupleset::{Atom, TupleSet};
use crate::universe::{build_universe, Universe};

/// `--scope`/`--steps`/`--int-bw` CLI overrides, layered on top of whatever
/// the command's own `for ...` clause parsed.
#[derive(Debug, Clone, Default)]
pub struct ScopeOverrides {
    pub default_scope: Option<u32>,
    pub steps: Option<u32>,
    pub int_bitwidth: Option<u32>,
}

impl ScopeOverrides {
    fn apply(&self, scope: &mut Scope) {
        if let Some(n) = self.default_scope {
            scope.default_scope = Some(n);
        }
        if let Some(n) = self.steps {
            scope.steps = Some(n);
        }
        if let Some(bw) = self.int_bitwidth {
            scope.int_bitwidth = Some(bw);
        }
    }
}

#[derive(Debug)]
pub enum CommandOutcome {
    /// `run`: a satisfying instance was found.
    Model(Instance),
    /// `run`: no instance exists within the given scope.
    NoInstance,
    /// `check`: a counterexample was found.
    CounterExample(Instance),
    /// `check`: no counterexample exists within the given scope.
    AssertionHolds,
    /// The solver could not decide within its resource budget.
    Unknown,
}

pub struct ExecuteResult {
    pub diags: DiagnosticCollector,
    /// Populated only when `dimacs_only` was requested and analysis succeeded.
    pub dimacs: Option<String>,
    pub outcome: Option<CommandOutcome>,
    /// Set when the command's `expect N` clause disagreed with the solver's
    /// verdict: `Some(true)` if they matched.
    pub expect_matched: Option<bool>,
    /// The universe built for this command, needed to render atom names
    /// back out of an `Instance`. Absent only when analysis failed before
    /// a universe could be built.
    pub universe: Option<Universe>,
}

fn states_range(has_trace: bool, length: u32) -> Range<u32> {
    if has_trace {
        0..length
    } else {
        0..1
    }
}

fn singleton_matrix(universe_size: usize, atom: Atom) -> BooleanMatrix {
    let mut m = BooleanMatrix::constant(1, universe_size, false);
    m.set_cell(&[atom], BooleanValue::Const(true));
    m
}

/// Runs `command` end to end: analyze, build the universe/bounds, encode
/// every constraint, then either dump DIMACS or hand the CNF to `oracle`.
pub fn execute(module: &Module, command: &CommandDecl, interner: &mut Interner, oracle: &mut dyn SatOracle, overrides: ScopeOverrides, dimacs_only: bool) -> ExecuteResult {
    let analysis: AnalysisResult = analyze(module, interner);
    let AnalysisResult { mut symtab, sig_graph, sig_order, mut diags } = analysis;
    if diags.has_errors() {
        return ExecuteResult { diags, dimacs: None, outcome: None, expect_matched: None, universe: None };
    }

    let root = symtab.root_scope();
    let mut scope = command.scope.clone();
    overrides.apply(&mut scope);

    let needs_int = module_needs_int(module);
    let universe = build_universe(&sig_order, &symtab, &sig_graph, root, &scope, needs_int, interner, &mut diags);
    if diags.has_errors() {
        return ExecuteResult { diags, dimacs: None, outcome: None, expect_matched: None, universe: Some(universe) };
    }

    let mut bounds = Bounds::build(&universe, &symtab, root);
    for p in &module.paragraphs {
        let Paragraph::Sig(sig) = p else { continue };
        let Some(owner) = symtab.local(root, sig.name) else { continue };
        for f in &sig.fields {
            let Some(field_id) = symtab.local(root, f.name) else { continue };
            bounds.refine_field(field_id, owner, &f.ty, &universe, &symtab, root);
        }
    }

    let has_trace = scope.steps.is_some();
    let length = scope.steps.unwrap_or(1).max(1);

    let cnf = CnfBuilder::new();
    let mut ctx = TranslationContext::new(&mut symtab, root, &universe, &bounds, cnf, interner);
    if has_trace {
        ctx.trace = Some(Trace::new(length, true, &mut ctx.cnf));
    }

    allocate_relations(&mut ctx, has_trace, length);

    let decls = Declarations::build(module, ctx.symtab, root);

    let mut top_level: Vec<BooleanFormula> = Vec::new();
    encode_structural_constraints(module, &mut ctx, has_trace, length, &mut top_level);

    for fact in &decls.facts {
        top_level.push(encode_global(&fact.body, root, &decls, &mut ctx));
    }
    for &(owner, formula) in &decls.sig_facts {
        let atoms: Vec<Atom> = universe.atoms_of(owner).to_vec();
        for atom in atoms {
            ctx.current_sig_fact_owner = Some(owner);
            ctx.push_this(singleton_matrix(universe.total, atom));
            top_level.push(encode_global(formula, root, &decls, &mut ctx));
            ctx.pop_this();
            ctx.current_sig_fact_owner = None;
        }
    }

    let is_check = matches!(command.kind, CommandKind::Check { .. });
    let body = encode_command_body(command, root, &decls, &mut ctx);
    top_level.push(if is_check { body.not() } else { body });

    let overall = BooleanFormula::and(top_level);
    overall.assert_into(&mut ctx.cnf);

    if dimacs_only {
        let mut buf = Vec::new();
        ctx.cnf.write_dimacs(&mut buf).expect("writing to an in-memory buffer cannot fail");
        let dimacs = String::from_utf8(buf).expect("DIMACS output is always ASCII");
        drop(ctx);
        return ExecuteResult { diags, dimacs: Some(dimacs), outcome: None, expect_matched: None, universe: Some(universe) };
    }

    let num_vars = ctx.cnf.num_vars();
    let clauses = ctx.cnf.clauses().to_vec();
    let result = oracle.solve(num_vars, &clauses);

    let symtab_ref: &SymbolTable = &*ctx.symtab;
    let outcome = match result {
        SolveResult::Sat(assignment) => {
            let instance = extract_instance(&ctx, &assignment, symtab_ref, &universe, interner);
            if is_check {
                CommandOutcome::CounterExample(instance)
            } else {
                CommandOutcome::Model(instance)
            }
        }
        SolveResult::Unsat => {
            if is_check {
                CommandOutcome::AssertionHolds
            } else {
                CommandOutcome::NoInstance
            }
        }
        SolveResult::Unknown => CommandOutcome::Unknown,
    };
    drop(ctx);

    let expect_matched = scope.expect.map(|n| matches_expect(&outcome, n));
    ExecuteResult { diags, dimacs: None, outcome: Some(outcome), expect_matched, universe: Some(universe) }
}

fn matches_expect(outcome: &CommandOutcome, expect: i64) -> bool {
    let is_sat = matches!(outcome, CommandOutcome::Model(_) | CommandOutcome::CounterExample(_));
    if expect == 0 {
        !is_sat
    } else {
        is_sat
    }
}

fn allocate_relations(ctx: &mut TranslationContext, has_trace: bool, length: u32) {
    let sig_ids: Vec<SymbolId> = ctx
        .symtab
        .iter_kind(SymbolKind::Signature)
        .chain(ctx.symtab.iter_kind(SymbolKind::EnumType))
        .chain(ctx.symtab.iter_kind(SymbolKind::EnumValue))
        .collect();
    for id in sig_ids {
        let rb = ctx.bounds.sigs.get(&id).expect("every signature/enum symbol has sig bounds").clone();
        let is_var = ctx.symtab.get(id).var;
        if has_trace && is_var {
            let lower = TupleSet::empty(1);
            let states: Vec<BooleanMatrix> = (0..length).map(|_| BooleanMatrix::from_bounds(&lower, &rb.upper, ctx.universe.total, &mut ctx.cnf)).collect();
            ctx.trace.as_mut().unwrap().set_sig_states(id, states);
        } else {
            let m = BooleanMatrix::from_bounds(&rb.lower, &rb.upper, ctx.universe.total, &mut ctx.cnf);
            ctx.sig_matrices.insert(id, m);
        }
    }

    let field_ids: Vec<SymbolId> = ctx.symtab.iter_kind(SymbolKind::Field).collect();
    for id in field_ids {
        let rb = ctx.bounds.fields.get(&id).expect("every field symbol has field bounds").clone();
        let is_var = ctx.symtab.get(id).var;
        if has_trace && is_var {
            let states: Vec<BooleanMatrix> = (0..length).map(|_| BooleanMatrix::from_bounds(&rb.lower, &rb.upper, ctx.universe.total, &mut ctx.cnf)).collect();
            ctx.trace.as_mut().unwrap().set_field_states(id, states);
        } else {
            let m = BooleanMatrix::from_bounds(&rb.lower, &rb.upper, ctx.universe.total, &mut ctx.cnf);
            ctx.field_matrices.insert(id, m);
        }
    }
}

/// Signature multiplicity, abstract-child disjointness/coverage, and field
/// multiplicity/`disj`. Field domain containment
/// needs no SAT clause: `Bounds::refine_field`'s upper bound already makes
/// any out-of-domain cell structurally `Const(false)`.
fn encode_structural_constraints(module: &Module, ctx: &mut TranslationContext, has_trace: bool, length: u32, out: &mut Vec<BooleanFormula>) {
    let states: Vec<u32> = states_range(has_trace, length).collect();
    let sig_ids: Vec<SymbolId> = ctx.symtab.iter_kind(SymbolKind::Signature).collect();

    // `var` sig multiplicity needs an explicit clause per state; non-`var`
    // sigs already get an exact atom count baked into universe allocation.
    for &id in &sig_ids {
        if let Some(mult) = sig_mult(module, ctx.symtab, id) {
            if ctx.symtab.get(id).var {
                for &s in &states {
                    let m = ctx.sig_matrix(id, s);
                    out.push(apply_mult(&m, mult, &mut ctx.cnf));
                }
            }
        }
    }

    for p in &module.paragraphs {
        let Paragraph::Sig(sig) = p else { continue };
        let Some(id) = ctx.symtab.local(ctx.root, sig.name) else { continue };
        if !sig.abstract_ {
            continue;
        }
        let children: Vec<SymbolId> = module
            .paragraphs
            .iter()
            .filter_map(|p2| match p2 {
                Paragraph::Sig(s2) => s2.extends.and_then(|ext| (ext == sig.name).then(|| ctx.symtab.local(ctx.root, s2.name)).flatten()),
                _ => None,
            })
            .collect();
        if children.is_empty() {
            continue;
        }
        for &s in &states {
            let parent_m = ctx.sig_matrix(id, s);
            let mut union_m = BooleanMatrix::constant(1, ctx.universe.total, false);
            for (i, &c1) in children.iter().enumerate() {
                let m1 = ctx.sig_matrix(c1, s);
                union_m = union_m.union(&m1, &mut ctx.cnf);
                for &c2 in &children[i + 1..] {
                    let m2 = ctx.sig_matrix(c2, s);
                    let inter = m1.intersection(&m2, &mut ctx.cnf);
                    out.push(inter.no(&mut ctx.cnf));
                }
            }
            out.push(parent_m.equals(&union_m, &mut ctx.cnf));
        }
    }

    for p in &module.paragraphs {
        let Paragraph::Sig(sig) = p else { continue };
        let Some(owner) = ctx.symtab.local(ctx.root, sig.name) else { continue };
        let owner_atoms: Vec<Atom> = ctx.universe.atoms_of(owner).to_vec();
        for f in &sig.fields {
            let Some(field_id) = ctx.symtab.local(ctx.root, f.name) else { continue };
            if let Some(mult) = f.mult {
                for &s in &states {
                    for &atom in &owner_atoms {
                        let field_m = ctx.field_matrix(field_id, s);
                        let image = singleton_matrix(ctx.universe.total, atom).join(&field_m, &mut ctx.cnf);
                        out.push(apply_mult(&image, mult, &mut ctx.cnf));
                    }
                }
            }
            if f.disj {
                for &s in &states {
                    for i in 0..owner_atoms.len() {
                        for j in (i + 1)..owner_atoms.len() {
                            let field_m = ctx.field_matrix(field_id, s);
                            let img_i = singleton_matrix(ctx.universe.total, owner_atoms[i]).join(&field_m, &mut ctx.cnf);
                            let img_j = singleton_matrix(ctx.universe.total, owner_atoms[j]).join(&field_m, &mut ctx.cnf);
                            let inter = img_i.intersection(&img_j, &mut ctx.cnf);
                            out.push(inter.no(&mut ctx.cnf));
                        }
                    }
                }
            }
        }
    }
}

fn sig_mult(module: &Module, symtab: &SymbolTable, id: SymbolId) -> Option<Mult> {
    for p in &module.paragraphs {
        if let Paragraph::Sig(sig) = p {
            if symtab.local(symtab.root_scope(), sig.name) == Some(id) {
                return sig.mult;
            }
        }
    }
    None
}

fn apply_mult(m: &BooleanMatrix, mult: Mult, cnf: &mut CnfBuilder) -> BooleanFormula {
    match mult {
        Mult::One => m.one(cnf),
        Mult::Lone => m.lone(cnf),
        Mult::Some => m.some(cnf),
        Mult::Set | Mult::No => BooleanFormula::TRUE,
    }
}

/// A fact/sig-fact/command body is conjoined across every trace state
/// unless its own top-level connective is already temporal, in which case
/// the temporal operator's own bounded-lasso semantics
/// already quantifies over the states that matter from state 0.
fn encode_global(formula: &Formula, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> BooleanFormula {
    let length = ctx.trace.as_ref().map(|t| t.length).unwrap_or(1);
    if matches!(formula.kind, FormulaKind::TemporalUnary(..) | FormulaKind::TemporalBinary(..)) {
        ctx.current_state = 0;
        encode_formula(formula, scope, decls, ctx)
    } else {
        let mut parts = Vec::with_capacity(length as usize);
        for s in 0..length {
            ctx.current_state = s;
            parts.push(encode_formula(formula, scope, decls, ctx));
        }
        BooleanFormula::and(parts)
    }
}

fn encode_command_body(command: &CommandDecl, root: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> BooleanFormula {
    match &command.kind {
        CommandKind::Run { target, args, inline_body } => {
            if let Some(body) = inline_body {
                return encode_global(body, root, decls, ctx);
            }
            let name = target.expect("a run command without an inline body always names a target");
            let Some(pred_id) = ctx.symtab.lookup(root, name) else {
                panic!("run target does not resolve to a declared predicate; semantic analysis should have rejected this")
            };
            let pred: &PredDecl = decls.preds.get(&pred_id).expect("run target resolves to a predicate declaration");
            encode_call_body(&pred.body, pred_id, args, root, decls, ctx, &pred.params)
        }
        CommandKind::Check { target } => {
            let Some(assert_id) = ctx.symtab.lookup(root, *target) else {
                panic!("check target does not resolve to a declared assertion; semantic analysis should have rejected this")
            };
            let assertion: &AssertDecl = decls.asserts.get(&assert_id).expect("check target resolves to an assertion declaration");
            encode_global(&assertion.body, root, decls, ctx)
        }
    }
}

/// Binds `args` fresh at each relevant state before encoding the callee's
/// body, since an argument expression may itself read a `var` relation.
fn encode_call_body(body: &Formula, target: SymbolId, args: &[Expr], scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext, params: &[crate::ast::ParamDecl]) -> BooleanFormula {
    let length = ctx.trace.as_ref().map(|t| t.length).unwrap_or(1);
    if matches!(body.kind, FormulaKind::TemporalUnary(..) | FormulaKind::TemporalBinary(..)) {
        ctx.current_state = 0;
        let call = CallTarget { target, receiver_expr: None };
        let body_scope = push_call_bindings(&call, args, scope, ctx.root, decls, ctx, params);
        let result = encode_formula(body, body_scope, decls, ctx);
        ctx.pop_scope();
        result
    } else {
        let mut parts = Vec::with_capacity(length as usize);
        for s in 0..length {
            ctx.current_state = s;
            let call = CallTarget { target, receiver_expr: None };
            let body_scope = push_call_bindings(&call, args, scope, ctx.root, decls, ctx, params);
            parts.push(encode_formula(body, body_scope, decls, ctx));
            ctx.pop_scope();
        }
        BooleanFormula::and(parts)
    }
}

/// Conservatively decides whether the model needs integer atoms at all
///: any `Int` type mention, integer literal, cardinality,
/// `sum`, or ordering comparison forces the universe to carve out a
/// two's-complement integer range.
fn module_needs_int(module: &Module) -> bool {
    for p in &module.paragraphs {
        match p {
            Paragraph::Sig(s) => {
                for f in &s.fields {
                    if expr_needs_int(&f.ty) {
                        return true;
                    }
                }
                for formula in &s.sig_facts {
                    if formula_needs_int(formula) {
                        return true;
                    }
                }
            }
            Paragraph::Fact(f) => {
                if formula_needs_int(&f.body) {
                    return true;
                }
            }
            Paragraph::Pred(pd) => {
                for param in &pd.params {
                    if expr_needs_int(&param.ty) {
                        return true;
                    }
                }
                if formula_needs_int(&pd.body) {
                    return true;
                }
            }
            Paragraph::Fun(fd) => {
                for param in &fd.params {
                    if expr_needs_int(&param.ty) {
                        return true;
                    }
                }
                if expr_needs_int(&fd.return_ty) || expr_needs_int(&fd.body) {
                    return true;
                }
            }
            Paragraph::Assert(ad) => {
                if formula_needs_int(&ad.body) {
                    return true;
                }
            }
            Paragraph::Enum(_) | Paragraph::Command(_) => {}
        }
    }
    false
}

fn expr_needs_int(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::IntType | ExprKind::IntLiteral(_) => true,
        ExprKind::Unary(UnOp::Cardinality, inner) => {
            let _ = inner;
            true
        }
        ExprKind::Unary(_, inner) | ExprKind::Prime(inner) => expr_needs_int(inner),
        ExprKind::Binary(_, l, r) => expr_needs_int(l) || expr_needs_int(r),
        ExprKind::BoxJoin { base, args } => expr_needs_int(base) || args.iter().any(expr_needs_int),
        ExprKind::Comprehension { decls, body } => decls.iter().any(|d| expr_needs_int(&d.ty)) || formula_needs_int(body),
        ExprKind::Let { value, body, .. } => expr_needs_int(value) || expr_needs_int(body),
        ExprKind::IfElse { cond, then_branch, else_branch } => formula_needs_int(cond) || expr_needs_int(then_branch) || expr_needs_int(else_branch),
        ExprKind::Sum { .. } => true,
        ExprKind::Block(formulas) => formulas.iter().any(formula_needs_int),
        ExprKind::None_ | ExprKind::Univ | ExprKind::Iden | ExprKind::This | ExprKind::Name(_) | ExprKind::AtName(_) => false,
    }
}

fn formula_needs_int(f: &Formula) -> bool {
    match &f.kind {
        FormulaKind::Const(_) => false,
        FormulaKind::Binary(_, l, r) => formula_needs_int(l) || formula_needs_int(r),
        FormulaKind::Not(inner) => formula_needs_int(inner),
        FormulaKind::IfElse { cond, then_branch, else_branch } => formula_needs_int(cond) || formula_needs_int(then_branch) || else_branch.as_deref().is_some_and(formula_needs_int),
        FormulaKind::Quantified { decls, body, .. } => decls.iter().any(|d| expr_needs_int(&d.ty)) || formula_needs_int(body),
        FormulaKind::Let { value, body, .. } => expr_needs_int(value) || formula_needs_int(body),
        FormulaKind::TemporalUnary(_, inner) => formula_needs_int(inner),
        FormulaKind::TemporalBinary(op, l, r) => matches!(op, TemporalBinOp::Until | TemporalBinOp::Releases | TemporalBinOp::Since | TemporalBinOp::Triggered | TemporalBinOp::Sequence) && (formula_needs_int(l) || formula_needs_int(r)),
        FormulaKind::Comparison(op, l, r) => {
            matches!(op, crate::ast::CompareOp::Lt | crate::ast::CompareOp::Le | crate::ast::CompareOp::Gt | crate::ast::CompareOp::Ge) || expr_needs_int(l) || expr_needs_int(r)
        }
        FormulaKind::Multiplicity(_, e) => expr_needs_int(e),
        FormulaKind::ExprAsFormula(e) => expr_needs_int(e),
        FormulaKind::Block(fs) => fs.iter().any(formula_needs_int),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_overrides_replace_only_the_fields_given() {
        let mut scope = Scope { default_scope: Some(3), per_sig: vec![], steps: None, int_bitwidth: None, expect: None };
        let overrides = ScopeOverrides { default_scope: None, steps: Some(5), int_bitwidth: None };
        overrides.apply(&mut scope);
        assert_eq!(scope.default_scope, Some(3));
        assert_eq!(scope.steps, Some(5));
    }

    #[test]
    fn matches_expect_treats_zero_as_expecting_unsat() {
        assert!(matches_expect(&CommandOutcome::NoInstance, 0));
        assert!(!matches_expect(&CommandOutcome::NoInstance, 1));
    }
}

//! Temporal/LTL Encoder: future operators quantify over the
//! bounded lasso trace's remaining prefix plus, when the command requires a
//! loop, the looped suffix gated by the one-hot loop selector; past duals
//! quantify only over the finite prefix already walked (state 0 has no
//! predecessor, so `before`/`since` bottom out there without wrapping).

use crate::ast::{Formula, TemporalBinOp, TemporalUnOp};
use crate::context::TranslationContext;
use crate::encode::formula_encoder::encode_formula;
use crate::encode::Declarations;
use crate::kernel::bool_formula::BooleanFormula;
use crate::semantics::symtab::ScopeId;

fn encode_at(formula: &Formula, state: u32, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> BooleanFormula {
    let saved = ctx.current_state;
    ctx.current_state = state;
    let result = encode_formula(formula, scope, decls, ctx);
    ctx.current_state = saved;
    result
}

/// Every state's encoding of `formula`, `0..length`, computed once so the
/// various temporal operators can slice and recombine it cheaply.
fn all_states(formula: &Formula, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> Vec<BooleanFormula> {
    let length = ctx.trace.as_ref().expect("temporal operator used outside a steps-bearing command").length;
    (0..length).map(|t| encode_at(formula, t, scope, decls, ctx)).collect()
}

fn and_range(vals: &[BooleanFormula], lo: u32, hi_inclusive: u32) -> BooleanFormula {
    if lo > hi_inclusive {
        return BooleanFormula::TRUE;
    }
    BooleanFormula::and((lo..=hi_inclusive).map(|t| vals[t as usize].clone()))
}

fn or_range(vals: &[BooleanFormula], lo: u32, hi_inclusive: u32) -> BooleanFormula {
    if lo > hi_inclusive {
        return BooleanFormula::FALSE;
    }
    BooleanFormula::or((lo..=hi_inclusive).map(|t| vals[t as usize].clone()))
}

fn after_value(vals: &[BooleanFormula], s: u32, ctx: &TranslationContext) -> BooleanFormula {
    let trace = ctx.trace.as_ref().unwrap();
    if s + 1 < trace.length {
        return vals[(s + 1) as usize].clone();
    }
    BooleanFormula::or(trace.loop_lits.iter().enumerate().map(|(l, &lit)| BooleanFormula::and(vec![BooleanFormula::Var(lit), vals[l].clone()])))
}

fn always_value(vals: &[BooleanFormula], s: u32, ctx: &TranslationContext) -> BooleanFormula {
    let trace = ctx.trace.as_ref().unwrap();
    let suffix = and_range(vals, s, trace.length - 1);
    if !trace.requires_loop || s == 0 {
        return suffix;
    }
    let wrap = BooleanFormula::and((0..s).map(|l| {
        let lit = trace.loop_lits[l as usize];
        BooleanFormula::implies(BooleanFormula::Var(lit), and_range(vals, l, s - 1))
    }));
    BooleanFormula::and(vec![suffix, wrap])
}

fn eventually_value(vals: &[BooleanFormula], s: u32, ctx: &TranslationContext) -> BooleanFormula {
    let trace = ctx.trace.as_ref().unwrap();
    let suffix = or_range(vals, s, trace.length - 1);
    if !trace.requires_loop || s == 0 {
        return suffix;
    }
    let wrap = BooleanFormula::or((0..s).map(|l| {
        let lit = trace.loop_lits[l as usize];
        BooleanFormula::and(vec![BooleanFormula::Var(lit), or_range(vals, l, s - 1)])
    }));
    BooleanFormula::or(vec![suffix, wrap])
}

fn historically_value(vals: &[BooleanFormula], s: u32) -> BooleanFormula {
    and_range(vals, 0, s)
}

fn once_value(vals: &[BooleanFormula], s: u32) -> BooleanFormula {
    or_range(vals, 0, s)
}

fn before_value(vals: &[BooleanFormula], s: u32) -> BooleanFormula {
    if s == 0 {
        BooleanFormula::FALSE
    } else {
        vals[(s - 1) as usize].clone()
    }
}

pub fn encode_temporal_unary(op: TemporalUnOp, inner: &Formula, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> BooleanFormula {
    let vals = all_states(inner, scope, decls, ctx);
    let s = ctx.current_state;
    match op {
        TemporalUnOp::After => after_value(&vals, s, ctx),
        TemporalUnOp::Always => always_value(&vals, s, ctx),
        TemporalUnOp::Eventually => eventually_value(&vals, s, ctx),
        TemporalUnOp::Historically => historically_value(&vals, s),
        TemporalUnOp::Once => once_value(&vals, s),
        TemporalUnOp::Before => before_value(&vals, s),
    }
}

pub fn encode_temporal_binary(op: TemporalBinOp, l: &Formula, r: &Formula, scope: ScopeId, decls: &Declarations, ctx: &mut TranslationContext) -> BooleanFormula {
    let s = ctx.current_state;
    match op {
        TemporalBinOp::Until => {
            let f_vals = all_states(l, scope, decls, ctx);
            let g_vals = all_states(r, scope, decls, ctx);
            until_from(&f_vals, &g_vals, s, ctx)
        }
        TemporalBinOp::Releases => {
            let f_vals: Vec<BooleanFormula> = all_states(l, scope, decls, ctx).into_iter().map(BooleanFormula::not).collect();
            let g_vals: Vec<BooleanFormula> = all_states(r, scope, decls, ctx).into_iter().map(BooleanFormula::not).collect();
            until_from(&f_vals, &g_vals, s, ctx).not()
        }
        TemporalBinOp::Since => {
            let f_vals = all_states(l, scope, decls, ctx);
            let g_vals = all_states(r, scope, decls, ctx);
            since_from(&f_vals, &g_vals, s)
        }
        TemporalBinOp::Triggered => {
            let f_vals: Vec<BooleanFormula> = all_states(l, scope, decls, ctx).into_iter().map(BooleanFormula::not).collect();
            let g_vals: Vec<BooleanFormula> = all_states(r, scope, decls, ctx).into_iter().map(BooleanFormula::not).collect();
            since_from(&f_vals, &g_vals, s).not()
        }
        TemporalBinOp::Sequence => {
            let lf = encode_at(l, s, scope, decls, ctx);
            let g_vals = all_states(r, scope, decls, ctx);
            let rg_next = after_value(&g_vals, s, ctx);
            BooleanFormula::and(vec![lf, rg_next])
        }
    }
}

/// Bounded `f U g` from state `s`: a witness within the remaining finite
/// prefix, or, when the trace requires a loop, one extra pass through the
/// looped suffix gated by whichever state the loop actually closes to.
fn until_from(f_vals: &[BooleanFormula], g_vals: &[BooleanFormula], s: u32, ctx: &TranslationContext) -> BooleanFormula {
    let trace = ctx.trace.as_ref().unwrap();
    let direct = scan_until(f_vals, g_vals, s, trace.length - 1);
    if !trace.requires_loop {
        return direct;
    }
    let mut branches = vec![direct];
    for l in 0..trace.length {
        let lit = trace.loop_lits[l as usize];
        let prefix_f_holds = and_range(f_vals, s, trace.length - 1);
        let loop_witness = scan_until(f_vals, g_vals, l, trace.length - 1);
        branches.push(BooleanFormula::and(vec![BooleanFormula::Var(lit), prefix_f_holds, loop_witness]));
    }
    BooleanFormula::or(branches)
}

fn scan_until(f_vals: &[BooleanFormula], g_vals: &[BooleanFormula], lo: u32, hi_inclusive: u32) -> BooleanFormula {
    if lo > hi_inclusive {
        return BooleanFormula::FALSE;
    }
    BooleanFormula::or((lo..=hi_inclusive).map(|t| {
        let prefix = if t == lo { BooleanFormula::TRUE } else { and_range(f_vals, lo, t - 1) };
        BooleanFormula::and(vec![g_vals[t as usize].clone(), prefix])
    }))
}

fn since_from(f_vals: &[BooleanFormula], g_vals: &[BooleanFormula], s: u32) -> BooleanFormula {
    if s == 0 {
        return g_vals[0].clone();
    }
    BooleanFormula::or((0..=s).map(|t| {
        let suffix = if t == s { BooleanFormula::TRUE } else { and_range(f_vals, t + 1, s) };
        BooleanFormula::and(vec![g_vals[t as usize].clone(), suffix])
    }))
}

//! Instance Extractor: reads a satisfying assignment back
//! into signature/field tuple sets, one snapshot per trace state, plus the
//! decoded loop-back state for temporal models.

use std::collections::BTreeMap;
use std::fmt;

use crate::context::TranslationContext;
use crate::intern::Interner;
use crate::semantics::symtab::{SymbolKind, SymbolTable};
use crate::tupleset::TupleSet;
use crate::universe::Universe;

/// One state's readback: every non-abstract signature and every field,
/// named and keyed by declaration order isn't preserved (a `BTreeMap` sorts
/// by name instead, for deterministic output).
pub struct StateSnapshot {
    pub sigs: BTreeMap<String, TupleSet>,
    pub fields: BTreeMap<String, TupleSet>,
}

pub struct Instance {
    pub states: Vec<StateSnapshot>,
    /// Index into `states` the lasso loops back to, when the command
    /// required one.
    pub loop_state: Option<u32>,
}

pub fn extract_instance(ctx: &TranslationContext, assignment: &[bool], symtab: &SymbolTable, universe: &Universe, interner: &Interner) -> Instance {
    let length = ctx.trace.as_ref().map(|t| t.length).unwrap_or(1);
    let mut states = Vec::with_capacity(length as usize);
    for s in 0..length {
        let mut sigs = BTreeMap::new();
        for id in symtab.iter_kind(SymbolKind::Signature) {
            let name = interner.resolve(symtab.get(id).name).to_string();
            let matrix = ctx.sig_matrix(id, s);
            sigs.insert(name, matrix.extract(assignment));
        }
        let mut fields = BTreeMap::new();
        for id in symtab.iter_kind(SymbolKind::Field) {
            let owner = symtab.get(id).owner.expect("field symbol always has an owner");
            let owner_name = interner.resolve(symtab.get(owner).name);
            let field_name = interner.resolve(symtab.get(id).name);
            let qualified = format!("{owner_name}.{field_name}");
            let matrix = ctx.field_matrix(id, s);
            fields.insert(qualified, matrix.extract(assignment));
        }
        states.push(StateSnapshot { sigs, fields });
    }

    let loop_state = ctx.trace.as_ref().filter(|t| t.requires_loop).and_then(|t| {
        t.loop_lits.iter().position(|&lit| {
            let idx = (lit.var() - 1) as usize;
            assignment.get(idx).copied().unwrap_or(false) == lit.polarity()
        })
    }).map(|l| l as u32);

    Instance { states, loop_state }
}

impl Instance {
    /// Renders atom ids through `universe.name_of` for display.
    pub fn render(&self, universe: &Universe) -> String {
        let mut out = String::new();
        for (i, state) in self.states.iter().enumerate() {
            if self.states.len() > 1 {
                out.push_str(&format!("-- state {i} --\n"));
            }
            for (name, set) in &state.sigs {
                out.push_str(&format!("{name} = {}\n", render_set(set, universe)));
            }
            for (name, set) in &state.fields {
                out.push_str(&format!("{name} = {}\n", render_set(set, universe)));
            }
        }
        if let Some(l) = self.loop_state {
            out.push_str(&format!("loop back to state {l}\n"));
        }
        out
    }
}

fn render_set(set: &TupleSet, universe: &Universe) -> String {
    let rows: Vec<String> = set
        .iter()
        .map(|t| {
            if t.len() == 1 {
                universe.name_of(t[0]).to_string()
            } else {
                let names: Vec<&str> = t.iter().map(|a| universe.name_of(*a)).collect();
                format!("({})", names.join(", "))
            }
        })
        .collect();
    format!("{{{}}}", rows.join(", "))
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({} state(s), loop={:?})", self.states.len(), self.loop_state)
    }
}

//! Universe & Bounds Builder, atom-allocation half.
//!
//! Builds the flat atom universe from the signature DAG and a command
//! scope: concrete (non-abstract-or-leaf) signatures get fresh atoms in
//! topological order, then abstract/non-leaf signatures are recomputed as
//! the union of their descendants.

use std::collections::HashMap;

use crate::ast::{Mult, Scope};
use crate::diagnostics::{Code, Diagnostic, DiagnosticCollector};
use crate::intern::Interner;
use crate::semantics::sig_graph::SigGraph;
use crate::semantics::symtab::{ScopeId, SymbolId, SymbolTable};
use crate::token::Span;
use crate::tupleset::Atom;

pub const DEFAULT_SCOPE: u32 = 3;
pub const DEFAULT_BITWIDTH: u32 = 4;

#[derive(Debug, Clone)]
pub struct IntegerFactory {
    pub bitwidth: u32,
    value_to_atom: HashMap<i64, Atom>,
    atom_to_value: HashMap<Atom, i64>,
}

impl IntegerFactory {
    fn new(bitwidth: u32, start: u32) -> Self {
        let half = 1i64 << (bitwidth - 1);
        let mut value_to_atom = HashMap::new();
        let mut atom_to_value = HashMap::new();
        let mut idx = start;
        for v in -half..half {
            let atom = Atom(idx);
            value_to_atom.insert(v, atom);
            atom_to_value.insert(atom, v);
            idx += 1;
        }
        Self { bitwidth, value_to_atom, atom_to_value }
    }

    pub fn atom_of(&self, v: i64) -> Option<Atom> {
        self.value_to_atom.get(&v).copied()
    }

    pub fn value_of(&self, a: Atom) -> Option<i64> {
        self.atom_to_value.get(&a).copied()
    }

    pub fn min(&self) -> i64 {
        -(1i64 << (self.bitwidth - 1))
    }

    pub fn max(&self) -> i64 {
        (1i64 << (self.bitwidth - 1)) - 1
    }

    pub fn all_atoms(&self) -> impl Iterator<Item = (i64, Atom)> + '_ {
        self.value_to_atom.iter().map(|(&v, &a)| (v, a))
    }
}

pub struct Universe {
    /// Atoms directly or transitively belonging to each signature, in
    /// ascending index order.
    atoms_of: HashMap<SymbolId, Vec<Atom>>,
    pub names: Vec<String>,
    pub total: usize,
    pub int_factory: Option<IntegerFactory>,
}

impl Universe {
    pub fn atoms_of(&self, sig: SymbolId) -> &[Atom] {
        self.atoms_of.get(&sig).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn name_of(&self, atom: Atom) -> &str {
        &self.names[atom.0 as usize]
    }
}

#[allow(clippy::too_many_arguments)]
pub fn build_universe(
    sig_order: &[SymbolId],
    symtab: &SymbolTable,
    sig_graph: &SigGraph,
    root: ScopeId,
    scope: &Scope,
    needs_int: bool,
    interner: &Interner,
    diags: &mut DiagnosticCollector,
) -> Universe {
    let mut atoms_of: HashMap<SymbolId, Vec<Atom>> = HashMap::new();
    let mut names = Vec::new();
    let mut next = 0u32;

    let per_sig_count: HashMap<SymbolId, (u32, bool)> = scope
        .per_sig
        .iter()
        .filter_map(|s| symtab.lookup(root, s.sig).map(|id| (id, (s.count, s.exact))))
        .collect();

    for &id in sig_order {
        let is_leaf = sig_graph.children_of(id).is_empty();
        let node = match sig_graph.get(id) {
            Some(n) => n,
            None => continue,
        };
        let concrete = !node.abstract_ || is_leaf;
        if !concrete {
            continue;
        }
        let name = interner.resolve(node.name).to_string();
        let n = resolve_count(id, node.mult, scope.default_scope, &per_sig_count, name_span(symtab, id), diags);
        let mut atoms = Vec::with_capacity(n as usize);
        for i in 0..n {
            names.push(format!("{name}${i}"));
            atoms.push(Atom(next));
            next += 1;
        }
        atoms_of.insert(id, atoms);
    }

    // Second pass, children-before-parents: fold descendant atoms upward.
    for &id in sig_order.iter().rev() {
        if sig_graph.get(id).is_none() {
            continue;
        }
        let children = sig_graph.children_of(id).to_vec();
        if children.is_empty() {
            continue;
        }
        let mut combined = atoms_of.get(&id).cloned().unwrap_or_default();
        for child in children {
            if let Some(child_atoms) = atoms_of.get(&child) {
                combined.extend(child_atoms.iter().copied());
            }
        }
        combined.sort();
        combined.dedup();
        atoms_of.insert(id, combined);
    }

    let int_factory = if needs_int {
        let bw = scope.int_bitwidth.unwrap_or(DEFAULT_BITWIDTH).clamp(1, 16);
        let factory = IntegerFactory::new(bw, next);
        for v in factory.min()..=factory.max() {
            names.push(format!("Int${v}"));
        }
        next += 1u32 << bw;
        Some(factory)
    } else {
        None
    };

    Universe { atoms_of, names, total: next as usize, int_factory }
}

fn resolve_count(
    id: SymbolId,
    mult: Option<Mult>,
    default_scope: Option<u32>,
    per_sig: &HashMap<SymbolId, (u32, bool)>,
    span: Span,
    diags: &mut DiagnosticCollector,
) -> u32 {
    if let Some((n, exact)) = per_sig.get(&id) {
        if *exact {
            return *n;
        }
        return apply_mult(*n, mult);
    }
    let base = default_scope.unwrap_or(DEFAULT_SCOPE);
    let n = apply_mult(base, mult);
    if n == 0 {
        diags.push(Diagnostic::new(Code::ScopeTooSmall, span, "signature scope resolved to zero atoms".to_string()));
    }
    n
}

fn apply_mult(n: u32, mult: Option<Mult>) -> u32 {
    match mult {
        Some(Mult::One) => 1,
        Some(Mult::Lone) => n.min(1),
        Some(Mult::Some) => n.max(1),
        _ => n,
    }
}

fn name_span(symtab: &SymbolTable, id: SymbolId) -> Span {
    symtab.get(id).span
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SigScope;
    use crate::intern::Interner;
    use crate::semantics::symtab::{ScopeKind, SymbolKind, SymbolRecord};
    use crate::semantics::types::{SigNode, Type};

    fn setup() -> (SymbolTable, SigGraph, Interner, ScopeId, SymbolId, SymbolId, SymbolId) {
        let mut interner = Interner::new();
        let mut symtab = SymbolTable::new();
        let mut graph = SigGraph::new();
        let root = symtab.root_scope();
        let animal = interner.intern("Animal");
        let dog = interner.intern("Dog");
        let cat = interner.intern("Cat");
        let animal_id = symtab.declare(root, SymbolRecord { kind: SymbolKind::Signature, name: animal, span: Span::default(), ty: Type::Error, owner: None, var: false, private: false });
        let dog_id = symtab.declare(root, SymbolRecord { kind: SymbolKind::Signature, name: dog, span: Span::default(), ty: Type::Error, owner: None, var: false, private: false });
        let cat_id = symtab.declare(root, SymbolRecord { kind: SymbolKind::Signature, name: cat, span: Span::default(), ty: Type::Error, owner: None, var: false, private: false });
        graph.insert(SigNode { id: animal_id, name: animal, extends: None, in_parents: vec![], abstract_: true, mult: None });
        graph.insert(SigNode { id: dog_id, name: dog, extends: Some(animal_id), in_parents: vec![], abstract_: false, mult: None });
        graph.insert(SigNode { id: cat_id, name: cat, extends: Some(animal_id), in_parents: vec![], abstract_: false, mult: None });
        (symtab, graph, interner, root, animal_id, dog_id, cat_id)
    }

    #[test]
    fn abstract_signature_atoms_equal_union_of_children() {
        let (symtab, graph, interner, root, animal_id, dog_id, cat_id) = setup();
        let mut diags = DiagnosticCollector::new();
        let order = graph.topo_order(&mut diags, |id| symtab.get(id).span);
        let scope = Scope {
            default_scope: Some(3),
            per_sig: vec![
                SigScope { sig: interner.lookup("Dog").unwrap(), count: 2, exact: false, span: Span::default() },
                SigScope { sig: interner.lookup("Cat").unwrap(), count: 1, exact: false, span: Span::default() },
            ],
            steps: None,
            int_bitwidth: None,
            expect: None,
        };
        let universe = build_universe(&order, &symtab, &graph, root, &scope, false, &interner, &mut diags);
        assert_eq!(universe.atoms_of(dog_id).len(), 2);
        assert_eq!(universe.atoms_of(cat_id).len(), 1);
        assert_eq!(universe.atoms_of(animal_id).len(), 3);
        let dogs: std::collections::HashSet<_> = universe.atoms_of(dog_id).iter().collect();
        let cats: std::collections::HashSet<_> = universe.atoms_of(cat_id).iter().collect();
        assert!(dogs.is_disjoint(&cats));
    }

    #[test]
    fn integer_atoms_span_the_full_twos_complement_range() {
        let (symtab, graph, interner, root, ..) = setup();
        let mut diags = DiagnosticCollector::new();
        let order = graph.topo_order(&mut diags, |id| symtab.get(id).span);
        let scope = Scope { default_scope: Some(1), per_sig: vec![], steps: None, int_bitwidth: Some(3), expect: None };
        let universe = build_universe(&order, &symtab, &graph, root, &scope, true, &interner, &mut diags);
        let factory = universe.int_factory.as_ref().unwrap();
        assert_eq!(factory.min(), -4);
        assert_eq!(factory.max(), 3);
        assert_eq!(factory.all_atoms().count(), 8);
    }
}

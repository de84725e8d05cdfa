//! Universe & Bounds Builder, bounds half.

use std::collections::HashMap;

use crate::ast::{BinOp, Expr, ExprKind};
use crate::semantics::symtab::{ScopeId, SymbolId, SymbolKind, SymbolTable};
use crate::tupleset::TupleSet;
use crate::universe::Universe;

#[derive(Debug, Clone)]
pub struct RelationBounds {
    pub lower: TupleSet,
    pub upper: TupleSet,
}

impl RelationBounds {
    pub fn exact(set: TupleSet) -> Self {
        Self { lower: set.clone(), upper: set }
    }

    pub fn free(arity: usize, upper: TupleSet) -> Self {
        Self { lower: TupleSet::empty(arity), upper }
    }
}

pub struct Bounds {
    pub sigs: HashMap<SymbolId, RelationBounds>,
    pub fields: HashMap<SymbolId, RelationBounds>,
}

impl Bounds {
    pub fn build(universe: &Universe, symtab: &SymbolTable, root: ScopeId) -> Self {
        let mut sigs = HashMap::new();
        for id in symtab.iter_kind(SymbolKind::Signature).chain(symtab.iter_kind(SymbolKind::EnumType)).chain(symtab.iter_kind(SymbolKind::EnumValue)) {
            let set = TupleSet::unary_from_atoms(universe.atoms_of(id).iter().copied());
            sigs.insert(id, RelationBounds::exact(set));
        }

        let mut fields = HashMap::new();
        for id in symtab.iter_kind(SymbolKind::Field) {
            let record = symtab.get(id);
            let owner = record.owner.expect("field symbol always has an owner");
            let owner_atoms = TupleSet::unary_from_atoms(universe.atoms_of(owner).iter().copied());
            // The field's declared relational type is reconstructed from its
            // arity-only `Type`; exact column identity would need the
            // original type expression, which callers supply separately via
            // `field_upper` for declarations that need it (abstract sigs'
            // synthetic bounds use the plain owner x univ upper bound).
            let arity = record.ty.arity().unwrap_or(2).max(2);
            let remaining_arity = arity - 1;
            let rest = universe_product(universe, remaining_arity);
            let upper = owner_atoms.product(&rest);
            fields.insert(id, RelationBounds::free(arity, upper));
        }
        let _ = root;
        Bounds { sigs, fields }
    }

    /// Refines a field's upper bound using its declared type expression
    /// (`upper = {(s, t1,…,tk): s∈S, ti∈Ti}`), when the expression resolves
    /// to concrete named types.
    pub fn refine_field(&mut self, field: SymbolId, owner: SymbolId, ty_expr: &Expr, universe: &Universe, symtab: &SymbolTable, root: ScopeId) {
        let owner_atoms = TupleSet::unary_from_atoms(universe.atoms_of(owner).iter().copied());
        if let Some(rest) = type_expr_tupleset(ty_expr, universe, symtab, root) {
            let upper = owner_atoms.product(&rest);
            self.fields.insert(field, RelationBounds::free(upper.arity(), upper));
        }
    }
}

fn universe_product(universe: &Universe, arity: usize) -> TupleSet {
    let univ = TupleSet::unary_from_atoms((0..universe.total as u32).map(crate::tupleset::Atom));
    let mut acc = TupleSet::unary_from_atoms(std::iter::empty());
    if arity == 0 {
        return acc;
    }
    acc = univ.clone();
    for _ in 1..arity {
        acc = acc.product(&univ);
    }
    acc
}

/// Evaluates a field/parameter type expression to the TupleSet it denotes,
/// for the restricted grammar type expressions actually use: signature
/// names, `Int`, `univ`, and `->`/`+`/`&` combinations of those.
pub fn type_expr_tupleset(expr: &Expr, universe: &Universe, symtab: &SymbolTable, root: ScopeId) -> Option<TupleSet> {
    match &expr.kind {
        ExprKind::Univ => Some(TupleSet::unary_from_atoms((0..universe.total as u32).map(crate::tupleset::Atom))),
        ExprKind::IntType => {
            let factory = universe.int_factory.as_ref()?;
            Some(TupleSet::unary_from_atoms(factory.all_atoms().map(|(_, a)| a)))
        }
        ExprKind::None_ => Some(TupleSet::empty(1)),
        ExprKind::Name(name) | ExprKind::AtName(name) => {
            let id = symtab.lookup(root, *name)?;
            if matches!(symtab.get(id).kind, SymbolKind::Signature | SymbolKind::EnumType | SymbolKind::EnumValue) {
                Some(TupleSet::unary_from_atoms(universe.atoms_of(id).iter().copied()))
            } else {
                None
            }
        }
        ExprKind::Binary(BinOp::Product, l, r) => {
            let lt = type_expr_tupleset(l, universe, symtab, root)?;
            let rt = type_expr_tupleset(r, universe, symtab, root)?;
            Some(lt.product(&rt))
        }
        ExprKind::Binary(BinOp::Union, l, r) => {
            let lt = type_expr_tupleset(l, universe, symtab, root)?;
            let rt = type_expr_tupleset(r, universe, symtab, root)?;
            Some(lt.union(&rt))
        }
        ExprKind::Binary(BinOp::Intersect, l, r) => {
            let lt = type_expr_tupleset(l, universe, symtab, root)?;
            let rt = type_expr_tupleset(r, universe, symtab, root)?;
            Some(lt.intersection(&rt))
        }
        _ => None,
    }
}

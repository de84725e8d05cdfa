//! Symbol table: arena of symbol records + indices, avoiding the reference
//! cycles a pointer-graph signature<->field<->owner representation would
//! need.

use std::collections::HashMap;

use crate::intern::Symbol;
use crate::semantics::types::Type;
use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Signature,
    Field,
    Predicate,
    Function,
    Fact,
    Assertion,
    EnumType,
    EnumValue,
    Parameter,
    QuantifierVar,
    LetVar,
    Module,
}

#[derive(Debug, Clone)]
pub struct SymbolRecord {
    pub kind: SymbolKind,
    pub name: Symbol,
    pub span: Span,
    pub ty: Type,
    /// For `Field`: the owning signature. For `EnumValue`: the owning enum.
    pub owner: Option<SymbolId>,
    pub var: bool,
    pub private: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Signature,
    Predicate,
    Function,
    Quantifier,
    Let,
    Block,
}

#[derive(Debug, Clone)]
struct ScopeRecord {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    bindings: HashMap<Symbol, SymbolId>,
}

/// Long-lived arena of symbols plus a tree of lexical scopes. Quantifier/let
/// scopes are created on entering and destroyed (unbound, not physically
/// freed) on exit by the caller.
pub struct SymbolTable {
    symbols: Vec<SymbolRecord>,
    scopes: Vec<ScopeRecord>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut t = Self { symbols: Vec::new(), scopes: Vec::new() };
        t.scopes.push(ScopeRecord { kind: ScopeKind::Module, parent: None, bindings: HashMap::new() });
        t
    }

    pub fn root_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn push_scope(&mut self, kind: ScopeKind, parent: ScopeId) -> ScopeId {
        self.scopes.push(ScopeRecord { kind, parent: Some(parent), bindings: HashMap::new() });
        ScopeId((self.scopes.len() - 1) as u32)
    }

    pub fn declare(&mut self, scope: ScopeId, record: SymbolRecord) -> SymbolId {
        let name = record.name;
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(record);
        self.scopes[scope.0 as usize].bindings.insert(name, id);
        id
    }

    /// Returns the existing symbol bound to `name` directly in `scope`, if any.
    pub fn local(&self, scope: ScopeId, name: Symbol) -> Option<SymbolId> {
        self.scopes[scope.0 as usize].bindings.get(&name).copied()
    }

    /// Walks the scope chain from `scope` outward, searching locally then
    /// each enclosing parent in turn.
    pub fn lookup(&self, scope: ScopeId, name: Symbol) -> Option<SymbolId> {
        let mut cur = Some(scope);
        while let Some(s) = cur {
            if let Some(&id) = self.scopes[s.0 as usize].bindings.get(&name) {
                return Some(id);
            }
            cur = self.scopes[s.0 as usize].parent;
        }
        None
    }

    pub fn get(&self, id: SymbolId) -> &SymbolRecord {
        &self.symbols[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut SymbolRecord {
        &mut self.symbols[id.0 as usize]
    }

    pub fn scope_kind(&self, scope: ScopeId) -> ScopeKind {
        self.scopes[scope.0 as usize].kind
    }

    pub fn parent_scope(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0 as usize].parent
    }

    pub fn iter_kind(&self, kind: SymbolKind) -> impl Iterator<Item = SymbolId> + '_ {
        self.symbols.iter().enumerate().filter_map(move |(i, r)| {
            if r.kind == kind {
                Some(SymbolId(i as u32))
            } else {
                None
            }
        })
    }

    pub fn fields_of(&self, owner: SymbolId) -> Vec<SymbolId> {
        self.symbols
            .iter()
            .enumerate()
            .filter_map(|(i, r)| {
                if r.kind == SymbolKind::Field && r.owner == Some(owner) {
                    Some(SymbolId(i as u32))
                } else {
                    None
                }
            })
            .collect()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;

    #[test]
    fn lookup_walks_parent_chain() {
        let mut interner = Interner::new();
        let mut table = SymbolTable::new();
        let root = table.root_scope();
        let name = interner.intern("Person");
        let id = table.declare(
            root,
            SymbolRecord { kind: SymbolKind::Signature, name, span: Span::default(), ty: Type::Univ, owner: None, var: false, private: false },
        );
        let child = table.push_scope(ScopeKind::Predicate, root);
        assert_eq!(table.lookup(child, name), Some(id));
        assert_eq!(table.local(child, name), None);
    }

    #[test]
    fn duplicate_declaration_in_same_scope_shadows_previous_binding() {
        let mut interner = Interner::new();
        let mut table = SymbolTable::new();
        let root = table.root_scope();
        let name = interner.intern("X");
        let first = table.declare(
            root,
            SymbolRecord { kind: SymbolKind::Signature, name, span: Span::default(), ty: Type::Univ, owner: None, var: false, private: false },
        );
        let second = table.declare(
            root,
            SymbolRecord { kind: SymbolKind::Signature, name, span: Span::default(), ty: Type::Univ, owner: None, var: false, private: false },
        );
        assert_ne!(first, second);
        assert_eq!(table.local(root, name), Some(second));
    }
}

//! Signature inheritance DAG: the hierarchy forms a DAG, not a class
//! hierarchy, and is resolved as its own analysis phase.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::{Code, Diagnostic, DiagnosticCollector};
use crate::semantics::symtab::SymbolId;
use crate::semantics::types::SigNode;
use crate::token::Span;

pub struct SigGraph {
    nodes: HashMap<SymbolId, SigNode>,
    children: HashMap<SymbolId, Vec<SymbolId>>,
}

impl SigGraph {
    pub fn new() -> Self {
        Self { nodes: HashMap::new(), children: HashMap::new() }
    }

    pub fn insert(&mut self, node: SigNode) {
        if let Some(p) = node.extends {
            self.children.entry(p).or_default().push(node.id);
        }
        self.nodes.insert(node.id, node);
    }

    pub fn get(&self, id: SymbolId) -> Option<&SigNode> {
        self.nodes.get(&id)
    }

    pub fn children_of(&self, id: SymbolId) -> &[SymbolId] {
        self.children.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn parent_of(&self, id: SymbolId) -> Option<SymbolId> {
        self.nodes.get(&id).and_then(|n| n.extends)
    }

    /// Is `sub` equal to or a transitive `extends`-descendant of `sup`?
    pub fn is_descendant(&self, sub: SymbolId, sup: SymbolId) -> bool {
        let mut cur = Some(sub);
        while let Some(c) = cur {
            if c == sup {
                return true;
            }
            cur = self.parent_of(c);
        }
        false
    }

    /// Root signatures: those without `extends`.
    pub fn roots(&self) -> Vec<SymbolId> {
        self.nodes.values().filter(|n| n.extends.is_none()).map(|n| n.id).collect()
    }

    /// Topological order, root-first. Reports `E305` (cyclic hierarchy) and
    /// returns a best-effort order (cycle members last, in declaration
    /// order) if a cycle exists.
    pub fn topo_order(&self, diags: &mut DiagnosticCollector, span_of: impl Fn(SymbolId) -> Span) -> Vec<SymbolId> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut order = Vec::new();
        let mut reported = HashSet::new();

        let mut ids: Vec<SymbolId> = self.nodes.keys().copied().collect();
        ids.sort_by_key(|id| id.0);

        for &id in &ids {
            if !visited.contains(&id) {
                self.visit(id, &mut visited, &mut on_stack, &mut order, &mut reported, diags, &span_of);
            }
        }
        order
    }

    #[allow(clippy::too_many_arguments)]
    fn visit(
        &self,
        id: SymbolId,
        visited: &mut HashSet<SymbolId>,
        on_stack: &mut HashSet<SymbolId>,
        order: &mut Vec<SymbolId>,
        reported: &mut HashSet<SymbolId>,
        diags: &mut DiagnosticCollector,
        span_of: &impl Fn(SymbolId) -> Span,
    ) {
        if on_stack.contains(&id) {
            if reported.insert(id) {
                diags.push(Diagnostic::new(Code::CyclicInheritance, span_of(id), "signature hierarchy contains a cycle".to_string()));
            }
            return;
        }
        if visited.contains(&id) {
            return;
        }
        on_stack.insert(id);
        if let Some(node) = self.nodes.get(&id) {
            if let Some(parent) = node.extends {
                self.visit(parent, visited, on_stack, order, reported, diags, span_of);
            }
            for &in_parent in &node.in_parents {
                self.visit(in_parent, visited, on_stack, order, reported, diags, span_of);
            }
        }
        on_stack.remove(&id);
        visited.insert(id);
        order.push(id);
    }
}

impl Default for SigGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticCollector;

    fn node(id: u32, extends: Option<u32>) -> SigNode {
        SigNode {
            id: SymbolId(id),
            name: crate::intern::Symbol::EMPTY,
            extends: extends.map(SymbolId),
            in_parents: Vec::new(),
            abstract_: false,
            mult: None,
        }
    }

    #[test]
    fn topo_order_places_parents_before_children() {
        let mut g = SigGraph::new();
        g.insert(node(0, None));
        g.insert(node(1, Some(0)));
        g.insert(node(2, Some(1)));
        let mut diags = DiagnosticCollector::new();
        let order = g.topo_order(&mut diags, |_| Span::default());
        let pos = |id: u32| order.iter().position(|s| s.0 == id).unwrap();
        assert!(pos(0) < pos(1));
        assert!(pos(1) < pos(2));
        assert!(!diags.has_errors());
    }

    #[test]
    fn cyclic_hierarchy_is_reported() {
        let mut g = SigGraph::new();
        g.nodes.insert(SymbolId(0), node(0, Some(1)));
        g.nodes.insert(SymbolId(1), node(1, Some(0)));
        let mut diags = DiagnosticCollector::new();
        g.topo_order(&mut diags, |_| Span::default());
        assert!(diags.has_errors());
    }
}

//! Expression, formula, and temporal encoders: walk the
//! AST against a `TranslationContext`, producing `BooleanMatrix`es and
//! `BooleanFormula`s instead of directly emitting CNF, so formula-encoder
//! logic can flatten/simplify before anything reaches `CnfBuilder`.

pub mod expr_encoder;
pub mod formula_encoder;
pub mod temporal;

use std::collections::HashMap;

use crate::ast::{AssertDecl, FactDecl, FunDecl, Module, Paragraph, PredDecl, SigDecl};
use crate::semantics::symtab::{ScopeId, SymbolId, SymbolTable};

/// Looks declarations back up by symbol id, since the symbol table records
/// only the inferred type, not the AST node — needed for call inlining.
pub struct Declarations<'m> {
    pub preds: HashMap<SymbolId, &'m PredDecl>,
    pub funs: HashMap<SymbolId, &'m FunDecl>,
    pub sigs: HashMap<SymbolId, &'m SigDecl>,
    pub asserts: HashMap<SymbolId, &'m AssertDecl>,
    pub facts: Vec<&'m FactDecl>,
    pub sig_facts: Vec<(SymbolId, &'m crate::ast::Formula)>,
}

impl<'m> Declarations<'m> {
    pub fn build(module: &'m Module, symtab: &SymbolTable, root: ScopeId) -> Self {
        let mut preds = HashMap::new();
        let mut funs = HashMap::new();
        let mut sigs = HashMap::new();
        let mut asserts = HashMap::new();
        let mut facts = Vec::new();
        let mut sig_facts = Vec::new();
        for p in &module.paragraphs {
            match p {
                Paragraph::Pred(pd) => {
                    if let Some(id) = symtab.local(root, pd.name) {
                        preds.insert(id, pd);
                    }
                }
                Paragraph::Fun(fd) => {
                    if let Some(id) = symtab.local(root, fd.name) {
                        funs.insert(id, fd);
                    }
                }
                Paragraph::Sig(sd) => {
                    if let Some(id) = symtab.local(root, sd.name) {
                        sigs.insert(id, sd);
                        for fact in &sd.sig_facts {
                            sig_facts.push((id, fact));
                        }
                    }
                }
                Paragraph::Assert(ad) => {
                    if let Some(id) = symtab.local(root, ad.name) {
                        asserts.insert(id, ad);
                    }
                }
                Paragraph::Fact(fd) => facts.push(fd),
                Paragraph::Enum(_) | Paragraph::Command(_) => {}
            }
        }
        Declarations { preds, funs, sigs, asserts, facts, sig_facts }
    }
}

//! `TranslationContext`: everything the encoders thread
//! through a single `run`/`check` command — universe, bounds-derived
//! matrices, the CNF accumulator, the binding stack, and the bounded lasso
//! trace when the command needs one.

use std::collections::HashMap;

use crate::bounds::Bounds;
use crate::cnf::CnfBuilder;
use crate::intern::{Interner, Symbol};
use crate::kernel::matrix::BooleanMatrix;
use crate::semantics::symtab::{ScopeId, SymbolId, SymbolTable};
use crate::universe::Universe;

/// Symbols for the fixed set of built-in arithmetic functions: the language
/// has no arithmetic operators, only box-join call syntax (`plus[a,b]`), so
/// these names are recognized by the encoder
/// ahead of ordinary predicate/function lookup.
pub struct BuiltinFns {
    pub plus: Symbol,
    pub minus: Symbol,
    pub mul: Symbol,
    pub div: Symbol,
    pub rem: Symbol,
    pub negate: Symbol,
}

impl BuiltinFns {
    pub fn new(interner: &mut Interner) -> Self {
        BuiltinFns {
            plus: interner.intern("plus"),
            minus: interner.intern("minus"),
            mul: interner.intern("mul"),
            div: interner.intern("div"),
            rem: interner.intern("rem"),
            negate: interner.intern("negate"),
        }
    }
}

/// One binding frame: quantifier/let/parameter names to the matrix they're
/// currently bound to.
pub type Bindings = HashMap<SymbolId, BooleanMatrix>;

pub struct Trace {
    pub length: u32,
    pub requires_loop: bool,
    /// One-hot loop-start selector, `loop_lits[s]` true iff the lasso loops
    /// back to state `s`.
    pub loop_lits: Vec<crate::cnf::Literal>,
    var_sig_states: HashMap<SymbolId, Vec<BooleanMatrix>>,
    var_field_states: HashMap<SymbolId, Vec<BooleanMatrix>>,
}

impl Trace {
    pub fn new(length: u32, requires_loop: bool, cnf: &mut CnfBuilder) -> Self {
        let loop_lits = if requires_loop { (0..length).map(|_| cnf.fresh()).collect() } else { Vec::new() };
        if requires_loop {
            cnf.exactly_one(&loop_lits);
        }
        Trace { length, requires_loop, loop_lits, var_sig_states: HashMap::new(), var_field_states: HashMap::new() }
    }

    pub fn set_sig_states(&mut self, sig: SymbolId, states: Vec<BooleanMatrix>) {
        self.var_sig_states.insert(sig, states);
    }

    pub fn set_field_states(&mut self, field: SymbolId, states: Vec<BooleanMatrix>) {
        self.var_field_states.insert(field, states);
    }

    pub fn sig_at(&self, sig: SymbolId, state: u32) -> Option<&BooleanMatrix> {
        self.var_sig_states.get(&sig).and_then(|v| v.get(state as usize))
    }

    pub fn field_at(&self, field: SymbolId, state: u32) -> Option<&BooleanMatrix> {
        self.var_field_states.get(&field).and_then(|v| v.get(state as usize))
    }

    /// States reachable when evaluating `after`/`always`/`eventually` from
    /// `s`: the rest of the finite prefix, plus the looped
    /// suffix if a loop is required.
    pub fn reachable_from(&self, s: u32) -> Vec<u32> {
        ((s + 1)..self.length).collect()
    }
}

pub struct TranslationContext<'a> {
    /// Mutable so the encoder can declare fresh quantifier/let/parameter
    /// scopes of its own as it walks formulas — independent of whatever
    /// scope tree semantic analysis built, since only arities and bindings
    /// (not re-checked types) matter once encoding starts.
    pub symtab: &'a mut SymbolTable,
    pub root: ScopeId,
    pub universe: &'a Universe,
    pub bounds: &'a Bounds,
    pub cnf: CnfBuilder,
    pub sig_matrices: HashMap<SymbolId, BooleanMatrix>,
    pub field_matrices: HashMap<SymbolId, BooleanMatrix>,
    pub bindings: Vec<Bindings>,
    pub trace: Option<Trace>,
    pub current_state: u32,
    /// Set while encoding a signature fact; bare field names of this
    /// signature auto-expand to `this.field`.
    pub current_sig_fact_owner: Option<SymbolId>,
    /// Stack of `this`-matrices bound while encoding a signature fact or a
    /// predicate/function call with a receiver; top of stack wins.
    pub this_stack: Vec<BooleanMatrix>,
    pub builtins: BuiltinFns,
}

impl<'a> TranslationContext<'a> {
    pub fn new(symtab: &'a mut SymbolTable, root: ScopeId, universe: &'a Universe, bounds: &'a Bounds, cnf: CnfBuilder, interner: &mut Interner) -> Self {
        TranslationContext {
            symtab,
            root,
            universe,
            bounds,
            cnf,
            sig_matrices: HashMap::new(),
            field_matrices: HashMap::new(),
            bindings: vec![HashMap::new()],
            trace: None,
            current_state: 0,
            current_sig_fact_owner: None,
            this_stack: Vec::new(),
            builtins: BuiltinFns::new(interner),
        }
    }

    pub fn push_scope(&mut self) {
        self.bindings.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.bindings.pop().expect("binding stack underflow: pop without matching push");
    }

    pub fn bind(&mut self, sym: SymbolId, matrix: BooleanMatrix) {
        self.bindings.last_mut().expect("binding stack is never empty").insert(sym, matrix);
    }

    pub fn lookup_binding(&self, sym: SymbolId) -> Option<&BooleanMatrix> {
        self.bindings.iter().rev().find_map(|frame| frame.get(&sym))
    }

    pub fn push_this(&mut self, matrix: BooleanMatrix) {
        self.this_stack.push(matrix);
    }

    pub fn pop_this(&mut self) {
        self.this_stack.pop().expect("this-stack underflow: pop without matching push");
    }

    pub fn current_this(&self) -> Option<&BooleanMatrix> {
        self.this_stack.last()
    }

    pub fn sig_matrix(&self, sig: SymbolId, state: u32) -> BooleanMatrix {
        if let Some(trace) = &self.trace {
            if let Some(m) = trace.sig_at(sig, state) {
                return m.clone();
            }
        }
        self.sig_matrices.get(&sig).cloned().expect("every signature has a matrix by the time it's referenced")
    }

    pub fn field_matrix(&self, field: SymbolId, state: u32) -> BooleanMatrix {
        if let Some(trace) = &self.trace {
            if let Some(m) = trace.field_at(field, state) {
                return m.clone();
            }
        }
        self.field_matrices.get(&field).cloned().expect("every field has a matrix by the time it's referenced")
    }
}

//! Semantic analysis: four passes over the parsed module —
//! collect declarations, resolve inheritance, type-check, and validate
//! temporal priming — plus the symbol table, type lattice, and signature
//! DAG they share.

pub mod sig_graph;
pub mod symtab;
pub mod types;

use std::collections::HashMap;

use crate::ast::*;
use crate::diagnostics::{Code, Diagnostic, DiagnosticCollector};
use crate::intern::{Interner, Symbol};
use crate::token::Span;

use sig_graph::SigGraph;
use symtab::{ScopeId, ScopeKind, SymbolId, SymbolKind, SymbolRecord, SymbolTable};
use types::{SigNode, Type};

pub struct AnalysisResult {
    pub symtab: SymbolTable,
    pub sig_graph: SigGraph,
    pub sig_order: Vec<SymbolId>,
    pub diags: DiagnosticCollector,
}

/// Receiver type bound to `this` inside a predicate/function body. Tracked
/// alongside the scope rather than through the symbol table, since `this`
/// is a dedicated AST node (`ExprKind::This`) rather than a plain name.
#[derive(Clone, Copy)]
struct Ctx {
    scope: ScopeId,
    receiver: Option<SymbolId>,
}

pub fn analyze(module: &Module, interner: &mut Interner) -> AnalysisResult {
    let mut a = Analyzer {
        interner,
        symtab: SymbolTable::new(),
        sig_graph: SigGraph::new(),
        diags: DiagnosticCollector::new(),
        enum_of_value: HashMap::new(),
    };
    let root = a.symtab.root_scope();
    a.collect_sigs_and_enums(module, root);
    a.resolve_inheritance(module);
    let sig_order = a.sig_graph.topo_order(&mut a.diags, |id| a.symtab.get(id).span);
    a.collect_fields_and_behaviors(module, root);
    a.type_check(module, root);
    a.check_temporal(module, root);

    AnalysisResult { symtab: a.symtab, sig_graph: a.sig_graph, sig_order, diags: a.diags }
}

struct Analyzer<'a> {
    interner: &'a mut Interner,
    symtab: SymbolTable,
    sig_graph: SigGraph,
    diags: DiagnosticCollector,
    enum_of_value: HashMap<SymbolId, SymbolId>,
}

impl<'a> Analyzer<'a> {
    fn declare_unique(&mut self, scope: ScopeId, record: SymbolRecord) -> SymbolId {
        if let Some(prev) = self.symtab.local(scope, record.name) {
            let prev_span = self.symtab.get(prev).span;
            self.diags.push(
                Diagnostic::new(
                    Code::DuplicateDefinition,
                    record.span,
                    format!("'{}' is already defined in this scope", self.interner.resolve(record.name)),
                )
                .with_related(prev_span, "previous definition here"),
            );
        }
        self.symtab.declare(scope, record)
    }

    // ---- Pass 1: collect signature and enum names -----------------------

    fn collect_sigs_and_enums(&mut self, module: &Module, root: ScopeId) {
        for p in &module.paragraphs {
            match p {
                Paragraph::Sig(s) => {
                    let id = self.declare_unique(
                        root,
                        SymbolRecord {
                            kind: SymbolKind::Signature,
                            name: s.name,
                            span: s.span,
                            ty: Type::Error, // patched once the id is known (Type::Sig(id) is self-referential)
                            owner: None,
                            var: s.var,
                            private: s.private,
                        },
                    );
                    self.symtab.get_mut(id).ty = Type::Sig(id);
                }
                Paragraph::Enum(e) => {
                    let enum_id = self.declare_unique(
                        root,
                        SymbolRecord { kind: SymbolKind::EnumType, name: e.name, span: e.span, ty: Type::Error, owner: None, var: false, private: false },
                    );
                    self.symtab.get_mut(enum_id).ty = Type::Sig(enum_id);
                    for &value_name in &e.values {
                        let value_id = self.declare_unique(
                            root,
                            SymbolRecord {
                                kind: SymbolKind::EnumValue,
                                name: value_name,
                                span: e.span,
                                ty: Type::Error,
                                owner: Some(enum_id),
                                var: false,
                                private: false,
                            },
                        );
                        self.symtab.get_mut(value_id).ty = Type::Sig(value_id);
                        self.enum_of_value.insert(value_id, enum_id);
                    }
                }
                _ => {}
            }
        }
    }

    // ---- Pass 2: resolve `extends`/`in` into the signature DAG -----------

    fn resolve_inheritance(&mut self, module: &Module) {
        let root = self.symtab.root_scope();
        for p in &module.paragraphs {
            let Paragraph::Sig(s) = p else { continue };
            let Some(id) = self.symtab.local(root, s.name) else { continue };
            let extends = s.extends.and_then(|name| self.resolve_sig_name(root, name, s.span));
            let in_parents: Vec<SymbolId> = s.in_parents.iter().filter_map(|&name| self.resolve_sig_name(root, name, s.span)).collect();
            self.sig_graph.insert(SigNode { id, name: s.name, extends, in_parents, abstract_: s.abstract_, mult: s.mult });
        }
        for p in &module.paragraphs {
            let Paragraph::Enum(e) = p else { continue };
            let Some(enum_id) = self.symtab.local(root, e.name) else { continue };
            self.sig_graph.insert(SigNode { id: enum_id, name: e.name, extends: None, in_parents: Vec::new(), abstract_: true, mult: None });
            for &value_name in &e.values {
                if let Some(value_id) = self.symtab.local(root, value_name) {
                    self.sig_graph.insert(SigNode { id: value_id, name: value_name, extends: Some(enum_id), in_parents: Vec::new(), abstract_: false, mult: Some(crate::ast::Mult::One) });
                }
            }
        }
    }

    /// Looks up a name already known to denote a signature/enum, without
    /// emitting a diagnostic (the declaring pass already reported one if
    /// the name was bad). Used where a receiver is re-resolved later.
    fn receiver_sig(&self, scope: ScopeId, name: Symbol) -> Option<SymbolId> {
        let id = self.symtab.lookup(scope, name)?;
        matches!(self.symtab.get(id).kind, SymbolKind::Signature | SymbolKind::EnumType).then_some(id)
    }

    fn resolve_sig_name(&mut self, scope: ScopeId, name: Symbol, span: Span) -> Option<SymbolId> {
        match self.symtab.lookup(scope, name) {
            Some(id) if self.symtab.get(id).kind == SymbolKind::Signature || self.symtab.get(id).kind == SymbolKind::EnumType => Some(id),
            Some(_) => {
                self.diags.push(Diagnostic::new(Code::UndefinedSignature, span, format!("'{}' is not a signature", self.interner.resolve(name))));
                None
            }
            None => {
                self.diags.push(Diagnostic::new(Code::UndefinedSignature, span, format!("undefined signature '{}'", self.interner.resolve(name))));
                None
            }
        }
    }

    // ---- Pass 3: collect fields, facts, predicates, functions, asserts ---

    fn collect_fields_and_behaviors(&mut self, module: &Module, root: ScopeId) {
        for p in &module.paragraphs {
            match p {
                Paragraph::Sig(s) => {
                    let Some(owner) = self.symtab.local(root, s.name) else { continue };
                    for f in &s.fields {
                        let field_ty = self.infer_expr(&f.ty, Ctx { scope: root, receiver: Some(owner) });
                        let rel_ty = prepend_column(Type::Sig(owner), field_ty);
                        self.declare_unique(
                            root,
                            SymbolRecord {
                                kind: SymbolKind::Field,
                                name: f.name,
                                span: f.span,
                                ty: rel_ty,
                                owner: Some(owner),
                                var: f.var,
                                private: false,
                            },
                        );
                    }
                }
                Paragraph::Pred(pd) => {
                    let receiver = pd.receiver.as_ref().and_then(|r| self.resolve_sig_name(root, r.sig, pd.span));
                    self.declare_unique(
                        root,
                        SymbolRecord { kind: SymbolKind::Predicate, name: pd.name, span: pd.span, ty: Type::Bool, owner: receiver, var: false, private: false },
                    );
                }
                Paragraph::Fun(fd) => {
                    let receiver = fd.receiver.as_ref().and_then(|r| self.resolve_sig_name(root, r.sig, fd.span));
                    let ctx = Ctx { scope: root, receiver };
                    let ret_ty = self.infer_expr(&fd.return_ty, ctx);
                    self.declare_unique(
                        root,
                        SymbolRecord { kind: SymbolKind::Function, name: fd.name, span: fd.span, ty: ret_ty, owner: receiver, var: false, private: false },
                    );
                }
                Paragraph::Assert(ad) => {
                    self.declare_unique(
                        root,
                        SymbolRecord { kind: SymbolKind::Assertion, name: ad.name, span: ad.span, ty: Type::Bool, owner: None, var: false, private: false },
                    );
                }
                Paragraph::Fact(fd) => {
                    if let Some(name) = fd.name {
                        self.declare_unique(
                            root,
                            SymbolRecord { kind: SymbolKind::Fact, name, span: fd.span, ty: Type::Bool, owner: None, var: false, private: false },
                        );
                    }
                }
                _ => {}
            }
        }
    }

    // ---- Pass 4: type-check expressions and formulas ---------------------

    fn type_check(&mut self, module: &Module, root: ScopeId) {
        for p in &module.paragraphs {
            match p {
                Paragraph::Sig(s) => {
                    let Some(owner) = self.symtab.local(root, s.name) else { continue };
                    let ctx = Ctx { scope: root, receiver: Some(owner) };
                    for fact in &s.sig_facts {
                        self.check_formula(fact, ctx);
                    }
                }
                Paragraph::Fact(fd) => self.check_formula(&fd.body, Ctx { scope: root, receiver: None }),
                Paragraph::Assert(ad) => self.check_formula(&ad.body, Ctx { scope: root, receiver: None }),
                Paragraph::Pred(pd) => {
                    let receiver = pd.receiver.as_ref().and_then(|r| self.receiver_sig(root, r.sig));
                    let scope = self.push_param_scope(root, &pd.params, receiver);
                    self.check_formula(&pd.body, Ctx { scope, receiver });
                }
                Paragraph::Fun(fd) => {
                    let receiver = fd.receiver.as_ref().and_then(|r| self.receiver_sig(root, r.sig));
                    let scope = self.push_param_scope(root, &fd.params, receiver);
                    let ctx = Ctx { scope, receiver };
                    let declared = self.infer_expr(&fd.return_ty, ctx);
                    let actual = self.infer_expr(&fd.body, ctx);
                    if !declared.arity_compatible(&actual) {
                        self.diags.push(Diagnostic::new(
                            Code::TypeMismatch,
                            fd.span,
                            format!("function '{}' body does not match its declared return type", self.interner.resolve(fd.name)),
                        ));
                    }
                }
                Paragraph::Command(cd) => {
                    self.check_command(cd, root);
                }
                Paragraph::Enum(_) => {}
            }
        }
    }

    fn push_param_scope(&mut self, root: ScopeId, params: &[ParamDecl], receiver: Option<SymbolId>) -> ScopeId {
        let scope = self.symtab.push_scope(ScopeKind::Predicate, root);
        if let Some(r) = receiver {
            let this_sym = self.interner.intern("this");
            self.symtab.declare(scope, SymbolRecord { kind: SymbolKind::Parameter, name: this_sym, span: Span::default(), ty: Type::Sig(r), owner: None, var: false, private: false });
        }
        for param in params {
            let ty = self.infer_expr(&param.ty, Ctx { scope: root, receiver });
            self.declare_unique(scope, SymbolRecord { kind: SymbolKind::Parameter, name: param.name, span: param.span, ty, owner: None, var: false, private: false });
        }
        scope
    }

    fn check_command(&mut self, cd: &CommandDecl, root: ScopeId) {
        for sig_scope in &cd.scope.per_sig {
            self.resolve_sig_name(root, sig_scope.sig, sig_scope.span);
        }
        match &cd.kind {
            CommandKind::Run { target, args, inline_body } => {
                if let Some(name) = target {
                    match self.symtab.lookup(root, *name) {
                        Some(id) if matches!(self.symtab.get(id).kind, SymbolKind::Predicate | SymbolKind::Function) => {
                            for a in args {
                                self.infer_expr(a, Ctx { scope: root, receiver: None });
                            }
                        }
                        Some(_) => self.diags.push(Diagnostic::new(Code::UndefinedPredicate, cd.span, format!("'{}' is not a predicate or function", self.interner.resolve(*name)))),
                        None => self.diags.push(Diagnostic::new(Code::UndefinedPredicate, cd.span, format!("undefined predicate '{}'", self.interner.resolve(*name)))),
                    }
                }
                if let Some(body) = inline_body {
                    self.check_formula(body, Ctx { scope: root, receiver: None });
                }
            }
            CommandKind::Check { target } => match self.symtab.lookup(root, *target) {
                Some(id) if self.symtab.get(id).kind == SymbolKind::Assertion => {}
                Some(_) => self.diags.push(Diagnostic::new(Code::UndefinedName, cd.span, format!("'{}' is not an assertion", self.interner.resolve(*target)))),
                None => self.diags.push(Diagnostic::new(Code::UndefinedName, cd.span, format!("undefined assertion '{}'", self.interner.resolve(*target)))),
            },
        }
    }

    fn infer_expr(&mut self, expr: &Expr, ctx: Ctx) -> Type {
        match &expr.kind {
            ExprKind::IntLiteral(_) => Type::Int,
            ExprKind::None_ => Type::None_,
            ExprKind::Univ => Type::Univ,
            ExprKind::Iden => Type::Iden,
            ExprKind::IntType => Type::Int,
            ExprKind::This => match ctx.receiver {
                Some(id) => Type::Sig(id),
                None => {
                    self.diags.push(Diagnostic::new(Code::UndefinedName, expr.span, "'this' used outside a receiver-bound predicate or function".to_string()));
                    Type::Error
                }
            },
            ExprKind::Name(name) | ExprKind::AtName(name) => self.lookup_value(*name, ctx.scope, expr.span),
            ExprKind::Unary(op, inner) => self.infer_unary(*op, inner, ctx, expr.span),
            ExprKind::Binary(op, l, r) => self.infer_binary(*op, l, r, ctx, expr.span),
            ExprKind::Prime(inner) => self.infer_expr(inner, ctx),
            ExprKind::BoxJoin { base, args } => self.infer_box_join(base, args, ctx, expr.span),
            ExprKind::Comprehension { decls, body } => {
                let scope = self.declare_quant_decls(ctx.scope, decls);
                self.check_formula(body, Ctx { scope, receiver: ctx.receiver });
                self.product_of_decls(decls, ctx)
            }
            ExprKind::Let { name, value, body } => {
                let vt = self.infer_expr(value, ctx);
                let scope = self.symtab.push_scope(ScopeKind::Let, ctx.scope);
                self.symtab.declare(scope, SymbolRecord { kind: SymbolKind::LetVar, name: *name, span: expr.span, ty: vt, owner: None, var: false, private: false });
                self.infer_expr(body, Ctx { scope, receiver: ctx.receiver })
            }
            ExprKind::IfElse { cond, then_branch, else_branch } => {
                self.check_formula(cond, ctx);
                let t1 = self.infer_expr(then_branch, ctx);
                let t2 = self.infer_expr(else_branch, ctx);
                if !t1.arity_compatible(&t2) {
                    self.diags.push(Diagnostic::new(Code::TypeMismatch, expr.span, "if-then-else branches have incompatible arity".to_string()));
                    return Type::Error;
                }
                if matches!(t1, Type::None_) {
                    t2
                } else {
                    t1
                }
            }
            ExprKind::Sum { decls, body } => {
                let scope = self.declare_quant_decls(ctx.scope, decls);
                self.infer_expr(body, Ctx { scope, receiver: ctx.receiver });
                Type::Int
            }
            ExprKind::Block(formulas) => {
                for f in formulas {
                    self.check_formula(f, ctx);
                }
                Type::Univ
            }
        }
    }

    fn lookup_value(&mut self, name: Symbol, scope: ScopeId, span: Span) -> Type {
        match self.symtab.lookup(scope, name) {
            Some(id) => self.symtab.get(id).ty.clone(),
            None => {
                self.diags.push(Diagnostic::new(Code::UndefinedName, span, format!("undefined name '{}'", self.interner.resolve(name))));
                Type::Error
            }
        }
    }

    fn infer_unary(&mut self, op: UnOp, inner: &Expr, ctx: Ctx, span: Span) -> Type {
        let t = self.infer_expr(inner, ctx);
        match op {
            UnOp::Cardinality => Type::Int,
            UnOp::Transpose => match t.arity() {
                Some(2) => match t {
                    Type::Relation(mut cols) if cols.len() == 2 => {
                        cols.swap(0, 1);
                        Type::Relation(cols)
                    }
                    Type::Iden => Type::Iden,
                    _ => Type::Unknown(2),
                },
                None => Type::Unknown(2),
                _ => {
                    self.diags.push(Diagnostic::new(Code::ArityMismatch, span, "'~' requires an arity-2 relation".to_string()));
                    Type::Error
                }
            },
            UnOp::Closure | UnOp::ReflexiveClosure => match t.arity() {
                Some(2) | None => t,
                _ => {
                    self.diags.push(Diagnostic::new(Code::ArityMismatch, span, "closure operators require an arity-2 relation".to_string()));
                    Type::Error
                }
            },
        }
    }

    fn infer_binary(&mut self, op: BinOp, l: &Expr, r: &Expr, ctx: Ctx, span: Span) -> Type {
        let lt = self.infer_expr(l, ctx);
        let rt = self.infer_expr(r, ctx);
        match op {
            BinOp::Union | BinOp::Diff | BinOp::Intersect | BinOp::Override => {
                if !lt.arity_compatible(&rt) {
                    self.diags.push(Diagnostic::new(Code::ArityMismatch, span, "operands have incompatible arity".to_string()));
                    return Type::Error;
                }
                if matches!(lt, Type::None_ | Type::Error) {
                    rt
                } else {
                    lt
                }
            }
            BinOp::Product => prepend_column(lt, rt),
            BinOp::DomainRestrict => {
                if lt.arity() != Some(1) && !matches!(lt, Type::None_) {
                    self.diags.push(Diagnostic::new(Code::InvalidProduct, span, "'<:' requires a unary set on the left".to_string()));
                }
                rt
            }
            BinOp::RangeRestrict => {
                if rt.arity() != Some(1) && !matches!(rt, Type::None_) {
                    self.diags.push(Diagnostic::new(Code::InvalidProduct, span, "':>' requires a unary set on the right".to_string()));
                }
                lt
            }
            BinOp::Join => match lt.join_arity(&rt) {
                Some(0) => {
                    self.diags.push(Diagnostic::new(Code::InvalidJoin, span, "join of two unary relations is not a valid relational expression".to_string()));
                    Type::Error
                }
                Some(n) => Type::Unknown(n),
                None => Type::None_,
            },
        }
    }

    fn infer_box_join(&mut self, base: &Expr, args: &[Expr], ctx: Ctx, span: Span) -> Type {
        if let Some((target, arg_count_expected)) = self.resolve_call_target(base, ctx) {
            if let Some(expected) = arg_count_expected {
                if args.len() != expected {
                    self.diags.push(Diagnostic::new(
                        Code::ArgumentCountMismatch,
                        span,
                        format!("expected {} argument(s), found {}", expected, args.len()),
                    ));
                }
            }
            for a in args {
                self.infer_expr(a, ctx);
            }
            return self.symtab.get(target).ty.clone();
        }
        let mut cur = self.infer_expr(base, ctx);
        for a in args {
            let at = self.infer_expr(a, ctx);
            cur = match at.join_arity(&cur) {
                Some(0) => Type::Error,
                Some(n) => Type::Unknown(n),
                None => Type::None_,
            };
        }
        cur
    }

    /// Recognizes `pred[args]` / `recv.pred[args]` as a call rather than a
    /// relational box-join by resolving `base`'s name against the symbol
    /// table.
    fn resolve_call_target(&mut self, base: &Expr, ctx: Ctx) -> Option<(SymbolId, Option<usize>)> {
        let name = match &base.kind {
            ExprKind::Name(n) | ExprKind::AtName(n) => *n,
            ExprKind::Binary(BinOp::Join, _, r) => match &r.kind {
                ExprKind::Name(n) | ExprKind::AtName(n) => *n,
                _ => return None,
            },
            _ => return None,
        };
        let id = self.symtab.lookup(ctx.scope, name)?;
        match self.symtab.get(id).kind {
            SymbolKind::Predicate | SymbolKind::Function => Some((id, None)),
            _ => None,
        }
    }

    fn declare_quant_decls(&mut self, parent: ScopeId, decls: &[QuantDecl]) -> ScopeId {
        let scope = self.symtab.push_scope(ScopeKind::Quantifier, parent);
        for decl in decls {
            let ty = self.infer_expr(&decl.ty, Ctx { scope: parent, receiver: None });
            for &name in &decl.names {
                self.declare_unique(scope, SymbolRecord { kind: SymbolKind::QuantifierVar, name, span: decl.span, ty: ty.clone(), owner: None, var: false, private: false });
            }
        }
        scope
    }

    fn product_of_decls(&mut self, decls: &[QuantDecl], ctx: Ctx) -> Type {
        let mut cols = Vec::new();
        for decl in decls {
            let t = self.infer_expr(&decl.ty, ctx);
            for _ in &decl.names {
                cols.push(t.clone());
            }
        }
        Type::Relation(cols)
    }

    fn check_formula(&mut self, f: &Formula, ctx: Ctx) {
        match &f.kind {
            FormulaKind::Const(_) => {}
            FormulaKind::Binary(_, l, r) => {
                self.check_formula(l, ctx);
                self.check_formula(r, ctx);
            }
            FormulaKind::Not(inner) => self.check_formula(inner, ctx),
            FormulaKind::IfElse { cond, then_branch, else_branch } => {
                self.check_formula(cond, ctx);
                self.check_formula(then_branch, ctx);
                if let Some(e) = else_branch {
                    self.check_formula(e, ctx);
                }
            }
            FormulaKind::Quantified { decls, body, .. } => {
                let scope = self.declare_quant_decls(ctx.scope, decls);
                self.check_formula(body, Ctx { scope, receiver: ctx.receiver });
            }
            FormulaKind::Let { name, value, body } => {
                let vt = self.infer_expr(value, ctx);
                let scope = self.symtab.push_scope(ScopeKind::Let, ctx.scope);
                self.symtab.declare(scope, SymbolRecord { kind: SymbolKind::LetVar, name: *name, span: f.span, ty: vt, owner: None, var: false, private: false });
                self.check_formula(body, Ctx { scope, receiver: ctx.receiver });
            }
            FormulaKind::TemporalUnary(_, inner) => self.check_formula(inner, ctx),
            FormulaKind::TemporalBinary(_, l, r) => {
                self.check_formula(l, ctx);
                self.check_formula(r, ctx);
            }
            FormulaKind::Comparison(op, l, r) => {
                let lt = self.infer_expr(l, ctx);
                let rt = self.infer_expr(r, ctx);
                match op {
                    CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
                        if !is_int_like(&lt) || !is_int_like(&rt) {
                            self.diags.push(Diagnostic::new(Code::InvalidComparison, f.span, "ordering comparisons require integer expressions".to_string()));
                        }
                    }
                    CompareOp::Eq | CompareOp::Neq | CompareOp::In | CompareOp::NotIn => {
                        if !lt.arity_compatible(&rt) {
                            self.diags.push(Diagnostic::new(Code::ArityMismatch, f.span, "comparison operands have incompatible arity".to_string()));
                        }
                    }
                }
            }
            FormulaKind::Multiplicity(_, e) => {
                let t = self.infer_expr(e, ctx);
                if t.arity() == Some(0) {
                    self.diags.push(Diagnostic::new(Code::InvalidMultiplicity, f.span, "multiplicity formulas require a relational expression".to_string()));
                }
            }
            FormulaKind::ExprAsFormula(e) => {
                self.infer_expr(e, ctx);
            }
            FormulaKind::Block(formulas) => {
                for formula in formulas {
                    self.check_formula(formula, ctx);
                }
            }
        }
    }

    // ---- Pass 5: temporal/priming validity -------------------------------

    fn check_temporal(&mut self, module: &Module, root: ScopeId) {
        for p in &module.paragraphs {
            match p {
                Paragraph::Sig(s) => {
                    for fact in &s.sig_facts {
                        self.check_temporal_formula(fact, root);
                    }
                }
                Paragraph::Fact(fd) => self.check_temporal_formula(&fd.body, root),
                Paragraph::Assert(ad) => self.check_temporal_formula(&ad.body, root),
                Paragraph::Pred(pd) => {
                    let receiver = pd.receiver.as_ref().and_then(|r| self.receiver_sig(root, r.sig));
                    let scope = self.push_param_scope(root, &pd.params, receiver);
                    self.check_temporal_formula(&pd.body, scope);
                }
                Paragraph::Fun(fd) => {
                    let receiver = fd.receiver.as_ref().and_then(|r| self.receiver_sig(root, r.sig));
                    let scope = self.push_param_scope(root, &fd.params, receiver);
                    self.check_temporal_expr(&fd.body, scope);
                }
                Paragraph::Command(cd) => {
                    if let CommandKind::Run { inline_body: Some(body), .. } = &cd.kind {
                        self.check_temporal_formula(body, root);
                    }
                }
                Paragraph::Enum(_) => {}
            }
        }
    }

    /// A primed name is rejected unless it resolves to a `var` signature/field
    /// or a local quantifier variable — quantifier variables may always be
    /// primed.
    fn check_prime_target(&mut self, base: Symbol, scope: ScopeId, span: Span) {
        match self.symtab.lookup(scope, base) {
            Some(id) => {
                let sym = self.symtab.get(id);
                if !sym.var && sym.kind != SymbolKind::QuantifierVar {
                    self.diags.push(Diagnostic::new(
                        Code::PrimedNonVariable,
                        span,
                        format!("'{}'' does not name a variable relation", self.interner.resolve(base)),
                    ));
                }
            }
            None => self.diags.push(Diagnostic::new(
                Code::PrimedNonVariable,
                span,
                format!("'{}'' does not name a variable relation", self.interner.resolve(base)),
            )),
        }
    }

    fn check_temporal_expr(&mut self, expr: &Expr, scope: ScopeId) {
        match &expr.kind {
            ExprKind::Prime(inner) => {
                if let Some(base) = base_name_of(inner) {
                    self.check_prime_target(base, scope, expr.span);
                }
                self.check_temporal_expr(inner, scope);
            }
            ExprKind::Unary(_, inner) => self.check_temporal_expr(inner, scope),
            ExprKind::Binary(_, l, r) => {
                self.check_temporal_expr(l, scope);
                self.check_temporal_expr(r, scope);
            }
            ExprKind::BoxJoin { base, args } => {
                self.check_temporal_expr(base, scope);
                for a in args {
                    self.check_temporal_expr(a, scope);
                }
            }
            ExprKind::Comprehension { decls, body } => {
                let inner_scope = self.declare_quant_decls(scope, decls);
                self.check_temporal_formula(body, inner_scope);
            }
            ExprKind::Let { name, value, body } => {
                self.check_temporal_expr(value, scope);
                let inner_scope = self.push_temporal_let_scope(*name, scope, expr.span);
                self.check_temporal_expr(body, inner_scope);
            }
            ExprKind::IfElse { cond, then_branch, else_branch } => {
                self.check_temporal_formula(cond, scope);
                self.check_temporal_expr(then_branch, scope);
                self.check_temporal_expr(else_branch, scope);
            }
            ExprKind::Sum { decls, body } => {
                let inner_scope = self.declare_quant_decls(scope, decls);
                self.check_temporal_expr(body, inner_scope);
            }
            ExprKind::Block(formulas) => {
                for f in formulas {
                    self.check_temporal_formula(f, scope);
                }
            }
            _ => {}
        }
    }

    fn check_temporal_formula(&mut self, f: &Formula, scope: ScopeId) {
        match &f.kind {
            FormulaKind::Binary(_, l, r) | FormulaKind::TemporalBinary(_, l, r) => {
                self.check_temporal_formula(l, scope);
                self.check_temporal_formula(r, scope);
            }
            FormulaKind::Not(inner) | FormulaKind::TemporalUnary(_, inner) => self.check_temporal_formula(inner, scope),
            FormulaKind::IfElse { cond, then_branch, else_branch } => {
                self.check_temporal_formula(cond, scope);
                self.check_temporal_formula(then_branch, scope);
                if let Some(e) = else_branch {
                    self.check_temporal_formula(e, scope);
                }
            }
            FormulaKind::Quantified { decls, body, .. } => {
                let inner_scope = self.declare_quant_decls(scope, decls);
                self.check_temporal_formula(body, inner_scope);
            }
            FormulaKind::Let { name, value, body } => {
                self.check_temporal_expr(value, scope);
                let inner_scope = self.push_temporal_let_scope(*name, scope, f.span);
                self.check_temporal_formula(body, inner_scope);
            }
            FormulaKind::Comparison(_, l, r) => {
                self.check_temporal_expr(l, scope);
                self.check_temporal_expr(r, scope);
            }
            FormulaKind::Multiplicity(_, e) | FormulaKind::ExprAsFormula(e) => self.check_temporal_expr(e, scope),
            FormulaKind::Block(formulas) => {
                for formula in formulas {
                    self.check_temporal_formula(formula, scope);
                }
            }
            FormulaKind::Const(_) => {}
        }
    }

    /// Mirrors the `Let` scope pass 3 builds, so a primed reference to the
    /// bound name resolves during temporal checking the same way it did
    /// during type-checking.
    fn push_temporal_let_scope(&mut self, name: Symbol, parent: ScopeId, span: Span) -> ScopeId {
        let scope = self.symtab.push_scope(ScopeKind::Let, parent);
        self.symtab.declare(scope, SymbolRecord { kind: SymbolKind::LetVar, name, span, ty: Type::Error, owner: None, var: false, private: false });
        scope
    }
}

fn is_int_like(t: &Type) -> bool {
    matches!(t, Type::Int | Type::Error | Type::None_ | Type::Unknown(1))
}

/// Prepend a single column to a (possibly already composite) relation type,
/// used both for `->` and for building a field's full relation type from
/// its owning signature.
fn prepend_column(first: Type, rest: Type) -> Type {
    let mut cols = vec![first];
    match rest {
        Type::Relation(more) => cols.extend(more),
        other => cols.push(other),
    }
    Type::Relation(cols)
}

/// Walks down the leftmost/rightmost name through joins and primes to find
/// the symbol a primed expression ultimately refers to.
fn base_name_of(expr: &Expr) -> Option<Symbol> {
    match &expr.kind {
        ExprKind::Name(n) | ExprKind::AtName(n) => Some(*n),
        ExprKind::Binary(BinOp::Join, _, r) => base_name_of(r),
        ExprKind::Prime(inner) => base_name_of(inner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser as ModuleParser;

    fn analyze_source(src: &str) -> (AnalysisResult, Interner) {
        let mut interner = Interner::new();
        let lexer = Lexer::new(src, &mut interner);
        let (tokens, mut diags) = lexer.tokenize();
        let mut parser = ModuleParser::new(&tokens, &mut diags);
        let module = parser.parse_module();
        assert!(!diags.has_errors(), "unexpected parse errors: {:?}", diags.sorted());
        (analyze(&module, &mut interner), interner)
    }

    #[test]
    fn undefined_signature_is_reported() {
        let (result, _) = analyze_source("sig Person { knows: set Ghost }");
        assert!(result.diags.has_errors());
    }

    #[test]
    fn well_formed_module_type_checks_cleanly() {
        let (result, _) = analyze_source(
            "sig Person { knows: set Person }\nfact NoSelfKnowledge { no p: Person | p in p.knows }\n",
        );
        assert!(!result.diags.has_errors());
    }

    #[test]
    fn priming_a_non_variable_field_is_rejected() {
        let (result, _) = analyze_source("sig Person { knows: set Person }\nfact F { always no p: Person | p in p.knows' }\n");
        assert!(result.diags.has_errors());
    }

    #[test]
    fn priming_a_variable_field_is_accepted() {
        let (result, _) = analyze_source("sig Person { var knows: set Person }\nfact F { always no p: Person | p in p.knows' }\n");
        assert!(!result.diags.has_errors());
    }

    #[test]
    fn signature_cycle_is_reported() {
        let (result, _) = analyze_source("sig A extends B {}\nsig B extends A {}\n");
        assert!(result.diags.has_errors());
    }
}

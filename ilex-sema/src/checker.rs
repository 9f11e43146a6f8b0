//! Semantic checker (C3): §4.3.
//!
//! Grounded on `trait_bounds_checker.rs`'s shape (a struct holding
//! lookup maps plus a diagnostics sink, with a two-pass
//! `initialize`/check split) generalized from trait-bound-only
//! checking to the full tree walk. `CheckContext` is the explicit,
//! resettable process-wide state §5/§9 calls for, in place of the
//! teacher's `OnceLock`/`DashMap` statics.

use crate::builtin_contracts;
use crate::contracts::{
    requirement_is_concrete, substitute_requirement, substitute_type, ContractImpls,
    ContractRequirement,
};
use crate::module_binding::{bind_dependency_module, bind_self_module, DependencyModuleApi, ModuleBindings};
use crate::symbols::{Binding, LookupResult, ScopeKind, SymbolTable};
use crate::type_registry::TypeRegistry;
use crate::types::{ConstructError, GenericSubstitution, Type};
use ilex_ast::{
    BinaryOp, Block, DeclarationStmt, Expr, FieldDef, IfStmt, Item, LambdaExpr, Param, Program,
    ProcedureDef, ProcedureKind, Stmt, TypeExpr,
};
use ilex_diagnostics::{fuzzy, Diagnostic, DiagnosticKind, DiagnosticSink, Span};
use std::collections::{HashMap, HashSet};

/// Stable identity for a top-level procedure, used by the blocking
/// call-graph and contract tables (§9: "a side-table keyed by a
/// stable procedure identity rather than in the type value itself").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcedureId(u64);

#[derive(Debug, Clone)]
pub struct ProcedureFacts {
    pub declared_blocking: bool,
    pub effective_blocking: bool,
    pub required_contracts: Vec<ContractRequirement>,
}

/// Explicit, resettable process-wide state (§5/§9).
pub struct CheckContext {
    pub types: TypeRegistry,
    pub symbols: SymbolTable,
    pub sink: DiagnosticSink,
    dep_modules: HashMap<String, ModuleBindings>,
    struct_defs: HashMap<String, Type>,
    procedure_ids: HashMap<String, ProcedureId>,
    procedure_facts: HashMap<ProcedureId, ProcedureFacts>,
    call_graph: HashMap<ProcedureId, HashSet<ProcedureId>>,
    blocking_generic_triggered: HashSet<ProcedureId>,
    contract_impls: ContractImpls,
    next_procedure_id: u64,
    current_procedure: Option<ProcedureId>,
    current_return_type: Option<Type>,
}

impl Default for CheckContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckContext {
    pub fn new() -> Self {
        let mut contract_impls = ContractImpls::new();
        for &prim in &["int", "float", "string", "bool"] {
            for &contract in &["Display", "Clone", "Eq", "Add", "Sub", "Mul", "Div", "Mod"] {
                if builtin_contracts::has_builtin_contract(prim, contract) {
                    contract_impls.register(contract, vec![primitive_type(prim)]);
                }
            }
        }

        CheckContext {
            types: TypeRegistry::new(),
            symbols: SymbolTable::new(),
            sink: DiagnosticSink::new(),
            dep_modules: HashMap::new(),
            struct_defs: HashMap::new(),
            procedure_ids: HashMap::new(),
            procedure_facts: HashMap::new(),
            call_graph: HashMap::new(),
            blocking_generic_triggered: HashSet::new(),
            contract_impls,
            next_procedure_id: 0,
            current_procedure: None,
            current_return_type: None,
        }
    }

    /// Resets every piece of process-wide state so the context can be
    /// reused for an independent compilation run (§5).
    pub fn clear(&mut self) {
        self.types.clear();
        self.symbols = SymbolTable::new();
        self.sink.clear();
        self.dep_modules.clear();
        self.struct_defs.clear();
        self.procedure_ids.clear();
        self.procedure_facts.clear();
        self.call_graph.clear();
        self.blocking_generic_triggered.clear();
        self.next_procedure_id = 0;
        self.current_procedure = None;
        self.current_return_type = None;
    }

    /// Seed the context with one dependency module's exports (§4.4).
    pub fn bind_dependency(&mut self, api: &DependencyModuleApi) {
        match bind_dependency_module(&mut self.types, api) {
            Ok(bindings) => {
                for (name, ty) in &bindings.procedure_bindings {
                    self.symbols.declare(name.clone(), Binding::new(ty.clone()));
                }
                self.dep_modules.insert(api.module_name.clone(), bindings);
            }
            Err(err) => self.sink.record_misc_error(Diagnostic::of_kind(
                DiagnosticKind::InternalError,
                err.to_string(),
                Span::unknown(),
            )),
        }
    }

    fn next_id(&mut self) -> ProcedureId {
        let id = ProcedureId(self.next_procedure_id);
        self.next_procedure_id += 1;
        id
    }

    /// Entry point: walk the whole program (§4.3/§4.4 ordering).
    pub fn check_program(&mut self, program: &Program) {
        bind_self_module(&mut self.types, &program.module_name);

        self.register_type_definitions(program);
        self.check_struct_immutability(program);
        self.register_procedure_signatures(program);

        for item in &program.items {
            match item {
                Item::Procedure(def) => self.check_procedure_body(def),
                Item::Static(def) => self.check_static(def),
                _ => {}
            }
        }

        self.propagate_blocking();
        self.verify_remaining_contracts();

        // Module-level declarations are this module's exported surface;
        // "unused" only means something for locals inside a body.
        self.symbols.exit_scope(false);
    }

    // ---- Phase A: signature registration -------------------------------

    fn register_type_definitions(&mut self, program: &Program) {
        for item in &program.items {
            match item {
                Item::Struct(def) => {
                    let fields: Vec<(String, Type)> = def
                        .fields
                        .iter()
                        .map(|field: &FieldDef| {
                            (field.name.clone(), self.resolve_type_expr(&field.ty))
                        })
                        .collect();
                    let ty = Type::struct_type(fields, !def.immutable);
                    self.struct_defs.insert(def.name.clone(), ty.clone());
                    self.symbols
                        .declare(def.name.clone(), Binding::type_definition(ty));
                }
                Item::Oneof(def) => {
                    let variants: Vec<Type> = def
                        .variants
                        .iter()
                        .map(|v| self.resolve_type_expr(v))
                        .collect();
                    match Type::oneof(variants) {
                        Ok(ty) => self
                            .symbols
                            .declare(def.name.clone(), Binding::type_definition(ty)),
                        Err(ConstructError::DuplicateOneofVariant(variant)) => {
                            self.sink.record_type_diagnostic(Diagnostic::of_kind(
                                DiagnosticKind::DuplicateOneofVariant,
                                format!("oneof `{}` repeats variant `{}`", def.name, variant),
                                def.span.clone().unwrap_or_else(Span::unknown),
                            ));
                        }
                        Err(other) => self.record_construct_error(other, def.span.as_ref()),
                    }
                }
                Item::UserDefined(def) => {
                    let wrapped = self.resolve_type_expr(&def.wrapped_type);
                    self.types.register_user_defined(
                        def.name.clone(),
                        wrapped,
                        def.generic_params.clone(),
                    );
                    let ty = Type::user_defined(
                        def.name.clone(),
                        def.generic_params
                            .iter()
                            .map(|p| Type::GenericParam { name: p.clone() })
                            .collect(),
                    );
                    self.symbols
                        .declare(def.name.clone(), Binding::type_definition(ty));
                }
                _ => {}
            }
        }
    }

    fn check_struct_immutability(&mut self, program: &Program) {
        for item in &program.items {
            let Item::Struct(def) = item else { continue };
            if !def.immutable {
                continue;
            }
            for field in &def.fields {
                let ty = self.resolve_type_expr(&field.ty);
                if !ty.is_deeply_immutable(&self.types) {
                    let suggestion = ty
                        .to_deeply_immutable(&self.types)
                        .map(|t| t.format_canonical());
                    let mut diag = Diagnostic::of_kind(
                        DiagnosticKind::ImmutabilityViolation,
                        format!(
                            "mutable field `{}` in immutable struct `{}`",
                            field.name, def.name
                        ),
                        field.span.clone().unwrap_or_else(Span::unknown),
                    );
                    if let Some(suggested) = suggestion {
                        diag = diag.with_help(format!("use `{}` instead", suggested));
                    }
                    self.sink.record_type_diagnostic(diag);
                    // Only the first offending field is reported (§4.3).
                    break;
                }
            }
        }
    }

    fn register_procedure_signatures(&mut self, program: &Program) {
        for item in &program.items {
            let Item::Procedure(def) = item else { continue };

            let arg_types: Vec<Type> = def.params.iter().map(|p| self.resolve_type_expr(&p.ty)).collect();
            let return_type = def
                .return_type
                .as_ref()
                .map(|t| self.resolve_type_expr(t))
                .unwrap_or(Type::Nothing);
            let required_contracts: Vec<ContractRequirement> = def
                .required_contracts
                .iter()
                .map(|(name, args)| {
                    (
                        name.clone(),
                        args.iter().map(|a| self.resolve_type_expr(a)).collect(),
                    )
                })
                .collect();

            let ty = match def.kind {
                ProcedureKind::Function => Type::function(
                    arg_types,
                    return_type,
                    def.declared_blocking,
                    def.generic_params.clone(),
                    def.blocking_generic_over.clone(),
                    required_contracts.clone(),
                ),
                ProcedureKind::Provider => Type::provider(
                    return_type,
                    def.declared_blocking,
                    def.generic_params.clone(),
                    def.blocking_generic_over.clone(),
                    required_contracts.clone(),
                ),
                ProcedureKind::Consumer => Type::consumer(
                    arg_types,
                    def.declared_blocking,
                    def.generic_params.clone(),
                    def.blocking_generic_over.clone(),
                    required_contracts.clone(),
                ),
            };

            if self.symbols.is_declared_visible(&def.name) {
                self.sink.record_type_diagnostic(Diagnostic::of_kind(
                    DiagnosticKind::Redeclaration,
                    format!("procedure `{}` is already declared", def.name),
                    def.span.clone().unwrap_or_else(Span::unknown),
                ));
            }
            self.symbols.declare(def.name.clone(), Binding::new(ty));

            let id = self.next_id();
            self.procedure_ids.insert(def.name.clone(), id);
            self.procedure_facts.insert(
                id,
                ProcedureFacts {
                    declared_blocking: def.declared_blocking,
                    effective_blocking: def.declared_blocking,
                    required_contracts,
                },
            );
            self.call_graph.insert(id, HashSet::new());
        }
    }

    // ---- Phase B: body checking -----------------------------------------

    fn check_procedure_body(&mut self, def: &ProcedureDef) {
        let id = self.procedure_ids.get(&def.name).copied();
        let previous_procedure = self.current_procedure;
        let previous_return = self.current_return_type.take();
        self.current_procedure = id;
        self.current_return_type = def.return_type.as_ref().map(|t| self.resolve_type_expr(t));

        self.symbols.enter_scope(ScopeKind::Procedure);
        for param in &def.params {
            let ty = self.resolve_type_expr(&param.ty);
            self.symbols.declare(param.name.clone(), Binding::new(ty));
        }
        self.check_block(&def.body);
        let unused = self.symbols.exit_scope(true);
        self.report_unused(unused);

        self.current_procedure = previous_procedure;
        self.current_return_type = previous_return;
    }

    fn check_static(&mut self, def: &ilex_ast::StaticDef) {
        if self.symbols.is_declared_visible(&def.name) {
            self.sink.record_type_diagnostic(Diagnostic::of_kind(
                DiagnosticKind::Redeclaration,
                format!("static `{}` is already declared", def.name),
                def.span.clone().unwrap_or_else(Span::unknown),
            ));
        }

        let ty = if let Some(declared) = &def.declared_type {
            let expected = self.resolve_type_expr(declared);
            self.assert_expected_type(&def.value, &expected, "static initializer")
        } else {
            self.infer_type(&def.value)
        };

        if ty != Type::Unknowable && !ty.is_deeply_immutable(&self.types) {
            self.sink.record_type_diagnostic(Diagnostic::of_kind(
                DiagnosticKind::IllegalMutableStatic,
                format!("static `{}` must be deeply immutable", def.name),
                def.span.clone().unwrap_or_else(Span::unknown),
            ));
        }

        self.symbols.declare(def.name.clone(), Binding::new(ty));
    }

    fn check_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Declaration(decl) => self.check_declaration(decl),
            Stmt::Assignment { name, value, span } => self.check_assignment(name, value, span),
            Stmt::If(if_stmt) => self.check_if(if_stmt),
            Stmt::Return { value, span } => self.check_return(value.as_ref(), span),
            Stmt::Expr(expr) => {
                self.infer_type(expr);
            }
        }
    }

    fn check_declaration(&mut self, decl: &DeclarationStmt) {
        if self.symbols.is_declared_visible(&decl.name) {
            self.sink.record_type_diagnostic(Diagnostic::of_kind(
                DiagnosticKind::Redeclaration,
                format!("`{}` is already declared in a visible scope", decl.name),
                decl.span.clone().unwrap_or_else(Span::unknown),
            ));
        }

        match &decl.initializer {
            Some(initializer) => {
                let ty = if let Some(declared) = &decl.declared_type {
                    let expected = self.resolve_type_expr(declared);
                    self.assert_expected_type(initializer, &expected, "declaration")
                } else {
                    self.infer_type(initializer)
                };
                self.symbols.declare(decl.name.clone(), Binding::new(ty));
            }
            None => {
                let ty = match &decl.declared_type {
                    Some(declared) => self.resolve_type_expr(declared),
                    None => {
                        self.sink.record_type_diagnostic(Diagnostic::of_kind(
                            DiagnosticKind::TypeMismatch,
                            format!(
                                "`{}` needs a type annotation or an initializer",
                                decl.name
                            ),
                            decl.span.clone().unwrap_or_else(Span::unknown),
                        ));
                        Type::Unknowable
                    }
                };
                self.symbols
                    .declare_uninitialized(decl.name.clone(), Binding::new(ty));
            }
        }
    }

    fn check_assignment(&mut self, name: &str, value: &Expr, span: &Option<Span>) {
        let Some(existing) = self.symbols.get_type(name).cloned() else {
            self.emit_unknown_identifier(name, span);
            return;
        };
        self.assert_expected_type(value, &existing, "assignment");
        self.symbols.mark_initialized(name);
    }

    fn check_if(&mut self, if_stmt: &IfStmt) {
        let cond_ty = self.infer_type(&if_stmt.condition);
        if cond_ty != Type::Bool && cond_ty != Type::Unknowable {
            self.sink.record_type_diagnostic(Diagnostic::of_kind(
                DiagnosticKind::TypeMismatch,
                format!(
                    "if condition must be `bool`, found `{}`",
                    cond_ty.format_canonical()
                ),
                if_stmt.span.clone().unwrap_or_else(Span::unknown),
            ));
        }

        match &if_stmt.else_block {
            Some(else_block) => {
                self.symbols.begin_branch_inspection();

                self.symbols.enter_scope(ScopeKind::Block);
                self.check_block(&if_stmt.then_block);
                let unused = self.symbols.exit_scope(true);
                self.report_unused(unused);

                self.symbols.enter_scope(ScopeKind::Block);
                self.check_block(else_block);
                let unused = self.symbols.exit_scope(true);
                self.report_unused(unused);

                self.symbols.finalize_branches();
            }
            None => {
                self.symbols.enter_scope(ScopeKind::Block);
                self.check_block(&if_stmt.then_block);
                let unused = self.symbols.exit_scope(true);
                self.report_unused(unused);
            }
        }
    }

    fn check_return(&mut self, value: Option<&Expr>, span: &Option<Span>) {
        let expected = self.current_return_type.clone().unwrap_or(Type::Nothing);
        let actual = match value {
            Some(expr) => self.assert_expected_type(expr, &expected, "return"),
            None => Type::Nothing,
        };
        if value.is_none() && expected != Type::Nothing {
            self.sink.record_type_diagnostic(Diagnostic::of_kind(
                DiagnosticKind::TypeMismatch,
                format!(
                    "expected a return value of type `{}`",
                    expected.format_canonical()
                ),
                span.clone().unwrap_or_else(Span::unknown),
            ));
        }
        let _ = actual;
    }

    // ---- Expressions ------------------------------------------------------

    fn infer_type(&mut self, expr: &Expr) -> Type {
        match expr {
            Expr::IntLiteral(_) => Type::Int,
            Expr::FloatLiteral(_) => Type::Float,
            Expr::StringLiteral(_) => Type::String,
            Expr::BoolLiteral(_) => Type::Bool,
            Expr::Reference { name, span } => self.infer_reference(name, span),
            Expr::Binary {
                left,
                op,
                right,
                span,
            } => self.infer_binary(left, *op, right, span),
            Expr::Negate { operand, span } => self.infer_negate(operand, span),
            Expr::Call {
                callee,
                generic_args,
                args,
                span,
            } => self.infer_call(callee, generic_args, args, span),
            Expr::Lambda(lambda) => self.infer_lambda(lambda),
            Expr::StructLiteral {
                type_name,
                fields,
                span,
            } => self.infer_struct_literal(type_name, fields, span),
            Expr::ModuleMember {
                module,
                member,
                span,
            } => self.infer_module_member(module, member, span),
        }
    }

    fn infer_reference(&mut self, name: &str, span: &Option<Span>) -> Type {
        match self.symbols.lookup(name) {
            None => {
                self.emit_unknown_identifier(name, span);
                Type::Unknowable
            }
            Some(LookupResult {
                ty, initialized, ..
            }) => {
                if !initialized {
                    self.sink.record_type_diagnostic(Diagnostic::of_kind(
                        DiagnosticKind::UninitializedReference,
                        format!("`{}` may be uninitialized along this path", name),
                        span.clone().unwrap_or_else(Span::unknown),
                    ));
                }
                ty
            }
        }
    }

    fn emit_unknown_identifier(&mut self, name: &str, span: &Option<Span>) {
        let candidates = self.symbols.declared_names();
        let suggestions = fuzzy::find_similar_names(name, &candidates, 0.7, 1);
        let mut diag = Diagnostic::of_kind(
            DiagnosticKind::UnknownIdentifier,
            format!("no variable `{}` in scope", name),
            span.clone().unwrap_or_else(Span::unknown),
        );
        if let Some(closest) = suggestions.into_iter().next() {
            diag = diag.with_help(format!("did you mean `{}`?", closest));
        }
        self.sink.record_type_diagnostic(diag);
    }

    fn infer_binary(&mut self, left: &Expr, op: BinaryOp, right: &Expr, span: &Option<Span>) -> Type {
        let left_ty = self.infer_type(left);
        let right_ty = self.infer_type(right);

        if op.is_equality() {
            if left_ty == Type::Unknowable || right_ty == Type::Unknowable {
                return Type::Bool;
            }
            if left_ty != right_ty {
                self.sink.record_type_diagnostic(Diagnostic::of_kind(
                    DiagnosticKind::TypeMismatch,
                    format!(
                        "cannot compare `{}` with `{}`",
                        left_ty.format_canonical(),
                        right_ty.format_canonical()
                    ),
                    span.clone().unwrap_or_else(Span::unknown),
                ));
            }
            return Type::Bool;
        }

        if left_ty == Type::Unknowable || right_ty == Type::Unknowable {
            return Type::Unknowable;
        }

        if !left_ty.is_numeric() || !right_ty.is_numeric() {
            self.sink.record_type_diagnostic(Diagnostic::of_kind(
                DiagnosticKind::UnsupportedOperand,
                format!(
                    "operator requires numeric operands, found `{}` and `{}`",
                    left_ty.format_canonical(),
                    right_ty.format_canonical()
                ),
                span.clone().unwrap_or_else(Span::unknown),
            ));
            return Type::Unknowable;
        }

        if op.is_division() {
            return Type::Float;
        }

        if left_ty == Type::Float || right_ty == Type::Float {
            Type::Float
        } else {
            Type::Int
        }
    }

    fn infer_negate(&mut self, operand: &Expr, span: &Option<Span>) -> Type {
        let ty = self.infer_type(operand);
        if ty == Type::Unknowable {
            return Type::Unknowable;
        }
        if !ty.is_numeric() {
            self.sink.record_type_diagnostic(Diagnostic::of_kind(
                DiagnosticKind::UnsupportedOperand,
                format!("cannot negate `{}`", ty.format_canonical()),
                span.clone().unwrap_or_else(Span::unknown),
            ));
            return Type::Unknowable;
        }
        ty
    }

    fn infer_lambda(&mut self, lambda: &LambdaExpr) -> Type {
        let arg_types: Vec<Type> = lambda.params.iter().map(|p: &Param| self.resolve_type_expr(&p.ty)).collect();
        let return_type = lambda
            .return_type
            .as_ref()
            .map(|t| self.resolve_type_expr(t))
            .unwrap_or(Type::Nothing);

        let previous_return = self.current_return_type.replace(return_type.clone());
        self.symbols.enter_scope(ScopeKind::Lambda);
        for (param, ty) in lambda.params.iter().zip(arg_types.iter()) {
            self.symbols.declare(param.name.clone(), Binding::new(ty.clone()));
        }
        self.check_block(&lambda.body);
        let unused = self.symbols.exit_scope(true);
        self.report_unused(unused);
        self.current_return_type = previous_return;

        Type::function(arg_types, return_type, false, vec![], vec![], vec![])
    }

    fn infer_struct_literal(
        &mut self,
        type_name: &str,
        fields: &[(String, Expr)],
        span: &Option<Span>,
    ) -> Type {
        let Some(struct_ty) = self.struct_defs.get(type_name).cloned() else {
            self.sink.record_type_diagnostic(Diagnostic::of_kind(
                DiagnosticKind::UnknownIdentifier,
                format!("unknown struct type `{}`", type_name),
                span.clone().unwrap_or_else(Span::unknown),
            ));
            return Type::Unknowable;
        };

        let Type::Struct {
            fields: declared_fields,
            ..
        } = &struct_ty
        else {
            return struct_ty;
        };
        let declared_fields = declared_fields.clone();

        for (name, value) in fields {
            match declared_fields.iter().find(|(fname, _)| fname == name) {
                Some((_, field_ty)) => {
                    self.assert_expected_type(value, &field_ty.clone(), "struct field");
                }
                None => {
                    self.sink.record_type_diagnostic(Diagnostic::of_kind(
                        DiagnosticKind::TypeMismatch,
                        format!("`{}` has no field `{}`", type_name, name),
                        span.clone().unwrap_or_else(Span::unknown),
                    ));
                }
            }
        }

        struct_ty
    }

    fn infer_module_member(&mut self, module: &str, member: &str, span: &Option<Span>) -> Type {
        let qualified = crate::module_binding::qualified_procedure_name(module, member);
        match self.dep_modules.get(module) {
            Some(bindings) => match bindings.procedure_bindings.get(&qualified) {
                Some(ty) => ty.clone(),
                None => {
                    self.sink.record_type_diagnostic(Diagnostic::of_kind(
                        DiagnosticKind::UnknownIdentifier,
                        format!("module `{}` has no export `{}`", module, member),
                        span.clone().unwrap_or_else(Span::unknown),
                    ));
                    Type::Unknowable
                }
            },
            None => {
                self.sink.record_type_diagnostic(Diagnostic::of_kind(
                    DiagnosticKind::UnknownIdentifier,
                    format!("no bound dependency module `{}`", module),
                    span.clone().unwrap_or_else(Span::unknown),
                ));
                Type::Unknowable
            }
        }
    }

    fn infer_call(
        &mut self,
        callee: &Expr,
        generic_args: &[TypeExpr],
        args: &[Expr],
        span: &Option<Span>,
    ) -> Type {
        let callee_id = match callee {
            Expr::Reference { name, .. } => self.procedure_ids.get(name).copied(),
            _ => None,
        };

        let callee_ty = self.infer_type(callee);
        let procedure = match &callee_ty {
            Type::Function(p) | Type::Provider(p) | Type::Consumer(p) => p.clone(),
            Type::Unknowable => return Type::Unknowable,
            other => {
                self.sink.record_type_diagnostic(Diagnostic::of_kind(
                    DiagnosticKind::TypeMismatch,
                    format!("`{}` is not callable", other.format_canonical()),
                    span.clone().unwrap_or_else(Span::unknown),
                ));
                return Type::Unknowable;
            }
        };

        if args.len() != procedure.arg_types.len() {
            self.sink.record_type_diagnostic(Diagnostic::of_kind(
                DiagnosticKind::ArityMismatch,
                format!(
                    "expected {} argument(s), found {}",
                    procedure.arg_types.len(),
                    args.len()
                ),
                span.clone().unwrap_or_else(Span::unknown),
            ));
        }

        let explicit_subst: GenericSubstitution = procedure
            .generic_params
            .iter()
            .cloned()
            .zip(generic_args.iter().map(|t| self.resolve_type_expr(t)))
            .collect();

        let mut subst = explicit_subst;
        let pairs: Vec<(Type, Expr)> = procedure
            .arg_types
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect();

        for (declared, arg_expr) in &pairs {
            let inferred = self.infer_type(arg_expr);
            if inferred == Type::Unknowable {
                continue;
            }
            if !unify(declared, &inferred, &mut subst) {
                self.sink.record_type_diagnostic(Diagnostic::of_kind(
                    DiagnosticKind::GenericInferenceFailure,
                    format!(
                        "cannot unify parameter type `{}` with argument type `{}`",
                        declared.format_canonical(),
                        inferred.format_canonical()
                    ),
                    span.clone().unwrap_or_else(Span::unknown),
                ));
            } else if procedure.generic_params.is_empty() {
                let expected = declared.clone();
                if inferred != expected {
                    self.sink.record_type_diagnostic(Diagnostic::of_kind(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "expected `{}`, found `{}`",
                            expected.format_canonical(),
                            inferred.format_canonical()
                        ),
                        span.clone().unwrap_or_else(Span::unknown),
                    ));
                }
            }
        }

        self.resolve_contract_obligations(&procedure.required_contracts, &subst, span);

        if let (Some(callee_id), Some(current)) = (callee_id, self.current_procedure) {
            self.call_graph.entry(current).or_default().insert(callee_id);
        }

        for idx in &procedure.blocking_generic_over {
            if let Some(Expr::Reference { name, .. }) = args.get(*idx) {
                if let Some(Type::Function(inner) | Type::Provider(inner) | Type::Consumer(inner)) =
                    self.symbols.get_type(name)
                {
                    if inner.declared_blocking {
                        if let Some(id) = callee_id {
                            self.blocking_generic_triggered.insert(id);
                        }
                    }
                }
            }
        }

        procedure
            .return_type
            .as_ref()
            .map(|t| substitute_type(t, &subst))
            .unwrap_or(Type::Nothing)
    }

    fn resolve_contract_obligations(
        &mut self,
        required: &[ContractRequirement],
        subst: &GenericSubstitution,
        span: &Option<Span>,
    ) {
        for requirement in required {
            let substituted = substitute_requirement(requirement, subst);
            if requirement_is_concrete(&substituted) {
                if !self.contract_impls.satisfies(&substituted) {
                    self.sink.record_type_diagnostic(Diagnostic::of_kind(
                        DiagnosticKind::MissingContractImpl,
                        format!(
                            "no implementation of `{}` for `{}`",
                            substituted.0,
                            substituted
                                .1
                                .iter()
                                .map(Type::format_canonical)
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                        span.clone().unwrap_or_else(Span::unknown),
                    ));
                }
            } else if let Some(current) = self.current_procedure {
                self.procedure_facts
                    .get_mut(&current)
                    .expect("current procedure registered in phase A")
                    .required_contracts
                    .push(substituted);
            }
        }
    }

    fn assert_expected_type(&mut self, expr: &Expr, expected: &Type, context: &str) -> Type {
        let actual = self.infer_type(expr);
        if actual == Type::Unknowable {
            return Type::Unknowable;
        }
        if &actual != expected {
            let span = expr.span().cloned().unwrap_or_else(Span::unknown);
            self.sink.record_type_diagnostic(Diagnostic::of_kind(
                DiagnosticKind::TypeMismatch,
                format!(
                    "{}: expected `{}`, found `{}`",
                    context,
                    expected.format_canonical(),
                    actual.format_canonical()
                ),
                span,
            ));
            return Type::Unknowable;
        }
        actual
    }

    // ---- Phase C: blocking propagation ------------------------------------

    fn propagate_blocking(&mut self) {
        for id in self.blocking_generic_triggered.clone() {
            if let Some(facts) = self.procedure_facts.get_mut(&id) {
                facts.effective_blocking = true;
            }
        }

        loop {
            let mut changed = false;
            let ids: Vec<ProcedureId> = self.procedure_facts.keys().copied().collect();
            for id in ids {
                if self.procedure_facts[&id].effective_blocking {
                    continue;
                }
                let callees = self.call_graph.get(&id).cloned().unwrap_or_default();
                if callees
                    .iter()
                    .any(|callee| self.procedure_facts.get(callee).is_some_and(|f| f.effective_blocking))
                {
                    self.procedure_facts.get_mut(&id).unwrap().effective_blocking = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        for (name, id) in self.procedure_ids.clone() {
            let facts = &self.procedure_facts[&id];
            if !facts.declared_blocking && facts.effective_blocking {
                self.sink.record_type_diagnostic(Diagnostic::of_kind(
                    DiagnosticKind::BlockingMismatch,
                    format!(
                        "`{}` is effectively blocking but not declared blocking",
                        name
                    ),
                    Span::unknown(),
                ));
            }
        }
    }

    // ---- Phase D: residual contract obligations ---------------------------

    fn verify_remaining_contracts(&mut self) {
        let facts: Vec<(ProcedureId, Vec<ContractRequirement>)> = self
            .procedure_facts
            .iter()
            .map(|(id, f)| (*id, f.required_contracts.clone()))
            .collect();

        for (_, requirements) in facts {
            for requirement in &requirements {
                if requirement_is_concrete(requirement) && !self.contract_impls.satisfies(requirement) {
                    self.sink.record_type_diagnostic(Diagnostic::of_kind(
                        DiagnosticKind::MissingContractImpl,
                        format!(
                            "no implementation of `{}` for `{}`",
                            requirement.0,
                            requirement
                                .1
                                .iter()
                                .map(Type::format_canonical)
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                        Span::unknown(),
                    ));
                }
            }
        }
    }

    fn report_unused(&mut self, unused: Vec<(String, bool)>) {
        for (name, _is_type_definition) in unused {
            self.sink.record_type_diagnostic(Diagnostic::of_kind(
                DiagnosticKind::UnusedSymbol,
                format!("unused symbol `{}`", name),
                Span::unknown(),
            ));
        }
    }

    fn record_construct_error(&mut self, err: ConstructError, span: Option<&Span>) {
        self.sink.record_type_diagnostic(Diagnostic::of_kind(
            DiagnosticKind::InternalError,
            err.to_string(),
            span.cloned().unwrap_or_else(Span::unknown),
        ));
    }

    /// Resolve unresolved type syntax into a concrete `Type` (§3.3:
    /// "the checker implements the behavior §6 describes ... as
    /// checker-side functions over this data").
    fn resolve_type_expr(&mut self, expr: &TypeExpr) -> Type {
        match expr {
            TypeExpr::Int => Type::Int,
            TypeExpr::Float => Type::Float,
            TypeExpr::String => Type::String,
            TypeExpr::Bool => Type::Bool,
            TypeExpr::Module => Type::Module,
            TypeExpr::Nothing => Type::Nothing,
            TypeExpr::List { mutable, values } => {
                Type::list(self.resolve_type_expr(values), *mutable)
            }
            TypeExpr::Set { mutable, values } => {
                let resolved = self.resolve_type_expr(values);
                match Type::set(resolved, *mutable) {
                    Ok(ty) => ty,
                    Err(err) => {
                        self.record_construct_error(err, None);
                        Type::Unknowable
                    }
                }
            }
            TypeExpr::Map {
                mutable,
                keys,
                values,
            } => {
                let resolved_keys = self.resolve_type_expr(keys);
                let resolved_values = self.resolve_type_expr(values);
                match Type::map(resolved_keys, resolved_values, *mutable) {
                    Ok(ty) => ty,
                    Err(err) => {
                        self.record_construct_error(err, None);
                        Type::Unknowable
                    }
                }
            }
            TypeExpr::Tuple { mutable, elements } => Type::tuple(
                elements.iter().map(|e| self.resolve_type_expr(e)).collect(),
                *mutable,
            ),
            TypeExpr::Struct { mutable, fields } => Type::struct_type(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), self.resolve_type_expr(ty)))
                    .collect(),
                *mutable,
            ),
            TypeExpr::Oneof(variants) => {
                let resolved: Vec<Type> = variants.iter().map(|v| self.resolve_type_expr(v)).collect();
                match Type::oneof(resolved) {
                    Ok(ty) => ty,
                    Err(err) => {
                        self.record_construct_error(err, None);
                        Type::Unknowable
                    }
                }
            }
            TypeExpr::Future(inner) => Type::future(self.resolve_type_expr(inner)),
            TypeExpr::UserDefined { name, args } => Type::user_defined(
                name.clone(),
                args.iter().map(|a| self.resolve_type_expr(a)).collect(),
            ),
            TypeExpr::Function {
                args,
                return_type,
                blocking,
            } => Type::function(
                args.iter().map(|a| self.resolve_type_expr(a)).collect(),
                self.resolve_type_expr(return_type),
                *blocking,
                vec![],
                vec![],
                vec![],
            ),
            TypeExpr::Provider { return_type, blocking } => {
                Type::provider(self.resolve_type_expr(return_type), *blocking, vec![], vec![], vec![])
            }
            TypeExpr::Consumer { args, blocking } => Type::consumer(
                args.iter().map(|a| self.resolve_type_expr(a)).collect(),
                *blocking,
                vec![],
                vec![],
                vec![],
            ),
            TypeExpr::GenericParam(name) => Type::GenericParam { name: name.clone() },
        }
    }
}

fn primitive_type(name: &str) -> Type {
    match name {
        "int" => Type::Int,
        "float" => Type::Float,
        "string" => Type::String,
        "bool" => Type::Bool,
        _ => unreachable!("primitive_type called with non-primitive name"),
    }
}

/// Structural unification used for generic-argument inference at call
/// sites: binds `GENERIC_PARAM` names in `declared` to the matching
/// substructure of `concrete`, failing if a name is bound
/// inconsistently or the shapes disagree.
fn unify(declared: &Type, concrete: &Type, subst: &mut GenericSubstitution) -> bool {
    match declared {
        Type::GenericParam { name } => match subst.get(name) {
            Some(bound) => bound == concrete,
            None => {
                subst.insert(name.clone(), concrete.clone());
                true
            }
        },
        Type::List {
            values: d,
            mutable: dm,
        } => match concrete {
            Type::List { values: c, mutable: cm } => dm == cm && unify(d, c, subst),
            _ => false,
        },
        Type::Set {
            values: d,
            mutable: dm,
        } => match concrete {
            Type::Set { values: c, mutable: cm } => dm == cm && unify(d, c, subst),
            _ => false,
        },
        Type::Map {
            keys: dk,
            values: dv,
            mutable: dm,
        } => match concrete {
            Type::Map {
                keys: ck,
                values: cv,
                mutable: cm,
            } => dm == cm && unify(dk, ck, subst) && unify(dv, cv, subst),
            _ => false,
        },
        Type::Tuple {
            values: d,
            mutable: dm,
        } => match concrete {
            Type::Tuple { values: c, mutable: cm } => {
                dm == cm && d.len() == c.len() && d.iter().zip(c.iter()).all(|(a, b)| unify(a, b, subst))
            }
            _ => false,
        },
        Type::Future { value: d } => match concrete {
            Type::Future { value: c } => unify(d, c, subst),
            _ => false,
        },
        Type::UserDefined {
            type_name: dn,
            args: da,
        } => match concrete {
            Type::UserDefined { type_name: cn, args: ca } => {
                dn == cn && da.len() == ca.len() && da.iter().zip(ca.iter()).all(|(a, b)| unify(a, b, subst))
            }
            _ => false,
        },
        other => other == concrete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilex_ast::{DeclarationStmt, Item, ProcedureDef, ProcedureKind, StaticDef};

    fn decl(name: &str, initializer: Expr) -> Stmt {
        Stmt::Declaration(DeclarationStmt {
            name: name.to_string(),
            declared_type: None,
            initializer: Some(initializer),
            mutable: false,
            span: None,
        })
    }

    fn uninit_decl(name: &str, declared_type: TypeExpr) -> Stmt {
        Stmt::Declaration(DeclarationStmt {
            name: name.to_string(),
            declared_type: Some(declared_type),
            initializer: None,
            mutable: true,
            span: None,
        })
    }

    fn reference(name: &str) -> Expr {
        Expr::Reference {
            name: name.to_string(),
            span: None,
        }
    }

    #[test]
    fn test_s1_declaration_and_inference() {
        let program = Program {
            module_name: "main".to_string(),
            items: vec![Item::Static(StaticDef {
                name: "entry".to_string(),
                declared_type: None,
                value: Expr::IntLiteral(1),
                span: None,
            })],
        };
        let mut ctx = CheckContext::new();
        ctx.check_program(&program);
        assert!(ctx.sink.is_clean());
    }

    #[test]
    fn test_s2_unused_symbol_warns() {
        let body = Block {
            stmts: vec![decl("x", Expr::IntLiteral(1))],
        };
        let program = Program {
            module_name: "main".to_string(),
            items: vec![Item::Procedure(ProcedureDef {
                name: "main".to_string(),
                kind: ProcedureKind::Function,
                generic_params: vec![],
                params: vec![],
                return_type: None,
                declared_blocking: false,
                blocking_generic_over: vec![],
                required_contracts: vec![],
                body,
                span: None,
            })],
        };
        let mut ctx = CheckContext::new();
        ctx.check_program(&program);
        assert!(!ctx.sink.is_clean());
        let flushed = ctx.sink.flush_all("main");
        assert!(flushed.iter().any(|d| d.message.contains("unused symbol `x`")));
    }

    #[test]
    fn test_binary_add_promotes_to_float() {
        let mut ctx = CheckContext::new();
        let ty = ctx.infer_type(&Expr::Binary {
            left: Box::new(Expr::IntLiteral(1)),
            op: BinaryOp::Add,
            right: Box::new(Expr::FloatLiteral(2.0)),
            span: None,
        });
        assert_eq!(ty, Type::Float);
    }

    #[test]
    fn test_division_always_yields_float() {
        let mut ctx = CheckContext::new();
        let ty = ctx.infer_type(&Expr::Binary {
            left: Box::new(Expr::IntLiteral(4)),
            op: BinaryOp::Div,
            right: Box::new(Expr::IntLiteral(2)),
            span: None,
        });
        assert_eq!(ty, Type::Float);
    }

    #[test]
    fn test_unknown_reference_is_reported() {
        let mut ctx = CheckContext::new();
        let ty = ctx.infer_type(&reference("missing"));
        assert_eq!(ty, Type::Unknowable);
        assert!(!ctx.sink.is_clean());
    }

    #[test]
    fn test_s6_blocking_mismatch_detected_transitively() {
        let bar = ProcedureDef {
            name: "bar".to_string(),
            kind: ProcedureKind::Function,
            generic_params: vec![],
            params: vec![],
            return_type: None,
            declared_blocking: true,
            blocking_generic_over: vec![],
            required_contracts: vec![],
            body: Block { stmts: vec![] },
            span: None,
        };
        let foo = ProcedureDef {
            name: "foo".to_string(),
            kind: ProcedureKind::Function,
            generic_params: vec![],
            params: vec![],
            return_type: None,
            declared_blocking: false,
            blocking_generic_over: vec![],
            required_contracts: vec![],
            body: Block {
                stmts: vec![Stmt::Expr(Expr::Call {
                    callee: Box::new(reference("bar")),
                    generic_args: vec![],
                    args: vec![],
                    span: None,
                })],
            },
            span: None,
        };
        let program = Program {
            module_name: "main".to_string(),
            items: vec![Item::Procedure(bar), Item::Procedure(foo)],
        };
        let mut ctx = CheckContext::new();
        ctx.check_program(&program);
        let flushed = ctx.sink.flush_all("main");
        assert!(flushed
            .iter()
            .any(|d| d.message.contains("foo") && d.message.contains("blocking")));
    }

    #[test]
    fn test_s4_branch_coverage_both_arms_initialize() {
        let body = Block {
            stmts: vec![
                uninit_decl("x", TypeExpr::Int),
                Stmt::If(IfStmt {
                    condition: Expr::BoolLiteral(true),
                    then_block: Block {
                        stmts: vec![Stmt::Assignment {
                            name: "x".to_string(),
                            value: Expr::IntLiteral(1),
                            span: None,
                        }],
                    },
                    else_block: Some(Block {
                        stmts: vec![Stmt::Assignment {
                            name: "x".to_string(),
                            value: Expr::IntLiteral(2),
                            span: None,
                        }],
                    }),
                    span: None,
                }),
                Stmt::Return {
                    value: Some(reference("x")),
                    span: None,
                },
            ],
        };
        let program = Program {
            module_name: "main".to_string(),
            items: vec![Item::Procedure(ProcedureDef {
                name: "main".to_string(),
                kind: ProcedureKind::Function,
                generic_params: vec![],
                params: vec![],
                return_type: Some(TypeExpr::Int),
                declared_blocking: false,
                blocking_generic_over: vec![],
                required_contracts: vec![],
                body,
                span: None,
            })],
        };
        let mut ctx = CheckContext::new();
        ctx.check_program(&program);
        let flushed = ctx.sink.flush_all("main");
        assert!(!flushed
            .iter()
            .any(|d| d.message.contains("may be uninitialized")));
    }

    #[test]
    fn test_s4_branch_coverage_missing_arm_is_uninitialized() {
        let body = Block {
            stmts: vec![
                uninit_decl("x", TypeExpr::Int),
                Stmt::If(IfStmt {
                    condition: Expr::BoolLiteral(true),
                    then_block: Block {
                        stmts: vec![Stmt::Assignment {
                            name: "x".to_string(),
                            value: Expr::IntLiteral(1),
                            span: None,
                        }],
                    },
                    else_block: Some(Block { stmts: vec![] }),
                    span: None,
                }),
                Stmt::Return {
                    value: Some(reference("x")),
                    span: None,
                },
            ],
        };
        let program = Program {
            module_name: "main".to_string(),
            items: vec![Item::Procedure(ProcedureDef {
                name: "main".to_string(),
                kind: ProcedureKind::Function,
                generic_params: vec![],
                params: vec![],
                return_type: Some(TypeExpr::Int),
                declared_blocking: false,
                blocking_generic_over: vec![],
                required_contracts: vec![],
                body,
                span: None,
            })],
        };
        let mut ctx = CheckContext::new();
        ctx.check_program(&program);
        let flushed = ctx.sink.flush_all("main");
        assert!(flushed
            .iter()
            .any(|d| d.message.contains("may be uninitialized")));
    }
}

//! Scoped symbol table (C2): §3.2/§4.2.
//!
//! A stack of `Scope`s. Lookup is capability-gated: crossing a
//! `Procedure` boundary restricts visibility of outer bindings to
//! procedure/module/type-definition names only; crossing a `Lambda`
//! boundary allows everything, but the first such boundary crossed
//! becomes the point where the referenced outer binding is
//! snapshot-captured (§4.2.1).

use crate::types::Type;
use std::collections::HashSet;

/// What this scope was opened for; governs lookup gating (§4.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Block,
    Procedure,
    Lambda,
}

/// Minimal constant-value representation for statics and literal
/// folding hooks. Not a general interpreter (out of scope); this only
/// backs the data the checker itself needs (e.g. static-initializer
/// deep-immutability checks).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Unit,
}

/// One declared name.
#[derive(Debug, Clone)]
pub struct Binding {
    pub ty: Type,
    pub value: Option<Value>,
    pub declared: bool,
    pub used: bool,
    pub is_type_definition: bool,
}

impl Binding {
    pub fn new(ty: Type) -> Self {
        Binding {
            ty,
            value: None,
            declared: true,
            used: false,
            is_type_definition: false,
        }
    }

    pub fn type_definition(ty: Type) -> Self {
        Binding {
            ty,
            value: None,
            declared: true,
            used: false,
            is_type_definition: true,
        }
    }
}

/// Result of a capability-gated `lookup` (§4.2).
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub ty: Type,
    pub initialized: bool,
    pub captured: bool,
}

/// One lexical level.
#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    bindings: std::collections::HashMap<String, Binding>,
    initialized_in_this_branch: HashSet<String>,
    branch_inspection: bool,
    initialized_in_every_branch_so_far: Option<HashSet<String>>,
    captured_names: HashSet<String>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Scope {
            kind,
            bindings: std::collections::HashMap::new(),
            initialized_in_this_branch: HashSet::new(),
            branch_inspection: false,
            initialized_in_every_branch_so_far: None,
            captured_names: HashSet::new(),
        }
    }

    /// Whether a binding found in *this* scope is visible across the
    /// procedure boundary this scope represents for an outer walk
    /// (§4.2.1: procedure/module/type-def bindings only).
    fn visible_across_procedure_boundary(binding: &Binding) -> bool {
        binding.is_type_definition || matches!(binding.ty, Type::Function(_) | Type::Provider(_) | Type::Consumer(_) | Type::Module)
    }
}

/// Stack of lexical scopes for one procedure-checking walk (§3.2).
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope::new(ScopeKind::Block)],
        }
    }

    pub fn enter_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    /// Pop the innermost scope. Returns `(name, is_type_definition)`
    /// for every binding that was declared but never read, so the
    /// caller can turn them into `UnusedSymbol` diagnostics.
    pub fn exit_scope(&mut self, check_unused: bool) -> Vec<(String, bool)> {
        let popped = self
            .scopes
            .pop()
            .expect("exit_scope called with no open scope");

        let unused = if check_unused {
            popped
                .bindings
                .iter()
                .filter(|(_, binding)| !binding.used)
                .map(|(name, binding)| (name.clone(), binding.is_type_definition))
                .collect()
        } else {
            Vec::new()
        };

        if let Some(parent) = self.scopes.last_mut() {
            if parent.branch_inspection {
                let contribution: HashSet<String> = popped
                    .initialized_in_this_branch
                    .iter()
                    .filter(|name| !popped.bindings.contains_key(*name))
                    .cloned()
                    .collect();

                match &mut parent.initialized_in_every_branch_so_far {
                    Some(running) => running.retain(|name| contribution.contains(name)),
                    None => parent.initialized_in_every_branch_so_far = Some(contribution),
                }
            }
        }

        unused
    }

    pub fn declare(&mut self, name: impl Into<String>, binding: Binding) {
        let name = name.into();
        let scope = self.scopes.last_mut().expect("no open scope");
        scope.initialized_in_this_branch.insert(name.clone());
        scope.bindings.insert(name, binding);
    }

    /// Declares a name without marking it initialized yet (e.g. an
    /// uninitialized `var` awaiting first assignment).
    pub fn declare_uninitialized(&mut self, name: impl Into<String>, binding: Binding) {
        let name = name.into();
        let scope = self.scopes.last_mut().expect("no open scope");
        scope.bindings.insert(name, binding);
    }

    /// Marks `name` initialized in the *current* scope, not the scope
    /// that declared it (§4.2: an assignment to an outer `var` from
    /// inside a branch arm is recorded in that arm's own scope, so
    /// `exit_scope`'s branch-merge sees it as one arm's contribution
    /// rather than silently initializing the outer binding directly).
    pub fn mark_initialized(&mut self, name: &str) {
        let scope = self.scopes.last_mut().expect("no open scope");
        scope.initialized_in_this_branch.insert(name.to_string());
    }

    pub fn begin_branch_inspection(&mut self) {
        let scope = self.scopes.last_mut().expect("no open scope");
        scope.branch_inspection = true;
        scope.initialized_in_every_branch_so_far = None;
    }

    /// Commits the intersection of all inspected branches' initialized
    /// sets into the current scope's own initialized set, and ends
    /// branch-inspection mode (§4.2.2).
    pub fn finalize_branches(&mut self) {
        let scope = self.scopes.last_mut().expect("no open scope");
        scope.branch_inspection = false;
        if let Some(fully_covered) = scope.initialized_in_every_branch_so_far.take() {
            scope.initialized_in_this_branch.extend(fully_covered);
        }
    }

    /// Capability-gated lookup used for `Reference` expressions. May
    /// mutate the table: marks the binding used, and if a `Lambda`
    /// boundary is crossed before the binding is found, snapshots a
    /// capture into the innermost lambda scope crossed (§4.2.1).
    pub fn lookup(&mut self, name: &str) -> Option<LookupResult> {
        let mut crossed_procedure = false;
        let mut first_lambda_idx: Option<usize> = None;

        let mut found_idx = None;
        for idx in (0..self.scopes.len()).rev() {
            match self.scopes[idx].kind {
                ScopeKind::Procedure => crossed_procedure = true,
                ScopeKind::Lambda => {
                    if first_lambda_idx.is_none() {
                        first_lambda_idx = Some(idx);
                    }
                }
                ScopeKind::Block => {}
            }
            if self.scopes[idx].bindings.contains_key(name) {
                found_idx = Some(idx);
                break;
            }
        }

        let found_idx = found_idx?;

        if crossed_procedure {
            let binding = &self.scopes[found_idx].bindings[name];
            if !Scope::visible_across_procedure_boundary(binding) {
                return None;
            }
            return Some(LookupResult {
                ty: binding.ty.clone(),
                initialized: true,
                captured: false,
            });
        }

        let current_idx = self.scopes.len() - 1;
        let initialized = (found_idx..=current_idx)
            .any(|idx| self.scopes[idx].initialized_in_this_branch.contains(name));

        let ty = {
            let binding = self.scopes[found_idx]
                .bindings
                .get_mut(name)
                .expect("binding located during scan");
            binding.used = true;
            binding.ty.clone()
        };

        let captured = if let Some(lambda_idx) = first_lambda_idx {
            if found_idx < lambda_idx {
                let snapshot = self.scopes[found_idx].bindings[name].clone();
                self.scopes[lambda_idx]
                    .bindings
                    .insert(name.to_string(), snapshot);
                self.scopes[lambda_idx].captured_names.insert(name.to_string());
                if initialized {
                    self.scopes[lambda_idx]
                        .initialized_in_this_branch
                        .insert(name.to_string());
                }
                true
            } else {
                false
            }
        } else {
            false
        };

        Some(LookupResult {
            ty,
            initialized,
            captured,
        })
    }

    /// Read-only variant of the same procedure-boundary gating, used
    /// for redeclaration checks (no mutation, no capture).
    pub fn is_declared_visible(&self, name: &str) -> bool {
        let mut crossed_procedure = false;
        for scope in self.scopes.iter().rev() {
            if scope.kind == ScopeKind::Procedure {
                crossed_procedure = true;
            }
            if let Some(binding) = scope.bindings.get(name) {
                return !crossed_procedure || Scope::visible_across_procedure_boundary(binding);
            }
        }
        false
    }

    /// Ungated scan used once a name has already been resolved (e.g.
    /// updating type info after inference), innermost-to-outermost.
    fn find_binding_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.bindings.get_mut(name))
    }

    fn find_binding(&self, name: &str) -> Option<&Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
    }

    pub fn get_type(&self, name: &str) -> Option<&Type> {
        self.find_binding(name).map(|binding| &binding.ty)
    }

    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.find_binding(name).and_then(|binding| binding.value.as_ref())
    }

    pub fn is_declared_in_current_scope(&self, name: &str) -> bool {
        self.scopes
            .last()
            .expect("no open scope")
            .bindings
            .contains_key(name)
    }

    pub fn mark_used(&mut self, name: &str) {
        if let Some(binding) = self.find_binding_mut(name) {
            binding.used = true;
        }
    }

    /// Every name currently visible from the innermost scope outward,
    /// ignoring procedure-boundary gating. Feeds "did you mean?"
    /// suggestions on an otherwise-unresolved reference.
    pub fn declared_names(&self) -> Vec<String> {
        self.scopes
            .iter()
            .flat_map(|scope| scope.bindings.keys().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_lookup_in_same_scope() {
        let mut table = SymbolTable::new();
        table.declare("x", Binding::new(Type::Int));
        let result = table.lookup("x").unwrap();
        assert_eq!(result.ty, Type::Int);
        assert!(result.initialized);
        assert!(!result.captured);
    }

    #[test]
    fn test_lookup_unknown_name_returns_none() {
        let mut table = SymbolTable::new();
        assert!(table.lookup("missing").is_none());
    }

    #[test]
    fn test_uninitialized_binding_reports_not_initialized() {
        let mut table = SymbolTable::new();
        table.declare_uninitialized("x", Binding::new(Type::Int));
        let result = table.lookup("x").unwrap();
        assert!(!result.initialized);
    }

    #[test]
    fn test_procedure_boundary_hides_plain_locals() {
        let mut table = SymbolTable::new();
        table.declare("x", Binding::new(Type::Int));
        table.enter_scope(ScopeKind::Procedure);
        assert!(table.lookup("x").is_none());
    }

    #[test]
    fn test_procedure_boundary_allows_type_definitions() {
        let mut table = SymbolTable::new();
        table.declare("MyType", Binding::type_definition(Type::Int));
        table.enter_scope(ScopeKind::Procedure);
        let result = table.lookup("MyType").unwrap();
        assert_eq!(result.ty, Type::Int);
    }

    #[test]
    fn test_lambda_boundary_captures_outer_binding() {
        let mut table = SymbolTable::new();
        table.declare("x", Binding::new(Type::Int));
        table.enter_scope(ScopeKind::Lambda);
        let result = table.lookup("x").unwrap();
        assert!(result.captured);
        // The capture snapshot now lives in the lambda scope directly.
        assert!(table.is_declared_in_current_scope("x"));
    }

    #[test]
    fn test_lambda_capture_stays_initialized_on_second_reference() {
        let mut table = SymbolTable::new();
        table.declare("x", Binding::new(Type::Int));
        table.enter_scope(ScopeKind::Lambda);
        let first = table.lookup("x").unwrap();
        assert!(first.initialized);
        // Second lookup resolves against the snapshot now living in the
        // lambda scope itself; it must still read as initialized.
        let second = table.lookup("x").unwrap();
        assert!(second.initialized);
    }

    #[test]
    fn test_branch_inspection_requires_coverage_in_every_branch() {
        let mut table = SymbolTable::new();
        table.declare_uninitialized("x", Binding::new(Type::Int));

        table.begin_branch_inspection();

        table.enter_scope(ScopeKind::Block);
        table.mark_initialized("x");
        table.exit_scope(false);

        table.enter_scope(ScopeKind::Block);
        // else-branch never initializes x.
        table.exit_scope(false);

        table.finalize_branches();

        let result = table.lookup("x").unwrap();
        assert!(!result.initialized);
    }

    #[test]
    fn test_branch_inspection_passes_when_all_branches_initialize() {
        let mut table = SymbolTable::new();
        table.declare_uninitialized("x", Binding::new(Type::Int));

        table.begin_branch_inspection();

        table.enter_scope(ScopeKind::Block);
        table.mark_initialized("x");
        table.exit_scope(false);

        table.enter_scope(ScopeKind::Block);
        table.mark_initialized("x");
        table.exit_scope(false);

        table.finalize_branches();

        let result = table.lookup("x").unwrap();
        assert!(result.initialized);
    }

    #[test]
    fn test_declared_names_spans_all_open_scopes() {
        let mut table = SymbolTable::new();
        table.declare("x", Binding::new(Type::Int));
        table.enter_scope(ScopeKind::Block);
        table.declare("y", Binding::new(Type::Bool));
        let mut names = table.declared_names();
        names.sort();
        assert_eq!(names, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_unused_binding_reported_on_scope_exit() {
        let mut table = SymbolTable::new();
        table.enter_scope(ScopeKind::Block);
        table.declare("y", Binding::new(Type::Int));
        let unused = table.exit_scope(true);
        assert_eq!(unused, vec![("y".to_string(), false)]);
    }
}

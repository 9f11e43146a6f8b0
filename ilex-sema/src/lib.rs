pub mod builtin_contracts; // Builtin contract implementations for primitives
pub mod checker; // Semantic checker entry point and per-node policy
pub mod contracts; // Contract obligation tracking and substitution
pub mod module_binding; // Cross-module type/procedure binding
pub mod symbols; // Scoped symbol table
pub mod type_registry; // Process-wide user-defined type registry
pub mod types; // The type algebra

pub use checker::{CheckContext, ProcedureFacts, ProcedureId};
pub use contracts::{ContractImpls, ContractRequirement};
pub use module_binding::{
    bind_dependency_module, bind_self_module, BindError, DependencyModuleApi, ExportedProcedure,
    ExportedType, ModuleBindings, SELF_MODULE_KEY,
};
pub use symbols::{Binding, LookupResult, ScopeKind, SymbolTable, Value};
pub use type_registry::{is_reserved_type_name, TypeRegistry};
pub use types::{ConstructError, GenericSubstitution, ProcedureType, Type};

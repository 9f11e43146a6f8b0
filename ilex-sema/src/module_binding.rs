//! Cross-module binding (C4): §4.4.
//!
//! Grounded on `trait_bounds_checker.rs`'s `initialize(&Program)`
//! two-pass shape: collect every kind of declaration before wiring up
//! anything that refers across declarations, so order of discovery
//! inside a dependency module's export list never matters.

use crate::type_registry::TypeRegistry;
use crate::types::Type;
use std::collections::HashMap;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BindError {
    #[error("dependency module `{0}` exports a duplicate type name `{1}`")]
    DuplicateTypeExport(String, String),
    #[error("dependency module `{0}` exports a duplicate procedure name `{1}`")]
    DuplicateProcedureExport(String, String),
}

/// One exported user-defined type: its wrapped body, declared generic
/// parameter names, and the initializer/unwrapper identifiers the
/// module registers for it (§4.4 step 4).
#[derive(Debug, Clone)]
pub struct ExportedType {
    pub name: String,
    pub wrapped_body: Type,
    pub type_params: Vec<String>,
    pub initializer: Option<String>,
    pub unwrapper: Option<String>,
}

/// One exported procedure signature.
#[derive(Debug, Clone)]
pub struct ExportedProcedure {
    pub name: String,
    pub ty: Type,
}

/// The parsed API surface of one dependency module (§4.4/§6: "the core
/// reads only the descriptor and API header").
#[derive(Debug, Clone)]
pub struct DependencyModuleApi {
    pub module_name: String,
    pub exported_types: Vec<ExportedType>,
    pub exported_procedures: Vec<ExportedProcedure>,
}

/// Sentinel key for the module currently being compiled, distinguishing
/// its own qualified identity from a dependency's (§4.4 final paragraph).
pub const SELF_MODULE_KEY: &str = "$SELF$";

/// Qualified name a dependency procedure is bound under:
/// `DEP$<module>$<name>`.
pub fn qualified_procedure_name(module_name: &str, name: &str) -> String {
    format!("DEP${module_name}${name}")
}

/// Registers every dependency module's exports into the given type
/// registry and a returned name→type table for the checker's top-level
/// scope, plus the initializer/unwrapper index (§4.4 steps 2-4).
pub struct ModuleBindings {
    /// `DEP$<M>$<name>` → procedure type, ready to `declare` at the
    /// checker's module-level scope.
    pub procedure_bindings: HashMap<String, Type>,
    /// User-defined type name → (initializer id, unwrapper id).
    pub initializers: HashMap<String, String>,
    pub unwrappers: HashMap<String, String>,
}

/// Bind one dependency module's exports into `registry`, returning the
/// procedure bindings and initializer/unwrapper index to seed the
/// checker with (§4.4).
pub fn bind_dependency_module(
    registry: &mut TypeRegistry,
    api: &DependencyModuleApi,
) -> Result<ModuleBindings, BindError> {
    // Step 2: register every exported type def first, across the whole
    // module, before any procedure binding happens.
    for exported in &api.exported_types {
        if registry.is_registered(&exported.name) {
            return Err(BindError::DuplicateTypeExport(
                api.module_name.clone(),
                exported.name.clone(),
            ));
        }
        registry.register_user_defined(
            exported.name.clone(),
            exported.wrapped_body.clone(),
            exported.type_params.clone(),
        );
    }

    let mut procedure_bindings = HashMap::new();
    let mut initializers = HashMap::new();
    let mut unwrappers = HashMap::new();

    // Step 3: qualified procedure bindings, after all type defs exist.
    for procedure in &api.exported_procedures {
        let qualified = qualified_procedure_name(&api.module_name, &procedure.name);
        if procedure_bindings.contains_key(&qualified) {
            return Err(BindError::DuplicateProcedureExport(
                api.module_name.clone(),
                procedure.name.clone(),
            ));
        }
        procedure_bindings.insert(qualified, procedure.ty.clone());
    }

    // Step 4: initializer/unwrapper index, keyed by the user-defined
    // type identifier they act on.
    for exported in &api.exported_types {
        if let Some(initializer) = &exported.initializer {
            initializers.insert(exported.name.clone(), initializer.clone());
        }
        if let Some(unwrapper) = &exported.unwrapper {
            unwrappers.insert(exported.name.clone(), unwrapper.clone());
        }
    }

    Ok(ModuleBindings {
        procedure_bindings,
        initializers,
        unwrappers,
    })
}

/// Records the current module's own qualified identity under the
/// sentinel key (§4.4 final paragraph), to disambiguate self-defined
/// types from a dependency's during lookup.
pub fn bind_self_module(registry: &mut TypeRegistry, module_name: &str) {
    registry.register_user_defined(
        SELF_MODULE_KEY,
        Type::UserDefined {
            type_name: module_name.to_string(),
            args: Vec::new(),
        },
        Vec::new(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_api() -> DependencyModuleApi {
        DependencyModuleApi {
            module_name: "math".to_string(),
            exported_types: vec![ExportedType {
                name: "Vector".to_string(),
                wrapped_body: Type::list(Type::Float, false),
                type_params: vec![],
                initializer: Some("make_vector".to_string()),
                unwrapper: Some("vector_components".to_string()),
            }],
            exported_procedures: vec![ExportedProcedure {
                name: "sqrt".to_string(),
                ty: Type::function(vec![Type::Float], Type::Float, false, vec![], vec![], vec![]),
            }],
        }
    }

    #[test]
    fn test_bind_registers_types_and_qualified_procedures() {
        let mut registry = TypeRegistry::new();
        let bindings = bind_dependency_module(&mut registry, &sample_api()).unwrap();

        assert!(registry.is_registered("Vector"));
        assert_eq!(
            bindings.procedure_bindings.get("DEP$math$sqrt"),
            Some(&Type::function(
                vec![Type::Float],
                Type::Float,
                false,
                vec![],
                vec![],
                vec![]
            ))
        );
        assert_eq!(
            bindings.initializers.get("Vector"),
            Some(&"make_vector".to_string())
        );
    }

    #[test]
    fn test_duplicate_type_export_is_rejected() {
        let mut registry = TypeRegistry::new();
        let api = sample_api();
        bind_dependency_module(&mut registry, &api).unwrap();
        let err = bind_dependency_module(&mut registry, &api).unwrap_err();
        assert!(matches!(err, BindError::DuplicateTypeExport(_, _)));
    }

    #[test]
    fn test_self_module_registers_under_sentinel_key() {
        let mut registry = TypeRegistry::new();
        bind_self_module(&mut registry, "my_app");
        assert!(registry.is_registered(SELF_MODULE_KEY));
    }
}

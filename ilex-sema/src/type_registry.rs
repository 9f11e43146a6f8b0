//! Process-wide facts about user-defined types (C1).
//!
//! Unlike the fixed builtin-keyword set below, this registry holds
//! per-compilation state (wrapped bodies, declared type-parameter
//! names) and is carried explicitly by `CheckContext` rather than
//! stashed in a static, so a host embedding the checker can run it
//! repeatedly without restarting the process (§5/§9).

use crate::types::Type;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Reserved base-kind keywords a `USER_DEFINED` declaration must not
/// shadow. Fixed for the process lifetime, so a `OnceLock` is the
/// right tool here even though the rest of this module's state isn't.
static BUILTIN_TYPE_NAMES: OnceLock<HashSet<&'static str>> = OnceLock::new();

fn builtin_type_names() -> &'static HashSet<&'static str> {
    BUILTIN_TYPE_NAMES.get_or_init(|| {
        [
            "int", "float", "string", "bool", "module", "nothing", "list", "set", "map", "tuple",
            "struct", "oneof", "future", "provider", "consumer",
        ]
        .into_iter()
        .collect()
    })
}

pub fn is_reserved_type_name(name: &str) -> bool {
    builtin_type_names().contains(name)
}

/// Registered `USER_DEFINED` type bodies and declared generic-param
/// names, keyed by type name. Reset between independent checks via
/// `clear` (§5).
#[derive(Debug, Default)]
pub struct TypeRegistry {
    wrapped_bodies: HashMap<String, Type>,
    type_param_names: HashMap<String, Vec<String>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_user_defined(
        &mut self,
        name: impl Into<String>,
        wrapped_body: Type,
        type_params: Vec<String>,
    ) {
        let name = name.into();
        self.wrapped_bodies.insert(name.clone(), wrapped_body);
        self.type_param_names.insert(name, type_params);
    }

    pub fn wrapped_body(&self, name: &str) -> Option<&Type> {
        self.wrapped_bodies.get(name)
    }

    pub fn type_param_names(&self, name: &str) -> Option<&[String]> {
        self.type_param_names.get(name).map(Vec::as_slice)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.wrapped_bodies.contains_key(name)
    }

    pub fn clear(&mut self) {
        self.wrapped_bodies.clear();
        self.type_param_names.clear();
    }
}

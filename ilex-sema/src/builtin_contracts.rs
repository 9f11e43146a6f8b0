//! Compiler-provided contract implementations for primitive kinds
//! (§4.3.2: contract obligations against builtin types never need a
//! user-written impl block).

/// Whether `type_name` (a base-kind keyword, e.g. `"int"`) has a
/// builtin implementation of `contract_name`.
pub fn has_builtin_contract(type_name: &str, contract_name: &str) -> bool {
    matches!(
        (type_name, contract_name),
        ("int" | "float" | "string" | "bool", "Display")
            | ("int" | "float" | "string" | "bool", "Clone")
            | ("int" | "float" | "string" | "bool", "Eq")
            | ("int" | "float", "Add")
            | ("int" | "float", "Sub")
            | ("int" | "float", "Mul")
            | ("int" | "float", "Div")
            | ("int", "Mod")
    )
}

/// Method name a builtin contract implementation binds to.
pub fn get_builtin_contract_method(contract_name: &str) -> Option<&'static str> {
    match contract_name {
        "Display" => Some("to_string"),
        "Clone" => Some("clone"),
        "Eq" => Some("eq"),
        "Add" => Some("add"),
        "Sub" => Some("sub"),
        "Mul" => Some("mul"),
        "Div" => Some("div"),
        "Mod" => Some("mod"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_implement_display_and_eq() {
        assert!(has_builtin_contract("int", "Display"));
        assert!(has_builtin_contract("bool", "Eq"));
        assert!(!has_builtin_contract("bool", "Add"));
    }

    #[test]
    fn test_user_defined_names_have_no_builtin_contract() {
        assert!(!has_builtin_contract("UserId", "Display"));
    }

    #[test]
    fn test_method_name_lookup() {
        assert_eq!(get_builtin_contract_method("Add"), Some("add"));
        assert_eq!(get_builtin_contract_method("Unknown"), None);
    }
}


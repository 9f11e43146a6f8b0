//! Contract obligation tracking (§4.3.2).
//!
//! A generic procedure's signature can carry a `required_contracts`
//! table: contract name → concrete argument tuples it needs an
//! implementation for once its generic parameters are substituted.
//! This module holds the process-wide set of known implementations
//! and the substitution/verification logic the checker calls at
//! generic call sites.

use crate::types::Type;
use std::collections::HashSet;

/// One concrete obligation: `contract_name<args>` must have an impl.
pub type ContractRequirement = (String, Vec<Type>);

/// Registry of `(contract_name, concrete_args)` pairs known to be
/// implemented, either builtin (seeded at `CheckContext::new`) or
/// user-declared via an impl block.
#[derive(Debug, Default)]
pub struct ContractImpls {
    impls: HashSet<ContractRequirement>,
}

impl ContractImpls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, contract_name: impl Into<String>, args: Vec<Type>) {
        self.impls.insert((contract_name.into(), args));
    }

    pub fn satisfies(&self, requirement: &ContractRequirement) -> bool {
        self.impls.contains(requirement)
    }

    /// Returns the subset of `requirements` with no known implementation.
    pub fn unsatisfied<'a>(
        &self,
        requirements: &'a [ContractRequirement],
    ) -> Vec<&'a ContractRequirement> {
        requirements
            .iter()
            .filter(|req| !self.satisfies(req))
            .collect()
    }

    pub fn clear(&mut self) {
        self.impls.clear();
    }
}

/// Substitute each generic-parameter name with its bound concrete type
/// inside a single required-contract entry's argument list (§4.3.2:
/// "augments the caller's table with the callee's after substituting
/// generics").
pub fn substitute_requirement(
    requirement: &ContractRequirement,
    substitution: &std::collections::HashMap<String, Type>,
) -> ContractRequirement {
    let (name, args) = requirement;
    let substituted = args
        .iter()
        .map(|arg| substitute_type(arg, substitution))
        .collect();
    (name.clone(), substituted)
}

pub fn substitute_type(ty: &Type, substitution: &std::collections::HashMap<String, Type>) -> Type {
    match ty {
        Type::GenericParam { name } => substitution.get(name).cloned().unwrap_or_else(|| ty.clone()),
        Type::List { values, mutable } => Type::List {
            values: Box::new(substitute_type(values, substitution)),
            mutable: *mutable,
        },
        Type::Set { values, mutable } => Type::Set {
            values: Box::new(substitute_type(values, substitution)),
            mutable: *mutable,
        },
        Type::Map {
            keys,
            values,
            mutable,
        } => Type::Map {
            keys: Box::new(substitute_type(keys, substitution)),
            values: Box::new(substitute_type(values, substitution)),
            mutable: *mutable,
        },
        Type::Tuple { values, mutable } => Type::Tuple {
            values: values
                .iter()
                .map(|v| substitute_type(v, substitution))
                .collect(),
            mutable: *mutable,
        },
        Type::UserDefined { type_name, args } => Type::UserDefined {
            type_name: type_name.clone(),
            args: args.iter().map(|a| substitute_type(a, substitution)).collect(),
        },
        Type::Future { value } => Type::Future {
            value: Box::new(substitute_type(value, substitution)),
        },
        other => other.clone(),
    }
}

/// Whether every argument in a requirement is fully resolved (no
/// remaining `GENERIC_PARAM`), i.e. ready for immediate verification
/// rather than propagation to the caller's own table.
pub fn requirement_is_concrete(requirement: &ContractRequirement) -> bool {
    requirement.1.iter().all(type_is_concrete)
}

fn type_is_concrete(ty: &Type) -> bool {
    match ty {
        Type::GenericParam { .. } => false,
        Type::List { values, .. } | Type::Set { values, .. } | Type::Future { value: values } => {
            type_is_concrete(values)
        }
        Type::Map { keys, values, .. } => type_is_concrete(keys) && type_is_concrete(values),
        Type::Tuple { values, .. } => values.iter().all(type_is_concrete),
        Type::UserDefined { args, .. } => args.iter().all(type_is_concrete),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_satisfy() {
        let mut impls = ContractImpls::new();
        impls.register("Display", vec![Type::Int]);
        assert!(impls.satisfies(&("Display".to_string(), vec![Type::Int])));
        assert!(!impls.satisfies(&("Display".to_string(), vec![Type::Bool])));
    }

    #[test]
    fn test_unsatisfied_filters_only_missing() {
        let mut impls = ContractImpls::new();
        impls.register("Display", vec![Type::Int]);
        let requirements = vec![
            ("Display".to_string(), vec![Type::Int]),
            ("Display".to_string(), vec![Type::Bool]),
        ];
        let missing = impls.unsatisfied(&requirements);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].1, vec![Type::Bool]);
    }

    #[test]
    fn test_substitute_requirement_resolves_generic_param() {
        let mut substitution = std::collections::HashMap::new();
        substitution.insert("T".to_string(), Type::Int);
        let requirement = (
            "Display".to_string(),
            vec![Type::GenericParam {
                name: "T".to_string(),
            }],
        );
        let substituted = substitute_requirement(&requirement, &substitution);
        assert_eq!(substituted, ("Display".to_string(), vec![Type::Int]));
    }
}

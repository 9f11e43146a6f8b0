//! The type algebra (C1): §3.1/§4.1.
//!
//! `Type` is a tagged value. Equality and hashing are hand-written
//! rather than derived because procedure-type comparison must ignore
//! the declared-blocking flag, generic-parameter names, and the
//! required-contracts table — only argument/return types participate
//! (§3.1's equality invariant).

use crate::type_registry::TypeRegistry;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Failure modes for the fallible constructors (§3.1 invariants).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConstructError {
    #[error("oneof has a duplicated variant: {0}")]
    DuplicateOneofVariant(String),
    #[error("a future-kinded type cannot be used as a map key or set value")]
    FutureKeyOrValue,
}

/// Shared shape for `FUNCTION`/`PROVIDER`/`CONSUMER`. `arg_types` is
/// empty for `PROVIDER`; `return_type` is `None` for `CONSUMER`.
#[derive(Debug, Clone)]
pub struct ProcedureType {
    pub arg_types: Vec<Type>,
    pub return_type: Option<Box<Type>>,
    pub declared_blocking: bool,
    pub generic_params: Vec<String>,
    pub blocking_generic_over: Vec<usize>,
    pub required_contracts: Vec<(String, Vec<Type>)>,
}

impl ProcedureType {
    /// Equality ignores everything but arg/return types (§3.1).
    fn structurally_eq(&self, other: &Self) -> bool {
        self.arg_types == other.arg_types && self.return_type == other.return_type
    }

    fn structural_hash<H: Hasher>(&self, state: &mut H) {
        self.arg_types.hash(state);
        self.return_type.hash(state);
    }
}

/// A type value (§3.1).
#[derive(Debug, Clone)]
pub enum Type {
    Int,
    Float,
    String,
    Bool,
    Module,
    Nothing,
    /// Runtime-only resolution marker.
    Undecided,
    /// Error-continuation placeholder assigned after a diagnostic.
    Unknowable,
    List { values: Box<Type>, mutable: bool },
    Set { values: Box<Type>, mutable: bool },
    Map { keys: Box<Type>, values: Box<Type>, mutable: bool },
    Tuple { values: Vec<Type>, mutable: bool },
    Struct { fields: Vec<(String, Type)>, mutable: bool },
    /// Variants compare as an unordered set.
    Oneof { variants: Vec<Type> },
    Future { value: Box<Type> },
    UserDefined { type_name: String, args: Vec<Type> },
    Function(ProcedureType),
    Provider(ProcedureType),
    Consumer(ProcedureType),
    GenericParam { name: String },
    Contract { name: String },
    ContractImpl { contract: String, args: Vec<Type> },
}

/// generic-parameter-name → concrete-type substitution, consulted only
/// by `format_diagnostic` (§4.1).
pub type GenericSubstitution = HashMap<String, Type>;

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        use Type::*;
        match (self, other) {
            (Int, Int)
            | (Float, Float)
            | (String, String)
            | (Bool, Bool)
            | (Module, Module)
            | (Nothing, Nothing)
            | (Undecided, Undecided)
            | (Unknowable, Unknowable) => true,
            (
                List {
                    values: v1,
                    mutable: m1,
                },
                List {
                    values: v2,
                    mutable: m2,
                },
            ) => m1 == m2 && v1 == v2,
            (
                Set {
                    values: v1,
                    mutable: m1,
                },
                Set {
                    values: v2,
                    mutable: m2,
                },
            ) => m1 == m2 && v1 == v2,
            (
                Map {
                    keys: k1,
                    values: v1,
                    mutable: m1,
                },
                Map {
                    keys: k2,
                    values: v2,
                    mutable: m2,
                },
            ) => m1 == m2 && k1 == k2 && v1 == v2,
            (
                Tuple {
                    values: v1,
                    mutable: m1,
                },
                Tuple {
                    values: v2,
                    mutable: m2,
                },
            ) => m1 == m2 && v1 == v2,
            (
                Struct {
                    fields: f1,
                    mutable: m1,
                },
                Struct {
                    fields: f2,
                    mutable: m2,
                },
            ) => m1 == m2 && f1 == f2,
            (Oneof { variants: v1 }, Oneof { variants: v2 }) => {
                v1.len() == v2.len() && v1.iter().all(|t| v2.contains(t))
            }
            (Future { value: v1 }, Future { value: v2 }) => v1 == v2,
            (
                UserDefined {
                    type_name: n1,
                    args: a1,
                },
                UserDefined {
                    type_name: n2,
                    args: a2,
                },
            ) => n1 == n2 && a1 == a2,
            (Function(p1), Function(p2)) => p1.structurally_eq(p2),
            (Provider(p1), Provider(p2)) => p1.structurally_eq(p2),
            (Consumer(p1), Consumer(p2)) => p1.structurally_eq(p2),
            (GenericParam { name: n1 }, GenericParam { name: n2 }) => n1 == n2,
            (Contract { name: n1 }, Contract { name: n2 }) => n1 == n2,
            (
                ContractImpl {
                    contract: c1,
                    args: a1,
                },
                ContractImpl {
                    contract: c2,
                    args: a2,
                },
            ) => c1 == c2 && a1 == a2,
            _ => false,
        }
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use Type::*;
        match self {
            Int => 0u8.hash(state),
            Float => 1u8.hash(state),
            String => 2u8.hash(state),
            Bool => 3u8.hash(state),
            Module => 4u8.hash(state),
            Nothing => 5u8.hash(state),
            Undecided => 6u8.hash(state),
            Unknowable => 7u8.hash(state),
            List { values, mutable } => {
                8u8.hash(state);
                mutable.hash(state);
                values.hash(state);
            }
            Set { values, mutable } => {
                9u8.hash(state);
                mutable.hash(state);
                values.hash(state);
            }
            Map {
                keys,
                values,
                mutable,
            } => {
                10u8.hash(state);
                mutable.hash(state);
                keys.hash(state);
                values.hash(state);
            }
            Tuple { values, mutable } => {
                11u8.hash(state);
                mutable.hash(state);
                values.hash(state);
            }
            Struct { fields, mutable } => {
                12u8.hash(state);
                mutable.hash(state);
                fields.hash(state);
            }
            Oneof { variants } => {
                13u8.hash(state);
                // Order-independent: XOR-combine each variant's own hash.
                let mut acc: u64 = 0;
                for variant in variants {
                    let mut hasher = std::collections::hash_map::DefaultHasher::new();
                    variant.hash(&mut hasher);
                    acc ^= hasher.finish();
                }
                acc.hash(state);
            }
            Future { value } => {
                14u8.hash(state);
                value.hash(state);
            }
            UserDefined { type_name, args } => {
                15u8.hash(state);
                type_name.hash(state);
                args.hash(state);
            }
            Function(p) => {
                16u8.hash(state);
                p.structural_hash(state);
            }
            Provider(p) => {
                17u8.hash(state);
                p.structural_hash(state);
            }
            Consumer(p) => {
                18u8.hash(state);
                p.structural_hash(state);
            }
            GenericParam { name } => {
                19u8.hash(state);
                name.hash(state);
            }
            Contract { name } => {
                20u8.hash(state);
                name.hash(state);
            }
            ContractImpl { contract, args } => {
                21u8.hash(state);
                contract.hash(state);
                args.hash(state);
            }
        }
    }
}

impl Type {
    pub fn list(values: Type, mutable: bool) -> Type {
        Type::List {
            values: Box::new(values),
            mutable,
        }
    }

    pub fn set(values: Type, mutable: bool) -> Result<Type, ConstructError> {
        if matches!(values, Type::Future { .. }) {
            return Err(ConstructError::FutureKeyOrValue);
        }
        Ok(Type::Set {
            values: Box::new(values),
            mutable,
        })
    }

    pub fn map(keys: Type, values: Type, mutable: bool) -> Result<Type, ConstructError> {
        if matches!(keys, Type::Future { .. }) {
            return Err(ConstructError::FutureKeyOrValue);
        }
        Ok(Type::Map {
            keys: Box::new(keys),
            values: Box::new(values),
            mutable,
        })
    }

    pub fn tuple(values: Vec<Type>, mutable: bool) -> Type {
        Type::Tuple { values, mutable }
    }

    pub fn struct_type(fields: Vec<(String, Type)>, mutable: bool) -> Type {
        Type::Struct { fields, mutable }
    }

    pub fn oneof(variants: Vec<Type>) -> Result<Type, ConstructError> {
        for i in 0..variants.len() {
            for j in (i + 1)..variants.len() {
                if variants[i] == variants[j] {
                    return Err(ConstructError::DuplicateOneofVariant(
                        variants[i].format_canonical(),
                    ));
                }
            }
        }
        Ok(Type::Oneof { variants })
    }

    pub fn future(value: Type) -> Type {
        Type::Future {
            value: Box::new(value),
        }
    }

    pub fn user_defined(type_name: impl Into<String>, args: Vec<Type>) -> Type {
        Type::UserDefined {
            type_name: type_name.into(),
            args,
        }
    }

    pub fn function(
        arg_types: Vec<Type>,
        return_type: Type,
        declared_blocking: bool,
        generic_params: Vec<String>,
        blocking_generic_over: Vec<usize>,
        required_contracts: Vec<(String, Vec<Type>)>,
    ) -> Type {
        Type::Function(ProcedureType {
            arg_types,
            return_type: Some(Box::new(return_type)),
            declared_blocking,
            generic_params,
            blocking_generic_over,
            required_contracts,
        })
    }

    pub fn provider(
        return_type: Type,
        declared_blocking: bool,
        generic_params: Vec<String>,
        blocking_generic_over: Vec<usize>,
        required_contracts: Vec<(String, Vec<Type>)>,
    ) -> Type {
        Type::Provider(ProcedureType {
            arg_types: Vec::new(),
            return_type: Some(Box::new(return_type)),
            declared_blocking,
            generic_params,
            blocking_generic_over,
            required_contracts,
        })
    }

    pub fn consumer(
        arg_types: Vec<Type>,
        declared_blocking: bool,
        generic_params: Vec<String>,
        blocking_generic_over: Vec<usize>,
        required_contracts: Vec<(String, Vec<Type>)>,
    ) -> Type {
        Type::Consumer(ProcedureType {
            arg_types,
            return_type: None,
            declared_blocking,
            generic_params,
            blocking_generic_over,
            required_contracts,
        })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// Inherent mutability flag; `false` for every kind but the five
    /// container kinds (§4.1).
    pub fn is_mutable(&self) -> bool {
        match self {
            Type::List { mutable, .. }
            | Type::Set { mutable, .. }
            | Type::Map { mutable, .. }
            | Type::Tuple { mutable, .. }
            | Type::Struct { mutable, .. } => *mutable,
            _ => false,
        }
    }

    /// Flip the outermost mutability flag on a container kind, leaving
    /// contents untouched. A no-op on non-container kinds.
    pub fn to_shallowly_mutable(&self) -> Type {
        match self {
            Type::List { values, .. } => Type::List {
                values: values.clone(),
                mutable: true,
            },
            Type::Set { values, .. } => Type::Set {
                values: values.clone(),
                mutable: true,
            },
            Type::Map { keys, values, .. } => Type::Map {
                keys: keys.clone(),
                values: values.clone(),
                mutable: true,
            },
            Type::Tuple { values, .. } => Type::Tuple {
                values: values.clone(),
                mutable: true,
            },
            Type::Struct { fields, .. } => Type::Struct {
                fields: fields.clone(),
                mutable: true,
            },
            other => other.clone(),
        }
    }

    /// §3.1: deeply immutable iff no `mutable=true` appears anywhere in
    /// the transitive structure and every wrapped user-defined body is
    /// itself deeply immutable.
    pub fn is_deeply_immutable(&self, registry: &TypeRegistry) -> bool {
        match self {
            Type::Int
            | Type::Float
            | Type::String
            | Type::Bool
            | Type::Module
            | Type::Nothing
            | Type::Undecided
            | Type::Unknowable
            | Type::GenericParam { .. }
            | Type::Contract { .. }
            | Type::ContractImpl { .. }
            | Type::Function(_)
            | Type::Provider(_)
            | Type::Consumer(_) => true,
            Type::List { values, mutable } | Type::Set { values, mutable } => {
                !mutable && values.is_deeply_immutable(registry)
            }
            Type::Map {
                keys,
                values,
                mutable,
            } => !mutable && keys.is_deeply_immutable(registry) && values.is_deeply_immutable(registry),
            Type::Tuple { values, mutable } => {
                !mutable && values.iter().all(|v| v.is_deeply_immutable(registry))
            }
            Type::Struct { fields, mutable } => {
                !mutable && fields.iter().all(|(_, t)| t.is_deeply_immutable(registry))
            }
            Type::Oneof { variants } => variants.iter().all(|v| v.is_deeply_immutable(registry)),
            Type::Future { value } => value.is_deeply_immutable(registry),
            Type::UserDefined { type_name, .. } => registry
                .wrapped_body(type_name)
                .map(|body| body.is_deeply_immutable(registry))
                .unwrap_or(false),
        }
    }

    /// Rebuild a deeply-immutable variant of this type, or `None` if no
    /// such variant exists (§4.1).
    pub fn to_deeply_immutable(&self, registry: &TypeRegistry) -> Option<Type> {
        match self {
            Type::Int
            | Type::Float
            | Type::String
            | Type::Bool
            | Type::Module
            | Type::Nothing
            | Type::Undecided
            | Type::Unknowable
            | Type::GenericParam { .. }
            | Type::Contract { .. }
            | Type::ContractImpl { .. }
            | Type::Function(_)
            | Type::Provider(_)
            | Type::Consumer(_) => Some(self.clone()),
            Type::List { values, .. } => Some(Type::List {
                values: Box::new(values.to_deeply_immutable(registry)?),
                mutable: false,
            }),
            Type::Set { values, .. } => Some(Type::Set {
                values: Box::new(values.to_deeply_immutable(registry)?),
                mutable: false,
            }),
            Type::Map { keys, values, .. } => Some(Type::Map {
                keys: Box::new(keys.to_deeply_immutable(registry)?),
                values: Box::new(values.to_deeply_immutable(registry)?),
                mutable: false,
            }),
            Type::Tuple { values, .. } => {
                let converted: Option<Vec<Type>> = values
                    .iter()
                    .map(|v| v.to_deeply_immutable(registry))
                    .collect();
                Some(Type::Tuple {
                    values: converted?,
                    mutable: false,
                })
            }
            Type::Struct { fields, .. } => {
                let converted: Option<Vec<(String, Type)>> = fields
                    .iter()
                    .map(|(name, ty)| ty.to_deeply_immutable(registry).map(|t| (name.clone(), t)))
                    .collect();
                Some(Type::Struct {
                    fields: converted?,
                    mutable: false,
                })
            }
            Type::Oneof { variants } => {
                let converted: Option<Vec<Type>> = variants
                    .iter()
                    .map(|v| v.to_deeply_immutable(registry))
                    .collect();
                Some(Type::Oneof {
                    variants: converted?,
                })
            }
            Type::Future { value } => Some(Type::Future {
                value: Box::new(value.to_deeply_immutable(registry)?),
            }),
            Type::UserDefined { type_name, args } => {
                if self.is_deeply_immutable(registry) {
                    Some(Type::UserDefined {
                        type_name: type_name.clone(),
                        args: args.clone(),
                    })
                } else {
                    None
                }
            }
        }
    }

    /// Deterministic, stable-across-runs canonical string (§3.1/§4.1).
    pub fn format_canonical(&self) -> String {
        self.format_inner(None)
    }

    /// Canonical string, but `GENERIC_PARAM`s resolve through `subst`
    /// when present, for better error text (§4.1).
    pub fn format_diagnostic(&self, subst: Option<&GenericSubstitution>) -> String {
        self.format_inner(subst)
    }

    fn format_inner(&self, subst: Option<&GenericSubstitution>) -> String {
        match self {
            Type::Int => "int".to_string(),
            Type::Float => "float".to_string(),
            Type::String => "string".to_string(),
            Type::Bool => "bool".to_string(),
            Type::Module => "module".to_string(),
            Type::Nothing => "nothing".to_string(),
            Type::Undecided => "undecided".to_string(),
            Type::Unknowable => "unknowable".to_string(),
            Type::List { values, mutable } => format!(
                "{}list<{}>",
                mut_prefix(*mutable),
                values.format_inner(subst)
            ),
            Type::Set { values, mutable } => format!(
                "{}set<{}>",
                mut_prefix(*mutable),
                values.format_inner(subst)
            ),
            Type::Map {
                keys,
                values,
                mutable,
            } => format!(
                "{}map<{}, {}>",
                mut_prefix(*mutable),
                keys.format_inner(subst),
                values.format_inner(subst)
            ),
            Type::Tuple { values, mutable } => format!(
                "{}({})",
                mut_prefix(*mutable),
                join_formatted(values, subst)
            ),
            Type::Struct { fields, mutable } => format!(
                "{}struct{{{}}}",
                mut_prefix(*mutable),
                fields
                    .iter()
                    .map(|(name, ty)| format!("{}: {}", name, ty.format_inner(subst)))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Type::Oneof { variants } => {
                let mut strings: Vec<String> =
                    variants.iter().map(|v| v.format_inner(subst)).collect();
                strings.sort();
                strings.join(" | ")
            }
            Type::Future { value } => format!("future<{}>", value.format_inner(subst)),
            Type::UserDefined { type_name, args } => {
                if args.is_empty() {
                    type_name.clone()
                } else {
                    format!("{}<{}>", type_name, join_formatted(args, subst))
                }
            }
            Type::Function(p) => format!(
                "{}({}) -> {}",
                blocking_prefix(p),
                join_formatted(&p.arg_types, subst),
                p.return_type
                    .as_ref()
                    .map(|t| t.format_inner(subst))
                    .unwrap_or_else(|| "nothing".to_string())
            ),
            Type::Provider(p) => format!(
                "{}provider<{}>",
                blocking_prefix(p),
                p.return_type
                    .as_ref()
                    .map(|t| t.format_inner(subst))
                    .unwrap_or_else(|| "nothing".to_string())
            ),
            Type::Consumer(p) => format!(
                "{}consumer<{}>",
                blocking_prefix(p),
                join_formatted(&p.arg_types, subst)
            ),
            Type::GenericParam { name } => subst
                .and_then(|map| map.get(name))
                .map(|concrete| concrete.format_inner(subst))
                .unwrap_or_else(|| name.clone()),
            Type::Contract { name } => format!("contract {}", name),
            Type::ContractImpl { contract, args } => {
                format!("impl {}<{}>", contract, join_formatted(args, subst))
            }
        }
    }
}

fn mut_prefix(mutable: bool) -> &'static str {
    if mutable {
        "mut "
    } else {
        ""
    }
}

fn join_formatted(types: &[Type], subst: Option<&GenericSubstitution>) -> String {
    types
        .iter()
        .map(|t| t.format_inner(subst))
        .collect::<Vec<_>>()
        .join(", ")
}

fn blocking_prefix(p: &ProcedureType) -> String {
    let mut out = String::new();
    if p.declared_blocking {
        out.push_str("blocking ");
    } else if !p.blocking_generic_over.is_empty() {
        out.push_str("blocking? ");
    }
    if !p.blocking_generic_over.is_empty() {
        let indices = p
            .blocking_generic_over
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("|");
        out.push_str(&format!("blocking:{} ", indices));
    }
    out
}

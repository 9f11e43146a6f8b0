//! Plain-data AST consumed by the semantic checker.
//!
//! This crate carries no parsing logic; it is the external-input
//! contract the checker (`ilex-sema`) walks. Node types are grouped the
//! way a parser would naturally build them: items at the top, then
//! statements, then expressions, then the unresolved type syntax
//! (`TypeExpr`) a type-checker turns into concrete `Type` values.

use ilex_diagnostics::Span;
use serde::{Deserialize, Serialize};

/// Root of the parsed program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub module_name: String,
    pub items: Vec<Item>,
}

/// Top-level items a module can declare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Procedure(ProcedureDef),
    Struct(StructDef),
    Oneof(OneofDef),
    UserDefined(UserDefinedDef),
    Static(StaticDef),
}

/// One of the three procedure arities (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcedureKind {
    Function,
    Provider,
    Consumer,
}

/// Procedure parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
}

/// Procedure definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDef {
    pub name: String,
    pub kind: ProcedureKind,
    pub generic_params: Vec<String>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub declared_blocking: bool,
    pub blocking_generic_over: Vec<usize>,
    pub required_contracts: Vec<(String, Vec<TypeExpr>)>,
    pub body: Block,
    #[serde(skip)]
    pub span: Option<Span>,
}

/// Struct definition. `immutable` is the declared top-level mutability
/// qualifier; §4.3 requires every field's type be deeply immutable when
/// this is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    pub generic_params: Vec<String>,
    pub immutable: bool,
    pub fields: Vec<FieldDef>,
    #[serde(skip)]
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeExpr,
    #[serde(skip)]
    pub span: Option<Span>,
}

/// Discriminated union ("oneof") definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneofDef {
    pub name: String,
    pub variants: Vec<TypeExpr>,
    #[serde(skip)]
    pub span: Option<Span>,
}

/// Nominal wrapper-type definition. `wrapped_type` is the body the
/// nominal name stands for; `generic_params` are its declared type
/// parameters (§3.1 "type-param-name registry").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDefinedDef {
    pub name: String,
    pub generic_params: Vec<String>,
    pub wrapped_type: TypeExpr,
    #[serde(skip)]
    pub span: Option<Span>,
}

/// Module-level static value. Must be deeply immutable (§4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticDef {
    pub name: String,
    pub declared_type: Option<TypeExpr>,
    pub value: Expr,
    #[serde(skip)]
    pub span: Option<Span>,
}

/// Block of statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

/// Statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Declaration(DeclarationStmt),
    /// `name = value;` — reassignment of an already-declared `var` binding.
    Assignment {
        name: String,
        value: Expr,
        #[serde(skip)]
        span: Option<Span>,
    },
    If(IfStmt),
    Return {
        value: Option<Expr>,
        #[serde(skip)]
        span: Option<Span>,
    },
    Expr(Expr),
}

/// `x := expr;` or `var x: T = expr;` style declaration. `declared_type`
/// is `Some` only for the annotated form (§4.3 "with annotation, assert
/// … exactly; without, infer"). `initializer` is `None` for `var x: T;`,
/// which declares `x` without initializing it — a later `Assignment`
/// is required before any read is well-defined (§4.2/S4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationStmt {
    pub name: String,
    pub declared_type: Option<TypeExpr>,
    pub initializer: Option<Expr>,
    pub mutable: bool,
    #[serde(skip)]
    pub span: Option<Span>,
}

/// `if (cond) { .. } else { .. }`. `else_block: None` means the branch
/// group does not cover every path, so branch-inspection (§4.2.2) must
/// not be enabled for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_block: Block,
    pub else_block: Option<Block>,
    #[serde(skip)]
    pub span: Option<Span>,
}

/// Binary operators (§4.3: numeric, division, equality).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
}

impl BinaryOp {
    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::NotEq)
    }

    pub fn is_division(self) -> bool {
        matches!(self, BinaryOp::Div)
    }
}

/// Lambda (closure) literal. Its scope crosses a `LAMBDA` boundary
/// (§4.2.1); the checker materializes `captured_names` on the resulting
/// binding, it is not stored in the AST itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaExpr {
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
    #[serde(skip)]
    pub span: Option<Span>,
}

/// Expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),

    /// Identifier reference.
    Reference {
        name: String,
        #[serde(skip)]
        span: Option<Span>,
    },

    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        #[serde(skip)]
        span: Option<Span>,
    },

    Negate {
        operand: Box<Expr>,
        #[serde(skip)]
        span: Option<Span>,
    },

    Call {
        callee: Box<Expr>,
        generic_args: Vec<TypeExpr>,
        args: Vec<Expr>,
        #[serde(skip)]
        span: Option<Span>,
    },

    Lambda(LambdaExpr),

    StructLiteral {
        type_name: String,
        fields: Vec<(String, Expr)>,
        #[serde(skip)]
        span: Option<Span>,
    },

    /// Reference into a bound dependency module, e.g. `math.sqrt`.
    ModuleMember {
        module: String,
        member: String,
        #[serde(skip)]
        span: Option<Span>,
    },
}

impl Expr {
    pub fn is_reference(&self) -> bool {
        matches!(self, Expr::Reference { .. })
    }

    /// Best-effort span for diagnostics; `None` for literals, which the
    /// checker attributes to the enclosing statement's span instead.
    pub fn span(&self) -> Option<&Span> {
        match self {
            Expr::Reference { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Negate { span, .. }
            | Expr::Call { span, .. }
            | Expr::StructLiteral { span, .. }
            | Expr::ModuleMember { span, .. } => span.as_ref(),
            Expr::Lambda(lambda) => lambda.span.as_ref(),
            _ => None,
        }
    }
}

/// Unresolved type syntax as written by the programmer; the checker
/// resolves this into a concrete `ilex_sema::types::Type`. Mirrors the
/// base-kind shape of §3.1 one-to-one, minus the check-time-only
/// metadata (effective blocking, contract tables) that only exists on
/// resolved types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    Int,
    Float,
    String,
    Bool,
    Module,
    Nothing,
    List {
        mutable: bool,
        values: Box<TypeExpr>,
    },
    Set {
        mutable: bool,
        values: Box<TypeExpr>,
    },
    Map {
        mutable: bool,
        keys: Box<TypeExpr>,
        values: Box<TypeExpr>,
    },
    Tuple {
        mutable: bool,
        elements: Vec<TypeExpr>,
    },
    Struct {
        mutable: bool,
        fields: Vec<(String, TypeExpr)>,
    },
    Oneof(Vec<TypeExpr>),
    Future(Box<TypeExpr>),
    UserDefined {
        name: String,
        args: Vec<TypeExpr>,
    },
    Function {
        args: Vec<TypeExpr>,
        return_type: Box<TypeExpr>,
        blocking: bool,
    },
    Provider {
        return_type: Box<TypeExpr>,
        blocking: bool,
    },
    Consumer {
        args: Vec<TypeExpr>,
        blocking: bool,
    },
    GenericParam(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_op_classification() {
        assert!(BinaryOp::Eq.is_equality());
        assert!(!BinaryOp::Add.is_equality());
        assert!(BinaryOp::Div.is_division());
    }

    #[test]
    fn test_expr_is_reference() {
        let r = Expr::Reference {
            name: "x".to_string(),
            span: None,
        };
        assert!(r.is_reference());
        assert!(!Expr::IntLiteral(1).is_reference());
    }

    #[test]
    fn test_program_serde_round_trip() {
        let program = Program {
            module_name: "main".to_string(),
            items: vec![Item::Static(StaticDef {
                name: "x".to_string(),
                declared_type: Some(TypeExpr::Int),
                value: Expr::IntLiteral(1),
                span: None,
            })],
        };

        let json = serde_json::to_string(&program).unwrap();
        let round_tripped: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(program, round_tripped);
    }
}

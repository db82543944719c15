//! Resolved contract syntax tree consumed by the code generator.
//!
//! The tree is produced by an upstream parser and type checker: every
//! identifier already points at its declaration and every expression
//! carries its static type. Declarations live in arenas on [`SourceUnit`]
//! and are referenced by index, so the tree has no back-pointers.

mod builder;
pub mod visit;

pub use builder::SourceUnitBuilder;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node, reported back in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

macro_rules! arena_ref {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            pub struct $name(pub u32);

            impl $name {
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

arena_ref!(ContractRef, FunctionRef, ModifierRef, VariableRef, StructRef);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceUnit {
    pub contracts: Vec<ContractDefinition>,
    pub functions: Vec<FunctionDefinition>,
    pub modifiers: Vec<ModifierDefinition>,
    pub variables: Vec<VariableDeclaration>,
    pub structs: Vec<StructDefinition>,
}

impl SourceUnit {
    pub fn contract(&self, r: ContractRef) -> &ContractDefinition {
        &self.contracts[r.index()]
    }

    pub fn function(&self, r: FunctionRef) -> &FunctionDefinition {
        &self.functions[r.index()]
    }

    pub fn modifier(&self, r: ModifierRef) -> &ModifierDefinition {
        &self.modifiers[r.index()]
    }

    pub fn variable(&self, r: VariableRef) -> &VariableDeclaration {
        &self.variables[r.index()]
    }

    pub fn struct_def(&self, r: StructRef) -> &StructDefinition {
        &self.structs[r.index()]
    }

    pub fn find_contract(&self, name: &str) -> Option<ContractRef> {
        self.contracts
            .iter()
            .position(|c| c.name == name)
            .map(|i| ContractRef(i as u32))
    }

    pub fn contract_refs(&self) -> impl Iterator<Item = ContractRef> {
        (0..self.contracts.len() as u32).map(ContractRef)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractKind {
    Contract,
    Interface,
    Library,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDefinition {
    pub id: NodeId,
    pub name: String,
    pub kind: ContractKind,
    /// Direct bases in declaration order, i.e. most base-like first.
    pub bases: Vec<ContractRef>,
    pub state_variables: Vec<VariableRef>,
    pub functions: Vec<FunctionRef>,
    pub modifiers: Vec<ModifierRef>,
    pub structs: Vec<StructRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionKind {
    Function,
    Constructor,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    External,
    Internal,
    Private,
}

impl Visibility {
    pub fn is_externally_callable(self) -> bool {
        matches!(self, Visibility::Public | Visibility::External)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateMutability {
    Pure,
    View,
    NonPayable,
    Payable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub id: NodeId,
    pub name: String,
    pub contract: ContractRef,
    pub kind: FunctionKind,
    pub visibility: Visibility,
    pub mutability: StateMutability,
    pub parameters: Vec<VariableRef>,
    pub returns: Vec<VariableRef>,
    /// Modifier invocations, outermost first.
    pub modifiers: Vec<ModifierInvocation>,
    /// `None` for declarations without an implementation.
    pub body: Option<Block>,
}

impl FunctionDefinition {
    pub fn is_implemented(&self) -> bool {
        self.body.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierInvocation {
    pub id: NodeId,
    pub name: String,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierDefinition {
    pub id: NodeId,
    pub name: String,
    pub contract: ContractRef,
    pub parameters: Vec<VariableRef>,
    pub body: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableScope {
    State(ContractRef),
    Local,
    Parameter,
    Return,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub id: NodeId,
    pub name: String,
    pub ty: TypeName,
    pub scope: VariableScope,
    pub visibility: Visibility,
    pub is_constant: bool,
    pub value: Option<Expression>,
}

impl VariableDeclaration {
    pub fn is_state_variable(&self) -> bool {
        matches!(self.scope, VariableScope::State(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDefinition {
    pub id: NodeId,
    pub name: String,
    pub contract: ContractRef,
    pub members: Vec<StructMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructMember {
    pub name: String,
    pub ty: TypeName,
}

/// Where a reference-typed value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataLocation {
    /// The storage object itself, e.g. a state variable.
    Storage,
    /// A local alias to some storage object.
    StoragePointer,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeName {
    Bool,
    Uint(u16),
    Int(u16),
    Address,
    FixedBytes(u8),
    Array {
        base: Box<TypeName>,
        length: Option<u64>,
        location: DataLocation,
    },
    Mapping {
        key: Box<TypeName>,
        value: Box<TypeName>,
    },
    Struct {
        id: StructRef,
        location: DataLocation,
    },
    Contract(ContractRef),
    Tuple(Vec<TypeName>),
    /// Type of expressions that produce no value: statements, callees,
    /// magic bases such as `msg`.
    Void,
}

impl TypeName {
    pub fn uint256() -> Self {
        TypeName::Uint(256)
    }

    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            TypeName::Bool
                | TypeName::Uint(_)
                | TypeName::Int(_)
                | TypeName::Address
                | TypeName::FixedBytes(_)
                | TypeName::Contract(_)
        )
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            TypeName::Array { .. } | TypeName::Mapping { .. } | TypeName::Struct { .. }
        )
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, TypeName::Int(_))
    }

    /// Data location of a reference type. Mappings only exist in storage.
    pub fn location(&self) -> Option<DataLocation> {
        match self {
            TypeName::Array { location, .. } | TypeName::Struct { location, .. } => Some(*location),
            TypeName::Mapping { .. } => Some(DataLocation::Storage),
            _ => None,
        }
    }

    pub fn is_in_storage(&self) -> bool {
        matches!(
            self.location(),
            Some(DataLocation::Storage | DataLocation::StoragePointer)
        )
    }

    pub fn is_in_memory(&self) -> bool {
        self.location() == Some(DataLocation::Memory)
    }

    /// The same type relocated; nested reference types follow along.
    pub fn with_location(&self, location: DataLocation) -> TypeName {
        match self {
            TypeName::Array { base, length, .. } => TypeName::Array {
                base: Box::new(base.with_location(location)),
                length: *length,
                location,
            },
            TypeName::Struct { id, .. } => TypeName::Struct { id: *id, location },
            other => other.clone(),
        }
    }

    /// Number of values an expression of this type evaluates to.
    pub fn arity(&self) -> usize {
        match self {
            TypeName::Tuple(items) => items.len(),
            TypeName::Void => 0,
            _ => 1,
        }
    }

    pub fn components(&self) -> Vec<TypeName> {
        match self {
            TypeName::Tuple(items) => items.clone(),
            TypeName::Void => Vec::new(),
            other => vec![other.clone()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: NodeId,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub id: NodeId,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StatementKind {
    Block(Block),
    /// `T a = e;` or `var (a, , c) = e;`. Empty slots are `None`.
    VariableDeclaration {
        declarations: Vec<Option<VariableRef>>,
        initial_value: Option<Expression>,
    },
    Expression(Expression),
    If {
        condition: Expression,
        true_body: Box<Statement>,
        false_body: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
        is_do_while: bool,
    },
    For {
        init: Option<Box<Statement>>,
        condition: Option<Expression>,
        update: Option<Expression>,
        body: Box<Statement>,
    },
    Continue,
    Break,
    Return(Option<Expression>),
    Throw,
    /// The `_` inside a modifier body.
    Placeholder,
    InlineAssembly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    pub id: NodeId,
    pub kind: ExpressionKind,
    pub ty: TypeName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExpressionKind {
    Literal(Literal),
    Identifier {
        name: String,
        declaration: Declaration,
    },
    Unary {
        op: UnaryOperator,
        prefix: bool,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `op` is set for compound assignments such as `+=`.
    Assignment {
        op: Option<BinaryOperator>,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conditional {
        condition: Box<Expression>,
        true_expr: Box<Expression>,
        false_expr: Box<Expression>,
    },
    Tuple(Vec<Option<Expression>>),
    FunctionCall {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        kind: CallKind,
        options: CallOptions,
    },
    /// Only valid as the callee of a [`ExpressionKind::FunctionCall`].
    New(NewTarget),
    /// An elementary type used as a conversion callee, e.g. `uint8` in
    /// `uint8(x)`. The target type is the expression's `ty`.
    TypeExpression,
    MemberAccess {
        expression: Box<Expression>,
        member: String,
        referenced: Option<Declaration>,
    },
    IndexAccess {
        base: Box<Expression>,
        index: Option<Box<Expression>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    Number(BigInt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Declaration {
    Variable(VariableRef),
    Function(FunctionRef),
    Modifier(ModifierRef),
    Contract(ContractRef),
    Struct(StructRef),
    Magic(MagicVariable),
    Builtin(BuiltinFunction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MagicVariable {
    Msg,
    Block,
    Tx,
    This,
    Super,
    Now,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuiltinFunction {
    Require,
    Assert,
    Revert,
    Keccak256,
    AddMod,
    MulMod,
    BlockHash,
    SelfDestruct,
    GasLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    Regular,
    TypeConversion,
    StructConstructor,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallOptions {
    pub value: Option<Box<Expression>>,
    pub gas: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewTarget {
    Contract(ContractRef),
    /// A memory array; the single call argument is its length.
    Array(TypeName),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    BitNot,
    Neg,
    Inc,
    Dec,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinaryOperator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::Lt
                | BinaryOperator::Gt
                | BinaryOperator::Le
                | BinaryOperator::Ge
        )
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

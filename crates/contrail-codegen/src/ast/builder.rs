use super::*;

/// Incremental constructor for [`SourceUnit`] trees.
///
/// Front ends and tests use it to build resolved trees without wiring
/// node ids and arena indices by hand. Expression helpers derive the
/// static type where the tree already determines it.
#[derive(Debug, Default)]
pub struct SourceUnitBuilder {
    unit: SourceUnit,
    next_id: u32,
}

impl SourceUnitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }

    pub fn finish(self) -> SourceUnit {
        self.unit
    }

    fn id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    // Declarations

    pub fn contract(&mut self, name: &str, bases: &[ContractRef]) -> ContractRef {
        self.contract_of_kind(name, ContractKind::Contract, bases)
    }

    pub fn contract_of_kind(
        &mut self,
        name: &str,
        kind: ContractKind,
        bases: &[ContractRef],
    ) -> ContractRef {
        let id = self.id();
        self.unit.contracts.push(ContractDefinition {
            id,
            name: name.to_string(),
            kind,
            bases: bases.to_vec(),
            state_variables: Vec::new(),
            functions: Vec::new(),
            modifiers: Vec::new(),
            structs: Vec::new(),
        });
        ContractRef(self.unit.contracts.len() as u32 - 1)
    }

    fn push_variable(
        &mut self,
        name: &str,
        ty: TypeName,
        scope: VariableScope,
        visibility: Visibility,
        is_constant: bool,
        value: Option<Expression>,
    ) -> VariableRef {
        let id = self.id();
        self.unit.variables.push(VariableDeclaration {
            id,
            name: name.to_string(),
            ty,
            scope,
            visibility,
            is_constant,
            value,
        });
        VariableRef(self.unit.variables.len() as u32 - 1)
    }

    pub fn state_variable(
        &mut self,
        contract: ContractRef,
        name: &str,
        ty: TypeName,
        visibility: Visibility,
    ) -> VariableRef {
        self.state_variable_with_value(contract, name, ty, visibility, None)
    }

    pub fn state_variable_with_value(
        &mut self,
        contract: ContractRef,
        name: &str,
        ty: TypeName,
        visibility: Visibility,
        value: Option<Expression>,
    ) -> VariableRef {
        let ty = ty.with_location(DataLocation::Storage);
        let var = self.push_variable(
            name,
            ty,
            VariableScope::State(contract),
            visibility,
            false,
            value,
        );
        self.unit.contracts[contract.index()].state_variables.push(var);
        var
    }

    pub fn constant(
        &mut self,
        contract: ContractRef,
        name: &str,
        ty: TypeName,
        visibility: Visibility,
        value: Expression,
    ) -> VariableRef {
        let var = self.push_variable(
            name,
            ty,
            VariableScope::State(contract),
            visibility,
            true,
            Some(value),
        );
        self.unit.contracts[contract.index()].state_variables.push(var);
        var
    }

    pub fn struct_type(
        &mut self,
        contract: ContractRef,
        name: &str,
        members: Vec<(&str, TypeName)>,
    ) -> StructRef {
        let id = self.id();
        self.unit.structs.push(StructDefinition {
            id,
            name: name.to_string(),
            contract,
            members: members
                .into_iter()
                .map(|(name, ty)| StructMember {
                    name: name.to_string(),
                    ty,
                })
                .collect(),
        });
        let r = StructRef(self.unit.structs.len() as u32 - 1);
        self.unit.contracts[contract.index()].structs.push(r);
        r
    }

    fn push_function(
        &mut self,
        contract: ContractRef,
        name: &str,
        kind: FunctionKind,
        visibility: Visibility,
        mutability: StateMutability,
    ) -> FunctionRef {
        let id = self.id();
        self.unit.functions.push(FunctionDefinition {
            id,
            name: name.to_string(),
            contract,
            kind,
            visibility,
            mutability,
            parameters: Vec::new(),
            returns: Vec::new(),
            modifiers: Vec::new(),
            body: None,
        });
        let r = FunctionRef(self.unit.functions.len() as u32 - 1);
        self.unit.contracts[contract.index()].functions.push(r);
        r
    }

    pub fn function(
        &mut self,
        contract: ContractRef,
        name: &str,
        visibility: Visibility,
        mutability: StateMutability,
    ) -> FunctionRef {
        self.push_function(contract, name, FunctionKind::Function, visibility, mutability)
    }

    pub fn constructor(&mut self, contract: ContractRef, mutability: StateMutability) -> FunctionRef {
        self.push_function(
            contract,
            "",
            FunctionKind::Constructor,
            Visibility::Public,
            mutability,
        )
    }

    pub fn fallback(&mut self, contract: ContractRef, mutability: StateMutability) -> FunctionRef {
        self.push_function(
            contract,
            "",
            FunctionKind::Fallback,
            Visibility::External,
            mutability,
        )
    }

    pub fn parameter(&mut self, function: FunctionRef, name: &str, ty: TypeName) -> VariableRef {
        let var = self.push_variable(
            name,
            ty,
            VariableScope::Parameter,
            Visibility::Internal,
            false,
            None,
        );
        self.unit.functions[function.index()].parameters.push(var);
        var
    }

    pub fn return_parameter(
        &mut self,
        function: FunctionRef,
        name: &str,
        ty: TypeName,
    ) -> VariableRef {
        let var = self.push_variable(
            name,
            ty,
            VariableScope::Return,
            Visibility::Internal,
            false,
            None,
        );
        self.unit.functions[function.index()].returns.push(var);
        var
    }

    pub fn set_body(&mut self, function: FunctionRef, statements: Vec<Statement>) {
        let body = self.block(statements);
        self.unit.functions[function.index()].body = Some(body);
    }

    pub fn add_modifier(&mut self, function: FunctionRef, name: &str, arguments: Vec<Expression>) {
        let id = self.id();
        self.unit.functions[function.index()]
            .modifiers
            .push(ModifierInvocation {
                id,
                name: name.to_string(),
                arguments,
            });
    }

    pub fn modifier(&mut self, contract: ContractRef, name: &str) -> ModifierRef {
        let id = self.id();
        let body = self.block(Vec::new());
        self.unit.modifiers.push(ModifierDefinition {
            id,
            name: name.to_string(),
            contract,
            parameters: Vec::new(),
            body,
        });
        let r = ModifierRef(self.unit.modifiers.len() as u32 - 1);
        self.unit.contracts[contract.index()].modifiers.push(r);
        r
    }

    pub fn modifier_parameter(
        &mut self,
        modifier: ModifierRef,
        name: &str,
        ty: TypeName,
    ) -> VariableRef {
        let var = self.push_variable(
            name,
            ty,
            VariableScope::Parameter,
            Visibility::Internal,
            false,
            None,
        );
        self.unit.modifiers[modifier.index()].parameters.push(var);
        var
    }

    pub fn set_modifier_body(&mut self, modifier: ModifierRef, statements: Vec<Statement>) {
        let body = self.block(statements);
        self.unit.modifiers[modifier.index()].body = body;
    }

    pub fn local(&mut self, name: &str, ty: TypeName) -> VariableRef {
        self.push_variable(name, ty, VariableScope::Local, Visibility::Internal, false, None)
    }

    // Expressions

    pub fn expr(&mut self, kind: ExpressionKind, ty: TypeName) -> Expression {
        let id = self.id();
        Expression { id, kind, ty }
    }

    pub fn number(&mut self, value: impl Into<BigInt>, ty: TypeName) -> Expression {
        self.expr(ExpressionKind::Literal(Literal::Number(value.into())), ty)
    }

    pub fn uint(&mut self, value: i64) -> Expression {
        self.number(value, TypeName::uint256())
    }

    pub fn boolean(&mut self, value: bool) -> Expression {
        self.expr(ExpressionKind::Literal(Literal::Bool(value)), TypeName::Bool)
    }

    pub fn var(&mut self, var: VariableRef) -> Expression {
        let decl = &self.unit.variables[var.index()];
        let (name, ty) = (decl.name.clone(), decl.ty.clone());
        self.expr(
            ExpressionKind::Identifier {
                name,
                declaration: Declaration::Variable(var),
            },
            ty,
        )
    }

    pub fn function_ref(&mut self, function: FunctionRef) -> Expression {
        let name = self.unit.functions[function.index()].name.clone();
        self.expr(
            ExpressionKind::Identifier {
                name,
                declaration: Declaration::Function(function),
            },
            TypeName::Void,
        )
    }

    pub fn contract_ref(&mut self, contract: ContractRef) -> Expression {
        let name = self.unit.contracts[contract.index()].name.clone();
        self.expr(
            ExpressionKind::Identifier {
                name,
                declaration: Declaration::Contract(contract),
            },
            TypeName::Void,
        )
    }

    pub fn magic(&mut self, magic: MagicVariable) -> Expression {
        let (name, ty) = match magic {
            MagicVariable::Msg => ("msg", TypeName::Void),
            MagicVariable::Block => ("block", TypeName::Void),
            MagicVariable::Tx => ("tx", TypeName::Void),
            MagicVariable::Super => ("super", TypeName::Void),
            MagicVariable::Now => ("now", TypeName::uint256()),
            MagicVariable::This => ("this", TypeName::Address),
        };
        self.expr(
            ExpressionKind::Identifier {
                name: name.to_string(),
                declaration: Declaration::Magic(magic),
            },
            ty,
        )
    }

    /// `this`, typed as the enclosing contract.
    pub fn this(&mut self, contract: ContractRef) -> Expression {
        let mut expr = self.magic(MagicVariable::This);
        expr.ty = TypeName::Contract(contract);
        expr
    }

    pub fn builtin(&mut self, function: BuiltinFunction) -> Expression {
        let name = match function {
            BuiltinFunction::Require => "require",
            BuiltinFunction::Assert => "assert",
            BuiltinFunction::Revert => "revert",
            BuiltinFunction::Keccak256 => "keccak256",
            BuiltinFunction::AddMod => "addmod",
            BuiltinFunction::MulMod => "mulmod",
            BuiltinFunction::BlockHash => "blockhash",
            BuiltinFunction::SelfDestruct => "selfdestruct",
            BuiltinFunction::GasLeft => "gasleft",
        };
        self.expr(
            ExpressionKind::Identifier {
                name: name.to_string(),
                declaration: Declaration::Builtin(function),
            },
            TypeName::Void,
        )
    }

    fn member_type(&self, base: &Expression, member: &str) -> TypeName {
        if let ExpressionKind::Identifier {
            declaration: Declaration::Magic(magic),
            ..
        } = &base.kind
        {
            return match (magic, member) {
                (MagicVariable::Msg, "sender")
                | (MagicVariable::Tx, "origin")
                | (MagicVariable::Block, "coinbase") => TypeName::Address,
                (MagicVariable::Msg | MagicVariable::Block | MagicVariable::Tx, _) => {
                    TypeName::uint256()
                }
                _ if member == "balance" => TypeName::uint256(),
                _ => TypeName::Void,
            };
        }
        match (&base.ty, member) {
            (TypeName::Struct { id, location }, _) => self.unit.structs[id.index()]
                .members
                .iter()
                .find(|m| m.name == member)
                .map(|m| m.ty.with_location(*location))
                .unwrap_or(TypeName::Void),
            (TypeName::Array { .. }, "length") => TypeName::uint256(),
            (TypeName::Address | TypeName::Contract(_), "balance") => TypeName::uint256(),
            _ => TypeName::Void,
        }
    }

    pub fn member(&mut self, base: Expression, member: &str) -> Expression {
        let ty = self.member_type(&base, member);
        self.expr(
            ExpressionKind::MemberAccess {
                expression: Box::new(base),
                member: member.to_string(),
                referenced: None,
            },
            ty,
        )
    }

    /// `base.f` where `f` is a function: an external call target when
    /// `base` is an address, a static reference when `base` names a
    /// contract, a virtual one hop up when `base` is `super`.
    pub fn member_function(&mut self, base: Expression, function: FunctionRef) -> Expression {
        let name = self.unit.functions[function.index()].name.clone();
        self.expr(
            ExpressionKind::MemberAccess {
                expression: Box::new(base),
                member: name,
                referenced: Some(Declaration::Function(function)),
            },
            TypeName::Void,
        )
    }

    pub fn super_function(&mut self, function: FunctionRef) -> Expression {
        let base = self.magic(MagicVariable::Super);
        self.member_function(base, function)
    }

    pub fn index(&mut self, base: Expression, index: Expression) -> Expression {
        let ty = match &base.ty {
            TypeName::Mapping { value, .. } => value.with_location(DataLocation::Storage),
            TypeName::Array {
                base: elem,
                location,
                ..
            } => elem.with_location(*location),
            _ => TypeName::Void,
        };
        self.expr(
            ExpressionKind::IndexAccess {
                base: Box::new(base),
                index: Some(Box::new(index)),
            },
            ty,
        )
    }

    pub fn unary(&mut self, op: UnaryOperator, prefix: bool, operand: Expression) -> Expression {
        let ty = match op {
            UnaryOperator::Not => TypeName::Bool,
            UnaryOperator::Delete => TypeName::Void,
            _ => operand.ty.clone(),
        };
        self.expr(
            ExpressionKind::Unary {
                op,
                prefix,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn binary(&mut self, op: BinaryOperator, left: Expression, right: Expression) -> Expression {
        let ty = if op.is_comparison() || op.is_short_circuit() {
            TypeName::Bool
        } else {
            left.ty.clone()
        };
        self.expr(
            ExpressionKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn assign(&mut self, left: Expression, right: Expression) -> Expression {
        let ty = left.ty.clone();
        self.expr(
            ExpressionKind::Assignment {
                op: None,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn compound_assign(
        &mut self,
        op: BinaryOperator,
        left: Expression,
        right: Expression,
    ) -> Expression {
        let ty = left.ty.clone();
        self.expr(
            ExpressionKind::Assignment {
                op: Some(op),
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn conditional(
        &mut self,
        condition: Expression,
        true_expr: Expression,
        false_expr: Expression,
    ) -> Expression {
        let ty = true_expr.ty.clone();
        self.expr(
            ExpressionKind::Conditional {
                condition: Box::new(condition),
                true_expr: Box::new(true_expr),
                false_expr: Box::new(false_expr),
            },
            ty,
        )
    }

    pub fn tuple(&mut self, items: Vec<Option<Expression>>) -> Expression {
        let ty = TypeName::Tuple(
            items
                .iter()
                .map(|item| item.as_ref().map_or(TypeName::Void, |e| e.ty.clone()))
                .collect(),
        );
        self.expr(ExpressionKind::Tuple(items), ty)
    }

    fn call_type(&self, callee: &Expression) -> TypeName {
        let function = match &callee.kind {
            ExpressionKind::Identifier {
                declaration: Declaration::Function(f),
                ..
            }
            | ExpressionKind::MemberAccess {
                referenced: Some(Declaration::Function(f)),
                ..
            } => Some(*f),
            _ => None,
        };
        if let Some(f) = function {
            let returns: Vec<TypeName> = self.unit.functions[f.index()]
                .returns
                .iter()
                .map(|r| self.unit.variables[r.index()].ty.clone())
                .collect();
            return match returns.len() {
                0 => TypeName::Void,
                1 => returns[0].clone(),
                _ => TypeName::Tuple(returns),
            };
        }
        match &callee.kind {
            ExpressionKind::Identifier {
                declaration: Declaration::Builtin(b),
                ..
            } => match b {
                BuiltinFunction::Keccak256 | BuiltinFunction::BlockHash => TypeName::FixedBytes(32),
                BuiltinFunction::AddMod | BuiltinFunction::MulMod | BuiltinFunction::GasLeft => {
                    TypeName::uint256()
                }
                _ => TypeName::Void,
            },
            ExpressionKind::New(NewTarget::Contract(c)) => TypeName::Contract(*c),
            ExpressionKind::New(NewTarget::Array(ty)) => ty.clone(),
            ExpressionKind::MemberAccess { member, .. } => match member.as_str() {
                "push" => TypeName::uint256(),
                "send" => TypeName::Bool,
                _ => TypeName::Void,
            },
            _ => TypeName::Void,
        }
    }

    pub fn call(&mut self, callee: Expression, arguments: Vec<Expression>) -> Expression {
        self.call_with_options(callee, arguments, CallOptions::default())
    }

    pub fn call_with_options(
        &mut self,
        callee: Expression,
        arguments: Vec<Expression>,
        options: CallOptions,
    ) -> Expression {
        let ty = self.call_type(&callee);
        self.expr(
            ExpressionKind::FunctionCall {
                callee: Box::new(callee),
                arguments,
                kind: CallKind::Regular,
                options,
            },
            ty,
        )
    }

    pub fn call_function(&mut self, function: FunctionRef, arguments: Vec<Expression>) -> Expression {
        let callee = self.function_ref(function);
        self.call(callee, arguments)
    }

    pub fn call_builtin(
        &mut self,
        function: BuiltinFunction,
        arguments: Vec<Expression>,
    ) -> Expression {
        let callee = self.builtin(function);
        self.call(callee, arguments)
    }

    /// Explicit conversion `ty(argument)`.
    pub fn convert(&mut self, ty: TypeName, argument: Expression) -> Expression {
        let callee = self.expr(ExpressionKind::TypeExpression, ty.clone());
        self.expr(
            ExpressionKind::FunctionCall {
                callee: Box::new(callee),
                arguments: vec![argument],
                kind: CallKind::TypeConversion,
                options: CallOptions::default(),
            },
            ty,
        )
    }

    pub fn struct_new(&mut self, id: StructRef, arguments: Vec<Expression>) -> Expression {
        let name = self.unit.structs[id.index()].name.clone();
        let callee = self.expr(
            ExpressionKind::Identifier {
                name,
                declaration: Declaration::Struct(id),
            },
            TypeName::Void,
        );
        self.expr(
            ExpressionKind::FunctionCall {
                callee: Box::new(callee),
                arguments,
                kind: CallKind::StructConstructor,
                options: CallOptions::default(),
            },
            TypeName::Struct {
                id,
                location: DataLocation::Memory,
            },
        )
    }

    pub fn new_contract(&mut self, contract: ContractRef, arguments: Vec<Expression>) -> Expression {
        let callee = self.expr(ExpressionKind::New(NewTarget::Contract(contract)), TypeName::Void);
        self.call(callee, arguments)
    }

    pub fn new_array(&mut self, ty: TypeName, length: Expression) -> Expression {
        let ty = ty.with_location(DataLocation::Memory);
        let callee = self.expr(ExpressionKind::New(NewTarget::Array(ty)), TypeName::Void);
        self.call(callee, vec![length])
    }

    // Statements

    pub fn stmt(&mut self, kind: StatementKind) -> Statement {
        let id = self.id();
        Statement { id, kind }
    }

    pub fn block(&mut self, statements: Vec<Statement>) -> Block {
        let id = self.id();
        Block { id, statements }
    }

    pub fn block_stmt(&mut self, statements: Vec<Statement>) -> Statement {
        let block = self.block(statements);
        self.stmt(StatementKind::Block(block))
    }

    pub fn expr_stmt(&mut self, expression: Expression) -> Statement {
        self.stmt(StatementKind::Expression(expression))
    }

    pub fn declare(&mut self, var: VariableRef, initial_value: Option<Expression>) -> Statement {
        self.declare_tuple(vec![Some(var)], initial_value)
    }

    pub fn declare_tuple(
        &mut self,
        declarations: Vec<Option<VariableRef>>,
        initial_value: Option<Expression>,
    ) -> Statement {
        self.stmt(StatementKind::VariableDeclaration {
            declarations,
            initial_value,
        })
    }

    pub fn ret(&mut self, value: Option<Expression>) -> Statement {
        self.stmt(StatementKind::Return(value))
    }

    pub fn if_else(
        &mut self,
        condition: Expression,
        true_body: Statement,
        false_body: Option<Statement>,
    ) -> Statement {
        self.stmt(StatementKind::If {
            condition,
            true_body: Box::new(true_body),
            false_body: false_body.map(Box::new),
        })
    }

    pub fn while_loop(&mut self, condition: Expression, body: Statement) -> Statement {
        self.stmt(StatementKind::While {
            condition,
            body: Box::new(body),
            is_do_while: false,
        })
    }

    pub fn do_while(&mut self, body: Statement, condition: Expression) -> Statement {
        self.stmt(StatementKind::While {
            condition,
            body: Box::new(body),
            is_do_while: true,
        })
    }

    pub fn for_loop(
        &mut self,
        init: Option<Statement>,
        condition: Option<Expression>,
        update: Option<Expression>,
        body: Statement,
    ) -> Statement {
        self.stmt(StatementKind::For {
            init: init.map(Box::new),
            condition,
            update,
            body: Box::new(body),
        })
    }

    pub fn break_stmt(&mut self) -> Statement {
        self.stmt(StatementKind::Break)
    }

    pub fn continue_stmt(&mut self) -> Statement {
        self.stmt(StatementKind::Continue)
    }

    pub fn throw_stmt(&mut self) -> Statement {
        self.stmt(StatementKind::Throw)
    }

    pub fn placeholder(&mut self) -> Statement {
        self.stmt(StatementKind::Placeholder)
    }

    pub fn assembly(&mut self) -> Statement {
        self.stmt(StatementKind::InlineAssembly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_variables_are_relocated_to_storage() {
        let mut b = SourceUnitBuilder::new();
        let c = b.contract("C", &[]);
        let s = b.struct_type(c, "S", vec![("a", TypeName::uint256())]);
        let var = b.state_variable(
            c,
            "s",
            TypeName::Struct {
                id: s,
                location: DataLocation::Memory,
            },
            Visibility::Internal,
        );
        let unit = b.finish();
        assert_eq!(unit.variable(var).ty.location(), Some(DataLocation::Storage));
        assert_eq!(unit.contract(c).state_variables, vec![var]);
    }

    #[test]
    fn test_member_and_index_types_follow_base_location() {
        let mut b = SourceUnitBuilder::new();
        let c = b.contract("C", &[]);
        let s = b.struct_type(
            c,
            "S",
            vec![(
                "items",
                TypeName::Array {
                    base: Box::new(TypeName::Uint(8)),
                    length: None,
                    location: DataLocation::Memory,
                },
            )],
        );
        let var = b.state_variable(
            c,
            "s",
            TypeName::Struct {
                id: s,
                location: DataLocation::Storage,
            },
            Visibility::Internal,
        );
        let base = b.var(var);
        let items = b.member(base, "items");
        assert!(items.ty.is_in_storage());
        let zero = b.uint(0);
        let elem = b.index(items, zero);
        assert_eq!(elem.ty, TypeName::Uint(8));
    }

    #[test]
    fn test_call_type_comes_from_return_parameters() {
        let mut b = SourceUnitBuilder::new();
        let c = b.contract("C", &[]);
        let f = b.function(c, "pair", Visibility::Internal, StateMutability::Pure);
        b.return_parameter(f, "a", TypeName::Bool);
        b.return_parameter(f, "b", TypeName::Address);
        let call = b.call_function(f, vec![]);
        assert_eq!(call.ty, TypeName::Tuple(vec![TypeName::Bool, TypeName::Address]));
        assert_eq!(call.ty.arity(), 2);
    }

    #[test]
    fn test_node_ids_are_unique() {
        let mut b = SourceUnitBuilder::new();
        let one = b.uint(1);
        let two = b.uint(2);
        assert_ne!(one.id, two.id);
    }
}

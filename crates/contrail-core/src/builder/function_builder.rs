use super::{InstBuilder, InstBuilderBase, InstBuilderExt, TempTracker};
use crate::{
    analysis::ControlFlowGraph,
    block::{BlockId, Terminator},
    function::{Function, FunctionMetadata, FunctionSignature, Mutability, Parameter, Visibility},
    instructions::Instruction,
    types::Type,
    values::Value,
    IrError, Result,
};
use tracing::trace;

pub struct FunctionBuilder {
    function: Function,
    current: BlockId,
    temps: TempTracker,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let function = Function::new(FunctionSignature::new(name));
        let current = function.body.entry_block;
        Self {
            function,
            current,
            temps: TempTracker::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.function.signature.name
    }

    /// Declares a parameter and returns the local it is bound to.
    pub fn param(&mut self, name: &str, ty: Type) -> Value {
        self.function
            .signature
            .params
            .push(Parameter::new(name, ty));
        Value::local(name)
    }

    pub fn params(&self) -> &[Parameter] {
        &self.function.signature.params
    }

    pub fn returns(&mut self, types: Vec<Type>) -> &mut Self {
        self.function.signature.returns = types;
        self
    }

    pub fn return_types(&self) -> &[Type] {
        &self.function.signature.returns
    }

    pub fn visibility(&mut self, vis: Visibility) -> &mut Self {
        self.function.visibility = vis;
        self
    }

    pub fn mutability(&mut self, mutability: Mutability) -> &mut Self {
        self.function.mutability = mutability;
        self
    }

    pub fn metadata_mut(&mut self) -> &mut FunctionMetadata {
        &mut self.function.metadata
    }

    pub fn entry_block(&self) -> BlockId {
        self.function.body.entry_block
    }

    pub fn create_block(&mut self, label: &str) -> BlockId {
        self.function.body.create_block(label)
    }

    pub fn switch_to_block(&mut self, block_id: BlockId) -> Result<()> {
        if !self.function.body.blocks.contains_key(&block_id) {
            return Err(IrError::BuilderError(format!(
                "Block {} does not exist",
                block_id
            )));
        }
        self.current = block_id;
        Ok(())
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    pub fn is_terminated(&self) -> bool {
        self.function
            .body
            .blocks
            .get(&self.current)
            .map(|b| b.is_terminated())
            .unwrap_or(false)
    }

    pub fn new_temp(&mut self) -> Value {
        self.temps.new_temp()
    }

    pub fn ins(&mut self) -> Result<FunctionInstBuilder<'_>> {
        if self.is_terminated() {
            return Err(IrError::BuilderError(format!(
                "Block {} is already terminated",
                self.current
            )));
        }

        Ok(FunctionInstBuilder {
            block_id: self.current,
            function: &mut self.function,
            temps: &mut self.temps,
        })
    }

    pub fn jump(&mut self, target: BlockId) -> Result<()> {
        self.set_terminator(Terminator::Jump(target))
    }

    pub fn branch(&mut self, condition: Value, then_block: BlockId, else_block: BlockId) -> Result<()> {
        self.set_terminator(Terminator::Branch {
            condition,
            then_block,
            else_block,
        })
    }

    pub fn return_values(&mut self, values: Vec<Value>) -> Result<()> {
        self.set_terminator(Terminator::Return(values))
    }

    pub fn revert(&mut self, status: Value) -> Result<()> {
        self.set_terminator(Terminator::Revert(status))
    }

    pub fn panic(&mut self) -> Result<()> {
        self.set_terminator(Terminator::Panic)
    }

    fn set_terminator(&mut self, term: Terminator) -> Result<()> {
        for target in term.successors() {
            if !self.function.body.blocks.contains_key(&target) {
                return Err(IrError::BuilderError(format!(
                    "Jump to unknown block {}",
                    target
                )));
            }
        }

        let block = self
            .function
            .body
            .blocks
            .get_mut(&self.current)
            .ok_or_else(|| IrError::BuilderError("Block not found".into()))?;
        if block.is_terminated() {
            return Err(IrError::BuilderError(format!(
                "Block {} already terminated",
                self.current
            )));
        }
        block.terminator = term;
        Ok(())
    }

    /// Removes blocks that cannot be reached from the entry block and
    /// returns how many were dropped.
    pub fn prune_unreachable(&mut self) -> usize {
        let reachable = ControlFlowGraph::from_function(&self.function.body).reachable_blocks();
        let before = self.function.body.blocks.len();
        self.function
            .body
            .blocks
            .retain(|id, _| reachable.contains(id));
        let removed = before - self.function.body.blocks.len();
        if removed > 0 {
            trace!(
                function = %self.function.signature.name,
                removed,
                "pruned unreachable blocks"
            );
        }
        removed
    }

    /// Prunes dead blocks and checks that every remaining block is terminated.
    pub fn build(mut self) -> Result<Function> {
        self.prune_unreachable();

        for (block_id, block) in &self.function.body.blocks {
            if !block.is_terminated() {
                return Err(IrError::BuilderError(format!(
                    "Block {} ({}) in {} is not terminated",
                    block_id, block.label, self.function.signature.name
                )));
            }
        }

        Ok(self.function)
    }
}

pub struct FunctionInstBuilder<'a> {
    block_id: BlockId,
    function: &'a mut Function,
    temps: &'a mut TempTracker,
}

impl InstBuilderBase for FunctionInstBuilder<'_> {
    fn new_temp(&mut self) -> Value {
        self.temps.new_temp()
    }

    fn current_block(&self) -> BlockId {
        self.block_id
    }

    fn push(&mut self, inst: Instruction) {
        if let Some(block) = self.function.body.blocks.get_mut(&self.block_id) {
            block.instructions.push(inst);
        }
    }
}

impl InstBuilder for FunctionInstBuilder<'_> {}

impl InstBuilderExt for FunctionInstBuilder<'_> {}

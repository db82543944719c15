use super::names::{NameAllocator, RenameTable};
use crate::ast::{Block, ContractRef, FunctionRef, ModifierInvocation, TypeName};
use crate::errors::Result;
use contrail_core::{BlockId, FunctionBuilder, FunctionInstBuilder, Value};

/// Status a plain `revert`, `throw` or failed `require` aborts with.
pub const REVERT_STATUS: i64 = -1;

#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopTargets {
    pub break_block: BlockId,
    pub continue_block: BlockId,
}

/// A function body together with the modifiers wrapped around it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ModifierChain<'a> {
    pub function: FunctionRef,
    pub owner: ContractRef,
    pub modifiers: &'a [ModifierInvocation],
    pub body: &'a Block,
}

/// Mutable state for compiling one IR function.
///
/// Passed by reference through every statement and expression routine
/// of the contract compiler; nothing here outlives the function.
pub(crate) struct CompilationContext<'a> {
    pub builder: FunctionBuilder,
    pub names: NameAllocator,
    pub renames: RenameTable,
    /// Contract whose source is being lowered right now. `super` is
    /// resolved relative to it.
    pub scope_contract: ContractRef,
    pub return_vars: Vec<(Value, TypeName)>,
    pub chain: Option<ModifierChain<'a>>,
    /// Index of the modifier whose body is being lowered, if any.
    pub modifier_depth: Option<usize>,
    loops: Vec<LoopTargets>,
    return_targets: Vec<BlockId>,
    revert_block: Option<BlockId>,
    status_revert: Option<(BlockId, Value)>,
    assert_fail_block: Option<BlockId>,
}

impl<'a> CompilationContext<'a> {
    pub fn new(name: &str, scope_contract: ContractRef) -> Self {
        Self {
            builder: FunctionBuilder::new(name),
            names: NameAllocator::default(),
            renames: RenameTable::default(),
            scope_contract,
            return_vars: Vec::new(),
            chain: None,
            modifier_depth: None,
            loops: Vec::new(),
            return_targets: Vec::new(),
            revert_block: None,
            status_revert: None,
            assert_fail_block: None,
        }
    }

    pub fn ins(&mut self) -> Result<FunctionInstBuilder<'_>> {
        Ok(self.builder.ins()?)
    }

    pub fn fresh_local(&mut self, base: &str) -> Value {
        Value::local(self.names.fresh(base))
    }

    pub fn switch_to(&mut self, block: BlockId) -> Result<()> {
        Ok(self.builder.switch_to_block(block)?)
    }

    /// Creates a block and makes it current.
    pub fn start_block(&mut self, label: &str) -> Result<BlockId> {
        let block = self.builder.create_block(label);
        self.switch_to(block)?;
        Ok(block)
    }

    /// Jumps to `target` unless the current block already ended.
    pub fn jump_if_open(&mut self, target: BlockId) -> Result<()> {
        if !self.builder.is_terminated() {
            self.builder.jump(target)?;
        }
        Ok(())
    }

    /// Ends the current block with a jump and continues in a fresh block
    /// that nothing reaches. Code lowered into it is pruned later.
    pub fn jump_and_detach(&mut self, target: BlockId) -> Result<()> {
        self.builder.jump(target)?;
        self.start_block("unreachable")?;
        Ok(())
    }

    /// Branches to `failure` when `condition` holds and continues in a
    /// fresh block labelled `label` otherwise.
    pub fn fail_if(&mut self, condition: Value, failure: BlockId, label: &str) -> Result<()> {
        match condition.as_constant() {
            Some(c) if c.is_zero() => Ok(()),
            Some(_) => self.jump_and_detach(failure),
            None => {
                let next = self.builder.create_block(label);
                self.builder.branch(condition, failure, next)?;
                self.switch_to(next)
            }
        }
    }

    fn terminal_block(
        &mut self,
        label: &str,
        terminate: impl FnOnce(&mut FunctionBuilder) -> contrail_core::Result<()>,
    ) -> Result<BlockId> {
        let current = self.builder.current_block();
        let block = self.builder.create_block(label);
        self.builder.switch_to_block(block)?;
        terminate(&mut self.builder)?;
        self.builder.switch_to_block(current)?;
        Ok(block)
    }

    /// Shared block that reverts with [`REVERT_STATUS`].
    pub fn revert_block(&mut self) -> Result<BlockId> {
        if let Some(block) = self.revert_block {
            return Ok(block);
        }
        let block = self.terminal_block("revert", |b| b.revert(Value::int(REVERT_STATUS)))?;
        self.revert_block = Some(block);
        Ok(block)
    }

    /// Shared block that reverts with the status held in the returned
    /// register. Callers assign the register before branching.
    pub fn status_revert_block(&mut self) -> Result<(BlockId, Value)> {
        if let Some((block, status)) = &self.status_revert {
            return Ok((*block, status.clone()));
        }
        let status = self.fresh_local("status");
        let reverted = status.clone();
        let block = self.terminal_block("revert.status", move |b| b.revert(reverted))?;
        self.status_revert = Some((block, status.clone()));
        Ok((block, status))
    }

    /// Shared block for failed assertions and runtime checks.
    pub fn assert_fail_block(&mut self) -> Result<BlockId> {
        if let Some(block) = self.assert_fail_block {
            return Ok(block);
        }
        let block = self.terminal_block("assert.fail", |b| b.panic())?;
        self.assert_fail_block = Some(block);
        Ok(block)
    }

    pub fn push_loop(&mut self, break_block: BlockId, continue_block: BlockId) {
        self.loops.push(LoopTargets {
            break_block,
            continue_block,
        });
    }

    pub fn pop_loop(&mut self) {
        self.loops.pop();
    }

    pub fn current_loop(&self) -> Option<LoopTargets> {
        self.loops.last().copied()
    }

    /// Hides the enclosing loops while a nested body is expanded; a
    /// `break` in a function body never leaves a loop in a modifier.
    pub fn take_loops(&mut self) -> Vec<LoopTargets> {
        std::mem::take(&mut self.loops)
    }

    pub fn restore_loops(&mut self, loops: Vec<LoopTargets>) {
        self.loops = loops;
    }

    pub fn push_return_target(&mut self, block: BlockId) {
        self.return_targets.push(block);
    }

    pub fn pop_return_target(&mut self) {
        self.return_targets.pop();
    }

    pub fn return_target(&self) -> Option<BlockId> {
        self.return_targets.last().copied()
    }

    pub fn return_values(&self) -> Vec<Value> {
        self.return_vars.iter().map(|(v, _)| v.clone()).collect()
    }
}

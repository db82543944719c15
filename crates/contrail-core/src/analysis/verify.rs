use super::ControlFlowGraph;
use crate::{
    block::Terminator, contract::Contract, function::Function, instructions::Instruction,
    values::Value, IrError, Result,
};
use std::collections::BTreeSet;

fn fail(function: &Function, message: String) -> IrError {
    IrError::Verification {
        function: function.signature.name.clone(),
        message,
    }
}

/// Structural checks that need only the function itself.
pub fn verify_function(function: &Function) -> Result<()> {
    let body = &function.body;
    if !body.blocks.contains_key(&body.entry_block) {
        return Err(fail(function, "missing entry block".into()));
    }

    let cfg = ControlFlowGraph::from_function(body);
    let mut defined: BTreeSet<&str> = function
        .signature
        .params
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    for block in body.blocks.values() {
        for inst in &block.instructions {
            defined.extend(inst.results().into_iter().filter_map(Value::as_local));
        }
    }

    for (id, block) in &body.blocks {
        if matches!(block.terminator, Terminator::Invalid) {
            return Err(fail(function, format!("{} is not terminated", id)));
        }
        for succ in block.successors() {
            if !body.blocks.contains_key(&succ) {
                return Err(fail(
                    function,
                    format!("{} jumps to missing block {}", id, succ),
                ));
            }
        }
        if *id != body.entry_block && cfg.predecessors(*id).is_empty() {
            return Err(fail(function, format!("{} has no predecessor", id)));
        }

        let operands = block
            .instructions
            .iter()
            .flat_map(|inst| inst.operands())
            .chain(block.terminator.operands());
        for operand in operands {
            if let Some(name) = operand.as_local() {
                if !defined.contains(name) {
                    return Err(fail(
                        function,
                        format!("{} uses undefined local %{}", id, name),
                    ));
                }
            }
        }

        if let Terminator::Return(values) = &block.terminator {
            if values.len() != function.signature.returns.len() {
                return Err(fail(
                    function,
                    format!(
                        "{} returns {} values, signature declares {}",
                        id,
                        values.len(),
                        function.signature.returns.len()
                    ),
                ));
            }
        }
    }

    Ok(())
}

/// Verifies every function and every internal call edge between them.
pub fn verify_contract(contract: &Contract) -> Result<()> {
    for function in contract.functions.values() {
        verify_function(function)?;

        for inst in function.body.blocks.values().flat_map(|b| &b.instructions) {
            if let Instruction::Call {
                results,
                function: callee,
                args,
            } = inst
            {
                let target = contract
                    .get_function(callee)
                    .ok_or_else(|| fail(function, format!("call to unknown function {}", callee)))?;
                if target.signature.params.len() != args.len()
                    || target.signature.returns.len() != results.len()
                {
                    return Err(fail(
                        function,
                        format!(
                            "call to {} passes {} args for {} results, callee takes {} and returns {}",
                            callee,
                            args.len(),
                            results.len(),
                            target.signature.params.len(),
                            target.signature.returns.len()
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

use crate::{
    block::BlockId,
    instructions::{BinaryOp, BuiltinFunction, ContextVariable, Instruction, UnaryOp},
    types::Type,
    values::Value,
};

pub trait InstBuilderBase: Sized {
    fn new_temp(&mut self) -> Value;

    fn current_block(&self) -> BlockId;

    fn push(&mut self, inst: Instruction);
}

/// Arithmetic, logic and masking.
pub trait InstBuilder: InstBuilderBase {
    fn assign(&mut self, result: Value, value: Value) {
        self.push(Instruction::Assign { result, value });
    }

    fn copy(&mut self, value: Value) -> Value {
        let result = self.new_temp();
        self.assign(result.clone(), value);
        result
    }

    fn binary(&mut self, op: BinaryOp, left: Value, right: Value) -> Value {
        let result = self.new_temp();
        self.push(Instruction::Binary {
            result: result.clone(),
            op,
            left,
            right,
        });
        result
    }

    fn unary(&mut self, op: UnaryOp, operand: Value) -> Value {
        let result = self.new_temp();
        self.push(Instruction::Unary {
            result: result.clone(),
            op,
            operand,
        });
        result
    }

    fn add(&mut self, left: Value, right: Value) -> Value {
        self.binary(BinaryOp::Add, left, right)
    }

    fn sub(&mut self, left: Value, right: Value) -> Value {
        self.binary(BinaryOp::Sub, left, right)
    }

    fn mul(&mut self, left: Value, right: Value) -> Value {
        self.binary(BinaryOp::Mul, left, right)
    }

    fn eq(&mut self, left: Value, right: Value) -> Value {
        self.binary(BinaryOp::Eq, left, right)
    }

    fn ne(&mut self, left: Value, right: Value) -> Value {
        self.binary(BinaryOp::Ne, left, right)
    }

    fn lt(&mut self, left: Value, right: Value) -> Value {
        self.binary(BinaryOp::Lt, left, right)
    }

    fn ge(&mut self, left: Value, right: Value) -> Value {
        self.binary(BinaryOp::Ge, left, right)
    }

    fn not(&mut self, operand: Value) -> Value {
        self.unary(UnaryOp::Not, operand)
    }

    fn iszero(&mut self, operand: Value) -> Value {
        self.unary(UnaryOp::IsZero, operand)
    }

    fn truncate(&mut self, value: Value, bits: u16) -> Value {
        let result = self.new_temp();
        self.push(Instruction::Truncate {
            result: result.clone(),
            value,
            bits,
        });
        result
    }

    fn sign_extend(&mut self, value: Value, bits: u16) -> Value {
        let result = self.new_temp();
        self.push(Instruction::SignExtend {
            result: result.clone(),
            value,
            bits,
        });
        result
    }
}

/// Memory, storage, calls and the execution environment.
pub trait InstBuilderExt: InstBuilderBase {
    fn memory_load(&mut self, address: Value) -> Value {
        let result = self.new_temp();
        self.push(Instruction::MemoryLoad {
            result: result.clone(),
            address,
        });
        result
    }

    fn memory_store(&mut self, address: Value, value: Value) {
        self.push(Instruction::MemoryStore { address, value });
    }

    fn allocate_memory(&mut self, size: Value) -> Value {
        let result = self.new_temp();
        self.push(Instruction::AllocateMemory {
            result: result.clone(),
            size,
        });
        result
    }

    fn storage_load(&mut self, slot: Value) -> Value {
        let result = self.new_temp();
        self.push(Instruction::StorageLoad {
            result: result.clone(),
            slot,
        });
        result
    }

    fn storage_store(&mut self, slot: Value, value: Value) {
        self.push(Instruction::StorageStore { slot, value });
    }

    fn mapping_slot(&mut self, base: Value, key: Value) -> Value {
        let result = self.new_temp();
        self.push(Instruction::MappingSlot {
            result: result.clone(),
            base,
            key,
        });
        result
    }

    fn array_data_slot(&mut self, base: Value) -> Value {
        let result = self.new_temp();
        self.push(Instruction::ArrayDataSlot {
            result: result.clone(),
            base,
        });
        result
    }

    fn copy_storage_to_storage(&mut self, dest: Value, src: Value, ty: Type) {
        self.push(Instruction::StorageToStorageCopy { dest, src, ty });
    }

    fn copy_memory_to_storage(&mut self, dest: Value, src: Value, ty: Type) {
        self.push(Instruction::MemoryToStorageCopy { dest, src, ty });
    }

    fn copy_storage_to_memory(&mut self, src: Value, ty: Type) -> Value {
        let result = self.new_temp();
        self.push(Instruction::StorageToMemoryCopy {
            result: result.clone(),
            src,
            ty,
        });
        result
    }

    fn call(&mut self, function: &str, args: Vec<Value>, result_count: usize) -> Vec<Value> {
        let results: Vec<Value> = (0..result_count).map(|_| self.new_temp()).collect();
        self.push(Instruction::Call {
            results: results.clone(),
            function: function.to_string(),
            args,
        });
        results
    }

    /// Returns the status value followed by the call results.
    fn call_external(
        &mut self,
        address: Value,
        function: &str,
        args: Vec<Value>,
        value: Value,
        gas: Value,
        result_count: usize,
    ) -> (Value, Vec<Value>) {
        let status = self.new_temp();
        let results: Vec<Value> = (0..result_count).map(|_| self.new_temp()).collect();
        self.push(Instruction::CallExternal {
            status: status.clone(),
            results: results.clone(),
            address,
            function: function.to_string(),
            args,
            value,
            gas,
        });
        (status, results)
    }

    fn create(&mut self, contract: &str, args: Vec<Value>, value: Value) -> (Value, Value) {
        let status = self.new_temp();
        let result = self.new_temp();
        self.push(Instruction::Create {
            status: status.clone(),
            result: result.clone(),
            contract: contract.to_string(),
            args,
            value,
        });
        (status, result)
    }

    fn builtin(&mut self, function: BuiltinFunction, args: Vec<Value>) -> Option<Value> {
        let results: Vec<Value> = (0..function.result_count())
            .map(|_| self.new_temp())
            .collect();
        let first = results.first().cloned();
        self.push(Instruction::Builtin {
            results,
            function,
            args,
        });
        first
    }

    fn context(&mut self, var: ContextVariable) -> Value {
        let result = self.new_temp();
        self.push(Instruction::GetContext {
            result: result.clone(),
            var,
        });
        result
    }

    fn msg_value(&mut self) -> Value {
        self.context(ContextVariable::MsgValue)
    }

    fn msg_sender(&mut self) -> Value {
        self.context(ContextVariable::MsgSender)
    }
}

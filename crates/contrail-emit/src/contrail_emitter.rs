use crate::config::EmitterConfig;
use crate::emitter::{EmitContext, EmitHelper, EmitResult, Emitter, Tint};
use anyhow::Result;
use contrail_core::{
    block::{BasicBlock, Terminator},
    contract::Contract,
    function::{Function, Mutability, Visibility},
    instructions::Instruction,
    types::{Type, TypeRegistry},
    values::Value,
};
use std::io::Write;

pub struct ContrailEmitter {
    config: EmitterConfig,
}

fn join(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn assign_prefix(results: &[&Value]) -> String {
    if results.is_empty() {
        String::new()
    } else {
        let names = results
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} = ", names)
    }
}

impl ContrailEmitter {
    pub fn new(config: EmitterConfig) -> Self {
        Self { config }
    }

    pub fn render(&self, contract: &Contract) -> Result<String> {
        let mut buffer = Vec::new();
        let mut context = EmitContext::from_config(&self.config);
        self.emit(contract, &mut buffer, &mut context)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn format_type(&self, types: &TypeRegistry, ty: &Type) -> String {
        match ty {
            Type::Struct(id) => types
                .get_struct(*id)
                .map(|def| format!("struct {}", def.name))
                .unwrap_or_else(|| ty.to_string()),
            Type::Array(elem, Some(len)) => format!("{}[{}]", self.format_type(types, elem), len),
            Type::Array(elem, None) => format!("{}[]", self.format_type(types, elem)),
            Type::Mapping(key, value) => format!(
                "mapping({} => {})",
                self.format_type(types, key),
                self.format_type(types, value)
            ),
            _ => ty.to_string(),
        }
    }

    fn function_header(&self, types: &TypeRegistry, function: &Function) -> String {
        let params = function
            .signature
            .params
            .iter()
            .map(|p| {
                if self.config.show_types {
                    format!("%{}: {}", p.name, self.format_type(types, &p.param_type))
                } else {
                    format!("%{}", p.name)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let returns = function
            .signature
            .returns
            .iter()
            .map(|t| self.format_type(types, t))
            .collect::<Vec<_>>()
            .join(", ");

        let visibility = match function.visibility {
            Visibility::Public => "public",
            Visibility::External => "external",
            Visibility::Internal => "internal",
            Visibility::Private => "private",
        };
        let mut header = format!(
            "{} function @\"{}\"({})",
            visibility, function.signature.name, params
        );
        if !returns.is_empty() {
            header.push_str(&format!(" -> ({})", returns));
        }
        match function.mutability {
            Mutability::Payable => header.push_str(" payable"),
            Mutability::View => header.push_str(" view"),
            Mutability::Pure => header.push_str(" pure"),
            Mutability::NonPayable => {}
        }
        header
    }

    pub fn format_instruction(&self, types: &TypeRegistry, inst: &Instruction) -> String {
        let typed = |ty: &Type| {
            if self.config.show_types {
                format!(" : {}", self.format_type(types, ty))
            } else {
                String::new()
            }
        };
        let body = match inst {
            Instruction::Assign { value, .. } => value.to_string(),
            Instruction::Binary {
                op, left, right, ..
            } => format!("{} {}, {}", op, left, right),
            Instruction::Unary { op, operand, .. } => format!("{} {}", op, operand),
            Instruction::Truncate { value, bits, .. } => format!("trunc.{} {}", bits, value),
            Instruction::SignExtend { value, bits, .. } => format!("sext.{} {}", bits, value),
            Instruction::MemoryLoad { address, .. } => format!("mload {}", address),
            Instruction::MemoryStore { address, value } => format!("mstore {}, {}", address, value),
            Instruction::AllocateMemory { size, .. } => format!("alloc {}", size),
            Instruction::StorageLoad { slot, .. } => format!("sload {}", slot),
            Instruction::StorageStore { slot, value } => format!("sstore {}, {}", slot, value),
            Instruction::MappingSlot { base, key, .. } => format!("mapslot {}, {}", base, key),
            Instruction::ArrayDataSlot { base, .. } => format!("dataslot {}", base),
            Instruction::StorageToStorageCopy { dest, src, ty } => {
                format!("copy.s2s {}, {}{}", dest, src, typed(ty))
            }
            Instruction::MemoryToStorageCopy { dest, src, ty } => {
                format!("copy.m2s {}, {}{}", dest, src, typed(ty))
            }
            Instruction::StorageToMemoryCopy { src, ty, .. } => {
                format!("copy.s2m {}{}", src, typed(ty))
            }
            Instruction::Call { function, args, .. } => {
                format!("call @\"{}\"({})", function, join(args))
            }
            Instruction::CallExternal {
                address,
                function,
                args,
                value,
                gas,
                ..
            } => format!(
                "call {}.@\"{}\"({}) value {} gas {}",
                address,
                function,
                join(args),
                value,
                gas
            ),
            Instruction::Create {
                contract,
                args,
                value,
                ..
            } => format!("create @{}({}) value {}", contract, join(args), value),
            Instruction::Builtin { function, args, .. } => {
                format!("{}({})", function.name(), join(args))
            }
            Instruction::GetContext { var, .. } => var.name().to_string(),
        };
        format!("{}{}", assign_prefix(&inst.results()), body)
    }

    pub fn format_terminator(&self, term: &Terminator) -> String {
        match term {
            Terminator::Jump(target) => format!("br {}", target),
            Terminator::Branch {
                condition,
                then_block,
                else_block,
            } => format!("br {}, {}, {}", condition, then_block, else_block),
            Terminator::Return(values) if values.is_empty() => "ret void".to_string(),
            Terminator::Return(values) => format!("ret {}", join(values)),
            Terminator::Revert(status) => format!("revert {}", status),
            Terminator::Panic => "invalid".to_string(),
            Terminator::Invalid => "<unterminated>".to_string(),
        }
    }

    fn emit_block<W: Write>(
        &self,
        types: &TypeRegistry,
        block: &BasicBlock,
        writer: &mut W,
        context: &mut EmitContext,
    ) -> EmitResult {
        EmitHelper::write_colored_line(
            writer,
            context,
            &format!("{} ({}):", block.id, block.label),
            Tint::Label,
        )?;
        context.indent();
        for inst in &block.instructions {
            EmitHelper::write_line(writer, context, &self.format_instruction(types, inst))?;
        }
        let tint = if block.terminator.is_revert() {
            Tint::Exit
        } else {
            Tint::Plain
        };
        EmitHelper::write_colored_line(
            writer,
            context,
            &self.format_terminator(&block.terminator),
            tint,
        )?;
        context.dedent();
        Ok(())
    }

    fn emit_function<W: Write>(
        &self,
        types: &TypeRegistry,
        function: &Function,
        writer: &mut W,
        context: &mut EmitContext,
    ) -> EmitResult {
        let header = self.function_header(types, function);
        EmitHelper::write_block(writer, context, &header, |writer, context| {
            for block in function.body.blocks.values() {
                self.emit_block(types, block, writer, context)?;
            }
            Ok(())
        })
    }
}

impl Default for ContrailEmitter {
    fn default() -> Self {
        Self::new(EmitterConfig::default())
    }
}

impl Emitter for ContrailEmitter {
    type Item = Contract;

    fn emit<W: Write>(
        &self,
        contract: &Contract,
        writer: &mut W,
        context: &mut EmitContext,
    ) -> EmitResult {
        let header = format!("contract {}", contract.name);
        EmitHelper::write_block(writer, context, &header, |writer, context| {
            if self.config.show_storage_layout && !contract.storage_layout.slots.is_empty() {
                EmitHelper::write_comment(writer, context, "storage")?;
                for var in &contract.storage_layout.slots {
                    EmitHelper::write_line(
                        writer,
                        context,
                        &format!(
                            "slot {}: {} {}",
                            var.slot,
                            var.name,
                            self.format_type(&contract.types, &var.var_type)
                        ),
                    )?;
                }
            }
            for function in contract.functions.values() {
                writeln!(writer)?;
                self.emit_function(&contract.types, function, writer, context)?;
            }
            Ok(())
        })
    }
}

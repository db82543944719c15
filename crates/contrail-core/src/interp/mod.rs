/*! Reference VM for contrail IR.
 *
 * Executes the functions of a single contract over unbounded integers. Memory is a flat vector of
 * cells that lives for one top-level call; storage is a sparse slot map that survives calls and is
 * rolled back when a call reverts or panics. External calls and contract creation need a world of
 * other contracts and are reported as unsupported.
 */

mod copy;
mod state;

pub use state::{keccak_words, word_bytes};

use crate::{
    block::{BlockId, Terminator},
    contract::Contract,
    function::Function,
    instructions::{BinaryOp, BuiltinFunction, ContextVariable, Instruction, UnaryOp},
    values::Value,
};
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use state::State;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

/// Shifts at or beyond this many bits saturate; every masked width is smaller.
const MAX_SHIFT: u32 = 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("missing function {0}")]
    MissingFunction(String),
    #[error("function {function} expects {expected} args but got {got}")]
    Arity {
        function: String,
        expected: usize,
        got: usize,
    },
    #[error("read of undefined local %{0}")]
    UndefinedLocal(String),
    #[error("missing block {0}")]
    MissingBlock(BlockId),
    #[error("step limit of {0} exceeded")]
    StepLimit(u64),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("vm error: {0}")]
    Runtime(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmConfig {
    pub max_steps: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self { max_steps: 1_000_000 }
    }
}

/// Transaction and block context visible to `GetContext` and builtins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    pub msg_sender: BigInt,
    pub msg_value: BigInt,
    pub tx_origin: BigInt,
    pub tx_gas_price: BigInt,
    pub block_number: BigInt,
    pub block_timestamp: BigInt,
    pub block_coinbase: BigInt,
    pub block_difficulty: BigInt,
    pub block_gas_limit: BigInt,
    pub gas_left: BigInt,
    pub this_address: BigInt,
    pub balances: BTreeMap<BigInt, BigInt>,
    pub block_hashes: BTreeMap<BigInt, BigInt>,
    pub self_destructed: Option<BigInt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Return(Vec<BigInt>),
    Revert(BigInt),
    Panic,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Return(_))
    }

    pub fn values(&self) -> Option<&[BigInt]> {
        match self {
            Outcome::Return(values) => Some(values),
            _ => None,
        }
    }
}

pub struct Vm<'c> {
    contract: &'c Contract,
    config: VmConfig,
    pub env: Environment,
    state: State,
    steps: u64,
}

struct Frame {
    locals: HashMap<String, BigInt>,
}

impl Frame {
    fn get(&self, value: &Value) -> Result<BigInt, VmError> {
        match value {
            Value::Constant(c) => Ok(c.as_bigint()),
            Value::Local(name) => self
                .locals
                .get(name)
                .cloned()
                .ok_or_else(|| VmError::UndefinedLocal(name.clone())),
        }
    }

    fn set(&mut self, target: &Value, value: BigInt) -> Result<(), VmError> {
        match target {
            Value::Local(name) => {
                self.locals.insert(name.clone(), value);
                Ok(())
            }
            Value::Constant(c) => Err(VmError::Runtime(format!(
                "cannot assign to constant {}",
                c
            ))),
        }
    }
}

impl<'c> Vm<'c> {
    pub fn new(contract: &'c Contract) -> Self {
        Self::with_config(contract, VmConfig::default())
    }

    pub fn with_config(contract: &'c Contract, config: VmConfig) -> Self {
        Self {
            contract,
            config,
            env: Environment::default(),
            state: State::default(),
            steps: 0,
        }
    }

    pub fn storage(&self, slot: &BigInt) -> BigInt {
        self.state.sload(slot)
    }

    pub fn set_storage(&mut self, slot: BigInt, value: BigInt) {
        self.state.sstore(slot, value);
    }

    pub fn storage_entries(&self) -> &BTreeMap<BigInt, BigInt> {
        &self.state.storage
    }

    /// Runs the constructor if the contract has one.
    pub fn deploy(&mut self, args: Vec<BigInt>) -> Result<Outcome, VmError> {
        match self.contract.constructor() {
            Some(ctor) => {
                let name = ctor.signature.name.clone();
                self.call(&name, args)
            }
            None => Ok(Outcome::Return(Vec::new())),
        }
    }

    /// Top-level call: fresh memory, storage rolled back on failure.
    pub fn call(&mut self, function: &str, args: Vec<BigInt>) -> Result<Outcome, VmError> {
        debug!(contract = %self.contract.name, function, "vm call");
        let snapshot = self.state.storage.clone();
        let env_snapshot = self.env.clone();
        self.state.memory.clear();
        self.steps = 0;

        let result = self.run(function, args);
        if !matches!(result, Ok(Outcome::Return(_))) {
            self.state.storage = snapshot;
            self.env = env_snapshot;
        }
        result
    }

    fn lookup(&self, name: &str) -> Result<&'c Function, VmError> {
        self.contract
            .get_function(name)
            .ok_or_else(|| VmError::MissingFunction(name.to_string()))
    }

    fn run(&mut self, name: &str, args: Vec<BigInt>) -> Result<Outcome, VmError> {
        let function = self.lookup(name)?;
        let params = &function.signature.params;
        if params.len() != args.len() {
            return Err(VmError::Arity {
                function: name.to_string(),
                expected: params.len(),
                got: args.len(),
            });
        }

        let mut frame = Frame {
            locals: params
                .iter()
                .map(|p| p.name.clone())
                .zip(args)
                .collect(),
        };

        let mut current = function.body.entry_block;
        loop {
            let block = function
                .body
                .get_block(current)
                .ok_or(VmError::MissingBlock(current))?;

            for inst in &block.instructions {
                self.tick()?;
                if let Some(outcome) = self.execute(inst, &mut frame)? {
                    return Ok(outcome);
                }
            }

            self.tick()?;
            match &block.terminator {
                Terminator::Jump(target) => current = *target,
                Terminator::Branch {
                    condition,
                    then_block,
                    else_block,
                } => {
                    current = if frame.get(condition)?.is_zero() {
                        *else_block
                    } else {
                        *then_block
                    };
                }
                Terminator::Return(values) => {
                    let values = values
                        .iter()
                        .map(|v| frame.get(v))
                        .collect::<Result<Vec<_>, _>>()?;
                    return Ok(Outcome::Return(values));
                }
                Terminator::Revert(status) => return Ok(Outcome::Revert(frame.get(status)?)),
                Terminator::Panic => return Ok(Outcome::Panic),
                Terminator::Invalid => {
                    return Err(VmError::Runtime(format!(
                        "{} in {} is not terminated",
                        current, name
                    )))
                }
            }
        }
    }

    fn tick(&mut self) -> Result<(), VmError> {
        self.steps += 1;
        if self.steps > self.config.max_steps {
            return Err(VmError::StepLimit(self.config.max_steps));
        }
        Ok(())
    }

    /// Executes one instruction. A failing internal call yields its outcome.
    fn execute(&mut self, inst: &Instruction, frame: &mut Frame) -> Result<Option<Outcome>, VmError> {
        match inst {
            Instruction::Assign { result, value } => {
                let v = frame.get(value)?;
                frame.set(result, v)?;
            }
            Instruction::Binary {
                result,
                op,
                left,
                right,
            } => {
                let v = binary(*op, &frame.get(left)?, &frame.get(right)?)?;
                frame.set(result, v)?;
            }
            Instruction::Unary {
                result,
                op,
                operand,
            } => {
                let x = frame.get(operand)?;
                let v = match op {
                    UnaryOp::Not => !x,
                    UnaryOp::IsZero => bool_int(x.is_zero()),
                };
                frame.set(result, v)?;
            }
            Instruction::Truncate {
                result,
                value,
                bits,
            } => {
                let v = truncate(&frame.get(value)?, *bits);
                frame.set(result, v)?;
            }
            Instruction::SignExtend {
                result,
                value,
                bits,
            } => {
                let v = sign_extend(&frame.get(value)?, *bits);
                frame.set(result, v)?;
            }
            Instruction::MemoryLoad { result, address } => {
                let v = self.state.mload(&frame.get(address)?)?;
                frame.set(result, v)?;
            }
            Instruction::MemoryStore { address, value } => {
                let address = frame.get(address)?;
                let value = frame.get(value)?;
                self.state.mstore(&address, value)?;
            }
            Instruction::AllocateMemory { result, size } => {
                let size = frame.get(size)?;
                let base = self.state.allocate(&size)?;
                frame.set(result, base)?;
            }
            Instruction::StorageLoad { result, slot } => {
                let v = self.state.sload(&frame.get(slot)?);
                frame.set(result, v)?;
            }
            Instruction::StorageStore { slot, value } => {
                let slot = frame.get(slot)?;
                let value = frame.get(value)?;
                self.state.sstore(slot, value);
            }
            Instruction::MappingSlot { result, base, key } => {
                let v = keccak_words(&[frame.get(key)?, frame.get(base)?]);
                frame.set(result, v)?;
            }
            Instruction::ArrayDataSlot { result, base } => {
                let v = keccak_words(&[frame.get(base)?]);
                frame.set(result, v)?;
            }
            Instruction::StorageToStorageCopy { dest, src, ty } => {
                let dest = frame.get(dest)?;
                let src = frame.get(src)?;
                self.state
                    .copy_storage_to_storage(&self.contract.types, &dest, &src, ty)?;
            }
            Instruction::MemoryToStorageCopy { dest, src, ty } => {
                let dest = frame.get(dest)?;
                let src = frame.get(src)?;
                self.state
                    .copy_memory_to_storage(&self.contract.types, &dest, &src, ty)?;
            }
            Instruction::StorageToMemoryCopy { result, src, ty } => {
                let src = frame.get(src)?;
                let v = self
                    .state
                    .copy_storage_to_memory(&self.contract.types, &src, ty)?;
                frame.set(result, v)?;
            }
            Instruction::Call {
                results,
                function,
                args,
            } => {
                let args = args
                    .iter()
                    .map(|a| frame.get(a))
                    .collect::<Result<Vec<_>, _>>()?;
                match self.run(function, args)? {
                    Outcome::Return(values) => {
                        if values.len() != results.len() {
                            return Err(VmError::Runtime(format!(
                                "{} returned {} values, caller expects {}",
                                function,
                                values.len(),
                                results.len()
                            )));
                        }
                        for (target, value) in results.iter().zip(values) {
                            frame.set(target, value)?;
                        }
                    }
                    failure => return Ok(Some(failure)),
                }
            }
            Instruction::CallExternal { function, .. } => {
                return Err(VmError::Unsupported(format!("external call to {}", function)))
            }
            Instruction::Create { contract, .. } => {
                return Err(VmError::Unsupported(format!("creation of {}", contract)))
            }
            Instruction::Builtin {
                results,
                function,
                args,
            } => {
                let args = args
                    .iter()
                    .map(|a| frame.get(a))
                    .collect::<Result<Vec<_>, _>>()?;
                if let Some(v) = self.builtin(*function, &args)? {
                    if let Some(target) = results.first() {
                        frame.set(target, v)?;
                    }
                }
            }
            Instruction::GetContext { result, var } => {
                let v = self.context(*var);
                frame.set(result, v)?;
            }
        }
        Ok(None)
    }

    fn builtin(&mut self, function: BuiltinFunction, args: &[BigInt]) -> Result<Option<BigInt>, VmError> {
        let arg = |i: usize| {
            args.get(i).cloned().ok_or_else(|| {
                VmError::Runtime(format!("{} is missing argument {}", function.name(), i))
            })
        };
        let value = match function {
            BuiltinFunction::Keccak256 => Some(keccak_words(args)),
            BuiltinFunction::AddMod | BuiltinFunction::MulMod => {
                let (a, b, m) = (arg(0)?, arg(1)?, arg(2)?);
                if m.is_zero() {
                    Some(BigInt::zero())
                } else if function == BuiltinFunction::AddMod {
                    Some((a + b) % m)
                } else {
                    Some((a * b) % m)
                }
            }
            BuiltinFunction::BlockHash => Some(
                self.env
                    .block_hashes
                    .get(&arg(0)?)
                    .cloned()
                    .unwrap_or_default(),
            ),
            BuiltinFunction::Balance => Some(
                self.env
                    .balances
                    .get(&arg(0)?)
                    .cloned()
                    .unwrap_or_default(),
            ),
            BuiltinFunction::SelfDestruct => {
                let beneficiary = arg(0)?;
                let funds = self
                    .env
                    .balances
                    .remove(&self.env.this_address)
                    .unwrap_or_default();
                *self.env.balances.entry(beneficiary.clone()).or_default() += funds;
                self.env.self_destructed = Some(beneficiary);
                None
            }
        };
        Ok(value)
    }

    fn context(&self, var: ContextVariable) -> BigInt {
        let env = &self.env;
        match var {
            ContextVariable::MsgSender => env.msg_sender.clone(),
            ContextVariable::MsgValue => env.msg_value.clone(),
            ContextVariable::TxOrigin => env.tx_origin.clone(),
            ContextVariable::TxGasPrice => env.tx_gas_price.clone(),
            ContextVariable::BlockNumber => env.block_number.clone(),
            ContextVariable::BlockTimestamp => env.block_timestamp.clone(),
            ContextVariable::BlockCoinbase => env.block_coinbase.clone(),
            ContextVariable::BlockDifficulty => env.block_difficulty.clone(),
            ContextVariable::BlockGasLimit => env.block_gas_limit.clone(),
            ContextVariable::GasLeft => env.gas_left.clone(),
            ContextVariable::ThisAddress => env.this_address.clone(),
        }
    }
}

fn bool_int(b: bool) -> BigInt {
    if b {
        BigInt::one()
    } else {
        BigInt::zero()
    }
}

fn shift_amount(amount: &BigInt) -> Option<u32> {
    if amount.is_negative() {
        return None;
    }
    amount.to_u32().filter(|s| *s < MAX_SHIFT)
}

fn binary(op: BinaryOp, l: &BigInt, r: &BigInt) -> Result<BigInt, VmError> {
    let v = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        // Division by zero yields zero; the code generator guards it when asked to.
        BinaryOp::Div if r.is_zero() => BigInt::zero(),
        BinaryOp::Mod if r.is_zero() => BigInt::zero(),
        BinaryOp::Div => l / r,
        BinaryOp::Mod => l % r,
        BinaryOp::Exp => pow(l, r)?,
        BinaryOp::And => l & r,
        BinaryOp::Or => l | r,
        BinaryOp::Xor => l ^ r,
        BinaryOp::Shl => match shift_amount(r) {
            Some(s) => l << s,
            None => BigInt::zero(),
        },
        BinaryOp::Shr => match shift_amount(r) {
            Some(s) => l >> s,
            None if l.is_negative() => -BigInt::one(),
            None => BigInt::zero(),
        },
        BinaryOp::Eq => bool_int(l == r),
        BinaryOp::Ne => bool_int(l != r),
        BinaryOp::Lt => bool_int(l < r),
        BinaryOp::Gt => bool_int(l > r),
        BinaryOp::Le => bool_int(l <= r),
        BinaryOp::Ge => bool_int(l >= r),
    };
    Ok(v)
}

fn pow(base: &BigInt, exp: &BigInt) -> Result<BigInt, VmError> {
    if exp.is_negative() {
        return Err(VmError::Runtime(format!("negative exponent {}", exp)));
    }
    if base.is_zero() || base.is_one() {
        return Ok(if exp.is_zero() { BigInt::one() } else { base.clone() });
    }
    if *base == -BigInt::one() {
        return Ok(if (exp % 2u32).is_zero() {
            BigInt::one()
        } else {
            base.clone()
        });
    }
    match exp.to_u32().filter(|e| *e <= 4 * MAX_SHIFT) {
        Some(e) => Ok(num_traits::pow(base.clone(), e as usize)),
        None => Err(VmError::Unsupported(format!("exponent {} is too large", exp))),
    }
}

/// `value mod 2^bits`, always non-negative.
pub fn truncate(value: &BigInt, bits: u16) -> BigInt {
    let mask = (BigInt::one() << bits as usize) - 1;
    value & &mask
}

/// Two's complement reading of the low `bits` of `value`.
pub fn sign_extend(value: &BigInt, bits: u16) -> BigInt {
    if bits == 0 {
        return BigInt::zero();
    }
    let low = truncate(value, bits);
    let sign_bit = BigInt::one() << (bits as usize - 1);
    if low >= sign_bit {
        low - (sign_bit << 1usize)
    } else {
        low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_matches_fixed_width_arithmetic() {
        assert_eq!(truncate(&BigInt::from(260), 8), BigInt::from(4));
        assert_eq!(truncate(&BigInt::from(-1), 8), BigInt::from(255));
        assert_eq!(sign_extend(&BigInt::from(130), 8), BigInt::from(-126));
        assert_eq!(sign_extend(&BigInt::from(-129), 8), BigInt::from(127));
        assert_eq!(sign_extend(&BigInt::from(5), 8), BigInt::from(5));
    }

    #[test]
    fn shifts_saturate() {
        let big = BigInt::from(5000);
        assert_eq!(binary(BinaryOp::Shl, &BigInt::one(), &big).unwrap(), BigInt::zero());
        assert_eq!(
            binary(BinaryOp::Shr, &BigInt::from(-8), &big).unwrap(),
            BigInt::from(-1)
        );
        assert_eq!(
            binary(BinaryOp::Shr, &BigInt::from(-8), &BigInt::from(1)).unwrap(),
            BigInt::from(-4)
        );
    }

    #[test]
    fn signed_division_truncates_toward_zero() {
        assert_eq!(
            binary(BinaryOp::Div, &BigInt::from(-7), &BigInt::from(2)).unwrap(),
            BigInt::from(-3)
        );
        assert_eq!(
            binary(BinaryOp::Mod, &BigInt::from(-7), &BigInt::from(2)).unwrap(),
            BigInt::from(-1)
        );
        assert_eq!(
            binary(BinaryOp::Div, &BigInt::from(7), &BigInt::zero()).unwrap(),
            BigInt::zero()
        );
    }

    #[test]
    fn exponent_edge_cases() {
        let huge = BigInt::one() << 200usize;
        assert_eq!(pow(&BigInt::one(), &huge).unwrap(), BigInt::one());
        assert_eq!(pow(&BigInt::zero(), &BigInt::zero()).unwrap(), BigInt::one());
        assert_eq!(pow(&BigInt::from(2), &BigInt::from(10)).unwrap(), BigInt::from(1024));
        assert!(matches!(
            pow(&BigInt::from(2), &huge),
            Err(VmError::Unsupported(_))
        ));
    }
}

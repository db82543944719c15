use crate::analysis::{verify_contract, verify_function};
use crate::block::{BasicBlock, BlockId, Terminator};
use crate::builder::{FunctionBuilder, InstBuilder, InstBuilderExt};
use crate::types::Type;
use crate::values::Value;
use crate::{Contract, IrError};

fn returns_one(name: &str) -> FunctionBuilder {
    let mut func = FunctionBuilder::new(name);
    func.returns(vec![Type::Uint(256)]);
    func.return_values(vec![Value::one()]).unwrap();
    func
}

fn message(err: IrError) -> String {
    match err {
        IrError::Verification { message, .. } => message,
        other => panic!("expected verification error, got {:?}", other),
    }
}

#[test]
fn test_well_formed_function_passes() {
    let mut func = FunctionBuilder::new("abs(int256)");
    let x = func.param("x", Type::Int(256));
    func.returns(vec![Type::Int(256)]);
    let negative = func.create_block("negative");
    let done = func.create_block("done");
    let is_neg = func.ins().unwrap().lt(x.clone(), Value::zero());
    func.branch(is_neg, negative, done).unwrap();
    func.switch_to_block(negative).unwrap();
    let neg = func.ins().unwrap().sub(Value::zero(), x.clone());
    func.ins().unwrap().assign(x.clone(), neg);
    func.jump(done).unwrap();
    func.switch_to_block(done).unwrap();
    func.return_values(vec![x]).unwrap();

    assert!(verify_function(&func.build().unwrap()).is_ok());
}

#[test]
fn test_return_arity_mismatch_detected() {
    let mut func = FunctionBuilder::new("f()");
    func.returns(vec![Type::Bool, Type::Bool]);
    func.return_values(vec![Value::bool(true)]).unwrap();

    let err = verify_function(&func.build().unwrap()).unwrap_err();
    assert!(message(err).contains("returns 1 values"));
}

#[test]
fn test_undefined_local_detected() {
    let mut func = FunctionBuilder::new("f()");
    func.returns(vec![Type::Uint(256)]);
    func.return_values(vec![Value::local("ghost")]).unwrap();

    let err = verify_function(&func.build().unwrap()).unwrap_err();
    assert!(message(err).contains("%ghost"));
}

#[test]
fn test_orphan_block_detected() {
    let mut function = returns_one("f()").build().unwrap();
    let mut orphan = BasicBlock::new(BlockId(9), "orphan");
    orphan.set_terminator(Terminator::Panic);
    function.body.blocks.insert(BlockId(9), orphan);

    let err = verify_function(&function).unwrap_err();
    assert!(message(err).contains("no predecessor"));
}

#[test]
fn test_internal_call_arity_checked() {
    let mut caller = FunctionBuilder::new("caller()");
    caller.ins().unwrap().call("callee()", vec![Value::one()], 1);
    caller.return_values(vec![]).unwrap();

    let mut contract = Contract::new("C");
    contract.add_function(caller.build().unwrap());
    contract.add_function(returns_one("callee()").build().unwrap());
    let err = verify_contract(&contract).unwrap_err();
    assert!(message(err).contains("callee takes 0"));
}

#[test]
fn test_call_to_unknown_function_detected() {
    let mut caller = FunctionBuilder::new("caller()");
    caller.ins().unwrap().call("nowhere()", vec![], 0);
    caller.return_values(vec![]).unwrap();

    let mut contract = Contract::new("C");
    contract.add_function(caller.build().unwrap());
    let err = verify_contract(&contract).unwrap_err();
    assert!(message(err).contains("unknown function nowhere()"));
}

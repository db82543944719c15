use crate::builder::{FunctionBuilder, InstBuilder, InstBuilderExt};
use crate::instructions::BinaryOp;
use crate::interp::{keccak_words, Outcome, Vm, VmConfig, VmError};
use crate::types::Type;
use crate::values::Value;
use crate::Contract;
use num_bigint::BigInt;
use pretty_assertions::assert_eq;

fn contract_with(functions: Vec<FunctionBuilder>) -> Contract {
    let mut contract = Contract::new("Test");
    for func in functions {
        contract.add_function(func.build().unwrap());
    }
    contract
}

fn masked_add(name: &str, ty: Type) -> FunctionBuilder {
    let mut func = FunctionBuilder::new(name);
    let a = func.param("a", ty.clone());
    let b = func.param("b", ty.clone());
    func.returns(vec![ty.clone()]);
    let sum = func.ins().unwrap().add(a, b);
    let masked = match ty {
        Type::Int(bits) => func.ins().unwrap().sign_extend(sum, bits),
        Type::Uint(bits) => func.ins().unwrap().truncate(sum, bits),
        _ => unreachable!(),
    };
    func.return_values(vec![masked]).unwrap();
    func
}

#[test]
fn test_fixed_width_addition_wraps() {
    let contract = contract_with(vec![
        masked_add("u8", Type::Uint(8)),
        masked_add("i8", Type::Int(8)),
    ]);
    let mut vm = Vm::new(&contract);

    let out = vm.call("u8", vec![250.into(), 10.into()]).unwrap();
    assert_eq!(out, Outcome::Return(vec![4.into()]));

    let out = vm.call("i8", vec![120.into(), 10.into()]).unwrap();
    assert_eq!(out, Outcome::Return(vec![BigInt::from(-126)]));
}

#[test]
fn test_revert_rolls_back_storage() {
    let mut store = FunctionBuilder::new("store(uint256)");
    let v = store.param("v", Type::Uint(256));
    store.ins().unwrap().storage_store(Value::zero(), v);
    store.return_values(vec![]).unwrap();

    let mut store_then_revert = FunctionBuilder::new("storeThenRevert(uint256)");
    let v = store_then_revert.param("v", Type::Uint(256));
    store_then_revert.ins().unwrap().storage_store(Value::zero(), v);
    store_then_revert.revert(Value::int(3)).unwrap();

    let contract = contract_with(vec![store, store_then_revert]);
    let mut vm = Vm::new(&contract);

    assert!(vm.call("store(uint256)", vec![7.into()]).unwrap().is_success());
    assert_eq!(vm.storage(&BigInt::from(0)), BigInt::from(7));

    let out = vm.call("storeThenRevert(uint256)", vec![9.into()]).unwrap();
    assert_eq!(out, Outcome::Revert(3.into()));
    assert_eq!(vm.storage(&BigInt::from(0)), BigInt::from(7));
}

#[test]
fn test_internal_call_panic_aborts_caller() {
    let mut check = FunctionBuilder::new("Test.check(uint256)");
    let x = check.param("x", Type::Uint(256));
    let ok = check.create_block("ok");
    let fail = check.create_block("fail");
    let small = check.ins().unwrap().lt(x, Value::int(10));
    check.branch(small, ok, fail).unwrap();
    check.switch_to_block(ok).unwrap();
    check.return_values(vec![]).unwrap();
    check.switch_to_block(fail).unwrap();
    check.panic().unwrap();

    let mut outer = FunctionBuilder::new("outer(uint256)");
    let x = outer.param("x", Type::Uint(256));
    outer.ins().unwrap().storage_store(Value::one(), Value::one());
    outer.ins().unwrap().call("Test.check(uint256)", vec![x], 0);
    outer.ins().unwrap().storage_store(Value::int(2), Value::one());
    outer.return_values(vec![]).unwrap();

    let contract = contract_with(vec![check, outer]);
    let mut vm = Vm::new(&contract);

    assert!(vm.call("outer(uint256)", vec![3.into()]).unwrap().is_success());
    assert_eq!(vm.storage_entries().len(), 2);

    vm.set_storage(1.into(), 0.into());
    vm.set_storage(2.into(), 0.into());
    assert_eq!(vm.call("outer(uint256)", vec![30.into()]).unwrap(), Outcome::Panic);
    assert!(vm.storage_entries().is_empty());
}

#[test]
fn test_mapping_slots_hash_key_then_base() {
    let mut set = FunctionBuilder::new("set(address,uint256)");
    let key = set.param("key", Type::Address);
    let value = set.param("value", Type::Uint(256));
    let slot = set.ins().unwrap().mapping_slot(Value::int(4), key);
    set.ins().unwrap().storage_store(slot, value);
    set.return_values(vec![]).unwrap();

    let contract = contract_with(vec![set]);
    let mut vm = Vm::new(&contract);
    vm.call("set(address,uint256)", vec![0xbeef.into(), 99.into()])
        .unwrap();

    let expected_slot = keccak_words(&[0xbeef.into(), 4.into()]);
    assert_eq!(vm.storage(&expected_slot), BigInt::from(99));
}

#[test]
fn test_memory_is_fresh_per_call() {
    let mut alloc = FunctionBuilder::new("alloc()");
    alloc.returns(vec![Type::Uint(256)]);
    let ptr = alloc.ins().unwrap().allocate_memory(Value::int(3));
    alloc.ins().unwrap().memory_store(ptr.clone(), Value::int(5));
    let loaded = alloc.ins().unwrap().memory_load(ptr.clone());
    let sum = alloc.ins().unwrap().binary(BinaryOp::Add, ptr, loaded);
    alloc.return_values(vec![sum]).unwrap();

    let contract = contract_with(vec![alloc]);
    let mut vm = Vm::new(&contract);
    let first = vm.call("alloc()", vec![]).unwrap();
    let second = vm.call("alloc()", vec![]).unwrap();
    assert_eq!(first, Outcome::Return(vec![6.into()]));
    assert_eq!(first, second);
}

#[test]
fn test_step_limit_stops_infinite_loop() {
    let mut spin = FunctionBuilder::new("spin()");
    let header = spin.create_block("loop");
    spin.jump(header).unwrap();
    spin.switch_to_block(header).unwrap();
    spin.jump(header).unwrap();

    let contract = contract_with(vec![spin]);
    let mut vm = Vm::with_config(&contract, VmConfig { max_steps: 100 });
    assert_eq!(vm.call("spin()", vec![]), Err(VmError::StepLimit(100)));
}

#[test]
fn test_external_calls_are_unsupported() {
    let mut ping = FunctionBuilder::new("ping(address)");
    let target = ping.param("target", Type::Address);
    ping.ins()
        .unwrap()
        .call_external(target, "pong()", vec![], Value::zero(), Value::zero(), 0);
    ping.return_values(vec![]).unwrap();

    let contract = contract_with(vec![ping]);
    let mut vm = Vm::new(&contract);
    assert!(matches!(
        vm.call("ping(address)", vec![1.into()]),
        Err(VmError::Unsupported(_))
    ));
    assert!(matches!(
        vm.call("missing()", vec![]),
        Err(VmError::MissingFunction(_))
    ));
}

#[test]
fn test_environment_feeds_context_reads() {
    let mut who = FunctionBuilder::new("who()");
    who.returns(vec![Type::Address, Type::Uint(256)]);
    let sender = who.ins().unwrap().msg_sender();
    let value = who.ins().unwrap().msg_value();
    who.return_values(vec![sender, value]).unwrap();

    let contract = contract_with(vec![who]);
    let mut vm = Vm::new(&contract);
    vm.env.msg_sender = 0xabc.into();
    vm.env.msg_value = 12.into();
    assert_eq!(
        vm.call("who()", vec![]).unwrap(),
        Outcome::Return(vec![0xabc.into(), 12.into()])
    );
}

use contrail_core::{
    builder::{FunctionBuilder, InstBuilder, InstBuilderExt},
    function::{Mutability, Visibility},
    types::Type,
    values::Value,
    Contract,
};
use contrail_emit::{ContrailEmitter, Emitter, EmitterConfig};
use pretty_assertions::assert_eq;

fn counter() -> Contract {
    let mut contract = Contract::new("Counter");
    contract
        .storage_layout
        .add_variable("Counter.count", Type::Uint(8), 0, 1);

    let mut func = FunctionBuilder::new("bump(uint8)");
    let by = func.param("by", Type::Uint(8));
    func.returns(vec![Type::Uint(8)]);
    func.visibility(Visibility::Public)
        .mutability(Mutability::NonPayable);
    let revert = func.create_block("revert");
    let body = func.create_block("body");
    let value = func.ins().unwrap().msg_value();
    let paid = func.ins().unwrap().ne(value, Value::zero());
    func.branch(paid, revert, body).unwrap();
    func.switch_to_block(revert).unwrap();
    func.revert(Value::zero()).unwrap();
    func.switch_to_block(body).unwrap();
    let old = func.ins().unwrap().storage_load(Value::zero());
    let sum = func.ins().unwrap().add(old, by);
    let masked = func.ins().unwrap().truncate(sum, 8);
    func.ins()
        .unwrap()
        .storage_store(Value::zero(), masked.clone());
    func.return_values(vec![masked]).unwrap();

    contract.add_function(func.build().unwrap());
    contract
}

#[test]
fn test_renders_contract_text() {
    let text = ContrailEmitter::default().render(&counter()).unwrap();
    let expected = r#"contract Counter {
    // storage
    slot 0: Counter.count uint8

    public function @"bump(uint8)"(%by: uint8) -> (uint8) {
        block0 (entry):
            %0 = msg.value
            %1 = ne %0, 0
            br %1, block1, block2
        block1 (revert):
            revert 0
        block2 (body):
            %2 = sload 0
            %3 = add %2, %by
            %4 = trunc.8 %3
            sstore 0, %4
            ret %4
    }
}
"#;
    assert_eq!(text, expected);
}

#[test]
fn test_rendering_is_deterministic() {
    let emitter = ContrailEmitter::default();
    let first = emitter.render(&counter()).unwrap();
    let second = emitter.render(&counter()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_layout_and_types_can_be_hidden() {
    let emitter = ContrailEmitter::new(EmitterConfig {
        show_storage_layout: false,
        show_types: false,
        ..EmitterConfig::default()
    });
    let text = emitter.render(&counter()).unwrap();
    assert!(!text.contains("slot 0"));
    assert!(text.contains("@\"bump(uint8)\"(%by) -> (uint8)"));
}

#[test]
fn test_emit_to_string_uses_trait_default() {
    let emitter = ContrailEmitter::default();
    let text = emitter.emit_to_string(&counter()).unwrap();
    assert!(text.starts_with("contract Counter {"));
    assert!(text.contains("revert 0"));
}

#[test]
fn test_multi_result_calls_and_copies() {
    let emitter = ContrailEmitter::default();
    let types = contrail_core::TypeRegistry::new();
    let mut func = FunctionBuilder::new("f()");
    let results = func.ins().unwrap().call("pair()", vec![Value::int(1)], 2);
    func.ins().unwrap().copy_storage_to_storage(
        Value::int(3),
        Value::int(4),
        Type::Array(Box::new(Type::Uint(256)), None),
    );
    func.return_values(vec![]).unwrap();
    let function = func.build().unwrap();
    let insts = &function.body.blocks[0].instructions;

    assert_eq!(
        emitter.format_instruction(&types, &insts[0]),
        format!("{}, {} = call @\"pair()\"(1)", results[0], results[1])
    );
    assert_eq!(
        emitter.format_instruction(&types, &insts[1]),
        "copy.s2s 3, 4 : uint256[]"
    );
}

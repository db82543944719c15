use contrail_codegen::ast::{ContractRef, SourceUnit, StateMutability, TypeName, Visibility};
use contrail_codegen::{
    compile_contract, compile_source_unit, CodegenConfig, CodegenError, CompiledContracts,
    SourceUnitBuilder,
};
use pretty_assertions::assert_eq;

fn compile(unit: &SourceUnit, contract: ContractRef) -> Result<contrail_core::Contract, CodegenError> {
    compile_contract(unit, contract, &CompiledContracts::new(), &CodegenConfig::default())
}

#[test]
fn test_break_outside_loop() {
    let mut b = SourceUnitBuilder::new();
    let c = b.contract("C", &[]);
    let f = b.function(c, "f", Visibility::Public, StateMutability::NonPayable);
    let stop = b.break_stmt();
    let node = stop.id;
    b.set_body(f, vec![stop]);
    let unit = b.finish();

    assert_eq!(compile(&unit, c).unwrap_err(), CodegenError::BreakOutsideLoop { node });
}

#[test]
fn test_continue_does_not_escape_into_a_modifier_loop() {
    // modifier looped { while (true) { _; break; } }
    let mut b = SourceUnitBuilder::new();
    let c = b.contract("C", &[]);
    let m = b.modifier(c, "looped");
    let placeholder = b.placeholder();
    let stop = b.break_stmt();
    let body = b.block_stmt(vec![placeholder, stop]);
    let yes = b.boolean(true);
    let looped = b.while_loop(yes, body);
    b.set_modifier_body(m, vec![looped]);

    let f = b.function(c, "f", Visibility::Public, StateMutability::NonPayable);
    let next = b.continue_stmt();
    let node = next.id;
    b.set_body(f, vec![next]);
    b.add_modifier(f, "looped", vec![]);
    let unit = b.finish();

    assert_eq!(compile(&unit, c).unwrap_err(), CodegenError::ContinueOutsideLoop { node });
}

#[test]
fn test_placeholder_outside_modifier() {
    let mut b = SourceUnitBuilder::new();
    let c = b.contract("C", &[]);
    let f = b.function(c, "f", Visibility::Public, StateMutability::NonPayable);
    let placeholder = b.placeholder();
    let node = placeholder.id;
    b.set_body(f, vec![placeholder]);
    let unit = b.finish();

    assert_eq!(
        compile(&unit, c).unwrap_err(),
        CodegenError::PlaceholderOutsideModifier { node }
    );
}

#[test]
fn test_unknown_modifier() {
    let mut b = SourceUnitBuilder::new();
    let c = b.contract("C", &[]);
    let f = b.function(c, "f", Visibility::Public, StateMutability::NonPayable);
    b.set_body(f, vec![]);
    b.add_modifier(f, "onlyOwner", vec![]);
    let unit = b.finish();

    let err = compile(&unit, c).unwrap_err();
    assert!(
        matches!(&err, CodegenError::ModifierNotFound { name, .. } if name == "onlyOwner"),
        "{err}"
    );
}

#[test]
fn test_modifier_argument_count() {
    let mut b = SourceUnitBuilder::new();
    let c = b.contract("C", &[]);
    let m = b.modifier(c, "limited");
    b.modifier_parameter(m, "max", TypeName::uint256());
    let placeholder = b.placeholder();
    b.set_modifier_body(m, vec![placeholder]);

    let f = b.function(c, "f", Visibility::Public, StateMutability::NonPayable);
    b.set_body(f, vec![]);
    b.add_modifier(f, "limited", vec![]);
    let unit = b.finish();

    let err = compile(&unit, c).unwrap_err();
    assert!(
        matches!(err, CodegenError::ArityMismatch { expected: 1, found: 0, .. }),
        "{err}"
    );
}

#[test]
fn test_base_constructor_arguments_are_unsupported() {
    let mut b = SourceUnitBuilder::new();
    let base = b.contract("Base", &[]);
    let ctor = b.constructor(base, StateMutability::NonPayable);
    b.parameter(ctor, "seed", TypeName::uint256());
    b.set_body(ctor, vec![]);
    let derived = b.contract("Derived", &[base]);
    let unit = b.finish();

    let err = compile(&unit, derived).unwrap_err();
    assert!(matches!(err, CodegenError::UnsupportedFeature { .. }), "{err}");
}

#[test]
fn test_inline_assembly_is_rejected() {
    let mut b = SourceUnitBuilder::new();
    let c = b.contract("C", &[]);
    let f = b.function(c, "f", Visibility::Public, StateMutability::NonPayable);
    let asm = b.assembly();
    b.set_body(f, vec![asm]);
    let unit = b.finish();

    let err = compile(&unit, c).unwrap_err();
    assert!(
        matches!(&err, CodegenError::UnsupportedFeature { feature, .. } if feature == "inline assembly"),
        "{err}"
    );
}

#[test]
fn test_new_requires_a_compiled_sibling() {
    let mut b = SourceUnitBuilder::new();
    let factory = b.contract("Factory", &[]);
    let child = b.contract("Child", &[]);
    let make = b.function(factory, "make", Visibility::Public, StateMutability::NonPayable);
    let created = b.new_contract(child, vec![]);
    let created = b.expr_stmt(created);
    b.set_body(make, vec![created]);
    let unit = b.finish();

    let err = compile(&unit, factory).unwrap_err();
    assert!(
        matches!(&err, CodegenError::SiblingNotCompiled { name, .. } if name == "Child"),
        "{err}"
    );
}

#[test]
fn test_mutual_creation_is_rejected() {
    let mut b = SourceUnitBuilder::new();
    let ping = b.contract("Ping", &[]);
    let pong = b.contract("Pong", &[]);
    for (owner, target) in [(ping, pong), (pong, ping)] {
        let f = b.function(owner, "spawn", Visibility::Public, StateMutability::NonPayable);
        let created = b.new_contract(target, vec![]);
        let created = b.expr_stmt(created);
        b.set_body(f, vec![created]);
    }
    let unit = b.finish();

    let err = compile_source_unit(&unit, &CodegenConfig::default()).unwrap_err();
    assert!(matches!(err, CodegenError::SiblingNotCompiled { .. }), "{err}");
}

#[test]
fn test_inconsistent_bases_fail_to_linearize() {
    let mut b = SourceUnitBuilder::new();
    let x = b.contract("X", &[]);
    let y = b.contract("Y", &[x]);
    let z = b.contract("Z", &[y, x]);
    let unit = b.finish();

    let err = compile(&unit, z).unwrap_err();
    assert!(
        matches!(&err, CodegenError::InheritanceLinearization { contract, .. } if contract == "Z"),
        "{err}"
    );
}

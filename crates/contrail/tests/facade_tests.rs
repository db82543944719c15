use contrail::ast::{StateMutability, TypeName, Visibility};
use contrail::{compile_to_dir, compile_to_text, ir_persist, CodegenConfig, SourceUnitBuilder};
use pretty_assertions::assert_eq;

fn factory_unit() -> contrail::ast::SourceUnit {
    let mut b = SourceUnitBuilder::new();
    let factory = b.contract("Factory", &[]);
    let child = b.contract("Child", &[]);
    b.state_variable(child, "seed", TypeName::uint256(), Visibility::Public);

    let make = b.function(factory, "make", Visibility::Public, StateMutability::NonPayable);
    b.return_parameter(make, "", TypeName::Contract(child));
    let created = b.new_contract(child, vec![]);
    let ret = b.ret(Some(created));
    b.set_body(make, vec![ret]);
    b.finish()
}

#[test]
fn test_text_lists_created_contracts_first() {
    let text = compile_to_text(&factory_unit(), &CodegenConfig::default()).unwrap();
    let child = text.find("contract Child").unwrap();
    let factory = text.find("contract Factory").unwrap();
    assert!(child < factory);
    assert!(text.contains("seed()"));
}

#[test]
fn test_contracts_saved_to_a_directory_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let unit = factory_unit();
    let written = compile_to_dir(&unit, &CodegenConfig::default(), dir.path()).unwrap();
    assert_eq!(written.len(), 2);

    let compiled = contrail::compile_source_unit(&unit, &CodegenConfig::default()).unwrap();
    for contract in compiled.values() {
        let loaded = ir_persist::load_contract(dir.path().join(format!("{}.json", contract.name))).unwrap();
        assert_eq!(
            ir_persist::fingerprint(&loaded).unwrap(),
            ir_persist::fingerprint(contract).unwrap()
        );
    }
}

use crate::contract::Contract;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;

pub fn save_contract(contract: &Contract, path: impl AsRef<Path>) -> io::Result<()> {
    let json = serde_json::to_string_pretty(contract)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    fs::write(path, json)?;
    Ok(())
}

pub fn load_contract(path: impl AsRef<Path>) -> io::Result<Contract> {
    let json = fs::read_to_string(path)?;
    let contract =
        serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    Ok(contract)
}

/// SHA-256 over the compact JSON encoding, as lowercase hex. Two contracts
/// with equal fingerprints have identical functions, blocks and layout.
pub fn fingerprint(contract: &Contract) -> io::Result<String> {
    let bytes =
        serde_json::to_vec(contract).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::types::Type;
    use crate::Contract;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    fn sample() -> Contract {
        let mut contract = Contract::new("Vault");
        contract
            .storage_layout
            .add_variable("Vault.total", Type::Uint(256), 0, 1);
        let mut func = FunctionBuilder::new("total()");
        func.returns(vec![Type::Uint(256)]);
        func.return_values(vec![crate::Value::zero()]).unwrap();
        contract.add_function(func.build().unwrap());
        contract
    }

    #[test]
    fn test_save_load_contract() {
        let contract = sample();
        let temp_file = NamedTempFile::new().unwrap();

        save_contract(&contract, temp_file.path()).unwrap();

        let loaded = load_contract(temp_file.path()).unwrap();
        assert_eq!(loaded.name, "Vault");
        assert_eq!(loaded.functions.len(), 1);
        assert_eq!(fingerprint(&loaded).unwrap(), fingerprint(&contract).unwrap());
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let a = sample();
        let mut b = sample();
        b.storage_layout
            .add_variable("Vault.owner", Type::Address, 1, 1);
        assert_eq!(fingerprint(&a).unwrap().len(), 64);
        assert!(fingerprint(&a).unwrap() != fingerprint(&b).unwrap());
    }
}

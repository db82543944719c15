use super::VmError;
use num_bigint::{BigInt, Sign};
use num_traits::{One, ToPrimitive, Zero};
use std::collections::BTreeMap;
use tiny_keccak::{Hasher, Keccak};

const MAX_MEMORY_CELLS: usize = 1 << 24;

/// Storage and memory of a running VM.
///
/// Memory cell 0 is never handed out, so a zero pointer always means
/// "no object".
#[derive(Debug, Default)]
pub(super) struct State {
    pub storage: BTreeMap<BigInt, BigInt>,
    pub memory: Memory,
}

#[derive(Debug, Default)]
pub(super) struct Memory {
    cells: Vec<BigInt>,
}

impl Memory {
    pub fn clear(&mut self) {
        self.cells.clear();
        self.cells.push(BigInt::zero());
    }

    fn index(&self, address: &BigInt) -> Result<usize, VmError> {
        address
            .to_usize()
            .filter(|a| *a > 0 && *a < self.cells.len())
            .ok_or_else(|| VmError::Runtime(format!("memory access out of bounds at {}", address)))
    }
}

impl State {
    pub fn sload(&self, slot: &BigInt) -> BigInt {
        self.storage.get(slot).cloned().unwrap_or_default()
    }

    pub fn sstore(&mut self, slot: BigInt, value: BigInt) {
        if value.is_zero() {
            self.storage.remove(&slot);
        } else {
            self.storage.insert(slot, value);
        }
    }

    pub fn mload(&self, address: &BigInt) -> Result<BigInt, VmError> {
        let index = self.memory.index(address)?;
        Ok(self.memory.cells[index].clone())
    }

    pub fn mstore(&mut self, address: &BigInt, value: BigInt) -> Result<(), VmError> {
        let index = self.memory.index(address)?;
        self.memory.cells[index] = value;
        Ok(())
    }

    /// Reserves `size` zeroed cells and returns the address of the first.
    pub fn allocate(&mut self, size: &BigInt) -> Result<BigInt, VmError> {
        if self.memory.cells.is_empty() {
            self.memory.clear();
        }
        let base = self.memory.cells.len();
        let size = size
            .to_usize()
            .filter(|s| base + s <= MAX_MEMORY_CELLS)
            .ok_or_else(|| VmError::Runtime(format!("cannot allocate {} memory cells", size)))?;
        // Zero-sized objects still get a distinct, valid address.
        let reserved = size.max(1);
        self.memory
            .cells
            .resize(base + reserved, BigInt::zero());
        Ok(BigInt::from(base))
    }
}

/// Big-endian 32-byte encoding of `value mod 2^256`.
pub fn word_bytes(value: &BigInt) -> [u8; 32] {
    let modulus_mask = (BigInt::one() << 256usize) - 1;
    let (_, bytes) = (value & &modulus_mask).to_bytes_be();
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    word
}

/// Keccak-256 over the concatenated 32-byte words of `values`.
pub fn keccak_words(values: &[BigInt]) -> BigInt {
    let mut keccak = Keccak::v256();
    for value in values {
        keccak.update(&word_bytes(value));
    }
    let mut output = [0u8; 32];
    keccak.finalize(&mut output);
    BigInt::from_bytes_be(Sign::Plus, &output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_wrap_negative_values() {
        let word = word_bytes(&BigInt::from(-1));
        assert!(word.iter().all(|b| *b == 0xff));
        assert_eq!(word_bytes(&BigInt::from(258))[30..], [1, 2]);
    }

    #[test]
    fn keccak_of_empty_input() {
        let expected = BigInt::parse_bytes(
            b"c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470",
            16,
        )
        .unwrap();
        assert_eq!(keccak_words(&[]), expected);
    }

    #[test]
    fn memory_bounds() {
        let mut state = State::default();
        let base = state.allocate(&BigInt::from(2)).unwrap();
        assert_eq!(base, BigInt::one());
        state.mstore(&BigInt::from(2), BigInt::from(7)).unwrap();
        assert_eq!(state.mload(&BigInt::from(2)).unwrap(), BigInt::from(7));
        assert!(state.mload(&BigInt::zero()).is_err());
        assert!(state.mload(&BigInt::from(3)).is_err());
    }
}

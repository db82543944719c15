use super::types::canonical_type_name;
use super::ContractCompiler;
use crate::ast::{
    ContractKind, ContractRef, FunctionKind, FunctionRef, ModifierRef, NodeId, SourceUnit,
    StateMutability,
};
use crate::errors::{CodegenError, Result};

/// C3 linearization of `contract`, most-derived first.
///
/// Bases are declared most base-like first, so `contract C is A, B`
/// linearizes to `[C, B, A]`.
pub fn linearize(unit: &SourceUnit, contract: ContractRef) -> Result<Vec<ContractRef>> {
    let mut visiting = Vec::new();
    c3(unit, contract, &mut visiting)
}

fn c3(
    unit: &SourceUnit,
    contract: ContractRef,
    visiting: &mut Vec<ContractRef>,
) -> Result<Vec<ContractRef>> {
    let def = unit.contract(contract);
    let impossible = || CodegenError::InheritanceLinearization {
        node: def.id,
        contract: def.name.clone(),
    };
    if visiting.contains(&contract) {
        return Err(impossible());
    }
    visiting.push(contract);

    let mut sequences = Vec::new();
    for base in def.bases.iter().rev() {
        sequences.push(c3(unit, *base, visiting)?);
    }
    sequences.push(def.bases.iter().rev().copied().collect());
    visiting.pop();

    let mut result = vec![contract];
    loop {
        sequences.retain(|s| !s.is_empty());
        if sequences.is_empty() {
            return Ok(result);
        }
        let head = sequences
            .iter()
            .map(|s| s[0])
            .find(|candidate| sequences.iter().all(|s| !s[1..].contains(candidate)))
            .ok_or_else(impossible)?;
        result.push(head);
        for s in &mut sequences {
            if s[0] == head {
                s.remove(0);
            }
        }
    }
}

impl ContractCompiler<'_> {
    /// `name(type,...)` with canonical parameter types.
    pub(crate) fn function_signature(&self, function: FunctionRef) -> String {
        let def = self.unit.function(function);
        let params = def
            .parameters
            .iter()
            .map(|p| canonical_type_name(self.unit, &self.unit.variable(*p).ty))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}({})", def.name, params)
    }

    fn in_linearization(&self, contract: ContractRef) -> bool {
        self.linearization.contains(&contract)
    }

    /// The implementation a call to `function` dispatches to.
    ///
    /// Scans the linearization for the first implemented function with
    /// the same signature. With `search_after`, the scan starts after that
    /// contract, which is how `super` reaches one step up the chain.
    pub(crate) fn resolve_virtual_function(
        &self,
        function: FunctionRef,
        search_after: Option<ContractRef>,
        node: NodeId,
    ) -> Result<FunctionRef> {
        let def = self.unit.function(function);
        if !self.in_linearization(def.contract) {
            return if def.is_implemented() {
                Ok(function)
            } else {
                Err(CodegenError::UnresolvedFunction {
                    node,
                    name: def.name.clone(),
                })
            };
        }

        let start = match search_after {
            Some(after) => self
                .linearization
                .iter()
                .position(|c| *c == after)
                .map_or(0, |i| i + 1),
            None => 0,
        };
        let signature = self.function_signature(function);
        for contract in &self.linearization[start..] {
            for candidate in &self.unit.contract(*contract).functions {
                let cdef = self.unit.function(*candidate);
                if cdef.kind == def.kind
                    && cdef.is_implemented()
                    && self.function_signature(*candidate) == signature
                {
                    return Ok(*candidate);
                }
            }
        }
        Err(CodegenError::UnresolvedFunction {
            node,
            name: signature,
        })
    }

    pub(crate) fn is_most_derived(&self, function: FunctionRef) -> bool {
        let node = self.unit.function(function).id;
        matches!(self.resolve_virtual_function(function, None, node), Ok(f) if f == function)
    }

    /// Whether `function` is reachable from outside the contract being
    /// compiled: the most-derived fallback or public/external function
    /// of the contract or one of its bases.
    pub(crate) fn is_entry_point(&self, function: FunctionRef) -> bool {
        let def = self.unit.function(function);
        let foreign_library = self.unit.contract(def.contract).kind == ContractKind::Library
            && def.contract != self.contract;
        let callable = match def.kind {
            FunctionKind::Constructor => false,
            FunctionKind::Fallback => true,
            FunctionKind::Function => def.visibility.is_externally_callable(),
        };
        callable && !foreign_library && self.is_most_derived(function)
    }

    /// Whether the entry point for `function` reverts when called with value.
    pub(crate) fn rejects_value(&self, function: FunctionRef) -> bool {
        let def = self.unit.function(function);
        self.is_entry_point(function)
            && def.mutability != StateMutability::Payable
            && self.unit.contract(def.contract).kind != ContractKind::Library
    }

    /// `Owner.signature`, the name of a function lowered without the
    /// entry-point checks.
    pub(crate) fn qualified_name(&self, function: FunctionRef) -> String {
        let def = self.unit.function(function);
        let owner = &self.unit.contract(def.contract).name;
        match def.kind {
            FunctionKind::Fallback => format!("{}.fallback", owner),
            _ => format!("{}.{}", owner, self.function_signature(function)),
        }
    }

    /// Name of the IR function emitted for `function`.
    ///
    /// Externally visible entry points keep their canonical signature;
    /// everything else is qualified with the defining contract so that
    /// overridden bases and private helpers never clash.
    pub(crate) fn function_name(&self, function: FunctionRef) -> String {
        let def = self.unit.function(function);
        match def.kind {
            FunctionKind::Constructor => "init".to_string(),
            _ if !self.is_entry_point(function) => self.qualified_name(function),
            FunctionKind::Fallback => "fallback".to_string(),
            FunctionKind::Function => self.function_signature(function),
        }
    }

    /// Modifiers are virtual too: the most-derived definition wins.
    pub(crate) fn resolve_modifier(&self, name: &str, node: NodeId) -> Result<ModifierRef> {
        for contract in &self.linearization {
            for m in &self.unit.contract(*contract).modifiers {
                if self.unit.modifier(*m).name == name {
                    return Ok(*m);
                }
            }
        }
        if self
            .linearization
            .iter()
            .any(|c| self.unit.contract(*c).name == name)
        {
            return Err(CodegenError::unsupported(node, "base constructor arguments"));
        }
        Err(CodegenError::ModifierNotFound {
            node,
            name: name.to_string(),
        })
    }

    /// Constructor declared directly in `contract`, if any.
    pub(crate) fn constructor_of(&self, contract: ContractRef) -> Option<FunctionRef> {
        self.unit
            .contract(contract)
            .functions
            .iter()
            .copied()
            .find(|f| self.unit.function(*f).kind == FunctionKind::Constructor)
    }

    /// True when some contract in the linearization declares a function
    /// without implementing it anywhere down the chain.
    pub(crate) fn is_abstract(&self) -> bool {
        self.linearization.iter().any(|contract| {
            self.unit.contract(*contract).functions.iter().any(|f| {
                let def = self.unit.function(*f);
                def.kind == FunctionKind::Function
                    && !def.is_implemented()
                    && self.resolve_virtual_function(*f, None, def.id).is_err()
            })
        })
    }
}

use crate::ast::VariableRef;
use contrail_core::Value;
use std::collections::HashMap;

/// Hands out register names that are unique within one function.
///
/// The first request for a base name gets it verbatim, later ones get
/// `base.1`, `base.2`, ... Numeric temporaries never collide because
/// source identifiers cannot start with a digit.
#[derive(Debug, Default)]
pub(crate) struct NameAllocator {
    counters: HashMap<String, u32>,
}

impl NameAllocator {
    pub fn fresh(&mut self, base: &str) -> String {
        let base = if base.is_empty() { "_" } else { base };
        let counter = self.counters.entry(base.to_string()).or_insert(0);
        let name = if *counter == 0 {
            base.to_string()
        } else {
            format!("{}.{}", base, counter)
        };
        *counter += 1;
        name
    }
}

/// Maps variable declarations to the registers that hold them.
///
/// Parameters and return variables live in the function scope. Each
/// modifier expansion pushes a layer of its own, so the same declaration
/// expanded twice maps to two different registers.
#[derive(Debug, Default)]
pub(crate) struct RenameTable {
    function_scope: HashMap<VariableRef, Value>,
    layers: Vec<HashMap<VariableRef, Value>>,
}

impl RenameTable {
    pub fn lookup(&self, var: VariableRef) -> Option<&Value> {
        self.layers
            .last()
            .and_then(|layer| layer.get(&var))
            .or_else(|| self.function_scope.get(&var))
    }

    pub fn declare(&mut self, var: VariableRef, value: Value) {
        match self.layers.last_mut() {
            Some(layer) => layer.insert(var, value),
            None => self.function_scope.insert(var, value),
        };
    }

    pub fn declare_in_function_scope(&mut self, var: VariableRef, value: Value) {
        self.function_scope.insert(var, value);
    }

    pub fn push_layer(&mut self) {
        self.layers.push(HashMap::new());
    }

    pub fn pop_layer(&mut self) {
        self.layers.pop();
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fresh_names_are_unique() {
        let mut names = NameAllocator::default();
        assert_eq!(names.fresh("x"), "x");
        assert_eq!(names.fresh("x"), "x.1");
        assert_eq!(names.fresh("y"), "y");
        assert_eq!(names.fresh("x"), "x.2");
        assert_eq!(names.fresh(""), "_");
    }

    #[test]
    fn test_layers_shadow_function_scope() {
        let mut table = RenameTable::default();
        let param = VariableRef(0);
        let local = VariableRef(1);
        table.declare(param, Value::local("p"));

        table.push_layer();
        table.declare(local, Value::local("l"));
        assert_eq!(table.lookup(param), Some(&Value::local("p")));
        assert_eq!(table.lookup(local), Some(&Value::local("l")));

        table.push_layer();
        assert_eq!(table.lookup(local), None);
        table.declare(local, Value::local("l.1"));
        assert_eq!(table.lookup(local), Some(&Value::local("l.1")));
        table.pop_layer();

        assert_eq!(table.lookup(local), Some(&Value::local("l")));
        assert_eq!(table.depth(), 1);
    }
}

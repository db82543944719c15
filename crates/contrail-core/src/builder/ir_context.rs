use crate::values::Value;
use serde::{Deserialize, Serialize};

/// Hands out numbered temporaries (`%0`, `%1`, ...). Numeric names can never
/// collide with source-derived locals, which always start with a letter or `_`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TempTracker {
    next_temp: u32,
}

impl TempTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_temp(&mut self) -> Value {
        let id = self.next_temp;
        self.next_temp += 1;
        Value::Local(id.to_string())
    }

    pub fn allocated(&self) -> u32 {
        self.next_temp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temps_are_sequential() {
        let mut temps = TempTracker::new();
        assert_eq!(temps.new_temp(), Value::local("0"));
        assert_eq!(temps.new_temp(), Value::local("1"));
        assert_eq!(temps.allocated(), 2);
    }
}

use std::collections::HashMap;

/// Hands out storage keys of the form `{name}_{n}`, where `n` counts how many layers with the
/// same name were visited before. After `revert`, keys are handed out in the opposite order so
/// that a backward pass (which visits layers last to first) sees the same keys as the forward pass.
pub struct KeyAssigner {
    keys: HashMap<String, u16>,
    reversed: bool,
}

impl KeyAssigner {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
            reversed: false,
        }
    }

    pub fn get_key(&mut self, name: String) -> String {
        let current = self.keys.get(&name).copied().unwrap_or(0);
        if self.reversed {
            let index = current.saturating_sub(1);
            let key = format!("{}_{}", name, index);
            self.keys.insert(name, index);
            key
        } else {
            let key = format!("{}_{}", name, current);
            self.keys.insert(name, current + 1);
            key
        }
    }

    /// Switch direction. Used between forward, backward and train passes.
    pub fn revert(&mut self) {
        self.reversed = !self.reversed;
    }
}

impl Default for KeyAssigner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_mirrors_forward_order() {
        let mut assigner = KeyAssigner::new();
        let forward: Vec<_> = ["conv", "bn", "conv"].iter()
            .map(|o| assigner.get_key(o.to_string()))
            .collect();
        assert_eq!(forward, vec!["conv_0", "bn_0", "conv_1"]);

        assigner.revert();
        let backward: Vec<_> = ["conv", "bn", "conv"].iter()
            .map(|o| assigner.get_key(o.to_string()))
            .collect();
        assert_eq!(backward, vec!["conv_1", "bn_0", "conv_0"]);

        assigner.revert();
        assert_eq!(assigner.get_key("conv".to_owned()), "conv_0");
    }
}

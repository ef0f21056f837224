use std::collections::{BTreeMap, HashMap};

/// Session-scoped string map behind `window.localStorage`.
#[derive(Debug, Default, Clone)]
pub struct LocalStorage {
    data: BTreeMap<String, String>,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(seed: &HashMap<String, String>) -> Self {
        Self {
            data: seed
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn set_item(&mut self, key: &str, value: &str) {
        self.data.insert(key.to_string(), value.to_string());
    }

    pub fn remove_item(&mut self, key: &str) {
        self.data.remove(key);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Keys are enumerated in sorted order.
    pub fn key(&self, index: usize) -> Option<&str> {
        self.data.keys().nth(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.data
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

use crate::objects::{Object, ObjectId};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Dictionary {
    entries: HashMap<String, Object>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Object>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Object> {
        self.entries.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Object> {
        self.entries.values()
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = (&String, &mut Object)> {
        self.entries.iter_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.entries.iter()
    }

    /// Entries ordered by key, for deterministic output.
    pub fn sorted_entries(&self) -> Vec<(&String, &Object)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn get_dict(&self, key: &str) -> Option<&Dictionary> {
        self.get(key).and_then(|obj| match obj {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        })
    }

    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_name)
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Object::as_integer)
    }

    pub fn get_array(&self, key: &str) -> Option<&Vec<Object>> {
        self.get(key).and_then(Object::as_array)
    }

    pub fn get_reference(&self, key: &str) -> Option<ObjectId> {
        self.get(key).and_then(Object::as_reference)
    }

    /// Value of `/Type`.
    pub fn type_name(&self) -> Option<&str> {
        self.get_name("Type")
    }

    pub fn has_type(&self, expected: &str) -> bool {
        self.type_name() == Some(expected)
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<(String, Object)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (String, Object)>>(iter: T) -> Self {
        let mut dict = Dictionary::new();
        for (key, value) in iter {
            dict.set(key, value);
        }
        dict
    }
}

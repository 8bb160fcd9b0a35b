//! Head configuration records
//!
//! A [`HeadConfig`] is an immutable key/value record handed to head
//! constructors, e.g. `{ "target_dim": 0 }`. Values are JSON so the same
//! record can come from code, a TOML manifest or a saved snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipeError, Result};

/// Immutable key/value record of head constructor arguments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeadConfig {
    values: BTreeMap<String, Value>,
}

impl HeadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; returns a new record
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Overlay `other` on top of this record; keys in `other` win
    pub fn merged(&self, other: &HeadConfig) -> HeadConfig {
        let mut values = self.values.clone();
        for (k, v) in &other.values {
            values.insert(k.clone(), v.clone());
        }
        HeadConfig { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Optional non-negative integer
    pub fn usize_opt(&self, key: &str) -> Result<Option<usize>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .map(|n| Some(n as usize))
                .ok_or_else(|| type_error(key, "a non-negative integer", v)),
        }
    }

    /// Required non-negative integer
    pub fn usize_required(&self, key: &str) -> Result<usize> {
        self.usize_opt(key)?
            .ok_or_else(|| PipeError::InvalidConfig(format!("missing required key '{}'", key)))
    }

    pub fn u64_or(&self, key: &str, default: u64) -> Result<u64> {
        match self.values.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_u64()
                .ok_or_else(|| type_error(key, "a non-negative integer", v)),
        }
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64> {
        match self.values.get(key) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| type_error(key, "a number", v)),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.values.get(key) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| type_error(key, "a boolean", v)),
        }
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str> {
        match self.values.get(key) {
            None => Ok(default),
            Some(v) => v.as_str().ok_or_else(|| type_error(key, "a string", v)),
        }
    }

    /// List of non-negative integers, e.g. hidden layer widths
    pub fn usize_list_or(&self, key: &str, default: &[usize]) -> Result<Vec<usize>> {
        match self.values.get(key) {
            None => Ok(default.to_vec()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_u64()
                        .map(|n| n as usize)
                        .ok_or_else(|| type_error(key, "a list of non-negative integers", v))
                })
                .collect(),
            Some(v) => Err(type_error(key, "a list of non-negative integers", v)),
        }
    }
}

impl HeadConfig {
    /// Nested record such as `final_mapping_config`; empty when absent or null
    pub fn nested(&self, key: &str) -> Result<HeadConfig> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(HeadConfig::new()),
            Some(v) => record(key, v),
        }
    }

    /// `len` nested records: one record shared by all, or a list of exactly `len`
    pub fn nested_list(&self, key: &str, len: usize) -> Result<Vec<HeadConfig>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(vec![HeadConfig::new(); len]),
            Some(Value::Array(items)) => {
                if items.len() != len {
                    return Err(PipeError::InvalidConfig(format!(
                        "'{}' lists {} records, expected {}",
                        key,
                        items.len(),
                        len
                    )));
                }
                items.iter().map(|v| record(key, v)).collect()
            }
            Some(v) => Ok(vec![record(key, v)?; len]),
        }
    }
}

fn record(key: &str, value: &Value) -> Result<HeadConfig> {
    match value {
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        other => Err(type_error(key, "a table of settings", other)),
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for HeadConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        HeadConfig {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn type_error(key: &str, expected: &str, found: &Value) -> PipeError {
    PipeError::InvalidConfig(format!("'{}' must be {}, found {}", key, expected, found))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let config = HeadConfig::new()
            .with("target_dim", 1)
            .with("bias", false)
            .with("bias_fill", 0.25)
            .with("init_method", "zeros");

        assert_eq!(config.usize_required("target_dim").unwrap(), 1);
        assert!(!config.bool_or("bias", true).unwrap());
        assert_eq!(config.f64_or("bias_fill", 0.0).unwrap(), 0.25);
        assert_eq!(config.str_or("init_method", "xavier_uniform").unwrap(), "zeros");
        assert_eq!(config.u64_or("seed", 7).unwrap(), 7);
    }

    #[test]
    fn test_wrong_type() {
        let config = HeadConfig::new().with("target_dim", "first");
        let err = config.usize_required("target_dim").unwrap_err();
        assert!(matches!(err, PipeError::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_required() {
        let config = HeadConfig::new();
        assert!(config.usize_required("target_dim").is_err());
        assert_eq!(config.usize_opt("target_dim").unwrap(), None);
    }

    #[test]
    fn test_merged_overrides() {
        let base = HeadConfig::new().with("target_dim", 0).with("bias", true);
        let overlay = HeadConfig::new().with("target_dim", 1);
        let merged = base.merged(&overlay);
        assert_eq!(merged.usize_required("target_dim").unwrap(), 1);
        assert!(merged.bool_or("bias", false).unwrap());
        // base untouched
        assert_eq!(base.usize_required("target_dim").unwrap(), 0);
    }

    #[test]
    fn test_usize_list() {
        let config = HeadConfig::new().with("num_units", vec![8, 4]);
        assert_eq!(config.usize_list_or("num_units", &[16]).unwrap(), vec![8, 4]);
        assert_eq!(HeadConfig::new().usize_list_or("num_units", &[16]).unwrap(), vec![16]);
    }

    #[test]
    fn test_json_transparent() {
        let config: HeadConfig = serde_json::from_str(r#"{"target_dim": 1}"#).unwrap();
        assert_eq!(config.usize_required("target_dim").unwrap(), 1);
    }

    #[test]
    fn test_nested_records() {
        let config = HeadConfig::new()
            .with("final_mapping_config", serde_json::json!({ "bias": false }))
            .with("mapping_configs", serde_json::json!([{ "batch_norm": false }, {}]));

        assert!(!config.nested("final_mapping_config").unwrap().bool_or("bias", true).unwrap());
        assert!(config.nested("missing").unwrap().is_empty());

        let layers = config.nested_list("mapping_configs", 2).unwrap();
        assert!(!layers[0].bool_or("batch_norm", true).unwrap());
        assert!(layers[1].is_empty());
        assert!(config.nested_list("mapping_configs", 3).is_err());

        let shared = HeadConfig::new().with("mapping_configs", serde_json::json!({ "activation": "tanh" }));
        let layers = shared.nested_list("mapping_configs", 3).unwrap();
        assert!(layers.iter().all(|l| l.str_or("activation", "relu").unwrap() == "tanh"));
        assert!(HeadConfig::new().with("mapping_configs", 3).nested_list("mapping_configs", 1).is_err());
    }
}

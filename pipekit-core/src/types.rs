//! Shared identifiers: registry categories, model shapes and named parameters

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::matrix::Matrix;

/// Registry category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Extractor,
    Head,
    HeadConfig,
    Model,
}

impl Category {
    /// Lists all categories in registration order
    pub fn all() -> [Category; 4] {
        [
            Category::Extractor,
            Category::Head,
            Category::HeadConfig,
            Category::Model,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Extractor => "extractor",
            Category::Head => "head",
            Category::HeadConfig => "head_config",
            Category::Model => "model",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw input width and target width of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub in_dim: usize,
    pub out_dim: usize,
}

impl Shape {
    pub fn new(in_dim: usize, out_dim: usize) -> Self {
        Self { in_dim, out_dim }
    }
}

/// Named trainable tensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Matrix,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Matrix) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names() {
        let names: Vec<&str> = Category::all().iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["extractor", "head", "head_config", "model"]);
    }

    #[test]
    fn test_category_serde() {
        let json = serde_json::to_string(&Category::HeadConfig).unwrap();
        assert_eq!(json, "\"head_config\"");
    }
}

//! Key=value secrets file read once at startup.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Default)]
pub struct SecretStore {
    values: HashMap<String, String>,
}

impl SecretStore {
    /// Reads `path`. A missing or unreadable file is fatal to the caller.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| AppError::Secrets {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(&contents))
    }

    /// Lines without `=` are skipped; the first `=` separates key from value.
    pub fn parse(contents: &str) -> Self {
        let values = contents
            .lines()
            .map(str::trim)
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| AppError::Config(format!("missing required secret {key}")))
    }
}

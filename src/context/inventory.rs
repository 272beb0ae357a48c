//! Static Inventory Context
//!
//! An [`ExecutionContext`] answered from a YAML inventory file instead of a
//! live Salt master. Useful for staging runs and for tests.

use crate::domain::ports::{ExecutionContext, NodeId};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Inventory-backed execution context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticContext {
    /// Grains of the local node
    pub grains: BTreeMap<String, String>,
    /// Pillar of the local node
    pub pillar: BTreeMap<String, String>,
    /// Target expression -> matching minions
    pub targets: BTreeMap<String, Vec<NodeId>>,
    /// Salt master's own minion id
    pub master_minion: Option<String>,
    /// Public address of the local node
    pub public_address: Option<String>,
}

impl StaticContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an inventory file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let ctx: StaticContext = serde_yaml::from_str(&contents)?;
        debug!(
            "Loaded inventory {} with {} targets",
            path.display(),
            ctx.targets.len()
        );
        Ok(ctx)
    }

    pub fn with_grain(mut self, key: &str, value: &str) -> Self {
        self.grains.insert(key.into(), value.into());
        self
    }

    pub fn with_pillar(mut self, key: &str, value: &str) -> Self {
        self.pillar.insert(key.into(), value.into());
        self
    }

    pub fn with_target(mut self, expression: &str, nodes: &[&str]) -> Self {
        self.targets.insert(
            expression.into(),
            nodes.iter().map(|node| node.to_string()).collect(),
        );
        self
    }

    pub fn with_master_minion(mut self, minion: &str) -> Self {
        self.master_minion = Some(minion.into());
        self
    }

    pub fn with_public_address(mut self, address: &str) -> Self {
        self.public_address = Some(address.into());
        self
    }
}

impl ExecutionContext for StaticContext {
    fn grain(&self, key: &str) -> Result<Option<String>> {
        Ok(self.grains.get(key).filter(|v| !v.is_empty()).cloned())
    }

    fn pillar(&self, key: &str) -> Result<Option<String>> {
        Ok(self.pillar.get(key).filter(|v| !v.is_empty()).cloned())
    }

    fn resolve_target(&self, expression: &str) -> Result<BTreeSet<NodeId>> {
        Ok(self
            .targets
            .get(expression)
            .map(|nodes| nodes.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn master_minion(&self) -> Result<String> {
        self.master_minion
            .clone()
            .ok_or_else(|| Error::Context("inventory has no master_minion".into()))
    }

    fn public_address(&self) -> Result<String> {
        self.public_address
            .clone()
            .ok_or_else(|| Error::Context("inventory has no public_address".into()))
    }
}

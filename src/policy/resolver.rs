//! Policy Resolution
//!
//! Expands each role's target expression into the concrete, sorted set of
//! minions it selects.

use crate::domain::ports::{ExecutionContext, NodeId};
use crate::error::Result;
use crate::policy::loader::RolePolicy;
use crate::policy::roles::NodeRoleAssignment;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Role name -> sorted minion set, in policy order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPolicy {
    roles: IndexMap<String, BTreeSet<NodeId>>,
}

impl ResolvedPolicy {
    /// Resolve every target through the execution context
    pub fn resolve(policy: &RolePolicy, ctx: &dyn ExecutionContext) -> Result<Self> {
        let mut roles = IndexMap::with_capacity(policy.len());
        for (role, target) in policy.iter() {
            let nodes = ctx.resolve_target(target)?;
            debug!("{} -> '{}' -> {:?}", role, target, nodes);
            roles.insert(role.to_string(), nodes);
        }

        let resolved = Self { roles };
        info!(
            "Expanded {} roles onto {} minions",
            resolved.roles.len(),
            resolved.nodes().len()
        );
        Ok(resolved)
    }

    /// Build directly from `(role, nodes)` pairs
    pub fn from_pairs<I, R, N, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (R, N)>,
        R: Into<String>,
        N: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        Self {
            roles: pairs
                .into_iter()
                .map(|(role, nodes)| (role.into(), nodes.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    /// Rebuild the role view from a node assignment.
    ///
    /// Roles that matched no node cannot be recovered and are absent.
    pub fn from_assignment(assignment: &NodeRoleAssignment) -> Self {
        let mut roles: IndexMap<String, BTreeSet<NodeId>> = IndexMap::new();
        for (node, node_roles) in assignment.iter() {
            for role in node_roles {
                roles.entry(role.clone()).or_default().insert(node.to_string());
            }
        }
        Self { roles }
    }

    /// Iterate `(role, nodes)` in policy order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<NodeId>)> {
        self.roles.iter().map(|(role, nodes)| (role.as_str(), nodes))
    }

    pub fn nodes_for(&self, role: &str) -> Option<&BTreeSet<NodeId>> {
        self.roles.get(role)
    }

    /// Union of every role's minions
    pub fn nodes(&self) -> BTreeSet<NodeId> {
        self.roles.values().flatten().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

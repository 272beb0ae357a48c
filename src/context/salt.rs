//! Salt Execution Context
//!
//! Answers grain, pillar and targeting lookups by shelling out to the Salt
//! command line tools with JSON output.

use crate::config::SaltSettings;
use crate::domain::ports::{CommandOutput, CommandRunner, ExecutionContext, NodeId};
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Execution context backed by `salt-call` and `salt`
pub struct SaltContext {
    runner: Arc<dyn CommandRunner>,
    settings: SaltSettings,
}

impl SaltContext {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: SaltSettings) -> Self {
        Self { runner, settings }
    }

    /// Run a local execution module function and return its `local` value
    fn call(&self, function: &str, args: &[&str]) -> Result<Option<String>> {
        let mut argv = vec!["--out=json".to_string(), function.to_string()];
        argv.extend(args.iter().map(|arg| arg.to_string()));

        let output = self.runner.run_named(&self.settings.salt_call, &argv)?;
        local_value(&output.stdout)
    }
}

impl ExecutionContext for SaltContext {
    fn grain(&self, key: &str) -> Result<Option<String>> {
        self.call("grains.get", &[key])
    }

    fn pillar(&self, key: &str) -> Result<Option<String>> {
        self.call("pillar.get", &[key])
    }

    fn resolve_target(&self, expression: &str) -> Result<BTreeSet<NodeId>> {
        let argv = vec![
            "--out=json".to_string(),
            "--static".to_string(),
            "-C".to_string(),
            expression.to_string(),
            "grains.get".to_string(),
            "id".to_string(),
        ];

        // Output is captured, so salt's "no minions matched" chatter never
        // reaches our stdout. Salt exits non-zero in that case too.
        let output = self.runner.output_named(&self.settings.salt, &argv)?;
        if !output.success() {
            if no_minions_matched(&output) {
                debug!("Target '{}' matched no minions", expression);
                return Ok(BTreeSet::new());
            }
            return Err(Error::CommandFailed {
                command: format!("{} {}", self.settings.salt, argv.join(" ")),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }

        let minions = minion_ids(&output.stdout)?;
        debug!("Target '{}' matched {} minions", expression, minions.len());
        Ok(minions)
    }

    fn master_minion(&self) -> Result<String> {
        self.call("master.minion", &[])?
            .ok_or_else(|| Error::Context("master.minion returned nothing".into()))
    }

    fn public_address(&self) -> Result<String> {
        self.call("public.address", &[])?
            .ok_or_else(|| Error::Context("public.address returned nothing".into()))
    }
}

// =============================================================================
// Output Parsing
// =============================================================================

/// Extract the `local` return of a `salt-call --out=json` run.
///
/// Empty strings and nulls are reported as `None`.
pub(crate) fn local_value(stdout: &str) -> Result<Option<String>> {
    let json: Value = serde_json::from_str(stdout.trim())?;
    let value = json.get("local").ok_or_else(|| {
        Error::Context(format!("unexpected salt-call output: {}", stdout.trim()))
    })?;

    Ok(match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}

/// Salt's notice for a target expression that selects nothing
const NO_MINIONS_MATCHED: &str = "No minions matched";

fn no_minions_matched(output: &CommandOutput) -> bool {
    output.stdout.contains(NO_MINIONS_MATCHED) || output.stderr.contains(NO_MINIONS_MATCHED)
}

/// Collect the minion ids from a `salt --out=json --static` run.
///
/// Salt prints a plain-text notice instead of JSON when nothing matches.
pub(crate) fn minion_ids(stdout: &str) -> Result<BTreeSet<NodeId>> {
    let trimmed = stdout.trim();
    if !trimmed.starts_with('{') {
        if !trimmed.is_empty() {
            debug!("Ignoring non-JSON targeting output: {}", trimmed);
        }
        return Ok(BTreeSet::new());
    }

    let json: Value = serde_json::from_str(trimmed)?;
    Ok(json
        .as_object()
        .map(|minions| minions.keys().cloned().collect())
        .unwrap_or_default())
}

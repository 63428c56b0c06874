//! Agent configuration stored in `config/agent.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::DEFAULT_MAX_STEPS;
use crate::core::settings::{DEFAULT_INTERVAL_SECS, FailurePolicy, SchedulerSettings};

/// Agent configuration (TOML).
///
/// Intended to be edited by humans. Missing fields fall back to defaults so a
/// partial file (or no file at all) is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Seeded into chat history as a system message, and again after reset.
    pub system_prompt: Option<String>,

    /// A task is forced to finish once it has completed this many steps.
    pub max_steps: u32,

    pub scheduler: SchedulerDefaults,

    pub reasoner: ReasonerConfig,
}

/// Control values the scheduler starts with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerDefaults {
    pub enabled: bool,
    pub stepwise: bool,
    pub interval_secs: u64,
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReasonerConfig {
    /// Command that computes one step (e.g. `["ollama","run","llama3.1"]`).
    /// The prompt is written to its stdin.
    pub command: Vec<String>,

    /// Wall-clock budget for a single step in seconds.
    pub timeout_secs: u64,

    /// Discard reasoner stdout beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_steps: DEFAULT_MAX_STEPS,
            scheduler: SchedulerDefaults::default(),
            reasoner: ReasonerConfig::default(),
        }
    }
}

impl Default for SchedulerDefaults {
    fn default() -> Self {
        Self {
            enabled: false,
            stepwise: false,
            interval_secs: DEFAULT_INTERVAL_SECS,
            failure_policy: FailurePolicy::HaltTick,
        }
    }
}

impl SchedulerDefaults {
    pub fn settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            enabled: self.enabled,
            stepwise: self.stepwise,
            interval_secs: self.interval_secs,
            failure_policy: self.failure_policy,
        }
    }
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "ollama".to_string(),
                "run".to_string(),
                "llama3.1".to_string(),
            ],
            timeout_secs: 10 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(anyhow!("max_steps must be > 0"));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(anyhow!("scheduler.interval_secs must be > 0"));
        }
        if self.reasoner.timeout_secs == 0 {
            return Err(anyhow!("reasoner.timeout_secs must be > 0"));
        }
        if self.reasoner.output_limit_bytes == 0 {
            return Err(anyhow!("reasoner.output_limit_bytes must be > 0"));
        }
        if self.reasoner.command.is_empty() || self.reasoner.command[0].trim().is_empty() {
            return Err(anyhow!("reasoner.command must be a non-empty array"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("agent.toml");
        fs::write(
            &path,
            "system_prompt = \"be brief\"\n\n[scheduler]\nstepwise = true\nfailure_policy = \"skip_task\"\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(cfg.max_steps, DEFAULT_MAX_STEPS);
        let settings = cfg.scheduler.settings();
        assert!(settings.stepwise);
        assert!(!settings.enabled);
        assert_eq!(settings.interval_secs, 5);
        assert_eq!(settings.failure_policy, FailurePolicy::SkipTask);
        assert_eq!(cfg.reasoner, ReasonerConfig::default());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("agent.toml");
        fs::write(&path, "[scheduler]\ninterval_secs = 0\n").expect("write");

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("interval_secs must be > 0"));
    }

    #[test]
    fn empty_command_is_rejected() {
        let cfg = AgentConfig {
            reasoner: ReasonerConfig {
                command: Vec::new(),
                ..ReasonerConfig::default()
            },
            ..AgentConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}

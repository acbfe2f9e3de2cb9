//! Engine configuration
//!
//! Loaded from TOML; every section is optional and falls back to defaults.
//!
//! ```toml
//! [sla]
//! at_risk_threshold_minutes = 120
//!
//! [[sla.policy]]
//! priority = "CRITICAL"
//! hours = 4
//!
//! [sweep]
//! interval_secs = 60
//!
//! [suggestion]
//! provider = "rules"
//!
//! [[users]]
//! id = "ENG001"
//! name = "Alice Johnson"
//! role = "L1_ENGINEER"
//! ```

use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::model::{Category, Priority, Role, Severity, Team, User};
use crate::sla::{CategoryOverride, PriorityDuration, SlaPolicy, MAX_SLA_HOURS};

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaConfig {
    #[serde(default = "SlaConfig::default_policy")]
    pub policy: Vec<PriorityDuration>,
    #[serde(default, rename = "override")]
    pub overrides: Vec<CategoryOverride>,
    /// Remaining time at or below which an open ticket counts as at risk
    #[serde(default = "SlaConfig::default_threshold")]
    pub at_risk_threshold_minutes: i64,
}

impl SlaConfig {
    fn default_policy() -> Vec<PriorityDuration> {
        SlaPolicy::default().policy
    }

    fn default_threshold() -> i64 {
        120
    }

    pub fn sla_policy(&self) -> SlaPolicy {
        SlaPolicy {
            policy: self.policy.clone(),
            overrides: self.overrides.clone(),
        }
    }

    /// Falls back to the default window when the configured one is out of range
    pub fn at_risk_threshold(&self) -> Duration {
        if (1..=MAX_SLA_HOURS * 60).contains(&self.at_risk_threshold_minutes) {
            Duration::minutes(self.at_risk_threshold_minutes)
        } else {
            Duration::minutes(Self::default_threshold())
        }
    }
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            policy: Self::default_policy(),
            overrides: Vec::new(),
            at_risk_threshold_minutes: Self::default_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "SweepConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "SweepConfig::default_interval")]
    pub interval_secs: u64,
}

impl SweepConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_interval() -> u64 {
        60
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            interval_secs: Self::default_interval(),
        }
    }
}

/// Which suggestion backend triage uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Category/severity lookup tables below
    #[default]
    Rules,
    /// POST to an external classifier
    Http,
}

/// Engineer role that handles a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRole {
    pub category: Category,
    pub role: Role,
}

/// Priority hint for a severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityPriority {
    pub severity: Severity,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "SuggestionConfig::default_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "SuggestionConfig::default_category_roles")]
    pub category_roles: Vec<CategoryRole>,
    #[serde(default = "SuggestionConfig::default_severity_priorities")]
    pub severity_priorities: Vec<SeverityPriority>,
    /// Upper bound on engineers proposed per suggestion
    #[serde(default = "SuggestionConfig::default_max_engineers")]
    pub max_engineers: usize,
}

impl SuggestionConfig {
    fn default_timeout() -> u64 {
        5_000
    }

    fn default_max_engineers() -> usize {
        1
    }

    fn default_category_roles() -> Vec<CategoryRole> {
        use Category::*;
        [
            (NetworkConnectivity, Role::NocEngineer),
            (EmailServices, Role::L1Engineer),
            (Hardware, Role::FieldEngineer),
            (NetworkSecurity, Role::NocEngineer),
            (NetworkPerformance, Role::NocEngineer),
            (Other, Role::L1Engineer),
        ]
        .into_iter()
        .map(|(category, role)| CategoryRole { category, role })
        .collect()
    }

    fn default_severity_priorities() -> Vec<SeverityPriority> {
        [
            (Severity::Critical, Priority::Critical),
            (Severity::Major, Priority::High),
            (Severity::Minor, Priority::Medium),
            (Severity::Trivial, Priority::Low),
        ]
        .into_iter()
        .map(|(severity, priority)| SeverityPriority { severity, priority })
        .collect()
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    pub fn role_for(&self, category: Category) -> Role {
        self.category_roles
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.role)
            .unwrap_or(Role::L1Engineer)
    }

    pub fn priority_for(&self, severity: Severity) -> Priority {
        self.severity_priorities
            .iter()
            .find(|s| s.severity == severity)
            .map(|s| s.priority)
            .unwrap_or_default()
    }
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            url: None,
            timeout_ms: Self::default_timeout(),
            category_roles: Self::default_category_roles(),
            severity_priorities: Self::default_severity_priorities(),
            max_engineers: Self::default_max_engineers(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Whether notes attached to status updates are hidden from customers
    #[serde(default)]
    pub notes_internal: bool,
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub sla: SlaConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub suggestion: SuggestionConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
    /// Directory entries loaded at startup
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub teams: Vec<Team>,
}

impl EngineConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// Apply `TICKETD_SUGGEST_URL`: a URL switches triage to the HTTP provider.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("TICKETD_SUGGEST_URL") {
            if !url.trim().is_empty() {
                self.suggestion.url = Some(url);
                self.suggestion.provider = ProviderKind::Http;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sla_policy().validate().map_err(ConfigError::Invalid)?;
        if !(1..=MAX_SLA_HOURS * 60).contains(&self.sla.at_risk_threshold_minutes) {
            return Err(ConfigError::Invalid(format!(
                "sla.at_risk_threshold_minutes must be between 1 and {}",
                MAX_SLA_HOURS * 60
            )));
        }
        if self.sweep.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep.interval_secs must be positive".into(),
            ));
        }
        if self.suggestion.provider == ProviderKind::Http && self.suggestion.url.is_none() {
            return Err(ConfigError::Invalid(
                "suggestion.url is required for the http provider".into(),
            ));
        }
        for team in &self.teams {
            if !team.is_member(&team.lead_id) {
                return Err(ConfigError::Invalid(format!(
                    "team '{}' must list its lead {} as a member",
                    team.name, team.lead_id
                )));
            }
        }
        Ok(())
    }

    pub fn sla_policy(&self) -> SlaPolicy {
        self.sla.sla_policy()
    }
}

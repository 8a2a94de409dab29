//! Configuration for the LCO calibration lamp tools.
//!
//! TOML file + environment loading (figment), schema validation, and
//! translation into the runtime types of `lcolamps_core`. The CLI is
//! the only consumer; the core never reads config files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lcolamps_core::{BackendKind, ControllerPolicy, LampConfig, TimingPolicy};
use lcolamps_driver::LampAddress;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// M2 controller endpoint. Optional: a config may be actor-only.
    pub m2: Option<M2Section>,

    /// Device actor hub endpoint. Optional: a config may be M2-only.
    pub actor: Option<ActorSection>,

    #[serde(default)]
    pub controller: ControllerSection,

    /// Lamp inventory. Array order is the canonical lamp order.
    #[serde(default)]
    pub lamps: Vec<LampEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct M2Section {
    pub host: String,

    #[serde(default = "default_m2_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActorSection {
    pub host: String,

    #[serde(default = "default_actor_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerSection {
    /// "wait" sleeps out the inter-switch interval; "reject" records a
    /// per-lamp failure instead.
    #[serde(default = "default_timing_policy")]
    pub timing_policy: String,

    /// Per-lamp deadline for the pre-commit phase, in seconds.
    /// Zero disables the deadline.
    #[serde(default)]
    pub switch_timeout_secs: f64,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            timing_policy: default_timing_policy(),
            switch_timeout_secs: 0.0,
        }
    }
}

/// One `[[lamps]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LampEntry {
    pub name: String,

    /// "m2" or "actor".
    pub backend: String,

    /// M2 backend: the name the M2 controller knows this lamp by.
    pub m2_name: Option<String>,

    /// M2 backend: relay number.
    pub relay: Option<u8>,

    /// Actor backend: the three command verbs.
    pub actor_command_on: Option<String>,
    pub actor_command_off: Option<String>,
    pub actor_command_status: Option<String>,

    #[serde(default)]
    pub min_switch_interval_secs: f64,

    #[serde(default)]
    pub warmup_secs: f64,
}

fn default_m2_port() -> u16 {
    4001
}
fn default_actor_port() -> u16 {
    6093
}
fn default_timing_policy() -> String {
    "wait".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the default config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "sdss", "lcolamps").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("lcolamps");
            p.push("lcolamps.toml");
            p
        },
        |dirs| dirs.config_dir().join("lcolamps.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load and validate the configuration.
///
/// `path` overrides the default location. Environment variables
/// prefixed `LCOLAMPS_` override file values, with `__` separating
/// nesting levels (e.g. `LCOLAMPS_M2__HOST`).
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Toml::file(&path))
        .merge(Env::prefixed("LCOLAMPS_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Validation / translation ────────────────────────────────────────

impl Config {
    /// Check the schema rules that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: Vec<String> = Vec::new();
        for entry in &self.lamps {
            let lower = entry.name.to_lowercase();
            if entry.name.trim().is_empty() {
                return Err(invalid("lamps.name", "lamp name cannot be empty"));
            }
            if seen.contains(&lower) {
                return Err(invalid(
                    "lamps.name",
                    format!("duplicate lamp name '{}'", entry.name),
                ));
            }
            seen.push(lower);

            let field = format!("lamps.{}", entry.name);
            match entry.backend_kind()? {
                BackendKind::M2 => {
                    if self.m2.is_none() {
                        return Err(invalid(&field, "backend is 'm2' but there is no [m2] section"));
                    }
                    if entry.m2_name.is_none() || entry.relay.is_none() {
                        return Err(invalid(&field, "m2 lamps require 'm2_name' and 'relay'"));
                    }
                }
                BackendKind::Actor => {
                    if self.actor.is_none() {
                        return Err(invalid(
                            &field,
                            "backend is 'actor' but there is no [actor] section",
                        ));
                    }
                    if entry.actor_command_on.is_none()
                        || entry.actor_command_off.is_none()
                        || entry.actor_command_status.is_none()
                    {
                        return Err(invalid(
                            &field,
                            "actor lamps require 'actor_command_on', 'actor_command_off', \
                             and 'actor_command_status'",
                        ));
                    }
                }
            }

            duration_from_secs(entry.min_switch_interval_secs, &field)?;
            duration_from_secs(entry.warmup_secs, &field)?;
        }

        timing_policy(&self.controller.timing_policy)?;
        duration_from_secs(self.controller.switch_timeout_secs, "controller")?;
        Ok(())
    }

    /// Translate the `[[lamps]]` entries into runtime lamp configs,
    /// preserving array order.
    pub fn lamp_configs(&self) -> Result<Vec<LampConfig>, ConfigError> {
        self.lamps.iter().map(LampEntry::to_lamp_config).collect()
    }

    /// Translate the `[controller]` section into the runtime policy.
    pub fn controller_policy(&self) -> Result<ControllerPolicy, ConfigError> {
        let timeout = duration_from_secs(self.controller.switch_timeout_secs, "controller")?;
        Ok(ControllerPolicy {
            timing: timing_policy(&self.controller.timing_policy)?,
            switch_timeout: (!timeout.is_zero()).then_some(timeout),
        })
    }
}

impl LampEntry {
    fn backend_kind(&self) -> Result<BackendKind, ConfigError> {
        match self.backend.as_str() {
            "m2" => Ok(BackendKind::M2),
            "actor" => Ok(BackendKind::Actor),
            other => Err(invalid(
                format!("lamps.{}.backend", self.name),
                format!("expected 'm2' or 'actor', got '{other}'"),
            )),
        }
    }

    fn to_lamp_config(&self) -> Result<LampConfig, ConfigError> {
        let field = format!("lamps.{}", self.name);
        let address = match self.backend_kind()? {
            BackendKind::M2 => {
                let (Some(m2_name), Some(relay)) = (&self.m2_name, self.relay) else {
                    return Err(invalid(&field, "m2 lamps require 'm2_name' and 'relay'"));
                };
                LampAddress::M2 {
                    m2_name: m2_name.clone(),
                    relay,
                }
            }
            BackendKind::Actor => {
                let (Some(on), Some(off), Some(status)) = (
                    &self.actor_command_on,
                    &self.actor_command_off,
                    &self.actor_command_status,
                ) else {
                    return Err(invalid(&field, "actor lamps require the three command verbs"));
                };
                LampAddress::Actor {
                    on_verb: on.clone(),
                    off_verb: off.clone(),
                    status_verb: status.clone(),
                }
            }
        };

        Ok(LampConfig {
            name: self.name.clone(),
            backend: self.backend_kind()?,
            address,
            min_switch_interval: duration_from_secs(self.min_switch_interval_secs, &field)?,
            warmup: duration_from_secs(self.warmup_secs, &field)?,
        })
    }
}

fn timing_policy(value: &str) -> Result<TimingPolicy, ConfigError> {
    match value {
        "wait" => Ok(TimingPolicy::Wait),
        "reject" => Ok(TimingPolicy::Reject),
        other => Err(invalid(
            "controller.timing_policy",
            format!("expected 'wait' or 'reject', got '{other}'"),
        )),
    }
}

fn duration_from_secs(secs: f64, field: &str) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| invalid(field, format!("invalid duration in seconds: {secs}")))
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = r#"
        [m2]
        host = "10.8.38.21"

        [actor]
        host = "localhost"
        port = 6093

        [controller]
        timing_policy = "wait"
        switch_timeout_secs = 30

        [[lamps]]
        name = "TCS"
        backend = "m2"
        m2_name = "TCS"
        relay = 1

        [[lamps]]
        name = "HgAr"
        backend = "actor"
        actor_command_on = "hgar on"
        actor_command_off = "hgar off"
        actor_command_status = "hgar status"
        min_switch_interval_secs = 90.0
        warmup_secs = 180.0
    "#;

    fn parse(toml_str: &str) -> Config {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn sample_config_parses_and_validates() {
        let config = parse(SAMPLE);
        config.validate().unwrap();

        assert_eq!(config.m2.as_ref().unwrap().port, 4001);
        assert_eq!(config.lamps.len(), 2);

        let lamps = config.lamp_configs().unwrap();
        assert_eq!(lamps[0].name, "TCS");
        assert_eq!(lamps[0].backend, BackendKind::M2);
        assert_eq!(
            lamps[0].address,
            LampAddress::M2 {
                m2_name: "TCS".into(),
                relay: 1
            }
        );
        assert_eq!(lamps[1].min_switch_interval, Duration::from_secs(90));
        assert_eq!(lamps[1].warmup, Duration::from_secs(180));

        let policy = config.controller_policy().unwrap();
        assert_eq!(policy.timing, TimingPolicy::Wait);
        assert_eq!(policy.switch_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_switch_timeout_means_no_deadline() {
        let config = parse(
            r#"
            [controller]
            timing_policy = "reject"
            "#,
        );
        let policy = config.controller_policy().unwrap();
        assert_eq!(policy.timing, TimingPolicy::Reject);
        assert_eq!(policy.switch_timeout, None);
    }

    #[test]
    fn duplicate_lamp_names_are_rejected_case_insensitively() {
        let config = parse(
            r#"
            [m2]
            host = "h"

            [[lamps]]
            name = "TCS"
            backend = "m2"
            m2_name = "TCS"
            relay = 1

            [[lamps]]
            name = "tcs"
            backend = "m2"
            m2_name = "TCS2"
            relay = 2
            "#,
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate lamp name"));
    }

    #[test]
    fn m2_lamp_without_relay_is_rejected() {
        let config = parse(
            r#"
            [m2]
            host = "h"

            [[lamps]]
            name = "TCS"
            backend = "m2"
            m2_name = "TCS"
            "#,
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("'m2_name' and 'relay'"));
    }

    #[test]
    fn actor_lamp_without_verbs_is_rejected() {
        let config = parse(
            r#"
            [actor]
            host = "h"

            [[lamps]]
            name = "HgAr"
            backend = "actor"
            actor_command_on = "hgar on"
            "#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn lamp_naming_a_missing_backend_section_is_rejected() {
        let config = parse(
            r#"
            [[lamps]]
            name = "TCS"
            backend = "m2"
            m2_name = "TCS"
            relay = 1
            "#,
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("no [m2] section"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let config = parse(
            r#"
            [[lamps]]
            name = "TCS"
            backend = "serial"
            "#,
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("expected 'm2' or 'actor'"));
    }

    #[test]
    fn bad_timing_policy_is_rejected() {
        let config = parse(
            r#"
            [controller]
            timing_policy = "block"
            "#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_durations_are_rejected() {
        let config = parse(
            r#"
            [m2]
            host = "h"

            [[lamps]]
            name = "TCS"
            backend = "m2"
            m2_name = "TCS"
            relay = 1
            warmup_secs = -5.0
            "#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_a_file_from_an_explicit_path() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.lamps.len(), 2);
    }
}

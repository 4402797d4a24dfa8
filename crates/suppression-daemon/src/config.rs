//! Daemon configuration: a `SuppressionConfig` loaded from a
//! `--config` toml file, with environment overrides for the Optizmo
//! API token and scheduler timezone.

use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

fn default_listen_addr() -> String {
    "127.0.0.1:8008".to_string()
}

fn default_database_path() -> String {
    "./suppression.db".to_string()
}

fn default_timezone() -> String {
    "America/Denver".to_string()
}

fn default_hub_channel_capacity() -> usize {
    256
}

fn default_sampler_target_sample() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SuppressionConfig {
    /// Path to the sqlite database file.
    pub database_path: String,
    /// Address the HTTP server binds.
    pub listen_addr: String,
    /// Scheduler timezone name. An `OPTIZMO_API_TOKEN`-style
    /// env var, `SUPPRESSION_TIMEZONE`, overrides this at startup.
    pub timezone: String,
    /// Optizmo API token. Normally left empty in the config file and
    /// supplied through the environment instead.
    #[serde(default)]
    pub optizmo_token: String,
    /// Bound on each Hub subscriber's event channel.
    pub hub_channel_capacity: usize,
    /// Target sample size for the cross-reference sampler.
    pub sampler_target_sample: u64,
    /// Organization a source's auto-created list falls back to when no
    /// better candidate exists.
    pub default_org_id: Uuid,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            listen_addr: default_listen_addr(),
            timezone: default_timezone(),
            optizmo_token: String::new(),
            hub_channel_capacity: default_hub_channel_capacity(),
            sampler_target_sample: default_sampler_target_sample(),
            default_org_id: Uuid::nil(),
        }
    }
}

impl SuppressionConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| anyhow::anyhow!("reading config {}: {err}", path.display()))?;
        let mut config: Self = toml::from_str(&text)
            .map_err(|err| anyhow::anyhow!("parsing config {}: {err}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment overrides for `OPTIZMO_API_TOKEN` and the scheduler
    /// timezone.
    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("OPTIZMO_API_TOKEN") {
            if !token.is_empty() {
                self.optizmo_token = token;
            }
        }
        if let Ok(tz) = std::env::var("SUPPRESSION_TIMEZONE") {
            if !tz.is_empty() {
                self.timezone = tz;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SuppressionConfig::default();
        assert_eq!(config.timezone, "America/Denver");
        assert_eq!(config.hub_channel_capacity, 256);
    }

    #[test]
    fn loads_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suppression.toml");
        std::fs::write(
            &path,
            r#"
            database_path = "/tmp/test.db"
            listen_addr = "0.0.0.0:9000"
            timezone = "UTC"
            hub_channel_capacity = 512
            sampler_target_sample = 1000
            default_org_id = "00000000-0000-0000-0000-000000000001"
            "#,
        )
        .unwrap();
        let config = SuppressionConfig::load(&path).unwrap();
        assert_eq!(config.database_path, "/tmp/test.db");
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.hub_channel_capacity, 512);
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;

use crate::group::Grouper;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub grouping: GroupingConfig,
    #[serde(default)]
    pub sim: SimConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupingConfig {
    /// Offset used for day boundaries, in minutes east of UTC.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl GroupingConfig {
    #[must_use]
    pub fn grouper(&self) -> Grouper {
        Grouper::with_utc_offset(self.utc_offset_minutes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_sim_seeds")]
    pub seeds: u64,
    #[serde(default = "default_sim_steps")]
    pub steps: usize,
    #[serde(default = "default_sim_initial_messages")]
    pub initial_messages: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seeds: default_sim_seeds(),
            steps: default_sim_steps(),
            initial_messages: default_sim_initial_messages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".scrollback/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("scrollback/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.as_deref(), env_format.as_deref());

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_sim_seeds() -> u64 {
    64
}

const fn default_sim_steps() -> usize {
    40
}

const fn default_sim_initial_messages() -> usize {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = TempDir::new().expect("temp dir");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.grouping.utc_offset_minutes, 0);
        assert_eq!(cfg.sim.seeds, 64);
        assert_eq!(cfg.sim.steps, 40);
        assert_eq!(cfg.grouping.grouper(), Grouper::utc());
    }

    #[test]
    fn project_config_overrides_sections_independently() {
        let root = TempDir::new().expect("temp dir");
        std::fs::create_dir_all(root.path().join(".scrollback")).expect("create config dir");
        std::fs::write(
            root.path().join(".scrollback/config.toml"),
            "[grouping]\nutc_offset_minutes = -300\n\n[sim]\nseeds = 8\n",
        )
        .expect("write config");

        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.grouping.utc_offset_minutes, -300);
        assert_eq!(cfg.sim.seeds, 8);
        assert_eq!(cfg.sim.initial_messages, 30);
        assert_eq!(cfg.grouping.grouper(), Grouper::with_utc_offset(-300));
    }

    #[test]
    fn malformed_project_config_is_an_error() {
        let root = TempDir::new().expect("temp dir");
        std::fs::create_dir_all(root.path().join(".scrollback")).expect("create config dir");
        std::fs::write(root.path().join(".scrollback/config.toml"), "[grouping\n")
            .expect("write config");

        let err = load_project_config(root.path()).expect_err("parse must fail");
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        assert_eq!(resolve_output(true, Some("pretty"), Some("text")), "json");
    }

    #[test]
    fn env_beats_user_config_and_aliases_normalize() {
        assert_eq!(resolve_output(false, Some("json"), Some("human")), "pretty");
        assert_eq!(resolve_output(false, Some("text"), Some("bogus")), "text");
    }
}

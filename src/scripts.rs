//! YAML command scripts
//!
//! Each `*.yml` / `*.yaml` file in the scripts directory defines one command:
//!
//! ```yaml
//! name: heal
//! enabled: true
//! ignore-permission-check: false
//! disable-check-if-executor-is-player: false
//! commands:
//!   - command: "heal %player%"
//!     delay: 0
//!     target-server-ids: ["lobby-1"]
//!     target-executor: player
//!     wait-until-player-is-online: false
//!     disable-check-if-executor-is-on-server: false
//! ```

use crate::error::Result;
use crate::types::{CommandSpec, CommandStep, ExecutorKind, Targets};
use serde::Deserialize;
use std::path::Path;

/// One script file as written on disk
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScriptFile {
    #[serde(default)]
    pub name: String,

    /// Disabled scripts are skipped by the loader
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub ignore_permission_check: bool,

    /// Accept console-origin invocations
    #[serde(default)]
    pub disable_check_if_executor_is_player: bool,

    #[serde(default)]
    pub commands: Vec<ScriptStep>,
}

/// One entry of a script's `commands` list
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScriptStep {
    pub command: String,

    /// Seconds
    #[serde(default)]
    pub delay: u64,

    #[serde(default)]
    pub target_server_ids: Vec<String>,

    #[serde(default)]
    pub target_executor: ExecutorKind,

    #[serde(default)]
    pub wait_until_player_is_online: bool,

    #[serde(default)]
    pub disable_check_if_executor_is_on_server: bool,
}

impl From<ScriptStep> for CommandStep {
    fn from(step: ScriptStep) -> Self {
        Self {
            command: step.command,
            delay_secs: step.delay,
            targets: Targets::from_ids(step.target_server_ids),
            executor: step.target_executor,
            wait_until_online: step.wait_until_player_is_online,
            disable_presence_check: step.disable_check_if_executor_is_on_server,
        }
    }
}

impl From<ScriptFile> for CommandSpec {
    fn from(script: ScriptFile) -> Self {
        Self {
            name: script.name,
            steps: script.commands.into_iter().map(CommandStep::from).collect(),
            require_actor_is_user: !script.disable_check_if_executor_is_player,
            ignore_permission_check: script.ignore_permission_check,
        }
    }
}

/// Parse one script document
pub fn parse_script(content: &str) -> Result<ScriptFile> {
    Ok(serde_yaml::from_str(content)?)
}

/// Load every enabled script in `dir`
///
/// Files are read in name order. Unreadable or malformed files and
/// disabled scripts are logged and skipped; only an unreadable directory
/// is an error.
pub fn load_scripts_from_dir(dir: &Path) -> Result<Vec<CommandSpec>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yml" | "yaml")
                )
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        tracing::warn!(dir = %dir.display(), "No scripts found");
    }

    let mut specs = Vec::new();
    for path in paths {
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to read script file {}: {}", path.display(), e);
                continue;
            }
        };

        match parse_script(&content) {
            Ok(script) if script.enabled => {
                tracing::debug!("Loaded script '{}' from {}", script.name, path.display());
                specs.push(CommandSpec::from(script));
            }
            Ok(_) => {
                tracing::info!("Script disabled, skipping {}", path.display());
            }
            Err(e) => {
                tracing::warn!("Failed to parse script file {}: {}", path.display(), e);
            }
        }
    }

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAL: &str = r#"
name: heal
enabled: true
commands:
  - command: "heal %player%"
  - command: "broadcast %player% was healed"
    delay: 2
    target-server-ids: ["lobby-1", "lobby-2"]
    target-executor: console
    wait-until-player-is-online: true
    disable-check-if-executor-is-on-server: true
"#;

    #[test]
    fn test_parse_script_defaults() {
        let spec = CommandSpec::from(parse_script(HEAL).unwrap());
        assert_eq!(spec.name, "heal");
        assert!(spec.require_actor_is_user);
        assert!(!spec.ignore_permission_check);

        let first = &spec.steps[0];
        assert_eq!(first.command, "heal %player%");
        assert_eq!(first.delay_secs, 0);
        assert_eq!(first.targets, Targets::Local);
        assert_eq!(first.executor, ExecutorKind::User);
        assert!(!first.wait_until_online);
    }

    #[test]
    fn test_parse_script_full_step() {
        let spec = CommandSpec::from(parse_script(HEAL).unwrap());
        let second = &spec.steps[1];
        assert_eq!(second.delay_secs, 2);
        assert_eq!(second.targets, Targets::from_ids(["lobby-1", "lobby-2"]));
        assert_eq!(second.executor, ExecutorKind::System);
        assert!(second.wait_until_online);
        assert!(second.disable_presence_check);
    }

    #[test]
    fn test_console_flag_inverts() {
        let script = parse_script(
            "name: motd\nenabled: true\ndisable-check-if-executor-is-player: true\ncommands:\n  - command: motd\n",
        )
        .unwrap();
        assert!(!CommandSpec::from(script).require_actor_is_user);
    }

    #[test]
    fn test_negative_delay_rejected() {
        let result = parse_script("name: x\ncommands:\n  - command: x\n    delay: -1\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_executor_rejected() {
        let result = parse_script("name: x\ncommands:\n  - command: x\n    target-executor: root\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_dir_skips_disabled_and_broken() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_heal.yml"), HEAL).unwrap();
        std::fs::write(
            dir.path().join("b_off.yaml"),
            "name: off\nenabled: false\ncommands:\n  - command: x\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("c_broken.yml"), "name: [unclosed").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "name: ignored").unwrap();

        let specs = load_scripts_from_dir(dir.path()).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "heal");
    }

    #[test]
    fn test_load_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_scripts_from_dir(&dir.path().join("absent")).is_err());
    }
}

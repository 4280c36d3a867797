//! Runner-id-to-command-template map: a single Runner interface backed by a
//! runner-id-to-command-template map loaded at startup. The
//! `{claude, opencode, gemini, mock}` variants are configuration entries,
//! never separate code paths or `match` arms in the executor -- adding a
//! fifth runner is a registry entry, not a new branch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptDelivery {
    /// Prompt is written to the child's stdin.
    Stdin,
    /// Prompt is substituted into `args[index]` verbatim.
    Argv(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
    pub prompt_via: PromptDelivery,
}

#[derive(Debug, Clone)]
pub struct RunnerRegistry {
    templates: BTreeMap<String, CommandTemplate>,
}

impl RunnerRegistry {
    /// The four built-in runner ids named in spec §9. Adding a fifth is a
    /// configuration change (`with_template`), never a new code path.
    pub fn with_defaults() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(
            "claude".to_string(),
            CommandTemplate {
                program: "claude".to_string(),
                args: vec!["--print".to_string()],
                prompt_via: PromptDelivery::Stdin,
            },
        );
        templates.insert(
            "opencode".to_string(),
            CommandTemplate {
                program: "opencode".to_string(),
                args: vec!["run".to_string()],
                prompt_via: PromptDelivery::Stdin,
            },
        );
        templates.insert(
            "gemini".to_string(),
            CommandTemplate {
                program: "gemini".to_string(),
                args: vec!["-p".to_string(), "{prompt}".to_string()],
                prompt_via: PromptDelivery::Argv(1),
            },
        );
        templates.insert(
            "mock".to_string(),
            CommandTemplate {
                program: "true".to_string(),
                args: vec![],
                prompt_via: PromptDelivery::Stdin,
            },
        );
        Self { templates }
    }

    pub fn with_template(mut self, id: impl Into<String>, template: CommandTemplate) -> Self {
        self.templates.insert(id.into(), template);
        self
    }

    pub fn get(&self, id: &str) -> Option<&CommandTemplate> {
        self.templates.get(id)
    }
}

impl Default for RunnerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_four_variants() {
        let reg = RunnerRegistry::with_defaults();
        for id in ["claude", "opencode", "gemini", "mock"] {
            assert!(reg.get(id).is_some(), "missing runner id {id}");
        }
    }

    #[test]
    fn adding_a_runner_is_pure_configuration() {
        let reg = RunnerRegistry::with_defaults().with_template(
            "custom",
            CommandTemplate {
                program: "custom-cli".to_string(),
                args: vec![],
                prompt_via: PromptDelivery::Stdin,
            },
        );
        assert!(reg.get("custom").is_some());
    }
}

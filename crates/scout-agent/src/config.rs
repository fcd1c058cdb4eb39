use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

/// Policy for the file-editing tool.
///
/// `Never` removes the editor from the tool set offered to the model;
/// `Always` and `Ask` both offer it and differ only in whether the
/// confirmation handler is consulted before each edit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    #[default]
    Ask,
    Always,
    Never,
}

impl EditMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditMode::Ask => "ask",
            EditMode::Always => "always",
            EditMode::Never => "never",
        }
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ask" => Ok(EditMode::Ask),
            "always" => Ok(EditMode::Always),
            "never" => Ok(EditMode::Never),
            other => Err(format!(
                "unrecognized edit mode '{other}' (expected ask, always, or never)"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub edit_mode: EditMode,
}

/// Shared handle to the process-wide settings.
///
/// One owner (the front end) mutates; everyone else takes synchronous
/// snapshots, so a mid-run `/settings` change applies from the next read.
#[derive(Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<Settings>>,
}

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn edit_mode(&self) -> EditMode {
        self.inner.read().expect("settings lock poisoned").edit_mode
    }

    pub fn set_edit_mode(&self, edit_mode: EditMode) {
        self.inner.write().expect("settings lock poisoned").edit_mode = edit_mode;
    }
}

/// Per-agent configuration, fixed for the agent's lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentConfig {
    pub model: String,
    pub system_prompt: Option<String>,
    pub thinking_enabled: bool,
    pub max_tokens: u32,
    pub thinking_budget_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".to_string(),
            system_prompt: None,
            thinking_enabled: true,
            // max_tokens must exceed the thinking budget when thinking is on.
            max_tokens: 10_001,
            thinking_budget_tokens: 10_000,
        }
    }
}

impl AgentConfig {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_thinking(mut self, enabled: bool) -> Self {
        self.thinking_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_mode_parses_known_values() {
        assert_eq!("ask".parse::<EditMode>().unwrap(), EditMode::Ask);
        assert_eq!("always".parse::<EditMode>().unwrap(), EditMode::Always);
        assert_eq!("never".parse::<EditMode>().unwrap(), EditMode::Never);
        assert!("sometimes".parse::<EditMode>().is_err());
    }

    #[test]
    fn settings_handle_snapshots_latest_mutation() {
        let settings = SettingsHandle::default();
        assert_eq!(settings.edit_mode(), EditMode::Ask);
        settings.set_edit_mode(EditMode::Never);
        assert_eq!(settings.edit_mode(), EditMode::Never);
    }
}

//! Runtime configuration
//!
//! Every field has a default, so an empty TOML file is a valid config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::{DEBOUNCE_MS, EDIT_POLL_MS, EDIT_TIMEOUT_MS, POLL_INTERVAL_MS};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub shortcuts: ShortcutConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub host: HostConfig,
}

/// Candidate lists, most specific first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_logged_time")]
    pub logged_time: Vec<String>,
    #[serde(default = "default_remaining_time")]
    pub remaining_time: Vec<String>,
    #[serde(default = "default_duration")]
    pub duration: Vec<String>,
    /// Display children preferred over a duration container's own text
    #[serde(default = "default_duration_display")]
    pub duration_display: String,
    #[serde(default = "default_complexity")]
    pub complexity: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,
    #[serde(default = "default_priority_display")]
    pub priority_display: String,
    #[serde(default = "default_target_container")]
    pub target_container: String,
    #[serde(default = "default_target_input")]
    pub target_input: String,
    #[serde(default = "default_edit_button")]
    pub edit_button: String,
    #[serde(default = "default_generic_edit_button")]
    pub generic_edit_button: String,
    #[serde(default = "default_alternative_targets")]
    pub alternative_targets: Vec<String>,
    #[serde(default = "default_placeholder_text")]
    pub placeholder_text: String,
    #[serde(default = "default_modal")]
    pub modal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_edit_poll_ms")]
    pub edit_poll_ms: u64,
    #[serde(default = "default_edit_timeout_ms")]
    pub edit_timeout_ms: u64,
}

/// Key combinations, e.g. `ctrl+shift+a`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortcutConfig {
    #[serde(default = "default_activate_key")]
    pub activate: String,
    #[serde(default = "default_deactivate_key")]
    pub deactivate: String,
    #[serde(default = "default_calculate_key")]
    pub calculate: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// File mirroring the activation flag; in-memory only when unset
    #[serde(default)]
    pub flag_path: Option<PathBuf>,
}

/// Pages that auto-activate on load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_tracker_hosts")]
    pub tracker_hosts: Vec<String>,
    #[serde(default = "default_issue_paths")]
    pub issue_paths: Vec<String>,
    #[serde(default = "default_issue_markers")]
    pub issue_markers: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_logged_time() -> Vec<String> {
    strings(&[r#"[data-testid="issue.issue-view.common.logged-time.value"]"#])
}

fn default_remaining_time() -> Vec<String> {
    strings(&[r#"[data-testid="issue.component.logged-time.remaining-time"]"#])
}

fn default_duration() -> Vec<String> {
    strings(&[
        r#"[data-testid="issue.views.issue-base.context.time-tracking.value"]"#,
        r#"[data-testid*="time-tracking"]"#,
        r#"[data-testid*="time"]"#,
        ".time-tracking",
        "#time-tracking",
        r#"[data-field-id*="time"]"#,
        r#"input[name*="time"]"#,
        r#"select[name*="time"]"#,
    ])
}

fn default_duration_display() -> String {
    r#".time-tracking-display, .time-value, [data-testid*="time"], .field-value"#.to_string()
}

fn default_complexity() -> Vec<String> {
    strings(&[
        r#"[data-testid="issue-field-number-readview-full.ui.number.span"]"#,
        r#"[data-testid="issue.issue-view-layout.issue-view-number-field.customfield_10055"]"#,
        r#"[data-testid*="customfield_10055"]"#,
        r#"[data-testid*="Complexity"]"#,
        r#"[data-testid*="complexity"]"#,
        r#"label[for*="complexity"]"#,
        r#"label[for*="Complexity"]"#,
        ".complexity-field",
        "#complexity",
        r#"[data-field-id*="complexity"]"#,
        r#"[data-field-id*="Complexity"]"#,
        r#"input[name*="complexity"]"#,
        r#"input[name*="Complexity"]"#,
        r#"select[name*="complexity"]"#,
        r#"select[name*="Complexity"]"#,
    ])
}

fn default_priority() -> Vec<String> {
    strings(&[
        r#"[data-testid="issue-field-priority-readview-full.ui.priority.wrapper"]"#,
        r#"[data-testid*="priority"]"#,
        ".priority-field",
        "#priority",
        r#"[data-field-id*="priority"]"#,
        r#"input[name*="priority"]"#,
        r#"select[name*="priority"]"#,
    ])
}

fn default_priority_display() -> String {
    r#".field-value, .value, [data-testid*="value"], span"#.to_string()
}

fn default_target_container() -> String {
    r#"[data-testid="issue-field-number.ui.issue-field-story-point-estimate--container"]"#
        .to_string()
}

fn default_target_input() -> String {
    r#"input[type="number"], input[type="text"]"#.to_string()
}

fn default_edit_button() -> String {
    r#"button[aria-label="Edit Story Points"]"#.to_string()
}

fn default_generic_edit_button() -> String {
    r#"button[aria-label*="Edit"]"#.to_string()
}

fn default_alternative_targets() -> Vec<String> {
    strings(&[
        r#"[data-testid="issue-field-story-point-estimate-readview-full.ui.story-point-estimate"]"#,
        r#"[data-testid*="story-point"]"#,
        r#"[data-testid*="storypoint"]"#,
        ".story-point-field",
        "#story-point",
        r#"[data-field-id*="story"]"#,
        r#"input[name*="story"]"#,
        r#"input[name*="point"]"#,
    ])
}

fn default_placeholder_text() -> String {
    "Add story points".to_string()
}

fn default_modal() -> String {
    r#"[data-testid*="log-time-modal"], [data-testid*="time-modal"]"#.to_string()
}

fn default_debounce_ms() -> u64 {
    DEBOUNCE_MS
}

fn default_poll_interval_ms() -> u64 {
    POLL_INTERVAL_MS
}

fn default_edit_poll_ms() -> u64 {
    EDIT_POLL_MS
}

fn default_edit_timeout_ms() -> u64 {
    EDIT_TIMEOUT_MS
}

fn default_activate_key() -> String {
    "ctrl+shift+a".to_string()
}

fn default_deactivate_key() -> String {
    "ctrl+shift+d".to_string()
}

fn default_calculate_key() -> String {
    "ctrl+shift+c".to_string()
}

fn default_tracker_hosts() -> Vec<String> {
    strings(&["atlassian.net", "jira.com"])
}

fn default_issue_paths() -> Vec<String> {
    strings(&["/browse/", "/issues/", "/secure/"])
}

fn default_issue_markers() -> String {
    r#"[data-testid*="issue"], [data-testid*="Issue"], .issue-view, #issue-content"#.to_string()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            logged_time: default_logged_time(),
            remaining_time: default_remaining_time(),
            duration: default_duration(),
            duration_display: default_duration_display(),
            complexity: default_complexity(),
            priority: default_priority(),
            priority_display: default_priority_display(),
            target_container: default_target_container(),
            target_input: default_target_input(),
            edit_button: default_edit_button(),
            generic_edit_button: default_generic_edit_button(),
            alternative_targets: default_alternative_targets(),
            placeholder_text: default_placeholder_text(),
            modal: default_modal(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            edit_poll_ms: default_edit_poll_ms(),
            edit_timeout_ms: default_edit_timeout_ms(),
        }
    }
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            activate: default_activate_key(),
            deactivate: default_deactivate_key(),
            calculate: default_calculate_key(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tracker_hosts: default_tracker_hosts(),
            issue_paths: default_issue_paths(),
            issue_markers: default_issue_markers(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

//! Keyboard shortcuts: `ctrl+shift+c` style key combinations

use std::str::FromStr;

use crate::config::ShortcutConfig;
use crate::error::ParseError;
use crate::types::Action;

/// Modifiers plus one key, case-insensitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub key: char,
}

impl FromStr for KeyCombo {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut combo = KeyCombo {
            ctrl: false,
            shift: false,
            alt: false,
            key: '\0',
        };
        let mut key = None;
        for part in s.split('+').map(|p| p.trim().to_ascii_lowercase()) {
            match part.as_str() {
                "ctrl" | "control" => combo.ctrl = true,
                "shift" => combo.shift = true,
                "alt" => combo.alt = true,
                other => {
                    let mut chars = other.chars();
                    match (chars.next(), chars.next(), key) {
                        (Some(c), None, None) => key = Some(c),
                        _ => return Err(ParseError::InvalidKeyCombo(s.to_string())),
                    }
                }
            }
        }
        combo.key = key.ok_or_else(|| ParseError::MissingKey(s.to_string()))?;
        Ok(combo)
    }
}

/// Maps key combinations to messaging actions
#[derive(Debug, Clone)]
pub struct Shortcuts {
    bindings: Vec<(KeyCombo, Action)>,
}

impl Shortcuts {
    /// Bindings that fail to parse are left out
    pub fn new(config: &ShortcutConfig) -> Self {
        let bindings = [
            (&config.activate, Action::Activate),
            (&config.deactivate, Action::Deactivate),
            (&config.calculate, Action::Calculate),
        ]
        .into_iter()
        .filter_map(|(combo, action)| match combo.parse::<KeyCombo>() {
            Ok(combo) => Some((combo, action)),
            Err(e) => {
                tracing::warn!(error = %e, ?action, "shortcut ignored");
                None
            }
        })
        .collect();
        Self { bindings }
    }

    /// Action bound to `input`, if it is a bound key combination
    pub fn action_for(&self, input: &str) -> Option<Action> {
        let combo = input.parse::<KeyCombo>().ok()?;
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == combo)
            .map(|(_, action)| *action)
    }
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self::new(&ShortcutConfig::default())
    }
}

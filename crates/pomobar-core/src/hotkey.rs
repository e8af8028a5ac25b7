//! Global shortcut actions and their bindings.
//!
//! The OS-level registration lives in the host. The core only knows the
//! abstract actions a shortcut can trigger and how bindings are stored and
//! displayed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotkeyAction {
    StartPause,
    Reset,
    ShowStatistics,
}

impl HotkeyAction {
    pub const ALL: [HotkeyAction; 3] = [
        HotkeyAction::StartPause,
        HotkeyAction::Reset,
        HotkeyAction::ShowStatistics,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            HotkeyAction::StartPause => "Start/Pause Timer",
            HotkeyAction::Reset => "Reset Timer",
            HotkeyAction::ShowStatistics => "Show Statistics",
        }
    }

    pub fn default_key(self) -> &'static str {
        match self {
            HotkeyAction::StartPause => "P",
            HotkeyAction::Reset => "R",
            HotkeyAction::ShowStatistics => "S",
        }
    }
}

impl fmt::Display for HotkeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for HotkeyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start_pause" | "startPause" => Ok(HotkeyAction::StartPause),
            "reset" => Ok(HotkeyAction::Reset),
            "show_statistics" | "showStatistics" => Ok(HotkeyAction::ShowStatistics),
            other => Err(format!("unknown shortcut action: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutBinding {
    pub action: HotkeyAction,
    /// Any of `cmd`, `shift`, `option`, `control`.
    pub modifiers: Vec<String>,
    pub key: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl ShortcutBinding {
    pub fn new(action: HotkeyAction) -> Self {
        Self {
            action,
            modifiers: vec!["cmd".into(), "shift".into()],
            key: action.default_key().into(),
            enabled: true,
        }
    }

    /// Menu-style rendering, e.g. `⌘⇧P`. Modifiers print in a fixed order.
    pub fn display_string(&self) -> String {
        let mut out = String::new();
        for (name, symbol) in [
            ("cmd", "\u{2318}"),
            ("shift", "\u{21E7}"),
            ("option", "\u{2325}"),
            ("control", "\u{2303}"),
        ] {
            if self.modifiers.iter().any(|m| m == name) {
                out.push_str(symbol);
            }
        }
        out.push_str(&self.key.to_uppercase());
        out
    }
}

pub fn default_shortcuts() -> Vec<ShortcutBinding> {
    HotkeyAction::ALL.into_iter().map(ShortcutBinding::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bindings_cover_every_action() {
        let shortcuts = default_shortcuts();
        let keys: Vec<_> = shortcuts.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["P", "R", "S"]);
        assert!(shortcuts.iter().all(|s| s.enabled));
    }

    #[test]
    fn display_string_orders_modifiers() {
        let binding = ShortcutBinding {
            action: HotkeyAction::Reset,
            modifiers: vec!["control".into(), "cmd".into(), "option".into()],
            key: "r".into(),
            enabled: true,
        };
        assert_eq!(binding.display_string(), "\u{2318}\u{2325}\u{2303}R");
        assert_eq!(
            ShortcutBinding::new(HotkeyAction::StartPause).display_string(),
            "\u{2318}\u{21E7}P"
        );
    }

    #[test]
    fn parses_action_identifiers() {
        assert_eq!("startPause".parse::<HotkeyAction>().unwrap(), HotkeyAction::StartPause);
        assert_eq!("show_statistics".parse::<HotkeyAction>().unwrap(), HotkeyAction::ShowStatistics);
        assert!("launch".parse::<HotkeyAction>().is_err());
    }
}

use clap::Subcommand;
use pomobar_core::storage::CONFIG_KEYS;
use pomobar_core::{Config, ConfigError, HotkeyAction, ShortcutBinding};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "work_minutes", "shortcuts.0.key")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// Set the daily goal (clamped to at least 1)
    Goal {
        #[arg(allow_negative_numbers = true)]
        goal: i64,
    },
    /// Rebind a global shortcut
    Shortcut {
        /// start_pause, reset or show_statistics
        action: HotkeyAction,
        /// Key, e.g. "P"
        key: String,
        /// Comma-separated modifiers: cmd, shift, option, control
        #[arg(long, value_delimiter = ',', default_value = "cmd,shift")]
        modifiers: Vec<String>,
        /// Keep the binding but disable it
        #[arg(long)]
        disabled: bool,
    },
    /// List all config values
    List,
    /// List the keys accepted by get and set
    Keys,
    /// Reset config to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(ConfigError::UnknownKey(key).into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let config = Config::load()?.with_value(&key, &value)?;
            config.save()?;
            println!("ok");
        }
        ConfigAction::Goal { goal } => {
            let config = Config::load()?.with_daily_goal(goal);
            config.save()?;
            println!("{}", config.daily_goal);
        }
        ConfigAction::Shortcut {
            action,
            key,
            modifiers,
            disabled,
        } => {
            let binding = ShortcutBinding {
                action,
                modifiers,
                key,
                enabled: !disabled,
            };
            let config = Config::load()?.with_shortcut(binding.clone());
            config.save()?;
            println!("{}: {}", action, binding.display_string());
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        ConfigAction::Keys => {
            for key in CONFIG_KEYS {
                println!("{key}");
            }
            println!("shortcuts.<index>.<action|modifiers|key|enabled>");
        }
        ConfigAction::Reset => {
            let config = Config::default();
            config.save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}

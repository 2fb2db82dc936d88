//! Runtime settings: optional JSON config file plus environment overrides.
//!
//! | Variable              | Meaning                                        |
//! |-----------------------|------------------------------------------------|
//! | `GESTURECALL_CONFIG`  | JSON config file (classifier/session/detector) |
//! | `GESTURECALL_REPLAY`  | recorded session (JSON lines), or first arg    |
//! | `GESTURECALL_ROOM`    | room to join                                   |
//! | `GESTURECALL_NAME`    | display name (default: host name)              |
//! | `GESTURECALL_RELAY`   | relay `host[:port]`; unset = private room      |
//! | `GESTURECALL_LINGER_MS` | wait after the last frame before leaving     |

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use gesturecall_core::GestureCallConfig;

const DEFAULT_LINGER_MS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct Settings {
    pub config: GestureCallConfig,
    pub replay_path: PathBuf,
    pub relay: Option<String>,
    pub linger_ms: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let config_json = match lookup("GESTURECALL_CONFIG") {
            Some(path) => Some(
                std::fs::read_to_string(&path).with_context(|| format!("reading config file {path}"))?,
            ),
            None => None,
        };
        Self::resolve(config_json.as_deref(), std::env::args().nth(1), lookup)
    }

    /// Build settings from a config document, an optional replay argument
    /// and an environment lookup.
    fn resolve(
        config_json: Option<&str>,
        replay_arg: Option<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match config_json {
            Some(json) => GestureCallConfig::from_json(json).context("parsing config")?,
            None => GestureCallConfig::default(),
        };

        if let Some(room) = lookup("GESTURECALL_ROOM") {
            config.session.room = room;
        }
        if let Some(name) = lookup("GESTURECALL_NAME") {
            config.session.display_name = Some(name);
        }
        if config.session.display_name.is_none() {
            config.session.display_name = hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok());
        }

        let replay_path = match replay_arg.or_else(|| lookup("GESTURECALL_REPLAY")) {
            Some(path) => PathBuf::from(path),
            None => bail!("no replay file: pass a path or set GESTURECALL_REPLAY"),
        };

        let linger_ms = match lookup("GESTURECALL_LINGER_MS") {
            Some(v) => v.parse().with_context(|| format!("GESTURECALL_LINGER_MS={v}"))?,
            None => DEFAULT_LINGER_MS,
        };

        Ok(Self {
            config,
            replay_path,
            relay: lookup("GESTURECALL_RELAY"),
            linger_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn environment_overrides_config_file() {
        let json = r#"{"session": {"room": "from-file", "displayName": "File"}}"#;
        let settings = Settings::resolve(
            Some(json),
            None,
            env(&[
                ("GESTURECALL_ROOM", "from-env"),
                ("GESTURECALL_REPLAY", "session.jsonl"),
                ("GESTURECALL_RELAY", "10.0.0.5:7900"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.config.session.room, "from-env");
        assert_eq!(settings.config.session.display_name.as_deref(), Some("File"));
        assert_eq!(settings.replay_path, PathBuf::from("session.jsonl"));
        assert_eq!(settings.relay.as_deref(), Some("10.0.0.5:7900"));
        assert_eq!(settings.linger_ms, DEFAULT_LINGER_MS);
    }

    #[test]
    fn argument_wins_over_environment_replay() {
        let settings = Settings::resolve(
            None,
            Some("arg.jsonl".into()),
            env(&[("GESTURECALL_REPLAY", "env.jsonl"), ("GESTURECALL_NAME", "Ana")]),
        )
        .unwrap();
        assert_eq!(settings.replay_path, PathBuf::from("arg.jsonl"));
        assert_eq!(settings.config.session.display_name.as_deref(), Some("Ana"));
        assert!(settings.relay.is_none());
    }

    #[test]
    fn missing_replay_is_an_error() {
        assert!(Settings::resolve(None, None, env(&[])).is_err());
    }

    #[test]
    fn invalid_linger_is_an_error() {
        let lookup = env(&[("GESTURECALL_REPLAY", "x"), ("GESTURECALL_LINGER_MS", "soon")]);
        assert!(Settings::resolve(None, None, lookup).is_err());
    }
}

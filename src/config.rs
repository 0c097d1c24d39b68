//! Application-level configuration loading: topic lists and fixed game timings.

use std::{env, fs, io::ErrorKind, path::PathBuf, sync::Arc};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{dto::settings::TopicSet, game::mafia::MafiaTimings};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PARTY_ROOMS_CONFIG_PATH";

/// Secret pools of the guessing game, one per [`TopicSet`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Topics {
    /// Places, for [`TopicSet::Locations`].
    pub locations: Vec<String>,
    /// Dishes, for [`TopicSet::Foods`].
    pub foods: Vec<String>,
    /// Animals, for [`TopicSet::Animals`].
    pub animals: Vec<String>,
}

impl Topics {
    /// Pool backing `set`.
    pub fn list(&self, set: TopicSet) -> &[String] {
        match set {
            TopicSet::Locations => &self.locations,
            TopicSet::Foods => &self.foods,
            TopicSet::Animals => &self.animals,
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|item| (*item).to_string()).collect()
        }

        Self {
            locations: owned(&[
                "Airplane",
                "Bank",
                "Beach",
                "Casino",
                "Cathedral",
                "Circus Tent",
                "Embassy",
                "Hospital",
                "Hotel",
                "Military Base",
                "Movie Studio",
                "Ocean Liner",
                "Passenger Train",
                "Pirate Ship",
                "Polar Station",
                "Police Station",
                "Restaurant",
                "School",
                "Service Station",
                "Space Station",
                "Submarine",
                "Supermarket",
                "Theater",
                "University",
            ]),
            foods: owned(&[
                "Burrito",
                "Cheesecake",
                "Curry",
                "Dumplings",
                "Falafel",
                "Lasagna",
                "Pancakes",
                "Pho",
                "Pizza",
                "Ramen",
                "Risotto",
                "Sushi",
                "Tacos",
                "Waffles",
            ]),
            animals: owned(&[
                "Camel",
                "Dolphin",
                "Eagle",
                "Elephant",
                "Giraffe",
                "Kangaroo",
                "Octopus",
                "Owl",
                "Panda",
                "Penguin",
                "Shark",
                "Tiger",
                "Turtle",
                "Wolf",
            ]),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Guessing-game pools, shared with every room.
    pub topics: Arc<Topics>,
    timings: MafiaTimings,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        locations = app_config.topics.locations.len(),
                        foods = app_config.topics.foods.len(),
                        animals = app_config.topics.animals.len(),
                        "loaded topics and timings from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Fixed social-deduction durations.
    pub fn mafia_timings(&self) -> MafiaTimings {
        self.timings
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            topics: Arc::new(Topics::default()),
            timings: MafiaTimings::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    topics: Option<Topics>,
    #[serde(default)]
    timings: Option<RawTimings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Fixed social-deduction durations, in seconds.
struct RawTimings {
    recap_seconds: u32,
    guilt_vote_seconds: u32,
    opening_seconds: u32,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let timings = value
            .timings
            .map(|raw| MafiaTimings {
                recap_seconds: i64::from(raw.recap_seconds.max(1)),
                guilt_vote_seconds: i64::from(raw.guilt_vote_seconds.max(1)),
                opening_seconds: i64::from(raw.opening_seconds.max(1)),
            })
            .unwrap_or_default();

        Self {
            topics: Arc::new(value.topics.unwrap_or_default()),
            timings,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"timings":{"recapSeconds":3,"guiltVoteSeconds":0,"openingSeconds":4}}"#)
                .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.topics.as_ref(), &Topics::default());
        assert_eq!(
            config.mafia_timings(),
            MafiaTimings {
                recap_seconds: 3,
                guilt_vote_seconds: 1,
                opening_seconds: 4,
            }
        );
    }

    #[test]
    fn topic_sets_map_to_lists() {
        let topics = Topics {
            locations: vec!["Bank".into()],
            foods: vec![],
            animals: vec!["Owl".into(), "Wolf".into()],
        };
        assert_eq!(topics.list(TopicSet::Locations), ["Bank".to_string()]);
        assert!(topics.list(TopicSet::Foods).is_empty());
        assert_eq!(topics.list(TopicSet::Animals).len(), 2);
    }
}

//! Room settings accepted from clients and echoed back to them.
//!
//! Numeric fields accept either JSON numbers or numeric strings, then go
//! through range validation before a room ever sees them.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use validator::{Validate, ValidationErrors};

use crate::{dto::validation::validate_adversary_count, game::GameKind};

/// Settings of the social-deduction game.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct MafiaSettings {
    /// Day length in seconds; negative means the day only ends on a verdict or host action.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[validate(range(min = -1, max = 3600))]
    pub day_time_limit: i64,
    /// Night length in seconds.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[validate(range(min = 5, max = 600))]
    pub night_time_limit: i64,
    /// Defense window of a trial in seconds.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[validate(range(min = 5, max = 300))]
    pub defense_time_limit: i64,
    /// Adversaries to deal; `-1` picks a count from the headcount.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[validate(custom(function = "validate_adversary_count"))]
    pub num_mafia: i64,
    /// Deal an independent killer.
    #[serde(rename = "allowSK")]
    pub allow_serial_killer: bool,
    /// Deal an independent joker.
    pub allow_joker: bool,
}

impl Default for MafiaSettings {
    fn default() -> Self {
        Self {
            day_time_limit: 300,
            night_time_limit: 60,
            defense_time_limit: 20,
            num_mafia: -1,
            allow_serial_killer: false,
            allow_joker: false,
        }
    }
}

/// Topic family the guessing game draws its secret from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TopicSet {
    #[default]
    Locations,
    Foods,
    Animals,
}

/// Settings of the hidden-role guessing game.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SpyfallSettings {
    /// Round length in minutes.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[validate(range(min = 1, max = 30))]
    pub time: i64,
    /// Topic family for the secret.
    pub topic: TopicSet,
}

impl Default for SpyfallSettings {
    fn default() -> Self {
        Self {
            time: 8,
            topic: TopicSet::Locations,
        }
    }
}

/// Game-specific settings, tagged by game type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum GameSettings {
    Mafia(MafiaSettings),
    Spyfall(SpyfallSettings),
}

impl GameSettings {
    /// Game these settings configure.
    pub fn kind(&self) -> GameKind {
        match self {
            GameSettings::Mafia(_) => GameKind::Mafia,
            GameSettings::Spyfall(_) => GameKind::Spyfall,
        }
    }

    /// Default settings for a game type.
    pub fn defaults_for(kind: GameKind) -> Self {
        match kind {
            GameKind::Mafia => GameSettings::Mafia(MafiaSettings::default()),
            GameKind::Spyfall => GameSettings::Spyfall(SpyfallSettings::default()),
        }
    }
}

impl Validate for GameSettings {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            GameSettings::Mafia(settings) => settings.validate(),
            GameSettings::Spyfall(settings) => settings.validate(),
        }
    }
}

/// Complete room configuration as exchanged with clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    /// Private rooms are hidden from room listings.
    #[serde(default)]
    pub is_private: bool,
    /// Rules of the hosted game.
    pub rules: GameSettings,
}

impl Validate for RoomSettings {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.rules.validate()
    }
}

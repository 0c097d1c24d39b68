use serde::{Deserialize, Serialize};

use super::roles::Role;

/// Day-vote choice: a seat or the abstain pseudo-target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoteTarget {
    /// Vote to put the seat at this index on trial.
    Player(usize),
    /// Vote to skip the day without a trial.
    Abstain,
}

/// Trial decision cast during the guilt-voting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    /// Execute the accused.
    Guilty,
    /// Spare the accused.
    NotGuilty,
}

impl Verdict {
    /// Human readable verdict.
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Guilty => "guilty",
            Verdict::NotGuilty => "not guilty",
        }
    }
}

/// Per-seat game state, addressed by the seat's positional index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Role dealt to the seat.
    pub role: Role,
    /// Dead seats keep their profile but can no longer act or be targeted.
    pub is_alive: bool,
    /// Count of other profiles whose `voting_for` points here.
    pub num_votes: usize,
    /// `None` while undecided.
    pub voting_for: Option<VoteTarget>,
    /// Night target of the role's power.
    pub target_of_power: Option<usize>,
    /// Trial vote, cleared every day.
    pub verdict: Option<Verdict>,
}

impl Profile {
    /// Living profile with no vote and no target.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            is_alive: true,
            num_votes: 0,
            voting_for: None,
            target_of_power: None,
            verdict: None,
        }
    }

    /// Clear the fields that only live for one day; role and alive state persist.
    pub fn reset_day(&mut self) {
        self.num_votes = 0;
        self.voting_for = None;
        self.verdict = None;
    }
}

/// Result of a detective investigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Investigation {
    /// Investigated seat.
    pub index: usize,
    /// Display name of the investigated seat.
    pub name: String,
    /// Role as it appears to the detective.
    pub role: Role,
}

/// Private outcome of one night for one seat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightOutcome {
    /// Targeted by at least one attack.
    pub was_attacked: bool,
    /// Attacked and protected by the medic.
    pub was_saved: bool,
    /// What the detective learned, on the detective's own outcome.
    pub investigation: Option<Investigation>,
    /// Free-form lines shown to the seat.
    pub notes: Vec<String>,
}

/// Seat index, display name and role, used for deaths and end-of-game reveals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatReveal {
    /// Seat index.
    pub index: usize,
    /// Display name.
    pub name: String,
    /// Role dealt to the seat.
    pub role: Role,
}

use thiserror::Error;

/// Reasons a game rejects an action from a seated player.
///
/// These are state errors: the client asked for something that does not fit the
/// phase the authoritative game is in. They are reported back to the sender and
/// never abort the room.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// No game is running in this room.
    #[error("no game is running")]
    NotRunning,
    /// The action belongs to another phase of the game.
    #[error("{action} is not allowed during {phase}")]
    WrongPhase {
        /// Action that was attempted.
        action: &'static str,
        /// Human readable label of the current phase.
        phase: String,
    },
    /// A trial is underway and day voting is frozen.
    #[error("a trial is in progress")]
    TrialInProgress,
    /// Guilt voting was attempted while no trial is running.
    #[error("there is no trial to vote on")]
    NoTrial,
    /// Guilt voting was attempted while the accused is still defending.
    #[error("the accused is still presenting their defense")]
    DefenseInProgress,
    /// The accused player cannot judge their own trial.
    #[error("the accused cannot vote on their own trial")]
    AccusedCannotVote,
    /// The acting player is dead.
    #[error("dead players cannot act")]
    NotAlive,
    /// The acting player's role has no night power.
    #[error("your role has no night action")]
    NoNightPower,
    /// The seat index does not exist in this game.
    #[error("seat {0} does not exist")]
    UnknownSeat(usize),
    /// The target cannot be chosen for this action.
    #[error("seat {0} cannot be targeted")]
    InvalidTarget(usize),
    /// Not enough members to deal every required role.
    #[error("at least {needed} players are needed, the room has {present}")]
    NotEnoughPlayers {
        /// Minimum members required by the current settings.
        needed: usize,
        /// Members currently in the room.
        present: usize,
    },
    /// The settings would deal no adversary at all.
    #[error("at least one mafia member must be dealt")]
    NoAdversaries,
    /// The configured topic list for the guessing game is empty.
    #[error("the selected topic list is empty")]
    NoTopics,
    /// Settings for another game type were supplied.
    #[error("settings do not match this room's game")]
    SettingsMismatch,
}

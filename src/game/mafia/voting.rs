use tracing::info;

use super::{MafiaGame, Trial, Verdict, VoteTarget, quorum};
use crate::{
    dto::ws::ServerMessage,
    game::GameError,
    state::hub::Outbox,
};

impl MafiaGame {
    fn vote_label(&self, target: VoteTarget) -> String {
        match target {
            VoteTarget::Player(index) => self.name(index).to_string(),
            VoteTarget::Abstain => "abstaining".to_string(),
        }
    }

    /// Day vote of seat `me`.
    ///
    /// Choosing the current choice again retracts it. A majority on one seat
    /// opens a trial; a majority of abstentions ends the day.
    pub fn vote_player(
        &mut self,
        me: usize,
        target: VoteTarget,
        outbox: &mut Outbox,
    ) -> Result<(), GameError> {
        self.ensure_playing()?;
        if !self.is_day() || self.is_recap || self.phase == 0 {
            return Err(self.wrong_phase("voting"));
        }
        if self.trial.is_some() {
            return Err(GameError::TrialInProgress);
        }
        self.check_actor(me)?;
        if let VoteTarget::Player(index) = target {
            self.check_target(me, index, false)?;
        }

        let voter = self.name(me).to_string();
        let previous = self.profiles[me].voting_for;
        let (next, message, ack) = match (previous, target) {
            (Some(VoteTarget::Abstain), VoteTarget::Abstain) => {
                self.num_abstaining -= 1;
                (
                    None,
                    format!("{voter} is no longer abstaining."),
                    "You are no longer abstaining.".to_string(),
                )
            }
            (Some(VoteTarget::Player(old)), VoteTarget::Player(new)) if old == new => {
                self.profiles[old].num_votes -= 1;
                let name = self.name(old).to_string();
                (
                    None,
                    format!("{voter} retracted their vote for {name}."),
                    format!("You retracted your vote for {name}."),
                )
            }
            (Some(old), new) => {
                match old {
                    VoteTarget::Player(index) => self.profiles[index].num_votes -= 1,
                    VoteTarget::Abstain => self.num_abstaining -= 1,
                }
                self.count_vote(new);
                let (from, to) = (self.vote_label(old), self.vote_label(new));
                (
                    Some(new),
                    format!("{voter} switched from {from} to {to}."),
                    format!("You switched from {from} to {to}."),
                )
            }
            (None, VoteTarget::Abstain) => {
                self.count_vote(target);
                (
                    Some(target),
                    format!("{voter} has chosen to abstain."),
                    "You have chosen to abstain.".to_string(),
                )
            }
            (None, VoteTarget::Player(index)) => {
                self.count_vote(target);
                let name = self.name(index).to_string();
                (
                    Some(target),
                    format!("{voter} voted for {name}."),
                    format!("You voted for {name}."),
                )
            }
        };
        self.profiles[me].voting_for = next;

        outbox.broadcast(
            self.room_id.as_str(),
            ServerMessage::VoteUpdate {
                voter: me,
                target: next,
                tallies: self.profiles.iter().map(|p| p.num_votes).collect(),
                abstaining: self.num_abstaining,
                message,
            },
        );
        outbox.send_to(
            self.seats[me].user_id.as_str(),
            ServerMessage::VoteAck { message: ack },
        );

        let needed = quorum(self.alive.total());
        if self.num_abstaining >= needed {
            outbox.broadcast(
                self.room_id.as_str(),
                ServerMessage::VotingAbstained {
                    message: "The town has decided not to put anyone on trial today.".to_string(),
                },
            );
            self.main_clock.cancel();
            self.enter_recap(outbox);
            info!(room_id = %self.room_id, phase = self.phase, "day abstained");
            return Ok(());
        }

        if let Some(VoteTarget::Player(accused)) = next {
            if self.profiles[accused].num_votes >= needed {
                self.begin_trial(accused, outbox);
            }
        }
        Ok(())
    }

    fn count_vote(&mut self, target: VoteTarget) {
        match target {
            VoteTarget::Player(index) => self.profiles[index].num_votes += 1,
            VoteTarget::Abstain => self.num_abstaining += 1,
        }
    }

    fn begin_trial(&mut self, accused: usize, outbox: &mut Outbox) {
        self.main_clock.cancel();
        self.trial = Some(Trial {
            accused,
            defending: true,
        });
        let seconds = self.settings.defense_time_limit;
        self.trial_clock.start(seconds);

        outbox.broadcast(
            self.room_id.as_str(),
            ServerMessage::BeginTrial {
                accused,
                name: self.name(accused).to_string(),
                defense_seconds: seconds,
            },
        );
        info!(room_id = %self.room_id, accused, "trial started");
    }

    /// Guilt vote of seat `me` during the voting window of a trial.
    pub fn vote_guilty(
        &mut self,
        me: usize,
        verdict: Verdict,
        outbox: &mut Outbox,
    ) -> Result<(), GameError> {
        self.ensure_playing()?;
        let trial = self.trial.ok_or(GameError::NoTrial)?;
        if trial.defending {
            return Err(GameError::DefenseInProgress);
        }
        self.check_actor(me)?;
        if me == trial.accused {
            return Err(GameError::AccusedCannotVote);
        }

        let voter = self.name(me).to_string();
        let previous = self.profiles[me].verdict;
        let (next, message) = match previous {
            Some(old) if old == verdict => (
                None,
                format!("{voter} withdrew their {} vote.", old.label()),
            ),
            Some(old) => (
                Some(verdict),
                format!(
                    "{voter} changed their vote from {} to {}.",
                    old.label(),
                    verdict.label()
                ),
            ),
            None => (
                Some(verdict),
                format!("{voter} voted {}.", verdict.label()),
            ),
        };
        self.profiles[me].verdict = next;

        outbox.broadcast(
            self.room_id.as_str(),
            ServerMessage::GuiltVoteUpdate {
                voter: me,
                verdict: next,
                message: message.clone(),
            },
        );
        outbox.send_to(
            self.seats[me].user_id.as_str(),
            ServerMessage::VoteAck { message },
        );
        Ok(())
    }

    /// Advance the defense or guilt-vote window by one second.
    pub(super) fn tick_trial(&mut self, outbox: &mut Outbox) {
        let Some(tick) = self.trial_clock.tick() else {
            return;
        };
        outbox.broadcast(
            self.room_id.as_str(),
            ServerMessage::SecondaryTimeUpdate {
                time_remaining: tick.shown,
                is_defending: self.is_defending(),
            },
        );
        if !tick.expired {
            return;
        }

        match self.trial {
            Some(Trial {
                accused,
                defending: true,
            }) => {
                self.trial = Some(Trial {
                    accused,
                    defending: false,
                });
                let seconds = self.timings.guilt_vote_seconds;
                self.trial_clock.start(seconds);
                outbox.broadcast(
                    self.room_id.as_str(),
                    ServerMessage::GuiltVotingOpened { accused, seconds },
                );
            }
            Some(Trial { accused, .. }) => self.resolve_trial(accused, outbox),
            None => self.trial_clock.cancel(),
        }
    }

    fn resolve_trial(&mut self, accused: usize, outbox: &mut Outbox) {
        self.trial_clock.cancel();
        self.trial = None;

        let (guilty_votes, innocent_votes) =
            self.profiles
                .iter()
                .fold((0, 0), |(guilty, innocent), profile| match profile.verdict {
                    Some(Verdict::Guilty) => (guilty + 1, innocent),
                    Some(Verdict::NotGuilty) => (guilty, innocent + 1),
                    None => (guilty, innocent),
                });
        let guilty = guilty_votes > innocent_votes;
        let name = self.name(accused).to_string();
        info!(
            room_id = %self.room_id,
            accused,
            guilty_votes,
            innocent_votes,
            "trial resolved"
        );

        if guilty {
            let revealed = self.kill(accused);
            self.profiles[accused].num_votes = 0;
            outbox.broadcast(
                self.room_id.as_str(),
                ServerMessage::TrialVerdict {
                    accused,
                    name,
                    guilty,
                    guilty_votes,
                    innocent_votes,
                    role: Some(revealed.role),
                },
            );
            self.enter_recap(outbox);
            return;
        }

        outbox.broadcast(
            self.room_id.as_str(),
            ServerMessage::TrialVerdict {
                accused,
                name,
                guilty,
                guilty_votes,
                innocent_votes,
                role: None,
            },
        );
        for profile in &mut self.profiles {
            profile.reset_day();
        }
        self.num_abstaining = 0;

        // An infinite day stays suspended until something ends it.
        if self.main_clock.remaining() >= 0 {
            self.main_clock.resume();
        }
    }
}

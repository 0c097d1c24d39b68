use std::collections::BTreeMap;

use rand::seq::IndexedRandom;
use tracing::info;

use super::{Investigation, MafiaGame, NightOutcome, PendingRecap, Power, Role, SeatReveal};
use crate::{dto::ws::ServerMessage, game::GameError, state::hub::Outbox};

impl MafiaGame {
    /// Night power target of seat `me`; choosing the current target again clears it.
    ///
    /// Adversary choices are shared on the adversary channel, every other
    /// power is acknowledged to the actor only.
    pub fn track_interaction_request(
        &mut self,
        me: usize,
        target: usize,
        outbox: &mut Outbox,
    ) -> Result<(), GameError> {
        self.ensure_playing()?;
        if self.is_day() || self.is_recap {
            return Err(self.wrong_phase("night actions"));
        }
        self.check_actor(me)?;
        let role = self.profiles[me].role;
        let power = role.power().ok_or(GameError::NoNightPower)?;
        self.check_target(me, target, power == Power::Protect)?;

        let actor = self.name(me).to_string();
        let subject = self.name(target).to_string();
        let clearing = self.profiles[me].target_of_power == Some(target);
        let next = if clearing { None } else { Some(target) };
        self.profiles[me].target_of_power = next;

        if role.is_adversary() {
            let message = if clearing {
                format!("{actor} is no longer targeting {subject}.")
            } else {
                format!("{actor} is targeting {subject}.")
            };
            outbox.broadcast(
                self.adversary_channel.as_str(),
                ServerMessage::TargetUpdate {
                    actor: me,
                    target: next,
                    message,
                },
            );
        } else {
            let message = if clearing {
                format!("You are no longer targeting {subject}.")
            } else {
                format!("You are targeting {subject}.")
            };
            outbox.send_to(
                self.seats[me].user_id.as_str(),
                ServerMessage::TargetUpdate {
                    actor: me,
                    target: next,
                    message,
                },
            );
        }
        Ok(())
    }

    /// Pick the adversaries' victim by plurality, breaking ties uniformly at random.
    fn adversary_victim(&mut self) -> Option<usize> {
        let mut tally: BTreeMap<usize, usize> = BTreeMap::new();
        for profile in &self.profiles {
            if profile.is_alive && profile.role.is_adversary() {
                if let Some(target) = profile.target_of_power {
                    *tally.entry(target).or_default() += 1;
                }
            }
        }

        let top = tally.values().copied().max()?;
        let tied: Vec<usize> = tally
            .into_iter()
            .filter(|(_, votes)| *votes == top)
            .map(|(target, _)| target)
            .collect();
        tied.choose(&mut self.rng).copied()
    }

    /// First living seat holding `role` together with its night target.
    fn living_power(&self, role: Role) -> Option<(usize, Option<usize>)> {
        self.profiles
            .iter()
            .enumerate()
            .find(|(_, profile)| profile.is_alive && profile.role == role)
            .map(|(index, profile)| (index, profile.target_of_power))
    }

    /// Apply every night power, notify each living seat privately and queue the public recap.
    pub(super) fn resolve_night(&mut self, outbox: &mut Outbox) {
        let night = self.night_number();
        let mut outcomes = vec![NightOutcome::default(); self.profiles.len()];

        let mut attacked: Vec<usize> = Vec::with_capacity(2);
        if let Some(victim) = self.adversary_victim() {
            attacked.push(victim);
        }
        if let Some((_, Some(victim))) = self.living_power(Role::SerialKiller) {
            if !attacked.contains(&victim) {
                attacked.push(victim);
            }
        }

        let medic = self.living_power(Role::Medic);
        let protected = medic.and_then(|(_, target)| target);
        let mut deaths = Vec::new();

        for &victim in &attacked {
            outcomes[victim].was_attacked = true;
            if protected == Some(victim) {
                outcomes[victim].was_saved = true;
                outcomes[victim]
                    .notes
                    .push("You were attacked last night, but the medic saved you.".to_string());
                if let Some((medic_index, _)) = medic {
                    if medic_index != victim {
                        outcomes[medic_index].notes.push(format!(
                            "{} was attacked last night and you saved them.",
                            self.name(victim)
                        ));
                    }
                }
            } else {
                outcomes[victim]
                    .notes
                    .push("You were killed last night.".to_string());
                deaths.push(victim);
            }
        }

        if let (Some((medic_index, _)), Some(patient)) = (medic, protected) {
            if !attacked.contains(&patient) {
                outcomes[medic_index].notes.push(format!(
                    "Nobody attacked {} last night.",
                    self.name(patient)
                ));
            }
        }

        let mut reveal = None;
        if let Some((detective, Some(suspect))) = self.living_power(Role::Detective) {
            let found = Investigation {
                index: suspect,
                name: self.name(suspect).to_string(),
                role: self.profiles[suspect].role.apparent(),
            };
            outcomes[detective].investigation = Some(found.clone());
            reveal = Some((detective, found));
        }

        for (index, outcome) in outcomes.into_iter().enumerate() {
            if !self.profiles[index].is_alive {
                continue;
            }
            outbox.send_to(
                self.seats[index].user_id.as_str(),
                ServerMessage::NightResult {
                    night,
                    was_attacked: outcome.was_attacked,
                    was_saved: outcome.was_saved,
                    investigation: outcome.investigation,
                    notes: outcome.notes,
                },
            );
        }

        let deaths: Vec<SeatReveal> = deaths.into_iter().map(|i| self.kill(i)).collect();
        for profile in &mut self.profiles {
            profile.target_of_power = None;
        }

        info!(
            room_id = %self.room_id,
            night,
            deaths = deaths.len(),
            "night resolved"
        );
        self.pending_recap = Some(PendingRecap {
            night,
            deaths,
            reveal,
        });
    }
}

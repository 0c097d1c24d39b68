use rand::{SeedableRng, rngs::StdRng};

use super::*;
use crate::{
    dto::{settings::MafiaSettings, ws::ServerMessage},
    game::{Game, GameError, Seat},
    state::hub::{Outbound, Outbox},
};

const ROOM: &str = "ROOM01";

fn settings(num_mafia: i64) -> MafiaSettings {
    MafiaSettings {
        day_time_limit: 30,
        night_time_limit: 10,
        defense_time_limit: 5,
        num_mafia,
        allow_serial_killer: false,
        allow_joker: false,
    }
}

fn timings() -> MafiaTimings {
    MafiaTimings {
        recap_seconds: 2,
        guilt_vote_seconds: 3,
        opening_seconds: 1,
    }
}

fn seats(count: usize) -> Vec<Seat> {
    (0..count)
        .map(|i| Seat {
            user_id: format!("user-{i}"),
            name: format!("P{i}"),
        })
        .collect()
}

fn user(index: usize) -> String {
    format!("user-{index}")
}

fn started(count: usize, settings: MafiaSettings, seed: u64) -> (MafiaGame, Outbox) {
    let mut game = MafiaGame::with_rng(ROOM, settings, timings(), StdRng::seed_from_u64(seed));
    let mut outbox = Outbox::new();
    game.begin(seats(count), &mut outbox).unwrap();
    (game, outbox)
}

fn tick_until(game: &mut MafiaGame, outbox: &mut Outbox, done: impl Fn(&MafiaGame) -> bool) {
    for _ in 0..10_000 {
        if done(game) {
            return;
        }
        game.tick(outbox);
    }
    panic!("condition not reached");
}

fn to_night(game: &mut MafiaGame, outbox: &mut Outbox, night: u32) {
    tick_until(game, outbox, |g| g.phase() == night * 2 - 1 && !g.is_recap());
}

fn to_day(game: &mut MafiaGame, outbox: &mut Outbox, day: u32) {
    tick_until(game, outbox, |g| g.phase() == day * 2 && !g.is_recap());
}

fn seat_of(game: &MafiaGame, role: Role) -> usize {
    game.profiles()
        .iter()
        .position(|profile| profile.role == role)
        .unwrap()
}

fn seats_where(game: &MafiaGame, keep: impl Fn(&Profile) -> bool) -> Vec<usize> {
    game.profiles()
        .iter()
        .enumerate()
        .filter(|(_, profile)| keep(profile))
        .map(|(index, _)| index)
        .collect()
}

fn assert_tally_invariant(game: &MafiaGame) {
    let profiles = game.profiles();
    for (i, profile) in profiles.iter().enumerate() {
        let expected = profiles
            .iter()
            .enumerate()
            .filter(|(j, other)| *j != i && other.voting_for == Some(VoteTarget::Player(i)))
            .count();
        assert_eq!(profile.num_votes, expected, "tally of seat {i}");
    }
    let abstaining = profiles
        .iter()
        .filter(|profile| profile.voting_for == Some(VoteTarget::Abstain))
        .count();
    assert_eq!(game.num_abstaining(), abstaining);
}

fn assert_alive_consistent(game: &MafiaGame) {
    let living = game.profiles().iter().filter(|p| p.is_alive).count();
    assert_eq!(game.alive().total(), living);
}

fn room_messages(outbox: &Outbox) -> Vec<&ServerMessage> {
    outbox.on_channel(ROOM).collect()
}

#[test]
fn deal_matches_resolved_counts() {
    for members in 3..=20 {
        for (killer, joker) in [(false, false), (true, false), (false, true), (true, true)] {
            for configured in [-1, 1, 2, 3] {
                let mut rules = settings(configured);
                rules.allow_serial_killer = killer;
                rules.allow_joker = joker;
                let mut game = MafiaGame::with_rng(
                    ROOM,
                    rules,
                    timings(),
                    StdRng::seed_from_u64(members as u64),
                );
                let mut outbox = Outbox::new();
                let adversaries = resolve_adversary_count(configured, members);
                let needed = (adversaries + 2 + usize::from(killer) + usize::from(joker)).max(3);

                let result = game.begin(seats(members), &mut outbox);
                if members < needed {
                    assert_eq!(
                        result,
                        Err(GameError::NotEnoughPlayers {
                            needed,
                            present: members
                        })
                    );
                    continue;
                }
                result.unwrap();

                let count = |role: Role| game.alive().count(role);
                assert_eq!(count(Role::Mafia) + count(Role::Godfather), adversaries);
                assert_eq!(count(Role::Godfather), usize::from(adversaries >= 2));
                assert_eq!(count(Role::Detective), 1);
                assert_eq!(count(Role::Medic), 1);
                assert_eq!(count(Role::SerialKiller), usize::from(killer));
                assert_eq!(count(Role::Joker), usize::from(joker));
                assert_eq!(game.alive().total(), members);
                assert_alive_consistent(&game);
            }
        }
    }
}

#[test]
fn zero_adversaries_are_refused_instead_of_adjusted() {
    let mut game = MafiaGame::with_rng(ROOM, settings(0), timings(), StdRng::seed_from_u64(3));
    let mut outbox = Outbox::new();

    assert_eq!(
        game.begin(seats(6), &mut outbox),
        Err(GameError::NoAdversaries)
    );
    assert!(outbox.is_empty());
    assert!(game.snapshot().is_none());
}

#[test]
fn seven_members_on_auto_get_the_second_bracket() {
    let (game, _) = started(7, settings(-1), 1);
    assert_eq!(game.alive().faction(Faction::Mafia), 2);
}

#[test]
fn roles_are_sent_privately_and_adversaries_share_a_channel() {
    let (game, outbox) = started(8, settings(2), 7);

    for index in 0..8 {
        let received: Vec<_> = outbox.direct_to(&user(index)).collect();
        assert_eq!(
            received,
            vec![&ServerMessage::RoleAssigned {
                index,
                role: game.profiles()[index].role
            }]
        );
    }
    assert_eq!(room_messages(&outbox).len(), 0);

    let joined: Vec<_> = outbox
        .items()
        .iter()
        .filter_map(|item| match item {
            Outbound::Join { channel, user_id } if channel == game.adversary_channel() => {
                Some(user_id.clone())
            }
            _ => None,
        })
        .collect();
    let adversaries: Vec<_> = seats_where(&game, |p| p.role.is_adversary())
        .into_iter()
        .map(user)
        .collect();
    assert_eq!(joined, adversaries);
}

#[test]
fn phases_only_move_forward() {
    let mut rules = settings(1);
    rules.day_time_limit = 4;
    rules.night_time_limit = 3;
    let (mut game, mut outbox) = started(6, rules, 11);

    let mut last = game.phase();
    for _ in 0..500 {
        game.tick(&mut outbox);
        assert!(game.phase() >= last);
        assert_eq!(game.is_day(), game.phase() % 2 == 0);
        last = game.phase();
        assert_alive_consistent(&game);
    }
    assert!(last > 4);
}

#[test]
fn day_zero_counts_down_then_night_one_starts() {
    let (mut game, mut outbox) = started(5, settings(1), 3);
    assert_eq!(game.phase(), 0);
    assert!(game.is_recap());

    outbox.clear();
    game.tick(&mut outbox);
    game.tick(&mut outbox);
    assert_eq!(game.phase(), 1);
    assert!(!game.is_recap());
    assert_eq!(
        room_messages(&outbox),
        vec![
            &ServerMessage::MainTimeUpdate {
                phase: 0,
                time_remaining: 1,
                is_recap: true
            },
            &ServerMessage::MainTimeUpdate {
                phase: 0,
                time_remaining: 0,
                is_recap: true
            },
        ]
    );
}

#[test]
fn vote_tallies_stay_consistent() {
    let (mut game, mut outbox) = started(11, settings(2), 5);
    to_day(&mut game, &mut outbox, 1);

    let moves: [(usize, VoteTarget); 14] = [
        (0, VoteTarget::Player(1)),
        (2, VoteTarget::Player(1)),
        (0, VoteTarget::Player(3)),
        (3, VoteTarget::Abstain),
        (3, VoteTarget::Abstain),
        (4, VoteTarget::Abstain),
        (4, VoteTarget::Player(0)),
        (2, VoteTarget::Player(1)),
        (5, VoteTarget::Player(3)),
        (6, VoteTarget::Abstain),
        (6, VoteTarget::Player(3)),
        (7, VoteTarget::Player(7)),
        (8, VoteTarget::Player(42)),
        (1, VoteTarget::Player(0)),
    ];
    for (me, target) in moves {
        let _ = game.vote_player(me, target, &mut outbox);
        assert_tally_invariant(&game);
    }

    assert_eq!(game.profiles()[3].num_votes, 3);
    assert_eq!(game.profiles()[0].num_votes, 2);
    assert_eq!(game.profiles()[1].num_votes, 0);
    assert_eq!(game.num_abstaining(), 0);
}

#[test]
fn vote_transitions_produce_messages_and_acks() {
    let (mut game, mut outbox) = started(7, settings(1), 9);
    to_day(&mut game, &mut outbox, 1);
    outbox.clear();

    game.vote_player(0, VoteTarget::Player(1), &mut outbox).unwrap();
    game.vote_player(0, VoteTarget::Abstain, &mut outbox).unwrap();
    game.vote_player(0, VoteTarget::Abstain, &mut outbox).unwrap();
    game.vote_player(0, VoteTarget::Player(2), &mut outbox).unwrap();
    game.vote_player(0, VoteTarget::Player(2), &mut outbox).unwrap();

    let public: Vec<String> = room_messages(&outbox)
        .into_iter()
        .filter_map(|message| match message {
            ServerMessage::VoteUpdate { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        public,
        vec![
            "P0 voted for P1.",
            "P0 switched from P1 to abstaining.",
            "P0 is no longer abstaining.",
            "P0 voted for P2.",
            "P0 retracted their vote for P2.",
        ]
    );

    let acks = outbox
        .direct_to(&user(0))
        .filter(|message| matches!(message, ServerMessage::VoteAck { .. }))
        .count();
    assert_eq!(acks, 5);
    assert_eq!(game.profiles()[0].voting_for, None);
}

#[test]
fn quorum_opens_exactly_one_trial() {
    let (mut game, mut outbox) = started(7, settings(1), 13);
    to_day(&mut game, &mut outbox, 1);
    assert_eq!(quorum(game.alive().total()), 4);
    outbox.clear();

    for voter in 1..=4 {
        game.vote_player(voter, VoteTarget::Player(0), &mut outbox)
            .unwrap();
    }
    assert_eq!(game.accused(), Some(0));
    assert!(game.is_defending());
    assert!(!game.main_clock().is_running());
    assert!(game.trial_clock().is_running());

    assert_eq!(
        game.vote_player(5, VoteTarget::Player(0), &mut outbox),
        Err(GameError::TrialInProgress)
    );
    let trials = room_messages(&outbox)
        .into_iter()
        .filter(|message| matches!(message, ServerMessage::BeginTrial { accused: 0, .. }))
        .count();
    assert_eq!(trials, 1);
}

#[test]
fn guilty_verdict_kills_and_ends_the_day() {
    let (mut game, mut outbox) = started(7, settings(1), 17);
    to_day(&mut game, &mut outbox, 1);
    for voter in 1..=4 {
        game.vote_player(voter, VoteTarget::Player(0), &mut outbox)
            .unwrap();
    }

    assert_eq!(
        game.vote_guilty(1, Verdict::Guilty, &mut outbox),
        Err(GameError::DefenseInProgress)
    );
    tick_until(&mut game, &mut outbox, |g| !g.is_defending());
    assert_eq!(
        game.vote_guilty(0, Verdict::Guilty, &mut outbox),
        Err(GameError::AccusedCannotVote)
    );

    for voter in 1..=3 {
        game.vote_guilty(voter, Verdict::Guilty, &mut outbox).unwrap();
    }
    game.vote_guilty(4, Verdict::NotGuilty, &mut outbox).unwrap();
    outbox.clear();
    tick_until(&mut game, &mut outbox, |g| g.accused().is_none());

    assert!(!game.profiles()[0].is_alive);
    assert_eq!(game.alive().total(), 6);
    assert!(game.is_recap());
    assert_eq!(game.phase(), 2);
    assert!(room_messages(&outbox).iter().any(|message| matches!(
        message,
        ServerMessage::TrialVerdict {
            accused: 0,
            guilty: true,
            guilty_votes: 3,
            innocent_votes: 1,
            role: Some(_),
            ..
        }
    )));
    assert_alive_consistent(&game);
}

#[test]
fn acquittal_resumes_the_day_clock() {
    let (mut game, mut outbox) = started(7, settings(1), 19);
    to_day(&mut game, &mut outbox, 1);
    for _ in 0..3 {
        game.tick(&mut outbox);
    }
    let remaining = game.main_clock().remaining();

    for voter in 1..=4 {
        game.vote_player(voter, VoteTarget::Player(0), &mut outbox)
            .unwrap();
    }
    tick_until(&mut game, &mut outbox, |g| !g.is_defending());
    game.vote_guilty(2, Verdict::NotGuilty, &mut outbox).unwrap();
    tick_until(&mut game, &mut outbox, |g| g.accused().is_none());

    assert!(game.profiles()[0].is_alive);
    assert!(!game.is_recap());
    assert!(game.main_clock().is_running());
    assert_eq!(game.main_clock().remaining(), remaining);
    assert!(game.profiles().iter().all(|p| p.voting_for.is_none()
        && p.num_votes == 0
        && p.verdict.is_none()));
}

#[test]
fn abstain_majority_ends_the_day() {
    let (mut game, mut outbox) = started(5, settings(1), 23);
    to_day(&mut game, &mut outbox, 1);
    outbox.clear();

    for voter in 0..3 {
        game.vote_player(voter, VoteTarget::Abstain, &mut outbox)
            .unwrap();
    }
    assert!(game.is_recap());
    assert_eq!(game.phase(), 2);
    assert!(
        room_messages(&outbox)
            .iter()
            .any(|message| matches!(message, ServerMessage::VotingAbstained { .. }))
    );
}

#[test]
fn targeting_twice_clears_the_target() {
    let (mut game, mut outbox) = started(7, settings(1), 29);
    to_night(&mut game, &mut outbox, 1);
    let detective = seat_of(&game, Role::Detective);
    let suspect = (detective + 1) % 7;
    outbox.clear();

    game.track_interaction_request(detective, suspect, &mut outbox)
        .unwrap();
    assert_eq!(game.profiles()[detective].target_of_power, Some(suspect));
    game.track_interaction_request(detective, suspect, &mut outbox)
        .unwrap();
    assert_eq!(game.profiles()[detective].target_of_power, None);

    let last = outbox.direct_to(&user(detective)).last().cloned();
    assert_eq!(
        last,
        Some(ServerMessage::TargetUpdate {
            actor: detective,
            target: None,
            message: format!("You are no longer targeting P{suspect}."),
        })
    );
    assert_eq!(room_messages(&outbox).len(), 0);
}

#[test]
fn adversary_targets_are_shared_on_their_channel() {
    let (mut game, mut outbox) = started(7, settings(1), 31);
    to_night(&mut game, &mut outbox, 1);
    let mafia = seat_of(&game, Role::Mafia);
    let victim = (mafia + 1) % 7;
    outbox.clear();

    game.track_interaction_request(mafia, victim, &mut outbox)
        .unwrap();
    game.track_interaction_request(mafia, victim, &mut outbox)
        .unwrap();

    let channel = game.adversary_channel().to_string();
    let shared: Vec<_> = outbox.on_channel(&channel).cloned().collect();
    assert_eq!(
        shared,
        vec![
            ServerMessage::TargetUpdate {
                actor: mafia,
                target: Some(victim),
                message: format!("P{mafia} is targeting P{victim}."),
            },
            ServerMessage::TargetUpdate {
                actor: mafia,
                target: None,
                message: format!("P{mafia} is no longer targeting P{victim}."),
            },
        ]
    );
}

#[test]
fn actions_outside_their_phase_are_rejected() {
    let (mut game, mut outbox) = started(7, settings(1), 37);
    assert!(matches!(
        game.vote_player(0, VoteTarget::Player(1), &mut outbox),
        Err(GameError::WrongPhase { .. })
    ));

    to_night(&mut game, &mut outbox, 1);
    let villager = seat_of(&game, Role::Villager);
    let medic = seat_of(&game, Role::Medic);
    let mafia = seat_of(&game, Role::Mafia);
    assert!(matches!(
        game.vote_player(villager, VoteTarget::Player(medic), &mut outbox),
        Err(GameError::WrongPhase { .. })
    ));
    assert_eq!(
        game.track_interaction_request(villager, medic, &mut outbox),
        Err(GameError::NoNightPower)
    );
    assert_eq!(
        game.track_interaction_request(mafia, mafia, &mut outbox),
        Err(GameError::InvalidTarget(mafia))
    );
    assert_eq!(
        game.track_interaction_request(medic, 99, &mut outbox),
        Err(GameError::UnknownSeat(99))
    );
    assert!(game.track_interaction_request(medic, medic, &mut outbox).is_ok());
    assert_eq!(
        game.vote_guilty(villager, Verdict::Guilty, &mut outbox),
        Err(GameError::NoTrial)
    );

    to_day(&mut game, &mut outbox, 1);
    assert!(matches!(
        game.track_interaction_request(medic, villager, &mut outbox),
        Err(GameError::WrongPhase { .. })
    ));
}

#[test]
fn infinite_day_waits_for_an_outside_event() {
    let mut rules = settings(1);
    rules.day_time_limit = -1;
    let (mut game, mut outbox) = started(6, rules, 41);
    to_day(&mut game, &mut outbox, 1);

    assert!(!game.main_clock().is_running());
    assert_eq!(game.main_clock().remaining(), -1);
    outbox.clear();
    for _ in 0..50 {
        game.tick(&mut outbox);
    }
    assert!(outbox.is_empty());
    assert_eq!(game.phase(), 2);

    game.force_day_end(&mut outbox).unwrap();
    assert!(game.is_recap());
    assert!(game.main_clock().is_running());
}

#[test]
fn acquittal_keeps_an_infinite_day_suspended() {
    let mut rules = settings(1);
    rules.day_time_limit = -1;
    let (mut game, mut outbox) = started(5, rules, 43);
    to_day(&mut game, &mut outbox, 1);

    for voter in 1..=3 {
        game.vote_player(voter, VoteTarget::Player(0), &mut outbox)
            .unwrap();
    }
    tick_until(&mut game, &mut outbox, |g| g.accused().is_none());

    assert!(game.profiles()[0].is_alive);
    assert!(!game.clock_running());
    assert!(!game.is_recap());
}

#[test]
fn medic_save_cancels_the_attack() {
    let (mut game, mut outbox) = started(7, settings(1), 47);
    to_night(&mut game, &mut outbox, 1);
    let mafia = seat_of(&game, Role::Mafia);
    let medic = seat_of(&game, Role::Medic);
    let victim = seat_of(&game, Role::Villager);

    game.track_interaction_request(mafia, victim, &mut outbox)
        .unwrap();
    game.track_interaction_request(medic, victim, &mut outbox)
        .unwrap();
    outbox.clear();
    to_day(&mut game, &mut outbox, 1);

    assert!(game.profiles()[victim].is_alive);
    assert_eq!(game.alive().total(), 7);
    let result = outbox
        .direct_to(&user(victim))
        .find(|message| matches!(message, ServerMessage::NightResult { .. }))
        .cloned();
    assert!(matches!(
        result,
        Some(ServerMessage::NightResult {
            night: 1,
            was_attacked: true,
            was_saved: true,
            ..
        })
    ));
    assert!(game.profiles().iter().all(|p| p.target_of_power.is_none()));
}

#[test]
fn unprotected_victim_dies_and_is_revealed_after_the_day() {
    let (mut game, mut outbox) = started(7, settings(1), 53);
    to_night(&mut game, &mut outbox, 1);
    let mafia = seat_of(&game, Role::Mafia);
    let victim = seat_of(&game, Role::Villager);
    game.track_interaction_request(mafia, victim, &mut outbox)
        .unwrap();
    outbox.clear();

    to_day(&mut game, &mut outbox, 1);
    assert!(!game.profiles()[victim].is_alive);
    assert_eq!(game.alive().total(), 6);
    assert!(
        room_messages(&outbox)
            .iter()
            .all(|message| !matches!(message, ServerMessage::NightRecap { .. }))
    );

    outbox.clear();
    to_night(&mut game, &mut outbox, 2);
    assert!(room_messages(&outbox).contains(&&ServerMessage::NightRecap {
        night: 1,
        deaths: vec![SeatReveal {
            index: victim,
            name: format!("P{victim}"),
            role: Role::Villager,
        }],
    }));
}

#[test]
fn both_attackers_claim_a_victim_in_the_same_night() {
    let mut rules = settings(1);
    rules.allow_serial_killer = true;
    let (mut game, mut outbox) = started(8, rules, 61);
    to_night(&mut game, &mut outbox, 1);
    let mafia = seat_of(&game, Role::Mafia);
    let killer = seat_of(&game, Role::SerialKiller);
    let villagers = seats_where(&game, |p| p.role == Role::Villager);
    let (first, second) = (villagers[0], villagers[1]);

    game.track_interaction_request(mafia, first, &mut outbox)
        .unwrap();
    game.track_interaction_request(killer, second, &mut outbox)
        .unwrap();
    outbox.clear();

    to_day(&mut game, &mut outbox, 1);
    assert!(!game.profiles()[first].is_alive);
    assert!(!game.profiles()[second].is_alive);
    assert_eq!(game.alive().total(), 6);
    assert_eq!(game.alive().count(Role::Villager), villagers.len() - 2);
    assert_alive_consistent(&game);
    for victim in [first, second] {
        assert!(outbox.direct_to(&user(victim)).any(|message| matches!(
            message,
            ServerMessage::NightResult { was_attacked: true, was_saved: false, notes, .. }
                if notes == &vec!["You were killed last night.".to_string()]
        )));
    }

    outbox.clear();
    to_night(&mut game, &mut outbox, 2);
    let reveal = |index: usize| SeatReveal {
        index,
        name: format!("P{index}"),
        role: Role::Villager,
    };
    assert!(room_messages(&outbox).contains(&&ServerMessage::NightRecap {
        night: 1,
        deaths: vec![reveal(first), reveal(second)],
    }));
}

#[test]
fn medic_hears_when_nobody_attacked_the_patient() {
    let (mut game, mut outbox) = started(7, settings(1), 67);
    to_night(&mut game, &mut outbox, 1);
    let medic = seat_of(&game, Role::Medic);
    let patient = seat_of(&game, Role::Villager);
    game.track_interaction_request(medic, patient, &mut outbox)
        .unwrap();
    outbox.clear();

    to_day(&mut game, &mut outbox, 1);
    assert_eq!(game.alive().total(), 7);
    let result = outbox
        .direct_to(&user(medic))
        .find(|message| matches!(message, ServerMessage::NightResult { .. }))
        .cloned();
    assert_eq!(
        result,
        Some(ServerMessage::NightResult {
            night: 1,
            was_attacked: false,
            was_saved: false,
            investigation: None,
            notes: vec![format!("Nobody attacked P{patient} last night.")],
        })
    );
}

#[test]
fn detective_reads_the_leader_as_a_villager() {
    let (mut game, mut outbox) = started(8, settings(2), 59);
    to_night(&mut game, &mut outbox, 1);
    let detective = seat_of(&game, Role::Detective);
    let leader = seat_of(&game, Role::Godfather);
    game.track_interaction_request(detective, leader, &mut outbox)
        .unwrap();
    outbox.clear();

    to_day(&mut game, &mut outbox, 1);
    let result = outbox
        .direct_to(&user(detective))
        .find_map(|message| match message {
            ServerMessage::NightResult { investigation, .. } => investigation.clone(),
            _ => None,
        });
    assert_eq!(
        result,
        Some(Investigation {
            index: leader,
            name: format!("P{leader}"),
            role: Role::Villager,
        })
    );

    outbox.clear();
    to_night(&mut game, &mut outbox, 2);
    assert!(outbox.direct_to(&user(detective)).any(|message| matches!(
        message,
        ServerMessage::DetectiveReveal { role: Role::Villager, .. }
    )));
}

#[test]
fn village_win_is_announced_once_per_player() {
    let (mut game, mut outbox) = started(5, settings(1), 61);
    to_day(&mut game, &mut outbox, 1);
    let mafia = seat_of(&game, Role::Mafia);
    let voters: Vec<usize> = (0..5).filter(|i| *i != mafia).collect();

    for voter in &voters[..3] {
        game.vote_player(*voter, VoteTarget::Player(mafia), &mut outbox)
            .unwrap();
    }
    tick_until(&mut game, &mut outbox, |g| !g.is_defending());
    for voter in &voters {
        game.vote_guilty(*voter, Verdict::Guilty, &mut outbox)
            .unwrap();
    }
    outbox.clear();
    tick_until(&mut game, &mut outbox, |g| g.winner().is_some());
    for _ in 0..20 {
        game.tick(&mut outbox);
    }

    assert_eq!(game.winner(), Some(Faction::Village));
    assert!(!game.clock_running());
    for index in 0..5 {
        let outcomes: Vec<_> = outbox
            .direct_to(&user(index))
            .filter_map(|message| match message {
                ServerMessage::GameOver { winner, won, roles } => Some((*winner, *won, roles.len())),
                _ => None,
            })
            .collect();
        assert_eq!(outcomes, vec![(Faction::Village, index != mafia, 5)]);
    }
}

#[test]
fn independents_never_win() {
    let mut rules = settings(1);
    rules.allow_joker = true;
    let (mut game, mut outbox) = started(6, rules, 67);
    to_day(&mut game, &mut outbox, 1);
    let mafia = seat_of(&game, Role::Mafia);
    let joker = seat_of(&game, Role::Joker);
    let voters: Vec<usize> = (0..6).filter(|i| *i != mafia).collect();

    for voter in &voters[..4] {
        game.vote_player(*voter, VoteTarget::Player(mafia), &mut outbox)
            .unwrap();
    }
    tick_until(&mut game, &mut outbox, |g| !g.is_defending());
    for voter in &voters {
        game.vote_guilty(*voter, Verdict::Guilty, &mut outbox)
            .unwrap();
    }
    tick_until(&mut game, &mut outbox, |g| g.winner().is_some());

    assert!(outbox.direct_to(&user(joker)).any(|message| matches!(
        message,
        ServerMessage::GameOver { won: false, .. }
    )));
}

#[test]
fn stalemate_breaker_takes_a_villager_after_three_quiet_cycles() {
    let mut rules = settings(1);
    rules.day_time_limit = 2;
    rules.night_time_limit = 2;
    let (mut game, mut outbox) = started(7, rules, 71);

    to_day(&mut game, &mut outbox, 3);
    assert_eq!(game.alive().total(), 7);
    outbox.clear();
    tick_until(&mut game, &mut outbox, |g| g.is_recap());

    let victims: Vec<_> = room_messages(&outbox)
        .into_iter()
        .filter_map(|message| match message {
            ServerMessage::StalemateBroken { victim } => Some(victim.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(victims.len(), 1);
    assert_eq!(victims[0].role, Role::Villager);
    assert!(!game.profiles()[victims[0].index].is_alive);
    assert_eq!(game.alive().total(), 6);
    assert_alive_consistent(&game);
}

#[test]
fn night_chat_is_role_gated() {
    let (mut game, mut outbox) = started(7, settings(1), 73);
    to_night(&mut game, &mut outbox, 1);
    let mafia = seat_of(&game, Role::Mafia);
    let villager = seat_of(&game, Role::Villager);
    outbox.clear();

    game.chat(mafia, "who?".into(), &mut outbox).unwrap();
    game.chat(villager, "hello?".into(), &mut outbox).unwrap();

    let channel = game.adversary_channel().to_string();
    assert_eq!(outbox.on_channel(&channel).count(), 1);
    assert_eq!(room_messages(&outbox).len(), 0);
    assert!(outbox.direct_to(&user(villager)).any(|message| matches!(
        message,
        ServerMessage::ChatMessage {
            scope: ChatScope::Own,
            ..
        }
    )));

    to_day(&mut game, &mut outbox, 1);
    outbox.clear();
    game.chat(villager, "morning".into(), &mut outbox).unwrap();
    assert_eq!(room_messages(&outbox).len(), 1);
}

#[test]
fn end_releases_the_adversary_channel_and_resets() {
    let (mut game, mut outbox) = started(9, settings(2), 79);
    to_night(&mut game, &mut outbox, 1);
    let adversaries = game.alive().faction(Faction::Mafia);
    outbox.clear();

    game.end(&mut outbox);
    let left = outbox
        .items()
        .iter()
        .filter(|item| matches!(item, Outbound::Leave { .. }))
        .count();
    assert_eq!(left, adversaries);
    assert!(game.profiles().is_empty());
    assert_eq!(game.alive().total(), 0);
    assert_eq!(game.phase(), 0);
    assert!(!game.clock_running());
    assert_eq!(game.snapshot(), None);

    outbox.clear();
    game.tick(&mut outbox);
    game.end(&mut outbox);
    assert!(
        outbox
            .items()
            .iter()
            .all(|item| !matches!(item, Outbound::Channel { .. }))
    );
}

#[test]
fn settings_of_another_game_are_refused() {
    let (mut game, _) = started(5, settings(1), 83);
    assert_eq!(
        game.update_settings(crate::dto::settings::GameSettings::Spyfall(
            Default::default()
        )),
        Err(GameError::SettingsMismatch)
    );
}

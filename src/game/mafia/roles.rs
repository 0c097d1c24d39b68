use serde::{Deserialize, Serialize};

/// Every role that can be dealt in a social-deduction game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Ordinary villager without a night power.
    Villager,
    /// Learns the role of one player per night.
    Detective,
    /// Protects one player per night from attacks.
    Medic,
    /// Standard adversary; votes on the nightly victim.
    Mafia,
    /// Leader adversary; appears as a villager to the detective.
    Godfather,
    /// Independent killer with its own nightly attack.
    SerialKiller,
    /// Independent joker without a night power.
    Joker,
}

/// Side a role plays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Faction {
    /// Ordinary, detective and medic.
    Village,
    /// Standard and leader adversaries.
    Mafia,
    /// Roles outside both factions; never part of a win condition.
    Independent,
}

/// Night power granted by a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    /// Learn the apparent role of a target.
    Investigate,
    /// Shield a target, self included, from attacks.
    Protect,
    /// Kill a target unless it is protected.
    Attack,
}

impl Role {
    /// Number of distinct roles, used to size the alive-count table.
    pub const COUNT: usize = 7;

    /// Every role, in alive-table order.
    pub const ALL: [Role; Role::COUNT] = [
        Role::Villager,
        Role::Detective,
        Role::Medic,
        Role::Mafia,
        Role::Godfather,
        Role::SerialKiller,
        Role::Joker,
    ];

    /// Side this role wins with.
    pub fn faction(self) -> Faction {
        match self {
            Role::Villager | Role::Detective | Role::Medic => Faction::Village,
            Role::Mafia | Role::Godfather => Faction::Mafia,
            Role::SerialKiller | Role::Joker => Faction::Independent,
        }
    }

    /// Whether the role belongs to the adversary sub-channel.
    pub fn is_adversary(self) -> bool {
        self.faction() == Faction::Mafia
    }

    /// Night power of the role, if any.
    pub fn power(self) -> Option<Power> {
        match self {
            Role::Detective => Some(Power::Investigate),
            Role::Medic => Some(Power::Protect),
            Role::Mafia | Role::Godfather | Role::SerialKiller => Some(Power::Attack),
            Role::Villager | Role::Joker => None,
        }
    }

    /// Role the detective learns when investigating this role.
    pub fn apparent(self) -> Role {
        match self {
            Role::Godfather => Role::Villager,
            other => other,
        }
    }

    /// Human readable name used in notifications.
    pub fn label(self) -> &'static str {
        match self {
            Role::Villager => "villager",
            Role::Detective => "detective",
            Role::Medic => "medic",
            Role::Mafia => "mafia member",
            Role::Godfather => "godfather",
            Role::SerialKiller => "serial killer",
            Role::Joker => "joker",
        }
    }

    fn slot(self) -> usize {
        match self {
            Role::Villager => 0,
            Role::Detective => 1,
            Role::Medic => 2,
            Role::Mafia => 3,
            Role::Godfather => 4,
            Role::SerialKiller => 5,
            Role::Joker => 6,
        }
    }
}

/// Per-role alive counters.
///
/// Maintained in lock-step with profile deaths; never recomputed by scanning
/// profiles because win detection and quorum read it on every action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliveTable {
    counts: [usize; Role::COUNT],
}

impl AliveTable {
    /// Seed the table from a freshly dealt role list.
    pub fn fill(&mut self, roles: &[Role]) {
        self.clear();
        for role in roles {
            self.counts[role.slot()] += 1;
        }
    }

    /// Record one death of `role`.
    pub fn kill(&mut self, role: Role) {
        let slot = &mut self.counts[role.slot()];
        *slot = slot.saturating_sub(1);
    }

    /// Living seats holding `role`.
    pub fn count(&self, role: Role) -> usize {
        self.counts[role.slot()]
    }

    /// Living seats overall.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Living seats playing for `faction`.
    pub fn faction(&self, faction: Faction) -> usize {
        Role::ALL
            .iter()
            .filter(|role| role.faction() == faction)
            .map(|role| self.count(*role))
            .sum()
    }

    /// Zero every counter.
    pub fn clear(&mut self) {
        self.counts = [0; Role::COUNT];
    }
}

/// Majority threshold for trials and abstain resolution.
pub fn quorum(alive: usize) -> usize {
    alive / 2 + 1
}

/// Adversary count to deal: the configured value, or a headcount bracket when negative.
pub fn resolve_adversary_count(configured: i64, members: usize) -> usize {
    if configured >= 0 {
        return configured as usize;
    }

    match members {
        n if n < 7 => 1,
        n if n < 12 => 2,
        n if n < 18 => 3,
        _ => 4,
    }
}

/// Build the unshuffled role list for `members` seats.
///
/// The killer takes the last slot and the joker the last slot still free.
/// Callers must ensure `adversaries + 2 + independents <= members`.
pub fn build_role_list(
    members: usize,
    adversaries: usize,
    serial_killer: bool,
    joker: bool,
) -> Vec<Role> {
    let mut roles = vec![Role::Villager; members];

    for slot in roles.iter_mut().take(adversaries) {
        *slot = Role::Mafia;
    }
    if adversaries >= 2 {
        roles[0] = Role::Godfather;
    }

    roles[adversaries] = Role::Detective;
    roles[adversaries + 1] = Role::Medic;

    if serial_killer {
        roles[members - 1] = Role::SerialKiller;
    }
    if joker {
        let slot = if serial_killer { members - 2 } else { members - 1 };
        roles[slot] = Role::Joker;
    }

    roles
}

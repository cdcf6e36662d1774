//! A seeded stand-in for a live match.
//!
//! [`SimulatedMatch`] plays the role of the game's object graph: it keeps
//! a roster of players that walk around, vent, die and disconnect, and
//! cycles through `MENU → LOBBY → TASKS ⇄ DISCUSSION`, returning to the
//! lobby when a game ends. It is driven by [`advance`](SimulatedMatch::advance)
//! once per host tick and read by the sampler through [`SnapshotSource`].
//!
//! The [`GameState`] tree is updated in place. Player entries are pooled:
//! a tick only rewrites positions and flags, and strings are only
//! rewritten when a new lobby forms.

use gamecast_core::config::HostConfig;
use gamecast_core::{Snapshot, SnapshotSource, SourceError};
use gamecast_types::{GamePhase, GameState, NO_MEETING_HUD, PlayerData, Position};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MENU_TICKS: u64 = 120;
const LOBBY_TICKS: u64 = 300;
const TASKS_TICKS: u64 = 900;
const DISCUSSION_TICKS: u64 = 480;
const ROUNDS_PER_GAME: u32 = 3;

/// Meeting HUD states run 0..=3 while a meeting is open.
const MEETING_HUD_STAGES: u64 = 4;

const MAP_COUNT: i32 = 6;
const MAP_EXTENT: f32 = 40.0;
const WALK_STEP: f32 = 0.08;
const SPAWN_RADIUS: f32 = 1.5;

const CLIENT_ID_BASE: i64 = 100;
const NO_CLIENT: i64 = -1;
const GAME_CODE_LEN: usize = 6;

const KILL_CHANCE: f64 = 0.002;
const VENT_CHANCE: f64 = 0.004;
const SABOTAGE_CHANCE: f64 = 0.001;
const DISCONNECT_CHANCE: f64 = 0.0002;

const COLOR_NAMES: [&str; 12] = [
    "Red", "Blue", "Green", "Pink", "Orange", "Yellow", "Black", "White", "Purple", "Brown",
    "Cyan", "Lime",
];
const HATS: [&str; 5] = ["hat_NoHat", "hat_Crown", "hat_Bowler", "hat_Plunger", "hat_Antenna"];
const PETS: [&str; 3] = ["pet_EmptyPet", "pet_Robot", "pet_Hamster"];
const SKINS: [&str; 3] = ["skin_None", "skin_Suit", "skin_Military"];
const VISORS: [&str; 3] = ["visor_EmptyVisor", "visor_Candycane", "visor_Shades"];

/// A deterministic simulated match.
#[derive(Debug)]
pub struct SimulatedMatch {
    rng: StdRng,
    state: GameState,
    roster_size: u8,
    local_slot: u8,
    phase_ticks_left: u64,
    round: u32,
    ticks: u64,
}

impl SimulatedMatch {
    /// Create a match in the main menu, seeded from `config.seed`.
    pub fn new(config: &HostConfig) -> Self {
        let mut state = GameState::menu();
        state.local.client_id = client_id_for(config.local_player);
        state.local.host_id = client_id_for(0);
        state.players.reserve(usize::from(config.players));

        Self {
            rng: StdRng::seed_from_u64(config.seed),
            state,
            roster_size: config.players,
            local_slot: config.local_player,
            phase_ticks_left: MENU_TICKS,
            round: 0,
            ticks: 0,
        }
    }

    /// The current state tree.
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    /// Host ticks simulated so far.
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Index of the local player's entry, if one is present.
    pub fn local_index(&self) -> Option<usize> {
        self.state.players.iter().position(|p| p.is_local)
    }

    /// Advance the match by one host tick.
    pub fn advance(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
        self.phase_ticks_left = self.phase_ticks_left.saturating_sub(1);
        if self.phase_ticks_left == 0 {
            self.transition();
        }

        match self.state.game_state {
            GamePhase::Menu | GamePhase::Lobby => {}
            GamePhase::Tasks => {
                self.walk();
                self.roll_events();
            }
            GamePhase::Discussion => self.update_meeting_hud(),
        }
    }

    fn transition(&mut self) {
        match self.state.game_state {
            GamePhase::Menu => self.enter_lobby(),
            GamePhase::Lobby => {
                self.round = 1;
                self.assign_impostors();
                self.scatter_players();
                self.set_flags(true, true, false, TASKS_TICKS);
            }
            GamePhase::Tasks => {
                self.state.game_data.comms_sabotaged = false;
                for player in &mut self.state.players {
                    player.in_vent = false;
                }
                self.set_flags(true, true, true, DISCUSSION_TICKS);
            }
            GamePhase::Discussion => {
                self.state.game_data.meeting_hud_state = NO_MEETING_HUD;
                if self.round >= ROUNDS_PER_GAME || self.game_decided() {
                    self.enter_lobby();
                } else {
                    self.round = self.round.saturating_add(1);
                    self.scatter_players();
                    self.set_flags(true, true, false, TASKS_TICKS);
                }
            }
        }
    }

    fn set_flags(&mut self, joined: bool, started: bool, meeting_open: bool, ticks: u64) {
        self.phase_ticks_left = ticks;
        self.state.game_state = GamePhase::derive(joined, started, meeting_open);
    }

    /// Form a fresh lobby: new code and map, roster rebuilt from the pool.
    fn enter_lobby(&mut self) {
        self.state.game_code.clear();
        for _ in 0..GAME_CODE_LEN {
            self.state
                .game_code
                .push(char::from(self.rng.random_range(b'A'..=b'Z')));
        }
        self.state.map_id = self.rng.random_range(0..MAP_COUNT);
        self.state.game_data.comms_sabotaged = false;
        self.state.game_data.meeting_hud_state = NO_MEETING_HUD;
        self.round = 0;

        let size = usize::from(self.roster_size);
        self.state.players.truncate(size);
        while self.state.players.len() < size {
            self.state.players.push(PlayerData::default());
        }

        for (slot, player) in (0..=u8::MAX).zip(self.state.players.iter_mut()) {
            let color = usize::from(slot).checked_rem(COLOR_NAMES.len()).unwrap_or(0);
            player.id = slot;
            player.client_id = client_id_for(slot);
            player.color_id = i32::from(slot);
            reuse(&mut player.name, COLOR_NAMES.get(color).copied().unwrap_or("Player"));
            reuse(&mut player.hat_id, pick(&mut self.rng, &HATS));
            reuse(&mut player.pet_id, pick(&mut self.rng, &PETS));
            reuse(&mut player.skin_id, pick(&mut self.rng, &SKINS));
            reuse(&mut player.visor_id, pick(&mut self.rng, &VISORS));
            player.is_impostor = false;
            player.is_dead = false;
            player.disconnected = false;
            player.is_local = slot == self.local_slot;
            player.in_vent = false;
            player.position = Position::default();
        }

        self.set_flags(true, false, false, LOBBY_TICKS);
    }

    fn assign_impostors(&mut self) {
        let count = match self.state.players.len() {
            0 | 1 => 0,
            2..=6 => 1,
            _ => 2,
        };
        for player in &mut self.state.players {
            player.is_impostor = false;
        }

        let len = self.state.players.len();
        let mut assigned = 0_usize;
        while assigned < count {
            let idx = self.rng.random_range(0..len);
            if let Some(player) = self.state.players.get_mut(idx) {
                if !player.is_impostor {
                    player.is_impostor = true;
                    assigned = assigned.saturating_add(1);
                }
            }
        }
    }

    fn scatter_players(&mut self) {
        for player in &mut self.state.players {
            if player.disconnected {
                continue;
            }
            player.position.x = self.rng.random_range(-SPAWN_RADIUS..=SPAWN_RADIUS);
            player.position.y = self.rng.random_range(-SPAWN_RADIUS..=SPAWN_RADIUS);
        }
    }

    fn walk(&mut self) {
        for player in &mut self.state.players {
            if player.is_dead || player.disconnected || player.in_vent {
                continue;
            }
            let dx = self.rng.random_range(-WALK_STEP..=WALK_STEP);
            let dy = self.rng.random_range(-WALK_STEP..=WALK_STEP);
            player.position.x = (player.position.x + dx).clamp(-MAP_EXTENT, MAP_EXTENT);
            player.position.y = (player.position.y + dy).clamp(-MAP_EXTENT, MAP_EXTENT);
        }
    }

    fn roll_events(&mut self) {
        if self.rng.random_bool(SABOTAGE_CHANCE) {
            let data = &mut self.state.game_data;
            data.comms_sabotaged = !data.comms_sabotaged;
        }

        for player in &mut self.state.players {
            if player.is_impostor && !player.is_dead && self.rng.random_bool(VENT_CHANCE) {
                player.in_vent = !player.in_vent;
            }
        }

        if self.rng.random_bool(KILL_CHANCE) {
            let victim = self.random_player(|p| !p.is_impostor && !p.is_dead && !p.disconnected);
            if let Some(player) = victim.and_then(|idx| self.state.players.get_mut(idx)) {
                player.is_dead = true;
            }
        }

        if self.rng.random_bool(DISCONNECT_CHANCE) {
            let leaver = self.random_player(|p| !p.is_local && !p.disconnected);
            if let Some(player) = leaver.and_then(|idx| self.state.players.get_mut(idx)) {
                player.disconnected = true;
                player.client_id = NO_CLIENT;
                player.in_vent = false;
                player.position = Position::default();
            }
        }
    }

    fn update_meeting_hud(&mut self) {
        let elapsed = DISCUSSION_TICKS.saturating_sub(self.phase_ticks_left);
        let stage = elapsed
            .saturating_mul(MEETING_HUD_STAGES)
            .checked_div(DISCUSSION_TICKS)
            .unwrap_or(0)
            .min(MEETING_HUD_STAGES.saturating_sub(1));
        self.state.game_data.meeting_hud_state = i32::try_from(stage).unwrap_or(0);
    }

    /// The game ends once impostors are gone or match the crew.
    fn game_decided(&self) -> bool {
        let alive = |p: &&PlayerData| !p.is_dead && !p.disconnected;
        let impostors = self
            .state
            .players
            .iter()
            .filter(alive)
            .filter(|p| p.is_impostor)
            .count();
        let crew = self
            .state
            .players
            .iter()
            .filter(alive)
            .filter(|p| !p.is_impostor)
            .count();
        impostors == 0 || crew <= impostors
    }

    fn random_player(&mut self, eligible: impl Fn(&PlayerData) -> bool) -> Option<usize> {
        let count = self.state.players.iter().filter(|p| eligible(p)).count();
        if count == 0 {
            return None;
        }
        let nth = self.rng.random_range(0..count);
        self.state
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| eligible(p))
            .nth(nth)
            .map(|(idx, _)| idx)
    }
}

impl SnapshotSource for SimulatedMatch {
    fn collect(&mut self) -> Result<Snapshot, SourceError> {
        Snapshot::to_json(&self.state).map_err(SourceError::from)
    }
}

fn client_id_for(slot: u8) -> i64 {
    CLIENT_ID_BASE.saturating_add(i64::from(slot))
}

fn pick<'a>(rng: &mut StdRng, options: &[&'a str]) -> &'a str {
    if options.is_empty() {
        return "";
    }
    options
        .get(rng.random_range(0..options.len()))
        .copied()
        .unwrap_or_default()
}

/// Overwrite `slot` keeping its allocation.
fn reuse(slot: &mut String, value: &str) {
    slot.clear();
    slot.push_str(value);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn config(players: u8, seed: u64) -> HostConfig {
        HostConfig {
            players,
            seed,
            ..HostConfig::default()
        }
    }

    fn advance_by(sim: &mut SimulatedMatch, ticks: u64) {
        for _ in 0..ticks {
            sim.advance();
        }
    }

    #[test]
    fn starts_in_menu_without_players() {
        let sim = SimulatedMatch::new(&config(10, 7));
        assert_eq!(sim.state().game_state, GamePhase::Menu);
        assert!(sim.state().players.is_empty());
        assert_eq!(sim.local_index(), None);
        assert_eq!(sim.state().local.client_id, 100);
        assert_eq!(sim.state().local.host_id, 100);
    }

    #[test]
    fn menu_leads_to_lobby_with_roster() {
        let mut sim = SimulatedMatch::new(&config(10, 7));
        advance_by(&mut sim, MENU_TICKS);

        let state = sim.state();
        assert_eq!(state.game_state, GamePhase::Lobby);
        assert_eq!(state.players.len(), 10);
        assert_eq!(state.game_code.len(), GAME_CODE_LEN);
        assert!(state.game_code.chars().all(|c| c.is_ascii_uppercase()));
        assert!((0..MAP_COUNT).contains(&state.map_id));
        assert_eq!(sim.local_index(), Some(0));
        assert_eq!(state.players.iter().filter(|p| p.is_local).count(), 1);
        assert_eq!(state.game_data.meeting_hud_state, NO_MEETING_HUD);
    }

    #[test]
    fn phases_cycle_through_a_round() {
        let mut sim = SimulatedMatch::new(&config(10, 7));
        advance_by(&mut sim, MENU_TICKS + LOBBY_TICKS);
        assert_eq!(sim.state().game_state, GamePhase::Tasks);
        assert_eq!(
            sim.state().players.iter().filter(|p| p.is_impostor).count(),
            2
        );

        advance_by(&mut sim, TASKS_TICKS);
        assert_eq!(sim.state().game_state, GamePhase::Discussion);
        assert!(!sim.state().game_data.comms_sabotaged);

        advance_by(&mut sim, DISCUSSION_TICKS - 1);
        assert_eq!(sim.state().game_data.meeting_hud_state, 3);

        sim.advance();
        assert!(matches!(
            sim.state().game_state,
            GamePhase::Tasks | GamePhase::Lobby
        ));
        assert_eq!(sim.state().game_data.meeting_hud_state, NO_MEETING_HUD);
    }

    #[test]
    fn same_seed_same_match() {
        let mut a = SimulatedMatch::new(&config(8, 42));
        let mut b = SimulatedMatch::new(&config(8, 42));
        advance_by(&mut a, 2_000);
        advance_by(&mut b, 2_000);
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn positions_stay_on_the_map() {
        let mut sim = SimulatedMatch::new(&config(10, 3));
        advance_by(&mut sim, 5_000);
        for player in &sim.state().players {
            assert!(player.position.x.abs() <= MAP_EXTENT);
            assert!(player.position.y.abs() <= MAP_EXTENT);
        }
    }

    #[test]
    fn player_entries_are_reused_between_ticks() {
        let mut sim = SimulatedMatch::new(&config(10, 7));
        advance_by(&mut sim, MENU_TICKS + LOBBY_TICKS);
        let players_ptr = sim.state().players.as_ptr();
        let name_ptr = sim.state().players.first().map(|p| p.name.as_ptr());

        advance_by(&mut sim, 200);
        assert_eq!(sim.state().players.as_ptr(), players_ptr);
        assert_eq!(
            sim.state().players.first().map(|p| p.name.as_ptr()),
            name_ptr
        );
    }

    #[test]
    fn disconnected_players_lose_client_and_position() {
        let mut sim = SimulatedMatch::new(&config(10, 11));
        advance_by(&mut sim, 40_000);
        for player in sim.state().players.iter().filter(|p| p.disconnected) {
            assert_eq!(player.client_id, NO_CLIENT);
            assert!(!player.is_local);
        }
    }

    #[test]
    fn empty_lobby_is_allowed() {
        let mut sim = SimulatedMatch::new(&config(0, 1));
        advance_by(&mut sim, MENU_TICKS + LOBBY_TICKS + 10);
        assert!(sim.state().players.is_empty());
        assert_eq!(sim.local_index(), None);
    }

    #[test]
    fn collect_encodes_camel_case_json() {
        let mut sim = SimulatedMatch::new(&config(4, 7));
        advance_by(&mut sim, MENU_TICKS);

        let snapshot = sim.collect().unwrap();
        let json: serde_json::Value = serde_json::from_str(snapshot.as_str()).unwrap();
        assert_eq!(json["gameState"], "LOBBY");
        assert_eq!(json["self"]["clientId"], 100);
        assert_eq!(json["players"].as_array().map(Vec::len), Some(4));
        assert_eq!(json["players"][0]["isLocal"], true);
        assert_eq!(json["gameData"]["meetingHudState"], 4);
    }
}

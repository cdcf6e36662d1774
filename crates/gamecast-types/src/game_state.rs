//! The game-state snapshot tree pushed to viewers.
//!
//! One [`GameState`] describes everything a viewer needs to render the
//! current match: the phase, the lobby code, the map, who the local
//! player is, and every player's cosmetics, status and position. The
//! tree is acyclic and serializes to camelCase JSON, e.g.
//!
//! ```json
//! {"gameState":"TASKS","gameCode":"ABCDEF","mapId":2,
//!  "self":{"clientId":7,"hostId":7},"players":[...],
//!  "gameData":{"commsSabotaged":false,"meetingHudState":4}}
//! ```

use serde::{Deserialize, Serialize};

/// `meetingHudState` value reported when no meeting HUD is open.
pub const NO_MEETING_HUD: i32 = 4;

/// Coarse phase of the match as seen by the local client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    /// Not connected to a game (title screen, menus).
    #[default]
    Menu,
    /// Joined a lobby, match not yet started.
    Lobby,
    /// Match in progress, players doing tasks.
    Tasks,
    /// Match in progress with a meeting open.
    Discussion,
}

impl GamePhase {
    /// Derive the phase from the host client's connection flags.
    ///
    /// A started match takes precedence over the joined flag; a started
    /// match with an open meeting HUD is a discussion.
    pub const fn derive(joined: bool, started: bool, meeting_open: bool) -> Self {
        if started {
            if meeting_open {
                Self::Discussion
            } else {
                Self::Tasks
            }
        } else if joined {
            Self::Lobby
        } else {
            Self::Menu
        }
    }

    /// Whether a match is currently being played.
    pub const fn in_match(self) -> bool {
        matches!(self, Self::Tasks | Self::Discussion)
    }
}

/// World-space position of a player.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

/// Identity of the local client within the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfInfo {
    /// Network client ID of the local client.
    pub client_id: i64,
    /// Network client ID of the lobby host.
    pub host_id: i64,
}

/// One player entry in the snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerData {
    /// Player slot ID within the match.
    pub id: u8,
    /// Network client ID owning the player, `-1` if the player object is gone.
    pub client_id: i64,
    /// Display name.
    pub name: String,
    /// Color index.
    pub color_id: i32,
    /// Hat cosmetic ID.
    pub hat_id: String,
    /// Pet cosmetic ID.
    pub pet_id: String,
    /// Skin cosmetic ID.
    pub skin_id: String,
    /// Visor cosmetic ID.
    pub visor_id: String,
    /// Whether the player is on the impostor team.
    pub is_impostor: bool,
    /// Whether the player is dead.
    pub is_dead: bool,
    /// Whether the player left the match.
    pub disconnected: bool,
    /// Whether this entry is the local player.
    pub is_local: bool,
    /// Current position, zero when the player object is gone.
    pub position: Position,
    /// Whether the player is hiding in a vent.
    pub in_vent: bool,
}

/// Match-wide flags that are not tied to a single player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    /// Whether communications are currently sabotaged.
    pub comms_sabotaged: bool,
    /// Meeting HUD state, [`NO_MEETING_HUD`] when no meeting is open.
    pub meeting_hud_state: i32,
}

impl Default for GameData {
    fn default() -> Self {
        Self {
            comms_sabotaged: false,
            meeting_hud_state: NO_MEETING_HUD,
        }
    }
}

/// Root of the snapshot tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Current phase.
    pub game_state: GamePhase,
    /// Lobby code, empty outside a lobby.
    pub game_code: String,
    /// Map index from the lobby options.
    pub map_id: i32,
    /// Local client identity.
    #[serde(rename = "self")]
    pub local: SelfInfo,
    /// All known players.
    pub players: Vec<PlayerData>,
    /// Match-wide flags.
    pub game_data: GameData,
}

impl GameState {
    /// The state reported while not connected to any game.
    pub fn menu() -> Self {
        Self::default()
    }

    /// Reset in place to the menu state, keeping the player buffer's capacity.
    pub fn reset_to_menu(&mut self) {
        self.game_state = GamePhase::Menu;
        self.players.clear();
    }

    /// Number of players that are neither dead nor disconnected.
    pub fn alive_players(&self) -> usize {
        self.players
            .iter()
            .filter(|p| !p.is_dead && !p.disconnected)
            .count()
    }
}

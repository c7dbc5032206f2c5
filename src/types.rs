use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub z: f32,
}

impl Vec2 {
    pub const ORIGIN: Self = Self { x: 0.0, z: 0.0 };

    pub fn distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CellCoord {
    pub row: i32,
    pub col: i32,
}

/// Per-tick movement intent, derived by the client from held keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl InputState {
    /// Attempted displacement for one tick. Up is -z, left is -x; opposite
    /// flags cancel out.
    pub fn delta(self, step: f32) -> Vec2 {
        let mut delta = Vec2::ORIGIN;
        if self.up {
            delta.z -= step;
        }
        if self.down {
            delta.z += step;
        }
        if self.left {
            delta.x -= step;
        }
        if self.right {
            delta.x += step;
        }
        delta
    }
}

/// Cube face of the door wall that carries the door texture. The byte offsets
/// address the face's six indices inside the shared cube index buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorFace {
    Front,
    Back,
    Left,
    Right,
}

impl DoorFace {
    pub fn index_offset_bytes(self) -> u32 {
        match self {
            Self::Front => 0,
            Self::Back => 12,
            Self::Right => 48,
            Self::Left => 60,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct PlayerView {
    pub x: f32,
    pub z: f32,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct GhostView {
    pub x: f32,
    pub z: f32,
    pub color: [f32; 4],
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct KeyView {
    pub x: f32,
    pub z: f32,
    pub active: bool,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct DoorView {
    pub row: i32,
    pub col: i32,
    pub face: DoorFace,
    #[serde(rename = "faceOffsetBytes")]
    pub face_offset_bytes: u32,
    pub locked: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct WorldInit {
    pub size: i32,
    pub tiles: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameConfig {
    #[serde(rename = "tickRate")]
    pub tick_rate: u32,
    #[serde(rename = "playerSpeed")]
    pub player_speed: f32,
    #[serde(rename = "playerRadius")]
    pub player_radius: f32,
    #[serde(rename = "ghostSpeed")]
    pub ghost_speed: f32,
    #[serde(rename = "ghostHitRadius")]
    pub ghost_hit_radius: f32,
    #[serde(rename = "keyPickupRadius")]
    pub key_pickup_radius: f32,
    #[serde(rename = "winBasePoints")]
    pub win_base_points: i32,
    #[serde(rename = "pointDecayMs")]
    pub point_decay_ms: u64,
    #[serde(rename = "ghostHitPenalty")]
    pub ghost_hit_penalty: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEvent {
    RoundStarted {
        full: bool,
    },
    KeyCollected,
    DoorLocked,
    RoundWon {
        points: i32,
        #[serde(rename = "elapsedMs")]
        elapsed_ms: u64,
    },
    GhostHit {
        penalty: i32,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "nowMs")]
    pub now_ms: u64,
    #[serde(rename = "roundElapsedMs")]
    pub round_elapsed_ms: u64,
    #[serde(rename = "potentialPoints")]
    pub potential_points: i32,
    #[serde(rename = "totalScore")]
    pub total_score: i32,
    #[serde(rename = "scorePenalty")]
    pub score_penalty: i32,
    pub scores: Vec<i32>,
    pub player: PlayerView,
    pub ghosts: Vec<GhostView>,
    pub key: KeyView,
    pub door: DoorView,
    pub events: Vec<RoundEvent>,
}

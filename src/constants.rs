pub const TICK_RATE: u32 = 60;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const PLAYER_SPEED: f32 = 1.8;
pub const PLAYER_RADIUS: f32 = 0.35;

pub const GHOST_SPEED: f32 = 1.2;
pub const GHOST_ARRIVAL_EPSILON: f32 = 0.05;
pub const GHOST_HIT_RADIUS: f32 = 0.6;

pub const KEY_PICKUP_RADIUS: f32 = 0.5;

pub const WIN_BASE_POINTS: i32 = 10;
pub const POINT_DECAY_MS: u64 = 4_000;
pub const GHOST_HIT_PENALTY: i32 = 5;

use crate::constants::{
    GHOST_ARRIVAL_EPSILON, GHOST_HIT_PENALTY, GHOST_HIT_RADIUS, GHOST_SPEED, KEY_PICKUP_RADIUS,
    PLAYER_RADIUS, PLAYER_SPEED, POINT_DECAY_MS, TICK_RATE, WIN_BASE_POINTS,
};
use crate::grid::GridMap;
use crate::rng::Rng;
use crate::types::{
    GameConfig, InputState, PlayerView, RoundEvent, Snapshot, Vec2, WorldInit,
};

mod collision;
mod ghosts;
mod key_door;
mod utils;

use self::collision::MoveResolver;
use self::ghosts::{spawn_fleet, Ghost};
use self::key_door::{DoorTouch, KeyDoor};
use self::utils::now_ms;

/// One game session: the maze, the player, the key/door pair, the ghost
/// fleet, and the round score state. All gameplay randomness flows through
/// the seeded engine RNG, so a session is fully determined by its grid, its
/// seed, and the input fed to each tick.
#[derive(Clone, Debug)]
pub struct GameEngine {
    pub started_at_ms: u64,
    pub config: GameConfig,

    grid: GridMap,
    seed: u32,
    rng: Rng,
    resolver: MoveResolver,
    player: Vec2,
    input: InputState,
    key_door: KeyDoor,
    ghosts: Vec<Ghost>,
    scores: Vec<i32>,
    score_penalty: i32,
    elapsed_ms: u64,
    round_started_ms: u64,
    tick_counter: u64,
    events: Vec<RoundEvent>,
}

impl GameEngine {
    pub fn new(grid: GridMap, seed: u32) -> Self {
        let config = GameConfig {
            tick_rate: TICK_RATE,
            player_speed: PLAYER_SPEED,
            player_radius: PLAYER_RADIUS,
            ghost_speed: GHOST_SPEED,
            ghost_hit_radius: GHOST_HIT_RADIUS,
            key_pickup_radius: KEY_PICKUP_RADIUS,
            win_base_points: WIN_BASE_POINTS,
            point_decay_ms: POINT_DECAY_MS,
            ghost_hit_penalty: GHOST_HIT_PENALTY,
        };

        let mut engine = Self {
            started_at_ms: now_ms(),
            config,
            grid,
            seed,
            rng: Rng::new(seed),
            resolver: MoveResolver::new(PLAYER_RADIUS),
            player: Vec2::ORIGIN,
            input: InputState::default(),
            key_door: KeyDoor::new(),
            ghosts: Vec::new(),
            scores: Vec::new(),
            score_penalty: 0,
            elapsed_ms: 0,
            round_started_ms: 0,
            tick_counter: 0,
            events: Vec::new(),
        };
        engine.reset_round(true);
        engine
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn grid(&self) -> &GridMap {
        &self.grid
    }

    pub fn player_position(&self) -> Vec2 {
        self.player
    }

    pub fn set_input(&mut self, input: InputState) {
        self.input = input;
    }

    /// Advances one logical tick. Phase order: player movement and door
    /// handling first, then the ghost fleet, so a win in a tick resolves
    /// before a ghost hit can.
    pub fn step(&mut self, dt_ms: u64) {
        self.tick_counter += 1;
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);
        let dt_sec = dt_ms as f32 / 1000.0;
        self.update_player(dt_sec);
        self.update_ghosts(dt_sec);
    }

    fn update_player(&mut self, dt_sec: f32) {
        let delta = self.input.delta(PLAYER_SPEED * dt_sec);
        let outcome = self.resolver.resolve(&self.grid, self.player, delta);
        self.player = outcome.pos;

        for cell in outcome.wall_touches {
            match self.key_door.door_touch(cell) {
                DoorTouch::Open => {
                    self.finish_round();
                    return;
                }
                DoorTouch::Locked => self.events.push(RoundEvent::DoorLocked),
                DoorTouch::NotDoor => {}
            }
        }

        if self.key_door.try_pickup(self.player) {
            self.events.push(RoundEvent::KeyCollected);
        }
    }

    fn update_ghosts(&mut self, dt_sec: f32) {
        let mut collided = false;
        for ghost in &mut self.ghosts {
            ghost.tick(&self.grid, &mut self.rng, dt_sec);
            if ghost.touches(self.player) {
                collided = true;
            }
        }
        if collided {
            self.apply_ghost_hit();
        }
    }

    /// Scores the round and starts the next one. Points decay from the base
    /// by one per 4 seconds, then the accumulated ghost penalty comes off;
    /// neither step goes below zero.
    fn finish_round(&mut self) {
        let round_elapsed_ms = self.elapsed_ms - self.round_started_ms;
        let decayed = (round_elapsed_ms / POINT_DECAY_MS) as i32;
        let base = (WIN_BASE_POINTS - decayed).max(0);
        let points = (base - self.score_penalty).max(0);
        self.scores.push(points);
        self.events.push(RoundEvent::RoundWon {
            points,
            elapsed_ms: round_elapsed_ms,
        });
        self.reset_round(true);
    }

    fn apply_ghost_hit(&mut self) {
        self.score_penalty += GHOST_HIT_PENALTY;
        self.events.push(RoundEvent::GhostHit {
            penalty: self.score_penalty,
        });
        self.reset_round(false);
    }

    /// Returns the player to the origin and respawns key, door, and ghosts.
    /// Only a full reset (a win) clears the ghost penalty; a ghost-hit reset
    /// carries it into the retry.
    fn reset_round(&mut self, full: bool) {
        self.player = Vec2::ORIGIN;
        self.key_door.spawn_key(&self.grid, &mut self.rng);
        self.key_door.spawn_door(&self.grid, &mut self.rng);
        self.ghosts = spawn_fleet(&self.grid, &mut self.rng);
        self.round_started_ms = self.elapsed_ms;
        if full {
            self.score_penalty = 0;
        }
        self.events.push(RoundEvent::RoundStarted { full });
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let round_elapsed_ms = self.elapsed_ms - self.round_started_ms;
        let decayed = (round_elapsed_ms / POINT_DECAY_MS) as i32;
        let snapshot = Snapshot {
            tick: self.tick_counter,
            now_ms: self.started_at_ms.saturating_add(self.elapsed_ms),
            round_elapsed_ms,
            potential_points: (WIN_BASE_POINTS - decayed).max(0),
            total_score: self.scores.iter().sum(),
            score_penalty: self.score_penalty,
            scores: self.scores.clone(),
            player: PlayerView {
                x: self.player.x,
                z: self.player.z,
            },
            ghosts: self.ghosts.iter().map(Ghost::view).collect(),
            key: self.key_door.key_view(),
            door: self.key_door.door_view(),
            events: if include_events {
                self.events.clone()
            } else {
                Vec::new()
            },
        };
        if include_events {
            self.events.clear();
        }
        snapshot
    }

    pub fn build_world_init(&self) -> WorldInit {
        WorldInit {
            size: self.grid.size(),
            tiles: self.grid.tile_rows(),
        }
    }
}

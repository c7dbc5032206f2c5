use crate::constants::{GHOST_ARRIVAL_EPSILON, GHOST_HIT_RADIUS, GHOST_SPEED};
use crate::grid::GridMap;
use crate::rng::Rng;
use crate::types::{GhostView, Vec2};

use super::utils::NEIGHBOR_STEPS;

/// Random-walk ghost. Wanders cell to cell, snapping onto each reached cell
/// center so interpolation error never accumulates.
#[derive(Clone, Debug)]
pub(super) struct Ghost {
    pub(super) pos: Vec2,
    pub(super) target: Option<Vec2>,
    pub(super) speed: f32,
    pub(super) color: [f32; 4],
}

/// Four ghosts, one per corner-adjacent interior cell, each with a random
/// reddish tint.
pub(super) fn spawn_fleet(grid: &GridMap, rng: &mut Rng) -> Vec<Ghost> {
    let edge = grid.size() - 2;
    [(1, 1), (edge, 1), (1, edge), (edge, edge)]
        .into_iter()
        .map(|(row, col)| {
            let (x, z) = grid.cell_center(row, col);
            Ghost {
                pos: Vec2 { x, z },
                target: None,
                speed: GHOST_SPEED,
                color: [rng.next_f32(), 0.2, 0.2, 1.0],
            }
        })
        .collect()
}

impl Ghost {
    pub fn tick(&mut self, grid: &GridMap, rng: &mut Rng, dt_sec: f32) {
        let arrived = match self.target {
            None => true,
            Some(target) => {
                (self.pos.x - target.x).abs() < GHOST_ARRIVAL_EPSILON
                    && (self.pos.z - target.z).abs() < GHOST_ARRIVAL_EPSILON
            }
        };

        if arrived {
            if let Some(target) = self.target {
                self.pos = target;
            }
            self.target = Some(self.pick_target(grid, rng));
        }

        let Some(target) = self.target else {
            return;
        };
        let dx = target.x - self.pos.x;
        let dz = target.z - self.pos.z;
        let dist = (dx * dx + dz * dz).sqrt();
        if dist > 0.0 {
            // No overshoot clamp; the arrival epsilon absorbs the excess.
            let step = self.speed * dt_sec;
            self.pos.x += dx / dist * step;
            self.pos.z += dz / dist * step;
        }
    }

    /// Uniform pick among the in-bounds floor neighbors of the current cell;
    /// a fully boxed-in ghost targets its own position and stays put.
    fn pick_target(&self, grid: &GridMap, rng: &mut Rng) -> Vec2 {
        let (row, col) = grid.world_to_cell(self.pos.x, self.pos.z);
        let mut moves = Vec::new();
        for (d_row, d_col) in NEIGHBOR_STEPS {
            if grid.is_floor(row + d_row, col + d_col) {
                moves.push(Vec2 {
                    x: self.pos.x + d_col as f32,
                    z: self.pos.z + d_row as f32,
                });
            }
        }
        if moves.is_empty() {
            self.pos
        } else {
            moves[rng.pick_index(moves.len())]
        }
    }

    pub fn touches(&self, player: Vec2) -> bool {
        self.pos.distance(player) < GHOST_HIT_RADIUS
    }

    pub fn view(&self) -> GhostView {
        GhostView {
            x: self.pos.x,
            z: self.pos.z,
            color: self.color,
        }
    }
}

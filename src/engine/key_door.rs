use crate::constants::KEY_PICKUP_RADIUS;
use crate::grid::{Cell, GridMap};
use crate::rng::Rng;
use crate::types::{CellCoord, DoorFace, DoorView, KeyView, Vec2};

use super::utils::NEIGHBOR_STEPS;

#[derive(Clone, Copy, Debug)]
pub(super) struct KeyState {
    pub pos: Vec2,
    pub active: bool,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct DoorState {
    pub cell: CellCoord,
    pub face: DoorFace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum DoorTouch {
    Open,
    Locked,
    NotDoor,
}

/// Key pickup and door unlock state for the current round. The door stays at
/// the `(-1, -1)` sentinel until a spawn finds a candidate wall; a round with
/// no candidate is unwinnable, which mirrors the original game.
#[derive(Clone, Debug)]
pub(super) struct KeyDoor {
    pub(super) key: KeyState,
    pub(super) door: DoorState,
}

impl KeyDoor {
    pub fn new() -> Self {
        Self {
            key: KeyState {
                pos: Vec2::ORIGIN,
                active: true,
            },
            door: DoorState {
                cell: CellCoord { row: -1, col: -1 },
                face: DoorFace::Front,
            },
        }
    }

    pub fn spawn_key(&mut self, grid: &GridMap, rng: &mut Rng) {
        let floors = grid.floor_cells();
        if floors.is_empty() {
            eprintln!("[key-door] no floor cells; key keeps previous position");
            return;
        }
        let cell = floors[rng.pick_index(floors.len())];
        let (x, z) = grid.cell_center(cell.row, cell.col);
        self.key = KeyState {
            pos: Vec2 { x, z },
            active: true,
        };
    }

    /// Picks a strictly-interior wall cell with a floor neighbor. The first
    /// floor neighbor in up/down/left/right order decides which cube face
    /// carries the door; each wall cell is a candidate at most once.
    pub fn spawn_door(&mut self, grid: &GridMap, rng: &mut Rng) {
        let mut candidates = Vec::new();
        for row in 1..grid.size() - 1 {
            for col in 1..grid.size() - 1 {
                if grid.cell(row, col) != Cell::Wall {
                    continue;
                }
                for (step, (d_row, d_col)) in NEIGHBOR_STEPS.iter().enumerate() {
                    if grid.is_floor(row + d_row, col + d_col) {
                        candidates.push(DoorState {
                            cell: CellCoord { row, col },
                            face: face_for_step(step),
                        });
                        break;
                    }
                }
            }
        }

        if candidates.is_empty() {
            eprintln!("[key-door] no door candidates; door keeps previous position");
            return;
        }
        self.door = candidates[rng.pick_index(candidates.len())];
    }

    pub fn door_touch(&self, cell: CellCoord) -> DoorTouch {
        if cell != self.door.cell {
            return DoorTouch::NotDoor;
        }
        if self.key.active {
            DoorTouch::Locked
        } else {
            DoorTouch::Open
        }
    }

    pub fn try_pickup(&mut self, player: Vec2) -> bool {
        if !self.key.active {
            return false;
        }
        if player.distance(self.key.pos) < KEY_PICKUP_RADIUS {
            self.key.active = false;
            return true;
        }
        false
    }

    pub fn key_view(&self) -> KeyView {
        KeyView {
            x: self.key.pos.x,
            z: self.key.pos.z,
            active: self.key.active,
        }
    }

    pub fn door_view(&self) -> DoorView {
        DoorView {
            row: self.door.cell.row,
            col: self.door.cell.col,
            face: self.door.face,
            face_offset_bytes: self.door.face.index_offset_bytes(),
            locked: self.key.active,
        }
    }
}

/// Face exposed toward the floor neighbor found at `step` (scan order is up,
/// down, left, right): a floor cell above shows the door on the wall's back
/// face, and so on.
fn face_for_step(step: usize) -> DoorFace {
    match step {
        0 => DoorFace::Back,
        1 => DoorFace::Front,
        2 => DoorFace::Left,
        _ => DoorFace::Right,
    }
}

use crate::grid::{Cell, GridMap};
use crate::types::{CellCoord, Vec2};

/// Result of one corner-box probe: either the whole box is on floor, or it is
/// stopped by the map edge or by a specific wall cell.
enum BoxProbe {
    Clear,
    Blocked(Option<CellCoord>),
}

#[derive(Clone, Debug)]
pub(super) struct MoveOutcome {
    pub pos: Vec2,
    /// Wall cells hit while probing, at most one per axis. Door-touch
    /// handling runs over these.
    pub wall_touches: Vec<CellCoord>,
}

/// Axis-separated collision resolution for the player's square collision box.
#[derive(Clone, Copy, Debug)]
pub(super) struct MoveResolver {
    radius: f32,
}

impl MoveResolver {
    pub fn new(radius: f32) -> Self {
        Self { radius }
    }

    /// Resolves X first, then Z against the already-updated X, which is what
    /// produces wall sliding on diagonal input. An axis move is accepted only
    /// if all four corners of the candidate box are on floor; probing stops
    /// at the first blocked corner.
    pub fn resolve(&self, grid: &GridMap, pos: Vec2, delta: Vec2) -> MoveOutcome {
        let mut out = MoveOutcome {
            pos,
            wall_touches: Vec::new(),
        };

        match self.probe_box(grid, pos.x + delta.x, out.pos.z) {
            BoxProbe::Clear => out.pos.x = pos.x + delta.x,
            BoxProbe::Blocked(Some(cell)) => out.wall_touches.push(cell),
            BoxProbe::Blocked(None) => {}
        }

        match self.probe_box(grid, out.pos.x, pos.z + delta.z) {
            BoxProbe::Clear => out.pos.z = pos.z + delta.z,
            BoxProbe::Blocked(Some(cell)) => out.wall_touches.push(cell),
            BoxProbe::Blocked(None) => {}
        }

        out
    }

    fn probe_box(&self, grid: &GridMap, x: f32, z: f32) -> BoxProbe {
        let r = self.radius;
        let corners = [
            (x - r, z - r),
            (x + r, z - r),
            (x - r, z + r),
            (x + r, z + r),
        ];
        for (corner_x, corner_z) in corners {
            let (row, col) = grid.world_to_cell(corner_x, corner_z);
            if !grid.in_bounds(row, col) {
                return BoxProbe::Blocked(None);
            }
            if grid.cell(row, col) == Cell::Wall {
                return BoxProbe::Blocked(Some(CellCoord { row, col }));
            }
        }
        BoxProbe::Clear
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_room() -> GridMap {
        GridMap::parse_tiles(&[
            "#######", "#.....#", "#.....#", "#.....#", "#.....#", "#.....#", "#######",
        ])
        .expect("test grid should parse")
    }

    // Wall pocket above and to the right of the center cell (3,3).
    fn corner_pocket() -> GridMap {
        GridMap::parse_tiles(&[
            "#######", "#.....#", "#..##.#", "#...#.#", "#.....#", "#.....#", "#######",
        ])
        .expect("test grid should parse")
    }

    fn resolver() -> MoveResolver {
        MoveResolver::new(0.35)
    }

    #[test]
    fn clear_box_accepts_move_unmodified() {
        let grid = open_room();
        let out = resolver().resolve(
            &grid,
            Vec2 { x: 0.0, z: 0.0 },
            Vec2 { x: 0.03, z: -0.03 },
        );
        assert_eq!(out.pos.x, 0.03);
        assert_eq!(out.pos.z, -0.03);
        assert!(out.wall_touches.is_empty());
    }

    #[test]
    fn blocked_axis_slides_along_the_open_one() {
        let grid = corner_pocket();

        // Up-right into the wall at (3,4): the x move is rejected, the z move
        // is still free because (2,3) is only reached with a bigger step.
        let pos = Vec2 { x: 0.1, z: 0.1 };
        let out = resolver().resolve(&grid, pos, Vec2 { x: 0.2, z: -0.2 });
        assert_eq!(out.pos.x, pos.x, "x move into the wall is rejected");
        assert_eq!(out.pos.z, pos.z - 0.2, "z move still goes through");
        assert_eq!(out.wall_touches, vec![CellCoord { row: 3, col: 4 }]);
    }

    #[test]
    fn fully_blocked_diagonal_stops_both_axes() {
        let grid = corner_pocket();

        // Close enough to the top wall that both axes hit something.
        let pos = Vec2 { x: 0.1, z: -0.1 };
        let out = resolver().resolve(&grid, pos, Vec2 { x: 0.2, z: -0.2 });
        assert_eq!(out.pos.x, pos.x);
        assert_eq!(out.pos.z, pos.z);
        assert_eq!(
            out.wall_touches,
            vec![CellCoord { row: 3, col: 4 }, CellCoord { row: 2, col: 3 }]
        );
    }

    #[test]
    fn probing_stops_at_the_first_blocked_corner() {
        let grid = corner_pocket();

        // Both right-hand corners of the candidate box land in the same wall
        // column; only the first probed corner is reported.
        let pos = Vec2 { x: 0.1, z: -0.1 };
        let out = resolver().resolve(&grid, pos, Vec2 { x: 0.2, z: 0.0 });
        assert_eq!(out.wall_touches, vec![CellCoord { row: 3, col: 4 }]);
        assert_eq!(out.pos.z, pos.z);
    }

    #[test]
    fn border_walls_pin_the_player_inside_the_map() {
        let grid = open_room();
        // Center of cell (1,1); pushing toward the corner hits border walls.
        let pos = Vec2 { x: -2.5, z: -2.5 };
        let out = resolver().resolve(&grid, pos, Vec2 { x: -0.2, z: -0.2 });
        assert_eq!(out.pos.x, pos.x);
        assert_eq!(out.pos.z, pos.z);
        for touch in &out.wall_touches {
            assert!(grid.in_bounds(touch.row, touch.col));
        }
    }
}

use serde::Serialize;
use thiserror::Error;

use crate::types::CellCoord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Floor,
    Wall,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("level has no rows")]
    Empty,
    #[error("level must be square: row {row} has {found} cells, expected {expected}")]
    NotSquare {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("level size must be odd, got {0}")]
    EvenSize(usize),
    #[error("unknown tile {symbol:?} at row {row}, col {col}")]
    UnknownTile {
        symbol: char,
        row: usize,
        col: usize,
    },
    #[error("unknown cell code {code} at row {row}, col {col}")]
    UnknownCode { code: u8, row: usize, col: usize },
}

/// Square occupancy grid. Immutable once built; everything outside the grid
/// counts as wall.
#[derive(Clone, Debug)]
pub struct GridMap {
    size: i32,
    cells: Vec<Cell>,
}

/// Bundled level, used when the host supplies none.
pub const DEFAULT_LEVEL: [&str; 21] = [
    "#####################",
    "#.........#.........#",
    "#.###.###.#.###.###.#",
    "#.#.....#...#.....#.#",
    "#.#.###.#####.###.#.#",
    "#.....#...#...#.....#",
    "###.#####.#.#####.###",
    "#...#.....#.....#...#",
    "#.###.###.#.###.###.#",
    "#.#...#.......#...#.#",
    "#...###.......###...#",
    "#.#...#.......#...#.#",
    "#.###.###.#.###.###.#",
    "#...#.....#.....#...#",
    "###.#####.#.#####.###",
    "#.....#...#...#.....#",
    "#.#.###.#####.###.#.#",
    "#.#.....#...#.....#.#",
    "#.###.###.#.###.###.#",
    "#.........#.........#",
    "#####################",
];

impl GridMap {
    /// Builds a grid from the externally-supplied 0/1 occupancy array
    /// (0 = floor, 1 = wall).
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self, GridError> {
        let size = Self::check_shape(rows.len())?;
        let mut cells = Vec::with_capacity(size * size);
        for (row, codes) in rows.iter().enumerate() {
            if codes.len() != size {
                return Err(GridError::NotSquare {
                    row,
                    found: codes.len(),
                    expected: size,
                });
            }
            for (col, code) in codes.iter().enumerate() {
                cells.push(match code {
                    0 => Cell::Floor,
                    1 => Cell::Wall,
                    other => {
                        return Err(GridError::UnknownCode {
                            code: *other,
                            row,
                            col,
                        })
                    }
                });
            }
        }
        Ok(Self {
            size: size as i32,
            cells,
        })
    }

    /// Builds a grid from `'#'`/`'.'` tile rows, the same format the world
    /// init view hands to clients.
    pub fn parse_tiles<S: AsRef<str>>(rows: &[S]) -> Result<Self, GridError> {
        let size = Self::check_shape(rows.len())?;
        let mut cells = Vec::with_capacity(size * size);
        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            if line.chars().count() != size {
                return Err(GridError::NotSquare {
                    row,
                    found: line.chars().count(),
                    expected: size,
                });
            }
            for (col, symbol) in line.chars().enumerate() {
                cells.push(match symbol {
                    '.' => Cell::Floor,
                    '#' => Cell::Wall,
                    other => {
                        return Err(GridError::UnknownTile {
                            symbol: other,
                            row,
                            col,
                        })
                    }
                });
            }
        }
        Ok(Self {
            size: size as i32,
            cells,
        })
    }

    pub fn default_level() -> Self {
        Self::parse_tiles(&DEFAULT_LEVEL).expect("bundled level is valid")
    }

    fn check_shape(rows: usize) -> Result<usize, GridError> {
        if rows == 0 {
            return Err(GridError::Empty);
        }
        if rows % 2 == 0 {
            return Err(GridError::EvenSize(rows));
        }
        Ok(rows)
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    /// World-space distance from the grid edge to the origin; the maze is
    /// centered so cell centers sit at `col - half + 0.5`.
    pub fn half_extent(&self) -> f32 {
        self.size as f32 / 2.0
    }

    pub fn in_bounds(&self, row: i32, col: i32) -> bool {
        row >= 0 && row < self.size && col >= 0 && col < self.size
    }

    pub fn cell(&self, row: i32, col: i32) -> Cell {
        if !self.in_bounds(row, col) {
            return Cell::Wall;
        }
        self.cells[(row * self.size + col) as usize]
    }

    pub fn is_floor(&self, row: i32, col: i32) -> bool {
        self.cell(row, col) == Cell::Floor
    }

    pub fn world_to_cell(&self, x: f32, z: f32) -> (i32, i32) {
        let half = self.half_extent();
        ((z + half).floor() as i32, (x + half).floor() as i32)
    }

    pub fn cell_center(&self, row: i32, col: i32) -> (f32, f32) {
        let half = self.half_extent();
        (col as f32 - half + 0.5, row as f32 - half + 0.5)
    }

    pub fn floor_cells(&self) -> Vec<CellCoord> {
        let mut out = Vec::new();
        for row in 0..self.size {
            for col in 0..self.size {
                if self.is_floor(row, col) {
                    out.push(CellCoord { row, col });
                }
            }
        }
        out
    }

    pub fn tile_rows(&self) -> Vec<String> {
        (0..self.size)
            .map(|row| {
                (0..self.size)
                    .map(|col| match self.cell(row, col) {
                        Cell::Floor => '.',
                        Cell::Wall => '#',
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};

    use super::*;

    #[test]
    fn world_and_cell_mapping_round_trip() {
        let grid = GridMap::default_level();
        for row in 0..grid.size() {
            for col in 0..grid.size() {
                let (x, z) = grid.cell_center(row, col);
                assert_eq!(grid.world_to_cell(x, z), (row, col));
            }
        }
    }

    #[test]
    fn out_of_bounds_reads_as_wall() {
        let grid = GridMap::default_level();
        assert_eq!(grid.cell(-1, 0), Cell::Wall);
        assert_eq!(grid.cell(0, -1), Cell::Wall);
        assert_eq!(grid.cell(grid.size(), 0), Cell::Wall);
        assert_eq!(grid.cell(0, grid.size()), Cell::Wall);
        assert!(!grid.is_floor(-5, -5));
    }

    #[test]
    fn from_rows_matches_parse_tiles() {
        let tiles = ["#####", "#...#", "#.#.#", "#...#", "#####"];
        let rows: Vec<Vec<u8>> = tiles
            .iter()
            .map(|line| {
                line.chars()
                    .map(|symbol| if symbol == '#' { 1 } else { 0 })
                    .collect()
            })
            .collect();

        let a = GridMap::parse_tiles(&tiles).expect("tiles should parse");
        let b = GridMap::from_rows(&rows).expect("rows should parse");
        assert_eq!(a.tile_rows(), b.tile_rows());
    }

    #[test]
    fn invalid_levels_are_rejected() {
        assert_eq!(
            GridMap::parse_tiles::<&str>(&[]).unwrap_err(),
            GridError::Empty
        );
        assert_eq!(
            GridMap::parse_tiles(&["##", "##"]).unwrap_err(),
            GridError::EvenSize(2)
        );
        assert!(matches!(
            GridMap::parse_tiles(&["###", "#.#", "##"]).unwrap_err(),
            GridError::NotSquare {
                row: 2,
                found: 2,
                expected: 3
            }
        ));
        assert!(matches!(
            GridMap::parse_tiles(&["###", "#x#", "###"]).unwrap_err(),
            GridError::UnknownTile {
                symbol: 'x',
                row: 1,
                col: 1
            }
        ));
        assert!(matches!(
            GridMap::from_rows(&[vec![1, 1, 1], vec![1, 7, 1], vec![1, 1, 1]]).unwrap_err(),
            GridError::UnknownCode {
                code: 7,
                row: 1,
                col: 1
            }
        ));
    }

    #[test]
    fn bundled_level_has_playable_shape() {
        let grid = GridMap::default_level();
        assert_eq!(grid.size(), 21);

        for i in 0..grid.size() {
            assert_eq!(grid.cell(0, i), Cell::Wall);
            assert_eq!(grid.cell(grid.size() - 1, i), Cell::Wall);
            assert_eq!(grid.cell(i, 0), Cell::Wall);
            assert_eq!(grid.cell(i, grid.size() - 1), Cell::Wall);
        }

        // Player origin and the four ghost spawn cells.
        assert!(grid.is_floor(10, 10));
        let edge = grid.size() - 2;
        for (row, col) in [(1, 1), (1, edge), (edge, 1), (edge, edge)] {
            assert!(grid.is_floor(row, col), "spawn cell ({row},{col})");
        }
    }

    #[test]
    fn bundled_level_floor_is_fully_connected() {
        let grid = GridMap::default_level();
        let floors: HashSet<(i32, i32)> = grid
            .floor_cells()
            .iter()
            .map(|cell| (cell.row, cell.col))
            .collect();

        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert((10, 10));
        queue.push_back((10, 10));
        while let Some((row, col)) = queue.pop_front() {
            for (next_row, next_col) in [
                (row - 1, col),
                (row + 1, col),
                (row, col - 1),
                (row, col + 1),
            ] {
                if grid.is_floor(next_row, next_col) && seen.insert((next_row, next_col)) {
                    queue.push_back((next_row, next_col));
                }
            }
        }

        assert_eq!(seen, floors);
    }
}

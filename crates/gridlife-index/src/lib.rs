//! Spatial indexing for toroidal GridLife worlds.
//!
//! The index maps every `(row, col)` cell to the ordered list of keys that
//! occupy it. All coordinate arithmetic wraps in both dimensions, so there is
//! no edge: stepping north from row 0 lands on the last row.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Errors emitted by the cell index.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., a zero-sized grid).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A cell outside the grid was addressed without wrapping.
    #[error("cell ({row}, {col}) is outside the grid")]
    OutOfBounds { row: u32, col: u32 },
    /// A removal or relocation referenced a key the cell does not hold.
    #[error("cell ({row}, {col}) does not hold the requested key")]
    MissingKey { row: u32, col: u32 },
}

/// A grid coordinate. Rows grow southward, columns grow eastward.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
}

impl Cell {
    #[must_use]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// Grid dimensions plus the wrap-around arithmetic that goes with them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GridDims {
    pub rows: u32,
    pub cols: u32,
}

impl GridDims {
    /// Construct dimensions, rejecting empty grids.
    pub fn new(rows: u32, cols: u32) -> Result<Self, IndexError> {
        if rows == 0 || cols == 0 {
            return Err(IndexError::InvalidConfig("grid dimensions must be non-zero"));
        }
        Ok(Self { rows, cols })
    }

    /// Total number of cells.
    #[must_use]
    pub const fn area(&self) -> usize {
        (self.rows as usize) * (self.cols as usize)
    }

    /// Returns true when `cell` lies inside the grid without wrapping.
    #[must_use]
    pub const fn contains(&self, cell: Cell) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    /// Wrap signed coordinates onto the torus.
    #[must_use]
    pub fn wrap(&self, row: i64, col: i64) -> Cell {
        Cell {
            row: row.rem_euclid(i64::from(self.rows)) as u32,
            col: col.rem_euclid(i64::from(self.cols)) as u32,
        }
    }

    /// Offset `cell` by `(dr, dc)` with wrap-around in both dimensions.
    #[must_use]
    pub fn offset(&self, cell: Cell, dr: i64, dc: i64) -> Cell {
        self.wrap(i64::from(cell.row) + dr, i64::from(cell.col) + dc)
    }

    /// The cell `distance` steps away from `cell` along `heading`.
    #[must_use]
    pub fn ahead(&self, cell: Cell, heading: Heading, distance: i64) -> Cell {
        let (dr, dc) = heading.delta();
        self.offset(cell, dr * distance, dc * distance)
    }

    #[inline]
    fn linear(&self, cell: Cell) -> Result<usize, IndexError> {
        if !self.contains(cell) {
            return Err(IndexError::OutOfBounds {
                row: cell.row,
                col: cell.col,
            });
        }
        Ok((cell.row as usize) * (self.cols as usize) + cell.col as usize)
    }
}

/// Absolute facing direction of an agent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Heading {
    #[default]
    North,
    East,
    South,
    West,
}

/// Direction relative to a heading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Relative {
    Front,
    Back,
    Right,
    Left,
}

impl Relative {
    /// Every relative direction in perception order.
    pub const ALL: [Relative; 4] = [Self::Front, Self::Back, Self::Right, Self::Left];
}

impl Heading {
    /// Clockwise order; the rotation table indexes into it.
    pub const CLOCKWISE: [Heading; 4] = [Self::North, Self::East, Self::South, Self::West];

    const fn ordinal(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    /// Row/column step for one cell of movement.
    #[must_use]
    pub const fn delta(self) -> (i64, i64) {
        match self {
            Self::North => (-1, 0),
            Self::East => (0, 1),
            Self::South => (1, 0),
            Self::West => (0, -1),
        }
    }

    /// Resolve a heading-relative direction to an absolute heading.
    #[must_use]
    pub const fn rotate(self, relative: Relative) -> Heading {
        let quarter_turns = match relative {
            Relative::Front => 0,
            Relative::Right => 1,
            Relative::Back => 2,
            Relative::Left => 3,
        };
        Self::CLOCKWISE[(self.ordinal() + quarter_turns) % 4]
    }

    #[must_use]
    pub const fn turn_left(self) -> Heading {
        self.rotate(Relative::Left)
    }

    #[must_use]
    pub const fn turn_right(self) -> Heading {
        self.rotate(Relative::Right)
    }

    #[must_use]
    pub const fn reverse(self) -> Heading {
        self.rotate(Relative::Back)
    }
}

/// Inline capacity per cell; most cells hold terrain plus at most a couple of movers.
type Slot<K> = SmallVec<[K; 4]>;

/// Ordered per-cell key lists over a toroidal grid.
#[derive(Debug, Clone)]
pub struct CellIndex<K> {
    dims: GridDims,
    cells: Vec<Slot<K>>,
    len: usize,
}

impl<K: Copy + PartialEq> CellIndex<K> {
    /// Create an empty index covering `dims`.
    #[must_use]
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            cells: vec![Slot::new(); dims.area()],
            len: 0,
        }
    }

    #[must_use]
    pub const fn dims(&self) -> GridDims {
        self.dims
    }

    /// Total number of keys stored across all cells.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Keys occupying `cell`, in insertion order. Out-of-range cells are empty.
    #[must_use]
    pub fn at(&self, cell: Cell) -> &[K] {
        match self.dims.linear(cell) {
            Ok(idx) => &self.cells[idx],
            Err(_) => &[],
        }
    }

    /// Append `key` to the list at `cell`.
    pub fn insert(&mut self, cell: Cell, key: K) -> Result<(), IndexError> {
        let idx = self.dims.linear(cell)?;
        self.cells[idx].push(key);
        self.len += 1;
        Ok(())
    }

    /// Remove `key` from `cell`, preserving the order of the remaining keys.
    pub fn remove(&mut self, cell: Cell, key: K) -> Result<(), IndexError> {
        let idx = self.dims.linear(cell)?;
        let slot = &mut self.cells[idx];
        let pos = slot
            .iter()
            .position(|k| *k == key)
            .ok_or(IndexError::MissingKey {
                row: cell.row,
                col: cell.col,
            })?;
        slot.remove(pos);
        self.len -= 1;
        Ok(())
    }

    /// Move `key` from `from` to `to`. Fails without side effects if `from` lacks the key.
    pub fn relocate(&mut self, key: K, from: Cell, to: Cell) -> Result<(), IndexError> {
        self.dims.linear(to)?;
        self.remove(from, key)?;
        self.insert(to, key)
    }

    /// Returns whether `cell` holds `key`.
    #[must_use]
    pub fn contains(&self, cell: Cell, key: K) -> bool {
        self.at(cell).contains(&key)
    }

    /// Every cell holding `key`. A consistent index yields at most one.
    pub fn locate(&self, key: K) -> impl Iterator<Item = Cell> + '_ {
        let cols = self.dims.cols as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(move |(_, slot)| slot.contains(&key))
            .map(move |(idx, _)| Cell::new((idx / cols) as u32, (idx % cols) as u32))
    }

    /// Iterate `(cell, keys)` for every non-empty cell.
    pub fn occupied(&self) -> impl Iterator<Item = (Cell, &[K])> + '_ {
        let cols = self.dims.cols as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_empty())
            .map(move |(idx, slot)| {
                (
                    Cell::new((idx / cols) as u32, (idx % cols) as u32),
                    slot.as_slice(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(rows: u32, cols: u32) -> GridDims {
        GridDims::new(rows, cols).expect("dims")
    }

    #[test]
    fn zero_sized_grid_is_rejected() {
        assert_eq!(
            GridDims::new(0, 4),
            Err(IndexError::InvalidConfig("grid dimensions must be non-zero"))
        );
    }

    #[test]
    fn forward_wraps_across_every_edge() {
        let d = dims(5, 7);
        assert_eq!(d.ahead(Cell::new(0, 3), Heading::North, 1), Cell::new(4, 3));
        assert_eq!(d.ahead(Cell::new(4, 3), Heading::South, 1), Cell::new(0, 3));
        assert_eq!(d.ahead(Cell::new(2, 6), Heading::East, 1), Cell::new(2, 0));
        assert_eq!(d.ahead(Cell::new(2, 0), Heading::West, 1), Cell::new(2, 6));
        assert_eq!(d.ahead(Cell::new(1, 1), Heading::North, 12), Cell::new(4, 1));
    }

    #[test]
    fn rotation_table_matches_turns() {
        for heading in Heading::CLOCKWISE {
            assert_eq!(heading.rotate(Relative::Front), heading);
            assert_eq!(heading.turn_left().turn_right(), heading);
            assert_eq!(heading.reverse().reverse(), heading);
            assert_eq!(heading.turn_right().turn_right(), heading.reverse());
        }
        assert_eq!(Heading::North.rotate(Relative::Right), Heading::East);
        assert_eq!(Heading::West.rotate(Relative::Right), Heading::North);
        assert_eq!(Heading::East.rotate(Relative::Left), Heading::North);
        assert_eq!(Heading::South.rotate(Relative::Back), Heading::North);
    }

    #[test]
    fn insert_remove_preserves_order() {
        let mut index = CellIndex::new(dims(3, 3));
        let cell = Cell::new(1, 2);
        for key in [10u32, 11, 12] {
            index.insert(cell, key).expect("insert");
        }
        index.remove(cell, 11).expect("remove");
        assert_eq!(index.at(cell), &[10, 12]);
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.remove(cell, 11),
            Err(IndexError::MissingKey { row: 1, col: 2 })
        );
    }

    #[test]
    fn relocate_moves_key_between_cells() {
        let mut index = CellIndex::new(dims(4, 4));
        index.insert(Cell::new(0, 0), 7u32).expect("insert");
        index
            .relocate(7, Cell::new(0, 0), Cell::new(3, 3))
            .expect("relocate");
        assert!(index.at(Cell::new(0, 0)).is_empty());
        assert_eq!(index.locate(7).collect::<Vec<_>>(), vec![Cell::new(3, 3)]);

        let err = index.relocate(7, Cell::new(0, 0), Cell::new(1, 1));
        assert_eq!(err, Err(IndexError::MissingKey { row: 0, col: 0 }));
        assert!(index.contains(Cell::new(3, 3), 7));
    }

    #[test]
    fn out_of_bounds_cells_are_rejected() {
        let mut index = CellIndex::<u32>::new(dims(2, 2));
        assert_eq!(
            index.insert(Cell::new(2, 0), 1),
            Err(IndexError::OutOfBounds { row: 2, col: 0 })
        );
        assert!(index.at(Cell::new(5, 5)).is_empty());
        assert!(index.is_empty());
    }
}

use rand::seq::index;

use crate::engine::pool::ClueSet;
use crate::error::{BingoError, Result};

/// Side length of the bingo grid.
pub const GRID_SIZE: usize = 5;
/// Total number of cells on a sheet.
pub const BOARD_CELLS: usize = GRID_SIZE * GRID_SIZE;
/// Row-major index of the center cell, used for the free space.
pub const FREE_CELL_INDEX: usize = 12;
/// Label written into the free space instead of a sampled clue.
pub const FREE_CELL_TEXT: &str = "Free";

/// Suffix appended to a clue line in the sheet encoding when the cell is
/// crossed off. Stripped on decode, re-appended on encode, and never part
/// of a `Cell`'s text.
pub const MARK_SUFFIX: &str = " X";

/// One grid position: the clue text and whether it has been crossed off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub marked: bool,
}

/// A parsed square reference like `B3`: column letter A-E, row digit 1-5.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Square {
    row: usize,
    col: usize,
}

impl Square {
    /// Parse a square id, case-insensitively. `"B3"` is column B (index 1),
    /// row 3 (index 2). Anything that is not exactly one letter A-E
    /// followed by one digit 1-5 is rejected.
    pub fn parse(input: &str) -> Result<Square> {
        let s = input.trim();
        let mut chars = s.chars();
        let (col_ch, row_ch) = match (chars.next(), chars.next(), chars.next()) {
            (Some(c), Some(r), None) => (c.to_ascii_uppercase(), r),
            _ => return Err(BingoError::InvalidSquare(input.to_string())),
        };
        if !('A'..='E').contains(&col_ch) || !('1'..='5').contains(&row_ch) {
            return Err(BingoError::InvalidSquare(input.to_string()));
        }
        Ok(Square {
            row: row_ch as usize - '1' as usize,
            col: col_ch as usize - 'A' as usize,
        })
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }

    /// Row-major cell index.
    pub fn index(&self) -> usize {
        self.row * GRID_SIZE + self.col
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            (b'A' + self.col as u8) as char,
            self.row + 1
        )
    }
}

/// One participant's personal 5x5 sheet. Always exactly 25 cells; a
/// stored sheet with any other count is rejected as corrupt, not repaired.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    pub label: String,
    cells: Vec<Cell>,
}

impl Board {
    /// Draw a fresh sheet from the pool: 25 distinct clues chosen
    /// uniformly at random without replacement, in random order. With
    /// `free_space` the center cell becomes the literal free label,
    /// unmarked; whether it starts crossed off is the caller's call.
    pub fn sample(pool: &ClueSet, free_space: bool) -> Result<Board> {
        if pool.clues.len() < BOARD_CELLS {
            return Err(BingoError::PoolTooSmall {
                needed: BOARD_CELLS,
                found: pool.clues.len(),
            });
        }
        let mut rng = rand::thread_rng();
        let cells = index::sample(&mut rng, pool.clues.len(), BOARD_CELLS)
            .into_iter()
            .enumerate()
            .map(|(slot, clue_idx)| Cell {
                text: if free_space && slot == FREE_CELL_INDEX {
                    FREE_CELL_TEXT.to_string()
                } else {
                    pool.clues[clue_idx].clone()
                },
                marked: false,
            })
            .collect();
        Ok(Board {
            label: pool.label.clone(),
            cells,
        })
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    fn cell_mut(&mut self, square: Square) -> Result<&mut Cell> {
        let index = square.index();
        let len = self.cells.len();
        self.cells
            .get_mut(index)
            .ok_or(BingoError::SquareOutOfRange { index, len })
    }

    /// Cross off a square. Re-crossing is a distinct failure, not a no-op.
    pub fn mark(&mut self, square: Square) -> Result<()> {
        let cell = self.cell_mut(square)?;
        if cell.marked {
            return Err(BingoError::AlreadyMarked);
        }
        cell.marked = true;
        Ok(())
    }

    /// Un-cross a square. Never touches any declared win.
    pub fn unmark(&mut self, square: Square) -> Result<()> {
        let cell = self.cell_mut(square)?;
        if !cell.marked {
            return Err(BingoError::NotMarked);
        }
        cell.marked = false;
        Ok(())
    }

    /// Mark the center cell directly, regardless of current state. Used
    /// when the free space is pre-crossed at creation.
    pub fn mark_free_cell(&mut self) {
        self.cells[FREE_CELL_INDEX].marked = true;
    }

    /// True iff any of the 5 rows, 5 columns, or 2 diagonals is fully
    /// crossed off. A pure function of the 25 marked flags.
    pub fn check_win(&self) -> bool {
        let marked = |row: usize, col: usize| self.cells[row * GRID_SIZE + col].marked;

        let any_row = (0..GRID_SIZE).any(|r| (0..GRID_SIZE).all(|c| marked(r, c)));
        let any_col = (0..GRID_SIZE).any(|c| (0..GRID_SIZE).all(|r| marked(r, c)));
        let diagonal = (0..GRID_SIZE).all(|i| marked(i, i));
        let anti_diagonal = (0..GRID_SIZE).all(|i| marked(i, GRID_SIZE - 1 - i));

        any_row || any_col || diagonal || anti_diagonal
    }

    // --- Sheet encoding ---
    //
    // The persisted format is the compatibility format: a `# <label>`
    // line followed by 25 clue lines, crossed cells suffixed with " X".
    // The suffix exists only here; in memory `marked` is a plain bool.

    /// Decode a stored sheet. Wrong cell counts and missing label lines
    /// are corruption, rejected outright.
    pub fn from_sheet(text: &str) -> Result<Board> {
        let mut lines = text.lines();
        let label = match lines.next() {
            Some(first) if first.starts_with('#') => first[1..].trim().to_string(),
            _ => return Err(BingoError::BoardCorrupt("missing label line".into())),
        };
        let cells: Vec<Cell> = lines
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match line.strip_suffix(MARK_SUFFIX) {
                Some(text) => Cell {
                    text: text.to_string(),
                    marked: true,
                },
                None => Cell {
                    text: line.to_string(),
                    marked: false,
                },
            })
            .collect();
        if cells.len() != BOARD_CELLS {
            return Err(BingoError::BoardCorrupt(format!(
                "expected {} cells, found {}",
                BOARD_CELLS,
                cells.len()
            )));
        }
        Ok(Board { label, cells })
    }

    /// Encode for storage.
    pub fn to_sheet(&self) -> String {
        let mut out = format!("# {}\n", self.label);
        for cell in &self.cells {
            out.push_str(&cell.text);
            if cell.marked {
                out.push_str(MARK_SUFFIX);
            }
            out.push('\n');
        }
        out
    }
}

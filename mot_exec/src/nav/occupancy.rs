//! # Occupancy grid
//!
//! A fixed size field divided into equal rectangular cells, each either free or occupied. Cell
//! `(0, 0)` is in the corner at the field origin, with `x` counting columns along the field's X
//! axis and `y` counting rows along its Y axis.
//!
//! Grids are stored as text, one row of `0`/`1` characters per line with the top of the field
//! (largest `y`) first, so the file looks like the field seen from above:
//!
//! ```text
//! OCCUPANCY 1
//! 0000
//! 0110
//! 0000
//! ENDOCCUPANCY
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fs, path::Path as FsPath};

use conquer_once::Lazy;
use nalgebra::Vector2;
use regex::Regex;

use super::OccupancyError;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Version written to, and accepted from, the header line
pub const OCCUPANCY_FORMAT_VERSION: u32 = 1;

// ------------------------------------------------------------------------------------------------
// GLOBALS
// ------------------------------------------------------------------------------------------------

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^OCCUPANCY\s+(\d+)$").expect("occupancy header regex is valid")
});

static ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[01]+$").expect("occupancy row regex is valid"));

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Column and row of a grid cell.
pub type Cell = (usize, usize);

/// Free and occupied cells covering the field.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyGrid {
    num_cells: (usize, usize),
    field_size: Vector2<f64>,

    /// Occupied flags, row by row from `y = 0`
    occupied: Vec<bool>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OccupancyGrid {
    /// An entirely free grid of `width` by `height` cells covering a field of `field_size`.
    pub fn new(width: usize, height: usize, field_size: Vector2<f64>) -> Result<Self, OccupancyError> {
        if width == 0 || height == 0 {
            return Err(OccupancyError::EmptyGrid);
        }
        if !(field_size[0].is_finite()
            && field_size[1].is_finite()
            && field_size[0] > 0.0
            && field_size[1] > 0.0)
        {
            return Err(OccupancyError::InvalidFieldSize(field_size[0], field_size[1]));
        }

        Ok(Self {
            num_cells: (width, height),
            field_size,
            occupied: vec![false; width * height],
        })
    }

    /// Load a grid from an occupancy file.
    pub fn load<P: AsRef<FsPath>>(path: P, field_size: Vector2<f64>) -> Result<Self, OccupancyError> {
        let text = fs::read_to_string(path).map_err(OccupancyError::FileReadError)?;
        Self::parse(&text, field_size)
    }

    /// Parse a grid from the text of an occupancy file.
    pub fn parse(text: &str, field_size: Vector2<f64>) -> Result<Self, OccupancyError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

        let header = match lines.next() {
            Some((_, l)) => l,
            None => return Err(OccupancyError::InvalidHeader(String::new())),
        };
        let version: u32 = HEADER_RE
            .captures(header)
            .and_then(|c| c.get(1))
            .and_then(|v| v.as_str().parse().ok())
            .ok_or_else(|| OccupancyError::InvalidHeader(header.to_string()))?;
        if version != OCCUPANCY_FORMAT_VERSION {
            return Err(OccupancyError::UnsupportedVersion(version));
        }

        // Rows top first
        let mut rows: Vec<Vec<bool>> = Vec::new();
        let mut ended = false;

        while let Some((line, text)) = lines.next() {
            if text == "ENDOCCUPANCY" {
                if let Some((line, text)) = lines.next() {
                    return Err(OccupancyError::ParseError {
                        line,
                        msg: format!("unexpected data after ENDOCCUPANCY: {:?}", text),
                    });
                }
                ended = true;
                break;
            }

            if !ROW_RE.is_match(text) {
                return Err(OccupancyError::ParseError {
                    line,
                    msg: format!("rows may only contain 0 and 1, found {:?}", text),
                });
            }
            if let Some(first) = rows.first() {
                if first.len() != text.len() {
                    return Err(OccupancyError::ParseError {
                        line,
                        msg: format!(
                            "row has {} cells but the first row has {}",
                            text.len(),
                            first.len()
                        ),
                    });
                }
            }

            rows.push(text.chars().map(|c| c == '1').collect());
        }

        if !ended {
            return Err(OccupancyError::MissingEnd);
        }
        if rows.is_empty() {
            return Err(OccupancyError::EmptyGrid);
        }

        let height = rows.len();
        let mut grid = Self::new(rows[0].len(), height, field_size)?;
        for (r, row) in rows.iter().enumerate() {
            let y = height - 1 - r;
            for (x, &occ) in row.iter().enumerate() {
                grid.set_occupied((x, y), occ);
            }
        }

        Ok(grid)
    }

    /// Render the grid as the text of an occupancy file.
    pub fn to_file_string(&self) -> String {
        let (width, height) = self.num_cells;
        let mut out = format!("OCCUPANCY {}\n", OCCUPANCY_FORMAT_VERSION);

        for y in (0..height).rev() {
            let row: String = (0..width)
                .map(|x| if self.is_occupied((x, y)) { '1' } else { '0' })
                .collect();
            out.push_str(&row);
            out.push('\n');
        }

        out.push_str("ENDOCCUPANCY\n");
        out
    }

    /// Number of cells as `(columns, rows)`.
    pub fn num_cells(&self) -> (usize, usize) {
        self.num_cells
    }

    pub fn field_size(&self) -> Vector2<f64> {
        self.field_size
    }

    /// Size of a single cell in field units.
    pub fn cell_size(&self) -> Vector2<f64> {
        Vector2::new(
            self.field_size[0] / self.num_cells.0 as f64,
            self.field_size[1] / self.num_cells.1 as f64,
        )
    }

    /// True if the cell is occupied. Cells outside the grid count as occupied.
    pub fn is_occupied(&self, cell: Cell) -> bool {
        match self.index(cell) {
            Some(i) => self.occupied[i],
            None => true,
        }
    }

    /// Mark a cell as occupied or free. Cells outside the grid are ignored.
    pub fn set_occupied(&mut self, cell: Cell, occupied: bool) {
        if let Some(i) = self.index(cell) {
            self.occupied[i] = occupied;
        }
    }

    pub fn num_free(&self) -> usize {
        self.occupied.iter().filter(|o| !**o).count()
    }

    /// Field position of the centre of a cell.
    pub fn cell_centre(&self, cell: Cell) -> Vector2<f64> {
        let size = self.cell_size();
        Vector2::new(
            (cell.0 as f64 + 0.5) * size[0],
            (cell.1 as f64 + 0.5) * size[1],
        )
    }

    /// The cell containing a field position, clamped onto the grid if the position is off it.
    pub fn cell_at(&self, position: &Vector2<f64>) -> Cell {
        let size = self.cell_size();
        let clamp = |v: f64, n: usize| {
            if v.is_nan() || v < 0.0 {
                0
            } else {
                (v as usize).min(n - 1)
            }
        };

        (
            clamp(position[0] / size[0], self.num_cells.0),
            clamp(position[1] / size[1], self.num_cells.1),
        )
    }

    /// Flat index of a cell, `None` if it's off the grid.
    pub(crate) fn index(&self, cell: Cell) -> Option<usize> {
        if cell.0 < self.num_cells.0 && cell.1 < self.num_cells.1 {
            Some(cell.1 * self.num_cells.0 + cell.0)
        } else {
            None
        }
    }

    pub(crate) fn cell_of_index(&self, index: usize) -> Cell {
        (index % self.num_cells.0, index / self.num_cells.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const FIELD: &str = "
        OCCUPANCY 1
        # top row first
        0001
        0110
        0000
        ENDOCCUPANCY
    ";

    #[test]
    fn test_parse_orientation() {
        let grid = OccupancyGrid::parse(FIELD, Vector2::new(40.0, 30.0)).unwrap();

        assert_eq!(grid.num_cells(), (4, 3));
        assert!(grid.is_occupied((3, 2)));
        assert!(grid.is_occupied((1, 1)));
        assert!(grid.is_occupied((2, 1)));
        assert!(!grid.is_occupied((0, 0)));
        assert!(!grid.is_occupied((3, 0)));
        assert_eq!(grid.num_free(), 9);

        // Off the grid is never free
        assert!(grid.is_occupied((4, 0)));
    }

    #[test]
    fn test_geometry() {
        let grid = OccupancyGrid::new(4, 3, Vector2::new(40.0, 30.0)).unwrap();

        assert_eq!(grid.cell_size(), Vector2::new(10.0, 10.0));
        assert_eq!(grid.cell_centre((2, 1)), Vector2::new(25.0, 15.0));
        assert_eq!(grid.cell_at(&Vector2::new(25.0, 15.0)), (2, 1));
        assert_eq!(grid.cell_at(&Vector2::new(-5.0, 100.0)), (0, 2));
        assert_eq!(grid.cell_at(&Vector2::new(40.0, 0.0)), (3, 0));
    }

    #[test]
    fn test_file_string() {
        let grid = OccupancyGrid::parse(FIELD, Vector2::new(40.0, 30.0)).unwrap();
        let text = grid.to_file_string();
        assert_eq!(text, "OCCUPANCY 1\n0001\n0110\n0000\nENDOCCUPANCY\n");
        assert_eq!(OccupancyGrid::parse(&text, Vector2::new(40.0, 30.0)).unwrap(), grid);
    }

    #[test]
    fn test_errors() {
        let size = Vector2::new(1.0, 1.0);
        assert!(matches!(
            OccupancyGrid::parse("OCCUPANCY 1\n010\n01\nENDOCCUPANCY", size),
            Err(OccupancyError::ParseError { line: 3, .. })
        ));
        assert!(matches!(
            OccupancyGrid::parse("OCCUPANCY 1\n012\nENDOCCUPANCY", size),
            Err(OccupancyError::ParseError { .. })
        ));
        assert!(matches!(
            OccupancyGrid::parse("OCCUPANCY 1\n010\n", size),
            Err(OccupancyError::MissingEnd)
        ));
        assert!(matches!(
            OccupancyGrid::parse("OCCUPANCY 1\nENDOCCUPANCY", size),
            Err(OccupancyError::EmptyGrid)
        ));
        assert!(matches!(
            OccupancyGrid::parse("GRID 1\n0\nENDOCCUPANCY", size),
            Err(OccupancyError::InvalidHeader(_))
        ));
        assert!(matches!(
            OccupancyGrid::parse("OCCUPANCY 1\n0\nENDOCCUPANCY", Vector2::new(0.0, 1.0)),
            Err(OccupancyError::InvalidFieldSize(..))
        ));
    }
}

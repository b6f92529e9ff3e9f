//! # Navigation
//!
//! Plans collision free routes across the field. The field's obstacles are described by an
//! [`OccupancyGrid`], which the [`PathFinder`] searches with A* to produce a sequence of cells,
//! and from them control points for the path generator.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod occupancy;
mod path_finder;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use occupancy::{Cell, OccupancyGrid, OCCUPANCY_FORMAT_VERSION};
pub use path_finder::{octile_distance, FoundPath, PathFinder, PathFinderParams};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("The occupancy grid has no free cell near {0:?}")]
    NoFreeCell(Cell),

    #[error("No path exists between the start and target cells")]
    NoPathToTarget,

    #[error("Path search timed out after {elapsed_ms} ms having expanded {num_expanded} cells")]
    Timeout { elapsed_ms: u128, num_expanded: usize },

    #[error("Occupancy error: {0}")]
    OccupancyError(OccupancyError),
}

#[derive(Debug, thiserror::Error)]
pub enum OccupancyError {
    #[error("Could not read the occupancy file: {0}")]
    FileReadError(std::io::Error),

    #[error("The occupancy file does not start with a valid header, found {0:?}")]
    InvalidHeader(String),

    #[error("Unsupported occupancy file version {0}")]
    UnsupportedVersion(u32),

    #[error("Line {line}: {msg}")]
    ParseError { line: usize, msg: String },

    #[error("The occupancy file ended without an ENDOCCUPANCY record")]
    MissingEnd,

    #[error("An occupancy grid needs at least one cell")]
    EmptyGrid,

    #[error("The field size must be positive and finite, got {0} x {1}")]
    InvalidFieldSize(f64, f64),
}

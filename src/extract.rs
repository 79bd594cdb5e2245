pub mod emitter;
pub mod scanner;

pub use emitter::*;
pub use scanner::*;

use crate::model::{Grid, Metadata, OutputRecord};

/// Normalizes the grid, scans every column and flattens the routes found.
pub fn extract_records(grid: Grid, metadata: Option<&Metadata>) -> Vec<OutputRecord> {
    let grid = grid.normalize();
    emit(scan_columns(&grid), metadata)
}

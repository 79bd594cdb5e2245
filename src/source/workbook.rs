//! Excel workbooks (`.xlsx`, `.xls`). Only the first sheet is read.
//!
//! Cells keep the type the sheet gives them, so a text cell holding `12` stays a stop name
//! while a numeric `12` separates routes.
use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use itertools::Itertools;
use std::io::{Read, Seek};

use super::TableOptions;
use crate::model::{Cell, Grid};

/// Reads the first sheet of a workbook. A workbook without sheets gives an empty grid.
pub fn read_workbook<R: Read + Seek + Clone>(
    input: R,
    options: &TableOptions,
) -> Result<Grid, calamine::Error> {
    let mut workbook = open_workbook_auto_from_rs(input)?;

    match workbook.worksheet_range_at(0) {
        Some(range) => Ok(grid_from_range(&range?, options)),
        None => Ok(Grid::default()),
    }
}

/// `options` count rows from the top of the sheet, even when the used range starts lower.
pub fn grid_from_range(range: &Range<Data>, options: &TableOptions) -> Grid {
    let Some((first_row, first_column)) = range.start() else {
        return Grid::default();
    };
    let skip = options.leading_rows().saturating_sub(first_row as usize);

    let rows = range
        .rows()
        .skip(skip)
        .map(|row| {
            std::iter::repeat_n(Cell::Empty, first_column as usize)
                .chain(row.iter().map(cell_from_data))
                .collect_vec()
        })
        .collect_vec();

    Grid::from_rows(rows)
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(text) if text.is_empty() => Cell::Empty,
        Data::String(text) => Cell::Text(text.clone()),
        Data::Float(number) => Cell::Number(*number),
        Data::Int(number) => Cell::Number(*number as f64),
        // spreadsheets treat booleans as 0 and 1
        Data::Bool(flag) => Cell::Number(f64::from(u8::from(*flag))),
        other => Cell::Text(other.to_string()),
    }
}

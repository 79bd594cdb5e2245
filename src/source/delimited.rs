use itertools::Itertools;
use std::io::Read;

use super::TableOptions;
use crate::model::{Cell, Grid};

/// Reads a delimited export of a timetable sheet.
/// Rows may have different lengths and non UTF-8 bytes are replaced.
pub fn read_delimited<R: Read>(
    input: R,
    delimiter: u8,
    options: &TableOptions,
) -> Result<Grid, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(input);

    let rows: Vec<Vec<Cell>> = reader
        .byte_records()
        .skip(options.leading_rows())
        .map_ok(|record| {
            record
                .iter()
                .map(|field| Cell::from_raw(&String::from_utf8_lossy(field)))
                .collect_vec()
        })
        .try_collect()?;

    Ok(Grid::from_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::read_delimited;
    use crate::source::TableOptions;
    use crate::model::Cell;

    const SHEET: &str = "\
Bus schedule 2025,,,
Route,Gujarati,,Route
PT - 5,,,KT-7
Station A,સ્ટેશન એ,,Station C
Station B
12,,,
";

    #[test]
    fn skips_title_and_header_rows() -> Result<(), anyhow::Error> {
        let grid = read_delimited(SHEET.as_bytes(), b',', &TableOptions::default())?;

        assert_eq!(grid.row_count(), 4);
        assert_eq!(grid.column_count(), 4);
        assert_eq!(grid.cell(0, 0), &Cell::Text("PT - 5".to_string()));
        assert_eq!(grid.cell(1, 1), &Cell::Text("સ્ટેશન એ".to_string()));
        assert_eq!(grid.cell(2, 3), &Cell::Empty);
        assert_eq!(grid.cell(3, 0), &Cell::Number(12.0));

        Ok(())
    }

    #[test]
    fn reads_every_row_without_header_options() -> Result<(), anyhow::Error> {
        let options = TableOptions {
            skip_rows: 0,
            header_row: false,
        };

        let grid = read_delimited("a\tb\n1\t\n".as_bytes(), b'\t', &options)?;

        assert_eq!(grid.row_count(), 2);
        assert_eq!(grid.cell(0, 1), &Cell::Text("b".to_string()));
        assert_eq!(grid.cell(1, 0), &Cell::Number(1.0));
        assert_eq!(grid.cell(1, 1), &Cell::Empty);

        Ok(())
    }

    #[test]
    fn tolerates_invalid_utf8() -> Result<(), anyhow::Error> {
        let options = TableOptions {
            skip_rows: 0,
            header_row: false,
        };

        let grid = read_delimited(&b"PT - 1\nSt\xe9phane\n"[..], b',', &options)?;

        assert_eq!(grid.cell(1, 0), &Cell::Text("St\u{FFFD}phane".to_string()));

        Ok(())
    }
}

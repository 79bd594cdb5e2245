use itertools::Itertools;

use crate::utils::render_number;

/// A single cell of a loaded timetable sheet.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Best-effort coercion of a raw source value.
    ///
    /// Blank strings become [`Cell::Empty`], anything that parses as a finite number
    /// becomes [`Cell::Number`] and the rest is kept verbatim as [`Cell::Text`].
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }

        match trimmed.parse::<f64>() {
            // "nan" and "inf" parse as floats but are words in a timetable
            Ok(number) if number.is_finite() => Cell::Number(number),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// The trimmed text of the cell, `None` for blank cells.
    /// Numbers are rendered the way a spreadsheet shows them.
    pub fn text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Cell::Number(number) => Some(render_number(*number)),
        }
    }
}

/// Row major table of cells. Every row has the same width.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
    width: usize,
}

impl Grid {
    /// Builds a grid, padding short rows with [`Cell::Empty`].
    pub fn from_rows(mut rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);

        for row in rows.iter_mut() {
            row.resize(width, Cell::Empty);
        }

        Grid { rows, width }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.width == 0
    }

    /// Panics when the address is outside the grid.
    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        assert!(
            column < self.width,
            "column {column} is out of bounds for a grid {} wide",
            self.width
        );
        &self.rows[row][column]
    }

    /// Like [`Grid::cell`] but returns `None` outside the grid.
    pub fn get(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row)?.get(column)
    }

    /// Cells of one column from top to bottom. Panics when the column doesn't exist.
    pub fn column(&self, column: usize) -> impl Iterator<Item = &Cell> + '_ {
        (0..self.rows.len()).map(move |row| self.cell(row, column))
    }

    /// Drops the columns that are empty in every row, then the rows that are empty in every
    /// remaining column. Indices of the result are dense and start at 0.
    pub fn normalize(self) -> Grid {
        let kept_columns = (0..self.width)
            .filter(|&column| self.rows.iter().any(|row| !row[column].is_empty()))
            .collect_vec();

        let rows = self
            .rows
            .into_iter()
            .map(|mut row| {
                kept_columns
                    .iter()
                    .map(|&column| std::mem::take(&mut row[column]))
                    .collect_vec()
            })
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect_vec();

        if rows.is_empty() {
            return Grid::default();
        }

        Grid {
            rows,
            width: kept_columns.len(),
        }
    }
}

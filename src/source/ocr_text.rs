//! Text produced by OCR of a scanned timetable.
//!
//! Each line is a row. Columns are separated by a tab or by two or more spaces, which is how
//! layout preserving OCR output keeps the table apart.
//!
//! Cells are placed by their order on the line, not by their offset. Every tab starts a new
//! cell, so tab separated lines keep a blank cell in place. A blank cell between two runs of
//! spaces is lost and the cells to its right move one column left, where they can be taken
//! for the companion of the stop before them.
use itertools::Itertools;
use regex::Regex;
use std::sync::LazyLock;

use super::TableOptions;
use crate::model::{Cell, Grid};

static CELL_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t| {2,}").expect("cell gap regex is valid"));

pub fn read_ocr_text(text: &str, options: &TableOptions) -> Grid {
    let rows = text
        .lines()
        .skip(options.leading_rows())
        .map(|line| {
            CELL_GAP
                .split(line.trim_end())
                .map(Cell::from_raw)
                .collect_vec()
        })
        .collect_vec();

    Grid::from_rows(rows)
}

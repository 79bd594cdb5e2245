//! Walks the columns of a normalized grid and assembles route records.
//!
//! Every column is scanned on its own by a two state machine. A route header opens a route,
//! text cells after it are its stops and a number closes it. The stop's name in the second
//! language sits in the column to the right, on the same row.
use crate::model::{Cell, Grid, RouteCode, RouteRecord, stop_entry};

/// What a cell means to the scanner
#[derive(Debug, PartialEq)]
enum CellClass<'a> {
    Header(RouteCode),
    /// Numbers separate the blocks of a column
    Separator,
    Stop(&'a str),
    Blank,
}

impl<'a> CellClass<'a> {
    fn of(cell: &'a Cell) -> Self {
        if let Some(code) = RouteCode::classify(cell) {
            return CellClass::Header(code);
        }

        match cell {
            Cell::Empty => CellClass::Blank,
            Cell::Number(_) => CellClass::Separator,
            Cell::Text(text) => CellClass::Stop(text),
        }
    }
}

#[derive(Debug, Default)]
enum ScanState {
    #[default]
    NoOpenRoute,
    OpenRoute {
        code: RouteCode,
        stops: Vec<String>,
    },
}

/// Route assembler for a single column
#[derive(Debug, Default)]
struct ColumnScanner {
    state: ScanState,
    records: Vec<RouteRecord>,
}

impl ColumnScanner {
    /// `companion` is the cell on the same row in the next column, if there is one.
    fn feed(&mut self, cell: &Cell, companion: Option<&Cell>) {
        let state = std::mem::take(&mut self.state);

        self.state = match (state, CellClass::of(cell)) {
            // a header without stops is dropped when the next header shows up
            (ScanState::OpenRoute { code, stops }, CellClass::Header(next)) => {
                self.flush(code, stops);
                ScanState::OpenRoute {
                    code: next,
                    stops: vec![],
                }
            }
            (ScanState::NoOpenRoute, CellClass::Header(code)) => ScanState::OpenRoute {
                code,
                stops: vec![],
            },

            // the route is over even if stop-like text follows
            (ScanState::OpenRoute { code, stops }, CellClass::Separator) => {
                self.flush(code, stops);
                ScanState::NoOpenRoute
            }

            (ScanState::OpenRoute { code, mut stops }, CellClass::Stop(name)) => {
                let secondary = companion.and_then(Cell::text);
                stops.push(stop_entry(name, secondary.as_deref()));
                ScanState::OpenRoute { code, stops }
            }

            // a gap ends a route once it has stops; a gap right under the header doesn't
            (ScanState::OpenRoute { code, stops }, CellClass::Blank) if stops.is_empty() => {
                ScanState::OpenRoute { code, stops }
            }
            (ScanState::OpenRoute { code, stops }, CellClass::Blank) => {
                self.flush(code, stops);
                ScanState::NoOpenRoute
            }

            (
                ScanState::NoOpenRoute,
                CellClass::Separator | CellClass::Stop(_) | CellClass::Blank,
            ) => ScanState::NoOpenRoute,
        };
    }

    fn flush(&mut self, code: RouteCode, stops: Vec<String>) {
        if !stops.is_empty() {
            self.records.push(RouteRecord { code, stops });
        }
    }

    fn finish(mut self) -> Vec<RouteRecord> {
        if let ScanState::OpenRoute { code, stops } = std::mem::take(&mut self.state) {
            self.flush(code, stops);
        }
        self.records
    }
}

/// Routes of one column in the order they appear
pub fn scan_column(grid: &Grid, column: usize) -> Vec<RouteRecord> {
    let mut scanner = ColumnScanner::default();

    for (row, cell) in grid.column(column).enumerate() {
        scanner.feed(cell, grid.get(row, column + 1));
    }

    scanner.finish()
}

/// Routes of every column, left to right
pub fn scan_columns(grid: &Grid) -> Vec<Vec<RouteRecord>> {
    (0..grid.column_count())
        .map(|column| scan_column(grid, column))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{CellClass, scan_column, scan_columns};
    use crate::model::{Cell, Grid, RouteCode, RouteRecord};

    fn t(value: &str) -> Cell {
        Cell::Text(value.to_string())
    }

    fn n(value: f64) -> Cell {
        Cell::Number(value)
    }

    fn single_column(cells: Vec<Cell>) -> Grid {
        Grid::from_rows(cells.into_iter().map(|cell| vec![cell]).collect())
    }

    fn two_columns(cells: Vec<(Cell, Cell)>) -> Grid {
        Grid::from_rows(cells.into_iter().map(|(a, b)| vec![a, b]).collect())
    }

    fn route(code: RouteCode, stops: &[&str]) -> RouteRecord {
        RouteRecord {
            code,
            stops: stops.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn pt(digits: &str) -> RouteCode {
        RouteCode::Pt(digits.to_string())
    }

    #[test]
    fn classifies_cells() {
        assert_eq!(CellClass::of(&Cell::Empty), CellClass::Blank);
        assert_eq!(CellClass::of(&n(4.0)), CellClass::Separator);
        assert_eq!(CellClass::of(&t("PT-4")), CellClass::Header(pt("4")));
        assert_eq!(CellClass::of(&t("PT-4 road")), CellClass::Stop("PT-4 road"));
    }

    #[test]
    fn headers_numbers_and_stops() {
        let grid = single_column(vec![
            t("PT - 5"),
            t("Station A"),
            t("Station B"),
            n(12.0),
            t("KT-7"),
            t("Station C"),
        ]);

        assert_eq!(
            scan_column(&grid, 0),
            vec![
                route(pt("5"), &["station a", "station b"]),
                route(RouteCode::Kt("7".to_string()), &["station c"]),
            ]
        );
    }

    #[test]
    fn pu_route() {
        let grid = single_column(vec![t("PU Downtown Loop"), t("Main St")]);

        let routes = scan_column(&grid, 0);

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].code.to_string(), "PU Downtown Loop");
        assert_eq!(routes[0].stops, ["main st"]);
    }

    #[test]
    fn header_without_stops_is_dropped() {
        let grid = single_column(vec![t("PT - 1"), t("PT - 2"), t("Depot"), t("PT - 3")]);

        assert_eq!(scan_column(&grid, 0), vec![route(pt("2"), &["depot"])]);
    }

    #[test]
    fn column_without_headers_has_no_routes() {
        let grid = single_column(vec![t("Timetable"), t("Station A"), n(3.0), Cell::Empty]);

        assert!(scan_column(&grid, 0).is_empty());
    }

    #[test]
    fn number_closes_the_route_for_good() {
        let grid = single_column(vec![
            t("PT - 1"),
            t("A"),
            n(1.0),
            n(2.0),
            t("B"),
            t("C"),
        ]);

        assert_eq!(scan_column(&grid, 0), vec![route(pt("1"), &["a"])]);
    }

    #[test]
    fn number_discards_a_dangling_header() {
        let grid = single_column(vec![t("PT - 1"), n(7.0), t("A")]);

        assert!(scan_column(&grid, 0).is_empty());
    }

    #[test]
    fn text_above_the_first_header_is_ignored() {
        let grid = single_column(vec![t("Morning shift"), Cell::Empty, t("PT - 9"), t("A")]);

        assert_eq!(scan_column(&grid, 0), vec![route(pt("9"), &["a"])]);
    }

    #[test]
    fn blank_cell_after_stops_closes_the_route() {
        let grid = single_column(vec![
            t("PT - 1"),
            t("A"),
            Cell::Empty,
            t("B"),
            t("PT - 2"),
            Cell::Empty,
            t("C"),
        ]);

        assert_eq!(
            scan_column(&grid, 0),
            vec![route(pt("1"), &["a"]), route(pt("2"), &["c"])]
        );
    }

    #[test]
    fn attaches_the_companion_column() {
        let grid = two_columns(vec![
            (t("PT - 5"), Cell::Empty),
            (t(" Station A "), t(" સ્ટેશન એ ")),
            (t("Station B"), Cell::Empty),
            (t("Station C"), t("   ")),
            (t("Station D"), n(4.0)),
        ]);

        assert_eq!(
            scan_column(&grid, 0),
            vec![route(
                pt("5"),
                &["station a/સ્ટેશન એ", "station b", "station c", "station d/4"]
            )]
        );
    }

    #[test]
    fn companion_lookup_is_positional() {
        let grid = two_columns(vec![
            (t("PT - 5"), t("Station A")),
            (t("Station A"), Cell::Empty),
            (Cell::Empty, t("Station A")),
        ]);

        assert_eq!(scan_column(&grid, 0), vec![route(pt("5"), &["station a"])]);
    }

    #[test]
    fn columns_are_scanned_independently() {
        let grid = two_columns(vec![
            (t("PT - 1"), t("PT - 1")),
            (t("A"), t("B")),
        ]);

        assert_eq!(
            scan_columns(&grid),
            vec![
                vec![route(pt("1"), &["a/b"])],
                vec![route(pt("1"), &["b"])],
            ]
        );
    }

    #[test]
    fn scanning_is_deterministic() {
        let grid = two_columns(vec![
            (t("KT - 3"), t("PU Airport")),
            (t("A"), t("B")),
            (n(1.0), t("C")),
        ]);

        assert_eq!(scan_columns(&grid), scan_columns(&grid));
    }

    #[test]
    fn empty_grid_has_no_columns() {
        assert!(scan_columns(&Grid::default()).is_empty());
    }
}

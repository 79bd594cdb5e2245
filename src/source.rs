//! Loading timetable files into a [`Grid`]
pub mod delimited;
pub mod ocr_text;
pub mod workbook;

pub use delimited::*;
pub use ocr_text::*;
pub use workbook::*;

use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::model::Grid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceFormat {
    /// Excel workbook, first sheet
    Xlsx,
    /// Comma separated export of the sheet
    Csv,
    /// Tab separated export of the sheet
    Tsv,
    /// OCR output of a scanned timetable
    Text,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();

        match extension.as_str() {
            "xlsx" | "xls" => Some(SourceFormat::Xlsx),
            "csv" => Some(SourceFormat::Csv),
            "tsv" | "tab" => Some(SourceFormat::Tsv),
            "txt" => Some(SourceFormat::Text),
            _ => None,
        }
    }
}

/// Rows at the top of a sheet that are never scanned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TableOptions {
    /// Title rows above the table
    pub skip_rows: usize,
    /// Whether the first row after the title rows labels the columns
    pub header_row: bool,
}

impl TableOptions {
    pub fn leading_rows(&self) -> usize {
        self.skip_rows + usize::from(self.header_row)
    }
}

impl Default for TableOptions {
    fn default() -> Self {
        TableOptions {
            skip_rows: 1,
            header_row: true,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("couldn't read {}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("couldn't parse {} as a delimited table", .path.display())]
    Delimited { path: PathBuf, source: csv::Error },

    #[error("couldn't read {} as a workbook", .path.display())]
    Workbook {
        path: PathBuf,
        source: calamine::Error,
    },

    #[error("can't tell the table format of {} from its extension", .0.display())]
    UnknownFormat(PathBuf),
}

/// Loads a timetable file. `format` overrides the format inferred from the extension.
#[tracing::instrument(err, skip(options))]
pub fn load_grid(
    path: &Path,
    format: Option<SourceFormat>,
    options: &TableOptions,
) -> Result<Grid, SourceError> {
    let format = format
        .or_else(|| SourceFormat::from_path(path))
        .ok_or_else(|| SourceError::UnknownFormat(path.to_path_buf()))?;

    let bytes = std::fs::read(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let grid = match format {
        SourceFormat::Xlsx => {
            read_workbook(Cursor::new(bytes), options).map_err(|source| SourceError::Workbook {
                path: path.to_path_buf(),
                source,
            })?
        }
        SourceFormat::Csv | SourceFormat::Tsv => {
            let delimiter = if format == SourceFormat::Tsv { b'\t' } else { b',' };
            read_delimited(bytes.as_slice(), delimiter, options).map_err(|source| {
                SourceError::Delimited {
                    path: path.to_path_buf(),
                    source,
                }
            })?
        }
        SourceFormat::Text => read_ocr_text(&String::from_utf8_lossy(&bytes), options),
    };

    if grid.is_empty() {
        tracing::warn!("{} has no table below its title rows", path.display());
    } else {
        tracing::info!(
            rows = grid.row_count(),
            columns = grid.column_count(),
            "loaded {}",
            path.display()
        );
    }

    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::{SourceError, SourceFormat, TableOptions, load_grid};
    use std::path::Path;

    #[test]
    fn infers_format_from_extension() {
        assert_eq!(SourceFormat::from_path(Path::new("a/b.CSV")), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_path(Path::new("b.tsv")), Some(SourceFormat::Tsv));
        assert_eq!(SourceFormat::from_path(Path::new("scan.txt")), Some(SourceFormat::Text));
        assert_eq!(SourceFormat::from_path(Path::new("sheet.xlsx")), Some(SourceFormat::Xlsx));
        assert_eq!(SourceFormat::from_path(Path::new("old.XLS")), Some(SourceFormat::Xlsx));
        assert_eq!(SourceFormat::from_path(Path::new("scan.pdf")), None);
        assert_eq!(SourceFormat::from_path(Path::new("README")), None);
    }

    #[test]
    fn leading_rows() {
        assert_eq!(TableOptions::default().leading_rows(), 2);
        assert_eq!(
            TableOptions {
                skip_rows: 0,
                header_row: false
            }
            .leading_rows(),
            0
        );
    }

    #[test]
    fn unknown_format_is_an_error() {
        let res = load_grid(Path::new("timetable.pdf"), None, &TableOptions::default());

        assert!(matches!(res, Err(SourceError::UnknownFormat(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let res = load_grid(
            Path::new("/definitely/not/here.csv"),
            None,
            &TableOptions::default(),
        );

        assert!(matches!(res, Err(SourceError::Io { .. })));
    }

    #[test]
    fn a_sheet_that_isnt_a_workbook_is_an_error() -> Result<(), anyhow::Error> {
        let dir = std::env::temp_dir().join(format!("timetable_routes_src_{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("not_a_workbook.xlsx");
        std::fs::write(&path, "PT - 1\nDepot\n")?;

        let res = load_grid(&path, None, &TableOptions::default());

        assert!(matches!(res, Err(SourceError::Workbook { .. })));

        Ok(())
    }
}

use calamine::{Data, Reader, Xlsx, XlsxError, open_workbook};
use chrono::NaiveDate;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use thiserror::Error;

/// Why a workbook could not be turned into a grid.
///
/// Callers outside this crate usually collapse all variants into
/// "could not read this file"; the variants exist for logging.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not open workbook: {0}")]
    Open(#[from] XlsxError),
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("sheet '{0}' not found")]
    MissingSheet(String),
}

/// A single cell value, reduced to the shapes the extractor cares about.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl CellValue {
    /// Returns true for empty cells and for text that is only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed text rendering of the cell, `None` when blank.
    pub fn as_label(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        Some(self.to_string().trim().to_string())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::Bool(b) => CellValue::Text(b.to_string()),
            // as_datetime applies the workbook's 1900 or 1904 date system
            Data::DateTime(dt) if dt.is_datetime() => dt
                .as_datetime()
                .map(|t| CellValue::Date(t.date()))
                .unwrap_or(CellValue::Empty),
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        }
    }
}

/// An in-memory grid of cells for one sheet.
///
/// Coordinates are zero-based and absolute: `(0, 0)` is always cell A1, even
/// when the used range of the sheet starts further down or to the right.
/// Rows may have different lengths; reads past the end of a row are empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheetGrid {
    pub sheet_name: String,
    rows: Vec<Vec<CellValue>>,
}

static EMPTY: CellValue = CellValue::Empty;

impl SheetGrid {
    /// Build a grid directly from rows of cells.
    ///
    /// # Examples
    /// ```
    /// use price_dashboard::workbook::{CellValue, SheetGrid};
    ///
    /// let wb = SheetGrid::from_rows(
    ///     "Price Series",
    ///     vec![vec![CellValue::Text("Dates".into()), CellValue::Number(1.0)]],
    /// );
    /// assert_eq!(wb.height(), 1);
    /// assert_eq!(wb.width(), 2);
    /// assert_eq!(wb.cell(5, 5), &CellValue::Empty);
    /// ```
    pub fn from_rows(sheet_name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        SheetGrid {
            sheet_name: sheet_name.into(),
            rows,
        }
    }

    /// Open `sheet_name` from an `.xlsx` file on disk.
    ///
    /// # Arguments
    /// * `path` - Path to the workbook
    /// * `sheet_name` - Exact name of the sheet to read
    ///
    /// # Returns
    /// * `Result<SheetGrid, LoadError>` - The sheet as a grid, or why it could not be read
    ///
    /// # Examples
    /// ```no_run
    /// use price_dashboard::workbook::SheetGrid;
    ///
    /// match SheetGrid::open("data/hrc.xlsx", "Price Series") {
    ///     Ok(wb) => println!("{} rows", wb.height()),
    ///     Err(e) => eprintln!("could not read file: {}", e),
    /// }
    /// ```
    pub fn open(path: impl AsRef<Path>, sheet_name: &str) -> Result<Self, LoadError> {
        let mut workbook: Xlsx<BufReader<File>> = open_workbook(path)?;
        Self::read_sheet(&mut workbook, sheet_name)
    }

    /// Same as [`SheetGrid::open`] for a file already held in memory, e.g. an upload.
    pub fn from_bytes(bytes: &[u8], sheet_name: &str) -> Result<Self, LoadError> {
        let mut workbook = Xlsx::new(Cursor::new(bytes))?;
        Self::read_sheet(&mut workbook, sheet_name)
    }

    /// Read any `Read + Seek` source, e.g. a network stream buffered to a cursor.
    pub fn from_reader<R: Read + Seek>(reader: R, sheet_name: &str) -> Result<Self, LoadError> {
        let mut workbook = Xlsx::new(reader)?;
        Self::read_sheet(&mut workbook, sheet_name)
    }

    fn read_sheet<R: Read + Seek>(
        workbook: &mut Xlsx<R>,
        sheet_name: &str,
    ) -> Result<Self, LoadError> {
        if !workbook.sheet_names().iter().any(|name| name == sheet_name) {
            return Err(LoadError::MissingSheet(sheet_name.to_string()));
        }

        let range = workbook.worksheet_range(sheet_name)?;
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut rows = vec![Vec::new(); row_offset + range.height()];
        for (r, c, data) in range.cells() {
            let value = CellValue::from(data);
            if value == CellValue::Empty {
                continue;
            }
            let row = &mut rows[row_offset + r];
            let col = col_offset + c;
            if row.len() <= col {
                row.resize(col + 1, CellValue::Empty);
            }
            row[col] = value;
        }

        log::debug!(
            "read sheet '{}': {} rows, {} columns",
            sheet_name,
            rows.len(),
            rows.iter().map(Vec::len).max().unwrap_or(0)
        );

        Ok(SheetGrid {
            sheet_name: sheet_name.to_string(),
            rows,
        })
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell at `(row, col)`; out-of-range coordinates read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }
}

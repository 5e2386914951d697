//! One render pass: read every source, extract, merge, summarise.
//!
//! Nothing here survives between passes. Each call to [`Dashboard::render`]
//! reads its sources from scratch.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::extractor::SeriesExtractor;
use crate::series::{PricePoint, SeriesMap, merge_into};
use crate::window::TimeWindow;
use crate::workbook::{LoadError, SheetGrid};

pub const UNREADABLE_WARNING: &str = "could not read this file";
pub const EMPTY_WARNING: &str = "no price series found in this file";
pub const EMPTY_WINDOW_WARNING: &str = "no data from the selected window";

/// Somewhere a workbook can be read from.
#[derive(Clone, Debug)]
pub enum Source {
    File(PathBuf),
    /// A file supplied in memory, e.g. an upload.
    Bytes { name: String, bytes: Vec<u8> },
}

impl Source {
    pub fn name(&self) -> String {
        match self {
            Source::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Source::Bytes { name, .. } => name.clone(),
        }
    }

    fn load(&self, sheet_name: &str) -> Result<SheetGrid, LoadError> {
        match self {
            Source::File(path) => SheetGrid::open(path, sheet_name),
            Source::Bytes { bytes, .. } => SheetGrid::from_bytes(bytes, sheet_name),
        }
    }
}

/// `.xlsx` files in `dir`, sorted by file name.
///
/// Office lock files (`~$...`) and other extensions are ignored. A directory
/// that cannot be read yields no sources.
pub fn baseline_sources(dir: impl AsRef<Path>) -> Vec<Source> {
    let dir = dir.as_ref();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("baseline directory {} not readable: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_workbook_file(path))
        .collect();
    paths.sort();

    paths.into_iter().map(Source::File).collect()
}

fn is_workbook_file(path: &Path) -> bool {
    let is_lock = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"));
    let is_xlsx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
    is_xlsx && !is_lock
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Extracted { series: usize },
    NothingExtracted,
    Unreadable,
}

/// What happened to one source during a pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub outcome: Outcome,
}

impl SourceReport {
    pub fn is_usable(&self) -> bool {
        matches!(self.outcome, Outcome::Extracted { .. })
    }

    pub fn warning(&self) -> Option<&'static str> {
        match self.outcome {
            Outcome::Extracted { .. } => None,
            Outcome::NothingExtracted => Some(EMPTY_WARNING),
            Outcome::Unreadable => Some(UNREADABLE_WARNING),
        }
    }
}

impl fmt::Display for SourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.outcome, self.warning()) {
            (Outcome::Extracted { series }, _) => write!(f, "{}: {} series", self.name, series),
            (_, Some(warning)) => write!(f, "{}: {}", self.name, warning),
            (_, None) => write!(f, "{}", self.name),
        }
    }
}

/// Per-product view of a [`Snapshot`] over a time window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub name: String,
    /// Latest observation of the whole series, inside the window or not.
    pub latest: PricePoint,
    pub window: Vec<PricePoint>,
    /// Last minus first price inside the window.
    pub change: Option<f64>,
    pub change_pct: Option<f64>,
}

impl SeriesSummary {
    pub fn warning(&self) -> Option<&'static str> {
        self.window.is_empty().then_some(EMPTY_WINDOW_WARNING)
    }
}

/// Result of one render pass.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub series: SeriesMap,
    pub reports: Vec<SourceReport>,
}

impl Snapshot {
    pub fn unusable(&self) -> impl Iterator<Item = &SourceReport> {
        self.reports.iter().filter(|r| !r.is_usable())
    }

    /// Summaries in product-name order.
    pub fn summaries(&self, window: TimeWindow, today: NaiveDate) -> Vec<SeriesSummary> {
        self.series
            .iter()
            .filter_map(|(name, series)| {
                let latest = *series.latest()?;
                let points = series.within(window, today);
                let (change, change_pct) = match (points.first(), points.last()) {
                    (Some(first), Some(last)) if points.len() >= 2 => {
                        let change = last.price - first.price;
                        let pct = (first.price != 0.0).then(|| change / first.price * 100.0);
                        (Some(change), pct)
                    }
                    _ => (None, None),
                };
                Some(SeriesSummary {
                    name: name.clone(),
                    latest,
                    window: points,
                    change,
                    change_pct,
                })
            })
            .collect()
    }
}

/// Reads sources with one extractor and merges the results.
pub struct Dashboard<E> {
    extractor: E,
}

impl<E: SeriesExtractor> Dashboard<E> {
    pub fn new(extractor: E) -> Self {
        Dashboard { extractor }
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Extract one source. `render` turns the error into an `Unreadable`
    /// report and logs the cause.
    pub fn extract(&self, source: &Source) -> Result<SeriesMap, LoadError> {
        let workbook = source.load(self.extractor.sheet_name())?;
        Ok(self.extractor.extract(&workbook))
    }

    /// Like [`Dashboard::extract`], but an unusable source is logged and
    /// yields an empty map.
    pub fn extract_or_empty(&self, source: &Source) -> SeriesMap {
        self.extract(source).unwrap_or_else(|e| {
            log::warn!("{}: {} ({})", source.name(), UNREADABLE_WARNING, e);
            SeriesMap::new()
        })
    }

    /// Run a full pass over `sources` in order. Later sources win on date
    /// collisions, so pass the baseline first and fresh files last.
    ///
    /// # Examples
    /// ```no_run
    /// use price_dashboard::dashboard::{Dashboard, Source, baseline_sources};
    /// use price_dashboard::extractor::PriceSeriesLayout;
    ///
    /// let mut sources = baseline_sources("data");
    /// sources.push(Source::File("uploads/latest.xlsx".into()));
    ///
    /// let snapshot = Dashboard::new(PriceSeriesLayout::default()).render(&sources);
    /// for report in snapshot.unusable() {
    ///     eprintln!("{}", report);
    /// }
    /// ```
    pub fn render(&self, sources: &[Source]) -> Snapshot {
        let mut snapshot = Snapshot::default();

        for source in sources {
            let name = source.name();
            let outcome = match self.extract(source) {
                Ok(found) if found.is_empty() => {
                    log::warn!("{}: {}", name, EMPTY_WARNING);
                    Outcome::NothingExtracted
                }
                Ok(found) => {
                    log::debug!("{}: extracted {} series", name, found.len());
                    let series = found.len();
                    merge_into(&mut snapshot.series, found);
                    Outcome::Extracted { series }
                }
                Err(e) => {
                    log::warn!("{}: {} ({})", name, UNREADABLE_WARNING, e);
                    Outcome::Unreadable
                }
            };
            snapshot.reports.push(SourceReport { name, outcome });
        }

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Series;
    use std::fs::File;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    #[test]
    fn baseline_lists_only_workbooks_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.xlsx", "a.XLSX", "~$a.xlsx", "notes.txt", "c.csv"] {
            File::create(dir.path().join(name)).unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.xlsx")).unwrap();

        let names: Vec<String> = baseline_sources(dir.path()).iter().map(Source::name).collect();
        assert_eq!(names, vec!["a.XLSX", "b.xlsx"]);
    }

    #[test]
    fn missing_baseline_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(baseline_sources(dir.path().join("nope")).is_empty());
    }

    #[test]
    fn summaries_over_window() {
        let mut series = SeriesMap::new();
        let mut a = Series::new();
        a.push(d(1, 1), 100.0);
        a.push(d(1, 22), 110.0);
        a.push(d(1, 29), 121.0);
        series.insert("A".into(), a);
        let mut b = Series::new();
        b.push(d(1, 2), 50.0);
        series.insert("B".into(), b);

        let snapshot = Snapshot {
            series,
            reports: Vec::new(),
        };
        let summaries = snapshot.summaries(TimeWindow::Weeks(2), d(1, 29));

        assert_eq!(summaries.len(), 2);
        let a = &summaries[0];
        assert_eq!(a.latest, PricePoint::new(d(1, 29), 121.0));
        assert_eq!(a.window.len(), 2);
        assert_eq!(a.change, Some(11.0));
        assert!((a.change_pct.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(a.warning(), None);

        let b = &summaries[1];
        assert_eq!(b.latest, PricePoint::new(d(1, 2), 50.0));
        assert!(b.window.is_empty());
        assert_eq!(b.change, None);
        assert_eq!(b.warning(), Some(EMPTY_WINDOW_WARNING));
    }

    #[test]
    fn zero_first_price_has_no_percentage() {
        let mut series = SeriesMap::new();
        let mut a = Series::new();
        a.push(d(1, 20), 0.0);
        a.push(d(1, 27), 5.0);
        series.insert("A".into(), a);
        let snapshot = Snapshot {
            series,
            reports: Vec::new(),
        };

        let summary = &snapshot.summaries(TimeWindow::All, d(1, 29))[0];
        assert_eq!(summary.change, Some(5.0));
        assert_eq!(summary.change_pct, None);
    }

    #[test]
    fn report_display() {
        let ok = SourceReport {
            name: "hrc.xlsx".into(),
            outcome: Outcome::Extracted { series: 3 },
        };
        let bad = SourceReport {
            name: "broken.xlsx".into(),
            outcome: Outcome::Unreadable,
        };
        assert_eq!(ok.to_string(), "hrc.xlsx: 3 series");
        assert_eq!(bad.to_string(), "broken.xlsx: could not read this file");
        assert!(ok.is_usable());
        assert!(!bad.is_usable());
    }
}

/*!
# Price Dashboard

Commodity price series from vendor spreadsheet exports, built in Rust.

## Overview

Price reports arrive as `.xlsx` exports with a sheet called "Price Series".
This crate reads those files (a baseline directory plus any freshly supplied
files), pulls one daily price series per product out of each, merges them,
and reports or charts them over a selectable time window.

## Architecture

### Reading
- **workbook**: In-memory cell grid, loaded from a file path, bytes or a reader through `calamine`
- **values**: Date and price parsing for individual cells
- **extractor**: The `SeriesExtractor` trait and the fixed "Price Series" layout

### Combining
- **series**: Price points, series, and the merge rule (later source wins on a date)
- **window**: Time windows such as `4w`, `3m`, `1y`, `all`
- **dashboard**: One render pass over all sources with per-source reports and per-product summaries

### Output
- **chart**: Line charts rendered to PNG with `plotters` (feature `charts`)
- **export**: CSV and XLSX export of merged series

### Support
- **cache**: Time-to-live cache owned by its caller
- **rates**: Exchange-rate lookup with caching and a fallback rate
- **config**: JSON configuration with defaults for every field

## Layout

```text
row R-1            HRC Italy                 Scrap E3
row R      Dates   Low      High     Avg     Low      High     Avg
row R+1    date    ..       ..       price   ..       ..       price
```

The marker row is found by its first cell, names are read from the row above
(scanning upward past blanks), and only the `Avg` column of each group is kept.
A file that cannot be read, lacks the sheet, or has no marker row contributes
nothing and is reported as unusable.
*/

pub mod cache;
#[cfg(feature = "charts")]
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod export;
pub mod extractor;
pub mod rates;
pub mod series;
pub mod values;
pub mod window;
pub mod workbook;

/// Re-export the types most callers need
pub use config::DashboardConfig;
pub use dashboard::{Dashboard, Snapshot, Source, SourceReport, baseline_sources};
pub use extractor::{PriceSeriesLayout, SeriesExtractor};
pub use series::{PricePoint, Series, SeriesMap, merge_into};
pub use window::TimeWindow;
pub use workbook::{CellValue, LoadError, SheetGrid};

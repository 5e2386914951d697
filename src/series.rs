use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::window::TimeWindow;

/// One observation: the price of a product on a date.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        PricePoint { date, price }
    }
}

/// Price observations for one product.
///
/// Freshly extracted series keep the row order of the sheet they came from.
/// After [`Series::normalize`] (or [`merge_into`]) dates are unique and ascending.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    points: Vec<PricePoint>,
}

/// Product name to series, iterated in name order.
pub type SeriesMap = BTreeMap<String, Series>;

impl Series {
    pub fn new() -> Self {
        Series { points: Vec::new() }
    }

    pub fn from_points(points: Vec<PricePoint>) -> Self {
        Series { points }
    }

    pub fn push(&mut self, date: NaiveDate, price: f64) {
        self.points.push(PricePoint { date, price });
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sort by date and keep only the last observation for each date.
    ///
    /// "Last" is positional: whichever point appears later in the series wins,
    /// so appending a newer source and normalising gives the newer source priority.
    pub fn normalize(&mut self) {
        let by_date: BTreeMap<NaiveDate, f64> =
            self.points.iter().map(|p| (p.date, p.price)).collect();
        self.points = by_date
            .into_iter()
            .map(|(date, price)| PricePoint { date, price })
            .collect();
    }

    /// Most recent observation by date. Ties go to the later point.
    pub fn latest(&self) -> Option<&PricePoint> {
        self.points
            .iter()
            .fold(None, |best: Option<&PricePoint>, p| match best {
                Some(b) if b.date > p.date => Some(b),
                _ => Some(p),
            })
    }

    /// Points inside `window` relative to `today`, in series order.
    pub fn within(&self, window: TimeWindow, today: NaiveDate) -> Vec<PricePoint> {
        self.points
            .iter()
            .filter(|p| window.contains(p.date, today))
            .copied()
            .collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.iter().map(|p| p.date).min()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.iter().map(|p| p.date).max()
    }
}

/// Merge `incoming` into `acc`.
///
/// For a product present in both, the rows are concatenated with `incoming`
/// last, deduplicated by date keeping the `incoming` value, and sorted by date.
/// Every series touched by the merge comes out normalised. Empty incoming
/// series are ignored, so no product is added without points.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use price_dashboard::series::{merge_into, Series, SeriesMap};
///
/// let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
/// let mut baseline = SeriesMap::new();
/// let mut a = Series::new();
/// a.push(d(1), 10.0);
/// a.push(d(8), 11.0);
/// baseline.insert("A".to_string(), a);
///
/// let mut upload = SeriesMap::new();
/// let mut a = Series::new();
/// a.push(d(8), 99.0);
/// a.push(d(15), 12.0);
/// upload.insert("A".to_string(), a);
///
/// merge_into(&mut baseline, upload);
/// let prices: Vec<f64> = baseline["A"].points().iter().map(|p| p.price).collect();
/// assert_eq!(prices, vec![10.0, 99.0, 12.0]);
/// ```
pub fn merge_into(acc: &mut SeriesMap, incoming: SeriesMap) {
    for (name, series) in incoming {
        if series.is_empty() {
            continue;
        }
        let merged = acc.entry(name).or_default();
        merged.points.extend(series.points);
        merged.normalize();
    }
}

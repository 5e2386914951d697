#![cfg(not(tarpaulin_include))]
#![cfg(feature = "charts")]
use chrono::{Datelike, NaiveDate};
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::io::Cursor;
use std::ops::Range;
use std::path::Path;
use thiserror::Error;

use crate::series::PricePoint;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("nothing to plot")]
    NoData,
    #[error("drawing failed: {0}")]
    Drawing(String),
    #[error("could not encode image: {0}")]
    Encode(#[from] image::ImageError),
}

fn drawing_error<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Drawing(e.to_string())
}

/// A named line on a chart.
#[derive(Clone, Copy, Debug)]
pub struct ChartSeries<'a> {
    pub name: &'a str,
    pub points: &'a [PricePoint],
}

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the date axis
    pub x_label: String,

    /// Label for the price axis
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "Price Trends".to_string(),
            x_label: "Date".to_string(),
            y_label: "Price".to_string(),
            width: 1000,
            height: 500,
        }
    }
}

/// Axis ranges for a set of series: days since the common era on x, price on y.
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    pub x: Range<f64>,
    pub y: Range<f64>,
}

fn day_number(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

fn day_label(x: f64) -> String {
    NaiveDate::from_num_days_from_ce_opt(x.round() as i32)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Compute axis ranges, or `None` when there is no point at all.
///
/// A single date is widened by one day on each side. The price range is padded
/// by 5% of its span, or by 1 for a flat line.
pub fn bounds(series: &[ChartSeries]) -> Option<Bounds> {
    let points = || series.iter().flat_map(|s| s.points.iter());

    let first = points().next()?;
    let (mut min_x, mut max_x) = (first.date, first.date);
    let (mut min_y, mut max_y) = (first.price, first.price);
    for p in points() {
        min_x = min_x.min(p.date);
        max_x = max_x.max(p.date);
        min_y = min_y.min(p.price);
        max_y = max_y.max(p.price);
    }

    let (mut x0, mut x1) = (day_number(min_x), day_number(max_x));
    if x0 == x1 {
        x0 -= 1.0;
        x1 += 1.0;
    }

    let span = max_y - min_y;
    let pad = if span == 0.0 { 1.0 } else { span * 0.05 };

    Some(Bounds {
        x: x0..x1,
        y: min_y - pad..max_y + pad,
    })
}

fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    series: &[ChartSeries],
    bounds: Bounds,
    options: &ChartOptions,
) -> Result<(), ChartError> {
    root.fill(&WHITE).map_err(drawing_error)?;

    let mut chart = ChartBuilder::on(root)
        .caption(&options.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(bounds.x, bounds.y)
        .map_err(drawing_error)?;

    chart
        .configure_mesh()
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .x_labels(8)
        .x_label_formatter(&|x: &f64| day_label(*x))
        .draw()
        .map_err(drawing_error)?;

    for (idx, line) in series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        let mut data: Vec<(f64, f64)> = line
            .points
            .iter()
            .map(|p| (day_number(p.date), p.price))
            .collect();
        data.sort_by(|a, b| a.0.total_cmp(&b.0));

        chart
            .draw_series(LineSeries::new(data, color.stroke_width(2)))
            .map_err(drawing_error)?
            .label(line.name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    if series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(drawing_error)?;
    }

    root.present().map_err(drawing_error)?;
    Ok(())
}

fn plottable<'a>(series: &'a [ChartSeries<'a>]) -> Vec<ChartSeries<'a>> {
    series.iter().filter(|s| !s.points.is_empty()).copied().collect()
}

/// Render one line per series on a shared date axis and return PNG bytes.
///
/// Series without points are left out; if nothing is left the result is
/// [`ChartError::NoData`].
///
/// # Examples
/// ```no_run
/// use chrono::NaiveDate;
/// use price_dashboard::chart::{ChartOptions, ChartSeries, render_line_chart};
/// use price_dashboard::series::PricePoint;
///
/// let points = vec![
///     PricePoint::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 527.5),
///     PricePoint::new(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(), 532.5),
/// ];
/// let png = render_line_chart(
///     &[ChartSeries { name: "HRC Italy", points: &points }],
///     &ChartOptions::default(),
/// )
/// .unwrap();
/// std::fs::write("hrc.png", png).unwrap();
/// ```
pub fn render_line_chart(
    series: &[ChartSeries],
    options: &ChartOptions,
) -> Result<Vec<u8>, ChartError> {
    let series = plottable(series);
    let bounds = bounds(&series).ok_or(ChartError::NoData)?;

    let mut buffer = vec![0u8; options.width as usize * options.height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (options.width, options.height))
            .into_drawing_area();
        draw_chart(&root, &series, bounds, options)?;
    }

    let image = RgbImage::from_raw(options.width, options.height, buffer)
        .ok_or_else(|| ChartError::Drawing("pixel buffer has the wrong size".to_string()))?;
    let mut png = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;
    Ok(png)
}

/// Render straight to an image file; the format follows the extension.
pub fn save_line_chart(
    series: &[ChartSeries],
    options: &ChartOptions,
    path: impl AsRef<Path>,
) -> Result<(), ChartError> {
    let series = plottable(series);
    let bounds = bounds(&series).ok_or(ChartError::NoData)?;

    let root = BitMapBackend::new(path.as_ref(), (options.width, options.height)).into_drawing_area();
    draw_chart(&root, &series, bounds, options)
}

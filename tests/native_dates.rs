use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use price_dashboard::{Dashboard, PriceSeriesLayout, Snapshot, Source};

fn d(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

/// One product whose date column holds serial numbers, formatted as dates
/// when `date_format` is given.
fn serial_dated_xlsx(rows: &[(f64, f64)], date_format: Option<&Format>) -> Vec<u8> {
    let mut workbook = XlsxWorkbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("Price Series").unwrap();

    worksheet.write_string(0, 1, "HRC").unwrap();
    worksheet.write_string(1, 0, "Dates").unwrap();
    worksheet.write_string(1, 1, "Low").unwrap();
    worksheet.write_string(1, 2, "High").unwrap();
    worksheet.write_string(1, 3, "Avg").unwrap();
    for (i, &(serial, avg)) in rows.iter().enumerate() {
        let r = 2 + i as u32;
        match date_format {
            Some(format) => worksheet.write_number_with_format(r, 0, serial, format).unwrap(),
            None => worksheet.write_number(r, 0, serial).unwrap(),
        };
        worksheet.write_number(r, 3, avg).unwrap();
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer().unwrap()
}

/// Rewrite the package so the workbook uses the 1904 date system.
fn with_1904_dates(xlsx: &[u8]) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(xlsx)).unwrap();
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let name = file.name().to_string();
        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();

        if name == "xl/workbook.xml" {
            let xml = String::from_utf8(content).unwrap();
            assert!(xml.contains("<workbookPr"));
            content = xml
                .replacen("<workbookPr", "<workbookPr date1904=\"1\"", 1)
                .into_bytes();
        }

        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(&content).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

fn render(bytes: Vec<u8>) -> Snapshot {
    Dashboard::new(PriceSeriesLayout::default()).render(&[Source::Bytes {
        name: "export.xlsx".to_string(),
        bytes,
    }])
}

fn prices(snapshot: &Snapshot) -> Vec<(NaiveDate, f64)> {
    snapshot.series["HRC"]
        .points()
        .iter()
        .map(|p| (p.date, p.price))
        .collect()
}

#[test]
fn formatted_date_cells() {
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let bytes = serial_dated_xlsx(&[(45299.0, 1234.5), (45306.0, 1300.0)], Some(&date_format));

    assert_eq!(
        prices(&render(bytes)),
        vec![(d(1, 8), 1234.5), (d(1, 15), 1300.0)]
    );
}

#[test]
fn unformatted_serial_numbers() {
    let bytes = serial_dated_xlsx(&[(45292.0, 527.5), (45299.0, 532.0)], None);

    assert_eq!(
        prices(&render(bytes)),
        vec![(d(1, 1), 527.5), (d(1, 8), 532.0)]
    );
}

#[test]
fn formatted_dates_in_a_1904_workbook() {
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let bytes = serial_dated_xlsx(&[(43830.0, 545.0), (43837.0, 550.0)], Some(&date_format));

    assert_eq!(
        prices(&render(with_1904_dates(&bytes))),
        vec![(d(1, 1), 545.0), (d(1, 8), 550.0)]
    );
}

use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;

use crate::key::slug;
use crate::view::StudentViewModel;

pub const EXPORT_HEADERS: [&str; 9] = [
    "Name",
    "Call Number",
    "Course",
    "University",
    "Unit",
    "Gender",
    "City",
    "Favorite",
    "Status",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write spreadsheet: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

/// One spreadsheet line, fields in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub name: String,
    pub call_number: u32,
    pub course: String,
    pub university: String,
    pub unit: String,
    pub gender: String,
    pub city: String,
    pub favorite: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell<'a> {
    Text(&'a str),
    Number(u32),
}

impl fmt::Display for Cell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(value) => f.write_str(value),
            Cell::Number(value) => write!(f, "{value}"),
        }
    }
}

impl ExportRow {
    /// Cells under `EXPORT_HEADERS`, one per column.
    pub fn cells(&self) -> [Cell<'_>; 9] {
        [
            Cell::Text(&self.name),
            Cell::Number(self.call_number),
            Cell::Text(&self.course),
            Cell::Text(&self.university),
            Cell::Text(&self.unit),
            Cell::Text(&self.gender),
            Cell::Text(&self.city),
            Cell::Text(&self.favorite),
            Cell::Text(&self.status),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }
}

pub fn export_rows(rows: &[StudentViewModel]) -> Vec<ExportRow> {
    rows.iter()
        .map(|row| ExportRow {
            name: row.name.clone(),
            call_number: row.chamada,
            course: row.course.clone(),
            university: row.university.clone(),
            unit: row.campus.clone(),
            gender: row.genero.label().to_string(),
            city: row.city.clone(),
            favorite: if row.is_favorited { "Yes" } else { "No" }.to_string(),
            status: row.status.label().to_string(),
        })
        .collect()
}

/// `calouros-<city>-<YYYY-MM-DD>.<ext>`
pub fn export_file_name(city: &str, date: NaiveDate, format: ExportFormat) -> String {
    format!(
        "calouros-{}-{}.{}",
        slug(city),
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

pub fn write_xlsx(rows: &[ExportRow], path: &Path) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Calouros")?;

    for (col, title) in EXPORT_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let line = index as u32 + 1;
        for (col, cell) in row.cells().into_iter().enumerate() {
            match cell {
                Cell::Text(value) => sheet.write_string(line, col as u16, value)?,
                Cell::Number(value) => sheet.write_number(line, col as u16, value)?,
            };
        }
    }

    sheet.autofit();
    workbook.save(path)?;
    Ok(())
}

pub fn write_csv(rows: &[ExportRow], path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(EXPORT_HEADERS)?;
    for row in rows {
        writer.write_record(row.cells().iter().map(Cell::to_string))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_export(
    rows: &[ExportRow],
    path: &Path,
    format: ExportFormat,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Xlsx => write_xlsx(rows, path),
        ExportFormat::Csv => write_csv(rows, path),
    }
}

//! Row parser: turns an accepted upload file into ordered [`UploadRow`]s.
//!
//! The header row decides which column feeds which field. Header problems
//! (missing required columns, unknown or duplicated columns, blank cells)
//! are collected and reported once, before any data row is looked at. Data
//! rows with the wrong number of cells are kept, with an error attached, so
//! the preview can show exactly what was wrong with them.

use crate::intake::{FileFormat, FileUpload};
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use common::model::upload_row::UploadRow;
use displaydoc::Display;
use log::debug;
use regex::Regex;
use std::error::Error as StdError;
use std::fmt;
use std::io::Cursor;
use std::sync::LazyLock;

/// Header cells may only contain letters, marks, digits, spaces, `-`, `_`.
static HEADER_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{M}\p{N}\s\-_]+$").expect("header cell pattern is valid")
});

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A column of the upload file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    CampusName,
    CourseName,
    StudentName,
    RollNumber,
    Email,
    MobileNumber,
}

impl Field {
    /// Template column order.
    pub const ALL: [Field; 6] = [
        Field::CampusName,
        Field::CourseName,
        Field::StudentName,
        Field::RollNumber,
        Field::Email,
        Field::MobileNumber,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::CampusName => "Campus Name",
            Field::CourseName => "Course Name",
            Field::StudentName => "Student Name",
            Field::RollNumber => "Roll Number",
            Field::Email => "Email",
            Field::MobileNumber => "Mobile Number",
        }
    }

    fn from_key(key: &str) -> Option<Field> {
        match key {
            "campus_name" | "campus" => Some(Field::CampusName),
            "course_name" | "course" => Some(Field::CourseName),
            "student_name" | "name" | "full_name" => Some(Field::StudentName),
            "roll_number" | "roll_no" | "roll" => Some(Field::RollNumber),
            "email" | "email_address" | "email_id" => Some(Field::Email),
            "mobile_number" | "mobile" | "mobile_no" | "phone" | "phone_number" => {
                Some(Field::MobileNumber)
            }
            _ => None,
        }
    }

    fn assign(self, row: &mut UploadRow, value: String) {
        match self {
            Field::CampusName => row.campus_name = value,
            Field::CourseName => row.course_name = value,
            Field::StudentName => row.student_name = value,
            Field::RollNumber => row.roll_number = value,
            Field::Email => row.email = value,
            Field::MobileNumber => row.mobile_number = value,
        }
    }
}

/// Everything wrong with a header row, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderProblems {
    pub missing: Vec<&'static str>,
    pub unrecognized: Vec<String>,
    pub duplicated: Vec<String>,
    /// 1-based positions of blank header cells.
    pub blank: Vec<usize>,
}

impl HeaderProblems {
    fn is_empty(&self) -> bool {
        self.missing.is_empty()
            && self.unrecognized.is_empty()
            && self.duplicated.is_empty()
            && self.blank.is_empty()
    }
}

impl fmt::Display for HeaderProblems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing columns: {}", self.missing.join(", ")));
        }
        if !self.unrecognized.is_empty() {
            parts.push(format!("unrecognized columns: {}", self.unrecognized.join(", ")));
        }
        if !self.duplicated.is_empty() {
            parts.push(format!("duplicated columns: {}", self.duplicated.join(", ")));
        }
        if !self.blank.is_empty() {
            let positions: Vec<String> = self.blank.iter().map(|p| p.to_string()).collect();
            parts.push(format!("blank header cells at positions {}", positions.join(", ")));
        }
        f.write_str(&parts.join("; "))
    }
}

#[derive(Debug, Display)]
pub enum ParseError {
    /// Invalid header row ({0})
    Header(HeaderProblems),
    /// The file has no header row
    NoHeader,
    /// The file is not valid UTF-8 text
    Encoding,
    /// Could not read CSV: {0}
    Csv(csv::Error),
    /// Could not read spreadsheet: {0}
    Workbook(String),
}

impl StdError for ParseError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ParseError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

/// One raw line of the source: 1-based line number and its cells.
type Record = (usize, Vec<String>);

/// Parses an upload into rows, in file order.
///
/// `require_mobile` makes the mobile number column mandatory in the header.
pub fn parse_upload(upload: &FileUpload, require_mobile: bool) -> Result<Vec<UploadRow>, ParseError> {
    let records = match upload.format {
        FileFormat::Csv => read_csv_records(&upload.bytes)?,
        FileFormat::Xlsx => read_xlsx_records(&upload.bytes)?,
    };
    let rows = rows_from_records(records, require_mobile)?;
    debug!("parsed {} rows from {}", rows.len(), upload.file_name);
    Ok(rows)
}

fn read_csv_records(bytes: &[u8]) -> Result<Vec<Record>, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| {
            if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) {
                ParseError::Encoding
            } else {
                ParseError::Csv(e)
            }
        })?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(records.len() + 1);
        records.push((line, record.iter().map(normalize_cell).collect()));
    }
    Ok(records)
}

fn read_xlsx_records(bytes: &[u8]) -> Result<Vec<Record>, ParseError> {
    let mut workbook: Xlsx<Cursor<Vec<u8>>> = open_workbook_from_rs::<Xlsx<Cursor<Vec<u8>>>, _>(Cursor::new(bytes.to_vec()))
        .map_err(|e| ParseError::Workbook(e.to_string()))?;
    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ParseError::Workbook("the workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|e| ParseError::Workbook(e.to_string()))?;

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    Ok(range
        .rows()
        .enumerate()
        .map(|(idx, cells)| {
            let values = cells.iter().map(|c| normalize_cell(&cell_text(c))).collect();
            (first_row + idx + 1, values)
        })
        .collect())
}

/// Spreadsheets store roll and phone numbers as floats; `1001.0` reads as `1001`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

fn normalize_cell(cell: &str) -> String {
    cell.replace('\u{00A0}', " ").trim().to_string()
}

fn header_key(cell: &str) -> String {
    let mut key = String::with_capacity(cell.len());
    for ch in cell.chars() {
        if ch.is_alphanumeric() {
            key.extend(ch.to_lowercase());
        } else if !key.ends_with('_') {
            key.push('_');
        }
    }
    key.trim_matches('_').to_string()
}

/// Maps each header cell to a field, or reports every problem at once.
fn map_header(cells: &[String], require_mobile: bool) -> Result<Vec<Option<Field>>, HeaderProblems> {
    // Spreadsheet exports often pad the header with empty trailing cells.
    let width = cells
        .iter()
        .rposition(|c| !c.is_empty())
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut problems = HeaderProblems::default();
    let mut columns = Vec::with_capacity(width);
    for (idx, cell) in cells[..width].iter().enumerate() {
        if cell.is_empty() {
            problems.blank.push(idx + 1);
            columns.push(None);
            continue;
        }
        let field = if HEADER_CELL.is_match(cell) {
            Field::from_key(&header_key(cell))
        } else {
            None
        };
        match field {
            Some(f) if columns.contains(&Some(f)) => problems.duplicated.push(cell.clone()),
            Some(_) => {}
            None => problems.unrecognized.push(cell.clone()),
        }
        columns.push(field);
    }

    for field in Field::ALL {
        let required = field != Field::MobileNumber || require_mobile;
        if required && !columns.contains(&Some(field)) {
            problems.missing.push(field.label());
        }
    }

    if problems.is_empty() {
        Ok(columns)
    } else {
        Err(problems)
    }
}

fn rows_from_records(records: Vec<Record>, require_mobile: bool) -> Result<Vec<UploadRow>, ParseError> {
    let mut records = records.into_iter();
    let (_, header) = records.next().ok_or(ParseError::NoHeader)?;
    if header.iter().all(|c| c.is_empty()) {
        return Err(ParseError::NoHeader);
    }
    let columns = map_header(&header, require_mobile).map_err(ParseError::Header)?;
    let width = columns.len();

    let mut rows = Vec::new();
    for (line, cells) in records {
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }

        let mut row = UploadRow {
            row: Some(line),
            ..UploadRow::default()
        };
        for (cell, column) in cells.iter().zip(columns.iter()) {
            if let Some(field) = column {
                field.assign(&mut row, cell.clone());
            }
        }

        let overflow = cells.iter().skip(width).any(|c| !c.is_empty());
        if cells.len() < width || overflow {
            let found = cells.iter().rposition(|c| !c.is_empty()).map(|i| i + 1).unwrap_or(0);
            row.errors.push(format!(
                "Expected {} columns but found {}",
                width,
                if overflow { found } else { cells.len() }
            ));
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::{parse_upload, Field, ParseError};
    use crate::intake::FileUpload;

    const HEADER: &str = "Campus Name,Course Name,Student Name,Roll Number,Email,Mobile Number\n";

    fn csv(body: &str) -> FileUpload {
        FileUpload::from_bytes("roster.csv", format!("{}{}", HEADER, body).into_bytes()).unwrap()
    }

    #[test]
    fn keeps_file_order_and_line_numbers() {
        let upload = csv(
            "North,GRE,Ana Ruiz,R1,ana@example.com,555 0101\n\
             North,GRE,Bo Chen,R2,bo@example.com,555 0102\n\
             South,GMAT,Cy Diaz,R3,cy@example.com,\n",
        );
        let rows = parse_upload(&upload, false).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.student_name.as_str()).collect();
        assert_eq!(names, vec!["Ana Ruiz", "Bo Chen", "Cy Diaz"]);
        assert_eq!(rows[0].row, Some(2));
        assert_eq!(rows[2].row, Some(4));
        assert!(rows.iter().all(|r| r.errors.is_empty()));
    }

    #[test]
    fn skips_blank_rows_and_strips_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(HEADER.as_bytes());
        bytes.extend_from_slice(b",,,,,\nNorth,GRE,Ana,R1,ana@example.com,1\n\n");
        let upload = FileUpload::from_bytes("roster.csv", bytes).unwrap();
        let rows = parse_upload(&upload, false).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].campus_name, "North");
    }

    #[test]
    fn header_matching_ignores_case_and_punctuation() {
        let upload = FileUpload::from_bytes(
            "roster.csv",
            b"email,ROLL-NUMBER,student_name,Course Name,campus name\n\
              ana@example.com,R1,Ana,GRE,North\n"
                .to_vec(),
        )
        .unwrap();
        let rows = parse_upload(&upload, false).unwrap();
        assert_eq!(rows[0].roll_number, "R1");
        assert_eq!(rows[0].campus_name, "North");
        assert_eq!(rows[0].mobile_number, "");
    }

    #[test]
    fn header_problems_are_reported_once() {
        let upload = FileUpload::from_bytes(
            "roster.csv",
            b"Campus Name,Student Name,Student Name,Shoe Size,,Email\nA,B,C,D,E,F\n".to_vec(),
        )
        .unwrap();
        match parse_upload(&upload, true) {
            Err(ParseError::Header(problems)) => {
                assert_eq!(
                    problems.missing,
                    vec![
                        Field::CourseName.label(),
                        Field::RollNumber.label(),
                        Field::MobileNumber.label()
                    ]
                );
                assert_eq!(problems.unrecognized, vec!["Shoe Size"]);
                assert_eq!(problems.duplicated, vec!["Student Name"]);
                assert_eq!(problems.blank, vec![5]);
            }
            other => panic!("expected header error, got {:?}", other),
        }
    }

    #[test]
    fn short_and_long_rows_are_kept_with_errors() {
        let upload = csv(
            "North,GRE,Ana,R1\n\
             North,GRE,Bo,R2,bo@example.com,1,extra\n\
             North,GRE,Cy,R3,cy@example.com,2,\n",
        );
        let rows = parse_upload(&upload, false).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].errors, vec!["Expected 6 columns but found 4"]);
        assert_eq!(rows[0].roll_number, "R1");
        assert_eq!(rows[1].errors, vec!["Expected 6 columns but found 7"]);
        assert!(rows[2].errors.is_empty());
    }

    #[test]
    fn quoted_cells_keep_commas() {
        let upload = csv("North,GRE,\"Ruiz, Ana\",R1,ana@example.com,\u{00A0}555\n");
        let rows = parse_upload(&upload, false).unwrap();
        assert_eq!(rows[0].student_name, "Ruiz, Ana");
        assert_eq!(rows[0].mobile_number, "555");
    }

    #[test]
    fn header_only_file_has_no_rows_and_empty_file_has_no_header() {
        assert!(parse_upload(&csv(""), false).unwrap().is_empty());
        let blank = FileUpload::from_bytes("roster.csv", b"\n\n".to_vec()).unwrap();
        assert!(matches!(parse_upload(&blank, false), Err(ParseError::NoHeader)));
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let mut bytes = HEADER.as_bytes().to_vec();
        bytes.extend_from_slice(b"North,GRE,\xff\xfe,R1,a@b.c,1\n");
        let upload = FileUpload::from_bytes("roster.csv", bytes).unwrap();
        assert!(matches!(parse_upload(&upload, false), Err(ParseError::Encoding)));
    }

    #[test]
    fn unreadable_workbook_is_reported() {
        let upload = FileUpload::from_bytes("roster.xlsx", b"not a zip".to_vec()).unwrap();
        assert!(matches!(parse_upload(&upload, false), Err(ParseError::Workbook(_))));
    }

    /// First sheet "Roster" starts at row 2, with roll and mobile numbers
    /// stored as numbers. A second sheet "Notes" must be ignored.
    #[test]
    fn reads_first_worksheet_of_a_real_workbook() {
        let bytes = include_bytes!("../tests/fixtures/roster.xlsx");
        let upload = FileUpload::from_bytes("roster.xlsx", bytes.to_vec()).unwrap();
        let rows = parse_upload(&upload, false).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row, Some(3));
        assert_eq!(rows[0].student_name, "Ana Ruiz");
        assert_eq!(rows[0].roll_number, "1001");
        assert_eq!(rows[0].mobile_number, "5550101");
        assert!(rows[0].errors.is_empty());

        assert_eq!(rows[1].row, Some(4));
        assert_eq!(rows[1].roll_number, "1002.5");
        assert_eq!(rows[1].mobile_number, "");
        assert!(rows[1].errors.is_empty());
    }
}

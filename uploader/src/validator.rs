//! Row validation.
//!
//! Client checks are advisory: they catch rows that are obviously unusable
//! (blank required fields, an email without `@`, the same student twice in
//! one file) before anything is sent. The backend validation endpoint has the
//! final word; its annotated rows replace the local ones in the
//! [`ValidationReport`], and only rows it left without errors are committed.

use common::model::upload_row::UploadRow;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static MOBILE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+\-\s()]+$").expect("mobile number pattern is valid"));

const MIN_MOBILE_DIGITS: usize = 7;

/// Client-side validation settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rules {
    pub require_mobile: bool,
}

/// Advisory checks for a single row, without looking at other rows.
pub fn check_row(row: &UploadRow, rules: &Rules) -> Vec<String> {
    let mut errors = Vec::new();
    let required = [
        (&row.campus_name, "Campus name"),
        (&row.course_name, "Course name"),
        (&row.student_name, "Student name"),
        (&row.roll_number, "Roll number"),
        (&row.email, "Email"),
    ];
    for (value, label) in required {
        if value.trim().is_empty() {
            errors.push(format!("{} is required", label));
        }
    }

    let email = row.email.trim();
    if !email.is_empty() && !email.contains('@') {
        errors.push("Email must contain '@'".to_string());
    }

    if rules.require_mobile {
        let mobile = row.mobile_number.trim();
        if mobile.is_empty() {
            errors.push("Mobile number is required".to_string());
        } else if !MOBILE_NUMBER.is_match(mobile)
            || mobile.chars().filter(|c| c.is_ascii_digit()).count() < MIN_MOBILE_DIGITS
        {
            errors.push("Mobile number is not a valid phone number".to_string());
        }
    }
    errors
}

/// Runs the advisory checks over every row and flags in-file duplicates.
///
/// Rows keep their order and any errors they already carried (for instance
/// a wrong column count from the parser).
pub fn precheck(rows: Vec<UploadRow>, rules: &Rules) -> Vec<UploadRow> {
    let mut rows: Vec<UploadRow> = rows
        .into_par_iter()
        .map(|mut row| {
            let errors = check_row(&row, rules);
            row.errors.extend(errors);
            row
        })
        .collect();

    flag_duplicates(&mut rows, |r| r.roll_number.trim().to_string(), "roll number");
    flag_duplicates(&mut rows, |r| r.email.trim().to_lowercase(), "email");
    rows
}

fn flag_duplicates<F>(rows: &mut [UploadRow], key: F, label: &str)
where
    F: Fn(&UploadRow) -> String,
{
    let mut first_seen: HashMap<String, Option<usize>> = HashMap::new();
    for row in rows.iter_mut() {
        let value = key(row);
        if value.is_empty() {
            continue;
        }
        match first_seen.get(&value).copied() {
            Some(Some(line)) => row
                .errors
                .push(format!("Duplicate {} in file (first seen on row {})", label, line)),
            Some(None) => row.errors.push(format!("Duplicate {} in file", label)),
            None => {
                first_seen.insert(value, row.row);
            }
        }
    }
}

/// Rows as the preview shows them, after validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    rows: Vec<UploadRow>,
}

impl ValidationReport {
    pub fn new(rows: Vec<UploadRow>) -> Self {
        ValidationReport { rows }
    }

    /// Builds the report from the backend's answer, which replaces the local
    /// rows. Line numbers are carried over when the backend returned the rows
    /// one-for-one without them.
    pub fn authoritative(local: &[UploadRow], mut server: Vec<UploadRow>) -> Self {
        if server.len() == local.len() {
            for (theirs, ours) in server.iter_mut().zip(local) {
                if theirs.row.is_none() {
                    theirs.row = ours.row;
                }
            }
        }
        ValidationReport { rows: server }
    }

    pub fn rows(&self) -> &[UploadRow] {
        &self.rows
    }

    pub fn ready_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_valid()).count()
    }

    pub fn flagged(&self) -> impl Iterator<Item = &UploadRow> {
        self.rows.iter().filter(|r| !r.is_valid())
    }

    /// Rows that may be submitted, stripped of annotations.
    pub fn committable(&self) -> Vec<UploadRow> {
        self.rows
            .iter()
            .filter(|r| r.is_valid())
            .map(UploadRow::for_submission)
            .collect()
    }

    /// Preview headline, e.g. `2 students ready to be added.`
    pub fn summary(&self) -> String {
        let ready = self.ready_count();
        let noun = if ready == 1 { "student" } else { "students" };
        format!("{} {} ready to be added.", ready, noun)
    }
}

//! Delimited table parsing for GTFS `*.txt` files.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;

use crate::error::ParseError;

/// Storage class inferred for a column from its non-empty values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    fn infer<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let mut inferred = None;
        for value in values.filter(|v| !v.is_empty()) {
            let current = if let Ok(n) = value.parse::<i64>() {
                // "007" and "+7" stay text so identifiers keep their exact spelling.
                if n.to_string() != value {
                    return ColumnType::Text;
                }
                ColumnType::Integer
            } else if has_redundant_leading_zero(value) {
                return ColumnType::Text;
            } else if value.parse::<f64>().is_ok_and(f64::is_finite) {
                ColumnType::Real
            } else {
                return ColumnType::Text;
            };
            inferred = match (inferred, current) {
                (Some(ColumnType::Real), _) | (_, ColumnType::Real) => Some(ColumnType::Real),
                _ => Some(ColumnType::Integer),
            };
        }
        inferred.unwrap_or(ColumnType::Text)
    }
}

/// A parsed table file: header names, inferred types, and rows of text values.
///
/// Every row has exactly `columns.len()` values.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub types: Vec<ColumnType>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let file = File::open(path).map_err(|source| ParseError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Parses comma-delimited text whose first record is the header.
    ///
    /// Leading whitespace is stripped from headers and values. Short records
    /// are padded with empty values; long ones are rejected.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ParseError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = rdr.records();
        let header = records.next().ok_or(ParseError::MissingHeader)??;

        let columns = header
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let name = if i == 0 {
                    name.trim_start_matches('\u{feff}')
                } else {
                    name
                };
                name.trim_start().to_string()
            })
            .collect::<Vec<_>>();
        validate_columns(&columns)?;

        let width = columns.len();
        let mut rows = Vec::new();
        for (index, record) in records.enumerate() {
            let record = record?;
            if record.len() > width {
                return Err(ParseError::RaggedRow {
                    record: index + 1,
                    expected: width,
                    found: record.len(),
                });
            }

            let mut row: Vec<String> = record.iter().map(|v| v.trim_start().to_string()).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        let types = (0..width)
            .map(|i| ColumnType::infer(rows.iter().map(|row| row[i].as_str())))
            .collect();

        Ok(Self {
            columns,
            types,
            rows,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Drops a column and its values, returning whether it was present.
    pub fn remove_column(&mut self, name: &str) -> bool {
        let Some(index) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(index);
        self.types.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
        true
    }

    /// Appends a text column holding `value` in every row.
    pub fn push_constant_column(&mut self, name: &str, value: &str) {
        self.columns.push(name.to_string());
        self.types.push(ColumnType::Text);
        for row in &mut self.rows {
            row.push(value.to_string());
        }
    }
}

/// True for numbers like `007.5` whose integer part has a leading zero.
fn has_redundant_leading_zero(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let integer_part = digits
        .split(['.', 'e', 'E'])
        .next()
        .unwrap_or_default();
    integer_part.len() > 1 && integer_part.starts_with('0')
}

fn validate_columns(columns: &[String]) -> Result<(), ParseError> {
    for (i, name) in columns.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(ParseError::EmptyColumn(i));
        }
        if columns[..i].iter().any(|c| c.eq_ignore_ascii_case(name)) {
            return Err(ParseError::DuplicateColumn(name.clone()));
        }
    }
    Ok(())
}

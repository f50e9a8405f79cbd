//! Column extraction from benchmark output.
//!
//! Benchmarks print their measurements as whitespace-delimited columns. A
//! [`ColumnPattern`] selects 1-based columns the way an awk `print` statement
//! does, and is written in that syntax in configuration files:
//!
//! ```text
//! $1 "\t" $8      # columns 1 and 8 of every line
//! $9; exit        # column 9 of the first line only
//! ```

use std::{fmt, str::FromStr};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern {0:?} selects no columns")]
    NoFields(String),
    #[error("column $0 is not supported, columns start at $1")]
    ZeroField,
    #[error("unsupported statement {0:?} in column pattern")]
    Unsupported(String),
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("benchmark printed nothing")]
    NoOutput,
    #[error("column ${field} missing on output line {line}, which has {available} columns")]
    MissingField {
        field: usize,
        line: usize,
        available: usize,
    },
    #[error("column value {0:?} is not a number")]
    NotNumeric(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnPattern {
    fields: Vec<usize>,
    first_line_only: bool,
}

impl ColumnPattern {
    pub fn new(fields: Vec<usize>, first_line_only: bool) -> Result<Self, PatternError> {
        if fields.is_empty() {
            return Err(PatternError::NoFields(String::new()));
        }
        if fields.contains(&0) {
            return Err(PatternError::ZeroField);
        }
        Ok(Self {
            fields,
            first_line_only,
        })
    }

    pub fn fields(&self) -> &[usize] {
        &self.fields
    }

    pub fn first_line_only(&self) -> bool {
        self.first_line_only
    }

    /// Selects the configured columns from each non-blank line of `output`,
    /// one line at a time
    pub fn records<'a>(
        &'a self,
        output: &'a str,
    ) -> impl Iterator<Item = Result<Record, ExtractError>> + 'a {
        let limit = if self.first_line_only { 1 } else { usize::MAX };
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .take(limit)
            .enumerate()
            .map(move |(idx, line)| self.select(idx + 1, line))
    }

    fn select(&self, line_no: usize, line: &str) -> Result<Record, ExtractError> {
        let columns = line.split_whitespace().collect::<Vec<_>>();
        let fields = self
            .fields
            .iter()
            .map(|&field| {
                columns
                    .get(field - 1)
                    .map(|column| (*column).to_owned())
                    .ok_or(ExtractError::MissingField {
                        field,
                        line: line_no,
                        available: columns.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Record(fields))
    }

    /// Every record of `output`; any line missing a column fails the whole
    /// output
    pub fn extract(&self, output: &str) -> Result<Vec<Record>, ExtractError> {
        let records = self.records(output).collect::<Result<Vec<_>, _>>()?;
        if records.is_empty() {
            return Err(ExtractError::NoOutput);
        }
        Ok(records)
    }
}

impl FromStr for ColumnPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field_re = Regex::new(r"\$(\d+)")?;
        let literal_re = Regex::new(r#""(?:[^"\\]|\\.)*""#)?;

        let mut statements = s.split(';');
        let body = statements.next().unwrap_or_default();
        let mut first_line_only = false;
        for statement in statements.map(str::trim).filter(|x| !x.is_empty()) {
            if statement == "exit" {
                first_line_only = true;
            } else {
                return Err(PatternError::Unsupported(statement.to_owned()));
            }
        }

        let fields = field_re
            .captures_iter(body)
            .map(|cap| cap[1].parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| PatternError::Unsupported(body.to_owned()))?;

        let without_fields = field_re.replace_all(body, " ");
        let leftover = literal_re.replace_all(&without_fields, " ");
        let leftover = leftover.trim();
        if !leftover.is_empty() {
            return Err(PatternError::Unsupported(leftover.to_owned()));
        }
        if fields.is_empty() {
            return Err(PatternError::NoFields(s.to_owned()));
        }
        Self::new(fields, first_line_only)
    }
}

impl TryFrom<String> for ColumnPattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColumnPattern> for String {
    fn from(value: ColumnPattern) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ColumnPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self
            .fields
            .iter()
            .map(|field| format!("${field}"))
            .collect::<Vec<_>>()
            .join(r#" "\t" "#);
        f.write_str(&body)?;
        if self.first_line_only {
            f.write_str("; exit")?;
        }
        Ok(())
    }
}

/// The selected columns of one output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record(Vec<String>);

impl Record {
    pub fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    /// The last selected column carries the measurement
    pub fn value_field(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn value(&self) -> Result<f64, ExtractError> {
        let field = self.value_field();
        field
            .parse::<f64>()
            .map_err(|_| ExtractError::NotNumeric(field.to_owned()))
    }

    pub fn to_line(&self) -> String {
        self.0.join("\t")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_awk_print_patterns() {
        let pattern: ColumnPattern = r#"$1 "\t" $8"#.parse().unwrap();
        assert_eq!(pattern.fields(), &[1, 8]);
        assert!(!pattern.first_line_only());

        let pattern: ColumnPattern = "$9; exit".parse().unwrap();
        assert_eq!(pattern.fields(), &[9]);
        assert!(pattern.first_line_only());

        let pattern: ColumnPattern = r#"$1 "\t" $4 "\t" $6"#.parse().unwrap();
        assert_eq!(pattern.fields(), &[1, 4, 6]);
        assert_eq!(pattern.to_string(), r#"$1 "\t" $4 "\t" $6"#);
    }

    #[test]
    fn rejects_unsupported_patterns() {
        assert!(matches!(
            "\"\\t\"".parse::<ColumnPattern>(),
            Err(PatternError::NoFields(_))
        ));
        assert!(matches!(
            "$0".parse::<ColumnPattern>(),
            Err(PatternError::ZeroField)
        ));
        assert!(matches!(
            "$1; next".parse::<ColumnPattern>(),
            Err(PatternError::Unsupported(_))
        ));
        assert!(matches!(
            "$1 + $2".parse::<ColumnPattern>(),
            Err(PatternError::Unsupported(_))
        ));
    }

    #[test]
    fn extracts_selected_columns_per_line() {
        let pattern: ColumnPattern = r#"$1 "\t" $3"#.parse().unwrap();
        let records = pattern
            .extract("10 threads  0.5 s\n\n20\tthreads 0.75 s\n")
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields(), &["10", "0.5"]);
        assert_eq!(records[1].to_line(), "20\t0.75");
        assert_eq!(records[1].value(), Ok(0.75));
    }

    #[test]
    fn exit_stops_after_first_line() {
        let pattern: ColumnPattern = "$2; exit".parse().unwrap();
        let records = pattern.extract("a 1\nb 2\nc 3\n").unwrap();
        assert_eq!(records, vec![Record::new(vec!["1".to_owned()])]);
    }

    #[test]
    fn records_are_selected_one_line_at_a_time() {
        let pattern: ColumnPattern = r#"$1 "\t" $8"#.parse().unwrap();
        let output = "4 threads 0 0 0 0 0 8\ndone\n";
        let mut records = pattern.records(output);
        assert_eq!(
            records.next(),
            Some(Ok(Record::new(vec!["4".to_owned(), "8".to_owned()])))
        );
        assert!(matches!(
            records.next(),
            Some(Err(ExtractError::MissingField { line: 2, .. }))
        ));
        assert!(pattern.extract(output).is_err());
    }

    #[test]
    fn reports_missing_and_malformed_columns() {
        let pattern: ColumnPattern = "$4".parse().unwrap();
        assert_eq!(
            pattern.extract("1 2 3"),
            Err(ExtractError::MissingField {
                field: 4,
                line: 1,
                available: 3
            })
        );
        assert_eq!(pattern.extract("  \n"), Err(ExtractError::NoOutput));

        let record = Record::new(vec!["12".to_owned(), "usec".to_owned()]);
        assert_eq!(record.value(), Err(ExtractError::NotNumeric("usec".to_owned())));
    }

    #[test]
    fn pattern_deserialises_from_string() {
        let pattern: ColumnPattern = serde_json::from_str(r#""$3 \"\\t\" $7""#).unwrap();
        assert_eq!(pattern.fields(), &[3, 7]);
        assert!(serde_json::from_str::<ColumnPattern>(r#""$0""#).is_err());
    }
}

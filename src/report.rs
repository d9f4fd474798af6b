use crate::error;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::Path;

lazy_static! {
    static ref KEY_RE: Regex = Regex::new(r"^[A-Za-z0-9._-]+$").unwrap();
}

/// Check that `key` may be used as a report field name.
pub fn is_valid_key(key: &str) -> bool {
    KEY_RE.is_match(key)
}

/// Field access shared by all report formats.
pub trait ReportFields {
    /// Text value of the field, `None` if the report has no such field.
    fn field(&self, key: &str) -> Option<Cow<str>>;

    /// Insert or replace a text field. Existing fields keep their position.
    fn set_field(&mut self, key: &str, value: String);

    /// Check whether the report has the field.
    fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// Check that the field is absent or holds plain text, so `set_field`
    /// does not replace structured or binary data.
    fn is_text_field(&self, key: &str) -> bool;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    /// Plain text, possibly spanning several lines.
    Text(String),
    /// Encoded lines of a `base64` field, kept as they were read.
    Binary(Vec<String>),
}

/// Problem report in apport format (`*.crash`).
///
/// Each field starts with `Key: value`. Multiline values are continued on the
/// following lines, each one indented with a single space.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProblemReport {
    fields: Vec<(String, FieldValue)>,
}

impl ProblemReport {
    /// Create empty problem report.
    pub fn new() -> Self {
        Default::default()
    }

    /// Parse problem report.
    ///
    /// # Arguments
    ///
    /// * `text` - report contents
    ///
    /// # Return value
    ///
    /// Parsed report
    pub fn parse(text: &str) -> error::Result<Self> {
        let mut report = ProblemReport::new();
        for (i, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            if let Some(cont) = line.strip_prefix(' ') {
                match report.fields.last_mut() {
                    Some((_, FieldValue::Text(value))) => {
                        if !value.is_empty() {
                            value.push('\n');
                        }
                        value.push_str(cont);
                    }
                    Some((_, FieldValue::Binary(lines))) => lines.push(cont.to_string()),
                    None => {
                        return Err(error::Error::Report(format!(
                            "Line {}: continuation line without field",
                            i + 1
                        )));
                    }
                }
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(error::Error::Report(format!(
                    "Line {}: expected \"Key: value\", got \"{}\"",
                    i + 1,
                    line
                )));
            };
            if !is_valid_key(key) {
                return Err(error::Error::Report(format!(
                    "Line {}: invalid field name \"{}\"",
                    i + 1,
                    key
                )));
            }
            let value = value.trim();
            let value = if value == "base64" {
                FieldValue::Binary(Vec::new())
            } else {
                FieldValue::Text(value.to_string())
            };
            report.insert(key, value);
        }
        Ok(report)
    }

    /// Insert field value. Repeated keys overwrite the previous value in place.
    pub fn insert(&mut self, key: &str, value: FieldValue) {
        if let Some(entry) = self.fields.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.fields.push((key.to_string(), value));
        }
    }

    /// Raw field value, binary fields included.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Field names in report order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the report has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl ReportFields for ProblemReport {
    fn field(&self, key: &str) -> Option<Cow<str>> {
        match self.get(key)? {
            FieldValue::Text(value) => Some(Cow::Borrowed(value.as_str())),
            FieldValue::Binary(_) => None,
        }
    }

    fn set_field(&mut self, key: &str, value: String) {
        self.insert(key, FieldValue::Text(value));
    }

    fn is_text_field(&self, key: &str) -> bool {
        !matches!(self.get(key), Some(FieldValue::Binary(_)))
    }
}

impl fmt::Display for ProblemReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (key, value) in &self.fields {
            match value {
                FieldValue::Text(text) if text.contains('\n') => {
                    writeln!(f, "{}:", key)?;
                    for line in text.split('\n') {
                        writeln!(f, " {}", line)?;
                    }
                }
                FieldValue::Text(text) if text.is_empty() => writeln!(f, "{}:", key)?,
                FieldValue::Text(text) => writeln!(f, "{}: {}", key, text)?,
                FieldValue::Binary(lines) => {
                    writeln!(f, "{}: base64", key)?;
                    for line in lines {
                        writeln!(f, " {}", line)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Report stored as a JSON object (`*.casrep`, `*.json`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JsonReport {
    fields: Map<String, Value>,
}

impl JsonReport {
    /// Parse JSON report. Top level value must be an object.
    pub fn parse(text: &str) -> error::Result<Self> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(fields) => Ok(JsonReport { fields }),
            _ => Err(error::Error::Report(
                "JSON report is not an object".to_string(),
            )),
        }
    }

    /// Underlying JSON object.
    pub fn as_object(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl ReportFields for JsonReport {
    fn field(&self, key: &str) -> Option<Cow<str>> {
        let value = match self.fields.get(key)? {
            Value::String(s) => Cow::Borrowed(s.as_str()),
            Value::Null => Cow::Borrowed(""),
            Value::Array(items) => Cow::Owned(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<String>>()
                    .join("\n"),
            ),
            other => Cow::Owned(other.to_string()),
        };
        Some(value)
    }

    fn set_field(&mut self, key: &str, value: String) {
        self.fields.insert(key.to_string(), Value::String(value));
    }

    fn is_text_field(&self, key: &str) -> bool {
        matches!(
            self.fields.get(key),
            None | Some(Value::String(_)) | Some(Value::Null)
        )
    }
}

impl fmt::Display for JsonReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repstr = serde_json::to_string_pretty(&self.fields).map_err(|_| fmt::Error)?;
        writeln!(f, "{}", repstr)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Apport,
    Json,
}

impl ReportFormat {
    /// Detect report format by file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("casrep") | Some("json") => ReportFormat::Json,
            _ => ReportFormat::Apport,
        }
    }
}

/// Report of any supported format.
#[derive(Clone, Debug, PartialEq)]
pub enum Report {
    Apport(ProblemReport),
    Json(JsonReport),
}

impl Report {
    /// Parse report of the given format.
    pub fn parse(text: &str, format: ReportFormat) -> error::Result<Self> {
        match format {
            ReportFormat::Apport => Ok(Report::Apport(ProblemReport::parse(text)?)),
            ReportFormat::Json => Ok(Report::Json(JsonReport::parse(text)?)),
        }
    }

    /// Read report from file, format is detected by extension.
    pub fn from_file(path: &Path) -> error::Result<Self> {
        let text = fs::read_to_string(path)?;
        Report::parse(&text, ReportFormat::from_path(path)).map_err(|e| match e {
            error::Error::IO(err) => error::Error::IO(err),
            err => error::Error::Report(format!("{}: {}", path.display(), err)),
        })
    }

    pub fn format(&self) -> ReportFormat {
        match self {
            Report::Apport(_) => ReportFormat::Apport,
            Report::Json(_) => ReportFormat::Json,
        }
    }
}

impl ReportFields for Report {
    fn field(&self, key: &str) -> Option<Cow<str>> {
        match self {
            Report::Apport(report) => report.field(key),
            Report::Json(report) => report.field(key),
        }
    }

    fn set_field(&mut self, key: &str, value: String) {
        match self {
            Report::Apport(report) => report.set_field(key, value),
            Report::Json(report) => report.set_field(key, value),
        }
    }

    fn is_text_field(&self, key: &str) -> bool {
        match self {
            Report::Apport(report) => report.is_text_field(key),
            Report::Json(report) => report.is_text_field(key),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Report::Apport(report) => write!(f, "{}", report),
            Report::Json(report) => write!(f, "{}", report),
        }
    }
}

//! Custom tagging rules from file.
//!
//! One rule per line: `FIELD NEEDLE TAG`. Field and tag are single words, the
//! needle is everything between them and may contain spaces. Empty lines and
//! lines starting with `#` are skipped.
use crate::error;
use crate::hook::Rule;
use crate::report::is_valid_key;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

lazy_static! {
    static ref RULE_RE: Regex = Regex::new(r"^(\S+)\s+(.+?)\s+(\S+)$").unwrap();
}

/// Parse rules.
///
/// # Arguments
///
/// * `lines` - rules file lines
///
/// * `source` - rules file name for error messages
pub fn parse_rules<S: AsRef<str>>(lines: &[S], source: &str) -> error::Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let line = line.as_ref().trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(cap) = RULE_RE.captures(line) else {
            return Err(error::Error::Rules(format!(
                "{}:{}: expected \"FIELD NEEDLE TAG\"",
                source,
                i + 1
            )));
        };
        let field = cap.get(1).unwrap().as_str();
        if !is_valid_key(field) {
            return Err(error::Error::Rules(format!(
                "{}:{}: invalid field name \"{}\"",
                source,
                i + 1,
                field
            )));
        }
        rules.push(Rule::new(
            field,
            cap.get(2).unwrap().as_str(),
            cap.get(3).unwrap().as_str(),
        ));
    }
    Ok(rules)
}

/// Read rules from file.
pub fn rules_from_file(path: &Path) -> error::Result<Vec<Rule>> {
    let file = File::open(path)?;
    let lines = BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<String>>>()?;
    parse_rules(&lines, &path.display().to_string())
}

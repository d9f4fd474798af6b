//! Overlay scrollbar tagging rules.
use crate::report::ReportFields;
use lazy_static::lazy_static;
use log::{debug, warn};
use serde::Serialize;

/// Report field that holds space separated tags.
pub const TAGS_FIELD: &str = "Tags";

/// Tag the report when `field` contains `needle`.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    /// Report field to look at.
    #[serde(rename(serialize = "Field"))]
    pub field: String,
    /// Literal substring to search for.
    #[serde(rename(serialize = "Needle"))]
    pub needle: String,
    /// Tag to append.
    #[serde(rename(serialize = "Tag"))]
    pub tag: String,
}

impl Rule {
    pub fn new(field: &str, needle: &str, tag: &str) -> Self {
        Rule {
            field: field.to_string(),
            needle: needle.to_string(),
            tag: tag.to_string(),
        }
    }

    /// Check if the rule fires on the report.
    pub fn matches<R: ReportFields + ?Sized>(&self, report: &R) -> bool {
        report
            .field(&self.field)
            .map_or(false, |value| value.contains(self.needle.as_str()))
    }
}

lazy_static! {
    /// Overlay scrollbar rules in the order they are applied.
    pub static ref SCROLLBAR_RULES: Vec<Rule> = vec![
        Rule::new("ProcMaps", "liboverlay-scrollbar", "ayatana-scrollbar"),
        Rule::new("Stacktrace", "os-scrollbar.c", "ayatana-scrollbar_scrollbar"),
        Rule::new("Stacktrace", "os-thumb.c", "ayatana-scrollbar_thumb"),
        Rule::new("Stacktrace", "os-pager.c", "ayatana-scrollbar_pager"),
    ];
}

/// Check if `tag` is one of the report tags.
pub fn has_tag<R: ReportFields + ?Sized>(report: &R, tag: &str) -> bool {
    report
        .field(TAGS_FIELD)
        .map_or(false, |tags| tags.split_whitespace().any(|t| t == tag))
}

/// Append `tag` to the report tags, creating the field if needed.
///
/// The tag is always prefixed with a single space, even if the report had no
/// tags before. Binary or structured `Tags` fields are left as is and `false`
/// is returned.
pub fn append_tag<R: ReportFields + ?Sized>(report: &mut R, tag: &str) -> bool {
    if !report.is_text_field(TAGS_FIELD) {
        warn!("{} field is not text, skipping tag {}", TAGS_FIELD, tag);
        return false;
    }
    let mut tags = report
        .field(TAGS_FIELD)
        .map(|tags| tags.into_owned())
        .unwrap_or_default();
    tags.push(' ');
    tags.push_str(tag);
    report.set_field(TAGS_FIELD, tags);
    true
}

/// Apply rules to the report.
///
/// # Arguments
///
/// * `report` - report to annotate
///
/// * `rules` - rules in application order
///
/// * `dedup` - skip tags the report already has
///
/// # Return value
///
/// Tags appended to the report
pub fn apply_rules<'r, R: ReportFields + ?Sized>(
    report: &mut R,
    rules: &'r [Rule],
    dedup: bool,
) -> Vec<&'r str> {
    let mut added = Vec::new();
    for rule in rules {
        if !rule.matches(&*report) {
            continue;
        }
        if dedup && has_tag(&*report, &rule.tag) {
            debug!("Report is already tagged with {}", rule.tag);
            continue;
        }
        if append_tag(report, &rule.tag) {
            added.push(rule.tag.as_str());
        }
    }
    added
}

/// Tag the report if the overlay scrollbar is involved in the crash.
///
/// Returns appended tags.
pub fn add_info<R: ReportFields + ?Sized>(report: &mut R) -> Vec<&'static str> {
    apply_rules(report, SCROLLBAR_RULES.as_slice(), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FieldValue, JsonReport, ProblemReport};

    const MAPS: &str = "7f2c1a000000-7f2c1a021000 r-xp 00000000 08:01 1311 /usr/lib/liboverlay-scrollbar-0.2.so.0.0.16";

    fn report(fields: &[(&str, &str)]) -> ProblemReport {
        let mut report = ProblemReport::new();
        for (key, value) in fields {
            report.set_field(key, value.to_string());
        }
        report
    }

    #[test]
    fn test_procmaps_rule() {
        let mut rep = report(&[("ProcMaps", MAPS)]);
        assert_eq!(add_info(&mut rep), vec!["ayatana-scrollbar"]);
        assert_eq!(rep.field("Tags").unwrap(), " ayatana-scrollbar");
    }

    #[test]
    fn test_stacktrace_rules() {
        let trace = "#0  os_thumb_motion_notify_event () at os-thumb.c:771\n\
                     #1  pager_move () at os-pager.c:95\n\
                     #2  scrollbar_toplevel () at os-scrollbar.c:1212";
        let mut rep = report(&[("Stacktrace", trace)]);
        assert_eq!(
            add_info(&mut rep),
            vec![
                "ayatana-scrollbar_scrollbar",
                "ayatana-scrollbar_thumb",
                "ayatana-scrollbar_pager"
            ]
        );
        assert_eq!(
            rep.field("Tags").unwrap(),
            " ayatana-scrollbar_scrollbar ayatana-scrollbar_thumb ayatana-scrollbar_pager"
        );
    }

    #[test]
    fn test_all_rules_keep_existing_tags() {
        let mut rep = report(&[
            ("Tags", "precise need-amd64-retrace"),
            ("ProcMaps", MAPS),
            ("Stacktrace", "#0 os_pager_draw () at os-pager.c:120"),
        ]);
        assert_eq!(
            add_info(&mut rep),
            vec!["ayatana-scrollbar", "ayatana-scrollbar_pager"]
        );
        assert_eq!(
            rep.field("Tags").unwrap(),
            "precise need-amd64-retrace ayatana-scrollbar ayatana-scrollbar_pager"
        );
        assert_eq!(
            rep.keys().collect::<Vec<&str>>(),
            vec!["Tags", "ProcMaps", "Stacktrace"]
        );
    }

    #[test]
    fn test_no_match_leaves_report_untouched() {
        let mut rep = report(&[
            ("ProcMaps", "/lib/x86_64-linux-gnu/libc-2.15.so"),
            ("Stacktrace", "#0 gtk_main () at gtkmain.c:1162"),
        ]);
        let before = rep.clone();
        assert!(add_info(&mut rep).is_empty());
        assert_eq!(rep, before);
        assert!(!rep.has_field("Tags"));

        let mut empty = ProblemReport::new();
        assert!(add_info(&mut empty).is_empty());
        assert!(empty.is_empty());
    }

    #[test]
    fn test_needles_are_field_specific() {
        // Library name in stacktrace and source file in maps do not count.
        let mut rep = report(&[
            ("Stacktrace", "#3 0x7f in ?? () from /usr/lib/liboverlay-scrollbar-0.2.so.0"),
            ("ProcMaps", "os-thumb.c"),
        ]);
        assert!(add_info(&mut rep).is_empty());

        let mut rep = report(&[("Stacktrace", "OS-THUMB.C")]);
        assert!(add_info(&mut rep).is_empty());
    }

    #[test]
    fn test_hook_is_not_idempotent() {
        let mut rep = report(&[("ProcMaps", MAPS)]);
        add_info(&mut rep);
        add_info(&mut rep);
        assert_eq!(
            rep.field("Tags").unwrap(),
            " ayatana-scrollbar ayatana-scrollbar"
        );
    }

    #[test]
    fn test_apply_rules_dedup() {
        let mut rep = report(&[("Tags", "ayatana-scrollbar"), ("ProcMaps", MAPS)]);
        assert!(apply_rules(&mut rep, SCROLLBAR_RULES.as_slice(), true).is_empty());
        assert_eq!(rep.field("Tags").unwrap(), "ayatana-scrollbar");

        // Substring of another tag is not a duplicate.
        let mut rep = report(&[("Tags", "ayatana-scrollbar_thumb"), ("ProcMaps", MAPS)]);
        assert_eq!(
            apply_rules(&mut rep, SCROLLBAR_RULES.as_slice(), true),
            vec!["ayatana-scrollbar"]
        );
    }

    #[test]
    fn test_json_report_arrays() {
        let mut rep = JsonReport::parse(
            r##"{"Stacktrace": ["#0 main at main.c:3", "#1 os_scrollbar_init at os-scrollbar.c:40"], "Tags": "casr"}"##,
        )
        .unwrap();
        assert_eq!(add_info(&mut rep), vec!["ayatana-scrollbar_scrollbar"]);
        assert_eq!(
            rep.field("Tags").unwrap(),
            "casr ayatana-scrollbar_scrollbar"
        );
    }

    #[test]
    fn test_rules_serialize() {
        let json = serde_json::to_string(&SCROLLBAR_RULES[0]).unwrap();
        assert_eq!(
            json,
            r#"{"Field":"ProcMaps","Needle":"liboverlay-scrollbar","Tag":"ayatana-scrollbar"}"#
        );
    }

    #[test]
    fn test_binary_procmaps_is_ignored() {
        let mut rep = ProblemReport::parse(
            "ProcMaps: base64\n \
             7f2c1a3e1000-7f2c1a402000 r-xp /usr/lib/liboverlay-scrollbar-0.2.so.0\n\
             Stacktrace:\n #0 os_pager_draw () at os-pager.c:120\n",
        )
        .unwrap();
        assert_eq!(add_info(&mut rep), vec!["ayatana-scrollbar_pager"]);
        assert_eq!(rep.field("Tags").unwrap(), " ayatana-scrollbar_pager");
        assert!(matches!(rep.get("ProcMaps"), Some(FieldValue::Binary(_))));
    }

    #[test]
    fn test_non_text_tags_are_kept() {
        let mut rep = ProblemReport::parse("Tags: base64\n AAAA\nProcMaps: liboverlay-scrollbar\n")
            .unwrap();
        assert!(add_info(&mut rep).is_empty());
        assert_eq!(
            rep.get("Tags"),
            Some(&FieldValue::Binary(vec!["AAAA".to_string()]))
        );

        let mut rep = JsonReport::parse(
            r##"{"Tags": ["a", 1], "Stacktrace": ["#0 os_thumb_draw at os-thumb.c:5"]}"##,
        )
        .unwrap();
        assert!(add_info(&mut rep).is_empty());
        assert_eq!(rep.as_object()["Tags"], serde_json::json!(["a", 1]));

        let mut rep = JsonReport::parse(
            r##"{"Tags": null, "Stacktrace": ["#0 os_thumb_draw at os-thumb.c:5"]}"##,
        )
        .unwrap();
        assert_eq!(add_info(&mut rep), vec!["ayatana-scrollbar_thumb"]);
        assert_eq!(rep.field("Tags").unwrap(), " ayatana-scrollbar_thumb");
    }
}

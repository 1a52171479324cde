use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static PROGRAM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Program:\s*(.+)").unwrap());
static TEACHER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Teacher Name:\s*(.+)").unwrap());
static COURSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Course:\s*(.+)").unwrap());
static STUDENTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Total Students?:\s*([0-9]+)").unwrap());
static EVALUATIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Evaluation Count:\s*([0-9]+)").unwrap());
static OFFER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*Offer\s*No\s*:\s*[0-9]+").unwrap());

/// Per-page header metadata. Every field is optional; a label that is not
/// found on the page is simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_students: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_count: Option<u32>,
}

pub fn extract_header(text: &str) -> HeaderFields {
    HeaderFields {
        program: capture_text(&PROGRAM_RE, text),
        teacher_name: capture_text(&TEACHER_RE, text),
        course: capture_text(&COURSE_RE, text).and_then(|c| normalize_course(&c)),
        total_students: capture_int(&STUDENTS_RE, text),
        evaluation_count: capture_int(&EVALUATIONS_RE, text),
    }
}

/// Strip `Offer No: <digits>` fragments the report prints next to the course title.
fn normalize_course(raw: &str) -> Option<String> {
    non_empty(OFFER_RE.replace_all(raw, "").trim())
}

fn capture_text(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).and_then(|c| non_empty(c[1].trim()))
}

fn capture_int(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text).and_then(|c| c[1].parse().ok())
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

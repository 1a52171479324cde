use serde::{Deserialize, Deserializer, Serialize};

use crate::parser::averages::FlattenedAverages;
use crate::parser::header::HeaderFields;
use crate::parser::ParsedPage;

/// Caller-supplied context attached to every record of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    pub batch_code: String,
    pub semester: String,
    pub session: String,
}

/// One flattened evaluation result for a single document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub source_pdf: String,
    pub page: u32,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub batch_code: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub semester: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub session: String,
    #[serde(flatten)]
    pub header: HeaderFields,
    #[serde(flatten)]
    pub averages: FlattenedAverages,
}

/// Older collections write `null` for context the uploader did not send.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deduplication identity: `(source_pdf, page, course)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub source_pdf: String,
    pub page: u32,
    pub course: Option<String>,
}

impl RecordKey {
    pub fn new(source_pdf: &str, page: u32, course: Option<&str>) -> Self {
        RecordKey {
            source_pdf: source_pdf.to_string(),
            page,
            course: course.map(str::to_string),
        }
    }
}

impl Record {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.source_pdf, self.page, self.header.course.as_deref())
    }
}

pub fn build_record(source_pdf: &str, page: u32, ctx: &RunContext, parsed: ParsedPage) -> Record {
    Record {
        source_pdf: source_pdf.to_string(),
        page,
        batch_code: ctx.batch_code.clone(),
        semester: ctx.semester.clone(),
        session: ctx.session.clone(),
        header: parsed.header,
        averages: parsed.averages,
    }
}

use std::collections::HashSet;

use crate::parser::averages::{flattened_key, Category, Label};
use crate::record::Record;

pub struct CollectionStats {
    pub records: usize,
    pub documents: usize,
    pub courses: usize,
    /// Records reporting all five values, per category.
    pub coverage: Vec<(Category, usize)>,
}

pub fn collection_stats(records: &[Record]) -> CollectionStats {
    let documents: HashSet<&str> = records.iter().map(|r| r.source_pdf.as_str()).collect();
    let courses: HashSet<&str> = records
        .iter()
        .filter_map(|r| r.header.course.as_deref())
        .collect();
    let coverage = Category::ALL
        .iter()
        .map(|&cat| (cat, records.iter().filter(|r| r.averages.reports(cat)).count()))
        .collect();

    CollectionStats {
        records: records.len(),
        documents: documents.len(),
        courses: courses.len(),
        coverage,
    }
}

pub struct OverviewRow {
    pub source_pdf: String,
    pub page: u32,
    pub course: String,
    pub teacher: String,
    pub total_students: Option<u32>,
    pub evaluation_count: Option<u32>,
    pub sa_learning: Option<f64>,
}

pub fn overview(
    records: &[Record],
    batch: Option<&str>,
    semester: Option<&str>,
    limit: usize,
) -> Vec<OverviewRow> {
    let sa_learning = flattened_key(Label::StronglyAgree, Category::Learning);
    records
        .iter()
        .filter(|r| batch.map_or(true, |b| r.batch_code.eq_ignore_ascii_case(b)))
        .filter(|r| semester.map_or(true, |s| r.semester.eq_ignore_ascii_case(s)))
        .take(limit)
        .map(|r| OverviewRow {
            source_pdf: r.source_pdf.clone(),
            page: r.page,
            course: r.header.course.clone().unwrap_or_default(),
            teacher: r.header.teacher_name.clone().unwrap_or_default(),
            total_students: r.header.total_students,
            evaluation_count: r.header.evaluation_count,
            sa_learning: r.averages.get(&sa_learning),
        })
        .collect()
}

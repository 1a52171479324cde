use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").unwrap());

/// One regex per tracked category. Practical and Overall rows are laid out the
/// same way on the report but are never searched for.
static CATEGORY_RES: LazyLock<Vec<(Category, Regex)>> = LazyLock::new(|| {
    Category::ALL
        .iter()
        .map(|&cat| {
            let pattern = format!(
                r"(?i){}\s*Average\s*:\s*((?:[0-9]+(?:\.[0-9]+)?\s*)+)",
                cat.title()
            );
            (cat, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// Number of response levels every tracked category must report.
pub const SCALE_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Learning,
    Attitude,
    Punctuality,
    Assessment,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Learning,
        Category::Attitude,
        Category::Punctuality,
        Category::Assessment,
    ];

    /// Key fragment used in flattened field names.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Learning => "learning",
            Category::Attitude => "attitude",
            Category::Punctuality => "punctuality",
            Category::Assessment => "assessment",
        }
    }

    /// Label as printed on the report.
    pub fn title(self) -> &'static str {
        match self {
            Category::Learning => "Learning",
            Category::Attitude => "Attitude",
            Category::Punctuality => "Punctuality",
            Category::Assessment => "Assessment",
        }
    }
}

/// Response levels, in the column order the report prints them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    StronglyAgree,
    Agree,
    Uncertain,
    Disagree,
    StronglyDisagree,
}

impl Label {
    pub const ORDER: [Label; SCALE_LEN] = [
        Label::StronglyAgree,
        Label::Agree,
        Label::Uncertain,
        Label::Disagree,
        Label::StronglyDisagree,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Label::StronglyAgree => "SA",
            Label::Agree => "A",
            Label::Uncertain => "U",
            Label::Disagree => "D",
            Label::StronglyDisagree => "SD",
        }
    }
}

/// Values per category in `Label::ORDER`. Only categories that reported
/// exactly five numbers are present.
pub type RatingDistribution = BTreeMap<Category, [f64; SCALE_LEN]>;

pub fn flattened_key(label: Label, category: Category) -> String {
    format!("{}.averages.{}", label.as_str(), category.as_str())
}

pub fn extract_averages(text: &str) -> RatingDistribution {
    // Rows wrap across lines in the extracted text; join them back up.
    let text = WS_RE.replace_all(text, " ");

    let mut out = RatingDistribution::new();
    for (cat, re) in CATEGORY_RES.iter() {
        let Some(caps) = re.captures(&text) else {
            continue;
        };
        let nums: Vec<f64> = NUM_RE
            .find_iter(&caps[1])
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        if let Ok(values) = <[f64; SCALE_LEN]>::try_from(nums) {
            out.insert(*cat, values);
        }
    }
    out
}

/// Flatten a distribution into `<LABEL>.averages.<category>` keys. Missing
/// categories produce no keys at all rather than zeros.
pub fn expand(distribution: &RatingDistribution) -> FlattenedAverages {
    let mut out = FlattenedAverages::default();
    for (cat, values) in distribution {
        for (label, value) in Label::ORDER.iter().zip(values) {
            out.push(flattened_key(*label, *cat), *value);
        }
    }
    out
}

/// Insertion-ordered `key -> value` map, serialized as plain JSON object entries.
///
/// When read back from a collection, any key that is not a numeric
/// `*.averages.*` entry lands in `extra` and is written out unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedAverages {
    entries: Vec<(String, f64)>,
    extra: Vec<(String, Value)>,
}

impl FlattenedAverages {
    pub fn push(&mut self, key: String, value: f64) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn reports(&self, category: Category) -> bool {
        Label::ORDER
            .iter()
            .all(|l| self.get(&flattened_key(*l, category)).is_some())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Serialize for FlattenedAverages {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len() + self.extra.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        for (k, v) in &self.extra {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FlattenedAverages {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = FlattenedAverages;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of averages")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = FlattenedAverages::default();
                while let Some((k, v)) = access.next_entry::<String, Value>()? {
                    match v.as_f64() {
                        Some(n) if k.contains(".averages.") => out.push(k, n),
                        _ => out.extra.push((k, v)),
                    }
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_numbers_recorded_in_order() {
        let d = extract_averages("Learning Average : 10 5 2 1 0");
        assert_eq!(d.get(&Category::Learning), Some(&[10.0, 5.0, 2.0, 1.0, 0.0]));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn decimals_and_no_space_before_colon() {
        let d = extract_averages("assessment average: 4.5 3.25 0.5 1 2");
        assert_eq!(d.get(&Category::Assessment), Some(&[4.5, 3.25, 0.5, 1.0, 2.0]));
    }

    #[test]
    fn fewer_than_five_dropped() {
        let d = extract_averages("Learning Average : 10 5 2 1\nAttitude Average : 1 2 3 4 5");
        assert!(!d.contains_key(&Category::Learning));
        assert!(d.contains_key(&Category::Attitude));
    }

    #[test]
    fn more_than_five_dropped() {
        let d = extract_averages("Punctuality Average : 1 2 3 4 5 6");
        assert!(d.is_empty());
    }

    #[test]
    fn row_split_across_lines() {
        let d = extract_averages("Attitude Average :\n 20 10\n5 4\n   2");
        assert_eq!(d.get(&Category::Attitude), Some(&[20.0, 10.0, 5.0, 4.0, 2.0]));
    }

    #[test]
    fn non_ascii_digits_do_not_match() {
        let d = extract_averages("Learning Average : ١ 10 5 3 1 0\nAttitude Average : 1 2 3 4 5");
        assert!(!d.contains_key(&Category::Learning));
        assert!(d.contains_key(&Category::Attitude));
    }

    #[test]
    fn practical_and_overall_ignored() {
        let d = extract_averages("Practical Average : 1 1 1 1 1\nOverall Average : 2 2 2 2 2");
        assert!(d.is_empty());
    }

    #[test]
    fn expand_learning() {
        let mut d = RatingDistribution::new();
        d.insert(Category::Learning, [10.0, 5.0, 2.0, 1.0, 0.0]);
        let flat = expand(&d);
        let got: Vec<(&str, f64)> = flat.iter().collect();
        assert_eq!(
            got,
            vec![
                ("SA.averages.learning", 10.0),
                ("A.averages.learning", 5.0),
                ("U.averages.learning", 2.0),
                ("D.averages.learning", 1.0),
                ("SD.averages.learning", 0.0),
            ]
        );
    }

    #[test]
    fn expand_omits_missing_categories() {
        let flat = expand(&RatingDistribution::new());
        assert!(flat.is_empty());
        assert_eq!(flat.get("SA.averages.learning"), None);
    }

    #[test]
    fn fixture_page() {
        let text = std::fs::read_to_string("tests/fixtures/evaluation_page.txt").unwrap();
        let d = extract_averages(&text);
        assert_eq!(d.len(), 4);
        assert_eq!(d[&Category::Learning], [18.5, 12.25, 6.0, 3.0, 1.25]);
        assert_eq!(d[&Category::Attitude], [20.0, 10.0, 5.0, 4.0, 2.0]);

        let flat = expand(&d);
        assert_eq!(flat.len(), 20);
        assert_eq!(flat.get("SD.averages.assessment"), Some(2.0));
        assert!(flat.iter().all(|(k, _)| !k.contains("practical") && !k.contains("overall")));
    }

    #[test]
    fn partial_fixture() {
        let text = std::fs::read_to_string("tests/fixtures/partial_page.txt").unwrap();
        let d = extract_averages(&text);
        let cats: Vec<Category> = d.keys().copied().collect();
        assert_eq!(cats, vec![Category::Punctuality]);
        assert!(expand(&d).reports(Category::Punctuality));
        assert!(!expand(&d).reports(Category::Learning));
    }

    #[test]
    fn serializes_as_flat_object() {
        let mut flat = FlattenedAverages::default();
        flat.push("SA.averages.learning".into(), 10.0);
        flat.push("A.averages.learning".into(), 5.5);
        let json = serde_json::to_string(&flat).unwrap();
        assert_eq!(json, r#"{"SA.averages.learning":10.0,"A.averages.learning":5.5}"#);
        let back: FlattenedAverages = serde_json::from_str(r#"{"SA.averages.learning":10}"#).unwrap();
        assert_eq!(back.get("SA.averages.learning"), Some(10.0));
    }

    #[test]
    fn unknown_keys_survive_a_rewrite() {
        let raw = r#"{"SA.averages.learning":10.0,"note":"checked","legacy_id":12345,"flags":null}"#;
        let flat: FlattenedAverages = serde_json::from_str(raw).unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat.get("note"), None);
        assert_eq!(serde_json::to_string(&flat).unwrap(), raw);
    }
}

pub mod averages;
pub mod header;

use averages::FlattenedAverages;
use header::HeaderFields;

/// Everything pulled out of one page of report text.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub header: HeaderFields,
    pub averages: FlattenedAverages,
}

/// Header pass, then the rating rows, then flattening. Never fails: a page
/// with nothing recognizable yields an empty `ParsedPage`.
pub fn parse_page(text: &str) -> ParsedPage {
    let header = header::extract_header(text);
    let distribution = averages::extract_averages(text);
    ParsedPage {
        header,
        averages: averages::expand(&distribution),
    }
}

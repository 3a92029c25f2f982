//! Delimited export of classified records.
//!
//! One file per batch run, named after the run date, with a fixed header.
//! Fields are quoted only when they need to be (comma, quote, or newline in
//! the value), with embedded quotes doubled.

use crate::StoryLinkRecord;
use chrono::NaiveDate;

pub const CSV_HEADER: &str = "identity,story_id,url,category";

/// `output_final_<YYYYMMDD>.csv`, matching the artifact naming consumers of
/// previous runs already depend on.
pub fn csv_filename(date: NaiveDate) -> String {
    format!("output_final_{}.csv", date.format("%Y%m%d"))
}

/// Render all records as delimited text, header first, one row per record.
pub fn render_csv(records: &[StoryLinkRecord]) -> String {
    let mut out = String::with_capacity(64 + records.len() * 96);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for record in records {
        out.push_str(&field(&record.identity));
        out.push(',');
        out.push_str(&field(&record.story_id));
        out.push(',');
        out.push_str(&field(&record.url));
        out.push(',');
        out.push_str(&field(record.category.label()));
        out.push('\n');
    }
    out
}

fn field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LinkCategory;

    fn record(identity: &str, story_id: &str, url: &str, category: LinkCategory) -> StoryLinkRecord {
        StoryLinkRecord {
            identity: identity.to_string(),
            story_id: story_id.to_string(),
            url: url.to_string(),
            category,
        }
    }

    #[test]
    fn renders_header_and_rows() {
        let records = vec![
            record("ana", "321_1", "https://s.shopee.com.br/xyz", LinkCategory::Shopee),
            record("bia", "322_9", "https://unknown.example/x", LinkCategory::Unclassified),
        ];
        let csv = render_csv(&records);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "identity,story_id,url,category");
        assert_eq!(lines[1], "ana,321_1,https://s.shopee.com.br/xyz,Shopee");
        assert_eq!(lines[2], "bia,322_9,https://unknown.example/x,Unclassified");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn fields_with_delimiters_are_quoted() {
        let records = vec![record(
            "ana",
            "1",
            "https://example.com/?a=1,b=2",
            LinkCategory::Unclassified,
        )];
        let csv = render_csv(&records);
        assert!(csv.contains("\"https://example.com/?a=1,b=2\""));
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(super::field(r#"say "hi""#), r#""say ""hi""""#);
    }

    #[test]
    fn filename_carries_the_run_date() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 5).unwrap();
        assert_eq!(csv_filename(date), "output_final_20251105.csv");
    }

    #[test]
    fn empty_batch_still_produces_a_header() {
        assert_eq!(render_csv(&[]), "identity,story_id,url,category\n");
    }
}

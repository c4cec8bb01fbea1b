//! Candidate batch CSV: one row per candidate, resume linked in `pdf_url`.

use thiserror::Error;

const URL_COLUMN: &str = "pdf_url";
const NAME_COLUMN: &str = "name";

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRow {
    pub pdf_url: String,
    pub name: Option<String>,
}

impl CandidateRow {
    /// Label used in logs and the rejection table.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.pdf_url)
    }
}

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("CSV is malformed: {0}")]
    Malformed(#[from] csv::Error),

    #[error("CSV must have a 'pdf_url' column")]
    MissingUrlColumn,

    #[error("CSV contains no candidates")]
    Empty,
}

pub fn parse_candidate_csv(data: &[u8]) -> Result<Vec<CandidateRow>, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let find = |wanted: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(wanted))
    };
    let url_idx = find(URL_COLUMN).ok_or(CsvError::MissingUrlColumn)?;
    let name_idx = find(NAME_COLUMN);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(CandidateRow {
            pdf_url: record.get(url_idx).unwrap_or_default().to_string(),
            name: name_idx
                .and_then(|i| record.get(i))
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        });
    }

    if rows.is_empty() {
        return Err(CsvError::Empty);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_url_and_name() {
        let csv = "Name,PDF_URL\nAda,https://example.com/ada.pdf\n , https://example.com/anon.pdf\n";
        let rows = parse_candidate_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name.as_deref(), Some("Ada"));
        assert_eq!(rows[0].pdf_url, "https://example.com/ada.pdf");
        assert_eq!(rows[1].name, None);
        assert_eq!(rows[1].label(), "https://example.com/anon.pdf");
    }

    #[test]
    fn test_keeps_rows_with_empty_url() {
        let rows = parse_candidate_csv(b"pdf_url,name\n,Grace\n").unwrap();
        assert_eq!(rows[0].pdf_url, "");
        assert_eq!(rows[0].label(), "Grace");
    }

    #[test]
    fn test_bom_prefixed_header() {
        let rows = parse_candidate_csv("\u{feff}pdf_url\nhttps://x.test/a.pdf\n".as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_missing_url_column() {
        let result = parse_candidate_csv(b"name,resume\nAda,a.pdf\n");
        assert!(matches!(result, Err(CsvError::MissingUrlColumn)));
    }

    #[test]
    fn test_no_data_rows() {
        assert!(matches!(
            parse_candidate_csv(b"pdf_url\n"),
            Err(CsvError::Empty)
        ));
        assert!(matches!(
            parse_candidate_csv(b"pdf_url,name\n,\n"),
            Err(CsvError::Empty)
        ));
    }
}

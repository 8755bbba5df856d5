//! EDGAR submissions source.
//!
//! Polls `https://data.sec.gov/submissions/CIK##########.json` for a single
//! issuer.  The document lists recent filings as parallel column arrays
//! (`accessionNumber[i]`, `form[i]`, ...), newest first.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{DataSource, FeedEntry, FetchError};

const SUBMISSIONS_BASE: &str = "https://data.sec.gov/submissions";
const ARCHIVES_BASE: &str = "https://www.sec.gov/Archives/edgar/data";

#[derive(Debug, Deserialize)]
struct Submissions {
    #[serde(default)]
    filings: Filings,
}

#[derive(Debug, Default, Deserialize)]
struct Filings {
    #[serde(default)]
    recent: RecentFilings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentFilings {
    #[serde(default)]
    accession_number: Vec<String>,
    #[serde(default)]
    filing_date: Vec<String>,
    #[serde(default)]
    acceptance_date_time: Vec<String>,
    #[serde(default)]
    form: Vec<String>,
    #[serde(default)]
    primary_document: Vec<String>,
    #[serde(default)]
    primary_doc_description: Vec<String>,
}

/// Recent filings of one issuer, read from the EDGAR submissions API.
pub struct EdgarSource {
    cik: u64,
    url: String,
    label: String,
    client: reqwest::Client,
}

impl EdgarSource {
    /// `cik` is the issuer's Central Index Key; the URL is derived from it.
    pub fn new(cik: u64, user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        Self::with_url(cik, submissions_url(cik), user_agent, timeout)
    }

    /// Same as [`new`](Self::new) but reading from an explicit URL (mirrors,
    /// test servers).
    pub fn with_url(
        cik: u64,
        url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            cik,
            url: url.into(),
            label: format!("edgar:CIK{cik:010}"),
            client,
        })
    }

    /// Turn a submissions document into entries, newest first.
    ///
    /// Pure, so tests can feed it canned JSON.
    pub fn parse_submissions(cik: u64, body: &[u8]) -> Result<Vec<FeedEntry>, FetchError> {
        let doc: Submissions =
            serde_json::from_slice(body).map_err(|e| FetchError::Parse(e.to_string()))?;
        let recent = doc.filings.recent;

        let rows = [
            recent.accession_number.len(),
            recent.filing_date.len(),
            recent.form.len(),
        ]
        .into_iter()
        .min()
        .unwrap_or(0);
        if rows != recent.accession_number.len() {
            warn!(cik, rows, "submissions columns have unequal length; truncating");
        }

        let mut entries = Vec::with_capacity(rows);
        for i in 0..rows {
            let accession = &recent.accession_number[i];
            let form = &recent.form[i];
            let description = column(&recent.primary_doc_description, i);
            let document = column(&recent.primary_document, i);

            let Some(updated_at) = column(&recent.acceptance_date_time, i)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .or_else(|| midnight_utc(&recent.filing_date[i]))
            else {
                warn!(cik, accession = %accession, "skipping filing without a usable date");
                continue;
            };

            let title = match description {
                Some(d) if d != form => format!("{form} {d}"),
                _ => form.clone(),
            };

            match FeedEntry::new(accession.as_str(), title, filing_link(cik, accession, document), updated_at) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(cik, row = i, error = %e, "skipping filing"),
            }
        }

        Ok(entries)
    }
}

#[async_trait]
impl DataSource for EdgarSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<Vec<FeedEntry>, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let body = response.bytes().await?;
        debug!(source = %self.label, bytes = body.len(), "fetched submissions");
        Self::parse_submissions(self.cik, &body)
    }
}

pub fn submissions_url(cik: u64) -> String {
    format!("{SUBMISSIONS_BASE}/CIK{cik:010}.json")
}

fn column(values: &[String], i: usize) -> Option<&str> {
    values.get(i).map(String::as_str).filter(|s| !s.is_empty())
}

fn midnight_utc(date: &str) -> Option<DateTime<FixedOffset>> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let utc = FixedOffset::east_opt(0)?;
    utc.from_local_datetime(&day.and_hms_opt(0, 0, 0)?).single()
}

fn filing_link(cik: u64, accession: &str, document: Option<&str>) -> String {
    let folder = accession.replace('-', "");
    match document {
        Some(doc) => format!("{ARCHIVES_BASE}/{cik}/{folder}/{doc}"),
        None => format!("{ARCHIVES_BASE}/{cik}/{folder}/{accession}-index.htm"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CIK: u64 = 910267;

    fn sample() -> &'static str {
        r#"{
          "cik": "910267",
          "name": "PALATIN TECHNOLOGIES INC",
          "filings": {
            "recent": {
              "accessionNumber": ["0001493152-25-010001", "0001493152-25-009000", "0000910267-25-000003"],
              "filingDate": ["2025-03-14", "2025-03-10", "2025-02-28"],
              "acceptanceDateTime": ["2025-03-14T16:05:12.000Z", "", "2025-02-28T08:30:00.000Z"],
              "form": ["424B3", "8-K", "10-Q"],
              "primaryDocument": ["form424b3.htm", "form8-k.htm", ""],
              "primaryDocDescription": ["Prospectus", "8-K", "QUARTERLY REPORT"]
            }
          }
        }"#
    }

    #[test]
    fn submissions_url_pads_cik() {
        assert_eq!(
            submissions_url(CIK),
            "https://data.sec.gov/submissions/CIK0000910267.json"
        );
    }

    #[test]
    fn parses_rows_in_document_order() {
        let entries = EdgarSource::parse_submissions(CIK, sample().as_bytes()).unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id()).collect();
        assert_eq!(
            ids,
            ["0001493152-25-010001", "0001493152-25-009000", "0000910267-25-000003"]
        );
    }

    #[test]
    fn title_combines_form_and_description() {
        let entries = EdgarSource::parse_submissions(CIK, sample().as_bytes()).unwrap();
        assert_eq!(entries[0].title(), "424B3 Prospectus");
        // Description identical to the form code is not repeated.
        assert_eq!(entries[1].title(), "8-K");
        assert_eq!(entries[2].title(), "10-Q QUARTERLY REPORT");
    }

    #[test]
    fn link_points_at_primary_document_or_index() {
        let entries = EdgarSource::parse_submissions(CIK, sample().as_bytes()).unwrap();
        assert_eq!(
            entries[0].link(),
            "https://www.sec.gov/Archives/edgar/data/910267/000149315225010001/form424b3.htm"
        );
        assert_eq!(
            entries[2].link(),
            "https://www.sec.gov/Archives/edgar/data/910267/000091026725000003/0000910267-25-000003-index.htm"
        );
    }

    #[test]
    fn falls_back_to_filing_date() {
        let entries = EdgarSource::parse_submissions(CIK, sample().as_bytes()).unwrap();
        assert_eq!(entries[1].updated_at().to_rfc3339(), "2025-03-10T00:00:00+00:00");
        assert_eq!(entries[0].updated_at().to_rfc3339(), "2025-03-14T16:05:12+00:00");
    }

    #[test]
    fn truncates_to_shortest_column() {
        let body = r#"{"filings":{"recent":{
            "accessionNumber": ["a-1", "a-2"],
            "filingDate": ["2025-01-02"],
            "form": ["8-K", "8-K"]
        }}}"#;
        let entries = EdgarSource::parse_submissions(CIK, body.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id(), "a-1");
    }

    #[test]
    fn empty_accession_is_skipped() {
        let body = r#"{"filings":{"recent":{
            "accessionNumber": ["", "a-2"],
            "filingDate": ["2025-01-02", "2025-01-01"],
            "form": ["8-K", "424B3"]
        }}}"#;
        let entries = EdgarSource::parse_submissions(CIK, body.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id(), "a-2");
    }

    #[test]
    fn missing_filings_is_empty_not_error() {
        let entries = EdgarSource::parse_submissions(CIK, br#"{"cik":"910267"}"#).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = EdgarSource::parse_submissions(CIK, b"<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}

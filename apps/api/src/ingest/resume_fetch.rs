//! Resume download and PDF text extraction.

use std::io::Write;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::debug;

const DRIVE_HOST: &str = "drive.google.com";
/// A PDF header may be preceded by junk, but only within the first KiB.
const PDF_HEADER_WINDOW: usize = 1024;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("candidate has no pdf_url")]
    MissingUrl,

    #[error("invalid URL {0:?}")]
    InvalidUrl(String),

    #[error("invalid Google Drive URL {0:?}: no file id")]
    InvalidDriveUrl(String),

    #[error("failed to download PDF: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to download PDF: status {0}")]
    Status(u16),

    #[error("downloaded file is empty")]
    EmptyBody,

    #[error("downloaded file is not a PDF")]
    NotPdf,

    #[error("failed to stage PDF: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to extract PDF text: {0}")]
    Extract(String),

    #[error("PDF contains no extractable text")]
    NoText,
}

pub fn is_google_drive_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.contains(DRIVE_HOST)))
        .unwrap_or_else(|| url.contains(DRIVE_HOST))
}

/// File id from `...?id=<id>` or `.../d/<id>/...` Drive links.
pub fn google_drive_file_id(url: &str) -> Option<String> {
    if let Ok(parsed) = Url::parse(url) {
        if let Some((_, id)) = parsed.query_pairs().find(|(k, _)| k == "id") {
            if !id.is_empty() {
                return Some(id.into_owned());
            }
        }
    }
    url.split_once("/d/")
        .and_then(|(_, rest)| rest.split(['/', '?', '#']).next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// The URL to actually GET: Drive share links become direct-download links.
pub fn download_url(url: &str) -> Result<String, FetchError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(FetchError::MissingUrl);
    }
    if is_google_drive_url(url) {
        let id = google_drive_file_id(url)
            .ok_or_else(|| FetchError::InvalidDriveUrl(url.to_string()))?;
        return Ok(format!("https://{DRIVE_HOST}/uc?export=download&id={id}"));
    }
    Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    Ok(url.to_string())
}

fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Where resume text comes from. The pipeline only sees this seam.
#[async_trait]
pub trait ResumeSource: Send + Sync {
    async fn resume_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetches resumes over HTTP(S), following Google Drive share links.
pub struct HttpResumeSource {
    http: Client,
}

impl HttpResumeSource {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ResumeSource for HttpResumeSource {
    async fn resume_text(&self, url: &str) -> Result<String, FetchError> {
        fetch_resume_text(&self.http, url).await
    }
}

/// Downloads the resume and returns its text, all pages concatenated.
pub async fn fetch_resume_text(http: &Client, url: &str) -> Result<String, FetchError> {
    let target = download_url(url)?;
    debug!("Downloading resume from {target}");

    let response = http.get(&target).send().await?;
    if response.status() != StatusCode::OK {
        return Err(FetchError::Status(response.status().as_u16()));
    }

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(FetchError::EmptyBody);
    }
    pdf_to_text(bytes).await
}

/// Extracts the text of an in-memory PDF off the async runtime.
pub async fn pdf_to_text(bytes: Bytes) -> Result<String, FetchError> {
    if !looks_like_pdf(&bytes) {
        return Err(FetchError::NotPdf);
    }

    // pdf-extract is synchronous, CPU-bound and may panic on malformed input
    let text = tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
        .await
        .map_err(|e| FetchError::Extract(e.to_string()))??;

    if text.trim().is_empty() {
        return Err(FetchError::NoText);
    }
    Ok(text)
}

/// Stages the PDF in a temp file (removed on drop) and extracts its text.
fn extract_pdf_text(bytes: &[u8]) -> Result<String, FetchError> {
    let mut file = tempfile::Builder::new()
        .prefix("resume-")
        .suffix(".pdf")
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;

    pdf_extract::extract_text(file.path()).map_err(|e| FetchError::Extract(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_url_detection() {
        assert!(is_google_drive_url(
            "https://drive.google.com/file/d/abc123/view?usp=sharing"
        ));
        assert!(!is_google_drive_url("https://example.com/cv.pdf"));
    }

    #[test]
    fn test_drive_file_id_from_path() {
        assert_eq!(
            google_drive_file_id("https://drive.google.com/file/d/1AbC-xyz_9/view?usp=sharing")
                .as_deref(),
            Some("1AbC-xyz_9")
        );
    }

    #[test]
    fn test_drive_file_id_from_query() {
        assert_eq!(
            google_drive_file_id("https://drive.google.com/open?id=XYZ789").as_deref(),
            Some("XYZ789")
        );
    }

    #[test]
    fn test_drive_file_id_missing() {
        assert_eq!(google_drive_file_id("https://drive.google.com/drive/my-drive"), None);
    }

    #[test]
    fn test_download_url_rewrites_drive_links() {
        assert_eq!(
            download_url("https://drive.google.com/file/d/abc/view").unwrap(),
            "https://drive.google.com/uc?export=download&id=abc"
        );
    }

    #[test]
    fn test_download_url_passes_plain_links_through() {
        assert_eq!(
            download_url("  https://example.com/cv.pdf ").unwrap(),
            "https://example.com/cv.pdf"
        );
    }

    #[test]
    fn test_download_url_errors() {
        assert!(matches!(download_url(""), Err(FetchError::MissingUrl)));
        assert!(matches!(
            download_url("https://drive.google.com/drive/home"),
            Err(FetchError::InvalidDriveUrl(_))
        ));
        assert!(matches!(
            download_url("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_pdf_to_text_rejects_html() {
        let result = pdf_to_text(Bytes::from_static(b"<html>Sign in</html>")).await;
        assert!(matches!(result, Err(FetchError::NotPdf)));
    }

    #[test]
    fn test_pdf_header_sniffing() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(looks_like_pdf(b"\xef\xbb\xbf%PDF-1.4"));
        assert!(!looks_like_pdf(b"<!DOCTYPE html><html>"));
    }
}

//! Input resolution: turn a user-supplied path or URL into an [`UploadFile`].
//!
//! The workflow operates on in-memory files (the same shape a browser file
//! picker hands over), so both local paths and HTTP(S) downloads are read
//! fully into memory here. The PDF magic bytes (`%PDF`) and the upload size
//! limit are checked before returning, so callers get a meaningful error
//! instead of a failed render halfway through the workflow.

use crate::client::UploadFile;
use crate::error::ResumindError;
use crate::utils::format_size;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` (local path or URL) to an in-memory PDF.
pub async fn resolve_input(
    input: &str,
    max_bytes: u64,
    timeout_secs: u64,
) -> Result<UploadFile, ResumindError> {
    let file = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(Path::new(input)).await?
    };
    check_size(&file, max_bytes)?;
    Ok(file)
}

async fn read_local(path: &Path) -> Result<UploadFile, ResumindError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ResumindError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => ResumindError::FileRejected {
            reason: format!("Cannot read '{}': {}", path.display(), e),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "resume.pdf".to_string());
    check_magic(&name, &bytes)?;

    debug!("Resolved local PDF: {} ({})", path.display(), format_size(bytes.len() as u64));
    Ok(UploadFile::pdf(name, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadFile, ResumindError> {
    info!("Downloading PDF from: {}", url);
    let failed = |reason: String| ResumindError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let name = extract_filename(url);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| failed(e.to_string()))?
        .to_vec();
    check_magic(&name, &bytes)?;

    info!("Downloaded '{}' ({})", name, format_size(bytes.len() as u64));
    Ok(UploadFile::pdf(name, bytes))
}

fn check_magic(name: &str, bytes: &[u8]) -> Result<(), ResumindError> {
    if !bytes.starts_with(b"%PDF") {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ResumindError::NotAPdf {
            name: name.to_string(),
            magic,
        });
    }
    Ok(())
}

/// Reject a file that is not a PDF or exceeds `max_bytes`.
pub fn validate_upload(file: &UploadFile, max_bytes: u64) -> Result<(), ResumindError> {
    if file.bytes.is_empty() {
        return Err(ResumindError::FileRejected {
            reason: format!("'{}' is empty", file.name),
        });
    }
    if !file.looks_like_pdf() {
        return Err(ResumindError::FileRejected {
            reason: format!("'{}' is not a PDF file", file.name),
        });
    }
    check_size(file, max_bytes)
}

fn check_size(file: &UploadFile, max_bytes: u64) -> Result<(), ResumindError> {
    if file.size() > max_bytes {
        return Err(ResumindError::FileRejected {
            reason: format!(
                "'{}' is {}; the upload limit is {}",
                file.name,
                format_size(file.size()),
                format_size(max_bytes)
            ),
        });
    }
    Ok(())
}

/// Last path segment of the URL when it looks like a file name.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url() {
        assert_eq!(extract_filename("https://x.io/cv/Jane.pdf"), "Jane.pdf");
        assert_eq!(extract_filename("https://x.io/cv/"), "downloaded.pdf");
        assert_eq!(extract_filename("https://x.io/download"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn local_pdf_is_read_into_memory() {
        let mut f = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        f.write_all(b"%PDF-1.7\n...").unwrap();

        let file = resolve_input(f.path().to_str().unwrap(), 1024, 5)
            .await
            .unwrap();
        assert!(file.name.ends_with(".pdf"));
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.bytes, b"%PDF-1.7\n...");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 1024, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ResumindError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn non_pdf_is_rejected_by_magic() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04zip").unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 1024, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ResumindError::NotAPdf { magic, .. } if &magic == b"PK\x03\x04"));
    }

    #[tokio::test]
    async fn truncated_files_fail_the_magic_check() {
        for content in [&b""[..], b"%P", b"%PD"] {
            let mut f = tempfile::NamedTempFile::new().unwrap();
            f.write_all(content).unwrap();
            let err = resolve_input(f.path().to_str().unwrap(), 1024, 5)
                .await
                .unwrap_err();
            assert!(
                matches!(err, ResumindError::NotAPdf { .. }),
                "{content:?} was accepted"
            );
        }
    }

    #[tokio::test]
    async fn oversized_pdf_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7 0123456789").unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 8, 5)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("upload limit is 8 Bytes"));
    }

    #[test]
    fn validate_upload_checks_type_then_size() {
        let txt = UploadFile::new("notes.txt", "text/plain", b"hello".to_vec());
        assert!(matches!(
            validate_upload(&txt, 100),
            Err(ResumindError::FileRejected { .. })
        ));
        let pdf = UploadFile::pdf("cv.pdf", b"%PDF".to_vec());
        assert!(validate_upload(&pdf, 100).is_ok());
        assert!(validate_upload(&pdf, 2).is_err());
    }

    #[test]
    fn validate_upload_rejects_empty_pdf() {
        let empty = UploadFile::pdf("cv.pdf", Vec::new());
        let err = validate_upload(&empty, 100).unwrap_err();
        assert!(matches!(err, ResumindError::FileRejected { ref reason } if reason == "'cv.pdf' is empty"));
    }
}

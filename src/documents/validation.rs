//! Upload acceptance rules applied before anything is written.

use super::{DocumentError, UploadedFile};
use crate::config::UploadConfig;
use crate::extraction::MediaKind;

/// Check size, declared type, extension, and content of an upload.
///
/// Returns the media kind that drives extraction.
pub fn validate_upload(file: &UploadedFile, policy: &UploadConfig) -> Result<MediaKind, DocumentError> {
    let size = file.bytes.len() as u64;
    if size > policy.max_bytes {
        return Err(DocumentError::validation(format!(
            "File too large: {size} bytes exceeds the {} limit",
            describe_bytes(policy.max_bytes)
        )));
    }

    let declared = MediaKind::from_mime(&file.media_type)
        .filter(|kind| policy.accepted.contains(kind))
        .ok_or_else(|| unsupported(policy))?;
    let by_name = MediaKind::from_file_name(&file.file_name)
        .filter(|kind| policy.accepted.contains(kind))
        .ok_or_else(|| unsupported(policy))?;
    if declared != by_name {
        return Err(DocumentError::validation(format!(
            "File extension does not match its declared type {}",
            file.media_type
        )));
    }

    if let Some(detected) = sniff_conflict(declared, &file.bytes) {
        tracing::warn!(
            declared = %file.media_type,
            detected,
            "Upload content does not match declared type"
        );
        return Err(DocumentError::validation(format!(
            "File content does not match its declared type {}",
            file.media_type
        )));
    }

    Ok(declared)
}

/// MIME type detected from magic bytes when it contradicts `kind`.
///
/// Content the sniffer cannot classify passes; a damaged file of the declared type is an
/// extraction problem, not a validation one.
fn sniff_conflict(kind: MediaKind, bytes: &[u8]) -> Option<&'static str> {
    let detected = infer::get(bytes)?.mime_type();
    let consistent = detected == kind.mime()
        || match kind {
            // A DOCX is a zip archive and a DOC an OLE container; the sniffer may stop there.
            MediaKind::Docx => detected == "application/zip",
            MediaKind::Doc => detected == "application/x-ole-storage",
            MediaKind::PlainText => detected.starts_with("text/"),
            MediaKind::Pdf | MediaKind::Jpeg | MediaKind::Png => false,
        };
    (!consistent).then_some(detected)
}

fn unsupported(policy: &UploadConfig) -> DocumentError {
    let allowed: Vec<&str> = policy.accepted.iter().map(|kind| kind.extension()).collect();
    DocumentError::validation(format!(
        "Unsupported file type. Allowed types: {}",
        allowed.join(", ")
    ))
}

fn describe_bytes(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}

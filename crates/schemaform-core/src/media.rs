//! File-name and extension helpers shared by uploads and file views.

use serde::Serialize;

/// Lower-cased extension of a file name or URL, ignoring any query string
/// or fragment.
pub fn extension(name_or_url: &str) -> Option<String> {
    let trimmed = name_or_url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Last path component of a URL, suitable as a download file name.
pub fn file_name_from_url(url: &str) -> String {
    let trimmed = url.split(['?', '#']).next().unwrap_or_default();
    trimmed
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("download")
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileClass {
    Image,
    Pdf,
    Video,
    Audio,
    Document,
    Other,
}

impl FileClass {
    pub fn classify(name_or_url: &str) -> Self {
        match extension(name_or_url).as_deref() {
            Some("png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "bmp" | "avif") => {
                FileClass::Image
            }
            Some("pdf") => FileClass::Pdf,
            Some("mp4" | "mov" | "webm" | "mkv" | "avi") => FileClass::Video,
            Some("mp3" | "wav" | "ogg" | "m4a") => FileClass::Audio,
            Some("doc" | "docx" | "xls" | "xlsx" | "csv" | "ppt" | "pptx" | "txt" | "odt") => {
                FileClass::Document
            }
            _ => FileClass::Other,
        }
    }

    /// Storage folder used when a field gives no hint of its own.
    pub fn folder(self) -> &'static str {
        match self {
            FileClass::Image => "images",
            FileClass::Pdf | FileClass::Document => "documents",
            FileClass::Video | FileClass::Audio => "media",
            FileClass::Other => "files",
        }
    }
}

/// Folder-safe slug: lowercase ASCII alphanumerics joined by single dashes.
pub fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            if dash && !out.is_empty() {
                out.push('-');
            }
            dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            dash = true;
        }
    }
    out
}

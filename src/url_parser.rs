//! URL parser for extracting Google Drive IDs from URLs and link files.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{error, warn};

use crate::error::{DriveError, Result};

/// Marker that identifies a folder link anywhere in a line.
static FOLDER_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"drive\.google\.com/drive/(?:u/\d+/)?folders/([^?#/\s]*)")
        .expect("Invalid folder marker regex")
});

/// Regex patterns for Google Drive URLs.
static FOLDER_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/drive/(?:u/\d+/)?folders/([a-zA-Z0-9_-]+)")
        .expect("Invalid folder URL regex")
});

static FILE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/file/d/([a-zA-Z0-9_-]+)")
        .expect("Invalid file URL regex")
});

static OPEN_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/open\?id=([a-zA-Z0-9_-]+)")
        .expect("Invalid open URL regex")
});

/// Valid Google Drive ID pattern (alphanumeric, underscore, hyphen).
static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid ID regex"));

/// Extract a Google Drive ID from a URL or validate a raw ID.
///
/// Supports the following URL formats:
/// - `https://drive.google.com/drive/folders/<ID>`
/// - `https://drive.google.com/drive/u/0/folders/<ID>`
/// - `https://drive.google.com/file/d/<ID>/view`
/// - `https://drive.google.com/open?id=<ID>`
/// - Raw ID string
///
/// # Examples
///
/// ```
/// use drive_mirror::url_parser::extract_id;
///
/// let id = extract_id("https://drive.google.com/drive/folders/1abc123").unwrap();
/// assert_eq!(id, "1abc123");
///
/// let id = extract_id("1abc123").unwrap();
/// assert_eq!(id, "1abc123");
/// ```
pub fn extract_id(url_or_id: &str) -> Result<String> {
    let trimmed = url_or_id.trim();

    for regex in [&FOLDER_URL_REGEX, &FILE_URL_REGEX, &OPEN_URL_REGEX] {
        if let Some(id) = regex.captures(trimmed).and_then(|c| c.get(1)) {
            return Ok(id.as_str().to_string());
        }
    }

    if ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(DriveError::InvalidUrlOrId(url_or_id.to_string()))
}

/// Outcome of inspecting one line of a links file.
#[derive(Debug, PartialEq, Eq)]
pub enum LinkLine {
    /// The line holds a folder link with this ID.
    Folder(String),
    /// The line has the folder marker but no usable ID.
    Malformed,
    /// The line has nothing to do with folder links.
    Ignored,
}

/// Classify a single line of a links file.
///
/// The ID is the text after `.../folders/` up to the next `?` (also `#`, `/`
/// or whitespace), and must look like a Drive ID.
pub fn parse_link_line(line: &str) -> LinkLine {
    match FOLDER_MARKER_REGEX.captures(line).and_then(|c| c.get(1)) {
        Some(segment) if ID_REGEX.is_match(segment.as_str()) => {
            LinkLine::Folder(segment.as_str().to_string())
        }
        Some(_) => LinkLine::Malformed,
        None => LinkLine::Ignored,
    }
}

/// Extract folder IDs from the text of a links file, in order.
///
/// Duplicates are kept. Malformed folder links are logged and skipped.
pub fn extract_folder_ids(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| match parse_link_line(line) {
            LinkLine::Folder(id) => Some(id),
            LinkLine::Malformed => {
                warn!("Invalid folder link format: {}", line.trim());
                None
            }
            LinkLine::Ignored => None,
        })
        .collect()
}

/// Read a links file and extract its folder IDs.
///
/// A missing or unreadable file is logged and yields no IDs; the caller
/// decides whether an empty result is fatal.
pub fn read_folder_ids<P: AsRef<Path>>(path: P) -> Vec<String> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(content) => extract_folder_ids(&content),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            error!("Links file not found: {}", path.display());
            Vec::new()
        }
        Err(e) => {
            error!("Failed to read links file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

//! The remote side of a mirror: listing folders and fetching content.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FileMetadata, PDF_MIME_TYPE};

/// Classification of a listing result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    File,
}

/// One child returned by a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    pub kind: EntryKind,
    /// URL returning the raw bytes of the file.
    pub download_link: Option<String>,
    /// Export URLs keyed by target MIME type.
    pub export_links: Option<BTreeMap<String, String>>,
}

impl RemoteEntry {
    /// A folder entry.
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntryKind::Folder,
            download_link: None,
            export_links: None,
        }
    }

    /// A file entry with no content references attached yet.
    pub fn file(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntryKind::File,
            download_link: None,
            export_links: None,
        }
    }

    pub fn with_download_link(mut self, link: impl Into<String>) -> Self {
        self.download_link = Some(link.into());
        self
    }

    pub fn with_export_link(mut self, mime_type: impl Into<String>, link: impl Into<String>) -> Self {
        self.export_links
            .get_or_insert_with(BTreeMap::new)
            .insert(mime_type.into(), link.into());
        self
    }

    /// Build an entry from Drive metadata. `api_base` is used to derive the
    /// `alt=media` download URL for files with binary content.
    pub fn from_metadata(metadata: FileMetadata, api_base: &str) -> Self {
        if metadata.is_folder() {
            return Self::folder(metadata.id, metadata.name);
        }

        let download_link = metadata.has_binary_content().then(|| {
            format!(
                "{}/files/{}?alt=media&supportsAllDrives=true",
                api_base, metadata.id
            )
        });

        Self {
            id: metadata.id,
            name: metadata.name,
            kind: EntryKind::File,
            download_link,
            export_links: metadata.export_links.filter(|links| !links.is_empty()),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    /// The PDF export reference, if the entry offers one.
    pub fn pdf_export_link(&self) -> Option<&str> {
        self.export_links
            .as_ref()
            .and_then(|links| links.get(PDF_MIME_TYPE))
            .map(String::as_str)
    }
}

/// Source of folder listings and file content.
///
/// Implemented by [`crate::DriveClient`]; tests substitute an in-memory tree.
#[async_trait]
pub trait RemoteLister: Send + Sync {
    /// Display name of a folder.
    async fn folder_name(&self, folder_id: &str) -> Result<String>;

    /// Immediate children of a folder, in listing order.
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteEntry>>;

    /// Fetch the content behind `link` into `destination`, returning the
    /// number of bytes written. On error nothing is left at `destination`.
    async fn fetch_to(&self, link: &str, destination: &Path) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(mime: &str) -> FileMetadata {
        FileMetadata {
            id: "id1".to_string(),
            name: "entry".to_string(),
            mime_type: Some(mime.to_string()),
            size: None,
            export_links: None,
        }
    }

    #[test]
    fn test_binary_file_gets_download_link() {
        let entry = RemoteEntry::from_metadata(metadata("image/png"), "https://api.test/drive/v3");
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(
            entry.download_link.as_deref(),
            Some("https://api.test/drive/v3/files/id1?alt=media&supportsAllDrives=true")
        );
    }

    #[test]
    fn test_native_document_has_only_exports() {
        let mut meta = metadata("application/vnd.google-apps.spreadsheet");
        meta.export_links = Some(BTreeMap::from([(
            PDF_MIME_TYPE.to_string(),
            "https://docs.test/export?format=pdf".to_string(),
        )]));

        let entry = RemoteEntry::from_metadata(meta, "https://api.test/drive/v3");
        assert!(entry.download_link.is_none());
        assert_eq!(entry.pdf_export_link(), Some("https://docs.test/export?format=pdf"));
    }

    #[test]
    fn test_folder_metadata_maps_to_folder() {
        let entry = RemoteEntry::from_metadata(
            metadata("application/vnd.google-apps.folder"),
            "https://api.test/drive/v3",
        );
        assert!(entry.is_folder());
        assert!(entry.download_link.is_none());
    }

    #[test]
    fn test_shortcut_has_no_content() {
        let entry = RemoteEntry::from_metadata(
            metadata("application/vnd.google-apps.shortcut"),
            "https://api.test/drive/v3",
        );
        assert!(entry.download_link.is_none());
        assert!(entry.export_links.is_none());
        assert!(entry.pdf_export_link().is_none());
    }
}

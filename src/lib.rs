//! drive_mirror - Bulk-download Google Drive folders into a local mirror.
//!
//! This library provides functionality to:
//! - Extract folder IDs from a file of Google Drive links
//! - Count the files below a set of folders
//! - Recursively mirror folders to the local filesystem, skipping files
//!   that are already present and exporting native documents as PDF
//!
//! # Example
//!
//! ```no_run
//! use drive_mirror::{bulk_download, Authenticator, DriveClient, MirrorConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::installed_app("client_secrets.json", "credentials.json");
//!     auth.authenticate().await?;
//!     let client = DriveClient::new(auth);
//!
//!     let summary = bulk_download(&client, &MirrorConfig::default()).await?;
//!     println!("{} files downloaded", summary.report.downloaded());
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod bulk;
pub mod client;
pub mod config;
pub mod counter;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod models;
pub mod progress;
pub mod remote;
pub mod url_parser;

// Re-exports for convenience
pub use auth::Authenticator;
pub use bulk::{bulk_download, RunSummary};
pub use client::DriveClient;
pub use config::MirrorConfig;
pub use counter::{count_all, count_files};
pub use error::{DriveError, Result};
pub use mirror::{FileOutcome, Mirror, UnavailableReason, WalkReport};
pub use models::FileMetadata;
pub use progress::Progress;
pub use remote::{EntryKind, RemoteEntry, RemoteLister};
pub use url_parser::{extract_folder_ids, extract_id, read_folder_ids};

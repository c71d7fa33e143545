// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

//! # Unitlab Client Library
//!
//! A Rust client for the Unitlab annotation platform SDK API.  It
//! authenticates with an API key and lists, uploads and downloads projects
//! and datasets.
//!
//! ## Features
//!
//! - **Projects**: list projects, inspect members and upload constraints
//! - **Batch upload**: concurrent, bounded upload of local files into a
//!   project with progress reporting
//! - **Datasets**: export annotations or download every dataset file
//! - **COCO import**: create a dataset from a COCO annotation file
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use unitlab_client::{Client, Error};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     // Reads UNITLAB_API_KEY or ~/.unitlab/credentials
//!     let client = Client::new()?;
//!
//!     let projects = client.projects().await?;
//!     println!("Found {} projects", projects.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Environment
//!
//! | Variable | Default | |
//! |----------|---------|-|
//! | `UNITLAB_API_KEY` | | API key |
//! | `UNITLAB_API_URL` | `https://api.unitlab.ai` | API base URL |
//! | `UNITLAB_TIMEOUT` | 30 | Request timeout in seconds |
//! | `UNITLAB_MAX_RETRIES` | 3 | Retries per request |
//! | `UNITLAB_UPLOAD_TASKS` | 20 | Concurrent uploads |
//! | `UNITLAB_DOWNLOAD_TASKS` | 50 | Concurrent downloads |

mod api;
mod client;
mod download;
mod error;
mod retry;
mod storage;
mod upload;

pub mod coco;

pub use crate::{
    api::{
        AnnotationType, Dataset, DatasetFile, DatasetID, DownloadType, Project, ProjectID,
        ProjectMember, UploadInfo, Worker,
    },
    client::{Client, ClientOptions, Progress, download_concurrency, upload_concurrency},
    download::{DownloadSummary, safe_path},
    error::Error,
    retry::{RetryScope, classify_url},
    storage::{
        CredentialStorage, Credentials, DEFAULT_API_URL, FileCredentialStorage,
        MemoryCredentialStorage, StorageError,
    },
    upload::{UploadOptions, UploadSummary, discover_files, filter_by_size},
};

#[cfg(test)]
mod tests {
    #[ctor::ctor]
    fn init() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .is_test(true)
            .init();
    }
}

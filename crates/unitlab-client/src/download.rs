// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

//! Dataset downloads: exported annotation files and raw dataset files.

use crate::{
    Client, Error, Progress,
    api::{AnnotationExport, DatasetFile, DatasetID, DownloadRequest, DownloadType},
    client::{ProgressTracker, check_response, download_concurrency, parallel_foreach_items},
};
use futures::StreamExt as _;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt as _, sync::mpsc::Sender};
use url::Url;

/// Outcome of [`Client::dataset_download_files`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    /// Folder the dataset was written to.
    pub directory: PathBuf,
    /// Files written from inline content.
    pub written: usize,
    /// Files fetched from their source URL.
    pub downloaded: usize,
    pub failed: usize,
    /// Files skipped because they were already present.
    pub existing: usize,
}

impl std::fmt::Display for DownloadSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} written, {} downloaded, {} failed, {} already present in {}",
            self.written,
            self.downloaded,
            self.failed,
            self.existing,
            self.directory.display()
        )
    }
}

/// Resolves a server provided relative `name` inside `base`.
///
/// The check is lexical: absolute paths, drive prefixes and `..` components
/// that climb above `base` are rejected with [`Error::PathTraversal`].
///
/// ```rust
/// use std::path::Path;
/// use unitlab_client::safe_path;
///
/// let base = Path::new("/data/release");
/// assert_eq!(
///     safe_path(base, "images/./a.jpg").unwrap(),
///     base.join("images/a.jpg")
/// );
/// assert!(safe_path(base, "../outside.txt").is_err());
/// assert!(safe_path(base, "/etc/passwd").is_err());
/// ```
pub fn safe_path(base: &Path, name: &str) -> Result<PathBuf, Error> {
    let mut relative = PathBuf::new();

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(Error::PathTraversal(name.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathTraversal(name.to_string()));
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(Error::InvalidParameters(format!(
            "'{}' does not name a file",
            name
        )));
    }

    Ok(base.join(relative))
}

/// The last non-empty path segment of a URL, used as the local file name.
fn url_file_name(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Streams `url` into `path` without API credentials.  A partially written
/// file is removed when the transfer fails.
pub(crate) async fn download_to_file(
    http: &reqwest::Client,
    url: &str,
    path: &Path,
) -> Result<(), Error> {
    let result = stream_to_file(http, url, path).await;
    if result.is_err() && fs::try_exists(path).await.unwrap_or(false) {
        if let Err(e) = fs::remove_file(path).await {
            warn!("Failed to remove partial file {}: {}", path.display(), e);
        }
    }
    result
}

async fn stream_to_file(http: &reqwest::Client, url: &str, path: &Path) -> Result<(), Error> {
    let resp = check_response(http.get(url).send().await?).await?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = fs::File::create(path).await?;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;

    Ok(())
}

impl Client {
    /// Export a dataset's annotations and save the file into `output_dir`.
    ///
    /// The server answers with the URL of the exported file; it is saved
    /// under the last segment of that URL and its absolute path is returned.
    pub async fn dataset_download(
        &self,
        dataset_id: DatasetID,
        export_type: &str,
        split_type: Option<&str>,
        output_dir: &Path,
    ) -> Result<PathBuf, Error> {
        let request = DownloadRequest {
            download_type: DownloadType::Annotation,
            export_type: Some(export_type),
            split_type,
        };

        let export: AnnotationExport = self
            .post_json(&format!("/api/sdk/datasets/{}/", dataset_id), Some(&request))
            .await?;

        let url = Url::parse(&export.file)?;
        let file_name = url_file_name(&url).ok_or(Error::InvalidResponse)?;
        let path = safe_path(output_dir, &file_name)?;

        fs::create_dir_all(output_dir).await?;
        download_to_file(&self.transfer, url.as_str(), &path).await?;

        let path = fs::canonicalize(&path).await?;
        info!("File: {}", path.display());
        Ok(path)
    }

    /// Download every file of a dataset into `output_dir/<dataset id>`.
    ///
    /// Inline content is written directly, other files are fetched from their
    /// source URL with at most
    /// [`download_concurrency`][crate::download_concurrency] transfers in
    /// flight.  Files that already exist are left untouched.  A server
    /// provided name escaping the target folder fails the call before
    /// anything is written.
    pub async fn dataset_download_files(
        &self,
        dataset_id: DatasetID,
        output_dir: &Path,
        progress: Option<Sender<Progress>>,
    ) -> Result<DownloadSummary, Error> {
        let request = DownloadRequest {
            download_type: DownloadType::Files,
            export_type: None,
            split_type: None,
        };

        let files: Vec<DatasetFile> = self
            .post_json(&format!("/api/sdk/datasets/{}/", dataset_id), Some(&request))
            .await?;

        let base = output_dir.join(dataset_id.to_string());
        let entries = files
            .into_iter()
            .map(|file| safe_path(&base, &file.file_name).map(|path| (path, file)))
            .collect::<Result<Vec<_>, _>>()?;

        fs::create_dir_all(&base).await?;

        let mut summary = DownloadSummary {
            directory: base.clone(),
            ..Default::default()
        };
        let mut queue = Vec::new();

        for (path, file) in entries {
            if fs::try_exists(&path).await? {
                debug!("{} already exists", path.display());
                summary.existing += 1;
                continue;
            }

            match (file.content, file.source) {
                (Some(content), _) => {
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent).await?;
                    }
                    fs::write(&path, content.as_bytes()).await?;
                    summary.written += 1;
                }
                (None, Some(source)) => queue.push((path, source)),
                (None, None) => {
                    warn!("{} has neither content nor source", file.file_name);
                    summary.failed += 1;
                }
            }
        }

        if !queue.is_empty() {
            let tracker = ProgressTracker::new(queue.len(), progress);
            tracker.start().await;

            let http = self.transfer.clone();
            let results = parallel_foreach_items(
                queue,
                download_concurrency(),
                &tracker,
                move |(path, source): (PathBuf, String)| {
                    let http = http.clone();
                    async move {
                        let result = download_to_file(&http, &source, &path).await;
                        if let Err(e) = &result {
                            error!("Failed to download {}: {}", path.display(), e);
                        }
                        result
                    }
                },
            )
            .await;

            for result in results {
                match result {
                    Ok(()) => summary.downloaded += 1,
                    Err(Error::JoinError(e)) => {
                        error!("Download task failed: {}", e);
                        summary.failed += 1;
                    }
                    Err(_) => summary.failed += 1,
                }
            }
        }

        info!("Dataset {}: {}", dataset_id, summary);
        Ok(summary)
    }
}

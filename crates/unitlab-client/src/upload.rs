// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

//! Batch upload of local files into a project.

use crate::{
    Client, Error, Progress,
    api::ProjectID,
    client::{ProgressTracker, check_response, parallel_foreach_items, upload_concurrency},
};
use log::{debug, error, info, warn};
use reqwest::{
    Body,
    multipart::{Form, Part},
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::{fs::File, sync::mpsc::Sender};
use tokio_util::codec::{BytesCodec, FramedRead};
use walkdir::WalkDir;

/// Tuning for [`Client::project_upload_data`].
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Files per batch.  A batch completes before the next one starts.
    pub batch_size: usize,
    /// Sentences per chunk, sent for text projects.
    pub sentences_per_chunk: u32,
    /// Frames per second to sample, sent for video projects.
    pub fps: f64,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions {
            batch_size: 100,
            sentences_per_chunk: 10,
            fps: 1.0,
        }
    }
}

/// Outcome of a batch upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl std::fmt::Display for UploadSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} uploaded, {} failed, {} skipped",
            self.uploaded, self.failed, self.skipped
        )
    }
}

fn normalize_format(format: &str) -> String {
    format.trim().trim_start_matches('.').to_lowercase()
}

/// Regular files directly inside `directory` whose extension is one of
/// `accepted_formats`, sorted by path.  Sub-directories are not visited and
/// files without an extension are ignored.
pub fn discover_files(
    directory: &Path,
    accepted_formats: &[String],
) -> Result<Vec<PathBuf>, Error> {
    let formats = accepted_formats
        .iter()
        .map(|f| normalize_format(f))
        .collect::<Vec<_>>();

    let mut files = Vec::new();
    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let extension = entry
            .path()
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());

        match extension {
            Some(ext) if formats.contains(&ext) => files.push(entry.into_path()),
            Some(_) => debug!("Skipping {:?}: format not accepted", entry.path()),
            None => debug!("Skipping {:?}: no extension", entry.path()),
        }
    }

    files.sort();
    Ok(files)
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Splits files into those within `max_file_size` bytes and the number of
/// files that were too large.
pub fn filter_by_size(
    files: Vec<PathBuf>,
    max_file_size: u64,
) -> Result<(Vec<PathBuf>, usize), Error> {
    let mut accepted = Vec::with_capacity(files.len());
    let mut skipped = 0;

    for file in files {
        let size = file.metadata()?.len();
        if size > max_file_size {
            warn!(
                "Skipping {}: {:.4} MB exceeds the maximum file size of {:.2} MB",
                file.display(),
                megabytes(size),
                megabytes(max_file_size)
            );
            skipped += 1;
        } else {
            accepted.push(file);
        }
    }

    Ok((accepted, skipped))
}

/// Multipart part streaming the file from disk.
pub(crate) async fn file_part(path: &Path) -> Result<Part, Error> {
    let file = File::open(path).await?;
    let length = file.metadata().await?.len();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| Error::InvalidParameters(format!("{} is not a file", path.display())))?;

    let stream = FramedRead::new(file, BytesCodec::new());
    Ok(Part::stream_with_length(Body::wrap_stream(stream), length).file_name(file_name))
}

impl Client {
    /// Upload every accepted file in `directory` to a project.
    ///
    /// Files are filtered by the project's accepted formats and size limit,
    /// then uploaded in batches of `options.batch_size` with at most
    /// [`upload_concurrency`][crate::upload_concurrency] requests in flight.
    /// A failed file is logged and counted without stopping the upload.
    ///
    /// ```no_run
    /// use std::{path::Path, str::FromStr};
    /// use unitlab_client::{Client, ProjectID, UploadOptions};
    ///
    /// # async fn example() -> Result<(), unitlab_client::Error> {
    /// let client = Client::new()?;
    /// let project = ProjectID::from_str("0b4e6f2a-5f7c-4a53-9d1c-1c3b4a8e2f11")?;
    /// let summary = client
    ///     .project_upload_data(project, Path::new("images"), &UploadOptions::default(), None)
    ///     .await?;
    /// println!("{}", summary);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn project_upload_data(
        &self,
        project_id: ProjectID,
        directory: &Path,
        options: &UploadOptions,
        progress: Option<Sender<Progress>>,
    ) -> Result<UploadSummary, Error> {
        if !directory.is_dir() {
            return Err(Error::InvalidParameters(format!(
                "Directory {} does not exist",
                directory.display()
            )));
        }
        if options.batch_size == 0 {
            return Err(Error::InvalidParameters(
                "Batch size must be greater than zero".to_string(),
            ));
        }

        let info = self.project_upload_info(project_id).await?;
        let files = discover_files(directory, &info.accepted_formats)?;
        let (files, skipped) = filter_by_size(files, info.max_file_size)?;

        let mut summary = UploadSummary {
            skipped,
            ..Default::default()
        };

        if files.is_empty() {
            warn!(
                "No files in {} match the accepted formats: {}",
                directory.display(),
                info.accepted_formats.join(", ")
            );
            return Ok(summary);
        }

        let generic_type = info.generic_type.to_lowercase();
        let path = format!("/api/sdk/projects/{}/upload-data/", project_id);
        let tracker = ProgressTracker::new(files.len(), progress);
        tracker.start().await;

        let n_batches = files.len().div_ceil(options.batch_size);
        for (index, batch) in files.chunks(options.batch_size).enumerate() {
            debug!(
                "Uploading batch {}/{} ({} files)",
                index + 1,
                n_batches,
                batch.len()
            );

            let client = self.clone();
            let path = path.clone();
            let generic_type = generic_type.clone();
            let options = options.clone();

            let results = parallel_foreach_items(
                batch.to_vec(),
                upload_concurrency(),
                &tracker,
                move |file: PathBuf| {
                    let client = client.clone();
                    let path = path.clone();
                    let generic_type = generic_type.clone();
                    let options = options.clone();

                    async move {
                        let result =
                            upload_file(&client, &path, &file, &generic_type, &options).await;
                        if let Err(e) = &result {
                            error!("Failed to upload {}: {}", file.display(), e);
                        }
                        result.map(|_| file)
                    }
                },
            )
            .await;

            for result in results {
                match result {
                    Ok(file) => {
                        debug!("Uploaded {}", file.display());
                        summary.uploaded += 1;
                    }
                    Err(Error::JoinError(e)) => {
                        error!("Upload task failed: {}", e);
                        summary.failed += 1;
                    }
                    Err(_) => summary.failed += 1,
                }
            }
        }

        info!("Project {} upload: {}", project_id, summary);
        Ok(summary)
    }
}

async fn upload_file(
    client: &Client,
    path: &str,
    file: &Path,
    generic_type: &str,
    options: &UploadOptions,
) -> Result<(), Error> {
    let form = Form::new().part("file", file_part(file).await?);
    let form = match generic_type {
        "text" => form.text("sentences_per_chunk", options.sentences_per_chunk.to_string()),
        "video" => form.text("fps", options.fps.to_string()),
        _ => form,
    };

    let resp = client.post_multipart(path, form).await?;
    check_response(resp).await?;
    Ok(())
}

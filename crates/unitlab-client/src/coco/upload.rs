// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

use super::index::CocoIndex;
use crate::{
    Client, Error, Progress,
    api::{AnnotationType, DatasetID},
    client::{ProgressTracker, check_response, parallel_foreach_items, upload_concurrency},
    download::safe_path,
    upload::{UploadSummary, file_part},
};
use log::{debug, error, info, warn};
use reqwest::multipart::Form;
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::mpsc::Sender;

const DATASOURCE_LIMIT: &str =
    "You have reached the maximum number of datasources for your subscription.";

/// Pause before each upload request.
const UPLOAD_INTERVAL: Duration = Duration::from_millis(100);

fn upload_endpoint(dataset_id: DatasetID) -> String {
    format!("/api/sdk/datasets/{}/upload/", dataset_id)
}

struct ImageUpload {
    path: PathBuf,
    payload: String,
}

impl Client {
    /// Create a dataset from a COCO annotation file and upload every
    /// annotated image found under `data_path`.
    ///
    /// Images whose file is missing or that carry no annotations are skipped
    /// with a warning.  A subscription limit (HTTP 403) stops the upload and
    /// is returned as [`Error::SubscriptionError`]; any other failed image
    /// is logged and counted.
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use unitlab_client::{AnnotationType, Client};
    ///
    /// # async fn example() -> Result<(), unitlab_client::Error> {
    /// let client = Client::new()?;
    /// let summary = client
    ///     .dataset_upload(
    ///         "Traffic",
    ///         AnnotationType::Bbox,
    ///         Path::new("annotations/instances.json"),
    ///         Path::new("images"),
    ///         100,
    ///         None,
    ///     )
    ///     .await?;
    /// println!("{}", summary);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn dataset_upload(
        &self,
        name: &str,
        annotation_type: AnnotationType,
        annotation_path: &Path,
        data_path: &Path,
        batch_size: usize,
        progress: Option<Sender<Progress>>,
    ) -> Result<UploadSummary, Error> {
        if !data_path.is_dir() {
            return Err(Error::InvalidParameters(format!(
                "Data path '{}' does not exist or is not a directory",
                data_path.display()
            )));
        }
        if batch_size == 0 {
            return Err(Error::InvalidParameters(
                "Batch size must be greater than zero".to_string(),
            ));
        }

        let index = CocoIndex::from_path(annotation_path)?;
        let dataset = self
            .create_dataset(name, annotation_type, index.classes())
            .await?;
        info!("Created dataset {} ({})", dataset.name(), dataset.id());

        let mut summary = UploadSummary::default();
        let mut uploads = Vec::new();

        for image_id in index.img_ids(&[], &[]) {
            let Some(image) = index.imgs.get(&image_id) else {
                continue;
            };

            // Names resolving outside of data_path are never read.
            let path = match safe_path(data_path, &image.file_name) {
                Ok(path) => path,
                Err(e) => {
                    error!("Invalid image file name {:?}: {}", image.file_name, e);
                    summary.failed += 1;
                    continue;
                }
            };
            if !path.is_file() {
                warn!("Image file not found: {}", path.display());
                summary.skipped += 1;
                continue;
            }

            let annotations = index.annotations_for_image(image_id);
            if annotations.is_empty() {
                warn!("No annotations found for image: {}", image_id);
                summary.skipped += 1;
                continue;
            }

            match index.payload(annotation_type, annotations) {
                Ok(payload) => uploads.push(ImageUpload { path, payload }),
                Err(e) => {
                    error!("Cannot build payload for {}: {}", image.file_name, e);
                    summary.failed += 1;
                }
            }
        }

        let endpoint = upload_endpoint(dataset.id());
        let tracker = ProgressTracker::new(uploads.len(), progress);
        tracker.start().await;
        let aborted = Arc::new(AtomicBool::new(false));

        let mut pending = uploads.into_iter().peekable();
        while pending.peek().is_some() {
            let batch = pending.by_ref().take(batch_size).collect::<Vec<_>>();
            debug!("Uploading {} images to dataset {}", batch.len(), dataset.id());

            let client = self.clone();
            let endpoint = endpoint.clone();
            let aborted_flag = aborted.clone();

            let results = parallel_foreach_items(
                batch,
                upload_concurrency(),
                &tracker,
                move |upload: ImageUpload| {
                    let client = client.clone();
                    let endpoint = endpoint.clone();
                    let aborted = aborted_flag.clone();

                    async move {
                        if aborted.load(Ordering::SeqCst) {
                            return Err(Error::SubscriptionError(DATASOURCE_LIMIT.to_string()));
                        }

                        let result = upload_image(&client, &endpoint, &upload).await;
                        match &result {
                            Ok(()) => debug!("Uploaded {}", upload.path.display()),
                            Err(Error::SubscriptionError(_)) => {
                                aborted.store(true, Ordering::SeqCst)
                            }
                            Err(e) => {
                                error!("Error uploading file {} - {}", upload.path.display(), e)
                            }
                        }
                        result
                    }
                },
            )
            .await;

            for result in results {
                match result {
                    Ok(()) => summary.uploaded += 1,
                    Err(Error::SubscriptionError(msg)) => {
                        error!("{}", msg);
                        return Err(Error::SubscriptionError(msg));
                    }
                    Err(_) => summary.failed += 1,
                }
            }
        }

        info!("Dataset {} upload: {}", dataset.id(), summary);
        Ok(summary)
    }
}

async fn upload_image(client: &Client, endpoint: &str, upload: &ImageUpload) -> Result<(), Error> {
    let form = Form::new()
        .part("file", file_part(&upload.path).await?)
        .text("result", upload.payload.clone());

    tokio::time::sleep(UPLOAD_INTERVAL).await;
    let resp = client.post_multipart(endpoint, form).await?;

    match resp.status().as_u16() {
        403 => Err(Error::SubscriptionError(DATASOURCE_LIMIT.to_string())),
        400 => {
            let body = resp.text().await.unwrap_or_default();
            Err(Error::NetworkError(format!("Bad request: {}", body)))
        }
        _ => {
            check_response(resp).await?;
            Ok(())
        }
    }
}

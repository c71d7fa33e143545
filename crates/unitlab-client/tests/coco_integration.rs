// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

//! End-to-end COCO dataset upload against a local mock server.

use mockito::{Matcher, Server};
use serde_json::json;
use std::{path::Path, sync::Arc, time::Duration};
use tempfile::TempDir;
use unitlab_client::{
    AnnotationType, Client, ClientOptions, Error, MemoryCredentialStorage, Progress,
    UploadSummary,
};

const DATASET: &str = "5d1f7a0e-8c2b-4f39-a6e4-2b9c0d3e4f51";

fn test_client(url: &str) -> Client {
    Client::from_storage(
        Arc::new(MemoryCredentialStorage::new()),
        ClientOptions {
            timeout: Duration::from_secs(5),
            max_retries: 0,
        },
    )
    .unwrap()
    .with_api_url(url)
    .unwrap()
    .with_api_key("secret")
}

/// Writes an annotation file with four images: `a.jpg` and `b.jpg` are
/// annotated and present, `missing.jpg` has no file and `bare.jpg` has no
/// annotations.
fn write_fixture(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let images = dir.join("images");
    std::fs::create_dir_all(&images).unwrap();
    for name in ["a.jpg", "b.jpg", "bare.jpg"] {
        std::fs::write(images.join(name), b"jpeg bytes").unwrap();
    }

    let annotations = json!({
        "images": [
            {"id": 1, "file_name": "a.jpg", "width": 64, "height": 48},
            {"id": 2, "file_name": "b.jpg", "width": 64, "height": 48},
            {"id": 3, "file_name": "missing.jpg", "width": 64, "height": 48},
            {"id": 4, "file_name": "bare.jpg", "width": 64, "height": 48},
        ],
        "categories": [
            {"id": 5, "name": "dog"},
            {"id": 2, "name": "cat"},
        ],
        "annotations": [
            {"id": 1, "image_id": 1, "category_id": 5, "bbox": [1, 2, 3, 4], "area": 12},
            {"id": 2, "image_id": 2, "category_id": 2, "bbox": [0, 0, 10, 10], "area": 100},
            {"id": 3, "image_id": 3, "category_id": 2, "bbox": [0, 0, 1, 1], "area": 1},
        ],
    });
    let annotation_path = dir.join("instances.json");
    std::fs::write(&annotation_path, annotations.to_string()).unwrap();

    (annotation_path, images)
}

async fn mock_create(server: &mut Server) -> mockito::Mock {
    server
        .mock("POST", "/api/sdk/datasets/create/")
        .match_body(Matcher::Json(json!({
            "name": "Pets",
            "annotation_type": "img_bbox",
            "classes": [{"name": "cat", "value": 0}, {"name": "dog", "value": 1}],
        })))
        .with_status(201)
        .with_body(json!({"pk": DATASET, "name": "Pets"}).to_string())
        .create_async()
        .await
}

#[tokio::test]
async fn test_dataset_upload() {
    let dir = TempDir::new().unwrap();
    let (annotation_path, images) = write_fixture(dir.path());
    let mut server = Server::new_async().await;

    let create = mock_create(&mut server).await;
    let upload = server
        .mock("POST", format!("/api/sdk/datasets/{}/upload/", DATASET).as_str())
        .match_header("authorization", "Api-Key secret")
        .match_body(Matcher::Regex("name=\"result\"".to_string()))
        .with_status(201)
        .expect(2)
        .create_async()
        .await;

    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    let summary = test_client(&server.url())
        .dataset_upload(
            "Pets",
            AnnotationType::Bbox,
            &annotation_path,
            &images,
            1,
            Some(tx),
        )
        .await
        .unwrap();

    assert_eq!(
        summary,
        UploadSummary {
            uploaded: 2,
            failed: 0,
            skipped: 2,
        }
    );
    create.assert_async().await;
    upload.assert_async().await;

    let mut last = None;
    while let Some(progress) = rx.recv().await {
        last = Some(progress);
    }
    assert_eq!(last, Some(Progress { current: 2, total: 2 }));
}

#[tokio::test]
async fn test_dataset_upload_bad_request_is_counted() {
    let dir = TempDir::new().unwrap();
    let (annotation_path, images) = write_fixture(dir.path());
    let mut server = Server::new_async().await;

    let _create = mock_create(&mut server).await;
    let _rejected = server
        .mock("POST", format!("/api/sdk/datasets/{}/upload/", DATASET).as_str())
        .match_body(Matcher::Regex("filename=\"a.jpg\"".to_string()))
        .with_status(400)
        .with_body(r#"{"result": "invalid payload"}"#)
        .create_async()
        .await;
    let _accepted = server
        .mock("POST", format!("/api/sdk/datasets/{}/upload/", DATASET).as_str())
        .match_body(Matcher::Regex("filename=\"b.jpg\"".to_string()))
        .with_status(201)
        .create_async()
        .await;

    let summary = test_client(&server.url())
        .dataset_upload("Pets", AnnotationType::Bbox, &annotation_path, &images, 100, None)
        .await
        .unwrap();

    assert_eq!(summary.uploaded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 2);
}

#[tokio::test]
async fn test_dataset_upload_subscription_limit() {
    let dir = TempDir::new().unwrap();
    let (annotation_path, images) = write_fixture(dir.path());
    let mut server = Server::new_async().await;

    let _create = mock_create(&mut server).await;
    let _limit = server
        .mock("POST", format!("/api/sdk/datasets/{}/upload/", DATASET).as_str())
        .with_status(403)
        .create_async()
        .await;

    let result = test_client(&server.url())
        .dataset_upload("Pets", AnnotationType::Bbox, &annotation_path, &images, 1, None)
        .await;

    match result {
        Err(Error::SubscriptionError(msg)) => assert_eq!(
            msg,
            "You have reached the maximum number of datasources for your subscription."
        ),
        other => panic!("expected subscription error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_dataset_upload_stays_inside_data_path() {
    let dir = TempDir::new().unwrap();
    let images = dir.path().join("images");
    std::fs::create_dir_all(&images).unwrap();
    std::fs::write(images.join("a.jpg"), b"jpeg bytes").unwrap();
    std::fs::write(dir.path().join("secret.jpg"), b"private bytes").unwrap();
    let absolute = dir.path().join("secret.jpg");

    let annotations = json!({
        "images": [
            {"id": 1, "file_name": "a.jpg"},
            {"id": 2, "file_name": "../secret.jpg"},
            {"id": 3, "file_name": absolute.to_string_lossy()},
        ],
        "categories": [
            {"id": 5, "name": "dog"},
            {"id": 2, "name": "cat"},
        ],
        "annotations": [
            {"id": 1, "image_id": 1, "category_id": 5, "bbox": [1, 2, 3, 4], "area": 12},
            {"id": 2, "image_id": 2, "category_id": 2, "bbox": [0, 0, 1, 1], "area": 1},
            {"id": 3, "image_id": 3, "category_id": 2, "bbox": [0, 0, 1, 1], "area": 1},
        ],
    });
    let annotation_path = dir.path().join("instances.json");
    std::fs::write(&annotation_path, annotations.to_string()).unwrap();

    let mut server = Server::new_async().await;
    let _create = mock_create(&mut server).await;
    let leaked = server
        .mock("POST", format!("/api/sdk/datasets/{}/upload/", DATASET).as_str())
        .match_body(Matcher::Regex("private bytes".to_string()))
        .with_status(201)
        .expect(0)
        .create_async()
        .await;
    let upload = server
        .mock("POST", format!("/api/sdk/datasets/{}/upload/", DATASET).as_str())
        .match_body(Matcher::Regex("filename=\"a\\.jpg\"".to_string()))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    let summary = test_client(&server.url())
        .dataset_upload("Pets", AnnotationType::Bbox, &annotation_path, &images, 10, None)
        .await
        .unwrap();

    assert_eq!(
        summary,
        UploadSummary {
            uploaded: 1,
            failed: 2,
            skipped: 0,
        }
    );
    upload.assert_async().await;
    leaked.assert_async().await;
}

#[tokio::test]
async fn test_dataset_upload_invalid_inputs() {
    let dir = TempDir::new().unwrap();
    let (annotation_path, images) = write_fixture(dir.path());
    let client = test_client("http://127.0.0.1:9");

    let result = client
        .dataset_upload(
            "Pets",
            AnnotationType::Bbox,
            &annotation_path,
            &dir.path().join("nowhere"),
            10,
            None,
        )
        .await;
    assert!(matches!(result, Err(Error::InvalidParameters(_))));

    let empty = dir.path().join("empty.json");
    std::fs::write(&empty, r#"{"images": [], "annotations": [], "categories": []}"#).unwrap();
    let result = client
        .dataset_upload("Pets", AnnotationType::Bbox, &empty, &images, 10, None)
        .await;
    assert!(matches!(result, Err(Error::CocoError(msg)) if msg.contains("images")));
}

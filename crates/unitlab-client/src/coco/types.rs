// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

//! Serde model of a COCO annotation file.
//!
//! Only the fields needed to build upload payloads are typed; everything
//! else in the file is ignored.

use serde::{Deserialize, Serialize};

/// Root object of a COCO file such as `instances_val2017.json`.
///
/// Missing sections deserialize as empty; [`CocoIndex::new`][super::CocoIndex::new]
/// rejects files where a required one is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoDataset {
    #[serde(default)]
    pub info: Option<CocoInfo>,
    #[serde(default)]
    pub licenses: Vec<CocoLicense>,
    #[serde(default)]
    pub images: Vec<CocoImage>,
    /// One entry per labeled object.
    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,
    #[serde(default)]
    pub categories: Vec<CocoCategory>,
}

/// Dataset metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoInfo {
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contributor: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
}

/// License information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoLicense {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Image metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoImage {
    /// Unique image ID.
    pub id: u64,
    /// Filename, relative to the data folder.
    pub file_name: String,
    /// Pixels, zero when absent.
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub license: Option<u32>,
    #[serde(default)]
    pub coco_url: Option<String>,
    #[serde(default)]
    pub date_captured: Option<String>,
}

/// Category definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoCategory {
    /// Unique category ID, not necessarily contiguous.
    pub id: u32,
    /// Becomes the class name on the platform.
    pub name: String,
    #[serde(default)]
    pub supercategory: Option<String>,
}

/// A single object instance in an image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoAnnotation {
    /// Unique annotation ID.
    pub id: u64,
    pub image_id: u64,
    /// Original category id, remapped before upload.
    pub category_id: u32,
    /// `[x, y, w, h]` with `x, y` at the top-left corner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    #[serde(default)]
    pub area: f64,
    /// 1 for crowd regions.
    #[serde(default)]
    pub iscrowd: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<CocoSegmentation>,
    /// Text recognised inside the box (OCR datasets).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recognition: Option<String>,
}

/// Any of the three COCO segmentation encodings.
///
/// Forwarded to the platform untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CocoSegmentation {
    /// Flat `x, y` lists, one per polygon.
    Polygon(Vec<Vec<f64>>),
    Rle(CocoRle),
    CompressedRle(CocoCompressedRle),
}

/// Run lengths alternating background and foreground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoRle {
    pub counts: Vec<u32>,
    /// `[height, width]`
    pub size: [u32; 2],
}

/// RLE with the counts packed into a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoCompressedRle {
    pub counts: String,
    pub size: [u32; 2],
}

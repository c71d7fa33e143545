// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

//! # COCO Dataset Import
//!
//! Reads a COCO annotation file, indexes it and turns the annotations of
//! each image into the payload accepted by the Unitlab dataset upload
//! endpoint.
//!
//! Categories are re-numbered `0..n` by ascending original id; the list of
//! names in that order becomes the dataset's classes.
//!
//! ## Supported annotation types
//!
//! - `img_bbox`: boxes converted to four corner points
//! - `img_polygon`, `img_semantic_segmentation`, `img_instance_segmentation`,
//!   `img_line`, `img_point`: segmentation forwarded unchanged
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use unitlab_client::{AnnotationType, coco::{AnnotationFilter, CocoIndex}};
//!
//! # fn main() -> Result<(), unitlab_client::Error> {
//! let index = CocoIndex::from_path(Path::new("annotations/instances_val2017.json"))?;
//! println!("Classes: {:?}", index.classes());
//!
//! let crowd = index.ann_ids(&AnnotationFilter {
//!     iscrowd: Some(true),
//!     ..Default::default()
//! });
//! println!("{} crowd annotations", crowd.len());
//!
//! let image_id = index.img_ids(&[], &[])[0];
//! let payload = index.payload(AnnotationType::Bbox, index.annotations_for_image(image_id))?;
//! println!("{}", payload);
//! # Ok(())
//! # }
//! ```

mod index;
mod payload;
mod types;
mod upload;


pub use index::{AnnotationFilter, CocoIndex};
pub use payload::bbox_corners;
pub use types::{
    CocoAnnotation, CocoCategory, CocoCompressedRle, CocoDataset, CocoImage, CocoInfo,
    CocoLicense, CocoRle, CocoSegmentation,
};

// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

//! Per-image annotation payloads in the layout the upload endpoint expects.

use super::{
    index::CocoIndex,
    types::{CocoAnnotation, CocoSegmentation},
};
use crate::{Error, api::AnnotationType};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Serialize, Debug)]
struct BboxShape<'a> {
    /// Corners clockwise from the top-left.
    point: [[f64; 2]; 4],
    class: usize,
    recognition: &'a str,
}

#[derive(Serialize, Debug)]
struct BboxPayload<'a> {
    bboxes: Vec<Vec<BboxShape<'a>>>,
    predicted_classes: Vec<usize>,
    classes: &'a [String],
}

#[derive(Serialize, Debug)]
struct SegmentationShape<'a> {
    segmentation: &'a CocoSegmentation,
    category_id: usize,
}

#[derive(Serialize, Debug)]
struct SegmentationPayload<'a> {
    annotations: Vec<SegmentationShape<'a>>,
    predicted_classes: Vec<usize>,
    classes: &'a [String],
}

/// Four corners of an `[x, y, w, h]` box, clockwise from the top-left.
pub fn bbox_corners(bbox: &[f64; 4]) -> [[f64; 2]; 4] {
    let [x, y, w, h] = *bbox;
    [[x, y], [x + w, y], [x + w, y + h], [x, y + h]]
}

impl CocoIndex {
    fn class_of(&self, ann: &CocoAnnotation) -> Result<usize, Error> {
        self.category_index(ann.category_id).ok_or_else(|| {
            Error::CocoError(format!(
                "Annotation {} references unknown category {}",
                ann.id, ann.category_id
            ))
        })
    }

    /// Serialize the annotations of one image into the JSON document sent as
    /// the `result` field of a dataset upload.
    ///
    /// Category ids are replaced by their re-numbered value and
    /// `predicted_classes` lists the distinct values used, sorted.
    pub fn payload(
        &self,
        annotation_type: AnnotationType,
        annotations: &[CocoAnnotation],
    ) -> Result<String, Error> {
        let mut predicted = BTreeSet::new();

        let json = match annotation_type {
            AnnotationType::Bbox => {
                let mut shapes = Vec::with_capacity(annotations.len());
                for ann in annotations {
                    let bbox = ann.bbox.as_ref().ok_or_else(|| {
                        Error::CocoError(format!("Annotation {} has no bbox", ann.id))
                    })?;
                    let class = self.class_of(ann)?;
                    predicted.insert(class);
                    shapes.push(BboxShape {
                        point: bbox_corners(bbox),
                        class,
                        recognition: ann.recognition.as_deref().unwrap_or_default(),
                    });
                }

                serde_json::to_string(&BboxPayload {
                    bboxes: vec![shapes],
                    predicted_classes: predicted.into_iter().collect(),
                    classes: self.classes(),
                })?
            }
            AnnotationType::Polygon
            | AnnotationType::SemanticSegmentation
            | AnnotationType::InstanceSegmentation
            | AnnotationType::Line
            | AnnotationType::Point => {
                let mut shapes = Vec::with_capacity(annotations.len());
                for ann in annotations {
                    let segmentation = ann.segmentation.as_ref().ok_or_else(|| {
                        Error::CocoError(format!("Annotation {} has no segmentation", ann.id))
                    })?;
                    let category_id = self.class_of(ann)?;
                    predicted.insert(category_id);
                    shapes.push(SegmentationShape {
                        segmentation,
                        category_id,
                    });
                }

                serde_json::to_string(&SegmentationPayload {
                    annotations: shapes,
                    predicted_classes: predicted.into_iter().collect(),
                    classes: self.classes(),
                })?
            }
        };

        Ok(json)
    }
}

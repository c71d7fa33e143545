// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

use super::types::{CocoAnnotation, CocoCategory, CocoDataset, CocoImage};
use crate::Error;
use log::debug;
use std::{
    collections::{BTreeSet, HashMap},
    path::Path,
};

/// Filter for [`CocoIndex::ann_ids`].  Empty or `None` criteria are not
/// applied.
#[derive(Debug, Clone, Default)]
pub struct AnnotationFilter {
    /// Only annotations of these images.
    pub img_ids: Vec<u64>,
    /// Only annotations of these categories (original ids).
    pub cat_ids: Vec<u32>,
    /// Only annotations whose area lies strictly between the bounds.
    pub area_range: Option<(f64, f64)>,
    /// Only crowd (`true`) or non-crowd (`false`) annotations.
    pub iscrowd: Option<bool>,
}

/// Lookup tables over a COCO annotation file.
///
/// Categories are re-numbered `0..n` in order of their original id, the
/// platform expects contiguous class values.  `classes` lists the category
/// names in that order.
#[derive(Debug, Clone)]
pub struct CocoIndex {
    dataset: CocoDataset,
    /// `annotation_id` → `CocoAnnotation`
    pub anns: HashMap<u64, CocoAnnotation>,
    /// `image_id` → `CocoImage`
    pub imgs: HashMap<u64, CocoImage>,
    /// `category_id` → `CocoCategory`
    pub cats: HashMap<u32, CocoCategory>,
    /// `image_id` → annotations of that image in file order
    pub img_to_anns: HashMap<u64, Vec<CocoAnnotation>>,
    /// `category_id` → ids of images with an annotation of that category
    pub cat_to_imgs: HashMap<u32, Vec<u64>>,
    category_map: HashMap<u32, usize>,
    classes: Vec<String>,
}

impl CocoIndex {
    /// Read and index a COCO JSON file.
    pub fn from_path(annotation_path: &Path) -> Result<Self, Error> {
        let file = std::fs::File::open(annotation_path).map_err(|e| {
            Error::CocoError(format!(
                "Cannot open annotation file {}: {}",
                annotation_path.display(),
                e
            ))
        })?;
        let dataset: CocoDataset = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| {
                Error::CocoError(format!(
                    "Invalid annotation file {}: {}",
                    annotation_path.display(),
                    e
                ))
            })?;

        Self::new(dataset)
    }

    /// Index a dataset.  `images`, `annotations` and `categories` must all
    /// be non-empty.
    pub fn new(dataset: CocoDataset) -> Result<Self, Error> {
        for (key, empty) in [
            ("images", dataset.images.is_empty()),
            ("annotations", dataset.annotations.is_empty()),
            ("categories", dataset.categories.is_empty()),
        ] {
            if empty {
                return Err(Error::CocoError(format!(
                    "Required key '{}' is missing or has no values",
                    key
                )));
            }
        }

        let mut anns = HashMap::with_capacity(dataset.annotations.len());
        let mut img_to_anns: HashMap<u64, Vec<CocoAnnotation>> = HashMap::new();
        let mut cat_to_imgs: HashMap<u32, Vec<u64>> = HashMap::new();
        for ann in &dataset.annotations {
            img_to_anns
                .entry(ann.image_id)
                .or_default()
                .push(ann.clone());
            cat_to_imgs
                .entry(ann.category_id)
                .or_default()
                .push(ann.image_id);
            anns.insert(ann.id, ann.clone());
        }

        let imgs: HashMap<_, _> = dataset
            .images
            .iter()
            .map(|img| (img.id, img.clone()))
            .collect();

        let cats: HashMap<_, _> = dataset
            .categories
            .iter()
            .map(|cat| (cat.id, cat.clone()))
            .collect();

        let mut categories = cats.values().collect::<Vec<_>>();
        categories.sort_by_key(|cat| cat.id);
        let category_map = categories
            .iter()
            .enumerate()
            .map(|(index, cat)| (cat.id, index))
            .collect();
        let classes = categories.iter().map(|cat| cat.name.clone()).collect();

        debug!(
            "Indexed {} images, {} annotations, {} categories",
            imgs.len(),
            anns.len(),
            cats.len()
        );

        Ok(CocoIndex {
            dataset,
            anns,
            imgs,
            cats,
            img_to_anns,
            cat_to_imgs,
            category_map,
            classes,
        })
    }

    /// The underlying dataset.
    pub fn dataset(&self) -> &CocoDataset {
        &self.dataset
    }

    /// Category names ordered by their re-numbered id.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Re-numbered id of an original category id.
    pub fn category_index(&self, category_id: u32) -> Option<usize> {
        self.category_map.get(&category_id).copied()
    }

    /// Annotations of an image in file order.
    pub fn annotations_for_image(&self, image_id: u64) -> &[CocoAnnotation] {
        self.img_to_anns
            .get(&image_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Ids of annotations matching the filter, in file order.
    pub fn ann_ids(&self, filter: &AnnotationFilter) -> Vec<u64> {
        let anns: Vec<&CocoAnnotation> = if filter.img_ids.is_empty() {
            self.dataset.annotations.iter().collect()
        } else {
            filter
                .img_ids
                .iter()
                .filter_map(|id| self.img_to_anns.get(id))
                .flatten()
                .collect()
        };

        anns.into_iter()
            .filter(|ann| filter.cat_ids.is_empty() || filter.cat_ids.contains(&ann.category_id))
            .filter(|ann| {
                filter
                    .area_range
                    .is_none_or(|(min, max)| ann.area > min && ann.area < max)
            })
            .filter(|ann| {
                filter
                    .iscrowd
                    .is_none_or(|crowd| (ann.iscrowd != 0) == crowd)
            })
            .map(|ann| ann.id)
            .collect()
    }

    /// Ids of categories matching all non-empty criteria, in file order.
    pub fn cat_ids(&self, names: &[&str], supercategories: &[&str], ids: &[u32]) -> Vec<u32> {
        self.dataset
            .categories
            .iter()
            .filter(|cat| names.is_empty() || names.contains(&cat.name.as_str()))
            .filter(|cat| {
                supercategories.is_empty()
                    || cat
                        .supercategory
                        .as_deref()
                        .is_some_and(|sup| supercategories.contains(&sup))
            })
            .filter(|cat| ids.is_empty() || ids.contains(&cat.id))
            .map(|cat| cat.id)
            .collect()
    }

    /// Ids of images, sorted.  With `cat_ids` only images holding an
    /// annotation of **every** listed category are returned.
    pub fn img_ids(&self, img_ids: &[u64], cat_ids: &[u32]) -> Vec<u64> {
        if img_ids.is_empty() && cat_ids.is_empty() {
            let ids = self.imgs.keys().copied().collect::<BTreeSet<_>>();
            return ids.into_iter().collect();
        }

        let mut ids = img_ids.iter().copied().collect::<BTreeSet<_>>();
        for (i, cat_id) in cat_ids.iter().enumerate() {
            let with_cat = self
                .cat_to_imgs
                .get(cat_id)
                .map(|imgs| imgs.iter().copied().collect::<BTreeSet<_>>())
                .unwrap_or_default();

            if i == 0 && ids.is_empty() {
                ids = with_cat;
            } else {
                ids = ids.intersection(&with_cat).copied().collect();
            }
        }

        ids.into_iter().collect()
    }

    pub fn load_anns(&self, ids: &[u64]) -> Result<Vec<&CocoAnnotation>, Error> {
        ids.iter()
            .map(|id| {
                self.anns
                    .get(id)
                    .ok_or_else(|| Error::CocoError(format!("Unknown annotation id {}", id)))
            })
            .collect()
    }

    pub fn load_imgs(&self, ids: &[u64]) -> Result<Vec<&CocoImage>, Error> {
        ids.iter()
            .map(|id| {
                self.imgs
                    .get(id)
                    .ok_or_else(|| Error::CocoError(format!("Unknown image id {}", id)))
            })
            .collect()
    }

    pub fn load_cats(&self, ids: &[u32]) -> Result<Vec<&CocoCategory>, Error> {
        ids.iter()
            .map(|id| {
                self.cats
                    .get(id)
                    .ok_or_else(|| Error::CocoError(format!("Unknown category id {}", id)))
            })
            .collect()
    }
}

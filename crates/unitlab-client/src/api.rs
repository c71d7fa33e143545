// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

use crate::Error;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

/// Unique identifier for a project on the Unitlab platform.
///
/// Projects are identified by UUIDs as shown in the web UI.
///
/// # Examples
///
/// ```rust
/// use unitlab_client::ProjectID;
/// use std::str::FromStr;
///
/// let project_id = ProjectID::from_str("0b4e6f2a-5f7c-4a53-9d1c-1c3b4a8e2f11").unwrap();
/// assert_eq!(project_id.to_string(), "0b4e6f2a-5f7c-4a53-9d1c-1c3b4a8e2f11");
/// ```
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ProjectID(Uuid);

impl Display for ProjectID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ProjectID {
    fn from(id: Uuid) -> Self {
        ProjectID(id)
    }
}

impl From<ProjectID> for Uuid {
    fn from(val: ProjectID) -> Self {
        val.0
    }
}

impl ProjectID {
    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl TryFrom<&str> for ProjectID {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        ProjectID::from_str(s)
    }
}

impl TryFrom<String> for ProjectID {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ProjectID::from_str(&s)
    }
}

impl FromStr for ProjectID {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Uuid::parse_str(s.trim()).map_err(|_| {
            Error::InvalidParameters(format!("Project ID must be a UUID, got '{}'", s))
        })?;
        Ok(ProjectID(id))
    }
}

/// Unique identifier for a dataset (release) on the Unitlab platform.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct DatasetID(Uuid);

impl Display for DatasetID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for DatasetID {
    fn from(id: Uuid) -> Self {
        DatasetID(id)
    }
}

impl From<DatasetID> for Uuid {
    fn from(val: DatasetID) -> Self {
        val.0
    }
}

impl DatasetID {
    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl TryFrom<&str> for DatasetID {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        DatasetID::from_str(s)
    }
}

impl TryFrom<String> for DatasetID {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        DatasetID::from_str(&s)
    }
}

impl FromStr for DatasetID {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Uuid::parse_str(s.trim()).map_err(|_| {
            Error::InvalidParameters(format!("Dataset ID must be a UUID, got '{}'", s))
        })?;
        Ok(DatasetID(id))
    }
}

/// Accepts RFC 3339 timestamps as well as naive `YYYY-MM-DDTHH:MM:SS[.f]`
/// values (interpreted as UTC).  Anything else becomes `None` rather than
/// failing the whole response.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }))
}

/// A labeling project.
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use unitlab_client::Project;
///
/// let project: Project = serde_json::from_str(
///     r#"{"pk": "0b4e6f2a-5f7c-4a53-9d1c-1c3b4a8e2f11", "name": "Cars"}"#,
/// )?;
/// assert_eq!(project.name(), "Cars");
/// # Ok(())
/// # }
/// ```
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Project {
    pk: ProjectID,
    name: String,
    #[serde(default)]
    generic_type: Option<String>,
    #[serde(default)]
    annotation_type: Option<String>,
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    data_count: Option<u64>,
    #[serde(default)]
    annotator_progress: Option<f64>,
    #[serde(default)]
    reviewer_progress: Option<f64>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    created: Option<DateTime<Utc>>,
}

impl Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {}", self.id(), self.name())
    }
}

impl Project {
    pub fn id(&self) -> ProjectID {
        self.pk
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The data modality of the project, e.g. `image`, `text` or `video`.
    pub fn generic_type(&self) -> Option<&str> {
        self.generic_type.as_deref()
    }

    pub fn annotation_type(&self) -> Option<&str> {
        self.annotation_type.as_deref()
    }

    pub fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    pub fn data_count(&self) -> Option<u64> {
        self.data_count
    }

    pub fn annotator_progress(&self) -> Option<f64> {
        self.annotator_progress
    }

    pub fn reviewer_progress(&self) -> Option<f64> {
        self.reviewer_progress
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.created.as_ref()
    }
}

/// The user behind a project membership.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Worker {
    #[serde(default)]
    pk: Option<String>,
    #[serde(default)]
    email: String,
    #[serde(default)]
    role: Option<String>,
}

impl Worker {
    pub fn id(&self) -> Option<&str> {
        self.pk.as_deref()
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }
}

/// Membership of a worker in a project with their labeling statistics.
/// Times are reported by the server in seconds.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProjectMember {
    worker: Worker,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    average_time: f64,
    #[serde(default)]
    overall_time: f64,
}

impl ProjectMember {
    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn average_time(&self) -> f64 {
        self.average_time
    }

    pub fn overall_time(&self) -> f64 {
        self.overall_time
    }
}

/// Upload constraints for a project.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UploadInfo {
    /// File extensions the project accepts, without the leading dot.
    pub accepted_formats: Vec<String>,
    /// Maximum size of a single file in bytes.
    pub max_file_size: u64,
    /// Data modality of the project (`image`, `text`, `video`, ...).
    pub generic_type: String,
}

/// A dataset (release) available for download.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Dataset {
    pk: DatasetID,
    name: String,
    #[serde(default)]
    annotation_type: Option<String>,
    #[serde(default)]
    data_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    created: Option<DateTime<Utc>>,
}

impl Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {}", self.id(), self.name())
    }
}

impl Dataset {
    pub fn id(&self) -> DatasetID {
        self.pk
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotation_type(&self) -> Option<&str> {
        self.annotation_type.as_deref()
    }

    pub fn data_count(&self) -> Option<u64> {
        self.data_count
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.created.as_ref()
    }
}

/// One entry of a dataset file listing.  Small files (labels, manifests) are
/// inlined as `content`, everything else is fetched from `source`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DatasetFile {
    pub file_name: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct AnnotationExport {
    pub(crate) file: String,
}

#[derive(Serialize, Debug)]
pub(crate) struct DownloadRequest<'a> {
    pub(crate) download_type: DownloadType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) export_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) split_type: Option<&'a str>,
}

#[derive(Serialize, Debug)]
pub(crate) struct DatasetClass<'a> {
    pub(crate) name: &'a str,
    pub(crate) value: usize,
}

#[derive(Serialize, Debug)]
pub(crate) struct DatasetCreateParams<'a> {
    pub(crate) name: &'a str,
    pub(crate) annotation_type: AnnotationType,
    pub(crate) classes: Vec<DatasetClass<'a>>,
}

/// What a dataset download should fetch.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DownloadType {
    /// A single exported annotation file (COCO, YOLO, ...).
    Annotation,
    /// Every raw file of the dataset.
    Files,
}

impl Display for DownloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadType::Annotation => write!(f, "annotation"),
            DownloadType::Files => write!(f, "files"),
        }
    }
}

impl FromStr for DownloadType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "annotation" => Ok(DownloadType::Annotation),
            "files" => Ok(DownloadType::Files),
            _ => Err(Error::InvalidParameters(format!(
                "Download type must be 'annotation' or 'files', got '{}'",
                s
            ))),
        }
    }
}

/// Annotation types that can be imported from a COCO file.
///
/// The polygon, segmentation, line and point types share one payload layout
/// (raw COCO segmentation per annotation); `img_bbox` is converted to four
/// corner points.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum AnnotationType {
    #[serde(rename = "img_bbox")]
    Bbox,
    #[serde(rename = "img_polygon")]
    Polygon,
    #[serde(rename = "img_semantic_segmentation")]
    SemanticSegmentation,
    #[serde(rename = "img_instance_segmentation")]
    InstanceSegmentation,
    #[serde(rename = "img_line")]
    Line,
    #[serde(rename = "img_point")]
    Point,
}

impl AnnotationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationType::Bbox => "img_bbox",
            AnnotationType::Polygon => "img_polygon",
            AnnotationType::SemanticSegmentation => "img_semantic_segmentation",
            AnnotationType::InstanceSegmentation => "img_instance_segmentation",
            AnnotationType::Line => "img_line",
            AnnotationType::Point => "img_point",
        }
    }
}

impl Display for AnnotationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for AnnotationType {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "img_bbox" => Ok(AnnotationType::Bbox),
            "img_polygon" => Ok(AnnotationType::Polygon),
            "img_semantic_segmentation" => Ok(AnnotationType::SemanticSegmentation),
            "img_instance_segmentation" => Ok(AnnotationType::InstanceSegmentation),
            "img_line" => Ok(AnnotationType::Line),
            "img_point" => Ok(AnnotationType::Point),
            _ => Err(Error::InvalidAnnotationType(s.to_string())),
        }
    }
}

impl FromStr for AnnotationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnnotationType::try_from(s)
    }
}

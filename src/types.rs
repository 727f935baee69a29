//! Core data types for radiograph findings and evaluations.

use crate::convention::LabelConvention;
use crate::error::{Result, XrayEvalError};
use crate::stats::EvaluationStats;
use serde::{Deserialize, Serialize};

/// Represents a bounding box in corner format (x_min, y_min, x_max, y_max).
///
/// The coordinate frame (working resolution or original image resolution)
/// is tracked by the owning collection, not by the box itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Create a new bounding box without validation.
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self { x_min, y_min, x_max, y_max }
    }

    /// Create a bounding box, rejecting non-finite or inverted coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`XrayEvalError::InvalidBoundingBox`] if any coordinate is not
    /// finite or if `x_min > x_max` / `y_min > y_max`.
    pub fn checked(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self> {
        let bbox = Self::new(x_min, y_min, x_max, y_max);
        if !bbox.to_array().iter().all(|v| v.is_finite()) {
            return Err(XrayEvalError::InvalidBoundingBox(format!(
                "non-finite coordinates {:?}",
                bbox.to_array()
            )));
        }
        if x_min > x_max || y_min > y_max {
            return Err(XrayEvalError::InvalidBoundingBox(format!(
                "inverted coordinates {:?}",
                bbox.to_array()
            )));
        }
        Ok(bbox)
    }

    /// The fixed degenerate box carried by "No finding" entries.
    pub fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Get the area of the bounding box.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Check if the bounding box is a valid finding (positive area).
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }

    /// Truncate every coordinate toward zero.
    pub fn truncated(&self) -> Self {
        Self::new(
            self.x_min.trunc(),
            self.y_min.trunc(),
            self.x_max.trunc(),
            self.y_max.trunc(),
        )
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x_min, self.y_min, self.x_max, self.y_max]
    }
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both dimensions must be nonzero to act as a rescaling source.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(XrayEvalError::ConfigurationError(format!(
                "image size must be nonzero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// A single box with its class, as annotated by a radiologist or predicted by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub bbox: BoundingBox,
    pub class_id: u32,
    /// Confidence score (for predictions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Annotating radiologist (for ground truth)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rad_id: Option<String>,
}

impl Finding {
    pub fn new(bbox: BoundingBox, class_id: u32) -> Self {
        Self {
            bbox,
            class_id,
            score: None,
            rad_id: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_rad_id(mut self, rad_id: impl Into<String>) -> Self {
        self.rad_id = Some(rad_id.into());
        self
    }

    /// The sentinel finding: `no_finding_id` with the unit box.
    pub fn no_finding(no_finding_id: u32) -> Self {
        Self::new(BoundingBox::unit(), no_finding_id)
    }

    /// Get the confidence score, defaulting to 1.0 if not present.
    pub fn confidence(&self) -> f64 {
        self.score.unwrap_or(1.0)
    }
}

/// A detector output: always scored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub score: f64,
}

impl PredictionRecord {
    pub fn new(bbox: BoundingBox, class_id: u32, score: f64) -> Self {
        Self { bbox, class_id, score }
    }
}

impl From<PredictionRecord> for Finding {
    fn from(record: PredictionRecord) -> Self {
        Finding::new(record.bbox, record.class_id).with_score(record.score)
    }
}

impl From<&Finding> for PredictionRecord {
    fn from(finding: &Finding) -> Self {
        PredictionRecord::new(finding.bbox, finding.class_id, finding.confidence())
    }
}

/// Ground-truth findings for one image, in the image's native pixel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnnotationSet {
    pub image_id: String,
    pub size: ImageSize,
    pub convention: LabelConvention,
    pub findings: Vec<Finding>,
}

impl ImageAnnotationSet {
    pub fn new(
        image_id: impl Into<String>,
        size: ImageSize,
        convention: LabelConvention,
        findings: Vec<Finding>,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            size,
            convention,
            findings,
        }
    }

    /// Check every class id against the set's convention.
    pub fn validate_classes(&self) -> Result<()> {
        for finding in &self.findings {
            self.convention.validate(finding.class_id)?;
        }
        Ok(())
    }
}

/// Detector outputs for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePredictionSet {
    pub image_id: String,
    pub convention: LabelConvention,
    pub records: Vec<PredictionRecord>,
}

impl ImagePredictionSet {
    pub fn new(
        image_id: impl Into<String>,
        convention: LabelConvention,
        records: Vec<PredictionRecord>,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            convention,
            records,
        }
    }

    /// Remap class ids into another convention. Boxes are untouched.
    pub fn into_convention(self, target: LabelConvention) -> Result<Self> {
        let records = self
            .records
            .into_iter()
            .map(|record| {
                let class_id = self.convention.convert(record.class_id, target)?;
                Ok(PredictionRecord { class_id, ..record })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            image_id: self.image_id,
            convention: target,
            records,
        })
    }

    pub fn validate_classes(&self) -> Result<()> {
        for record in &self.records {
            self.convention.validate(record.class_id)?;
        }
        Ok(())
    }
}

/// An [`ImageAnnotationSet`] after per-class reconciliation and sentinel
/// normalization. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledFindingSet {
    inner: ImageAnnotationSet,
}

impl ReconciledFindingSet {
    pub(crate) fn from_normalized(inner: ImageAnnotationSet) -> Self {
        debug_assert!(!inner.findings.is_empty());
        Self { inner }
    }

    pub fn image_id(&self) -> &str {
        &self.inner.image_id
    }

    pub fn size(&self) -> ImageSize {
        self.inner.size
    }

    pub fn convention(&self) -> LabelConvention {
        self.inner.convention
    }

    pub fn findings(&self) -> &[Finding] {
        &self.inner.findings
    }

    pub fn into_annotation_set(self) -> ImageAnnotationSet {
        self.inner
    }
}

/// Detection counts and AP for one class at one IoU threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub class_id: u32,
    pub class_name: Option<String>,
    pub ap: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    /// Number of ground-truth boxes of this class
    pub ground_truths: usize,
    /// Whether this class contributed to the mean AP
    pub included_in_map: bool,
}

/// Per-class results at one IoU threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReport {
    pub iou_threshold: f64,
    /// Mean AP over the included classes at this threshold
    pub map: f64,
    pub classes: Vec<ClassReport>,
}

/// AP of one class averaged over all IoU thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassAp {
    pub class_id: u32,
    pub class_name: Option<String>,
    pub ap: f64,
    pub included_in_map: bool,
}

/// Evaluation metrics for chest X-ray detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    /// Mean Average Precision across included classes and all IoU thresholds
    pub map: f64,
    pub iou_thresholds: Vec<f64>,
    pub per_threshold: Vec<ThresholdReport>,
    /// Per-class AP, sorted by class id
    pub ap_per_class: Vec<ClassAp>,
    pub stats: EvaluationStats,
}

impl MetricReport {
    /// Look up the report for one IoU threshold.
    pub fn at_threshold(&self, iou_threshold: f64) -> Option<&ThresholdReport> {
        self.per_threshold
            .iter()
            .find(|report| (report.iou_threshold - iou_threshold).abs() < 1e-9)
    }

    /// Look up the threshold-averaged AP of one class.
    pub fn class_ap(&self, class_id: u32) -> Option<f64> {
        self.ap_per_class
            .iter()
            .find(|entry| entry.class_id == class_id)
            .map(|entry| entry.ap)
    }
}

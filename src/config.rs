//! Evaluation and target-preparation settings.

use crate::codec::{CodecConfig, PredictionStringCodec};
use crate::convention::LabelConvention;
use crate::error::{Result, XrayEvalError};
use crate::threshold::{generate_threshold_range, validate_threshold};
use crate::types::ImageSize;
use serde::{Deserialize, Serialize};

/// Settings for [`crate::evaluator::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Label convention shared by predictions and ground truth
    pub convention: LabelConvention,
    /// Predictions scoring at or below this are dropped
    pub score_threshold: f64,
    /// IoU above which duplicate predictions of one class are suppressed
    pub prediction_nms_iou: f64,
    /// Reconcile ground truth again before scoring
    pub ground_truth_nms_iou: Option<f64>,
    /// IoU thresholds at which predictions match ground truth
    pub iou_thresholds: Vec<f64>,
    /// Whether the "No finding" class contributes to the mean AP
    pub include_no_finding_in_map: bool,
    /// Encode and decode predictions through the string format before scoring
    pub round_trip_strings: bool,
    pub codec: CodecConfig,
    /// Boxes with area at or below this are filtered before matching
    pub min_box_area: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            convention: LabelConvention::Dataset,
            score_threshold: 0.5,
            prediction_nms_iou: 0.4,
            ground_truth_nms_iou: None,
            iou_thresholds: vec![0.4],
            include_no_finding_in_map: true,
            round_trip_strings: false,
            codec: CodecConfig::default(),
            min_box_area: 0.0,
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.score_threshold)?;
        validate_threshold(self.prediction_nms_iou)?;
        if let Some(iou) = self.ground_truth_nms_iou {
            validate_threshold(iou)?;
        }

        if self.iou_thresholds.is_empty() {
            return Err(XrayEvalError::InvalidThreshold(
                "at least one IoU threshold is required".to_string(),
            ));
        }
        for &iou in &self.iou_thresholds {
            validate_threshold(iou)?;
        }

        if !self.min_box_area.is_finite() || self.min_box_area < 0.0 {
            return Err(XrayEvalError::ConfigurationError(format!(
                "min_box_area must be a non-negative number, got {}",
                self.min_box_area
            )));
        }
        Ok(())
    }

    /// Replace the IoU thresholds with `steps` evenly spaced values from
    /// `start` to `end` inclusive. `(0.5, 0.95, 10)` gives the COCO sweep.
    pub fn with_iou_range(mut self, start: f64, end: f64, steps: usize) -> Result<Self> {
        self.iou_thresholds = generate_threshold_range(start, end, steps)?;
        Ok(self)
    }

    /// Codec bound to this configuration's convention.
    pub fn codec(&self) -> PredictionStringCodec {
        PredictionStringCodec::new(self.convention, self.codec)
    }
}

/// Settings for [`crate::dataset::prepare_target`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Convention the prepared targets are expressed in
    pub convention: LabelConvention,
    /// Resolution the detector works at
    pub working_size: ImageSize,
    /// IoU above which radiologist boxes of one class are merged
    pub iou_threshold: f64,
    /// Boxes with area at or below this are filtered after truncation
    pub min_box_area: f64,
    /// Truncate coordinates to integers, as the detector targets expect
    pub truncate_coordinates: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            convention: LabelConvention::Detector,
            working_size: ImageSize::new(1024, 1024),
            iou_threshold: 0.5,
            min_box_area: 0.0,
            truncate_coordinates: true,
        }
    }
}

impl TargetConfig {
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.iou_threshold)?;
        self.working_size.validate()?;
        if !self.min_box_area.is_finite() || self.min_box_area < 0.0 {
            return Err(XrayEvalError::ConfigurationError(format!(
                "min_box_area must be a non-negative number, got {}",
                self.min_box_area
            )));
        }
        Ok(())
    }
}

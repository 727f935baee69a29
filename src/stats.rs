//! Statistics tracking for evaluation runs
//!
//! Counts what happened to predictions and ground truth on the way to the
//! matcher: thresholding, suppression, sentinel substitution and filtering
//! of degenerate boxes.

use serde::{Deserialize, Serialize};

/// Statistics collected while preparing findings for evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationStats {
    /// Number of ground-truth images evaluated
    pub images_evaluated: usize,

    /// Total number of prediction records received
    pub total_predictions: usize,

    /// Predictions dropped for scoring at or below the score threshold
    pub dropped_below_threshold: usize,

    /// Predictions removed as duplicates by per-class NMS
    pub suppressed_by_nms: usize,

    /// Ground-truth boxes removed by re-reconciliation
    pub suppressed_ground_truth: usize,

    /// Predictions filtered for degenerate area after NMS
    pub degenerate_predictions: usize,

    /// Ground-truth boxes filtered for degenerate area
    pub degenerate_ground_truth: usize,

    /// Images whose predictions were replaced by the "No finding" sentinel
    pub prediction_sentinels: usize,

    /// Images whose ground truth was replaced by the "No finding" sentinel
    pub ground_truth_sentinels: usize,

    /// Predictions skipped because their image has no ground truth
    pub unknown_image_predictions: usize,
}

impl EvaluationStats {
    /// Create a new `EvaluationStats` with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of submitted predictions that reached the matcher.
    /// Sentinels substituted for empty images are not counted.
    pub fn scored_predictions(&self) -> usize {
        self.total_predictions
            .saturating_sub(self.dropped_below_threshold)
            .saturating_sub(self.suppressed_by_nms)
            .saturating_sub(self.degenerate_predictions)
            .saturating_sub(self.unknown_image_predictions)
    }

    /// Log a summary of the statistics at info level
    pub fn log_summary(&self) {
        log::info!("=== Evaluation Statistics ===");
        log::info!("Images evaluated: {}", self.images_evaluated);
        log::info!("Total predictions: {}", self.total_predictions);
        log::info!("Scored predictions: {}", self.scored_predictions());
        log::info!("  - Below score threshold: {}", self.dropped_below_threshold);
        log::info!("  - Suppressed by NMS: {}", self.suppressed_by_nms);
        log::info!("  - Degenerate boxes: {}", self.degenerate_predictions);
        log::info!("  - Unknown images: {}", self.unknown_image_predictions);
        log::info!("Degenerate ground truth filtered: {}", self.degenerate_ground_truth);
        log::info!("Ground truth suppressed: {}", self.suppressed_ground_truth);
        log::info!(
            "Sentinel substitutions: {} prediction, {} ground truth",
            self.prediction_sentinels,
            self.ground_truth_sentinels
        );
    }

    /// Get a formatted string summary of the statistics
    pub fn summary_string(&self) -> String {
        format!(
            "EvaluationStats {{ images: {}, predictions: {}, scored: {}, suppressed: {}, degenerate: {} }}",
            self.images_evaluated,
            self.total_predictions,
            self.scored_predictions(),
            self.suppressed_by_nms,
            self.degenerate_predictions + self.degenerate_ground_truth
        )
    }
}

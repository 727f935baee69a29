//! Precision and Recall calculation.

use serde::{Deserialize, Serialize};

/// Container for precision and recall values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecall {
    pub precision: f64,
    pub recall: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

/// Precision-Recall curve point.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecisionRecallPoint {
    pub precision: f64,
    pub recall: f64,
    /// Confidence of the detection that produced this point
    pub threshold: f64,
}

/// Calculate precision and recall from TP, FP, and FN counts.
///
/// # Example
///
/// ```
/// use xray_eval::metrics::precision_recall::calculate_precision_recall;
///
/// let pr = calculate_precision_recall(8, 2, 3);
/// assert_eq!(pr.precision, 0.8); // 8 / (8 + 2)
/// assert!((pr.recall - 0.7272).abs() < 0.001); // 8 / (8 + 3)
/// ```
pub fn calculate_precision_recall(
    true_positives: usize,
    false_positives: usize,
    false_negatives: usize,
) -> PrecisionRecall {
    let precision = if true_positives + false_positives > 0 {
        true_positives as f64 / (true_positives + false_positives) as f64
    } else {
        0.0
    };

    let recall = if true_positives + false_negatives > 0 {
        true_positives as f64 / (true_positives + false_negatives) as f64
    } else {
        0.0
    };

    PrecisionRecall {
        precision,
        recall,
        true_positives,
        false_positives,
        false_negatives,
    }
}

/// Calculate precision-recall curve from detections sorted by confidence.
///
/// # Arguments
///
/// * `detections` - `(confidence, is_true_positive)` pairs, sorted by confidence descending
/// * `num_ground_truth` - Total number of ground truth annotations
pub fn calculate_precision_recall_curve(
    detections: &[(f64, bool)],
    num_ground_truth: usize,
) -> Vec<PrecisionRecallPoint> {
    let mut curve = Vec::with_capacity(detections.len());
    let mut tp = 0;
    let mut fp = 0;

    for &(confidence, is_tp) in detections {
        if is_tp {
            tp += 1;
        } else {
            fp += 1;
        }

        let pr = calculate_precision_recall(tp, fp, num_ground_truth.saturating_sub(tp));
        curve.push(PrecisionRecallPoint {
            precision: pr.precision,
            recall: pr.recall,
            threshold: confidence,
        });
    }

    curve
}

/// Interpolate precision values for standard recall levels.
///
/// Uses the COCO-style 101-point interpolation.
///
/// # Returns
///
/// Returns interpolated precision at 101 recall levels (0.0, 0.01, ..., 1.0).
pub fn interpolate_precision(precision: &[f64], recall: &[f64]) -> Vec<f64> {
    (0..=100)
        .map(|i| {
            let recall_level = i as f64 / 100.0;
            // Max precision at recall >= recall_level
            precision
                .iter()
                .zip(recall.iter())
                .filter(|(_, &r)| r >= recall_level)
                .map(|(&p, _)| p)
                .fold(0.0f64, f64::max)
        })
        .collect()
}

//! Detection matching utilities for evaluating predictions against ground truth.

use crate::metrics::iou::calculate_iou_matrix;
use crate::nms::descending_score;
use crate::types::{BoundingBox, Finding};
use std::collections::BTreeMap;

/// Represents a matched detection with its ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Position of the prediction in the input slice
    pub prediction_index: usize,
    /// Position of the claimed ground truth, if any
    pub ground_truth_index: Option<usize>,
    pub iou: f64,
    pub is_true_positive: bool,
    pub confidence: f64,
}

/// Match predictions to ground truth findings for a single image and class.
///
/// Uses greedy matching: predictions are visited by confidence (descending,
/// ties by input order), and each prediction claims the highest-IoU
/// unclaimed ground truth. The claim counts as a true positive when that
/// IoU is at least `iou_threshold`.
///
/// # Returns
///
/// Returns one `Match` per prediction, sorted by confidence (descending).
///
/// # Example
///
/// ```
/// use xray_eval::matching::match_detections;
/// use xray_eval::types::{BoundingBox, Finding};
///
/// let gt = vec![Finding::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 1)];
/// let preds = vec![Finding::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 1).with_score(0.9)];
/// let matches = match_detections(&preds, &gt, 0.5);
/// assert!(matches[0].is_true_positive);
/// ```
pub fn match_detections(predictions: &[Finding], ground_truths: &[Finding], iou_threshold: f64) -> Vec<Match> {
    let pred_boxes: Vec<BoundingBox> = predictions.iter().map(|f| f.bbox).collect();
    let gt_boxes: Vec<BoundingBox> = ground_truths.iter().map(|f| f.bbox).collect();
    let ious = calculate_iou_matrix(&pred_boxes, &gt_boxes);

    let mut pred_indices: Vec<usize> = (0..predictions.len()).collect();
    pred_indices.sort_by(|&a, &b| {
        descending_score(predictions[a].confidence(), predictions[b].confidence()).then_with(|| a.cmp(&b))
    });

    let mut claimed = vec![false; ground_truths.len()];

    pred_indices
        .into_iter()
        .map(|pred_idx| {
            let mut best_iou = 0.0;
            let mut best_gt_idx: Option<usize> = None;

            for (gt_idx, &iou) in ious[pred_idx].iter().enumerate() {
                if claimed[gt_idx] {
                    continue;
                }
                if iou > best_iou {
                    best_iou = iou;
                    best_gt_idx = Some(gt_idx);
                }
            }

            let matched = best_gt_idx.filter(|_| best_iou >= iou_threshold);
            if let Some(gt_idx) = matched {
                claimed[gt_idx] = true;
            }

            Match {
                prediction_index: pred_idx,
                ground_truth_index: matched,
                iou: best_iou,
                is_true_positive: matched.is_some(),
                confidence: predictions[pred_idx].confidence(),
            }
        })
        .collect()
}

/// Group findings by class id, preserving input order inside each class.
pub fn group_by_class(findings: &[Finding]) -> BTreeMap<u32, Vec<Finding>> {
    let mut groups: BTreeMap<u32, Vec<Finding>> = BTreeMap::new();

    for finding in findings {
        groups.entry(finding.class_id).or_default().push(finding.clone());
    }

    groups
}

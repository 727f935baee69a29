//! Non-Maximum Suppression (`NMS`) and per-class reconciliation.
//!
//! Multiple radiologists annotate every image independently, so the same
//! pathology is usually boxed several times. [`reconcile`] partitions the
//! findings by class and runs greedy `NMS` inside each class, keeping one
//! box per suppression cluster. The same routine de-duplicates model
//! predictions at evaluation time.

use crate::error::{Result, XrayEvalError};
use crate::metrics::iou::calculate_iou;
use crate::normalize::normalize;
use crate::types::{BoundingBox, Finding, ImageAnnotationSet, ReconciledFindingSet};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Detection with bounding box and confidence score
#[derive(Debug, Clone)]
pub struct Detection {
    /// Bounding box in corner format
    pub bbox: BoundingBox,
    /// Confidence score
    pub score: f64,
    /// Original index in the input, used as the tie-breaker
    pub index: usize,
}

/// Apply Non-Maximum Suppression to a set of detections
///
/// Candidates are visited by descending score, then ascending `index`, so
/// equal scores are resolved deterministically by input order. A candidate
/// is suppressed when its `IoU` with an already kept box exceeds
/// `iou_threshold`.
///
/// # Arguments
///
/// * `detections` - Vector of detections with bboxes and scores
/// * `iou_threshold` - `IoU` threshold for suppression (0.0 to 1.0)
///
/// # Returns
///
/// Boolean mask indicating which detections to keep
///
/// # Errors
///
/// Returns error if `iou_threshold` is not in range [0.0, 1.0]
///
/// # Examples
///
/// ```
/// # use xray_eval::nms::{Detection, non_maximum_suppression};
/// # use xray_eval::types::BoundingBox;
/// let detections = vec![
///     Detection { bbox: BoundingBox::new(10.0, 10.0, 50.0, 50.0), score: 0.9, index: 0 },
///     Detection { bbox: BoundingBox::new(15.0, 15.0, 55.0, 55.0), score: 0.8, index: 1 },
///     Detection { bbox: BoundingBox::new(100.0, 100.0, 150.0, 150.0), score: 0.95, index: 2 },
/// ];
///
/// let keep_mask = non_maximum_suppression(&detections, 0.5).unwrap();
/// assert_eq!(keep_mask, vec![true, false, true]);
/// ```
pub fn non_maximum_suppression(detections: &[Detection], iou_threshold: f64) -> Result<Vec<bool>> {
    validate_iou_threshold(iou_threshold)?;

    let n = detections.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut keep_mask = vec![true; n];
    let order = suppression_order(detections);

    for (i, &idx_i) in order.iter().enumerate() {
        if !keep_mask[idx_i] {
            continue;
        }

        // Suppress all subsequent boxes that have high IoU with this one
        for &idx_j in &order[(i + 1)..] {
            if !keep_mask[idx_j] {
                continue;
            }

            let iou = calculate_iou(&detections[idx_i].bbox, &detections[idx_j].bbox);
            if iou > iou_threshold {
                keep_mask[idx_j] = false;
            }
        }
    }

    Ok(keep_mask)
}

/// Positions into `detections`, sorted by score descending then index ascending.
fn suppression_order(detections: &[Detection]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..detections.len()).collect();
    order.sort_by(|&a, &b| {
        descending_score(detections[a].score, detections[b].score)
            .then_with(|| detections[a].index.cmp(&detections[b].index))
    });
    order
}

/// Total order on scores, highest first. NaN ranks below every number.
pub(crate) fn descending_score(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

fn validate_iou_threshold(iou_threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&iou_threshold) {
        return Err(XrayEvalError::InvalidThreshold(format!(
            "IoU threshold must be between 0 and 1, got {iou_threshold}"
        )));
    }
    Ok(())
}

/// Reconcile overlapping findings class by class.
///
/// Findings are partitioned by `class_id`. A class with a single finding is
/// kept as is; otherwise greedy `NMS` keeps the highest-confidence box of
/// each cluster. Unscored findings all count as 1.0, so input order decides
/// among them. Output is grouped by ascending class id, and within a class
/// ordered by descending confidence.
///
/// # Errors
///
/// Returns error if `iou_threshold` is not in range [0.0, 1.0]
///
/// # Examples
///
/// ```
/// # use xray_eval::nms::reconcile;
/// # use xray_eval::types::{BoundingBox, Finding};
/// let findings = vec![
///     Finding::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 1).with_score(0.9),
///     Finding::new(BoundingBox::new(0.0, 0.0, 9.0, 9.0), 1).with_score(0.8),
/// ];
///
/// let kept = reconcile(&findings, 0.4).unwrap();
/// assert_eq!(kept.len(), 1);
/// assert_eq!(kept[0].score, Some(0.9));
/// ```
pub fn reconcile(findings: &[Finding], iou_threshold: f64) -> Result<Vec<Finding>> {
    validate_iou_threshold(iou_threshold)?;

    let mut by_class: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (idx, finding) in findings.iter().enumerate() {
        by_class.entry(finding.class_id).or_default().push(idx);
    }

    let mut reconciled = Vec::with_capacity(findings.len());

    for indices in by_class.values() {
        if let [single] = indices.as_slice() {
            reconciled.push(findings[*single].clone());
            continue;
        }

        let detections: Vec<Detection> = indices
            .iter()
            .map(|&idx| Detection {
                bbox: findings[idx].bbox,
                score: findings[idx].confidence(),
                index: idx,
            })
            .collect();

        let keep_mask = non_maximum_suppression(&detections, iou_threshold)?;
        for pos in suppression_order(&detections) {
            if keep_mask[pos] {
                reconciled.push(findings[detections[pos].index].clone());
            }
        }
    }

    Ok(reconciled)
}

impl ImageAnnotationSet {
    /// Reconcile this image's findings and apply the sentinel policy.
    ///
    /// Returns a new set; `self` is untouched.
    pub fn reconcile(&self, iou_threshold: f64) -> Result<ReconciledFindingSet> {
        self.validate_classes()?;

        let reconciled = reconcile(&self.findings, iou_threshold)?;
        log::debug!(
            "image {}: reconciled {} findings into {}",
            self.image_id,
            self.findings.len(),
            reconciled.len()
        );

        let findings = normalize(&reconciled, self.convention.no_finding_id());
        Ok(ReconciledFindingSet::from_normalized(ImageAnnotationSet {
            image_id: self.image_id.clone(),
            size: self.size,
            convention: self.convention,
            findings,
        }))
    }
}

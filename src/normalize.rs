//! "No finding" sentinel handling.
//!
//! A "No finding" entry must always carry the unit box `(0, 0, 1, 1)`, and an
//! image with nothing left after reconciliation is represented by a single
//! sentinel entry rather than by an empty list.

use crate::types::{BoundingBox, Finding};

/// Canonicalize ground-truth findings.
///
/// An empty input becomes a single unscored sentinel finding. Every finding
/// of class `no_finding_class_id` has its box forced to the unit box. Other
/// findings pass through unchanged. Idempotent.
///
/// # Example
///
/// ```
/// use xray_eval::normalize::normalize;
/// use xray_eval::types::{BoundingBox, Finding};
///
/// let normalized = normalize(&[], 14);
/// assert_eq!(normalized, vec![Finding::new(BoundingBox::unit(), 14)]);
/// ```
pub fn normalize(findings: &[Finding], no_finding_class_id: u32) -> Vec<Finding> {
    normalize_with(findings, no_finding_class_id, None)
}

/// Canonicalize predictions. Same as [`normalize`], but the substituted
/// sentinel carries a score of 1.0.
pub fn normalize_scored(findings: &[Finding], no_finding_class_id: u32) -> Vec<Finding> {
    normalize_with(findings, no_finding_class_id, Some(1.0))
}

fn normalize_with(findings: &[Finding], no_finding_class_id: u32, score: Option<f64>) -> Vec<Finding> {
    if findings.is_empty() {
        let mut sentinel = Finding::no_finding(no_finding_class_id);
        sentinel.score = score;
        return vec![sentinel];
    }

    findings
        .iter()
        .map(|finding| {
            if finding.class_id == no_finding_class_id {
                Finding {
                    bbox: BoundingBox::unit(),
                    ..finding.clone()
                }
            } else {
                finding.clone()
            }
        })
        .collect()
}

/// Drop findings whose box area is not above `min_area`.
///
/// "No finding" entries are exempt since their box is fixed. Returns the
/// retained findings and the number removed. Removal is a data quality
/// issue, so it is logged rather than treated as an error.
pub fn filter_degenerate(
    image_id: &str,
    findings: Vec<Finding>,
    min_area: f64,
    no_finding_class_id: u32,
) -> (Vec<Finding>, usize) {
    let before = findings.len();
    let kept: Vec<Finding> = findings
        .into_iter()
        .filter(|finding| {
            finding.class_id == no_finding_class_id
                || (finding.bbox.is_valid() && finding.bbox.area() > min_area)
        })
        .collect();

    let removed = before - kept.len();
    if removed > 0 {
        log::warn!("image {image_id}: filtered {removed} box(es) with area <= {min_area}");
    }

    (kept, removed)
}

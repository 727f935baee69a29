//! Average Precision (AP) and mean Average Precision (mAP) calculation.

use crate::metrics::precision_recall::interpolate_precision;

/// Calculate Average Precision (AP) from precision-recall curve.
///
/// Uses the COCO-style 101-point interpolation method.
///
/// # Arguments
///
/// * `precisions` - Vector of precision values (sorted by recall)
/// * `recalls` - Vector of recall values (sorted)
///
/// # Returns
///
/// Returns the Average Precision value (0.0 to 1.0).
///
/// # Example
///
/// ```
/// use xray_eval::metrics::ap::calculate_ap;
///
/// let precisions = vec![1.0, 1.0, 0.67, 0.75, 0.6];
/// let recalls = vec![0.25, 0.5, 0.5, 0.75, 0.75];
/// let ap = calculate_ap(&precisions, &recalls);
/// assert!(ap >= 0.0 && ap <= 1.0);
/// ```
pub fn calculate_ap(precisions: &[f64], recalls: &[f64]) -> f64 {
    if precisions.is_empty() || recalls.is_empty() {
        return 0.0;
    }

    let interpolated = interpolate_precision(precisions, recalls);

    // Average over all 101 recall levels
    interpolated.iter().sum::<f64>() / interpolated.len() as f64
}

/// Calculate mean Average Precision (mAP) across classes or IoU thresholds.
///
/// # Example
///
/// ```
/// use xray_eval::metrics::ap::calculate_map;
///
/// let class_aps = vec![0.8, 0.9, 0.75, 0.85];
/// let map = calculate_map(&class_aps);
/// assert!((map - 0.825).abs() < 1e-10);
/// ```
pub fn calculate_map(class_aps: &[f64]) -> f64 {
    if class_aps.is_empty() {
        return 0.0;
    }

    class_aps.iter().sum::<f64>() / class_aps.len() as f64
}

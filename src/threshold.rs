//! Confidence score thresholding utilities.

use crate::error::{Result, XrayEvalError};
use crate::types::PredictionRecord;

/// Keep predictions whose score is strictly above `threshold`.
///
/// # Errors
///
/// Returns an error if the threshold is not in the valid range [0.0, 1.0].
///
/// # Example
///
/// ```
/// use xray_eval::threshold::filter_by_score;
/// use xray_eval::types::{BoundingBox, PredictionRecord};
///
/// let records = vec![
///     PredictionRecord::new(BoundingBox::new(10.0, 20.0, 30.0, 40.0), 1, 0.9),
///     PredictionRecord::new(BoundingBox::new(50.0, 60.0, 70.0, 80.0), 1, 0.5),
/// ];
///
/// let filtered = filter_by_score(&records, 0.5).unwrap();
/// assert_eq!(filtered.len(), 1);
/// ```
pub fn filter_by_score(records: &[PredictionRecord], threshold: f64) -> Result<Vec<PredictionRecord>> {
    validate_threshold(threshold)?;

    Ok(records
        .iter()
        .filter(|record| record.score > threshold)
        .copied()
        .collect())
}

/// Generate a range of threshold values for evaluation.
///
/// # Arguments
///
/// * `start` - Starting threshold value (inclusive)
/// * `end` - Ending threshold value (inclusive)
/// * `steps` - Number of threshold values to generate
///
/// # Example
///
/// ```
/// use xray_eval::threshold::generate_threshold_range;
///
/// let thresholds = generate_threshold_range(0.5, 0.95, 10).unwrap();
/// assert_eq!(thresholds.len(), 10);
/// assert_eq!(thresholds[0], 0.5);
/// ```
pub fn generate_threshold_range(start: f64, end: f64, steps: usize) -> Result<Vec<f64>> {
    if steps == 0 {
        return Err(XrayEvalError::InvalidThreshold(
            "Number of steps must be greater than 0".to_string(),
        ));
    }

    validate_threshold(start)?;
    validate_threshold(end)?;

    if start > end {
        return Err(XrayEvalError::InvalidThreshold(format!(
            "Start threshold ({start}) must be <= end threshold ({end})"
        )));
    }

    if steps == 1 {
        return Ok(vec![start]);
    }

    let step_size = (end - start) / (steps - 1) as f64;
    Ok((0..steps).map(|i| start + step_size * i as f64).collect())
}

/// Validate that a threshold is in the valid range [0.0, 1.0].
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(XrayEvalError::InvalidThreshold(format!(
            "Threshold must be between 0.0 and 1.0, got {threshold}"
        )));
    }
    Ok(())
}

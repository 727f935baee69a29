//! Main evaluation orchestrator for chest X-ray detection metrics.
//!
//! Per image, predictions are thresholded, optionally round-tripped through
//! the string format, de-duplicated per class and normalized; ground truth is
//! normalized (and optionally reconciled again). Matching then runs per
//! class across all images at every IoU threshold.

use crate::config::EvaluationConfig;
use crate::error::{Result, XrayEvalError};
use crate::matching::{group_by_class, match_detections};
use crate::metrics::ap::{calculate_ap, calculate_map};
use crate::metrics::precision_recall::{calculate_precision_recall, calculate_precision_recall_curve};
use crate::nms::{descending_score, reconcile};
use crate::normalize::{filter_degenerate, normalize, normalize_scored};
use crate::stats::EvaluationStats;
use crate::threshold::filter_by_score;
use crate::types::{
    ClassAp, ClassReport, Finding, ImageAnnotationSet, ImagePredictionSet, MetricReport,
    PredictionRecord, ThresholdReport,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// One image's findings after preparation, grouped by class.
struct PreparedImage {
    predictions: BTreeMap<u32, Vec<Finding>>,
    ground_truth: BTreeMap<u32, Vec<Finding>>,
}

/// Evaluate detector predictions against ground truth.
///
/// Every ground-truth image is scored. An image without predictions is
/// scored as a "No finding" prediction with confidence 1.0. Predictions for
/// images absent from the ground truth are skipped with a warning.
///
/// # Errors
///
/// * [`XrayEvalError::EmptyDataset`] if `ground_truth` is empty.
/// * [`XrayEvalError::ConfigurationError`] if any collection uses a label
///   convention other than `config.convention`, or carries class ids
///   outside the taxonomy.
/// * [`XrayEvalError::InvalidAnnotation`] on duplicate ground-truth image ids.
/// * Threshold errors from an invalid `config`.
pub fn evaluate(
    predictions: &[ImagePredictionSet],
    ground_truth: &[ImageAnnotationSet],
    config: &EvaluationConfig,
) -> Result<MetricReport> {
    config.validate()?;

    if ground_truth.is_empty() {
        return Err(XrayEvalError::EmptyDataset(
            "No ground-truth images to evaluate".to_string(),
        ));
    }

    let mut stats = EvaluationStats::new();

    let mut predictions_by_image: BTreeMap<&str, Vec<PredictionRecord>> = BTreeMap::new();
    for set in predictions {
        config
            .convention
            .ensure_same(set.convention, &format!("predictions for image {}", set.image_id))?;
        set.validate_classes()?;

        stats.total_predictions += set.records.len();
        predictions_by_image
            .entry(set.image_id.as_str())
            .or_default()
            .extend(set.records.iter().copied());
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut images = Vec::with_capacity(ground_truth.len());

    for set in ground_truth {
        config
            .convention
            .ensure_same(set.convention, &format!("ground truth for image {}", set.image_id))?;
        set.validate_classes()?;

        if !seen.insert(set.image_id.as_str()) {
            return Err(XrayEvalError::InvalidAnnotation(format!(
                "duplicate ground-truth image id {}",
                set.image_id
            )));
        }

        let records = predictions_by_image
            .remove(set.image_id.as_str())
            .unwrap_or_default();
        let prepared_predictions = prepare_predictions(&set.image_id, &records, config, &mut stats)?;
        let prepared_ground_truth = prepare_ground_truth(set, config, &mut stats)?;

        images.push(PreparedImage {
            predictions: group_by_class(&prepared_predictions),
            ground_truth: group_by_class(&prepared_ground_truth),
        });
    }

    for (image_id, records) in &predictions_by_image {
        log::warn!(
            "skipping {} prediction(s) for image {} which has no ground truth",
            records.len(),
            image_id
        );
        stats.unknown_image_predictions += records.len();
    }

    stats.images_evaluated = images.len();
    log_class_counts(&images);

    let class_ids: BTreeSet<u32> = images
        .iter()
        .flat_map(|image| image.predictions.keys().chain(image.ground_truth.keys()))
        .copied()
        .collect();

    let per_threshold: Vec<ThresholdReport> = config
        .iou_thresholds
        .iter()
        .map(|&iou_threshold| evaluate_threshold(&images, &class_ids, iou_threshold, config))
        .collect();

    let ap_per_class: Vec<ClassAp> = class_ids
        .iter()
        .enumerate()
        .map(|(idx, &class_id)| {
            let aps: Vec<f64> = per_threshold.iter().map(|t| t.classes[idx].ap).collect();
            let first = &per_threshold[0].classes[idx];
            ClassAp {
                class_id,
                class_name: first.class_name.clone(),
                ap: calculate_map(&aps),
                included_in_map: first.included_in_map,
            }
        })
        .collect();

    let threshold_maps: Vec<f64> = per_threshold.iter().map(|t| t.map).collect();

    stats.log_summary();

    Ok(MetricReport {
        map: calculate_map(&threshold_maps),
        iou_thresholds: config.iou_thresholds.clone(),
        per_threshold,
        ap_per_class,
        stats,
    })
}

/// Evaluate at a single IoU threshold and return the mean AP.
pub fn evaluate_at_iou(
    predictions: &[ImagePredictionSet],
    ground_truth: &[ImageAnnotationSet],
    config: &EvaluationConfig,
    iou_threshold: f64,
) -> Result<f64> {
    let config = EvaluationConfig {
        iou_thresholds: vec![iou_threshold],
        ..config.clone()
    };
    Ok(evaluate(predictions, ground_truth, &config)?.map)
}

fn prepare_predictions(
    image_id: &str,
    records: &[PredictionRecord],
    config: &EvaluationConfig,
    stats: &mut EvaluationStats,
) -> Result<Vec<Finding>> {
    let no_finding = config.convention.no_finding_id();

    let mut kept = filter_by_score(records, config.score_threshold)?;
    stats.dropped_below_threshold += records.len() - kept.len();

    if config.round_trip_strings {
        let codec = config.codec();
        kept = codec.decode(&codec.encode(&kept))?;
    }

    let findings: Vec<Finding> = kept.into_iter().map(Finding::from).collect();
    let reconciled = reconcile(&findings, config.prediction_nms_iou)?;
    stats.suppressed_by_nms += findings.len() - reconciled.len();

    let (valid, removed) = filter_degenerate(image_id, reconciled, config.min_box_area, no_finding);
    stats.degenerate_predictions += removed;

    if valid.is_empty() {
        stats.prediction_sentinels += 1;
    }
    Ok(normalize_scored(&valid, no_finding))
}

fn prepare_ground_truth(
    set: &ImageAnnotationSet,
    config: &EvaluationConfig,
    stats: &mut EvaluationStats,
) -> Result<Vec<Finding>> {
    let no_finding = config.convention.no_finding_id();

    let findings = match config.ground_truth_nms_iou {
        Some(iou) => {
            let reconciled = reconcile(&set.findings, iou)?;
            stats.suppressed_ground_truth += set.findings.len() - reconciled.len();
            reconciled
        }
        None => set.findings.clone(),
    };

    let (valid, removed) = filter_degenerate(&set.image_id, findings, config.min_box_area, no_finding);
    stats.degenerate_ground_truth += removed;

    if valid.is_empty() {
        stats.ground_truth_sentinels += 1;
    }
    Ok(normalize(&valid, no_finding))
}

fn evaluate_threshold(
    images: &[PreparedImage],
    class_ids: &BTreeSet<u32>,
    iou_threshold: f64,
    config: &EvaluationConfig,
) -> ThresholdReport {
    let classes: Vec<ClassReport> = class_ids
        .iter()
        .map(|&class_id| evaluate_single_class(images, class_id, iou_threshold, config))
        .collect();

    let included: Vec<f64> = classes
        .iter()
        .filter(|report| report.included_in_map)
        .map(|report| report.ap)
        .collect();

    ThresholdReport {
        iou_threshold,
        map: calculate_map(&included),
        classes,
    }
}

/// Evaluate a single class at a specific IoU threshold, across all images.
fn evaluate_single_class(
    images: &[PreparedImage],
    class_id: u32,
    iou_threshold: f64,
    config: &EvaluationConfig,
) -> ClassReport {
    let mut detections: Vec<(f64, bool)> = Vec::new();
    let mut total_gt_count = 0;

    for image in images {
        let gts = image.ground_truth.get(&class_id).map(Vec::as_slice).unwrap_or(&[]);
        let preds = image.predictions.get(&class_id).map(Vec::as_slice).unwrap_or(&[]);

        total_gt_count += gts.len();

        if !preds.is_empty() {
            detections.extend(
                match_detections(preds, gts, iou_threshold)
                    .into_iter()
                    .map(|m| (m.confidence, m.is_true_positive)),
            );
        }
    }

    // Stable: equal confidences keep image order
    detections.sort_by(|a, b| descending_score(a.0, b.0));

    let curve = calculate_precision_recall_curve(&detections, total_gt_count);
    let precisions: Vec<f64> = curve.iter().map(|p| p.precision).collect();
    let recalls: Vec<f64> = curve.iter().map(|p| p.recall).collect();

    let true_positives = detections.iter().filter(|(_, is_tp)| *is_tp).count();
    let false_positives = detections.len() - true_positives;
    let false_negatives = total_gt_count - true_positives;
    let pr = calculate_precision_recall(true_positives, false_positives, false_negatives);

    // Classes without ground truth have no defined AP
    let ap = if total_gt_count > 0 {
        calculate_ap(&precisions, &recalls)
    } else {
        0.0
    };

    let is_no_finding = config.convention.is_no_finding(class_id);
    let included_in_map = total_gt_count > 0 && (config.include_no_finding_in_map || !is_no_finding);

    ClassReport {
        class_id,
        class_name: config.convention.class_name(class_id).map(str::to_string),
        ap,
        true_positives,
        false_positives,
        false_negatives,
        precision: pr.precision,
        recall: pr.recall,
        ground_truths: total_gt_count,
        included_in_map,
    }
}

fn log_class_counts(images: &[PreparedImage]) {
    let mut prediction_counts: BTreeMap<u32, usize> = BTreeMap::new();
    let mut target_counts: BTreeMap<u32, usize> = BTreeMap::new();

    for image in images {
        for (&class_id, findings) in &image.predictions {
            *prediction_counts.entry(class_id).or_default() += findings.len();
        }
        for (&class_id, findings) in &image.ground_truth {
            *target_counts.entry(class_id).or_default() += findings.len();
        }
    }

    log::info!("Total class counts of the predictions are: {prediction_counts:?}");
    log::info!("Total class counts of the targets are: {target_counts:?}");
}

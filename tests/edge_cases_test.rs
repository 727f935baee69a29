//! Edge case tests: sentinels, degenerate boxes, unknown images and
//! classes without ground truth.

use xray_eval::codec::{CodecConfig, CoordinateFormat, PredictionStringCodec};
use xray_eval::config::EvaluationConfig;
use xray_eval::convention::LabelConvention;
use xray_eval::evaluator::evaluate;
use xray_eval::nms::reconcile;
use xray_eval::normalize::normalize;
use xray_eval::rescale::rescale_finding;
use xray_eval::types::{BoundingBox, Finding, ImageAnnotationSet, ImagePredictionSet, ImageSize, PredictionRecord};

fn gt(image_id: &str, findings: Vec<Finding>) -> ImageAnnotationSet {
    ImageAnnotationSet::new(image_id, ImageSize::new(1024, 1024), LabelConvention::Dataset, findings)
}

fn preds(image_id: &str, records: Vec<PredictionRecord>) -> ImagePredictionSet {
    ImagePredictionSet::new(image_id, LabelConvention::Dataset, records)
}

#[test]
fn test_empty_ground_truth_normalizes_to_sentinel() {
    assert_eq!(normalize(&[], 14), vec![Finding::new(BoundingBox::unit(), 14)]);
    assert_eq!(normalize(&[], 0), vec![Finding::new(BoundingBox::unit(), 0)]);
}

#[test]
fn test_reconcile_empty_input() {
    assert!(reconcile(&[], 0.5).unwrap().is_empty());
}

#[test]
fn test_reconcile_example_pair() {
    let findings = vec![
        Finding::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 1).with_score(0.9),
        Finding::new(BoundingBox::new(0.0, 0.0, 9.0, 9.0), 1).with_score(0.8),
    ];
    let kept = reconcile(&findings, 0.4).unwrap();
    assert_eq!(kept, vec![findings[0].clone()]);
}

#[test]
fn test_reconcile_threshold_is_exclusive() {
    // IoU of these two boxes is exactly 0.5
    let findings = vec![
        Finding::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 2).with_score(0.9),
        Finding::new(BoundingBox::new(0.0, 0.0, 10.0, 5.0), 2).with_score(0.8),
    ];
    assert_eq!(reconcile(&findings, 0.5).unwrap().len(), 2);
    assert_eq!(reconcile(&findings, 0.49).unwrap().len(), 1);
}

#[test]
fn test_no_finding_encoding_ignores_score_and_box() {
    let codec = PredictionStringCodec::new(LabelConvention::Dataset, CodecConfig::default());
    let record = PredictionRecord::new(BoundingBox::new(12.0, 34.0, 560.0, 780.0), 14, 0.123);
    assert_eq!(codec.encode(&[record]), "14 1.0 0 0 1 1");

    let detector = PredictionStringCodec::new(LabelConvention::Detector, CodecConfig::default());
    let record = PredictionRecord::new(BoundingBox::new(12.0, 34.0, 560.0, 780.0), 0, 0.4);
    assert_eq!(detector.encode(&[record]), "0 1.0 0 0 1 1");
}

#[test]
fn test_float_coordinates_and_full_precision_scores() {
    let codec = PredictionStringCodec::new(
        LabelConvention::Dataset,
        CodecConfig {
            coordinates: CoordinateFormat::Float,
            score_decimals: None,
        },
    );
    let records = vec![PredictionRecord::new(BoundingBox::new(10.5, 20.25, 30.0, 40.75), 2, 0.123456)];
    let encoded = codec.encode(&records);
    assert_eq!(encoded, "2 0.123456 10.5 20.25 30 40.75");
    assert_eq!(codec.decode(&encoded).unwrap(), records);
}

#[test]
fn test_decode_empty_string() {
    let codec = PredictionStringCodec::new(LabelConvention::Dataset, CodecConfig::default());
    assert!(codec.decode("").unwrap().is_empty());
    assert!(codec.decode("   ").unwrap().is_empty());
}

#[test]
fn test_sentinel_is_never_rescaled() {
    let sentinel = Finding::no_finding(14);
    let rescaled = rescale_finding(&sentinel, ImageSize::new(1024, 1024), ImageSize::new(3000, 2000), 14).unwrap();
    assert_eq!(rescaled.bbox, BoundingBox::unit());
}

#[test]
fn test_no_finding_with_real_box_matches_sentinel() {
    // A "No finding" label carrying coordinates is forced to the unit box on both sides
    let ground_truth = vec![gt("img1", vec![Finding::new(BoundingBox::new(5.0, 5.0, 500.0, 500.0), 14)])];
    let predictions = vec![preds(
        "img1",
        vec![PredictionRecord::new(BoundingBox::new(100.0, 100.0, 200.0, 200.0), 14, 0.7)],
    )];

    let report = evaluate(&predictions, &ground_truth, &EvaluationConfig::default()).unwrap();
    assert!((report.map - 1.0).abs() < 1e-9);
}

#[test]
fn test_predictions_for_unknown_images_are_skipped() {
    let ground_truth = vec![gt("img1", vec![Finding::new(BoundingBox::new(0.0, 0.0, 50.0, 50.0), 1)])];
    let predictions = vec![
        preds("img1", vec![PredictionRecord::new(BoundingBox::new(0.0, 0.0, 50.0, 50.0), 1, 0.9)]),
        preds(
            "ghost",
            vec![
                PredictionRecord::new(BoundingBox::new(0.0, 0.0, 50.0, 50.0), 1, 0.9),
                PredictionRecord::new(BoundingBox::new(60.0, 60.0, 90.0, 90.0), 2, 0.9),
            ],
        ),
    ];

    let report = evaluate(&predictions, &ground_truth, &EvaluationConfig::default()).unwrap();
    assert_eq!(report.stats.unknown_image_predictions, 2);
    assert_eq!(report.stats.total_predictions, 3);
    assert!((report.map - 1.0).abs() < 1e-9);
}

#[test]
fn test_prediction_sets_for_one_image_are_merged() {
    let ground_truth = vec![gt(
        "img1",
        vec![
            Finding::new(BoundingBox::new(0.0, 0.0, 50.0, 50.0), 1),
            Finding::new(BoundingBox::new(100.0, 100.0, 150.0, 150.0), 2),
        ],
    )];
    let predictions = vec![
        preds("img1", vec![PredictionRecord::new(BoundingBox::new(0.0, 0.0, 50.0, 50.0), 1, 0.9)]),
        preds("img1", vec![PredictionRecord::new(BoundingBox::new(100.0, 100.0, 150.0, 150.0), 2, 0.8)]),
    ];

    let report = evaluate(&predictions, &ground_truth, &EvaluationConfig::default()).unwrap();
    assert!((report.map - 1.0).abs() < 1e-9);
}

#[test]
fn test_class_without_ground_truth_is_reported_but_excluded() {
    let ground_truth = vec![gt("img1", vec![Finding::new(BoundingBox::new(0.0, 0.0, 50.0, 50.0), 1)])];
    let predictions = vec![preds(
        "img1",
        vec![
            PredictionRecord::new(BoundingBox::new(0.0, 0.0, 50.0, 50.0), 1, 0.9),
            PredictionRecord::new(BoundingBox::new(200.0, 200.0, 300.0, 300.0), 5, 0.8),
        ],
    )];

    let report = evaluate(&predictions, &ground_truth, &EvaluationConfig::default()).unwrap();
    let class5 = report.per_threshold[0]
        .classes
        .iter()
        .find(|c| c.class_id == 5)
        .unwrap();

    assert!(!class5.included_in_map);
    assert_eq!(class5.false_positives, 1);
    assert_eq!(class5.ground_truths, 0);
    assert!((report.map - 1.0).abs() < 1e-9);
}

#[test]
fn test_degenerate_predictions_are_filtered() {
    let ground_truth = vec![gt("img1", vec![])];
    let predictions = vec![preds(
        "img1",
        vec![PredictionRecord::new(BoundingBox::new(10.0, 10.0, 10.0, 40.0), 3, 0.9)],
    )];

    let report = evaluate(&predictions, &ground_truth, &EvaluationConfig::default()).unwrap();

    // The only prediction is removed, so the image predicts "No finding"
    assert_eq!(report.stats.degenerate_predictions, 1);
    assert_eq!(report.stats.degenerate_ground_truth, 0);
    assert_eq!(report.stats.scored_predictions(), 0);
    assert_eq!(report.stats.prediction_sentinels, 1);
    assert!((report.map - 1.0).abs() < 1e-9);
}

#[test]
fn test_ground_truth_re_reconciliation() {
    let ground_truth = vec![gt(
        "img1",
        vec![
            Finding::new(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 6).with_rad_id("R1"),
            Finding::new(BoundingBox::new(2.0, 2.0, 100.0, 100.0), 6).with_rad_id("R2"),
        ],
    )];
    let predictions = vec![preds(
        "img1",
        vec![PredictionRecord::new(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 6, 0.9)],
    )];

    let raw = evaluate(&predictions, &ground_truth, &EvaluationConfig::default()).unwrap();
    assert_eq!(raw.per_threshold[0].classes[0].false_negatives, 1);

    let config = EvaluationConfig {
        ground_truth_nms_iou: Some(0.5),
        ..EvaluationConfig::default()
    };
    let merged = evaluate(&predictions, &ground_truth, &config).unwrap();
    assert_eq!(merged.stats.suppressed_ground_truth, 1);
    assert_eq!(merged.per_threshold[0].classes[0].false_negatives, 0);
    assert!((merged.map - 1.0).abs() < 1e-9);
}

#[test]
fn test_ties_are_broken_by_input_order() {
    let findings = vec![
        Finding::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 4).with_score(0.8).with_rad_id("first"),
        Finding::new(BoundingBox::new(1.0, 1.0, 10.0, 10.0), 4).with_score(0.8).with_rad_id("second"),
    ];
    for _ in 0..10 {
        let kept = reconcile(&findings, 0.3).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].rad_id.as_deref(), Some("first"));
    }
}

#[test]
fn test_round_trip_keeps_small_box_at_origin() {
    // Integer coordinates turn this box into "0 0 1 1"
    let ground_truth = vec![gt("img1", vec![Finding::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0)])];
    let predictions = vec![preds(
        "img1",
        vec![PredictionRecord::new(BoundingBox::new(0.4, 0.2, 1.9, 1.8), 0, 0.9)],
    )];
    let config = EvaluationConfig {
        round_trip_strings: true,
        ..EvaluationConfig::default()
    };

    let report = evaluate(&predictions, &ground_truth, &config).unwrap();
    assert!((report.map - 1.0).abs() < 1e-9);
    assert_eq!(report.stats.prediction_sentinels, 0);
}

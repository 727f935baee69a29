//! # xray-eval
//!
//! Finding reconciliation and detection scoring for chest radiograph models
//! trained on the VinBigData taxonomy (14 pathologies plus "No finding").
//!
//! This library provides:
//! - **Reconciliation** of overlapping radiologist boxes with per-class NMS
//! - **Sentinel handling**: an image with nothing to report carries a single
//!   "No finding" entry with the unit box `(0, 0, 1, 1)`
//! - **Label conventions**: the dataset numbering (no finding = 14) and the
//!   detector numbering (no finding = 0, pathologies shifted by one)
//! - **Prediction strings**: the `class score x_min y_min x_max y_max`
//!   submission format, bit-compatible with existing scorers
//! - **Rescaling** between the working resolution and original image sizes
//! - **mAP** with COCO-style 101-point interpolation at configurable IoU
//!   thresholds
//!
//! ## Quick Start
//!
//! ```rust
//! use xray_eval::config::EvaluationConfig;
//! use xray_eval::convention::LabelConvention;
//! use xray_eval::evaluator::evaluate;
//! use xray_eval::types::{BoundingBox, Finding, ImageAnnotationSet, ImagePredictionSet, ImageSize, PredictionRecord};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bbox = BoundingBox::new(100.0, 100.0, 300.0, 300.0);
//! let ground_truth = vec![ImageAnnotationSet::new(
//!     "img1",
//!     ImageSize::new(1024, 1024),
//!     LabelConvention::Dataset,
//!     vec![Finding::new(bbox, 3)],
//! )];
//! let predictions = vec![ImagePredictionSet::new(
//!     "img1",
//!     LabelConvention::Dataset,
//!     vec![PredictionRecord::new(bbox, 3, 0.9)],
//! )];
//!
//! let report = evaluate(&predictions, &ground_truth, &EvaluationConfig::default())?;
//! assert!((report.map - 1.0).abs() < 1e-9);
//! # Ok(())
//! # }
//! ```
//!
//! ## Submission format
//!
//! ```text
//! image_id,PredictionString
//! 002a34c58c5b758217ed1f584ccbcfe9,3 0.8765 691 1375 1653 1831 0 0.5012 1264 743 1440 1001
//! 004f33259ee4aef671c2b95d54e4be68,14 1.0 0 0 1 1
//! ```

pub mod error;
pub mod types;
pub mod convention;
pub mod config;
pub mod loader;
pub mod threshold;
pub mod metrics;
pub mod nms;
pub mod normalize;
pub mod codec;
pub mod rescale;
pub mod matching;
pub mod stats;
pub mod evaluator;
pub mod table;
pub mod dataset;

// Re-export commonly used types and functions
pub use error::{Result, XrayEvalError};
pub use types::{
    BoundingBox, Finding, ImageAnnotationSet, ImagePredictionSet, ImageSize, MetricReport,
    PredictionRecord, ReconciledFindingSet,
};
pub use convention::LabelConvention;
pub use config::{EvaluationConfig, TargetConfig};
pub use codec::PredictionStringCodec;
pub use nms::reconcile;
pub use normalize::normalize;
pub use rescale::rescale;
pub use evaluator::{evaluate, evaluate_at_iou};
pub use loader::{load_config_from_file, load_config_from_str};

//! Metrics calculation modules for detection evaluation.

pub mod iou;
pub mod ap;
pub mod precision_recall;

pub use iou::{calculate_iou, calculate_iou_matrix};
pub use ap::{calculate_ap, calculate_map};
pub use precision_recall::{
    calculate_precision_recall, calculate_precision_recall_curve, PrecisionRecall,
    PrecisionRecallPoint,
};

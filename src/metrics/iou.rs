//! Intersection over Union (IoU) calculation.

use crate::types::BoundingBox;

/// Calculate the Intersection over Union (IoU) between two bounding boxes.
///
/// IoU is defined as the area of intersection divided by the area of union.
/// Two degenerate boxes (zero union) have an IoU of 0.0.
///
/// # Arguments
///
/// * `bbox1` - First bounding box
/// * `bbox2` - Second bounding box
///
/// # Returns
///
/// Returns a value between 0.0 (no overlap) and 1.0 (perfect overlap).
///
/// # Example
///
/// ```
/// use xray_eval::metrics::iou::calculate_iou;
/// use xray_eval::types::BoundingBox;
///
/// let bbox1 = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
/// let bbox2 = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
/// let iou = calculate_iou(&bbox1, &bbox2);
/// assert!(iou > 0.0 && iou < 1.0);
/// ```
pub fn calculate_iou(bbox1: &BoundingBox, bbox2: &BoundingBox) -> f64 {
    // Calculate intersection coordinates
    let x_left = bbox1.x_min.max(bbox2.x_min);
    let y_top = bbox1.y_min.max(bbox2.y_min);
    let x_right = bbox1.x_max.min(bbox2.x_max);
    let y_bottom = bbox1.y_max.min(bbox2.y_max);

    // If there's no intersection
    if x_right < x_left || y_bottom < y_top {
        return 0.0;
    }

    let intersection_area = (x_right - x_left) * (y_bottom - y_top);
    let union_area = bbox1.area() + bbox2.area() - intersection_area;

    // Avoid division by zero
    if union_area <= 0.0 {
        return 0.0;
    }

    intersection_area / union_area
}

/// Calculate IoU matrix between two sets of bounding boxes.
///
/// # Returns
///
/// Returns a 2D vector where `result[i][j]` is the IoU between `bboxes1[i]` and `bboxes2[j]`.
pub fn calculate_iou_matrix(bboxes1: &[BoundingBox], bboxes2: &[BoundingBox]) -> Vec<Vec<f64>> {
    bboxes1
        .iter()
        .map(|bbox1| {
            bboxes2
                .iter()
                .map(|bbox2| calculate_iou(bbox1, bbox2))
                .collect()
        })
        .collect()
}

//! Annotation-table access and detector target preparation.
//!
//! The annotation table has one row per radiologist finding, with
//! coordinates in the image's native pixel frame. A row without coordinates
//! records that the radiologist saw nothing.

use crate::config::TargetConfig;
use crate::convention::LabelConvention;
use crate::error::{Result, XrayEvalError};
use crate::normalize::{filter_degenerate, normalize};
use crate::rescale::rescale;
use crate::types::{BoundingBox, Finding, ImageAnnotationSet, ImageSize, ReconciledFindingSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;

/// One row of the annotation table. Class ids use the dataset convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRow {
    pub image_id: String,
    pub class_name: String,
    pub class_id: u32,
    #[serde(default)]
    pub rad_id: Option<String>,
    #[serde(default)]
    pub x_min: Option<f64>,
    #[serde(default)]
    pub y_min: Option<f64>,
    #[serde(default)]
    pub x_max: Option<f64>,
    #[serde(default)]
    pub y_max: Option<f64>,
    pub width: u32,
    pub height: u32,
}

impl AnnotationRow {
    /// The row's box, if all four coordinates are present and finite.
    pub fn bbox(&self) -> Option<BoundingBox> {
        match (self.x_min, self.y_min, self.x_max, self.y_max) {
            (Some(x_min), Some(y_min), Some(x_max), Some(y_max)) => {
                let bbox = BoundingBox::new(x_min, y_min, x_max, y_max);
                bbox.to_array().iter().all(|v| v.is_finite()).then_some(bbox)
            }
            _ => None,
        }
    }

    pub fn native_size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }
}

/// Parse an annotation table with a header row.
pub fn read_annotation_rows<R: io::Read>(reader: R) -> Result<Vec<AnnotationRow>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let rows = csv_reader
        .deserialize()
        .collect::<std::result::Result<Vec<AnnotationRow>, csv::Error>>()?;
    log::debug!("read {} annotation rows", rows.len());
    Ok(rows)
}

/// Group rows by image id, images in first-seen order.
pub fn group_annotation_rows(rows: Vec<AnnotationRow>) -> Vec<(String, Vec<AnnotationRow>)> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<AnnotationRow>)> = Vec::new();

    for row in rows {
        match positions.get(&row.image_id) {
            Some(&pos) => groups[pos].1.push(row),
            None => {
                positions.insert(row.image_id.clone(), groups.len());
                groups.push((row.image_id.clone(), vec![row]));
            }
        }
    }

    groups
}

/// Build the detector target for one image.
///
/// Boxes are rescaled from the native size to `config.working_size`, class
/// ids are expressed in `config.convention`, and radiologist findings of one
/// class are merged by NMS at `config.iou_threshold`. The returned set is in
/// the working frame and is never empty.
///
/// # Errors
///
/// * [`XrayEvalError::InvalidAnnotation`] if `rows` is empty, contains other
///   image ids, or disagrees on the native image size.
/// * [`XrayEvalError::ConfigurationError`] for out-of-range class ids or an
///   invalid `config`.
pub fn prepare_target(image_id: &str, rows: &[AnnotationRow], config: &TargetConfig) -> Result<ReconciledFindingSet> {
    config.validate()?;

    let first = rows.first().ok_or_else(|| {
        XrayEvalError::InvalidAnnotation(format!("image {image_id} has no annotation rows"))
    })?;
    let native = first.native_size();
    native.validate()?;

    let no_finding = config.convention.no_finding_id();
    let mut findings = Vec::with_capacity(rows.len());

    for row in rows {
        if row.image_id != image_id {
            return Err(XrayEvalError::InvalidAnnotation(format!(
                "row for image {} grouped under image {}",
                row.image_id, image_id
            )));
        }
        if row.native_size() != native {
            return Err(XrayEvalError::InvalidAnnotation(format!(
                "image {}: conflicting sizes {}x{} and {}x{}",
                image_id, native.width, native.height, row.width, row.height
            )));
        }

        let dataset_id = row.class_id;
        LabelConvention::Dataset.validate(dataset_id)?;

        let mut finding = match row.bbox() {
            Some(bbox) if !LabelConvention::Dataset.is_no_finding(dataset_id) => {
                let class_id = LabelConvention::Dataset.convert(dataset_id, config.convention)?;
                Finding::new(rescale(&bbox, native, config.working_size)?, class_id)
            }
            _ => Finding::no_finding(no_finding),
        };
        if let Some(rad_id) = &row.rad_id {
            finding = finding.with_rad_id(rad_id.clone());
        }
        findings.push(finding);
    }

    let reconciled = ImageAnnotationSet::new(image_id, config.working_size, config.convention, findings)
        .reconcile(config.iou_threshold)?
        .into_annotation_set();

    let truncated: Vec<Finding> = if config.truncate_coordinates {
        reconciled
            .findings
            .into_iter()
            .map(|finding| Finding {
                bbox: finding.bbox.truncated(),
                ..finding
            })
            .collect()
    } else {
        reconciled.findings
    };

    let (kept, _) = filter_degenerate(image_id, truncated, config.min_box_area, no_finding);

    Ok(ReconciledFindingSet::from_normalized(ImageAnnotationSet {
        findings: normalize(&kept, no_finding),
        ..reconciled
    }))
}

/// Prepare targets for every image in the table, in first-seen order.
pub fn prepare_targets(rows: Vec<AnnotationRow>, config: &TargetConfig) -> Result<Vec<ReconciledFindingSet>> {
    let groups = group_annotation_rows(rows);
    log::info!("preparing targets for {} images", groups.len());

    groups
        .iter()
        .map(|(image_id, image_rows)| prepare_target(image_id, image_rows, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
image_id,class_name,class_id,rad_id,x_min,y_min,x_max,y_max,width,height
img1,Cardiomegaly,3,R1,100,200,300,400,2048,2048
img1,Cardiomegaly,3,R2,102,202,302,402,2048,2048
img1,No finding,14,R3,,,,,2048,2048
img2,No finding,14,R1,,,,,1000,500
";

    fn rows() -> Vec<AnnotationRow> {
        read_annotation_rows(TABLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_read_rows() {
        let rows = rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].bbox(), Some(BoundingBox::new(100.0, 200.0, 300.0, 400.0)));
        assert_eq!(rows[2].bbox(), None);
        assert_eq!(rows[2].rad_id.as_deref(), Some("R3"));
    }

    #[test]
    fn test_group_preserves_order() {
        let groups = group_annotation_rows(rows());
        let ids: Vec<&str> = groups.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["img1", "img2"]);
        assert_eq!(groups[0].1.len(), 3);
    }

    #[test]
    fn test_prepare_target_merges_and_rescales() {
        let groups = group_annotation_rows(rows());
        let target = prepare_target("img1", &groups[0].1, &TargetConfig::default()).unwrap();

        assert_eq!(target.convention(), LabelConvention::Detector);
        assert_eq!(target.size(), ImageSize::new(1024, 1024));

        let findings = target.findings();
        assert_eq!(findings.len(), 2);
        // Detector convention: "No finding" is 0 and sorts first
        assert_eq!(findings[0].class_id, 0);
        assert_eq!(findings[0].bbox, BoundingBox::unit());
        assert_eq!(findings[1].class_id, 4);
        assert_eq!(findings[1].bbox, BoundingBox::new(50.0, 100.0, 150.0, 200.0));
    }

    #[test]
    fn test_prepare_target_no_finding_image() {
        let groups = group_annotation_rows(rows());
        let config = TargetConfig {
            convention: LabelConvention::Dataset,
            ..TargetConfig::default()
        };
        let target = prepare_target("img2", &groups[1].1, &config).unwrap();
        assert_eq!(target.findings().len(), 1);
        assert_eq!(target.findings()[0].class_id, 14);
        assert_eq!(target.findings()[0].bbox, BoundingBox::unit());
    }

    #[test]
    fn test_prepare_target_restores_sentinel_after_filtering() {
        let rows = read_annotation_rows(
            "image_id,class_name,class_id,rad_id,x_min,y_min,x_max,y_max,width,height\n\
             tiny,Nodule/Mass,8,R1,10,10,11,11,2048,2048\n"
                .as_bytes(),
        )
        .unwrap();
        // 1x1 px at 2048 becomes 0.5x0.5 at 1024, truncated to zero area
        let target = prepare_target("tiny", &rows, &TargetConfig::default()).unwrap();
        assert_eq!(target.findings(), &[Finding::no_finding(0)]);
    }

    #[test]
    fn test_prepare_target_conflicting_sizes() {
        let mut rows = rows();
        rows.truncate(2);
        rows[1].width = 1024;
        assert!(matches!(
            prepare_target("img1", &rows, &TargetConfig::default()),
            Err(XrayEvalError::InvalidAnnotation(_))
        ));
    }

    #[test]
    fn test_prepare_target_empty() {
        assert!(matches!(
            prepare_target("none", &[], &TargetConfig::default()),
            Err(XrayEvalError::InvalidAnnotation(_))
        ));
    }
}

//! Row-per-finding evaluation tables and the `image_id,PredictionString`
//! submission table.

use crate::codec::PredictionStringCodec;
use crate::convention::LabelConvention;
use crate::error::{Result, XrayEvalError};
use crate::rescale::rescale_prediction_string;
use crate::types::{BoundingBox, Finding, ImageAnnotationSet, ImagePredictionSet, ImageSize};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io;

/// One finding of one image. Ground-truth rows carry no score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub image_id: String,
    pub class_id: u32,
    pub bbox: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Flat table of findings, all in one label convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationTable {
    pub convention: LabelConvention,
    pub rows: Vec<EvaluationRow>,
}

impl EvaluationTable {
    /// Build a table from ground-truth sets. Images whose set is empty
    /// contribute no rows.
    pub fn from_ground_truth(convention: LabelConvention, sets: &[ImageAnnotationSet]) -> Result<Self> {
        let mut rows = Vec::new();
        for set in sets {
            convention.ensure_same(set.convention, &format!("ground truth for image {}", set.image_id))?;
            rows.extend(set.findings.iter().map(|finding| EvaluationRow {
                image_id: set.image_id.clone(),
                class_id: finding.class_id,
                bbox: finding.bbox,
                score: None,
            }));
        }
        Ok(Self { convention, rows })
    }

    pub fn from_predictions(convention: LabelConvention, sets: &[ImagePredictionSet]) -> Result<Self> {
        let mut rows = Vec::new();
        for set in sets {
            convention.ensure_same(set.convention, &format!("predictions for image {}", set.image_id))?;
            rows.extend(set.records.iter().map(|record| EvaluationRow {
                image_id: set.image_id.clone(),
                class_id: record.class_id,
                bbox: record.bbox,
                score: Some(record.score),
            }));
        }
        Ok(Self { convention, rows })
    }

    /// Findings per image id, in row order within each image.
    pub fn group_by_image(&self) -> BTreeMap<String, Vec<Finding>> {
        let mut groups: BTreeMap<String, Vec<Finding>> = BTreeMap::new();
        for row in &self.rows {
            let finding = Finding {
                bbox: row.bbox,
                class_id: row.class_id,
                score: row.score,
                rad_id: None,
            };
            groups.entry(row.image_id.clone()).or_default().push(finding);
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One line of a submission file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRow {
    pub image_id: String,
    #[serde(rename = "PredictionString")]
    pub prediction_string: String,
}

impl SubmissionRow {
    pub fn new(image_id: impl Into<String>, prediction_string: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            prediction_string: prediction_string.into(),
        }
    }
}

/// Encode predictions as submission rows, one per image in first-seen order.
///
/// Sets sharing an image id are concatenated. An image without records is
/// written as the "No finding" literal.
///
/// # Errors
///
/// Returns a configuration error if a set's convention differs from the
/// codec's.
pub fn to_submission(predictions: &[ImagePredictionSet], codec: &PredictionStringCodec) -> Result<Vec<SubmissionRow>> {
    let mut order: Vec<&str> = Vec::new();
    let mut records_by_image: HashMap<&str, Vec<_>> = HashMap::new();

    for set in predictions {
        codec
            .convention
            .ensure_same(set.convention, &format!("predictions for image {}", set.image_id))?;

        let entry = records_by_image.entry(set.image_id.as_str()).or_insert_with(|| {
            order.push(set.image_id.as_str());
            Vec::new()
        });
        entry.extend(set.records.iter().copied());
    }

    Ok(order
        .into_iter()
        .map(|image_id| {
            let records = records_by_image.get(image_id).map(Vec::as_slice).unwrap_or(&[]);
            let prediction_string = if records.is_empty() {
                codec.no_finding_literal()
            } else {
                codec.encode(records)
            };
            SubmissionRow::new(image_id, prediction_string)
        })
        .collect())
}

/// Decode submission rows back into per-image prediction sets.
pub fn submission_to_predictions(
    rows: &[SubmissionRow],
    codec: &PredictionStringCodec,
) -> Result<Vec<ImagePredictionSet>> {
    rows.iter()
        .map(|row| {
            let records = codec.decode(&row.prediction_string).map_err(|e| match e {
                XrayEvalError::FormatError(msg) => {
                    XrayEvalError::FormatError(format!("image {}: {}", row.image_id, msg))
                }
                other => other,
            })?;
            Ok(ImagePredictionSet::new(row.image_id.clone(), codec.convention, records))
        })
        .collect()
}

/// Write rows as CSV with an `image_id,PredictionString` header.
pub fn write_submission<W: io::Write>(writer: W, rows: &[SubmissionRow]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn read_submission<R: io::Read>(reader: R) -> Result<Vec<SubmissionRow>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let rows = csv_reader
        .deserialize()
        .collect::<std::result::Result<Vec<SubmissionRow>, csv::Error>>()?;
    Ok(rows)
}

/// Rescale every row from `working_size` back to the image's original size.
///
/// # Errors
///
/// Returns [`XrayEvalError::InvalidAnnotation`] if an image has no entry in
/// `original_sizes`, or any decoding error of the row.
pub fn rescale_submission(
    rows: &[SubmissionRow],
    original_sizes: &HashMap<String, ImageSize>,
    working_size: ImageSize,
    codec: &PredictionStringCodec,
) -> Result<Vec<SubmissionRow>> {
    rows.iter()
        .map(|row| {
            let original = original_sizes.get(&row.image_id).ok_or_else(|| {
                XrayEvalError::InvalidAnnotation(format!("no original size for image {}", row.image_id))
            })?;
            let prediction_string =
                rescale_prediction_string(&row.prediction_string, working_size, *original, codec)?;
            Ok(SubmissionRow::new(row.image_id.clone(), prediction_string))
        })
        .collect()
}

//! Label conventions for the chest X-ray class taxonomy.
//!
//! Two id spaces are in use for the same 14 pathology classes:
//!
//! - [`LabelConvention::Dataset`]: ids as found in the annotation table,
//!   pathologies `0..=13` and "No finding" at `14`.
//! - [`LabelConvention::Detector`]: ids as consumed by a region-proposal
//!   detector, where `0` is reserved for background/"No finding" and every
//!   pathology is shifted by one to `1..=14`.
//!
//! Shared logic never hardcodes the sentinel id; it asks the convention.

use crate::error::{Result, XrayEvalError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of pathology classes in the taxonomy (excluding "No finding").
pub const NUM_PATHOLOGIES: u32 = 14;

/// Class names in dataset order. The last entry is the "No finding" class.
const CLASS_NAMES: [&str; 15] = [
    "Aortic enlargement",
    "Atelectasis",
    "Calcification",
    "Cardiomegaly",
    "Consolidation",
    "ILD",
    "Infiltration",
    "Lung Opacity",
    "Nodule/Mass",
    "Other lesion",
    "Pleural effusion",
    "Pleural thickening",
    "Pneumothorax",
    "Pulmonary fibrosis",
    "No finding",
];

/// Which id is reserved for "No finding".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelConvention {
    /// Annotation table ids: "No finding" is 14.
    #[default]
    Dataset,
    /// Detector ids: "No finding" (background) is 0, pathologies shifted by +1.
    Detector,
}

impl LabelConvention {
    /// The reserved "No finding" id for this convention.
    pub fn no_finding_id(self) -> u32 {
        match self {
            LabelConvention::Dataset => NUM_PATHOLOGIES,
            LabelConvention::Detector => 0,
        }
    }

    /// Largest valid class id. Both conventions span `0..=14`.
    pub fn max_class_id(self) -> u32 {
        NUM_PATHOLOGIES
    }

    /// Whether `class_id` belongs to this taxonomy.
    pub fn contains(self, class_id: u32) -> bool {
        class_id <= self.max_class_id()
    }

    pub fn is_no_finding(self, class_id: u32) -> bool {
        class_id == self.no_finding_id()
    }

    /// The convention whose sentinel id differs from this one.
    pub fn other(self) -> LabelConvention {
        match self {
            LabelConvention::Dataset => LabelConvention::Detector,
            LabelConvention::Detector => LabelConvention::Dataset,
        }
    }

    /// Fail with a [`XrayEvalError::ConfigurationError`] if `class_id` is outside the taxonomy.
    pub fn validate(self, class_id: u32) -> Result<()> {
        if !self.contains(class_id) {
            return Err(XrayEvalError::ConfigurationError(format!(
                "class id {} is outside the {} taxonomy (0..={})",
                class_id,
                self,
                self.max_class_id()
            )));
        }
        Ok(())
    }

    /// Map a class id from this convention into `to`.
    ///
    /// # Example
    ///
    /// ```
    /// use xray_eval::convention::LabelConvention;
    ///
    /// let dataset = LabelConvention::Dataset;
    /// let detector = LabelConvention::Detector;
    /// assert_eq!(dataset.convert(3, detector).unwrap(), 4);
    /// assert_eq!(dataset.convert(14, detector).unwrap(), 0);
    /// assert_eq!(detector.convert(0, dataset).unwrap(), 14);
    /// ```
    pub fn convert(self, class_id: u32, to: LabelConvention) -> Result<u32> {
        self.validate(class_id)?;

        if self == to {
            return Ok(class_id);
        }
        if self.is_no_finding(class_id) {
            return Ok(to.no_finding_id());
        }

        Ok(match (self, to) {
            (LabelConvention::Dataset, LabelConvention::Detector) => class_id + 1,
            (LabelConvention::Detector, LabelConvention::Dataset) => class_id - 1,
            _ => class_id,
        })
    }

    /// Human-readable class name for an id in this convention.
    pub fn class_name(self, class_id: u32) -> Option<&'static str> {
        let dataset_id = self.convert(class_id, LabelConvention::Dataset).ok()?;
        CLASS_NAMES.get(dataset_id as usize).copied()
    }

    /// Fail fast when two collections disagree on their convention.
    pub fn ensure_same(self, other: LabelConvention, context: &str) -> Result<()> {
        if self != other {
            return Err(XrayEvalError::ConfigurationError(format!(
                "{context}: expected {self} label convention, got {other}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for LabelConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelConvention::Dataset => write!(f, "dataset"),
            LabelConvention::Detector => write!(f, "detector"),
        }
    }
}

//! Prediction string codec.
//!
//! The interchange format used for submissions and scoring is a flat list of
//! sextuples `class score x_min y_min x_max y_max` joined by single spaces,
//! one string per image. A "No finding" entry is always written as the
//! literal `"<id> 1.0 0 0 1 1"`.

use crate::convention::LabelConvention;
use crate::error::{Result, XrayEvalError};
use crate::types::{BoundingBox, Finding, PredictionRecord};
use serde::{Deserialize, Serialize};

/// Number of tokens per encoded entry.
pub const TOKENS_PER_ENTRY: usize = 6;

/// How box coordinates are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateFormat {
    /// Truncated toward zero, as detection output is written.
    #[default]
    Integer,
    /// Shortest representation that parses back to the same value.
    Float,
}

/// Codec settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub coordinates: CoordinateFormat,
    /// Fixed number of decimals for scores; `None` uses the shortest representation.
    pub score_decimals: Option<usize>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            coordinates: CoordinateFormat::Integer,
            score_decimals: Some(4),
        }
    }
}

/// Encoder/decoder bound to one label convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionStringCodec {
    pub convention: LabelConvention,
    pub config: CodecConfig,
}

impl PredictionStringCodec {
    pub fn new(convention: LabelConvention, config: CodecConfig) -> Self {
        Self { convention, config }
    }

    /// The literal written for a "No finding" entry.
    pub fn no_finding_literal(&self) -> String {
        format!("{} 1.0 0 0 1 1", self.convention.no_finding_id())
    }

    /// Encode records in the order supplied.
    ///
    /// # Example
    ///
    /// ```
    /// use xray_eval::codec::{CodecConfig, PredictionStringCodec};
    /// use xray_eval::convention::LabelConvention;
    /// use xray_eval::types::{BoundingBox, PredictionRecord};
    ///
    /// let codec = PredictionStringCodec::new(LabelConvention::Dataset, CodecConfig::default());
    /// let records = vec![
    ///     PredictionRecord::new(BoundingBox::new(10.7, 20.2, 30.0, 40.9), 3, 0.87654),
    ///     PredictionRecord::new(BoundingBox::new(500.0, 600.0, 700.0, 800.0), 14, 0.2),
    /// ];
    /// assert_eq!(codec.encode(&records), "3 0.8765 10 20 30 40 14 1.0 0 0 1 1");
    /// ```
    pub fn encode(&self, records: &[PredictionRecord]) -> String {
        records
            .iter()
            .map(|record| self.encode_entry(record))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Encode findings, treating unscored findings as confidence 1.0.
    pub fn encode_findings(&self, findings: &[Finding]) -> String {
        let records: Vec<PredictionRecord> = findings.iter().map(PredictionRecord::from).collect();
        self.encode(&records)
    }

    fn encode_entry(&self, record: &PredictionRecord) -> String {
        if self.convention.is_no_finding(record.class_id) {
            return self.no_finding_literal();
        }

        let score = match self.config.score_decimals {
            Some(decimals) => format!("{:.*}", decimals, record.score),
            None => record.score.to_string(),
        };
        let coordinates = record
            .bbox
            .to_array()
            .iter()
            .map(|&v| self.format_coordinate(v))
            .collect::<Vec<_>>()
            .join(" ");

        format!("{} {} {}", record.class_id, score, coordinates)
    }

    fn format_coordinate(&self, value: f64) -> String {
        match self.config.coordinates {
            CoordinateFormat::Integer => format!("{}", value.trunc() as i64),
            CoordinateFormat::Float => value.to_string(),
        }
    }

    /// Decode a prediction string.
    ///
    /// An empty (or all-whitespace) string decodes to no records.
    ///
    /// # Errors
    ///
    /// * [`XrayEvalError::FormatError`] if the token count is not a multiple
    ///   of 6 or a token does not parse.
    /// * [`XrayEvalError::ConfigurationError`] if a class id is outside the
    ///   taxonomy, or if an entry is exactly the other convention's
    ///   "No finding" literal (`<id> 1.0 0 0 1 1`).
    pub fn decode(&self, encoded: &str) -> Result<Vec<PredictionRecord>> {
        let tokens: Vec<&str> = encoded.split_whitespace().collect();
        if tokens.len() % TOKENS_PER_ENTRY != 0 {
            return Err(XrayEvalError::FormatError(format!(
                "expected a multiple of {} tokens, got {}",
                TOKENS_PER_ENTRY,
                tokens.len()
            )));
        }

        tokens
            .chunks(TOKENS_PER_ENTRY)
            .map(|entry| self.decode_entry(entry))
            .collect()
    }

    fn decode_entry(&self, entry: &[&str]) -> Result<PredictionRecord> {
        let class_id = parse_class_id(entry[0])?;
        let score = parse_number(entry[1], "score")?;
        let bbox = BoundingBox::new(
            parse_number(entry[2], "x_min")?,
            parse_number(entry[3], "y_min")?,
            parse_number(entry[4], "x_max")?,
            parse_number(entry[5], "y_max")?,
        );

        self.convention.validate(class_id)?;

        // Only the exact literal is read as the other convention's sentinel;
        // a scored pathology box may truncate to the unit box.
        let foreign_sentinel = self.convention.other().no_finding_id();
        if bbox == BoundingBox::unit()
            && score == 1.0
            && class_id == foreign_sentinel
            && !self.convention.is_no_finding(class_id)
        {
            return Err(XrayEvalError::ConfigurationError(format!(
                "entry '{}' looks like a {} convention 'No finding' but the codec expects id {}",
                entry.join(" "),
                self.convention.other(),
                self.convention.no_finding_id()
            )));
        }

        if self.convention.is_no_finding(class_id) {
            return Ok(PredictionRecord::new(BoundingBox::unit(), class_id, 1.0));
        }

        Ok(PredictionRecord::new(bbox, class_id, score))
    }
}

/// Class ids may be written as integral floats ("3.0").
fn parse_class_id(token: &str) -> Result<u32> {
    if let Ok(id) = token.parse::<u32>() {
        return Ok(id);
    }

    let value = parse_number(token, "class id")?;
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(XrayEvalError::FormatError(format!(
            "class id must be a non-negative integer, got '{token}'"
        )));
    }
    Ok(value as u32)
}

fn parse_number(token: &str, field: &str) -> Result<f64> {
    let value: f64 = token
        .parse()
        .map_err(|_| XrayEvalError::FormatError(format!("invalid {field} '{token}'")))?;
    if !value.is_finite() {
        return Err(XrayEvalError::FormatError(format!(
            "{field} must be finite, got '{token}'"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(convention: LabelConvention, coordinates: CoordinateFormat) -> PredictionStringCodec {
        PredictionStringCodec::new(
            convention,
            CodecConfig {
                coordinates,
                score_decimals: Some(4),
            },
        )
    }

    #[test]
    fn test_encode_sentinel_literal() {
        let dataset = codec(LabelConvention::Dataset, CoordinateFormat::Integer);
        let record = PredictionRecord::new(BoundingBox::new(3.0, 4.0, 50.0, 60.0), 14, 0.37);
        assert_eq!(dataset.encode(&[record]), "14 1.0 0 0 1 1");

        let detector = codec(LabelConvention::Detector, CoordinateFormat::Float);
        let record = PredictionRecord::new(BoundingBox::new(3.0, 4.0, 50.0, 60.0), 0, 0.37);
        assert_eq!(detector.encode(&[record]), "0 1.0 0 0 1 1");
    }

    #[test]
    fn test_encode_integer_truncates() {
        let codec = codec(LabelConvention::Dataset, CoordinateFormat::Integer);
        let record = PredictionRecord::new(BoundingBox::new(10.9, 20.5, 30.1, 40.99), 2, 0.5);
        assert_eq!(codec.encode(&[record]), "2 0.5000 10 20 30 40");
    }

    #[test]
    fn test_encode_float_coordinates() {
        let codec = codec(LabelConvention::Dataset, CoordinateFormat::Float);
        let record = PredictionRecord::new(BoundingBox::new(10.5, 20.25, 30.0, 40.125), 2, 0.75);
        assert_eq!(codec.encode(&[record]), "2 0.7500 10.5 20.25 30 40.125");
    }

    #[test]
    fn test_encode_empty() {
        let codec = codec(LabelConvention::Dataset, CoordinateFormat::Integer);
        assert_eq!(codec.encode(&[]), "");
        assert!(codec.decode("").unwrap().is_empty());
        assert!(codec.decode("   ").unwrap().is_empty());
    }

    #[test]
    fn test_roundtrip() {
        let codec = codec(LabelConvention::Dataset, CoordinateFormat::Float);
        let records = vec![
            PredictionRecord::new(BoundingBox::new(10.5, 20.0, 30.0, 40.0), 2, 0.75),
            PredictionRecord::new(BoundingBox::new(1.0, 2.0, 3.0, 4.0), 0, 0.125),
        ];
        assert_eq!(codec.decode(&codec.encode(&records)).unwrap(), records);
    }

    #[test]
    fn test_decode_wrong_token_count() {
        let codec = codec(LabelConvention::Dataset, CoordinateFormat::Integer);
        let result = codec.decode("1 0.9 0 0 10");
        assert!(matches!(result, Err(XrayEvalError::FormatError(_))));
    }

    #[test]
    fn test_decode_unparsable_tokens() {
        let codec = codec(LabelConvention::Dataset, CoordinateFormat::Integer);
        assert!(matches!(
            codec.decode("x 0.9 0 0 10 10"),
            Err(XrayEvalError::FormatError(_))
        ));
        assert!(matches!(
            codec.decode("1 high 0 0 10 10"),
            Err(XrayEvalError::FormatError(_))
        ));
        assert!(matches!(
            codec.decode("-1 0.9 0 0 10 10"),
            Err(XrayEvalError::FormatError(_))
        ));
        assert!(matches!(
            codec.decode("1.5 0.9 0 0 10 10"),
            Err(XrayEvalError::FormatError(_))
        ));
    }

    #[test]
    fn test_decode_float_class_token() {
        let codec = codec(LabelConvention::Dataset, CoordinateFormat::Integer);
        let records = codec.decode("3.0 0.9 0 0 10 10").unwrap();
        assert_eq!(records[0].class_id, 3);
    }

    #[test]
    fn test_decode_out_of_taxonomy() {
        let codec = codec(LabelConvention::Dataset, CoordinateFormat::Integer);
        assert!(matches!(
            codec.decode("15 0.9 0 0 10 10"),
            Err(XrayEvalError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_decode_foreign_sentinel() {
        let dataset = codec(LabelConvention::Dataset, CoordinateFormat::Integer);
        assert!(matches!(
            dataset.decode("0 1.0 0 0 1 1"),
            Err(XrayEvalError::ConfigurationError(_))
        ));

        let detector = codec(LabelConvention::Detector, CoordinateFormat::Integer);
        assert!(matches!(
            detector.decode("14 1.0 0 0 1 1"),
            Err(XrayEvalError::ConfigurationError(_))
        ));
        assert!(detector.decode("0 1.0 0 0 1 1").is_ok());
    }

    #[test]
    fn test_small_box_near_origin_is_not_a_sentinel() {
        // Truncates to the unit box but carries a real score
        let dataset = codec(LabelConvention::Dataset, CoordinateFormat::Integer);
        let record = PredictionRecord::new(BoundingBox::new(0.4, 0.2, 1.9, 1.8), 0, 0.9);
        let encoded = dataset.encode(&[record]);
        assert_eq!(encoded, "0 0.9000 0 0 1 1");
        assert_eq!(
            dataset.decode(&encoded).unwrap(),
            vec![PredictionRecord::new(BoundingBox::unit(), 0, 0.9)]
        );

        let detector = codec(LabelConvention::Detector, CoordinateFormat::Integer);
        let record = PredictionRecord::new(BoundingBox::new(0.4, 0.2, 1.9, 1.8), 14, 0.75);
        assert_eq!(
            detector.decode(&detector.encode(&[record])).unwrap(),
            vec![PredictionRecord::new(BoundingBox::unit(), 14, 0.75)]
        );
    }

    #[test]
    fn test_decode_sentinel_canonicalized() {
        let codec = codec(LabelConvention::Dataset, CoordinateFormat::Integer);
        let records = codec.decode("14 0.3 5 5 100 100").unwrap();
        assert_eq!(
            records,
            vec![PredictionRecord::new(BoundingBox::unit(), 14, 1.0)]
        );
    }
}

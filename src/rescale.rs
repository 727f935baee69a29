//! Coordinate rescaling between the working resolution and original image sizes.
//!
//! The detector runs at a fixed (usually square) resolution, while
//! radiographs are not square, so x and y are scaled independently.

use crate::codec::PredictionStringCodec;
use crate::error::Result;
use crate::types::{BoundingBox, Finding, ImageSize, PredictionRecord};

/// Scale `bbox` from `current` pixel dimensions to `target` pixel dimensions.
///
/// No rounding is applied.
///
/// # Errors
///
/// Returns a configuration error if `current` has a zero dimension.
///
/// # Example
///
/// ```
/// use xray_eval::rescale::rescale;
/// use xray_eval::types::{BoundingBox, ImageSize};
///
/// let bbox = BoundingBox::new(100.0, 100.0, 200.0, 200.0);
/// let scaled = rescale(&bbox, ImageSize::new(1024, 1024), ImageSize::new(2048, 3072)).unwrap();
/// assert_eq!(scaled, BoundingBox::new(200.0, 300.0, 400.0, 600.0));
/// ```
pub fn rescale(bbox: &BoundingBox, current: ImageSize, target: ImageSize) -> Result<BoundingBox> {
    current.validate()?;

    let scale_x = f64::from(target.width) / f64::from(current.width);
    let scale_y = f64::from(target.height) / f64::from(current.height);

    Ok(BoundingBox::new(
        bbox.x_min * scale_x,
        bbox.y_min * scale_y,
        bbox.x_max * scale_x,
        bbox.y_max * scale_y,
    ))
}

/// Rescale one finding. The "No finding" box is passed through unchanged.
pub fn rescale_finding(
    finding: &Finding,
    current: ImageSize,
    target: ImageSize,
    no_finding_class_id: u32,
) -> Result<Finding> {
    if finding.class_id == no_finding_class_id {
        return Ok(finding.clone());
    }

    Ok(Finding {
        bbox: rescale(&finding.bbox, current, target)?,
        ..finding.clone()
    })
}

pub fn rescale_findings(
    findings: &[Finding],
    current: ImageSize,
    target: ImageSize,
    no_finding_class_id: u32,
) -> Result<Vec<Finding>> {
    findings
        .iter()
        .map(|finding| rescale_finding(finding, current, target, no_finding_class_id))
        .collect()
}

/// Rescale every entry of an encoded prediction string.
///
/// Sentinel entries are re-emitted as the fixed literal.
pub fn rescale_prediction_string(
    encoded: &str,
    current: ImageSize,
    target: ImageSize,
    codec: &PredictionStringCodec,
) -> Result<String> {
    let no_finding = codec.convention.no_finding_id();

    let records = codec
        .decode(encoded)?
        .into_iter()
        .map(|record| {
            if record.class_id == no_finding {
                return Ok(record);
            }
            Ok(PredictionRecord {
                bbox: rescale(&record.bbox, current, target)?,
                ..record
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(codec.encode(&records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecConfig, CoordinateFormat};
    use crate::convention::LabelConvention;

    #[test]
    fn test_non_uniform_scale() {
        let bbox = BoundingBox::new(10.0, 10.0, 20.0, 40.0);
        let scaled = rescale(&bbox, ImageSize::new(100, 200), ImageSize::new(300, 100)).unwrap();
        assert_eq!(scaled, BoundingBox::new(30.0, 5.0, 60.0, 20.0));
    }

    #[test]
    fn test_zero_current_size() {
        let bbox = BoundingBox::new(10.0, 10.0, 20.0, 40.0);
        assert!(rescale(&bbox, ImageSize::new(0, 200), ImageSize::new(300, 100)).is_err());
    }

    #[test]
    fn test_roundtrip() {
        let bbox = BoundingBox::new(13.3, 27.1, 512.9, 700.2);
        let a = ImageSize::new(1024, 1024);
        let b = ImageSize::new(2330, 2846);
        let back = rescale(&rescale(&bbox, a, b).unwrap(), b, a).unwrap();
        for (x, y) in bbox.to_array().iter().zip(back.to_array().iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sentinel_not_rescaled() {
        let finding = Finding::no_finding(14);
        let scaled = rescale_finding(&finding, ImageSize::new(10, 10), ImageSize::new(1000, 1000), 14)
            .unwrap();
        assert_eq!(scaled.bbox, BoundingBox::unit());
    }

    #[test]
    fn test_rescale_prediction_string() {
        let codec = PredictionStringCodec::new(
            LabelConvention::Dataset,
            CodecConfig {
                coordinates: CoordinateFormat::Integer,
                score_decimals: Some(4),
            },
        );
        let rescaled = rescale_prediction_string(
            "3 0.9000 100 100 200 200 14 1.0 0 0 1 1",
            ImageSize::new(1024, 1024),
            ImageSize::new(2048, 512),
            &codec,
        )
        .unwrap();
        assert_eq!(rescaled, "3 0.9000 200 50 400 100 14 1.0 0 0 1 1");
    }
}

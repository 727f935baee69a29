//! JSON loading utilities for configuration files.

use crate::config::{EvaluationConfig, TargetConfig};
use crate::error::Result;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Load an evaluation configuration from a JSON file.
///
/// Missing fields take their defaults. The result is validated.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if a value is out of range.
///
/// # Example
///
/// ```no_run
/// use xray_eval::loader::load_config_from_file;
///
/// let config = load_config_from_file("evaluation.json").unwrap();
/// println!("Scoring at IoU {:?}", config.iou_thresholds);
/// ```
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> Result<EvaluationConfig> {
    let config: EvaluationConfig = read_json(path)?;
    config.validate()?;
    Ok(config)
}

/// Load an evaluation configuration from a JSON string.
///
/// # Example
///
/// ```
/// use xray_eval::loader::load_config_from_str;
/// use xray_eval::convention::LabelConvention;
///
/// let json = r#"{ "convention": "detector", "iou_thresholds": [0.4, 0.5] }"#;
/// let config = load_config_from_str(json).unwrap();
/// assert_eq!(config.convention, LabelConvention::Detector);
/// assert_eq!(config.score_threshold, 0.5);
/// ```
pub fn load_config_from_str(json_str: &str) -> Result<EvaluationConfig> {
    let config: EvaluationConfig = serde_json::from_str(json_str)?;
    config.validate()?;
    Ok(config)
}

/// Load a target-preparation configuration from a JSON file.
pub fn load_target_config_from_file<P: AsRef<Path>>(path: P) -> Result<TargetConfig> {
    let config: TargetConfig = read_json(path)?;
    config.validate()?;
    Ok(config)
}

/// Load a target-preparation configuration from a JSON string.
pub fn load_target_config_from_str(json_str: &str) -> Result<TargetConfig> {
    let config: TargetConfig = serde_json::from_str(json_str)?;
    config.validate()?;
    Ok(config)
}

fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

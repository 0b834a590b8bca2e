//! YAML sweep files and `--vary` axis specs.
//!
//! ```yaml
//! design:
//!   n_trials: 50
//!   effect: 40
//! axes:
//!   - field: n_subjects
//!     values: [5, 10, 20, 40]
//! replications: 500
//! seed: 7
//! sink: results/power.jsonl
//! alpha: 0.05
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use color_eyre::eyre::WrapErr;
use mixpower_core::model::{DesignField, DesignParameters, UnknownFieldError};
use mixpower_core::sweep::{SweepAxis, SweepConfig};
use serde::{Deserialize, Serialize};

/// Contents of a sweep file. Every key is optional; unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SweepFile {
    #[serde(default)]
    pub design: DesignParameters,
    #[serde(default)]
    pub axes: Vec<SweepAxis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replications: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

impl SweepFile {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_saphyr::Error> {
        serde_saphyr::from_str(yaml)
    }

    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read sweep file {}", path.display()))?;
        Self::from_yaml(&content)
            .wrap_err_with(|| format!("failed to parse sweep file {}", path.display()))
    }

    /// Grid specification, with `replications` falling back to the core default
    pub fn sweep_config(&self) -> SweepConfig {
        let mut config = SweepConfig {
            base: self.design,
            axes: self.axes.clone(),
            ..Default::default()
        };
        if let Some(replications) = self.replications {
            config.replications = replications;
        }
        config
    }
}

/// Error parsing a `--vary` spec
#[derive(Debug, Clone, PartialEq)]
pub enum VaryParseError {
    MissingEquals(String),
    UnknownField(UnknownFieldError),
    InvalidNumber(String),
    InvalidRange(String),
    NoValues(String),
}

impl fmt::Display for VaryParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaryParseError::MissingEquals(spec) => {
                write!(f, "expected FIELD=VALUES, got '{}'", spec)
            }
            VaryParseError::UnknownField(e) => write!(f, "{}", e),
            VaryParseError::InvalidNumber(value) => write!(f, "'{}' is not a number", value),
            VaryParseError::InvalidRange(spec) => {
                write!(f, "expected min:max:steps with steps >= 1, got '{}'", spec)
            }
            VaryParseError::NoValues(spec) => write!(f, "no values given in '{}'", spec),
        }
    }
}

impl std::error::Error for VaryParseError {}

fn parse_number(value: &str) -> Result<f64, VaryParseError> {
    let value = value.trim();
    value
        .parse::<f64>()
        .map_err(|_| VaryParseError::InvalidNumber(value.to_string()))
}

/// Parse `FIELD=v1,v2,...` or `FIELD=min:max:steps` into a sweep axis.
pub fn parse_vary(spec: &str) -> Result<SweepAxis, VaryParseError> {
    let (field, values) = spec
        .split_once('=')
        .ok_or_else(|| VaryParseError::MissingEquals(spec.to_string()))?;
    let field: DesignField = field.parse().map_err(VaryParseError::UnknownField)?;
    let values = values.trim();
    if values.is_empty() {
        return Err(VaryParseError::NoValues(spec.to_string()));
    }

    if values.contains(':') {
        let parts: Vec<&str> = values.split(':').collect();
        let [min, max, steps] = parts.as_slice() else {
            return Err(VaryParseError::InvalidRange(values.to_string()));
        };
        let steps: usize = steps
            .trim()
            .parse()
            .map_err(|_| VaryParseError::InvalidRange(values.to_string()))?;
        if steps == 0 {
            return Err(VaryParseError::InvalidRange(values.to_string()));
        }
        return Ok(SweepAxis::range(
            field,
            parse_number(min)?,
            parse_number(max)?,
            steps,
        ));
    }

    let values = values
        .split(',')
        .map(parse_number)
        .collect::<Result<Vec<f64>, _>>()?;
    Ok(SweepAxis::new(field, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_list() {
        let axis = parse_vary("effect=0, 25,50").unwrap();
        assert_eq!(axis.field, DesignField::Effect);
        assert_eq!(axis.values, vec![0.0, 25.0, 50.0]);
    }

    #[test]
    fn test_parse_range() {
        let axis = parse_vary("n_subjects=2:10:5").unwrap();
        assert_eq!(axis.field, DesignField::NSubjects);
        assert_eq!(axis.values, vec![2.0, 4.0, 6.0, 8.0, 10.0]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_vary("effect"),
            Err(VaryParseError::MissingEquals(_))
        ));
        assert!(matches!(
            parse_vary("slope=1,2"),
            Err(VaryParseError::UnknownField(_))
        ));
        assert!(matches!(
            parse_vary("effect=1,x"),
            Err(VaryParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_vary("effect=0:10"),
            Err(VaryParseError::InvalidRange(_))
        ));
        assert!(matches!(
            parse_vary("effect=0:10:0"),
            Err(VaryParseError::InvalidRange(_))
        ));
        assert!(matches!(parse_vary("effect="), Err(VaryParseError::NoValues(_))));
    }

    #[test]
    fn test_sweep_file_from_yaml() {
        let yaml = r#"
design:
  n_trials: 50
  effect: 40
axes:
  - field: n_subjects
    values: [5, 10]
replications: 3
seed: 7
sink: out/power.jsonl
"#;
        let file = SweepFile::from_yaml(yaml).unwrap();
        assert_eq!(file.design.n_trials, 50);
        assert_eq!(file.design.effect, 40.0);
        assert_eq!(file.design.sigma, DesignParameters::default().sigma);
        assert_eq!(file.seed, Some(7));
        assert_eq!(file.sink, Some(PathBuf::from("out/power.jsonl")));
        assert_eq!(file.alpha, None);

        let config = file.sweep_config();
        assert_eq!(config.replications, 3);
        assert_eq!(config.primary_field(), Some(DesignField::NSubjects));
        assert_eq!(config.total_rows(), 6);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(SweepFile::from_yaml("design:\n  n_subject: 5\n").is_err());
        assert!(SweepFile::from_yaml("replicates: 5\n").is_err());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = SweepFile::from_yaml("{}").unwrap();
        assert_eq!(file, SweepFile::default());
        assert_eq!(file.sweep_config(), SweepConfig::default());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SweepFile::load(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read sweep file"));
    }
}

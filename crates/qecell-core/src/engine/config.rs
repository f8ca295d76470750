use crate::core::models::structure::AtomPolicy;
use crate::core::models::symbolic::ParameterForm;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Tunables shared by both synchronizers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Largest element-wise difference (Angstrom) under which two lattice matrices
    /// are treated as equal.
    pub matrix_tolerance: f64,
    /// Relative tolerance used when classifying a matrix into a lattice code.
    pub classify_tolerance: f64,
    /// How atoms follow an edit of the lattice parameters.
    pub lattice_edit_policy: AtomPolicy,
    /// Decimal places written for coordinates computed by the synchronizer.
    pub coordinate_precision: usize,
    /// Parameter spelling used when a description is written from scratch.
    pub parameter_form: ParameterForm,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            matrix_tolerance: 1e-6,
            classify_tolerance: 1e-6,
            lattice_edit_policy: AtomPolicy::KeepCartesian,
            coordinate_precision: 10,
            parameter_form: ParameterForm::Celldm,
        }
    }
}

impl SyncConfig {
    /// Reads a configuration from a TOML file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Toml`]
    /// if it is malformed or contains unknown keys, and [`ConfigError::InvalidValue`]
    /// if a value is out of range.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let config: SyncConfig = toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_tolerance("matrix_tolerance", self.matrix_tolerance)?;
        check_tolerance("classify_tolerance", self.classify_tolerance)?;
        if !(1..=16).contains(&self.coordinate_precision) {
            return Err(ConfigError::InvalidValue {
                name: "coordinate_precision",
                reason: format!("expected 1..=16, got {}", self.coordinate_precision),
            });
        }
        Ok(())
    }
}

fn check_tolerance(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            name,
            reason: format!("expected a finite positive number, got {value}"),
        })
    }
}

#[derive(Default)]
pub struct SyncConfigBuilder {
    matrix_tolerance: Option<f64>,
    classify_tolerance: Option<f64>,
    lattice_edit_policy: Option<AtomPolicy>,
    coordinate_precision: Option<usize>,
    parameter_form: Option<ParameterForm>,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrix_tolerance(mut self, tolerance: f64) -> Self {
        self.matrix_tolerance = Some(tolerance);
        self
    }
    pub fn classify_tolerance(mut self, tolerance: f64) -> Self {
        self.classify_tolerance = Some(tolerance);
        self
    }
    pub fn lattice_edit_policy(mut self, policy: AtomPolicy) -> Self {
        self.lattice_edit_policy = Some(policy);
        self
    }
    pub fn coordinate_precision(mut self, precision: usize) -> Self {
        self.coordinate_precision = Some(precision);
        self
    }
    pub fn parameter_form(mut self, form: ParameterForm) -> Self {
        self.parameter_form = Some(form);
        self
    }

    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        let defaults = SyncConfig::default();
        let config = SyncConfig {
            matrix_tolerance: self.matrix_tolerance.unwrap_or(defaults.matrix_tolerance),
            classify_tolerance: self
                .classify_tolerance
                .unwrap_or(defaults.classify_tolerance),
            lattice_edit_policy: self
                .lattice_edit_policy
                .unwrap_or(defaults.lattice_edit_policy),
            coordinate_precision: self
                .coordinate_precision
                .unwrap_or(defaults.coordinate_precision),
            parameter_form: self.parameter_form.unwrap_or(defaults.parameter_form),
        };
        config.validate()?;
        Ok(config)
    }
}

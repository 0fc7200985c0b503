#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Run configuration for the line risk pipeline.
//!
//! A [`RunConfig`] is deserialized from TOML (every field is optional and
//! falls back to its default), validated once with [`RunConfig::validate`]
//! and then passed by reference into each stage constructor. There is no
//! global configuration state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Tolerance used when checking that the risk weights sum to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML could not be parsed into a [`RunConfig`].
    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The effective config could not be rendered back to TOML.
    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    /// Buffer distance is zero, negative, or not finite.
    #[error("buffer_distance_ft must be a positive finite number, got {value}")]
    InvalidBufferDistance {
        /// The rejected distance.
        value: f64,
    },

    /// A proximity threshold is not positive or thresholds are not ordered.
    #[error(
        "proximity_thresholds must satisfy 0 < high < medium, got high={high}, medium={medium}"
    )]
    NonMonotonicThresholds {
        /// Upper bound of the high-priority band.
        high: f64,
        /// Upper bound of the medium band.
        medium: f64,
    },

    /// A risk weight is negative or not finite.
    #[error("risk weight `{name}` must be a non-negative finite number, got {value}")]
    InvalidWeight {
        /// Weight name.
        name: &'static str,
        /// The rejected weight.
        value: f64,
    },

    /// The risk weights do not sum to one.
    #[error("risk_weights must sum to 1.0, got {sum}")]
    WeightsDoNotSumToOne {
        /// Actual sum.
        sum: f64,
    },

    /// Tier percentiles are out of range or not ordered.
    #[error("tier_percentiles must satisfy 0 <= medium < high <= 100, got high={high}, medium={medium}")]
    InvalidPercentiles {
        /// High tier percentile.
        high: f64,
        /// Medium tier percentile.
        medium: f64,
    },

    /// Batch size of zero.
    #[error("chunk_size must be at least 1")]
    ZeroChunkSize,
}

/// Distance bands (feet) used to classify facility proximity.
///
/// A distance strictly below `high` is class 3, strictly below `medium`
/// is class 2, anything else is class 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityThresholds {
    /// Upper bound (exclusive) of the high-priority band.
    pub high: f64,
    /// Upper bound (exclusive) of the medium band.
    pub medium: f64,
}

impl Default for ProximityThresholds {
    fn default() -> Self {
        Self {
            high: 500.0,
            medium: 1500.0,
        }
    }
}

impl ProximityThresholds {
    /// Validates the band ordering.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonMonotonicThresholds`] unless
    /// `0 < high < medium` and both are finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.high.is_finite()
            && self.medium.is_finite()
            && self.high > 0.0
            && self.high < self.medium;

        if ordered {
            Ok(())
        } else {
            Err(ConfigError::NonMonotonicThresholds {
                high: self.high,
                medium: self.medium,
            })
        }
    }
}

/// Weights of the three normalized factors in the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    /// Weight of the normalized canopy load.
    pub vegetation: f64,
    /// Weight of the normalized proximity class.
    pub proximity: f64,
    /// Weight of the normalized segment length.
    pub length: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            vegetation: 0.50,
            proximity: 0.30,
            length: 0.20,
        }
    }
}

impl RiskWeights {
    /// Sum of all three weights.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.vegetation + self.proximity + self.length
    }

    /// Validates that each weight is non-negative and they sum to one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWeight`] or
    /// [`ConfigError::WeightsDoNotSumToOne`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("vegetation", self.vegetation),
            ("proximity", self.proximity),
            ("length", self.length),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightsDoNotSumToOne { sum });
        }

        Ok(())
    }
}

/// Percentiles of the score distribution that separate the tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierPercentiles {
    /// Scores at or above this percentile are High.
    pub high: f64,
    /// Scores at or above this percentile (and below `high`) are Medium.
    pub medium: f64,
}

impl Default for TierPercentiles {
    fn default() -> Self {
        Self {
            high: 80.0,
            medium: 40.0,
        }
    }
}

impl TierPercentiles {
    /// Validates range and ordering.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPercentiles`] unless
    /// `0 <= medium < high <= 100`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = |p: f64| p.is_finite() && (0.0..=100.0).contains(&p);

        if in_range(self.high) && in_range(self.medium) && self.medium < self.high {
            Ok(())
        } else {
            Err(ConfigError::InvalidPercentiles {
                high: self.high,
                medium: self.medium,
            })
        }
    }
}

/// Property names read from the input `GeoJSON` layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFields {
    /// Property holding a stable segment id. When unset, ids are assigned
    /// sequentially after filtering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_id_field: Option<String>,
    /// Property holding the conductor type.
    pub conductor_field: String,
    /// Conductor value that marks an overhead line.
    pub overhead_value: String,
    /// Property holding the facility type (`fire_station` or `hospital`).
    pub facility_type_field: String,
    /// Property holding the facility name.
    pub facility_name_field: String,
    /// Property holding the neighborhood label.
    pub neighborhood_field: String,
}

impl Default for InputFields {
    fn default() -> Self {
        Self {
            segment_id_field: None,
            conductor_field: "ConductorT".to_string(),
            overhead_value: "OH".to_string(),
            facility_type_field: "facility_type".to_string(),
            facility_name_field: "facility_name".to_string(),
            neighborhood_field: "neighborhood".to_string(),
        }
    }
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Clearance buffer distance around each conductor, in feet.
    pub buffer_distance_ft: f64,
    /// Proximity distance bands.
    pub proximity_thresholds: ProximityThresholds,
    /// Composite score weights.
    pub risk_weights: RiskWeights,
    /// Tier percentiles.
    pub tier_percentiles: TierPercentiles,
    /// Segments per processing batch.
    pub chunk_size: usize,
    /// Number of top priority segments to report.
    pub top_n_segments: usize,
    /// Input property names.
    pub input: InputFields,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            buffer_distance_ft: 15.0,
            proximity_thresholds: ProximityThresholds::default(),
            risk_weights: RiskWeights::default(),
            tier_percentiles: TierPercentiles::default(),
            chunk_size: 5000,
            top_n_segments: 25,
            input: InputFields::default(),
        }
    }
}

impl RunConfig {
    /// Parses a config from a TOML string. Does not validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed or a field
    /// has the wrong type.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml_str(&contents)?;
        config.validate()?;

        log::info!("Loaded run config from {}", path.display());
        Ok(config)
    }

    /// Checks every option before any computation begins.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_buffer_distance(self.buffer_distance_ft)?;
        self.proximity_thresholds.validate()?;
        self.risk_weights.validate()?;
        self.tier_percentiles.validate()?;

        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }

        Ok(())
    }

    /// Renders the config back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Render`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Validates a buffer distance in isolation.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBufferDistance`] unless `distance` is
/// finite and strictly positive.
pub fn validate_buffer_distance(distance: f64) -> Result<(), ConfigError> {
    if distance.is_finite() && distance > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidBufferDistance { value: distance })
    }
}

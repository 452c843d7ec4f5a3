//! Enumeration settings: result aim, seed extremization and the optional
//! smallest-MUS and MSS-guided modes, loadable from YAML.

use std::fs;
use std::path::Path;

use marco_core::{ErrorInfo, MarcoError};
use marco_map::{Bias, MapOptions};
use serde::{Deserialize, Serialize};

/// Which kind of result the heuristics should favour early on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aim {
    /// Large seeds, shrunk to MUSes.
    #[default]
    Muses,
    /// Small seeds, grown to MSSes.
    Mcses,
}

/// How seeds are pushed to extremal subsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Maximize {
    /// Arbitrary seeds; every seed is grown or shrunk.
    None,
    /// The map solver extremizes every seed itself.
    #[default]
    Solver,
    /// The driver extremizes every seed in the aim direction.
    Always,
    /// The driver extremizes seeds whose check result matches the aim.
    Half,
}

/// Enumeration settings, loadable from YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumConfig {
    /// Result kind favoured by the seed heuristics.
    #[serde(default)]
    pub aim: Aim,
    /// Stop after a single smallest MUS.
    #[serde(default)]
    pub smus: bool,
    /// Seed extremization policy.
    #[serde(default)]
    pub maximize: Maximize,
    /// Extremize seeds by cardinality rather than by inclusion.
    #[serde(default)]
    pub optimal_seeds: bool,
    /// Treat the missing index of every MSS of size `n - 1` as hard in later shrinks.
    #[serde(default = "default_use_singletons")]
    pub use_singletons: bool,
    /// After each MSS, look for unexplored immediate supersets and shrink them.
    #[serde(default)]
    pub mssguided: bool,
}

fn default_use_singletons() -> bool {
    true
}

impl Default for EnumConfig {
    fn default() -> Self {
        Self {
            aim: Aim::Muses,
            smus: false,
            maximize: Maximize::Solver,
            optimal_seeds: false,
            use_singletons: true,
            mssguided: false,
        }
    }
}

fn config_error(code: &str, message: impl Into<String>) -> MarcoError {
    MarcoError::Config(ErrorInfo::new(code, message))
}

impl EnumConfig {
    /// Parses a YAML document; absent fields take their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, MarcoError> {
        let config: Self =
            serde_yaml::from_str(text).map_err(|err| config_error("yaml", err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, MarcoError> {
        let text = fs::read_to_string(path).map_err(|err| {
            MarcoError::Config(
                ErrorInfo::new("config-unreadable", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    /// Rejects option combinations that contradict each other.
    pub fn validate(&self) -> Result<(), MarcoError> {
        if self.smus && self.maximize != Maximize::Solver {
            return Err(config_error(
                "conflicting-options",
                "smallest-MUS mode chooses its own seeds and cannot be combined with maximize",
            ));
        }
        // An MSS-guided shrink runs before the first MUS bounds the size and
        // would report MUSes larger than the smallest one.
        if self.smus && self.mssguided {
            return Err(config_error(
                "conflicting-options",
                "smallest-MUS mode cannot explore above MSSes",
            ));
        }
        if self.optimal_seeds && self.maximize != Maximize::Solver {
            return Err(config_error(
                "conflicting-options",
                "optimal seeds are produced by the map solver and need maximize = solver",
            ));
        }
        Ok(())
    }

    /// Direction the aim pushes seeds in.
    pub fn aim_bias(&self) -> Bias {
        match self.aim {
            Aim::Muses => Bias::High,
            Aim::Mcses => Bias::Low,
        }
    }

    /// Map solver options implied by the settings.
    pub fn map_options(&self) -> MapOptions {
        if self.smus {
            return MapOptions {
                bias: Some(Bias::Low),
                optimal: true,
            };
        }
        match self.maximize {
            Maximize::Solver => MapOptions {
                bias: Some(self.aim_bias()),
                optimal: self.optimal_seeds,
            },
            Maximize::None | Maximize::Always | Maximize::Half => MapOptions::default(),
        }
    }
}

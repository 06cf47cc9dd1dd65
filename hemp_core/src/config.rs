//! Configuration file support for Hempflow.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/hempflow/config.toml`.
//! Every value defaults to the reference hemp fractionation process, so a
//! file only needs the parameters it changes.

use crate::rules::{check_fraction, COMPOSITION_TOLERANCE};
use crate::types::approx_eq;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub yields: YieldConfig,

    #[serde(default)]
    pub moisture: MoistureConfig,

    #[serde(default)]
    pub seed: SeedConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub cream: CreamConfig,

    #[serde(default)]
    pub stems: StemConfig,

    #[serde(default)]
    pub decortication: DecorticationConfig,

    #[serde(default)]
    pub fiber: FiberConfig,

    #[serde(default)]
    pub packaging: PackagingConfig,

    #[serde(default)]
    pub balance: BalanceConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Raw biomass entering the process
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    /// kg/hr of harvested plant
    pub rate: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { rate: 100.0 }
    }
}

/// Plant fractions by wet mass; stems take the remainder
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct YieldConfig {
    pub seed: f64,
    pub leaf: f64,
}

impl YieldConfig {
    pub fn stem(&self) -> f64 {
        1.0 - self.seed - self.leaf
    }
}

impl Default for YieldConfig {
    fn default() -> Self {
        Self {
            seed: 0.1333,
            leaf: 0.30,
        }
    }
}

/// Moisture contents (wet basis) at harvest and after drying
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MoistureConfig {
    pub seed: f64,
    pub stem: f64,
    pub leaf: f64,
    pub seed_target: f64,
    pub stem_target: f64,
}

impl Default for MoistureConfig {
    fn default() -> Self {
        Self {
            seed: 0.08,
            stem: 0.70,
            leaf: 0.70,
            seed_target: 0.05,
            stem_target: 0.15,
        }
    }
}

/// Dry seed composition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeedConfig {
    pub cbd_content: f64,
    pub oil_content: f64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            cbd_content: 0.017,
            oil_content: 0.31,
        }
    }
}

/// Seed oil extraction
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    pub cbd_efficiency: f64,
    pub oil_efficiency: f64,
    /// Fraction of extracted oils lost in handling
    pub loss: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            cbd_efficiency: 0.3,
            oil_efficiency: 0.3,
            loss: 0.1,
        }
    }
}

/// Cream formulation, in kg per kg of extracted oil
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CreamConfig {
    pub additives_ratio: f64,
    pub water_ratio: f64,
    pub glycerol_ratio: f64,
    pub mixing_loss: f64,
}

impl Default for CreamConfig {
    fn default() -> Self {
        Self {
            additives_ratio: 12.0,
            water_ratio: 35.0,
            glycerol_ratio: 2.14,
            mixing_loss: 0.01,
        }
    }
}

/// Loss fractions along the stem line
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StemConfig {
    pub separation_loss: f64,
    pub retting_loss: f64,
    pub decortication_loss: f64,
}

impl Default for StemConfig {
    fn default() -> Self {
        Self {
            separation_loss: 0.01,
            retting_loss: 0.05,
            decortication_loss: 0.05,
        }
    }
}

/// Lignocellulosic composition of a stem fraction
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Chemistry {
    pub cellulose: f64,
    pub hemicellulose: f64,
    pub lignin: f64,
    pub extractives: f64,
}

impl Chemistry {
    fn sum(&self) -> f64 {
        self.cellulose + self.hemicellulose + self.lignin + self.extractives
    }
}

/// Bark/core split of retted stems and their chemistry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecorticationConfig {
    /// Share of retted stems that leaves as bark; the rest is core
    pub bark_fraction: f64,
    pub bark: Chemistry,
    pub core: Chemistry,
}

impl Default for DecorticationConfig {
    fn default() -> Self {
        Self {
            bark_fraction: 0.30,
            bark: Chemistry {
                cellulose: 0.648,
                hemicellulose: 0.077,
                lignin: 0.043,
                extractives: 0.232,
            },
            core: Chemistry {
                cellulose: 0.345,
                hemicellulose: 0.178,
                lignin: 0.208,
                extractives: 0.269,
            },
        }
    }
}

/// Cellulose recovered as fiber
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FiberConfig {
    pub bark_recovery: f64,
    pub core_recovery: f64,
}

impl Default for FiberConfig {
    fn default() -> Self {
        Self {
            bark_recovery: 0.5,
            core_recovery: 0.5,
        }
    }
}

/// Jar (core fiber) and box (bark fiber) production
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PackagingConfig {
    pub jar_loss: f64,
    pub box_loss: f64,
    /// kg biopolymer per kg of fibers used in jars
    pub jar_biopolymer_ratio: f64,
    /// kg binder per kg of fibers used in boxes
    pub box_binder_ratio: f64,
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            jar_loss: 0.5,
            box_loss: 0.5,
            jar_biopolymer_ratio: 0.1,
            box_binder_ratio: 0.1,
        }
    }
}

/// Mass balance tolerance
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BalanceConfig {
    /// Relative residual above which an imbalance warning is raised
    pub tolerance: f64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            tolerance: crate::balance::DEFAULT_TOLERANCE,
        }
    }
}

/// Export location
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hempflow")
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            path => {
                tracing::info!("No config file found at {:?}, using defaults", path);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join("hempflow").join("config.toml"))
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, self.to_toml()?)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Render as pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Check every parameter against its domain
    pub fn validate(&self) -> Result<()> {
        if !self.feed.rate.is_finite() || self.feed.rate < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "feed.rate must be finite and >= 0, got {}",
                self.feed.rate
            )));
        }

        let fractions = [
            ("yields.seed", self.yields.seed),
            ("yields.leaf", self.yields.leaf),
            ("yields.stem (1 - seed - leaf)", self.yields.stem()),
            ("moisture.seed", self.moisture.seed),
            ("moisture.stem", self.moisture.stem),
            ("moisture.leaf", self.moisture.leaf),
            ("seed.cbd_content", self.seed.cbd_content),
            ("seed.oil_content", self.seed.oil_content),
            (
                "seed.cbd_content + seed.oil_content",
                self.seed.cbd_content + self.seed.oil_content,
            ),
            ("extraction.cbd_efficiency", self.extraction.cbd_efficiency),
            ("extraction.oil_efficiency", self.extraction.oil_efficiency),
            ("extraction.loss", self.extraction.loss),
            ("cream.mixing_loss", self.cream.mixing_loss),
            ("stems.separation_loss", self.stems.separation_loss),
            ("stems.retting_loss", self.stems.retting_loss),
            ("stems.decortication_loss", self.stems.decortication_loss),
            ("decortication.bark_fraction", self.decortication.bark_fraction),
            ("fiber.bark_recovery", self.fiber.bark_recovery),
            ("fiber.core_recovery", self.fiber.core_recovery),
            ("packaging.jar_loss", self.packaging.jar_loss),
            ("packaging.box_loss", self.packaging.box_loss),
        ];
        for (label, value) in fractions {
            check_fraction(label, value)?;
        }

        let ratios = [
            ("cream.additives_ratio", self.cream.additives_ratio),
            ("cream.water_ratio", self.cream.water_ratio),
            ("cream.glycerol_ratio", self.cream.glycerol_ratio),
            ("packaging.jar_biopolymer_ratio", self.packaging.jar_biopolymer_ratio),
            ("packaging.box_binder_ratio", self.packaging.box_binder_ratio),
        ];
        for (label, value) in ratios {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidParameter(format!(
                    "{} must be finite and >= 0, got {}",
                    label, value
                )));
            }
        }

        for (label, chemistry) in [
            ("decortication.bark", &self.decortication.bark),
            ("decortication.core", &self.decortication.core),
        ] {
            if !approx_eq(chemistry.sum(), 1.0, COMPOSITION_TOLERANCE) {
                return Err(Error::InvalidComposition(format!(
                    "{} weights sum to {}, expected 1",
                    label,
                    chemistry.sum()
                )));
            }
        }

        if self.balance.tolerance.is_nan() || self.balance.tolerance <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "balance.tolerance must be > 0, got {}",
                self.balance.tolerance
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.feed.rate, 100.0);
        assert!((config.yields.stem() - 0.5667).abs() < 1e-12);
        assert_eq!(config.cream.water_ratio, 35.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[feed]
rate = 250.0

[decortication.bark]
cellulose = 0.7
hemicellulose = 0.1
lignin = 0.1
extractives = 0.1
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.feed.rate, 250.0);
        assert_eq!(config.yields.seed, 0.1333); // default
        assert_eq!(config.decortication.bark.cellulose, 0.7);
        assert_eq!(config.decortication.core.cellulose, 0.345); // default
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.extraction.oil_efficiency = 0.45;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.extraction.oil_efficiency, 0.45);
    }

    #[test]
    fn test_yields_exceeding_one_rejected() {
        let mut config = Config::default();
        config.yields.seed = 0.8;
        config.yields.leaf = 0.3;
        assert!(matches!(config.validate(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_core_share_is_complement_of_bark() {
        let config: Config = toml::from_str("[decortication]\nbark_fraction = 0.4\n").unwrap();
        assert_eq!(config.decortication.bark_fraction, 0.4);
        assert!(config.validate().is_ok());

        let toml = config.to_toml().unwrap();
        assert!(!toml.contains("core_fraction"));
    }

    #[test]
    fn test_chemistry_must_sum_to_one() {
        let mut config = Config::default();
        config.decortication.core.cellulose -= 0.05;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidComposition(_))
        ));
    }
}

//! Scheme configuration: LowMC instance shape, repetition count and the
//! randomness source.  Configurations are plain serde structs so they can be
//! loaded from JSON files or built from the named presets.

use crate::error::{FishError, Result};
use crate::prng::RandomnessSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Number of proof repetitions used by the full-size presets.
pub const DEFAULT_REPETITIONS: usize = 137;

/// Shape of a LowMC instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LowmcSpec {
    /// Block size `n` in bits.
    pub block_size: usize,
    /// Key size `k` in bits.
    pub key_size: usize,
    /// Number of 3-bit S-boxes `m` per round.
    pub sbox_count: usize,
    /// Number of cipher rounds.
    pub rounds: usize,
}

impl LowmcSpec {
    /// Bits touched by the S-box layer, `3m`.
    pub fn sbox_bits(&self) -> usize {
        3 * self.sbox_count
    }

    /// Checks the structural constraints of the instance.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || self.key_size == 0 {
            return Err(FishError::InvalidParameters(
                "block and key size must be non-zero".into(),
            ));
        }
        if self.sbox_count == 0 || self.rounds == 0 {
            return Err(FishError::InvalidParameters(
                "S-box count and round count must be non-zero".into(),
            ));
        }
        if self.sbox_count > self.block_size / 3 {
            return Err(FishError::InvalidParameters(format!(
                "{} S-boxes need {} bits but the block has {}",
                self.sbox_count,
                self.sbox_count.saturating_mul(3),
                self.block_size
            )));
        }
        let view_bits = self
            .rounds
            .checked_mul(self.sbox_bits())
            .and_then(|bits| bits.checked_add(self.key_size));
        if view_bits.is_none() {
            return Err(FishError::InvalidParameters(format!(
                "{} rounds of {} S-boxes overflow a party view",
                self.rounds, self.sbox_count
            )));
        }
        Ok(())
    }
}

/// Named parameter sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// LowMC-128/128, 10 S-boxes, 20 rounds.
    L1,
    /// LowMC-192/192, 10 S-boxes, 30 rounds.
    L3,
    /// LowMC-256/256, 10 S-boxes, 38 rounds.
    L5,
    /// Reduced 64-bit instance for tests and demos.
    Test,
}

impl FromStr for Preset {
    type Err = FishError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "l1" => Ok(Self::L1),
            "l3" => Ok(Self::L3),
            "l5" => Ok(Self::L5),
            "test" => Ok(Self::Test),
            other => Err(FishError::Config(format!("unknown preset {other}"))),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::L1 => "l1",
            Self::L3 => "l3",
            Self::L5 => "l5",
            Self::Test => "test",
        };
        f.write_str(name)
    }
}

/// Complete scheme configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeConfig {
    /// LowMC instance shape.
    pub lowmc: LowmcSpec,
    /// Number of independent MPC repetitions per proof.
    pub repetitions: usize,
    /// Source of keys, seeds and share masks.
    #[serde(default)]
    pub randomness: RandomnessSource,
}

impl SchemeConfig {
    /// Configuration for a named preset using operating-system randomness.
    pub fn preset(preset: Preset) -> Self {
        let (n, m, rounds, repetitions) = match preset {
            Preset::L1 => (128, 10, 20, DEFAULT_REPETITIONS),
            Preset::L3 => (192, 10, 30, DEFAULT_REPETITIONS),
            Preset::L5 => (256, 10, 38, DEFAULT_REPETITIONS),
            Preset::Test => (64, 10, 4, 16),
        };
        Self {
            lowmc: LowmcSpec {
                block_size: n,
                key_size: n,
                sbox_count: m,
                rounds,
            },
            repetitions,
            randomness: RandomnessSource::Os,
        }
    }

    /// Replaces the randomness source.
    pub fn with_randomness(mut self, randomness: RandomnessSource) -> Self {
        self.randomness = randomness;
        self
    }

    /// Replaces the repetition count.
    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        self.lowmc.validate()?;
        if self.repetitions == 0 {
            return Err(FishError::InvalidParameters(
                "at least one repetition is required".into(),
            ));
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(input).map_err(|err| FishError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serialises the configuration as pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| FishError::Config(err.to_string()))
    }
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self::preset(Preset::L1)
    }
}

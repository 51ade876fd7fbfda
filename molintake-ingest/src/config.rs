//! Pipeline configuration and build capabilities.

use std::path::Path;

use serde::{Deserialize, Serialize};

use molintake_chem::{FeatureConfig, FingerprintKind, NormalizationOptions};
use molintake_core::{IntakeError, Result};

use crate::resolver::ResolverConfig;

/// Everything a [`Pipeline`](crate::Pipeline) needs to know, loadable from
/// TOML.
///
/// ```toml
/// [normalization]
/// strip_salts = true
/// standardize = false
///
/// [features]
/// fingerprints = [{ family = "maccs" }, { family = "morgan", radius = 2, nbits = 2048 }]
///
/// [dedup]
/// similarity_threshold = 0.95
/// candidate_sample_size = 500
/// fingerprint_family = { family = "morgan", radius = 2, nbits = 2048 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub normalization: NormalizationOptions,
    pub features: FeatureConfig,
    pub dedup: ResolverConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(text).map_err(|e| IntakeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            IntakeError::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| IntakeError::Config(e.to_string()))
    }

    /// Reject out-of-range thresholds, sample sizes and fingerprint
    /// parameters.
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.dedup.validate()
    }
}

/// The flat caller-facing settings: normalization switches plus the dedup
/// knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub strip_salts: bool,
    pub standardize: bool,
    pub similarity_threshold: f64,
    pub candidate_sample_size: usize,
    pub fingerprint_family_for_dedup: FingerprintKind,
}

impl Default for IngestSettings {
    fn default() -> Self {
        PipelineConfig::default().settings()
    }
}

impl PipelineConfig {
    /// The flat view of this configuration.
    pub fn settings(&self) -> IngestSettings {
        IngestSettings {
            strip_salts: self.normalization.strip_salts,
            standardize: self.normalization.standardize,
            similarity_threshold: self.dedup.similarity_threshold,
            candidate_sample_size: self.dedup.candidate_sample_size,
            fingerprint_family_for_dedup: self.dedup.fingerprint_family,
        }
    }
}

impl From<IngestSettings> for PipelineConfig {
    /// Default feature families, plus the dedup family when it is not among
    /// them.
    fn from(s: IngestSettings) -> Self {
        let mut features = FeatureConfig::default();
        if !features.fingerprints.contains(&s.fingerprint_family_for_dedup) {
            features.fingerprints.push(s.fingerprint_family_for_dedup);
        }
        PipelineConfig {
            normalization: NormalizationOptions {
                strip_salts: s.strip_salts,
                standardize: s.standardize,
            },
            features,
            dedup: ResolverConfig {
                similarity_threshold: s.similarity_threshold,
                candidate_sample_size: s.candidate_sample_size,
                fingerprint_family: s.fingerprint_family_for_dedup,
            },
        }
    }
}

/// Optional functionality compiled into this build, resolved once when a
/// pipeline is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// gzip/zstd uploads can be decoded.
    pub compression: bool,
    /// Per-record work runs on the rayon pool.
    pub parallel: bool,
}

impl Capabilities {
    pub fn detect() -> Self {
        Capabilities {
            compression: molintake_core::compress::decompression_available(),
            parallel: cfg!(feature = "parallel"),
        }
    }

    /// Everything off; useful for reproducing single-threaded behaviour.
    pub fn minimal() -> Self {
        Capabilities { compression: false, parallel: false }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert!(config.normalization.strip_salts);
        assert!(!config.normalization.standardize);
        assert_eq!(config.dedup.similarity_threshold, 0.95);
        assert_eq!(config.dedup.candidate_sample_size, 500);
        assert_eq!(config.dedup.fingerprint_family, FingerprintKind::default());
        assert_eq!(config.features.fingerprints.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [normalization]
            standardize = true

            [dedup]
            similarity_threshold = 0.9
            "#,
        )
        .unwrap();
        assert!(config.normalization.strip_salts);
        assert!(config.normalization.standardize);
        assert_eq!(config.dedup.similarity_threshold, 0.9);
        assert_eq!(config.dedup.candidate_sample_size, 500);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for text in [
            "[dedup]\nsimilarity_threshold = 1.5",
            "[dedup]\nsimilarity_threshold = -0.1",
            "[dedup]\ncandidate_sample_size = 0",
            "[dedup]\nfingerprint_family = { family = \"morgan\", radius = 7, nbits = 2048 }",
            "[features]\nfingerprints = [{ family = \"path\", min_len = 1, max_len = 7, nbits = 0 }]",
            "[normalization\n",
        ] {
            let err = PipelineConfig::from_toml_str(text).unwrap_err();
            assert!(matches!(err, IntakeError::Config(_)), "{text}: {err}");
        }
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[dedup]").unwrap();
        writeln!(file, "candidate_sample_size = 50").unwrap();
        writeln!(file, "fingerprint_family = {{ family = \"maccs\" }}").unwrap();
        file.flush().unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.dedup.candidate_sample_size, 50);
        assert_eq!(config.dedup.fingerprint_family, FingerprintKind::Maccs);
        assert!(PipelineConfig::load("/nonexistent/molintake.toml").is_err());
    }

    #[test]
    fn toml_round_trip() {
        let config = PipelineConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn flat_settings_convert() {
        let settings = IngestSettings {
            fingerprint_family_for_dedup: FingerprintKind::Morgan { radius: 3, nbits: 1024 },
            ..IngestSettings::default()
        };
        let config = PipelineConfig::from(settings.clone());
        assert!(config
            .features
            .fingerprints
            .contains(&FingerprintKind::Morgan { radius: 3, nbits: 1024 }));
        assert_eq!(config.settings(), settings);
    }

    #[test]
    fn capabilities_follow_features() {
        let caps = Capabilities::detect();
        assert_eq!(caps.parallel, cfg!(feature = "parallel"));
        assert_eq!(caps.compression, cfg!(feature = "compression"));
    }
}

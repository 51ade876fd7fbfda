//! Feature calculation: descriptors plus the configured fingerprint families
//! for one canonical molecule.

use serde::{Deserialize, Serialize};

use molintake_core::Result;

use crate::descriptors::{compute_descriptors, Descriptors};
use crate::fingerprint::{Fingerprint, FingerprintKind};
use crate::normalize::CanonicalMolecule;

/// Which fingerprint families to compute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub fingerprints: Vec<FingerprintKind>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            fingerprints: vec![
                FingerprintKind::Maccs,
                FingerprintKind::default(),
                FingerprintKind::default_path(),
            ],
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        self.fingerprints.iter().try_for_each(FingerprintKind::validate)
    }
}

/// Descriptors and fingerprints of one molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub descriptors: Descriptors,
    pub fingerprints: Vec<Fingerprint>,
}

impl FeatureSet {
    /// The fingerprint of `kind`, if it was computed.
    pub fn fingerprint(&self, kind: FingerprintKind) -> Option<&Fingerprint> {
        self.fingerprints.iter().find(|fp| fp.kind() == kind)
    }
}

/// Compute descriptors and every configured fingerprint from the canonical
/// graph.
///
/// Duplicate kinds in the configuration are computed once.
pub fn compute_features(canonical: &CanonicalMolecule, config: &FeatureConfig) -> Result<FeatureSet> {
    let mol = &canonical.molecule;
    let descriptors = compute_descriptors(mol)
        .map_err(|e| e.with_detail("canonical_smiles", &canonical.canonical_smiles))?;

    let mut fingerprints: Vec<Fingerprint> = Vec::with_capacity(config.fingerprints.len());
    for &kind in &config.fingerprints {
        if fingerprints.iter().any(|fp| fp.kind() == kind) {
            continue;
        }
        let fp = kind
            .compute(mol)
            .map_err(|e| e.with_detail("canonical_smiles", &canonical.canonical_smiles))?;
        fingerprints.push(fp);
    }
    Ok(FeatureSet { descriptors, fingerprints })
}

#[cfg(test)]
mod tests {
    use super::*;
    use molintake_core::ErrorCode;
    use crate::normalize::{normalize, NormalizationOptions};
    use crate::smiles::parse_smiles;

    fn canonical(smiles: &str) -> CanonicalMolecule {
        normalize(&parse_smiles(smiles).unwrap(), &NormalizationOptions::default()).unwrap()
    }

    #[test]
    fn default_families() {
        let features = compute_features(&canonical("CCO"), &FeatureConfig::default()).unwrap();
        assert_eq!(features.fingerprints.len(), 3);
        assert!(features.fingerprint(FingerprintKind::Maccs).is_some());
        assert!(features.fingerprint(FingerprintKind::default()).is_some());
        assert!(features.fingerprint(FingerprintKind::default_path()).is_some());
        assert!(features
            .fingerprint(FingerprintKind::Morgan { radius: 3, nbits: 1024 })
            .is_none());
        assert_eq!(features.descriptors.heavy_atom_count, 3);
    }

    #[test]
    fn notation_variants_share_features() {
        let config = FeatureConfig::default();
        let a = compute_features(&canonical("C1=CC=CC=C1O"), &config).unwrap();
        let b = compute_features(&canonical("Oc1ccccc1"), &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn repeated_computation_is_identical() {
        let config = FeatureConfig::default();
        let mol = canonical("CC(=O)Oc1ccccc1C(=O)O");
        let a = compute_features(&mol, &config).unwrap();
        let b = compute_features(&mol, &config).unwrap();
        assert_eq!(a, b);
        let encoded: Vec<String> = a.fingerprints.iter().map(Fingerprint::to_base64).collect();
        let again: Vec<String> = b.fingerprints.iter().map(Fingerprint::to_base64).collect();
        assert_eq!(encoded, again);
    }

    #[test]
    fn duplicate_kinds_are_computed_once() {
        let config = FeatureConfig {
            fingerprints: vec![FingerprintKind::Maccs, FingerprintKind::Maccs],
        };
        let features = compute_features(&canonical("CCO"), &config).unwrap();
        assert_eq!(features.fingerprints.len(), 1);
    }

    #[test]
    fn bad_parameters_fail_with_fingerprint_code() {
        let config = FeatureConfig {
            fingerprints: vec![FingerprintKind::Morgan { radius: 12, nbits: 2048 }],
        };
        assert!(config.validate().is_err());
        let err = compute_features(&canonical("CCO"), &config).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FingerprintCalculationFailed);
        assert!(err.failure().unwrap().details.contains_key("canonical_smiles"));
    }

    #[test]
    fn config_from_toml() {
        let config: FeatureConfig = toml::from_str(
            r#"
            [[fingerprints]]
            family = "morgan"
            radius = 3
            nbits = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.fingerprints, vec![FingerprintKind::Morgan { radius: 3, nbits: 1024 }]);
    }
}

//! Chemistry for the molintake ingestion pipeline.
//!
//! Parses SMILES and MOL/SDF records into a molecular graph, normalizes it to a
//! canonical form with a content hash, computes descriptors and fingerprints,
//! and compares fingerprints.
//!
//! # Example
//!
//! ```
//! use molintake_chem::{compute_features, normalize, parse_smiles, tanimoto};
//! use molintake_chem::{FeatureConfig, FingerprintKind, NormalizationOptions};
//!
//! let options = NormalizationOptions::default();
//! let a = normalize(&parse_smiles("OCC").unwrap(), &options).unwrap();
//! let b = normalize(&parse_smiles("C(C)O").unwrap(), &options).unwrap();
//! assert_eq!(a.canonical_smiles, b.canonical_smiles);
//! assert_eq!(a.content_hash, b.content_hash);
//! assert_eq!(a.formula, "C2H6O");
//!
//! let features = compute_features(&a, &FeatureConfig::default()).unwrap();
//! let fp = features.fingerprint(FingerprintKind::default()).unwrap();
//! assert_eq!(tanimoto(fp, fp).unwrap(), 1.0);
//! ```

pub mod aromatic;
pub mod canon;
pub mod descriptors;
pub mod element;
pub mod features;
pub mod fingerprint;
pub mod maccs;
pub mod molecule;
pub mod normalize;
pub mod ring;
pub mod sdf;
pub mod similarity;
pub mod smiles;

pub use canon::canonical_smiles;
pub use descriptors::{compute_descriptors, molecular_formula, Descriptors};
pub use element::{element_by_number, element_by_symbol, Element};
pub use features::{compute_features, FeatureConfig, FeatureSet};
pub use fingerprint::{
    atom_pair_fingerprint, morgan_fingerprint, path_fingerprint, torsion_fingerprint, Fingerprint, FingerprintKind,
};
pub use maccs::maccs_keys;
pub use molecule::{Bond, BondOrder, MolAtom, Molecule};
pub use normalize::{normalize, CanonicalMolecule, NormalizationOptions};
pub use ring::RingInfo;
pub use sdf::{parse_molblock, parse_sdf, parse_sdf_record, RawBlock, SdfBlocks, SdfRecord};
pub use similarity::{
    bulk_similarity, cluster_by_similarity, dice, nearest_neighbors, similarity, similarity_matrix, tanimoto,
    FingerprintIndex, IndexMatch, Metric, SimilarityHit,
};
pub use smiles::{looks_like_smiles, parse_smiles, parse_smiles_named};

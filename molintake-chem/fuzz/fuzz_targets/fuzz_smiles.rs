#![no_main]
use libfuzzer_sys::fuzz_target;
use molintake_chem::{normalize, parse_smiles, NormalizationOptions};

fuzz_target!(|data: &str| {
    if let Ok(mol) = parse_smiles(data) {
        let options = NormalizationOptions { strip_salts: true, standardize: true };
        if let Ok(canonical) = normalize(&mol, &options) {
            // canonical output must parse and normalize to itself
            let again = parse_smiles(&canonical.canonical_smiles).expect("canonical SMILES parses");
            let again = normalize(&again, &options).expect("canonical SMILES normalizes");
            assert_eq!(again.canonical_smiles, canonical.canonical_smiles);
        }
    }
});

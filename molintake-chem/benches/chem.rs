use criterion::{black_box, criterion_group, criterion_main, Criterion};
use molintake_chem::{
    bulk_similarity, cluster_by_similarity, compute_features, morgan_fingerprint, normalize, parse_smiles,
    tanimoto, FeatureConfig, Fingerprint, Metric, NormalizationOptions,
};

/// Representative drug-like structures, a few in Kekulé form or with salts
const SMILES_SET: &[&str] = &[
    "CCO",                                 // ethanol
    "CC(=O)O.[Na+]",                       // acetic acid, sodium salt
    "c1ccccc1",                            // benzene
    "CC(=O)Oc1ccccc1C(=O)O",               // aspirin
    "CC12CCC3C(C1CCC2O)CCC4=CC(=O)CCC34C", // testosterone
    "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",        // caffeine
    "CC(C)CC1=CC=C(C=C1)C(C)C(=O)O",       // ibuprofen
    "OC(=O)C1=CC=CC=C1O",                  // salicylic acid
    "CC(=O)NC1=CC=C(C=C1)O",               // acetaminophen
    "C(C(=O)O)N",                          // glycine
    "c1ccc2ccccc2c1",                      // naphthalene
    "C1CCCCC1",                            // cyclohexane
    "c1ccncc1",                            // pyridine
    "c1cc[nH]c1",                          // pyrrole
    "C1=CSC=C1",                           // thiophene
    "C[N+](C)(C)CC(=O)[O-]",               // betaine
];

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    let mols: Vec<_> = SMILES_SET.iter().filter_map(|s| parse_smiles(s).ok()).collect();
    let mols_1k: Vec<_> = mols.iter().cycle().take(1000).collect();
    let options = NormalizationOptions::default();

    group.bench_function("parse_1k", |b| {
        b.iter(|| {
            for smi in SMILES_SET.iter().cycle().take(1000) {
                let _ = parse_smiles(black_box(smi));
            }
        })
    });
    group.bench_function("canonicalize_1k", |b| {
        b.iter(|| {
            for mol in black_box(&mols_1k) {
                let _ = normalize(mol, &options);
            }
        })
    });
    group.finish();
}

fn bench_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("features");
    let options = NormalizationOptions::default();
    let canonical: Vec<_> = SMILES_SET
        .iter()
        .filter_map(|s| parse_smiles(s).ok())
        .filter_map(|m| normalize(&m, &options).ok())
        .collect();
    let config = FeatureConfig::default();

    group.bench_function("default_families", |b| {
        b.iter(|| {
            for mol in black_box(&canonical) {
                let _ = compute_features(mol, &config);
            }
        })
    });
    group.bench_function("morgan_r2_2048", |b| {
        b.iter(|| {
            for mol in black_box(&canonical) {
                let _ = morgan_fingerprint(&mol.molecule, 2, 2048);
            }
        })
    });
    group.finish();
}

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");
    let fps: Vec<Fingerprint> = SMILES_SET
        .iter()
        .filter_map(|s| parse_smiles(s).ok())
        .map(|m| morgan_fingerprint(&m, 2, 2048))
        .collect();
    let targets: Vec<Fingerprint> = fps.iter().cycle().take(1000).cloned().collect();
    let population: Vec<Fingerprint> = fps.iter().cycle().take(200).cloned().collect();

    group.bench_function("bulk_1k", |b| {
        b.iter(|| bulk_similarity(black_box(&fps[3]), black_box(&targets), Metric::Tanimoto))
    });
    group.bench_function("single_pair", |b| {
        b.iter(|| tanimoto(black_box(&fps[0]), black_box(&fps[1])))
    });
    group.bench_function("cluster_200", |b| {
        b.iter(|| cluster_by_similarity(black_box(&population), 0.7, Metric::Tanimoto))
    });
    group.finish();
}

criterion_group!(benches, bench_normalize, bench_features, bench_similarity);
criterion_main!(benches);

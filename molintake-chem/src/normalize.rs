//! Structure normalization: from a parsed graph to a canonical identity.
//!
//! The steps, in order:
//!
//! 1. fold explicit hydrogen atoms into implicit counts
//! 2. keep the largest fragment (`strip_salts`)
//! 3. neutralize charged groups (`standardize`)
//! 4. kekulize, failing on aromatic systems with no valid assignment
//! 5. check valences on the Kekulé form
//! 6. perceive aromaticity and write the canonical SMILES
//!
//! The content hash is the SHA-256 of the canonical SMILES and depends on
//! nothing else.

use serde::{Deserialize, Serialize};

use molintake_core::hash::{content_hash, pseudo_inchikey};
use molintake_core::{ContentAddressable, ErrorCode, IntakeError, Result, Summarizable};

use crate::aromatic::{kekulize, perceive_aromaticity, validate_valences};
use crate::canon::canonical_smiles;
use crate::descriptors::molecular_formula;
use crate::molecule::Molecule;
use crate::smiles::parse_smiles_named;

/// Which optional normalization steps run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationOptions {
    /// Keep only the fragment with the most heavy atoms.
    pub strip_salts: bool,
    /// Neutralize charged acids and protonated amines.
    pub standardize: bool,
}

impl Default for NormalizationOptions {
    fn default() -> Self {
        Self {
            strip_salts: true,
            standardize: false,
        }
    }
}

/// The normalized identity of one structure.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMolecule {
    pub canonical_smiles: String,
    /// Lowercase hex SHA-256 of `canonical_smiles`.
    pub content_hash: String,
    /// Hill-order molecular formula.
    pub formula: String,
    pub heavy_atom_count: usize,
    pub formal_charge: i32,
    /// Fragments discarded by salt stripping.
    pub removed_fragments: usize,
    /// The canonical graph, atoms in canonical order.
    pub molecule: Molecule,
}

impl CanonicalMolecule {
    /// The content hash in InChIKey block layout.
    pub fn pseudo_inchikey(&self) -> String {
        pseudo_inchikey(&self.content_hash).unwrap_or_default()
    }
}

impl ContentAddressable for CanonicalMolecule {
    fn content_hash(&self) -> String {
        self.content_hash.clone()
    }
}

impl Summarizable for CanonicalMolecule {
    fn summary(&self) -> String {
        format!("{} {} ({} heavy atoms)", self.formula, self.canonical_smiles, self.heavy_atom_count)
    }
}

/// Normalize a parsed structure into its canonical form.
pub fn normalize(mol: &Molecule, options: &NormalizationOptions) -> Result<CanonicalMolecule> {
    if mol.is_empty() {
        return Err(IntakeError::normalization(
            ErrorCode::CanonicalizationFailed,
            "structure has no atoms",
        ));
    }

    let mut work = fold_explicit_hydrogens(mol);
    let mut removed_fragments = 0;
    if options.strip_salts {
        let (kept, removed) = largest_fragment(&work);
        work = kept;
        removed_fragments = removed;
    }
    if options.standardize {
        neutralize(&mut work);
    }

    kekulize(&mut work)?;
    validate_valences(&work)?;
    perceive_aromaticity(&mut work);

    let canonical = canonical_smiles(&work);
    let molecule = parse_smiles_named(&canonical, &mol.name).map_err(|e| {
        IntakeError::normalization(
            ErrorCode::CanonicalizationFailed,
            format!("canonical form '{canonical}' does not re-parse: {e}"),
        )
    })?;

    Ok(CanonicalMolecule {
        content_hash: content_hash(&canonical),
        formula: molecular_formula(&molecule),
        heavy_atom_count: molecule.heavy_atom_count(),
        formal_charge: molecule.total_formal_charge(),
        removed_fragments,
        canonical_smiles: canonical,
        molecule,
    })
}

/// Remove hydrogen atoms that hang off a single heavy atom and carry no
/// charge or isotope, adding them to the parent's implicit count.
pub fn fold_explicit_hydrogens(mol: &Molecule) -> Molecule {
    let mut hydrogens = vec![0u8; mol.atom_count()];
    let mut keep = Vec::with_capacity(mol.atom_count());
    for (i, atom) in mol.atoms.iter().enumerate() {
        let parent = match mol.adjacency[i].as_slice() {
            [(p, _)] if atom.is_hydrogen() => Some(*p),
            _ => None,
        };
        let foldable = parent.filter(|&p| {
            atom.formal_charge == 0
                && atom.isotope.is_none()
                && atom.implicit_hydrogens == 0
                && !mol.atoms[p].is_hydrogen()
        });
        match foldable {
            Some(p) => hydrogens[p] = hydrogens[p].saturating_add(1),
            None => keep.push(i),
        }
    }
    if keep.len() == mol.atom_count() {
        return mol.clone();
    }
    let mut folded = mol.clone();
    for (atom, extra) in folded.atoms.iter_mut().zip(&hydrogens) {
        atom.implicit_hydrogens = atom.implicit_hydrogens.saturating_add(*extra);
    }
    folded.subgraph(&keep)
}

/// Keep the fragment with the most heavy atoms; returns it with the number
/// of fragments dropped.
///
/// Ties go to the fragment whose canonical SMILES sorts first, so the
/// choice does not depend on input order.
pub fn largest_fragment(mol: &Molecule) -> (Molecule, usize) {
    let fragments = mol.fragments();
    if fragments.len() <= 1 {
        return (mol.clone(), 0);
    }
    let removed = fragments.len() - 1;
    let heavy = |frag: &[usize]| frag.iter().filter(|&&i| !mol.atoms[i].is_hydrogen()).count();
    let best_size = fragments.iter().map(|f| heavy(f)).max().unwrap_or(0);

    let mut tied: Vec<Molecule> = fragments
        .iter()
        .filter(|f| heavy(f) == best_size)
        .map(|f| mol.subgraph(f))
        .collect();
    if tied.len() == 1 {
        return (tied.remove(0), removed);
    }
    let best = tied
        .into_iter()
        .map(|frag| (fragment_key(&frag), frag))
        .min_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, frag)| frag)
        .unwrap_or_else(|| mol.clone());
    (best, removed)
}

/// Canonical SMILES of a fragment after aromaticity is settled, falling
/// back to the raw graph when it cannot be kekulized.
fn fragment_key(frag: &Molecule) -> String {
    let mut settled = frag.clone();
    if kekulize(&mut settled).is_ok() {
        perceive_aromaticity(&mut settled);
        canonical_smiles(&settled)
    } else {
        canonical_smiles(frag)
    }
}

/// Neutralize protonated amines and anionic O/S.
///
/// Cations without hydrogens (nitro, N-oxide, quaternary ammonium) cannot
/// be neutralized; an equal number of anions is left charged to pair with
/// them, adjacent anions first.
pub fn neutralize(mol: &mut Molecule) {
    for atom in &mut mol.atoms {
        if atom.atomic_number == 7 && atom.formal_charge == 1 && atom.implicit_hydrogens > 0 {
            atom.formal_charge = 0;
            atom.implicit_hydrogens -= 1;
        }
    }

    let mut pairing: i32 = mol
        .atoms
        .iter()
        .filter(|a| a.formal_charge > 0)
        .map(|a| a.formal_charge as i32)
        .sum();

    let anions: Vec<usize> = (0..mol.atom_count())
        .filter(|&i| {
            let a = &mol.atoms[i];
            matches!(a.atomic_number, 8 | 16) && a.formal_charge == -1
        })
        .collect();
    let (adjacent, free): (Vec<usize>, Vec<usize>) = anions
        .into_iter()
        .partition(|&i| mol.neighbors(i).any(|nb| mol.atoms[nb].formal_charge > 0));

    for i in adjacent.into_iter().chain(free) {
        if pairing > 0 {
            pairing -= 1;
            continue;
        }
        let atom = &mut mol.atoms[i];
        atom.formal_charge = 0;
        atom.implicit_hydrogens += 1;
    }
}

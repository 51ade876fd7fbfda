//! Molecular descriptors computed from the canonical graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use molintake_core::{ErrorCode, IntakeError, Result, Summarizable};

use crate::element::element_by_number;
use crate::molecule::{BondOrder, Molecule};
use crate::ring::RingInfo;

const HYDROGEN_WEIGHT: f64 = 1.008;
const HYDROGEN_MASS: f64 = 1.007825;

/// The fixed descriptor vector stored with every molecule.
///
/// Floating-point values are rounded to four decimals so that the stored
/// vector is stable across platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptors {
    pub molecular_weight: f64,
    pub exact_mass: f64,
    pub logp: f64,
    pub tpsa: f64,
    pub hbd: usize,
    pub hba: usize,
    pub rotatable_bonds: usize,
    pub ring_count: usize,
    pub aromatic_ring_count: usize,
    pub heavy_atom_count: usize,
    pub fraction_sp3: f64,
    pub formal_charge: i32,
}

impl Descriptors {
    /// Rule-of-five violations: MW > 500, logP > 5, HBD > 5, HBA > 10.
    pub fn lipinski_violations(&self) -> usize {
        [
            self.molecular_weight > 500.0,
            self.logp > 5.0,
            self.hbd > 5,
            self.hba > 10,
        ]
        .iter()
        .filter(|&&v| v)
        .count()
    }

    pub fn is_lipinski_compliant(&self) -> bool {
        self.lipinski_violations() <= 1
    }

    /// Name/value pairs in declaration order, counts as floats.
    pub fn to_vec(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("molecular_weight", self.molecular_weight),
            ("exact_mass", self.exact_mass),
            ("logp", self.logp),
            ("tpsa", self.tpsa),
            ("hbd", self.hbd as f64),
            ("hba", self.hba as f64),
            ("rotatable_bonds", self.rotatable_bonds as f64),
            ("ring_count", self.ring_count as f64),
            ("aromatic_ring_count", self.aromatic_ring_count as f64),
            ("heavy_atom_count", self.heavy_atom_count as f64),
            ("fraction_sp3", self.fraction_sp3),
            ("formal_charge", self.formal_charge as f64),
        ]
    }
}

impl Summarizable for Descriptors {
    fn summary(&self) -> String {
        format!(
            "MW={:.2} logP={:.2} TPSA={:.1} HBD={} HBA={} RotBonds={} Rings={}",
            self.molecular_weight,
            self.logp,
            self.tpsa,
            self.hbd,
            self.hba,
            self.rotatable_bonds,
            self.ring_count,
        )
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

fn descriptor_error(message: impl Into<String>) -> IntakeError {
    IntakeError::computation(ErrorCode::DescriptorCalculationFailed, message)
}

/// Compute the full descriptor vector.
///
/// Fails on atoms outside the element table and on non-finite results.
pub fn compute_descriptors(mol: &Molecule) -> Result<Descriptors> {
    if let Some((i, atom)) = mol
        .atoms
        .iter()
        .enumerate()
        .find(|(_, a)| element_by_number(a.atomic_number).is_none())
    {
        return Err(descriptor_error(format!("no element data for atomic number {}", atom.atomic_number))
            .with_detail("atom", i));
    }

    let rings = RingInfo::perceive(mol);
    let aromatic_ring_count = rings
        .rings
        .iter()
        .filter(|r| r.iter().all(|&i| mol.atoms[i].is_aromatic))
        .count();

    let descriptors = Descriptors {
        molecular_weight: round4(molecular_weight(mol)),
        exact_mass: round4(exact_mass(mol)),
        logp: round4(crippen_logp(mol, &rings)),
        tpsa: round4(tpsa(mol)),
        hbd: hbd_count(mol),
        hba: hba_count(mol),
        rotatable_bonds: rotatable_bond_count(mol, &rings),
        ring_count: rings.num_rings(),
        aromatic_ring_count,
        heavy_atom_count: mol.heavy_atom_count(),
        fraction_sp3: round4(fraction_sp3(mol)),
        formal_charge: mol.total_formal_charge(),
    };

    for (name, value) in descriptors.to_vec() {
        if !value.is_finite() {
            return Err(descriptor_error(format!("{name} is not finite")).with_detail("descriptor", name));
        }
    }
    Ok(descriptors)
}

/// Average molecular weight including implicit hydrogens.
pub fn molecular_weight(mol: &Molecule) -> f64 {
    mol.atoms
        .iter()
        .map(|atom| {
            element_by_number(atom.atomic_number).map_or(0.0, |e| e.atomic_weight)
                + atom.implicit_hydrogens as f64 * HYDROGEN_WEIGHT
        })
        .sum()
}

/// Monoisotopic mass; labelled atoms use their mass number.
pub fn exact_mass(mol: &Molecule) -> f64 {
    mol.atoms
        .iter()
        .map(|atom| {
            let heavy = match atom.isotope {
                Some(mass_number) => mass_number as f64,
                None => element_by_number(atom.atomic_number).map_or(0.0, |e| e.monoisotopic_mass),
            };
            heavy + atom.implicit_hydrogens as f64 * HYDROGEN_MASS
        })
        .sum()
}

/// Molecular formula in Hill order: C, then H, then the rest alphabetically.
/// Without carbon every element, H included, is alphabetical.
pub fn molecular_formula(mol: &Molecule) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for atom in &mol.atoms {
        *counts.entry(atom.symbol()).or_insert(0) += 1;
        if atom.implicit_hydrogens > 0 {
            *counts.entry("H").or_insert(0) += atom.implicit_hydrogens as usize;
        }
    }

    let mut formula = String::new();
    let mut push = |symbol: &str, count: usize| {
        formula.push_str(symbol);
        if count > 1 {
            formula.push_str(&count.to_string());
        }
    };
    if let Some(c) = counts.remove("C") {
        push("C", c);
        if let Some(h) = counts.remove("H") {
            push("H", h);
        }
    }
    for (symbol, count) in counts {
        push(symbol, count);
    }
    formula
}

/// N and O atoms carrying at least one hydrogen.
pub fn hbd_count(mol: &Molecule) -> usize {
    mol.atoms
        .iter()
        .filter(|a| matches!(a.atomic_number, 7 | 8) && a.implicit_hydrogens > 0)
        .count()
}

/// N and O atoms without a positive charge.
pub fn hba_count(mol: &Molecule) -> usize {
    mol.atoms
        .iter()
        .filter(|a| matches!(a.atomic_number, 7 | 8) && a.formal_charge <= 0)
        .count()
}

/// Acyclic single bonds between non-terminal heavy atoms, excluding amide
/// C-N bonds.
pub fn rotatable_bond_count(mol: &Molecule, rings: &RingInfo) -> usize {
    mol.bonds
        .iter()
        .enumerate()
        .filter(|&(bi, bond)| {
            bond.order == BondOrder::Single
                && !rings.bond_in_ring(bi)
                && mol.heavy_degree(bond.atom1) > 1
                && mol.heavy_degree(bond.atom2) > 1
                && !is_amide_bond(mol, bond.atom1, bond.atom2)
                && !next_to_triple(mol, bond.atom1)
                && !next_to_triple(mol, bond.atom2)
        })
        .count()
}

fn next_to_triple(mol: &Molecule, atom: usize) -> bool {
    mol.adjacency[atom]
        .iter()
        .any(|&(_, bi)| mol.bonds[bi].order == BondOrder::Triple)
}

fn has_double_bond_to(mol: &Molecule, atom: usize, element: u8) -> bool {
    mol.adjacency[atom]
        .iter()
        .any(|&(nb, bi)| mol.atoms[nb].atomic_number == element && mol.bonds[bi].order == BondOrder::Double)
}

fn is_amide_bond(mol: &Molecule, a1: usize, a2: usize) -> bool {
    let carbon = match (mol.atoms[a1].atomic_number, mol.atoms[a2].atomic_number) {
        (6, 7) => a1,
        (7, 6) => a2,
        _ => return false,
    };
    has_double_bond_to(mol, carbon, 8)
}

/// Fraction of carbons that are sp3.
pub fn fraction_sp3(mol: &Molecule) -> f64 {
    let carbons: Vec<usize> = (0..mol.atom_count())
        .filter(|&i| mol.atoms[i].atomic_number == 6)
        .collect();
    if carbons.is_empty() {
        return 0.0;
    }
    let sp3 = carbons
        .iter()
        .filter(|&&i| {
            !mol.atoms[i].is_aromatic
                && mol.adjacency[i].iter().all(|&(_, bi)| mol.bonds[bi].order == BondOrder::Single)
        })
        .count();
    sp3 as f64 / carbons.len() as f64
}

/// Topological polar surface area (Ertl 2000), N and O contributions with
/// the common S and P terms.
pub fn tpsa(mol: &Molecule) -> f64 {
    (0..mol.atom_count()).map(|i| tpsa_contribution(mol, i)).sum()
}

fn tpsa_contribution(mol: &Molecule, idx: usize) -> f64 {
    let atom = &mol.atoms[idx];
    let h = atom.implicit_hydrogens;
    let degree = mol.heavy_degree(idx);
    let has_double = mol.adjacency[idx]
        .iter()
        .any(|&(_, bi)| mol.bonds[bi].order == BondOrder::Double);
    let has_triple = next_to_triple(mol, idx);

    match atom.atomic_number {
        7 => {
            if atom.formal_charge > 0 {
                return match h {
                    0 if degree == 4 => 0.0,
                    0 => 3.01,
                    1 => 4.36,
                    2 => 16.61,
                    _ => 27.64,
                };
            }
            if atom.is_aromatic {
                return if h > 0 { 15.79 } else if degree == 3 { 4.41 } else { 12.89 };
            }
            match (degree, h, has_double, has_triple) {
                (1, 0, _, true) => 23.79,
                (1, 1, true, _) => 23.85,
                (1, 2, _, _) => 26.02,
                (2, 0, true, _) => 12.36,
                (2, 1, _, _) => 12.03,
                (3, 0, _, _) => 3.24,
                (1, 0, true, _) => 23.79,
                _ if h >= 2 => 26.02,
                _ if h == 1 => 12.03,
                _ => 3.24,
            }
        }
        8 => {
            if atom.formal_charge < 0 {
                return 23.06;
            }
            if atom.is_aromatic {
                return 13.14;
            }
            match (degree, h, has_double) {
                (1, 0, true) => 17.07,
                (1, 1, false) => 20.23,
                (2, 0, false) => 9.23,
                (0, 2, false) => 20.23,
                _ if h > 0 => 20.23,
                _ => 9.23,
            }
        }
        16 => {
            if atom.is_aromatic {
                28.24
            } else if h > 0 {
                38.80
            } else if has_double {
                32.09
            } else {
                25.30
            }
        }
        15 => {
            if has_double {
                34.14
            } else if h > 0 {
                23.47
            } else {
                13.59
            }
        }
        _ => 0.0,
    }
}

/// Wildman–Crippen logP with a condensed atom typing.
pub fn crippen_logp(mol: &Molecule, rings: &RingInfo) -> f64 {
    let mut logp = 0.0;
    for (i, atom) in mol.atoms.iter().enumerate() {
        logp += crippen_atom(mol, i, rings);
        // H on carbon is lipophilic, H on heteroatoms is not
        let h = atom.implicit_hydrogens as f64;
        logp += if atom.atomic_number == 6 { h * 0.1230 } else { h * -0.2677 };
    }
    logp
}

fn crippen_atom(mol: &Molecule, idx: usize, rings: &RingInfo) -> f64 {
    let atom = &mol.atoms[idx];
    let hetero_neighbor = mol
        .neighbors(idx)
        .any(|n| !matches!(mol.atoms[n].atomic_number, 1 | 6));
    let has_double = mol.adjacency[idx]
        .iter()
        .any(|&(_, bi)| mol.bonds[bi].order == BondOrder::Double);

    match atom.atomic_number {
        6 => {
            if atom.is_aromatic {
                if hetero_neighbor { -0.0516 } else { 0.1581 }
            } else if has_double {
                if has_double_bond_to(mol, idx, 8) { -0.1002 } else if hetero_neighbor { -0.0300 } else { 0.0800 }
            } else if hetero_neighbor {
                -0.2035
            } else if rings.atom_in_ring(idx) {
                0.1441
            } else {
                match mol.heavy_degree(idx) {
                    0..=2 => 0.1441,
                    3 => 0.0,
                    _ => -0.2035,
                }
            }
        }
        7 => {
            if atom.formal_charge > 0 {
                -1.0190
            } else if atom.is_aromatic {
                -0.4806
            } else if has_double {
                -0.5262
            } else if atom.implicit_hydrogens >= 2 {
                -1.0190
            } else if atom.implicit_hydrogens == 1 {
                -0.7096
            } else {
                -0.3187
            }
        }
        8 => {
            if atom.formal_charge < 0 {
                -1.1890
            } else if atom.is_aromatic {
                0.1552
            } else if has_double {
                -0.1526
            } else if atom.implicit_hydrogens > 0 {
                -0.2893
            } else {
                -0.0684
            }
        }
        9 => 0.4202,
        15 => 0.8612,
        16 => {
            if atom.formal_charge != 0 {
                -0.5188
            } else if atom.is_aromatic {
                0.6237
            } else if has_double {
                -0.0024
            } else {
                0.6482
            }
        }
        17 => 0.6895,
        35 => 0.8456,
        53 => 0.8857,
        _ => 0.0,
    }
}

//! Molecular graph representation.

use molintake_core::{Annotated, Summarizable};

use crate::element::symbol_of;

/// Bond order classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Numeric bond order (aromatic counts as 1.5).
    pub fn as_f64(self) -> f64 {
        match self {
            BondOrder::Single => 1.0,
            BondOrder::Double => 2.0,
            BondOrder::Triple => 3.0,
            BondOrder::Aromatic => 1.5,
        }
    }

    /// Integer contribution to explicit valence before kekulization.
    ///
    /// Aromatic bonds count as one; the missing π bond is added by the
    /// kekulizer.
    pub fn valence_contribution(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        }
    }

    /// Bond type from an MDL connection table (1, 2, 3, 4 = aromatic).
    pub fn from_mdl(code: u8) -> Option<Self> {
        match code {
            1 => Some(BondOrder::Single),
            2 => Some(BondOrder::Double),
            3 => Some(BondOrder::Triple),
            4 => Some(BondOrder::Aromatic),
            _ => None,
        }
    }
}

/// An atom in a molecular graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MolAtom {
    pub atomic_number: u8,
    pub formal_charge: i8,
    pub isotope: Option<u16>,
    pub is_aromatic: bool,
    pub implicit_hydrogens: u8,
}

impl MolAtom {
    /// A neutral, non-aromatic atom with no hydrogens.
    pub fn new(atomic_number: u8) -> Self {
        MolAtom {
            atomic_number,
            formal_charge: 0,
            isotope: None,
            is_aromatic: false,
            implicit_hydrogens: 0,
        }
    }

    pub fn symbol(&self) -> &'static str {
        symbol_of(self.atomic_number)
    }

    pub fn is_hydrogen(&self) -> bool {
        self.atomic_number == 1
    }
}

/// A bond between two atoms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
    pub order: BondOrder,
}

impl Bond {
    pub fn new(atom1: usize, atom2: usize, order: BondOrder) -> Self {
        Bond { atom1, atom2, order }
    }

    pub fn is_aromatic(&self) -> bool {
        self.order == BondOrder::Aromatic
    }

    /// The atom at the other end of the bond from `atom`.
    pub fn other(&self, atom: usize) -> usize {
        if self.atom1 == atom {
            self.atom2
        } else {
            self.atom1
        }
    }
}

/// A molecular graph with atoms, bonds, and adjacency information.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    pub name: String,
    pub atoms: Vec<MolAtom>,
    pub bonds: Vec<Bond>,
    /// adjacency[atom_idx] = Vec<(neighbor_atom_idx, bond_idx)>
    pub adjacency: Vec<Vec<(usize, usize)>>,
}

impl Molecule {
    /// Create a new molecule, building the adjacency list from atoms and bonds.
    pub fn new(name: String, atoms: Vec<MolAtom>, bonds: Vec<Bond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (bi, bond) in bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, bi));
            adjacency[bond.atom2].push((bond.atom1, bi));
        }
        Molecule { name, atoms, bonds, adjacency }
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Number of non-hydrogen atoms.
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| !a.is_hydrogen()).count()
    }

    /// Neighbor atom indices for a given atom.
    pub fn neighbors(&self, atom_idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[atom_idx].iter().map(|&(n, _)| n)
    }

    /// Graph degree of an atom (number of explicit bonds).
    pub fn degree(&self, atom_idx: usize) -> usize {
        self.adjacency[atom_idx].len()
    }

    /// Number of non-hydrogen neighbors.
    pub fn heavy_degree(&self, atom_idx: usize) -> usize {
        self.neighbors(atom_idx)
            .filter(|&n| !self.atoms[n].is_hydrogen())
            .count()
    }

    /// Index of the bond between two atoms, if any.
    pub fn bond_index(&self, a1: usize, a2: usize) -> Option<usize> {
        self.adjacency[a1]
            .iter()
            .find(|&&(n, _)| n == a2)
            .map(|&(_, bi)| bi)
    }

    /// Find the bond between two atoms, if any.
    pub fn get_bond(&self, a1: usize, a2: usize) -> Option<&Bond> {
        self.bond_index(a1, a2).map(|bi| &self.bonds[bi])
    }

    /// Sum of explicit bond contributions at an atom, aromatic bonds as one.
    pub fn explicit_valence(&self, atom_idx: usize) -> u8 {
        self.adjacency[atom_idx]
            .iter()
            .map(|&(_, bi)| self.bonds[bi].order.valence_contribution())
            .sum()
    }

    /// Total hydrogen count (implicit + explicit H atoms).
    pub fn total_hydrogen_count(&self) -> usize {
        let explicit = self.atoms.iter().filter(|a| a.is_hydrogen()).count();
        let implicit: usize = self.atoms.iter().map(|a| a.implicit_hydrogens as usize).sum();
        explicit + implicit
    }

    /// Net formal charge.
    pub fn total_formal_charge(&self) -> i32 {
        self.atoms.iter().map(|a| a.formal_charge as i32).sum()
    }

    /// Connected components as sorted lists of atom indices, ordered by their
    /// lowest atom index.
    pub fn fragments(&self) -> Vec<Vec<usize>> {
        let n = self.atoms.len();
        let mut seen = vec![false; n];
        let mut out = Vec::new();
        for start in 0..n {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut stack = vec![start];
            let mut comp = Vec::new();
            while let Some(a) = stack.pop() {
                comp.push(a);
                for nb in self.neighbors(a) {
                    if !seen[nb] {
                        seen[nb] = true;
                        stack.push(nb);
                    }
                }
            }
            comp.sort_unstable();
            out.push(comp);
        }
        out
    }

    /// A new molecule containing only `keep` (sorted atom indices) and the
    /// bonds between them, atoms renumbered in order.
    pub fn subgraph(&self, keep: &[usize]) -> Molecule {
        let mut remap = vec![usize::MAX; self.atoms.len()];
        for (new_idx, &old) in keep.iter().enumerate() {
            remap[old] = new_idx;
        }
        let atoms = keep.iter().map(|&i| self.atoms[i].clone()).collect();
        let bonds = self
            .bonds
            .iter()
            .filter(|b| remap[b.atom1] != usize::MAX && remap[b.atom2] != usize::MAX)
            .map(|b| Bond::new(remap[b.atom1], remap[b.atom2], b.order))
            .collect();
        Molecule::new(self.name.clone(), atoms, bonds)
    }
}

impl Annotated for Molecule {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Summarizable for Molecule {
    fn summary(&self) -> String {
        format!(
            "{}: {} atoms, {} bonds",
            if self.name.is_empty() { "Molecule" } else { &self.name },
            self.atom_count(),
            self.bond_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(z: u8, h: u8) -> MolAtom {
        MolAtom { implicit_hydrogens: h, ..MolAtom::new(z) }
    }

    fn make_ethane() -> Molecule {
        Molecule::new(
            "ethane".into(),
            vec![atom(6, 3), atom(6, 3)],
            vec![Bond::new(0, 1, BondOrder::Single)],
        )
    }

    #[test]
    fn construction_and_adjacency() {
        let mol = make_ethane();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.bond_count(), 1);
        assert_eq!(mol.neighbors(0).collect::<Vec<_>>(), vec![1]);
        assert_eq!(mol.degree(1), 1);
        assert_eq!(mol.bond_index(1, 0), Some(0));
        assert!(mol.get_bond(0, 0).is_none());
    }

    #[test]
    fn hydrogen_counts() {
        let water = Molecule::new("water".into(), vec![atom(8, 2)], vec![]);
        assert_eq!(water.heavy_atom_count(), 1);
        assert_eq!(water.total_hydrogen_count(), 2);
    }

    #[test]
    fn fragments_and_subgraph() {
        // ethane + sodium, sodium listed first
        let mol = Molecule::new(
            String::new(),
            vec![atom(11, 0), atom(6, 3), atom(6, 3)],
            vec![Bond::new(1, 2, BondOrder::Single)],
        );
        let frags = mol.fragments();
        assert_eq!(frags, vec![vec![0], vec![1, 2]]);
        let ethane = mol.subgraph(&frags[1]);
        assert_eq!(ethane.atom_count(), 2);
        assert_eq!(ethane.bonds, vec![Bond::new(0, 1, BondOrder::Single)]);
    }

    #[test]
    fn explicit_valence_counts_aromatic_as_one() {
        let mol = Molecule::new(
            String::new(),
            vec![atom(6, 0), atom(6, 0), atom(8, 0)],
            vec![Bond::new(0, 1, BondOrder::Aromatic), Bond::new(0, 2, BondOrder::Double)],
        );
        assert_eq!(mol.explicit_valence(0), 3);
        assert!(mol.bonds[0].is_aromatic());
        assert_eq!(mol.bonds[1].other(2), 0);
    }

    #[test]
    fn summary_mentions_counts() {
        let mol = make_ethane();
        assert!(mol.summary().contains("2 atoms"));
        assert_eq!(mol.name(), "ethane");
    }
}

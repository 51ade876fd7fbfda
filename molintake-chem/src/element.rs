//! Periodic table data, element lookup and default valence rules.

/// A chemical element from the periodic table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub atomic_number: u8,
    pub symbol: &'static str,
    pub name: &'static str,
    /// Standard atomic weight (average over natural isotopes).
    pub atomic_weight: f64,
    /// Mass of the most abundant isotope.
    pub monoisotopic_mass: f64,
    /// Allowed neutral valences, lowest first. Empty for elements whose
    /// valence is not checked (noble gases, transition metals).
    pub valences: &'static [u8],
}

impl Element {
    /// The lowest allowed neutral valence, if the element has one.
    pub fn default_valence(&self) -> Option<u8> {
        self.valences.first().copied()
    }
}

const fn el(
    atomic_number: u8,
    symbol: &'static str,
    name: &'static str,
    atomic_weight: f64,
    monoisotopic_mass: f64,
    valences: &'static [u8],
) -> Element {
    Element { atomic_number, symbol, name, atomic_weight, monoisotopic_mass, valences }
}

/// H through Xe plus the heavier elements common in salts and reagents.
static ELEMENTS: [Element; 61] = [
    el(1, "H", "Hydrogen", 1.008, 1.007825, &[1]),
    el(2, "He", "Helium", 4.003, 4.002603, &[]),
    el(3, "Li", "Lithium", 6.941, 7.016004, &[1]),
    el(4, "Be", "Beryllium", 9.012, 9.012182, &[2]),
    el(5, "B", "Boron", 10.81, 11.009305, &[3]),
    el(6, "C", "Carbon", 12.011, 12.000000, &[4]),
    el(7, "N", "Nitrogen", 14.007, 14.003074, &[3, 5]),
    el(8, "O", "Oxygen", 15.999, 15.994915, &[2]),
    el(9, "F", "Fluorine", 18.998, 18.998403, &[1]),
    el(10, "Ne", "Neon", 20.180, 19.992440, &[]),
    el(11, "Na", "Sodium", 22.990, 22.989770, &[1]),
    el(12, "Mg", "Magnesium", 24.305, 23.985042, &[2]),
    el(13, "Al", "Aluminum", 26.982, 26.981538, &[3]),
    el(14, "Si", "Silicon", 28.086, 27.976927, &[4]),
    el(15, "P", "Phosphorus", 30.974, 30.973762, &[3, 5]),
    el(16, "S", "Sulfur", 32.06, 31.972071, &[2, 4, 6]),
    el(17, "Cl", "Chlorine", 35.45, 34.968853, &[1, 3, 5, 7]),
    el(18, "Ar", "Argon", 39.948, 39.962383, &[]),
    el(19, "K", "Potassium", 39.098, 38.963707, &[1]),
    el(20, "Ca", "Calcium", 40.078, 39.962591, &[2]),
    el(21, "Sc", "Scandium", 44.956, 44.955910, &[]),
    el(22, "Ti", "Titanium", 47.867, 47.947947, &[]),
    el(23, "V", "Vanadium", 50.942, 50.943964, &[]),
    el(24, "Cr", "Chromium", 51.996, 51.940512, &[]),
    el(25, "Mn", "Manganese", 54.938, 54.938050, &[]),
    el(26, "Fe", "Iron", 55.845, 55.934942, &[]),
    el(27, "Co", "Cobalt", 58.933, 58.933200, &[]),
    el(28, "Ni", "Nickel", 58.693, 57.935348, &[]),
    el(29, "Cu", "Copper", 63.546, 62.929601, &[]),
    el(30, "Zn", "Zinc", 65.38, 63.929147, &[]),
    el(31, "Ga", "Gallium", 69.723, 68.925581, &[3]),
    el(32, "Ge", "Germanium", 72.630, 73.921178, &[4]),
    el(33, "As", "Arsenic", 74.922, 74.921596, &[3, 5]),
    el(34, "Se", "Selenium", 78.971, 79.916522, &[2, 4, 6]),
    el(35, "Br", "Bromine", 79.904, 78.918338, &[1, 3, 5]),
    el(36, "Kr", "Krypton", 83.798, 83.911507, &[]),
    el(37, "Rb", "Rubidium", 85.468, 84.911789, &[1]),
    el(38, "Sr", "Strontium", 87.62, 87.905614, &[2]),
    el(39, "Y", "Yttrium", 88.906, 88.905848, &[]),
    el(40, "Zr", "Zirconium", 91.224, 89.904704, &[]),
    el(41, "Nb", "Niobium", 92.906, 92.906378, &[]),
    el(42, "Mo", "Molybdenum", 95.95, 97.905408, &[]),
    el(43, "Tc", "Technetium", 98.0, 97.907216, &[]),
    el(44, "Ru", "Ruthenium", 101.07, 101.904350, &[]),
    el(45, "Rh", "Rhodium", 102.906, 102.905504, &[]),
    el(46, "Pd", "Palladium", 106.42, 105.903483, &[]),
    el(47, "Ag", "Silver", 107.868, 106.905093, &[]),
    el(48, "Cd", "Cadmium", 112.414, 113.903358, &[]),
    el(49, "In", "Indium", 114.818, 114.903878, &[3]),
    el(50, "Sn", "Tin", 118.710, 119.902197, &[2, 4]),
    el(51, "Sb", "Antimony", 121.760, 120.903818, &[3, 5]),
    el(52, "Te", "Tellurium", 127.60, 129.906223, &[2, 4, 6]),
    el(53, "I", "Iodine", 126.904, 126.904468, &[1, 3, 5, 7]),
    el(54, "Xe", "Xenon", 131.293, 131.904154, &[]),
    el(55, "Cs", "Caesium", 132.905, 132.905447, &[1]),
    el(56, "Ba", "Barium", 137.327, 137.905241, &[2]),
    el(78, "Pt", "Platinum", 195.084, 194.964774, &[]),
    el(79, "Au", "Gold", 196.967, 196.966552, &[]),
    el(80, "Hg", "Mercury", 200.592, 201.970617, &[]),
    el(82, "Pb", "Lead", 207.2, 207.976636, &[]),
    el(83, "Bi", "Bismuth", 208.980, 208.980383, &[3, 5]),
];

/// Elements writable without brackets in SMILES.
pub const ORGANIC_SUBSET: [u8; 10] = [5, 6, 7, 8, 9, 15, 16, 17, 35, 53];

/// Look up an element by its symbol (e.g. "C", "Fe").
pub fn element_by_symbol(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.iter().find(|e| e.symbol == symbol)
}

/// Look up an element by its atomic number.
pub fn element_by_number(n: u8) -> Option<&'static Element> {
    if (1..=56).contains(&n) {
        Some(&ELEMENTS[(n - 1) as usize])
    } else {
        ELEMENTS[56..].iter().find(|e| e.atomic_number == n)
    }
}

/// Element symbol, or `"*"` for an unknown atomic number.
pub fn symbol_of(n: u8) -> &'static str {
    element_by_number(n).map_or("*", |e| e.symbol)
}

pub fn is_organic_subset(n: u8) -> bool {
    ORGANIC_SUBSET.contains(&n)
}

/// Allowed valences of an element carrying `charge`.
///
/// Charges shift valence the isoelectronic way: `[N+]` behaves like carbon
/// (4), `[O-]` like fluorine (1), `[C-]` and `[C+]` take 3 bonds, `[B-]` 4.
/// An empty result means the valence is not checked.
pub fn allowed_valences(atomic_number: u8, charge: i8) -> Vec<u8> {
    let Some(element) = element_by_number(atomic_number) else {
        return Vec::new();
    };
    if charge == 0 || element.valences.is_empty() {
        return element.valences.to_vec();
    }
    if atomic_number == 1 {
        return vec![0];
    }
    let charge = charge as i16;
    let shift = |v: u8| -> i16 {
        match atomic_number {
            // electropositive main-group: cations lose bonds, anions gain
            3 | 4 | 5 | 11..=13 | 19 | 20 | 31 | 37 | 38 | 49 | 55 | 56 => v as i16 - charge,
            6 | 14 | 32 | 50 => v as i16 - charge.abs(),
            _ => v as i16 + charge,
        }
    };
    let mut out: Vec<u8> = element
        .valences
        .iter()
        .map(|&v| shift(v))
        .filter(|&v| v >= 0)
        .map(|v| v as u8)
        .collect();
    out.dedup();
    out
}

/// Implicit hydrogens for an atom whose explicit bonds sum to `bond_sum`.
///
/// Picks the lowest allowed valence that accommodates the bonds; atoms
/// already at or above their highest valence get none.
pub fn implicit_hydrogens_for(atomic_number: u8, charge: i8, bond_sum: u8) -> u8 {
    allowed_valences(atomic_number, charge)
        .into_iter()
        .find(|&v| v >= bond_sum)
        .map_or(0, |v| v - bond_sum)
}

/// Hydrogens an unbracketed SMILES atom receives.
///
/// Aromatic atoms spend one valence electron on the π system.
pub fn organic_subset_hydrogens(atomic_number: u8, aromatic: bool, bond_sum: u8) -> u8 {
    if aromatic {
        element_by_number(atomic_number)
            .and_then(|e| e.default_valence())
            .map_or(0, |v| v.saturating_sub(1).saturating_sub(bond_sum))
    } else {
        implicit_hydrogens_for(atomic_number, 0, bond_sum)
    }
}

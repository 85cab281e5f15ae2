//! element symbols and standard atomic weights

/// element symbols indexed by atomic number. index 0 is a placeholder
pub const SYMBOLS: [&str; 95] = [
    "X", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al",
    "Si", "P", "S", "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe",
    "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y",
    "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", "Sb",
    "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd",
    "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir",
    "Pt", "Au", "Hg", "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac",
    "Th", "Pa", "U", "Np", "Pu",
];

/// atomic weights in amu, indexed like [SYMBOLS]
#[rustfmt::skip]
pub const MASSES: [f64; 95] = [
    0.0,
    1.00794, 4.002602, 6.941, 9.012182, 10.811, 12.0107, 14.0067, 15.9994,
    18.9984032, 20.1797, 22.98976928, 24.3050, 26.9815386, 28.0855,
    30.973762, 32.065, 35.453, 39.948, 39.0983, 40.078, 44.955912, 47.867,
    50.9415, 51.9961, 54.938045, 55.845, 58.933195, 58.6934, 63.546, 65.38,
    69.723, 72.64, 74.92160, 78.96, 79.904, 83.798, 85.4678, 87.62, 88.90585,
    91.224, 92.90638, 95.96, 98.0, 101.07, 102.90550, 106.42, 107.8682,
    112.411, 114.818, 118.710, 121.760, 127.60, 126.90447, 131.293,
    132.9054519, 137.327, 138.90547, 140.116, 140.90765, 144.242, 145.0,
    150.36, 151.964, 157.25, 158.92535, 162.500, 164.93032, 167.259,
    168.93421, 173.054, 174.9668, 178.49, 180.94788, 183.84, 186.207, 190.23,
    192.217, 195.084, 196.966569, 200.59, 204.3833, 207.2, 208.98040, 209.0,
    210.0, 222.0, 223.0, 226.0, 227.0, 232.03806, 231.03588, 238.02891, 237.0,
    244.0,
];

/// strip decorations like the `_pv` in `Fe_pv` or `/` suffixes that VASP
/// files attach to element names
pub fn clean_symbol(s: &str) -> &str {
    s.split(['_', '/', '.']).next().unwrap_or(s).trim()
}

pub fn atomic_number(symbol: &str) -> Option<usize> {
    let symbol = clean_symbol(symbol);
    SYMBOLS
        .iter()
        .skip(1)
        .position(|&s| s == symbol)
        .map(|i| i + 1)
}

/// look up the standard atomic weight of `symbol`
pub fn atomic_mass(symbol: &str) -> Option<f64> {
    atomic_number(symbol).map(|n| MASSES[n])
}

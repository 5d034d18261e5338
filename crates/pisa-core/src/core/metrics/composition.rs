use phf::{Set, phf_set};

static HYDROPHOBIC: Set<&'static str> = phf_set! {
    "ALA", "VAL", "LEU", "ILE", "MET", "PHE", "TRP", "PRO", "GLY",
};

static POLAR_UNCHARGED: Set<&'static str> = phf_set! {
    "SER", "THR", "ASN", "GLN", "TYR", "CYS",
};

static CHARGED: Set<&'static str> = phf_set! {
    "ASP", "GLU", "LYS", "ARG", "HIS",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResidueClass {
    Hydrophobic,
    PolarUncharged,
    Charged,
    Other,
}

impl ResidueClass {
    pub fn is_polar_or_charged(self) -> bool {
        matches!(self, ResidueClass::PolarUncharged | ResidueClass::Charged)
    }
}

/// Classifies a three-letter residue name; lookup is whitespace- and case-insensitive.
pub fn classify(residue_name: &str) -> ResidueClass {
    let name = residue_name.trim().to_ascii_uppercase();
    if HYDROPHOBIC.contains(name.as_str()) {
        ResidueClass::Hydrophobic
    } else if POLAR_UNCHARGED.contains(name.as_str()) {
        ResidueClass::PolarUncharged
    } else if CHARGED.contains(name.as_str()) {
        ResidueClass::Charged
    } else {
        ResidueClass::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Composition {
    pub residue_count: u32,
    pub pct_polar: Option<f64>,
    pub pct_hydrophobic: Option<f64>,
}

impl Composition {
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut total = 0u32;
        let mut hydrophobic = 0u32;
        let mut polar = 0u32;
        for name in names {
            total += 1;
            match classify(name) {
                ResidueClass::Hydrophobic => hydrophobic += 1,
                class if class.is_polar_or_charged() => polar += 1,
                _ => {}
            }
        }

        if total == 0 {
            return Self::default();
        }
        let n = f64::from(total);
        Self {
            residue_count: total,
            pct_polar: Some(100.0 * f64::from(polar) / n),
            pct_hydrophobic: Some(100.0 * f64::from(hydrophobic) / n),
        }
    }
}

/// Per-structure summary row of the contacts table.
///
/// Optional fields are `None` when the quantity is undefined for the structure; they are
/// written as blank cells, never as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureMetrics {
    pub identifier: String,
    pub bsa_score: i64,
    pub salt_bridges: u32,
    pub hydrogen_bonds: u32,
    pub interface_count: u32,
    pub interface_area: Option<f64>,
    pub dg_dissociation: Option<f64>,
    pub solvation_energy_gain: Option<f64>,
    pub overlap: Option<String>,
    pub specificity: Option<f64>,
    pub interface_residue_count: u32,
    pub pct_polar: Option<f64>,
    pub pct_hydrophobic: Option<f64>,
}

impl StructureMetrics {
    /// Zero/blank row standing in for a structure whose analysis failed.
    pub fn placeholder(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    pub fn interactions(&self) -> u32 {
        self.salt_bridges + self.hydrogen_bonds
    }
}

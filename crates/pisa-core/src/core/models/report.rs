use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondKind {
    HydrogenBond,
    SaltBridge,
}

impl BondKind {
    /// Name of the report section holding bonds of this kind.
    pub fn section_name(self) -> &'static str {
        match self {
            BondKind::HydrogenBond => "h-bonds",
            BondKind::SaltBridge => "salt-bridges",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    pub chain_id: String,
    pub name: String,
    pub seq_num: i64,
    pub asa: Option<f64>,
    pub bsa: Option<f64>,
    pub solvation_energy: Option<f64>,
}

impl Residue {
    /// Buried fraction of the accessible area, in percent.
    ///
    /// Residues with no accessible area have no defined percentage and yield `None`.
    pub fn buried_percentage(&self) -> Option<f64> {
        let asa = self.asa.unwrap_or(0.0);
        if asa == 0.0 {
            return None;
        }
        Some(self.bsa.unwrap_or(0.0) / asa * 100.0)
    }

    pub fn is_buried(&self) -> bool {
        self.bsa.is_some_and(|bsa| bsa > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondEndpoint {
    pub chain_id: String,
    pub residue_name: String,
    pub seq_num: i64,
    pub atom_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    pub kind: BondKind,
    pub first: BondEndpoint,
    pub second: BondEndpoint,
    pub distance: Option<f64>,
}

impl Bond {
    pub fn endpoints(&self) -> [&BondEndpoint; 2] {
        [&self.first, &self.second]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    pub chain_id: String,
    pub residues: Vec<Residue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interface {
    pub molecules: Vec<Molecule>,
    pub hydrogen_bonds: Vec<Bond>,
    pub salt_bridges: Vec<Bond>,
    pub area: Option<f64>,
    pub stabilization_energy: Option<f64>,
    pub solvation_energy: Option<f64>,
    pub overlap: Option<String>,
    pub pvalue: Option<f64>,
}

impl Interface {
    /// Distinct, non-empty chain identifiers of the participating molecules.
    pub fn chain_ids(&self) -> BTreeSet<&str> {
        self.molecules
            .iter()
            .map(|m| m.chain_id.as_str())
            .filter(|id| !id.is_empty())
            .collect()
    }

    pub fn has_chain_data(&self) -> bool {
        self.molecules.iter().any(|m| !m.chain_id.is_empty())
    }

    pub fn involves_chain(&self, chain_id: &str) -> bool {
        self.molecules.iter().any(|m| m.chain_id == chain_id)
    }

    pub fn bonds(&self, kind: BondKind) -> &[Bond] {
        match kind {
            BondKind::HydrogenBond => &self.hydrogen_bonds,
            BondKind::SaltBridge => &self.salt_bridges,
        }
    }

    pub fn residues(&self) -> impl Iterator<Item = &Residue> {
        self.molecules.iter().flat_map(|m| m.residues.iter())
    }
}

/// Everything the analyzer reported for one structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterfaceReport {
    pub interfaces: Vec<Interface>,
    /// Residue and bond entries dropped because a required field could not be parsed.
    pub skipped_entries: usize,
}

impl InterfaceReport {
    pub fn chain_ids(&self) -> BTreeSet<String> {
        self.interfaces
            .iter()
            .flat_map(|i| i.chain_ids())
            .map(str::to_string)
            .collect()
    }

    pub fn contains_chain(&self, chain_id: &str) -> bool {
        self.interfaces.iter().any(|i| i.involves_chain(chain_id))
    }

    pub fn residues(&self) -> impl Iterator<Item = &Residue> {
        self.interfaces.iter().flat_map(|i| i.residues())
    }

    pub fn bonds(&self, kind: BondKind) -> impl Iterator<Item = &Bond> {
        self.interfaces.iter().flat_map(move |i| i.bonds(kind).iter())
    }

    pub fn interfaces_with_chain<'a, 'c>(
        &'a self,
        chain_id: &'c str,
    ) -> impl Iterator<Item = &'a Interface> {
        self.interfaces
            .iter()
            .filter(move |i| i.involves_chain(chain_id))
    }
}

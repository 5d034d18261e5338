//! # Metric Derivation
//!
//! Turns one parsed [`InterfaceReport`] into the scalar summary row used for ranking.
//!
//! All quantities are computed with respect to a target chain and a residue sequence-number
//! floor: residues and bond endpoints below the floor, or on other chains, do not contribute.
//!
//! - **Buried-area score** - sum over qualifying residues of the decile bucket
//!   `trunc((BSA / ASA * 100) / 10)`; residues with ASA = 0 contribute nothing.
//! - **Bond counts** - hydrogen bonds and salt bridges counted per qualifying endpoint by
//!   default, so a bond with both ends on the target chain counts twice.
//! - **Energetics** - interface count and summed area over every interface involving the
//!   target chain; stabilization energy, solvation gain, overlap and specificity from the
//!   single most stabilizing interface.
//! - **Composition** - share of hydrophobic and polar/charged residues among buried
//!   target-chain residues.

pub mod composition;

use crate::core::models::metrics::StructureMetrics;
use crate::core::models::report::{BondEndpoint, BondKind, Interface, InterfaceReport};
use composition::Composition;

/// How a bond whose two endpoints both qualify is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BondCounting {
    /// One count per qualifying endpoint (historical contacts-table semantics).
    #[default]
    PerEndpoint,
    /// One count per bond with at least one qualifying endpoint.
    PerBond,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricParams {
    pub chain_id: String,
    pub residue_floor: i64,
    pub bond_counting: BondCounting,
}

impl MetricParams {
    pub fn new(chain_id: impl Into<String>, residue_floor: i64) -> Self {
        Self {
            chain_id: chain_id.into(),
            residue_floor,
            bond_counting: BondCounting::default(),
        }
    }

    fn qualifies(&self, chain_id: &str, seq_num: i64) -> bool {
        chain_id == self.chain_id && seq_num >= self.residue_floor
    }

    fn endpoint_qualifies(&self, endpoint: &BondEndpoint) -> bool {
        self.qualifies(&endpoint.chain_id, endpoint.seq_num)
    }
}

/// Energetics of the interfaces that involve the target chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterfaceEnergetics {
    pub interface_count: u32,
    pub total_area: Option<f64>,
    pub stabilization_energy: Option<f64>,
    pub solvation_energy: Option<f64>,
    pub overlap: Option<String>,
    pub specificity: Option<f64>,
}

pub fn derive_metrics(
    identifier: &str,
    report: &InterfaceReport,
    params: &MetricParams,
) -> StructureMetrics {
    let energetics = interface_energetics(report, &params.chain_id);
    let composition = residue_composition(report, params);

    StructureMetrics {
        identifier: identifier.to_string(),
        bsa_score: buried_area_score(report, params),
        salt_bridges: bond_count(report, BondKind::SaltBridge, params),
        hydrogen_bonds: bond_count(report, BondKind::HydrogenBond, params),
        interface_count: energetics.interface_count,
        interface_area: energetics.total_area,
        dg_dissociation: energetics.stabilization_energy,
        solvation_energy_gain: energetics.solvation_energy,
        overlap: energetics.overlap,
        specificity: energetics.specificity,
        interface_residue_count: composition.residue_count,
        pct_polar: composition.pct_polar,
        pct_hydrophobic: composition.pct_hydrophobic,
    }
}

pub fn buried_area_score(report: &InterfaceReport, params: &MetricParams) -> i64 {
    report
        .residues()
        .filter(|r| params.qualifies(&r.chain_id, r.seq_num))
        .filter_map(|r| r.buried_percentage())
        .map(|pct| (pct / 10.0).trunc() as i64)
        .sum()
}

pub fn bond_count(report: &InterfaceReport, kind: BondKind, params: &MetricParams) -> u32 {
    report
        .bonds(kind)
        .map(|bond| {
            let qualifying = bond
                .endpoints()
                .into_iter()
                .filter(|e| params.endpoint_qualifies(e))
                .count() as u32;
            match params.bond_counting {
                BondCounting::PerEndpoint => qualifying,
                BondCounting::PerBond => qualifying.min(1),
            }
        })
        .sum()
}

/// Most stabilizing interface involving `chain_id`: the most negative stabilization
/// energy, first encountered on ties. Interfaces without a stabilization energy never win.
pub fn best_interface<'a>(report: &'a InterfaceReport, chain_id: &str) -> Option<&'a Interface> {
    let mut best: Option<(&Interface, f64)> = None;
    for interface in report.interfaces_with_chain(chain_id) {
        let Some(energy) = interface.stabilization_energy else {
            continue;
        };
        if best.is_none_or(|(_, best_energy)| energy < best_energy) {
            best = Some((interface, energy));
        }
    }
    best.map(|(interface, _)| interface)
}

pub fn interface_energetics(report: &InterfaceReport, chain_id: &str) -> InterfaceEnergetics {
    let mut energetics = InterfaceEnergetics::default();
    for interface in report.interfaces_with_chain(chain_id) {
        energetics.interface_count += 1;
        if let Some(area) = interface.area {
            *energetics.total_area.get_or_insert(0.0) += area;
        }
    }

    if let Some(best) = best_interface(report, chain_id) {
        energetics.stabilization_energy = best.stabilization_energy;
        energetics.solvation_energy = best.solvation_energy;
        energetics.overlap = best.overlap.clone();
        energetics.specificity = specificity(best.pvalue);
    }
    energetics
}

/// `-log10(pvalue)`, defined only for positive p-values with a finite result.
pub fn specificity(pvalue: Option<f64>) -> Option<f64> {
    let p = pvalue?;
    if !(p > 0.0) {
        return None;
    }
    let value = -p.log10();
    value.is_finite().then_some(value)
}

pub fn residue_composition(report: &InterfaceReport, params: &MetricParams) -> Composition {
    Composition::from_names(
        report
            .residues()
            .filter(|r| params.qualifies(&r.chain_id, r.seq_num) && r.is_buried())
            .map(|r| r.name.as_str()),
    )
}

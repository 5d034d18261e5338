use crate::core::models::report::{
    Bond, BondEndpoint, BondKind, Interface, InterfaceReport, Molecule, Residue,
};
use roxmltree::{Document, Node};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const ENDPOINT_TAGS: [[&str; 4]; 2] = [
    ["chain-1", "res-1", "seqnum-1", "atname-1"],
    ["chain-2", "res-2", "seqnum-2", "atname-2"],
];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed XML in '{path}': {source}", path = path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
    #[error("Requested chain '{requested}' not found. Chains present: {}", describe_chains(.present))]
    MissingChain {
        requested: String,
        present: Vec<String>,
    },
}

/// Reason a single residue or bond entry was dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("invalid integer in <{field}> (value: '{value}')")]
    InvalidInt { field: &'static str, value: String },
    #[error("invalid number in <{field}> (value: '{value}')")]
    InvalidFloat { field: &'static str, value: String },
}

pub(crate) fn describe_chains(chains: &[String]) -> String {
    if chains.is_empty() {
        "(none found)".to_string()
    } else {
        chains.join(", ")
    }
}

/// Reads a PISA `interfaces` XML report from disk.
///
/// A document that is not well-formed XML is rejected as a whole. Below that level the
/// reader is tolerant: missing energetics become `None`, and residue or bond entries whose
/// sequence number or area fields cannot be parsed are skipped individually and counted in
/// [`InterfaceReport::skipped_entries`].
pub fn read_report(path: &Path) -> Result<InterfaceReport, ReportError> {
    let content = std::fs::read_to_string(path).map_err(|e| ReportError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let report = parse_report(&content).map_err(|e| ReportError::Xml {
        path: path.to_path_buf(),
        source: e,
    })?;
    if report.skipped_entries > 0 {
        warn!(
            path = %path.display(),
            skipped = report.skipped_entries,
            "Skipped unparsable residue/bond entries in report."
        );
    }
    Ok(report)
}

pub fn parse_report(xml: &str) -> Result<InterfaceReport, roxmltree::Error> {
    let document = Document::parse(xml)?;
    let mut report = InterfaceReport::default();

    for node in document
        .descendants()
        .filter(|n| n.has_tag_name("interface"))
    {
        let interface = parse_interface(node, &mut report.skipped_entries);
        if !interface.has_chain_data() {
            debug!("Discarding interface without participating-chain data.");
            continue;
        }
        report.interfaces.push(interface);
    }

    Ok(report)
}

/// Fails with [`ReportError::MissingChain`] unless some molecule in the report belongs to
/// `chain_id`.
pub fn ensure_chain_present(report: &InterfaceReport, chain_id: &str) -> Result<(), ReportError> {
    if report.contains_chain(chain_id) {
        return Ok(());
    }
    Err(ReportError::MissingChain {
        requested: chain_id.to_string(),
        present: report.chain_ids().into_iter().collect(),
    })
}

fn parse_interface(node: Node, skipped: &mut usize) -> Interface {
    let molecules = node
        .children()
        .filter(|n| n.has_tag_name("molecule"))
        .map(|m| parse_molecule(m, skipped))
        .collect();

    Interface {
        molecules,
        hydrogen_bonds: parse_bonds(node, BondKind::HydrogenBond, skipped),
        salt_bridges: parse_bonds(node, BondKind::SaltBridge, skipped),
        area: lenient_f64(node, "int_area"),
        stabilization_energy: lenient_f64(node, "stab_en"),
        solvation_energy: lenient_f64(node, "int_solv_en"),
        overlap: child_text(node, "overlap").map(str::to_string),
        pvalue: lenient_f64(node, "pvalue"),
    }
}

fn parse_molecule(node: Node, skipped: &mut usize) -> Molecule {
    let chain_id = child_text(node, "chain_id").unwrap_or_default().to_string();
    let mut residues = Vec::new();

    for residue_node in node.descendants().filter(|n| n.has_tag_name("residue")) {
        match parse_residue(residue_node, &chain_id) {
            Ok(residue) => residues.push(residue),
            Err(e) => {
                warn!(chain = %chain_id, error = %e, "Skipping residue entry.");
                *skipped += 1;
            }
        }
    }

    Molecule { chain_id, residues }
}

fn parse_residue(node: Node, chain_id: &str) -> Result<Residue, FieldError> {
    Ok(Residue {
        chain_id: chain_id.to_string(),
        name: child_text(node, "name").unwrap_or_default().to_string(),
        seq_num: sequence_number(node, "seq_num")?,
        asa: optional_f64(node, "asa")?,
        bsa: optional_f64(node, "bsa")?,
        solvation_energy: optional_f64(node, "solv_en")?,
    })
}

fn parse_bonds(interface: Node, kind: BondKind, skipped: &mut usize) -> Vec<Bond> {
    let Some(section) = child(interface, kind.section_name()) else {
        return Vec::new();
    };

    let mut bonds = Vec::new();
    for bond_node in section.children().filter(|n| n.has_tag_name("bond")) {
        match parse_bond(bond_node, kind) {
            Ok(bond) => bonds.push(bond),
            Err(e) => {
                warn!(section = kind.section_name(), error = %e, "Skipping bond entry.");
                *skipped += 1;
            }
        }
    }
    bonds
}

fn parse_bond(node: Node, kind: BondKind) -> Result<Bond, FieldError> {
    Ok(Bond {
        kind,
        first: parse_endpoint(node, &ENDPOINT_TAGS[0])?,
        second: parse_endpoint(node, &ENDPOINT_TAGS[1])?,
        distance: lenient_f64(node, "dist"),
    })
}

fn parse_endpoint(node: Node, tags: &[&'static str; 4]) -> Result<BondEndpoint, FieldError> {
    Ok(BondEndpoint {
        chain_id: child_text(node, tags[0]).unwrap_or_default().to_string(),
        residue_name: child_text(node, tags[1]).unwrap_or_default().to_string(),
        seq_num: sequence_number(node, tags[2])?,
        atom_name: child_text(node, tags[3]).unwrap_or_default().to_string(),
    })
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn child_text<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<&'a str> {
    child(node, name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Sequence numbers default to 0 when absent or blank; only unparsable text is an error.
fn sequence_number(node: Node, field: &'static str) -> Result<i64, FieldError> {
    let Some(text) = child_text(node, field) else {
        return Ok(0);
    };
    text.parse().map_err(|_| FieldError::InvalidInt {
        field,
        value: text.to_string(),
    })
}

fn optional_f64(node: Node, field: &'static str) -> Result<Option<f64>, FieldError> {
    child_text(node, field)
        .map(|text| {
            text.parse().map_err(|_| FieldError::InvalidFloat {
                field,
                value: text.to_string(),
            })
        })
        .transpose()
}

fn lenient_f64(node: Node, field: &'static str) -> Option<f64> {
    optional_f64(node, field).unwrap_or_else(|e| {
        debug!(error = %e, "Treating unparsable field as absent.");
        None
    })
}

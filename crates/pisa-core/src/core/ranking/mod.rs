//! # Ranking Engine
//!
//! Combines the per-structure metric columns into a single composite score.
//!
//! Each component is computed per row, normalized column-wise with the configured
//! [`NormalizationMode`], weighted by its share of the total weight and summed. Structures
//! whose best interface overlaps another assembly are penalized, and a second ranking without
//! them is produced alongside the full one.

pub mod normalize;

use crate::core::models::metrics::StructureMetrics;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::debug;

pub use normalize::NormalizationMode;

#[derive(Debug, Error, PartialEq)]
pub enum RankingError {
    #[error("Weight for component '{component}' must be non-negative, got {value}")]
    NegativeWeight {
        component: &'static str,
        value: f64,
    },
    #[error("Component weights must sum to a positive value, got {0}")]
    ZeroWeightSum(f64),
    #[error("Overlap penalty must be a finite non-negative number, got {0}")]
    InvalidPenalty(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    SizeAverage,
    Interactions,
    GoodDg,
    GoodSolvation,
    Specificity,
    DgPer100A2,
}

impl Component {
    pub const ALL: [Component; 6] = [
        Component::SizeAverage,
        Component::Interactions,
        Component::GoodDg,
        Component::GoodSolvation,
        Component::Specificity,
        Component::DgPer100A2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Component::SizeAverage => "size_avg",
            Component::Interactions => "interactions",
            Component::GoodDg => "good_dg",
            Component::GoodSolvation => "good_solv",
            Component::Specificity => "specificity",
            Component::DgPer100A2 => "dg_per_100A2",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub size_avg: f64,
    pub interactions: f64,
    pub good_dg: f64,
    pub good_solv: f64,
    pub specificity: f64,
    pub dg_per_100a2: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            size_avg: 0.25,
            interactions: 0.20,
            good_dg: 0.25,
            good_solv: 0.10,
            specificity: 0.15,
            dg_per_100a2: 0.05,
        }
    }
}

impl RankingWeights {
    pub fn get(&self, component: Component) -> f64 {
        match component {
            Component::SizeAverage => self.size_avg,
            Component::Interactions => self.interactions,
            Component::GoodDg => self.good_dg,
            Component::GoodSolvation => self.good_solv,
            Component::Specificity => self.specificity,
            Component::DgPer100A2 => self.dg_per_100a2,
        }
    }

    /// Weights divided by their sum, in [`Component::ALL`] order.
    pub fn normalized(&self) -> Result<[f64; 6], RankingError> {
        let mut total = 0.0;
        for component in Component::ALL {
            let value = self.get(component);
            if !(value >= 0.0) || !value.is_finite() {
                return Err(RankingError::NegativeWeight {
                    component: component.name(),
                    value,
                });
            }
            total += value;
        }
        if !(total > 0.0) {
            return Err(RankingError::ZeroWeightSum(total));
        }
        Ok(Component::ALL.map(|c| self.get(c) / total))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingConfig {
    pub weights: RankingWeights,
    pub overlap_penalty: f64,
    pub normalization: NormalizationMode,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            overlap_penalty: 0.80,
            normalization: NormalizationMode::ZScore,
        }
    }
}

impl RankingConfig {
    pub fn validate(&self) -> Result<[f64; 6], RankingError> {
        if !(self.overlap_penalty >= 0.0) || !self.overlap_penalty.is_finite() {
            return Err(RankingError::InvalidPenalty(self.overlap_penalty));
        }
        self.weights.normalized()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    pub metrics: StructureMetrics,
    /// Normalized component values, indexed like [`Component::ALL`].
    pub normalized: [Option<f64>; 6],
    pub composite: Option<f64>,
    pub score: Option<f64>,
    pub overlapping: bool,
    pub rank: usize,
}

impl RankedRow {
    pub fn component(&self, component: Component) -> Option<f64> {
        self.normalized[component.index()]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    pub all: Vec<RankedRow>,
    pub no_overlap: Vec<RankedRow>,
}

impl Ranking {
    pub fn top_no_overlap(&self, n: usize) -> &[RankedRow] {
        &self.no_overlap[..n.min(self.no_overlap.len())]
    }
}

/// Whether a raw overlap flag marks the interface as overlapping another assembly.
pub fn is_overlapping(flag: Option<&str>) -> bool {
    flag.map(|f| f.trim().to_ascii_lowercase())
        .is_some_and(|f| matches!(f.as_str(), "yes" | "y" | "true" | "1"))
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn raw_components(rows: &[StructureMetrics]) -> [Vec<Option<f64>>; 6] {
    let bsa: Vec<Option<f64>> = rows.iter().map(|r| Some(r.bsa_score as f64)).collect();
    let area: Vec<Option<f64>> = rows.iter().map(|r| finite(r.interface_area)).collect();
    let bsa_scaled = normalize::minmax(&bsa);
    let area_scaled = normalize::minmax(&area);

    let size_avg = bsa_scaled
        .iter()
        .zip(&area_scaled)
        .map(|(b, a)| Some((b.as_ref()? + a.as_ref()?) / 2.0))
        .collect();
    let interactions = rows
        .iter()
        .map(|r| Some(f64::from(r.interactions())))
        .collect();
    let good_dg: Vec<Option<f64>> = rows
        .iter()
        .map(|r| finite(r.dg_dissociation).map(|v| -v))
        .collect();
    let good_solv = rows
        .iter()
        .map(|r| finite(r.solvation_energy_gain).map(|v| -v))
        .collect();
    let specificity = rows.iter().map(|r| finite(r.specificity)).collect();
    let dg_per_area = rows
        .iter()
        .zip(&good_dg)
        .map(|(r, dg)| {
            let area = finite(r.interface_area).filter(|a| *a != 0.0)?;
            finite(Some(dg.as_ref()? / (area / 100.0)))
        })
        .collect();

    [
        size_avg,
        interactions,
        good_dg,
        good_solv,
        specificity,
        dg_per_area,
    ]
}

fn compare_rows(a: &RankedRow, b: &RankedRow) -> Ordering {
    let by_score = match (a.score, b.score) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_score.then_with(|| a.metrics.identifier.cmp(&b.metrics.identifier))
}

fn assign_ranks(rows: &mut [RankedRow]) {
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
}

pub fn rank(rows: Vec<StructureMetrics>, config: &RankingConfig) -> Result<Ranking, RankingError> {
    let weights = config.validate()?;
    let components = raw_components(&rows);
    let normalized: Vec<Vec<Option<f64>>> = components
        .iter()
        .map(|column| config.normalization.apply(column))
        .collect();

    let mut all: Vec<RankedRow> = rows
        .into_iter()
        .enumerate()
        .map(|(i, metrics)| {
            let values: [Option<f64>; 6] = std::array::from_fn(|c| normalized[c][i]);
            let composite = Component::ALL
                .iter()
                .try_fold(0.0, |acc, c| Some(acc + weights[c.index()] * values[c.index()]?));
            let overlapping = is_overlapping(metrics.overlap.as_deref());
            let penalty = if overlapping { config.overlap_penalty } else { 0.0 };
            RankedRow {
                metrics,
                normalized: values,
                composite,
                score: composite.map(|c| c - penalty),
                overlapping,
                rank: 0,
            }
        })
        .collect();

    all.sort_by(compare_rows);
    assign_ranks(&mut all);

    let mut no_overlap: Vec<RankedRow> = all.iter().filter(|r| !r.overlapping).cloned().collect();
    assign_ranks(&mut no_overlap);

    debug!(
        total = all.len(),
        without_overlap = no_overlap.len(),
        unscored = all.iter().filter(|r| r.score.is_none()).count(),
        "Ranked structures"
    );

    Ok(Ranking { all, no_overlap })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, bsa: i64, area: f64, dg: f64, overlap: &str) -> StructureMetrics {
        StructureMetrics {
            identifier: id.to_string(),
            bsa_score: bsa,
            salt_bridges: 1,
            hydrogen_bonds: 2,
            interface_count: 1,
            interface_area: Some(area),
            dg_dissociation: Some(dg),
            solvation_energy_gain: Some(-5.0),
            overlap: Some(overlap.to_string()),
            specificity: Some(1.5),
            ..Default::default()
        }
    }

    #[test]
    fn default_weights_are_normalized_by_their_sum() {
        let w = RankingWeights::default().normalized().unwrap();
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((w[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn invalid_weights_and_penalty_are_rejected() {
        let mut config = RankingConfig::default();
        config.weights.good_dg = -0.1;
        assert!(matches!(
            rank(vec![], &config),
            Err(RankingError::NegativeWeight { component: "good_dg", .. })
        ));

        let zero = RankingWeights {
            size_avg: 0.0,
            interactions: 0.0,
            good_dg: 0.0,
            good_solv: 0.0,
            specificity: 0.0,
            dg_per_100a2: 0.0,
        };
        assert_eq!(zero.normalized(), Err(RankingError::ZeroWeightSum(0.0)));

        let config = RankingConfig {
            overlap_penalty: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RankingError::InvalidPenalty(_))));
    }

    #[test]
    fn overlap_flag_recognizes_truthy_spellings() {
        for flag in ["Yes", " y ", "TRUE", "1"] {
            assert!(is_overlapping(Some(flag)), "{flag}");
        }
        for flag in ["No", "", "0", "maybe"] {
            assert!(!is_overlapping(Some(flag)), "{flag}");
        }
        assert!(!is_overlapping(None));
    }

    #[test]
    fn identical_rows_score_zero_and_order_by_identifier() {
        let rows = vec![
            row("d", 10, 500.0, -5.0, "No"),
            row("b", 10, 500.0, -5.0, "No"),
            row("a", 10, 500.0, -5.0, "No"),
            row("e", 10, 500.0, -5.0, "No"),
            row("c", 10, 500.0, -5.0, "No"),
        ];
        let ranking = rank(rows, &RankingConfig::default()).unwrap();
        let ids: Vec<&str> = ranking.all.iter().map(|r| r.metrics.identifier.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c", "d", "e"]);
        assert!(ranking.all.iter().all(|r| r.score == Some(0.0)));
        assert_eq!(ranking.all[0].rank, 1);
        assert_eq!(ranking.all[4].rank, 5);
    }

    #[test]
    fn stronger_binder_ranks_first() {
        let rows = vec![
            row("weak", 5, 400.0, -2.0, "No"),
            row("strong", 20, 900.0, -15.0, "No"),
        ];
        let ranking = rank(rows, &RankingConfig::default()).unwrap();
        assert_eq!(ranking.all[0].metrics.identifier, "strong");
        assert!(ranking.all[0].score > ranking.all[1].score);
    }

    #[test]
    fn overlap_penalty_is_subtracted_and_filtered_list_reranks() {
        let rows = vec![
            row("x", 10, 500.0, -5.0, "Yes"),
            row("y", 10, 500.0, -5.0, "No"),
        ];
        let ranking = rank(rows, &RankingConfig::default()).unwrap();
        assert_eq!(ranking.all[0].metrics.identifier, "y");
        assert_eq!(ranking.all[1].metrics.identifier, "x");
        assert!((ranking.all[1].score.unwrap() + 0.80).abs() < 1e-9);
        assert_eq!(ranking.all[1].composite, Some(0.0));

        assert_eq!(ranking.no_overlap.len(), 1);
        assert_eq!(ranking.no_overlap[0].metrics.identifier, "y");
        assert_eq!(ranking.no_overlap[0].rank, 1);
        assert_eq!(ranking.top_no_overlap(10).len(), 1);
    }

    #[test]
    fn missing_component_sorts_last() {
        let mut missing = row("a_missing", 10, 500.0, -5.0, "No");
        missing.dg_dissociation = None;
        let rows = vec![
            missing,
            row("b", 10, 500.0, -5.0, "No"),
            row("c", 30, 800.0, -9.0, "No"),
        ];
        let ranking = rank(rows, &RankingConfig::default()).unwrap();
        assert_eq!(ranking.all[2].metrics.identifier, "a_missing");
        assert_eq!(ranking.all[2].score, None);
        assert_eq!(ranking.all[2].rank, 3);
    }

    #[test]
    fn missing_component_blanks_the_score_even_at_zero_weight() {
        let mut config = RankingConfig::default();
        config.weights.specificity = 0.0;
        let mut no_specificity = row("a", 10, 500.0, -5.0, "No");
        no_specificity.specificity = None;
        let mut sharper = row("c", 11, 550.0, -5.5, "No");
        sharper.specificity = Some(2.5);
        let rows = vec![no_specificity, row("b", 12, 600.0, -6.0, "No"), sharper];

        let ranking = rank(rows, &config).unwrap();
        let a = ranking.all.iter().find(|r| r.metrics.identifier == "a").unwrap();
        assert_eq!(a.component(Component::Specificity), None);
        assert_eq!(a.score, None);
        assert_eq!(a.rank, 3);
        assert!(ranking.all[..2].iter().all(|r| r.score.is_some()));
    }

    #[test]
    fn zero_area_leaves_dg_per_area_missing() {
        let rows = vec![
            row("a", 10, 0.0, -5.0, "No"),
            row("b", 10, 200.0, -5.0, "No"),
            row("c", 10, 400.0, -5.0, "No"),
        ];
        let ranking = rank(rows, &RankingConfig::default()).unwrap();
        let a = ranking
            .all
            .iter()
            .find(|r| r.metrics.identifier == "a")
            .unwrap();
        assert_eq!(a.component(Component::DgPer100A2), None);
        assert_eq!(a.score, None);
    }

    #[test]
    fn minmax_mode_keeps_components_in_unit_interval() {
        let config = RankingConfig {
            normalization: NormalizationMode::MinMax,
            ..Default::default()
        };
        let rows = vec![
            row("a", 5, 300.0, 2.0, "No"),
            row("b", 15, 700.0, 8.0, "No"),
            row("c", 25, 900.0, 12.0, "No"),
        ];
        let ranking = rank(rows, &config).unwrap();
        for r in &ranking.all {
            for v in r.normalized.iter().flatten() {
                assert!((0.0..=1.0).contains(v));
            }
            let score = r.score.unwrap();
            assert!((0.0..=1.0 + 1e-12).contains(&score));
        }
    }
}

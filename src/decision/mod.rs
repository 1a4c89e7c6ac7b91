//! End-of-life decision engine.
//!
//! Scores the four dispositions (Recycle, Reuse, Remanufacture, Repurpose) from a
//! [`DecisionCriteria`] snapshot and recommends the best one. Scoring is additive:
//! five independent criteria each award points to one or more options.
//!
//! | Criterion       | Max | Bands                                                                 |
//! |-----------------|-----|-----------------------------------------------------------------------|
//! | State of health | 40  | `>=80` Reuse 40, Repurpose 30 / `60..80` Repurpose 35, Remanufacture 30, Reuse 20 / `40..60` Remanufacture 35, Recycle 25, Repurpose 20 / `<40` Recycle 40, Remanufacture 15 |
//! | Defects         | 25  | `0` Reuse 25, Repurpose 20 / `1..=2` Remanufacture 25, Repurpose 15 / `>2` Recycle 25 |
//! | Age (months)    | 15  | `<=24` Reuse 15, Repurpose 10 / `25..=48` Repurpose 15, Remanufacture 10 / `>48` Recycle 15, Remanufacture 10 |
//! | Chemistry       | 10  | LFP Reuse 10, Repurpose 8 / NMC811, NCA Recycle 10                    |
//! | Market demand   | 10  | high Reuse 10, Repurpose 8 / low Recycle 10 / normal Remanufacture 5, Repurpose 5 |
//!
//! The winner is the strictly highest score; ties go to the option listed first in
//! [`Disposition::ALL`]. The engine is a pure function of its input and never touches
//! storage; building the criteria from a battery is the caller's job (see
//! [`DecisionCriteria::from_battery`]).

use metrics::counter;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::domain::battery::{BatteryStatus, Chemistry};
use crate::error::{PassportError, Result};

pub mod criteria;

pub use criteria::CriteriaConfig;

pub const SOH_WEIGHT: u32 = 40;
pub const DEFECT_WEIGHT: u32 = 25;
pub const AGE_WEIGHT: u32 = 15;
pub const CHEMISTRY_WEIGHT: u32 = 10;
pub const MARKET_WEIGHT: u32 = 10;

/// Returned as reasoning when no explanatory clause applies.
pub const NORMAL_RANGE_REASONING: &str = "parameters within normal range";

/// End-of-life handling category for a battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    Recycle,
    Reuse,
    Remanufacture,
    Repurpose,
}

impl Disposition {
    /// Fixed enumeration order; also the tie-break order.
    pub const ALL: [Disposition; 4] = [
        Disposition::Recycle,
        Disposition::Reuse,
        Disposition::Remanufacture,
        Disposition::Repurpose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Recycle => "Recycle",
            Disposition::Reuse => "Reuse",
            Disposition::Remanufacture => "Remanufacture",
            Disposition::Repurpose => "Repurpose",
        }
    }

    fn index(self) -> usize {
        match self {
            Disposition::Recycle => 0,
            Disposition::Reuse => 1,
            Disposition::Remanufacture => 2,
            Disposition::Repurpose => 3,
        }
    }

    /// Status the triage dashboards used to apply for a final decision.
    ///
    /// Advisory only: Remanufacture shares `Reused` with Reuse and Recycle has no
    /// lifecycle status of its own. The engines never apply this mapping.
    pub fn suggested_status(&self) -> Option<BatteryStatus> {
        match self {
            Disposition::Recycle => None,
            Disposition::Reuse | Disposition::Remanufacture => Some(BatteryStatus::Reused),
            Disposition::Repurpose => Some(BatteryStatus::Repurposed),
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market demand for second-life packs, supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum MarketDemand {
    Low,
    #[default]
    Normal,
    High,
}

impl From<&str> for MarketDemand {
    /// Exact lowercase labels only; anything else, `"HIGH"` included, counts as normal.
    fn from(value: &str) -> Self {
        match value.trim() {
            "low" => MarketDemand::Low,
            "high" => MarketDemand::High,
            _ => MarketDemand::Normal,
        }
    }
}

impl From<String> for MarketDemand {
    fn from(value: String) -> Self {
        MarketDemand::from(value.as_str())
    }
}

/// Snapshot of battery health used for scoring. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionCriteria {
    /// Mean module state of health, 0-100
    #[serde(alias = "avgSoh")]
    pub avg_state_of_health: f64,
    #[serde(alias = "age_months")]
    pub age_months: u32,
    #[serde(alias = "defectiveModulesCount")]
    pub defective_module_count: u32,
    /// Mean of internal / max resistance across modules
    pub avg_resistance_ratio: f64,
    #[serde(alias = "composition")]
    pub chemistry: Chemistry,
    #[serde(default)]
    pub market_demand: MarketDemand,
}

impl DecisionCriteria {
    /// Reject values outside their documented ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.avg_state_of_health.is_finite()
            || !(0.0..=100.0).contains(&self.avg_state_of_health)
        {
            return Err(PassportError::InvalidInput(format!(
                "avgStateOfHealth must be within 0-100, got {}",
                self.avg_state_of_health
            )));
        }
        if !self.avg_resistance_ratio.is_finite() || self.avg_resistance_ratio < 0.0 {
            return Err(PassportError::InvalidInput(format!(
                "avgResistanceRatio must be a non-negative number, got {}",
                self.avg_resistance_ratio
            )));
        }
        Ok(())
    }
}

/// Accumulated points per disposition, kept in [`Disposition::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispositionScores([u32; 4]);

impl DispositionScores {
    pub fn get(&self, option: Disposition) -> u32 {
        self.0[option.index()]
    }

    fn add(&mut self, option: Disposition, points: u32) {
        self.0[option.index()] += points;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Disposition, u32)> + '_ {
        Disposition::ALL.into_iter().map(|option| (option, self.get(option)))
    }

    /// Highest-scoring option; the first in enumeration order wins a tie.
    pub fn best(&self) -> (Disposition, u32) {
        let mut best = (Disposition::ALL[0], self.get(Disposition::ALL[0]));
        for (option, score) in self.iter().skip(1) {
            if score > best.1 {
                best = (option, score);
            }
        }
        best
    }
}

impl Serialize for DispositionScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Disposition::ALL.len()))?;
        for (option, score) in self.iter() {
            map.serialize_entry(option.as_str(), &score)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub recommended_option: Disposition,
    /// Raw score of the winning option, at most 100
    pub confidence: u32,
    pub scores_by_option: DispositionScores,
    pub reasoning: String,
}

/// Validate the criteria, then [`recommend`].
pub fn try_recommend(criteria: &DecisionCriteria) -> Result<Recommendation> {
    criteria.validate()?;
    Ok(recommend(criteria))
}

/// Score every disposition and pick the best.
///
/// Total over well-formed input; callers that have not validated the criteria
/// should go through [`try_recommend`].
pub fn recommend(criteria: &DecisionCriteria) -> Recommendation {
    let scores = score(criteria);
    let (recommended_option, confidence) = scores.best();
    let reasoning = explain(criteria);

    counter!(
        "battery_passport_recommendations_total",
        "option" => recommended_option.as_str()
    )
    .increment(1);
    tracing::debug!(
        recommended = %recommended_option,
        confidence,
        recycle = scores.get(Disposition::Recycle),
        reuse = scores.get(Disposition::Reuse),
        remanufacture = scores.get(Disposition::Remanufacture),
        repurpose = scores.get(Disposition::Repurpose),
        "Disposition scored"
    );

    Recommendation {
        recommended_option,
        confidence,
        scores_by_option: scores,
        reasoning,
    }
}

pub fn score(criteria: &DecisionCriteria) -> DispositionScores {
    use Disposition::*;

    let mut scores = DispositionScores::default();

    // State of health
    let soh = criteria.avg_state_of_health;
    if soh >= 80.0 {
        scores.add(Reuse, 40);
        scores.add(Repurpose, 30);
    } else if soh >= 60.0 {
        scores.add(Repurpose, 35);
        scores.add(Remanufacture, 30);
        scores.add(Reuse, 20);
    } else if soh >= 40.0 {
        scores.add(Remanufacture, 35);
        scores.add(Recycle, 25);
        scores.add(Repurpose, 20);
    } else {
        scores.add(Recycle, 40);
        scores.add(Remanufacture, 15);
    }

    // Defective modules
    match criteria.defective_module_count {
        0 => {
            scores.add(Reuse, 25);
            scores.add(Repurpose, 20);
        }
        1..=2 => {
            scores.add(Remanufacture, 25);
            scores.add(Repurpose, 15);
        }
        _ => scores.add(Recycle, 25),
    }

    // Age
    match criteria.age_months {
        0..=24 => {
            scores.add(Reuse, 15);
            scores.add(Repurpose, 10);
        }
        25..=48 => {
            scores.add(Repurpose, 15);
            scores.add(Remanufacture, 10);
        }
        _ => {
            scores.add(Recycle, 15);
            scores.add(Remanufacture, 10);
        }
    }

    // Chemistry
    match criteria.chemistry {
        Chemistry::Lfp => {
            scores.add(Reuse, 10);
            scores.add(Repurpose, 8);
        }
        Chemistry::Nmc811 | Chemistry::Nca => scores.add(Recycle, 10),
        Chemistry::Nmc | Chemistry::Other(_) => {}
    }

    // Market demand
    match criteria.market_demand {
        MarketDemand::High => {
            scores.add(Reuse, 10);
            scores.add(Repurpose, 8);
        }
        MarketDemand::Low => scores.add(Recycle, 10),
        MarketDemand::Normal => {
            scores.add(Remanufacture, 5);
            scores.add(Repurpose, 5);
        }
    }

    scores
}

fn explain(criteria: &DecisionCriteria) -> String {
    let mut reasons = Vec::new();
    if criteria.avg_state_of_health < 60.0 {
        reasons.push(format!(
            "SOH moyen faible ({:.1}%)",
            criteria.avg_state_of_health
        ));
    }
    if criteria.defective_module_count > 0 {
        reasons.push(format!(
            "{} module(s) défaillant(s)",
            criteria.defective_module_count
        ));
    }
    if criteria.age_months > 36 {
        reasons.push(format!("Batterie âgée ({} mois)", criteria.age_months));
    }
    if criteria.chemistry == Chemistry::Lfp {
        reasons.push("Chimie LFP favorable au réemploi".to_string());
    }
    if criteria.market_demand == MarketDemand::High {
        reasons.push("Forte demande marché".to_string());
    }

    if reasons.is_empty() {
        NORMAL_RANGE_REASONING.to_string()
    } else {
        reasons.join(", ")
    }
}

//! Tiered plan pricing.
//!
//! All arithmetic runs in full precision; rounding happens only when a plan is
//! converted into its wire form ([`PlanResponse`]).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::thresholds::RiskTier;

/// Fixed loading applied on top of the expected refund.
pub const MARGIN: f64 = 0.05;

/// Per-tier rates, both fractions of the prediction in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct TierRates {
    pub deductible_rate: f64,
    pub ceiling_rate: f64,
}

impl TierRates {
    pub const fn for_tier(tier: RiskTier) -> Self {
        match tier {
            RiskTier::Lower => Self {
                deductible_rate: 0.30,
                ceiling_rate: 1.00,
            },
            RiskTier::Moderate => Self {
                deductible_rate: 0.25,
                ceiling_rate: 0.90,
            },
            RiskTier::High => Self {
                deductible_rate: 0.10,
                ceiling_rate: 0.70,
            },
        }
    }
}

/// Unrounded plan derived from a single prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plan {
    pub tier: RiskTier,
    pub franchise: f64,
    pub ceiling: f64,
    pub refund_estimate: f64,
    pub annual_price: f64,
    pub monthly_price: f64,
}

/// Derive the plan for `prediction` under `tier`.
///
/// Total for finite input. Negative predictions are not clamped: they yield a
/// negative franchise and ceiling and a zero refund.
pub fn compute_plan(prediction: f64, tier: RiskTier) -> Plan {
    let rates = TierRates::for_tier(tier);

    let franchise = prediction * rates.deductible_rate;
    let ceiling = prediction * rates.ceiling_rate;
    let refund_estimate = (prediction - franchise).min(ceiling).max(0.0);
    let annual_price = refund_estimate / (1.0 - MARGIN);
    let monthly_price = annual_price / 12.0;

    Plan {
        tier,
        franchise,
        ceiling,
        refund_estimate,
        annual_price,
        monthly_price,
    }
}

/// Round to cents. Only used at the outward boundary.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Coverage ceiling as exposed to clients: a rounded amount, or the literal
/// `"Infinite"` when the computed ceiling is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ceiling {
    Amount(f64),
    Unbounded(InfiniteMarker),
}

impl Ceiling {
    pub fn from_amount(value: f64) -> Self {
        if value.is_infinite() {
            Ceiling::Unbounded(InfiniteMarker::Infinite)
        } else {
            Ceiling::Amount(round2(value))
        }
    }
}

impl std::fmt::Display for Ceiling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ceiling::Amount(v) => write!(f, "{v}"),
            Ceiling::Unbounded(_) => f.write_str("Infinite"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfiniteMarker {
    Infinite,
}

/// Plan in wire form: named after its tier, every amount rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlanResponse {
    /// Capitalized tier name: "Lower", "Moderate" or "High"
    pub name: String,
    pub franchise: f64,
    /// Rounded amount, or the string "Infinite"
    #[schema(value_type = Object, example = 5000.0)]
    pub ceiling: Ceiling,
    pub refund_estimate: f64,
    pub annual_price: f64,
    pub monthly_price: f64,
}

impl From<&Plan> for PlanResponse {
    fn from(plan: &Plan) -> Self {
        Self {
            name: plan.tier.display_name().to_string(),
            franchise: round2(plan.franchise),
            ceiling: Ceiling::from_amount(plan.ceiling),
            refund_estimate: round2(plan.refund_estimate),
            annual_price: round2(plan.annual_price),
            monthly_price: round2(plan.monthly_price),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn lower_tier_scenario() {
        let plan = PlanResponse::from(&compute_plan(5000.0, RiskTier::Lower));
        assert_eq!(plan.name, "Lower");
        assert_eq!(plan.franchise, 1500.00);
        assert_eq!(plan.ceiling, Ceiling::Amount(5000.00));
        assert_eq!(plan.refund_estimate, 3500.00);
        assert_eq!(plan.annual_price, 3684.21);
        assert_eq!(plan.monthly_price, 307.02);
    }

    #[test]
    fn high_tier_scenario_caps_refund_at_ceiling() {
        let plan = PlanResponse::from(&compute_plan(20000.0, RiskTier::High));
        assert_eq!(plan.name, "High");
        assert_eq!(plan.franchise, 2000.00);
        assert_eq!(plan.ceiling, Ceiling::Amount(14000.00));
        assert_eq!(plan.refund_estimate, 14000.00);
        assert_eq!(plan.annual_price, 14736.84);
        assert_eq!(plan.monthly_price, 1228.07);
    }

    #[test]
    fn moderate_tier_rates() {
        let plan = compute_plan(12000.0, RiskTier::Moderate);
        assert!(close(plan.franchise, 3000.0));
        assert!(close(plan.ceiling, 10800.0));
        assert!(close(plan.refund_estimate, 9000.0));
    }

    #[test]
    fn refund_stays_within_bounds() {
        for tier in RiskTier::ALL {
            let mut p = 0.0;
            while p <= 60000.0 {
                let plan = compute_plan(p, tier);
                assert!(plan.refund_estimate >= 0.0);
                assert!(plan.refund_estimate <= plan.ceiling);
                p += 137.5;
            }
        }
    }

    #[test]
    fn pricing_follows_refund() {
        for tier in RiskTier::ALL {
            let plan = compute_plan(8765.43, tier);
            assert!(close(plan.annual_price, plan.refund_estimate / 0.95));
            assert!(close(plan.monthly_price, plan.annual_price / 12.0));
        }
    }

    #[test]
    fn compute_plan_is_deterministic() {
        let a = compute_plan(15432.1, RiskTier::Moderate);
        let b = compute_plan(15432.1, RiskTier::Moderate);
        assert_eq!(a, b);
    }

    #[test]
    fn internal_math_is_unrounded() {
        let plan = compute_plan(1000.005, RiskTier::High);
        assert!(close(plan.franchise, 100.0005));
    }

    #[test]
    fn negative_prediction_yields_zero_refund() {
        let plan = compute_plan(-1000.0, RiskTier::Lower);
        assert!(close(plan.franchise, -300.0));
        assert!(close(plan.ceiling, -1000.0));
        assert_eq!(plan.refund_estimate, 0.0);
        assert_eq!(plan.annual_price, 0.0);
    }

    #[test]
    fn rates_are_fractions() {
        for tier in RiskTier::ALL {
            let rates = TierRates::for_tier(tier);
            assert!((0.0..=1.0).contains(&rates.deductible_rate));
            assert!((0.0..=1.0).contains(&rates.ceiling_rate));
        }
    }

    #[test]
    fn finite_ceiling_serializes_as_number() {
        let json = serde_json::to_value(Ceiling::from_amount(1234.567)).unwrap();
        assert_eq!(json, serde_json::json!(1234.57));
    }

    #[test]
    fn infinite_ceiling_serializes_as_marker() {
        let ceiling = Ceiling::from_amount(f64::INFINITY);
        assert_eq!(serde_json::to_value(ceiling).unwrap(), "Infinite");
        assert_eq!(ceiling.to_string(), "Infinite");
    }

    #[test]
    fn ceiling_deserializes_both_forms() {
        let amount: Ceiling = serde_json::from_str("5000.0").unwrap();
        assert_eq!(amount, Ceiling::Amount(5000.0));
        let marker: Ceiling = serde_json::from_str("\"Infinite\"").unwrap();
        assert_eq!(marker, Ceiling::Unbounded(InfiniteMarker::Infinite));
    }
}

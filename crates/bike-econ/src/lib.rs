#![deny(warnings)]

//! Economic model: demand, revenue, cost and penalty for a snapshot.
//!
//! Every function here is pure. Given the same parameters and snapshot the
//! results are identical, so the engine can recompute them as often as the
//! presentation layer asks.

use bike_core::{
    money, DaySummary, PeriodResult, SimParams, SimulationSnapshot, ValidationError, Zone,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Demand index of `zone` in the snapshot's period, weather and strategies.
///
/// `base * time * price_effect * weather * strategy`, clamped to the
/// configured demand bounds. The price effect is linear around the
/// reference price:
///
/// `1 + elasticity * (price - reference) / elasticity_step`
///
/// Peak surcharge and night discount are mutually exclusive per
/// evaluation; demand incentive has no demand effect.
pub fn demand(params: &SimParams, snapshot: &SimulationSnapshot, zone: &Zone) -> f64 {
    let period = snapshot.period;
    let period_params = params.period(period);
    let pricing = &params.pricing;

    let price_effect = 1.0
        + period_params.elasticity * (zone.price - pricing.reference_price)
            / pricing.elasticity_step;
    let weather_factor = params.weather.factor(snapshot.weather, period);

    let flags = &snapshot.strategies;
    let strategy_factor = if flags.peak_surcharge && period.is_peak() {
        params.strategies.peak_surcharge_factor
    } else if flags.night_discount && period.is_night() {
        params.strategies.night_discount_factor
    } else {
        1.0
    };

    let raw = zone.base_demand
        * period_params.demand_multiplier
        * price_effect
        * weather_factor
        * strategy_factor;
    raw.clamp(pricing.min_demand, pricing.max_demand)
}

/// Trips served in `zone`: demand converted to trips, capped by parked bikes.
pub fn zone_usage(params: &SimParams, snapshot: &SimulationSnapshot, zone: &Zone) -> f64 {
    let trips = demand(params, snapshot, zone) * params.operations.usage_per_demand;
    trips.min(f64::from(zone.bikes))
}

/// Period revenue summed over all zones.
pub fn revenue(params: &SimParams, snapshot: &SimulationSnapshot) -> f64 {
    snapshot
        .zones
        .iter()
        .map(|z| zone_usage(params, snapshot, z) * z.price)
        .sum()
}

/// Components of the period operating cost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Inferred cost of moving bikes toward the optimal counts.
    pub relocation: f64,
    pub maintenance: f64,
    /// Flat costs of active strategies.
    pub strategy: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.relocation + self.maintenance + self.strategy
    }
}

pub fn cost_breakdown(params: &SimParams, snapshot: &SimulationSnapshot) -> CostBreakdown {
    let ops = &params.operations;
    let relocation = snapshot
        .zones
        .iter()
        .map(|z| f64::from(z.imbalance()) * ops.relocation_rate)
        .sum();
    let maintenance = snapshot
        .zones
        .iter()
        .map(|z| f64::from(z.bikes) * ops.maintenance_rate)
        .sum();
    let strategy = snapshot
        .strategies
        .active()
        .map(|s| params.strategies.cost_of(s))
        .sum();
    CostBreakdown {
        relocation,
        maintenance,
        strategy,
    }
}

/// Period operating cost: relocation + maintenance + strategy costs.
pub fn cost(params: &SimParams, snapshot: &SimulationSnapshot) -> f64 {
    cost_breakdown(params, snapshot).total()
}

/// Components of the period penalty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PenaltyBreakdown {
    pub imbalance: f64,
    pub unmet_demand: f64,
}

impl PenaltyBreakdown {
    pub fn total(&self) -> f64 {
        self.imbalance + self.unmet_demand
    }
}

pub fn penalty_breakdown(params: &SimParams, snapshot: &SimulationSnapshot) -> PenaltyBreakdown {
    let ops = &params.operations;
    let mut out = PenaltyBreakdown::default();
    for z in &snapshot.zones {
        let imbalance = z.imbalance();
        if imbalance > ops.imbalance_threshold {
            out.imbalance += f64::from(imbalance) * ops.imbalance_rate;
        }
        let required = demand(params, snapshot, z) * ops.unmet_demand_threshold;
        let bikes = f64::from(z.bikes);
        if bikes < required {
            out.unmet_demand += (required - bikes) * ops.unmet_demand_rate;
        }
    }
    out
}

/// Period penalty: heavy imbalance plus unmet demand.
pub fn penalty(params: &SimParams, snapshot: &SimulationSnapshot) -> f64 {
    penalty_breakdown(params, snapshot).total()
}

/// Revenue, cost, penalty and net for the snapshot as it stands, as money.
///
/// Errors only if a model amount is not finite, which validated parameters
/// rule out.
pub fn period_result(
    params: &SimParams,
    snapshot: &SimulationSnapshot,
) -> Result<PeriodResult, ValidationError> {
    let result = PeriodResult::new(
        money("revenue", revenue(params, snapshot))?,
        money("cost", cost(params, snapshot))?,
        money("penalty", penalty(params, snapshot))?,
    );
    trace!(
        day = snapshot.day,
        period = ?snapshot.period,
        revenue = %result.revenue,
        cost = %result.cost,
        penalty = %result.penalty,
        "evaluated period"
    );
    Ok(result)
}

/// Whole stars (0..=5) shown for a demand index.
pub fn demand_rating(demand: f64) -> u8 {
    if !demand.is_finite() || demand <= 0.0 {
        return 0;
    }
    demand.floor().min(5.0) as u8
}

/// Coarse classification of a finished day for the summary screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayAnalysis {
    ProfitableNoPenalty,
    ProfitableWithPenalty,
    LossWithPenalty,
    LossNoPenalty,
}

impl DayAnalysis {
    /// Economics commentary shown under the day summary.
    pub fn message(self) -> [&'static str; 2] {
        match self {
            DayAnalysis::ProfitableNoPenalty => [
                "Positive net with no penalties: bikes were allocated well, avoiding imbalance and unmet-demand fines.",
                "Prices likely rose where demand was least price-sensitive, using elasticity to lift revenue.",
            ],
            DayAnalysis::ProfitableWithPenalty => [
                "Net stayed positive despite penalties, so pricing made up for the fines.",
                "Allocating bikes more carefully would cut relocation costs and penalties further.",
            ],
            DayAnalysis::LossWithPenalty => [
                "Negative net with penalties: bike allocation was off, driving relocation costs and fines.",
                "Reassess each zone's demand and rebalance to avoid shortages and surpluses.",
            ],
            DayAnalysis::LossNoPenalty => [
                "Negative net without penalties: prices were probably too low or operating costs too high.",
                "Consider raising prices in peak periods and trimming strategy spend.",
            ],
        }
    }
}

/// Classify a day by the sign of its net and whether any penalty accrued.
pub fn analyze_day(summary: &DaySummary) -> DayAnalysis {
    let penalised = summary.penalty > Decimal::ZERO;
    match (summary.net > Decimal::ZERO, penalised) {
        (true, false) => DayAnalysis::ProfitableNoPenalty,
        (true, true) => DayAnalysis::ProfitableWithPenalty,
        (false, true) => DayAnalysis::LossWithPenalty,
        (false, false) => DayAnalysis::LossNoPenalty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bike_core::{TimePeriod, Weather, ZoneId};
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn snapshot() -> (SimParams, SimulationSnapshot) {
        let params = SimParams::default();
        let snap = SimulationSnapshot::initial(&params);
        (params, snap)
    }

    fn zone(snap: &SimulationSnapshot, id: ZoneId) -> Zone {
        snap.zone(id).unwrap().clone()
    }

    #[test]
    fn commercial_morning_peak_saturates() {
        let (params, mut snap) = snapshot();
        let z = zone(&snap, ZoneId::Commercial);
        // 4.5 * 1.8 * 0.7 = 5.67 before the clamp
        assert_eq!(demand(&params, &snap, &z), 5.0);
        snap.strategies.peak_surcharge = true;
        assert_eq!(demand(&params, &snap, &z), 5.0);
    }

    #[test]
    fn residential_midday_price_effect() {
        let (params, mut snap) = snapshot();
        snap.period = TimePeriod::Midday;
        let z = zone(&snap, ZoneId::Residential);
        // 1 + (-0.4) * (1.8 - 2.0) / 0.5 = 1.16
        assert!((demand(&params, &snap, &z) - 3.48).abs() < EPS);
        snap.weather = Weather::Rain;
        assert!((demand(&params, &snap, &z) - 3.48 * 0.6).abs() < EPS);
    }

    #[test]
    fn night_heat_and_discount() {
        let (params, mut snap) = snapshot();
        snap.period = TimePeriod::Night;
        snap.weather = Weather::Heat;
        let z = zone(&snap, ZoneId::Residential);
        let base = 3.0 * 0.7 * 1.16 * 1.3;
        assert!((demand(&params, &snap, &z) - base).abs() < EPS);
        snap.strategies.night_discount = true;
        assert!((demand(&params, &snap, &z) - base * 0.8).abs() < EPS);
    }

    #[test]
    fn surcharge_ignored_off_peak_and_incentive_has_no_demand_effect() {
        let (params, mut snap) = snapshot();
        snap.period = TimePeriod::Midday;
        let z = zone(&snap, ZoneId::Residential);
        let plain = demand(&params, &snap, &z);
        snap.strategies.peak_surcharge = true;
        snap.strategies.demand_incentive = true;
        assert_eq!(demand(&params, &snap, &z), plain);
    }

    #[test]
    fn high_price_in_rain_hits_floor() {
        let (params, mut snap) = snapshot();
        snap.period = TimePeriod::Night;
        snap.weather = Weather::Rain;
        let mut z = zone(&snap, ZoneId::University);
        z.price = 3.5;
        // price effect is negative here
        assert_eq!(demand(&params, &snap, &z), 0.5);
    }

    #[test]
    fn commercial_cost_components() {
        let (params, mut snap) = snapshot();
        snap.zones.retain(|z| z.id == ZoneId::Commercial);
        let c = cost_breakdown(&params, &snap);
        assert!((c.relocation - 4.0).abs() < EPS);
        assert!((c.maintenance - 7.0).abs() < EPS);
        assert_eq!(c.strategy, 0.0);
        snap.strategies.peak_surcharge = true;
        snap.strategies.demand_incentive = true;
        snap.strategies.night_discount = true;
        assert!((cost(&params, &snap) - (11.0 + 220.0)).abs() < EPS);
    }

    #[test]
    fn default_morning_revenue() {
        let (params, snap) = snapshot();
        // Commercial: min(40, 35) * 2.5; Residential: 3.0 * 1.8 * 1.12 -> 5.0 * 8 > 20;
        // University: 4.0 * 1.8 = 7.2 -> 5.0 * 8 = 40 > 25.
        let expected = 35.0 * 2.5 + 20.0 * 1.8 + 25.0 * 2.0;
        assert!((revenue(&params, &snap) - expected).abs() < EPS);
    }

    #[test]
    fn penalties_trigger_past_thresholds() {
        let (params, mut snap) = snapshot();
        assert_eq!(penalty(&params, &snap), 0.0);

        let z = snap.zone_mut(ZoneId::University).unwrap();
        z.optimal = 45; // imbalance 20
        let p = penalty_breakdown(&params, &snap);
        assert!((p.imbalance - 10.0).abs() < EPS);
        assert_eq!(p.unmet_demand, 0.0);

        let z = snap.zone_mut(ZoneId::Commercial).unwrap();
        z.bikes = 1;
        z.optimal = 1;
        // demand 5.0 * 0.7 = 3.5 required, 1 parked
        let p = penalty_breakdown(&params, &snap);
        assert!((p.unmet_demand - 2.5).abs() < EPS);
    }

    #[test]
    fn period_result_is_idempotent() {
        let (params, snap) = snapshot();
        let a = period_result(&params, &snap).unwrap();
        let b = period_result(&params, &snap).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.net, a.revenue - a.cost - a.penalty);
        // 87.5 + 36 + 50 from the default morning
        assert_eq!(a.revenue, Decimal::new(1735, 1));
    }

    #[test]
    fn ratings_floor_demand() {
        assert_eq!(demand_rating(0.5), 0);
        assert_eq!(demand_rating(3.48), 3);
        assert_eq!(demand_rating(5.0), 5);
        assert_eq!(demand_rating(f64::NAN), 0);
    }

    #[test]
    fn day_analysis_quadrants() {
        let mut d = DaySummary {
            day: 1,
            revenue: Decimal::new(500, 0),
            cost: Decimal::new(100, 0),
            penalty: Decimal::ZERO,
            net: Decimal::new(120, 0),
            weather: Weather::Sunny,
        };
        assert_eq!(analyze_day(&d), DayAnalysis::ProfitableNoPenalty);
        d.penalty = Decimal::new(3, 0);
        assert_eq!(analyze_day(&d), DayAnalysis::ProfitableWithPenalty);
        d.net = Decimal::new(-10, 0);
        assert_eq!(analyze_day(&d), DayAnalysis::LossWithPenalty);
        d.penalty = Decimal::ZERO;
        assert_eq!(analyze_day(&d), DayAnalysis::LossNoPenalty);
        d.net = Decimal::ZERO;
        assert_eq!(analyze_day(&d), DayAnalysis::LossNoPenalty);
    }

    fn arb_period() -> impl Strategy<Value = TimePeriod> {
        (0usize..4).prop_map(TimePeriod::from_index)
    }

    fn arb_weather() -> impl Strategy<Value = Weather> {
        prop_oneof![
            Just(Weather::Sunny),
            Just(Weather::Rain),
            Just(Weather::Heat)
        ]
    }

    proptest! {
        #[test]
        fn demand_within_clamp(price in 0.5f64..4.0,
                               period in arb_period(),
                               weather in arb_weather(),
                               surcharge in any::<bool>(),
                               discount in any::<bool>()) {
            let (params, mut snap) = snapshot();
            snap.period = period;
            snap.weather = weather;
            snap.strategies.peak_surcharge = surcharge;
            snap.strategies.night_discount = discount;
            for mut z in snap.zones.clone() {
                z.price = price;
                let d = demand(&params, &snap, &z);
                prop_assert!((0.5..=5.0).contains(&d));
            }
        }

        #[test]
        fn revenue_bounded_by_bikes(bikes in 0u32..80, price in 0.5f64..4.0, period in arb_period()) {
            let (params, mut snap) = snapshot();
            snap.period = period;
            for z in &mut snap.zones {
                z.bikes = bikes;
                z.price = price;
            }
            let r = revenue(&params, &snap);
            prop_assert!(r >= 0.0);
            for z in &snap.zones {
                prop_assert!(zone_usage(&params, &snap, z) <= f64::from(z.bikes));
            }
            prop_assert!(r <= f64::from(bikes) * price * snap.zones.len() as f64 + EPS);
        }

        #[test]
        fn cost_monotonic_in_imbalance_and_bikes(bikes in 0u32..100, optimal in 0u32..100, extra in 0u32..20) {
            let (params, mut snap) = snapshot();
            snap.zones.truncate(1);
            snap.zones[0].bikes = bikes;
            snap.zones[0].optimal = optimal;
            let base = cost(&params, &snap);

            // further from the target with the same fleet
            snap.zones[0].optimal = if optimal <= bikes {
                optimal.saturating_sub(extra)
            } else {
                optimal + extra
            };
            prop_assert!(cost(&params, &snap) >= base - EPS);

            // more bikes once at or above the target
            snap.zones[0].optimal = bikes;
            let at_target = cost(&params, &snap);
            snap.zones[0].bikes = bikes + extra;
            prop_assert!(cost(&params, &snap) >= at_target - EPS);
        }

        #[test]
        fn balanced_well_stocked_zones_pay_no_penalty(bikes in 4u32..60, period in arb_period(), weather in arb_weather()) {
            let (params, mut snap) = snapshot();
            snap.period = period;
            snap.weather = weather;
            for z in &mut snap.zones {
                z.bikes = bikes;
                z.optimal = bikes;
            }
            prop_assert_eq!(penalty(&params, &snap), 0.0);
        }
    }
}

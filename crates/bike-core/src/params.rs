//! Tunable parameters of the economic model.
//!
//! `SimParams::default()` reproduces the classroom scenario: three zones,
//! four periods per day and a mostly sunny climate.

use crate::{Strategy, TimePeriod, ValidationError, Weather, ZoneId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Initial state and price bounds of one zone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneParams {
    pub id: ZoneId,
    /// Base demand rate (> 0).
    pub base_demand: f64,
    pub initial_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub initial_bikes: u32,
    pub initial_optimal: u32,
}

/// Demand multiplier and price elasticity for a time period.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeriodParams {
    pub demand_multiplier: f64,
    /// Linear elasticity coefficient (< 0 for normal goods).
    pub elasticity: f64,
}

/// Reference pricing and demand bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingParams {
    /// Price at which the elasticity term is neutral.
    pub reference_price: f64,
    /// Price delta that moves demand by one elasticity coefficient.
    pub elasticity_step: f64,
    /// Granularity player prices snap to; 0 disables snapping.
    pub slider_step: f64,
    pub min_demand: f64,
    pub max_demand: f64,
}

impl Default for PricingParams {
    fn default() -> Self {
        Self {
            reference_price: 2.0,
            elasticity_step: 0.5,
            slider_step: 0.5,
            min_demand: 0.5,
            max_demand: 5.0,
        }
    }
}

/// Weather demand factors and daily sampling weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherParams {
    pub rain_factor: f64,
    pub heat_day_factor: f64,
    pub heat_night_factor: f64,
    pub sunny_weight: f64,
    pub rain_weight: f64,
    pub heat_weight: f64,
}

impl Default for WeatherParams {
    fn default() -> Self {
        Self {
            rain_factor: 0.6,
            heat_day_factor: 1.1,
            heat_night_factor: 1.3,
            sunny_weight: 0.7,
            rain_weight: 0.2,
            heat_weight: 0.1,
        }
    }
}

impl WeatherParams {
    /// Demand factor for the given weather during `period`.
    pub fn factor(&self, weather: Weather, period: TimePeriod) -> f64 {
        match weather {
            Weather::Sunny => 1.0,
            Weather::Rain => self.rain_factor,
            Weather::Heat if period.is_night() => self.heat_night_factor,
            Weather::Heat => self.heat_day_factor,
        }
    }

    /// Sampling weights aligned with [`Weather::ALL`].
    pub fn weights(&self) -> [f64; 3] {
        [self.sunny_weight, self.rain_weight, self.heat_weight]
    }
}

/// Demand effects and flat costs of the time-window strategies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub peak_surcharge_factor: f64,
    pub night_discount_factor: f64,
    pub peak_surcharge_cost: f64,
    pub demand_incentive_cost: f64,
    pub night_discount_cost: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            peak_surcharge_factor: 1.3,
            night_discount_factor: 0.8,
            peak_surcharge_cost: 100.0,
            demand_incentive_cost: 70.0,
            night_discount_cost: 50.0,
        }
    }
}

impl StrategyParams {
    /// Flat cost charged per period while `strategy` is active.
    pub fn cost_of(&self, strategy: Strategy) -> f64 {
        match strategy {
            Strategy::PeakSurcharge => self.peak_surcharge_cost,
            Strategy::DemandIncentive => self.demand_incentive_cost,
            Strategy::NightDiscount => self.night_discount_cost,
        }
    }
}

/// Fleet operation rates, penalty thresholds and daily target drift.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationsParams {
    /// Trips generated per unit of demand.
    pub usage_per_demand: f64,
    /// Cost per bike of imbalance.
    pub relocation_rate: f64,
    /// Cost per parked bike.
    pub maintenance_rate: f64,
    /// Imbalance above which a penalty applies.
    pub imbalance_threshold: u32,
    pub imbalance_rate: f64,
    /// Fraction of demand that must be covered by parked bikes.
    pub unmet_demand_threshold: f64,
    pub unmet_demand_rate: f64,
    /// Optimal counts move by up to this many bikes each day.
    pub optimal_jitter: u32,
    pub optimal_min: u32,
    pub optimal_max: u32,
}

impl Default for OperationsParams {
    fn default() -> Self {
        Self {
            usage_per_demand: 8.0,
            relocation_rate: 0.8,
            maintenance_rate: 0.2,
            imbalance_threshold: 15,
            imbalance_rate: 0.5,
            unmet_demand_threshold: 0.7,
            unmet_demand_rate: 1.0,
            optimal_jitter: 3,
            optimal_min: 20,
            optimal_max: 50,
        }
    }
}

/// Complete parameter set for a simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    pub zones: Vec<ZoneParams>,
    /// Indexed by [`TimePeriod::index`].
    pub periods: [PeriodParams; 4],
    pub pricing: PricingParams,
    pub weather: WeatherParams,
    pub strategies: StrategyParams,
    pub operations: OperationsParams,
    /// Seed for the default deterministic RNG.
    pub rng_seed: u64,
}

impl Default for SimParams {
    fn default() -> Self {
        let peak = |m| PeriodParams {
            demand_multiplier: m,
            elasticity: -0.3,
        };
        let off_peak = |m| PeriodParams {
            demand_multiplier: m,
            elasticity: -0.4,
        };
        Self {
            zones: vec![
                ZoneParams {
                    id: ZoneId::Commercial,
                    base_demand: 4.5,
                    initial_price: 2.5,
                    min_price: 1.0,
                    max_price: 4.0,
                    initial_bikes: 35,
                    initial_optimal: 30,
                },
                ZoneParams {
                    id: ZoneId::Residential,
                    base_demand: 3.0,
                    initial_price: 1.8,
                    min_price: 0.5,
                    max_price: 3.0,
                    initial_bikes: 20,
                    initial_optimal: 25,
                },
                ZoneParams {
                    id: ZoneId::University,
                    base_demand: 4.0,
                    initial_price: 2.0,
                    min_price: 1.0,
                    max_price: 3.5,
                    initial_bikes: 25,
                    initial_optimal: 35,
                },
            ],
            periods: [peak(1.8), off_peak(1.0), peak(1.5), off_peak(0.7)],
            pricing: PricingParams::default(),
            weather: WeatherParams::default(),
            strategies: StrategyParams::default(),
            operations: OperationsParams::default(),
            rng_seed: 42,
        }
    }
}

impl SimParams {
    pub fn period(&self, period: TimePeriod) -> &PeriodParams {
        &self.periods[period.index()]
    }

    pub fn zone(&self, id: ZoneId) -> Option<&ZoneParams> {
        self.zones.iter().find(|z| z.id == id)
    }
}

fn finite(name: &'static str, v: f64) -> Result<(), ValidationError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite(name))
    }
}

fn non_negative(name: &'static str, v: f64) -> Result<(), ValidationError> {
    finite(name, v)?;
    if v < 0.0 {
        return Err(ValidationError::Negative(name));
    }
    Ok(())
}

/// Validate a zone's demand and price bounds.
pub fn validate_zone(z: &ZoneParams) -> Result<(), ValidationError> {
    finite("base_demand", z.base_demand)?;
    finite("initial_price", z.initial_price)?;
    finite("min_price", z.min_price)?;
    finite("max_price", z.max_price)?;
    if z.base_demand <= 0.0 {
        return Err(ValidationError::NonPositiveDemand(z.id));
    }
    if z.min_price <= 0.0 || z.min_price > z.max_price {
        return Err(ValidationError::InvalidPriceBounds(z.id));
    }
    if !(z.min_price..=z.max_price).contains(&z.initial_price) {
        return Err(ValidationError::InitialPriceOutOfBounds(z.id));
    }
    Ok(())
}

/// Validate pricing references and the demand clamp.
pub fn validate_pricing(p: &PricingParams) -> Result<(), ValidationError> {
    finite("reference_price", p.reference_price)?;
    finite("elasticity_step", p.elasticity_step)?;
    non_negative("slider_step", p.slider_step)?;
    finite("min_demand", p.min_demand)?;
    finite("max_demand", p.max_demand)?;
    if p.elasticity_step <= 0.0 {
        return Err(ValidationError::InvalidPriceStep);
    }
    if p.min_demand < 0.0 || p.min_demand > p.max_demand {
        return Err(ValidationError::InvalidDemandClamp);
    }
    Ok(())
}

/// Validate weather factors and sampling weights.
pub fn validate_weather(w: &WeatherParams) -> Result<(), ValidationError> {
    non_negative("rain_factor", w.rain_factor)?;
    non_negative("heat_day_factor", w.heat_day_factor)?;
    non_negative("heat_night_factor", w.heat_night_factor)?;
    let weights = w.weights();
    if weights.iter().any(|x| !x.is_finite() || *x < 0.0) {
        return Err(ValidationError::InvalidWeatherWeights);
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err(ValidationError::InvalidWeatherWeights);
    }
    Ok(())
}

/// Validate strategy effects and costs.
pub fn validate_strategies(s: &StrategyParams) -> Result<(), ValidationError> {
    non_negative("peak_surcharge_factor", s.peak_surcharge_factor)?;
    non_negative("night_discount_factor", s.night_discount_factor)?;
    for strategy in Strategy::ALL {
        non_negative("strategy cost", s.cost_of(strategy))?;
    }
    Ok(())
}

/// Validate operation rates and optimal-count bounds.
pub fn validate_operations(o: &OperationsParams) -> Result<(), ValidationError> {
    non_negative("usage_per_demand", o.usage_per_demand)?;
    non_negative("relocation_rate", o.relocation_rate)?;
    non_negative("maintenance_rate", o.maintenance_rate)?;
    non_negative("imbalance_rate", o.imbalance_rate)?;
    non_negative("unmet_demand_threshold", o.unmet_demand_threshold)?;
    non_negative("unmet_demand_rate", o.unmet_demand_rate)?;
    if o.optimal_min > o.optimal_max {
        return Err(ValidationError::InvalidOptimalBounds);
    }
    Ok(())
}

/// Validate the whole parameter set, including cross-references like
/// duplicate zone IDs.
pub fn validate_params(params: &SimParams) -> Result<(), ValidationError> {
    if params.zones.is_empty() {
        return Err(ValidationError::NoZones);
    }
    let mut seen = BTreeSet::new();
    for z in &params.zones {
        validate_zone(z)?;
        if !seen.insert(z.id) {
            return Err(ValidationError::DuplicateZone(z.id));
        }
    }
    for p in &params.periods {
        finite("demand_multiplier", p.demand_multiplier)?;
        finite("elasticity", p.elasticity)?;
    }
    validate_pricing(&params.pricing)?;
    validate_weather(&params.weather)?;
    validate_strategies(&params.strategies)?;
    validate_operations(&params.operations)?;
    Ok(())
}

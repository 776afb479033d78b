#![deny(warnings)]

//! Core domain models and invariants for the bike-share pricing simulation.
//!
//! This crate defines the serializable snapshot the engine mutates, the
//! tunable parameters of the economic model, and validation helpers that
//! guarantee basic invariants before a simulation starts.

mod params;

pub use params::*;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the fixed operating areas of the city.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ZoneId {
    /// Business district with the highest base demand.
    Commercial,
    /// Housing estates.
    Residential,
    /// Campus area.
    University,
}

impl ZoneId {
    /// All zones in display order.
    pub const ALL: [ZoneId; 3] = [ZoneId::Commercial, ZoneId::Residential, ZoneId::University];

    /// Human-readable zone name.
    pub fn name(self) -> &'static str {
        match self {
            ZoneId::Commercial => "Commercial",
            ZoneId::Residential => "Residential",
            ZoneId::University => "University",
        }
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ZoneId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ZoneId::ALL
            .into_iter()
            .find(|z| z.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownName {
                kind: "zone",
                name: s.to_string(),
            })
    }
}

/// A single operating area with its demand, price and bike inventory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Zone identifier.
    pub id: ZoneId,
    /// Base demand rate before time, price, weather and strategy effects (> 0).
    pub base_demand: f64,
    /// Current rental price, always within `[min_price, max_price]`.
    pub price: f64,
    /// Lowest price the player may set.
    pub min_price: f64,
    /// Highest price the player may set.
    pub max_price: f64,
    /// Bikes currently parked in the zone.
    pub bikes: u32,
    /// Target bike count for the zone.
    pub optimal: u32,
}

impl Zone {
    /// Absolute difference between actual and optimal bike count.
    pub fn imbalance(&self) -> u32 {
        self.bikes.abs_diff(self.optimal)
    }

    /// Clamp a price into this zone's bounds.
    pub fn clamp_price(&self, price: f64) -> f64 {
        price.clamp(self.min_price, self.max_price)
    }
}

/// One of the four simulated time windows of a day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimePeriod {
    MorningPeak,
    Midday,
    EveningPeak,
    Night,
}

impl TimePeriod {
    /// Periods in the order they occur within a day.
    pub const ALL: [TimePeriod; 4] = [
        TimePeriod::MorningPeak,
        TimePeriod::Midday,
        TimePeriod::EveningPeak,
        TimePeriod::Night,
    ];

    /// Ordinal within the day, `0..4`.
    pub fn index(self) -> usize {
        match self {
            TimePeriod::MorningPeak => 0,
            TimePeriod::Midday => 1,
            TimePeriod::EveningPeak => 2,
            TimePeriod::Night => 3,
        }
    }

    /// Period for an ordinal, wrapping modulo 4.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    /// The following period; `Night` wraps to `MorningPeak`.
    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    /// Morning and evening rush hours.
    pub fn is_peak(self) -> bool {
        matches!(self, TimePeriod::MorningPeak | TimePeriod::EveningPeak)
    }

    /// The last period of the day.
    pub fn is_night(self) -> bool {
        self == TimePeriod::Night
    }

    /// Display label including the clock window.
    pub fn label(self) -> &'static str {
        match self {
            TimePeriod::MorningPeak => "Morning peak (7:00-9:00)",
            TimePeriod::Midday => "Midday (10:00-16:00)",
            TimePeriod::EveningPeak => "Evening peak (17:00-19:00)",
            TimePeriod::Night => "Night (20:00-22:00)",
        }
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Weather for a whole day.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weather {
    #[default]
    Sunny,
    Rain,
    Heat,
}

impl Weather {
    /// Order used for weighted sampling.
    pub const ALL: [Weather; 3] = [Weather::Sunny, Weather::Rain, Weather::Heat];

    /// Display name, also accepted by `FromStr`.
    pub fn name(self) -> &'static str {
        match self {
            Weather::Sunny => "Sunny",
            Weather::Rain => "Rain",
            Weather::Heat => "Heat",
        }
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Weather {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Weather::ALL
            .into_iter()
            .find(|w| w.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownName {
                kind: "weather",
                name: s.to_string(),
            })
    }
}

/// Time-window strategies the player can toggle for a period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Raises peak-hour demand at a flat cost.
    PeakSurcharge,
    /// Incentive campaign; only carries a cost.
    DemandIncentive,
    /// Dampens night demand at a flat cost.
    NightDiscount,
}

impl Strategy {
    /// All strategies in panel order.
    pub const ALL: [Strategy; 3] = [
        Strategy::PeakSurcharge,
        Strategy::DemandIncentive,
        Strategy::NightDiscount,
    ];

    /// Kebab-case key used on the command line and in configs.
    pub fn key(self) -> &'static str {
        match self {
            Strategy::PeakSurcharge => "peak-surcharge",
            Strategy::DemandIncentive => "demand-incentive",
            Strategy::NightDiscount => "night-discount",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Strategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', "-");
        Strategy::ALL
            .into_iter()
            .find(|st| st.key().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ValidationError::UnknownName {
                kind: "strategy",
                name: s.to_string(),
            })
    }
}

/// Independent on/off toggles for each [`Strategy`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyFlags {
    pub peak_surcharge: bool,
    pub demand_incentive: bool,
    pub night_discount: bool,
}

impl StrategyFlags {
    /// Whether `strategy` is switched on.
    pub fn is_active(&self, strategy: Strategy) -> bool {
        match strategy {
            Strategy::PeakSurcharge => self.peak_surcharge,
            Strategy::DemandIncentive => self.demand_incentive,
            Strategy::NightDiscount => self.night_discount,
        }
    }

    /// Switch `strategy` on or off.
    pub fn set(&mut self, strategy: Strategy, active: bool) {
        match strategy {
            Strategy::PeakSurcharge => self.peak_surcharge = active,
            Strategy::DemandIncentive => self.demand_incentive = active,
            Strategy::NightDiscount => self.night_discount = active,
        }
    }

    /// Turn every strategy off.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Strategies currently switched on.
    pub fn active(&self) -> impl Iterator<Item = Strategy> + '_ {
        Strategy::ALL.into_iter().filter(move |s| self.is_active(*s))
    }
}

/// Convert a model amount into money. Fails for NaN, infinities and values
/// outside the decimal range.
pub fn money(field: &'static str, value: f64) -> Result<Decimal, ValidationError> {
    Decimal::from_f64(value).ok_or(ValidationError::NonFinite(field))
}

/// Revenue, cost, penalty and net of a single evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodResult {
    pub revenue: Decimal,
    pub cost: Decimal,
    pub penalty: Decimal,
    /// `revenue - cost - penalty`.
    pub net: Decimal,
}

impl PeriodResult {
    pub fn new(revenue: Decimal, cost: Decimal, penalty: Decimal) -> Self {
        Self {
            revenue,
            cost,
            penalty,
            net: revenue - cost - penalty,
        }
    }
}

/// Cumulative totals since the simulation started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub revenue: Decimal,
    pub cost: Decimal,
    pub penalty: Decimal,
}

impl Totals {
    /// Accumulate one period result.
    pub fn add(&mut self, result: &PeriodResult) {
        self.revenue += result.revenue;
        self.cost += result.cost;
        self.penalty += result.penalty;
    }

    pub fn net(&self) -> Decimal {
        self.revenue - self.cost - self.penalty
    }
}

/// Immutable record of one finished day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    /// Day number, starting at 1.
    pub day: u32,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub penalty: Decimal,
    /// Net of the day's final period.
    pub net: Decimal,
    /// Weather the day was played under.
    pub weather: Weather,
}

/// Screen the simulation is currently on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    #[default]
    Cover,
    Playing,
    DaySummary,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GamePhase::Cover => "cover",
            GamePhase::Playing => "playing",
            GamePhase::DaySummary => "day summary",
        };
        f.write_str(s)
    }
}

/// Aggregate root of the simulation state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    /// Current day, starting at 1.
    pub day: u32,
    pub period: TimePeriod,
    pub totals: Totals,
    pub zones: Vec<Zone>,
    pub strategies: StrategyFlags,
    pub weather: Weather,
    /// Result of the last `apply_inputs` or `advance_time`.
    pub last_result: PeriodResult,
    pub history: Vec<DaySummary>,
    pub phase: GamePhase,
}

impl SimulationSnapshot {
    /// Fresh state at day 1, morning peak, on the cover screen.
    pub fn initial(params: &SimParams) -> Self {
        let zones = params
            .zones
            .iter()
            .map(|z| Zone {
                id: z.id,
                base_demand: z.base_demand,
                price: z.initial_price,
                min_price: z.min_price,
                max_price: z.max_price,
                bikes: z.initial_bikes,
                optimal: z.initial_optimal,
            })
            .collect();
        Self {
            day: 1,
            period: TimePeriod::MorningPeak,
            totals: Totals::default(),
            zones,
            strategies: StrategyFlags::default(),
            weather: Weather::Sunny,
            last_result: PeriodResult::default(),
            history: Vec::new(),
            phase: GamePhase::Cover,
        }
    }

    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn zone_mut(&mut self, id: ZoneId) -> Option<&mut Zone> {
        self.zones.iter_mut().find(|z| z.id == id)
    }
}

/// Validation errors for parameters and player-supplied names.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Numeric field must be finite.
    #[error("non-finite value for {0}")]
    NonFinite(&'static str),
    /// A simulation needs at least one zone.
    #[error("no zones configured")]
    NoZones,
    #[error("zone {0} configured more than once")]
    DuplicateZone(ZoneId),
    /// Price bounds must satisfy 0 < min <= max.
    #[error("invalid price bounds for zone {0}")]
    InvalidPriceBounds(ZoneId),
    #[error("initial price of zone {0} lies outside its bounds")]
    InitialPriceOutOfBounds(ZoneId),
    /// Base demand must be strictly positive.
    #[error("base demand of zone {0} must be > 0")]
    NonPositiveDemand(ZoneId),
    /// Demand clamp must satisfy 0 <= min <= max.
    #[error("invalid demand clamp bounds")]
    InvalidDemandClamp,
    /// Elasticity step must be > 0; slider step must be >= 0.
    #[error("invalid price step")]
    InvalidPriceStep,
    /// Weights must be non-negative with a positive sum.
    #[error("invalid weather weights")]
    InvalidWeatherWeights,
    #[error("optimal bike bounds must satisfy min <= max")]
    InvalidOptimalBounds,
    /// A monetary rate or cost must be non-negative.
    #[error("negative value for {0}")]
    Negative(&'static str),
    #[error("unknown {kind}: {name}")]
    UnknownName { kind: &'static str, name: String },
}

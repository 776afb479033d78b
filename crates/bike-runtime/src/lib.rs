#![deny(warnings)]

//! Simulation engine for the bike-share pricing game.
//!
//! [`Engine`] exclusively owns the [`SimulationSnapshot`] and moves it
//! through the phase state machine:
//!
//! ```text
//! Cover --start--> Playing --advance_time (4x)--> DaySummary
//!                     ^                                |
//!                     +------continue_to_next_day------+
//! DaySummary --return_to_cover--> Cover
//! ```
//!
//! All economics are delegated to `bike_econ`. Randomness (daily weather
//! and optimal-count drift) comes from an injected RNG so runs are
//! reproducible.

use bike_core::{
    validate_params, DaySummary, GamePhase, PeriodResult, SimParams, SimulationSnapshot, Strategy,
    StrategyFlags, TimePeriod, Totals, ValidationError, Weather, Zone, ZoneId,
};
use bike_econ as econ;
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors returned by engine commands.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// A command was issued from a phase that does not accept it. This
    /// indicates a bug in the caller; the snapshot is left untouched.
    #[error("{op} is not valid in the {phase} phase")]
    InvalidPhase { op: &'static str, phase: GamePhase },
    #[error("zone {0} is not part of this simulation")]
    UnknownZone(ZoneId),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Player edits staged until the next [`Engine::apply_inputs`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInputs {
    pub prices: BTreeMap<ZoneId, f64>,
    pub strategies: StrategyFlags,
}

impl PlayerInputs {
    /// Current zone prices with every strategy switched off.
    pub fn from_snapshot(snapshot: &SimulationSnapshot) -> Self {
        Self {
            prices: snapshot.zones.iter().map(|z| (z.id, z.price)).collect(),
            strategies: StrategyFlags::default(),
        }
    }

    pub fn with_price(mut self, zone: ZoneId, price: f64) -> Self {
        self.prices.insert(zone, price);
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategies.set(strategy, true);
        self
    }
}

/// Read-only view of a zone for rendering.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ZoneView {
    pub id: ZoneId,
    pub name: &'static str,
    pub price: f64,
    pub bikes: u32,
    pub optimal: u32,
    pub demand: f64,
    /// Whole demand stars, 0..=5.
    pub rating: u8,
}

/// Clamp into the zone's bounds, then snap to the slider grid. Values
/// halfway between two steps go to the even multiple.
fn snap_price(zone: &Zone, price: f64, step: f64) -> f64 {
    let clamped = zone.clamp_price(price);
    if step <= 0.0 {
        return clamped;
    }
    zone.clamp_price((clamped / step).round_ties_even() * step)
}

/// Owner of the simulation snapshot and its random source.
pub struct Engine<R = ChaCha8Rng> {
    params: SimParams,
    snapshot: SimulationSnapshot,
    pending: PlayerInputs,
    weather_dist: WeightedIndex<f64>,
    rng: R,
}

impl Engine<ChaCha8Rng> {
    /// Engine seeded from `params.rng_seed`.
    pub fn new(params: SimParams) -> Result<Self, EngineError> {
        let rng = ChaCha8Rng::seed_from_u64(params.rng_seed);
        Self::with_rng(params, rng)
    }
}

impl<R: RngCore> Engine<R> {
    /// Engine drawing weather and optimal-count drift from `rng`.
    pub fn with_rng(params: SimParams, rng: R) -> Result<Self, EngineError> {
        validate_params(&params)?;
        let weather_dist = WeightedIndex::new(params.weather.weights())
            .map_err(|_| ValidationError::InvalidWeatherWeights)?;
        let snapshot = SimulationSnapshot::initial(&params);
        let pending = PlayerInputs::from_snapshot(&snapshot);
        Ok(Self {
            params,
            snapshot,
            pending,
            weather_dist,
            rng,
        })
    }

    fn require(&self, op: &'static str, expected: GamePhase) -> Result<(), EngineError> {
        let phase = self.snapshot.phase;
        if phase == expected {
            return Ok(());
        }
        error!(op, %phase, %expected, "command issued from wrong phase");
        Err(EngineError::InvalidPhase { op, phase })
    }

    fn set_phase(&mut self, phase: GamePhase) {
        debug!(from = %self.snapshot.phase, to = %phase, "phase change");
        self.snapshot.phase = phase;
    }

    /// Leave the cover screen and begin playing.
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.require("start", GamePhase::Cover)?;
        self.pending = PlayerInputs::from_snapshot(&self.snapshot);
        self.set_phase(GamePhase::Playing);
        Ok(())
    }

    /// Stage a price for `zone`. Out-of-range prices are clamped to the
    /// zone's bounds and snapped to the slider step; the staged value is
    /// returned.
    pub fn set_zone_price(&mut self, zone: ZoneId, price: f64) -> Result<f64, EngineError> {
        self.require("set_zone_price", GamePhase::Playing)?;
        let staged = self.checked_price(zone, price)?;
        self.pending.prices.insert(zone, staged);
        Ok(staged)
    }

    /// The value a slider would hold for `price`, without staging it.
    fn checked_price(&self, zone: ZoneId, price: f64) -> Result<f64, EngineError> {
        if !price.is_finite() {
            return Err(ValidationError::NonFinite("price").into());
        }
        let z = self
            .snapshot
            .zone(zone)
            .ok_or(EngineError::UnknownZone(zone))?;
        if price < z.min_price || price > z.max_price {
            warn!(%zone, price, min = z.min_price, max = z.max_price, "price clamped");
        }
        Ok(snap_price(z, price, self.params.pricing.slider_step))
    }

    /// Stage a strategy toggle.
    pub fn set_strategy_flag(&mut self, strategy: Strategy, active: bool) -> Result<(), EngineError> {
        self.require("set_strategy_flag", GamePhase::Playing)?;
        self.pending.strategies.set(strategy, active);
        Ok(())
    }

    /// Commit staged prices and strategies, then recompute the displayed
    /// period result. Time does not advance.
    pub fn apply_inputs(&mut self) -> Result<PeriodResult, EngineError> {
        self.require("apply_inputs", GamePhase::Playing)?;
        for (id, price) in &self.pending.prices {
            if let Some(zone) = self.snapshot.zone_mut(*id) {
                zone.price = *price;
            }
        }
        self.snapshot.strategies = self.pending.strategies;
        let result = econ::period_result(&self.params, &self.snapshot)?;
        self.snapshot.last_result = result;
        debug!(
            day = self.snapshot.day,
            period = ?self.snapshot.period,
            net = %result.net,
            "inputs applied"
        );
        Ok(result)
    }

    /// Stage every field of `inputs` and commit them in one step. If any
    /// price is rejected nothing is staged.
    pub fn submit_inputs(&mut self, inputs: &PlayerInputs) -> Result<PeriodResult, EngineError> {
        self.require("submit_inputs", GamePhase::Playing)?;
        let staged = inputs
            .prices
            .iter()
            .map(|(zone, price)| self.checked_price(*zone, *price).map(|p| (*zone, p)))
            .collect::<Result<BTreeMap<_, _>, EngineError>>()?;
        self.pending.prices.extend(staged);
        self.pending.strategies = inputs.strategies;
        self.apply_inputs()
    }

    /// Settle the current period and move to the next one.
    ///
    /// The result is computed fresh from the committed snapshot and added to
    /// the cumulative totals. Wrapping past night closes the day: a
    /// [`DaySummary`] is recorded, weather is redrawn, strategies reset,
    /// optimal counts drift, and the phase becomes `DaySummary`. Staged
    /// inputs are re-synced to the committed prices afterwards.
    pub fn advance_time(&mut self) -> Result<PeriodResult, EngineError> {
        self.require("advance_time", GamePhase::Playing)?;
        let result = econ::period_result(&self.params, &self.snapshot)?;
        self.snapshot.totals.add(&result);
        self.snapshot.last_result = result;
        debug!(
            day = self.snapshot.day,
            period = ?self.snapshot.period,
            revenue = %result.revenue,
            cost = %result.cost,
            penalty = %result.penalty,
            "period settled"
        );
        self.snapshot.period = self.snapshot.period.next();
        if self.snapshot.period == TimePeriod::MorningPeak {
            self.close_day(&result);
        }
        self.pending = PlayerInputs::from_snapshot(&self.snapshot);
        Ok(result)
    }

    fn close_day(&mut self, final_period: &PeriodResult) {
        let snap = &mut self.snapshot;
        let prior = snap.history.iter().fold(Totals::default(), |mut acc, d| {
            acc.revenue += d.revenue;
            acc.cost += d.cost;
            acc.penalty += d.penalty;
            acc
        });
        let summary = DaySummary {
            day: snap.day,
            revenue: snap.totals.revenue - prior.revenue,
            cost: snap.totals.cost - prior.cost,
            penalty: snap.totals.penalty - prior.penalty,
            net: final_period.net,
            weather: snap.weather,
        };
        info!(
            day = summary.day,
            weather = %summary.weather,
            revenue = %summary.revenue,
            net = %summary.net,
            "day closed"
        );
        snap.history.push(summary);
        snap.day += 1;

        snap.weather = Weather::ALL[self.weather_dist.sample(&mut self.rng)];
        snap.strategies.clear();

        let ops = &self.params.operations;
        let jitter = i64::from(ops.optimal_jitter);
        let (lo, hi) = (i64::from(ops.optimal_min), i64::from(ops.optimal_max));
        for zone in &mut snap.zones {
            let delta = self.rng.gen_range(-jitter..=jitter);
            // lo and hi come from u32 bounds, so the cast is lossless
            zone.optimal = (i64::from(zone.optimal) + delta).clamp(lo, hi) as u32;
        }
        debug!(weather = %snap.weather, "next day drawn");
        self.set_phase(GamePhase::DaySummary);
    }

    /// Dismiss the day summary and keep playing.
    pub fn continue_to_next_day(&mut self) -> Result<(), EngineError> {
        self.require("continue_to_next_day", GamePhase::DaySummary)?;
        self.set_phase(GamePhase::Playing);
        Ok(())
    }

    /// Go back to the cover screen. Snapshot data is kept; see [`Engine::reset`].
    pub fn return_to_cover(&mut self) -> Result<(), EngineError> {
        self.require("return_to_cover", GamePhase::DaySummary)?;
        self.set_phase(GamePhase::Cover);
        Ok(())
    }

    /// Rebuild the snapshot from parameters, back on the cover screen. The
    /// random stream is not rewound.
    pub fn reset(&mut self) {
        self.snapshot = SimulationSnapshot::initial(&self.params);
        self.pending = PlayerInputs::from_snapshot(&self.snapshot);
        info!("simulation reset");
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn snapshot(&self) -> &SimulationSnapshot {
        &self.snapshot
    }

    pub fn phase(&self) -> GamePhase {
        self.snapshot.phase
    }

    pub fn day(&self) -> u32 {
        self.snapshot.day
    }

    pub fn period(&self) -> TimePeriod {
        self.snapshot.period
    }

    pub fn weather(&self) -> Weather {
        self.snapshot.weather
    }

    /// Committed strategy flags.
    pub fn strategies(&self) -> StrategyFlags {
        self.snapshot.strategies
    }

    pub fn zones(&self) -> &[Zone] {
        &self.snapshot.zones
    }

    /// Zones with their current demand, as the zone panel shows them.
    pub fn zone_views(&self) -> Vec<ZoneView> {
        self.snapshot
            .zones
            .iter()
            .map(|z| {
                let demand = econ::demand(&self.params, &self.snapshot, z);
                ZoneView {
                    id: z.id,
                    name: z.id.name(),
                    price: z.price,
                    bikes: z.bikes,
                    optimal: z.optimal,
                    demand,
                    rating: econ::demand_rating(demand),
                }
            })
            .collect()
    }

    pub fn last_result(&self) -> PeriodResult {
        self.snapshot.last_result
    }

    pub fn totals(&self) -> Totals {
        self.snapshot.totals
    }

    pub fn history(&self) -> &[DaySummary] {
        &self.snapshot.history
    }

    /// Most recently closed day.
    pub fn latest_summary(&self) -> Option<&DaySummary> {
        self.snapshot.history.last()
    }

    /// Edits staged since the last commit.
    pub fn pending(&self) -> &PlayerInputs {
        &self.pending
    }
}

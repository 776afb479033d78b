#![deny(warnings)]

//! Headless CLI: plays a fixed pricing policy for a number of days and
//! prints each day summary with its economics analysis.

use anyhow::{bail, Context, Result};
use bike_core::{DaySummary, SimParams, Strategy, TimePeriod, Totals, ZoneId};
use bike_econ::{analyze_day, DayAnalysis};
use bike_runtime::{Engine, PlayerInputs};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: bike-cli [--config FILE] [--seed N] [--days N] \
[--price ZONE=VALUE]... [--strategy NAME]... [--json]";

#[derive(Debug, PartialEq)]
struct CliArgs {
    config: Option<PathBuf>,
    seed: Option<u64>,
    days: u32,
    prices: Vec<(ZoneId, f64)>,
    strategies: Vec<Strategy>,
    json: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            config: None,
            seed: None,
            days: 3,
            prices: Vec::new(),
            strategies: Vec::new(),
            json: false,
        }
    }
}

fn next_value(it: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    it.next()
        .with_context(|| format!("{flag} expects a value\n{USAGE}"))
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => out.config = Some(PathBuf::from(next_value(&mut it, "--config")?)),
            "--seed" => {
                let v = next_value(&mut it, "--seed")?;
                out.seed = Some(v.parse().with_context(|| format!("invalid seed: {v}"))?);
            }
            "--days" => {
                let v = next_value(&mut it, "--days")?;
                out.days = v.parse().with_context(|| format!("invalid day count: {v}"))?;
            }
            "--price" => {
                let v = next_value(&mut it, "--price")?;
                let (zone, price) = v
                    .split_once('=')
                    .with_context(|| format!("--price expects ZONE=VALUE, got {v}"))?;
                let price: f64 = price
                    .parse()
                    .with_context(|| format!("invalid price: {price}"))?;
                out.prices.push((zone.parse()?, price));
            }
            "--strategy" => out.strategies.push(next_value(&mut it, "--strategy")?.parse()?),
            "--json" => out.json = true,
            other => bail!("unknown argument: {other}\n{USAGE}"),
        }
    }
    Ok(out)
}

fn load_params(path: &Path) -> Result<SimParams> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// Inputs re-submitted every period; strategies reset at each day boundary.
fn policy(args: &CliArgs) -> PlayerInputs {
    let inputs = args
        .prices
        .iter()
        .fold(PlayerInputs::default(), |acc, (zone, price)| {
            acc.with_price(*zone, *price)
        });
    args.strategies
        .iter()
        .fold(inputs, |acc, s| acc.with_strategy(*s))
}

#[derive(Debug, Serialize)]
struct DayReport {
    #[serde(flatten)]
    summary: DaySummary,
    analysis: DayAnalysis,
}

#[derive(Debug, Serialize)]
struct Report {
    days: Vec<DayReport>,
    totals: Totals,
    net: Decimal,
}

fn run(args: &CliArgs) -> Result<Report> {
    let mut params = match &args.config {
        Some(path) => load_params(path)?,
        None => SimParams::default(),
    };
    if let Some(seed) = args.seed {
        params.rng_seed = seed;
    }
    let mut engine = Engine::new(params)?;
    let inputs = policy(args);
    engine.start()?;

    let mut days = Vec::with_capacity(args.days as usize);
    for _ in 0..args.days {
        for period in TimePeriod::ALL {
            let result = engine.submit_inputs(&inputs)?;
            debug!(%period, net = %result.net, "policy applied");
            engine.advance_time()?;
        }
        let summary = engine
            .latest_summary()
            .cloned()
            .context("day closed without a summary")?;
        days.push(DayReport {
            analysis: analyze_day(&summary),
            summary,
        });
        engine.continue_to_next_day()?;
    }

    let totals = engine.totals();
    Ok(Report {
        days,
        net: totals.net(),
        totals,
    })
}

fn print_report(report: &Report) {
    for d in &report.days {
        let s = &d.summary;
        println!(
            "Day {} | weather: {} | revenue: {:.1} | cost: {:.1} | penalty: {:.1} | net: {:.1}",
            s.day, s.weather, s.revenue, s.cost, s.penalty, s.net
        );
        for line in d.analysis.message() {
            println!("  {line}");
        }
    }
    let t = &report.totals;
    println!(
        "Totals | revenue: {:.1} | cost: {:.1} | penalty: {:.1} | net: {:.1}",
        t.revenue, t.cost, t.penalty, report.net
    );
}

fn main() -> Result<()> {
    // Logs go to stderr so --json output stays machine-readable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    info!(?args, "starting simulation");

    let report = run(&args)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bike_core::{validate_params, Weather};

    fn args(list: &[&str]) -> Result<CliArgs> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_full_command_line() {
        let a = args(&[
            "--seed",
            "9",
            "--days",
            "2",
            "--price",
            "commercial=3.5",
            "--price",
            "University=1.5",
            "--strategy",
            "night-discount",
            "--json",
        ])
        .unwrap();
        assert_eq!(a.seed, Some(9));
        assert_eq!(a.days, 2);
        assert_eq!(
            a.prices,
            vec![(ZoneId::Commercial, 3.5), (ZoneId::University, 1.5)]
        );
        assert_eq!(a.strategies, vec![Strategy::NightDiscount]);
        assert!(a.json);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(args(&["--days"]).is_err());
        assert!(args(&["--price", "commercial"]).is_err());
        assert!(args(&["--price", "harbour=2.0"]).is_err());
        assert!(args(&["--strategy", "free-rides"]).is_err());
        assert!(args(&["--fast"]).is_err());
        assert_eq!(args(&[]).unwrap(), CliArgs::default());
    }

    #[test]
    fn runs_requested_days() {
        let a = args(&["--days", "2", "--strategy", "peak-surcharge"]).unwrap();
        let report = run(&a).unwrap();
        assert_eq!(report.days.len(), 2);
        assert_eq!(report.days[0].summary.day, 1);
        assert_eq!(report.days[1].summary.day, 2);
        let revenue: Decimal = report.days.iter().map(|d| d.summary.revenue).sum();
        assert_eq!(revenue, report.totals.revenue);
        assert_eq!(report.net, report.totals.net());
        // 100 per period for the surcharge alone
        assert!(report.days[0].summary.cost >= Decimal::new(400, 0));

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["days"][0]["analysis"].is_string());
        assert_eq!(json["days"][1]["day"], 2);
    }

    #[test]
    fn prints_text_report() {
        let report = run(&args(&["--days", "1"]).unwrap()).unwrap();
        print_report(&report);
    }

    #[test]
    fn same_seed_same_report() {
        let a = args(&["--days", "4", "--seed", "11"]).unwrap();
        let first = serde_json::to_string(&run(&a).unwrap()).unwrap();
        let second = serde_json::to_string(&run(&a).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn bundled_scenarios_parse() {
        let classroom: SimParams =
            serde_yaml::from_str(include_str!("../../../assets/scenarios/classroom.yaml"))
                .unwrap();
        validate_params(&classroom).unwrap();
        assert_eq!(classroom, SimParams::default());

        let rainy: SimParams =
            serde_yaml::from_str(include_str!("../../../assets/scenarios/rainy_season.yaml"))
                .unwrap();
        validate_params(&rainy).unwrap();
        assert_eq!(rainy.weather.rain_weight, 0.6);
        assert_eq!(rainy.weather.rain_factor, 0.6);
        assert_eq!(rainy.operations.optimal_jitter, 5);
        assert_eq!(rainy.zones.len(), 3);
        assert_eq!(rainy.weather.factor(Weather::Rain, TimePeriod::Night), 0.6);
    }

    #[test]
    fn loads_config_from_disk() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../assets/scenarios/rainy_season.yaml");
        let params = load_params(&path).unwrap();
        assert_eq!(params.rng_seed, 2024);
        assert!(load_params(Path::new("does/not/exist.yaml")).is_err());
    }
}

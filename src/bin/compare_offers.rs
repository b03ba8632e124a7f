//! Quote every offer on an offer sheet across a grid of loan sizes and durations
//!
//! Usage: cargo run --bin compare_offers -- [--sheet data/sample_offers.csv] [--output offer_quotes.csv]

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::time::Instant;

use lending_engine::catalog::{load_offers, OfferFilter, DEFAULT_OFFER_SHEET_PATH};
use lending_engine::fees::OfferQuote;
use lending_engine::{CostCalculator, EngineConfig, ScheduleCalculator};

#[derive(Parser)]
#[command(name = "compare_offers", about = "Rank offer-sheet offers by APR-equivalent")]
struct Cli {
    #[arg(long, default_value = DEFAULT_OFFER_SHEET_PATH)]
    sheet: PathBuf,

    #[arg(long, default_value = "offer_quotes.csv")]
    output: PathBuf,

    /// Engine configuration (JSON) supplying the fee schedule
    #[arg(long)]
    config: Option<PathBuf>,
}

const PRINCIPALS: [Decimal; 5] = [dec!(1000), dec!(3000), dec!(5000), dec!(10000), dec!(20000)];
const DURATIONS: [u32; 5] = [60, 90, 180, 365, 730];

/// One row of the output sheet
#[derive(Debug, serde::Serialize)]
struct QuoteRow {
    principal: Decimal,
    duration: u32,
    rank: usize,
    offer_id: String,
    lender_id: String,
    interest_rate: Decimal,
    installments: u32,
    first_payment: Decimal,
    total_interest: Decimal,
    total_cost: Decimal,
    apr_equivalent: Decimal,
}

impl QuoteRow {
    fn new(principal: Decimal, duration: u32, rank: usize, quote: &OfferQuote) -> Self {
        let d = &quote.disclosure;
        Self {
            principal,
            duration,
            rank,
            offer_id: quote.offer_id.clone(),
            lender_id: quote.lender_id.clone(),
            interest_rate: quote.interest_rate,
            installments: d.installments,
            first_payment: d.monthly_payment,
            total_interest: d.total_interest,
            total_cost: d.total_cost,
            apr_equivalent: d.apr_equivalent,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_path(path)?,
        None => EngineConfig::default(),
    };
    let costs = CostCalculator::new(config.fees.clone(), ScheduleCalculator::new(config.amortization));

    let start = Instant::now();
    let offers = load_offers(&cli.sheet, Utc::now())
        .with_context(|| format!("loading offer sheet {}", cli.sheet.display()))?;
    let active = offers.iter().filter(|o| OfferFilter::active().matches(o)).count();
    println!("Loaded {} offers ({} active) in {:?}", offers.len(), active, start.elapsed());

    let grid: Vec<(Decimal, u32)> = PRINCIPALS
        .iter()
        .flat_map(|&p| DURATIONS.iter().map(move |&d| (p, d)))
        .collect();

    let quote_start = Instant::now();
    let results: Vec<(Decimal, u32, Vec<OfferQuote>)> = grid
        .par_iter()
        .map(|&(principal, duration)| (principal, duration, costs.compare(&offers, principal, duration)))
        .collect();
    println!("Quoted {} scenarios in {:?}", results.len(), quote_start.elapsed());

    let mut writer = csv::Writer::from_path(&cli.output)
        .with_context(|| format!("creating {}", cli.output.display()))?;
    let mut rows = 0;
    for (principal, duration, quotes) in &results {
        for (idx, quote) in quotes.iter().enumerate() {
            writer.serialize(QuoteRow::new(*principal, *duration, idx + 1, quote))?;
            rows += 1;
        }
    }
    writer.flush()?;

    println!("\n{:>10} {:>6} {:>16} {:>8} {:>10}", "Principal", "Days", "Best offer", "Rate", "APR eq.");
    println!("{}", "-".repeat(54));
    for (principal, duration, quotes) in &results {
        match quotes.first() {
            Some(best) => println!(
                "{:>10} {:>6} {:>16} {:>7}% {:>9}%",
                principal, duration, best.offer_id, best.interest_rate, best.disclosure.apr_equivalent
            ),
            None => println!("{:>10} {:>6} {:>16}", principal, duration, "no offer"),
        }
    }

    println!("\n{} quotes written to: {}", rows, cli.output.display());
    Ok(())
}

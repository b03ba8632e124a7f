//! Lending Engine CLI
//!
//! Command-line interface for schedules, cost disclosures, risk scoring,
//! compliance checks and end-to-end origination against a file store

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lending_engine::compliance::{ComplianceTable, TermsUnderTest};
use lending_engine::contract::{NegotiatedTerms, Party};
use lending_engine::risk::{BorrowerProfile, EmploymentStatus, RiskModel, StaticRiskSource};
use lending_engine::schedule::{AmortizationMethod, InstallmentFrequency, RepaymentType};
use lending_engine::{
    ComplianceValidator, CostCalculator, EngineConfig, JsonFileStore, LendingEngine, NewOffer,
    NewRequest, ScheduleCalculator, ScheduleTerms,
};

#[derive(Parser)]
#[command(name = "lending-engine", about = "Peer-to-peer lending contract engine")]
#[command(version)]
struct Cli {
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the repayment schedule for a set of terms
    Schedule(TermsArgs),

    /// Print the cost disclosure (fees, total cost, APR-equivalent)
    Cost(TermsArgs),

    /// Score a borrower profile
    Risk(RiskArgs),

    /// Check terms against a jurisdiction's ceilings
    Check(CheckArgs),

    /// Create an offer, submit a request and originate a contract in a file store
    Originate(OriginateArgs),
}

#[derive(Args)]
struct TermsArgs {
    #[arg(long)]
    principal: Decimal,

    /// Annual percentage
    #[arg(long)]
    rate: Decimal,

    /// Days
    #[arg(long)]
    duration: u32,

    #[arg(long, value_enum, default_value_t = RepaymentArg::Installments)]
    repayment: RepaymentArg,

    #[arg(long, value_enum, default_value_t = FrequencyArg::Monthly)]
    frequency: FrequencyArg,

    /// Overrides the configured amortization method
    #[arg(long, value_enum)]
    method: Option<MethodArg>,
}

#[derive(Args)]
struct RiskArgs {
    #[arg(long, default_value = "cli-borrower")]
    borrower_id: String,

    #[arg(long)]
    credit_score: u16,

    #[arg(long)]
    income_verified: bool,

    #[arg(long, value_enum, default_value_t = EmploymentArg::Employed)]
    employment: EmploymentArg,

    /// Debt-to-income ratio, 0..1
    #[arg(long, default_value_t = 0.0)]
    dti: f64,

    #[arg(long, default_value_t = 0)]
    defaults: u32,

    #[arg(long)]
    age: Option<u8>,
}

#[derive(Args)]
struct CheckArgs {
    #[arg(long)]
    jurisdiction: String,

    /// Annual percentage
    #[arg(long)]
    rate: Decimal,

    #[arg(long)]
    amount: Decimal,

    #[arg(long, default_value_t = Decimal::ZERO)]
    penalty_rate: Decimal,

    #[arg(long)]
    age: Option<u8>,
}

#[derive(Args)]
struct OriginateArgs {
    /// Directory holding the JSON collections
    #[arg(long, default_value = "lending_store")]
    store: PathBuf,

    /// New offer (JSON)
    #[arg(long)]
    offer: PathBuf,

    /// New request (JSON)
    #[arg(long)]
    request: PathBuf,

    /// Borrower profile used as the risk source (JSON)
    #[arg(long)]
    profile: PathBuf,

    /// Record both signatures after origination
    #[arg(long)]
    sign: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum RepaymentArg {
    LumpSum,
    Installments,
}

impl From<RepaymentArg> for RepaymentType {
    fn from(arg: RepaymentArg) -> Self {
        match arg {
            RepaymentArg::LumpSum => RepaymentType::LumpSum,
            RepaymentArg::Installments => RepaymentType::Installments,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FrequencyArg {
    Weekly,
    Biweekly,
    Monthly,
}

impl From<FrequencyArg> for InstallmentFrequency {
    fn from(arg: FrequencyArg) -> Self {
        match arg {
            FrequencyArg::Weekly => InstallmentFrequency::Weekly,
            FrequencyArg::Biweekly => InstallmentFrequency::Biweekly,
            FrequencyArg::Monthly => InstallmentFrequency::Monthly,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Standard,
    LinearBalance,
}

impl From<MethodArg> for AmortizationMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Standard => AmortizationMethod::Standard,
            MethodArg::LinearBalance => AmortizationMethod::LinearBalance,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum EmploymentArg {
    Employed,
    SelfEmployed,
    Retired,
    Student,
    Unemployed,
}

impl From<EmploymentArg> for EmploymentStatus {
    fn from(arg: EmploymentArg) -> Self {
        match arg {
            EmploymentArg::Employed => EmploymentStatus::Employed,
            EmploymentArg::SelfEmployed => EmploymentStatus::SelfEmployed,
            EmploymentArg::Retired => EmploymentStatus::Retired,
            EmploymentArg::Student => EmploymentStatus::Student,
            EmploymentArg::Unemployed => EmploymentStatus::Unemployed,
        }
    }
}

impl TermsArgs {
    fn terms(&self) -> ScheduleTerms {
        ScheduleTerms {
            principal: self.principal,
            annual_rate: self.rate,
            duration: self.duration,
            repayment_type: self.repayment.into(),
            frequency: self.frequency.into(),
        }
    }

    fn method(&self, config: &EngineConfig) -> AmortizationMethod {
        self.method.map(Into::into).unwrap_or(config.amortization)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_json_path(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn load_table(config: &EngineConfig) -> Result<ComplianceTable> {
    match &config.jurisdictions_path {
        Some(path) => ComplianceTable::from_csv_path(path)
            .with_context(|| format!("loading jurisdictions {}", path.display())),
        None => Ok(ComplianceTable::default_table()),
    }
}

fn run_schedule(args: &TermsArgs, config: &EngineConfig) -> Result<()> {
    let calculator = ScheduleCalculator::new(args.method(config));
    let schedule = calculator.build(&args.terms(), chrono::Utc::now())?;

    println!("{:>4} {:>12} {:>14} {:>12} {:>12}", "#", "Due", "Amount", "Principal", "Interest");
    println!("{}", "-".repeat(58));
    for entry in schedule.entries() {
        println!(
            "{:>4} {:>12} {:>14} {:>12} {:>12}",
            entry.installment_number,
            entry.due_date.format("%Y-%m-%d"),
            entry.amount,
            entry.principal,
            entry.interest,
        );
    }
    println!("{}", "-".repeat(58));
    println!(
        "{:>4} {:>12} {:>14} {:>12} {:>12}",
        "",
        "",
        schedule.total_amount(),
        schedule.total_principal(),
        schedule.total_interest()
    );
    Ok(())
}

fn run_cost(args: &TermsArgs, config: &EngineConfig) -> Result<()> {
    let costs = CostCalculator::new(config.fees.clone(), ScheduleCalculator::new(args.method(config)));
    let disclosure = costs.disclose(&args.terms())?;
    println!("{}", serde_json::to_string_pretty(&disclosure)?);
    Ok(())
}

fn run_risk(args: &RiskArgs) -> Result<()> {
    let profile = BorrowerProfile {
        borrower_id: args.borrower_id.clone(),
        credit_score: args.credit_score,
        income_verified: args.income_verified,
        employment_status: args.employment.into(),
        debt_to_income_ratio: args.dti,
        previous_defaults: args.defaults,
        age: args.age,
    };
    let assessment = RiskModel::default().assess(&profile, chrono::Utc::now());
    println!("{}", serde_json::to_string_pretty(&assessment)?);
    Ok(())
}

fn run_check(args: &CheckArgs, config: &EngineConfig) -> Result<()> {
    let validator = ComplianceValidator::new(load_table(config)?);
    let jurisdiction = args.jurisdiction.trim().to_uppercase();

    validator.check_terms(
        &jurisdiction,
        &TermsUnderTest {
            interest_rate: args.rate,
            amount: args.amount,
            penalty_rate: args.penalty_rate,
        },
    )?;
    validator.check_borrower_age(&jurisdiction, args.age)?;

    let rules = validator.rules(&jurisdiction)?;
    println!(
        "{}: compliant (cap {}%, max amount {}, penalty cap {}%, cooling-off {}h)",
        rules.code,
        rules.max_interest_rate,
        rules.max_loan_amount,
        rules.max_penalty_rate(),
        rules.cooling_off_period_hours
    );
    Ok(())
}

fn run_originate(args: &OriginateArgs, config: EngineConfig) -> Result<()> {
    let new_offer: NewOffer = read_json(&args.offer)?;
    let new_request: NewRequest = read_json(&args.request)?;
    let profile: BorrowerProfile = read_json(&args.profile)?;

    if profile.borrower_id != new_request.borrower_id {
        bail!(
            "profile is for {}, request is from {}",
            profile.borrower_id,
            new_request.borrower_id
        );
    }

    let store = JsonFileStore::open(&args.store)?;
    let source = StaticRiskSource::new(RiskModel::default()).with_profile(profile);
    let engine = LendingEngine::from_config(store, config)?.with_risk_source(Arc::new(source));

    let offer = engine.create_offer(new_offer)?;
    let request = engine.submit_request(new_request)?;
    let mut contract = engine.originate(&offer.id, &request.id, &NegotiatedTerms::default())?;

    if args.sign {
        engine.sign(&contract.id, Party::Lender)?;
        contract = engine.sign(&contract.id, Party::Borrower)?;
    }

    info!("Contract {} written to {}", contract.id, args.store.display());
    println!("{}", serde_json::to_string_pretty(&contract)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Schedule(args) => run_schedule(args, &config),
        Commands::Cost(args) => run_cost(args, &config),
        Commands::Risk(args) => run_risk(args),
        Commands::Check(args) => run_check(args, &config),
        Commands::Originate(args) => run_originate(args, config),
    }
}

use crate::infra::{cli_scope, load_portfolio, parse_decimal, parse_portfolio, CLI_OPERATOR};
use clap::Args;
use proprieto::config::{AppConfig, FiscalConfig};
use proprieto::error::AppError;
use proprieto::workflows::fiscal::{
    write_d212_csv, AccessContext, Address, Currency, FiscalSummary, FiscalSummaryService,
    InMemoryPortfolioRepository, NewContract, NewProperty, OwnerId, OwnerShare, PaymentFrequency,
    PropertyId, SummaryScope, Tenant,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_PORTFOLIO: &str = include_str!("../../../demos/portfolio.json");

/// Inputs shared by the `fiscal` subcommands.
#[derive(Args, Debug)]
pub(crate) struct ScopeArgs {
    /// JSON portfolio dump (`properties`, `ownerships`, `contracts`)
    #[arg(long)]
    pub(crate) portfolio: PathBuf,
    /// Fiscal year to report (defaults to APP_FISCAL_YEAR)
    #[arg(long)]
    pub(crate) year: Option<i32>,
    /// RON value of one unit of foreign currency, applied to every EUR/USD lease
    #[arg(long, value_parser = parse_decimal)]
    pub(crate) exchange_rate: Decimal,
    /// Restrict the report to one owner's shares
    #[arg(long)]
    pub(crate) owner: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct SummaryArgs {
    #[command(flatten)]
    pub(crate) scope: ScopeArgs,
    /// Print the summary as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    #[command(flatten)]
    pub(crate) scope: ScopeArgs,
    /// Destination file (defaults to stdout)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Fiscal year to report
    #[arg(long, default_value_t = 2025)]
    pub(crate) year: i32,
    /// RON value of one EUR
    #[arg(long, value_parser = parse_decimal, default_value = "4.97")]
    pub(crate) exchange_rate: Decimal,
    /// Skip the ownership editing walkthrough
    #[arg(long)]
    pub(crate) skip_ownership: bool,
}

pub(crate) fn run_fiscal_summary(args: SummaryArgs) -> Result<(), AppError> {
    let summary = summary_from_args(args.scope)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        render_summary(&summary);
    }
    Ok(())
}

pub(crate) fn run_fiscal_export(args: ExportArgs) -> Result<(), AppError> {
    let summary = summary_from_args(args.scope)?;
    match args.output {
        Some(path) => {
            let file = BufWriter::new(File::create(&path)?);
            write_d212_csv(file, &summary)?;
            eprintln!(
                "Wrote {} D212 rows to {}",
                summary.breakdown.len(),
                path.display()
            );
        }
        None => write_d212_csv(io::stdout().lock(), &summary)?,
    }
    Ok(())
}

fn summary_from_args(args: ScopeArgs) -> Result<FiscalSummary, AppError> {
    let config = AppConfig::load()?;
    let repository = load_portfolio(&args.portfolio)?;
    let service = FiscalSummaryService::new(Arc::new(repository), &config.fiscal)?;

    let (ctx, scope) = cli_scope(args.owner);
    let year = args.year.unwrap_or_else(|| service.default_fiscal_year());
    Ok(service.compute_fiscal_summary(&ctx, scope, year, args.exchange_rate)?)
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        year,
        exchange_rate,
        skip_ownership,
    } = args;

    let repository = InMemoryPortfolioRepository::from_snapshot(parse_portfolio(DEMO_PORTFOLIO)?);
    let service = FiscalSummaryService::new(Arc::new(repository), &FiscalConfig::default())?;
    let operator = AccessContext::admin(CLI_OPERATOR);

    println!("Proprieto fiscal demo");
    let summary =
        service.compute_fiscal_summary(&operator, SummaryScope::AllContracts, year, exchange_rate)?;
    render_summary(&summary);

    for owner_id in summary.owner_totals.keys() {
        let ctx = AccessContext::owner(owner_id.0.clone());
        let own = service.compute_fiscal_summary(
            &ctx,
            SummaryScope::Owner(owner_id.clone()),
            year,
            exchange_rate,
        )?;
        println!(
            "\nOwner {}: gross {:.2} RON | income tax {:.2} | CASS {:.2} (tier {}) | total {:.2}",
            owner_id,
            own.result.gross_income,
            own.result.income_tax,
            own.result.cass,
            own.result.cass_tier.level(),
            own.result.total_tax
        );
        println!("  {}", own.result.explanation);
    }

    if skip_ownership {
        return Ok(());
    }

    println!("\nCo-ownership walkthrough");
    let ana = AccessContext::owner("ana");
    let allocator = service.allocator();
    let property_id = allocator.create_co_owned_property(
        &ana,
        demo_property(),
        vec![
            OwnerShare {
                owner_id: OwnerId("ana".to_string()),
                percent: dec!(50),
            },
            OwnerShare {
                owner_id: OwnerId("mihai".to_string()),
                percent: dec!(50),
            },
        ],
    )?;
    println!("- Registered {property_id} held 50/50 by ana and mihai");

    let change = allocator.add_owner(&ana, &property_id, &OwnerId("ioana".to_string()), dec!(10))?;
    println!(
        "- Added ioana with 10%: shares now total {}%",
        change.total_percent
    );
    for warning in &change.warnings {
        println!("  warning: {warning}");
    }

    let change = allocator.update_owner_percent(
        &ana,
        &property_id,
        &OwnerId("mihai".to_string()),
        dec!(40),
    )?;
    println!(
        "- Reduced mihai to 40%: shares total {}% ({} warnings)",
        change.total_percent,
        change.warnings.len()
    );

    let registration = service.register_contract(&ana, demo_contract(&property_id, year))?;
    println!(
        "- Leased {} to {} from {}",
        property_id,
        registration.contract.tenant.name,
        registration.contract.start_date.as_deref().unwrap_or("?")
    );

    let ana_scope = SummaryScope::Owner(OwnerId("ana".to_string()));
    let updated = service.compute_fiscal_summary(&ana, ana_scope, year, exchange_rate)?;
    println!(
        "- ana now declares {:.2} RON gross and owes {:.2} RON",
        updated.result.gross_income, updated.result.total_tax
    );

    match service.compute_fiscal_summary(
        &ana,
        SummaryScope::Owner(OwnerId("radu".to_string())),
        year,
        exchange_rate,
    ) {
        Ok(_) => println!("- Unexpected: ana could read radu's summary"),
        Err(err) => println!("- ana asking for radu's figures: {err}"),
    }

    Ok(())
}

fn demo_property() -> NewProperty {
    NewProperty {
        name: "Apartament Tractorul".to_string(),
        address: Address {
            street: Some("Zizinului".to_string()),
            number: Some("3".to_string()),
            locality: "Brasov".to_string(),
            county: "Brasov".to_string(),
            postal_code: None,
        },
        rooms: 2,
    }
}

fn demo_contract(property_id: &PropertyId, year: i32) -> NewContract {
    let start_date = chrono::NaiveDate::from_ymd_opt(year, 6, 1).unwrap_or_default();
    NewContract {
        property_id: property_id.clone(),
        tenant: Tenant {
            name: "Andrei Matei".to_string(),
            ..Tenant::default()
        },
        monthly_rent: dec!(1800),
        currency: Currency::Ron,
        payment_frequency: PaymentFrequency::Monthly,
        start_date,
        end_date: None,
        document_ref: None,
        deposit: Some(dec!(1800)),
    }
}

pub(crate) fn render_summary(summary: &FiscalSummary) {
    let scope = match &summary.scope {
        SummaryScope::AllContracts => "all owners".to_string(),
        SummaryScope::Owner(owner_id) => format!("owner {owner_id}"),
    };
    let mut out = io::stdout().lock();
    report_write_failure(write_summary(&mut out, summary, &scope));
}

/// Broken pipes (e.g. `| head`) end the report quietly; other failures are reported.
fn report_write_failure(result: io::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => false,
        Err(err) => {
            eprintln!("failed to write fiscal summary: {err}");
            false
        }
    }
}

fn write_summary(out: &mut impl Write, summary: &FiscalSummary, scope: &str) -> io::Result<()> {
    writeln!(
        out,
        "ANAF D212 summary for {} ({scope}), exchange rate {}",
        summary.fiscal_year, summary.exchange_rate
    )?;
    writeln!(out, "Contracts:")?;
    if summary.breakdown.is_empty() {
        writeln!(out, "  (none active)")?;
    }
    for line in &summary.breakdown {
        writeln!(
            out,
            "  - {} {} | {} | owner {} {}% | {} months x {:.2} {} ({}) -> {:.2} RON",
            line.contract_id,
            line.property_name,
            line.tenant_name,
            line.owner_id,
            line.share_percent,
            line.active_months,
            line.monthly_rent,
            line.currency.code(),
            line.payment_frequency.label(),
            line.gross_income
        )?;
    }

    let result = &summary.result;
    writeln!(out, "Gross income:      {:>14.2} RON", result.gross_income)?;
    writeln!(out, "Net income (80%):  {:>14.2} RON", result.net_income)?;
    writeln!(out, "Income tax (10%):  {:>14.2} RON", result.income_tax)?;
    writeln!(
        out,
        "CASS (tier {}):     {:>14.2} RON",
        result.cass_tier.level(),
        result.cass
    )?;
    writeln!(out, "Total due:         {:>14.2} RON", result.total_tax)?;
    writeln!(out, "{}", result.explanation)?;

    if !summary.warnings.is_empty() {
        writeln!(out, "Warnings:")?;
        for warning in &summary.warnings {
            let marker = if warning.excluded { "excluded" } else { "note" };
            writeln!(out, "  - [{marker}] {}: {}", warning.entity, warning.message)?;
        }
    }
    Ok(())
}

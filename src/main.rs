use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context};
use practice_payroll::config::{Config, DatabaseConfig};
use practice_payroll::core::PayPeriod;
use practice_payroll::modules::advances::MySqlAdvanceRepository;
use practice_payroll::modules::employees::MySqlEmployeeDirectory;
use practice_payroll::modules::payroll::{MySqlPayrollRepository, PayrollService};
use practice_payroll::modules::reports::services::{csv_export, document};
use practice_payroll::modules::reports::ReportService;
use practice_payroll::modules::taxes::TaxTableRegistry;
use practice_payroll::modules::ytd::{MySqlYtdRepository, YtdService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "\
usage: practice-payroll <command> [args] [--text]

commands:
  migrate
  tax-tables
  generate     <practice_id> <YYYY-MM>
  process      <run_id>
  mark-paid    <run_id>
  verify-ytd   <practice_id> <YYYY/YYYY>
  declaration  <practice_id> <YYYY-MM>
  reconcile    <practice_id> <YYYY/YYYY>
  certificate  <practice_id> <employee_id> <YYYY/YYYY>
  payslip      <run_id> <employee_id>";

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("practice_payroll={},sqlx=warn", config.app.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.app.json_logs() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .with_context(|| format!("missing argument <{}>\n\n{}", name, USAGE))
}

fn emit(output: String) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    init_tracing(&config);

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let text = match args.iter().position(|a| a == "--text") {
        Some(index) => {
            args.remove(index);
            true
        }
        None => false,
    };
    let command = match args.first() {
        Some(command) => command.clone(),
        None => bail!("{}", USAGE),
    };

    tracing::info!(
        command = command.as_str(),
        environment = config.app.env.as_str(),
        workers = config.payroll.workers,
        "Starting practice payroll"
    );

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.payroll.workers)
        .build_global()
        .context("Failed to build calculation thread pool")?;

    let mut registry = TaxTableRegistry::with_builtin().context("Built-in tax tables are invalid")?;
    if let Some(dir) = &config.payroll.tax_table_dir {
        let published = registry
            .load_dir(dir)
            .with_context(|| format!("Failed to load tax tables from {}", dir.display()))?;
        tracing::info!(directory = %dir.display(), published, "Loaded tax tables");
    }

    if command == "tax-tables" {
        return emit(registry.ids().join("\n") + "\n");
    }

    let pool = config
        .database
        .create_pool()
        .await
        .context("Failed to create database pool")?;
    tracing::info!(
        pool_size = config.database.pool_size,
        max_connections = config.database.max_connections,
        "Database pool initialized"
    );

    if command == "migrate" {
        DatabaseConfig::run_migrations(&pool).await?;
        tracing::info!("Migrations applied");
        return Ok(());
    }

    let payroll_repository = Arc::new(MySqlPayrollRepository::new(pool.clone()));
    let ytd_repository = Arc::new(MySqlYtdRepository::new(pool.clone()));
    let directory = Arc::new(MySqlEmployeeDirectory::new(pool.clone()));
    let advances = Arc::new(MySqlAdvanceRepository::new(pool.clone()));

    let payroll = PayrollService::new(
        payroll_repository.clone(),
        directory.clone(),
        advances,
        ytd_repository.clone(),
        Arc::new(registry),
    );
    let ytd = YtdService::new(payroll_repository.clone(), ytd_repository.clone());
    let reports = ReportService::new(payroll_repository, ytd_repository, directory);

    match command.as_str() {
        "generate" => {
            let period: PayPeriod = arg(&args, 2, "YYYY-MM")?.parse()?;
            let outcome = payroll.generate_run(arg(&args, 1, "practice_id")?, period).await?;
            emit(serde_json::to_string_pretty(&outcome)? + "\n")
        }
        "process" => {
            let run = payroll.process_run(arg(&args, 1, "run_id")?).await?;
            emit(serde_json::to_string_pretty(&run)? + "\n")
        }
        "mark-paid" => {
            let run = payroll.mark_paid(arg(&args, 1, "run_id")?).await?;
            emit(serde_json::to_string_pretty(&run)? + "\n")
        }
        "verify-ytd" => {
            let report = ytd
                .verify_practice(arg(&args, 1, "practice_id")?, arg(&args, 2, "tax_year")?)
                .await?;
            emit(serde_json::to_string_pretty(&report)? + "\n")?;
            if !report.is_clean() {
                bail!("YTD figures drift for {} employee(s)", report.drifting_employees().len());
            }
            Ok(())
        }
        "declaration" => {
            let period: PayPeriod = arg(&args, 2, "YYYY-MM")?.parse()?;
            let declaration = reports
                .monthly_declaration(arg(&args, 1, "practice_id")?, period)
                .await?;
            if text {
                emit(document::render_declaration(&declaration))
            } else {
                emit(csv_export::declaration_to_string(&declaration)?)
            }
        }
        "reconcile" => {
            let reconciliation = reports
                .annual_reconciliation(arg(&args, 1, "practice_id")?, arg(&args, 2, "tax_year")?)
                .await?;
            if text {
                emit(document::render_reconciliation(&reconciliation))
            } else {
                emit(csv_export::reconciliation_to_string(&reconciliation)?)
            }
        }
        "certificate" => {
            let certificate = reports
                .tax_certificate(
                    arg(&args, 1, "practice_id")?,
                    arg(&args, 2, "employee_id")?,
                    arg(&args, 3, "tax_year")?,
                )
                .await?;
            if text {
                emit(document::render_certificate(&certificate))
            } else {
                emit(csv_export::certificate_to_string(&certificate)?)
            }
        }
        "payslip" => {
            let payslip = reports
                .payslip(arg(&args, 1, "run_id")?, arg(&args, 2, "employee_id")?)
                .await?;
            if text {
                emit(document::render_payslip(&payslip))
            } else {
                emit(serde_json::to_string_pretty(&payslip)? + "\n")
            }
        }
        other => bail!("unknown command `{}`\n\n{}", other, USAGE),
    }
}

// MySQL repositories
//
// Full payroll flow against a real database. Run with:
//   TEST_DATABASE_URL=mysql://... cargo test --test mysql_repository_test -- --ignored

#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::Arc;

use helpers::*;
use practice_payroll::core::AppError;
use practice_payroll::modules::advances::{AdvanceService, AdvanceStatus, MySqlAdvanceRepository};
use practice_payroll::modules::audit::{AuditEvent, AuditRepository, AuditWriter, MySqlAuditRepository};
use practice_payroll::modules::employees::{EmployeeDirectory, MySqlEmployeeDirectory};
use practice_payroll::modules::employees::models::RecurringDeduction;
use practice_payroll::modules::payroll::{
    AdditionKind, MySqlPayrollRepository, PayrollService, RunStatus,
};
use practice_payroll::modules::reports::ReportService;
use practice_payroll::modules::taxes::TaxTableRegistry;
use practice_payroll::modules::ytd::{MySqlYtdRepository, YtdService};
use rust_decimal_macros::dec;
use sqlx::MySqlPool;

struct Services {
    practice_id: String,
    pool: MySqlPool,
    payroll: PayrollService,
    advances: AdvanceService,
    ytd: YtdService,
    reports: ReportService,
    audit: MySqlAuditRepository,
}

async fn setup() -> Services {
    let pool = create_test_pool().await;
    let practice_id = TestDataFactory::random_id("practice");
    seed_employer(&pool, &TestDataFactory::employer(&practice_id)).await;

    let payroll_repository = Arc::new(MySqlPayrollRepository::new(pool.clone()));
    let ytd_repository = Arc::new(MySqlYtdRepository::new(pool.clone()));
    let directory = Arc::new(MySqlEmployeeDirectory::new(pool.clone()));
    let advances = Arc::new(MySqlAdvanceRepository::new(pool.clone()));
    let tax_tables = Arc::new(TaxTableRegistry::with_builtin().unwrap());

    Services {
        payroll: PayrollService::new(
            payroll_repository.clone(),
            directory.clone(),
            advances.clone(),
            ytd_repository.clone(),
            tax_tables,
        ),
        advances: AdvanceService::new(advances, directory.clone()),
        ytd: YtdService::new(payroll_repository.clone(), ytd_repository.clone()),
        reports: ReportService::new(payroll_repository, ytd_repository, directory),
        audit: MySqlAuditRepository::new(pool.clone()),
        practice_id,
        pool,
    }
}

async fn hire(services: &Services, gross: rust_decimal::Decimal) -> String {
    let employee_id = TestDataFactory::random_id("emp");
    let employee = TestDataFactory::employee(&services.practice_id, &employee_id, gross);
    seed_employee(&services.pool, &employee).await;
    employee_id
}

#[tokio::test]
#[ignore] // Requires test database
async fn test_employee_directory_round_trip() {
    let services = setup().await;
    let employee_id = TestDataFactory::random_id("emp");
    let mut employee = TestDataFactory::employee(&services.practice_id, &employee_id, dec!(30000));
    employee.compensation.pension_rate = dec!(0.075);
    employee.compensation.other_deductions = vec![RecurringDeduction {
        label: "Union fees".to_string(),
        amount: dec!(120),
    }];
    seed_employee(&services.pool, &employee).await;

    let directory = MySqlEmployeeDirectory::new(services.pool.clone());
    let loaded = directory.find_employee(&employee_id).await.unwrap().unwrap();
    assert_eq!(loaded, employee);

    let active = directory.active_employees(&services.practice_id).await.unwrap();
    assert_eq!(active.len(), 1);

    let employer = directory.employer(&services.practice_id).await.unwrap();
    assert_eq!(employer.trading_name, "Riverside Family Practice");

    let missing = directory.employer("no-such-practice").await;
    assert!(matches!(missing, Err(AppError::Configuration(_))));
}

#[tokio::test]
#[ignore] // Requires test database
async fn test_full_run_lifecycle() {
    let services = setup().await;
    let employee_id = hire(&services, dec!(30000)).await;
    let period = TestDataFactory::period(2024, 3);

    let advance = services
        .advances
        .request(&services.practice_id, &employee_id, dec!(2000), None)
        .await
        .unwrap();
    services.advances.approve(&advance.id).await.unwrap();

    let outcome = services.payroll.generate_run(&services.practice_id, period).await.unwrap();
    let run_id = outcome.run.id.clone();
    services
        .payroll
        .add_irregular_payment(&run_id, &employee_id, AdditionKind::Bonus, "Bonus".to_string(), dec!(10000))
        .await
        .unwrap();

    // Entries survive the round trip with their trace and additions
    let entries = services.payroll.entries(&run_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].additions.len(), 1);
    assert_eq!(entries[0].pay_advance_amount, dec!(2000));
    assert_eq!(entries[0].trace.irregular_paye, dec!(2600.00));
    entries[0].check_invariants().unwrap();

    let processed = services.payroll.process_run(&run_id).await.unwrap();
    assert_eq!(processed.status, RunStatus::Processed);
    let paid = services.payroll.mark_paid(&run_id).await.unwrap();
    assert_eq!(paid.status, RunStatus::Paid);

    let advance = services.advances.get(&advance.id).await.unwrap();
    assert_eq!(advance.status, AdvanceStatus::Deducted);

    services
        .ytd
        .verify(&services.practice_id, &employee_id, "2024/2025")
        .await
        .unwrap();

    let declaration = services
        .reports
        .monthly_declaration(&services.practice_id, period)
        .await
        .unwrap();
    assert_eq!(declaration.totals.sdl, dec!(400.00));
}

#[tokio::test]
#[ignore] // Requires test database
async fn test_audit_rows_verify_after_round_trip() {
    let services = setup().await;
    hire(&services, dec!(30000)).await;
    hire(&services, dec!(18000)).await;

    let outcome = services
        .payroll
        .generate_run(&services.practice_id, TestDataFactory::period(2024, 3))
        .await
        .unwrap();
    services.payroll.process_run(&outcome.run.id).await.unwrap();

    let rows = services.audit.for_run(&outcome.run.id).await.unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows.iter().filter(|r| r.event == AuditEvent::Processed).count(), 2);
    for row in &rows {
        AuditWriter::verify_checksum(row).unwrap();
    }
}

#[tokio::test]
#[ignore] // Requires test database
async fn test_duplicate_period_is_rejected() {
    let services = setup().await;
    hire(&services, dec!(30000)).await;
    let period = TestDataFactory::period(2024, 3);

    let first = services.payroll.generate_run(&services.practice_id, period).await.unwrap();
    let again = services.payroll.generate_run(&services.practice_id, period).await.unwrap();
    assert_eq!(first.run.id, again.run.id);

    services.payroll.process_run(&first.run.id).await.unwrap();
    let locked = services.payroll.generate_run(&services.practice_id, period).await;
    assert!(matches!(locked, Err(AppError::InvalidState(_))));
}

#[tokio::test]
#[ignore] // Requires test database
async fn test_delete_draft_removes_rows() {
    let services = setup().await;
    hire(&services, dec!(30000)).await;
    let period = TestDataFactory::period(2024, 3);

    let outcome = services.payroll.generate_run(&services.practice_id, period).await.unwrap();
    services.payroll.delete_draft(&outcome.run.id).await.unwrap();

    assert!(services
        .payroll
        .find_run(&services.practice_id, period)
        .await
        .unwrap()
        .is_none());
    assert!(services.payroll.get_run(&outcome.run.id).await.is_err());

    // The audit trail outlives the draft
    let rows = services.audit.for_run(&outcome.run.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event, AuditEvent::Calculated);
}

#[tokio::test]
#[ignore] // Requires test database
async fn test_stale_ytd_and_advance_writes_conflict() {
    use practice_payroll::modules::payroll::repositories::{DraftWrite, ProcessingWrite};
    use practice_payroll::modules::payroll::PayrollRepository;
    use practice_payroll::modules::ytd::YtdAggregator;

    let services = setup().await;
    let employee_id = hire(&services, dec!(30000)).await;
    let repository = MySqlPayrollRepository::new(services.pool.clone());

    let advance = services
        .advances
        .request(&services.practice_id, &employee_id, dec!(2000), None)
        .await
        .unwrap();
    services.advances.approve(&advance.id).await.unwrap();

    let march = services
        .payroll
        .generate_run(&services.practice_id, TestDataFactory::period(2024, 3))
        .await
        .unwrap();
    services.payroll.process_run(&march.run.id).await.unwrap();
    let april = services
        .payroll
        .generate_run(&services.practice_id, TestDataFactory::period(2024, 4))
        .await
        .unwrap();

    // April claiming the advance March already holds
    let mut stale = services.advances.get(&advance.id).await.unwrap();
    stale.run_id = Some(april.run.id.clone());
    let mut run = april.run.clone();
    let now = chrono::Utc::now();
    let expected_version = run.bump_version(now);
    let claimed = repository
        .save_draft(&DraftWrite {
            run,
            expected_version,
            entries: april.entries.clone(),
            advances: vec![stale],
            audit: Vec::new(),
        })
        .await;
    assert!(matches!(claimed, Err(AppError::Conflict(_))));

    // April's YTD computed without March
    let ytd = YtdAggregator::apply_run(&april.run, &april.entries, Vec::new(), now).unwrap();
    let mut run = april.run.clone();
    run.mark_processed(now).unwrap();
    let expected_version = run.bump_version(now);
    let processed = repository
        .commit_processing(&ProcessingWrite {
            run,
            expected_version,
            ytd,
            audit: Vec::new(),
        })
        .await;
    assert!(matches!(processed, Err(AppError::Conflict(_))));
    assert_eq!(
        services.payroll.get_run(&april.run.id).await.unwrap().status,
        RunStatus::Draft
    );

    let advance = services.advances.get(&advance.id).await.unwrap();
    assert_eq!(advance.run_id.as_deref(), Some(march.run.id.as_str()));
    services
        .ytd
        .verify(&services.practice_id, &employee_id, "2024/2025")
        .await
        .unwrap();
}

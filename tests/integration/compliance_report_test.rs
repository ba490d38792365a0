// Statutory reports over finalized payroll data
//
// - Monthly declaration (EMP201) and its CSV export
// - Annual reconciliation (EMP501) against YTD figures
// - Tax certificate (IRP5) and payslip data

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::*;
use practice_payroll::core::money::format_decimal;
use practice_payroll::core::AppError;
use practice_payroll::modules::payroll::RunStatus;
use practice_payroll::modules::reports::services::{csv_export, document};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const TAX_YEAR: &str = "2024/2025";

async fn process_tax_year(ctx: &TestContext) {
    for (year, month) in [(2024, 3), (2024, 4), (2024, 5), (2024, 6), (2024, 7), (2024, 8)]
        .into_iter()
        .chain([(2024, 9), (2024, 10), (2024, 11), (2024, 12), (2025, 1), (2025, 2)])
    {
        ctx.process_month(TestDataFactory::period(year, month)).await;
    }
}

#[tokio::test]
async fn test_monthly_declaration() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    let period = TestDataFactory::period(2024, 3);
    let run_id = ctx.process_month(period).await;

    let declaration = ctx.reports.monthly_declaration(&ctx.practice_id, period).await.unwrap();

    assert_eq!(declaration.run_id.as_deref(), Some(run_id.as_str()));
    assert_eq!(declaration.run_status, Some(RunStatus::Processed));
    assert_eq!(declaration.tax_year_id, TAX_YEAR);
    assert_eq!(declaration.rows.len(), 1);
    assert_eq!(declaration.totals.paye, dec!(4783.08));
    assert_eq!(declaration.totals.employee_uif, dec!(177.12));
    assert_eq!(declaration.totals.employer_uif, dec!(177.12));
    assert_eq!(declaration.totals.sdl, dec!(300.00));
    assert_eq!(declaration.total_liability(), dec!(5437.32));
}

#[tokio::test]
async fn test_draft_month_declares_nothing() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    let period = TestDataFactory::period(2024, 3);
    ctx.payroll.generate_run(&ctx.practice_id, period).await.unwrap();

    let declaration = ctx.reports.monthly_declaration(&ctx.practice_id, period).await.unwrap();
    assert!(declaration.is_empty());
    assert_eq!(declaration.run_status, Some(RunStatus::Draft));
    assert_eq!(declaration.total_liability(), Decimal::ZERO);

    let no_run = ctx
        .reports
        .monthly_declaration(&ctx.practice_id, TestDataFactory::period(2024, 4))
        .await
        .unwrap();
    assert!(no_run.is_empty());
    assert_eq!(no_run.run_status, None);
    assert!(document::render_declaration(&no_run).contains("no run"));
}

#[tokio::test]
async fn test_declaration_csv() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    ctx.hire("emp-2", dec!(15000));
    let period = TestDataFactory::period(2024, 3);
    ctx.process_month(period).await;

    let declaration = ctx.reports.monthly_declaration(&ctx.practice_id, period).await.unwrap();
    let csv = csv_export::declaration_to_string(&declaration).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], csv_export::DECLARATION_HEADER.join(","));
    assert!(lines[1].starts_with("2024-03,emp-1,"));
    assert!(lines[1].ends_with(",30000.00,0.00,4783.08,177.12,177.12,300.00,5437.32"));
    assert!(lines[3].starts_with("2024-03,TOTAL,"));
    assert!(lines[3].ends_with(&format!(",{}", format_decimal(declaration.total_liability()))));
}

#[tokio::test]
async fn test_annual_reconciliation_balances() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    process_tax_year(&ctx).await;

    let reconciliation = ctx.reports.annual_reconciliation(&ctx.practice_id, TAX_YEAR).await.unwrap();

    assert!(reconciliation.is_reconciled(), "{:?}", reconciliation.discrepancies);
    assert_eq!(reconciliation.months.len(), 12);
    assert!(reconciliation.open_months().is_empty());
    assert_eq!(reconciliation.declared.paye, dec!(57397.00));
    assert_eq!(reconciliation.declared.gross, dec!(360000));
    assert_eq!(reconciliation.declared.employee_count, 1);
    assert_eq!(reconciliation.ytd.paye, dec!(57397.00));

    let csv = csv_export::reconciliation_to_string(&reconciliation).unwrap();
    // Header, twelve months, declared and YTD totals
    assert_eq!(csv.lines().count(), 15);

    let text = document::render_reconciliation(&reconciliation);
    assert!(text.starts_with("ANNUAL EMPLOYER RECONCILIATION (EMP501)\n"));
    assert!(text.contains("Reconciled within"));
    assert!(!text.contains("DISCREPANCIES"));
}

#[tokio::test]
async fn test_reconciliation_reports_open_months_and_drift() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    ctx.process_month(TestDataFactory::period(2024, 3)).await;
    ctx.payroll
        .generate_run(&ctx.practice_id, TestDataFactory::period(2024, 4))
        .await
        .unwrap();

    let mut tampered = ctx.ytd.figures("emp-1", TAX_YEAR).await.unwrap().unwrap();
    tampered.paye += dec!(0.50);
    ctx.store.put_ytd(tampered);

    let reconciliation = ctx.reports.annual_reconciliation(&ctx.practice_id, TAX_YEAR).await.unwrap();

    assert!(!reconciliation.is_reconciled());
    assert_eq!(reconciliation.open_months(), vec![TestDataFactory::period(2024, 4)]);
    assert_eq!(reconciliation.months[1].run_status, Some(RunStatus::Draft));

    let paye: Vec<_> = reconciliation
        .discrepancies
        .iter()
        .filter(|d| d.figure == "paye")
        .collect();
    assert_eq!(paye.len(), 2);
    assert!(paye.iter().any(|d| d.employee_id.is_none()));
    assert!(paye.iter().any(|d| d.employee_id.as_deref() == Some("emp-1")));
    assert_eq!(paye[0].difference().abs(), dec!(0.50));

    let text = document::render_reconciliation(&reconciliation);
    assert!(text.contains("DISCREPANCIES"));
    assert!(text.contains("emp-1 paye"));
    assert!(text.contains("2024-04 [draft]"));
}

#[tokio::test]
async fn test_reconciliation_rejects_bad_tax_year() {
    let ctx = TestContext::new();
    let result = ctx.reports.annual_reconciliation(&ctx.practice_id, "2024-2025").await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_tax_certificate() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    process_tax_year(&ctx).await;

    let certificate = ctx
        .reports
        .tax_certificate(&ctx.practice_id, "emp-1", TAX_YEAR)
        .await
        .unwrap();

    assert_eq!(certificate.period_start.to_string(), "2024-03-01");
    assert_eq!(certificate.period_end.to_string(), "2025-02-28");
    assert_eq!(certificate.gross_remuneration, dec!(360000));
    assert_eq!(certificate.paye, dec!(57397.00));
    assert_eq!(certificate.uif, dec!(2125.44));
    assert_eq!(certificate.periods, 12);
    assert_eq!(certificate.masked_account_number.as_deref(), Some("*******5678"));

    // Same employee and year always get the same number
    let again = ctx
        .reports
        .tax_certificate(&ctx.practice_id, "emp-1", TAX_YEAR)
        .await
        .unwrap();
    assert_eq!(certificate.certificate_number, again.certificate_number);

    let csv = csv_export::certificate_to_string(&certificate).unwrap();
    assert!(csv.contains(&certificate.certificate_number));
    assert!(!csv.contains("62812345678"));

    let text = document::render_certificate(&certificate);
    assert!(text.contains(&certificate.certificate_number));
    assert!(text.contains("*******5678"));
    assert!(!text.contains("62812345678"));
    // Every row is padded to the rule width
    let rule_width = text.lines().nth(1).map(str::len).unwrap();
    assert!(text
        .lines()
        .filter(|l| l.contains("Gross remuneration"))
        .all(|l| l.len() == rule_width));
}

#[tokio::test]
async fn test_certificate_without_figures_is_not_found() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));

    let result = ctx.reports.tax_certificate(&ctx.practice_id, "emp-1", TAX_YEAR).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_payslip_delivery_follows_run_status() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    let outcome = ctx
        .payroll
        .generate_run(&ctx.practice_id, TestDataFactory::period(2024, 3))
        .await
        .unwrap();
    let run_id = outcome.run.id.clone();

    let draft = ctx.reports.payslip(&run_id, "emp-1").await.unwrap();
    assert!(!draft.deliverable);
    assert_eq!(draft.blocked_reasons.len(), 1);
    assert_eq!(draft.net_pay, dec!(25039.80));

    ctx.payroll.process_run(&run_id).await.unwrap();
    let processed = ctx.reports.payslip(&run_id, "emp-1").await.unwrap();
    assert!(processed.deliverable);
    assert_eq!(processed.ytd.as_ref().map(|y| y.net), Some(dec!(25039.80)));
    assert!(processed.deductions.iter().any(|d| d.amount == dec!(4783.08)));

    let text = document::render_payslip(&processed);
    assert!(text.contains("NET PAY"));
    assert!(text.contains("R 25039.80"));
    assert!(!text.contains("62812345678"));
}

#[tokio::test]
async fn test_payslip_blocked_by_missing_banking() {
    let ctx = TestContext::new();
    let employee = ctx.hire("emp-1", dec!(30000));
    ctx.amend(&employee, |e| e.banking = None);
    let run_id = ctx.process_month(TestDataFactory::period(2024, 3)).await;

    let payslip = ctx.reports.payslip(&run_id, "emp-1").await.unwrap();
    assert!(!payslip.deliverable);
    assert!(payslip.masked_account_number.is_none());

    let missing = ctx.reports.payslip(&run_id, "emp-9").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

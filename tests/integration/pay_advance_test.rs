// Pay advances: request, approval and recovery through payroll
//
// An approved advance is deducted in full by the next run that includes
// the employee and marked deducted when that run is paid.

#[path = "../helpers/mod.rs"]
mod helpers;

use std::time::Duration;

use helpers::*;
use practice_payroll::core::AppError;
use practice_payroll::modules::advances::{AdvanceRepository, AdvanceStatus};
use practice_payroll::modules::payroll::repositories::DraftWrite;
use practice_payroll::modules::payroll::PayrollRepository;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

async fn approved_advance(ctx: &TestContext, employee_id: &str, amount: Decimal) -> String {
    let advance = ctx
        .advances
        .request(&ctx.practice_id, employee_id, amount, Some("Car repair".to_string()))
        .await
        .unwrap();
    ctx.advances.approve(&advance.id).await.unwrap();
    advance.id
}

#[tokio::test]
async fn test_request_and_decide() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));

    let advance = ctx
        .advances
        .request(&ctx.practice_id, "emp-1", dec!(2000), None)
        .await
        .unwrap();
    assert_eq!(advance.status, AdvanceStatus::Pending);

    let approved = ctx.advances.approve(&advance.id).await.unwrap();
    assert_eq!(approved.status, AdvanceStatus::Approved);
    assert!(approved.decided_at.is_some());

    let twice = ctx.advances.reject(&advance.id).await;
    assert!(matches!(twice, Err(AppError::InvalidState(_))));

    let listed = ctx.advances.for_employee("emp-1").await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_request_validation() {
    let ctx = TestContext::new();
    let leaver = ctx.hire("emp-1", dec!(30000));
    ctx.amend(&leaver, |e| e.active = false);

    let inactive = ctx.advances.request(&ctx.practice_id, "emp-1", dec!(500), None).await;
    assert!(matches!(inactive, Err(AppError::Validation(_))));

    ctx.hire("emp-2", dec!(30000));
    let wrong_practice = ctx.advances.request("other-practice", "emp-2", dec!(500), None).await;
    assert!(matches!(wrong_practice, Err(AppError::Validation(_))));

    let unknown = ctx.advances.request(&ctx.practice_id, "nobody", dec!(500), None).await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));

    let zero = ctx.advances.request(&ctx.practice_id, "emp-2", dec!(0), None).await;
    assert!(matches!(zero, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_advance_recovered_by_next_run() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    let advance_id = approved_advance(&ctx, "emp-1", dec!(2000)).await;

    let outcome = ctx
        .payroll
        .generate_run(&ctx.practice_id, TestDataFactory::period(2024, 3))
        .await
        .unwrap();
    let entry = &outcome.entries[0];

    assert_eq!(entry.pay_advance_amount, dec!(2000));
    assert_eq!(entry.net_salary, dec!(23039.80));
    assert_eq!(entry.trace.advances[0].advance_id, advance_id);
    assert_eq!(outcome.run.totals.pay_advances, dec!(2000));

    let held = ctx.advances.get(&advance_id).await.unwrap();
    assert_eq!(held.status, AdvanceStatus::Approved);
    assert_eq!(held.run_id.as_deref(), Some(outcome.run.id.as_str()));

    // Regenerating keeps one recovery, not two
    let again = ctx
        .payroll
        .generate_run(&ctx.practice_id, TestDataFactory::period(2024, 3))
        .await
        .unwrap();
    assert_eq!(again.entries[0].pay_advance_amount, dec!(2000));
    assert_eq!(again.entries[0].trace.advances.len(), 1);

    ctx.payroll.process_run(&outcome.run.id).await.unwrap();
    ctx.payroll.mark_paid(&outcome.run.id).await.unwrap();

    let deducted = ctx.advances.get(&advance_id).await.unwrap();
    assert_eq!(deducted.status, AdvanceStatus::Deducted);
    assert!(deducted.deducted_at.is_some());

    let ytd = ctx.ytd.figures("emp-1", "2024/2025").await.unwrap().unwrap();
    assert_eq!(ytd.pay_advances, dec!(2000));

    // The following month no longer recovers it
    let april = ctx
        .payroll
        .generate_run(&ctx.practice_id, TestDataFactory::period(2024, 4))
        .await
        .unwrap();
    assert_eq!(april.entries[0].pay_advance_amount, Decimal::ZERO);
}

#[tokio::test]
async fn test_only_approved_advances_are_recovered() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    let pending = ctx
        .advances
        .request(&ctx.practice_id, "emp-1", dec!(700), None)
        .await
        .unwrap();
    let rejected = ctx
        .advances
        .request(&ctx.practice_id, "emp-1", dec!(900), None)
        .await
        .unwrap();
    ctx.advances.reject(&rejected.id).await.unwrap();

    let outcome = ctx
        .payroll
        .generate_run(&ctx.practice_id, TestDataFactory::period(2024, 3))
        .await
        .unwrap();

    assert_eq!(outcome.entries[0].pay_advance_amount, Decimal::ZERO);
    assert!(ctx.advances.get(&pending.id).await.unwrap().run_id.is_none());
}

#[tokio::test]
async fn test_multiple_advances_are_summed() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    ctx.hire("emp-2", dec!(30000));
    approved_advance(&ctx, "emp-1", dec!(1000)).await;
    approved_advance(&ctx, "emp-1", dec!(500)).await;
    approved_advance(&ctx, "emp-2", dec!(250)).await;

    let outcome = ctx
        .payroll
        .generate_run(&ctx.practice_id, TestDataFactory::period(2024, 3))
        .await
        .unwrap();

    let by_employee: Vec<(String, Decimal)> = outcome
        .entries
        .iter()
        .map(|e| (e.employee_id.clone(), e.pay_advance_amount))
        .collect();
    assert_eq!(
        by_employee,
        vec![
            ("emp-1".to_string(), dec!(1500)),
            ("emp-2".to_string(), dec!(250)),
        ]
    );
}

#[tokio::test]
async fn test_deleting_draft_releases_advance() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    let advance_id = approved_advance(&ctx, "emp-1", dec!(2000)).await;
    let period = TestDataFactory::period(2024, 3);

    let outcome = ctx.payroll.generate_run(&ctx.practice_id, period).await.unwrap();
    ctx.payroll.delete_draft(&outcome.run.id).await.unwrap();

    let released = ctx.advances.get(&advance_id).await.unwrap();
    assert_eq!(released.status, AdvanceStatus::Approved);
    assert!(released.run_id.is_none());

    let next = ctx.payroll.generate_run(&ctx.practice_id, period).await.unwrap();
    assert_eq!(next.entries[0].pay_advance_amount, dec!(2000));
}

#[tokio::test]
async fn test_leaver_advance_is_released_on_regeneration() {
    let ctx = TestContext::new();
    let employee = ctx.hire("emp-1", dec!(30000));
    ctx.hire("emp-2", dec!(30000));
    let advance_id = approved_advance(&ctx, "emp-1", dec!(2000)).await;
    let period = TestDataFactory::period(2024, 3);

    let first = ctx.payroll.generate_run(&ctx.practice_id, period).await.unwrap();
    assert_eq!(
        ctx.advances.get(&advance_id).await.unwrap().run_id.as_deref(),
        Some(first.run.id.as_str())
    );

    ctx.amend(&employee, |e| e.active = false);
    let second = ctx.payroll.generate_run(&ctx.practice_id, period).await.unwrap();

    assert_eq!(second.entries.len(), 1);
    assert_eq!(second.run.totals.pay_advances, Decimal::ZERO);
    assert!(ctx.advances.get(&advance_id).await.unwrap().run_id.is_none());
}

#[tokio::test]
async fn test_failed_payment_keeps_advance_outstanding() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    let advance_id = approved_advance(&ctx, "emp-1", dec!(2000)).await;
    let run_id = ctx.process_month(TestDataFactory::period(2024, 3)).await;

    ctx.store.fail_next(WritePoint::CommitPaid);
    assert!(ctx.payroll.mark_paid(&run_id).await.is_err());

    let advance = ctx.advances.get(&advance_id).await.unwrap();
    assert_eq!(advance.status, AdvanceStatus::Approved);
    assert_eq!(
        ctx.payroll.get_run(&run_id).await.unwrap().status,
        practice_payroll::modules::payroll::RunStatus::Processed
    );

    ctx.payroll.mark_paid(&run_id).await.unwrap();
    assert_eq!(
        ctx.advances.get(&advance_id).await.unwrap().status,
        AdvanceStatus::Deducted
    );
}

#[tokio::test]
async fn test_advance_approved_after_processing_waits_for_next_run() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    let march = ctx.process_month(TestDataFactory::period(2024, 3)).await;
    let advance_id = approved_advance(&ctx, "emp-1", dec!(800)).await;

    ctx.payroll.mark_paid(&march).await.unwrap();
    assert_eq!(
        ctx.advances.get(&advance_id).await.unwrap().status,
        AdvanceStatus::Approved
    );

    let april = ctx
        .payroll
        .generate_run(&ctx.practice_id, TestDataFactory::period(2024, 4))
        .await
        .unwrap();
    assert_eq!(april.entries[0].pay_advance_amount, dec!(800));
}

#[tokio::test]
async fn test_concurrent_months_recover_advance_once() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    let advance_id = approved_advance(&ctx, "emp-1", dec!(2000)).await;
    let payroll = ctx.payroll_with_slow_reads(Duration::from_millis(50));
    let march = TestDataFactory::period(2024, 3);
    let april = TestDataFactory::period(2024, 4);

    // Both months see the advance as free before either saves
    let (first, second) = tokio::join!(
        payroll.generate_run(&ctx.practice_id, march),
        payroll.generate_run(&ctx.practice_id, april),
    );
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(AppError::Conflict(_))))
            .count(),
        1
    );

    // The losing month regenerates without it
    let mut recovering = Vec::new();
    for period in [march, april] {
        let outcome = ctx.payroll.generate_run(&ctx.practice_id, period).await.unwrap();
        if outcome.run.totals.pay_advances > Decimal::ZERO {
            assert_eq!(outcome.run.totals.pay_advances, dec!(2000));
            recovering.push(outcome.run.id);
        }
    }
    assert_eq!(recovering.len(), 1);

    let advance = ctx.advances.get(&advance_id).await.unwrap();
    assert_eq!(advance.run_id.as_ref(), Some(&recovering[0]));
}

#[tokio::test]
async fn test_draft_cannot_take_advance_held_by_another_run() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    let advance_id = approved_advance(&ctx, "emp-1", dec!(2000)).await;
    let march = ctx
        .payroll
        .generate_run(&ctx.practice_id, TestDataFactory::period(2024, 3))
        .await
        .unwrap();
    let april = ctx
        .payroll
        .generate_run(&ctx.practice_id, TestDataFactory::period(2024, 4))
        .await
        .unwrap();
    assert_eq!(april.run.totals.pay_advances, Decimal::ZERO);

    // A writer that read the advance before March took it
    let mut stale = ctx.advances.get(&advance_id).await.unwrap();
    stale.run_id = Some(april.run.id.clone());
    let mut run = april.run.clone();
    let expected_version = run.bump_version(chrono::Utc::now());
    let result = ctx
        .store
        .save_draft(&DraftWrite {
            run,
            expected_version,
            entries: april.entries.clone(),
            advances: vec![stale],
            audit: Vec::new(),
        })
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    let advance = ctx.advances.get(&advance_id).await.unwrap();
    assert_eq!(advance.run_id.as_deref(), Some(march.run.id.as_str()));
    assert_eq!(
        ctx.payroll.get_run(&april.run.id).await.unwrap().version,
        april.run.version
    );
}

#[tokio::test]
async fn test_stale_decision_is_rejected() {
    let ctx = TestContext::new();
    ctx.hire("emp-1", dec!(30000));
    let advance = ctx
        .advances
        .request(&ctx.practice_id, "emp-1", dec!(1200), None)
        .await
        .unwrap();

    // Decided from another session after this copy was read
    let mut stale = advance.clone();
    ctx.advances.reject(&advance.id).await.unwrap();
    stale.approve().unwrap();

    let result = ctx.store.update(&stale).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(
        ctx.advances.get(&advance.id).await.unwrap().status,
        AdvanceStatus::Rejected
    );
}

//! Reconciliation job tests: repair, reporting and idempotence

mod common;

use common::*;
use rankblaze::entitlements;
use rankblaze::reconcile;

/// Backdate an order so the scan picks it up
fn backdate(conn: &rusqlite::Connection, order_id: &str, secs: i64) {
    conn.execute(
        "UPDATE orders SET created_at = ?1 WHERE id = ?2",
        rusqlite::params![past_timestamp(secs), order_id],
    )
    .unwrap();
}

#[test]
fn test_repairs_order_with_active_entitlement() {
    let conn = setup_test_db();
    create_test_user(&conn, "u1");
    create_test_tool(&conn, "tool1", 199);

    // The grant landed (here via admin) but the order flip was missed
    create_test_order(&conn, "ord_u1_tool1_1000", "u1", &["tool1"], 199, "cashfree");
    backdate(&conn, "ord_u1_tool1_1000", 3600);
    entitlements::grant_admin(&conn, "u1", "tool1", 30 * 86400).unwrap();

    let summary = reconcile::run(&conn, 1800).unwrap();
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.repaired, 1);
    assert_eq!(summary.unresolved, 0);
    assert_eq!(summary.entries.len(), 1);
    assert_eq!(summary.entries[0].transaction_id, "ord_u1_tool1_1000");
    assert!(summary.entries[0].verified);

    let order = queries::get_order_by_id(&conn, "ord_u1_tool1_1000").unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert!(order.repaired);

    // Repair never mints entitlements or history rows
    assert_eq!(queries::list_entitlements_for_user(&conn, "u1").unwrap().len(), 1);
    assert!(queries::list_payment_records_for_order(&conn, "ord_u1_tool1_1000")
        .unwrap()
        .is_empty());
}

#[test]
fn test_reports_stale_order_without_entitlement() {
    let conn = setup_test_db();
    create_test_user(&conn, "u1");
    create_test_tool(&conn, "tool1", 199);
    create_test_order(&conn, "ord1", "u1", &["tool1"], 199, "phonepe");
    backdate(&conn, "ord1", 3600);

    let summary = reconcile::run(&conn, 1800).unwrap();
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.repaired, 0);
    assert_eq!(summary.unresolved, 1);
    assert!(!summary.entries[0].verified);

    // No auto-fail: the money may have moved, a human decides
    let order = queries::get_order_by_id(&conn, "ord1").unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Initiated);
}

#[test]
fn test_fresh_orders_are_not_scanned() {
    let conn = setup_test_db();
    create_test_user(&conn, "u1");
    create_test_tool(&conn, "tool1", 199);
    create_test_order(&conn, "ord1", "u1", &["tool1"], 199, "cashfree");

    let summary = reconcile::run(&conn, 1800).unwrap();
    assert_eq!(summary.scanned, 0);
    assert!(summary.entries.is_empty());
}

#[test]
fn test_partial_entitlement_is_not_repaired() {
    let conn = setup_test_db();
    create_test_user(&conn, "u1");
    create_test_tool(&conn, "tool1", 199);
    create_test_tool(&conn, "tool2", 299);
    create_test_order(&conn, "ord1", "u1", &["tool1", "tool2"], 498, "razorpay");
    backdate(&conn, "ord1", 3600);

    // Only one of the two tools is covered
    entitlements::grant_admin(&conn, "u1", "tool1", 30 * 86400).unwrap();

    let summary = reconcile::run(&conn, 1800).unwrap();
    assert_eq!(summary.repaired, 0);
    assert_eq!(summary.unresolved, 1);
    assert_eq!(
        queries::get_order_by_id(&conn, "ord1").unwrap().unwrap().status,
        OrderStatus::Initiated
    );
}

#[test]
fn test_double_run_is_idempotent() {
    let conn = setup_test_db();
    create_test_user(&conn, "u1");
    create_test_tool(&conn, "tool1", 199);
    create_test_tool(&conn, "tool2", 299);

    create_test_order(&conn, "ord_repair", "u1", &["tool1"], 199, "cashfree");
    create_test_order(&conn, "ord_stuck", "u1", &["tool2"], 299, "cashfree");
    backdate(&conn, "ord_repair", 3600);
    backdate(&conn, "ord_stuck", 3600);
    entitlements::grant_admin(&conn, "u1", "tool1", 30 * 86400).unwrap();

    let first = reconcile::run(&conn, 1800).unwrap();
    assert_eq!(first.scanned, 2);
    assert_eq!(first.repaired, 1);
    assert_eq!(first.unresolved, 1);

    // The repaired order left the scan window; the stuck one is re-reported
    // with no new side effects.
    let second = reconcile::run(&conn, 1800).unwrap();
    assert_eq!(second.scanned, 1);
    assert_eq!(second.repaired, 0);
    assert_eq!(second.unresolved, 1);

    let repaired = queries::get_order_by_id(&conn, "ord_repair").unwrap().unwrap();
    assert_eq!(repaired.status, OrderStatus::Completed);
    assert!(repaired.repaired);
    assert_eq!(queries::list_entitlements_for_user(&conn, "u1").unwrap().len(), 1);
}

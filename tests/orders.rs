//! Order store tests: creation, status transitions, stale scans

mod common;

use common::*;
use rankblaze::error::AppError;

#[test]
fn test_create_and_get_order() {
    let conn = setup_test_db();
    create_test_user(&conn, "u1");
    create_test_tool(&conn, "tool1", 199);

    let order = create_test_order(&conn, "ord_u1_tool1_1000", "u1", &["tool1"], 199, "razorpay");
    assert_eq!(order.status, OrderStatus::Initiated);
    assert_eq!(order.amount, 199);
    assert_eq!(order.currency, "INR");
    assert!(!order.repaired);

    let fetched = queries::get_order_by_id(&conn, "ord_u1_tool1_1000")
        .unwrap()
        .expect("order should exist");
    assert_eq!(fetched.id, order.id);
    assert_eq!(fetched.tool_ids, vec!["tool1".to_string()]);
    assert_eq!(fetched.status, OrderStatus::Initiated);
}

#[test]
fn test_create_duplicate_order_id_conflicts() {
    let conn = setup_test_db();
    create_test_user(&conn, "u1");
    create_test_tool(&conn, "tool1", 199);
    create_test_order(&conn, "ord1", "u1", &["tool1"], 199, "razorpay");

    let err = queries::create_order(
        &conn,
        &CreateOrder {
            id: "ord1".to_string(),
            user_id: "u1".to_string(),
            tool_ids: vec!["tool1".to_string()],
            amount: 199,
            currency: "INR".to_string(),
            gateway: "razorpay".to_string(),
        },
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[test]
fn test_get_missing_order_returns_none() {
    let conn = setup_test_db();
    assert!(queries::get_order_by_id(&conn, "nope").unwrap().is_none());
}

#[test]
fn test_complete_order_transition() {
    let conn = setup_test_db();
    create_test_user(&conn, "u1");
    create_test_tool(&conn, "tool1", 199);
    create_test_order(&conn, "ord1", "u1", &["tool1"], 199, "cashfree");

    assert!(queries::complete_order(&conn, "ord1", Some("txn_123")).unwrap());

    let order = queries::get_order_by_id(&conn, "ord1").unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.gateway_transaction_id.as_deref(), Some("txn_123"));
}

#[test]
fn test_completed_order_cannot_retransition() {
    let conn = setup_test_db();
    create_test_user(&conn, "u1");
    create_test_tool(&conn, "tool1", 199);
    create_test_order(&conn, "ord1", "u1", &["tool1"], 199, "cashfree");

    assert!(queries::complete_order(&conn, "ord1", None).unwrap());

    // Second completion loses the compare-and-set
    assert!(!queries::complete_order(&conn, "ord1", Some("txn_dup")).unwrap());
    // A completed order can never flip to failed
    assert!(!queries::fail_order(&conn, "ord1").unwrap());

    let order = queries::get_order_by_id(&conn, "ord1").unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert!(order.gateway_transaction_id.is_none());
}

#[test]
fn test_failed_order_cannot_complete() {
    let conn = setup_test_db();
    create_test_user(&conn, "u1");
    create_test_tool(&conn, "tool1", 199);
    create_test_order(&conn, "ord1", "u1", &["tool1"], 199, "phonepe");

    assert!(queries::fail_order(&conn, "ord1").unwrap());
    assert!(!queries::complete_order(&conn, "ord1", None).unwrap());

    let order = queries::get_order_by_id(&conn, "ord1").unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
}

#[test]
fn test_gateway_ref_lookup() {
    let conn = setup_test_db();
    create_test_user(&conn, "u1");
    create_test_tool(&conn, "tool1", 199);
    create_test_order(&conn, "ord1", "u1", &["tool1"], 199, "razorpay");

    queries::set_order_gateway_ref(&conn, "ord1", "order_RzpXYZ").unwrap();

    let found = queries::get_order_by_gateway_order_id(&conn, "razorpay", "order_RzpXYZ")
        .unwrap()
        .expect("lookup by gateway ref should find the order");
    assert_eq!(found.id, "ord1");

    // Same remote id under a different gateway does not match
    assert!(
        queries::get_order_by_gateway_order_id(&conn, "cashfree", "order_RzpXYZ")
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_stale_scan_respects_cutoff_and_status() {
    let conn = setup_test_db();
    create_test_user(&conn, "u1");
    create_test_tool(&conn, "tool1", 199);

    create_test_order(&conn, "ord_old", "u1", &["tool1"], 199, "cashfree");
    create_test_order(&conn, "ord_fresh", "u1", &["tool1"], 199, "cashfree");
    create_test_order(&conn, "ord_done", "u1", &["tool1"], 199, "cashfree");

    // Backdate two orders past the cutoff; one of them is already resolved
    conn.execute(
        "UPDATE orders SET created_at = ?1 WHERE id IN ('ord_old', 'ord_done')",
        [past_timestamp(3600)],
    )
    .unwrap();
    queries::complete_order(&conn, "ord_done", None).unwrap();

    let stale = queries::list_stale_initiated_orders(&conn, past_timestamp(1800)).unwrap();
    let ids: Vec<&str> = stale.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["ord_old"]);
}

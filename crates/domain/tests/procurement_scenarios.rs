//! End-to-end scenarios for the procurement bidding state machine.

use chrono::{Duration, Utc};
use domain::{
    BidStatus, BuyerId, Currency, CustomerId, Money, Order, OrderLine, Procurement,
    ProcurementError, ProcurementStatus, Quantity, Unit,
};

fn usd_major(major: i64) -> Money {
    Money::from_major(major, Currency::Usd)
}

#[test]
fn seed_procurement_full_bidding_round() {
    let now = Utc::now();
    let mut procurement = Procurement::new(
        "Seed Procurement",
        "Certified maize seed for the spring season",
        Quantity::new(200, Unit::Kilogram).unwrap(),
        usd_major(10_000),
        now + Duration::days(30),
        BuyerId::new("buyer-coop-1"),
    )
    .unwrap();

    procurement.publish(now).unwrap();
    assert_eq!(procurement.status(), ProcurementStatus::Published);

    procurement.open_bidding().unwrap();
    assert_eq!(procurement.status(), ProcurementStatus::BiddingOpen);

    let bid_a = procurement
        .add_bid("vendor-a".into(), usd_major(9_000), None, now)
        .unwrap()
        .id();
    let bid_b = procurement
        .add_bid("vendor-b".into(), usd_major(9_500), None, now)
        .unwrap()
        .id();

    assert_eq!(procurement.lowest_bid().unwrap().id(), bid_a);

    procurement.close_bidding().unwrap();
    assert_eq!(procurement.status(), ProcurementStatus::BiddingClosed);

    procurement.award_bid(bid_a).unwrap();

    assert_eq!(procurement.status(), ProcurementStatus::Awarded);
    assert_eq!(procurement.awarded_bid_id(), Some(bid_a));
    assert_eq!(procurement.bid(bid_a).unwrap().status(), BidStatus::Accepted);
    assert_eq!(procurement.bid(bid_b).unwrap().status(), BidStatus::Rejected);
}

#[test]
fn expired_deadline_blocks_bids_even_while_open() {
    let now = Utc::now();
    let mut procurement = Procurement::new(
        "Fertilizer tender",
        "NPK fertilizer",
        Quantity::new(50, Unit::Ton).unwrap(),
        usd_major(20_000),
        now + Duration::days(2),
        BuyerId::new("buyer-coop-2"),
    )
    .unwrap();
    procurement.publish(now).unwrap();
    procurement.open_bidding().unwrap();

    // Still BiddingOpen, but the clock has moved past the deadline.
    let after_deadline = now + Duration::days(3);
    let result = procurement.add_bid("vendor-late".into(), usd_major(1_000), None, after_deadline);
    assert!(matches!(result, Err(ProcurementError::DeadlinePassed)));
}

#[test]
fn vendor_can_rebid_after_losing_an_award() {
    let now = Utc::now();
    let mut procurement = Procurement::new(
        "Transport contract",
        "Grain haulage for Q3",
        Quantity::new(120, Unit::Ton).unwrap(),
        usd_major(40_000),
        now + Duration::days(10),
        BuyerId::new("buyer-coop-3"),
    )
    .unwrap();
    procurement.publish(now).unwrap();
    procurement.open_bidding().unwrap();

    procurement
        .add_bid("vendor-x".into(), usd_major(30_000), None, now)
        .unwrap();
    let duplicate = procurement.add_bid("vendor-x".into(), usd_major(29_000), None, now);
    assert!(matches!(
        duplicate,
        Err(ProcurementError::DuplicateBid { .. })
    ));
}

#[test]
fn order_total_is_sum_of_line_totals() {
    let order = Order::new(
        CustomerId::new(),
        vec![
            OrderLine::new("SKU-GRAIN", 3, Money::from_minor(1000, Currency::Usd)),
            OrderLine::new("SKU-SEED", 1, Money::from_minor(500, Currency::Usd)),
        ],
    )
    .unwrap();

    assert_eq!(order.total_amount().minor(), 3500);
    assert_eq!(
        order
            .lines()
            .iter()
            .map(|line| line.line_total.minor())
            .sum::<i64>(),
        order.total_amount().minor()
    );
}

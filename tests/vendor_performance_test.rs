mod common;

use assert_matches::assert_matches;
use common::{id, TestApp};
use rstest::rstest;
use rust_decimal_macros::dec;
use supplychain_ledger::errors::ServiceError;

#[tokio::test]
async fn registration_opens_an_empty_account() {
    let app = TestApp::new().await;
    let vendor_id = app.register_vendor("0xv1", "Steel Co").await;

    let performance = app
        .services()
        .vendor_performance
        .vendor_performance(vendor_id)
        .await
        .unwrap();
    assert_eq!(performance.total_orders, 0);
    assert_eq!(performance.completed_orders, 0);
    assert_eq!(performance.total_quantity_supplied, 0);
    assert_eq!(performance.rating, 0);
    assert!(!performance.is_verified);
    assert!(performance.last_activity_at.is_none());
}

#[tokio::test]
async fn ratings_overwrite() {
    let app = TestApp::new().await;
    let vendor_id = app.register_vendor("0xv1", "Steel Co").await;
    let service = &app.services().vendor_performance;

    service.rate_vendor(&app.owner, vendor_id, 45).await.unwrap();
    let performance = service.vendor_performance(vendor_id).await.unwrap();
    assert_eq!(performance.rating, 45);
    assert_eq!(performance.stars(), 4.5);

    service.rate_vendor(&app.owner, vendor_id, 20).await.unwrap();
    assert_eq!(service.vendor_performance(vendor_id).await.unwrap().rating, 20);
}

#[rstest]
#[case(0)]
#[case(5)]
#[case(9)]
#[case(12)]
#[case(51)]
#[case(55)]
#[case(-10)]
#[tokio::test]
async fn off_scale_ratings_are_rejected(#[case] rating: i32) {
    let app = TestApp::new().await;
    let vendor_id = app.register_vendor("0xv1", "Steel Co").await;
    let service = &app.services().vendor_performance;

    let err = service
        .rate_vendor(&app.owner, vendor_id, rating)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));
    assert_eq!(service.vendor_performance(vendor_id).await.unwrap().rating, 0);
}

#[tokio::test]
async fn only_the_owner_rates_and_verifies() {
    let app = TestApp::new().await;
    let vendor_id = app.register_vendor("0xv1", "Steel Co").await;
    let service = &app.services().vendor_performance;

    assert_matches!(
        service.rate_vendor(&id("0xv1"), vendor_id, 50).await,
        Err(ServiceError::Unauthorized(_))
    );
    assert_matches!(
        service.verify_vendor(&id("0xv1"), vendor_id).await,
        Err(ServiceError::Unauthorized(_))
    );
    // The role check comes before the rating check.
    assert_matches!(
        service.rate_vendor(&id("0xnobody"), vendor_id, 3).await,
        Err(ServiceError::Unauthorized(_))
    );
    assert_matches!(
        service.rate_vendor(&app.owner, 8, 30).await,
        Err(ServiceError::VendorNotFound(8))
    );
    assert_matches!(
        service.verify_vendor(&app.owner, 8).await,
        Err(ServiceError::VendorNotFound(8))
    );
}

#[tokio::test]
async fn verification_is_idempotent() {
    let app = TestApp::new().await;
    let vendor_id = app.register_vendor("0xv1", "Steel Co").await;
    let service = &app.services().vendor_performance;

    service.verify_vendor(&app.owner, vendor_id).await.unwrap();
    service.verify_vendor(&app.owner, vendor_id).await.unwrap();
    assert!(service.vendor_performance(vendor_id).await.unwrap().is_verified);
}

#[tokio::test]
async fn stock_movements_feed_the_counters() {
    let app = TestApp::new().await;
    let vendor_id = app.register_vendor("0xv1", "Steel Co").await;
    app.register_manufacturer("0xm1").await;
    let material_id = app.add_material(vendor_id, "Steel", 100).await;
    app.services()
        .inventory
        .restock_material(&id("0xv1"), material_id, 50, dec!(5))
        .await
        .unwrap();
    let product_id = app.create_product("Battery").await;
    let lifecycle = &app.services().lifecycle;
    lifecycle
        .assign_material(&id("0xm1"), product_id, material_id, 30)
        .await
        .unwrap();
    lifecycle
        .assign_material(&id("0xm1"), product_id, material_id, 10)
        .await
        .unwrap();
    app.services()
        .inventory
        .return_material(&id("0xv1"), material_id, 5)
        .await
        .unwrap();

    let performance = app
        .services()
        .vendor_performance
        .vendor_performance(vendor_id)
        .await
        .unwrap();
    assert_eq!(performance.total_orders, 2);
    assert_eq!(performance.total_quantity_supplied, 150);
    assert_eq!(performance.completed_orders, 2);
    assert!(performance.last_activity_at.is_some());
}

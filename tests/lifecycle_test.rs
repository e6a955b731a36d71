mod common;

use assert_matches::assert_matches;
use common::{id, TestApp};
use supplychain_ledger::{
    entities::{product::Stage, supply_history::SupplyKind},
    errors::ServiceError,
    services::{audit::HistoryFilter, lifecycle::NewProduct},
};

/// Vendor 0xv1 with 100 kg of steel (+50 restocked), manufacturer 0xm1,
/// distributor 0xd1, retailer 0xr1 and an empty product.
async fn seeded() -> (TestApp, i32, i32) {
    let app = TestApp::new().await;
    let vendor_id = app.register_vendor("0xv1", "Steel Co").await;
    app.register_manufacturer("0xm1").await;
    app.register_distributor("0xd1").await;
    app.register_retailer("0xr1").await;
    let material_id = app.add_material(vendor_id, "Steel", 100).await;
    app.services()
        .inventory
        .restock_material(&app.owner, material_id, 50, rust_decimal::Decimal::new(5, 0))
        .await
        .unwrap();
    let product_id = app.create_product("Battery").await;
    (app, material_id, product_id)
}

#[tokio::test]
async fn new_products_start_unassigned() {
    let app = TestApp::new().await;
    let product_id = app.create_product("Battery").await;
    let lifecycle = &app.services().lifecycle;

    let product = lifecycle.get_product(product_id).await.unwrap();
    assert_eq!(product.stage, Stage::Init);
    assert_eq!(product.target_quantity, 10);
    assert_eq!(
        (product.manufacturer_id, product.distributor_id, product.retailer_id),
        (0, 0, 0)
    );

    let timeline = lifecycle.get_product_timeline(product_id).await.unwrap();
    assert_eq!(timeline.reached_at(Stage::Init), Some(timeline.created_at));
    assert!(timeline.materials_assigned_at.is_none());
    assert!(timeline.sold_at.is_none());
}

#[tokio::test]
async fn only_the_owner_creates_products() {
    let app = TestApp::new().await;
    app.register_manufacturer("0xm1").await;
    let lifecycle = &app.services().lifecycle;

    let input = NewProduct {
        name: "Battery".to_string(),
        description: String::new(),
        target_quantity: 10,
    };
    let err = lifecycle
        .create_product(&id("0xm1"), input.clone())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));

    let err = lifecycle
        .create_product(
            &app.owner,
            NewProduct {
                target_quantity: 0,
                ..input
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));
    assert_eq!(lifecycle.product_count().await.unwrap(), 0);
}

#[tokio::test]
async fn assigning_materials_deducts_stock_and_advances_once() {
    let (app, material_id, product_id) = seeded().await;
    let lifecycle = &app.services().lifecycle;

    let usage = lifecycle
        .assign_material(&id("0xm1"), product_id, material_id, 30)
        .await
        .unwrap();
    assert_eq!(usage.quantity_used, 30);

    let material = app.services().inventory.get_material(material_id).await.unwrap();
    assert_eq!(material.available_quantity, 120);
    assert_eq!(material.total_quantity, 150);

    let product = lifecycle.get_product(product_id).await.unwrap();
    assert_eq!(product.stage, Stage::MaterialsAssigned);
    let first_stamp = lifecycle
        .get_product_timeline(product_id)
        .await
        .unwrap()
        .materials_assigned_at;
    assert!(first_stamp.is_some());

    // Assigning the same material again merges into the existing usage row.
    let usage = lifecycle
        .assign_material(&app.owner, product_id, material_id, 20)
        .await
        .unwrap();
    assert_eq!(usage.quantity_used, 50);
    assert_eq!(lifecycle.get_product_materials_count(product_id).await.unwrap(), 1);
    assert_eq!(
        lifecycle
            .get_product_timeline(product_id)
            .await
            .unwrap()
            .materials_assigned_at,
        first_stamp
    );

    let used = app
        .services()
        .audit
        .supply_history(HistoryFilter {
            product_id: Some(product_id),
            kind: Some(SupplyKind::Used),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(used.iter().map(|row| row.quantity).sum::<i64>(), 50);
    assert!(used.iter().all(|row| row.material_id == material_id));
}

#[tokio::test]
async fn over_assignment_leaves_state_unchanged() {
    let (app, material_id, product_id) = seeded().await;
    let lifecycle = &app.services().lifecycle;
    lifecycle
        .assign_material(&id("0xm1"), product_id, material_id, 30)
        .await
        .unwrap();

    let err = lifecycle
        .assign_material(&id("0xm1"), product_id, material_id, 200)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientInventory {
            requested: 200,
            available: 120,
            ..
        }
    );

    let material = app.services().inventory.get_material(material_id).await.unwrap();
    assert_eq!(material.available_quantity, 120);
    let usages = lifecycle.get_product_materials(product_id).await.unwrap();
    assert_eq!(usages.len(), 1);
    assert_eq!(usages[0].quantity_used, 30);
    let history = app
        .services()
        .audit
        .supply_history(HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
}

#[tokio::test]
async fn assignment_rejects_bad_callers_and_targets() {
    let (app, material_id, product_id) = seeded().await;
    let lifecycle = &app.services().lifecycle;

    for caller in ["0xv1", "0xd1", "0xr1", "0xnobody"] {
        let err = lifecycle
            .assign_material(&id(caller), product_id, material_id, 1)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Unauthorized(_), "caller {}", caller);
    }

    assert_matches!(
        lifecycle
            .assign_material(&app.owner, 99, material_id, 1)
            .await,
        Err(ServiceError::ProductNotFound(99))
    );
    assert_matches!(
        lifecycle
            .assign_material(&app.owner, product_id, 99, 1)
            .await,
        Err(ServiceError::MaterialNotFound(99))
    );
    assert_matches!(
        lifecycle
            .assign_material(&app.owner, product_id, material_id, 0)
            .await,
        Err(ServiceError::InvalidInput(_))
    );
    assert_eq!(
        lifecycle.get_product(product_id).await.unwrap().stage,
        Stage::Init
    );
}

#[tokio::test]
async fn manufacturing_requires_materials() {
    let (app, _, product_id) = seeded().await;

    let err = app
        .services()
        .lifecycle
        .start_manufacturing(&id("0xm1"), product_id)
        .await
        .unwrap_err();
    // Init is the wrong stage before the materials check is reached.
    assert_matches!(
        err,
        ServiceError::InvalidStage {
            stage: Stage::Init,
            ..
        }
    );
}

#[tokio::test]
async fn manufacturing_starts_once() {
    let (app, material_id, product_id) = seeded().await;
    let lifecycle = &app.services().lifecycle;
    lifecycle
        .assign_material(&id("0xm1"), product_id, material_id, 30)
        .await
        .unwrap();

    let product = lifecycle
        .start_manufacturing(&id("0xm1"), product_id)
        .await
        .unwrap();
    assert_eq!(product.manufacturer_id, 1);
    assert_eq!(product.stage, Stage::Manufacturing);

    let err = lifecycle
        .start_manufacturing(&id("0xm1"), product_id)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InvalidStage {
            stage: Stage::Manufacturing,
            operation: "start_manufacturing",
            ..
        }
    );

    let err = lifecycle
        .assign_material(&id("0xm1"), product_id, material_id, 1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStage { .. });
}

#[tokio::test]
async fn full_happy_path_stamps_every_milestone() {
    let (app, material_id, product_id) = seeded().await;
    let lifecycle = &app.services().lifecycle;

    lifecycle
        .assign_material(&id("0xm1"), product_id, material_id, 30)
        .await
        .unwrap();
    lifecycle
        .start_manufacturing(&id("0xm1"), product_id)
        .await
        .unwrap();
    let product = lifecycle
        .start_distribution(&id("0xd1"), product_id)
        .await
        .unwrap();
    assert_eq!(product.distributor_id, 1);

    let err = lifecycle
        .mark_as_sold(&id("0xr1"), product_id)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InvalidStage {
            stage: Stage::Distribution,
            ..
        }
    );

    let product = lifecycle
        .receive_at_retail(&id("0xr1"), product_id)
        .await
        .unwrap();
    assert_eq!(product.retailer_id, 1);
    let product = lifecycle.mark_as_sold(&id("0xr1"), product_id).await.unwrap();
    assert_eq!(product.stage, Stage::Sold);

    let timeline = lifecycle.get_product_timeline(product_id).await.unwrap();
    let stamps: Vec<_> = Stage::ALL
        .iter()
        .map(|stage| timeline.reached_at(*stage).expect("milestone stamped"))
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));

    for (caller, result) in [
        ("0xm1", lifecycle.start_manufacturing(&id("0xm1"), product_id).await),
        ("0xd1", lifecycle.start_distribution(&id("0xd1"), product_id).await),
        ("0xr1", lifecycle.receive_at_retail(&id("0xr1"), product_id).await),
        ("0xr1", lifecycle.mark_as_sold(&id("0xr1"), product_id).await),
    ] {
        assert_matches!(
            result,
            Err(ServiceError::InvalidStage {
                stage: Stage::Sold,
                ..
            }),
            "caller {}",
            caller
        );
    }
    assert_eq!(lifecycle.get_product_timeline(product_id).await.unwrap(), timeline);
}

#[tokio::test]
async fn transitions_are_bound_to_roles() {
    let (app, material_id, product_id) = seeded().await;
    let lifecycle = &app.services().lifecycle;
    lifecycle
        .assign_material(&app.owner, product_id, material_id, 10)
        .await
        .unwrap();

    // The Owner does not stand in for supply-chain parties.
    for caller in [common::OWNER, "0xd1", "0xr1", "0xv1"] {
        let err = lifecycle
            .start_manufacturing(&id(caller), product_id)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Unauthorized(_), "caller {}", caller);
    }

    // Authorization is checked before the stage.
    let err = lifecycle
        .receive_at_retail(&id("0xm1"), product_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));

    assert_matches!(
        lifecycle.start_manufacturing(&id("0xm1"), 77).await,
        Err(ServiceError::ProductNotFound(77))
    );
}

#[tokio::test]
async fn only_the_receiving_retailer_sells() {
    let (app, material_id, product_id) = seeded().await;
    app.register_retailer("0xr2").await;
    let lifecycle = &app.services().lifecycle;

    lifecycle
        .assign_material(&id("0xm1"), product_id, material_id, 10)
        .await
        .unwrap();
    lifecycle
        .start_manufacturing(&id("0xm1"), product_id)
        .await
        .unwrap();
    lifecycle
        .start_distribution(&id("0xd1"), product_id)
        .await
        .unwrap();
    lifecycle
        .receive_at_retail(&id("0xr1"), product_id)
        .await
        .unwrap();

    let err = lifecycle
        .mark_as_sold(&id("0xr2"), product_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));
    assert_eq!(
        lifecycle.get_product(product_id).await.unwrap().stage,
        Stage::Retail
    );
}

#[tokio::test]
async fn product_queries_report_not_found() {
    let app = TestApp::new().await;
    let lifecycle = &app.services().lifecycle;

    assert_matches!(
        lifecycle.get_product(5).await,
        Err(ServiceError::ProductNotFound(5))
    );
    assert_matches!(
        lifecycle.get_product_materials(5).await,
        Err(ServiceError::ProductNotFound(5))
    );
    assert_matches!(
        lifecycle.get_product_timeline(5).await,
        Err(ServiceError::ProductNotFound(5))
    );
    assert!(lifecycle.list_products().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assignments_never_overdraw() {
    let (app, material_id, product_id) = seeded().await;

    // 150 units on hand, 10 requests of 20 each: exactly 7 fit.
    let mut tasks = Vec::new();
    for _ in 0..10 {
        let state = app.state.clone();
        tasks.push(tokio::spawn(async move {
            state
                .services
                .lifecycle
                .assign_material(&id("0xm1"), product_id, material_id, 20)
                .await
        }));
    }

    let mut committed = 0;
    let mut refused = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => committed += 1,
            Err(ServiceError::InsufficientInventory {
                requested: 20,
                available,
                ..
            }) => {
                assert_eq!(available, 10);
                refused += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(committed, 7);
    assert_eq!(refused, 3);

    let material = app.services().inventory.get_material(material_id).await.unwrap();
    assert_eq!(material.available_quantity, 10);
    assert_eq!(material.total_quantity, 150);
    let used: i64 = app
        .services()
        .lifecycle
        .get_product_materials(product_id)
        .await
        .unwrap()
        .iter()
        .map(|usage| usage.quantity_used)
        .sum();
    assert_eq!(used, 140);
    assert!(app.services().audit.verify_conservation().await.unwrap().is_empty());
}

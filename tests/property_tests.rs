//! Property-based tests for the ledger invariants.
//!
//! Random command sequences are replayed against a fresh in-memory ledger;
//! whatever mix of successes and rejections results, stock must be conserved
//! and product stages must only move forward.

mod common;

use common::{id, TestApp};
use proptest::prelude::*;
use rust_decimal::Decimal;
use supplychain_ledger::{entities::product::Stage, errors::ServiceError};

#[derive(Debug, Clone)]
enum StockOp {
    Restock(i64),
    Assign(i64),
    Return(i64),
}

fn stock_op_strategy() -> impl Strategy<Value = StockOp> {
    prop_oneof![
        (1i64..80).prop_map(StockOp::Restock),
        (1i64..120).prop_map(StockOp::Assign),
        (1i64..60).prop_map(StockOp::Return),
    ]
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Manufacture,
    Distribute,
    Receive,
    Sell,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Manufacture),
        Just(Step::Distribute),
        Just(Step::Receive),
        Just(Step::Sell),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn stock_is_conserved(initial in 1i64..200, ops in prop::collection::vec(stock_op_strategy(), 1..12)) {
        let outcome: Result<(), TestCaseError> = runtime().block_on(async {
            let app = TestApp::new().await;
            let vendor_id = app.register_vendor("0xv1", "Steel Co").await;
            app.register_manufacturer("0xm1").await;
            let material_id = app.add_material(vendor_id, "Steel", initial).await;
            let product_id = app.create_product("Battery").await;
            let services = app.services();

            let mut expected_total = initial;
            let mut expected_available = initial;
            for op in &ops {
                match *op {
                    StockOp::Restock(q) => {
                        services
                            .inventory
                            .restock_material(&id("0xv1"), material_id, q, Decimal::new(5, 0))
                            .await
                            .map_err(|e| TestCaseError::fail(e.to_string()))?;
                        expected_total += q;
                        expected_available += q;
                    }
                    StockOp::Assign(q) => {
                        match services.lifecycle.assign_material(&id("0xm1"), product_id, material_id, q).await {
                            Ok(_) => expected_available -= q,
                            Err(ServiceError::InsufficientInventory { .. }) => {
                                prop_assert!(q > expected_available);
                            }
                            Err(e) => return Err(TestCaseError::fail(e.to_string())),
                        }
                    }
                    StockOp::Return(q) => {
                        match services.inventory.return_material(&id("0xv1"), material_id, q).await {
                            Ok(_) => {
                                expected_total -= q;
                                expected_available -= q;
                            }
                            Err(ServiceError::InsufficientInventory { .. }) => {
                                prop_assert!(q > expected_available);
                            }
                            Err(e) => return Err(TestCaseError::fail(e.to_string())),
                        }
                    }
                }
            }

            let material = services
                .inventory
                .get_material(material_id)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(material.total_quantity, expected_total);
            prop_assert_eq!(material.available_quantity, expected_available);
            prop_assert!(material.available_quantity >= 0);
            prop_assert!(material.available_quantity <= material.total_quantity);

            let used: i64 = services
                .lifecycle
                .get_product_materials(product_id)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?
                .iter()
                .map(|usage| usage.quantity_used)
                .sum();
            prop_assert_eq!(material.available_quantity + used, material.total_quantity);

            let violations = services
                .audit
                .verify_conservation()
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!(violations.is_empty(), "violations: {:?}", violations);
            Ok(())
        });
        outcome?;
    }

    #[test]
    fn stages_never_move_backwards(steps in prop::collection::vec(step_strategy(), 1..10)) {
        let outcome: Result<(), TestCaseError> = runtime().block_on(async {
            let app = TestApp::new().await;
            let vendor_id = app.register_vendor("0xv1", "Steel Co").await;
            app.register_manufacturer("0xm1").await;
            app.register_distributor("0xd1").await;
            app.register_retailer("0xr1").await;
            let material_id = app.add_material(vendor_id, "Steel", 100).await;
            let product_id = app.create_product("Battery").await;
            let lifecycle = &app.services().lifecycle;
            lifecycle
                .assign_material(&id("0xm1"), product_id, material_id, 10)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            let mut stage = Stage::MaterialsAssigned;
            for step in &steps {
                let result = match step {
                    Step::Manufacture => lifecycle.start_manufacturing(&id("0xm1"), product_id).await,
                    Step::Distribute => lifecycle.start_distribution(&id("0xd1"), product_id).await,
                    Step::Receive => lifecycle.receive_at_retail(&id("0xr1"), product_id).await,
                    Step::Sell => lifecycle.mark_as_sold(&id("0xr1"), product_id).await,
                };
                match result {
                    Ok(product) => {
                        prop_assert_eq!(Some(product.stage), stage.next());
                        stage = product.stage;
                    }
                    Err(ServiceError::InvalidStage { stage: seen, .. }) => {
                        prop_assert_eq!(seen, stage);
                    }
                    Err(e) => return Err(TestCaseError::fail(e.to_string())),
                }
            }

            let product = lifecycle
                .get_product(product_id)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(product.stage, stage);

            let timeline = lifecycle
                .get_product_timeline(product_id)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            for candidate in Stage::ALL {
                prop_assert_eq!(timeline.reached_at(candidate).is_some(), candidate <= stage);
            }
            Ok(())
        });
        outcome?;
    }
}

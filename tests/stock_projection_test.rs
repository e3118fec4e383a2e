mod common;

use assert_matches::assert_matches;
use common::{ts, TestApp};
use sea_orm::{ActiveModelTrait, Set};
use stockledger_api::{
    entities::{product, stock_transaction::TransactionType},
    services::movements::NewMovement,
    ServiceError,
};

#[tokio::test]
async fn projection_folds_effects_by_type() {
    let app = TestApp::new().await;
    app.create_product("SKU-1", 0).await;
    let movements = &app.state.services.movements;

    movements
        .record_movement(NewMovement::new("SKU-1", TransactionType::Inbound, 100))
        .await
        .unwrap();
    movements
        .record_movement(NewMovement::new("SKU-1", TransactionType::Outbound, 30))
        .await
        .unwrap();
    movements
        .record_movement(NewMovement::new("SKU-1", TransactionType::Return, 5))
        .await
        .unwrap();
    movements
        .record_movement(NewMovement::new("SKU-1", TransactionType::Adjust, -10))
        .await
        .unwrap();

    let projection = app
        .state
        .services
        .projection
        .project_current_stock("SKU-1", None)
        .await
        .unwrap();

    assert_eq!(projection.stock, 100 - 30 + 5 - 10);
    assert_eq!(projection.cached_stock, projection.stock);
    assert!(!projection.cache_divergence);
    assert!(projection.checkpoint_id.is_none());
}

#[tokio::test]
async fn as_of_projection_ignores_later_transactions() {
    let app = TestApp::new().await;
    app.create_product("SKU-1", 0).await;
    let movements = &app.state.services.movements;

    movements
        .record_movement(
            NewMovement::new("SKU-1", TransactionType::Inbound, 100).occurred_at(ts(2024, 3, 1, 9)),
        )
        .await
        .unwrap();
    movements
        .record_movement(
            NewMovement::new("SKU-1", TransactionType::Outbound, 30).occurred_at(ts(2024, 3, 2, 9)),
        )
        .await
        .unwrap();

    let projection = app
        .state
        .services
        .projection
        .project_current_stock("SKU-1", Some(ts(2024, 3, 1, 23)))
        .await
        .unwrap();
    assert_eq!(projection.stock, 100);

    let projection = app
        .state
        .services
        .projection
        .project_current_stock("SKU-1", Some(ts(2024, 3, 2, 23)))
        .await
        .unwrap();
    assert_eq!(projection.stock, 70);
}

#[tokio::test]
async fn projection_floors_on_latest_active_checkpoint() {
    let app = TestApp::new().await;
    app.create_product("SKU-1", 0).await;
    let movements = &app.state.services.movements;

    movements
        .record_movement(
            NewMovement::new("SKU-1", TransactionType::Inbound, 100).occurred_at(ts(2024, 3, 1, 9)),
        )
        .await
        .unwrap();

    // Physical count found 95; prior transactions stop contributing.
    let checkpoint = app
        .state
        .services
        .checkpoints
        .record_adjustment_checkpoint("SKU-1", 95, Some("cycle count".into()), Some(ts(2024, 3, 1, 12)))
        .await
        .unwrap();

    movements
        .record_movement(
            NewMovement::new("SKU-1", TransactionType::Outbound, 20).occurred_at(ts(2024, 3, 1, 15)),
        )
        .await
        .unwrap();

    let projection = app
        .state
        .services
        .projection
        .project_current_stock("SKU-1", None)
        .await
        .unwrap();
    assert_eq!(projection.stock, 75);
    assert_eq!(projection.checkpoint_id, Some(checkpoint.checkpoint.id));
}

#[tokio::test]
async fn projector_is_authoritative_over_a_diverged_cache() {
    let app = TestApp::new().await;
    let prod = app.create_product("SKU-1", 0).await;
    app.state
        .services
        .movements
        .record_movement(NewMovement::new("SKU-1", TransactionType::Inbound, 40))
        .await
        .unwrap();

    // Corrupt the cache out-of-band.
    let mut active: product::ActiveModel = prod.into();
    active.current_stock = Set(999);
    active.update(app.state.db.as_ref()).await.unwrap();

    let projection = app
        .state
        .services
        .projection
        .project_current_stock("SKU-1", None)
        .await
        .unwrap();
    assert_eq!(projection.stock, 40);
    assert_eq!(projection.cached_stock, 999);
    assert!(projection.cache_divergence);
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .projection
        .project_current_stock("NOPE", None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

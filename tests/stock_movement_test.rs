mod common;

use assert_matches::assert_matches;
use common::TestApp;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use stockledger_api::{
    entities::{
        product::Entity as Products,
        stock_transaction::{self, Entity as StockTransactions, TransactionType},
    },
    services::movements::NewMovement,
    ServiceError,
};

#[tokio::test]
async fn movement_snapshots_and_updates_cache() {
    let app = TestApp::new().await;
    app.create_product("SKU-1", 0).await;

    let result = app
        .state
        .services
        .movements
        .record_movement(NewMovement::new("SKU-1", TransactionType::Inbound, 100))
        .await
        .expect("inbound movement");

    assert_eq!(result.previous_stock, 0);
    assert_eq!(result.new_stock, 100);

    let result = app
        .state
        .services
        .movements
        .record_movement(NewMovement::new("SKU-1", TransactionType::Outbound, 30))
        .await
        .expect("outbound movement");

    assert_eq!(result.previous_stock, 100);
    assert_eq!(result.new_stock, 70);

    let prod = Products::find_by_id("SKU-1".to_string())
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prod.current_stock, 70);

    // Every stored row satisfies the snapshot arithmetic invariant.
    let rows = StockTransactions::find()
        .filter(stock_transaction::Column::ProductCode.eq("SKU-1"))
        .all(app.state.db.as_ref())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        let effect = row.signed_effect().unwrap();
        assert_eq!(row.new_stock, row.previous_stock + effect);
        assert!(row.affects_current_stock);
        assert!(row.checkpoint_id.is_none());
    }
}

#[tokio::test]
async fn adjust_quantity_is_a_signed_delta() {
    let app = TestApp::new().await;
    app.create_product("SKU-1", 50).await;

    let result = app
        .state
        .services
        .movements
        .record_movement(NewMovement::new("SKU-1", TransactionType::Adjust, 5))
        .await
        .expect("adjustment");

    assert_eq!(result.previous_stock, 50);
    assert_eq!(result.new_stock, 55);
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .movements
        .record_movement(NewMovement::new("NOPE", TransactionType::Inbound, 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn stale_expected_previous_stock_is_rejected() {
    let app = TestApp::new().await;
    app.create_product("SKU-1", 10).await;

    let err = app
        .state
        .services
        .movements
        .record_movement(
            NewMovement::new("SKU-1", TransactionType::Outbound, 5).expecting_previous_stock(12),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // Nothing was committed.
    let rows = StockTransactions::find()
        .filter(stock_transaction::Column::ProductCode.eq("SKU-1"))
        .all(app.state.db.as_ref())
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn negative_stock_is_rejected_by_default() {
    let app = TestApp::new().await;
    app.create_product("SKU-1", 10).await;

    let err = app
        .state
        .services
        .movements
        .record_movement(NewMovement::new("SKU-1", TransactionType::Outbound, 11))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // Adjustments record observed reality and may go below zero.
    let result = app
        .state
        .services
        .movements
        .record_movement(NewMovement::new("SKU-1", TransactionType::Adjust, -15))
        .await
        .expect("negative adjustment");
    assert_eq!(result.new_stock, -5);
}

#[tokio::test]
async fn invalid_quantities_are_rejected() {
    let app = TestApp::new().await;
    app.create_product("SKU-1", 10).await;

    for movement in [
        NewMovement::new("SKU-1", TransactionType::Inbound, 0),
        NewMovement::new("SKU-1", TransactionType::Outbound, -3),
        NewMovement::new("SKU-1", TransactionType::Adjust, 0),
    ] {
        let err = app
            .state
            .services
            .movements
            .record_movement(movement)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidInput(_));
    }
}

#[tokio::test]
async fn concurrent_appends_for_one_product_serialize() {
    let app = TestApp::new().await;
    app.create_product("SKU-1", 100).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let movements = app.state.services.movements.clone();
        handles.push(tokio::spawn(async move {
            movements
                .record_movement(NewMovement::new("SKU-1", TransactionType::Outbound, 1))
                .await
        }));
    }
    for handle in handles {
        handle.await.expect("task").expect("movement");
    }

    let prod = Products::find_by_id("SKU-1".to_string())
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prod.current_stock, 80);

    // The snapshots must form an unbroken chain regardless of interleaving.
    let mut news: Vec<i64> = StockTransactions::find()
        .filter(stock_transaction::Column::ProductCode.eq("SKU-1"))
        .all(app.state.db.as_ref())
        .await
        .unwrap()
        .iter()
        .map(|t| t.new_stock)
        .collect();
    news.sort_unstable();
    assert_eq!(news, (80..100).collect::<Vec<i64>>());
}

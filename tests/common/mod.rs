use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, Set};
use std::sync::Arc;
use stockledger_api::{
    config::AppConfig,
    db::{establish_connection_with_config, run_migrations, DbConfig},
    entities::product,
    events::{self, EventSender},
    AppState,
};
use tokio::sync::mpsc;

/// Helper harness wiring the full service set to an in-memory SQLite
/// database. One connection only: a shared-cache memory database vanishes
/// with its last connection, and per-product locking already serializes
/// writers above the pool.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::new("sqlite::memory:", "test")).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let db_config = DbConfig {
            url: config.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = establish_connection_with_config(&db_config)
            .await
            .expect("Failed to create DB pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let (tx, rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(rx));
        let event_sender = Arc::new(EventSender::new(tx));

        let state = AppState::new(Arc::new(pool), config, event_sender);

        Self {
            state,
            _event_task: event_task,
        }
    }

    /// Inserts an active product with the given cached stock.
    pub async fn create_product(&self, code: &str, current_stock: i64) -> product::Model {
        let prod = product::ActiveModel {
            code: Set(code.to_string()),
            name: Set(format!("Test product {}", code)),
            category: Set(None),
            unit: Set(Some("ea".to_string())),
            safety_stock: Set(0),
            lead_time_days: Set(0),
            is_active: Set(true),
            current_stock: Set(current_stock),
            updated_at: Set(None),
            ..Default::default()
        };
        prod.insert(self.state.db.as_ref())
            .await
            .expect("Failed to insert product")
    }

    #[allow(dead_code)]
    pub async fn create_inactive_product(&self, code: &str) -> product::Model {
        let prod = product::ActiveModel {
            code: Set(code.to_string()),
            name: Set(format!("Inactive product {}", code)),
            category: Set(None),
            unit: Set(None),
            safety_stock: Set(0),
            lead_time_days: Set(0),
            is_active: Set(false),
            current_stock: Set(0),
            updated_at: Set(None),
            ..Default::default()
        };
        prod.insert(self.state.db.as_ref())
            .await
            .expect("Failed to insert product")
    }
}

#[allow(dead_code)]
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[allow(dead_code)]
pub fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
        .single()
        .expect("valid timestamp")
}

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use order_desk::{
    auth::{Actor, Role},
    config::AppConfig,
    db::{self, DbConfig},
    entities::{color, dealer, factory, material_item, product_model, stock_location},
    events::{Event, EventSender},
    services::orders::NewOrder,
    AppState,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Reference rows every test can build orders and stock keys from.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    pub dealer_id: Uuid,
    pub model_id: Uuid,
    pub color_id: Uuid,
    pub factory_id: Uuid,
    pub item_id: Uuid,
    pub location_id: Uuid,
}

/// Application state over a fresh, migrated SQLite database.
pub struct TestContext {
    pub state: AppState,
    pub db: Arc<DatabaseConnection>,
    pub catalog: Catalog,
    pub events: mpsc::Receiver<Event>,
    // Keeps a file-backed database alive for the test's duration.
    _db_dir: Option<TempDir>,
}

impl TestContext {
    /// In-memory database behind a single connection.
    pub async fn new() -> Self {
        Self::with_db(
            DbConfig {
                url: "sqlite::memory:".into(),
                max_connections: 1,
                min_connections: 1,
                ..Default::default()
            },
            None,
        )
        .await
    }

    /// File database behind a multi-connection pool, so concurrent
    /// transactions really contend for the SQLite write lock.
    pub async fn file_backed() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("order-desk.db").display());
        Self::with_db(
            DbConfig {
                url,
                max_connections: 8,
                min_connections: 1,
                ..Default::default()
            },
            Some(dir),
        )
        .await
    }

    async fn with_db(db_config: DbConfig, db_dir: Option<TempDir>) -> Self {
        let pool = db::establish_connection_with_config(&db_config)
            .await
            .expect("test database");
        db::run_migrations(&pool).await.expect("migrations");

        let db = Arc::new(pool);
        let catalog = seed_catalog(&db).await;
        let (tx, rx) = mpsc::channel(1024);

        let mut config = AppConfig::new(
            db_config.url.clone(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        config.cors_allow_any_origin = true;

        let state = AppState::new(db.clone(), config, EventSender::new(tx));
        Self {
            state,
            db,
            catalog,
            events: rx,
            _db_dir: db_dir,
        }
    }

    pub fn new_order(&self, order_number: &str) -> NewOrder {
        NewOrder {
            order_number: order_number.to_string(),
            dealer_id: self.catalog.dealer_id,
            model_id: self.catalog.model_id,
            color_id: self.catalog.color_id,
            factory_id: self.catalog.factory_id,
            delivery_address: "400 Marina Way, Sausalito".to_string(),
            payment_proof_url: None,
            serial_number: None,
            requested_ship_date: None,
            priority_rank: None,
            hardware_options: vec!["STAINLESS_CLEATS".to_string()],
        }
    }

    /// Drains every event emitted so far.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

pub fn staff() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Staff)
}

pub fn dealer_actor() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Dealer)
}

async fn seed_catalog(db: &DatabaseConnection) -> Catalog {
    let now = Utc::now();
    let dealer_id = Uuid::new_v4();
    let model_id = Uuid::new_v4();
    let color_id = Uuid::new_v4();
    let factory_id = Uuid::new_v4();
    let item_id = Uuid::new_v4();
    let location_id = Uuid::new_v4();

    dealer::ActiveModel {
        id: Set(dealer_id),
        code: Set("D-001".into()),
        name: Set("Harbor Marine".into()),
        created_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed dealer");
    product_model::ActiveModel {
        id: Set(model_id),
        code: Set("M-24".into()),
        name: Set("Cruiser 24".into()),
        created_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed model");
    color::ActiveModel {
        id: Set(color_id),
        code: Set("C-NAVY".into()),
        name: Set("Navy".into()),
        created_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed color");
    factory::ActiveModel {
        id: Set(factory_id),
        code: Set("F-TX".into()),
        name: Set("Texas Plant".into()),
        created_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed factory");
    material_item::ActiveModel {
        id: Set(item_id),
        code: Set("RESIN-01".into()),
        name: Set("Gelcoat resin".into()),
        created_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed material item");
    stock_location::ActiveModel {
        id: Set(location_id),
        code: Set("WH-A".into()),
        name: Set("Warehouse A".into()),
        created_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed location");

    Catalog {
        dealer_id,
        model_id,
        color_id,
        factory_id,
        item_id,
        location_id,
    }
}

use autowa::load_config;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use std::sync::Once;

static INIT: Once = Once::new();

/// Connects to the test database and runs migrations, mirroring the
/// connection the binary itself establishes at startup.
pub async fn init_test_db() -> PgPool {
    INIT.call_once(|| {
        dotenvy::dotenv().ok();
    });

    let config = load_config().expect("failed to load test config");
    let pool = PgPool::connect(config.database.connection_string().expose_secret())
        .await
        .expect("failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations against test database");

    pool
}

/// Inserts a fresh workspace + channel for a test to scope its rows under,
/// so parallel tests never collide on the partial-unique indexes.
pub async fn seed_workspace(pool: &PgPool, label: &str) -> (uuid::Uuid, uuid::Uuid) {
    let workspace_id: uuid::Uuid = sqlx::query_scalar(
        "INSERT INTO workspaces (display_name, vertical) VALUES ($1, 'food_service') RETURNING id",
    )
    .bind(format!("test-{label}"))
    .fetch_one(pool)
    .await
    .expect("failed to seed workspace");

    let channel_id: uuid::Uuid = sqlx::query_scalar(
        "INSERT INTO channels (workspace_id, display_phone) VALUES ($1, $2) RETURNING id",
    )
    .bind(workspace_id)
    .bind(format!("+1555{:07}", rand::random::<u32>() % 10_000_000))
    .fetch_one(pool)
    .await
    .expect("failed to seed channel");

    (workspace_id, channel_id)
}

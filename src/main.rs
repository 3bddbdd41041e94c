use dotenvy::dotenv;
use queue_buddy::config::{self, database};
use queue_buddy::core::{auth::AdminCredentials, settings};
use queue_buddy::errors::Result;
use queue_buddy::web::{self, AppState};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the main application configuration
    let app_config = config::load_app_configuration()?;
    info!("Successfully processed application configuration.");

    // 4. The admin login must be configured before anything is served
    let admin = AdminCredentials::new(
        app_config.admin.username.clone(),
        app_config.admin_password_hash()?,
    )
    .inspect_err(|e| error!("Invalid admin credentials: {}", e))?;

    // 5. Initialize database
    let db = database::create_connection()
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 6. Seed venue settings (if missing)
    settings::seed_default_settings(&db, &app_config.venue)
        .await
        .inspect(|()| info!("Venue settings seeded successfully."))
        .inspect_err(|e| error!("Failed to seed venue settings: {}", e))?;

    // 7. Serve
    let listener = TcpListener::bind(&app_config.server.bind_address)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", app_config.server.bind_address, e))?;

    web::serve(listener, AppState::new(db, admin)).await
}

use std::error::Error;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use event_booker_server::blob::{BlobStore, MemoryBlobStore, S3BlobStore};
use event_booker_server::config::Config;
use event_booker_server::mail::{LogMailer, Mailer, SmtpMailer};
use event_booker_server::routes::create_routes;
use event_booker_server::state::AppState;
use event_booker_server::store::PgStore;
use event_booker_server::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;
    telemetry::init(config.log_format);

    let store = PgStore::connect(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Successfully connected to database");

    store.migrate().await?;
    tracing::info!("Migrations run successfully");

    let blobs: Arc<dyn BlobStore> = match &config.s3 {
        Some(s3) => {
            tracing::info!(bucket = %s3.bucket, region = %s3.region, "using S3 blob storage");
            Arc::new(S3BlobStore::new(s3)?)
        }
        None => {
            tracing::warn!("AWS_S3_BUCKET_NAME not set, uploads are kept in memory");
            Arc::new(MemoryBlobStore::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("SMTP not configured, outgoing mail is only logged");
            Arc::new(LogMailer)
        }
    };

    let addr = config.bind_address();
    let app_name = config.app_name.clone();
    let state = AppState::new(config, Arc::new(store), blobs, mailer);
    let app: Router = create_routes(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(app = %app_name, "Server running at http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

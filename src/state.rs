use std::sync::Arc;
use std::time::Duration;

use crate::auth::jwt::TokenSigner;
use crate::blob::BlobStore;
use crate::config::Config;
use crate::mail::Mailer;
use crate::store::Store;

/// Handles shared by every request, built once at start-up.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub blobs: Arc<dyn BlobStore>,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: Arc<TokenSigner>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        blobs: Arc<dyn BlobStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let tokens = TokenSigner::new(&config.access_token_secret, config.access_token_ttl_minutes);
        Self {
            config: Arc::new(config),
            store,
            blobs,
            mailer,
            tokens: Arc::new(tokens),
        }
    }

    pub fn file_link_ttl(&self) -> Duration {
        Duration::from_secs(self.config.file_link_ttl_seconds)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::config::{AppEnv, LogFormat};
    use crate::mail::testing::RecordingMailer;
    use crate::store::MemoryStore;

    pub fn test_config() -> Config {
        Config {
            app_env: AppEnv::Local,
            app_name: "event-booker-test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "postgres://unused".to_string(),
            database_max_connections: 1,
            access_token_secret: "test-secret".to_string(),
            access_token_ttl_minutes: 60,
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            log_format: LogFormat::Text,
            file_link_ttl_seconds: 3600,
            s3: None,
            smtp: None,
        }
    }

    /// State over in-memory backends. The mailer is returned for assertions.
    pub fn test_state() -> (AppState, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(
            test_config(),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBlobStore::new()),
            mailer.clone(),
        );
        (state, mailer)
    }
}

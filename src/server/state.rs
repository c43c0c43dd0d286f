use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::directory::{create_directory_client, CachedDirectory};
use crate::dispatch::{DispatchEngine, RetrySweeper};
use crate::gateway::{create_delivery_gateway, ProtectedGateway};
use crate::ratelimit::{create_rate_limiter, RateLimiter};
use crate::store::{create_notification_store, NotificationStore};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn NotificationStore>,
    pub directory: Arc<CachedDirectory>,
    pub gateway: Arc<ProtectedGateway>,
    pub engine: Arc<DispatchEngine>,
    pub sweeper: Arc<RetrySweeper>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire every component from configuration. Backend choices are
    /// made here, once; everything downstream works against the traits.
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let store = create_notification_store(&settings.store, &settings.database).await?;
        let directory = create_directory_client(&settings.directory)?;
        let gateway = create_delivery_gateway(&settings.gateway)?;
        let rate_limiter = create_rate_limiter(&settings.ratelimit);

        let engine = Arc::new(DispatchEngine::new(
            store.clone(),
            directory.clone(),
            gateway.clone(),
            rate_limiter.clone(),
            settings.dispatch.clone(),
        ));
        let sweeper = Arc::new(RetrySweeper::new(engine.clone()));

        Ok(Self {
            settings: Arc::new(settings),
            store,
            directory,
            gateway,
            engine,
            sweeper,
            rate_limiter,
            start_time: Instant::now(),
        })
    }
}

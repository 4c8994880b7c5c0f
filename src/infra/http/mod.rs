mod middleware;
mod public;

pub use public::{HttpState, build_router};

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use axum::Router;
use time::OffsetDateTime;
use tokio::{net::TcpListener, sync::Notify};
use tracing::{info, warn};

use crate::{
    application::seo::SeoService,
    config::{RateLimitSettings, SiteSettings},
    domain::seo::SeoOverrides,
    infra::error::InfraError,
    presentation::views::{LayoutChrome, PageMetaView},
    util::security::RateLimiter,
};

impl HttpState {
    pub fn new(
        root: impl Into<PathBuf>,
        site: &SiteSettings,
        rate_limit: &RateLimitSettings,
    ) -> Self {
        let seo = SeoService::new(site.clone()).generate_seo(SeoOverrides {
            title: Some("Page Not Found".to_string()),
            ..Default::default()
        });
        let meta = PageMetaView::from_seo(&seo, site, Vec::new());
        let year = OffsetDateTime::now_utc().year();
        Self {
            root: Arc::new(root.into()),
            chrome: Arc::new(LayoutChrome::for_site(site, meta, year)),
            limiter: RateLimiter::new(
                Duration::from_secs(u64::from(rate_limit.window_seconds.get())),
                rate_limit.max_requests.get(),
            ),
        }
    }
}

/// Serve `router` until Ctrl-C, then give open connections `grace` to finish.
pub async fn serve(router: Router, addr: SocketAddr, grace: Duration) -> Result<(), InfraError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| InfraError::server(format!("failed to bind {addr}: {err}")))?;
    info!(target = "folio::http", %addr, "preview server listening");

    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { signal.notified().await });
    let mut handle = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut handle => return flatten(joined),
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!(target = "folio::http", error = %err, "failed to listen for Ctrl-C");
            }
            info!(target = "folio::http", "shutdown requested");
        }
    }

    shutdown.notify_one();
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(joined) => flatten(joined),
        Err(_) => {
            warn!(
                target = "folio::http",
                grace_seconds = grace.as_secs(),
                "connections still open after grace period, stopping"
            );
            handle.abort();
            Ok(())
        }
    }
}

fn flatten(
    joined: Result<Result<(), std::io::Error>, tokio::task::JoinError>,
) -> Result<(), InfraError> {
    match joined {
        Ok(result) => result.map_err(|err| InfraError::server(err.to_string())),
        Err(err) => Err(InfraError::server(format!("server task failed: {err}"))),
    }
}

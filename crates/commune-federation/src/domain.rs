//! Federation domain resolution.
//!
//! The externally addressable domain of this bridge is derived from two
//! persisted settings and memoized for the lifetime of the process. Standard
//! ports (80/443) are elided from the domain string; any other port is
//! appended as `domain:port`.
//!
//! Settings changed after the first resolution are NOT picked up — a restart
//! is required for a new federation domain to take effect.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::error::BridgeError;

/// Setting key for the federation domain (e.g. `chat.example.org`).
pub const FEDERATION_DOMAIN_SETTING: &str = "federation.domain";

/// Setting key for the federation port.
pub const FEDERATION_PORT_SETTING: &str = "federation.port";

// ─── Settings collaborator ───────────────────────────────────────────────────

/// Read-only access to persisted settings.
#[async_trait]
pub trait SettingsReader: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, BridgeError>;
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Computes and memoizes this bridge's externally addressable domain.
pub struct DomainResolver {
    settings: Arc<dyn SettingsReader>,
    cached: OnceCell<String>,
}

impl DomainResolver {
    pub fn new(settings: Arc<dyn SettingsReader>) -> Self {
        Self { settings, cached: OnceCell::new() }
    }

    /// The federation domain, read from settings on first use and cached for
    /// the process lifetime.
    pub async fn resolve(&self) -> Result<String, BridgeError> {
        self.cached
            .get_or_try_init(|| async {
                let domain = self
                    .settings
                    .get(FEDERATION_DOMAIN_SETTING)
                    .await?
                    .ok_or_else(|| {
                        BridgeError::Validation(format!(
                            "setting {FEDERATION_DOMAIN_SETTING} is not configured"
                        ))
                    })?;

                let port: u16 = match self.settings.get(FEDERATION_PORT_SETTING).await? {
                    Some(raw) => raw.parse().map_err(|_| {
                        BridgeError::Validation(format!(
                            "setting {FEDERATION_PORT_SETTING} is not a valid port: {raw}"
                        ))
                    })?,
                    None => 443,
                };

                Ok(if port == 80 || port == 443 { domain } else { format!("{domain}:{port}") })
            })
            .await
            .map(Clone::clone)
    }
}

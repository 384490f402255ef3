//! Concrete platform adapters, one module per platform.

pub mod amazon;
pub mod amazon_fresh;
pub(crate) mod common;
pub mod costco;
pub mod doordash;
pub mod drizly;
pub mod grubhub;
pub mod instacart;
pub mod sams_club;
pub mod saucey;
pub mod shipt;
pub mod uber_eats;

use std::sync::Arc;

use omnitrack_core::Platform;

use crate::auth::OAuthConfig;
use crate::context::AdapterContext;
use crate::registry::AdapterRegistry;

pub use amazon::AmazonAdapter;
pub use amazon_fresh::AmazonFreshAdapter;
pub use costco::CostcoAdapter;
pub use doordash::DoordashAdapter;
pub use drizly::DrizlyAdapter;
pub use grubhub::GrubhubAdapter;
pub use instacart::InstacartAdapter;
pub use sams_club::SamsClubAdapter;
pub use saucey::SauceyAdapter;
pub use shipt::ShiptAdapter;
pub use uber_eats::UberEatsAdapter;

/// OAuth endpoint configuration per OAuth-capable platform. The remaining
/// platforms authenticate per connection (session cookies or signing keys)
/// and need no process-level secrets.
#[derive(Debug, Clone)]
pub struct OAuthConfigs {
    pub doordash: OAuthConfig,
    pub uber_eats: OAuthConfig,
    pub grubhub: OAuthConfig,
    pub instacart: OAuthConfig,
    pub drizly: OAuthConfig,
}

/// Register factories for every supported platform. Adapters are still
/// constructed lazily, on first use.
#[must_use]
pub fn build_default_registry(ctx: &AdapterContext, oauth: &OAuthConfigs) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();

    macro_rules! register_oauth {
        ($platform:expr, $adapter:ty, $config:expr) => {{
            let ctx = ctx.clone();
            let config = $config.clone();
            registry.register($platform, move || {
                let ctx = ctx.clone();
                let config = config.clone();
                async move {
                    Ok(Arc::new(<$adapter>::new(ctx, config))
                        as Arc<dyn crate::adapter::PlatformAdapter>)
                }
            });
        }};
    }

    macro_rules! register_plain {
        ($platform:expr, $adapter:ty) => {{
            let ctx = ctx.clone();
            registry.register($platform, move || {
                let ctx = ctx.clone();
                async move {
                    Ok(Arc::new(<$adapter>::new(ctx))
                        as Arc<dyn crate::adapter::PlatformAdapter>)
                }
            });
        }};
    }

    register_oauth!(Platform::Doordash, DoordashAdapter, oauth.doordash);
    register_oauth!(Platform::UberEats, UberEatsAdapter, oauth.uber_eats);
    register_oauth!(Platform::Grubhub, GrubhubAdapter, oauth.grubhub);
    register_oauth!(Platform::Instacart, InstacartAdapter, oauth.instacart);
    register_oauth!(Platform::Drizly, DrizlyAdapter, oauth.drizly);
    register_plain!(Platform::Shipt, ShiptAdapter);
    register_plain!(Platform::Amazon, AmazonAdapter);
    register_plain!(Platform::AmazonFresh, AmazonFreshAdapter);
    register_plain!(Platform::Costco, CostcoAdapter);
    register_plain!(Platform::SamsClub, SamsClubAdapter);
    register_plain!(Platform::Saucey, SauceyAdapter);

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth_config(name: &str) -> OAuthConfig {
        OAuthConfig {
            client_id: format!("{name}-id"),
            client_secret: format!("{name}-secret"),
            authorize_url: format!("https://auth.{name}.test/authorize"),
            token_url: format!("https://auth.{name}.test/token"),
            redirect_uri: "https://app.example.com/callback".to_owned(),
            scopes: vec![],
        }
    }

    #[tokio::test]
    async fn default_registry_covers_every_platform() {
        let ctx = AdapterContext::for_tests();
        let oauth = OAuthConfigs {
            doordash: oauth_config("doordash"),
            uber_eats: oauth_config("uber"),
            grubhub: oauth_config("grubhub"),
            instacart: oauth_config("instacart"),
            drizly: oauth_config("drizly"),
        };
        let registry = build_default_registry(&ctx, &oauth);
        assert_eq!(registry.platforms().len(), Platform::ALL.len());
        for platform in Platform::ALL {
            let adapter = registry.get(platform).await.unwrap();
            assert_eq!(adapter.platform(), platform);
        }
    }
}

use super::{
    RemoteSource, SourceName,
    api::BotApi,
    rest::{Credentials, RestClient},
};
use crate::{config::ServerConfig, error::RegistrationError};
use futures::future::join_all;
use indexmap::IndexMap;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use url::Url;

/// A configured server that was excluded from the active source set.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationFailure {
    pub server: String,
    pub error: RegistrationError,
}

/// Active sources keyed by unique name, in configuration order.
#[derive(Debug, Default)]
pub struct SourceSet {
    sources: IndexMap<SourceName, Arc<RemoteSource>>,
}

impl SourceSet {
    /// Build from already connected sources. Later duplicates are rejected.
    pub fn new(
        sources: impl IntoIterator<Item = RemoteSource>,
    ) -> (Self, Vec<RegistrationFailure>) {
        let mut set = Self::default();
        let mut failures = Vec::new();

        for source in sources {
            let name = source.name().clone();
            if set.sources.contains_key(&name) {
                failures.push(RegistrationFailure {
                    server: source.source().base_url().to_string(),
                    error: RegistrationError::DuplicateName(name.to_string()),
                });
                continue;
            }
            set.sources.insert(name, Arc::new(source));
        }

        (set, failures)
    }

    /// Connect to every configured server concurrently.
    ///
    /// A server failing its first connectivity check is excluded and reported once.
    /// Servers configured with `enabled = false` are still registered, but start disabled.
    pub async fn register(
        servers: &[ServerConfig],
        timeout: Duration,
    ) -> (Self, Vec<RegistrationFailure>) {
        Self::register_with(servers, timeout, |base_url, credentials| {
            RestClient::new(base_url, credentials, timeout)
                .map(|client| Arc::new(client) as Arc<dyn BotApi>)
                .map_err(RegistrationError::from)
        })
        .await
    }

    /// [`Self::register`] with a custom [`BotApi`] factory.
    pub async fn register_with<F>(
        servers: &[ServerConfig],
        timeout: Duration,
        make_api: F,
    ) -> (Self, Vec<RegistrationFailure>)
    where
        F: Fn(Url, Credentials) -> Result<Arc<dyn BotApi>, RegistrationError>,
    {
        let attempts = servers.iter().map(|server| {
            let api = server
                .base_url()
                .map_err(|error| {
                    RegistrationError::InvalidAddress(format!("{}: {error}", server.address()))
                })
                .and_then(|base_url| Ok((make_api(base_url.clone(), server.credentials())?, base_url)));

            async move {
                let (api, base_url) = api?;
                let remote = RemoteSource::connect(
                    server.name.clone(),
                    &server.address(),
                    base_url,
                    api,
                    timeout,
                )
                .await?;
                if !server.enabled {
                    remote.source().disable();
                }
                Ok::<_, RegistrationError>(remote)
            }
        });

        let mut connected = Vec::new();
        let mut failures = Vec::new();
        for (server, result) in servers.iter().zip(join_all(attempts).await) {
            match result {
                Ok(remote) => {
                    info!(
                        name = %remote.name(),
                        version = %remote.source().version(),
                        address = %server.address(),
                        enabled = remote.is_enabled(),
                        "registered source"
                    );
                    connected.push(remote);
                }
                Err(error) => {
                    error!(address = %server.address(), %error, "excluding source");
                    failures.push(RegistrationFailure {
                        server: server.address(),
                        error,
                    });
                }
            }
        }

        let (set, duplicates) = Self::new(connected);
        for duplicate in &duplicates {
            error!(server = %duplicate.server, error = %duplicate.error, "excluding source");
        }
        failures.extend(duplicates);
        (set, failures)
    }

    pub fn get(&self, name: &SourceName) -> Option<&Arc<RemoteSource>> {
        self.sources.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RemoteSource>> {
        self.sources.values()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Arc<RemoteSource>> {
        self.iter().filter(|source| source.is_enabled())
    }

    pub fn names(&self) -> impl Iterator<Item = &SourceName> {
        self.sources.keys()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::FetchError, source::test_util::MockApi};

    fn server(name: Option<&str>, port: u16, enabled: bool) -> ServerConfig {
        ServerConfig {
            name: name.map(Into::into),
            host: "127.0.0.1".to_string(),
            port,
            username: "u".into(),
            password: "p".into(),
            enabled,
        }
    }

    #[tokio::test]
    async fn test_register_excludes_failing_sources() {
        let servers = vec![
            server(Some("bot1"), 8080, true),
            server(Some("bot2"), 8081, true),
            server(Some("bot3"), 8082, false),
        ];

        let (set, failures) = SourceSet::register_with(&servers, Duration::from_secs(1), |url, _| {
            let api = MockApi::default();
            if url.port() == Some(8081) {
                *api.fail_with.lock() = Some(FetchError::Unauthorized);
            }
            Ok(Arc::new(api) as Arc<dyn BotApi>)
        })
        .await;

        assert_eq!(set.len(), 2);
        assert_eq!(
            set.names().cloned().collect::<Vec<SourceName>>(),
            vec![SourceName::from("bot1"), SourceName::from("bot3")]
        );
        assert_eq!(set.enabled().count(), 1);
        assert_eq!(
            failures,
            vec![RegistrationFailure {
                server: "127.0.0.1:8081".to_string(),
                error: RegistrationError::Fetch(FetchError::Unauthorized),
            }]
        );
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_bot_names() {
        let servers = vec![server(None, 8080, true), server(None, 8081, true)];

        let (set, failures) = SourceSet::register_with(&servers, Duration::from_secs(1), |_, _| {
            Ok(Arc::new(MockApi::default()) as Arc<dyn BotApi>)
        })
        .await;

        assert_eq!(set.len(), 1);
        assert!(set.get(&"mockbot".into()).is_some());
        assert!(matches!(
            failures.as_slice(),
            [RegistrationFailure {
                error: RegistrationError::DuplicateName(_),
                ..
            }]
        ));
    }
}

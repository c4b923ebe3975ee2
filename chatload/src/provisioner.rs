//! Synthetic account registration.
use crate::error::{RegistrationError, SetupError};
use chatload_core::{Config, ErrorCategory, MetricsSink, UserCredential};
use futures_util::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};
use url::Url;

/// Registration payload for one synthetic user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Identity {
    /// `testuser_<index>` / `testuser_<index>@example.com`.
    pub fn synthetic(index: usize, password: &str) -> Self {
        let username = format!("testuser_{index}");
        Self {
            email: format!("{username}@example.com"),
            username,
            password: password.to_string(),
        }
    }
}

#[trait_variant::make(Registrar: Send)]
pub trait LocalRegistrar {
    async fn register(&self, identity: &Identity) -> Result<UserCredential, RegistrationError>;
}

/// Registers against `POST {base}/api/auth/register`.
#[derive(Clone, Debug)]
pub struct HttpRegistrar {
    client: Client,
    url: Url,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    token: Option<String>,
    #[serde(default)]
    user: Option<RegisteredUser>,
}

#[derive(Debug, Deserialize)]
struct RegisteredUser {
    #[serde(default)]
    id: serde_json::Value,
}

impl HttpRegistrar {
    /// Each request, body included, is abandoned after `config.registration_timeout`.
    pub fn new(config: &Config) -> Result<Self, SetupError> {
        let client = Client::builder()
            .timeout(config.registration_timeout)
            .build()?;
        Ok(Self {
            client,
            url: config.registration_url()?,
        })
    }
}

impl Registrar for HttpRegistrar {
    async fn register(&self, identity: &Identity) -> Result<UserCredential, RegistrationError> {
        let res = self
            .client
            .post(self.url.clone())
            .json(identity)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(RegistrationError::Status(res.status()));
        }

        let body: RegisterResponse = res.json().await?;
        let auth_token = body
            .token
            .filter(|token| !token.is_empty())
            .ok_or(RegistrationError::MissingToken)?;

        // The id's JSON type is up to the target service; keep it as text.
        let user_id = match body.user.map(|user| user.id) {
            Some(serde_json::Value::String(id)) => id,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(id) => id.to_string(),
        };

        Ok(UserCredential {
            username: identity.username.clone(),
            auth_token,
            user_id,
        })
    }
}

/// Registers `total_users` identities, at most `batch_size` in flight at once.
pub struct Provisioner<R> {
    config: Arc<Config>,
    registrar: Arc<R>,
    metrics: Arc<MetricsSink>,
}

impl<R: Registrar + Sync> Provisioner<R> {
    pub fn new(config: Arc<Config>, registrar: Arc<R>, metrics: Arc<MetricsSink>) -> Self {
        Self {
            config,
            registrar,
            metrics,
        }
    }

    /// Returns the credentials of every registration that succeeded. Failures are recorded as
    /// `RegistrationFailure` and never stop the remaining registrations.
    #[instrument(name = "provision", skip_all, fields(users = self.config.total_users))]
    pub async fn provision(&self) -> Vec<UserCredential> {
        let total = self.config.total_users;
        let batch_size = self.config.batch_size.max(1);
        let batches = self.config.batch_count(total);
        info!("Creating {total} test users...");

        let mut users = Vec::with_capacity(total);
        for (batch, start) in (0..total).step_by(batch_size).enumerate() {
            let end = (start + batch_size).min(total);
            let identities: Vec<_> = (start..end)
                .map(|index| Identity::synthetic(index, &self.config.password))
                .collect();

            let results = join_all(
                identities
                    .iter()
                    .map(|identity| self.registrar.register(identity)),
            )
            .await;

            for (identity, res) in identities.iter().zip(results) {
                match res {
                    Ok(credential) => users.push(credential),
                    Err(err) => {
                        error!("User registration failed: {err}");
                        self.metrics.record_error(
                            ErrorCategory::RegistrationFailure,
                            format!("{}: {err}", identity.username),
                        );
                    }
                }
            }

            info!(
                "Created batch {}/{batches}, total users: {}",
                batch + 1,
                users.len()
            );
        }

        users
    }
}

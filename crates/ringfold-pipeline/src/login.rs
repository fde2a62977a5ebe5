use std::collections::BTreeMap;
use std::path::Path;

use ringfold_registry::{Credentials, ImageBuilder, RegistryClient};
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{PipelineError, Result};

/// Docker config mounted by the cluster for registry pulls and pushes.
pub const REGISTRY_SECRET_PATH: &str = "/run/secrets/registry-secret";

/// A registry host and the credentials to log in with.
#[derive(Debug)]
pub struct RegistryLogin {
    pub registry: String,
    pub credentials: Credentials,
}

#[derive(Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: BTreeMap<String, DockerAuth>,
}

#[derive(Deserialize)]
struct DockerAuth {
    username: Option<String>,
    password: Option<String>,
}

/// Resolves registry credentials.
///
/// A docker config at `secret_path` wins over `user`/`password`. From the
/// config, the entry for `registry` is used when present, otherwise the
/// first entry. Returns `None` when no complete credentials are available.
pub fn resolve_login(
    secret_path: &Path,
    registry: &str,
    user: Option<&str>,
    password: Option<SecretString>,
) -> Result<Option<RegistryLogin>> {
    if secret_path.is_file() {
        let content =
            std::fs::read_to_string(secret_path).map_err(|e| PipelineError::CredentialsRead {
                path: secret_path.to_path_buf(),
                source: e,
            })?;
        let config: DockerConfig =
            serde_json::from_str(&content).map_err(|e| PipelineError::CredentialsParse {
                path: secret_path.to_path_buf(),
                source: e,
            })?;

        let mut auths = config.auths;
        let entry = match auths.remove_entry(registry) {
            Some(entry) => Some(entry),
            None => auths.into_iter().next(),
        };
        return Ok(entry.and_then(|(registry, auth)| {
            Some(RegistryLogin {
                registry,
                credentials: Credentials {
                    username: auth.username?,
                    password: SecretString::from(auth.password?),
                },
            })
        }));
    }

    Ok(match (user, password) {
        (Some(username), Some(password)) => Some(RegistryLogin {
            registry: registry.to_owned(),
            credentials: Credentials {
                username: username.to_owned(),
                password,
            },
        }),
        _ => None,
    })
}

/// Logs both the builder and the registry client in.
pub async fn login<R: RegistryClient, B: ImageBuilder>(
    registry: &R,
    builder: &B,
    login: &RegistryLogin,
) -> Result<()> {
    tracing::info!(registry = %login.registry, user = %login.credentials.username, "logging in");
    builder.login(&login.registry, &login.credentials).await?;
    registry.login(&login.registry, &login.credentials).await?;
    Ok(())
}

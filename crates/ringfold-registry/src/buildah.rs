use std::path::Path;

use secrecy::ExposeSecret;

use crate::client::{BuildError, BuildRequest, Credentials, ImageBuilder, args};
use crate::executor::{RealExecutor, ToolExecutor};

/// [`ImageBuilder`] backed by the `buildah` CLI.
pub struct Buildah<E: ToolExecutor = RealExecutor> {
    executor: E,
}

impl Buildah<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor::new("buildah"),
        }
    }
}

impl Default for Buildah<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ToolExecutor> Buildah<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }
}

/// `bud --build-arg K=V... -f <descriptor> -t <image> --label K=V... <context>`
fn build_args(request: &BuildRequest) -> Result<Vec<String>, BuildError> {
    let descriptor = path_str(&request.descriptor)?;
    let context = path_str(&request.context)?;

    let mut cmd = vec!["bud".to_owned()];
    for (key, value) in &request.build_args {
        cmd.push("--build-arg".to_owned());
        cmd.push(format!("{key}={value}"));
    }
    cmd.extend(args(["-f", descriptor, "-t", &request.image]));
    for (key, value) in request.labels.iter() {
        cmd.push("--label".to_owned());
        cmd.push(format!("{key}={value}"));
    }
    cmd.push(context.to_owned());

    Ok(cmd)
}

fn path_str(path: &Path) -> Result<&str, BuildError> {
    path.to_str()
        .ok_or_else(|| BuildError::InvalidPath(path.to_path_buf()))
}

impl<E: ToolExecutor> ImageBuilder for Buildah<E> {
    async fn build(&self, request: &BuildRequest) -> Result<(), BuildError> {
        let cmd = build_args(request)?;
        tracing::info!(image = %request.image, "building");

        self.executor
            .exec_streaming(&cmd)
            .await
            .map_err(|e| BuildError::Build {
                image: request.image.clone(),
                source: e,
            })
    }

    async fn tag(&self, source: &str, target: &str) -> Result<(), BuildError> {
        self.executor
            .exec(&args(["tag", source, target]))
            .await
            .map_err(|e| BuildError::Tag {
                source_ref: source.to_owned(),
                target_ref: target.to_owned(),
                source: e,
            })?;

        Ok(())
    }

    async fn push(&self, image: &str) -> Result<(), BuildError> {
        tracing::info!(%image, "pushing");
        self.executor
            .exec_streaming(&args(["push", image]))
            .await
            .map_err(|e| BuildError::Push {
                image: image.to_owned(),
                source: e,
            })
    }

    async fn login(&self, registry: &str, credentials: &Credentials) -> Result<(), BuildError> {
        self.executor
            .exec_with_stdin(
                &args([
                    "login",
                    "--username",
                    &credentials.username,
                    "--password-stdin",
                    registry,
                ]),
                credentials.password.expose_secret().as_bytes(),
            )
            .await
            .map_err(|e| BuildError::Login {
                registry: registry.to_owned(),
                source: e,
            })?;

        Ok(())
    }
}

mod build;
mod check;
mod deploy;
mod inspect;
mod login;
mod promote;
mod update;

pub use build::build;
pub use check::check;
pub use deploy::{deploy, watch};
pub use inspect::{get, images, list};
pub use login::login;
pub use promote::promote;
pub use update::update;

use ringfold_pipeline::{REGISTRY_SECRET_PATH, RegistryLogin, resolve_login};

use crate::settings::Settings;

/// Credentials from the mounted registry secret or from `--user`/`--password`.
pub(crate) fn registry_login(settings: &Settings) -> anyhow::Result<Option<RegistryLogin>> {
    Ok(resolve_login(
        std::path::Path::new(REGISTRY_SECRET_PATH),
        settings.workspace.registry(),
        settings.user.as_deref(),
        settings.password.clone(),
    )?)
}

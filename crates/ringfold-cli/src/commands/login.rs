use ringfold_registry::{Buildah, Skopeo};

use crate::settings::Settings;

pub async fn login(settings: &Settings) -> anyhow::Result<()> {
    let Some(login) = super::registry_login(settings)? else {
        println!("No registry credentials, skipping login");
        return Ok(());
    };

    ringfold_pipeline::login(&Skopeo::new(), &Buildah::new(), &login).await?;
    println!(
        "Logged in to {} as {}",
        login.registry, login.credentials.username
    );
    Ok(())
}

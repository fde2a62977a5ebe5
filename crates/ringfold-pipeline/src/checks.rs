use std::path::Path;

use ringfold_build::ImageCatalog;
use ringfold_core::RingfoldConfig;

use crate::error::{PipelineError, Result};

/// A named shell command from `[checks]` or a `# CHECK` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    /// Declaring image, `None` for configured checks.
    pub image: Option<String>,
    pub name: String,
    pub command: String,
}

/// Configured checks first, then descriptor checks in catalog order.
/// With `name`, only checks of that name are kept; none matching is an error.
pub fn collect_checks(
    config: &RingfoldConfig,
    catalog: &ImageCatalog,
    name: Option<&str>,
) -> Result<Vec<Check>> {
    let configured = config.checks.iter().map(|(name, command)| Check {
        image: None,
        name: name.clone(),
        command: command.clone(),
    });
    let declared = catalog.images().iter().flat_map(|image| {
        image.checks.iter().map(|(name, command)| Check {
            image: Some(image.name.clone()),
            name: name.clone(),
            command: command.clone(),
        })
    });

    let checks: Vec<Check> = configured
        .chain(declared)
        .filter(|check| name.is_none_or(|n| check.name == n))
        .collect();

    match name {
        Some(n) if checks.is_empty() => Err(PipelineError::UnknownCheck(n.to_owned())),
        _ => Ok(checks),
    }
}

/// Runs each check with `sh -c` in `root`, `CWD` exported as `root`.
/// Output goes to the terminal; the first failing check stops the run.
pub async fn run_checks(root: &Path, checks: &[Check]) -> Result<()> {
    for check in checks {
        tracing::info!(
            name = %check.name,
            image = check.image.as_deref().unwrap_or("-"),
            command = %check.command,
            "running check"
        );

        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&check.command)
            .current_dir(root)
            .env("CWD", root)
            .status()
            .await
            .map_err(|e| PipelineError::CheckSpawn {
                name: check.name.clone(),
                source: e,
            })?;

        if !status.success() {
            return Err(PipelineError::CheckFailed {
                name: check.name.clone(),
                status,
            });
        }
    }
    Ok(())
}

use crate::client::{ClusterControl, ClusterError, RunRequest, args};
use crate::executor::{RealExecutor, ToolExecutor};

const APP_NAME_LABEL: &str = "app.kubernetes.io/name";

/// [`ClusterControl`] backed by the `kubectl` CLI, using the current context.
pub struct Kubectl<E: ToolExecutor = RealExecutor> {
    executor: E,
}

impl Kubectl<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor::new("kubectl"),
        }
    }
}

impl Default for Kubectl<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ToolExecutor> Kubectl<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }
}

fn run_args(request: &RunRequest) -> Result<Vec<String>, ClusterError> {
    let overrides = serde_json::to_string(&serde_json::json!({
        "spec": { "serviceAccount": request.service_account }
    }))
    .map_err(|e| ClusterError::Overrides {
        pod: request.pod.clone(),
        source: e,
    })?;

    let mut cmd = args([
        "run",
        &request.pod,
        &format!("--image={}", request.image),
        "--restart=Never",
        &format!("--overrides={overrides}"),
        &format!("--labels={APP_NAME_LABEL}={}", request.app_name),
    ]);
    if !request.args.is_empty() {
        cmd.push("--".to_owned());
        cmd.extend(request.args.iter().cloned());
    }
    Ok(cmd)
}

impl<E: ToolExecutor> ClusterControl for Kubectl<E> {
    async fn running_image(&self, pod: &str) -> Result<Option<String>, ClusterError> {
        let output = self
            .executor
            .exec(&args([
                "get",
                "pod",
                pod,
                "-o",
                "jsonpath={.spec.containers[:1].image}",
            ]))
            .await;

        match output {
            Ok(image) => {
                let image = image.trim();
                Ok((!image.is_empty()).then(|| image.to_owned()))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(ClusterError::Get {
                pod: pod.to_owned(),
                source: e,
            }),
        }
    }

    async fn delete_pod(&self, pod: &str) -> Result<(), ClusterError> {
        tracing::info!(%pod, "deleting pod");
        self.executor
            .exec(&args(["delete", "pod", pod]))
            .await
            .map_err(|e| ClusterError::Delete {
                pod: pod.to_owned(),
                source: e,
            })?;

        Ok(())
    }

    async fn run(&self, request: &RunRequest) -> Result<(), ClusterError> {
        let cmd = run_args(request)?;
        tracing::info!(pod = %request.pod, image = %request.image, "running pod");

        self.executor
            .exec(&cmd)
            .await
            .map_err(|e| ClusterError::Run {
                pod: request.pod.clone(),
                source: e,
            })?;

        Ok(())
    }
}

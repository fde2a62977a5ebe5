use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use ringfold_build::Kustomization;
use ringfold_core::{LabelSet, Repository, RingfoldConfig, Shift, Version};
use ringfold_pipeline::{
    BuildOptions, BuildOrchestrator, BuildReport, DeployOptions, DeployOutcome, ImageOutcome, ManifestUpdater,
    RebuildReason, RegistryLogin, WatchOptions, Workspace, deploy, promote_images, watch_until,
};
use ringfold_registry::{
    BuildError, BuildRequest, ClusterControl, ClusterError, Credentials, ImageBuilder,
    RegistryClient, RegistryError, RunRequest, SymbolicTag, TagListing, ToolError,
};
use tempfile::TempDir;

// ── Fakes ──

fn tool_error(stderr: &str) -> ToolError {
    ToolError::CommandFailed {
        program: "fake",
        args: vec![],
        stderr: stderr.to_owned(),
    }
}

/// Registry and builder in one: builds land directly in the registry.
#[derive(Default)]
struct FakeRegistry {
    tags: Mutex<HashMap<String, BTreeMap<String, LabelSet>>>,
    calls: Mutex<Vec<String>>,
    fail_build: Option<String>,
}

impl FakeRegistry {
    fn failing_on(image: &str) -> Self {
        Self {
            fail_build: Some(image.to_owned()),
            ..Self::default()
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn builds(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("build "))
            .collect()
    }

    fn put(&self, reference: &str, labels: LabelSet) {
        let (repo, tag) = reference.rsplit_once(':').unwrap();
        self.tags
            .lock()
            .unwrap()
            .entry(repo.to_owned())
            .or_default()
            .insert(tag.to_owned(), labels);
    }

    fn get(&self, repo: &str, tag: &str) -> Option<LabelSet> {
        self.tags
            .lock()
            .unwrap()
            .get(repo)
            .and_then(|tags| tags.get(tag))
            .cloned()
    }

    fn label(&self, image: &str, tag: &str, key: &str) -> Option<String> {
        self.get(&format!("ghcr.io/acme/shop/{image}"), tag)
            .and_then(|labels| labels.get(key).map(str::to_owned))
    }

    fn version_of(&self, image: &str, tag: &str) -> Option<String> {
        self.label(image, tag, "org.opencontainers.image.version")
    }
}

impl RegistryClient for FakeRegistry {
    async fn get_tag(
        &self,
        repo: &Repository,
        tag: &str,
    ) -> Result<Option<Version>, RegistryError> {
        if let Ok(version) = tag.parse::<Version>() {
            return Ok(Some(version));
        }
        Ok(self
            .get(repo.as_str(), tag)
            .and_then(|labels| labels.version().unwrap()))
    }

    async fn set_tag(
        &self,
        repo: &Repository,
        tag: &str,
        version: &Version,
    ) -> Result<(), RegistryError> {
        self.record(format!("copy {repo}:{version} {tag}"));
        let labels = self
            .get(repo.as_str(), &version.to_string())
            .ok_or_else(|| RegistryError::Copy {
                source_ref: repo.reference(&version.to_string()),
                target_ref: repo.reference(tag),
                source: tool_error("manifest unknown"),
            })?;
        self.put(&repo.reference(tag), labels);
        Ok(())
    }

    async fn labels(
        &self,
        repo: &Repository,
        tag: &str,
    ) -> Result<Option<LabelSet>, RegistryError> {
        Ok(self.get(repo.as_str(), tag))
    }

    async fn inspect(
        &self,
        repo: &Repository,
        tag: &str,
    ) -> Result<Option<serde_json::Value>, RegistryError> {
        Ok(self.get(repo.as_str(), tag).map(|labels| {
            let labels: BTreeMap<&str, &str> = labels.iter().collect();
            serde_json::json!({ "Labels": labels })
        }))
    }

    async fn list(&self, repo: &Repository) -> Result<TagListing, RegistryError> {
        let tags = self.tags.lock().unwrap().get(repo.as_str()).cloned();
        let mut listing = TagListing::default();
        for (tag, labels) in tags.unwrap_or_default() {
            match tag.parse::<Version>() {
                Ok(version) => listing.versions.push(version),
                Err(_) => listing.tags.push(SymbolicTag {
                    name: tag,
                    version: labels.version().unwrap(),
                }),
            }
        }
        listing.versions.sort();
        Ok(listing)
    }

    async fn login(&self, registry: &str, credentials: &Credentials) -> Result<(), RegistryError> {
        self.record(format!("registry-login {registry} {}", credentials.username));
        Ok(())
    }
}

impl ImageBuilder for FakeRegistry {
    async fn build(&self, request: &BuildRequest) -> Result<(), BuildError> {
        if self
            .fail_build
            .as_deref()
            .is_some_and(|image| request.image.contains(&format!("/{image}:")))
        {
            return Err(BuildError::Build {
                image: request.image.clone(),
                source: tool_error("exit code: 1"),
            });
        }
        assert!(request.build_args.contains_key("RING"));
        self.record(format!("build {}", request.image));
        self.put(&request.image, request.labels.clone());
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<(), BuildError> {
        self.record(format!("tag {source} {target}"));
        let (repo, tag) = source.rsplit_once(':').unwrap();
        let labels = self.get(repo, tag).unwrap();
        self.put(target, labels);
        Ok(())
    }

    async fn push(&self, image: &str) -> Result<(), BuildError> {
        self.record(format!("push {image}"));
        Ok(())
    }

    async fn login(&self, registry: &str, credentials: &Credentials) -> Result<(), BuildError> {
        self.record(format!("builder-login {registry} {}", credentials.username));
        Ok(())
    }
}

#[derive(Default)]
struct FakeCluster {
    running: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
    unreachable: bool,
}

impl FakeCluster {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ClusterControl for FakeCluster {
    async fn running_image(&self, pod: &str) -> Result<Option<String>, ClusterError> {
        self.calls.lock().unwrap().push(format!("get {pod}"));
        if self.unreachable {
            return Err(ClusterError::Get {
                pod: pod.to_owned(),
                source: tool_error("connection refused"),
            });
        }
        Ok(self.running.lock().unwrap().clone())
    }

    async fn delete_pod(&self, pod: &str) -> Result<(), ClusterError> {
        self.calls.lock().unwrap().push(format!("delete {pod}"));
        *self.running.lock().unwrap() = None;
        Ok(())
    }

    async fn run(&self, request: &RunRequest) -> Result<(), ClusterError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("run {} {}", request.pod, request.image));
        *self.running.lock().unwrap() = Some(request.image.clone());
        Ok(())
    }
}

// ── Fixture ──

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// base ← app ← deploy (root); tools stands alone.
fn init_project(root: &Path) {
    write(
        root,
        "etc/base.containerfile",
        "FROM docker.io/library/alpine:3.20\nCOPY base /srv/base\n",
    );
    write(
        root,
        "etc/tools.containerfile",
        "FROM docker.io/library/alpine:3.20\nCOPY tools /usr/local/bin/\n",
    );
    write(
        root,
        "etc/app.containerfile",
        "FROM ghcr.io/acme/shop/base:$RING\nCOPY src /app/src\n# CHECK unit: true\n",
    );
    write(
        root,
        "etc/deploy.containerfile",
        "# ROOT IMAGE\nFROM ghcr.io/acme/shop/app:$RING\n",
    );
    write(root, "base/base.conf", "level=1\n");
    write(root, "tools/tool.sh", "#!/bin/sh\necho tool\n");
    write(root, "src/main.rs", "fn main() {}\n");
}

fn workspace(root: &Path) -> Workspace {
    let mut config = RingfoldConfig::default();
    config.project.project = Some("acme/shop".to_owned());
    config.project.vendor = Some("Acme".to_owned());
    Workspace::new(root, config).unwrap()
}

fn options(ring: &str) -> BuildOptions {
    BuildOptions {
        ring: ring.to_owned(),
        ..BuildOptions::default()
    }
}

async fn build(ws: &Workspace, fake: &FakeRegistry, options: &BuildOptions) -> BuildReport {
    let catalog = ws.catalog().unwrap();
    BuildOrchestrator::new(ws, fake, fake)
        .run(&catalog, options)
        .await
        .unwrap()
}

fn built_to(report: &BuildReport, image: &str) -> Option<Version> {
    match report.get(image)? {
        ImageOutcome::Built { to, .. } => Some(*to),
        ImageOutcome::Skipped { .. } => None,
    }
}

fn v(s: &str) -> Version {
    s.parse().unwrap()
}

// ── Build Tests ──

#[tokio::test]
async fn first_build_builds_everything_at_zero() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();

    let report = build(&ws, &fake, &options("dev")).await;

    let order: Vec<_> = report.outcomes.iter().map(|o| o.image()).collect();
    assert_eq!(order, ["base", "tools", "app", "deploy"]);
    assert_eq!(report.built().count(), 4);
    for image in order {
        assert_eq!(built_to(&report, image), Some(v("0.0.0")));
        assert_eq!(fake.version_of(image, "dev").as_deref(), Some("0.0.0"));
    }

    assert_eq!(
        fake.calls()[..4],
        [
            "build ghcr.io/acme/shop/base:0.0.0",
            "tag ghcr.io/acme/shop/base:0.0.0 ghcr.io/acme/shop/base:dev",
            "push ghcr.io/acme/shop/base:0.0.0",
            "push ghcr.io/acme/shop/base:dev",
        ]
    );
}

#[tokio::test]
async fn built_images_carry_labels() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();

    build(&ws, &fake, &options("dev")).await;

    // regular image: declared dependencies only
    assert_eq!(fake.label("app", "dev", "dependency.base").as_deref(), Some("0.0.0"));
    assert_eq!(fake.label("app", "dev", "dependency.tools"), None);
    assert_eq!(
        fake.label("app", "dev", "org.opencontainers.image.ref.name").as_deref(),
        Some("app")
    );
    assert_eq!(
        fake.label("app", "dev", "org.opencontainers.image.vendor").as_deref(),
        Some("Acme")
    );
    assert!(
        fake.label("app", "dev", "org.opencontainers.image.revision")
            .unwrap()
            .starts_with("sha256:")
    );

    // root image: every other image
    for other in ["base", "tools", "app"] {
        assert_eq!(
            fake.label("deploy", "dev", &format!("dependency.{other}")).as_deref(),
            Some("0.0.0")
        );
    }
}

#[tokio::test]
async fn unchanged_project_skips_everything() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();

    build(&ws, &fake, &options("dev")).await;
    fake.clear_calls();
    let report = build(&ws, &fake, &options("dev")).await;

    assert_eq!(report.built().count(), 0);
    assert!(fake.calls().is_empty());
    assert!(matches!(
        report.get("app"),
        Some(ImageOutcome::Skipped { version: Some(version), .. }) if *version == v("0.0.0")
    ));
}

#[tokio::test]
async fn changed_base_rebuilds_its_dependents() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();

    build(&ws, &fake, &options("dev")).await;
    write(tmp.path(), "base/base.conf", "level=2\n");
    let report = build(&ws, &fake, &options("dev")).await;

    // dev is the first ring: no reference, so rebuilds bump the major part
    assert_eq!(built_to(&report, "base"), Some(v("1.0.0")));
    assert_eq!(built_to(&report, "app"), Some(v("1.0.0")));
    assert_eq!(built_to(&report, "tools"), None);
    assert_eq!(built_to(&report, "deploy"), Some(v("1.0.0")));
    assert_eq!(fake.label("app", "dev", "dependency.base").as_deref(), Some("1.0.0"));
}

#[tokio::test]
async fn root_image_rebuilds_when_any_image_changes() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();

    build(&ws, &fake, &options("dev")).await;
    write(tmp.path(), "tools/tool.sh", "#!/bin/sh\necho tool v2\n");
    let report = build(&ws, &fake, &options("dev")).await;

    assert_eq!(built_to(&report, "tools"), Some(v("1.0.0")));
    assert_eq!(built_to(&report, "app"), None);
    assert!(matches!(
        report.get("deploy"),
        Some(ImageOutcome::Built {
            reason: RebuildReason::DependencyChanged { dependency },
            ..
        }) if dependency == "tools"
    ));
}

#[tokio::test]
async fn later_ring_bumps_against_previous_ring() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    let catalog = ws.catalog().unwrap();

    build(&ws, &fake, &options("dev")).await;
    promote_images(&ws, &fake, &catalog, "dev", Shift::Forward, &[])
        .await
        .unwrap();

    // staging shares 0.0 with dev → minor
    write(tmp.path(), "base/base.conf", "level=2\n");
    let report = build(&ws, &fake, &options("staging")).await;
    assert_eq!(built_to(&report, "base"), Some(v("0.1.0")));

    // staging has diverged from dev → patch
    write(tmp.path(), "base/base.conf", "level=3\n");
    let report = build(&ws, &fake, &options("staging")).await;
    assert_eq!(built_to(&report, "base"), Some(v("0.1.1")));

    // forced major ignores dev
    let report = build(
        &ws,
        &fake,
        &BuildOptions {
            force: true,
            force_major: true,
            images: vec!["base".to_owned()],
            ..options("staging")
        },
    )
    .await;
    assert_eq!(built_to(&report, "base"), Some(v("1.0.0")));
    assert_eq!(fake.version_of("base", "dev").as_deref(), Some("0.0.0"));
}

#[tokio::test]
async fn dry_run_decides_without_building() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();

    let report = build(
        &ws,
        &fake,
        &BuildOptions {
            dry_run: true,
            ..options("dev")
        },
    )
    .await;

    assert!(report.dry_run);
    assert_eq!(report.built().count(), 4);
    assert!(fake.calls().is_empty());
    assert_eq!(fake.version_of("base", "dev"), None);
}

#[tokio::test]
async fn image_filter_reads_other_versions_from_registry() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();

    build(&ws, &fake, &options("dev")).await;
    write(tmp.path(), "src/main.rs", "fn main() { run(); }\n");
    fake.clear_calls();
    let report = build(
        &ws,
        &fake,
        &BuildOptions {
            images: vec!["app".to_owned()],
            ..options("dev")
        },
    )
    .await;

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(built_to(&report, "app"), Some(v("1.0.0")));
    assert_eq!(fake.builds(), ["build ghcr.io/acme/shop/app:1.0.0"]);
    assert_eq!(fake.label("app", "dev", "dependency.base").as_deref(), Some("0.0.0"));
}

#[tokio::test]
async fn filtered_build_needs_dependency_on_ring() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    let catalog = ws.catalog().unwrap();

    let err = BuildOrchestrator::new(&ws, &fake, &fake)
        .run(
            &catalog,
            &BuildOptions {
                images: vec!["app".to_owned()],
                ..options("dev")
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "registry");
    assert!(fake.builds().is_empty());
}

#[tokio::test]
async fn build_failure_halts_the_run() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::failing_on("app");
    let catalog = ws.catalog().unwrap();

    let err = BuildOrchestrator::new(&ws, &fake, &fake)
        .run(&catalog, &options("dev"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "build");
    assert_eq!(
        fake.builds(),
        [
            "build ghcr.io/acme/shop/base:0.0.0",
            "build ghcr.io/acme/shop/tools:0.0.0",
        ]
    );
    assert_eq!(fake.version_of("deploy", "dev"), None);
}

#[tokio::test]
async fn unknown_ring_and_image_are_rejected() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    let catalog = ws.catalog().unwrap();
    let orchestrator = BuildOrchestrator::new(&ws, &fake, &fake);

    let err = orchestrator.run(&catalog, &options("qa")).await.unwrap_err();
    assert_eq!(err.kind(), "boundary");

    let err = orchestrator
        .run(
            &catalog,
            &BuildOptions {
                images: vec!["ghost".to_owned()],
                ..options("dev")
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "config");
}

#[tokio::test]
async fn require_update_rewrites_manifests_during_build() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    write(
        tmp.path(),
        "etc/deploy.containerfile",
        "# ROOT IMAGE\n# REQUIRE UPDATE\nFROM ghcr.io/acme/shop/app:$RING\nCOPY etc/dev /etc/dev\n",
    );
    write(
        tmp.path(),
        "etc/dev/kustomization.yaml",
        "images:\n  - name: ghcr.io/acme/shop/app\n    newTag: old\n",
    );
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();

    let report = build(&ws, &fake, &options("dev")).await;

    assert_eq!(built_to(&report, "deploy"), Some(v("0.0.0")));
    let k = Kustomization::load(&tmp.path().join("etc/dev/kustomization.yaml")).unwrap();
    assert_eq!(k.managed_images()[0].tag, "0.0.0");
}

// ── Promotion Tests ──

#[tokio::test]
async fn shift_copies_ring_versions_forward() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    let catalog = ws.catalog().unwrap();

    build(&ws, &fake, &options("dev")).await;
    let promotions = promote_images(&ws, &fake, &catalog, "dev", Shift::Forward, &[])
        .await
        .unwrap();

    assert_eq!(promotions.len(), 4);
    assert!(promotions.iter().all(|p| p.target_ring == "staging"));
    assert_eq!(fake.version_of("deploy", "staging").as_deref(), Some("0.0.0"));
    assert_eq!(fake.version_of("deploy", "prod"), None);
}

#[tokio::test]
async fn unshift_copies_backward_for_named_images() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    let catalog = ws.catalog().unwrap();

    build(&ws, &fake, &options("staging")).await;
    let promotions = promote_images(
        &ws,
        &fake,
        &catalog,
        "staging",
        Shift::Backward,
        &["app".to_owned()],
    )
    .await
    .unwrap();

    assert_eq!(promotions.len(), 1);
    assert_eq!(promotions[0].target_ring, "dev");
    assert_eq!(fake.version_of("app", "dev").as_deref(), Some("0.0.0"));
    assert_eq!(fake.version_of("base", "dev"), None);
}

#[tokio::test]
async fn promotion_past_the_boundary_touches_nothing() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    let catalog = ws.catalog().unwrap();

    build(&ws, &fake, &options("dev")).await;
    fake.clear_calls();

    let err = promote_images(&ws, &fake, &catalog, "dev", Shift::Backward, &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "boundary");

    let err = promote_images(&ws, &fake, &catalog, "prod", Shift::Forward, &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "boundary");

    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn promotion_of_untagged_image_is_a_no_op() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    let catalog = ws.catalog().unwrap();

    let promotions = promote_images(&ws, &fake, &catalog, "staging", Shift::Forward, &[])
        .await
        .unwrap();

    assert!(promotions.iter().all(|p| p.version.is_none()));
    assert!(fake.calls().is_empty());
}

// ── Manifest Update Tests ──

#[tokio::test]
async fn update_points_tags_at_ring_versions() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    write(
        tmp.path(),
        "etc/prod/kustomization.yaml",
        "resources:\n  - pod.yaml\nimages:\n  - name: app\n    newName: ghcr.io/acme/shop/app\n    newTag: 0.0.0\n  - name: ghcr.io/acme/shop/base\n    newTag: old\n  - name: nginx\n    newTag: \"1.25\"\n",
    );
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    build(&ws, &fake, &options("dev")).await;

    let updates = ManifestUpdater::new(&ws, &fake)
        .update("dev", false)
        .await
        .unwrap();

    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].changes.len(), 1);
    assert_eq!(updates[0].changes[0].repository, "ghcr.io/acme/shop/base");
    assert_eq!(updates[0].changes[0].from, "old");

    let k = Kustomization::load(&tmp.path().join("etc/prod/kustomization.yaml")).unwrap();
    let tags: Vec<_> = k.managed_images().into_iter().map(|m| m.tag).collect();
    assert_eq!(tags, ["0.0.0", "0.0.0", "1.25"]);
}

#[tokio::test]
async fn update_dry_run_leaves_files_alone() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let manifest = "images:\n  - name: ghcr.io/acme/shop/base\n    newTag: old\n";
    write(tmp.path(), "etc/dev/kustomization.yaml", manifest);
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    build(&ws, &fake, &options("dev")).await;

    let updates = ManifestUpdater::new(&ws, &fake)
        .update("dev", true)
        .await
        .unwrap();

    assert_eq!(updates.len(), 1);
    let on_disk = std::fs::read_to_string(tmp.path().join("etc/dev/kustomization.yaml")).unwrap();
    assert_eq!(on_disk, manifest);
}

// ── Deploy / Watch Tests ──

fn deploy_options() -> DeployOptions {
    DeployOptions {
        ring: "dev".to_owned(),
        image: "deploy".to_owned(),
        pod: "deploy".to_owned(),
        service_account: "ops".to_owned(),
        app_name: "ops".to_owned(),
        kustomization: Some("etc/prod".to_owned()),
    }
}

#[tokio::test]
async fn deploy_replaces_pod_only_on_new_version() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    let cluster = FakeCluster::default();

    let outcome = deploy(&ws, &fake, &cluster, &deploy_options()).await.unwrap();
    assert_eq!(outcome, DeployOutcome::NothingTagged);

    build(&ws, &fake, &options("dev")).await;
    let outcome = deploy(&ws, &fake, &cluster, &deploy_options()).await.unwrap();
    assert_eq!(
        outcome,
        DeployOutcome::Deployed {
            previous: None,
            image: "ghcr.io/acme/shop/deploy:0.0.0".to_owned(),
        }
    );

    let outcome = deploy(&ws, &fake, &cluster, &deploy_options()).await.unwrap();
    assert_eq!(outcome, DeployOutcome::UpToDate { version: v("0.0.0") });

    write(tmp.path(), "tools/tool.sh", "#!/bin/sh\necho tool v2\n");
    build(&ws, &fake, &options("dev")).await;
    deploy(&ws, &fake, &cluster, &deploy_options()).await.unwrap();

    let calls = cluster.calls();
    assert!(calls.contains(&"delete deploy".to_owned()));
    assert_eq!(
        calls.last().map(String::as_str),
        Some("run deploy ghcr.io/acme/shop/deploy:1.0.0")
    );
}

fn watch_options(wait_minutes: i64) -> WatchOptions {
    WatchOptions {
        deploy: deploy_options(),
        wait_minutes,
        login: Some(RegistryLogin {
            registry: "ghcr.io".to_owned(),
            credentials: Credentials::new("robot", "s3cr3t"),
        }),
    }
}

#[tokio::test(start_paused = true)]
async fn watch_cycles_until_shutdown() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    let cluster = FakeCluster::default();

    watch_until(
        &ws,
        &fake,
        &fake,
        &cluster,
        &watch_options(5),
        tokio::time::sleep(Duration::from_secs(12 * 60)),
    )
    .await
    .unwrap();

    // cycles at 0, 5 and 10 minutes
    assert_eq!(cluster.calls().len(), 3);
    let logins = fake
        .calls()
        .into_iter()
        .filter(|c| c.contains("login ghcr.io robot"))
        .count();
    assert_eq!(logins, 6);
}

#[tokio::test(start_paused = true)]
async fn watch_keeps_going_after_failed_cycle() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    let cluster = FakeCluster {
        unreachable: true,
        ..FakeCluster::default()
    };

    watch_until(
        &ws,
        &fake,
        &fake,
        &cluster,
        &watch_options(1),
        tokio::time::sleep(Duration::from_secs(150)),
    )
    .await
    .unwrap();

    assert_eq!(cluster.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn watch_with_huge_wait_runs_one_cycle_until_shutdown() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    let cluster = FakeCluster::default();

    watch_until(
        &ws,
        &fake,
        &fake,
        &cluster,
        &watch_options(i64::MAX),
        tokio::time::sleep(Duration::from_secs(365 * 24 * 60 * 60)),
    )
    .await
    .unwrap();

    assert_eq!(cluster.calls().len(), 1);
}

#[tokio::test]
async fn watch_without_wait_runs_once_and_reports() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let fake = FakeRegistry::default();
    let cluster = FakeCluster {
        unreachable: true,
        ..FakeCluster::default()
    };

    let err = watch_until(
        &ws,
        &fake,
        &fake,
        &cluster,
        &watch_options(0),
        std::future::pending::<()>(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), "cluster");
    assert_eq!(cluster.calls().len(), 1);
}

#[test]
fn deploy_options_default_to_root_image() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let ws = workspace(tmp.path());
    let catalog = ws.catalog().unwrap();

    let options = DeployOptions::from_config(&ws, &catalog, "prod", None).unwrap();

    assert_eq!(options.image, "deploy");
    assert_eq!(options.pod, "deploy");
    assert_eq!(options.app_name, "ops");
    assert_eq!(options.ring, "prod");
}

#[test]
fn deploy_options_need_a_deploy_image() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    std::fs::remove_file(tmp.path().join("etc/deploy.containerfile")).unwrap();
    let ws = workspace(tmp.path());
    let catalog = ws.catalog().unwrap();

    let err = DeployOptions::from_config(&ws, &catalog, "dev", None).unwrap_err();
    assert_eq!(err.kind(), "config");

    let mut config = ws.config().clone();
    config.watch.image = Some("ghost".to_owned());
    let ws = Workspace::new(tmp.path(), config).unwrap();
    let err = DeployOptions::from_config(&ws, &catalog, "dev", None).unwrap_err();
    assert_eq!(err.kind(), "config");
}

#[test]
fn named_deploy_image_needs_no_root_image() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    std::fs::remove_file(tmp.path().join("etc/deploy.containerfile")).unwrap();
    let ws = workspace(tmp.path());
    let catalog = ws.catalog().unwrap();

    let options = DeployOptions::from_config(&ws, &catalog, "dev", Some("app")).unwrap();
    assert_eq!(options.image, "app");

    let err = DeployOptions::from_config(&ws, &catalog, "dev", Some("ghost")).unwrap_err();
    assert_eq!(err.kind(), "config");
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn named_deploy_image_wins_over_config() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let mut config = workspace(tmp.path()).config().clone();
    config.watch.image = Some("tools".to_owned());
    let ws = Workspace::new(tmp.path(), config).unwrap();
    let catalog = ws.catalog().unwrap();

    let configured = DeployOptions::from_config(&ws, &catalog, "dev", None).unwrap();
    assert_eq!(configured.image, "tools");

    let named = DeployOptions::from_config(&ws, &catalog, "dev", Some("app")).unwrap();
    assert_eq!(named.image, "app");
}

#[tokio::test]
async fn named_deploy_image_reaches_the_cluster() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    std::fs::remove_file(tmp.path().join("etc/deploy.containerfile")).unwrap();
    let ws = workspace(tmp.path());
    let catalog = ws.catalog().unwrap();
    let fake = FakeRegistry::default();
    let cluster = FakeCluster::default();
    build(&ws, &fake, &options("dev")).await;

    let options = DeployOptions::from_config(&ws, &catalog, "dev", Some("app")).unwrap();
    let outcome = deploy(&ws, &fake, &cluster, &options).await.unwrap();

    assert_eq!(
        outcome,
        DeployOutcome::Deployed {
            previous: None,
            image: "ghcr.io/acme/shop/app:0.0.0".to_owned(),
        }
    );
}

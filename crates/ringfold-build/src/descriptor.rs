use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use ringfold_core::Image;

const ROOT_IMAGE_MARKER: &str = "# ROOT IMAGE";
const SORT_LAST_MARKER: &str = "# SORT LAST";
const REQUIRE_UPDATE_MARKER: &str = "# REQUIRE UPDATE";
const CHECK_PREFIX: &str = "# CHECK";

/// `COPY [--flag[=value]]... <src>... <dest>`
static COPY_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^COPY((?: --[A-Za-z-]+(?:=[^ ]*)?)*)((?: [A-Za-z0-9_./-]+)+) [A-Za-z0-9_./-]+$")
        .expect("invalid COPY directive regex")
});

/// `# CHECK <id>: <command>`
static CHECK_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^# CHECK ([A-Za-z0-9-]+): (.+)$").expect("invalid CHECK directive regex")
});

/// Parses container descriptors into [`Image`] records.
///
/// Only `FROM` lines pointing into the same registry project with the literal
/// `$RING` tag count as dependencies; base images from anywhere else are
/// ordinary inputs.
pub struct DescriptorParser {
    from_directive: Regex,
}

impl DescriptorParser {
    pub fn new(registry: &str, project: &str) -> Result<Self, DescriptorError> {
        let pattern = format!(
            r"^FROM {registry}/{project}/([A-Za-z][A-Za-z0-9_.-]*):\$RING$",
            registry = regex::escape(registry),
            project = regex::escape(project),
        );
        let from_directive =
            Regex::new(&pattern).map_err(|e| DescriptorError::Pattern { source: e })?;
        Ok(Self { from_directive })
    }

    /// Reads and parses the descriptor at `path`. The image name is the file
    /// stem.
    pub fn parse(&self, path: &Path) -> Result<Image, DescriptorError> {
        let content = std::fs::read_to_string(path).map_err(|e| DescriptorError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.parse_str(path, &content)
    }

    pub fn parse_str(&self, path: &Path, content: &str) -> Result<Image, DescriptorError> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| DescriptorError::InvalidName(path.to_path_buf()))?;

        let mut image = Image::new(name, path);

        for (index, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let line_no = index + 1;

            match line {
                ROOT_IMAGE_MARKER => image.is_root_image = true,
                SORT_LAST_MARKER => image.deferred = true,
                REQUIRE_UPDATE_MARKER => image.requires_update = true,
                _ => {}
            }

            if let Some(captures) = self.from_directive.captures(line) {
                let dependency = captures[1].to_owned();
                if !image.depends_on(&dependency) {
                    image.dependencies.push(dependency);
                }
            }

            if let Some(captures) = COPY_DIRECTIVE.captures(line) {
                // --from copies out of another stage, not the build context.
                if !captures[1].contains("--from=") {
                    image
                        .sources
                        .extend(captures[2].split_whitespace().map(PathBuf::from));
                }
            }

            if line.starts_with(CHECK_PREFIX) {
                let captures =
                    CHECK_DIRECTIVE
                        .captures(line)
                        .ok_or_else(|| DescriptorError::MalformedDirective {
                            path: path.to_path_buf(),
                            line: line_no,
                            detail: "expected `# CHECK <id>: <command>`".to_owned(),
                        })?;
                let id = captures[1].to_owned();
                if image.checks.contains_key(&id) {
                    return Err(DescriptorError::MalformedDirective {
                        path: path.to_path_buf(),
                        line: line_no,
                        detail: format!("check '{id}' declared twice"),
                    });
                }
                image.checks.insert(id, captures[2].to_owned());
            }
        }

        tracing::debug!(
            image = %image.name,
            dependencies = ?image.dependencies,
            sources = image.sources.len(),
            root = image.is_root_image,
            deferred = image.deferred,
            "parsed descriptor"
        );

        Ok(image)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("failed to read descriptor {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("descriptor file name {0} does not yield an image name")]
    InvalidName(PathBuf),
    #[error("{path}:{line}: malformed directive: {detail}")]
    MalformedDirective {
        path: PathBuf,
        line: usize,
        detail: String,
    },
    #[error("invalid registry or project for FROM matching")]
    Pattern { source: regex::Error },
}

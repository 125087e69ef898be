//! Spec loading (file path or URL) and the in-memory spec store.

use crate::document::{DocumentFormat, SpecDocument};
use crate::error::{OpenApiToolsError, Result};
use crate::extract::extract_tools;
use openmcp_http_tools::safety::{read_body_limited, redact_url, sanitize_reqwest_error};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// File extensions picked up by [`SpecLoader::scan`], in scan order.
const SCAN_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    Path(PathBuf),
    Url(Url),
}

impl SpecSource {
    /// `http://` / `https://` locations are URLs, `file://` URLs become paths, anything else is a
    /// filesystem path.
    ///
    /// # Errors
    ///
    /// Returns an error if the location looks like a URL but does not parse as one.
    pub fn parse(location: &str) -> Result<Self> {
        if location.starts_with("http://") || location.starts_with("https://") {
            let url = Url::parse(location).map_err(|e| {
                OpenApiToolsError::Config(format!("Invalid spec URL '{location}': {e}"))
            })?;
            Ok(SpecSource::Url(url))
        } else if location.starts_with("file://") {
            let url = Url::parse(location).map_err(|e| {
                OpenApiToolsError::Config(format!("Invalid spec file URL '{location}': {e}"))
            })?;
            let path = url.to_file_path().map_err(|()| {
                OpenApiToolsError::Config(format!(
                    "Invalid file URL (cannot convert to path): {location}"
                ))
            })?;
            Ok(SpecSource::Path(path))
        } else {
            Ok(SpecSource::Path(PathBuf::from(location)))
        }
    }

    /// Stem used as the spec id when the document has no `info.title`.
    fn fallback_id(&self) -> String {
        let stem = match self {
            SpecSource::Path(p) => p.file_stem().map(|s| s.to_string_lossy().into_owned()),
            SpecSource::Url(u) => Path::new(u.path())
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned()),
        };
        stem.filter(|s| !s.is_empty())
            .unwrap_or_else(|| "spec".to_string())
    }
}

impl fmt::Display for SpecSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecSource::Path(p) => write!(f, "{}", p.display()),
            SpecSource::Url(u) => f.write_str(&redact_url(u)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub fetch_timeout: Duration,
    /// Upper bound for a spec fetched over HTTP. `None` means unbounded.
    pub max_spec_bytes: Option<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_spec_bytes: None,
        }
    }
}

/// A parsed spec plus where it came from. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct LoadedSpec {
    pub id: String,
    pub source: SpecSource,
    pub document: SpecDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedSpec {
    pub file: String,
    pub title: String,
    pub ai_tools_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub directory: String,
    pub specs_discovered: Vec<ScannedSpec>,
    pub total: usize,
}

/// Loads specs and keeps every loaded document keyed by id.
///
/// Loading a second document with an id already present replaces the first.
#[derive(Debug)]
pub struct SpecLoader {
    client: reqwest::Client,
    config: LoaderConfig,
    specs: RwLock<BTreeMap<String, Arc<LoadedSpec>>>,
}

impl SpecLoader {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: LoaderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| {
                OpenApiToolsError::Config(format!(
                    "Failed to build spec fetch client: {}",
                    sanitize_reqwest_error(&e)
                ))
            })?;
        Ok(Self {
            client,
            config,
            specs: RwLock::new(BTreeMap::new()),
        })
    }

    /// Load, parse, and store a spec.
    ///
    /// # Errors
    ///
    /// - [`OpenApiToolsError::NotFound`] if a local path does not exist
    /// - [`OpenApiToolsError::SpecParse`] if the content is not a YAML/JSON mapping
    /// - [`OpenApiToolsError::SpecFetch`] / [`OpenApiToolsError::SpecReadBody`] for URL failures,
    ///   including non-2xx responses
    pub async fn load(&self, source: &SpecSource) -> Result<Arc<LoadedSpec>> {
        let document = match source {
            SpecSource::Path(path) => self.load_file(path).await?,
            SpecSource::Url(url) => self.fetch(url).await?,
        };

        let id = document
            .title()
            .filter(|t| !t.is_empty())
            .map_or_else(|| source.fallback_id(), str::to_string);

        let loaded = Arc::new(LoadedSpec {
            id: id.clone(),
            source: source.clone(),
            document,
        });
        let replaced = self
            .specs
            .write()
            .insert(id.clone(), Arc::clone(&loaded))
            .is_some();

        tracing::info!(spec = %id, source = %source, replaced, "loaded OpenAPI spec");
        Ok(loaded)
    }

    async fn load_file(&self, path: &Path) -> Result<SpecDocument> {
        tracing::debug!("Loading OpenAPI spec from {}", path.display());
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OpenApiToolsError::NotFound {
                    what: "OpenAPI spec",
                    location: path.display().to_string(),
                }
            } else {
                OpenApiToolsError::SpecReadFile {
                    path: path.display().to_string(),
                    source: e,
                }
            }
        })?;

        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        let format = DocumentFormat::from_file_name(name.as_deref().unwrap_or_default());
        parse_document(&content, format, &path.display().to_string())
    }

    async fn fetch(&self, url: &Url) -> Result<SpecDocument> {
        let location = redact_url(url);
        tracing::debug!("Fetching OpenAPI spec from {}", location);

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| OpenApiToolsError::SpecFetch {
                url: location.clone(),
                message: sanitize_reqwest_error(&e),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(OpenApiToolsError::SpecFetch {
                url: location,
                message: format!("HTTP {status}"),
            });
        }

        let bytes = read_body_limited(resp, self.config.max_spec_bytes)
            .await
            .map_err(|e| OpenApiToolsError::SpecReadBody {
                url: location.clone(),
                message: e.to_string(),
            })?;
        let content = String::from_utf8(bytes).map_err(|e| OpenApiToolsError::SpecReadBody {
            url: location.clone(),
            message: format!("body is not UTF-8: {e}"),
        })?;

        parse_document(&content, DocumentFormat::from_file_name(url.path()), &location)
    }

    /// Load every `*.yaml`, `*.yml`, and `*.json` file directly inside `dir`.
    ///
    /// Files that fail to load are logged and left out of the report. Successfully loaded
    /// files are also stored, as with [`Self::load`].
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::NotFound`] if `dir` does not exist or is not a directory.
    pub async fn scan(&self, dir: &Path) -> Result<ScanReport> {
        let directory = dir.display().to_string();
        let is_dir = tokio::fs::metadata(dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(OpenApiToolsError::NotFound {
                what: "Directory",
                location: directory,
            });
        }

        let mut candidates: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            // Follows symlinks.
            let path = entry.path();
            if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                candidates.push(path);
            }
        }

        let mut specs_discovered = Vec::new();
        for ext in SCAN_EXTENSIONS {
            let mut matching: Vec<&PathBuf> = candidates
                .iter()
                .filter(|p| p.extension().is_some_and(|e| e == ext))
                .collect();
            matching.sort();

            for path in matching {
                match self.load(&SpecSource::Path(path.clone())).await {
                    Ok(spec) => specs_discovered.push(ScannedSpec {
                        file: path.display().to_string(),
                        title: spec.document.title().unwrap_or("Unknown").to_string(),
                        ai_tools_count: extract_tools(&spec.document).endpoints.len(),
                    }),
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        let total = specs_discovered.len();
        tracing::info!(directory = %directory, total, "scanned spec directory");
        Ok(ScanReport {
            directory,
            specs_discovered,
            total,
        })
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<LoadedSpec>> {
        self.specs.read().get(id).cloned()
    }

    /// Every stored spec, ordered by id.
    #[must_use]
    pub fn specs(&self) -> Vec<Arc<LoadedSpec>> {
        self.specs.read().values().cloned().collect()
    }
}

fn parse_document(content: &str, format: DocumentFormat, location: &str) -> Result<SpecDocument> {
    SpecDocument::parse(content, format).map_err(|e| OpenApiToolsError::SpecParse {
        location: location.to_string(),
        message: match e {
            OpenApiToolsError::Document(message) => message,
            other => other.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmcp_http_tools::error::ErrorKind;

    const MINIMAL: &str = r"
openapi: 3.0.0
info:
  title: Minimal
paths:
  /ping:
    get:
      x-ai-tool: true
      x-ai-description: Ping
";

    fn loader() -> SpecLoader {
        SpecLoader::new(LoaderConfig::default()).unwrap()
    }

    #[test]
    fn source_parsing() {
        assert!(matches!(
            SpecSource::parse("https://x.local/openapi.json").unwrap(),
            SpecSource::Url(_)
        ));
        assert_eq!(
            SpecSource::parse("specs/a.yaml").unwrap(),
            SpecSource::Path(PathBuf::from("specs/a.yaml"))
        );
        assert_eq!(
            SpecSource::parse("file:///tmp/a.yaml").unwrap(),
            SpecSource::Path(PathBuf::from("/tmp/a.yaml"))
        );
        assert!(SpecSource::parse("http://[bad").is_err());
    }

    #[test]
    fn fallback_id_is_the_file_stem() {
        let p = SpecSource::Path(PathBuf::from("/specs/petstore.yaml"));
        assert_eq!(p.fallback_id(), "petstore");
        let u = SpecSource::parse("http://x.local/v1/openapi.json").unwrap();
        assert_eq!(u.fallback_id(), "openapi");
    }

    #[tokio::test]
    async fn load_yaml_file_keys_by_title() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("min.yaml");
        std::fs::write(&path, MINIMAL).unwrap();

        let loader = loader();
        let spec = loader.load(&SpecSource::Path(path)).await.unwrap();
        assert_eq!(spec.id, "Minimal");
        assert!(loader.get("Minimal").is_some());
    }

    #[tokio::test]
    async fn untitled_json_file_keys_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("untitled.json");
        std::fs::write(&path, r#"{"paths": {}}"#).unwrap();

        let spec = loader().load(&SpecSource::Path(path)).await.unwrap();
        assert_eq!(spec.id, "untitled");
    }

    #[tokio::test]
    async fn last_load_wins_for_an_id() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        std::fs::write(&a, r#"{"info": {"title": "Same", "version": "1"}}"#).unwrap();
        std::fs::write(&b, r#"{"info": {"title": "Same", "version": "2"}}"#).unwrap();

        let loader = loader();
        loader.load(&SpecSource::Path(a)).await.unwrap();
        loader.load(&SpecSource::Path(b)).await.unwrap();

        assert_eq!(loader.specs().len(), 1);
        assert_eq!(loader.get("Same").unwrap().document.version(), Some("2"));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = loader()
            .load(&SpecSource::Path(PathBuf::from("/definitely/not/here.yaml")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn yaml_in_a_json_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wrong.json");
        std::fs::write(&path, MINIMAL).unwrap();

        let err = loader().load(&SpecSource::Path(path)).await.unwrap_err();
        assert!(matches!(err, OpenApiToolsError::SpecParse { .. }));
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[tokio::test]
    async fn scan_missing_directory_is_not_found() {
        let err = loader()
            .scan(Path::new("/definitely/not/a/dir"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn scan_orders_by_extension_then_name_and_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), MINIMAL).unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"info": {"title": "Json"}}"#).unwrap();
        std::fs::write(dir.path().join("c.yml"), "info:\n  title: Yml\n").unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "info: [unclosed").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir(dir.path().join("nested.yaml")).unwrap();

        let report = loader().scan(dir.path()).await.unwrap();
        let titles: Vec<&str> = report
            .specs_discovered
            .iter()
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Minimal", "Yml", "Json"]);
        assert_eq!(report.total, 3);
        assert_eq!(report.specs_discovered[0].ai_tools_count, 1);
        assert!(report.specs_discovered[0].file.ends_with("b.yaml"));
    }

    #[tokio::test]
    async fn slow_spec_url_times_out_as_network_error() {
        let api = openmcp_test_support::MockApi::spawn().await.unwrap();
        let loader = SpecLoader::new(LoaderConfig {
            fetch_timeout: Duration::from_millis(200),
            ..LoaderConfig::default()
        })
        .unwrap();
        let source = SpecSource::parse(&api.url("/slow")).unwrap();

        let err = loader.load(&source).await.unwrap_err();
        assert!(matches!(err, OpenApiToolsError::SpecFetch { .. }), "{err:?}");
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn unreachable_spec_url_is_network_error() {
        let port = openmcp_test_support::pick_unused_port().unwrap();
        let source = SpecSource::parse(&format!("http://127.0.0.1:{port}/spec.json")).unwrap();

        let err = loader().load(&source).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn scan_follows_symlinked_specs() {
        let dir = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        let real = target.path().join("real.yaml");
        std::fs::write(&real, MINIMAL).unwrap();
        std::os::unix::fs::symlink(&real, dir.path().join("linked.yaml")).unwrap();

        let report = loader().scan(dir.path()).await.unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.specs_discovered[0].title, "Minimal");
        assert!(report.specs_discovered[0].file.ends_with("linked.yaml"));
    }

    #[test]
    fn scan_report_serializes_camel_case() {
        let report = ScanReport {
            directory: "specs".to_string(),
            specs_discovered: vec![ScannedSpec {
                file: "specs/a.yaml".to_string(),
                title: "A".to_string(),
                ai_tools_count: 2,
            }],
            total: 1,
        };
        let v = serde_json::to_value(report).unwrap();
        assert_eq!(v["specsDiscovered"][0]["aiToolsCount"], 2);
        assert_eq!(v["total"], 1);
    }
}

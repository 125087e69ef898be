use anyhow::Context as _;
use openmcp_http_tools::runtime::DispatchConfig;
use openmcp_openapi_tools::catalog::CatalogConfig;
use openmcp_openapi_tools::loader::LoaderConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SPECS_DIR: &str = "./specs";

/// On-disk CLI configuration (YAML or JSON). Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CliConfig {
    #[serde(default)]
    pub specs_dir: Option<PathBuf>,
    /// Sources registered before every command that needs a catalog.
    #[serde(default)]
    pub specs: Vec<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_response_bytes: Option<usize>,
}

impl CliConfig {
    #[must_use]
    pub fn specs_dir(&self) -> PathBuf {
        self.specs_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SPECS_DIR))
    }

    /// Catalog settings; `request_timeout_secs` overrides the file value when set.
    #[must_use]
    pub fn catalog_config(&self, request_timeout_secs: Option<u64>) -> CatalogConfig {
        let mut dispatch = DispatchConfig::default();
        if let Some(secs) = request_timeout_secs.or(self.request_timeout_secs) {
            dispatch.request_timeout = Duration::from_secs(secs);
        }
        dispatch.max_response_bytes = self.max_response_bytes;

        let mut loader = LoaderConfig::default();
        if let Some(secs) = self.fetch_timeout_secs {
            loader.fetch_timeout = Duration::from_secs(secs);
        }

        CatalogConfig { loader, dispatch }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let base = if let Ok(v) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(v)
    } else {
        let home = std::env::var("HOME").context("HOME is not set")?;
        PathBuf::from(home).join(".config")
    };
    Ok(base.join("openmcp").join("config.yaml"))
}

/// Read the config file; a missing or empty file yields the defaults.
pub fn load_config(path: &Path) -> anyhow::Result<CliConfig> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CliConfig::default()),
        Err(e) => return Err(e).with_context(|| format!("read config {}", path.display())),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(CliConfig::default());
    }
    // JSON is a subset of YAML, so one parser covers both.
    let cfg: CliConfig =
        serde_yaml::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(cfg, CliConfig::default());
        assert_eq!(cfg.specs_dir(), PathBuf::from("./specs"));
    }

    #[test]
    fn yaml_and_json_configs_parse() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("config.yaml");
        std::fs::write(
            &yaml,
            "specsDir: /srv/specs\nspecs:\n  - ./calc.yaml\nrequestTimeoutSecs: 5\n",
        )
        .unwrap();
        let cfg = load_config(&yaml).unwrap();
        assert_eq!(cfg.specs_dir(), PathBuf::from("/srv/specs"));
        assert_eq!(cfg.specs, vec!["./calc.yaml"]);
        assert_eq!(cfg.request_timeout_secs, Some(5));

        let json = dir.path().join("config.json");
        std::fs::write(&json, r#"{"maxResponseBytes": 1024, "fetchTimeoutSecs": 3}"#).unwrap();
        let cfg = load_config(&json).unwrap();
        assert_eq!(cfg.max_response_bytes, Some(1024));
        assert_eq!(cfg.fetch_timeout_secs, Some(3));
    }

    #[test]
    fn empty_file_gives_defaults_and_unknown_fields_fail() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.yaml");
        std::fs::write(&empty, "\n").unwrap();
        assert_eq!(load_config(&empty).unwrap(), CliConfig::default());

        let typo = dir.path().join("typo.yaml");
        std::fs::write(&typo, "specDir: ./x\n").unwrap();
        assert!(load_config(&typo).is_err());
    }

    #[test]
    fn flag_timeout_overrides_file() {
        let cfg = CliConfig {
            request_timeout_secs: Some(10),
            fetch_timeout_secs: Some(2),
            max_response_bytes: Some(64),
            ..CliConfig::default()
        };
        let from_file = cfg.catalog_config(None);
        assert_eq!(from_file.dispatch.request_timeout, Duration::from_secs(10));
        assert_eq!(from_file.dispatch.max_response_bytes, Some(64));
        assert_eq!(from_file.loader.fetch_timeout, Duration::from_secs(2));

        let from_flag = cfg.catalog_config(Some(1));
        assert_eq!(from_flag.dispatch.request_timeout, Duration::from_secs(1));
    }
}

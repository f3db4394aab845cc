use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::error::ConfigError;

/// Registry and engine settings as given on the command line or in the environment.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Base URL of the domain registry (e.g. https://nocodb.example.com).
    #[arg(long = "registry-url", env = "NOCODB_URL")]
    pub registry_url: Option<String>,

    /// API token sent in the `xc-token` header.
    #[arg(long, env = "NOCODB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Table holding the domain records.
    #[arg(long = "table-id", env = "TABLE_ID")]
    pub table_id: Option<String>,

    /// Path to the grading engine script (testssl.sh).
    #[arg(long = "engine-path", env = "TESTSSL_PATH")]
    pub engine_path: Option<PathBuf>,

    /// Interpreter the engine script is run with.
    #[arg(long = "engine-shell", env = "TESTSSL_SHELL", default_value = "/bin/bash")]
    pub engine_shell: PathBuf,

    /// Directory for the engine's temporary JSON reports.
    #[arg(long = "work-dir", env = "SCAN_WORK_DIR", default_value = ".")]
    pub work_dir: PathBuf,

    /// Wall-clock limit for one engine run, in seconds.
    #[arg(long = "scan-timeout-secs", env = "SCAN_TIMEOUT_SECS", default_value_t = 600)]
    pub scan_timeout_secs: u64,

    /// Records requested per registry page.
    #[arg(long = "page-size", default_value_t = 100)]
    pub page_size: u32,

    /// Upper bound on registry pages fetched before giving up.
    #[arg(long = "max-pages", default_value_t = 1000)]
    pub max_pages: u32,

    /// Per-request timeout for registry calls, in seconds.
    #[arg(long = "http-timeout-secs", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Ignore HTTP(S)_PROXY settings when talking to the registry.
    #[arg(long = "no-proxy")]
    pub no_proxy: bool,

    /// Domains scanned at once. 1 keeps the sweep strictly sequential.
    #[arg(long, env = "SCAN_CONCURRENCY", default_value_t = 1)]
    pub concurrency: usize,
}

/// Validated settings, built once and passed by reference to every component.
#[derive(Debug, Clone)]
pub struct Config {
    pub registry_url: String,
    pub token: String,
    pub table_id: String,
    pub engine_path: PathBuf,
    pub engine_shell: PathBuf,
    pub work_dir: PathBuf,
    pub scan_timeout: Duration,
    pub page_size: u32,
    pub max_pages: u32,
    pub http_timeout: Duration,
    pub use_system_proxy: bool,
    pub concurrency: usize,
}

impl Config {
    /// `{base}/api/v2/tables/{table}/records`
    pub fn records_url(&self) -> String {
        format!(
            "{}/api/v2/tables/{}/records",
            self.registry_url.trim_end_matches('/'),
            self.table_id
        )
    }
}

impl ConfigArgs {
    /// One line per required setting, `OK` or `MISSING`, for the operator.
    pub fn presence_report(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("NOCODB_URL", present(&self.registry_url)),
            ("NOCODB_TOKEN", present(&self.token)),
            ("TABLE_ID", present(&self.table_id)),
            (
                "TESTSSL_PATH",
                self.engine_path
                    .as_ref()
                    .is_some_and(|p| !p.as_os_str().is_empty()),
            ),
        ]
    }

    pub fn resolve(self) -> Result<Config, ConfigError> {
        let missing: Vec<&'static str> = self
            .presence_report()
            .into_iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| name)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let registry_url = self.registry_url.unwrap_or_default().trim().to_string();
        if !(registry_url.starts_with("http://") || registry_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: "NOCODB_URL",
                message: format!("expected an http(s) URL, got {registry_url:?}"),
            });
        }

        Ok(Config {
            registry_url,
            token: self.token.unwrap_or_default().trim().to_string(),
            table_id: self.table_id.unwrap_or_default().trim().to_string(),
            engine_path: self.engine_path.unwrap_or_default(),
            engine_shell: self.engine_shell,
            work_dir: self.work_dir,
            scan_timeout: Duration::from_secs(self.scan_timeout_secs.max(1)),
            page_size: self.page_size.max(1),
            max_pages: self.max_pages.max(1),
            http_timeout: Duration::from_secs(self.http_timeout_secs.max(1)),
            use_system_proxy: !self.no_proxy,
            concurrency: self.concurrency.max(1),
        })
    }
}

fn present(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.trim().is_empty())
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;

use tls_sweep_rs::config::Config;

pub const TOKEN: &str = "test-token";
pub const TABLE: &str = "tbl_domains";

/// Engine body that reports grade B and one HIGH finding.
pub const GRADE_B_REPORT: &str = r#"printf '%s' '[{"id":"overall_grade","finding":"B"},{"id":"LOGJAM","severity":"HIGH"}]' > "$out""#;

/// A `/bin/sh` script standing in for the grading engine.
///
/// The script sees `$out` (report path), `$domain` and `$log`, and appends
/// every domain it is invoked for to `$log` (the `invocations` file).
pub struct FakeEngine {
    pub dir: TempDir,
    pub script: PathBuf,
    pub invocations: PathBuf,
}

impl FakeEngine {
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-testssl.sh");
        let invocations = dir.path().join("invocations.log");
        let content = format!(
            "#!/bin/sh\n\
             # --jsonfile <out> --quiet --warnings off <domain>\n\
             out=\"$2\"\n\
             domain=\"$6\"\n\
             log='{}'\n\
             echo \"$domain\" >> \"$log\"\n\
             {}\n",
            invocations.display(),
            body
        );
        fs::write(&script, content).unwrap();
        Self {
            dir,
            script,
            invocations,
        }
    }

    pub fn work_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Domains the engine was run against, in order.
    pub fn invoked(&self) -> Vec<String> {
        fs::read_to_string(&self.invocations)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn leftover_reports(&self) -> Vec<PathBuf> {
        fs::read_dir(self.work_dir())
            .unwrap()
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("temp_"))
            })
            .collect()
    }
}

pub fn test_config(registry_url: &str, engine: &FakeEngine) -> Config {
    Config {
        registry_url: registry_url.to_string(),
        token: TOKEN.to_string(),
        table_id: TABLE.to_string(),
        engine_path: engine.script.clone(),
        engine_shell: PathBuf::from("/bin/sh"),
        work_dir: engine.work_dir().to_path_buf(),
        scan_timeout: Duration::from_secs(10),
        page_size: 100,
        max_pages: 10,
        http_timeout: Duration::from_secs(5),
        use_system_proxy: false,
        concurrency: 1,
    }
}

#[derive(Debug)]
pub struct MockState {
    pub rows: Vec<Value>,
    pub fetch_status: StatusCode,
    pub failing_ids: Vec<Value>,
    pub patches: Vec<Value>,
    pub offsets: Vec<u64>,
    pub reported_total: Option<usize>,
}

/// In-process stand-in for the registry's records endpoint.
#[derive(Clone)]
pub struct MockRegistry {
    pub state: Arc<Mutex<MockState>>,
}

impl MockRegistry {
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                rows,
                fetch_status: StatusCode::OK,
                failing_ids: Vec::new(),
                patches: Vec::new(),
                offsets: Vec::new(),
                reported_total: None,
            })),
        }
    }

    pub fn fail_fetch(self, status: StatusCode) -> Self {
        self.state.lock().unwrap().fetch_status = status;
        self
    }

    pub fn fail_update_for(self, id: Value) -> Self {
        self.state.lock().unwrap().failing_ids.push(id);
        self
    }

    /// Advertise `total` in `pageInfo.totalRows` instead of the real row count.
    pub fn report_total(self, total: usize) -> Self {
        self.state.lock().unwrap().reported_total = Some(total);
        self
    }

    pub fn patches(&self) -> Vec<Value> {
        self.state.lock().unwrap().patches.clone()
    }

    pub fn offsets(&self) -> Vec<u64> {
        self.state.lock().unwrap().offsets.clone()
    }

    /// Serve on an ephemeral localhost port and return the base URL.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route(
                &format!("/api/v2/tables/{TABLE}/records"),
                get(list_records).patch(update_record),
            )
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("xc-token").and_then(|v| v.to_str().ok()) == Some(TOKEN)
}

async fn list_records(
    State(mock): State<MockRegistry>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "bad token").into_response();
    }
    let mut s = mock.state.lock().unwrap();
    if s.fetch_status != StatusCode::OK {
        return (s.fetch_status, "registry down").into_response();
    }
    let limit: usize = params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(25);
    let offset: usize = params.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    s.offsets.push(offset as u64);

    let total = s.rows.len();
    let page: Vec<Value> = s.rows.iter().skip(offset).take(limit).cloned().collect();
    Json(json!({
        "list": page,
        "pageInfo": {
            "totalRows": s.reported_total.unwrap_or(total),
            "page": offset / limit.max(1) + 1,
            "pageSize": limit,
            "isFirstPage": offset == 0,
            "isLastPage": offset + limit >= total,
        }
    }))
    .into_response()
}

async fn update_record(
    State(mock): State<MockRegistry>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "bad token").into_response();
    }
    let mut s = mock.state.lock().unwrap();
    let failing = s.failing_ids.contains(&body["Id"]);
    s.patches.push(body.clone());
    if failing {
        return (StatusCode::INTERNAL_SERVER_ERROR, "write failed").into_response();
    }
    Json(json!({ "Id": body["Id"] })).into_response()
}

pub fn row(id: u64, domain: Option<&str>, active: Value) -> Value {
    match domain {
        Some(d) => json!({ "Id": id, "Domain": d, "Active": active }),
        None => json!({ "Id": id, "Active": active }),
    }
}

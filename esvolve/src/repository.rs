use serde_json::{json, Value};
use tracing::debug;

use crate::{
    engine::Engine,
    error::{MigrationError, Result},
    protocol::{compare_versions, MigrationScriptProtocol},
    request::{HttpMethod, ScriptRequest},
};

/// Upper bound on history documents fetched by one `find_all` search.
pub const DEFAULT_QUERY_SIZE: usize = 1000;

/// Well-known id of the lock document inside the history index.
pub const LOCK_ID: &str = "lock";

const CONTENT_TYPE: &str = "Content-Type";
const APPLICATION_JSON: &str = "application/json";

/// The single object the migration engine talks to: index lifecycle,
/// CRUD over history records and the document-based cluster lock.
///
/// Failure policy is deliberately asymmetric. `lock` and `unlock` are
/// routinely contended between concurrently starting instances, so they
/// degrade to `false` and leave retry policy to the caller. Everything
/// else is relied on for deciding whether state is trustworthy and fails
/// loudly with an operation-specific message wrapping the cause.
#[derive(Clone)]
pub struct HistoryRepository {
    engine: Box<dyn Engine>,
    index: String,
    query_size: usize,
}

impl HistoryRepository {
    pub fn new<E: Engine + 'static>(engine: E, index: impl Into<String>) -> Self {
        Self {
            engine: Box::new(engine),
            index: index.into(),
            query_size: DEFAULT_QUERY_SIZE,
        }
    }

    pub fn with_query_size(mut self, query_size: usize) -> Self {
        self.query_size = query_size;
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Creates the history index unless it already exists. Safe to call
    /// repeatedly.
    pub async fn create_index_if_absent(&self) -> Result<()> {
        self.create_index_inner()
            .await
            .map_err(|err| MigrationError::repository("createIndexIfAbsent failed!", err))
    }

    async fn create_index_inner(&self) -> Result<()> {
        let probe = ScriptRequest::new(HttpMethod::Head).path(format!("/{}", self.index));
        let response = self.engine.perform(&probe).await?;

        if response.is_2xx() {
            return Ok(());
        }

        if response.status != 404 {
            self.validate_http_status_2xx(response.status, "checking index existence")?;
        }

        debug!(index = %self.index, "creating history index");

        let create = ScriptRequest::new(HttpMethod::Put)
            .path(format!("/{}", self.index))
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(history_mapping().to_string());
        let response = self.engine.perform(&create).await?;

        self.validate_http_status_2xx(response.status, "creating index")
    }

    /// Forces all prior writes to become visible to subsequent searches,
    /// closing the eventual-consistency window.
    pub async fn refresh(&self) -> Result<()> {
        self.refresh_inner()
            .await
            .map_err(|err| MigrationError::repository("refresh failed!", err))
    }

    async fn refresh_inner(&self) -> Result<()> {
        let request =
            ScriptRequest::new(HttpMethod::Post).path(format!("/{}/_refresh", self.index));
        let response = self.engine.perform(&request).await?;

        self.validate_http_status_2xx(response.status, "refreshing index")
    }

    /// All history records, ordered by version. All-or-nothing: any
    /// transport or deserialization failure surfaces, never a partial
    /// result.
    pub async fn find_all(&self) -> Result<Vec<MigrationScriptProtocol>> {
        self.find_all_inner()
            .await
            .map_err(|err| MigrationError::repository("findAll failed!", err))
    }

    async fn find_all_inner(&self) -> Result<Vec<MigrationScriptProtocol>> {
        let request = ScriptRequest::new(HttpMethod::Post)
            .path(format!("/{}/_search", self.index))
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(json!({"size": self.query_size, "query": {"match_all": {}}}).to_string());
        let response = self.engine.perform(&request).await?;

        self.validate_http_status_2xx(response.status, "searching migration history")?;

        let body: Value = serde_json::from_str(&response.body)?;
        let hits = body
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                MigrationError::UnexpectedResponse("search response without hits".into())
            })?;

        let mut protocols = Vec::with_capacity(hits.len());

        for hit in hits {
            // The lock document shares the index with history records.
            if hit.get("_id").and_then(Value::as_str) == Some(LOCK_ID) {
                continue;
            }

            let source = hit.get("_source").ok_or_else(|| {
                MigrationError::UnexpectedResponse("search hit without _source".into())
            })?;

            protocols.push(serde_json::from_value(source.clone())?);
        }

        protocols.sort_by(|a: &MigrationScriptProtocol, b| compare_versions(&a.version, &b.version));

        Ok(protocols)
    }

    /// Upserts one history record keyed by its version. Calling twice with
    /// the same version overwrites, which callers rely on when retrying a
    /// script after a partial failure.
    pub async fn save_or_update(&self, protocol: &MigrationScriptProtocol) -> Result<()> {
        self.save_inner(protocol)
            .await
            .map_err(|err| {
                MigrationError::repository(format!("saveOrUpdate of '{protocol}' failed!"), err)
            })
    }

    async fn save_inner(&self, protocol: &MigrationScriptProtocol) -> Result<()> {
        let request = ScriptRequest::new(HttpMethod::Put)
            .path(format!("/{}/_doc/{}", self.index, protocol.version))
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(serde_json::to_string(protocol)?);
        let response = self.engine.perform(&request).await?;

        self.validate_http_status_2xx(response.status, "upserting history record")
    }

    /// Attempts to acquire the cluster-wide migration lock. Returns
    /// `false` on contention or on any failure, never an error; `false`
    /// is the caller's signal to back off and retry or abort.
    pub async fn lock(&self) -> bool {
        match self.try_lock().await {
            Ok(acquired) => acquired,
            Err(err) => {
                debug!(error = %err, "lock acquisition failed");
                false
            }
        }
    }

    async fn try_lock(&self) -> Result<bool> {
        self.refresh().await?;

        // Realtime point read, so an unrefreshed competing write is still
        // observed.
        let read = ScriptRequest::new(HttpMethod::Get)
            .path(format!("/{}/_doc/{}", self.index, LOCK_ID));
        let response = self.engine.perform(&read).await?;

        let write = if response.status == 404 {
            // First writer wins: op-type create rejects a concurrent
            // creator with 409.
            ScriptRequest::new(HttpMethod::Put)
                .path(format!("/{}/_create/{}", self.index, LOCK_ID))
        } else {
            self.validate_http_status_2xx(response.status, "reading lock document")?;

            let body: Value = serde_json::from_str(&response.body)?;

            if body.pointer("/_source/locked") == Some(&Value::Bool(true)) {
                return Ok(false);
            }

            let (Some(seq_no), Some(primary_term)) = (
                body.get("_seq_no").and_then(Value::as_u64),
                body.get("_primary_term").and_then(Value::as_u64),
            ) else {
                return Err(MigrationError::UnexpectedResponse(
                    "lock document without sequence metadata".into(),
                ));
            };

            // Conditioned on the state observed above: a writer that
            // raced past us bumps the sequence number and this write
            // comes back 409 instead of silently overwriting.
            ScriptRequest::new(HttpMethod::Put).path(format!(
                "/{}/_doc/{}?if_seq_no={}&if_primary_term={}",
                self.index, LOCK_ID, seq_no, primary_term
            ))
        };

        let write = write
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(json!({"locked": true}).to_string());
        let response = self.engine.perform(&write).await?;

        if !response.is_2xx() {
            return Ok(false);
        }

        // The acquisition is already durable; a failed refresh here only
        // widens competitors' staleness window and they refresh before
        // reading anyway.
        if let Err(err) = self.refresh().await {
            debug!(error = %err, "refresh after lock acquisition failed");
        }

        Ok(true)
    }

    /// Releases the migration lock. Returns `false` when the release
    /// could not be confirmed, never an error.
    pub async fn unlock(&self) -> bool {
        match self.try_unlock().await {
            Ok(released) => released,
            Err(err) => {
                debug!(error = %err, "lock release failed");
                false
            }
        }
    }

    async fn try_unlock(&self) -> Result<bool> {
        self.refresh().await?;

        // Scoped update rather than a point write: the lock document's
        // exact sequence number may be stale by now, the locked flag is
        // what must go away.
        let request = ScriptRequest::new(HttpMethod::Post)
            .path(format!("/{}/_update_by_query?refresh=true", self.index))
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(
                json!({
                    "script": {"source": "ctx._source.locked = false", "lang": "painless"},
                    "query": {"term": {"locked": true}},
                })
                .to_string(),
            );
        let response = self.engine.perform(&request).await?;

        Ok(response.is_2xx())
    }

    /// Whether any document currently carries `locked=true`. Fails loudly:
    /// callers branch on this for correctness and a silent `false` would
    /// be unsafe.
    pub async fn is_locked(&self) -> Result<bool> {
        self.is_locked_inner()
            .await
            .map_err(|err| MigrationError::repository("isLocked check failed!", err))
    }

    async fn is_locked_inner(&self) -> Result<bool> {
        self.refresh().await?;

        let request = ScriptRequest::new(HttpMethod::Post)
            .path(format!("/{}/_count", self.index))
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(json!({"query": {"term": {"locked": true}}}).to_string());
        let response = self.engine.perform(&request).await?;

        self.validate_http_status_2xx(response.status, "counting lock documents")?;

        let body: Value = serde_json::from_str(&response.body)?;
        let count = body.get("count").and_then(Value::as_u64).ok_or_else(|| {
            MigrationError::UnexpectedResponse("count response without count".into())
        })?;

        Ok(count > 0)
    }

    /// The single chokepoint through which every raw status code is
    /// interpreted.
    pub fn validate_http_status_2xx(
        &self,
        status: u16,
        description: impl Into<String>,
    ) -> Result<()> {
        if (200..=299).contains(&status) {
            Ok(())
        } else {
            Err(MigrationError::StatusNotOk {
                description: description.into(),
                status,
            })
        }
    }
}

/// Minimal schema for history records plus the lock document.
fn history_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "version": {"type": "keyword"},
                "description": {"type": "text"},
                "scriptName": {"type": "keyword"},
                "checksum": {"type": "integer"},
                "state": {"type": "keyword"},
                "executionTimestamp": {"type": "date"},
                "executionDurationMs": {"type": "long"},
                "locked": {"type": "boolean"},
            }
        }
    })
}

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};

use crate::{
    engine::{Engine, Response},
    error::{MigrationError, Result},
    request::{HttpMethod, ScriptRequest},
};

#[derive(Debug, Clone)]
struct Document {
    source: Value,
    seq_no: u64,
    primary_term: u64,
}

#[derive(Debug, Default)]
struct State {
    exists: bool,
    /// Live documents, visible to realtime point reads immediately.
    docs: HashMap<String, Document>,
    /// Search/count view, synchronized from `docs` on `_refresh`.
    visible: HashMap<String, Document>,
    next_seq_no: u64,
}

/// An in-memory document store speaking just enough of the wire surface for
/// the repository: index existence, refresh-gated search visibility,
/// realtime point reads, sequence-number conditional writes, op-type
/// create, update-by-query and count. Each call runs under one write
/// guard, so concurrent callers interleave at request granularity.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine(Arc<RwLock<State>>);

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn perform(&self, request: &ScriptRequest) -> Result<Response> {
        let raw_path = request
            .get_path()
            .ok_or_else(|| MigrationError::Transport(anyhow::anyhow!("request without path")))?;
        let (path, query) = raw_path.split_once('?').unwrap_or((raw_path, ""));
        let params: HashMap<&str, &str> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .collect();
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        let mut state = self.0.write();

        match (request.http_method(), segments.as_slice()) {
            (HttpMethod::Head, [_index]) => {
                if state.exists {
                    Ok(Response::new(200, ""))
                } else {
                    Ok(Response::new(404, ""))
                }
            }
            (HttpMethod::Put, [_index]) => {
                if state.exists {
                    return Ok(Response::new(
                        400,
                        json!({"error": {"type": "resource_already_exists_exception"}})
                            .to_string(),
                    ));
                }

                state.exists = true;

                Ok(Response::new(200, json!({"acknowledged": true}).to_string()))
            }
            (HttpMethod::Post, [_index, "_refresh"]) => {
                if !state.exists {
                    return Ok(Response::new(404, index_not_found()));
                }

                state.visible = state.docs.clone();

                Ok(Response::new(
                    200,
                    json!({"_shards": {"total": 1, "successful": 1, "failed": 0}}).to_string(),
                ))
            }
            (HttpMethod::Post, [_index, "_search"]) => {
                if !state.exists {
                    return Ok(Response::new(404, index_not_found()));
                }

                let body: Value = parse_body(request)?;
                let size = body
                    .get("size")
                    .and_then(Value::as_u64)
                    .unwrap_or(10) as usize;

                let mut hits: Vec<(&String, &Document)> = state
                    .visible
                    .iter()
                    .filter(|(_, doc)| matches_query(&doc.source, &body))
                    .collect();
                hits.sort_by(|a, b| a.0.cmp(b.0));

                let total = hits.len();
                let hits: Vec<Value> = hits
                    .iter()
                    .take(size)
                    .map(|(id, doc)| {
                        json!({
                            "_id": id,
                            "_seq_no": doc.seq_no,
                            "_primary_term": doc.primary_term,
                            "_source": doc.source,
                        })
                    })
                    .collect();

                Ok(Response::new(
                    200,
                    json!({
                        "hits": {
                            "total": {"value": total, "relation": "eq"},
                            "hits": hits,
                        }
                    })
                    .to_string(),
                ))
            }
            (HttpMethod::Post, [_index, "_count"]) => {
                if !state.exists {
                    return Ok(Response::new(404, index_not_found()));
                }

                let body: Value = parse_body(request)?;
                let count = state
                    .visible
                    .values()
                    .filter(|doc| matches_query(&doc.source, &body))
                    .count();

                Ok(Response::new(200, json!({"count": count}).to_string()))
            }
            (HttpMethod::Post, [_index, "_update_by_query"]) => {
                if !state.exists {
                    return Ok(Response::new(404, index_not_found()));
                }

                let body: Value = parse_body(request)?;
                let matching: Vec<String> = state
                    .visible
                    .iter()
                    .filter(|(_, doc)| matches_query(&doc.source, &body))
                    .map(|(id, _)| id.clone())
                    .collect();

                // The only script this fake understands is the unlock one.
                let state = &mut *state;
                let mut updated = 0;
                for id in matching {
                    if let Some(doc) = state.docs.get_mut(&id) {
                        doc.source["locked"] = Value::Bool(false);
                        doc.seq_no = state.next_seq_no;
                        state.next_seq_no += 1;
                        updated += 1;
                    }
                }

                if params.get("refresh") == Some(&"true") {
                    state.visible = state.docs.clone();
                }

                Ok(Response::new(200, json!({"updated": updated}).to_string()))
            }
            (HttpMethod::Get, [_index, "_doc", id]) => {
                if !state.exists {
                    return Ok(Response::new(404, index_not_found()));
                }

                match state.docs.get(*id) {
                    Some(doc) => Ok(Response::new(
                        200,
                        json!({
                            "_id": id,
                            "found": true,
                            "_seq_no": doc.seq_no,
                            "_primary_term": doc.primary_term,
                            "_source": doc.source,
                        })
                        .to_string(),
                    )),
                    None => Ok(Response::new(
                        404,
                        json!({"_id": id, "found": false}).to_string(),
                    )),
                }
            }
            (HttpMethod::Put, [_index, "_doc", id]) => {
                if !state.exists {
                    return Ok(Response::new(404, index_not_found()));
                }

                if let (Some(seq_no), Some(primary_term)) =
                    (params.get("if_seq_no"), params.get("if_primary_term"))
                {
                    let matches = state.docs.get(*id).is_some_and(|doc| {
                        seq_no.parse() == Ok(doc.seq_no)
                            && primary_term.parse() == Ok(doc.primary_term)
                    });

                    if !matches {
                        return Ok(Response::new(409, version_conflict()));
                    }
                }

                let created = !state.docs.contains_key(*id);
                let source: Value = parse_body(request)?;
                let seq_no = state.next_seq_no;
                state.next_seq_no += 1;
                state.docs.insert(
                    id.to_string(),
                    Document {
                        source,
                        seq_no,
                        primary_term: 1,
                    },
                );

                Ok(Response::new(
                    if created { 201 } else { 200 },
                    json!({"_id": id, "result": if created { "created" } else { "updated" }})
                        .to_string(),
                ))
            }
            (HttpMethod::Put, [_index, "_create", id]) => {
                if !state.exists {
                    return Ok(Response::new(404, index_not_found()));
                }

                if state.docs.contains_key(*id) {
                    return Ok(Response::new(409, version_conflict()));
                }

                let source: Value = parse_body(request)?;
                let seq_no = state.next_seq_no;
                state.next_seq_no += 1;
                state.docs.insert(
                    id.to_string(),
                    Document {
                        source,
                        seq_no,
                        primary_term: 1,
                    },
                );

                Ok(Response::new(
                    201,
                    json!({"_id": id, "result": "created"}).to_string(),
                ))
            }
            _ => Err(MigrationError::Transport(anyhow::anyhow!(
                "unsupported request: {} {}",
                request.http_method(),
                raw_path
            ))),
        }
    }
}

fn parse_body(request: &ScriptRequest) -> Result<Value> {
    if request.is_body_empty() {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_str(request.get_body())?)
}

/// Supports the two query shapes the repository sends: `match_all` and a
/// single-field `term` filter.
fn matches_query(source: &Value, body: &Value) -> bool {
    let Some(term) = body.get("query").and_then(|q| q.get("term")) else {
        return true;
    };

    let Some(term) = term.as_object() else {
        return true;
    };

    term.iter()
        .all(|(field, expected)| source.get(field) == Some(expected))
}

fn index_not_found() -> String {
    json!({"error": {"type": "index_not_found_exception"}}).to_string()
}

fn version_conflict() -> String {
    json!({"error": {"type": "version_conflict_engine_exception"}}).to_string()
}

//! HTTP surface over the accumulator.
//!
//! Hashes travel hex-encoded. Every request and outcome is logged with its API name, and
//! engine errors map onto statuses: out-of-range ids answer 416, unknown hashes and digests
//! 404, a digest of an empty log 503, malformed input 400, anything else 500.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::accumulator::{Accumulator, Proof};
use crate::hash::Hash;
use crate::kvs::KvStore;
use crate::Error;

pub fn router<S>(accumulator: Arc<Accumulator<S>>) -> Router
where
  S: KvStore + Send + Sync + 'static,
{
  Router::new()
    .route("/v1/entries", post(append::<S>).get(search::<S>))
    .route("/v1/entries/:id", get(entry::<S>))
    .route("/v1/digest", get(digest::<S>))
    .route("/v1/proof", get(proof_by_hash::<S>))
    .route("/v1/proof/:id", get(proof_by_id::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(accumulator)
}

#[derive(Deserialize)]
struct AppendRequest {
  hash: String,
}

#[derive(Serialize)]
struct IdResponse {
  id: u64,
}

#[derive(Serialize)]
struct HashResponse {
  hash: String,
}

#[derive(Serialize)]
struct DigestResponse {
  digest: String,
}

#[derive(Serialize)]
struct ProofResponse {
  target: String,
  copath: Vec<String>,
  digest: String,
}

#[derive(Serialize)]
struct ApiError {
  error: String,
}

#[derive(Deserialize)]
struct SearchQuery {
  hash: String,
}

#[derive(Deserialize)]
struct ProofQuery {
  digest: Option<String>,
}

#[derive(Deserialize)]
struct ProofByHashQuery {
  hash: String,
  digest: Option<String>,
}

type Reply<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn reject(err: Error) -> (StatusCode, Json<ApiError>) {
  let status = match &err {
    Error::OutOfRange(_) => StatusCode::RANGE_NOT_SATISFIABLE,
    Error::NotFound | Error::InvalidDigest => StatusCode::NOT_FOUND,
    Error::Empty => StatusCode::SERVICE_UNAVAILABLE,
    Error::Corrupt { .. } | Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
  };
  (status, Json(ApiError { error: err.to_string() }))
}

fn bad_request(message: &str) -> (StatusCode, Json<ApiError>) {
  (StatusCode::BAD_REQUEST, Json(ApiError { error: message.to_string() }))
}

fn parse_hash(hex_hash: &str) -> Result<Hash, (StatusCode, Json<ApiError>)> {
  let bytes = hex::decode(hex_hash).map_err(|_| bad_request("hash is not valid hex"))?;
  bytes.try_into().map_err(|_| bad_request("hash must be 32 bytes"))
}

fn proof_response(proof: Proof) -> ProofResponse {
  ProofResponse {
    target: hex::encode(proof.target),
    copath: proof.copath.iter().map(hex::encode).collect(),
    digest: hex::encode(proof.root),
  }
}

async fn append<S>(
  State(accumulator): State<Arc<Accumulator<S>>>,
  Json(request): Json<AppendRequest>,
) -> Reply<IdResponse>
where
  S: KvStore + Send + Sync + 'static,
{
  info!(api = "append", hash = %request.hash, "request");
  let hash = parse_hash(&request.hash)?;
  match accumulator.append(hash) {
    Ok(id) => {
      info!(api = "append", id, "response");
      Ok(Json(IdResponse { id }))
    }
    Err(err) => {
      info!(api = "append", %err, "error");
      Err(reject(err))
    }
  }
}

async fn entry<S>(State(accumulator): State<Arc<Accumulator<S>>>, Path(id): Path<u64>) -> Reply<HashResponse>
where
  S: KvStore + Send + Sync + 'static,
{
  info!(api = "get", id, "request");
  match accumulator.get(id) {
    Ok(hash) => {
      info!(api = "get", id, hash = %hex::encode(hash), "response");
      Ok(Json(HashResponse { hash: hex::encode(hash) }))
    }
    Err(err) => {
      info!(api = "get", id, %err, "error");
      Err(reject(err))
    }
  }
}

async fn search<S>(
  State(accumulator): State<Arc<Accumulator<S>>>,
  Query(query): Query<SearchQuery>,
) -> Reply<IdResponse>
where
  S: KvStore + Send + Sync + 'static,
{
  info!(api = "search", hash = %query.hash, "request");
  let hash = parse_hash(&query.hash)?;
  match accumulator.search(hash) {
    Ok(id) => {
      info!(api = "search", id, "response");
      Ok(Json(IdResponse { id }))
    }
    Err(err) => {
      info!(api = "search", %err, "error");
      Err(reject(err))
    }
  }
}

async fn digest<S>(State(accumulator): State<Arc<Accumulator<S>>>) -> Reply<DigestResponse>
where
  S: KvStore + Send + Sync + 'static,
{
  info!(api = "digest", "request");
  match accumulator.digest() {
    Ok(digest) => {
      info!(api = "digest", digest = %hex::encode(digest), "response");
      Ok(Json(DigestResponse { digest: hex::encode(digest) }))
    }
    Err(err) => {
      info!(api = "digest", %err, "error");
      Err(reject(err))
    }
  }
}

async fn proof_by_id<S>(
  State(accumulator): State<Arc<Accumulator<S>>>,
  Path(id): Path<u64>,
  Query(query): Query<ProofQuery>,
) -> Reply<ProofResponse>
where
  S: KvStore + Send + Sync + 'static,
{
  info!(api = "proof", id, digest = query.digest.as_deref().unwrap_or("live"), "request");
  let digest = query.digest.as_deref().map(parse_hash).transpose()?;
  match accumulator.get_proof(id, digest) {
    Ok(proof) => {
      info!(api = "proof", id, digest = %hex::encode(proof.root), "response");
      Ok(Json(proof_response(proof)))
    }
    Err(err) => {
      info!(api = "proof", id, %err, "error");
      Err(reject(err))
    }
  }
}

async fn proof_by_hash<S>(
  State(accumulator): State<Arc<Accumulator<S>>>,
  Query(query): Query<ProofByHashQuery>,
) -> Reply<ProofResponse>
where
  S: KvStore + Send + Sync + 'static,
{
  info!(api = "proof", hash = %query.hash, digest = query.digest.as_deref().unwrap_or("live"), "request");
  let hash = parse_hash(&query.hash)?;
  let digest = query.digest.as_deref().map(parse_hash).transpose()?;
  let id = match accumulator.search(hash) {
    Ok(id) => id,
    Err(err) => {
      info!(api = "proof", hash = %query.hash, %err, "error");
      return Err(reject(err));
    }
  };
  match accumulator.get_proof(id, digest) {
    Ok(proof) => {
      info!(api = "proof", id, digest = %hex::encode(proof.root), "response");
      Ok(Json(proof_response(proof)))
    }
    Err(err) => {
      info!(api = "proof", id, %err, "error");
      Err(reject(err))
    }
  }
}

#[cfg(test)]
mod test {
  use axum::body::Body;
  use axum::http::Request;
  use serde_json::Value;
  use tower::ServiceExt;

  use super::*;
  use crate::kvs::MemoryKvs;

  fn router_with(leaves: &[Hash]) -> Router {
    let accumulator = Accumulator::open(MemoryKvs::new()).unwrap();
    for leaf in leaves {
      accumulator.append(*leaf).unwrap();
    }
    router(Arc::new(accumulator))
  }

  async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
  }

  #[tokio::test]
  async fn append_and_read_back() {
    let app = router_with(&[]);
    let hash = "11".repeat(32);

    let request = Request::builder()
      .method("POST")
      .uri("/v1/entries")
      .header("content-type", "application/json")
      .body(Body::from(format!("{{\"hash\":\"{hash}\"}}")))
      .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(StatusCode::OK, response.status());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(Some(0), value["id"].as_u64());

    let (status, value) = get(&app, "/v1/entries/0").await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(Some(hash.as_str()), value["hash"].as_str());

    let (status, value) = get(&app, &format!("/v1/entries?hash={hash}")).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(Some(0), value["id"].as_u64());

    let (status, value) = get(&app, "/v1/digest").await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(Some(hash.as_str()), value["digest"].as_str());

    let (status, value) = get(&app, "/v1/proof/0").await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(Some(hash.as_str()), value["target"].as_str());
    assert_eq!(Some(0), value["copath"].as_array().map(Vec::len));

    let (status, value) = get(&app, &format!("/v1/proof?hash={hash}")).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(Some(hash.as_str()), value["digest"].as_str());
  }

  #[tokio::test]
  async fn error_statuses() {
    let empty = router_with(&[]);
    let (status, _) = get(&empty, "/v1/digest").await;
    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, status);
    let (status, _) = get(&empty, "/v1/entries/0").await;
    assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, status);

    let app = router_with(&[[0x22; 32]]);
    let unknown = "33".repeat(32);
    let (status, _) = get(&app, &format!("/v1/entries?hash={unknown}")).await;
    assert_eq!(StatusCode::NOT_FOUND, status);
    let (status, _) = get(&app, &format!("/v1/proof/0?digest={unknown}")).await;
    assert_eq!(StatusCode::NOT_FOUND, status);
    let (status, _) = get(&app, "/v1/entries?hash=zz").await;
    assert_eq!(StatusCode::BAD_REQUEST, status);
    let (status, _) = get(&app, "/v1/entries?hash=2222").await;
    assert_eq!(StatusCode::BAD_REQUEST, status);
  }
}

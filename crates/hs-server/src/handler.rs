use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Json, Response};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

use hs_sdk::{Block, ContentId, HashStreamNode, Representation};

use crate::car::{write_car, CAR_CONTENT_TYPE};
use crate::error::ApiError;

pub const RAW_CONTENT_TYPE: &str = "application/vnd.ipld.raw";

const CAR_MEDIA_TYPE: &str = "application/vnd.ipld.car";
const IMMUTABLE: &str = "public, max-age=29030400, immutable";

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub node: HashStreamNode,
}

#[derive(Debug, Default, Deserialize)]
pub struct IpfsQuery {
    /// `raw` or `car`; takes precedence over the Accept header.
    pub format: Option<String>,
}

/// Choose the response representation from `?format=` or the Accept header.
/// Without either, the block tree is sent as a CAR.
pub fn negotiate(headers: &HeaderMap, format: Option<&str>) -> Result<Representation, ApiError> {
    if let Some(format) = format {
        return match format {
            "raw" => Ok(Representation::Block),
            "car" => Ok(Representation::Tree),
            other => Err(ApiError::NotAcceptable(other.to_string())),
        };
    }

    let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) else {
        return Ok(Representation::Tree);
    };
    for media in accept.split(',') {
        let media = media.split(';').next().unwrap_or("").trim();
        match media {
            RAW_CONTENT_TYPE => return Ok(Representation::Block),
            CAR_MEDIA_TYPE | "*/*" | "application/*" | "" => return Ok(Representation::Tree),
            _ => {}
        }
    }
    Err(ApiError::NotAcceptable(accept.to_string()))
}

/// `GET /ipfs/:cid`: a single raw block or the CAR of the block tree.
///
/// The whole response is read before it is sent, so a block that fails
/// verification turns into an error status rather than a truncated body.
pub async fn ipfs_handler(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    Query(query): Query<IpfsQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let cid = cid.parse::<ContentId>().map_err(|e| ApiError::InvalidCid(format!("{cid}: {e}")))?;
    let representation = negotiate(&headers, query.format.as_deref())?;

    let retrieval = state.node.get(&cid, representation).await?;
    if !retrieval.found {
        return Err(ApiError::NotFound(cid.to_string()));
    }
    let blocks: Vec<Block> = retrieval.blocks.try_collect().await?;
    tracing::debug!(%cid, blocks = blocks.len(), ?representation, "serving content");

    match representation {
        Representation::Block => {
            let block = blocks
                .into_iter()
                .next()
                .ok_or_else(|| ApiError::NotFound(cid.to_string()))?;
            Ok((
                [
                    (header::CONTENT_TYPE, RAW_CONTENT_TYPE),
                    (header::CACHE_CONTROL, IMMUTABLE),
                ],
                block.into_bytes(),
            )
                .into_response())
        }
        Representation::Tree => {
            let car = write_car(&cid, &blocks)
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            Ok((
                [
                    (header::CONTENT_TYPE, CAR_CONTENT_TYPE),
                    (header::CACHE_CONTROL, IMMUTABLE),
                ],
                car,
            )
                .into_response())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntry {
    pub file: String,
    pub cid: String,
}

/// `GET /sync`: index every new file in the raw content store.
pub async fn sync_handler(State(state): State<AppState>) -> Json<Vec<SyncEntry>> {
    let report = state.node.sync_all().await;
    for failure in &report.failed {
        tracing::warn!(path = ?failure.path, error = %failure.error, "sync failure");
    }
    Json(
        report
            .indexed
            .into_iter()
            .map(|f| SyncEntry {
                file: f.path,
                cid: f.cid.to_string(),
            })
            .collect(),
    )
}

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": "hs-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

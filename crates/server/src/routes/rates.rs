use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use models::Rate;
use serde::Deserialize;
use service::pagination::{Pagination, DEFAULT_POSITION, DEFAULT_SIZE};

use crate::errors::JsonApiError;
use crate::routes::ServerState;

/// Header carrying the caller identity set by the authenticating proxy.
pub const PRINCIPAL_HEADER: &str = "x-principal";
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub query: Option<String>,
    pub query_type: Option<String>,
    pub position: Option<u64>,
    pub size: Option<u64>,
}

impl ListQuery {
    fn page(&self) -> Pagination {
        Pagination::new(self.position.unwrap_or(DEFAULT_POSITION), self.size.unwrap_or(DEFAULT_SIZE))
    }
}

fn principal(headers: &HeaderMap) -> String {
    headers
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string()
}

/// 列出 rates（按标题排序并分页）
pub async fn list(State(state): State<ServerState>, Query(q): Query<ListQuery>) -> Json<Vec<Rate>> {
    let rates = state.rates.list(q.query.as_deref(), q.query_type.as_deref(), q.page()).await;
    Json(rates)
}

/// 创建 rate（服务端生成 ID 与审计字段）
pub async fn create(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(input): Json<Rate>,
) -> Result<Json<Rate>, JsonApiError> {
    let created = state.rates.create(input, &principal(&headers)).await?;
    Ok(Json(created))
}

/// 获取指定 rate
pub async fn read(State(state): State<ServerState>, Path(id): Path<String>) -> Result<Json<Rate>, JsonApiError> {
    Ok(Json(state.rates.read(&id).await?))
}

/// 更新指定 rate（createdAt/createdBy 不可修改）
pub async fn update(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<Rate>,
) -> Result<Json<Rate>, JsonApiError> {
    let updated = state.rates.update(&id, input, &principal(&headers)).await?;
    Ok(Json(updated))
}

/// 删除指定 rate
pub async fn delete(State(state): State<ServerState>, Path(id): Path<String>) -> Result<StatusCode, JsonApiError> {
    state.rates.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::Attachment;
use crate::services::Upload;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Header carrying the original file name when it is not in the query string
const FILE_NAME_HEADER: &str = "x-file-name";

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: Option<String>,
}

/// Uploads send the raw file as the request body
pub fn router(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/deals/:id/attachments",
            get(list_attachments).post(upload_attachment),
        )
        .route(
            "/attachments/:id",
            get(download_attachment).delete(delete_attachment),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// GET /deals/:id/attachments
async fn list_attachments(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(deal_id): Path<Uuid>,
) -> AppResult<Json<Vec<Attachment>>> {
    Ok(Json(
        state.attachment_service.list(&user.profile, deal_id).await?,
    ))
}

/// POST /deals/:id/attachments?file_name=
async fn upload_attachment(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(deal_id): Path<Uuid>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Attachment>)> {
    let file_name = upload_file_name(query.file_name, &headers)?;
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let upload = Upload {
        file_name,
        content_type,
        bytes: body.to_vec(),
    };
    let attachment = state
        .attachment_service
        .upload(&user.profile, deal_id, upload)
        .await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

/// GET /attachments/:id
async fn download_attachment(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let (attachment, bytes) = state
        .attachment_service
        .download(&user.profile, id)
        .await?;

    let content_type = HeaderValue::from_str(&attachment.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        attachment.file_name
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition)],
        bytes,
    ))
}

/// DELETE /attachments/:id
async fn delete_attachment(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.attachment_service.delete(&user.profile, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn upload_file_name(query: Option<String>, headers: &HeaderMap) -> AppResult<String> {
    query
        .or_else(|| {
            headers
                .get(FILE_NAME_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            AppError::Validation(format!(
                "file_name query parameter or {} header is required",
                FILE_NAME_HEADER
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_prefers_query() {
        let mut headers = HeaderMap::new();
        headers.insert(FILE_NAME_HEADER, HeaderValue::from_static("header.pdf"));

        let name = upload_file_name(Some("query.pdf".to_string()), &headers).unwrap();
        assert_eq!(name, "query.pdf");

        let name = upload_file_name(None, &headers).unwrap();
        assert_eq!(name, "header.pdf");
    }

    #[test]
    fn test_file_name_required() {
        let headers = HeaderMap::new();
        assert!(matches!(
            upload_file_name(None, &headers),
            Err(AppError::Validation(_))
        ));
        assert!(upload_file_name(Some("   ".to_string()), &headers).is_err());
    }
}

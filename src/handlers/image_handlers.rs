//! HTTP handlers for image upload, download and removal.
//! Streams image bodies in both directions and delegates storage concerns to
//! `ImageStore`.

use crate::{
    auth::Actor,
    errors::AppError,
    models::image::{ImageBucket, StoredImage},
    services::ServiceError,
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::io;
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

/// Upload response: stored metadata plus the URL to attach to content.
#[derive(Debug, Serialize)]
pub struct UploadedImage {
    #[serde(flatten)]
    pub image: StoredImage,
    pub url: String,
}

fn bucket_from_path(bucket: &str) -> Result<ImageBucket, AppError> {
    ImageBucket::parse(bucket).ok_or_else(|| AppError::not_found(format!("bucket `{bucket}` not found")))
}

pub(crate) fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

pub(crate) fn body_stream(body: Body) -> impl Stream<Item = io::Result<bytes::Bytes>> + Send {
    body.into_data_stream().map(|chunk| chunk.map_err(io::Error::other))
}

/// `POST /images/{bucket}?filename=` with the raw image as body. Only the
/// content buckets accept uploads here; avatars go through `/me/avatar`.
pub async fn upload_image(
    State(state): State<AppState>,
    actor: Actor,
    Path(bucket): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<UploadedImage>), AppError> {
    let bucket = bucket_from_path(&bucket)?;
    if bucket == ImageBucket::Avatars {
        return Err(ServiceError::invalid("bucket", "Avatars are uploaded through /me/avatar").into());
    }

    let image = state
        .images
        .upload_stream(
            actor.id,
            bucket,
            query.filename.as_deref(),
            content_type(&headers),
            body_stream(body),
        )
        .await?;
    let url = state.images.public_url(image.bucket, &image.key);
    Ok((StatusCode::CREATED, Json(UploadedImage { image, url })))
}

/// Download `/images/{bucket}/{*key}` as a streaming response.
pub async fn get_image(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let bucket = bucket_from_path(&bucket)?;
    let (meta, file) = state.images.open(bucket, &key).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_image_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// DELETE `/images/{bucket}/{*key}`; only the uploader may do this.
pub async fn delete_image(
    State(state): State<AppState>,
    actor: Actor,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let bucket = bucket_from_path(&bucket)?;
    state.images.remove(actor.id, bucket, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn set_image_headers(headers: &mut HeaderMap, meta: &StoredImage) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size_bytes.max(0)));

    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", meta.etag)) {
        headers.insert(header::ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(&meta.created_at.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    // keys are never reused, so the payload behind a URL never changes
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );
}

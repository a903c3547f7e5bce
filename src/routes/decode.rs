use axum::extract::Multipart;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::pipeline::parse::{decode_batch, ActivityFile};
use crate::pipeline::process::build_stored_route;
use crate::state::AppState;
use crate::types::activity::{Coordinate, FileFormat, Trackpoint};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/decode", post(decode))
}

#[derive(Serialize, Deserialize)]
pub struct DecodedFile {
    pub route_id: String,
    pub file_name: Option<String>,
    pub file_type: FileFormat,
    pub point_count: usize,
    pub has_route_data: bool,
    pub coordinates: Vec<Coordinate>,
    pub trackpoints: Vec<Trackpoint>,
}

#[derive(Serialize, Deserialize)]
pub struct DecodeResponse {
    pub files: Vec<DecodedFile>,
}

async fn decode(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DecodeResponse>, AppError> {
    let mut files: Vec<ActivityFile> = Vec::new();
    let mut declared: Option<FileFormat> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        match field.name().unwrap_or("") {
            "file" => {
                let name = field.file_name().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read file bytes: {}", e))
                })?;
                files.push(ActivityFile {
                    name,
                    bytes: bytes.to_vec(),
                    declared: None,
                });
            }
            "format" => {
                let value = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read format field: {}", e))
                })?;
                declared = Some(FileFormat::from_name(&value).ok_or_else(|| {
                    AppError::BadRequest(format!("Unsupported file format: {}", value))
                })?);
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(AppError::BadRequest("No file provided".to_string()));
    }
    for file in &mut files {
        file.declared = declared;
    }

    let decoder = state.fit_decoder();
    let (files, results) = tokio::task::spawn_blocking(move || {
        let results = decode_batch(&files, decoder);
        (files, results)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Decode task failed: {}", e)))?;

    // A batch is all or nothing: nothing is stored unless every file decoded.
    let parsed = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    let mut decoded = Vec::with_capacity(files.len());
    for (file, parsed) in files.into_iter().zip(parsed) {
        let route_id = Uuid::new_v4().to_string();
        let route = build_stored_route(&route_id, Some(parsed.file_format), &parsed.trackpoints);

        tracing::info!(
            "Decoded {} file {} as route {} ({} points)",
            parsed.file_format.as_str(),
            file.name.as_deref().unwrap_or("<unnamed>"),
            route_id,
            parsed.trackpoints.len()
        );

        decoded.push(DecodedFile {
            route_id,
            file_name: file.name,
            file_type: parsed.file_format,
            point_count: parsed.trackpoints.len(),
            has_route_data: parsed.has_route_data(),
            coordinates: route.coordinates.clone(),
            trackpoints: parsed.trackpoints,
        });
        state.store().save_route(route);
    }

    Ok(Json(DecodeResponse { files: decoded }))
}

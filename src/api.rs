// src/api.rs
//! Thin HTTP layer over the sighting store.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::SightingError;
use crate::media::ImageUpload;
use crate::sighting::{Animal, ExpiryPolicy, Sighting, SightingDraft};

/// Slack on top of the image limit for the remaining form fields.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(ctx: AppContext) -> Router {
    let body_limit = ctx
        .settings
        .media
        .max_image_bytes
        .saturating_add(FORM_OVERHEAD_BYTES);

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/api/animals", get(list_animals))
        .route("/api/sightings", get(list_sightings).post(create_sighting))
        .route("/api/sightings/expired", delete(delete_expired))
        .route("/api/sightings/{id}", get(get_sighting))
        .route("/api/sightings/{id}/refresh", post(refresh_sighting))
        .route("/api/sightings/{id}/still-here", post(refresh_sighting));

    if let Some(m) = &ctx.metrics {
        app = app.merge(m.router::<AppContext>());
    }

    if let Some(dir) = ctx.settings.static_dir.clone().filter(|d| d.is_dir()) {
        tracing::info!(target: "sightings::api", dir = %dir.display(), "serving map UI");
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(ctx)
}

// ---------- errors ----------

#[derive(Debug)]
pub struct ApiError(pub SightingError);

impl From<SightingError> for ApiError {
    fn from(err: SightingError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SightingError::Validation(_) => StatusCode::BAD_REQUEST,
            SightingError::NotFound(_) => StatusCode::NOT_FOUND,
            SightingError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SightingError::MediaUnavailable(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::error!(target: "sightings::api", error = %self.0, "request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------- wire types ----------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SightingOut {
    #[serde(flatten)]
    pub sighting: Sighting,
    pub expires_at: DateTime<Utc>,
}

impl SightingOut {
    fn new(sighting: Sighting, policy: ExpiryPolicy) -> Self {
        let expires_at = policy.expires_at(&sighting);
        Self {
            sighting,
            expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSightingBody {
    animal: Option<String>,
    #[serde(default, alias = "is_baby")]
    is_baby: Option<bool>,
    location: Option<LocationInput>,
    #[serde(default, alias = "image_url")]
    image_url: Option<String>,
}

/// Accepted location shapes: `{lat, lng}`, `{latitude, longitude}` or a
/// GeoJSON point (`coordinates` are `[lng, lat]`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocationInput {
    LatLng {
        lat: f64,
        #[serde(alias = "lon")]
        lng: f64,
    },
    Named {
        latitude: f64,
        longitude: f64,
    },
    GeoJson {
        #[serde(rename = "type")]
        kind: String,
        coordinates: Vec<f64>,
    },
}

impl LocationInput {
    fn lat_lng(&self) -> Result<(f64, f64), SightingError> {
        match self {
            LocationInput::LatLng { lat, lng } => Ok((*lat, *lng)),
            LocationInput::Named {
                latitude,
                longitude,
            } => Ok((*latitude, *longitude)),
            LocationInput::GeoJson { kind, coordinates } => {
                if !kind.eq_ignore_ascii_case("point") {
                    return Err(SightingError::validation(format!(
                        "location type '{kind}' is not a Point"
                    )));
                }
                match coordinates.as_slice() {
                    [lng, lat] => Ok((*lat, *lng)),
                    _ => Err(SightingError::validation(
                        "Point coordinates must be [lng, lat]",
                    )),
                }
            }
        }
    }
}

impl CreateSightingBody {
    fn into_draft(self) -> Result<SightingDraft, SightingError> {
        let animal = self
            .animal
            .ok_or_else(|| SightingError::validation("animal is required"))?;
        let (lat, lng) = self
            .location
            .ok_or_else(|| SightingError::validation("location is required"))?
            .lat_lng()?;
        Ok(SightingDraft {
            animal,
            is_baby: self.is_baby.unwrap_or(false),
            lat,
            lng,
            image_url: self.image_url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedOut {
    deleted_count: u64,
}

// ---------- handlers ----------

async fn health(State(ctx): State<AppContext>) -> Response {
    match ctx.store.health().await {
        Ok(store) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ok", "store": store })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(target: "sightings::api", error = %e, "health check: store unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "degraded",
                    "store": {
                        "backend": ctx.store.backend_name(),
                        "connected": false,
                        "error": e.to_string(),
                    }
                })),
            )
                .into_response()
        }
    }
}

async fn list_animals() -> Json<Vec<&'static str>> {
    Json(Animal::ALL.iter().map(Animal::as_str).collect())
}

async fn list_sightings(
    State(ctx): State<AppContext>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<SightingOut>>> {
    let limit = match params.limit.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<usize>()
                .map_err(|_| SightingError::validation(format!("invalid limit '{raw}'")))?,
        ),
    };
    let policy = ctx.store.policy();
    let rows = ctx.store.list_active(limit).await?;
    Ok(Json(
        rows.into_iter()
            .map(|s| SightingOut::new(s, policy))
            .collect(),
    ))
}

async fn create_sighting(
    State(ctx): State<AppContext>,
    req: Request,
) -> ApiResult<(StatusCode, Json<SightingOut>)> {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"));

    let draft = if is_multipart {
        let multipart = Multipart::from_request(req, &ctx)
            .await
            .map_err(|e| SightingError::validation(format!("invalid multipart body: {e}")))?;
        draft_from_multipart(&ctx, multipart).await?
    } else {
        let bytes = Bytes::from_request(req, &ctx)
            .await
            .map_err(|e| SightingError::validation(format!("unreadable body: {e}")))?;
        let body: CreateSightingBody = serde_json::from_slice(&bytes)
            .map_err(|e| SightingError::validation(format!("invalid JSON body: {e}")))?;
        body.into_draft()?
    };

    let created = ctx.store.create(draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(SightingOut::new(created, ctx.store.policy())),
    ))
}

async fn draft_from_multipart(
    ctx: &AppContext,
    mut multipart: Multipart,
) -> Result<SightingDraft, SightingError> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        SightingError::validation(format!("invalid multipart body: {e}"))
    };

    let mut animal: Option<String> = None;
    let mut is_baby = false;
    let mut lat: Option<f64> = None;
    let mut lng: Option<f64> = None;
    let mut image_url: Option<String> = None;
    let mut image: Option<ImageUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" | "photo" | "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_form)?;
                if bytes.is_empty() {
                    continue;
                }
                if !content_type.to_ascii_lowercase().starts_with("image/") {
                    return Err(SightingError::validation(format!(
                        "unsupported image type '{content_type}'"
                    )));
                }
                if bytes.len() > ctx.settings.media.max_image_bytes {
                    return Err(SightingError::validation(format!(
                        "image exceeds {} bytes",
                        ctx.settings.media.max_image_bytes
                    )));
                }
                image = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            other => {
                let text = field.text().await.map_err(bad_form)?;
                match other {
                    "animal" => animal = Some(text),
                    "isBaby" | "is_baby" => is_baby = parse_form_bool(&text)?,
                    "lat" | "latitude" => lat = Some(parse_coord("latitude", &text)?),
                    "lng" | "lon" | "longitude" => lng = Some(parse_coord("longitude", &text)?),
                    "imageUrl" | "image_url" => image_url = Some(text),
                    _ => tracing::debug!(target: "sightings::api", field = other, "ignoring form field"),
                }
            }
        }
    }

    let animal = animal.ok_or_else(|| SightingError::validation("animal is required"))?;
    let lat = lat.ok_or_else(|| SightingError::validation("latitude is required"))?;
    let lng = lng.ok_or_else(|| SightingError::validation("longitude is required"))?;

    let mut draft = SightingDraft::new(animal, lat, lng).baby(is_baby);
    draft.image_url = image_url;
    // Check the cheap fields before paying for an upload.
    draft.clone().validate()?;

    if let Some(img) = image {
        draft.image_url = Some(ctx.media.upload(img).await?);
    }
    Ok(draft)
}

fn parse_form_bool(raw: &str) -> Result<bool, SightingError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "off" | "no" => Ok(false),
        "true" | "1" | "on" | "yes" => Ok(true),
        other => Err(SightingError::validation(format!(
            "isBaby must be a boolean, got '{other}'"
        ))),
    }
}

fn parse_coord(name: &str, raw: &str) -> Result<f64, SightingError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| SightingError::validation(format!("{name} must be a number, got '{}'", raw.trim())))
}

fn parse_id(raw: &str) -> Result<Uuid, SightingError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| SightingError::validation(format!("'{raw}' is not a valid sighting id")))
}

async fn get_sighting(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<SightingOut>> {
    let id = parse_id(&id)?;
    let s = ctx.store.get(id).await?;
    Ok(Json(SightingOut::new(s, ctx.store.policy())))
}

async fn refresh_sighting(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<SightingOut>> {
    let id = parse_id(&id)?;
    let s = ctx.store.refresh(id).await?;
    Ok(Json(SightingOut::new(s, ctx.store.policy())))
}

async fn delete_expired(State(ctx): State<AppContext>) -> ApiResult<Json<DeletedOut>> {
    let n = ctx.store.delete_expired().await?;
    tracing::info!(target: "sightings::api", removed = n, "manual expiry sweep");
    Ok(Json(DeletedOut { deleted_count: n }))
}

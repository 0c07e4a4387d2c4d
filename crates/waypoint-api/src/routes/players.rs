//! # Player API
//!
//! CRUD over player records. Every route is protected; handlers only
//! translate between HTTP DTOs and [`PlayerService`](crate::service::PlayerService)
//! calls.
//!
//! ## Endpoints
//!
//! - `GET /players`: list players (paged, filterable)
//! - `GET /players/{id}`: get player
//! - `POST /players`: create player
//! - `PATCH /players/{id}`: update player
//! - `DELETE /players/{id}`: delete player
//!
//! Paths are relative to the versioned prefix added by the registrar.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use waypoint_core::{NewPlayer, Page, PageRequest, Player, PlayerFilter, PlayerId, PlayerPatch};

use crate::auth::AuthContext;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_path, extract_query};
use crate::registrar::{ApiRegistrar, Operation, RegistrarError};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Request to create a player.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePlayerRequest {
    /// Display name, 1 to 64 characters, unique.
    pub name: String,
    /// Starting level, 0 to 1000.
    #[serde(default)]
    pub level: i32,
}

impl From<CreatePlayerRequest> for NewPlayer {
    fn from(req: CreatePlayerRequest) -> Self {
        NewPlayer {
            name: req.name,
            level: req.level,
        }
    }
}

/// Partial update. Absent fields are left unchanged.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePlayerRequest {
    pub name: Option<String>,
    pub level: Option<i32>,
}

impl From<UpdatePlayerRequest> for PlayerPatch {
    fn from(req: UpdatePlayerRequest) -> Self {
        PlayerPatch {
            name: req.name,
            level: req.level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlayerResponse {
    pub id: Uuid,
    pub name: String,
    pub level: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Player> for PlayerResponse {
    fn from(player: Player) -> Self {
        Self {
            id: *player.id.as_uuid(),
            name: player.name,
            level: player.level,
            created_at: player.created_at,
            updated_at: player.updated_at,
        }
    }
}

/// One page of players.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlayerPage {
    pub items: Vec<PlayerResponse>,
    /// Offset of the next page; absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<u64>,
}

impl From<Page<Player>> for PlayerPage {
    fn from(page: Page<Player>) -> Self {
        let page = page.map(PlayerResponse::from);
        Self {
            items: page.items,
            next_offset: page.next_offset,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPlayersQuery {
    /// Index of the first player to return.
    pub offset: Option<u64>,
    /// Page size, 1 to 100. Defaults to 20.
    pub limit: Option<u32>,
    /// Case-insensitive name substring.
    pub name: Option<String>,
    /// Minimum level, inclusive.
    pub min_level: Option<i32>,
}

// ── Registration ────────────────────────────────────────────────────

/// Register the player operations.
pub fn register(registrar: &mut ApiRegistrar<AppState>) -> Result<(), RegistrarError> {
    registrar
        .register(
            Operation::new("list-players", Method::GET, "/players")
                .summary("List players")
                .response("PlayerPage"),
            list_players,
        )?
        .register(
            Operation::new("get-player", Method::GET, "/players/{id}")
                .summary("Get a player")
                .response("PlayerResponse"),
            get_player,
        )?
        .register(
            Operation::new("create-player", Method::POST, "/players")
                .summary("Create a player")
                .request("CreatePlayerRequest")
                .response("PlayerResponse"),
            create_player,
        )?
        .register(
            Operation::new("update-player", Method::PATCH, "/players/{id}")
                .summary("Update a player")
                .request("UpdatePlayerRequest")
                .response("PlayerResponse"),
            update_player,
        )?
        .register(
            Operation::new("delete-player", Method::DELETE, "/players/{id}")
                .summary("Delete a player"),
            delete_player,
        )?;
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /players: List players.
#[utoipa::path(
    get,
    path = "/players",
    params(ListPlayersQuery),
    responses(
        (status = 200, description = "One page of players", body = PlayerPage),
        (status = 401, description = "Missing or invalid credential", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid pagination", body = crate::error::ErrorBody),
    ),
    tag = "players"
)]
pub async fn list_players(
    State(state): State<AppState>,
    auth: AuthContext,
    query: Result<Query<ListPlayersQuery>, QueryRejection>,
) -> Result<Json<PlayerPage>, AppError> {
    let query = extract_query(query)?;
    let page = PageRequest::from_query(query.offset, query.limit)?;
    let filter = PlayerFilter {
        name_contains: query.name,
        min_level: query.min_level,
    };
    tracing::debug!(principal = auth.principal.as_deref(), offset = page.offset(), "listing players");
    let players = state.players.list(filter, page).await?;
    Ok(Json(players.into()))
}

/// GET /players/{id}: Get a single player.
#[utoipa::path(
    get,
    path = "/players/{id}",
    params(("id" = Uuid, Path, description = "Player ID")),
    responses(
        (status = 200, description = "Player found", body = PlayerResponse),
        (status = 401, description = "Missing or invalid credential", body = crate::error::ErrorBody),
        (status = 404, description = "Player not found", body = crate::error::ErrorBody),
    ),
    tag = "players"
)]
pub async fn get_player(
    State(state): State<AppState>,
    _auth: AuthContext,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<PlayerResponse>, AppError> {
    let id = PlayerId::from_uuid(extract_path(id)?);
    let player = state.players.get(id).await?;
    Ok(Json(player.into()))
}

/// POST /players: Create a player.
#[utoipa::path(
    post,
    path = "/players",
    request_body = CreatePlayerRequest,
    responses(
        (status = 201, description = "Player created", body = PlayerResponse),
        (status = 401, description = "Missing or invalid credential", body = crate::error::ErrorBody),
        (status = 409, description = "Name already taken", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "players"
)]
pub async fn create_player(
    State(state): State<AppState>,
    auth: AuthContext,
    body: Result<Json<CreatePlayerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PlayerResponse>), AppError> {
    let req = extract_json(body)?;
    let player = state.players.create(req.into()).await?;
    tracing::info!(player_id = %player.id, principal = auth.principal.as_deref(), "player created");
    Ok((StatusCode::CREATED, Json(player.into())))
}

/// PATCH /players/{id}: Update a player.
#[utoipa::path(
    patch,
    path = "/players/{id}",
    params(("id" = Uuid, Path, description = "Player ID")),
    request_body = UpdatePlayerRequest,
    responses(
        (status = 200, description = "Player updated", body = PlayerResponse),
        (status = 401, description = "Missing or invalid credential", body = crate::error::ErrorBody),
        (status = 404, description = "Player not found", body = crate::error::ErrorBody),
        (status = 409, description = "Name already taken", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "players"
)]
pub async fn update_player(
    State(state): State<AppState>,
    _auth: AuthContext,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdatePlayerRequest>, JsonRejection>,
) -> Result<Json<PlayerResponse>, AppError> {
    let id = PlayerId::from_uuid(extract_path(id)?);
    let req = extract_json(body)?;
    let player = state.players.update(id, req.into()).await?;
    Ok(Json(player.into()))
}

/// DELETE /players/{id}: Delete a player.
#[utoipa::path(
    delete,
    path = "/players/{id}",
    params(("id" = Uuid, Path, description = "Player ID")),
    responses(
        (status = 204, description = "Player deleted"),
        (status = 401, description = "Missing or invalid credential", body = crate::error::ErrorBody),
        (status = 404, description = "Player not found", body = crate::error::ErrorBody),
    ),
    tag = "players"
)]
pub async fn delete_player(
    State(state): State<AppState>,
    auth: AuthContext,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = PlayerId::from_uuid(extract_path(id)?);
    state.players.delete(id).await?;
    tracing::info!(player_id = %id, principal = auth.principal.as_deref(), "player deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn player() -> Player {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Player {
            id: PlayerId::new(),
            name: "ada".into(),
            level: 7,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn response_carries_player_fields() {
        let p = player();
        let resp = PlayerResponse::from(p.clone());
        assert_eq!(resp.id, *p.id.as_uuid());
        assert_eq!(resp.level, 7);
    }

    #[test]
    fn last_page_omits_next_offset() {
        let page = PlayerPage::from(Page {
            items: vec![player()],
            next_offset: None,
        });
        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("next_offset").is_none());
        assert_eq!(json["items"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn create_request_defaults_level() {
        let req: CreatePlayerRequest = serde_json::from_str(r#"{"name":"ada"}"#).unwrap();
        let new = NewPlayer::from(req);
        assert_eq!(new.level, 0);
    }
}

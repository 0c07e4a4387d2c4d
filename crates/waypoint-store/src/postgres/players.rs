//! Player persistence on the `players` table.
//!
//! Each call borrows one connection from the shared [`SqlClient`] and runs a
//! single statement, so every write is atomic for its record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use waypoint_core::{Page, PageRequest, Player, PlayerFilter, PlayerId, PlayerPatch};

use super::SqlClient;
use crate::entity::Entity;
use crate::error::StoreError;
use crate::repository::Repository;

const COLUMNS: &str = "id, name, level, created_at, updated_at";
const NAME_TAKEN: &str = "player name is already taken";

#[derive(Debug, Clone)]
pub struct PgPlayerRepository {
    client: SqlClient,
}

impl PgPlayerRepository {
    pub fn new(client: SqlClient) -> Self {
        Self { client }
    }
}

#[derive(FromRow)]
struct PlayerRow {
    id: Uuid,
    name: String,
    level: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PlayerRow {
    fn into_player(self) -> Player {
        Player {
            id: PlayerId::from_uuid(self.id),
            name: self.name,
            level: self.level,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Escape `LIKE` metacharacters so user input matches literally.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn to_i64(value: u64, what: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Validation(format!("{what} out of range")))
}

#[async_trait]
impl Repository<Player> for PgPlayerRepository {
    async fn find_by_id(&self, key: &PlayerId) -> Result<Player, StoreError> {
        let mut conn = self.client.acquire().await?;
        let row = sqlx::query_as::<_, PlayerRow>(&format!(
            "SELECT {COLUMNS} FROM players WHERE id = $1"
        ))
        .bind(key.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(PlayerRow::into_player)
            .ok_or_else(|| StoreError::not_found(Player::KIND, key))
    }

    async fn list(
        &self,
        filter: &PlayerFilter,
        page: PageRequest,
    ) -> Result<Page<Player>, StoreError> {
        let pattern = filter.name_contains.as_deref().map(like_pattern);
        let limit = to_i64(page.probe_limit(), "limit")?;
        let offset = to_i64(page.offset(), "offset")?;

        let mut conn = self.client.acquire().await?;
        let rows = sqlx::query_as::<_, PlayerRow>(&format!(
            "SELECT {COLUMNS} FROM players
             WHERE ($1::text IS NULL OR name ILIKE $1 ESCAPE '\\')
               AND ($2::int IS NULL OR level >= $2)
             ORDER BY created_at, id
             LIMIT $3 OFFSET $4"
        ))
        .bind(pattern)
        .bind(filter.min_level)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let items = rows.into_iter().map(PlayerRow::into_player).collect();
        Ok(Page::from_probe(items, page))
    }

    async fn create(&self, player: Player) -> Result<Player, StoreError> {
        let mut conn = self.client.acquire().await?;
        let row = sqlx::query_as::<_, PlayerRow>(&format!(
            "INSERT INTO players ({COLUMNS}) VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
        ))
        .bind(player.id.as_uuid())
        .bind(&player.name)
        .bind(player.level)
        .bind(player.created_at)
        .bind(player.updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| StoreError::from_sqlx(e, NAME_TAKEN))?;

        Ok(row.into_player())
    }

    async fn update(&self, key: &PlayerId, patch: PlayerPatch) -> Result<Player, StoreError> {
        let mut conn = self.client.acquire().await?;
        let row = sqlx::query_as::<_, PlayerRow>(&format!(
            "UPDATE players
             SET name = COALESCE($2, name),
                 level = COALESCE($3, level),
                 updated_at = now()
             WHERE id = $1
             RETURNING {COLUMNS}"
        ))
        .bind(key.as_uuid())
        .bind(patch.name)
        .bind(patch.level)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| StoreError::from_sqlx(e, NAME_TAKEN))?;

        row.map(PlayerRow::into_player)
            .ok_or_else(|| StoreError::not_found(Player::KIND, key))
    }

    async fn delete(&self, key: &PlayerId) -> Result<(), StoreError> {
        let mut conn = self.client.acquire().await?;
        let result = sqlx::query("DELETE FROM players WHERE id = $1")
            .bind(key.as_uuid())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Player::KIND, key));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.client.ping().await
    }
}

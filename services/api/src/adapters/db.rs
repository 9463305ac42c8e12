//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ProfileRepository` port from the `core` crate. It handles all interactions
//! with the PostgreSQL `profiles` table using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shadowcore_core::domain::{Profile, ProfileSeed, ProfileUpdate};
use shadowcore_core::ports::{PortError, PortResult, ProfileRepository};
use sqlx::types::{Json, JsonValue};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const PROFILE_COLUMNS: &str =
    "id, email, full_name, avatar_url, preferred_model, settings, created_at, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ProfileRepository` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    email: Option<String>,
    full_name: Option<String>,
    avatar_url: Option<String>,
    preferred_model: Option<String>,
    settings: JsonValue,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            avatar_url: self.avatar_url,
            preferred_model: self.preferred_model,
            settings: self.settings,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn map_fetch_error(e: sqlx::Error, user_id: Uuid) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("Profile {} not found", user_id)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// `ProfileRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileRepository for DbAdapter {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {} FROM profiles WHERE id = $1",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_fetch_error(e, user_id))?;
        Ok(record.to_domain())
    }

    async fn upsert_profile(&self, seed: &ProfileSeed) -> PortResult<()> {
        // Provider metadata only fills gaps; a name or avatar the user already set wins.
        sqlx::query(
            "INSERT INTO profiles (id, email, full_name, avatar_url, updated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (id) DO UPDATE SET \
                 email = EXCLUDED.email, \
                 full_name = COALESCE(profiles.full_name, EXCLUDED.full_name), \
                 avatar_url = COALESCE(profiles.avatar_url, EXCLUDED.avatar_url), \
                 updated_at = now()",
        )
        .bind(seed.id)
        .bind(&seed.email)
        .bind(&seed.full_name)
        .bind(&seed.avatar_url)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> PortResult<Profile> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE profiles SET updated_at = now()");
        if let Some(full_name) = &update.full_name {
            query.push(", full_name = ").push_bind(full_name.clone());
        }
        if let Some(avatar_url) = &update.avatar_url {
            query.push(", avatar_url = ").push_bind(avatar_url.clone());
        }
        if let Some(settings) = &update.settings {
            query.push(", settings = ").push_bind(Json(settings.clone()));
        }
        query
            .push(" WHERE id = ")
            .push_bind(user_id)
            .push(" RETURNING ")
            .push(PROFILE_COLUMNS);

        let record = query
            .build_query_as::<ProfileRecord>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_fetch_error(e, user_id))?;
        Ok(record.to_domain())
    }

    async fn update_preferred_model(&self, user_id: Uuid, model_id: &str) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "UPDATE profiles SET preferred_model = $1, updated_at = now() WHERE id = $2 RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(model_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_fetch_error(e, user_id))?;
        Ok(record.to_domain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_row_maps_to_not_found() {
        let id = Uuid::new_v4();
        assert_eq!(
            map_fetch_error(sqlx::Error::RowNotFound, id),
            PortError::NotFound(format!("Profile {} not found", id))
        );
        assert!(matches!(
            map_fetch_error(sqlx::Error::PoolTimedOut, id),
            PortError::Unexpected(_)
        ));
    }
}

//! SqlRegistrar - Relational Backend
//!
//! TigerStyle: explicit schema, reference checks inside the write statement.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SqlRegistrar                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pool: sqlx::SqlitePool (file or shared in-memory database)  │
//! │  Tables: buildings, units, residents                         │
//! │  Ids: IdGenerator (time-ordered, so ORDER BY id = creation)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS buildings (
//!     id TEXT PRIMARY KEY,
//!     name TEXT NOT NULL
//! );
//! CREATE TABLE IF NOT EXISTS units (
//!     id TEXT PRIMARY KEY,
//!     name TEXT NOT NULL UNIQUE,
//!     building_id TEXT
//! );
//! CREATE TABLE IF NOT EXISTS residents (
//!     id TEXT PRIMARY KEY,
//!     firstname TEXT NOT NULL,
//!     middlename TEXT NOT NULL,
//!     lastname TEXT NOT NULL,
//!     unit_id TEXT
//! );
//! CREATE INDEX IF NOT EXISTS idx_units_building ON units(building_id);
//! CREATE INDEX IF NOT EXISTS idx_residents_unit ON residents(unit_id);
//! ```
//!
//! Relationship columns carry no foreign keys: deregistration never
//! cascades and leaves dangling references behind.
//!
//! # Concurrency
//!
//! Writes that reference another entity are one guarded statement
//! (`INSERT .. SELECT .. WHERE EXISTS`, `UPDATE .. WHERE EXISTS`). SQLite
//! takes the write lock when such a statement starts, so concurrent writers
//! queue on the busy timeout instead of failing a read-to-write upgrade.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::error::ErrorKind as DbErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::constants::{SQL_ACQUIRE_TIMEOUT_MS, SQL_BUSY_TIMEOUT_MS, SQL_POOL_CONNECTIONS_MAX};
use crate::context::Context;
use crate::id::IdGenerator;

use super::entity::{
    fresh_id, Building, BuildingId, EntityKind, Resident, ResidentId, Unit, UnitId,
};
use super::error::{RegistryError, RegistryResult};
use super::registrar::Registrar;

const SCHEMA: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS buildings (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS units (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        building_id TEXT
    )",
    "CREATE TABLE IF NOT EXISTS residents (
        id TEXT PRIMARY KEY,
        firstname TEXT NOT NULL,
        middlename TEXT NOT NULL,
        lastname TEXT NOT NULL,
        unit_id TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_units_building ON units(building_id)",
    "CREATE INDEX IF NOT EXISTS idx_residents_unit ON residents(unit_id)",
];

// =============================================================================
// Rows
// =============================================================================

#[derive(FromRow)]
struct BuildingRow {
    id: String,
    name: String,
}

impl From<BuildingRow> for Building {
    fn from(row: BuildingRow) -> Self {
        Self {
            id: BuildingId::from(row.id),
            name: row.name,
        }
    }
}

#[derive(FromRow)]
struct UnitRow {
    id: String,
    name: String,
    building_id: Option<String>,
}

impl From<UnitRow> for Unit {
    fn from(row: UnitRow) -> Self {
        Self {
            id: UnitId::from(row.id),
            name: row.name,
            building_id: row.building_id.map(BuildingId::from),
        }
    }
}

#[derive(FromRow)]
struct ResidentRow {
    id: String,
    firstname: String,
    middlename: String,
    lastname: String,
    unit_id: Option<String>,
}

impl From<ResidentRow> for Resident {
    fn from(row: ResidentRow) -> Self {
        Self {
            id: ResidentId::from(row.id),
            firstname: row.firstname,
            middlename: row.middlename,
            lastname: row.lastname,
            unit_id: row.unit_id.map(UnitId::from),
        }
    }
}

// =============================================================================
// SqlRegistrar
// =============================================================================

/// Registrar backed by a relational database through `sqlx`.
///
/// Writes that reference another entity check it in the same statement as
/// the insert or update.
pub struct SqlRegistrar {
    pool: SqlitePool,
    ids: Arc<IdGenerator>,
}

impl SqlRegistrar {
    /// Connect to a SQLite database URL, e.g. `sqlite://liszt.db`.
    ///
    /// The file is created when missing and the schema is applied.
    ///
    /// # Errors
    /// `InvalidArgument` for a malformed URL, `Unavailable` when the
    /// database cannot be opened.
    pub async fn connect(url: &str) -> RegistryResult<Self> {
        if url.trim().is_empty() {
            return Err(RegistryError::invalid_argument("database url is required"));
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| RegistryError::invalid_argument(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(SQL_BUSY_TIMEOUT_MS));

        let pool = SqlitePoolOptions::new()
            .max_connections(SQL_POOL_CONNECTIONS_MAX)
            .acquire_timeout(Duration::from_millis(SQL_ACQUIRE_TIMEOUT_MS))
            .connect_with(options)
            .await
            .map_err(|e| RegistryError::unavailable_from("failed to connect to database", e))?;

        tracing::info!(
            backend = "sqlite",
            max_connections = SQL_POOL_CONNECTIONS_MAX,
            "connected to sql registrar"
        );
        Self::from_pool(pool).await
    }

    /// A private in-memory database, dropped with the registrar.
    ///
    /// # Errors
    /// `Unavailable` when the database cannot be created.
    pub async fn in_memory() -> RegistryResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| RegistryError::invalid_argument(format!("invalid database url: {e}")))?;

        // One connection that never expires, so the database outlives idle periods.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(Duration::from_millis(SQL_ACQUIRE_TIMEOUT_MS))
            .connect_with(options)
            .await
            .map_err(|e| RegistryError::unavailable_from("failed to open in-memory database", e))?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and apply the schema.
    ///
    /// # Errors
    /// `Unavailable` when the schema cannot be applied.
    pub async fn from_pool(pool: SqlitePool) -> RegistryResult<Self> {
        let registrar = Self {
            pool,
            ids: Arc::new(IdGenerator::new()),
        };
        registrar.init_schema().await?;
        Ok(registrar)
    }

    /// Replace the identifier generator, e.g. with one on a simulated clock.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn init_schema(&self) -> RegistryResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| storage_error("failed to apply schema", e))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SqlRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlRegistrar")
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Classify a driver error.
///
/// Uniqueness and foreign-key violations are conflicts, not-null and check
/// violations are bad input. Everything else, including rows that fail to
/// decode, means storage is unusable.
fn storage_error(action: &str, err: sqlx::Error) -> RegistryError {
    let violation = match &err {
        sqlx::Error::Database(db) => Some((db.kind(), db.message().to_string())),
        _ => None,
    };

    match violation {
        Some((DbErrorKind::UniqueViolation | DbErrorKind::ForeignKeyViolation, message)) => {
            RegistryError::conflict_from(format!("{action}: {message}"), err)
        }
        Some((DbErrorKind::NotNullViolation | DbErrorKind::CheckViolation, message)) => {
            RegistryError::invalid_argument(format!("{action}: {message}"))
        }
        _ if matches!(
            err,
            sqlx::Error::ColumnDecode { .. }
                | sqlx::Error::Decode(_)
                | sqlx::Error::ColumnNotFound(_)
        ) =>
        {
            RegistryError::unavailable_from(format!("{action}: stored row is unreadable"), err)
        }
        _ => RegistryError::unavailable_from(action, err),
    }
}

async fn resident_exists(pool: &SqlitePool, id: &ResidentId) -> RegistryResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM residents WHERE id = ?1")
        .bind(id.as_str())
        .fetch_optional(pool)
        .await
        .map_err(|e| storage_error("failed to look up resident", e))?;
    Ok(found.is_some())
}

// =============================================================================
// Registrar Implementation
// =============================================================================

#[async_trait]
impl Registrar for SqlRegistrar {
    async fn register_building(
        &self,
        ctx: &Context,
        building: &Building,
    ) -> RegistryResult<Building> {
        building.validate()?;
        let registered = Building {
            id: fresh_id(&self.ids, &building.id),
            name: building.name.clone(),
        };

        ctx.run(async {
            sqlx::query("INSERT INTO buildings (id, name) VALUES (?1, ?2)")
                .bind(registered.id.as_str())
                .bind(&registered.name)
                .execute(&self.pool)
                .await
                .map_err(|e| storage_error("failed to register building", e))?;
            Ok(())
        })
        .await?;

        tracing::info!(building_id = %registered.id, "registered building");
        Ok(registered)
    }

    async fn get_building_by_id(
        &self,
        ctx: &Context,
        id: &BuildingId,
    ) -> RegistryResult<Option<Building>> {
        tracing::debug!(building_id = %id, "get building");
        ctx.run(async {
            let row: Option<BuildingRow> =
                sqlx::query_as("SELECT id, name FROM buildings WHERE id = ?1")
                    .bind(id.as_str())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| storage_error("failed to get building", e))?;
            Ok(row.map(Building::from))
        })
        .await
    }

    async fn list_buildings(&self, ctx: &Context) -> RegistryResult<Vec<Building>> {
        ctx.run(async {
            let rows: Vec<BuildingRow> = sqlx::query_as("SELECT id, name FROM buildings ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| storage_error("failed to list buildings", e))?;
            Ok(rows.into_iter().map(Building::from).collect())
        })
        .await
    }

    async fn deregister_building(&self, ctx: &Context, id: &BuildingId) -> RegistryResult<()> {
        let removed = ctx
            .run(async {
                let result = sqlx::query("DELETE FROM buildings WHERE id = ?1")
                    .bind(id.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(|e| storage_error("failed to deregister building", e))?;
                Ok(result.rows_affected())
            })
            .await?;

        tracing::info!(building_id = %id, removed, "deregistered building");
        Ok(())
    }

    async fn register_unit(&self, ctx: &Context, unit: &Unit) -> RegistryResult<Unit> {
        unit.validate()?;
        let registered = Unit {
            id: fresh_id(&self.ids, &unit.id),
            name: unit.name.clone(),
            building_id: unit.building_id.clone(),
        };

        ctx.run(async {
            let result = sqlx::query(
                "INSERT INTO units (id, name, building_id) SELECT ?1, ?2, ?3 \
                 WHERE ?3 IS NULL OR EXISTS (SELECT 1 FROM buildings WHERE id = ?3)",
            )
            .bind(registered.id.as_str())
            .bind(&registered.name)
            .bind(registered.building_id.as_ref().map(BuildingId::as_str))
            .execute(&self.pool)
            .await
            .map_err(|e| match storage_error("failed to register unit", e) {
                RegistryError::Conflict { source, .. } => RegistryError::Conflict {
                    message: format!("unit name `{}` is already registered", registered.name),
                    source,
                },
                other => other,
            })?;

            match (&registered.building_id, result.rows_affected()) {
                (Some(building_id), 0) => Err(RegistryError::invalid_argument(format!(
                    "building {building_id} does not exist"
                ))),
                _ => Ok(()),
            }
        })
        .await
        .inspect_err(|e| {
            if !e.is_cancellation() {
                tracing::warn!(name = %registered.name, error = %e, "unit registration rejected");
            }
        })?;

        tracing::info!(unit_id = %registered.id, name = %registered.name, "registered unit");
        Ok(registered)
    }

    async fn get_unit_by_id(&self, ctx: &Context, id: &UnitId) -> RegistryResult<Option<Unit>> {
        ctx.run(async {
            let row: Option<UnitRow> =
                sqlx::query_as("SELECT id, name, building_id FROM units WHERE id = ?1")
                    .bind(id.as_str())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| storage_error("failed to get unit", e))?;
            Ok(row.map(Unit::from))
        })
        .await
    }

    async fn get_unit_by_name(&self, ctx: &Context, name: &str) -> RegistryResult<Option<Unit>> {
        tracing::debug!(name, "find unit");
        ctx.run(async {
            let row: Option<UnitRow> =
                sqlx::query_as("SELECT id, name, building_id FROM units WHERE name = ?1")
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| storage_error("failed to get unit by name", e))?;
            Ok(row.map(Unit::from))
        })
        .await
    }

    async fn list_building_units(
        &self,
        ctx: &Context,
        building_id: &BuildingId,
    ) -> RegistryResult<Vec<Unit>> {
        ctx.run(async {
            let rows: Vec<UnitRow> = sqlx::query_as(
                "SELECT id, name, building_id FROM units WHERE building_id = ?1 ORDER BY id",
            )
            .bind(building_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("failed to list building units", e))?;
            Ok(rows.into_iter().map(Unit::from).collect())
        })
        .await
    }

    async fn deregister_unit(&self, ctx: &Context, id: &UnitId) -> RegistryResult<()> {
        let removed = ctx
            .run(async {
                let result = sqlx::query("DELETE FROM units WHERE id = ?1")
                    .bind(id.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(|e| storage_error("failed to deregister unit", e))?;
                Ok(result.rows_affected())
            })
            .await?;

        tracing::info!(unit_id = %id, removed, "deregistered unit");
        Ok(())
    }

    async fn register_resident(
        &self,
        ctx: &Context,
        resident: &Resident,
    ) -> RegistryResult<Resident> {
        resident.validate()?;
        let registered = Resident {
            id: fresh_id(&self.ids, &resident.id),
            ..resident.clone()
        };

        ctx.run(async {
            let result = sqlx::query(
                "INSERT INTO residents (id, firstname, middlename, lastname, unit_id) \
                 SELECT ?1, ?2, ?3, ?4, ?5 \
                 WHERE ?5 IS NULL OR EXISTS (SELECT 1 FROM units WHERE id = ?5)",
            )
            .bind(registered.id.as_str())
            .bind(&registered.firstname)
            .bind(&registered.middlename)
            .bind(&registered.lastname)
            .bind(registered.unit_id.as_ref().map(UnitId::as_str))
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("failed to register resident", e))?;

            match (&registered.unit_id, result.rows_affected()) {
                (Some(unit_id), 0) => Err(RegistryError::invalid_argument(format!(
                    "unit {unit_id} does not exist"
                ))),
                _ => Ok(()),
            }
        })
        .await
        .inspect_err(|e| {
            if !e.is_cancellation() {
                tracing::warn!(error = %e, "resident registration rejected");
            }
        })?;

        tracing::info!(resident_id = %registered.id, "registered resident");
        Ok(registered)
    }

    async fn get_resident_by_id(
        &self,
        ctx: &Context,
        id: &ResidentId,
    ) -> RegistryResult<Option<Resident>> {
        ctx.run(async {
            let row: Option<ResidentRow> = sqlx::query_as(
                "SELECT id, firstname, middlename, lastname, unit_id FROM residents WHERE id = ?1",
            )
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("failed to get resident", e))?;
            Ok(row.map(Resident::from))
        })
        .await
    }

    async fn list_unit_residents(
        &self,
        ctx: &Context,
        unit_id: &UnitId,
    ) -> RegistryResult<Vec<Resident>> {
        ctx.run(async {
            let rows: Vec<ResidentRow> = sqlx::query_as(
                "SELECT id, firstname, middlename, lastname, unit_id FROM residents \
                 WHERE unit_id = ?1 ORDER BY id",
            )
            .bind(unit_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("failed to list unit residents", e))?;
            Ok(rows.into_iter().map(Resident::from).collect())
        })
        .await
    }

    async fn deregister_resident(&self, ctx: &Context, id: &ResidentId) -> RegistryResult<()> {
        let removed = ctx
            .run(async {
                let result = sqlx::query("DELETE FROM residents WHERE id = ?1")
                    .bind(id.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(|e| storage_error("failed to deregister resident", e))?;
                Ok(result.rows_affected())
            })
            .await?;

        tracing::info!(resident_id = %id, removed, "deregistered resident");
        Ok(())
    }

    async fn move_resident(
        &self,
        ctx: &Context,
        resident_id: &ResidentId,
        unit_id: &UnitId,
    ) -> RegistryResult<()> {
        ctx.run(async {
            let result = sqlx::query(
                "UPDATE residents SET unit_id = ?1 \
                 WHERE id = ?2 AND EXISTS (SELECT 1 FROM units WHERE id = ?1)",
            )
            .bind(unit_id.as_str())
            .bind(resident_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("failed to move resident", e))?;

            if result.rows_affected() > 0 {
                return Ok(());
            }
            // Nothing matched: report the resident first, then the unit
            if resident_exists(&self.pool, resident_id).await? {
                Err(RegistryError::not_found(EntityKind::Unit, unit_id))
            } else {
                Err(RegistryError::not_found(EntityKind::Resident, resident_id))
            }
        })
        .await?;

        tracing::info!(resident_id = %resident_id, unit_id = %unit_id, "moved resident");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

//! DocumentRegistrar - Document Store Backend
//!
//! TigerStyle: one table per entity, strict decoding, single-item writes.
//!
//! Each entity is stored as one JSON item keyed by `id`. Relationship fields
//! are plain attributes, `null` when unset. There is no multi-item
//! atomicity: reference and uniqueness checks are reads issued before the
//! write, so racing writers can slip past them. Moving a resident is a
//! conditional single-item update and never recreates a deleted resident.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::TableNames;
use crate::context::Context;
use crate::id::IdGenerator;
use crate::store::{Item, ItemStore, ItemStoreError};

use super::entity::{
    fresh_id, Building, BuildingId, EntityKind, Resident, ResidentId, Unit, UnitId,
};
use super::error::{RegistryError, RegistryResult};
use super::registrar::Registrar;

/// Attribute updated by `move_resident`.
const UNIT_ID_ATTRIBUTE: &str = "unit_id";

/// Registrar over any [`ItemStore`].
pub struct DocumentRegistrar<S: ItemStore> {
    store: Arc<S>,
    tables: TableNames,
    ids: Arc<IdGenerator>,
}

impl<S: ItemStore> DocumentRegistrar<S> {
    /// Create a registrar writing to `tables` in `store`.
    #[must_use]
    pub fn new(store: Arc<S>, tables: TableNames) -> Self {
        Self {
            store,
            tables,
            ids: Arc::new(IdGenerator::new()),
        }
    }

    /// Replace the identifier generator.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The table names in use.
    #[must_use]
    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    // -------------------------------------------------------------------------
    // Typed access
    // -------------------------------------------------------------------------

    async fn put<T: Serialize>(&self, table: &str, entity: &T) -> RegistryResult<()> {
        let item = encode(entity)?;
        self.store
            .put_item(table, item)
            .await
            .map_err(|e| store_error(&format!("failed to write {table}"), e))
    }

    async fn get<T: DeserializeOwned>(&self, table: &str, id: &str) -> RegistryResult<Option<T>> {
        let item = self
            .store
            .get_item(table, id)
            .await
            .map_err(|e| store_error(&format!("failed to read {table}"), e))?;
        item.map(|item| decode(table, item)).transpose()
    }

    async fn exists(&self, table: &str, id: &str) -> RegistryResult<bool> {
        let item = self
            .store
            .get_item(table, id)
            .await
            .map_err(|e| store_error(&format!("failed to read {table}"), e))?;
        Ok(item.is_some())
    }

    /// Decode every item in `table`; one bad item fails the whole scan.
    async fn scan<T: DeserializeOwned>(&self, table: &str) -> RegistryResult<Vec<T>> {
        let items = self
            .store
            .scan(table)
            .await
            .map_err(|e| store_error(&format!("failed to scan {table}"), e))?;
        items.into_iter().map(|item| decode(table, item)).collect()
    }

    async fn delete(&self, table: &str, id: &str) -> RegistryResult<()> {
        self.store
            .delete_item(table, id)
            .await
            .map_err(|e| store_error(&format!("failed to delete from {table}"), e))
    }
}

impl<S: ItemStore> std::fmt::Debug for DocumentRegistrar<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRegistrar")
            .field("tables", &self.tables)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn encode<T: Serialize>(entity: &T) -> RegistryResult<Item> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(item)) => Ok(item),
        Ok(other) => Err(RegistryError::invalid_argument(format!(
            "entity encoded as {other}, expected an object"
        ))),
        Err(e) => Err(RegistryError::invalid_argument(format!(
            "entity cannot be encoded: {e}"
        ))),
    }
}

fn decode<T: DeserializeOwned>(table: &str, item: Item) -> RegistryResult<T> {
    serde_json::from_value(Value::Object(item))
        .map_err(|e| RegistryError::unavailable_from(format!("unreadable item in {table}"), e))
}

fn store_error(action: &str, err: ItemStoreError) -> RegistryError {
    match err {
        ItemStoreError::Rejected { .. } => RegistryError::conflict_from(action, err),
        ItemStoreError::Unavailable { .. } => RegistryError::unavailable_from(action, err),
    }
}

fn by_id<T, K: Ord>(mut entities: Vec<T>, id: impl Fn(&T) -> K) -> Vec<T> {
    entities.sort_by_key(|entity| id(entity));
    entities
}

// =============================================================================
// Registrar Implementation
// =============================================================================

#[async_trait]
impl<S: ItemStore> Registrar for DocumentRegistrar<S> {
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

        ctx.run(self.put(&self.tables.buildings, &registered)).await?;

        tracing::info!(building_id = %registered.id, "registered building");
        Ok(registered)
    }

    async fn get_building_by_id(
        &self,
        ctx: &Context,
        id: &BuildingId,
    ) -> RegistryResult<Option<Building>> {
        tracing::debug!(building_id = %id, "get building");
        ctx.run(self.get(&self.tables.buildings, id.as_str())).await
    }

    async fn list_buildings(&self, ctx: &Context) -> RegistryResult<Vec<Building>> {
        let buildings: Vec<Building> = ctx.run(self.scan(&self.tables.buildings)).await?;
        Ok(by_id(buildings, |b| b.id.clone()))
    }

    async fn deregister_building(&self, ctx: &Context, id: &BuildingId) -> RegistryResult<()> {
        ctx.run(self.delete(&self.tables.buildings, id.as_str()))
            .await?;
        tracing::info!(building_id = %id, "deregistered building");
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
            if let Some(building_id) = &registered.building_id {
                if !self.exists(&self.tables.buildings, building_id.as_str()).await? {
                    return Err(RegistryError::invalid_argument(format!(
                        "building {building_id} does not exist"
                    )));
                }
            }

            let units: Vec<Unit> = self.scan(&self.tables.units).await?;
            if units.iter().any(|existing| existing.name == registered.name) {
                return Err(RegistryError::conflict(format!(
                    "unit name `{}` is already registered",
                    registered.name
                )));
            }

            self.put(&self.tables.units, &registered).await
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
        tracing::debug!(unit_id = %id, "get unit");
        ctx.run(self.get(&self.tables.units, id.as_str())).await
    }

    async fn get_unit_by_name(&self, ctx: &Context, name: &str) -> RegistryResult<Option<Unit>> {
        tracing::debug!(name, "find unit");
        let units: Vec<Unit> = ctx.run(self.scan(&self.tables.units)).await?;
        Ok(by_id(units, |u| u.id.clone())
            .into_iter()
            .find(|unit| unit.name == name))
    }

    async fn list_building_units(
        &self,
        ctx: &Context,
        building_id: &BuildingId,
    ) -> RegistryResult<Vec<Unit>> {
        let units: Vec<Unit> = ctx.run(self.scan(&self.tables.units)).await?;
        let matching: Vec<Unit> = units
            .into_iter()
            .filter(|unit| unit.building_id.as_ref() == Some(building_id))
            .collect();
        Ok(by_id(matching, |u| u.id.clone()))
    }

    async fn deregister_unit(&self, ctx: &Context, id: &UnitId) -> RegistryResult<()> {
        ctx.run(self.delete(&self.tables.units, id.as_str())).await?;
        tracing::info!(unit_id = %id, "deregistered unit");
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
            if let Some(unit_id) = &registered.unit_id {
                if !self.exists(&self.tables.units, unit_id.as_str()).await? {
                    return Err(RegistryError::invalid_argument(format!(
                        "unit {unit_id} does not exist"
                    )));
                }
            }
            self.put(&self.tables.residents, &registered).await
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
        tracing::debug!(resident_id = %id, "get resident");
        ctx.run(self.get(&self.tables.residents, id.as_str())).await
    }

    async fn list_unit_residents(
        &self,
        ctx: &Context,
        unit_id: &UnitId,
    ) -> RegistryResult<Vec<Resident>> {
        let residents: Vec<Resident> = ctx.run(self.scan(&self.tables.residents)).await?;
        let matching: Vec<Resident> = residents
            .into_iter()
            .filter(|resident| resident.unit_id.as_ref() == Some(unit_id))
            .collect();
        Ok(by_id(matching, |r| r.id.clone()))
    }

    async fn deregister_resident(&self, ctx: &Context, id: &ResidentId) -> RegistryResult<()> {
        ctx.run(self.delete(&self.tables.residents, id.as_str()))
            .await?;
        tracing::info!(resident_id = %id, "deregistered resident");
        Ok(())
    }

    async fn move_resident(
        &self,
        ctx: &Context,
        resident_id: &ResidentId,
        unit_id: &UnitId,
    ) -> RegistryResult<()> {
        ctx.run(async {
            if !self.exists(&self.tables.residents, resident_id.as_str()).await? {
                return Err(RegistryError::not_found(EntityKind::Resident, resident_id));
            }
            if !self.exists(&self.tables.units, unit_id.as_str()).await? {
                return Err(RegistryError::not_found(EntityKind::Unit, unit_id));
            }

            let updated = self
                .store
                .update_attribute(
                    &self.tables.residents,
                    resident_id.as_str(),
                    UNIT_ID_ATTRIBUTE,
                    Value::String(unit_id.to_string()),
                )
                .await
                .map_err(|e| store_error("failed to move resident", e))?;

            // Deleted between the check and the update
            if !updated {
                return Err(RegistryError::not_found(EntityKind::Resident, resident_id));
            }
            Ok(())
        })
        .await?;

        tracing::info!(resident_id = %resident_id, unit_id = %unit_id, "moved resident");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

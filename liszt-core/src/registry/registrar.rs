//! Registrar - the storage-agnostic contract.
//!
//! Every backend implements this trait with the same observable behaviour:
//!
//! - Register* ignores any identifier in its input and returns the stored
//!   record with a freshly generated one.
//! - Get* and List* treat absence as `Ok(None)` / an empty vec, never as an error.
//! - Deregister* succeeds whether or not the entity existed, and never cascades.
//! - `move_resident` fails with `NotFound` when the resident or the
//!   destination unit is missing.
//! - Every call honours the cancellation and deadline of its [`Context`].

use async_trait::async_trait;

use crate::context::Context;

use super::entity::{Building, BuildingId, Resident, ResidentId, Unit, UnitId};
use super::error::RegistryResult;

/// Lifecycle operations for buildings, units and residents.
#[async_trait]
pub trait Registrar: Send + Sync {
    // -------------------------------------------------------------------------
    // Buildings
    // -------------------------------------------------------------------------

    /// Store a new building under a fresh identifier.
    ///
    /// # Errors
    /// `InvalidArgument` when the name is blank or too long.
    async fn register_building(&self, ctx: &Context, building: &Building)
        -> RegistryResult<Building>;

    /// Fetch a building, `None` when absent.
    async fn get_building_by_id(
        &self,
        ctx: &Context,
        id: &BuildingId,
    ) -> RegistryResult<Option<Building>>;

    /// All buildings in creation order.
    async fn list_buildings(&self, ctx: &Context) -> RegistryResult<Vec<Building>>;

    /// Remove a building. Units inside it are left dangling.
    async fn deregister_building(&self, ctx: &Context, id: &BuildingId) -> RegistryResult<()>;

    // -------------------------------------------------------------------------
    // Units
    // -------------------------------------------------------------------------

    /// Store a new unit under a fresh identifier.
    ///
    /// # Errors
    /// `InvalidArgument` when the name is blank or the building does not
    /// exist; `Conflict` when the name is already registered.
    async fn register_unit(&self, ctx: &Context, unit: &Unit) -> RegistryResult<Unit>;

    /// Fetch a unit by identifier, `None` when absent.
    async fn get_unit_by_id(&self, ctx: &Context, id: &UnitId) -> RegistryResult<Option<Unit>>;

    /// Fetch a unit by exact name, `None` when absent.
    async fn get_unit_by_name(&self, ctx: &Context, name: &str) -> RegistryResult<Option<Unit>>;

    /// Units belonging to a building, in creation order.
    async fn list_building_units(
        &self,
        ctx: &Context,
        building_id: &BuildingId,
    ) -> RegistryResult<Vec<Unit>>;

    /// Remove a unit. Residents in it are left dangling.
    async fn deregister_unit(&self, ctx: &Context, id: &UnitId) -> RegistryResult<()>;

    // -------------------------------------------------------------------------
    // Residents
    // -------------------------------------------------------------------------

    /// Store a new resident under a fresh identifier.
    ///
    /// # Errors
    /// `InvalidArgument` when a name is too long or `unit_id` names a
    /// unit that does not exist.
    async fn register_resident(&self, ctx: &Context, resident: &Resident)
        -> RegistryResult<Resident>;

    /// Fetch a resident, `None` when absent.
    async fn get_resident_by_id(
        &self,
        ctx: &Context,
        id: &ResidentId,
    ) -> RegistryResult<Option<Resident>>;

    /// Residents currently assigned to a unit, in creation order.
    async fn list_unit_residents(
        &self,
        ctx: &Context,
        unit_id: &UnitId,
    ) -> RegistryResult<Vec<Resident>>;

    /// Remove a resident.
    async fn deregister_resident(&self, ctx: &Context, id: &ResidentId) -> RegistryResult<()>;

    /// Assign a resident to a unit.
    ///
    /// # Errors
    /// `NotFound` when the resident or the destination unit does not exist.
    async fn move_resident(
        &self,
        ctx: &Context,
        resident_id: &ResidentId,
        unit_id: &UnitId,
    ) -> RegistryResult<()>;
}

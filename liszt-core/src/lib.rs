//! Liszt Core - Building, Unit and Resident Registry
//!
//! TigerStyle: one storage-agnostic contract, several interchangeable backends.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Registrar Trait                         │
//! │  register / get / list / deregister  +  move_resident       │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                                   ↑
//!          │                                   │
//! ┌────────┴────────┐              ┌───────────┴──────────┐
//! │  SqlRegistrar   │              │  DocumentRegistrar   │
//! │ (sqlx, SQLite)  │              │   over ItemStore     │
//! └─────────────────┘              └──────────┬───────────┘
//!                                    ┌────────┴────────┐
//!                           MemoryItemStore    DynamoItemStore
//! ```
//!
//! Both backends generate identifiers with [`IdGenerator`] and honour the
//! cancellation and deadline carried by [`Context`] on every call.
//!
//! # Usage
//!
//! ```rust,no_run
//! use liszt_core::{Building, Context, Registrar, SqlRegistrar};
//!
//! # async fn demo() -> liszt_core::RegistryResult<()> {
//! let registrar = SqlRegistrar::in_memory().await?;
//! let ctx = Context::background();
//!
//! let building = registrar
//!     .register_building(&ctx, &Building::named("Residence Hall"))
//!     .await?;
//! let found = registrar.get_building_by_id(&ctx, &building.id).await?;
//! assert_eq!(found, Some(building));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod constants;
pub mod context;
pub mod id;
pub mod registry;
pub mod store;

// Re-export common types
pub use clock::{Clock, SimClock, SystemClock};
pub use config::{open_registrar, BackendConfig, ConfigError, RegistryConfig, TableNames};
pub use context::Context;
pub use id::{IdError, IdGenerator, Identifier};
pub use registry::{
    Building, BuildingId, DocumentRegistrar, EntityKind, ErrorKind, Registrar, RegistryError,
    RegistryResult, Resident, ResidentId, SqlRegistrar, Unit, UnitId,
};
pub use store::{Item, ItemStore, ItemStoreError, ItemStoreResult, MemoryItemStore};

#[cfg(feature = "dynamodb")]
pub use store::DynamoItemStore;

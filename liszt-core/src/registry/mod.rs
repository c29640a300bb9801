//! Registry - Registrar Trait and Backends
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Registrar Trait                         │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                              ↑
//!          │                              │
//! ┌────────┴────────┐           ┌────────┴──────────┐
//! │  SqlRegistrar   │           │ DocumentRegistrar │
//! │ (transactional) │           │  (best-effort)    │
//! └─────────────────┘           └───────────────────┘
//! ```
//!
//! The relational backend checks references inside a transaction. The
//! document backend performs the same checks as separate reads before a
//! single-item write, so concurrent writers may slip past them.

mod document;
mod entity;
mod error;
mod registrar;
mod sql;

pub use document::DocumentRegistrar;
pub use entity::{Building, BuildingId, EntityKind, Resident, ResidentId, Unit, UnitId};
pub use error::{BoxError, ErrorKind, RegistryError, RegistryResult};
pub use registrar::Registrar;
pub use sql::SqlRegistrar;

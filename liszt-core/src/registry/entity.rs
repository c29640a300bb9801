//! Entity - Buildings, Units and Residents
//!
//! TigerStyle: explicit types, validation before persistence.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{NAME_BYTES_MAX, PERSON_NAME_BYTES_MAX};
use crate::id::{IdGenerator, Identifier};

use super::error::{RegistryError, RegistryResult};

// =============================================================================
// Entity Kind
// =============================================================================

/// The three entity types held by a registrar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A building
    Building,
    /// A unit inside a building
    Unit,
    /// A person living in a unit
    Resident,
}

impl EntityKind {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Unit => "unit",
            Self::Resident => "resident",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier text.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is unset.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<Identifier> for $name {
            fn from(id: Identifier) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

entity_id! {
    /// Identifier of a [`Building`].
    BuildingId
}

entity_id! {
    /// Identifier of a [`Unit`].
    UnitId
}

entity_id! {
    /// Identifier of a [`Resident`].
    ResidentId
}

// =============================================================================
// Records
// =============================================================================

/// A building. Names are free-form and may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Backend-generated identifier
    pub id: BuildingId,
    /// Display name
    pub name: String,
}

impl Building {
    /// An unregistered building with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: BuildingId::default(),
            name: name.into(),
        }
    }

    pub(crate) fn validate(&self) -> RegistryResult<()> {
        validate_label("building name", &self.name)
    }
}

/// A unit: a sub-location within a building, looked up by unique name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Backend-generated identifier
    pub id: UnitId,
    /// Unique name
    pub name: String,
    /// Owning building, if any
    pub building_id: Option<BuildingId>,
}

impl Unit {
    /// An unregistered, free-standing unit.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: UnitId::default(),
            name: name.into(),
            building_id: None,
        }
    }

    /// An unregistered unit inside `building_id`.
    #[must_use]
    pub fn in_building(name: impl Into<String>, building_id: BuildingId) -> Self {
        Self {
            building_id: Some(building_id),
            ..Self::named(name)
        }
    }

    pub(crate) fn validate(&self) -> RegistryResult<()> {
        validate_label("unit name", &self.name)?;
        if self.building_id.as_ref().is_some_and(BuildingId::is_empty) {
            return Err(RegistryError::invalid_argument("unit building_id must not be empty"));
        }
        Ok(())
    }
}

/// A resident. `unit_id` is `None` while unassigned and changes only
/// through `move_resident`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resident {
    /// Backend-generated identifier
    pub id: ResidentId,
    /// Given name
    pub firstname: String,
    /// Middle name
    pub middlename: String,
    /// Family name
    pub lastname: String,
    /// Current unit, if assigned
    pub unit_id: Option<UnitId>,
}

impl Resident {
    /// An unregistered, unassigned resident.
    #[must_use]
    pub fn new(
        firstname: impl Into<String>,
        middlename: impl Into<String>,
        lastname: impl Into<String>,
    ) -> Self {
        Self {
            id: ResidentId::default(),
            firstname: firstname.into(),
            middlename: middlename.into(),
            lastname: lastname.into(),
            unit_id: None,
        }
    }

    pub(crate) fn validate(&self) -> RegistryResult<()> {
        for (field, value) in [
            ("firstname", &self.firstname),
            ("middlename", &self.middlename),
            ("lastname", &self.lastname),
        ] {
            if value.len() > PERSON_NAME_BYTES_MAX {
                return Err(RegistryError::invalid_argument(format!(
                    "resident {field} {} bytes exceeds max {PERSON_NAME_BYTES_MAX}",
                    value.len()
                )));
            }
        }
        if self.unit_id.as_ref().is_some_and(UnitId::is_empty) {
            return Err(RegistryError::invalid_argument("resident unit_id must not be empty"));
        }
        Ok(())
    }
}

/// A fresh identifier that differs from the one supplied by the caller.
pub(crate) fn fresh_id<T>(ids: &IdGenerator, supplied: &T) -> T
where
    T: From<Identifier> + PartialEq,
{
    loop {
        let id = T::from(ids.new_id());
        if &id != supplied {
            return id;
        }
    }
}

fn validate_label(field: &str, value: &str) -> RegistryResult<()> {
    if value.trim().is_empty() {
        return Err(RegistryError::invalid_argument(format!("{field} is required")));
    }
    if value.len() > NAME_BYTES_MAX {
        return Err(RegistryError::invalid_argument(format!(
            "{field} {} bytes exceeds max {NAME_BYTES_MAX}",
            value.len()
        )));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

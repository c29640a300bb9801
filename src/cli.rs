//! CLI - Arguments and Command Dispatch
//!
//! TigerStyle: one registrar call per invocation, JSON on stdout.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use liszt_core::constants::{
    BUILDING_TABLE_NAME_DEFAULT, REQUEST_TIMEOUT_MS_DEFAULT, RESIDENT_TABLE_NAME_DEFAULT,
    UNIT_TABLE_NAME_DEFAULT,
};
use liszt_core::{
    BackendConfig, Building, BuildingId, Context, EntityKind, Registrar, RegistryConfig,
    Resident, ResidentId, TableNames, Unit, UnitId,
};
use serde::Serialize;
use serde_json::{json, Value};

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Application name
pub const APP_NAME: &str = "liszt";

/// Default data directory for the SQLite database
pub const DATA_DIR_DEFAULT: &str = "~/.liszt";

/// Database file created inside the data directory
pub const DATABASE_FILE_NAME: &str = "liszt.db";

// =============================================================================
// Arguments
// =============================================================================

/// Liszt - building, unit and resident registry
#[derive(Parser, Debug)]
#[command(name = APP_NAME)]
#[command(about = "Register buildings, units and residents")]
#[command(version)]
pub struct Cli {
    /// Storage backend
    #[arg(long, value_enum, env = "LISZT_BACKEND", default_value_t = BackendKind::Sql)]
    pub backend: BackendKind,

    /// Data directory holding the SQLite database
    #[arg(long, env = "LISZT_DATA_DIR", default_value = DATA_DIR_DEFAULT)]
    pub data_dir: String,

    /// SQLite URL, overrides the data directory
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Per-call timeout in milliseconds
    #[arg(long, env = "LISZT_TIMEOUT_MS", default_value_t = REQUEST_TIMEOUT_MS_DEFAULT)]
    pub timeout_ms: u64,

    /// DynamoDB region
    #[arg(long, env = "LISZT_DYNAMODB_REGION")]
    pub region: Option<String>,

    /// DynamoDB endpoint override
    #[arg(long, env = "LISZT_DYNAMODB_ENDPOINT")]
    pub endpoint: Option<String>,

    #[command(flatten)]
    pub tables: TableArgs,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Selectable backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// SQLite through sqlx
    Sql,
    /// In-process document store, discarded on exit
    Memory,
    /// DynamoDB document store
    Dynamodb,
}

/// Document table names.
#[derive(Args, Debug)]
pub struct TableArgs {
    /// Buildings table
    #[arg(long, env = "LISZT_BUILDINGS_TABLE", default_value = BUILDING_TABLE_NAME_DEFAULT)]
    pub buildings_table: String,

    /// Units table
    #[arg(long, env = "LISZT_UNITS_TABLE", default_value = UNIT_TABLE_NAME_DEFAULT)]
    pub units_table: String,

    /// Residents table
    #[arg(long, env = "LISZT_RESIDENTS_TABLE", default_value = RESIDENT_TABLE_NAME_DEFAULT)]
    pub residents_table: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage buildings
    Building {
        #[command(subcommand)]
        action: BuildingCommand,
    },
    /// Manage units
    Unit {
        #[command(subcommand)]
        action: UnitCommand,
    },
    /// Manage residents
    Resident {
        #[command(subcommand)]
        action: ResidentCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum BuildingCommand {
    /// Register a building
    Register { name: String },
    /// Show one building
    Get { id: String },
    /// List all buildings
    List,
    /// Remove a building
    Deregister { id: String },
}

#[derive(Subcommand, Debug)]
pub enum UnitCommand {
    /// Register a unit
    Register {
        name: String,
        /// Owning building
        #[arg(long)]
        building: Option<String>,
    },
    /// Show one unit
    Get { id: String },
    /// Find a unit by name
    Find { name: String },
    /// List the units of a building
    List {
        #[arg(long)]
        building: String,
    },
    /// Remove a unit
    Deregister { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ResidentCommand {
    /// Register a resident
    Register {
        #[arg(long, default_value = "")]
        first: String,
        #[arg(long, default_value = "")]
        middle: String,
        #[arg(long, default_value = "")]
        last: String,
        /// Initial unit
        #[arg(long)]
        unit: Option<String>,
    },
    /// Show one resident
    Get { id: String },
    /// List the residents of a unit
    List {
        #[arg(long)]
        unit: String,
    },
    /// Remove a resident
    Deregister { id: String },
    /// Move a resident into a unit
    Move { resident_id: String, unit_id: String },
}

impl Cli {
    /// Log filter chosen by `-v` count.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info,sqlx=warn",
            1 => "debug",
            _ => "trace",
        }
    }

    /// SQLite URL: the explicit one, else a file in the expanded data directory.
    pub fn database_url(&self) -> anyhow::Result<String> {
        if let Some(url) = &self.database_url {
            return Ok(url.clone());
        }

        let data_dir = PathBuf::from(shellexpand::tilde(&self.data_dir).as_ref());
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
        tracing::debug!("Data directory: {}", data_dir.display());

        Ok(format!("sqlite://{}", data_dir.join(DATABASE_FILE_NAME).display()))
    }

    /// Registrar configuration from flags and environment.
    pub fn registry_config(&self) -> anyhow::Result<RegistryConfig> {
        let backend = match self.backend {
            BackendKind::Sql => BackendConfig::Sql {
                url: self.database_url()?,
            },
            BackendKind::Memory => BackendConfig::Memory,
            BackendKind::Dynamodb => BackendConfig::Dynamo {
                region: self.region.clone(),
                endpoint: self.endpoint.clone(),
            },
        };

        let config = RegistryConfig {
            backend,
            tables: TableNames {
                buildings: self.tables.buildings_table.clone(),
                units: self.tables.units_table.clone(),
                residents: self.tables.residents_table.clone(),
            },
            request_timeout_ms: self.timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Result of one command.
#[derive(Debug, PartialEq)]
pub enum Output {
    /// Print as JSON
    Json(Value),
    /// The requested entity does not exist
    Missing { entity: EntityKind, id: String },
}

fn json<T: Serialize>(value: &T) -> anyhow::Result<Output> {
    Ok(Output::Json(serde_json::to_value(value)?))
}

fn found<T: Serialize>(entity: EntityKind, id: &str, value: Option<T>) -> anyhow::Result<Output> {
    match value {
        Some(value) => json(&value),
        None => Ok(Output::Missing {
            entity,
            id: id.to_string(),
        }),
    }
}

/// Run one command against `registrar`.
pub async fn execute(
    registrar: &dyn Registrar,
    ctx: &Context,
    command: Command,
) -> anyhow::Result<Output> {
    match command {
        Command::Building { action } => execute_building(registrar, ctx, action).await,
        Command::Unit { action } => execute_unit(registrar, ctx, action).await,
        Command::Resident { action } => execute_resident(registrar, ctx, action).await,
    }
}

async fn execute_building(
    registrar: &dyn Registrar,
    ctx: &Context,
    action: BuildingCommand,
) -> anyhow::Result<Output> {
    match action {
        BuildingCommand::Register { name } => {
            let building = registrar.register_building(ctx, &Building::named(name)).await?;
            json(&building)
        }
        BuildingCommand::Get { id } => {
            let building = registrar.get_building_by_id(ctx, &BuildingId::new(&id)).await?;
            found(EntityKind::Building, &id, building)
        }
        BuildingCommand::List => json(&registrar.list_buildings(ctx).await?),
        BuildingCommand::Deregister { id } => {
            registrar.deregister_building(ctx, &BuildingId::new(&id)).await?;
            Ok(Output::Json(json!({ "deregistered": id })))
        }
    }
}

async fn execute_unit(
    registrar: &dyn Registrar,
    ctx: &Context,
    action: UnitCommand,
) -> anyhow::Result<Output> {
    match action {
        UnitCommand::Register { name, building } => {
            let unit = Unit {
                building_id: building.map(BuildingId::new),
                ..Unit::named(name)
            };
            json(&registrar.register_unit(ctx, &unit).await?)
        }
        UnitCommand::Get { id } => {
            let unit = registrar.get_unit_by_id(ctx, &UnitId::new(&id)).await?;
            found(EntityKind::Unit, &id, unit)
        }
        UnitCommand::Find { name } => {
            let unit = registrar.get_unit_by_name(ctx, &name).await?;
            found(EntityKind::Unit, &name, unit)
        }
        UnitCommand::List { building } => {
            json(&registrar.list_building_units(ctx, &BuildingId::new(building)).await?)
        }
        UnitCommand::Deregister { id } => {
            registrar.deregister_unit(ctx, &UnitId::new(&id)).await?;
            Ok(Output::Json(json!({ "deregistered": id })))
        }
    }
}

async fn execute_resident(
    registrar: &dyn Registrar,
    ctx: &Context,
    action: ResidentCommand,
) -> anyhow::Result<Output> {
    match action {
        ResidentCommand::Register {
            first,
            middle,
            last,
            unit,
        } => {
            let resident = Resident {
                unit_id: unit.map(UnitId::new),
                ..Resident::new(first, middle, last)
            };
            json(&registrar.register_resident(ctx, &resident).await?)
        }
        ResidentCommand::Get { id } => {
            let resident = registrar.get_resident_by_id(ctx, &ResidentId::new(&id)).await?;
            found(EntityKind::Resident, &id, resident)
        }
        ResidentCommand::List { unit } => {
            json(&registrar.list_unit_residents(ctx, &UnitId::new(unit)).await?)
        }
        ResidentCommand::Deregister { id } => {
            registrar.deregister_resident(ctx, &ResidentId::new(&id)).await?;
            Ok(Output::Json(json!({ "deregistered": id })))
        }
        ResidentCommand::Move {
            resident_id,
            unit_id,
        } => {
            registrar
                .move_resident(ctx, &ResidentId::new(&resident_id), &UnitId::new(&unit_id))
                .await?;
            Ok(Output::Json(
                json!({ "resident_id": resident_id, "unit_id": unit_id }),
            ))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

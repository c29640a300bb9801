//! Relational backend against the shared contract.

#[macro_use]
mod common;

use std::sync::Arc;

use liszt_core::{
    Building, Context, ErrorKind, Registrar, Resident, SqlRegistrar, Unit, UnitId,
};

async fn sql_registrar() -> Option<Arc<dyn Registrar>> {
    let registrar = SqlRegistrar::in_memory().await.unwrap();
    Some(Arc::new(registrar))
}

registrar_contract!(sql_registrar);

/// The pooled path used by `open_registrar` and the CLI.
mod pooled_file {
    use super::*;

    async fn file_registrar() -> Option<Arc<dyn Registrar>> {
        let dir = tempfile::Builder::new()
            .prefix("liszt-contract")
            .tempdir()
            .unwrap()
            .keep();
        let url = format!("sqlite://{}", dir.join("registry.db").display());
        Some(Arc::new(SqlRegistrar::connect(&url).await.unwrap()))
    }

    registrar_contract!(file_registrar);
}

// =============================================================================
// Relational specifics
// =============================================================================

#[tokio::test]
async fn test_stored_row_matches_returned_resident() {
    let registrar = SqlRegistrar::in_memory().await.unwrap();
    let resident = registrar
        .register_resident(&common::ctx(), &Resident::new("Josiah", "Edward", "Bartlet"))
        .await
        .unwrap();

    let row: (String, String, String, String, Option<String>) = sqlx::query_as(
        "SELECT id, firstname, middlename, lastname, unit_id FROM residents WHERE id = ?1",
    )
    .bind(resident.id.as_str())
    .fetch_one(registrar.pool())
    .await
    .unwrap();

    assert_eq!(
        row,
        (
            resident.id.to_string(),
            "Josiah".to_string(),
            "Edward".to_string(),
            "Bartlet".to_string(),
            None
        )
    );
}

#[tokio::test]
async fn test_raw_unique_violation_surfaces_as_conflict() {
    let registrar = SqlRegistrar::in_memory().await.unwrap();
    let ctx = common::ctx();

    // A row written behind the registrar's back still blocks the name
    sqlx::query("INSERT INTO units (id, name, building_id) VALUES ('legacy', 'Cabinet Room', NULL)")
        .execute(registrar.pool())
        .await
        .unwrap();

    let err = registrar
        .register_unit(&ctx, &Unit::named("Cabinet Room"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("Cabinet Room"));
    assert!(std::error::Error::source(&err).is_some());
}

#[tokio::test]
async fn test_file_database_is_shared_between_registrars() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("registry.db").display());
    let ctx = Context::background();

    let writer = SqlRegistrar::connect(&url).await.unwrap();
    let reader = SqlRegistrar::connect(&url).await.unwrap();

    let building = writer
        .register_building(&ctx, &Building::named("Old Executive Office Building"))
        .await
        .unwrap();
    assert_eq!(
        reader.get_building_by_id(&ctx, &building.id).await.unwrap(),
        Some(building)
    );
}

#[tokio::test]
async fn test_move_to_missing_unit_leaves_resident_unassigned() {
    let registrar = SqlRegistrar::in_memory().await.unwrap();
    let ctx = common::ctx();
    let resident = registrar
        .register_resident(&ctx, &Resident::new("Will", "", "Bailey"))
        .await
        .unwrap();

    let err = registrar
        .move_resident(&ctx, &resident.id, &UnitId::new("gone"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let (unit_id,): (Option<String>,) =
        sqlx::query_as("SELECT unit_id FROM residents WHERE id = ?1")
            .bind(resident.id.as_str())
            .fetch_one(registrar.pool())
            .await
            .unwrap();
    assert_eq!(unit_id, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_spawned_writers_on_file_database_all_succeed() {
    const WRITERS_COUNT: usize = 40;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("registry.db").display());
    let registrar = Arc::new(SqlRegistrar::connect(&url).await.unwrap());
    let ctx = common::ctx();
    let unit = registrar
        .register_unit(&ctx, &Unit::named("Navy Mess"))
        .await
        .unwrap();

    let mut residents = Vec::with_capacity(WRITERS_COUNT);
    for i in 0..WRITERS_COUNT {
        let resident = Resident::new("Steward", "", format!("No. {i}"));
        residents.push(registrar.register_resident(&ctx, &resident).await.unwrap());
    }

    let moves: Vec<_> = residents
        .into_iter()
        .map(|resident| {
            let registrar = Arc::clone(&registrar);
            let ctx = ctx.clone();
            let unit_id = unit.id.clone();
            tokio::spawn(async move { registrar.move_resident(&ctx, &resident.id, &unit_id).await })
        })
        .collect();
    let registrations: Vec<_> = (0..WRITERS_COUNT)
        .map(|i| {
            let registrar = Arc::clone(&registrar);
            let ctx = ctx.clone();
            let mut resident = Resident::new("Valet", "", format!("No. {i}"));
            resident.unit_id = Some(unit.id.clone());
            tokio::spawn(async move { registrar.register_resident(&ctx, &resident).await })
        })
        .collect();

    for handle in moves {
        handle.await.unwrap().unwrap();
    }
    for handle in registrations {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(
        registrar.list_unit_residents(&ctx, &unit.id).await.unwrap().len(),
        2 * WRITERS_COUNT
    );
}

//! Shared registrar contract.
//!
//! Every backend must pass the same checks. A test binary declares a
//! factory returning `Option<Arc<dyn Registrar>>` (`None` skips) and
//! expands `registrar_contract!(factory)`.

#![allow(dead_code)]

use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;
use liszt_core::{
    Building, BuildingId, Context, EntityKind, ErrorKind, Registrar, RegistryError,
    RegistryResult, Resident, ResidentId, Unit, UnitId,
};

/// Expand one `#[tokio::test]` per contract check for `$factory`.
macro_rules! registrar_contract {
    ($factory:ident) => {
        registrar_contract!(@tests $factory:
            building_round_trip,
            unknown_ids_read_as_absent,
            deregister_is_idempotent,
            unit_round_trip,
            resident_round_trip,
            move_four_residents,
            move_requires_resident_and_unit,
            register_rejects_bad_input,
            deregistration_does_not_cascade,
            lists_follow_creation_order,
            concurrent_registrations_get_distinct_ids,
            concurrent_moves_all_land,
            concurrent_registrations_into_unit_all_land,
            cancelled_context_touches_nothing,
            expired_deadline_fails_fast,
        );
    };
    (@tests $factory:ident: $($name:ident),+ $(,)?) => {
        $(
            #[tokio::test]
            async fn $name() {
                let Some(registrar) = $factory().await else {
                    eprintln!("Skipping test: backend not configured");
                    return;
                };
                common::$name(registrar.as_ref()).await;
            }
        )+
    };
}

// =============================================================================
// Helpers
// =============================================================================

pub fn ctx() -> Context {
    Context::with_timeout(Duration::from_secs(10))
}

pub fn assert_kind<T: std::fmt::Debug>(result: RegistryResult<T>, expected: ErrorKind) {
    match result {
        Ok(value) => panic!("expected {expected}, got Ok({value:?})"),
        Err(err) => assert_eq!(err.kind(), expected, "unexpected error: {err}"),
    }
}

pub async fn register_unit(registrar: &dyn Registrar, name: &str) -> Unit {
    registrar
        .register_unit(&ctx(), &Unit::named(name))
        .await
        .unwrap()
}

pub async fn register_resident(registrar: &dyn Registrar, first: &str, last: &str) -> Resident {
    registrar
        .register_resident(&ctx(), &Resident::new(first, "", last))
        .await
        .unwrap()
}

// =============================================================================
// Contract
// =============================================================================

pub async fn building_round_trip(registrar: &dyn Registrar) {
    let ctx = ctx();
    let input = Building {
        id: BuildingId::new("something"),
        name: "The White House".to_string(),
    };

    let registered = registrar.register_building(&ctx, &input).await.unwrap();
    assert_ne!(registered.id, input.id);
    assert!(!registered.id.is_empty());
    assert_eq!(registered.name, input.name);

    let fetched = registrar.get_building_by_id(&ctx, &registered.id).await.unwrap();
    assert_eq!(fetched, Some(registered));
}

pub async fn unknown_ids_read_as_absent(registrar: &dyn Registrar) {
    let ctx = ctx();

    let building = registrar
        .get_building_by_id(&ctx, &BuildingId::new("nonexistent"))
        .await
        .unwrap();
    assert_eq!(building, None);

    let unit = registrar.get_unit_by_id(&ctx, &UnitId::new("nonexistent")).await.unwrap();
    assert_eq!(unit, None);

    let unit = registrar.get_unit_by_name(&ctx, "no such unit").await.unwrap();
    assert_eq!(unit, None);

    let resident = registrar
        .get_resident_by_id(&ctx, &ResidentId::new("nonexistent"))
        .await
        .unwrap();
    assert_eq!(resident, None);

    assert!(registrar
        .list_unit_residents(&ctx, &UnitId::new("nonexistent"))
        .await
        .unwrap()
        .is_empty());
    assert!(registrar
        .list_building_units(&ctx, &BuildingId::new("nonexistent"))
        .await
        .unwrap()
        .is_empty());
}

pub async fn deregister_is_idempotent(registrar: &dyn Registrar) {
    let ctx = ctx();

    registrar
        .deregister_building(&ctx, &BuildingId::new("nonexistent"))
        .await
        .unwrap();
    registrar.deregister_unit(&ctx, &UnitId::new("nonexistent")).await.unwrap();
    registrar
        .deregister_resident(&ctx, &ResidentId::new("nonexistent"))
        .await
        .unwrap();

    let building = registrar
        .register_building(&ctx, &Building::named("Residence"))
        .await
        .unwrap();
    registrar.deregister_building(&ctx, &building.id).await.unwrap();
    registrar.deregister_building(&ctx, &building.id).await.unwrap();
    assert_eq!(registrar.get_building_by_id(&ctx, &building.id).await.unwrap(), None);

    let resident = register_resident(registrar, "Leo", "McGarry").await;
    registrar.deregister_resident(&ctx, &resident.id).await.unwrap();
    assert_eq!(registrar.get_resident_by_id(&ctx, &resident.id).await.unwrap(), None);
}

pub async fn unit_round_trip(registrar: &dyn Registrar) {
    let ctx = ctx();
    let building = registrar
        .register_building(&ctx, &Building::named("West Wing"))
        .await
        .unwrap();

    let unit = registrar
        .register_unit(&ctx, &Unit::in_building("Oval Office", building.id.clone()))
        .await
        .unwrap();
    assert_eq!(unit.building_id.as_ref(), Some(&building.id));

    let free_standing = register_unit(registrar, "Rose Garden").await;
    assert_eq!(free_standing.building_id, None);

    assert_eq!(
        registrar.get_unit_by_id(&ctx, &unit.id).await.unwrap(),
        Some(unit.clone())
    );
    assert_eq!(
        registrar.get_unit_by_name(&ctx, "Oval Office").await.unwrap(),
        Some(unit.clone())
    );
    assert_eq!(
        registrar.list_building_units(&ctx, &building.id).await.unwrap(),
        vec![unit]
    );
}

pub async fn resident_round_trip(registrar: &dyn Registrar) {
    let ctx = ctx();
    let input = Resident::new("Josiah", "Edward", "Bartlet");

    let registered = registrar.register_resident(&ctx, &input).await.unwrap();
    assert_ne!(registered.id, input.id);
    assert_eq!(registered.firstname, "Josiah");
    assert_eq!(registered.middlename, "Edward");
    assert_eq!(registered.lastname, "Bartlet");
    assert_eq!(registered.unit_id, None);

    let fetched = registrar.get_resident_by_id(&ctx, &registered.id).await.unwrap();
    assert_eq!(fetched, Some(registered));

    // Registered straight into a unit
    let unit = register_unit(registrar, "Situation Room").await;
    let mut assigned = Resident::new("Nancy", "", "McNally");
    assigned.unit_id = Some(unit.id.clone());
    let assigned = registrar.register_resident(&ctx, &assigned).await.unwrap();
    assert_eq!(
        registrar.list_unit_residents(&ctx, &unit.id).await.unwrap(),
        vec![assigned]
    );
}

pub async fn move_four_residents(registrar: &dyn Registrar) {
    let ctx = ctx();
    let unit = register_unit(registrar, "Residence 1").await;
    let elsewhere = register_unit(registrar, "Residence 2").await;

    let mut moved = HashSet::new();
    for (first, last) in [
        ("Josiah", "Bartlet"),
        ("Abbey", "Bartlet"),
        ("Zoey", "Bartlet"),
        ("Ellie", "Bartlet"),
    ] {
        let resident = register_resident(registrar, first, last).await;
        registrar.move_resident(&ctx, &resident.id, &unit.id).await.unwrap();
        moved.insert(resident.id);
    }

    let other = register_resident(registrar, "Charlie", "Young").await;
    registrar.move_resident(&ctx, &other.id, &elsewhere.id).await.unwrap();
    register_resident(registrar, "Toby", "Ziegler").await;

    let listed = registrar.list_unit_residents(&ctx, &unit.id).await.unwrap();
    assert_eq!(listed.len(), 4);
    let listed_ids: HashSet<ResidentId> = listed.iter().map(|r| r.id.clone()).collect();
    assert_eq!(listed_ids, moved);
    assert!(listed.iter().all(|r| r.unit_id.as_ref() == Some(&unit.id)));

    // Moving again replaces the assignment
    registrar.move_resident(&ctx, &other.id, &unit.id).await.unwrap();
    assert!(registrar
        .list_unit_residents(&ctx, &elsewhere.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(registrar.list_unit_residents(&ctx, &unit.id).await.unwrap().len(), 5);
}

pub async fn move_requires_resident_and_unit(registrar: &dyn Registrar) {
    let ctx = ctx();
    let unit = register_unit(registrar, "Press Room").await;
    let resident = register_resident(registrar, "C.J.", "Cregg").await;

    let err = registrar
        .move_resident(&ctx, &ResidentId::new("nonexistent"), &unit.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::NotFound {
            entity: EntityKind::Resident,
            ..
        }
    ));

    let err = registrar
        .move_resident(&ctx, &resident.id, &UnitId::new("nonexistent"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::NotFound {
            entity: EntityKind::Unit,
            ..
        }
    ));

    let unchanged = registrar.get_resident_by_id(&ctx, &resident.id).await.unwrap();
    assert_eq!(unchanged.and_then(|r| r.unit_id), None);
}

pub async fn register_rejects_bad_input(registrar: &dyn Registrar) {
    let ctx = ctx();

    assert_kind(
        registrar.register_building(&ctx, &Building::named("")).await,
        ErrorKind::InvalidArgument,
    );
    assert_kind(
        registrar.register_unit(&ctx, &Unit::named("  ")).await,
        ErrorKind::InvalidArgument,
    );

    register_unit(registrar, "Mural Room").await;
    assert_kind(
        registrar.register_unit(&ctx, &Unit::named("Mural Room")).await,
        ErrorKind::Conflict,
    );

    assert_kind(
        registrar
            .register_unit(&ctx, &Unit::in_building("Attic", BuildingId::new("nonexistent")))
            .await,
        ErrorKind::InvalidArgument,
    );

    let mut resident = Resident::new("Sam", "", "Seaborn");
    resident.unit_id = Some(UnitId::new("nonexistent"));
    assert_kind(
        registrar.register_resident(&ctx, &resident).await,
        ErrorKind::InvalidArgument,
    );

    // Nothing was stored by the rejected calls
    assert!(registrar.list_buildings(&ctx).await.unwrap().is_empty());
    assert_eq!(registrar.get_unit_by_name(&ctx, "Attic").await.unwrap(), None);
}

pub async fn deregistration_does_not_cascade(registrar: &dyn Registrar) {
    let ctx = ctx();
    let building = registrar
        .register_building(&ctx, &Building::named("East Wing"))
        .await
        .unwrap();
    let unit = registrar
        .register_unit(&ctx, &Unit::in_building("Theater", building.id.clone()))
        .await
        .unwrap();
    let resident = register_resident(registrar, "Donna", "Moss").await;
    registrar.move_resident(&ctx, &resident.id, &unit.id).await.unwrap();

    registrar.deregister_building(&ctx, &building.id).await.unwrap();
    let orphan = registrar.get_unit_by_id(&ctx, &unit.id).await.unwrap();
    assert_eq!(orphan.as_ref().and_then(|u| u.building_id.as_ref()), Some(&building.id));
    assert_eq!(
        registrar.list_building_units(&ctx, &building.id).await.unwrap(),
        vec![unit.clone()]
    );

    registrar.deregister_unit(&ctx, &unit.id).await.unwrap();
    let listed = registrar.list_unit_residents(&ctx, &unit.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, resident.id);
}

pub async fn lists_follow_creation_order(registrar: &dyn Registrar) {
    let ctx = ctx();
    let mut registered = Vec::new();
    for name in ["North", "South", "Annex", "Residence"] {
        registered.push(
            registrar
                .register_building(&ctx, &Building::named(name))
                .await
                .unwrap(),
        );
    }

    assert_eq!(registrar.list_buildings(&ctx).await.unwrap(), registered);
}

pub async fn concurrent_registrations_get_distinct_ids(registrar: &dyn Registrar) {
    const REGISTRATIONS_COUNT: usize = 32;
    let ctx = ctx();

    let results = join_all((0..REGISTRATIONS_COUNT).map(|i| {
        let building = Building::named(format!("Building {i}"));
        let ctx = ctx.clone();
        async move { registrar.register_building(&ctx, &building).await }
    }))
    .await;

    let ids: HashSet<BuildingId> = results
        .into_iter()
        .map(|result| result.unwrap().id)
        .collect();
    assert_eq!(ids.len(), REGISTRATIONS_COUNT);
    assert_eq!(registrar.list_buildings(&ctx).await.unwrap().len(), REGISTRATIONS_COUNT);
}

pub async fn concurrent_moves_all_land(registrar: &dyn Registrar) {
    const RESIDENTS_COUNT: usize = 24;
    let ctx = ctx();
    let unit = register_unit(registrar, "Briefing Room").await;

    let mut residents = Vec::with_capacity(RESIDENTS_COUNT);
    for i in 0..RESIDENTS_COUNT {
        residents.push(register_resident(registrar, "Staffer", &format!("No. {i}")).await);
    }

    let results = join_all(residents.iter().map(|resident| {
        let ctx = ctx.clone();
        let unit_id = unit.id.clone();
        async move { registrar.move_resident(&ctx, &resident.id, &unit_id).await }
    }))
    .await;

    for result in results {
        result.unwrap();
    }
    assert_eq!(
        registrar.list_unit_residents(&ctx, &unit.id).await.unwrap().len(),
        RESIDENTS_COUNT
    );
}

pub async fn concurrent_registrations_into_unit_all_land(registrar: &dyn Registrar) {
    const RESIDENTS_COUNT: usize = 24;
    let ctx = ctx();
    let unit = register_unit(registrar, "Cabinet Room").await;

    let results = join_all((0..RESIDENTS_COUNT).map(|i| {
        let mut resident = Resident::new("Intern", "", format!("No. {i}"));
        resident.unit_id = Some(unit.id.clone());
        let ctx = ctx.clone();
        async move { registrar.register_resident(&ctx, &resident).await }
    }))
    .await;

    let ids: HashSet<ResidentId> = results
        .into_iter()
        .map(|result| result.unwrap().id)
        .collect();
    assert_eq!(ids.len(), RESIDENTS_COUNT);
    assert_eq!(
        registrar.list_unit_residents(&ctx, &unit.id).await.unwrap().len(),
        RESIDENTS_COUNT
    );
}

pub async fn cancelled_context_touches_nothing(registrar: &dyn Registrar) {
    let ctx = Context::background();
    ctx.cancel();

    let err = registrar
        .register_building(&ctx, &Building::named("Camp David"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Cancelled));
    assert_eq!(err.kind(), ErrorKind::Unavailable);

    let err = registrar.list_buildings(&ctx).await.unwrap_err();
    assert!(err.is_cancellation());

    let err = registrar
        .move_resident(&ctx, &ResidentId::new("r"), &UnitId::new("u"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Cancelled));

    assert!(registrar.list_buildings(&Context::background()).await.unwrap().is_empty());
}

pub async fn expired_deadline_fails_fast(registrar: &dyn Registrar) {
    let ctx = Context::with_timeout(Duration::ZERO);

    let err = registrar
        .get_unit_by_name(&ctx, "Oval Office")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::DeadlineExceeded));

    let err = registrar
        .register_resident(&ctx, &Resident::new("Josh", "", "Lyman"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::DeadlineExceeded));
}

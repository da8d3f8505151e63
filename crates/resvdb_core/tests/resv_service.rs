use resvdb_core::db::open_db_in_memory;
use resvdb_core::{
    DbAttr, DeleteOutcome, FindOutcome, KvResvRepository, LoadOutcome, ManualClock, ResvInfo,
    ResvService, SqliteKvStore, SyncCheckpoint,
};
use std::ops::ControlFlow;

fn collect_sync(
    service: &ResvService<KvResvRepository<'_>>,
    checkpoint: &mut SyncCheckpoint,
) -> Vec<String> {
    let mut ids = Vec::new();
    let delivered = service
        .sync_changed(checkpoint, |resv| {
            ids.push(resv.resvid.clone());
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(delivered as usize, ids.len());
    ids.sort();
    ids
}

#[test]
fn sync_changed_delivers_only_new_saves_and_advances_checkpoint() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::new(&conn, "pbs");
    let clock = ManualClock::new(100);
    let service = ResvService::new(KvResvRepository::with_clock(&store, &clock));

    service.create(&ResvInfo::new("R1.server", "workq")).unwrap();
    clock.set(200);
    service.create(&ResvInfo::new("R2.server", "workq")).unwrap();

    let mut checkpoint = SyncCheckpoint::start();
    assert_eq!(
        collect_sync(&service, &mut checkpoint),
        vec!["R1.server", "R2.server"]
    );
    assert_eq!(checkpoint.since(), Some(200));

    clock.set(300);
    let mut changed = service.get("R1.server").unwrap();
    changed.state = 4;
    service.update_quick(&changed).unwrap();

    // R2 was saved exactly at the checkpoint and is delivered again.
    assert_eq!(
        collect_sync(&service, &mut checkpoint),
        vec!["R1.server", "R2.server"]
    );
    assert_eq!(checkpoint.since(), Some(300));

    clock.set(400);
    assert_eq!(collect_sync(&service, &mut checkpoint), vec!["R1.server"]);
    assert_eq!(checkpoint.since(), Some(300));
}

#[test]
fn service_lifecycle_round_trip() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::new(&conn, "pbs");
    let clock = ManualClock::new(1_000);
    let service = ResvService::new(KvResvRepository::with_clock(&store, &clock));

    let mut resv = ResvInfo::new("R5.server", "workq");
    resv.duration = 3_600;
    resv.attrs.push(DbAttr::new("reserve_name", "maint"));
    service.create(&resv).unwrap();

    let mut cached = service.get("R5.server").unwrap();
    assert_eq!(cached.duration, 3_600);
    assert_eq!(service.refresh(&mut cached).unwrap(), LoadOutcome::Unchanged);

    clock.advance(10);
    resv.attrs = [DbAttr::with_resource("Resource_List", "walltime", "01:00:00")]
        .into_iter()
        .collect();
    service.update_full(&resv).unwrap();
    assert_eq!(service.refresh(&mut cached).unwrap(), LoadOutcome::Loaded);
    assert_eq!(cached.attrs.len(), 2);

    service.clear_attributes("R5.server").unwrap();
    assert!(service.get("R5.server").unwrap().attrs.is_empty());

    let mut seen = 0;
    let outcome = service
        .for_each(|_resv| {
            seen += 1;
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(outcome, FindOutcome::Rows(1));
    assert_eq!(seen, 1);

    assert_eq!(service.remove("R5.server").unwrap(), DeleteOutcome::Deleted);
    assert_eq!(service.remove("R5.server").unwrap(), DeleteOutcome::NotFound);
    assert_eq!(
        service.for_each(|_resv| ControlFlow::Continue(())).unwrap(),
        FindOutcome::NoRows
    );
}

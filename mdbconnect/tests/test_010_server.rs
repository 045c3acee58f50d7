mod test_utils;

use bson::doc;
use log::info;
use mdbconnect::{
    ConnectionPoolSettings, MdbError, MdbResult, Namespace, QueryOptions, ServerMonitorSettings,
    ServerSettings, ServerState, WriteConcern,
};
use std::time::{Duration, Instant};
use test_utils::FakeServer;

fn documents(count: i32) -> Vec<bson::Document> {
    (0..count).map(|i| doc! {"i": i, "name": format!("doc {i}")}).collect()
}

#[test]
fn test_000_all_tests_share_one_logger() {
    let first: *const _ = test_utils::init_logger();
    let second: *const _ = test_utils::init_logger();
    assert_eq!(first, second);
}

#[test]
fn test_010_command_on_fresh_connection() -> MdbResult<()> {
    let _log_handle = test_utils::init_logger();
    let fake = FakeServer::start();
    let server = fake.start_client(ServerSettings::default())?;

    let mut connection = server.get_connection()?;
    let result = connection.command("admin", doc! {"ping": 1})?;
    assert_eq!(result.get_f64("ok").unwrap(), 1.0);

    let description = connection.description().unwrap();
    assert_eq!(description.max_wire_version(), 6);
    assert!(description.server_version().at_least(3, 6));
    assert!(description.supports_write_commands());

    let statistics = connection.statistics().unwrap();
    info!("{statistics}");
    assert!(statistics.sent_messages() >= 3);
    connection.reset_statistics();
    assert_eq!(connection.statistics().unwrap().sent_messages(), 0);

    match connection.command("admin", doc! {"frobnicate": 1}) {
        Err(MdbError::Command { code, .. }) => assert_eq!(code, 59),
        other => panic!("unexpected result {other:?}"),
    }
    // a failed command does not harm the connection
    connection.command("admin", doc! {"ping": 1})?;
    Ok(())
}

#[test]
fn test_020_insert_is_split_into_batches() -> MdbResult<()> {
    let _log_handle = test_utils::init_logger();
    let fake = FakeServer::start_with(6, 3);
    let server = fake.start_client(ServerSettings::default())?;
    let namespace = Namespace::new("test", "people")?;

    let mut connection = server.get_connection()?;
    let result = connection.insert(&namespace, documents(7), true, WriteConcern::ACKNOWLEDGED)?;
    assert!(result.was_acknowledged());
    assert_eq!(result.count(), 7);
    assert_eq!(fake.recorded(|r| r.insert_batches.clone()), vec![3, 3, 1]);

    let reply = connection.query(&namespace, doc! {}, QueryOptions::default())?;
    let found: Vec<i32> = reply
        .documents()
        .iter()
        .map(|d| d.get_i32("i").unwrap())
        .collect();
    assert_eq!(found, (0..7).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_030_legacy_server_gets_legacy_writes() -> MdbResult<()> {
    let _log_handle = test_utils::init_logger();
    let fake = FakeServer::start_with(1, 1000);
    let server = fake.start_client(ServerSettings::default())?;
    let namespace = Namespace::new("test", "legacy")?;

    let mut connection = server.get_connection()?;
    assert!(!connection.description().unwrap().supports_write_commands());
    let result = connection.insert(&namespace, documents(2), true, WriteConcern::ACKNOWLEDGED)?;
    assert_eq!(result.count(), 2);
    assert_eq!(fake.recorded(|r| r.documents.len()), 2);
    assert!(fake.recorded(|r| r.commands.iter().any(|c| c == "getlasterror")));
    assert!(fake.recorded(|r| r.insert_batches.is_empty()));

    // unacknowledged writes are not confirmed, and not sent as commands either
    let result = connection.insert(&namespace, documents(1), true, WriteConcern::UNACKNOWLEDGED)?;
    assert!(!result.was_acknowledged());
    // the server answers in order, so a ping is enough to know the insert arrived
    connection.command("admin", doc! {"ping": 1})?;
    assert_eq!(fake.recorded(|r| r.documents.len()), 3);
    Ok(())
}

#[test]
fn test_040_pool_reuses_connections() -> MdbResult<()> {
    let _log_handle = test_utils::init_logger();
    let fake = FakeServer::start();
    let server = fake.start_client(
        ServerSettings::default()
            .with_pool_settings(ConnectionPoolSettings::default().with_max_size(2)),
    )?;

    {
        let mut connection = server.get_connection()?;
        connection.command("admin", doc! {"ping": 1})?;
    }
    {
        let mut connection = server.get_connection()?;
        connection.command("admin", doc! {"ping": 1})?;
    }
    let statistics = server.pool_statistics();
    assert_eq!(statistics.total(), 1);
    assert_eq!(statistics.available(), 1);

    let first = server.get_connection()?;
    let second = server.get_connection()?;
    assert_eq!(server.pool_statistics().total(), 2);
    assert_eq!(server.pool_statistics().in_use(), 2);
    drop(first);
    drop(second);
    assert_eq!(server.pool_statistics().available(), 2);
    Ok(())
}

#[test]
fn test_050_transport_error_invalidates_pool() -> MdbResult<()> {
    let _log_handle = test_utils::init_logger();
    let fake = FakeServer::start();
    let server = fake.start_client(ServerSettings::default())?;

    let idle = server.get_connection()?;
    let mut connection = server.get_connection()?;
    drop(idle);
    assert_eq!(server.pool_statistics().generation(), 0);

    let error = connection.command("admin", doc! {"hangUp": 1}).unwrap_err();
    info!("expected error: {}", error.display_with_inner());
    assert!(error.is_transport());
    assert_eq!(server.pool_statistics().generation(), 1);
    drop(connection);
    // the broken connection is gone, the idle one is discarded on the next checkout
    assert_eq!(server.pool_statistics().total(), 1);

    let opened_before = fake.recorded(|r| r.connections);
    let mut connection = server.get_connection()?;
    connection.command("admin", doc! {"ping": 1})?;
    assert_eq!(server.pool_statistics().total(), 1);
    assert!(fake.recorded(|r| r.connections) > opened_before);
    Ok(())
}

#[test]
fn test_060_monitor_describes_server() -> MdbResult<()> {
    let _log_handle = test_utils::init_logger();
    let fake = FakeServer::start();
    let server = fake.start_client(
        ServerSettings::default().with_monitor_settings(
            ServerMonitorSettings::default()
                .with_heartbeat_frequency(Duration::from_millis(100))
                .with_min_heartbeat_frequency(Duration::from_millis(20)),
        ),
    )?;

    let start = Instant::now();
    while server.description().state() != ServerState::Connected {
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "monitor did not connect"
        );
        std::thread::sleep(Duration::from_millis(10));
    }
    let description = server.description();
    assert!(description.is_ok());
    assert_eq!(description.max_batch_count(), 1000);
    assert!(description.round_trip_time().is_some());

    server.close();
    assert!(matches!(server.get_connection(), Err(MdbError::PoolClosed)));
    Ok(())
}

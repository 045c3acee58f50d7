mod test_utils;

use bson::doc;
use log::info;
use mdbconnect_async::{
    ConnectionPoolSettings, MdbError, MdbResult, Namespace, QueryOptions, ServerMonitorSettings,
    ServerSettings, ServerState, WriteConcern,
};
use std::{sync::Arc, time::Duration};
use test_utils::FakeServer;

#[test]
fn test_000_all_tests_share_one_logger() {
    let first: *const _ = test_utils::init_logger();
    let second: *const _ = test_utils::init_logger();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_010_command_and_insert() -> MdbResult<()> {
    let _log_handle = test_utils::init_logger();
    let fake = FakeServer::start_with(6, 4);
    let server = fake.start_client(ServerSettings::default())?;
    let namespace = Namespace::new("test", "people")?;

    let mut connection = server.get_connection().await?;
    connection.command("admin", doc! {"ping": 1}).await?;
    assert_eq!(connection.description().unwrap().max_batch_count(), 4);

    let documents = (0..10).map(|i| doc! {"i": i}).collect();
    let result = connection
        .insert(&namespace, documents, false, WriteConcern::ACKNOWLEDGED)
        .await?;
    assert_eq!(result.count(), 10);
    assert_eq!(fake.recorded(|r| r.insert_batches.clone()), vec![4, 4, 2]);

    let reply = connection
        .query(&namespace, doc! {}, QueryOptions::default())
        .await?;
    assert_eq!(reply.documents().len(), 10);
    assert_eq!(reply.cursor_id(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_020_concurrent_tasks_share_small_pool() -> MdbResult<()> {
    let _log_handle = test_utils::init_logger();
    let fake = FakeServer::start();
    let server = Arc::new(fake.start_client(
        ServerSettings::default()
            .with_pool_settings(ConnectionPoolSettings::default().with_max_size(2)),
    )?);

    let mut handles = Vec::new();
    for i in 0..10 {
        let server = Arc::clone(&server);
        handles.push(tokio::spawn(async move {
            let mut connection = server.get_connection().await?;
            connection.command("admin", doc! {"ping": i}).await?;
            tokio::time::sleep(Duration::from_millis(5)).await;
            MdbResult::Ok(())
        }));
    }
    for handle in handles {
        handle.await.unwrap()?;
    }
    let statistics = server.pool_statistics();
    info!("pool after concurrent use: {statistics:?}");
    assert!(statistics.total() <= 2);
    assert_eq!(statistics.in_use(), 0);
    assert_eq!(statistics.waiters(), 0);
    Ok(())
}

#[tokio::test]
async fn test_030_timeout_when_pool_is_exhausted() -> MdbResult<()> {
    let _log_handle = test_utils::init_logger();
    let fake = FakeServer::start();
    let server = fake.start_client(
        ServerSettings::default().with_pool_settings(
            ConnectionPoolSettings::default()
                .with_max_size(1)
                .with_max_wait_time(Some(Duration::from_millis(50))),
        ),
    )?;

    let _busy = server.get_connection().await?;
    match server.get_connection().await {
        Err(MdbError::Timeout { waited }) => assert!(waited >= Duration::from_millis(50)),
        other => panic!("unexpected result {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_040_monitor_task_connects() -> MdbResult<()> {
    let _log_handle = test_utils::init_logger();
    let fake = FakeServer::start();
    let server = fake.start_client(
        ServerSettings::default().with_monitor_settings(
            ServerMonitorSettings::default()
                .with_heartbeat_frequency(Duration::from_millis(100))
                .with_min_heartbeat_frequency(Duration::from_millis(20)),
        ),
    )?;

    tokio::time::timeout(Duration::from_secs(5), async {
        while server.description().state() != ServerState::Connected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("monitor did not connect");
    assert!(server.description().round_trip_time().is_some());

    server.close();
    assert!(matches!(
        server.get_connection().await,
        Err(MdbError::PoolClosed)
    ));
    Ok(())
}

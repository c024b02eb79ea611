//! End-to-end scenarios against the in-memory table store.
//!
//! 1. Seed a handful of known records and check each fixed query
//! 2. Populate with generated data and delete it again, repeatedly
//! 3. Drive the whole thing through the menu

use carlot::{delete_all, run_menu, stream_query, Session, VehicleQuery};
use std::io::Cursor;
use table_store::{MemoryTableStore, RetryPolicy, TableStore};
use vehicle_generator::{Populator, VehicleGenerator};
use vehicle_model::{Region, VehicleRecord};

const SEED: u64 = 42;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("carlot=debug,table_store=debug,vehicle_generator=info")
        .with_test_writer()
        .try_init()
        .ok();
}

async fn empty_table(page_size: usize) -> MemoryTableStore {
    let store = MemoryTableStore::new("Cars").with_page_size(page_size);
    store.create_table_if_not_exists().await.unwrap();
    store
}

fn vehicle(region: Region, id: &str, seats: u32, body: &str, engine: &str) -> VehicleRecord {
    VehicleRecord {
        region,
        sequence_id: id.to_string(),
        city: "Accra".to_string(),
        brand: "Toyota".to_string(),
        model: "Corolla".to_string(),
        production_year: 2012,
        body_type: body.to_string(),
        seat_count: seats,
        engine_capacity_liters: 1.8,
        engine_type: engine.to_string(),
        mileage_km: 120_500,
    }
}

async fn query_ids(store: &MemoryTableStore, query: VehicleQuery) -> Vec<String> {
    let mut ids = Vec::new();
    stream_query(store, query, RetryPolicy::none(), |record| {
        ids.push(record.sequence_id.clone());
        Ok(())
    })
    .await
    .unwrap();
    ids
}

#[tokio::test]
async fn test_three_record_scenario() {
    init_tracing();
    let store = empty_table(1000).await;

    let records = [
        vehicle(Region::Africa, "0", 5, "Hatchback", "Gasoline"),
        vehicle(Region::Asia, "1", 4, "SUV", "Electric"),
        vehicle(Region::Europe, "2", 5, "Sedan", "Diesel"),
    ];
    for record in &records {
        store.upsert(&record.to_entity()).await.unwrap();
    }

    assert_eq!(
        query_ids(&store, VehicleQuery::FiveSeatHatchbacksInAfrica).await,
        vec!["0"]
    );
    assert_eq!(query_ids(&store, VehicleQuery::ElectricInAsia).await, vec!["1"]);
    assert_eq!(query_ids(&store, VehicleQuery::Sedans).await, vec!["2"]);

    let report = delete_all(&store, RetryPolicy::none()).await.unwrap();
    assert_eq!(report.rows_deleted, 3);
    assert_eq!(report.batches, 3);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_reseed_and_delete_repeatedly() {
    init_tracing();

    for (round, (page_size, count)) in [(1000, 500), (7, 120), (50, 1), (250, 999)]
        .into_iter()
        .enumerate()
    {
        let store = empty_table(page_size).await;

        for _ in 0..3 {
            let metrics = Populator::new(&store, VehicleGenerator::new(SEED + round as u64))
                .with_retry(RetryPolicy::none())
                .populate(count)
                .await
                .unwrap();
            assert_eq!(metrics.rows_upserted, count);
            assert_eq!(store.len() as u64, count);

            let report = delete_all(&store, RetryPolicy::none()).await.unwrap();
            assert_eq!(report.rows_deleted, count);
            assert_eq!(
                report.rows_per_partition.values().sum::<u64>(),
                count,
                "round {round}"
            );
            assert!(store.is_empty(), "round {round} left rows behind");
            assert!(store.batch_sizes().iter().all(|&n| n <= store.max_batch_size()));
        }
    }
}

#[tokio::test]
async fn test_queries_agree_with_generated_data() {
    init_tracing();
    let store = empty_table(100).await;
    let records: Vec<_> = VehicleGenerator::new(SEED).records(800).collect();
    Populator::new(&store, VehicleGenerator::new(SEED))
        .populate(800)
        .await
        .unwrap();

    let mut expected: Vec<_> = records
        .iter()
        .filter(|r| r.region == Region::Asia && r.engine_type == "Electric")
        .map(|r| r.sequence_id.clone())
        .collect();
    expected.sort();

    let mut found = query_ids(&store, VehicleQuery::ElectricInAsia).await;
    found.sort();

    assert!(!expected.is_empty());
    assert_eq!(found, expected);
}

#[tokio::test]
async fn test_menu_session() {
    init_tracing();
    let store = empty_table(1000).await;
    let session = Session::new(200, SEED).with_retry(RetryPolicy::none());

    let sedans = VehicleGenerator::new(SEED)
        .records(200)
        .filter(|r| r.body_type == "Sedan")
        .count();

    let mut out = Vec::new();
    run_menu(&store, &session, Cursor::new("C\nc\nZ3\nD\nZ3\nX\n"), &mut out)
        .await
        .unwrap();
    let output = String::from_utf8(out).unwrap();

    // Pressing C twice overwrites the same keys.
    assert_eq!(output.matches("Upserted 200 records").count(), 2);
    assert_eq!(output.matches("BodyType: Sedan").count(), sedans);
    assert!(output.contains("Deleted 200 records"));
    assert!(store.is_empty());
}

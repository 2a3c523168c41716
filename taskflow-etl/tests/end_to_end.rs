//! Runs the flow against local files with the real collaborators.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pretty_assertions::assert_eq;
use std::io::{Read, Write};
use std::path::Path;
use taskflow_etl::{CacheConfig, DatasetSpec, EtlConfig, EtlFlow, UploadConfig};

const TRIPS: &str = "\
VendorID,tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count,fare_amount,store_and_fwd_flag
1,2021-01-01 00:30:10,2021-01-01 00:36:12,1,8.0,N
1,2021-01-01 00:51:20,2021-01-01 00:52:19,,3.0,N
2,2021-01-01 00:43:30,2021-01-01 01:11:06,2,42.5,
";

fn write_source(root: &Path, dataset: &DatasetSpec) {
    let dir = root.join(&dataset.color);
    std::fs::create_dir_all(&dir).unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(TRIPS.as_bytes()).unwrap();
    std::fs::write(
        dir.join(format!("{}.csv.gz", dataset.dataset_file())),
        encoder.finish().unwrap(),
    )
    .unwrap();
}

fn read_jsonl_gz(path: &Path) -> Vec<serde_json::Value> {
    let mut text = String::new();
    GzDecoder::new(std::fs::File::open(path).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    text.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn config(root: &Path) -> EtlConfig {
    EtlConfig {
        base_url: format!("file://{}", root.join("source").display()),
        data_dir: root.join("data"),
        cache: CacheConfig::Directory {
            path: root.join("cache"),
        },
        upload: UploadConfig::Directory {
            root: root.join("bucket"),
        },
        ..EtlConfig::default()
    }
}

#[tokio::test]
async fn test_month_is_uploaded_and_refetch_hits_cache() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = DatasetSpec::new("yellow", 2021, 1);
    write_source(&dir.path().join("source"), &dataset);
    let flow = EtlFlow::from_config(&config(dir.path())).unwrap();

    let receipt = flow.run(&dataset).await.unwrap();

    assert_eq!(receipt.object_path, "yellow/yellow_tripdata_2021-01.jsonl.gz");
    let local = dir.path().join("data/yellow/yellow_tripdata_2021-01.jsonl.gz");
    let uploaded = dir.path().join("bucket/yellow/yellow_tripdata_2021-01.jsonl.gz");
    assert_eq!(receipt.bytes, std::fs::metadata(&uploaded).unwrap().len());
    assert_eq!(std::fs::read(&local).unwrap(), std::fs::read(&uploaded).unwrap());

    let rows = read_jsonl_gz(&uploaded);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["tpep_pickup_datetime"], "2021-01-01T00:30:10");
    assert_eq!(rows[0]["passenger_count"], 1);
    assert_eq!(rows[1]["passenger_count"], serde_json::Value::Null);
    assert_eq!(rows[2]["fare_amount"], 42.5);

    // Served from the cache directory, so the source is no longer needed.
    std::fs::remove_dir_all(dir.path().join("source")).unwrap();
    let again = EtlFlow::from_config(&config(dir.path()))
        .unwrap()
        .run(&dataset)
        .await
        .unwrap();
    assert_eq!(again, receipt);
}

#[tokio::test]
async fn test_parent_flow_continues_past_missing_month() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source");
    write_source(&source, &DatasetSpec::new("green", 2020, 1));
    write_source(&source, &DatasetSpec::new("green", 2020, 3));
    let flow = EtlFlow::from_config(&config(dir.path())).unwrap();

    let report = flow.run_parent("green", 2020, &[1, 2, 3]).await;

    assert_eq!(report.attempted(), 3);
    let failure = report.partial_failure().unwrap();
    assert_eq!(failure.failures.len(), 1);
    assert_eq!(failure.failures[0].index, 1);
    assert_eq!(failure.failures[0].failed_task.as_deref(), Some("fetch"));
    assert!(dir
        .path()
        .join("bucket/green/green_tripdata_2020-03.jsonl.gz")
        .exists());
}

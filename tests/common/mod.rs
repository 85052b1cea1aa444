#![allow(dead_code)]

use gridlist::config::ConfigManager;
use gridlist::persistence::FileStore;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated config directory with a file-backed preference store.
pub fn setup_test_config_dir() -> (TempDir, ConfigManager, FileStore) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    let store = FileStore::new(&config_manager);
    (temp_dir, config_manager, store)
}

/// Twelve orders with a nested-looking `customer.*` pair of columns.
pub fn orders_frame() -> DataFrame {
    let status: Vec<&str> = (1..=12)
        .map(|i| if i % 3 == 0 { "closed" } else { "open" })
        .collect();
    let tier: Vec<&str> = (1..=12)
        .map(|i| if i % 2 == 0 { "gold" } else { "basic" })
        .collect();
    df!(
        "id" => (1..=12).collect::<Vec<i64>>(),
        "name" => (1..=12).map(|i| format!("order_{:02}", i)).collect::<Vec<String>>(),
        "amount" => (1..=12).map(|i| (i * 7 % 13) as f64).collect::<Vec<f64>>(),
        "status" => status,
        "customer.city" => (1..=12).map(|i| ["Oslo", "Rome", "Lima"][i % 3]).collect::<Vec<&str>>(),
        "customer.tier" => tier
    )
    .unwrap()
}

pub fn write_csv(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let mut df = orders_frame();
    let mut file = File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(&mut df).unwrap();
    path
}

pub fn write_parquet(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let mut df = orders_frame();
    let file = File::create(&path).unwrap();
    ParquetWriter::new(file).finish(&mut df).unwrap();
    path
}

pub fn write_ndjson(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let mut df = orders_frame();
    let mut file = File::create(&path).unwrap();
    JsonWriter::new(&mut file)
        .with_json_format(JsonFormat::JsonLines)
        .finish(&mut df)
        .unwrap();
    path
}

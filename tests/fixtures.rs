#![allow(dead_code)]
use std::path::PathBuf;

use std::sync::Once;

use evpipe::SchemaDefinition;

static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}

pub fn samples_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("samples")
        .canonicalize()
        .unwrap()
}

pub fn runtime_schema_path() -> PathBuf {
    samples_dir().join("runtime_schema.json")
}

pub fn invalid_count_schema_path() -> PathBuf {
    samples_dir().join("invalid_count_schema.json")
}

pub fn runtime_schema() -> SchemaDefinition {
    let text = std::fs::read_to_string(runtime_schema_path()).unwrap();
    SchemaDefinition::from_json(&text).unwrap()
}

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Join SSE event blocks into a response body, each terminated by a blank line.
#[allow(dead_code)]
pub fn sse_body(events: &[&str]) -> Vec<u8> {
    events
        .iter()
        .map(|e| format!("{}\n\n", e))
        .collect::<String>()
        .into_bytes()
}

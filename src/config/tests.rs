use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn config_file_persistence() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config_path = temp_dir.path().join("config.toml");

    let mut original_config = Config::new(temp_dir.path());
    original_config.embedding.base_url = "http://localhost:8080".to_string();
    original_config.embedding.dimension = 384;
    original_config.ranking.keyword_weight = 0.5;
    original_config.ranking.semantic_weight = 0.5;

    let toml_content = toml::to_string_pretty(&original_config)
        .expect("config should convert to toml string successfully");
    fs::write(&config_path, toml_content).expect("should write to config_path successfully");

    let loaded_config = Config::load(temp_dir.path()).expect("should load config from disk");
    assert_eq!(original_config, loaded_config);
}

#[test]
fn invalid_toml_handling() {
    let invalid_toml = r#"
        [embedding
        model = "m2-bert"
        dimension = "wide"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
    assert!(result.is_err());
}

#[test]
fn config_dir_is_under_home() {
    if let Ok(dir) = get_config_dir() {
        assert!(dir.ends_with(".pdf-lens") || dir.ends_with("pdf-lens"));
    }
}

#[test]
fn show_config_handles_invalid_endpoint() {
    let mut config = Config::new("/tmp/pdf-lens");
    config.embedding.base_url = "not a url".to_string();
    show_config(&config);
}

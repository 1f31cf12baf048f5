use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::new("/tmp/pdf-lens");
    assert_eq!(config.embedding.base_url, "https://api.together.xyz");
    assert_eq!(
        config.embedding.model,
        "togethercomputer/m2-bert-80M-8k-retrieval"
    );
    assert_eq!(config.embedding.dimension, 768);
    assert_eq!(config.embedding.batch_size, 32);
    assert_eq!(config.embedding.api_key_env, "TOGETHER_API_KEY");
    assert_eq!(config.ranking, RankingConfig::default());
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::new("/tmp/pdf-lens");

    let mut invalid_config = config.clone();
    invalid_config.embedding.base_url = "ftp://example.com".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidUrl(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.embedding.base_url = "not a url".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.model = "  ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.dimension = 32;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidEmbeddingDimension(32))
    ));

    let mut invalid_config = config.clone();
    invalid_config.embedding.batch_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.timeout_seconds = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.api_key_env = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.ranking.semantic_weight = -0.1;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidWeight("semantic_weight", _))
    ));
}

#[test]
fn derived_paths() {
    let config = Config::new("/data/lens");
    assert_eq!(config.config_file_path(), Path::new("/data/lens/config.toml"));
    assert_eq!(config.database_path(), Path::new("/data/lens/vectors.db"));
}

#[test]
fn toml_serialization() {
    let config = Config::new("");
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let toml_str = r#"
        [ranking]
        keyword_weight = 0.7
    "#;
    let parsed: Config = toml::from_str(toml_str).expect("should parse partial toml");
    assert_eq!(parsed.embedding, EmbeddingConfig::default());
    assert_eq!(parsed.ranking.keyword_weight, 0.7);
    assert_eq!(parsed.ranking.semantic_weight, 0.4);
}

#[test]
fn load_missing_config() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config = Config::load(temp_dir.path()).expect("should load config successfully");
    assert_eq!(config, Config::new(temp_dir.path()));
}

#[test]
fn save_then_load() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let base_dir = temp_dir.path().join(".pdf-lens");

    let mut config = Config::new(&base_dir);
    config.embedding.model = "custom/model".to_string();
    config.ranking.default_limit = 8;
    config.save().expect("should save config");

    assert!(base_dir.join("config.toml").exists());
    let loaded = Config::load(&base_dir).expect("should load saved config");
    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[embedding]\nbatch_size = 5000\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn save_refuses_invalid_config() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let mut config = Config::new(temp_dir.path());
    config.ranking.default_limit = 0;

    assert!(config.save().is_err());
    assert!(!temp_dir.path().join("config.toml").exists());
}

#[test]
fn missing_api_key_is_reported() {
    let config = EmbeddingConfig {
        api_key_env: "PDF_LENS_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
        ..EmbeddingConfig::default()
    };
    assert!(matches!(
        config.api_key(),
        Err(ConfigError::MissingApiKey(_))
    ));
}

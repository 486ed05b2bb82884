use super::*;

#[test]
fn default_config_is_valid() {
    let config = RagConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.embedder.dimension, 768);
    assert_eq!(config.hybrid.top_k, 5);
}

#[test]
fn load_without_file_returns_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = RagConfig::load(dir.path()).unwrap();
    assert_eq!(config, RagConfig::default());
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();

    let mut config = RagConfig::default();
    config.embedder.port = 9911;
    config.hybrid.top_k = 8;
    config.chunking.max_lines = 30;
    config.save(dir.path()).unwrap();

    let loaded = RagConfig::load(dir.path()).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn partial_toml_fills_in_defaults() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("rag.toml"),
        "[hybrid]\ntop_k = 12\n",
    )
    .unwrap();

    let config = RagConfig::load(dir.path()).unwrap();
    assert_eq!(config.hybrid.top_k, 12);
    assert_eq!(config.embedder, EmbedderConfig::default());
}

#[test]
fn invalid_toml_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rag.toml"), "not [valid toml").unwrap();
    assert!(RagConfig::load(dir.path()).is_err());
}

#[test]
fn negative_weight_is_rejected() {
    let mut config = RagConfig::default();
    config.hybrid.bm25_weight = -0.1;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::NegativeWeight(_))
    ));
}

#[test]
fn both_zero_weights_are_rejected() {
    let mut config = RagConfig::default();
    config.hybrid.bm25_weight = 0.0;
    config.hybrid.vector_weight = 0.0;
    assert!(matches!(config.validate(), Err(ConfigError::ZeroWeights)));
}

#[test]
fn single_zero_weight_is_allowed() {
    let mut config = RagConfig::default();
    config.hybrid.bm25_weight = 0.0;
    config.hybrid.vector_weight = 1.0;
    assert!(config.validate().is_ok());
}

#[test]
fn zero_top_k_is_rejected() {
    let mut config = RagConfig::default();
    config.hybrid.top_k = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidTopK)));
}

#[test]
fn chunking_bounds_are_checked() {
    let mut config = RagConfig::default();
    config.chunking.overlap_lines = config.chunking.max_lines;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(_, _))
    ));

    let mut config = RagConfig::default();
    config.chunking.max_lines = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidChunkLines(0))
    ));
}

#[test]
fn embedder_bounds_are_checked() {
    let mut config = RagConfig::default();
    config.embedder.protocol = "ftp".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));

    let mut config = RagConfig::default();
    config.embedder.dimension = 1;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidEmbeddingDimension(1))
    ));

    let mut config = RagConfig::default();
    config.embedder.timeout_secs = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidTimeout(0))
    ));
}

#[test]
fn base_url_is_built_from_parts() {
    let config = EmbedderConfig {
        host: "embed.internal".to_string(),
        port: 9000,
        ..EmbedderConfig::default()
    };
    let url = config.base_url().unwrap();
    assert_eq!(url.as_str(), "http://embed.internal:9000/");
}

#[test]
fn negative_bm25_params_are_rejected() {
    let mut config = RagConfig::default();
    config.bm25.k1 = -1.0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBm25Param("k1", _))
    ));
}

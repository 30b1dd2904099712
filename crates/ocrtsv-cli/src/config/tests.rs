use super::*;

#[test]
fn test_empty_config_is_default() {
    let config = Config::from_toml_str("").unwrap();
    assert!(config.ner.endpoint.is_none());
    assert!(config.ned.threshold.is_none());
    assert_eq!(config.layout.scale_factor, 1.0);
    assert!(!config.http.noproxy);
}

#[test]
fn test_full_config() {
    let config = Config::from_toml_str(
        r#"
[ner]
endpoint = "http://localhost:5000/ner/1"

[ned]
endpoint = "http://localhost:5001"
threshold = 0.15
priority = 1
cache_dir = "ned-cache"

[layout]
scale_factor = 0.5
normalization_file = "normalization.tsv"

[http]
noproxy = true
"#,
    )
    .unwrap();
    assert_eq!(config.ner.endpoint.as_deref(), Some("http://localhost:5000/ner/1"));
    assert_eq!(config.ned.threshold, Some(0.15));
    assert_eq!(config.ned.priority, Some(1));
    assert_eq!(config.layout.scale_factor, 0.5);
    assert_eq!(config.layout.normalization_file, Some(PathBuf::from("normalization.tsv")));
    assert!(config.http.noproxy);
}

#[test]
fn test_partial_section_keeps_defaults() {
    let config = Config::from_toml_str("[layout]\nnormalization_file = \"n.tsv\"\n").unwrap();
    assert_eq!(config.layout.scale_factor, 1.0);
}

#[test]
fn test_malformed_config_is_error() {
    assert!(Config::from_toml_str("[ned]\nthreshold = \"high\"\n").is_err());
    assert!(Config::from_toml_str("[ner\n").is_err());
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
    assert!(config.ned.endpoint.is_none());
}

#[test]
fn test_ned_cache_path() {
    let mut config = Config::default();
    assert!(config.ned_cache_path(Path::new("doc.tsv")).is_none());
    config.ned.cache_dir = Some(PathBuf::from("cache"));
    assert_eq!(
        config.ned_cache_path(Path::new("/data/doc.tsv")),
        Some(PathBuf::from("cache/doc.json"))
    );
}

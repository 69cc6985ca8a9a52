use super::*;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn defaults_when_nothing_is_configured() {
    let settings = load_settings_from(Path::new("/nonexistent/schedule.toml"), no_env);
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.log_filter, "info");
}

#[test]
fn file_then_env_precedence() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("schedule.toml");
    fs::write(
        &path,
        "database_url = \"sqlite://file.db\"\napi_base_url = \"http://file:1\"\nrefresh_token = \"r-file\"\n",
    )
    .expect("write config");

    let env = |key: &str| match key {
        "DATABASE_URL" => Some("sqlite://plain.db".to_string()),
        "SCHEDULE__DATABASE_URL" => Some("sqlite://scoped.db".to_string()),
        "SCHEDULE__ACCESS_TOKEN" => Some("a-env".to_string()),
        _ => None,
    };
    let settings = load_settings_from(&path, env);

    assert_eq!(settings.database_url, "sqlite://scoped.db");
    assert_eq!(settings.api_base_url, "http://file:1");
    assert_eq!(settings.access_token.as_deref(), Some("a-env"));
    assert_eq!(settings.refresh_token.as_deref(), Some("r-file"));
}

#[test]
fn malformed_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("schedule.toml");
    fs::write(&path, "this is = = not toml").expect("write config");

    assert_eq!(load_settings_from(&path, no_env), Settings::default());
}

#[test]
fn normalizes_database_urls() {
    assert_eq!(normalize_database_url("./data/test.db"), "sqlite://./data/test.db");
    assert_eq!(normalize_database_url("sqlite:data\\x.db"), "sqlite://data/x.db");
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
}

#[test]
fn creates_parent_dir_for_file_url() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("nested").join("schedule.db");

    let url = prepare_database_url(&format!("sqlite://{}", db.display())).expect("prepare");

    assert!(url.starts_with("sqlite://"));
    assert!(dir.path().join("nested").is_dir());
}

#[test]
fn memory_url_needs_no_directory() {
    assert_eq!(prepare_database_url("sqlite::memory:").expect("prepare"), "sqlite::memory:");
}

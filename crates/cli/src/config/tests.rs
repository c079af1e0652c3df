use std::io::Write;

use super::load::load;
use super::schema::{Config, ProbeKind};

fn parse(raw: &str) -> Config {
    toml::from_str(raw).unwrap()
}

#[test]
fn minimal_config_fills_in_defaults() {
    let config = parse(
        r#"
        [registry]
        url = "https://registry.example.com"
        username = "pruner"

        [[hosts]]
        name = "web-1"
        endpoint = "http://web-1:9123"
        services = ["nginx"]
        "#,
    );

    assert_eq!(config.concurrency, 4);
    let registry = config.registry.as_ref().unwrap();
    assert_eq!(registry.keep_count, 10);
    assert_eq!(registry.request_timeout_secs, 30);
    assert!((config.thresholds.disk_free_gb - 10.0).abs() < f64::EPSILON);
    assert!((config.thresholds.cpu_percent - 90.0).abs() < f64::EPSILON);
    assert!((config.thresholds.memory_percent - 90.0).abs() < f64::EPSILON);
    assert_eq!(config.hosts[0].probe, ProbeKind::Agent);
    assert!(config.hosts[0].ping);
    assert!(config.validate().is_ok());
}

#[test]
fn rejects_zero_keep_count() {
    let config = parse(
        r#"
        [registry]
        url = "https://registry.example.com"
        username = "pruner"
        keep_count = 0
        "#,
    );
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("keep_count"));
}

#[test]
fn rejects_cpu_threshold_over_one_hundred() {
    let config = parse(
        r#"
        [thresholds]
        cpu_percent = 140.0
        "#,
    );
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("cpu_percent"));
}

#[test]
fn rejects_agent_host_without_endpoint() {
    let config = parse(
        r#"
        [[hosts]]
        name = "db-1"
        "#,
    );
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("db-1"));
}

#[test]
fn local_probe_needs_no_endpoint() {
    let config = parse(
        r#"
        [[hosts]]
        name = "this-box"
        probe = "local"
        services = ["postgresql"]
        "#,
    );
    assert!(config.validate().is_ok());
}

#[test]
fn rejects_email_channel_without_recipients() {
    let config = parse(
        r#"
        [channels.email]
        api_url = "https://api.sendgrid.com/v3/mail/send"
        from = "alerts@example.com"
        to = []
        "#,
    );
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("recipient"));
}

#[test]
fn rejects_duplicate_host_names() {
    let config = parse(
        r#"
        [[hosts]]
        name = "web-1"
        probe = "local"

        [[hosts]]
        name = "web-1"
        probe = "local"
        "#,
    );
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn unknown_context_is_an_error() {
    let mut config = parse("");
    let err = config.apply_context("staging").unwrap_err();
    assert!(err.to_string().contains("staging"));
}

#[test]
fn context_narrows_the_host_list() {
    let mut config = parse(
        r#"
        [[hosts]]
        name = "web-1"
        probe = "local"

        [[hosts]]
        name = "web-2"
        probe = "local"

        [contexts.edge]
        hosts = ["web-2"]
        "#,
    );
    config.apply_context("edge").unwrap();
    assert_eq!(config.hosts.len(), 1);
    assert_eq!(config.hosts[0].name, "web-2");
}

#[test]
fn context_replaces_the_registry() {
    let mut config = parse(
        r#"
        [registry]
        url = "https://registry.example.com"
        username = "pruner"

        [contexts.staging.registry]
        url = "https://staging-registry.example.com"
        username = "staging-pruner"
        keep_count = 3
        "#,
    );
    config.apply_context("staging").unwrap();
    let registry = config.registry.as_ref().unwrap();
    assert_eq!(registry.url, "https://staging-registry.example.com");
    assert_eq!(registry.keep_count, 3);
}

#[test]
fn context_referencing_unknown_host_is_an_error() {
    let mut config = parse(
        r#"
        [[hosts]]
        name = "web-1"
        probe = "local"

        [contexts.edge]
        hosts = ["web-9"]
        "#,
    );
    let err = config.apply_context("edge").unwrap_err();
    assert!(err.to_string().contains("web-9"));
}

#[test]
fn environment_overrides_the_registry_password() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shipshape.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        r#"
        [registry]
        url = "https://registry.example.com"
        username = "pruner"
        password = "from-file"
        "#
    )
    .unwrap();

    std::env::set_var("SHIPSHAPE_REGISTRY_PASSWORD", "from-env");
    let config = load(&path, None).unwrap();
    std::env::remove_var("SHIPSHAPE_REGISTRY_PASSWORD");

    assert_eq!(
        config.registry.unwrap().password.as_deref(),
        Some("from-env")
    );
}

#[test]
fn missing_config_file_reports_the_path() {
    let err = load(std::path::Path::new("/nonexistent/shipshape.toml"), None).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/shipshape.toml"));
}

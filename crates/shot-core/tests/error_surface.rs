use shot_core::errors::{ErrorInfo, ShotError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("file", "run_001.shot")
        .with_context("keyword", "vmi")
}

#[test]
fn rule_error_surface() {
    let err = ShotError::Rule(sample_info("unexpected_token", "unexpected '&'"));
    assert_eq!(err.code(), "unexpected_token");
    assert!(err.info().context.contains_key("keyword"));
}

#[test]
fn store_error_surface() {
    let err = ShotError::Store(sample_info("missing_dataset", "no dataset"));
    assert_eq!(err.info().code, "missing_dataset");
    assert!(err.to_string().starts_with("store error: no dataset"));
}

#[test]
fn cache_error_carries_hint() {
    let err = ShotError::Cache(sample_info("cache_write", "disk full").with_hint("free space"));
    assert_eq!(err.info().hint.as_deref(), Some("free space"));
    assert!(err.to_string().contains("hint: free space"));
}

#[test]
fn errors_roundtrip_through_json() {
    let err = ShotError::Compile(sample_info("no_data", "quantity missing"));
    let json = serde_json::to_string(&err).expect("serialize");
    assert!(json.contains("\"family\":\"Compile\""));
    let back: ShotError = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, err);
}

#[test]
fn outer_context_never_overrides_inner_context() {
    let err = ShotError::Stats(ErrorInfo::new("array_shape", "bad shape"))
        .with_context("file", "run_002.shot")
        .with_context("file", "outer.shot")
        .with_context("quantity", "vmi");
    assert_eq!(err.family(), "stats");
    assert_eq!(err.info().context["file"], "run_002.shot");
    assert_eq!(err.info().context["quantity"], "vmi");
}

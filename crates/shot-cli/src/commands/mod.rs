pub mod average;
pub mod generate;
pub mod inspect;
pub mod rule;

/// Parses a `keyword=path` alias argument.
pub fn parse_alias(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((keyword, path)) if !keyword.is_empty() && !path.is_empty() => {
            Ok((keyword.to_string(), path.to_string()))
        }
        _ => Err(format!("expected keyword=path, got '{raw}'")),
    }
}

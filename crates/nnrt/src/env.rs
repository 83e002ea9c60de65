use std::env;
use std::sync::OnceLock;

static NNRT_BACKEND: OnceLock<Option<String>> = OnceLock::new();
static NNRT_DISABLE_DYNAMIC_TENSORS: OnceLock<bool> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

/// Backend name forced through `NNRT_BACKEND`, if any.
pub(crate) fn backend_override() -> Option<&'static str> {
    NNRT_BACKEND
        .get_or_init(|| match env::var("NNRT_BACKEND") {
            Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
            _ => None,
        })
        .as_deref()
}

pub(crate) fn dynamic_tensors_disabled() -> bool {
    *NNRT_DISABLE_DYNAMIC_TENSORS.get_or_init(|| match env::var("NNRT_DISABLE_DYNAMIC_TENSORS") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}

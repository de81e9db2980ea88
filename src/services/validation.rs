//! Normalization of client-supplied payment inputs.

use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::payment::MAX_IDEMPOTENCY_KEY_LEN;

/// Maximum stored length of a return URL.
const MAX_RETURN_URL_LEN: usize = 1500;

/// Trim and bound the `Idempotency-Key` header value.
///
/// # Errors
///
/// - `MissingIdempotencyKey`: absent or blank
/// - `InvalidRequest`: longer than 191 characters
pub fn normalize_idempotency_key(raw: Option<&str>) -> Result<String, AppError> {
    let key = raw.map(str::trim).unwrap_or_default();
    if key.is_empty() {
        return Err(AppError::MissingIdempotencyKey);
    }
    if key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Idempotency-Key exceeds {MAX_IDEMPOTENCY_KEY_LEN} characters"
        )));
    }
    Ok(key.to_string())
}

/// Upper-case a three-letter currency code, falling back to `default` when absent.
pub fn normalize_currency(raw: Option<&str>, default: &str) -> Result<String, AppError> {
    let currency = match raw.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => c.to_ascii_uppercase(),
        None => default.trim().to_ascii_uppercase(),
    };

    if currency.len() == 3 && currency.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(currency)
    } else {
        Err(AppError::InvalidRequest(
            "Currency must be a three-letter ISO 4217 code".to_string(),
        ))
    }
}

/// Validate the optional return URL.
///
/// # Rules
///
/// - Blank means no return URL
/// - Must be an absolute HTTP or HTTPS URL
/// - Maximum 1500 characters
pub fn normalize_return_url(raw: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(url) = raw.map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };

    if url.len() > MAX_RETURN_URL_LEN {
        return Err(AppError::InvalidRequest(format!(
            "returnUrl exceeds {MAX_RETURN_URL_LEN} characters"
        )));
    }

    let parsed = url::Url::parse(url)
        .map_err(|_| AppError::InvalidRequest("returnUrl is not a valid URL".to_string()))?;

    match parsed.scheme() {
        "https" | "http" => Ok(Some(url.to_string())),
        _ => Err(AppError::InvalidRequest(
            "returnUrl must use HTTP or HTTPS".to_string(),
        )),
    }
}

/// Metadata must be a JSON object; absent or `null` means empty.
pub fn normalize_metadata(raw: Option<Value>) -> Result<Map<String, Value>, AppError> {
    match raw {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(AppError::InvalidRequest(
            "metadata must be a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn idempotency_key_is_trimmed() {
        assert_eq!(normalize_idempotency_key(Some("  k1 ")).unwrap(), "k1");
    }

    #[test]
    fn blank_idempotency_key_is_missing() {
        assert!(matches!(
            normalize_idempotency_key(None),
            Err(AppError::MissingIdempotencyKey)
        ));
        assert!(matches!(
            normalize_idempotency_key(Some("   ")),
            Err(AppError::MissingIdempotencyKey)
        ));
    }

    #[test]
    fn idempotency_key_length_is_bounded() {
        let at_limit = "a".repeat(MAX_IDEMPOTENCY_KEY_LEN);
        assert!(normalize_idempotency_key(Some(&at_limit)).is_ok());

        let too_long = "a".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        assert!(matches!(
            normalize_idempotency_key(Some(&too_long)),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn currency_defaults_and_upper_cases() {
        assert_eq!(normalize_currency(None, "KZT").unwrap(), "KZT");
        assert_eq!(normalize_currency(Some(" usd "), "KZT").unwrap(), "USD");
    }

    #[test]
    fn malformed_currency_is_rejected() {
        for bad in ["US", "EURO", "U$D", "12A"] {
            assert!(normalize_currency(Some(bad), "KZT").is_err(), "{bad}");
        }
    }

    #[test]
    fn return_url_rules() {
        assert_eq!(normalize_return_url(None).unwrap(), None);
        assert_eq!(normalize_return_url(Some("  ")).unwrap(), None);
        assert_eq!(
            normalize_return_url(Some("https://shop.local/ok")).unwrap().as_deref(),
            Some("https://shop.local/ok")
        );
        assert!(normalize_return_url(Some("not a url")).is_err());
        assert!(normalize_return_url(Some("ftp://shop.local/ok")).is_err());

        let long = format!("https://shop.local/{}", "a".repeat(MAX_RETURN_URL_LEN));
        assert!(normalize_return_url(Some(&long)).is_err());
    }

    #[test]
    fn metadata_must_be_an_object() {
        assert!(normalize_metadata(None).unwrap().is_empty());
        assert!(normalize_metadata(Some(Value::Null)).unwrap().is_empty());
        assert_eq!(
            normalize_metadata(Some(json!({ "source": "web" }))).unwrap()["source"],
            "web"
        );
        assert!(normalize_metadata(Some(json!(["web"]))).is_err());
        assert!(normalize_metadata(Some(json!("web"))).is_err());
    }
}

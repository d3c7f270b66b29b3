use log::debug;
use reqwest::StatusCode;
use reqwest::blocking::Response;
use serde_json::{Value, json};

use crate::error::Result;

pub(crate) const NOT_JSON_ENCODED: &str = "Response is not JSON encoded";

/// Joins URL parts with a single `/`, trimming slashes on both sides of
/// every part. `urljoin("https://host/api/", "/datasets/")` yields
/// `https://host/api/datasets`.
pub(crate) fn urljoin(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_matches('/'), path.trim_matches('/'))
}

/// Reads the whole body and decodes it as JSON. A body that is not JSON
/// becomes an error-shaped object instead of a failure.
pub(crate) fn decode_response(resp: Response) -> Result<Value> {
    let status = resp.status();
    let text = resp.text()?;
    Ok(decode_body(status, &text))
}

pub(crate) fn decode_body(status: StatusCode, text: &str) -> Value {
    match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            debug!("[ERROR {}] {}", status.as_u16(), text);
            json!({
                "error": NOT_JSON_ENCODED,
                "status_code": status.as_u16(),
                "text": text,
            })
        }
    }
}

pub(crate) fn guess_filename_from_url(url: &str) -> Option<String> {
    let path = url.split('?').next().unwrap_or(url);
    path.rsplit('/').next().and_then(|s| {
        if s.is_empty() {
            None
        } else {
            Some(s.to_string())
        }
    })
}

pub(crate) fn default_base_url() -> String {
    std::env::var("DARWIN_BASE_URL").unwrap_or_else(|_| crate::DEFAULT_BASE_URL.to_string())
}

pub(crate) fn api_url_for(base_url: &str) -> String {
    format!("{}/api/", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urljoin_trims_slashes_on_both_sides() {
        assert_eq!(
            urljoin("https://darwin.v7labs.com/api/", "/datasets/"),
            "https://darwin.v7labs.com/api/datasets"
        );
        assert_eq!(
            urljoin("http://localhost:8080/api", "users/token_info"),
            "http://localhost:8080/api/users/token_info"
        );
    }

    #[test]
    fn decode_body_passes_json_through() {
        let v = decode_body(StatusCode::OK, r#"[{"slug":"cats"}]"#);
        assert_eq!(v[0]["slug"], "cats");
    }

    #[test]
    fn decode_body_synthesizes_error_for_non_json() {
        let v = decode_body(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(
            v,
            json!({
                "error": "Response is not JSON encoded",
                "status_code": 502,
                "text": "<html>bad gateway</html>",
            })
        );
    }

    #[test]
    fn decode_body_treats_empty_body_as_not_json() {
        let v = decode_body(StatusCode::NO_CONTENT, "");
        assert_eq!(v["error"], NOT_JSON_ENCODED);
        assert_eq!(v["status_code"], 204);
        assert_eq!(v["text"], "");
    }

    #[test]
    fn guesses_filename_without_query() {
        assert_eq!(
            guess_filename_from_url("https://s3.example.com/exports/cats-v2.zip?X-Amz=1"),
            Some("cats-v2.zip".to_string())
        );
        assert_eq!(guess_filename_from_url("https://s3.example.com/"), None);
    }

    #[test]
    fn api_url_appends_api_root() {
        assert_eq!(
            api_url_for("https://darwin.v7labs.com"),
            "https://darwin.v7labs.com/api/"
        );
        assert_eq!(
            api_url_for("http://127.0.0.1:9000/"),
            "http://127.0.0.1:9000/api/"
        );
    }
}

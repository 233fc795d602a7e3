//! Custom test assertions for expressive tests
//!
//! Checks the error envelope the service returns on every failure:
//!
//! ```json
//! {"success": false, "error": 401, "message": "Not authorized",
//!  "code": "token_expired", "description": "Token expired."}
//! ```

use reqwest::{Response, StatusCode};
use serde_json::Value;

/// `WWW-Authenticate` value sent with every 401.
pub const EXPECTED_WWW_AUTHENTICATE: &str = r#"Bearer realm="drinks-api", error="invalid_token""#;

/// Assert `response` is an error envelope with `status`, returning the body.
///
/// # Panics
///
/// Panics on a status mismatch or a body that is not the error envelope.
pub async fn assert_error_response(response: Response, status: u16) -> Value {
    let actual = response.status();
    let challenge = response
        .headers()
        .get("www-authenticate")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body: Value = response
        .json()
        .await
        .expect("error response must be JSON");

    assert_eq!(
        actual,
        StatusCode::from_u16(status).expect("valid status code"),
        "unexpected status, body: {body}"
    );
    assert_eq!(body["success"], false, "body: {body}");
    assert_eq!(body["error"], status, "body: {body}");
    assert!(body["message"].is_string(), "body: {body}");

    if status == 401 {
        assert_eq!(
            challenge.as_deref(),
            Some(EXPECTED_WWW_AUTHENTICATE),
            "401 must carry a bearer challenge"
        );
    } else {
        assert!(challenge.is_none(), "only 401 carries a bearer challenge");
    }

    body
}

/// Assert `response` is an authorization failure with `status` and `code`,
/// returning the body.
///
/// # Panics
///
/// Panics on any mismatch.
pub async fn assert_auth_error(response: Response, status: u16, code: &str) -> Value {
    let body = assert_error_response(response, status).await;
    assert_eq!(body["code"], code, "body: {body}");
    assert!(
        body["description"]
            .as_str()
            .is_some_and(|d| !d.is_empty()),
        "auth errors carry a description, body: {body}"
    );
    body
}

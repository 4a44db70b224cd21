use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// API key pair issued by the engagement platform.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key_id: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
        }
    }

    pub fn authorization(&self) -> String {
        build_auth_header(&self.key_id, &self.secret)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Builds the `Authorization` value for private API access.
///
/// ```
/// assert_eq!(
///     engage_sdk::build_auth_header("myKeyId", "mySecret"),
///     "Basic bXlLZXlJZDpteVNlY3JldA=="
/// );
/// ```
pub fn build_auth_header(key_id: &str, secret: &str) -> String {
    let token = STANDARD.encode(format!("{key_id}:{secret}"));
    format!("Basic {token}")
}

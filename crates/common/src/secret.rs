//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for the push provider API key and
//! owner session tokens. `SecretString` implements `Debug` with redaction,
//! so any struct deriving `Debug` that holds one is safe to log via `{:?}`
//! or tracing fields.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct PushCredentials {
//!     app_id: String,
//!     api_key: SecretString,
//! }
//!
//! let creds = PushCredentials {
//!     app_id: "app-123".to_string(),
//!     api_key: SecretString::from("onesignal-key"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("onesignal-key"));
//! assert_eq!(creds.api_key.expose_secret(), "onesignal-key");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

//! A client for the Testdroid cloud REST API.
//!
//! Authenticates with an OAuth2 password grant, talks XML to
//! `{cloud}/api/v2`, and retries once with a new token when the old one
//! is rejected.
//!
//! ```no_run
//! # async fn run() -> Result<(), testdroid_api::ApiError> {
//! let client = testdroid_api::ApiClient::new("https://cloud.testdroid.com", "me@example.com", "secret")?;
//! let me = client.me().await?;
//! println!("{:?} lives at {}", me.email, me.self_uri());
//! # Ok(())
//! # }
//! ```

pub mod api;
mod error;
pub mod oauth;

pub use api::{ApiClient, ApiEntity, ApiUser, Entity};
pub use error::ApiError;
pub use oauth::{AccessToken, AuthCredentials, TokenState};

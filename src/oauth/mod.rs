mod credentials;
mod token;

pub use credentials::AuthCredentials;
pub use token::{AccessToken, TokenManager, TokenState, OAUTH_CLIENT_ID, OAUTH_CLIENT_SECRET};

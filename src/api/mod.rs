mod client;
mod entity;
mod user;

pub use client::ApiClient;
pub use entity::{ApiEntity, Entity};
pub use user::ApiUser;

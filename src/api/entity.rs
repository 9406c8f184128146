use super::ApiClient;
use crate::error::ApiError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ops::Deref;

/// A resource type the API can hand back to us as XML.
pub trait ApiEntity: DeserializeOwned {
    /// The XML root element this type is served as, e.g. `user`.
    /// Responses with any other root are rejected; `None` accepts any.
    const ROOT_ELEMENT: Option<&'static str> = None;

    /// The resource's identifier, if it has one.
    fn id(&self) -> Option<String> {
        None
    }

    fn has_id(&self) -> bool {
        self.id().is_some_and(|id| !id.is_empty())
    }
}

/// A resource fetched from the API, along with where it came from.
///
/// Only `ApiClient` creates these, so the client handle and self-URI are
/// always filled in. Derefs to the resource itself.
#[derive(Debug, Clone)]
pub struct Entity<T> {
    client: ApiClient,
    self_uri: String,
    data: T,
}

impl<T> Entity<T> {
    pub(crate) fn new(client: ApiClient, self_uri: String, data: T) -> Self {
        Self {
            client,
            self_uri,
            data,
        }
    }

    /// The client this entity was fetched with.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Path of this resource relative to the API URL, e.g. `/me` or `/projects/42`.
    pub fn self_uri(&self) -> &str {
        &self.self_uri
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

impl<T: ApiEntity> Entity<T> {
    /// Re-fetches this resource, replacing our copy.
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        let fresh: Entity<T> = self.client.get(&self.self_uri).await?;
        self.data = fresh.data;
        Ok(())
    }

    /// POSTs `form` to this resource and keeps the server's answer.
    pub async fn update<B: Serialize + ?Sized>(&mut self, form: &B) -> Result<(), ApiError> {
        let updated: Entity<T> = self.client.post(&self.self_uri, form).await?;
        self.data = updated.data;
        Ok(())
    }

    /// Deletes this resource on the server.
    pub async fn delete(self) -> Result<(), ApiError> {
        self.client.delete(&self.self_uri).await
    }
}

impl<T> Deref for Entity<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

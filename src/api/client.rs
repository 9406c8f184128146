use super::entity::{ApiEntity, Entity};
use super::user::ApiUser;
use crate::error::ApiError;
use crate::oauth::{AccessToken, AuthCredentials, TokenManager, TokenState};
use quick_xml::de::DeError;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::de::Error as _;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use url::Url;

/// Every resource path is relative to this, beneath the cloud URL.
const API_PATH: &str = "/api/v2";

/// All API responses are requested as XML.
const XML_CONTENT_TYPE: &str = "application/xml";

/// A client for the Testdroid cloud API.
///
/// Cloning is cheap, and clones share a single session (and thus a single
/// access token). Separately constructed clients never share tokens.
#[derive(Debug, Clone)]
pub struct ApiClient {
    session: Arc<Session>,
}

#[derive(Debug)]
struct Session {
    http: reqwest::Client,
    cloud_url: String,
    api_url: String,
    tokens: TokenManager,
}

impl ApiClient {
    /// Creates a new API client for the given cloud, authenticating as the given user.
    pub fn new(
        cloud_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ApiError> {
        Self::with_http_client(
            reqwest::Client::new(),
            cloud_url,
            AuthCredentials::new(username, password),
        )
    }

    /// Same as `new`, but over a caller-configured HTTP client
    /// (for timeouts, proxies and the like).
    pub fn with_http_client(
        http: reqwest::Client,
        cloud_url: &str,
        credentials: AuthCredentials,
    ) -> Result<Self, ApiError> {
        Url::parse(cloud_url)?;
        let cloud_url = cloud_url.trim_end_matches('/').to_string();
        let api_url = format!("{cloud_url}{API_PATH}");
        let tokens = TokenManager::new(http.clone(), &cloud_url, credentials);

        Ok(Self {
            session: Arc::new(Session {
                http,
                cloud_url,
                api_url,
                tokens,
            }),
        })
    }

    pub fn cloud_url(&self) -> &str {
        &self.session.cloud_url
    }

    pub fn api_url(&self) -> &str {
        &self.session.api_url
    }

    pub fn credentials(&self) -> &AuthCredentials {
        self.session.tokens.credentials()
    }

    pub async fn token_state(&self) -> TokenState {
        self.session.tokens.state().await
    }

    /// Acquires a fresh access token right away.
    ///
    /// The verbs below acquire tokens lazily and quietly; use this when a
    /// bad password should fail loudly instead of as a later 401.
    pub async fn authenticate(&self) -> Result<AccessToken, ApiError> {
        self.session.tokens.acquire().await
    }

    /// Fetches the resource at `path` as a `T`.
    pub async fn get<T: ApiEntity>(&self, path: &str) -> Result<Entity<T>, ApiError> {
        self.with_reauthentication(move || self.get_once(path))
            .await
    }

    /// POSTs `form` (URL-encoded) to `path`, parsing the response as a `T`.
    ///
    /// When this creates a resource, the returned entity's self-URI points
    /// at the new resource rather than at the collection.
    pub async fn post<T, B>(&self, path: &str, form: &B) -> Result<Entity<T>, ApiError>
    where
        T: ApiEntity,
        B: Serialize + ?Sized,
    {
        self.with_reauthentication(move || self.post_once(path, form))
            .await
    }

    /// Deletes the resource at `path`. Only a `200 OK` counts as success.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.with_reauthentication(move || self.delete_once(path))
            .await
    }

    /// The user we are authenticated as.
    pub async fn me(&self) -> Result<Entity<ApiUser>, ApiError> {
        self.get("/me").await
    }

    /// Runs `attempt`, and if the server rejected our token, forgets the
    /// token and runs it exactly once more. The second result is final.
    async fn with_reauthentication<R, F, Fut>(&self, mut attempt: F) -> Result<R, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, ApiError>>,
    {
        match attempt().await {
            Err(error) if error.is_unauthorized() => {
                tracing::debug!(%error, "access token rejected, retrying with a new one");
                self.session.tokens.invalidate().await;
                attempt().await
            }
            result => result,
        }
    }

    async fn get_once<T: ApiEntity>(&self, path: &str) -> Result<Entity<T>, ApiError> {
        let response = self.execute(Method::GET, path, None::<&()>).await?;
        let (_, data) = read_entity::<T>(path, response).await?;
        Ok(Entity::new(self.clone(), path.to_string(), data))
    }

    async fn post_once<T, B>(&self, path: &str, form: &B) -> Result<Entity<T>, ApiError>
    where
        T: ApiEntity,
        B: Serialize + ?Sized,
    {
        let response = self.execute(Method::POST, path, Some(form)).await?;
        let (status, data) = read_entity::<T>(path, response).await?;

        // A freshly created resource lives beneath the collection we posted to.
        let self_uri = match data.id() {
            Some(id) if status == StatusCode::CREATED && !id.is_empty() => {
                format!("{path}/{id}")
            }
            _ => path.to_string(),
        };
        Ok(Entity::new(self.clone(), self_uri, data))
    }

    async fn delete_once(&self, path: &str) -> Result<(), ApiError> {
        let response = self.execute(Method::DELETE, path, None::<&()>).await?;
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let reason = status.canonical_reason().unwrap_or("unknown status");
        Err(ApiError::from_status(
            path,
            status,
            format!("Failed to delete resource: {reason}"),
        ))
    }

    /// Builds, signs and sends one request against the API.
    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        form: Option<&B>,
    ) -> Result<Response, ApiError> {
        let token = self.session.tokens.token().await;
        let url = format!("{}{}", self.session.api_url, path);

        let mut request = self
            .session
            .http
            .request(method.clone(), url)
            .header(header::ACCEPT, XML_CONTENT_TYPE);
        if let Some(form) = form {
            request = request.form(form);
        }

        tracing::debug!(%method, path, "calling API");
        sign(request, token.as_ref())
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                uri: path.to_string(),
                source,
            })
    }
}

/// Attaches the bearer token, if we managed to get one.
fn sign(request: RequestBuilder, token: Option<&AccessToken>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token.as_str()),
        None => request,
    }
}

/// Checks for a successful status, then parses the body as XML into a `T`.
async fn read_entity<T: ApiEntity>(
    path: &str,
    response: Response,
) -> Result<(StatusCode, T), ApiError> {
    let status = response.status();

    // A rejected token goes straight to the retry, whatever its body holds.
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::from_status(path, status, String::new()));
    }

    let body = response
        .text()
        .await
        .map_err(|source| ApiError::Transport {
            uri: path.to_string(),
            source,
        })?;

    if !status.is_success() {
        let message = if body.trim().is_empty() {
            format!("API call {path} failed")
        } else {
            format!("API call {path} failed: {}", body.trim())
        };
        return Err(ApiError::from_status(path, status, message));
    }

    let parse_error = |source| ApiError::Parse {
        status: Some(status.as_u16()),
        type_name: std::any::type_name::<T>(),
        source,
    };

    if let (Some(expected), Some(found)) = (T::ROOT_ELEMENT, root_element(&body)) {
        if found != expected {
            return Err(parse_error(DeError::custom(format!(
                "expected root element <{expected}>, found <{found}>"
            ))));
        }
    }

    let data = quick_xml::de::from_str::<T>(&body).map_err(parse_error)?;
    Ok((status, data))
}

/// Name of the document's first element, if it gets that far.
fn root_element(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                return Some(String::from_utf8_lossy(element.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

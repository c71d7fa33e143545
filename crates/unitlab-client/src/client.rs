// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

use crate::{
    Error,
    api::{
        AnnotationType, Dataset, DatasetClass, DatasetCreateParams, Project, ProjectID,
        ProjectMember, UploadInfo,
    },
    retry::{create_retry_policy, max_retries_from_env, timeout_from_env},
    storage::{
        CredentialStorage, Credentials, DEFAULT_API_URL, FileCredentialStorage,
        MemoryCredentialStorage,
    },
};
use futures::future::join_all;
use log::{Level, debug, error, log_enabled, trace, warn};
use reqwest::{RequestBuilder, Response, multipart::Form};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::{Semaphore, mpsc::Sender};
use url::Url;

const USER_AGENT: &str = "Unitlab Client";

const MISSING_API_KEY: &str =
    "No API key provided. Pass --api-key, set UNITLAB_API_KEY, or run `unitlab configure`.";

/// Number of concurrent file uploads, `UNITLAB_UPLOAD_TASKS` (default 20).
pub fn upload_concurrency() -> usize {
    std::env::var("UNITLAB_UPLOAD_TASKS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(20)
}

/// Number of concurrent file downloads, `UNITLAB_DOWNLOAD_TASKS` (default 50).
pub fn download_concurrency() -> usize {
    std::env::var("UNITLAB_DOWNLOAD_TASKS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(50)
}

/// Progress information for long-running operations.
///
/// `current` counts completed items (successful or not) out of `total`.
///
/// ```rust
/// use unitlab_client::Progress;
///
/// let progress = Progress {
///     current: 25,
///     total: 100,
/// };
/// assert_eq!(progress.current * 4, progress.total);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Current number of completed items.
    pub current: usize,
    /// Total number of items to process.
    pub total: usize,
}

/// HTTP behaviour of a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Total timeout of an API request.  File transfers apply it to each
    /// read instead, so large files are not cut off.
    pub timeout: Duration,
    /// Maximum number of retries per request.
    pub max_retries: u32,
}

impl Default for ClientOptions {
    /// Reads `UNITLAB_TIMEOUT` and `UNITLAB_MAX_RETRIES`.
    fn default() -> Self {
        ClientOptions {
            timeout: Duration::from_secs(timeout_from_env()),
            max_retries: max_retries_from_env(),
        }
    }
}

/// Client for the Unitlab SDK API.
///
/// Credentials are resolved in this order:
///
/// - API key: [`with_api_key`][Self::with_api_key], then `UNITLAB_API_KEY`,
///   then the credentials file.
/// - API URL: [`with_api_url`][Self::with_api_url], then `UNITLAB_API_URL`,
///   then the credentials file, then `https://api.unitlab.ai`.
///
/// A client without an API key can be constructed; its requests fail with
/// [`Error::AuthenticationError`].
///
/// # Examples
///
/// ```no_run
/// use unitlab_client::Client;
///
/// # async fn example() -> Result<(), unitlab_client::Error> {
/// let client = Client::new()?.with_api_key("my-api-key");
/// for project in client.projects().await? {
///     println!("{}", project);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    pub(crate) http: reqwest::Client,
    /// Uploads and downloads of file bodies.
    pub(crate) transfer: reqwest::Client,
    url: Url,
    api_key: Option<String>,
    options: ClientOptions,
    storage: Arc<dyn CredentialStorage>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("options", &self.options)
            .finish()
    }
}

fn http_builder(url: &Url, options: &ClientOptions) -> reqwest::ClientBuilder {
    let host = url.host_str().unwrap_or_default().to_string();

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .retry(create_retry_policy(host, options.max_retries))
}

/// Builds the API client, capped by the total timeout, and the transfer
/// client, which only times out when a single read stalls.
fn build_http(
    url: &Url,
    options: &ClientOptions,
) -> Result<(reqwest::Client, reqwest::Client), Error> {
    let http = http_builder(url, options).timeout(options.timeout).build()?;
    let transfer = http_builder(url, options)
        .read_timeout(options.timeout)
        .build()?;

    Ok((http, transfer))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_api_url(api_url: &str) -> Result<Url, Error> {
    let url = Url::parse(api_url.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::InvalidParameters(format!(
            "API URL must use http or https, got '{}'",
            scheme
        ))),
    }
}

impl Client {
    /// Create a client using the credentials file in the user's home
    /// directory, falling back to memory storage when no home directory is
    /// available.
    pub fn new() -> Result<Self, Error> {
        let storage: Arc<dyn CredentialStorage> = match FileCredentialStorage::new() {
            Ok(file_storage) => Arc::new(file_storage),
            Err(e) => {
                warn!(
                    "Could not initialize credential storage: {}. Using memory storage.",
                    e
                );
                Arc::new(MemoryCredentialStorage::new())
            }
        };

        Self::from_storage(storage, ClientOptions::default())
    }

    /// Create a client resolving credentials from the environment and the
    /// provided storage.
    ///
    /// An environment or stored API URL that cannot be parsed is ignored
    /// with a warning so that an explicit [`with_api_url`][Self::with_api_url]
    /// or `unitlab configure` can still replace it.
    pub fn from_storage(
        storage: Arc<dyn CredentialStorage>,
        options: ClientOptions,
    ) -> Result<Self, Error> {
        let env = Credentials {
            api_key: env_value("UNITLAB_API_KEY"),
            api_url: env_value("UNITLAB_API_URL"),
        };
        Self::from_parts(storage, options, env)
    }

    /// Resolves `env` over the stored credentials over the defaults.
    fn from_parts(
        storage: Arc<dyn CredentialStorage>,
        options: ClientOptions,
        env: Credentials,
    ) -> Result<Self, Error> {
        let stored = match storage.load() {
            Ok(credentials) => credentials.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to load stored credentials: {}", e);
                Credentials::default()
            }
        };
        let resolved = stored.merge(&env);

        let url = match resolved.api_url.as_deref().map(parse_api_url) {
            Some(Ok(url)) => url,
            Some(Err(e)) => {
                warn!(
                    "Ignoring invalid API URL {:?}: {}. Using {}.",
                    resolved.api_url.as_deref().unwrap_or_default(),
                    e,
                    DEFAULT_API_URL
                );
                parse_api_url(DEFAULT_API_URL)?
            }
            None => parse_api_url(DEFAULT_API_URL)?,
        };
        let (http, transfer) = build_http(&url, &options)?;

        debug!(
            "Client for {} (retries={}, timeout={}s)",
            url,
            options.max_retries,
            options.timeout.as_secs()
        );

        Ok(Client {
            http,
            transfer,
            url,
            api_key: resolved.api_key,
            options,
            storage,
        })
    }

    /// Returns a client using the given API key.  An empty key leaves the
    /// client unauthenticated.
    pub fn with_api_key(&self, api_key: &str) -> Self {
        let api_key = api_key.trim();
        Client {
            api_key: (!api_key.is_empty()).then(|| api_key.to_string()),
            ..self.clone()
        }
    }

    /// Returns a client connected to the given API URL, for example a
    /// self-hosted instance.
    ///
    /// ```rust
    /// # fn main() -> Result<(), unitlab_client::Error> {
    /// use unitlab_client::Client;
    ///
    /// let client = Client::new()?.with_api_url("http://localhost:8000")?;
    /// assert_eq!(client.url(), "http://localhost:8000/");
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_api_url(&self, api_url: &str) -> Result<Self, Error> {
        let url = parse_api_url(api_url)?;
        let (http, transfer) = build_http(&url, &self.options)?;
        Ok(Client {
            http,
            transfer,
            url,
            ..self.clone()
        })
    }

    /// Returns a client with new HTTP options.
    pub fn with_options(&self, options: ClientOptions) -> Result<Self, Error> {
        let (http, transfer) = build_http(&self.url, &options)?;
        Ok(Client {
            http,
            transfer,
            options,
            ..self.clone()
        })
    }

    /// Returns a client backed by another credential storage.  The API key
    /// and URL are re-resolved against the new storage.
    pub fn with_storage(&self, storage: Arc<dyn CredentialStorage>) -> Result<Self, Error> {
        Self::from_storage(storage, self.options.clone())
    }

    /// Merge the given credentials into the client's storage.  Fields that
    /// are `None` keep their stored value.
    pub fn store_credentials(&self, credentials: &Credentials) -> Result<(), Error> {
        if let Some(api_url) = &credentials.api_url {
            parse_api_url(api_url)?;
        }
        self.storage.store(credentials)?;
        Ok(())
    }

    /// Credentials currently held by the storage backend.
    pub fn stored_credentials(&self) -> Result<Option<Credentials>, Error> {
        Ok(self.storage.load()?)
    }

    /// The base URL of the API.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// List all projects visible to the API key.
    pub async fn projects(&self) -> Result<Vec<Project>, Error> {
        self.get_json("/api/sdk/projects/").await
    }

    pub async fn project(&self, project_id: ProjectID) -> Result<Project, Error> {
        self.get_json(&format!("/api/sdk/projects/{}/", project_id))
            .await
    }

    /// Members of a project with their labeling statistics.
    pub async fn project_members(
        &self,
        project_id: ProjectID,
    ) -> Result<Vec<ProjectMember>, Error> {
        self.get_json(&format!("/api/sdk/projects/{}/members/", project_id))
            .await
    }

    /// Accepted file formats and size limit for uploads to a project.
    pub async fn project_upload_info(&self, project_id: ProjectID) -> Result<UploadInfo, Error> {
        self.get_json(&format!("/api/sdk/projects/{}/upload-info/", project_id))
            .await
    }

    /// List all datasets visible to the API key.
    pub async fn datasets(&self) -> Result<Vec<Dataset>, Error> {
        self.get_json("/api/sdk/datasets/").await
    }

    /// Create an empty dataset.  Class values follow the order of `classes`.
    pub async fn create_dataset(
        &self,
        name: &str,
        annotation_type: AnnotationType,
        classes: &[String],
    ) -> Result<Dataset, Error> {
        if name.trim().is_empty() {
            return Err(Error::InvalidParameters(
                "Dataset name must not be empty".to_string(),
            ));
        }

        let params = DatasetCreateParams {
            name,
            annotation_type,
            classes: classes
                .iter()
                .enumerate()
                .map(|(value, name)| DatasetClass { name, value })
                .collect(),
        };

        self.post_json("/api/sdk/datasets/create/", Some(&params))
            .await
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.url.join(path)?)
    }

    /// Adds the API key and user agent to a request for the Unitlab API.
    pub(crate) fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, Error> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::AuthenticationError(MISSING_API_KEY.to_string()))?;

        Ok(request
            .header("Authorization", format!("Api-Key {}", api_key))
            .header("User-Agent", USER_AGENT))
    }

    pub(crate) async fn get_json<T>(&self, path: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);

        let resp = self
            .authorize(self.http.get(url))?
            .header("Accept", "application/json")
            .send()
            .await?;

        parse_json(check_response(resp).await?).await
    }

    /// POST a JSON body, sending `{}` when no body is given.
    pub(crate) async fn post_json<T, B>(&self, path: &str, body: Option<&B>) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let url = self.endpoint(path)?;
        let body = match body {
            Some(body) => serde_json::to_value(body)?,
            None => serde_json::json!({}),
        };

        if log_enabled!(Level::Trace) {
            trace!("POST {} {}", url, body);
        } else {
            debug!("POST {}", url);
        }

        let resp = self
            .authorize(self.http.post(url))?
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        parse_json(check_response(resp).await?).await
    }

    /// POST a multipart form on the transfer client and return the raw
    /// response so callers can react to specific status codes.
    pub(crate) async fn post_multipart(&self, path: &str, form: Form) -> Result<Response, Error> {
        let url = self.endpoint(path)?;
        let resp = self
            .authorize(self.transfer.post(url))?
            .header("Accept", "application/json")
            .multipart(form)
            .send()
            .await?;
        Ok(resp)
    }
}

/// Maps a failure status onto the platform error kinds.  Successful
/// responses are returned unchanged.
pub(crate) async fn check_response(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    match status.as_u16() {
        401 => Err(Error::AuthenticationError(
            "Authentication failed".to_string(),
        )),
        403 => Err(Error::SubscriptionError(format!(
            "Forbidden: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        ))),
        _ => {
            let body = resp.text().await.unwrap_or_default().to_lowercase();
            let message = if body.trim().is_empty() {
                status.to_string().to_lowercase()
            } else {
                body
            };

            if message.contains("not found") {
                Err(Error::NotFoundError(message))
            } else {
                Err(Error::NetworkError(message))
            }
        }
    }
}

async fn parse_json<T>(resp: Response) -> Result<T, Error>
where
    T: DeserializeOwned,
{
    let body = resp.bytes().await?;

    if log_enabled!(Level::Trace) {
        trace!("Response: {}", String::from_utf8_lossy(&body));
    }

    match serde_json::from_slice(&body) {
        Ok(value) => Ok(value),
        Err(err) => {
            error!("Invalid JSON Response: {}", String::from_utf8_lossy(&body));
            Err(err.into())
        }
    }
}

/// Shared completion counter reporting [`Progress`] over an optional
/// channel.  Cloned into every task of a transfer so batches report one
/// continuous count.
#[derive(Clone)]
pub(crate) struct ProgressTracker {
    current: Arc<AtomicUsize>,
    total: usize,
    sender: Option<Sender<Progress>>,
}

impl ProgressTracker {
    pub(crate) fn new(total: usize, sender: Option<Sender<Progress>>) -> Self {
        ProgressTracker {
            current: Arc::new(AtomicUsize::new(0)),
            total,
            sender,
        }
    }

    pub(crate) async fn start(&self) {
        if let Some(sender) = &self.sender {
            let _ = sender
                .send(Progress {
                    current: 0,
                    total: self.total,
                })
                .await;
        }
    }

    pub(crate) async fn advance(&self) {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(sender) = &self.sender {
            let _ = sender
                .send(Progress {
                    current,
                    total: self.total,
                })
                .await;
        }
    }
}

/// Process items concurrently with at most `max_tasks` in flight, gathering
/// every result in input order.
///
/// Progress advances once per finished item whether it succeeded or not.  A
/// failing item never cancels its siblings; callers inspect the results.
pub(crate) async fn parallel_foreach_items<T, R, F, Fut>(
    items: Vec<T>,
    max_tasks: usize,
    tracker: &ProgressTracker,
    work_fn: F,
) -> Vec<Result<R, Error>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    let sem = Arc::new(Semaphore::new(max_tasks.max(1)));
    let work_fn = Arc::new(work_fn);

    let tasks = items
        .into_iter()
        .map(|item| {
            let sem = sem.clone();
            let tracker = tracker.clone();
            let work_fn = work_fn.clone();

            tokio::spawn(async move {
                let _permit = sem.acquire().await.map_err(|_| {
                    Error::IoError(std::io::Error::other("Semaphore closed unexpectedly"))
                })?;

                let result = work_fn(item).await;
                tracker.advance().await;
                result
            })
        })
        .collect::<Vec<_>>();

    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.map_err(Error::from).and_then(|result| result))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCredentialStorage;
    use mockito::{Matcher, Server};
    use std::str::FromStr;

    const PROJECT: &str = "0b4e6f2a-5f7c-4a53-9d1c-1c3b4a8e2f11";

    fn test_client(url: &str) -> Client {
        Client::from_storage(
            Arc::new(MemoryCredentialStorage::new()),
            ClientOptions {
                timeout: Duration::from_secs(5),
                max_retries: 0,
            },
        )
        .unwrap()
        .with_api_url(url)
        .unwrap()
        .with_api_key("secret")
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = test_client("http://localhost:8000");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_with_api_url_rejects_other_schemes() {
        let client = test_client("http://localhost:8000");
        assert!(matches!(
            client.with_api_url("ftp://example.com"),
            Err(Error::InvalidParameters(_))
        ));
        assert!(matches!(
            client.with_api_url("not a url"),
            Err(Error::UrlParseError(_))
        ));
    }

    #[test]
    fn test_store_credentials_merges() {
        let client = test_client("http://localhost:8000");
        client
            .store_credentials(&Credentials {
                api_key: Some("key-1".to_string()),
                api_url: Some("https://self-hosted.example.com".to_string()),
            })
            .unwrap();
        client
            .store_credentials(&Credentials {
                api_key: Some("key-2".to_string()),
                api_url: None,
            })
            .unwrap();

        let stored = client.stored_credentials().unwrap().unwrap();
        assert_eq!(stored.api_key.as_deref(), Some("key-2"));
        assert_eq!(
            stored.api_url.as_deref(),
            Some("https://self-hosted.example.com")
        );
    }

    fn stored(api_key: Option<&str>, api_url: Option<&str>) -> Arc<dyn CredentialStorage> {
        let storage = MemoryCredentialStorage::new();
        storage
            .store(&Credentials {
                api_key: api_key.map(str::to_string),
                api_url: api_url.map(str::to_string),
            })
            .unwrap();
        Arc::new(storage)
    }

    #[test]
    fn test_resolution_uses_storage_without_env() {
        let client = Client::from_parts(
            stored(Some("stored-key"), Some("https://self-hosted.example.com")),
            ClientOptions::default(),
            Credentials::default(),
        )
        .unwrap();

        assert_eq!(client.api_key.as_deref(), Some("stored-key"));
        assert_eq!(client.url(), "https://self-hosted.example.com/");
    }

    #[test]
    fn test_resolution_env_over_storage() {
        let client = Client::from_parts(
            stored(Some("stored-key"), Some("https://self-hosted.example.com")),
            ClientOptions::default(),
            Credentials {
                api_key: Some("env-key".to_string()),
                api_url: Some("http://localhost:8000".to_string()),
            },
        )
        .unwrap();

        assert_eq!(client.api_key.as_deref(), Some("env-key"));
        assert_eq!(client.url(), "http://localhost:8000/");
    }

    #[test]
    fn test_resolution_defaults() {
        let client = Client::from_parts(
            stored(None, None),
            ClientOptions::default(),
            Credentials::default(),
        )
        .unwrap();

        assert!(!client.has_api_key());
        assert_eq!(client.url(), "https://api.unitlab.ai/");
    }

    #[test]
    fn test_invalid_stored_url_falls_back_to_default() {
        let client = Client::from_parts(
            stored(Some("stored-key"), Some("api.unitlab.ai")),
            ClientOptions::default(),
            Credentials::default(),
        )
        .unwrap();
        assert_eq!(client.url(), "https://api.unitlab.ai/");

        // An explicit URL still replaces it.
        let client = client.with_api_url("http://localhost:8000").unwrap();
        assert_eq!(client.url(), "http://localhost:8000/");
        assert_eq!(client.api_key.as_deref(), Some("stored-key"));

        let client = Client::from_parts(
            stored(None, Some("https://self-hosted.example.com")),
            ClientOptions::default(),
            Credentials {
                api_key: None,
                api_url: Some("ftp://example.com".to_string()),
            },
        )
        .unwrap();
        assert_eq!(client.url(), "https://api.unitlab.ai/");
    }

    #[tokio::test]
    async fn test_projects_sends_api_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/sdk/projects/")
            .match_header("authorization", "Api-Key secret")
            .match_header("user-agent", "Unitlab Client")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"[{{"pk": "{}", "name": "Cars", "generic_type": "image"}}]"#,
                PROJECT
            ))
            .create_async()
            .await;

        let projects = test_client(&server.url()).projects().await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name(), "Cars");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let server = Server::new_async().await;
        let client = test_client(&server.url()).with_api_key("");
        assert!(!client.has_api_key());

        match client.projects().await {
            Err(Error::AuthenticationError(msg)) => assert!(msg.contains("No API key")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let mut server = Server::new_async().await;
        let id = ProjectID::from_str(PROJECT).unwrap();
        let client = test_client(&server.url());

        let _unauthorized = server
            .mock("GET", "/api/sdk/projects/")
            .with_status(401)
            .create_async()
            .await;
        assert!(matches!(
            client.projects().await,
            Err(Error::AuthenticationError(msg)) if msg == "Authentication failed"
        ));

        let _forbidden = server
            .mock("GET", format!("/api/sdk/projects/{}/", id).as_str())
            .with_status(403)
            .create_async()
            .await;
        assert!(matches!(
            client.project(id).await,
            Err(Error::SubscriptionError(msg)) if msg == "Forbidden: 403 Forbidden"
        ));

        let _missing = server
            .mock("GET", format!("/api/sdk/projects/{}/members/", id).as_str())
            .with_status(404)
            .with_body(r#"{"detail": "Not Found."}"#)
            .create_async()
            .await;
        assert!(matches!(
            client.project_members(id).await,
            Err(Error::NotFoundError(msg)) if msg.contains("not found")
        ));

        let _broken = server
            .mock("GET", "/api/sdk/datasets/")
            .with_status(500)
            .with_body("Internal Error")
            .create_async()
            .await;
        match client.datasets().await {
            Err(err @ Error::NetworkError(_)) => {
                assert!(err.is_network());
                assert_eq!(err.to_string(), "Network error: internal error");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_dataset_sends_classes() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/sdk/datasets/create/")
            .match_body(Matcher::Json(serde_json::json!({
                "name": "Vehicles",
                "annotation_type": "img_bbox",
                "classes": [
                    {"name": "car", "value": 0},
                    {"name": "truck", "value": 1},
                ],
            })))
            .with_status(201)
            .with_body(format!(r#"{{"pk": "{}", "name": "Vehicles"}}"#, PROJECT))
            .create_async()
            .await;

        let dataset = test_client(&server.url())
            .create_dataset(
                "Vehicles",
                AnnotationType::Bbox,
                &["car".to_string(), "truck".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(dataset.name(), "Vehicles");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_json_response() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/sdk/datasets/")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        assert!(matches!(
            test_client(&server.url()).datasets().await,
            Err(Error::JsonError(_))
        ));
    }

    #[tokio::test]
    async fn test_parallel_foreach_counts_failures() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let tracker = ProgressTracker::new(4, Some(tx));

        let results = parallel_foreach_items(vec![1, 2, 3, 4], 2, &tracker, |n| async move {
            if n % 2 == 0 {
                Err(Error::NetworkError(format!("item {}", n)))
            } else {
                Ok(n * 10)
            }
        })
        .await;
        drop(tracker);

        assert_eq!(results.len(), 4);
        assert_eq!(*results[0].as_ref().unwrap(), 10);
        assert!(results[1].is_err());
        assert_eq!(*results[2].as_ref().unwrap(), 30);

        let mut last = None;
        while let Some(progress) = rx.recv().await {
            last = Some(progress);
        }
        assert_eq!(
            last,
            Some(Progress {
                current: 4,
                total: 4
            })
        );
    }
}

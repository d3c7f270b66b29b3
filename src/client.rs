use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Map, Value, json};

use crate::config::{Config, default_config_path, default_datasets_dir};
use crate::dataset::{DatasetSummary, RemoteDataset};
use crate::error::{Error, Result};
use crate::identifier::IntoDatasetIdentifier;
use crate::util::{api_url_for, decode_response, default_base_url, urljoin};
use crate::validators::{ErrorHandler, name_taken, run_handlers, validation_error};

const INSUFFICIENT_STORAGE_CODE: &str = "INSUFFICIENT_REMAINING_STORAGE";

/// Client for the Darwin API.
///
/// Every request is blocking and issued once; failures are returned to the
/// caller as they happen.
#[derive(Debug, Clone)]
pub struct Client {
    config: Config,
    /// API root, e.g. `https://darwin.v7labs.com/api/`.
    url: String,
    base_url: String,
    default_team: Option<String>,

    http: HttpClient,
}

#[derive(Debug, serde::Deserialize)]
struct TokenInfo {
    selected_team: SelectedTeam,
    teams: Vec<TeamInfo>,
}

#[derive(Debug, serde::Deserialize)]
struct SelectedTeam {
    id: u64,
}

#[derive(Debug, serde::Deserialize)]
struct TeamInfo {
    id: u64,
    slug: String,
}

impl Client {
    /// Creates a client from a loaded configuration.
    ///
    /// Missing `global/base_url` falls back to `DARWIN_BASE_URL` or
    /// [`DEFAULT_BASE_URL`](crate::DEFAULT_BASE_URL), and a missing
    /// `global/api_endpoint` to the base URL plus `/api/`. `default_team`
    /// wins over `global/default_team`.
    pub fn new(config: Config, default_team: Option<&str>) -> Result<Self> {
        let http = build_http()?;
        Ok(Self::with_http(config, default_team, http))
    }

    fn with_http(config: Config, default_team: Option<&str>, http: HttpClient) -> Self {
        let base_url = config
            .get_str("global/base_url")
            .map(str::to_string)
            .unwrap_or_else(default_base_url);
        let url = config
            .get_str("global/api_endpoint")
            .map(str::to_string)
            .unwrap_or_else(|| api_url_for(&base_url));
        let default_team = default_team
            .or_else(|| config.get_str("global/default_team"))
            .map(str::to_string);

        Self {
            config,
            url,
            base_url,
            default_team,
            http,
        }
    }

    /// Creates a client from `~/.darwin/config.toml`.
    pub fn local(team: Option<&str>) -> Result<Self> {
        let path = default_config_path()
            .ok_or_else(|| Error::MissingConfig(PathBuf::from("~/.darwin/config.toml")))?;
        Self::from_config(&path, team)
    }

    pub fn from_config(path: &Path, team: Option<&str>) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingConfig(path.to_path_buf()));
        }
        let config = Config::load(path)?;
        Self::new(config, team)
    }

    /// Creates a client from a bare API key against the default server.
    ///
    /// The team is discovered through `GET /users/token_info`; the resulting
    /// configuration is kept in memory only.
    pub fn from_api_key(api_key: &str, datasets_dir: Option<&Path>) -> Result<Self> {
        Self::from_api_key_at(&default_base_url(), api_key, datasets_dir)
    }

    pub fn from_api_key_at(
        base_url: &str,
        api_key: &str,
        datasets_dir: Option<&Path>,
    ) -> Result<Self> {
        let datasets_dir = datasets_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(default_datasets_dir);
        let api_url = api_url_for(base_url);
        let http = build_http()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, api_key_header(api_key)?);

        let url = urljoin(&api_url, "/users/token_info");
        debug!("GET {url}");
        let resp = http.get(&url).headers(headers).send()?;
        if resp.status() != StatusCode::OK {
            return Err(Error::InvalidLogin);
        }

        let info: TokenInfo = resp.json()?;
        let team = info
            .teams
            .into_iter()
            .find(|t| t.id == info.selected_team.id)
            .map(|t| t.slug)
            .ok_or_else(|| {
                Error::UnexpectedResponse(format!(
                    "selected team {} is not in the token's team list",
                    info.selected_team.id
                ))
            })?;
        info!("API key authenticated for team {team}");

        let mut config = Config::new();
        config.set_team(&team, api_key, &datasets_dir)?;
        config.set_global(&api_url, base_url.trim_end_matches('/'))?;

        Ok(Self::with_http(config, Some(&team), http))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_team(&self) -> Option<&str> {
        self.default_team.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn team<'a>(&'a self, team: Option<&'a str>) -> Option<&'a str> {
        team.or(self.default_team.as_deref())
    }

    /// Request headers for `team` (or the default team).
    ///
    /// `Authorization` is only present when the team has a stored API key;
    /// otherwise the request goes out anonymously.
    pub fn headers(&self, team: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let api_key = self
            .team(team)
            .and_then(|t| self.config.get_team(t))
            .and_then(|t| t.api_key);
        if let Some(key) = api_key {
            headers.insert(AUTHORIZATION, api_key_header(&key)?);
        }
        Ok(headers)
    }

    /// `GET` returning the decoded body.
    ///
    /// 401 is [`Error::Unauthorized`], 404 is [`Error::NotFound`] with the
    /// full URL. Bodies that are not JSON come back as an object with
    /// `error`, `status_code` and `text`.
    pub fn get(&self, endpoint: &str, team: Option<&str>) -> Result<Value> {
        decode_response(self.get_raw(endpoint, team)?)
    }

    /// `GET` returning the transport response untouched, after the same
    /// 401/404 checks as [`Client::get`].
    pub fn get_raw(&self, endpoint: &str, team: Option<&str>) -> Result<Response> {
        let url = urljoin(&self.url, endpoint);
        debug!("GET {url}");
        let resp = self.http.get(&url).headers(self.headers(team)?).send()?;

        match resp.status() {
            StatusCode::UNAUTHORIZED => Err(Error::Unauthorized),
            StatusCode::NOT_FOUND => Err(Error::NotFound(url)),
            _ => Ok(resp),
        }
    }

    /// `PUT` with a JSON payload.
    ///
    /// A 429 becomes [`Error::InsufficientStorage`] only when the body's
    /// `errors.code` is `INSUFFICIENT_REMAINING_STORAGE`. Any other 429 is
    /// returned as a decoded body like a success would be.
    pub fn put(&self, endpoint: &str, payload: &Value, team: Option<&str>) -> Result<Value> {
        let url = urljoin(&self.url, endpoint);
        debug!("PUT {url}");
        let resp = self
            .http
            .put(&url)
            .headers(self.headers(team)?)
            .json(payload)
            .send()?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }

        let body = decode_response(resp)?;
        if status == StatusCode::TOO_MANY_REQUESTS
            && body.pointer("/errors/code").and_then(Value::as_str)
                == Some(INSUFFICIENT_STORAGE_CODE)
        {
            return Err(Error::InsufficientStorage);
        }
        Ok(body)
    }

    /// `POST` with a JSON payload (`{}` when `None`).
    ///
    /// On any status other than 200, `error_handlers` run in order with the
    /// status and decoded body; the first error they return is propagated.
    pub fn post(
        &self,
        endpoint: &str,
        payload: Option<&Value>,
        team: Option<&str>,
        error_handlers: &[&dyn ErrorHandler],
    ) -> Result<Value> {
        let empty = Value::Object(Map::new());
        let payload = payload.unwrap_or(&empty);

        let url = urljoin(&self.url, endpoint);
        debug!("POST {url}");
        let resp = self
            .http
            .post(&url)
            .headers(self.headers(team)?)
            .json(payload)
            .send()?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }

        let body = decode_response(resp)?;
        if status != StatusCode::OK {
            run_handlers(error_handlers, status, &body)?;
            warn!(
                "POST {} returned unexpected status {}: {}",
                url,
                status.as_u16(),
                body
            );
        }
        Ok(body)
    }

    /// Datasets of `team` (or the default team), in server order.
    pub fn list_remote_datasets(&self, team: Option<&str>) -> Result<Vec<RemoteDataset<'_>>> {
        let team = self.team(team).ok_or(Error::NoTeam)?;
        let payload = self.get("/datasets/", Some(team))?;
        let summaries: Vec<DatasetSummary> = serde_json::from_value(payload)?;

        Ok(summaries
            .into_iter()
            .map(|summary| RemoteDataset::new(self, team, summary))
            .collect())
    }

    /// Looks a dataset up by `team/slug` (team defaults to the client's).
    ///
    /// When several datasets share the slug, the first one listed is
    /// returned.
    pub fn get_remote_dataset(
        &self,
        identifier: impl IntoDatasetIdentifier,
    ) -> Result<RemoteDataset<'_>> {
        let identifier = identifier
            .into_identifier()?
            .with_default_team(self.default_team.as_deref());

        self.list_remote_datasets(identifier.team_slug.as_deref())?
            .into_iter()
            .find(|dataset| dataset.slug == identifier.dataset_slug)
            .ok_or_else(|| Error::NotFound(identifier.to_string()))
    }

    pub fn create_dataset(&self, name: &str, team: Option<&str>) -> Result<RemoteDataset<'_>> {
        let team = self.team(team).ok_or(Error::NoTeam)?;
        let handlers: [&dyn ErrorHandler; 2] = [&name_taken, &validation_error];
        let payload = self.post(
            "/datasets",
            Some(&json!({ "name": name })),
            Some(team),
            &handlers,
        )?;

        let summary = DatasetSummary::from_payload(payload)?;
        Ok(RemoteDataset::new(self, team, summary))
    }

    pub fn get_datasets_dir(&self, team: Option<&str>) -> Result<PathBuf> {
        let team = self.team(team).ok_or(Error::NoTeam)?;
        self.config
            .get_team(team)
            .map(|t| t.datasets_dir)
            .ok_or_else(|| Error::NotFound(format!("teams/{team}")))
    }

    pub fn set_datasets_dir(&mut self, datasets_dir: &Path, team: Option<&str>) -> Result<()> {
        let team = self.team(team).ok_or(Error::NoTeam)?.to_string();
        self.config.put(
            &format!("teams/{team}/datasets_dir"),
            datasets_dir.to_string_lossy().into_owned(),
        )
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Client(default_team={})",
            self.default_team.as_deref().unwrap_or("None")
        )
    }
}

fn build_http() -> Result<HttpClient> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("darwin-rs/{}", env!("CARGO_PKG_VERSION")))
            .unwrap_or(HeaderValue::from_static("darwin-rs")),
    );

    Ok(HttpClient::builder()
        .default_headers(default_headers)
        .build()?)
}

fn api_key_header(api_key: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("ApiKey {}", api_key.trim()))
        .map_err(|_| Error::InvalidApiKey)?;
    value.set_sensitive(true);
    Ok(value)
}

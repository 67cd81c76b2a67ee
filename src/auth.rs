//! Authentication for Google APIs.
//!
//! Two credential sources are supported:
//! - an installed-app OAuth client, whose tokens are persisted to a credential
//!   cache and reused across runs (interactive consent only when nothing usable
//!   is cached);
//! - a service account, exchanging a signed JWT for an access token.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::{DriveError, Result};
use crate::models::{
    ClientSecrets, ClientSecretsFile, ServiceAccountCredentials, StoredCredentials, TokenResponse,
};

/// Google OAuth2 token endpoint.
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Read-only Google Drive scope; mirroring never modifies the remote side.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Tokens closer than this to expiry are treated as expired.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration.
#[derive(Clone, Debug)]
struct CachedToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: SystemTime,
}

impl CachedToken {
    fn from_response(response: TokenResponse, previous_refresh: Option<String>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            expires_at: SystemTime::now() + Duration::from_secs(response.expires_in),
        }
    }

    /// An `expires_at` past the representable range is read as already expired.
    fn from_stored(stored: StoredCredentials) -> Self {
        let expires_at = UNIX_EPOCH
            .checked_add(Duration::from_secs(stored.expires_at))
            .unwrap_or_else(|| {
                warn!(
                    "Cached expiry {} is out of range; treating credentials as expired",
                    stored.expires_at
                );
                UNIX_EPOCH
            });
        Self {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            expires_at,
        }
    }

    fn to_stored(&self) -> StoredCredentials {
        let expires_at = self
            .expires_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        StoredCredentials {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at,
        }
    }

    fn is_fresh(&self) -> bool {
        self.expires_at > SystemTime::now() + EXPIRY_BUFFER
    }
}

enum CredentialSource {
    ServiceAccount(ServiceAccountCredentials),
    InstalledApp {
        secrets_path: PathBuf,
        cache_path: PathBuf,
    },
}

/// Authenticator for Google APIs.
#[derive(Clone)]
pub struct Authenticator {
    source: Arc<CredentialSource>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create an authenticator from a service account JSON file.
    pub fn from_service_account_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)?;
        Ok(Self::service_account(credentials))
    }

    /// Create an authenticator from service account credentials.
    pub fn service_account(credentials: ServiceAccountCredentials) -> Self {
        Self::with_source(CredentialSource::ServiceAccount(credentials), None)
    }

    /// Create an installed-app authenticator.
    ///
    /// A readable credential cache at `cache_path` is loaded immediately. The
    /// client secrets are only read once a token has to be refreshed or obtained
    /// interactively.
    pub fn installed_app(secrets_path: impl Into<PathBuf>, cache_path: impl Into<PathBuf>) -> Self {
        let cache_path = cache_path.into();
        let cached = load_cached_credentials(&cache_path);
        Self::with_source(
            CredentialSource::InstalledApp {
                secrets_path: secrets_path.into(),
                cache_path,
            },
            cached,
        )
    }

    fn with_source(source: CredentialSource, cached: Option<CachedToken>) -> Self {
        Self {
            source: Arc::new(source),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(cached)),
        }
    }

    /// Obtain the first access token, so that credential problems surface
    /// before any Drive request is made.
    pub async fn authenticate(&self) -> Result<()> {
        match self.get_access_token().await {
            Ok(_) => {
                info!("Authentication successful.");
                Ok(())
            }
            Err(e) => {
                error!("Failed to authenticate: {}", e);
                Err(DriveError::AuthenticationError(e.to_string()))
            }
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        let previous = {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_fresh() {
                    return Ok(token.access_token.clone());
                }
            }
            (*cached).clone()
        };

        let new_token = self.refresh_token(previous).await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    async fn refresh_token(&self, previous: Option<CachedToken>) -> Result<CachedToken> {
        match self.source.as_ref() {
            CredentialSource::ServiceAccount(credentials) => {
                self.service_account_token(credentials).await
            }
            CredentialSource::InstalledApp {
                secrets_path,
                cache_path,
            } => {
                let secrets = load_client_secrets(secrets_path)?;
                let refresh = previous.and_then(|t| t.refresh_token);

                let token = match refresh {
                    Some(refresh) => match self.refresh_with(&secrets, &refresh).await {
                        Ok(token) => {
                            info!("Refreshed expired credentials.");
                            token
                        }
                        Err(e) => {
                            warn!("Credential refresh failed ({}); starting authorization", e);
                            self.interactive_flow(&secrets).await?
                        }
                    },
                    None => self.interactive_flow(&secrets).await?,
                };

                save_cached_credentials(cache_path, &token).await?;
                Ok(token)
            }
        }
    }

    /// Exchange a signed JWT assertion for an access token.
    async fn service_account_token(
        &self,
        credentials: &ServiceAccountCredentials,
    ) -> Result<CachedToken> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| DriveError::AuthenticationError(e.to_string()))?
            .as_secs();
        let token_uri = credentials.token_uri.as_deref().unwrap_or(TOKEN_URI);

        let claims = Claims {
            iss: credentials.client_email.clone(),
            scope: DRIVE_SCOPE.to_string(),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600, // 1 hour
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];
        let response = self.exchange(token_uri, &params).await?;
        Ok(CachedToken::from_response(response, None))
    }

    async fn refresh_with(&self, secrets: &ClientSecrets, refresh_token: &str) -> Result<CachedToken> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
        ];
        let response = self.exchange(&secrets.token_uri, &params).await?;
        Ok(CachedToken::from_response(
            response,
            Some(refresh_token.to_string()),
        ))
    }

    /// Run the loopback consent flow: print the consent URL, wait for the
    /// browser redirect carrying the authorization code, then exchange it.
    async fn interactive_flow(&self, secrets: &ClientSecrets) -> Result<CachedToken> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}/", port);
        let url = authorization_url(secrets, &redirect_uri)?;

        info!("Open this URL in your browser to authorize access:\n{}", url);

        let code = wait_for_code(listener).await?;
        debug!("Received authorization code on port {}", port);

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        let response = self.exchange(&secrets.token_uri, &params).await?;
        Ok(CachedToken::from_response(response, None))
    }

    async fn exchange(&self, token_uri: &str, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self.client.post(token_uri).form(params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}

fn load_client_secrets(path: &Path) -> Result<ClientSecrets> {
    let content = fs::read_to_string(path).map_err(|e| {
        DriveError::AuthenticationError(format!(
            "cannot read client secrets {}: {}",
            path.display(),
            e
        ))
    })?;
    let file: ClientSecretsFile = serde_json::from_str(&content)?;
    file.into_secrets().ok_or_else(|| {
        DriveError::AuthenticationError(format!(
            "{} has no \"installed\" or \"web\" client",
            path.display()
        ))
    })
}

fn load_cached_credentials(path: &Path) -> Option<CachedToken> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<StoredCredentials>(&content) {
        Ok(stored) => {
            debug!("Loaded cached credentials from {}", path.display());
            Some(CachedToken::from_stored(stored))
        }
        Err(e) => {
            warn!("Ignoring unreadable credential cache {}: {}", path.display(), e);
            None
        }
    }
}

async fn save_cached_credentials(path: &Path, token: &CachedToken) -> Result<()> {
    let json = serde_json::to_string_pretty(&token.to_stored())?;
    tokio::fs::write(path, json).await?;
    info!("Credentials saved to {}", path.display());
    Ok(())
}

/// Build the consent URL for the installed-app flow.
fn authorization_url(secrets: &ClientSecrets, redirect_uri: &str) -> Result<Url> {
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", DRIVE_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| DriveError::AuthorizationFlow(format!("invalid auth_uri: {}", e)))
}

/// Query string of the browser redirect after consent.
#[derive(Debug, Default, Deserialize)]
struct RedirectParams {
    code: Option<String>,
    error: Option<String>,
}

/// What the browser sent to the loopback listener.
#[derive(Debug, PartialEq, Eq)]
enum Redirect {
    Code(String),
    Denied(String),
    Unrelated,
}

impl From<RedirectParams> for Redirect {
    fn from(params: RedirectParams) -> Self {
        match (params.code, params.error) {
            (Some(code), _) if !code.is_empty() => Redirect::Code(code),
            (_, Some(error)) => Redirect::Denied(error),
            _ => Redirect::Unrelated,
        }
    }
}

async fn receive_redirect(
    State(tx): State<mpsc::Sender<Redirect>>,
    Query(params): Query<RedirectParams>,
) -> (StatusCode, &'static str) {
    let redirect = Redirect::from(params);
    let reply = match redirect {
        Redirect::Code(_) => (
            StatusCode::OK,
            "Authentication complete. You may close this window.",
        ),
        Redirect::Denied(_) => (StatusCode::OK, "Authorization was denied."),
        Redirect::Unrelated => return (StatusCode::BAD_REQUEST, "Missing authorization code."),
    };
    // Only the first answer counts; later ones find the channel full.
    let _ = tx.try_send(redirect);
    reply
}

/// Serve the redirect URI until the browser delivers a code or a denial.
///
/// Any other path (`/favicon.ico` and the like) is answered with 404 by the
/// router and does not end the wait.
async fn wait_for_code(listener: TcpListener) -> Result<String> {
    let (tx, mut rx) = mpsc::channel(1);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let app = Router::new()
        .route("/", get(receive_redirect))
        .with_state(tx);

    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = stop_rx.await;
        });
        if let Err(e) = server.await {
            debug!("Loopback listener stopped: {}", e);
        }
    });

    let redirect = rx.recv().await;
    let _ = stop_tx.send(());

    match redirect {
        Some(Redirect::Code(code)) => Ok(code),
        Some(Redirect::Denied(reason)) => Err(DriveError::AuthorizationFlow(reason)),
        _ => Err(DriveError::AuthorizationFlow(
            "loopback listener closed before a code arrived".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> ClientSecrets {
        ClientSecrets {
            client_id: "client-1.apps.googleusercontent.com".to_string(),
            client_secret: "s3cret".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: TOKEN_URI.to_string(),
        }
    }

    #[test]
    fn test_claims_serialization() {
        let claims = Claims {
            iss: "test@example.iam.gserviceaccount.com".to_string(),
            scope: DRIVE_SCOPE.to_string(),
            aud: TOKEN_URI.to_string(),
            iat: 1234567890,
            exp: 1234571490,
        };

        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("test@example.iam.gserviceaccount.com"));
        assert!(json.contains(DRIVE_SCOPE));
    }

    #[test]
    fn test_authorization_url_carries_offline_access() {
        let url = authorization_url(&secrets(), "http://127.0.0.1:8765/").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://127.0.0.1:8765/".to_string()
        )));
    }

    fn params(code: Option<&str>, error: Option<&str>) -> RedirectParams {
        RedirectParams {
            code: code.map(str::to_string),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_redirect_classification() {
        assert_eq!(
            Redirect::from(params(Some("4/0Abc"), None)),
            Redirect::Code("4/0Abc".to_string())
        );
        assert_eq!(
            Redirect::from(params(None, Some("access_denied"))),
            Redirect::Denied("access_denied".to_string())
        );
        assert_eq!(Redirect::from(params(Some(""), None)), Redirect::Unrelated);
        assert_eq!(Redirect::from(RedirectParams::default()), Redirect::Unrelated);
    }

    #[tokio::test]
    async fn test_wait_for_code_skips_unrelated_requests() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let waiting = tokio::spawn(wait_for_code(listener));
        let client = Client::new();

        let favicon = client
            .get(format!("{}/favicon.ico", base))
            .send()
            .await
            .unwrap();
        assert_eq!(favicon.status(), reqwest::StatusCode::NOT_FOUND);

        let no_code = client.get(format!("{}/?state=xyz", base)).send().await.unwrap();
        assert_eq!(no_code.status(), reqwest::StatusCode::BAD_REQUEST);

        let reply = client
            .get(format!("{}/?code=4%2F0Abc&scope=drive", base))
            .send()
            .await
            .unwrap();
        assert!(reply.status().is_success());

        assert_eq!(waiting.await.unwrap().unwrap(), "4/0Abc");
    }

    #[tokio::test]
    async fn test_wait_for_code_reports_denial() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let waiting = tokio::spawn(wait_for_code(listener));

        Client::new()
            .get(format!("{}/?error=access_denied", base))
            .send()
            .await
            .unwrap();

        match waiting.await.unwrap() {
            Err(DriveError::AuthorizationFlow(reason)) => assert_eq!(reason, "access_denied"),
            other => panic!("expected AuthorizationFlow, got {:?}", other),
        }
    }

    #[test]
    fn test_cached_token_freshness() {
        let stale = CachedToken::from_stored(StoredCredentials {
            access_token: "old".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: 0,
        });
        assert!(!stale.is_fresh());

        let fresh = CachedToken {
            access_token: "new".to_string(),
            refresh_token: None,
            expires_at: SystemTime::now() + Duration::from_secs(3600),
        };
        assert!(fresh.is_fresh());
        assert_eq!(fresh.to_stored().access_token, "new");
    }

    #[test]
    fn test_out_of_range_expiry_reads_as_expired() {
        let token = CachedToken::from_stored(StoredCredentials {
            access_token: "edited".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: u64::MAX,
        });
        assert_eq!(token.expires_at, UNIX_EPOCH);
        assert!(!token.is_fresh());
        assert_eq!(token.refresh_token.as_deref(), Some("refresh"));
    }
}

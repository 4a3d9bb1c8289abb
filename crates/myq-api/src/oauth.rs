// OAuth2 authorization-code + PKCE flow against the MyQ identity service.
//
// The service has no first-party client registration for third parties, so
// login drives the hosted form the mobile app uses: fetch the authorize
// page, post credentials back to it with the form's hidden verification
// token, then walk the redirect chain to the app-scheme callback that
// carries the authorization code.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use regex::Regex;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};
use url::Url;

use crate::endpoints::{ApiEndpoints, OAUTH_CLIENT_ID, OAUTH_REDIRECT_URI, OAUTH_SCOPE};
use crate::error::Error;

/// Maximum redirect hops to walk before giving up on the callback.
const MAX_REDIRECT_HOPS: usize = 8;

/// A PKCE verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub(crate) struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh verifier (base64url of 32 random bytes) and the
    /// matching S256 challenge.
    pub(crate) fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        Self::from_verifier(verifier)
    }

    fn from_verifier(verifier: String) -> Self {
        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(digest);
        Self {
            verifier,
            challenge,
        }
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// Extract the hidden `__RequestVerificationToken` value from the hosted
/// login form's HTML.
pub(crate) fn scrape_verification_token(html: &str) -> Result<String, Error> {
    // Attribute order varies across form revisions; accept either.
    let patterns = [
        r#"name="__RequestVerificationToken"[^>]*\bvalue="([^"]+)""#,
        r#"value="([^"]+)"[^>]*\bname="__RequestVerificationToken""#,
    ];

    for pattern in patterns {
        let re = Regex::new(pattern).expect("static regex");
        if let Some(caps) = re.captures(html) {
            return Ok(caps[1].to_owned());
        }
    }

    Err(Error::OAuthFlow {
        stage: "login-form",
        message: "verification token not found in login form".into(),
    })
}

/// Run the full authorization-code flow and return the token response.
///
/// `page_client` must follow redirects and share a cookie jar with
/// `raw_client`, which must NOT follow redirects.
pub(crate) async fn authorization_code_flow(
    page_client: &reqwest::Client,
    raw_client: &reqwest::Client,
    endpoints: &ApiEndpoints,
    username: &str,
    password: &SecretString,
) -> Result<TokenResponse, Error> {
    let pkce = PkcePair::generate();

    // Step 1: fetch the hosted login form, collecting session cookies.
    let authorize = endpoints.authorize_url();
    debug!(%authorize, "requesting authorization page");

    let resp = page_client
        .get(authorize)
        .query(&[
            ("client_id", OAUTH_CLIENT_ID),
            ("code_challenge", &pkce.challenge),
            ("code_challenge_method", "S256"),
            ("redirect_uri", OAUTH_REDIRECT_URI),
            ("response_type", "code"),
            ("scope", OAUTH_SCOPE),
        ])
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::ServiceUnavailable {
            message: format!("authorize endpoint returned HTTP {status}"),
        });
    }

    // The form posts back to the URL it was served from.
    let form_url = resp.url().clone();
    let html = resp.text().await?;
    let token = scrape_verification_token(&html)?;

    // Step 2: submit credentials. A 200 here means the form re-rendered
    // with a validation error -- the service's way of saying "rejected".
    debug!(%form_url, "submitting credentials to login form");

    let resp = raw_client
        .post(form_url.clone())
        .form(&[
            ("Email", username),
            ("Password", password.expose_secret()),
            ("__RequestVerificationToken", &token),
        ])
        .send()
        .await?;

    let status = resp.status();
    if status.is_success() {
        return Err(Error::BadCredentials {
            message: "login form rejected the supplied credentials".into(),
        });
    }
    if !status.is_redirection() {
        return Err(Error::ServiceUnavailable {
            message: format!("login form returned HTTP {status}"),
        });
    }

    // Step 3: walk the redirect chain to the app-scheme callback.
    let code = follow_to_callback(raw_client, &form_url, &resp).await?;

    // Step 4: exchange the code + verifier for tokens.
    exchange_code(raw_client, endpoints, &code, &pkce.verifier).await
}

/// Exchange a refresh token for a new token pair.
pub(crate) async fn refresh_token_flow(
    raw_client: &reqwest::Client,
    endpoints: &ApiEndpoints,
    refresh_token: &SecretString,
) -> Result<TokenResponse, Error> {
    debug!("exchanging refresh token");

    let resp = raw_client
        .post(endpoints.token_url())
        .form(&[
            ("client_id", OAUTH_CLIENT_ID),
            ("grant_type", "refresh_token"),
            ("redirect_uri", OAUTH_REDIRECT_URI),
            ("refresh_token", refresh_token.expose_secret()),
            ("scope", OAUTH_SCOPE),
        ])
        .send()
        .await?;

    parse_token_response(resp).await
}

/// Follow `Location` headers (GET each hop) until one points at the
/// registered app-scheme redirect URI, then pull `code` out of its query.
async fn follow_to_callback(
    raw_client: &reqwest::Client,
    start: &Url,
    first: &reqwest::Response,
) -> Result<String, Error> {
    let mut base = start.clone();
    let mut location = location_header(first)?;

    for _ in 0..MAX_REDIRECT_HOPS {
        if location.starts_with(OAUTH_REDIRECT_URI) {
            return extract_code(&location);
        }

        // Relative Locations resolve against the URL that issued them.
        let next = base.join(&location)?;
        trace!(%next, "following redirect");

        let resp = raw_client.get(next.clone()).send().await?;
        if !resp.status().is_redirection() {
            return Err(Error::OAuthFlow {
                stage: "redirect-chain",
                message: format!("expected redirect, got HTTP {}", resp.status()),
            });
        }

        base = next;
        location = location_header(&resp)?;
    }

    Err(Error::OAuthFlow {
        stage: "redirect-chain",
        message: format!("no callback redirect within {MAX_REDIRECT_HOPS} hops"),
    })
}

fn location_header(resp: &reqwest::Response) -> Result<String, Error> {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .ok_or(Error::OAuthFlow {
            stage: "redirect-chain",
            message: "redirect response missing Location header".into(),
        })
}

fn extract_code(location: &str) -> Result<String, Error> {
    // The app-scheme URI parses as a URL; code is a query parameter.
    let url = Url::parse(location).map_err(|_| Error::OAuthFlow {
        stage: "callback",
        message: format!("unparseable callback URI: {location}"),
    })?;

    url.query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .ok_or(Error::OAuthFlow {
            stage: "callback",
            message: "callback redirect carried no authorization code".into(),
        })
}

async fn exchange_code(
    raw_client: &reqwest::Client,
    endpoints: &ApiEndpoints,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse, Error> {
    debug!("exchanging authorization code for tokens");

    let resp = raw_client
        .post(endpoints.token_url())
        .form(&[
            ("client_id", OAUTH_CLIENT_ID),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", OAUTH_REDIRECT_URI),
            ("scope", OAUTH_SCOPE),
        ])
        .send()
        .await?;

    parse_token_response(resp).await
}

async fn parse_token_response(resp: reqwest::Response) -> Result<TokenResponse, Error> {
    let status = resp.status();

    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::BadCredentials {
            message: format!("token endpoint rejected the grant (HTTP {status}): {body}"),
        });
    }
    if !status.is_success() {
        return Err(Error::ServiceUnavailable {
            message: format!("token endpoint returned HTTP {status}"),
        });
    }

    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| Error::deserialization(&e, &body))
}

//! Session acquisition against the carrier dashboard
//!
//! Performs the authenticated login dance over HTTP: fetch the login page,
//! discover the credential form with prioritized heuristics, submit it, and
//! confirm the post-login markers before navigating to the live-calls view.
//! Every attempt is independent and uses a fresh client + cookie jar; the
//! jar captured on success serves all later out-of-band fetches.
//!
//! Field discovery is kept as pure functions over parsed HTML so the
//! heuristics are testable without a live dashboard.

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{info, warn};

use crate::infrastructure::config::DashboardConfig;
use crate::infrastructure::http_client::{HttpClient, HttpClientConfig};

/// Substrings that identify the identity (username/email) input when no
/// exact type match exists. Checked case-insensitively against the input's
/// placeholder, name and id attributes, in priority order.
const IDENTITY_KEYWORDS: &[&str] = &["email", "user", "login"];

/// Markers whose presence in the post-submit page confirms the login landed.
const POST_LOGIN_MARKERS: &[&str] = &["Dashboard", "Account Code"];

/// Why a single login attempt failed.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("identity input field not found on login page")]
    IdentityFieldNotFound,

    #[error("password input field not found on login page")]
    SecretFieldNotFound,

    #[error("no submit control found on login page")]
    SubmitControlNotFound,

    #[error("post-login confirmation failed at {url}")]
    LoginNotConfirmed { url: String },

    #[error("navigation failed: {0}")]
    Navigation(#[from] anyhow::Error),
}

/// An authenticated dashboard session: the HTTP client with its captured
/// cookie jar plus the resolved view URLs. Never recreated mid-run.
pub struct Session {
    http: HttpClient,
    base_url: String,
    live_calls_url: String,
}

impl Session {
    /// Read the current markup of the live-calls view.
    pub async fn read_page(&self) -> Result<String> {
        self.http.fetch_html_string(&self.live_calls_url).await
    }

    /// Handle for the periodic refresh task. Shares this session's client
    /// (and therefore its cookie jar) without taking ownership of it.
    pub fn page_refresher(&self) -> PageRefresher {
        PageRefresher {
            http: self.http.clone(),
            url: self.live_calls_url.clone(),
        }
    }

    /// Shared cookie jar captured at login. Out-of-band requests (recording
    /// fetches) serialize their own `Cookie` header from it.
    pub fn cookie_jar(&self) -> std::sync::Arc<reqwest::cookie::Jar> {
        self.http.cookie_jar()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Reload handle used by the periodic refresh timer. A reload may race an
/// in-flight page read; the dedup registry, not scan atomicity, keeps
/// dispatch at-most-once.
pub struct PageRefresher {
    http: HttpClient,
    url: String,
}

impl PageRefresher {
    /// Full page reload; the body is discarded.
    pub async fn reload(&self) -> Result<()> {
        self.http.fetch_response(&self.url).await?;
        Ok(())
    }
}

/// The login form as discovered on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Form action, as written in the markup (may be relative or absent).
    pub action: Option<String>,
    /// Name of the identity input.
    pub identity_field: String,
    /// Name of the secret input.
    pub secret_field: String,
    /// Hidden inputs carried through on submit (CSRF tokens and the like).
    pub hidden_fields: Vec<(String, String)>,
}

/// Establishes authenticated sessions with bounded retries.
pub struct SessionManager {
    dashboard: DashboardConfig,
}

impl SessionManager {
    pub fn new(dashboard: DashboardConfig) -> Self {
        Self { dashboard }
    }

    /// Attempt login up to `max_retries` times. Returns `None` once every
    /// attempt has failed; attempt-level causes are logged at warn level.
    pub async fn login(&self, max_retries: u32) -> Option<Session> {
        for attempt in 1..=max_retries.max(1) {
            info!("Login attempt {}/{}", attempt, max_retries.max(1));
            match self.attempt_login().await {
                Ok(session) => {
                    info!("Login confirmed, live-calls view ready");
                    return Some(session);
                }
                Err(e) => {
                    // The failed attempt's client and jar drop here; the
                    // next attempt starts from a fresh resource.
                    warn!("Login attempt {} failed: {}", attempt, e);
                }
            }
        }
        None
    }

    /// One independent login attempt over a fresh client.
    async fn attempt_login(&self) -> Result<Session, SessionError> {
        let http = HttpClient::with_config(&HttpClientConfig {
            timeout_seconds: self.dashboard.request_timeout_seconds,
            user_agent: self.dashboard.user_agent.clone(),
        })?;

        let login_url = self.dashboard.login_url();
        let login_page = http.fetch_html_string(&login_url).await?;
        let form = discover_login_form(&login_page)?;

        let mut fields = form.hidden_fields.clone();
        fields.push((form.identity_field.clone(), self.dashboard.username.clone()));
        fields.push((form.secret_field.clone(), self.dashboard.password.clone()));

        let action_url = resolve_action(form.action.as_deref(), &login_url);
        let response = http.post_form(&action_url, &fields).await?;

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| SessionError::Navigation(anyhow::anyhow!(e)))?;

        if !login_confirmed(&final_url, &body, self.dashboard.host().as_deref()) {
            return Err(SessionError::LoginNotConfirmed { url: final_url });
        }

        // Navigate to the live-calls view; the jar now carries the
        // session cookies for the rest of the run.
        let live_calls_url = self.dashboard.live_calls_url();
        http.fetch_response(&live_calls_url).await?;

        Ok(Session {
            http,
            base_url: self.dashboard.base_url.clone(),
            live_calls_url,
        })
    }
}

/// Discover the login form: identity field, secret field and a submit
/// control must all be present or the attempt fails.
pub fn discover_login_form(page_html: &str) -> Result<LoginForm, SessionError> {
    let document = Html::parse_document(page_html);

    let identity = find_identity_field(&document).ok_or(SessionError::IdentityFieldNotFound)?;
    let secret = find_secret_field(&document).ok_or(SessionError::SecretFieldNotFound)?;
    if !has_submit_control(&document) {
        return Err(SessionError::SubmitControlNotFound);
    }

    Ok(LoginForm {
        action: form_action(&document),
        identity_field: identity,
        secret_field: secret,
        hidden_fields: hidden_inputs(&document),
    })
}

/// Locate the identity input by prioritized heuristics: exact
/// `type="email"` first, then a case-insensitive substring match on
/// placeholder/name/id. Returns the input's submit name.
pub fn find_identity_field(document: &Html) -> Option<String> {
    let inputs = Selector::parse("input").ok()?;

    // Strategy 1: exact type match.
    for input in document.select(&inputs) {
        if attr_eq(&input, "type", "email") {
            if let Some(name) = submit_name(&input) {
                return Some(name);
            }
        }
    }

    // Strategy 2: keyword substring in placeholder/name/id.
    for keyword in IDENTITY_KEYWORDS {
        for input in document.select(&inputs) {
            if attr_eq(&input, "type", "password") || attr_eq(&input, "type", "hidden") {
                continue;
            }
            let matches = ["placeholder", "name", "id"].iter().any(|attr| {
                input
                    .value()
                    .attr(attr)
                    .is_some_and(|v| v.to_ascii_lowercase().contains(keyword))
            });
            if matches {
                if let Some(name) = submit_name(&input) {
                    return Some(name);
                }
            }
        }
    }

    None
}

/// Locate the secret input by exact type match only.
pub fn find_secret_field(document: &Html) -> Option<String> {
    let inputs = Selector::parse("input").ok()?;
    document
        .select(&inputs)
        .find(|input| attr_eq(input, "type", "password"))
        .and_then(|input| submit_name(&input))
}

/// A submit control exists: a submit-typed button/input, or failing that a
/// control whose visible text reads "Sign In".
pub fn has_submit_control(document: &Html) -> bool {
    if let Ok(typed) = Selector::parse("button[type='submit'], input[type='submit']") {
        if document.select(&typed).next().is_some() {
            return true;
        }
    }

    if let Ok(controls) = Selector::parse("button, a, input[type='button']") {
        for control in document.select(&controls) {
            let text: String = control.text().collect::<String>().to_ascii_lowercase();
            let value = control
                .value()
                .attr("value")
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            if text.contains("sign in") || value.contains("sign in") {
                return true;
            }
        }
    }

    false
}

/// Post-login confirmation: still on the target domain AND a known marker
/// present in the page content. Anything else is a failed login.
pub fn login_confirmed(final_url: &str, body: &str, expected_host: Option<&str>) -> bool {
    let on_domain = match (expected_host, url::Url::parse(final_url)) {
        (Some(host), Ok(parsed)) => parsed.host_str().is_some_and(|h| h == host),
        _ => false,
    };

    on_domain && POST_LOGIN_MARKERS.iter().any(|m| body.contains(m))
}

fn form_action(document: &Html) -> Option<String> {
    let form = Selector::parse("form").ok()?;
    document
        .select(&form)
        .next()
        .and_then(|f| f.value().attr("action"))
        .map(str::to_string)
        .filter(|a| !a.is_empty())
}

fn hidden_inputs(document: &Html) -> Vec<(String, String)> {
    let Ok(hidden) = Selector::parse("input[type='hidden']") else {
        return Vec::new();
    };
    document
        .select(&hidden)
        .filter_map(|input| {
            let name = input.value().attr("name")?.to_string();
            let value = input.value().attr("value").unwrap_or_default().to_string();
            Some((name, value))
        })
        .collect()
}

fn resolve_action(action: Option<&str>, login_url: &str) -> String {
    match action {
        None => login_url.to_string(),
        Some(action) => match url::Url::parse(login_url).and_then(|base| base.join(action)) {
            Ok(resolved) => resolved.to_string(),
            Err(_) => login_url.to_string(),
        },
    }
}

fn attr_eq(element: &ElementRef<'_>, attr: &str, expected: &str) -> bool {
    element
        .value()
        .attr(attr)
        .is_some_and(|v| v.eq_ignore_ascii_case(expected))
}

fn submit_name(element: &ElementRef<'_>) -> Option<String> {
    element
        .value()
        .attr("name")
        .or_else(|| element.value().attr("id"))
        .map(str::to_string)
}

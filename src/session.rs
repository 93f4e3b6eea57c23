//! Session Provider: cookie persistence for the authenticated platform session.
//!
//! Login happens outside this crate. The jar itself is a `cookie_store`
//! shared with the page driver's HTTP client; this module only moves it in
//! and out of the Netscape cookie file the media downloader reads.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use cookie_store::{CookieDomain, CookieExpiration, CookieStore};
use reqwest_cookie_store::CookieStoreMutex;
use thiserror::Error;
use tokio::fs;
use url::Url;

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File\n\
# http://www.netscape.com/newsref/std/cookie_spec.html\n\
# This is a generated file!  Do not edit.\n";

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("read cookie file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write cookie file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Persists the current credentials and returns the artifact path.
    async fn refresh(&self) -> Result<PathBuf, SessionError>;
}

/// One line of a Netscape cookie file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieLine {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Unix timestamp; `0` for session cookies.
    pub expires: i64,
    pub name: String,
    pub value: String,
}

impl CookieLine {
    fn from_stored(cookie: &cookie_store::Cookie<'_>) -> Option<Self> {
        let (domain, include_subdomains) = match &cookie.domain {
            CookieDomain::HostOnly(host) => (host.clone(), false),
            CookieDomain::Suffix(suffix) => (format!(".{suffix}"), true),
            CookieDomain::NotPresent | CookieDomain::Empty => return None,
        };
        let expires = match &cookie.expires {
            CookieExpiration::AtUtc(at) => at.unix_timestamp(),
            CookieExpiration::SessionEnd => 0,
        };
        let path: &str = cookie.path.as_ref();
        Some(Self {
            domain,
            include_subdomains,
            path: path.to_owned(),
            secure: cookie.secure().unwrap_or(false),
            http_only: cookie.http_only().unwrap_or(false),
            expires,
            name: cookie.name().to_owned(),
            value: cookie.value().to_owned(),
        })
    }

    /// The `Set-Cookie` header that recreates this line, plus the URL it is
    /// received from.
    fn as_set_cookie(&self) -> Option<(String, Url)> {
        let host = self.domain.trim_start_matches('.');
        let origin = Url::parse(&format!("https://{host}{}", self.path)).ok()?;

        let mut builder = cookie::Cookie::build((self.name.as_str(), self.value.as_str()))
            .path(self.path.as_str())
            .secure(self.secure)
            .http_only(self.http_only);
        if self.include_subdomains {
            builder = builder.domain(host);
        }
        if self.expires != 0 {
            let at = cookie::time::OffsetDateTime::from_unix_timestamp(self.expires).ok()?;
            builder = builder.expires(at);
        }
        Some((builder.build().to_string(), origin))
    }
}

/// Parses a Netscape cookie file, ignoring comments and malformed lines.
pub fn parse_netscape(contents: &str) -> Vec<CookieLine> {
    contents
        .lines()
        .filter_map(|line| {
            let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
                Some(rest) => (rest, true),
                None => (line, false),
            };
            if line.trim().is_empty() || line.starts_with('#') {
                return None;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let [domain, include_subdomains, path, secure, expires, name, value] =
                fields.as_slice()
            else {
                return None;
            };
            Some(CookieLine {
                domain: (*domain).to_owned(),
                include_subdomains: include_subdomains.eq_ignore_ascii_case("TRUE"),
                path: (*path).to_owned(),
                secure: secure.eq_ignore_ascii_case("TRUE"),
                http_only,
                expires: expires.parse().unwrap_or(0),
                name: (*name).to_owned(),
                value: (*value).to_owned(),
            })
        })
        .collect()
}

pub fn to_netscape(cookies: &[CookieLine]) -> String {
    let mut out = String::from(NETSCAPE_HEADER);
    for cookie in cookies {
        let prefix = if cookie.http_only { HTTP_ONLY_PREFIX } else { "" };
        out.push_str(&format!(
            "{prefix}{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            cookie.domain,
            bool_field(cookie.include_subdomains),
            cookie.path,
            bool_field(cookie.secure),
            cookie.expires.max(0),
            cookie.name,
            cookie.value,
        ));
    }
    out
}

fn bool_field(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}

/// Cookie jar backed by a Netscape cookie file.
#[derive(Debug)]
pub struct CookieFileSession {
    path: PathBuf,
    store: Arc<CookieStoreMutex>,
}

impl CookieFileSession {
    /// Seeds a jar with `lines`; expired or rejected lines are dropped.
    pub fn new(path: impl Into<PathBuf>, lines: &[CookieLine]) -> Self {
        let now = chrono::Utc::now().timestamp();
        let mut store = CookieStore::default();
        for line in lines {
            if line.expires != 0 && line.expires <= now {
                continue;
            }
            let Some((header, origin)) = line.as_set_cookie() else {
                tracing::debug!(name = %line.name, domain = %line.domain, "unusable cookie line");
                continue;
            };
            if let Err(err) = store.parse(&header, &origin) {
                tracing::debug!(name = %line.name, domain = %line.domain, error = %err, "cookie rejected");
            }
        }
        Self {
            path: path.into(),
            store: Arc::new(CookieStoreMutex::new(store)),
        }
    }

    /// Loads `path`; a missing file starts an empty jar.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let lines = match fs::read_to_string(&path).await {
            Ok(contents) => parse_netscape(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "cookie file not found; starting without a session");
                Vec::new()
            }
            Err(source) => return Err(SessionError::Read { path, source }),
        };
        tracing::debug!(path = %path.display(), cookies = lines.len(), "loaded cookies");
        Ok(Self::new(path, &lines))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The jar, for `reqwest::ClientBuilder::cookie_provider`.
    pub fn cookie_store(&self) -> Arc<CookieStoreMutex> {
        Arc::clone(&self.store)
    }

    /// Unexpired cookies as Netscape lines.
    pub fn cookies(&self) -> Vec<CookieLine> {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store
            .iter_unexpired()
            .filter_map(CookieLine::from_stored)
            .collect()
    }

    /// `Cookie` header value the jar would send to `url`.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        let pairs: Vec<String> = store
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Applies one `Set-Cookie` header received from `url`.
    pub fn absorb_set_cookie(&self, url: &Url, header: &str) {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = store.parse(header, url) {
            tracing::debug!(%url, error = %err, "set-cookie rejected");
        }
    }
}

#[async_trait]
impl SessionProvider for CookieFileSession {
    async fn refresh(&self) -> Result<PathBuf, SessionError> {
        let contents = to_netscape(&self.cookies());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| SessionError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let tmp_path = self
            .path
            .with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp_path, contents)
            .await
            .map_err(|source| SessionError::Write {
                path: tmp_path.clone(),
                source,
            })?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| SessionError::Write {
                path: self.path.clone(),
                source,
            })?;

        Ok(self.path.clone())
    }
}

//! Browser fingerprint and per-endpoint header templates.
//!
//! A [`HeaderProfile`] is picked once per process run and handed to the
//! [`Fetcher`](crate::fetch::client::Fetcher) so every request in a run
//! presents the same desktop browser. Templates per [`RequestKind`] layer the
//! accept/fetch-metadata headers each endpoint expects on top of it.

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use tracing::debug;

/// What the outbound request expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// XHR-style JSON endpoint (catalog search).
    Json,
    /// Top-level document navigation (promotions page).
    Html,
    /// Plain file download (CSV feed).
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Windows,
    MacOs,
    Linux,
}

impl Browser {
    /// Inclusive major version window to sample from.
    fn versions(self) -> (u32, u32) {
        match self {
            Browser::Chrome => (100, 130),
            Browser::Firefox => (100, 131),
            Browser::Safari => (14, 17),
        }
    }

    fn supports(self, os: Os) -> bool {
        !matches!((self, os), (Browser::Safari, Os::Windows | Os::Linux))
    }
}

impl Os {
    fn platform_hint(self) -> &'static str {
        match self {
            Os::Windows => "\"Windows\"",
            Os::MacOs => "\"macOS\"",
            Os::Linux => "\"Linux\"",
        }
    }
}

const ACCEPT_LANGUAGE: &str = "en-CA,en;q=0.9,fr;q=0.8,en-US;q=0.7";
const ACCEPT_JSON: &str = "application/json, text/javascript, */*; q=0.01";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderProfile {
    pub browser: Browser,
    pub os: Os,
    pub major_version: u32,
    user_agent: String,
}

impl HeaderProfile {
    pub fn new(browser: Browser, os: Os, major_version: u32) -> Self {
        let user_agent = build_user_agent(browser, os, major_version);
        Self {
            browser,
            os,
            major_version,
            user_agent,
        }
    }

    /// Pick a desktop browser/OS pair and a version inside its window.
    pub fn random() -> Self {
        Self::random_with(&mut rand::thread_rng())
    }

    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let os = *[Os::Windows, Os::MacOs, Os::Linux]
            .choose(rng)
            .unwrap_or(&Os::Windows);
        let candidates: Vec<Browser> = [Browser::Chrome, Browser::Firefox, Browser::Safari]
            .into_iter()
            .filter(|b| b.supports(os))
            .collect();
        let browser = *candidates.choose(rng).unwrap_or(&Browser::Chrome);
        let (lo, hi) = browser.versions();
        let profile = Self::new(browser, os, rng.gen_range(lo..=hi));
        debug!(profile = %profile, "generated header profile");
        profile
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Full header set for one request of `kind`, optionally with a referer.
    pub fn headers(&self, kind: RequestKind, referer: Option<&str>) -> Result<HeaderMap> {
        let mut pairs: Vec<(&'static str, String)> = vec![
            ("user-agent", self.user_agent.clone()),
            ("accept-language", ACCEPT_LANGUAGE.to_string()),
            ("cache-control", "no-cache".to_string()),
            ("pragma", "no-cache".to_string()),
        ];

        match kind {
            RequestKind::Json => {
                pairs.push(("accept", ACCEPT_JSON.to_string()));
                pairs.push(("x-requested-with", "XMLHttpRequest".to_string()));
                pairs.push(("priority", "u=1, i".to_string()));
                pairs.extend(fetch_metadata("empty", "cors"));
            }
            RequestKind::Html => {
                pairs.push(("accept", ACCEPT_HTML.to_string()));
                pairs.push(("upgrade-insecure-requests", "1".to_string()));
                pairs.push(("priority", "u=0, i".to_string()));
                pairs.extend(fetch_metadata("document", "navigate"));
            }
            RequestKind::Csv => {
                pairs.push(("accept", "*/*".to_string()));
                pairs.push(("priority", "u=1, i".to_string()));
                pairs.extend(fetch_metadata("empty", "cors"));
            }
        }

        if self.browser == Browser::Chrome {
            let v = self.major_version;
            pairs.push((
                "sec-ch-ua",
                format!("\"Chromium\";v=\"{v}\", \"Google Chrome\";v=\"{v}\", \"Not?A_Brand\";v=\"99\""),
            ));
            pairs.push(("sec-ch-ua-mobile", "?0".to_string()));
            pairs.push(("sec-ch-ua-platform", self.os.platform_hint().to_string()));
        }

        if let Some(referer) = referer {
            pairs.push(("referer", referer.to_string()));
        }

        let mut headers = HeaderMap::with_capacity(pairs.len());
        for (name, value) in pairs {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_str(&value)
                    .with_context(|| format!("invalid value for header {name}"))?,
            );
        }
        Ok(headers)
    }
}

impl fmt::Display for HeaderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {} on {:?}", self.browser, self.major_version, self.os)
    }
}

fn fetch_metadata(dest: &str, mode: &str) -> [(&'static str, String); 3] {
    [
        ("sec-fetch-dest", dest.to_string()),
        ("sec-fetch-mode", mode.to_string()),
        ("sec-fetch-site", "same-origin".to_string()),
    ]
}

fn build_user_agent(browser: Browser, os: Os, v: u32) -> String {
    match browser {
        Browser::Chrome => {
            let platform = match os {
                Os::Windows => "Windows NT 10.0; Win64; x64",
                Os::MacOs => "Macintosh; Intel Mac OS X 10_15_7",
                Os::Linux => "X11; Linux x86_64",
            };
            format!("Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{v}.0.0.0 Safari/537.36")
        }
        Browser::Firefox => {
            let platform = match os {
                Os::Windows => "Windows NT 10.0; Win64; x64",
                Os::MacOs => "Macintosh; Intel Mac OS X 10.15",
                Os::Linux => "X11; Linux x86_64",
            };
            format!("Mozilla/5.0 ({platform}; rv:{v}.0) Gecko/20100101 Firefox/{v}.0")
        }
        Browser::Safari => format!(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{v}.1 Safari/605.1.15"
        ),
    }
}

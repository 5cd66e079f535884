// Browserless-backed page session.
//
// Browserless renders a URL in a headless browser and returns the resulting
// DOM over HTTP. The service is stateless, so this session keeps the current
// URL and scroll depth itself and re-renders the page when the view has to
// change: a scroll becomes "load, scroll N times, then serialize the DOM".

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::snapshot::{select_document, SnapshotElement};
use super::{PageElement, PageSession, SessionError, SessionResult, WaitMode};

/// Default Browserless endpoint for a locally running container.
pub const DEFAULT_BROWSERLESS_URL: &str = "http://localhost:3000";

/// Pause between the scripted scroll steps inside one render.
const SCROLL_STEP: Duration = Duration::from_millis(1200);

/// Extra slack on top of the page-level timeout for the HTTP round trip.
const HTTP_SLACK: Duration = Duration::from_secs(15);

pub struct BrowserlessSession {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    page: Option<LoadedPage>,
}

struct LoadedPage {
    url: String,
    wait: WaitMode,
    timeout: Duration,
    scrolls: u32,
    html: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest<'a> {
    url: &'a str,
    goto_options: GotoOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for_selector: Option<WaitForSelector<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    add_script_tag: Vec<ScriptTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for_timeout: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    wait_until: &'static str,
    timeout: u64,
}

#[derive(Serialize)]
struct WaitForSelector<'a> {
    selector: &'a str,
    timeout: u64,
}

#[derive(Serialize)]
struct ScriptTag {
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScreenshotRequest<'a> {
    url: &'a str,
    goto_options: GotoOptions,
    options: ScreenshotOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScreenshotOptions {
    full_page: bool,
    #[serde(rename = "type")]
    kind: &'static str,
}

impl BrowserlessSession {
    pub fn new(base_url: &str, token: Option<&str>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()).map(String::from),
            page: None,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        match &self.token {
            Some(token) => format!("{}/{path}?token={token}", self.base_url),
            None => format!("{}/{path}", self.base_url),
        }
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
        what: &str,
    ) -> SessionResult<reqwest::Response> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .timeout(timeout + HTTP_SLACK)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SessionError::timeout(what, timeout)
                } else {
                    SessionError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::REQUEST_TIMEOUT {
            return Err(SessionError::timeout(what, timeout));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            if message.contains("TimeoutError") {
                return Err(SessionError::timeout(what, timeout));
            }
            return Err(SessionError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    /// Render `page.url` at its current scroll depth and return the DOM.
    async fn render(
        &self,
        page: &LoadedPage,
        wait_for: Option<(&str, Duration)>,
        what: &str,
    ) -> SessionResult<String> {
        let settle = SCROLL_STEP * page.scrolls;
        let request = RenderRequest {
            url: &page.url,
            goto_options: GotoOptions {
                wait_until: wait_until(page.wait),
                timeout: millis(page.timeout),
            },
            wait_for_selector: wait_for.map(|(selector, timeout)| WaitForSelector {
                selector,
                timeout: millis(timeout),
            }),
            add_script_tag: if page.scrolls > 0 {
                vec![ScriptTag {
                    content: scroll_script(page.scrolls),
                }]
            } else {
                Vec::new()
            },
            wait_for_timeout: (page.scrolls > 0).then(|| millis(settle)),
        };

        let budget = page.timeout + settle + wait_for.map(|(_, t)| t).unwrap_or_default();
        debug!(url = %page.url, scrolls = page.scrolls, "Rendering page");
        let resp = self.post("content", &request, budget, what).await?;
        resp.text()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))
    }

    fn loaded(&self) -> SessionResult<&LoadedPage> {
        self.page.as_ref().ok_or(SessionError::NoPage)
    }
}

#[async_trait]
impl PageSession for BrowserlessSession {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitMode,
        timeout: Duration,
    ) -> SessionResult<()> {
        let mut page = LoadedPage {
            url: url.to_string(),
            wait,
            timeout,
            scrolls: 0,
            html: String::new(),
        };
        let what = format!("navigation to {url}");
        let rendered = self.render(&page, None, &what).await;
        // Keep the page even after a timeout so the caller can still look
        // for elements on a re-render.
        let result = match rendered {
            Ok(html) => {
                page.html = html;
                Ok(())
            }
            Err(e @ SessionError::Timeout { .. }) => Err(e),
            Err(SessionError::Api { status, message }) => {
                return Err(SessionError::Navigation {
                    url: url.to_string(),
                    message: format!("status {status}: {message}"),
                })
            }
            Err(e) => return Err(e),
        };
        self.page = Some(page);
        result
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> SessionResult<()> {
        let page = self.loaded()?;
        if !select_document(&page.html, selector)?.is_empty() {
            return Ok(());
        }

        let what = format!("selector {selector}");
        let html = self.render(page, Some((selector, timeout)), &what).await?;
        let found = !select_document(&html, selector)?.is_empty();
        if let Some(page) = self.page.as_mut() {
            page.html = html;
        }
        if found {
            Ok(())
        } else {
            Err(SessionError::timeout(what, timeout))
        }
    }

    async fn locate_all(&mut self, selector: &str) -> SessionResult<Vec<Box<dyn PageElement>>> {
        let page = self.loaded()?;
        Ok(select_document(&page.html, selector)?
            .into_iter()
            .map(SnapshotElement::boxed)
            .collect())
    }

    async fn scroll_to_bottom(&mut self) -> SessionResult<()> {
        let mut next = {
            let page = self.loaded()?;
            LoadedPage {
                url: page.url.clone(),
                wait: page.wait,
                timeout: page.timeout,
                scrolls: page.scrolls + 1,
                html: String::new(),
            }
        };
        next.html = self.render(&next, None, "scroll").await?;
        self.page = Some(next);
        Ok(())
    }

    async fn capture(&mut self) -> SessionResult<Vec<u8>> {
        let page = self.loaded()?;
        let request = ScreenshotRequest {
            url: &page.url,
            goto_options: GotoOptions {
                wait_until: wait_until(page.wait),
                timeout: millis(page.timeout),
            },
            options: ScreenshotOptions {
                full_page: true,
                kind: "png",
            },
        };
        let resp = self
            .post("screenshot", &request, page.timeout, "screenshot")
            .await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn wait_until(mode: WaitMode) -> &'static str {
    match mode {
        WaitMode::Load => "load",
        WaitMode::DomContentLoaded => "domcontentloaded",
        WaitMode::NetworkIdle => "networkidle2",
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Page script that scrolls to the bottom `times` times, pausing between steps
/// so lazily loaded content can render.
fn scroll_script(times: u32) -> String {
    format!(
        "(async () => {{ for (let i = 0; i < {times}; i++) {{ \
         window.scrollTo(0, document.body.scrollHeight); \
         await new Promise(r => setTimeout(r, {step})); }} }})();",
        step = SCROLL_STEP.as_millis()
    )
}

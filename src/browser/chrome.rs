// spider_chrome re-exports chromiumoxide API
use crate::error::{AutofillError, Result};
use crate::session::{ElementRef, FormSession};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Chrome session implementing the [`FormSession`] capability.
///
/// Element handles issued through [`FormSession`] map to live CDP elements in
/// an internal registry. The registry is flushed when [`ChromeDriver::navigate`]
/// starts a new run; within a run the form-completion core re-enumerates after
/// every submit and never dereferences a handle from an earlier page.
pub struct ChromeDriver {
    browser: Browser,
    temp_dir: Option<PathBuf>,
    elements: Mutex<HashMap<u64, Arc<Element>>>,
    next_element_id: AtomicU64,
}

/// Connection mode for Chrome browser
pub enum ConnectionMode {
    /// Sandboxed mode - launches Chrome using system installation
    Sandboxed {
        chrome_path: Option<String>,
        no_sandbox: bool,
        headless: bool,
    },
    /// Advanced mode - connects to existing Chrome on debug port
    DebugPort(u16),
}

impl ChromeDriver {
    /// Helper method to get the current active page, excluding Chrome's new-tab-page
    async fn get_active_page(&self) -> Result<chromiumoxide::page::Page> {
        let pages = self.browser.pages().await?;

        // Filter out chrome://new-tab-page/ and return the first real page
        for page in pages.iter() {
            if let Ok(Some(url)) = page.url().await {
                if !url.starts_with("chrome://") {
                    return Ok(page.clone());
                }
            }
        }

        // No non-chrome page found, try to use any existing page
        if let Some(page) = pages.last() {
            return Ok(page.clone());
        }

        // No pages at all, create one
        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| AutofillError::Other(format!("Failed to create page: {}", e)))
    }

    /// Launch Chrome in sandboxed mode (uses system Chrome)
    pub async fn launch_sandboxed() -> Result<Self> {
        Self::new(ConnectionMode::Sandboxed {
            chrome_path: None,
            no_sandbox: false,
            headless: false,
        })
        .await
    }

    /// Launch Chrome in sandboxed mode with custom path
    pub async fn launch_with_path(
        chrome_path: String,
        no_sandbox: bool,
        headless: bool,
    ) -> Result<Self> {
        Self::new(ConnectionMode::Sandboxed {
            chrome_path: Some(chrome_path),
            no_sandbox,
            headless,
        })
        .await
    }

    /// Launch Chrome with no-sandbox flag (Linux workaround for AppArmor restrictions)
    pub async fn launch_no_sandbox() -> Result<Self> {
        Self::new(ConnectionMode::Sandboxed {
            chrome_path: None,
            no_sandbox: true,
            headless: false,
        })
        .await
    }

    /// Launch Chrome with auto-detection for CI environments
    pub async fn launch_auto() -> Result<Self> {
        let is_ci = std::env::var("CI").is_ok()
            || std::env::var("GITHUB_ACTIONS").is_ok()
            || std::env::var("GITLAB_CI").is_ok()
            || std::env::var("JENKINS_HOME").is_ok()
            || std::env::var("CIRCLECI").is_ok();

        Self::new(ConnectionMode::Sandboxed {
            chrome_path: None,
            no_sandbox: is_ci, // CI environments typically need --no-sandbox
            headless: is_ci,   // CI environments should run headless
        })
        .await
    }

    /// Connect to existing Chrome on debug port (advanced mode)
    pub async fn connect_debug_port(port: u16) -> Result<Self> {
        Self::new(ConnectionMode::DebugPort(port)).await
    }

    /// Create new ChromeDriver with specified connection mode
    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        let (browser, temp_dir) = match mode {
            ConnectionMode::Sandboxed {
                chrome_path,
                no_sandbox,
                headless,
            } => {
                // Unique profile directory so parallel runs don't share state
                let unique_id = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map_err(|e| AutofillError::LaunchFailed(e.to_string()))?
                    .as_nanos();
                let temp_dir = std::env::temp_dir().join(format!("autoform-{}", unique_id));
                std::fs::create_dir_all(&temp_dir).map_err(|e| {
                    AutofillError::LaunchFailed(format!("Failed to create temp directory: {}", e))
                })?;

                let mut config = if headless {
                    BrowserConfig::builder()
                } else {
                    BrowserConfig::builder().with_head()
                };

                config = config.user_data_dir(&temp_dir);

                // Linux AppArmor workaround
                if no_sandbox {
                    config = config.arg("--no-sandbox");
                }

                if let Some(path) = chrome_path {
                    config = config.chrome_executable(path);
                }

                let (browser, mut handler) = Browser::launch(config.build().map_err(|e| {
                    AutofillError::LaunchFailed(format!(
                        "{}. \n\n\
                         Chrome not found. You can:\n\
                         - Install Chrome: https://www.google.com/chrome/\n\
                         - Ubuntu/Debian: sudo apt install chromium-browser\n\
                         - Or specify path: --chrome-path /path/to/chrome\n\
                         - Linux sandbox issue? Try: --no-sandbox",
                        e
                    ))
                })?)
                .await
                .map_err(|e| {
                    AutofillError::LaunchFailed(format!(
                        "{}. \n\n\
                         Chrome not found. You can:\n\
                         - Install Chrome: https://www.google.com/chrome/\n\
                         - Ubuntu/Debian: sudo apt install chromium-browser\n\
                         - Or specify path: --chrome-path /path/to/chrome\n\
                         - Linux sandbox issue? Try: --no-sandbox",
                        e
                    ))
                })?;

                // Spawn handler task
                tokio::spawn(async move {
                    while (handler.next().await).is_some() {
                        // Handle browser events
                    }
                });

                (browser, Some(temp_dir))
            }
            ConnectionMode::DebugPort(port) => {
                let url = format!("http://localhost:{}", port);
                let (browser, mut handler) = Browser::connect(&url).await.map_err(|e| {
                    AutofillError::ConnectionFailed(format!(
                        "Failed to connect to Chrome on port {}. \
                         Make sure Chrome is running with --remote-debugging-port={}: {}",
                        port, port, e
                    ))
                })?;

                // Spawn handler task
                tokio::spawn(async move {
                    while (handler.next().await).is_some() {
                        // Handle browser events
                    }
                });

                (browser, None)
            }
        };

        Ok(Self {
            browser,
            temp_dir,
            elements: Mutex::new(HashMap::new()),
            next_element_id: AtomicU64::new(1),
        })
    }

    /// Navigate to a URL and wait for the page load event
    pub async fn navigate(&self, url: &str) -> Result<()> {
        use chromiumoxide::cdp::browser_protocol::page::{EventLoadEventFired, NavigateParams};

        // Normalize URL - add https:// if no protocol specified
        let normalized_url = if !url.starts_with("http://")
            && !url.starts_with("https://")
            && !url.starts_with("file://")
            && !url.starts_with("about:")
            && !url.starts_with("data:")
        {
            format!("https://{}", url)
        } else {
            url.to_string()
        };

        log::debug!("Navigating to {}", normalized_url);

        // Handles from the previous page are meaningless after navigation
        self.elements.lock().await.clear();

        let page = self.get_active_page().await?;

        let params = NavigateParams::builder()
            .url(&normalized_url)
            .build()
            .map_err(|e| {
                AutofillError::NavigationFailed(format!("Invalid URL {}: {}", normalized_url, e))
            })?;

        let response = page.execute(params).await.map_err(|e| {
            AutofillError::NavigationFailed(format!(
                "Failed to navigate to {}: {}",
                normalized_url, e
            ))
        })?;

        if let Some(error_text) = response.result.error_text.clone() {
            return Err(AutofillError::NavigationFailed(format!(
                "Navigation error: {}",
                error_text
            )));
        }

        // Wait for the load event rather than sleeping an arbitrary amount
        let load_result = tokio::time::timeout(
            tokio::time::Duration::from_secs(30),
            page.event_listener::<EventLoadEventFired>(),
        )
        .await;

        match load_result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                log::warn!("Could not wait for load event: {}", e);
            }
            Err(_) => {
                return Err(AutofillError::NavigationFailed(format!(
                    "Timed out waiting for {} to load",
                    normalized_url
                )));
            }
        }

        // Small delay for page state to stabilize
        tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

        Ok(())
    }

    /// Check if the browser is still alive and responsive
    pub async fn is_alive(&self) -> bool {
        match self.browser.pages().await {
            Ok(pages) => {
                if let Some(page) = pages.first() {
                    matches!(
                        tokio::time::timeout(tokio::time::Duration::from_secs(2), page.url()).await,
                        Ok(Ok(_))
                    )
                } else {
                    // No pages but browser responded - still alive
                    true
                }
            }
            Err(_) => false,
        }
    }

    /// Close the browser connection
    pub async fn close(self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| AutofillError::Other(e.to_string()))?;
        Ok(())
    }

    /// Get access to the underlying Browser for advanced CDP usage
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    async fn register(&self, found: Vec<Element>) -> Vec<ElementRef> {
        let mut registry = self.elements.lock().await;
        found
            .into_iter()
            .map(|element| {
                let id = self.next_element_id.fetch_add(1, Ordering::Relaxed);
                registry.insert(id, Arc::new(element));
                ElementRef::new(id)
            })
            .collect()
    }

    async fn element(&self, element: ElementRef) -> Result<Arc<Element>> {
        self.elements
            .lock()
            .await
            .get(&element.id())
            .cloned()
            .ok_or(AutofillError::StaleElement(element.id()))
    }

    /// Run a zero-argument JS function against an element, surfacing page-side
    /// exceptions as errors.
    async fn eval_on(&self, element: ElementRef, function: &str) -> Result<Option<serde_json::Value>> {
        let el = self.element(element).await?;
        let returns = el.call_js_fn(function, false).await?;
        if let Some(details) = returns.exception_details {
            return Err(AutofillError::Other(format!(
                "Page-side script failed: {}",
                details.text
            )));
        }
        Ok(returns.result.value)
    }
}

#[async_trait]
impl FormSession for ChromeDriver {
    async fn find_elements(&self, selector: &str) -> Result<Vec<ElementRef>> {
        let page = self.get_active_page().await?;
        let found = page.find_elements(selector).await?;
        Ok(self.register(found).await)
    }

    async fn find_elements_within(
        &self,
        element: ElementRef,
        selector: &str,
    ) -> Result<Vec<ElementRef>> {
        let el = self.element(element).await?;
        let found = el.find_elements(selector).await?;
        Ok(self.register(found).await)
    }

    async fn attribute(&self, element: ElementRef, name: &str) -> Result<Option<String>> {
        let el = self.element(element).await?;
        Ok(el.attribute(name).await?)
    }

    async fn is_checked(&self, element: ElementRef) -> Result<bool> {
        let value = self
            .eval_on(element, "function() { return this.checked === true; }")
            .await?;
        Ok(value.as_ref().and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn click(&self, element: ElementRef) -> Result<()> {
        let el = self.element(element).await?;
        el.click().await?;
        Ok(())
    }

    async fn clear(&self, element: ElementRef) -> Result<()> {
        self.eval_on(
            element,
            "function() { this.value = ''; this.dispatchEvent(new Event('input', { bubbles: true })); }",
        )
        .await?;
        Ok(())
    }

    async fn set_value(&self, element: ElementRef, value: &str) -> Result<()> {
        let el = self.element(element).await?;
        el.focus().await?;
        el.type_str(value).await?;
        Ok(())
    }

    async fn select_by_index(&self, element: ElementRef, index: usize) -> Result<()> {
        let function = format!(
            "function() {{ \
                 if ({index} >= this.options.length) throw new Error('option index {index} out of range'); \
                 this.selectedIndex = {index}; \
                 this.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             }}"
        );
        self.eval_on(element, &function).await?;
        Ok(())
    }

    async fn select_by_value(&self, element: ElementRef, value: &str) -> Result<()> {
        let quoted =
            serde_json::to_string(value).map_err(|e| AutofillError::Other(e.to_string()))?;
        let function = format!(
            "function() {{ \
                 const v = {quoted}; \
                 this.value = v; \
                 if (this.value !== v) throw new Error('no option with value ' + v); \
                 this.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             }}"
        );
        self.eval_on(element, &function).await?;
        Ok(())
    }

    async fn upload_file(&self, path: &Path) -> Result<String> {
        // CDP drives a local browser, so the canonical local path doubles as
        // the remote handle WebDriver-style drivers return from an upload.
        let absolute = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| AutofillError::UploadFailed(format!("{}: {}", path.display(), e)))?;
        Ok(absolute.to_string_lossy().into_owned())
    }

    async fn set_file_input(&self, element: ElementRef, remote_path: &str) -> Result<()> {
        use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;

        let el = self.element(element).await?;
        let page = self.get_active_page().await?;
        page.execute(SetFileInputFilesParams {
            files: vec![remote_path.to_string()],
            node_id: None,
            backend_node_id: Some(el.backend_node_id.clone()),
            object_id: None,
        })
        .await?;
        Ok(())
    }

    async fn screenshot_to_file(&self, path: &Path) -> Result<()> {
        let page = self.get_active_page().await?;

        let screenshot = page
            .screenshot(chromiumoxide::page::ScreenshotParams::default())
            .await
            .map_err(|e| AutofillError::Other(format!("Failed to take screenshot: {}", e)))?;

        tokio::fs::write(path, screenshot)
            .await
            .map_err(|e| AutofillError::Other(format!("Failed to write screenshot: {}", e)))?;

        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.get_active_page().await?;

        let url = page
            .url()
            .await
            .map_err(|e| AutofillError::Other(e.to_string()))?
            .ok_or(AutofillError::NoPage)?;

        Ok(url)
    }

    async fn element_text(&self, selector: &str) -> Result<String> {
        let page = self.get_active_page().await?;

        let text = page
            .find_element(selector)
            .await
            .map_err(|_e| AutofillError::ElementNotFound(selector.to_string()))?
            .inner_text()
            .await
            .map_err(|_e| AutofillError::ElementNotFound(selector.to_string()))?
            .ok_or(AutofillError::ElementNotFound(selector.to_string()))?;

        Ok(text)
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        // Clean up temporary profile directory if it exists
        if let Some(temp_dir) = &self.temp_dir {
            if temp_dir.exists() {
                let _ = std::fs::remove_dir_all(temp_dir);
            }
        }
    }
}

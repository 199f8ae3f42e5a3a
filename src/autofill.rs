//! Form traversal and convergence detection.
//!
//! One step = fill every control on the current page, submit, observe where
//! the browser landed. The run loops until the URL path reaches the target,
//! or fails once the path has stopped moving for `max_loops` consecutive
//! steps.

use crate::error::{AutofillError, Result};
use crate::fields::FieldCompleter;
use crate::session::FormSession;
use crate::values::ValueSource;
use futures::future::try_join_all;
use std::path::PathBuf;

pub const DEFAULT_MAX_LOOPS: u32 = 3;

const PRE_SUBMIT_SCREENSHOT: &str = "autoform.pre-submit.png";
const DEBUG_SCREENSHOT: &str = "autoform.debug.png";

/// Run options.
#[derive(Debug, Clone)]
pub struct Config {
    /// Consecutive no-progress steps tolerated before the run fails.
    pub max_loops: u32,

    /// Directory for pre-submit and stuck-failure screenshots. `None`
    /// disables screenshot capture entirely.
    pub screenshots: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_loops: DEFAULT_MAX_LOOPS,
            screenshots: None,
        }
    }
}

/// Decision after observing the post-submit location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The target location was reached.
    Done,
    /// Run another fill/submit cycle.
    Continue,
    /// The no-progress limit was hit.
    Stuck,
}

/// Per-run convergence state, mutated once per completed submission.
#[derive(Debug)]
pub struct RunState {
    last: Option<String>,
    stuck: u32,
    max_loops: u32,
}

impl RunState {
    pub fn new(max_loops: u32) -> Self {
        Self {
            last: None,
            // a zero limit would mean "fail on the first repeat"; treat it
            // as unset, like the original helper did
            max_loops: if max_loops == 0 {
                DEFAULT_MAX_LOOPS
            } else {
                max_loops
            },
            stuck: 0,
        }
    }

    pub fn stuck_count(&self) -> u32 {
        self.stuck
    }

    /// Fold one observed location into the state.
    ///
    /// Only *consecutive* repeats count as stalling: a multi-page wizard that
    /// re-renders the same path legitimately (validation errors, same-route
    /// pagination) gets `max_loops` chances in a row, and any movement resets
    /// the counter.
    pub fn observe(&mut self, location: &str, target: &str) -> Verdict {
        if location == target {
            return Verdict::Done;
        }
        log::debug!(
            "Checking current path {} against last path {:?}",
            location,
            self.last
        );
        if self.last.as_deref() == Some(location) {
            self.stuck += 1;
            log::debug!("Stuck on path {} for {} iterations", location, self.stuck);
            if self.stuck >= self.max_loops {
                return Verdict::Stuck;
            }
        } else {
            self.stuck = 0;
        }
        self.last = Some(location.to_string());
        Verdict::Continue
    }
}

/// Strip a full URL down to its path for step-over-step comparison.
fn normalize_location(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| AutofillError::Other(format!("Unparseable page URL {}: {}", url, e)))?;
    Ok(parsed.path().to_string())
}

/// `<input>` types completed as plain text. Hidden, submit, button and other
/// non-fillable types fall through to the ignore branch.
fn is_text_like(kind: &str) -> bool {
    matches!(
        kind,
        "" | "text" | "email" | "password" | "search" | "tel" | "url" | "number" | "date"
    )
}

/// Drives a multi-step form to completion over a [`FormSession`].
pub struct Autofill<'a, S: FormSession + ?Sized> {
    session: &'a S,
    values: &'a dyn ValueSource,
    config: Config,
}

impl<'a, S: FormSession + ?Sized> Autofill<'a, S> {
    pub fn new(session: &'a S, values: &'a dyn ValueSource) -> Self {
        Self {
            session,
            values,
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Fill and submit the current page repeatedly until the browser's URL
    /// path equals `target`.
    ///
    /// Returns [`AutofillError::Stuck`] once `max_loops` consecutive
    /// submissions fail to move the path. Any other failure propagates after
    /// a best-effort diagnostic dump of the page text.
    pub async fn run(&self, target: &str) -> Result<()> {
        let mut state = RunState::new(self.config.max_loops);
        loop {
            match self.step(target, &mut state).await {
                Ok(true) => {
                    log::debug!("Arrived at {}. Done.", target);
                    return Ok(());
                }
                Ok(false) => {}
                Err(err) => {
                    self.capture_diagnostics().await;
                    return Err(err);
                }
            }
        }
    }

    /// One full cycle: fill controls, submit, observe the landing location.
    /// `Ok(true)` means the target was reached.
    async fn step(&self, target: &str, state: &mut RunState) -> Result<bool> {
        self.complete_step().await?;

        let url = self.session.current_url().await?;
        let location = normalize_location(&url)?;
        log::debug!("New page is {}", location);

        match state.observe(&location, target) {
            Verdict::Done => Ok(true),
            Verdict::Continue => Ok(false),
            Verdict::Stuck => {
                let screenshot = self.stuck_screenshot().await;
                Err(AutofillError::Stuck {
                    location,
                    screenshot,
                })
            }
        }
    }

    /// Fill every control on the current page, then click submit.
    ///
    /// `<input>` controls are processed strictly one at a time: clicking a
    /// radio can change the visible state of its siblings. `<select>` and
    /// `<textarea>` controls carry no cross-control dependency, so each pass
    /// dispatches them concurrently.
    async fn complete_step(&self) -> Result<()> {
        let completer = FieldCompleter::new(self.session, self.values);

        let inputs = self.session.find_elements("input").await?;
        log::debug!("Found {} <input> elements", inputs.len());
        for element in inputs {
            let kind = self
                .session
                .attribute(element, "type")
                .await?
                .unwrap_or_default();
            let name = self
                .session
                .attribute(element, "name")
                .await?
                .unwrap_or_default();
            match kind.as_str() {
                "radio" => completer.complete_radio(element, &name).await?,
                "checkbox" => completer.complete_checkbox(element, &name).await?,
                "file" => completer.complete_file(element, &name).await?,
                k if is_text_like(k) => completer.complete_text(element, &name).await?,
                other => log::debug!("Ignoring field of type {}", other),
            }
        }

        let selects = self.session.find_elements("select").await?;
        log::debug!("Found {} <select> elements", selects.len());
        try_join_all(selects.into_iter().map(|element| {
            let completer = &completer;
            async move {
                let name = self
                    .session
                    .attribute(element, "name")
                    .await?
                    .unwrap_or_default();
                completer.complete_select(element, &name).await
            }
        }))
        .await?;

        let textareas = self.session.find_elements("textarea").await?;
        log::debug!("Found {} <textarea> elements", textareas.len());
        try_join_all(textareas.into_iter().map(|element| {
            let completer = &completer;
            async move {
                let name = self
                    .session
                    .attribute(element, "name")
                    .await?
                    .unwrap_or_default();
                completer.complete_text(element, &name).await
            }
        }))
        .await?;

        if let Some(dir) = &self.config.screenshots {
            let path = dir.join(PRE_SUBMIT_SCREENSHOT);
            if let Err(e) = self.session.screenshot_to_file(&path).await {
                log::warn!("Pre-submit screenshot failed: {}", e);
            }
        }

        log::debug!("Submitting form");
        let submit = self
            .session
            .find_elements("input[type=\"submit\"]")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AutofillError::ElementNotFound("input[type=\"submit\"]".to_string()))?;
        self.session.click(submit).await
    }

    /// Capture the stuck-state screenshot, if a directory is configured.
    async fn stuck_screenshot(&self) -> Option<PathBuf> {
        let dir = self.config.screenshots.as_ref()?;
        let path = dir.join(DEBUG_SCREENSHOT);
        match self.session.screenshot_to_file(&path).await {
            Ok(()) => {
                log::debug!("Saved stuck-state screenshot to {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::warn!("Stuck-state screenshot failed: {}", e);
                None
            }
        }
    }

    /// Best-effort dump of the visible page text for operator diagnosis.
    /// Failures here are swallowed so they never mask the real error.
    async fn capture_diagnostics(&self) {
        let text = match self.session.element_text("#content").await {
            Ok(text) => Some(text),
            Err(_) => self.session.element_text("body").await.ok(),
        };
        if let Some(text) = text {
            log::debug!("Page content at failure:\n{}", text);
        }
    }
}

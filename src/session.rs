//! Browser session capability consumed by the form-completion core.
//!
//! The core never talks to a concrete automation library. Everything it needs
//! from the browser is behind [`FormSession`], so the traversal logic can be
//! exercised against a scripted in-memory session in tests and against
//! [`crate::ChromeDriver`] for real runs.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Opaque handle to a live element on the current page.
///
/// Handles are only meaningful to the session that issued them and are
/// invalidated by navigation; callers must re-enumerate after every submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(u64);

impl ElementRef {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// The minimal browser operations the form-completion core depends on.
#[async_trait]
pub trait FormSession: Send + Sync {
    /// Enumerate elements matching a CSS selector, in page scan order.
    async fn find_elements(&self, selector: &str) -> Result<Vec<ElementRef>>;

    /// Enumerate descendants of `element` matching a CSS selector.
    async fn find_elements_within(
        &self,
        element: ElementRef,
        selector: &str,
    ) -> Result<Vec<ElementRef>>;

    /// Read an attribute from an element. `None` if the attribute is absent.
    async fn attribute(&self, element: ElementRef, name: &str) -> Result<Option<String>>;

    /// Live checked state of a checkbox or radio (the DOM property, not the
    /// static attribute).
    async fn is_checked(&self, element: ElementRef) -> Result<bool>;

    async fn click(&self, element: ElementRef) -> Result<()>;

    /// Clear the current value of a text-like control.
    async fn clear(&self, element: ElementRef) -> Result<()>;

    /// Type a value into a text-like control.
    async fn set_value(&self, element: ElementRef, value: &str) -> Result<()>;

    /// Select the option at `index` (0-based) of a `<select>` control.
    async fn select_by_index(&self, element: ElementRef, index: usize) -> Result<()>;

    /// Select the option of a `<select>` control whose value is `value`.
    async fn select_by_value(&self, element: ElementRef, value: &str) -> Result<()>;

    /// Transfer a local file to the browser side, returning the path handle
    /// to use when populating a file input.
    async fn upload_file(&self, path: &Path) -> Result<String>;

    /// Populate a file input with a handle obtained from [`Self::upload_file`].
    async fn set_file_input(&self, element: ElementRef, remote_path: &str) -> Result<()>;

    /// Capture a screenshot of the current page to `path`.
    async fn screenshot_to_file(&self, path: &Path) -> Result<()>;

    /// Full URL of the current page.
    async fn current_url(&self) -> Result<String>;

    /// Visible text of the first element matching `selector`.
    async fn element_text(&self, selector: &str) -> Result<String>;
}

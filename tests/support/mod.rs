//! Scripted in-memory [`FormSession`] for exercising the traversal core
//! without a browser.
//!
//! A session is a set of pages keyed by path plus a route: each click on a
//! submit control moves the session to the next path in the route (staying
//! put once the route is exhausted). Controls record every interaction so
//! tests can assert on clicks, typed values and selections.

#![allow(dead_code)]

use async_trait::async_trait;
use autoform::{AutofillError, ElementRef, FormSession};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

type Result<T> = std::result::Result<T, AutofillError>;

const BASE_URL: &str = "http://forms.test";

#[derive(Debug, Clone)]
pub struct FakeControl {
    pub tag: &'static str,
    pub kind: &'static str,
    pub name: String,
    pub value: String,
    pub options: Vec<String>,
    pub checked: bool,
    pub interactable: bool,
}

impl FakeControl {
    fn new(tag: &'static str, kind: &'static str, name: &str) -> Self {
        Self {
            tag,
            kind,
            name: name.to_string(),
            value: String::new(),
            options: Vec::new(),
            checked: false,
            interactable: true,
        }
    }

    pub fn text(name: &str) -> Self {
        Self::new("input", "text", name)
    }

    /// An `<input>` with an arbitrary `type` attribute (email, hidden, ...).
    pub fn input(kind: &'static str, name: &str) -> Self {
        Self::new("input", kind, name)
    }

    /// A text input that rejects clear/type interactions, like a
    /// conditionally-hidden field.
    pub fn broken_text(name: &str) -> Self {
        let mut control = Self::new("input", "text", name);
        control.interactable = false;
        control
    }

    pub fn radio(name: &str, value: &str) -> Self {
        let mut control = Self::new("input", "radio", name);
        control.value = value.to_string();
        control
    }

    pub fn checkbox(name: &str, value: &str) -> Self {
        let mut control = Self::new("input", "checkbox", name);
        control.value = value.to_string();
        control
    }

    pub fn checkbox_checked(name: &str, value: &str) -> Self {
        let mut control = Self::checkbox(name, value);
        control.checked = true;
        control
    }

    pub fn file(name: &str) -> Self {
        Self::new("input", "file", name)
    }

    pub fn select(name: &str, options: &[&str]) -> Self {
        let mut control = Self::new("select", "", name);
        control.options = options.iter().map(|s| s.to_string()).collect();
        control
    }

    pub fn textarea(name: &str) -> Self {
        Self::new("textarea", "", name)
    }

    pub fn submit() -> Self {
        Self::new("input", "submit", "")
    }
}

pub struct FakePage {
    pub path: String,
    pub controls: Vec<FakeControl>,
}

impl FakePage {
    pub fn new(path: &str, controls: Vec<FakeControl>) -> Self {
        Self {
            path: path.to_string(),
            controls,
        }
    }
}

struct ControlState {
    page: String,
    control: FakeControl,
    clicks: usize,
    typed: Option<String>,
    cleared: bool,
    selected_index: Option<usize>,
    selected_value: Option<String>,
    attached_file: Option<String>,
}

struct World {
    controls: Vec<ControlState>,
    current: String,
    route: VecDeque<String>,
    submits: usize,
    uploads: Vec<String>,
    screenshots: Vec<std::path::PathBuf>,
}

pub struct FakeSession {
    world: Mutex<World>,
}

impl FakeSession {
    /// `start` is the initial path; each submit click advances to the next
    /// entry of `route`, staying in place once it is exhausted.
    pub fn new(start: &str, pages: Vec<FakePage>, route: &[&str]) -> Self {
        let mut controls = Vec::new();
        for page in pages {
            for control in page.controls {
                controls.push(ControlState {
                    page: page.path.clone(),
                    control,
                    clicks: 0,
                    typed: None,
                    cleared: false,
                    selected_index: None,
                    selected_value: None,
                    attached_file: None,
                });
            }
        }
        Self {
            world: Mutex::new(World {
                controls,
                current: start.to_string(),
                route: route.iter().map(|s| s.to_string()).collect(),
                submits: 0,
                uploads: Vec::new(),
                screenshots: Vec::new(),
            }),
        }
    }

    fn index_of(&self, element: ElementRef) -> Result<usize> {
        let index = element.id() as usize;
        let world = self.world.lock().unwrap();
        if index == 0 || index > world.controls.len() {
            return Err(AutofillError::StaleElement(element.id()));
        }
        Ok(index - 1)
    }

    // ----- assertion helpers -----

    fn with_control<T>(&self, name: &str, value: Option<&str>, f: impl Fn(&ControlState) -> T) -> T {
        let world = self.world.lock().unwrap();
        let state = world
            .controls
            .iter()
            .find(|c| c.control.name == name && value.map_or(true, |v| c.control.value == v))
            .unwrap_or_else(|| panic!("no control named {name}"));
        f(state)
    }

    pub fn click_count(&self, name: &str, value: &str) -> usize {
        self.with_control(name, Some(value), |c| c.clicks)
    }

    pub fn is_checked_now(&self, name: &str, value: &str) -> bool {
        self.with_control(name, Some(value), |c| c.control.checked)
    }

    pub fn typed_value(&self, name: &str) -> Option<String> {
        self.with_control(name, None, |c| c.typed.clone())
    }

    pub fn selected_index(&self, name: &str) -> Option<usize> {
        self.with_control(name, None, |c| c.selected_index)
    }

    pub fn selected_value(&self, name: &str) -> Option<String> {
        self.with_control(name, None, |c| c.selected_value.clone())
    }

    pub fn attached_file(&self, name: &str) -> Option<String> {
        self.with_control(name, None, |c| c.attached_file.clone())
    }

    pub fn submit_count(&self) -> usize {
        self.world.lock().unwrap().submits
    }

    pub fn upload_count(&self) -> usize {
        self.world.lock().unwrap().uploads.len()
    }

    pub fn screenshot_count(&self) -> usize {
        self.world.lock().unwrap().screenshots.len()
    }
}

fn matches_selector(state: &ControlState, selector: &str) -> bool {
    match selector {
        "input" => state.control.tag == "input",
        "select" => state.control.tag == "select",
        "textarea" => state.control.tag == "textarea",
        "input[type=\"submit\"]" => state.control.tag == "input" && state.control.kind == "submit",
        _ => {
            // input[type="radio"][name="..."]
            if let Some(rest) = selector.strip_prefix("input[type=\"radio\"][name=\"") {
                let name = rest.trim_end_matches("\"]");
                state.control.tag == "input"
                    && state.control.kind == "radio"
                    && state.control.name == name
            } else {
                panic!("unsupported selector in fake session: {selector}");
            }
        }
    }
}

#[async_trait]
impl FormSession for FakeSession {
    async fn find_elements(&self, selector: &str) -> Result<Vec<ElementRef>> {
        let world = self.world.lock().unwrap();
        let current = world.current.clone();
        Ok(world
            .controls
            .iter()
            .enumerate()
            .filter_map(|(i, c)| {
                if c.page == current && matches_selector(c, selector) {
                    Some(ElementRef::new(i as u64 + 1))
                } else {
                    None
                }
            })
            .collect())
    }

    async fn find_elements_within(
        &self,
        element: ElementRef,
        selector: &str,
    ) -> Result<Vec<ElementRef>> {
        assert_eq!(selector, "option", "only option enumeration is supported");
        let index = self.index_of(element)?;
        let world = self.world.lock().unwrap();
        let count = world.controls[index].control.options.len();
        // pseudo-handles: only ever counted, never dereferenced
        Ok((0..count)
            .map(|i| ElementRef::new(1_000_000 + i as u64))
            .collect())
    }

    async fn attribute(&self, element: ElementRef, name: &str) -> Result<Option<String>> {
        let index = self.index_of(element)?;
        let world = self.world.lock().unwrap();
        let control = &world.controls[index].control;
        Ok(match name {
            "type" if control.tag == "input" => Some(control.kind.to_string()),
            "name" => Some(control.name.clone()),
            "value" => Some(control.value.clone()),
            _ => None,
        })
    }

    async fn is_checked(&self, element: ElementRef) -> Result<bool> {
        let index = self.index_of(element)?;
        let world = self.world.lock().unwrap();
        Ok(world.controls[index].control.checked)
    }

    async fn click(&self, element: ElementRef) -> Result<()> {
        let index = self.index_of(element)?;
        let mut world = self.world.lock().unwrap();
        world.controls[index].clicks += 1;

        let (tag, kind, name, page) = {
            let state = &world.controls[index];
            (
                state.control.tag,
                state.control.kind,
                state.control.name.clone(),
                state.page.clone(),
            )
        };

        match (tag, kind) {
            ("input", "submit") => {
                world.submits += 1;
                if let Some(next) = world.route.pop_front() {
                    world.current = next;
                }
            }
            ("input", "radio") => {
                // checking one radio unchecks its same-named siblings
                for state in world.controls.iter_mut() {
                    if state.page == page
                        && state.control.kind == "radio"
                        && state.control.name == name
                    {
                        state.control.checked = false;
                    }
                }
                world.controls[index].control.checked = true;
            }
            ("input", "checkbox") => {
                let state = &mut world.controls[index];
                state.control.checked = !state.control.checked;
            }
            _ => {}
        }
        Ok(())
    }

    async fn clear(&self, element: ElementRef) -> Result<()> {
        let index = self.index_of(element)?;
        let mut world = self.world.lock().unwrap();
        let state = &mut world.controls[index];
        if !state.control.interactable {
            return Err(AutofillError::Other("element not interactable".to_string()));
        }
        state.cleared = true;
        state.typed = None;
        Ok(())
    }

    async fn set_value(&self, element: ElementRef, value: &str) -> Result<()> {
        let index = self.index_of(element)?;
        let mut world = self.world.lock().unwrap();
        let state = &mut world.controls[index];
        if !state.control.interactable {
            return Err(AutofillError::Other("element not interactable".to_string()));
        }
        state.typed = Some(value.to_string());
        Ok(())
    }

    async fn select_by_index(&self, element: ElementRef, index: usize) -> Result<()> {
        let control_index = self.index_of(element)?;
        let mut world = self.world.lock().unwrap();
        let state = &mut world.controls[control_index];
        if index >= state.control.options.len() {
            return Err(AutofillError::Other(format!(
                "option index {index} out of range"
            )));
        }
        state.selected_index = Some(index);
        Ok(())
    }

    async fn select_by_value(&self, element: ElementRef, value: &str) -> Result<()> {
        let control_index = self.index_of(element)?;
        let mut world = self.world.lock().unwrap();
        let state = &mut world.controls[control_index];
        if !state.control.options.iter().any(|o| o == value) {
            return Err(AutofillError::Other(format!("no option with value {value}")));
        }
        state.selected_value = Some(value.to_string());
        Ok(())
    }

    async fn upload_file(&self, path: &Path) -> Result<String> {
        let mut world = self.world.lock().unwrap();
        let handle = format!("remote:{}", path.display());
        world.uploads.push(handle.clone());
        Ok(handle)
    }

    async fn set_file_input(&self, element: ElementRef, remote_path: &str) -> Result<()> {
        let index = self.index_of(element)?;
        let mut world = self.world.lock().unwrap();
        world.controls[index].attached_file = Some(remote_path.to_string());
        Ok(())
    }

    async fn screenshot_to_file(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, b"fake png")
            .await
            .map_err(|e| AutofillError::Other(e.to_string()))?;
        let mut world = self.world.lock().unwrap();
        world.screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let world = self.world.lock().unwrap();
        Ok(format!("{}{}", BASE_URL, world.current))
    }

    async fn element_text(&self, selector: &str) -> Result<String> {
        let world = self.world.lock().unwrap();
        match selector {
            "#content" | "body" => Ok(format!("page text at {}", world.current)),
            other => Err(AutofillError::ElementNotFound(other.to_string())),
        }
    }
}

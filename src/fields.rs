//! Per-kind completion strategies for individual form controls.

use crate::error::Result;
use crate::session::{ElementRef, FormSession};
use crate::values::{FieldKind, FieldValue, ValueSource};
use rand::Rng;
use std::path::Path;

/// Applies one resolved value to one control.
///
/// Controls that are present in the DOM but not interactable are tolerated:
/// text-like completion swallows interaction failures, since forms routinely
/// render conditionally-hidden fields alongside visible ones.
pub struct FieldCompleter<'a, S: FormSession + ?Sized> {
    session: &'a S,
    values: &'a dyn ValueSource,
}

/// Pick a pseudo-random index from a candidate set, skipping index 0.
///
/// The first option of a select or radio group is typically the blank
/// default, so the random fallback deliberately avoids it. A set with one or
/// zero members has no alternative to pick and yields `None`; a two-member
/// set always yields 1.
pub(crate) fn choose_skip_first(len: usize) -> Option<usize> {
    if len <= 1 {
        return None;
    }
    Some(rand::thread_rng().gen_range(1..len))
}

impl<'a, S: FormSession + ?Sized> FieldCompleter<'a, S> {
    pub fn new(session: &'a S, values: &'a dyn ValueSource) -> Self {
        Self { session, values }
    }

    /// Fill a text input or textarea: clear, then type the resolved value.
    ///
    /// Interaction failures are swallowed; a hidden or disabled field is
    /// normal and acceptable to skip.
    pub async fn complete_text(&self, element: ElementRef, name: &str) -> Result<()> {
        let value = match self.values.value_for(name, FieldKind::Text) {
            Some(FieldValue::Text(s)) => s,
            Some(other) => {
                log::debug!("Ignoring non-text value {:?} for field {}", other, name);
                return Ok(());
            }
            None => {
                log::debug!("No value for field {} - leaving as-is", name);
                return Ok(());
            }
        };

        log::debug!("Filling field {} with value {}", name, value);
        let applied = async {
            self.session.clear(element).await?;
            self.session.set_value(element, &value).await
        };
        if let Err(e) = applied.await {
            // probably hidden or disabled, skip it
            log::debug!("Could not fill field {} ({}), skipping", name, e);
        }
        Ok(())
    }

    /// Upload and attach a file to a file input. A missing value is a no-op;
    /// upload failures propagate.
    pub async fn complete_file(&self, element: ElementRef, name: &str) -> Result<()> {
        match self.values.value_for(name, FieldKind::File) {
            Some(FieldValue::Text(path)) => {
                log::debug!("Uploading file {}", path);
                let remote = self.session.upload_file(Path::new(&path)).await?;
                log::debug!("Uploaded file {} - remote path {}", path, remote);
                self.session.set_file_input(element, &remote).await
            }
            Some(other) => {
                log::debug!("Ignoring non-path value {:?} for file input {}", other, name);
                Ok(())
            }
            None => {
                log::debug!("No file specified for input {} - ignoring", name);
                Ok(())
            }
        }
    }

    /// Complete one member of a radio group.
    ///
    /// With no resolved value, a pseudo-random member of the whole group is
    /// clicked (skipping the first). With a resolved value, this member is
    /// clicked only when its own `value` attribute matches; invoking the
    /// completer across every member then selects exactly the matching one.
    pub async fn complete_radio(&self, element: ElementRef, name: &str) -> Result<()> {
        match self.values.value_for(name, FieldKind::Radio) {
            None => {
                let selector = format!("input[type=\"radio\"][name=\"{}\"]", name);
                let radios = self.session.find_elements(&selector).await?;
                match choose_skip_first(radios.len()) {
                    Some(index) => {
                        log::debug!("Checking random radio {} (member {})", name, index);
                        self.session.click(radios[index]).await
                    }
                    None => {
                        log::debug!("Radio group {} has no alternative member - leaving as-is", name);
                        Ok(())
                    }
                }
            }
            Some(FieldValue::Text(value)) => {
                let own = self
                    .session
                    .attribute(element, "value")
                    .await?
                    .unwrap_or_default();
                if own == value {
                    log::debug!("Checking radio {} with value {}", name, own);
                    self.session.click(element).await
                } else {
                    Ok(())
                }
            }
            Some(other) => {
                log::debug!("Ignoring non-text value {:?} for radio {}", other, name);
                Ok(())
            }
        }
    }

    /// Complete a checkbox against its resolved value.
    ///
    /// No value: boxes should be unchecked unless data says otherwise.
    /// `Check`: check regardless of the box's own value.
    /// `AnyOf`: check when the box's value is accepted, uncheck when not.
    /// Already-correct state is left untouched, so completion is idempotent.
    pub async fn complete_checkbox(&self, element: ElementRef, name: &str) -> Result<()> {
        let own = self
            .session
            .attribute(element, "value")
            .await?
            .unwrap_or_default();
        let checked = self.session.is_checked(element).await?;

        match self.values.value_for(name, FieldKind::Checkbox) {
            None => {
                if checked {
                    log::debug!("Unchecking checkbox {}", name);
                    self.session.click(element).await
                } else {
                    log::debug!("Leaving checkbox {} blank", name);
                    Ok(())
                }
            }
            Some(FieldValue::Check) => {
                if !checked {
                    log::debug!("Checking checkbox {} with value {}", name, own);
                    self.session.click(element).await
                } else {
                    log::debug!("Checkbox {} already checked", name);
                    Ok(())
                }
            }
            Some(value) => {
                let accepted: Vec<String> = match value {
                    FieldValue::AnyOf(list) => list,
                    FieldValue::Text(s) => vec![s],
                    FieldValue::Check => unreachable!("handled above"),
                };
                let wanted = accepted.iter().any(|v| v == &own);
                if wanted && !checked {
                    log::debug!("Checking checkbox {} with value {}", name, own);
                    self.session.click(element).await
                } else if !wanted && checked {
                    log::debug!("Unchecking checkbox {} with value {}", name, own);
                    self.session.click(element).await
                } else {
                    log::debug!(
                        "Ignoring checkbox {} with value {} - looking for {:?}",
                        name,
                        own,
                        accepted
                    );
                    Ok(())
                }
            }
        }
    }

    /// Complete a select list: resolved value selects by option value,
    /// otherwise a pseudo-random option (skipping the first) is selected.
    pub async fn complete_select(&self, element: ElementRef, name: &str) -> Result<()> {
        match self.values.value_for(name, FieldKind::Select) {
            None => {
                let options = self.session.find_elements_within(element, "option").await?;
                match choose_skip_first(options.len()) {
                    Some(index) => {
                        log::debug!("Selecting option {} from select box {}", index, name);
                        self.session.select_by_index(element, index).await
                    }
                    None => {
                        log::debug!("Select {} has no alternative option - leaving as-is", name);
                        Ok(())
                    }
                }
            }
            Some(FieldValue::Text(value)) => {
                log::debug!("Selecting option {} from select box {}", value, name);
                self.session.select_by_value(element, &value).await
            }
            Some(other) => {
                log::debug!("Ignoring non-text value {:?} for select {}", other, name);
                Ok(())
            }
        }
    }
}

//! Fault-injecting renderers and recording progress sinks.

use crate::context::Context;
use crate::error::RenderError;
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};
use crate::render::{PlaceholderRenderer, Renderer, TemplateHandle};
use std::path::Path;
use std::sync::Mutex;

/// What a [`FaultyRenderer`] does when its trigger matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Return [`RenderError::Template`].
    Error,
    /// Panic inside the worker.
    Panic,
}

/// [`PlaceholderRenderer`] that misbehaves for rows whose context has
/// `field == value`.
#[derive(Clone, Debug)]
pub struct FaultyRenderer {
    /// Context key inspected for the trigger.
    pub field: String,
    pub value: String,
    pub fault: Fault,
}

impl FaultyRenderer {
    /// Misbehave with `fault` for rows where `field == value`.
    ///
    /// # Example
    /// ```
    /// use docbatch::testing::{Fault, FaultyRenderer};
    ///
    /// // Fails row "person_3" only; every other row renders normally.
    /// let renderer = FaultyRenderer::new("name", "person_3", Fault::Error);
    /// assert_eq!(renderer.fault, Fault::Error);
    /// ```
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<String>, fault: Fault) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            fault,
        }
    }

    fn check(&self, context: &Context) -> Result<(), RenderError> {
        if context.get(&self.field) != Some(&self.value) {
            return Ok(());
        }
        match self.fault {
            Fault::Error => Err(RenderError::Template(format!(
                "injected failure for {}={}",
                self.field, self.value
            ))),
            Fault::Panic => panic!("injected panic for {}={}", self.field, self.value),
        }
    }
}

impl Renderer for FaultyRenderer {
    fn render(&self, template: &mut TemplateHandle, context: &Context) -> Result<(), RenderError> {
        self.check(context)?;
        PlaceholderRenderer.render(template, context)
    }

    fn render_keep_unresolved(
        &self,
        template: &mut TemplateHandle,
        context: &Context,
    ) -> Result<(), RenderError> {
        self.check(context)?;
        PlaceholderRenderer.render_keep_unresolved(template, context)
    }

    fn save(&self, template: &TemplateHandle, path: &Path) -> Result<(), RenderError> {
        PlaceholderRenderer.save(template, path)
    }
}

/// Progress sink that records every event and can cancel a run after a
/// given number of events.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
    cancel_after: Option<(CancelToken, usize)>,
}

impl RecordingProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel `token` once `events` events have been received.
    #[must_use]
    pub fn cancel_after(token: &CancelToken, events: usize) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            cancel_after: Some((token.clone(), events)),
        }
    }

    /// Snapshot of the events received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Percentages in arrival order.
    #[must_use]
    pub fn percents(&self) -> Vec<u8> {
        self.events().iter().map(|e| e.percent).collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        let mut events = self.events.lock().unwrap();
        events.push(event);
        if let Some((token, after)) = &self.cancel_after
            && events.len() >= *after
        {
            token.cancel();
        }
    }
}

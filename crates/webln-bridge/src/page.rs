//! A page without a browser, for driving the bridge from the terminal.

use std::sync::{Arc, Mutex};

use tracing::debug;
use webln_relay::{InputElement, KeyEvent, KeyEventKind, PageSurface};

/// Text field that records what was typed into it.
#[derive(Debug, Default)]
pub struct TextField {
    value: Mutex<String>,
}

impl InputElement for TextField {
    fn focus(&self) {}

    fn value(&self) -> String {
        self.value.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn set_value(&self, value: &str) {
        if let Ok(mut current) = self.value.lock() {
            *current = value.to_string();
        }
    }

    fn dispatch(&self, event: KeyEvent) {
        if event.kind == KeyEventKind::Input {
            debug!("input: {}", event.key);
        }
    }
}

/// Page on a fixed host whose only input is always focused.
#[derive(Debug)]
pub struct HeadlessPage {
    host: String,
    title: Option<String>,
    field: Arc<TextField>,
}

impl HeadlessPage {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            title: None,
            field: Arc::new(TextField::default()),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Whatever was pasted into the page.
    pub fn pasted(&self) -> String {
        self.field.value()
    }
}

impl PageSurface for HeadlessPage {
    fn host(&self) -> String {
        self.host.clone()
    }

    fn title(&self) -> Option<String> {
        self.title.clone()
    }

    fn icon(&self) -> Option<String> {
        None
    }

    fn selection(&self) -> Option<String> {
        None
    }

    fn element_by_id(&self, _id: &str) -> Option<Arc<dyn InputElement>> {
        Some(self.field.clone())
    }

    fn active_element(&self) -> Option<Arc<dyn InputElement>> {
        Some(self.field.clone())
    }
}

//! The slice of the page the relay is allowed to touch.

use std::sync::Arc;

use webln_core::Origin;

/// Mouse button that opens the context menu.
pub const RIGHT_BUTTON: i16 = 2;

/// URI scheme of intercepted payment links.
pub const LIGHTNING_SCHEME: &str = "lightning:";

/// A node in the page's document tree.
pub trait DomNode: Send + Sync {
    fn attribute(&self, name: &str) -> Option<String>;

    fn parent(&self) -> Option<Arc<dyn DomNode>>;

    fn inner_text(&self) -> Option<String> {
        None
    }

    /// Current value, for form controls.
    fn value(&self) -> Option<String> {
        None
    }
}

/// Keyboard and input events dispatched while typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    KeyDown,
    KeyPress,
    Input,
    KeyUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub key: char,
}

/// An element that can receive typed text.
pub trait InputElement: Send + Sync {
    fn focus(&self);

    fn value(&self) -> String;

    fn set_value(&self, value: &str);

    fn dispatch(&self, event: KeyEvent);
}

/// Document-level access for one page.
pub trait PageSurface: Send + Sync + 'static {
    /// Host of the page location, e.g. `shop.example:8080`.
    fn host(&self) -> String;

    fn title(&self) -> Option<String>;

    /// Favicon URL.
    fn icon(&self) -> Option<String>;

    /// Currently selected text.
    fn selection(&self) -> Option<String>;

    fn element_by_id(&self, id: &str) -> Option<Arc<dyn InputElement>>;

    fn active_element(&self) -> Option<Arc<dyn InputElement>>;

    /// Origin as reported to the controller.
    fn origin(&self) -> Origin {
        let domain = self.host();
        let name = self
            .title()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| domain.clone());
        let origin = Origin::new(domain, name);
        match self.icon() {
            Some(icon) => origin.with_icon(icon),
            None => origin,
        }
    }
}

/// Invoice behind the closest `lightning:` link at or above `node`.
pub fn lightning_link(node: &dyn DomNode) -> Option<String> {
    let href = |n: &dyn DomNode| {
        n.attribute("href").and_then(|href| {
            let scheme = href.get(..LIGHTNING_SCHEME.len())?;
            scheme
                .eq_ignore_ascii_case(LIGHTNING_SCHEME)
                .then(|| href[LIGHTNING_SCHEME.len()..].trim().to_string())
        })
    };

    if let Some(invoice) = href(node) {
        return Some(invoice);
    }
    let mut current = node.parent();
    while let Some(n) = current {
        if let Some(invoice) = href(n.as_ref()) {
            return Some(invoice);
        }
        current = n.parent();
    }
    None
}

/// Focus `element` and type `text` one character at a time.
///
/// Each character produces keydown, keypress, input and keyup, with the value
/// already grown by that character when `input` fires.
pub fn type_text(element: &dyn InputElement, text: &str) {
    element.focus();
    element.set_value("");

    let mut typed = String::with_capacity(text.len());
    for key in text.chars() {
        element.dispatch(KeyEvent {
            kind: KeyEventKind::KeyDown,
            key,
        });
        element.dispatch(KeyEvent {
            kind: KeyEventKind::KeyPress,
            key,
        });
        typed.push(key);
        element.set_value(&typed);
        element.dispatch(KeyEvent {
            kind: KeyEventKind::Input,
            key,
        });
        element.dispatch(KeyEvent {
            kind: KeyEventKind::KeyUp,
            key,
        });
    }
}

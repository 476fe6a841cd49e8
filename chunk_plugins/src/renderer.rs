//! Client-side preview renderers

use chunk_types::{Configuration, Delta, FieldName, InstanceTypeSettings, LangCode};

/// Everything a renderer may read
///
/// Renderers are pure: the same request always produces the same markup.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub configuration: &'a Configuration,
    pub field: &'a FieldName,
    pub langcode: &'a LangCode,
    pub delta: Delta,
    pub settings: &'a InstanceTypeSettings,
}

impl<'a> RenderRequest<'a> {
    /// Configuration value, empty if unset
    pub fn value(&self, property: &str) -> &'a str {
        self.configuration.get_or_empty(property)
    }

    /// ` contenteditable` when the instance edits in place
    pub fn contenteditable(&self) -> &'static str {
        if self.settings.edit_in_place {
            " contenteditable"
        } else {
            ""
        }
    }
}

pub type RendererFn = Box<dyn Fn(&RenderRequest<'_>) -> String>;

/// Escapes text for inclusion in markup
pub fn check_plain(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

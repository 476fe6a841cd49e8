//! Built-in chunk types
//!
//! Client renderers and editing contracts for the chunk types that ship
//! with the widget.

use crate::editor::{EditingContract, EnterBehavior};
use crate::renderer::{check_plain, RenderRequest};
use crate::PluginRegistry;

/// Registers every built-in renderer and editing contract
pub fn register_builtin(registry: &mut PluginRegistry) {
    registry.register_renderer("text", render_text);
    registry.register_renderer("heading", render_heading);
    registry.register_renderer("list", render_list);
    registry.register_renderer("definitions", render_definitions);
    registry.register_renderer("html", render_html);
    registry.register_renderer("p", render_p);
    registry.register_renderer("quote", render_quote);
    registry.register_renderer("entity_reference", render_entity_reference);

    registry.register_contract(
        "p",
        EditingContract::new(EnterBehavior::Suppress).with_shift_enter_add(),
    );
    registry.register_contract(
        "quote",
        EditingContract::new(EnterBehavior::InsertLineBreak("<br><br>".to_string())),
    );
}

pub fn render_text(request: &RenderRequest<'_>) -> String {
    format!(
        "<div class=\"chunk text-chunk\">{}</div>",
        check_plain(request.value("text"))
    )
}

pub fn render_heading(request: &RenderRequest<'_>) -> String {
    let level = match request.value("level").parse::<u8>() {
        Ok(level @ 1..=6) => level,
        _ => 2,
    };
    let id = request.value("id");
    let id_attribute = if id.is_empty() {
        String::new()
    } else {
        format!(" id=\"{}\"", check_plain(id))
    };
    format!(
        "<h{level} class=\"chunk heading-chunk\"{id_attribute}>{}</h{level}>",
        check_plain(request.value("text"))
    )
}

pub fn render_list(request: &RenderRequest<'_>) -> String {
    let style = match request.value("style") {
        "ol" => "ol",
        _ => "ul",
    };
    let plain = request.settings.is_plain_text();

    let mut output = format!(
        "<{style} class=\"chunk list-chunk\"{}>",
        request.contenteditable()
    );
    for line in request.value("list").split('\n') {
        if line.is_empty() || line == "<p><br></p>" {
            continue;
        }
        let item = if plain {
            check_plain(line)
        } else {
            line.to_string()
        };
        output.push_str(&format!("<li>{}</li>", item));
    }
    output.push_str(&format!("</{style}>"));
    output
}

/// Lines starting with `-` are descriptions, all others are terms
pub fn render_definitions(request: &RenderRequest<'_>) -> String {
    let plain = request.settings.is_plain_text();

    let mut output = String::from("<dl class=\"chunk definitions-chunk\">");
    for line in request.value("definitions").split('\n') {
        let (tag, item) = match line.strip_prefix('-') {
            Some(rest) => ("dd", rest),
            None => ("dt", line),
        };
        let item = if plain {
            check_plain(item)
        } else {
            item.to_string()
        };
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        output.push_str(&format!("<{tag}>{item}</{tag}>"));
    }
    output.push_str("</dl>");
    output
}

pub fn render_html(request: &RenderRequest<'_>) -> String {
    format!("<div class=\"chunk html-chunk\">{}</div>", request.value("html"))
}

pub fn render_p(request: &RenderRequest<'_>) -> String {
    format!(
        "<p class=\"chunk p-chunk\"{}>{}</p>",
        request.contenteditable(),
        request.value("p")
    )
}

pub fn render_quote(request: &RenderRequest<'_>) -> String {
    let editable = request.contenteditable();
    let location = check_plain(request.value("attribution_location"));
    let cite = if location.is_empty() {
        String::new()
    } else {
        format!(" cite=\"{}\"", location)
    };

    let mut output = format!(
        "<blockquote class=\"chunk quote-chunk\"{cite}><p{editable}>{}</p>",
        request.value("quote")
    );
    let attribution = request.value("attribution");
    if !attribution.is_empty() {
        output.push_str(&format!(
            "<footer><cite{editable}>{attribution}</cite></footer>"
        ));
    }
    output.push_str("</blockquote>");
    output
}

pub fn render_entity_reference(request: &RenderRequest<'_>) -> String {
    format!("<p>{}</p>", check_plain(request.value("reference")))
}

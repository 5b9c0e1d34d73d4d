//! Rendering a [`MetaError`] against its source text.

use annotate_snippets::{Level, Renderer, Snippet};

use crate::error::MetaError;

/// Render `err` as a human-readable, source-annotated diagnostic, the way a
/// compiler front end would print it to a terminal.
pub fn render(origin: &str, source: &str, err: &MetaError) -> String {
    let offset = err.offset().min(source.len());
    let end = next_char_boundary(source, offset);
    let message = err.to_string();

    let snippet = Level::Error.title(&message).snippet(
        Snippet::source(source)
            .origin(origin)
            .fold(true)
            .annotation(Level::Error.span(offset..end).label("here")),
    );

    Renderer::styled().render(snippet).to_string()
}

fn next_char_boundary(source: &str, offset: usize) -> usize {
    if offset >= source.len() {
        return source.len();
    }
    let mut end = offset + 1;
    while end < source.len() && !source.is_char_boundary(end) {
        end += 1;
    }
    end
}

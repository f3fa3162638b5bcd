//! Markdown template renderer.
//!
//! Renders the template file with minijinja, then converts the result to
//! HTML. A fresh [`minijinja::Environment`] is created per render call since
//! template paths are arbitrary job inputs, not a pre-registered set.

use std::collections::HashMap;

use minijinja::context;

use crate::adapter::{
    AdapterError, AdapterFuture, DataPayload, RenderedDoc, TemplateRenderer,
};
use crate::scope::Scope;

/// Renders markdown templates.
///
/// The payload's rows are exposed to the template as `rows` (with `data` as
/// an alias). The rendered markdown is kept in `RenderedDoc::content`; a
/// minimal markdown→HTML conversion (headings, unordered lists, paragraphs)
/// fills `RenderedDoc::html`. Embedders that need full markdown semantics
/// should register their own renderer.
pub struct MarkdownRenderer;

impl TemplateRenderer for MarkdownRenderer {
    fn render<'a>(
        &'a self,
        _scope: &'a Scope,
        template_path: &'a str,
        payload: &'a DataPayload,
    ) -> AdapterFuture<'a, RenderedDoc> {
        Box::pin(async move {
            let source = tokio::fs::read_to_string(template_path)
                .await
                .map_err(|e| {
                    AdapterError::new(format!("failed to read template {template_path}: {e}"))
                })?;

            let mut env = minijinja::Environment::new();
            env.add_template("report", &source)
                .map_err(|e| AdapterError::new(format!("failed to parse template: {e}")))?;
            let template = env
                .get_template("report")
                .map_err(|e| AdapterError::new(e.to_string()))?;

            let rows = minijinja::Value::from_serialize(&payload.rows);
            let content = template
                .render(context! {
                    rows => rows.clone(),
                    data => rows,
                })
                .map_err(|e| AdapterError::new(format!("failed to render template: {e}")))?;

            let html = markdown_to_html(&content);

            let mut meta = HashMap::new();
            meta.insert(
                "source".to_string(),
                serde_json::Value::String(template_path.to_string()),
            );
            meta.insert(
                "rows_count".to_string(),
                serde_json::Value::from(payload.row_count()),
            );

            Ok(RenderedDoc {
                html,
                content,
                meta,
            })
        })
    }
}

/// Minimal markdown→HTML conversion: ATX headings (levels 1-3), unordered
/// lists and paragraphs. Inline markup is passed through escaped.
fn markdown_to_html(markdown: &str) -> String {
    let mut html = String::with_capacity(markdown.len() + markdown.len() / 4);
    let mut in_list = false;
    let mut paragraph: Vec<&str> = Vec::new();

    let flush_paragraph = |html: &mut String, paragraph: &mut Vec<&str>| {
        if !paragraph.is_empty() {
            html.push_str("<p>");
            html.push_str(&escape_html(&paragraph.join(" ")));
            html.push_str("</p>\n");
            paragraph.clear();
        }
    };

    for line in markdown.lines() {
        let trimmed = line.trim();

        if let Some(item) = trimmed.strip_prefix("- ") {
            flush_paragraph(&mut html, &mut paragraph);
            if !in_list {
                html.push_str("<ul>\n");
                in_list = true;
            }
            html.push_str("<li>");
            html.push_str(&escape_html(item));
            html.push_str("</li>\n");
            continue;
        }
        if in_list {
            html.push_str("</ul>\n");
            in_list = false;
        }

        if trimmed.is_empty() {
            flush_paragraph(&mut html, &mut paragraph);
        } else if let Some(heading) = trimmed.strip_prefix("### ") {
            flush_paragraph(&mut html, &mut paragraph);
            html.push_str(&format!("<h3>{}</h3>\n", escape_html(heading)));
        } else if let Some(heading) = trimmed.strip_prefix("## ") {
            flush_paragraph(&mut html, &mut paragraph);
            html.push_str(&format!("<h2>{}</h2>\n", escape_html(heading)));
        } else if let Some(heading) = trimmed.strip_prefix("# ") {
            flush_paragraph(&mut html, &mut paragraph);
            html.push_str(&format!("<h1>{}</h1>\n", escape_html(heading)));
        } else {
            paragraph.push(trimmed);
        }
    }

    flush_paragraph(&mut html, &mut paragraph);
    if in_list {
        html.push_str("</ul>\n");
    }
    html
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

//! HTML rendering for the query page.

use crate::error::{GlanceError, Result};
use crate::gate::ResultSet;
use crate::service::PageState;
use std::fmt::{self, Write};

/// Turns a page state into a response body.
pub trait PageRenderer: Send + Sync {
    fn render(&self, state: &PageState) -> Result<String>;
}

/// Renders a single self-contained HTML page.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

const STYLE: &str = "body{font-family:sans-serif;margin:2em;max-width:72em}\
textarea{width:100%;font-family:monospace}\
table{border-collapse:collapse;margin-top:1em}\
th,td{border:1px solid #ccc;padding:.3em .6em;text-align:left}\
th{background:#f3f3f3}\
.error{background:#fde8e8;border:1px solid #e0a0a0;padding:.6em;margin-top:1em}\
.null{color:#999;font-style:italic}\
.meta{color:#666;margin-top:1em}";

impl PageRenderer for HtmlRenderer {
    fn render(&self, state: &PageState) -> Result<String> {
        let mut html = String::with_capacity(4096);
        write_page(&mut html, state)
            .map_err(|e| GlanceError::render(format!("Failed to write page: {e}")))?;
        Ok(html)
    }
}

fn write_page(html: &mut String, state: &PageState) -> fmt::Result {
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>SQL Runner</title>\n");
    writeln!(html, "<style>{STYLE}</style>")?;
    html.push_str("</head>\n<body>\n<h1>SQL Runner</h1>\n");

    html.push_str("<form method=\"post\" action=\"/\">\n");
    html.push_str("<label for=\"database\">Database</label>\n");
    html.push_str("<select id=\"database\" name=\"database\">\n");
    for name in &state.databases {
        let selected = if *name == state.selected_database {
            " selected"
        } else {
            ""
        };
        let name = escape_html(name);
        writeln!(html, "<option value=\"{name}\"{selected}>{name}</option>")?;
    }
    html.push_str("</select>\n");
    html.push_str("<p><textarea name=\"query\" rows=\"8\" placeholder=\"SELECT * FROM ...\">");
    writeln!(html, "{}</textarea></p>", escape_html(&state.query))?;
    html.push_str("<button type=\"submit\">Run</button>\n</form>\n");

    if let Some(error) = &state.error {
        writeln!(html, "<div class=\"error\">{}</div>", escape_html(error))?;
    }

    if let Some(result) = &state.result {
        write_result(html, result)?;
    }

    html.push_str("</body>\n</html>\n");
    Ok(())
}

fn write_result(html: &mut String, result: &ResultSet) -> fmt::Result {
    writeln!(html, "<p class=\"meta\">{} row(s)</p>", result.row_count)?;
    if result.columns.is_empty() {
        return Ok(());
    }

    html.push_str("<table>\n<thead><tr>");
    for column in &result.columns {
        write!(html, "<th>{}</th>", escape_html(column))?;
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for row in &result.rows {
        html.push_str("<tr>");
        // Duplicate column names share the row's single entry.
        for column in &result.columns {
            match row.get(column) {
                Some(value) if !value.is_null() => {
                    write!(html, "<td>{}</td>", escape_html(&value.to_string()))?;
                }
                _ => html.push_str("<td class=\"null\">NULL</td>"),
            }
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>\n");
    Ok(())
}

/// Escapes text for use in HTML content and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

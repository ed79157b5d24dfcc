use crate::html::escape_html;
use serde::{Deserialize, Serialize};

pub const SCHEMAFORM_RUNTIME_JS: &str = include_str!("schemaform-runtime.js");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Theme {
    pub font_sans: String,
    pub text: String,
    pub muted: String,
    pub surface: String,
    pub border: String,
    pub brand: String,
    pub brand_dark: String,
    pub danger: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            font_sans: "Inter, system-ui, sans-serif".to_string(),
            text: "#0f172a".to_string(),
            muted: "#64748b".to_string(),
            surface: "#ffffff".to_string(),
            border: "#e2e8f0".to_string(),
            brand: "#2563eb".to_string(),
            brand_dark: "#1d4ed8".to_string(),
            danger: "#dc2626".to_string(),
        }
    }
}

fn base_css(theme: &Theme) -> String {
    format!(
        r#"
html, body {{
  margin: 0;
  padding: 0;
}}

#sf-root {{
  max-width: 760px;
  margin: 0 auto;
  padding: 24px;
  font-family: {};
  color: {};
  -webkit-font-smoothing: antialiased;
}}

#sf-root * {{
  box-sizing: border-box;
}}

.sf-field {{
  display: flex;
  flex-direction: column;
  gap: 6px;
  margin-bottom: 16px;
}}

#sf-root input:not([type=checkbox]),
#sf-root select,
#sf-root textarea {{
  font: inherit;
  border: 1px solid {};
  border-radius: 10px;
  background: {};
  min-height: 40px;
  padding: 8px 12px;
}}

#sf-root button {{
  font: inherit;
  border: 1px solid {};
  border-radius: 10px;
  background: {};
  color: #ffffff;
  font-weight: 600;
  padding: 8px 14px;
  cursor: pointer;
}}

#sf-root button:hover {{
  background: {};
}}

#sf-root button[disabled] {{
  opacity: 0.5;
  cursor: not-allowed;
}}

#sf-root button.sf-link,
#sf-root button.sf-remove {{
  background: transparent;
  color: {};
  border-color: transparent;
}}

.sf-required, .sf-error, .sf-upload-error {{
  color: {};
}}

.sf-notice, .sf-uploading, .sf-empty {{
  color: {};
}}

.sf-view-row {{
  display: grid;
  grid-template-columns: 200px 1fr;
  gap: 12px;
  padding: 10px 0;
  border-bottom: 1px solid {};
}}

.sf-card, .sf-file {{
  border: 1px solid {};
  border-radius: 10px;
  padding: 10px 12px;
  margin: 0 0 8px;
}}

.sf-file-grid {{
  display: flex;
  flex-wrap: wrap;
  gap: 12px;
}}

.sf-file img, .sf-file video {{
  max-width: 160px;
  max-height: 120px;
  display: block;
}}
"#,
        theme.font_sans,
        theme.text,
        theme.border,
        theme.surface,
        theme.brand,
        theme.brand,
        theme.brand_dark,
        theme.brand,
        theme.danger,
        theme.muted,
        theme.border,
        theme.border,
    )
}

/// Full HTML document around `body`. `base` is the URL prefix the runtime
/// posts form events to; pass `None` for read-only pages.
pub fn render_page(title: &str, body: &str, theme: &Theme, base: Option<&str>) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    html.push_str(&format!("<style>{}</style>\n", base_css(theme)));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(title)));
    match base {
        Some(base) => {
            html.push_str(&format!(
                "<div id=\"sf-root\" data-sf-base=\"{}\">\n{}</div>\n",
                escape_html(base),
                body
            ));
            html.push_str(&format!("<script>{}</script>\n", SCHEMAFORM_RUNTIME_JS));
        }
        None => html.push_str(&format!("<div id=\"sf-root\">\n{}</div>\n", body)),
    }
    html.push_str("</body>\n</html>");
    html
}

use crate::download::download_proxy_url;
use crate::html::{escape_html, is_safe_href};
use schemaform_core::media::FileClass;
use schemaform_core::view::{Card, FileRef};
use schemaform_core::{DisplayValue, ViewEntry};

#[derive(Debug, Clone)]
pub struct ViewOptions {
    /// Base URL of the download proxy endpoint.
    pub proxy_base: String,
    pub empty_text: String,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            proxy_base: "/download".to_string(),
            empty_text: "-".to_string(),
        }
    }
}

pub fn render_view(entries: &[ViewEntry], options: &ViewOptions) -> String {
    let mut html = String::from("<dl class=\"sf-view\">\n");
    for entry in entries {
        html.push_str(&format!(
            "<div class=\"sf-view-row\" data-path=\"{}\">\n  <dt>{}</dt>\n  <dd>{}</dd>\n</div>\n",
            escape_html(&entry.path),
            escape_html(&entry.label),
            render_value(&entry.value, options)
        ));
    }
    html.push_str("</dl>\n");
    html
}

fn render_value(value: &DisplayValue, options: &ViewOptions) -> String {
    match value {
        DisplayValue::Empty => format!(
            "<span class=\"sf-empty\">{}</span>",
            escape_html(&options.empty_text)
        ),
        DisplayValue::Text(text) => format!("<span class=\"sf-text\">{}</span>", escape_html(text)),
        DisplayValue::Boolean(true) => {
            "<span class=\"sf-bool sf-bool-yes\" role=\"img\" aria-label=\"Yes\">&#10003;</span>".to_string()
        }
        DisplayValue::Boolean(false) => {
            "<span class=\"sf-bool sf-bool-no\" role=\"img\" aria-label=\"No\">&#10007;</span>".to_string()
        }
        DisplayValue::List(items) => {
            let mut html = String::from("<ul class=\"sf-list\">");
            for item in items {
                html.push_str(&format!("<li>{}</li>", escape_html(item)));
            }
            html.push_str("</ul>");
            html
        }
        DisplayValue::Link(url) if is_safe_href(url) => format!(
            "<a href=\"{0}\" target=\"_blank\" rel=\"noopener noreferrer\">{0}</a>",
            escape_html(url)
        ),
        DisplayValue::Link(url) => format!("<span class=\"sf-text\">{}</span>", escape_html(url)),
        DisplayValue::Cards(cards) => {
            let mut html = String::from("<div class=\"sf-cards\">");
            for card in cards {
                html.push_str(&render_card(card));
            }
            html.push_str("</div>");
            html
        }
        DisplayValue::Files(files) => {
            let mut html = String::from("<div class=\"sf-file-grid\">");
            for file in files {
                html.push_str(&render_file(file, options));
            }
            html.push_str("</div>");
            html
        }
        DisplayValue::Group(entries) => {
            let mut html = String::from("<dl class=\"sf-prefix-group\">");
            for (key, text) in entries {
                html.push_str(&format!(
                    "<dt>{}</dt><dd>{}</dd>",
                    escape_html(key),
                    escape_html(text)
                ));
            }
            html.push_str("</dl>");
            html
        }
    }
}

// Card text is always escaped, including message bodies that arrive with
// markup in them.
fn render_card(card: &Card) -> String {
    let mut html = String::from("<article class=\"sf-card\">");
    if let Some(message) = &card.message {
        html.push_str(&format!("<p class=\"sf-card-message\">{}</p>", escape_html(message)));
    }
    if let Some(time) = &card.time {
        html.push_str(&format!("<time class=\"sf-card-time\">{}</time>", escape_html(time)));
    }
    if !card.items.is_empty() {
        html.push_str("<ul>");
        for item in &card.items {
            html.push_str(&format!("<li>{}</li>", escape_html(item)));
        }
        html.push_str("</ul>");
    }
    html.push_str("</article>");
    html
}

fn thumbnail(file: &FileRef) -> String {
    let url = escape_html(&file.url);
    let name = escape_html(&file.file_name);
    match file.class {
        FileClass::Image => format!("<img src=\"{url}\" alt=\"{name}\" loading=\"lazy\">"),
        FileClass::Video => format!("<video src=\"{url}\" preload=\"metadata\" muted></video>"),
        FileClass::Pdf => "<span class=\"sf-thumb sf-thumb-pdf\">PDF</span>".to_string(),
        FileClass::Audio => "<span class=\"sf-thumb sf-thumb-audio\">AUDIO</span>".to_string(),
        FileClass::Document => format!(
            "<span class=\"sf-thumb sf-thumb-doc\">{}</span>",
            escape_html(
                &schemaform_core::media::extension(&file.url)
                    .unwrap_or_default()
                    .to_ascii_uppercase()
            )
        ),
        FileClass::Other => "<span class=\"sf-thumb\">FILE</span>".to_string(),
    }
}

fn render_file(file: &FileRef, options: &ViewOptions) -> String {
    let download = download_proxy_url(&options.proxy_base, &file.url, &file.file_name);
    let view_link = if is_safe_href(&file.url) {
        format!(
            "<a class=\"sf-file-view\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">View</a>",
            escape_html(&file.url)
        )
    } else {
        String::new()
    };
    format!(
        "<figure class=\"sf-file\">{}<figcaption>{}</figcaption>{}<a class=\"sf-file-download\" href=\"{}\">Download</a></figure>",
        thumbnail(file),
        escape_html(&file.file_name),
        view_link,
        escape_html(&download)
    )
}

//! Web page rendering for the oracle.
//!
//! Fetches a URL over HTTP and returns either the raw HTML or its visible
//! text. The text rendering is deliberately simple: scripts, styles and
//! tags are dropped, common entities decoded, whitespace collapsed.

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::debug;

use crate::nondet::RenderMode;

/// Elements whose content is never visible text.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Block-level tags that start a new line in the text rendering.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "tr", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6",
    "section", "article", "header", "footer", "ul", "ol", "table", "span",
];

pub struct WebRenderer {
    http: Client,
    max_chars: usize,
}

impl WebRenderer {
    pub fn new(timeout_secs: u64, user_agent: &str, max_chars: usize) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("Failed to build web renderer HTTP client")?;
        Ok(Self { http, max_chars })
    }

    /// Fetch `url` and render it according to `mode`.
    pub async fn render(&self, url: &str, mode: RenderMode) -> Result<String> {
        let resp = self.http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {status} from {url}");
        }

        let body = resp.text().await
            .with_context(|| format!("Failed to read body from {url}"))?;

        let rendered = match mode {
            RenderMode::Html => body,
            RenderMode::Text => truncate_chars(&html_to_text(&body), self.max_chars),
        };

        if rendered.trim().is_empty() {
            anyhow::bail!("Empty page from {url}");
        }

        debug!(url, %mode, chars = rendered.len(), "Page rendered");
        Ok(rendered)
    }
}

/// Reduce an HTML document to its visible text.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 4);
    // ASCII lowercasing keeps byte offsets, so `lower[pos..]` lines up
    // with `html[pos..]`.
    let lower = html.to_ascii_lowercase();
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        rest = &rest[lt..];

        let Some(gt) = rest.find('>') else {
            // Unterminated tag: drop the remainder.
            rest = "";
            break;
        };
        let tag = &rest[1..gt];
        rest = &rest[gt + 1..];

        if tag.starts_with("!--") {
            if tag.len() >= 5 && tag.ends_with("--") {
                continue;
            }
            rest = match rest.find("-->") {
                Some(end) => &rest[end + 3..],
                None => "",
            };
            continue;
        }

        let name = tag_name(tag);
        if HIDDEN_ELEMENTS.contains(&name.as_str()) && !tag.starts_with('/') && !tag.ends_with('/') {
            let close = format!("</{name}");
            let offset = html.len() - rest.len();
            match lower[offset..].find(&close) {
                Some(pos) => {
                    let after = &rest[pos..];
                    rest = after.find('>').map(|i| &after[i + 1..]).unwrap_or("");
                }
                None => rest = "",
            }
            continue;
        }

        if BLOCK_TAGS.contains(&name.as_str()) {
            out.push('\n');
        } else {
            out.push(' ');
        }
    }
    out.push_str(rest);

    collapse_whitespace(&decode_entities(&out))
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&amp;", "&")
}

/// Collapse runs of spaces within lines and drop blank lines.
fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tags_and_scripts() {
        let html = r#"<html><head><style>.x{color:red}</style>
            <script>var a = "<b>";</script></head>
            <body><div>Arsenal</div><div>2 - 1</div><div>Chelsea</div></body></html>"#;
        let text = html_to_text(html);
        assert_eq!(text, "Arsenal\n2 - 1\nChelsea");
    }

    #[test]
    fn test_decodes_entities() {
        let text = html_to_text("<p>Brighton &amp; Hove&nbsp;Albion</p>");
        assert_eq!(text, "Brighton & Hove Albion");
    }

    #[test]
    fn test_drops_comments() {
        let text = html_to_text("<p>a<!-- hidden <b>x</b> -->b</p>");
        assert_eq!(text, "ab");
    }

    #[test]
    fn test_inline_tags_become_spaces() {
        let text = html_to_text("<p>Kick <b>off</b> 15:00</p>");
        assert_eq!(text, "Kick off 15:00");
    }

    #[test]
    fn test_uppercase_script_tag_hidden() {
        let text = html_to_text("<SCRIPT>secret()</SCRIPT><p>shown</p>");
        assert_eq!(text, "shown");
    }

    #[test]
    fn test_many_hidden_elements_in_mixed_case() {
        let mut html = String::new();
        for i in 0..200 {
            html.push_str(&format!("<Script>var x{i} = 1;</sCRIPT><p>row {i}</p>"));
        }
        let text = html_to_text(&html);
        assert!(!text.contains("var"));
        assert!(text.starts_with("row 0\nrow 1\n"));
        assert!(text.ends_with("row 199"));
    }

    #[test]
    fn test_hidden_element_after_multibyte_text() {
        let text = html_to_text("<p>Atlético 1 – 0 Señor</p><style>p{}</style><p>FT</p>");
        assert_eq!(text, "Atlético 1 – 0 Señor\nFT");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars("ééé", 2), "éé");
    }

    #[test]
    fn test_renderer_construction() {
        assert!(WebRenderer::new(10, "football-bets/0.1.0", 20_000).is_ok());
    }
}

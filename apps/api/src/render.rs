//! HTML fragments carried in SSE payloads. The front end swaps them into the
//! page as-is, so every piece of user or model text is escaped here.

/// Severity of an alert fragment. Hard errors render red, soft warnings yellow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Error,
    Warning,
}

impl AlertLevel {
    fn classes(self) -> &'static str {
        match self {
            AlertLevel::Error => "alert alert-error border-red-400 bg-red-50 text-red-800",
            AlertLevel::Warning => "alert alert-warning border-yellow-400 bg-yellow-50 text-yellow-800",
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn progress_item(message: &str) -> String {
    format!("<li>{}</li>", escape_html(message))
}

pub fn alert(message: &str, level: AlertLevel) -> String {
    format!(
        "<div class=\"{}\" role=\"alert\">{}</div>",
        level.classes(),
        escape_html(message)
    )
}

/// Bullet lines (`- ...`) become list items; anything else is a paragraph.
pub fn introduction_fragment(introduction: &str) -> String {
    let mut bullets = Vec::new();
    let mut paragraphs = Vec::new();
    for line in introduction.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            Some(bullet) => bullets.push(format!("<li>{}</li>", escape_html(bullet.trim()))),
            None => paragraphs.push(format!("<p>{}</p>", escape_html(line))),
        }
    }

    let mut html = String::from("<div id=\"introduction-preview\" class=\"introduction\">\n");
    html.push_str("<h3>AI Introduction</h3>\n");
    for p in &paragraphs {
        html.push_str(p);
        html.push('\n');
    }
    if !bullets.is_empty() {
        html.push_str("<ul>\n");
        html.push_str(&bullets.join("\n"));
        html.push_str("\n</ul>\n");
    }
    html.push_str("</div>");
    html
}

/// Final document preview: an editable textarea holding the reconstructed Markdown.
pub fn refined_result_fragment(markdown: &str) -> String {
    format!(
        "<div id=\"refinement-result\" class=\"refinement-result\">\n\
         <h3>Refined Resume</h3>\n\
         <textarea name=\"refined_content\" rows=\"30\" class=\"w-full font-mono\">{}</textarea>\n\
         </div>",
        escape_html(markdown)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<b>"R&D" it's</b>"#),
            "&lt;b&gt;&quot;R&amp;D&quot; it&#x27;s&lt;/b&gt;"
        );
    }

    #[test]
    fn test_progress_item_escapes_role_names() {
        assert_eq!(
            progress_item("Refining role 'Dev @ <Acme>'..."),
            "<li>Refining role &#x27;Dev @ &lt;Acme&gt;&#x27;...</li>"
        );
    }

    #[test]
    fn test_alert_levels_use_distinct_colours() {
        let error = alert("boom", AlertLevel::Error);
        let warning = alert("hmm", AlertLevel::Warning);
        assert!(error.contains("red") && !error.contains("yellow"));
        assert!(warning.contains("yellow") && !warning.contains("red"));
        assert!(warning.contains(">hmm</div>"));
    }

    #[test]
    fn test_introduction_bullets_become_list_items() {
        let html = introduction_fragment("- Ships Rust\n- Cut costs <50%");
        assert!(html.contains("<li>Ships Rust</li>"));
        assert!(html.contains("<li>Cut costs &lt;50%</li>"));
        assert!(!html.contains("<p>"));
    }

    #[test]
    fn test_result_fragment_escapes_markdown() {
        let html = refined_result_fragment("# Jane & Co\n### A @ <B>");
        assert!(html.contains("# Jane &amp; Co\n### A @ &lt;B&gt;</textarea>"));
    }
}

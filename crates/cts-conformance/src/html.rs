//! HTML pages written by batch mode.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use cts_config::RedisVersion;
use tracing::warn;

const INDEX_PREAMBLE: &str = "This page is automatically generated by redis_compatibility_test \
to show the compatibility of the following Redis-like systems with different versions of Redis.<br><br>";
const INDEX_STYLE: &str =
    "<style>table {border-collapse: collapse;} th, td {border: 1px solid black; padding: 8px;}</style>";

pub const RED: &str = "#f05654";
pub const ORANGE: &str = "#ffa400";
pub const GREEN: &str = "#40de5a";

#[must_use]
pub fn detail_file_name(database: &str, version: RedisVersion) -> String {
    format!("{database}-{version}.html")
}

/// A preformatted page holding one run's transcript followed by its report.
#[must_use]
pub fn detail_page(transcript: &str, report: &str) -> String {
    let mut out = String::from("<pre>\n");
    out.push_str(&escape(transcript));
    out.push_str(&escape(report));
    out.push_str("</pre>\n");
    out
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// First `rate: <digits>.<digits>%` token in `text`, as written.
#[must_use]
pub fn extract_rate(text: &str) -> Option<&str> {
    const MARKER: &str = "rate: ";
    let mut rest = text;
    while let Some(pos) = rest.find(MARKER) {
        let candidate = &rest[pos + MARKER.len()..];
        if let Some(rate) = leading_rate(candidate) {
            return Some(rate);
        }
        rest = candidate;
    }
    None
}

fn leading_rate(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let int_len = bytes.iter().take_while(|byte| byte.is_ascii_digit()).count();
    if int_len == 0 || bytes.get(int_len) != Some(&b'.') {
        return None;
    }
    let frac_len = bytes[int_len + 1..]
        .iter()
        .take_while(|byte| byte.is_ascii_digit())
        .count();
    let end = int_len + 1 + frac_len;
    if frac_len == 0 || bytes.get(end) != Some(&b'%') {
        return None;
    }
    Some(&text[..end])
}

#[must_use]
pub fn rate_color(rate: f64) -> &'static str {
    if rate < 80.0 {
        RED
    } else if rate < 100.0 {
        ORANGE
    } else {
        GREEN
    }
}

/// The `index.html` matrix: one row per database, one column per version.
///
/// Each cell reads the matching detail page from `dir`. A page that is missing
/// or carries no rate renders as `-`.
#[must_use]
pub fn render_index<'a>(
    dir: &Path,
    databases: impl IntoIterator<Item = &'a str>,
    versions: &[RedisVersion],
) -> String {
    let mut out = String::from(INDEX_PREAMBLE);
    out.push_str("<table><thead><tr><th>Product / Redis Version</th>");
    for version in versions {
        let _ = write!(out, "<th>{version}</th>");
    }
    out.push_str("</tr></thead><tbody>");
    for database in databases {
        let _ = write!(out, "<tr><td>{}</td>", escape(database));
        for &version in versions {
            out.push_str(&index_cell(dir, database, version));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out.push_str(INDEX_STYLE);
    out.push('\n');
    out
}

fn index_cell(dir: &Path, database: &str, version: RedisVersion) -> String {
    let file_name = detail_file_name(database, version);
    let page = match fs::read_to_string(dir.join(&file_name)) {
        Ok(page) => page,
        Err(err) => {
            warn!(file = %file_name, error = %err, "detail report missing");
            return "<td>-</td>".to_string();
        }
    };
    let Some(rate) = extract_rate(&page) else {
        warn!(file = %file_name, "detail report has no rate");
        return "<td>-</td>".to_string();
    };
    let color = rate.parse::<f64>().map_or(RED, rate_color);
    format!(
        "<td style=\"background:{color}\">{rate}% <a href=\"{}\">detail</a></td>",
        escape(&file_name)
    )
}

#[cfg(test)]
mod tests {
    use std::fs;

    use cts_config::RedisVersion;

    use super::{GREEN, ORANGE, RED, detail_page, extract_rate, rate_color, render_index};

    #[test]
    fn rate_token_is_found_after_other_text() {
        let text = "rate: n/a\nSummary: version: 6.2.0, total tests: 4, passed: 3, rate: 75.00%\n";
        assert_eq!(extract_rate(text), Some("75.00"));
        assert_eq!(extract_rate("rate: 100%"), None);
        assert_eq!(extract_rate("nothing here"), None);
    }

    #[test]
    fn colors_follow_thresholds() {
        assert_eq!(rate_color(0.0), RED);
        assert_eq!(rate_color(79.99), RED);
        assert_eq!(rate_color(80.0), ORANGE);
        assert_eq!(rate_color(99.99), ORANGE);
        assert_eq!(rate_color(100.0), GREEN);
    }

    #[test]
    fn detail_page_escapes_markup() {
        let page = detail_page("test: <x> passed\n", "rate: 1.00%\n");
        assert_eq!(page, "<pre>\ntest: &lt;x&gt; passed\nrate: 1.00%\n</pre>\n");
    }

    #[test]
    fn index_renders_rates_and_placeholders() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("Redis-6.2.0.html"),
            "<pre>\nSummary: version: 6.2.0, total tests: 2, passed: 2, rate: 100.00%\n</pre>\n",
        )
        .expect("write detail");
        fs::write(dir.path().join("Redis-7.0.0.html"), "<pre>\n</pre>\n").expect("write detail");

        let index = render_index(
            dir.path(),
            ["Redis", "Other"],
            &[RedisVersion::V6_2_0, RedisVersion::V7_0_0],
        );
        assert!(index.contains("<th>6.2.0</th><th>7.0.0</th>"));
        assert!(index.contains(
            "<tr><td>Redis</td><td style=\"background:#40de5a\">100.00% \
             <a href=\"Redis-6.2.0.html\">detail</a></td><td>-</td></tr>"
        ));
        assert!(index.contains("<tr><td>Other</td><td>-</td><td>-</td></tr>"));
    }
}

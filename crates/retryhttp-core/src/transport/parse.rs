//! Parse raw response header lines collected by the curl header callback.

use crate::request::Headers;

/// Turns header lines into [`Headers`].
///
/// Status lines (`HTTP/1.1 200 OK`) and blank separators are skipped. When
/// redirects are followed curl reports every hop; callers clear their line
/// buffer on each status line so only the final response is parsed here.
pub fn parse_header_lines(lines: &[String]) -> Headers {
    let mut headers = Headers::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with("HTTP/") {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            headers.append(name, value.trim());
        }
    }
    headers
}

/// Status code from the last status line, e.g. `503` from `HTTP/1.1 503 Busy`.
pub fn parse_status_code(lines: &[String]) -> Option<u32> {
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("HTTP/"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
}

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::types::{Headers, ParsedMessage};
use crate::utils::fallback::first_non_empty_or;

static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n\r?\n").expect("blank line pattern is valid"));

static BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"boundary="?([^";\r\n]+)"?"#).expect("boundary pattern is valid")
});

const HTML_PART_MARKER: &str = "Content-Type: text/html";
const PLAIN_PART_MARKER: &str = "Content-Type: text/plain";

/// Best-effort message parser
///
/// Parsing never fails: anything it cannot make sense of is skipped and the
/// documented defaults of [`ParsedMessage`] apply.
pub struct MessageParser;

impl MessageParser {
    /// Parse raw stored bytes, decoding them as lossy UTF-8
    pub fn parse_bytes(message: &[u8]) -> ParsedMessage {
        Self::parse(&String::from_utf8_lossy(message))
    }

    /// Parse a raw message into headers, addressing fields and a display body
    pub fn parse(message: &str) -> ParsedMessage {
        let (header_block, body_block) = Self::split_headers_body(message);
        let headers = Self::parse_headers(header_block);

        let content_type = headers.get("content-type").unwrap_or("");
        let mut is_html = content_type.contains("text/html");
        let mut body = body_block;

        if content_type.contains("multipart/") {
            match Self::extract_boundary(content_type) {
                Some(boundary) => {
                    if let Some((part_body, part_is_html)) =
                        Self::select_part(body_block, &boundary)
                    {
                        body = part_body;
                        is_html = part_is_html;
                    }
                }
                None => debug!("multipart content type without boundary: {}", content_type),
            }
        }

        let field = |name: &str| first_non_empty_or(&[headers.get(name)], "").to_string();
        let subject = first_non_empty_or(&[headers.get("subject")], "No Subject").to_string();
        let from = field("from");
        let to = field("to");
        let cc = field("cc");
        let date = field("date");

        ParsedMessage {
            headers,
            subject,
            from,
            to,
            cc,
            date,
            is_html,
            body: body.to_string(),
        }
    }

    /// Split at the first blank line; without one the whole input is headers
    fn split_headers_body(message: &str) -> (&str, &str) {
        match BLANK_LINE.find(message) {
            Some(m) => (&message[..m.start()], &message[m.end()..]),
            None => (message, ""),
        }
    }

    /// Parse a header block, folding whitespace-led continuation lines
    fn parse_headers(header_block: &str) -> Headers {
        let mut headers = Headers::new();
        let mut last_name: Option<String> = None;

        for line in header_block.lines() {
            if line.starts_with(char::is_whitespace) {
                // Continuations before the first header have nothing to attach to
                if let Some(value) = last_name.as_deref().and_then(|name| headers.get_mut(name)) {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }

            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            let name = name.trim().to_lowercase();
            headers.insert(&name, value.trim().to_string());
            last_name = Some(name);
        }

        headers
    }

    /// Extract the boundary parameter from a Content-Type value
    fn extract_boundary(content_type: &str) -> Option<String> {
        BOUNDARY
            .captures(content_type)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Split a multipart body into its parts
    ///
    /// The line break before a delimiter belongs to the delimiter, and the
    /// close delimiter ends the sequence. The preamble is kept as the first
    /// element.
    fn split_parts<'a>(body: &'a str, boundary: &str) -> Vec<&'a str> {
        let escaped = regex::escape(boundary);

        let body = match Regex::new(&format!(r"(?:\r?\n)?--{}--", escaped)) {
            Ok(close) => close.find(body).map_or(body, |m| &body[..m.start()]),
            Err(_) => body,
        };

        match Regex::new(&format!(r"(?:\r?\n)?--{}\r?\n", escaped)) {
            Ok(delimiter) => delimiter.split(body).collect(),
            Err(e) => {
                debug!("unusable boundary {:?}: {}", boundary, e);
                Vec::new()
            }
        }
    }

    /// Pick the display part: the first html part wins outright, otherwise the
    /// first plain-text part. Returns the part body and whether it is html.
    fn select_part<'a>(body: &'a str, boundary: &str) -> Option<(&'a str, bool)> {
        let mut plain_candidate: Option<&str> = None;

        for part in Self::split_parts(body, boundary) {
            if part.contains(HTML_PART_MARKER) {
                return Some((Self::split_headers_body(part).1, true));
            }
            if plain_candidate.is_none() && part.contains(PLAIN_PART_MARKER) {
                plain_candidate = Some(part);
            }
        }

        plain_candidate.map(|part| (Self::split_headers_body(part).1, false))
    }
}

//! TwiML generation for connecting a call to the media stream endpoint.

use url::Url;

/// Escape the five XML special characters.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// TwiML telling Twilio to open a bidirectional media stream to `ws_url`.
pub fn twiml_for_stream(ws_url: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n  <Connect>\n    <Stream url=\"{}\" />\n  </Connect>\n</Response>",
        escape_xml(ws_url)
    )
}

/// Resolve `path` against the public base URL and switch http(s) to ws(s).
pub fn ws_url_from_public_base(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut url = base.join(path)?;
    let scheme = match url.scheme() {
        "https" => Some("wss"),
        "http" => Some("ws"),
        _ => None,
    };
    if let Some(scheme) = scheme {
        let _ = url.set_scheme(scheme);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"a&b<c>"d"'e'"#),
            "a&amp;b&lt;c&gt;&quot;d&quot;&apos;e&apos;"
        );
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn test_twiml_for_stream() {
        let xml = twiml_for_stream("wss://example.com/twilio?a=1&b=2");
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n  <Connect>\n    <Stream url=\"wss://example.com/twilio?a=1&amp;b=2\" />\n  </Connect>\n</Response>"
        );
    }

    #[test]
    fn test_ws_url_from_public_base() {
        let https = Url::parse("https://vox.example.com").unwrap();
        assert_eq!(
            ws_url_from_public_base(&https, "/twilio").unwrap().as_str(),
            "wss://vox.example.com/twilio"
        );

        let http = Url::parse("http://localhost:3000/base/").unwrap();
        assert_eq!(
            ws_url_from_public_base(&http, "/twilio").unwrap().as_str(),
            "ws://localhost:3000/twilio"
        );

        let already_ws = Url::parse("wss://edge.example.com").unwrap();
        assert_eq!(
            ws_url_from_public_base(&already_ws, "/twilio").unwrap().as_str(),
            "wss://edge.example.com/twilio"
        );
    }
}

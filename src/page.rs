use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{Html, IntoResponse, Response};
use rand::Rng;

/// Upper bound for any configured delay
pub const MAX_DELAY: Duration = Duration::from_secs(10);

pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("cache-control", "no-store, no-cache, must-revalidate, private"),
    ("pragma", "no-cache"),
    ("expires", "0"),
    ("referrer-policy", "no-referrer"),
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("clear-site-data", "\"cache\", \"cookies\", \"storage\""),
    ("cross-origin-resource-policy", "same-origin"),
    ("cross-origin-opener-policy", "same-origin"),
    ("permissions-policy", "interest-cohort=()"),
];

pub fn security_headers() -> HeaderMap {
    SECURITY_HEADERS
        .iter()
        .map(|&(name, value)| (HeaderName::from_static(name), HeaderValue::from_static(value)))
        .collect()
}

/// Inclusive window the hand-off delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectDelay {
    min: Duration,
    max: Duration,
}

impl RedirectDelay {
    /// `None` unless `min <= max <= MAX_DELAY`.
    pub fn new(min: Duration, max: Duration) -> Option<Self> {
        (min <= max && max <= MAX_DELAY).then_some(Self { min, max })
    }

    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl Default for RedirectDelay {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(3),
        }
    }
}

#[derive(Debug)]
pub struct RedirectPage {
    pub headers: HeaderMap,
    pub body: String,
}

impl IntoResponse for RedirectPage {
    fn into_response(self) -> Response {
        let mut response = Html(self.body).into_response();
        response.headers_mut().extend(self.headers);
        response
    }
}

pub fn render(clean_url: &str, delay: Duration) -> RedirectPage {
    let delay_ms = delay.as_millis();
    let refresh_secs = delay_ms.div_ceil(1000);
    let js_url = js_string(clean_url);
    let attr_url = escape_html(clean_url);

    let body = format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="referrer" content="no-referrer">
    <noscript>
      <meta http-equiv="refresh" content="{refresh_secs};url={attr_url}">
    </noscript>
    <script>
      try {{
        localStorage.clear();
        sessionStorage.clear();
        document.cookie.split(";").forEach(function (c) {{
          document.cookie = c.replace(/^ +/, "").replace(/=.*/, "=;expires=" + new Date(0).toUTCString() + ";path=/");
        }});
      }} catch (e) {{}}
      setTimeout(function () {{
        window.location.replace({js_url});
      }}, {delay_ms});
    </script>
    <style>
      body {{
        font-family: system-ui, -apple-system, sans-serif;
        background: #000;
        color: #fff;
        display: flex;
        align-items: center;
        justify-content: center;
        height: 100vh;
        margin: 0;
      }}
      .loader {{
        border: 3px solid rgba(255, 255, 255, 0.3);
        border-radius: 50%;
        border-top: 3px solid #fff;
        width: 30px;
        height: 30px;
        animation: spin 1s linear infinite;
        margin-right: 15px;
      }}
      @keyframes spin {{
        0% {{ transform: rotate(0deg); }}
        100% {{ transform: rotate(360deg); }}
      }}
      .container {{
        display: flex;
        align-items: center;
      }}
    </style>
  </head>
  <body>
    <div class="container">
      <div class="loader"></div>
      <div>Redirecting securely...</div>
    </div>
  </body>
</html>
"#
    );

    RedirectPage {
        headers: security_headers(),
        body,
    }
}

// JSON string literal that cannot close the surrounding <script> element
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_owned())
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

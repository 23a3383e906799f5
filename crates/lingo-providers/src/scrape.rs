//! Shared plumbing for the dictionary page scrapers.

use std::time::Duration;

use regex::Regex;

use lingo_core::{Error, Result};

pub(crate) fn http_client(user_agent: &str, timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .expect("reqwest client build")
}

/// Fetch a dictionary page. A non-success status (the usual "no such word"
/// signal) is `Ok(None)`; only transport failures become `Err`.
pub(crate) async fn fetch_html(
    http: &reqwest::Client,
    url: &str,
    source: &str,
) -> Result<Option<String>> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Provider(format!("{source} request error: {e}")))?;

    if !resp.status().is_success() {
        return Ok(None);
    }

    let body = resp
        .text()
        .await
        .map_err(|e| Error::Provider(format!("{source} body error: {e}")))?;
    Ok(Some(body))
}

/// First capture group of `re` in `html`, tags stripped and trimmed.
pub(crate) fn first_capture(re: &Regex, html: &str) -> Option<String> {
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| clean_fragment(m.as_str()))
        .filter(|s| !s.is_empty())
}

/// Drop markup and decode the handful of entities dictionary pages use.
pub(crate) fn clean_fragment(fragment: &str) -> String {
    let tag = Regex::new(r"<[^>]+>").expect("static regex");
    let text = tag.replace_all(fragment, " ");
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_fragment_strips_nested_markup() {
        let got = clean_fragment("a <span class=\"x\">cold</span>&nbsp;drink &amp; more\n  here");
        assert_eq!(got, "a cold drink & more here");
    }

    #[test]
    fn first_capture_skips_empty_matches() {
        let re = Regex::new(r#"<b>(.*?)</b>"#).unwrap();
        assert_eq!(first_capture(&re, "<b>  </b>"), None);
        assert_eq!(
            first_capture(&re, "<b> word </b>").as_deref(),
            Some("word")
        );
    }
}

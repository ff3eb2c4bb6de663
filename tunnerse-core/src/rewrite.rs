//! HTML content rewriting for path-prefix routing
//!
//! When a tunnel is mounted under `https://{domain}/{id}` there is no
//! subdomain to anchor root-relative links, so HTML bodies are rewritten
//! before they leave the agent. Two strategies exist; exactly one is active
//! per deployment. Applying both double-prefixes every URL, and attribute
//! rewriting is not idempotent — callers must apply it once per body.

use tunnerse_common::config::RewriteStrategy;

/// Apply the configured strategy to an HTML body.
///
/// Bodies that are not valid UTF-8 pass through unchanged.
#[must_use]
pub fn apply(strategy: RewriteStrategy, body: Vec<u8>, tunnel_id: &str) -> Vec<u8> {
    let html = match String::from_utf8(body) {
        Ok(html) => html,
        Err(err) => return err.into_bytes(),
    };
    let rewritten = match strategy {
        RewriteStrategy::BaseTag => inject_base_href(&html, tunnel_id),
        RewriteStrategy::AttributePrefix => rewrite_absolute_paths(&html, tunnel_id),
    };
    rewritten.into_bytes()
}

/// Insert `<base href="/{id}/">` immediately after the first `<head>` tag,
/// letting the browser resolve relative and root-relative references.
#[must_use]
pub fn inject_base_href(html: &str, tunnel_id: &str) -> String {
    let base_tag = format!("<base href=\"/{tunnel_id}/\">");
    html.replacen("<head>", &format!("<head>\n{base_tag}"), 1)
}

/// Prefix `href="/`, `src="/` and `action="/` attributes with the tunnel id.
#[must_use]
pub fn rewrite_absolute_paths(html: &str, tunnel_id: &str) -> String {
    let prefix = format!("/{tunnel_id}");
    html.replace("href=\"/", &format!("href=\"{prefix}/"))
        .replace("src=\"/", &format!("src=\"{prefix}/"))
        .replace("action=\"/", &format!("action=\"{prefix}/"))
}

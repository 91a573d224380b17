use reqwest::Client;

use crate::config::AppConfig;

fn default_headers(config: &AppConfig) -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    if let Ok(user_agent) = reqwest::header::HeaderValue::from_str(&config.user_agent) {
        headers.insert(reqwest::header::USER_AGENT, user_agent);
    } else {
        warn!("Ignoring invalid user agent `{}`", config.user_agent);
    }
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("*/*"),
    );
    headers
}

/// Build the HTTP client used for every site request.
///
/// Redirects are followed with the default policy (up to 10 hops) so
/// `RedirectionURL` sites can read the final URL.
pub fn build_client(config: &AppConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .default_headers(default_headers(config))
        .redirect(reqwest::redirect::Policy::default())
        .build()
}

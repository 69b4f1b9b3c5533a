use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

use crate::core::error::XToolResult;

const USER_AGENT: &str = concat!("xtool/", env!("CARGO_PKG_VERSION"));
/// Distribution archives are large; only the connection is bounded.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client used for every repository request.
///
/// Archives are checksummed byte-for-byte, so transparent compression is
/// disabled.
pub fn build_http_client() -> XToolResult<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?;
    Ok(client)
}

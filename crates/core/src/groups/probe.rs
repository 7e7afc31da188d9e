use serde_yaml::{Mapping, Value};

use crate::model::non_empty_trimmed;

/// Builds `http://<host>:<port>/` from a proxy's `server` and `port` fields.
///
/// IPv6 literals are bracketed. Returns `None` unless the host parses as an
/// IPv4, IPv6 or domain host and the port is an integer in `1..=65535`.
pub fn probe_url_for(proxy: &Mapping) -> Option<String> {
    let server = non_empty_trimmed(proxy.get("server"))?;
    let host = if server.contains(':') && !(server.starts_with('[') && server.ends_with(']')) {
        format!("[{server}]")
    } else {
        server.to_string()
    };
    url::Host::parse(&host).ok()?;

    let port = match proxy.get("port")? {
        Value::Number(number) => number.as_u64()?,
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
                return None;
            }
            text.parse::<u64>().ok()?
        }
        _ => return None,
    };
    if !(1..=65535).contains(&port) {
        return None;
    }

    Some(format!("http://{host}:{port}/"))
}

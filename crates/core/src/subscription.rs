use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::error::{Result, SynthesisError};
use crate::model::{kind_name, non_empty_trimmed, PROXIES_KEY, PROXY_PROVIDERS_KEY};

/// Older subscription documents listed provider URLs under this key.
const LEGACY_PROVIDERS_KEY: &str = "subs";

const OVERRIDE_KEYS: &[&str] = &["west-cowboy", "west_cowboy"];
const OVERRIDE_URL_KEYS: &[&str] = &["url", "test-url", "test_url"];
const OVERRIDE_STATUS_KEYS: &[&str] = &["expected-status", "expected_status"];

/// Probe settings the subscription may force onto the West-Cowboy group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WestCowboyOverride {
    pub url: Option<String>,
    /// Kept as the original scalar so `"204"` and `204` both round-trip unchanged.
    pub expected_status: Option<Value>,
}

/// Canonical form of a user-supplied subscription document.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub proxy_provider_urls: Vec<String>,
    pub proxy_providers: IndexMap<String, Mapping>,
    pub proxies: Vec<Mapping>,
    pub west_cowboy: WestCowboyOverride,
    pub home_proxy_name: String,
}

impl Subscription {
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(input)?;
        parse_subscription(&doc)
    }

    pub fn has_named_providers(&self) -> bool {
        !self.proxy_providers.is_empty()
    }
}

/// Normalizes an already-parsed subscription document.
///
/// Only two conditions are fatal: a root that is not a mapping, and the lack of
/// any proxy with a usable name. Malformed provider or override blocks degrade
/// to empty values.
pub fn parse_subscription(doc: &Value) -> Result<Subscription> {
    let empty = Mapping::new();
    let root = match doc {
        Value::Null => &empty,
        Value::Mapping(map) => map,
        other => {
            return Err(SynthesisError::validation(format!(
                "subscription must be a YAML mapping, got {}",
                kind_name(other)
            )))
        }
    };

    let raw_providers = root
        .get(PROXY_PROVIDERS_KEY)
        .filter(|value| !value.is_null())
        .or_else(|| root.get(LEGACY_PROVIDERS_KEY));
    let (proxy_provider_urls, proxy_providers) = parse_providers(raw_providers);

    let proxies: Vec<Mapping> = root
        .get(PROXIES_KEY)
        .and_then(Value::as_sequence)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_mapping)
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let home_proxy_name = proxies
        .iter()
        .find_map(|proxy| non_empty_trimmed(proxy.get("name")))
        .map(str::to_string)
        .ok_or_else(|| {
            SynthesisError::validation(
                "subscription must contain at least one proxy with a non-empty 'name'",
            )
        })?;

    let west_cowboy = first_present(root, OVERRIDE_KEYS, |value| !value.is_null())
        .and_then(Value::as_mapping)
        .map(parse_override)
        .unwrap_or_default();

    tracing::debug!(
        proxies = proxies.len(),
        provider_urls = proxy_provider_urls.len(),
        named_providers = proxy_providers.len(),
        home = %home_proxy_name,
        "normalized subscription"
    );

    Ok(Subscription {
        proxy_provider_urls,
        proxy_providers,
        proxies,
        west_cowboy,
        home_proxy_name,
    })
}

fn parse_providers(raw: Option<&Value>) -> (Vec<String>, IndexMap<String, Mapping>) {
    let mut urls = Vec::new();
    let mut named = IndexMap::new();

    match raw {
        Some(Value::Sequence(entries)) => {
            urls.extend(
                entries
                    .iter()
                    .filter_map(|entry| non_empty_trimmed(Some(entry)))
                    .map(str::to_string),
            );
        }
        Some(Value::Mapping(entries)) => {
            for (raw_name, raw_provider) in entries {
                let Some(name) = non_empty_trimmed(Some(raw_name)) else {
                    continue;
                };
                let provider = match raw_provider {
                    Value::Mapping(provider) => provider.clone(),
                    Value::String(url) => {
                        let mut provider = Mapping::new();
                        provider.insert(Value::from("url"), Value::from(url.trim()));
                        provider
                    }
                    _ => continue,
                };
                named.insert(name.to_string(), provider);
            }
        }
        _ => {}
    }

    (urls, named)
}

fn parse_override(block: &Mapping) -> WestCowboyOverride {
    let url = first_present(block, OVERRIDE_URL_KEYS, |value| {
        non_empty_trimmed(Some(value)).is_some()
    })
    .and_then(|value| non_empty_trimmed(Some(value)))
    .map(str::to_string);

    let expected_status = first_present(block, OVERRIDE_STATUS_KEYS, is_status_like).cloned();

    WestCowboyOverride {
        url,
        expected_status,
    }
}

/// A string or number whose text form is not blank.
pub(crate) fn is_status_like(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(text) => !text.trim().is_empty(),
        _ => false,
    }
}

fn first_present<'a>(
    map: &'a Mapping,
    keys: &[&str],
    accept: impl Fn(&Value) -> bool,
) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| accept(value))
}

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::model::{non_empty_trimmed, string_sequence};
use crate::subscription::Subscription;

pub const DEFAULT_PROVIDER_TYPE: &str = "http";
pub const DEFAULT_PROVIDER_INTERVAL: u64 = 3600;
pub const HEALTH_CHECK_URL: &str = "https://www.gstatic.com/generate_204";
pub const HEALTH_CHECK_INTERVAL: u64 = 300;

/// Providers to install under `proxy-providers`, plus their names in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderSet {
    pub providers: Mapping,
    pub names: Vec<String>,
}

impl ProviderSet {
    fn push(&mut self, name: String, provider: Mapping) {
        self.providers
            .insert(Value::from(name.as_str()), Value::Mapping(provider));
        self.names.push(name);
    }
}

/// Builds the provider mapping for a subscription.
///
/// Named providers declared by the subscription replace whatever the template
/// had. A bare URL list instead reuses the template's providers positionally:
/// the Nth URL takes the Nth template provider's name and settings.
pub fn synthesize_providers(existing: Option<&Value>, subscription: &Subscription) -> ProviderSet {
    let set = if subscription.has_named_providers() {
        normalize_named_providers(&subscription.proxy_providers)
    } else {
        build_url_providers(existing, &subscription.proxy_provider_urls)
    };
    tracing::debug!(
        named = subscription.has_named_providers(),
        providers = ?set.names,
        "synthesized proxy providers"
    );
    set
}

fn normalize_named_providers(declared: &IndexMap<String, Mapping>) -> ProviderSet {
    let mut set = ProviderSet::default();

    for (index, (name, raw)) in declared.iter().enumerate() {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        let mut provider = raw.clone();
        fill_defaults(&mut provider);

        let trimmed_url = provider
            .get("url")
            .and_then(Value::as_str)
            .map(|url| url.trim().to_string());
        if let Some(url) = trimmed_url {
            provider.insert(Value::from("url"), Value::from(url));
        }

        if !has_path(&provider) {
            provider.insert(Value::from("path"), Value::from(provider_path(index + 1)));
        }

        set.push(name.to_string(), provider);
    }

    set
}

fn build_url_providers(existing: Option<&Value>, urls: &[String]) -> ProviderSet {
    let empty = Mapping::new();
    let existing = existing.and_then(Value::as_mapping).unwrap_or(&empty);
    let existing_names: Vec<&str> = existing
        .keys()
        .filter_map(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .collect();

    let fallback_base = existing_names
        .iter()
        .find_map(|name| existing.get(*name).and_then(Value::as_mapping));

    let mut set = ProviderSet::default();

    for (offset, url) in urls.iter().enumerate() {
        let index = offset + 1;
        let name = existing_names
            .get(offset)
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("订阅{index}"));

        let named_base = existing.get(name.as_str()).and_then(Value::as_mapping);
        let mut provider = named_base.or(fallback_base).cloned().unwrap_or_default();
        fill_defaults(&mut provider);

        provider.insert(Value::from("url"), Value::from(url.as_str()));
        if named_base.is_none() || !has_path(&provider) {
            provider.insert(Value::from("path"), Value::from(provider_path(index)));
        }

        set.push(name, provider);
    }

    set
}

/// Points every group that already declares `use` at the new provider set.
pub fn sync_group_use_fields(groups: &mut [Value], names: &[String]) {
    for group in groups.iter_mut().filter_map(Value::as_mapping_mut) {
        if group.contains_key("use") {
            group.insert(Value::from("use"), string_sequence(names));
        }
    }
}

fn fill_defaults(provider: &mut Mapping) {
    if !provider.contains_key("type") {
        provider.insert(Value::from("type"), Value::from(DEFAULT_PROVIDER_TYPE));
    }
    if !provider.contains_key("interval") {
        provider.insert(Value::from("interval"), Value::from(DEFAULT_PROVIDER_INTERVAL));
    }
    if !provider.contains_key("health-check") {
        provider.insert(Value::from("health-check"), default_health_check());
    }
}

fn default_health_check() -> Value {
    let mut check = Mapping::new();
    check.insert(Value::from("enable"), Value::Bool(true));
    check.insert(Value::from("url"), Value::from(HEALTH_CHECK_URL));
    check.insert(Value::from("interval"), Value::from(HEALTH_CHECK_INTERVAL));
    check.insert(Value::from("lazy"), Value::Bool(true));
    Value::Mapping(check)
}

fn has_path(provider: &Mapping) -> bool {
    non_empty_trimmed(provider.get("path")).is_some()
}

fn provider_path(index: usize) -> String {
    format!("./providers/sub{index}.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(yaml: &str) -> Subscription {
        Subscription::from_yaml_str(yaml).unwrap()
    }

    fn provider<'a>(set: &'a ProviderSet, name: &str) -> &'a Mapping {
        set.providers.get(name).and_then(Value::as_mapping).unwrap()
    }

    fn str_field<'a>(map: &'a Mapping, key: &str) -> Option<&'a str> {
        map.get(key).and_then(Value::as_str)
    }

    #[test]
    fn url_list_without_template_providers_generates_names_and_paths() {
        let sub = subscription(
            "proxies: [{name: a}]\nproxy-providers: [https://one.example, https://two.example]\n",
        );
        let set = synthesize_providers(None, &sub);

        assert_eq!(set.names, vec!["订阅1", "订阅2"]);
        for (index, name) in set.names.iter().enumerate() {
            let p = provider(&set, name);
            assert_eq!(str_field(p, "type"), Some("http"));
            assert_eq!(p.get("interval").and_then(Value::as_u64), Some(3600));
            assert_eq!(p.get("health-check"), Some(&default_health_check()));
            assert_eq!(
                str_field(p, "path"),
                Some(format!("./providers/sub{}.yaml", index + 1).as_str())
            );
        }
        assert_eq!(str_field(provider(&set, "订阅2"), "url"), Some("https://two.example"));
    }

    #[test]
    fn url_list_reuses_template_provider_identities_positionally() {
        let existing: Value = serde_yaml::from_str(
            r#"
机场:
  type: http
  interval: 7200
  path: ./cache/airport.yaml
  url: https://old.example
"#,
        )
        .unwrap();
        let sub = subscription(
            "proxies: [{name: a}]\nproxy-providers: [https://one.example, https://two.example]\n",
        );
        let set = synthesize_providers(Some(&existing), &sub);

        assert_eq!(set.names, vec!["机场", "订阅2"]);

        let reused = provider(&set, "机场");
        assert_eq!(str_field(reused, "url"), Some("https://one.example"));
        assert_eq!(str_field(reused, "path"), Some("./cache/airport.yaml"));
        assert_eq!(reused.get("interval").and_then(Value::as_u64), Some(7200));

        // Second URL copies the first template provider's settings but gets a fresh path.
        let synthesized = provider(&set, "订阅2");
        assert_eq!(synthesized.get("interval").and_then(Value::as_u64), Some(7200));
        assert_eq!(str_field(synthesized, "path"), Some("./providers/sub2.yaml"));
        assert_eq!(str_field(synthesized, "url"), Some("https://two.example"));
    }

    #[test]
    fn reused_template_provider_without_path_gets_one() {
        let existing: Value = serde_yaml::from_str("main: {type: http, path: ' '}\n").unwrap();
        let sub = subscription("proxies: [{name: a}]\nsubs: [https://one.example]\n");
        let set = synthesize_providers(Some(&existing), &sub);
        assert_eq!(str_field(provider(&set, "main"), "path"), Some("./providers/sub1.yaml"));
    }

    #[test]
    fn named_providers_replace_template_and_keep_explicit_fields() {
        let existing: Value = serde_yaml::from_str("old: {url: https://old.example}\n").unwrap();
        let sub = subscription(
            r#"
proxies: [{name: a}]
proxy-providers:
  alpha:
    url: "  https://alpha.example  "
    interval: 86400
    health-check: {enable: false}
  beta:
    url: https://beta.example
    path: ./custom/beta.yaml
  gamma: https://gamma.example
"#,
        );
        let set = synthesize_providers(Some(&existing), &sub);

        assert_eq!(set.names, vec!["alpha", "beta", "gamma"]);
        assert!(set.providers.get("old").is_none());

        let alpha = provider(&set, "alpha");
        assert_eq!(str_field(alpha, "url"), Some("https://alpha.example"));
        assert_eq!(alpha.get("interval").and_then(Value::as_u64), Some(86400));
        assert_eq!(str_field(alpha, "type"), Some("http"));
        assert_eq!(str_field(alpha, "path"), Some("./providers/sub1.yaml"));

        assert_eq!(str_field(provider(&set, "beta"), "path"), Some("./custom/beta.yaml"));
        assert_eq!(str_field(provider(&set, "gamma"), "path"), Some("./providers/sub3.yaml"));
    }

    #[test]
    fn no_providers_yields_empty_set() {
        let existing: Value = serde_yaml::from_str("old: {url: https://old.example}\n").unwrap();
        let sub = subscription("proxies: [{name: a}]\n");
        let set = synthesize_providers(Some(&existing), &sub);
        assert!(set.names.is_empty());
        assert!(set.providers.is_empty());
    }

    #[test]
    fn sync_rewrites_only_groups_that_declare_use() {
        let mut groups: Vec<Value> = serde_yaml::from_str(
            r#"
- {name: A, type: select, use: [old]}
- {name: B, type: select, proxies: [DIRECT]}
- not-a-group
"#,
        )
        .unwrap();
        sync_group_use_fields(&mut groups, &["p1".to_string(), "p2".to_string()]);

        assert_eq!(
            groups[0].as_mapping().unwrap().get("use"),
            Some(&string_sequence(["p1", "p2"]))
        );
        assert!(!groups[1].as_mapping().unwrap().contains_key("use"));
    }
}

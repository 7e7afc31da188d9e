use std::collections::HashSet;

use serde_yaml::{Mapping, Value};

use crate::error::Result;
use crate::format::render_profile;
use crate::groups::{rewrite_groups, RewriteSummary};
use crate::model::{non_empty_trimmed, Profile, PROXIES_KEY, PROXY_PROVIDERS_KEY};
use crate::providers::{synthesize_providers, sync_group_use_fields};
use crate::subscription::{parse_subscription, Subscription};

/// Merges a parsed subscription document into the template text.
///
/// The template is parsed into a fresh working copy on every call, so no state
/// is shared between invocations. Fails only while parsing or validating the
/// inputs; once both are accepted the merge always completes.
pub fn synthesize(template_text: &str, subscription_doc: &Value) -> Result<Profile> {
    let span = tracing::info_span!("synthesize");
    let _enter = span.enter();

    let mut profile = Profile::from_yaml_str(template_text)?;
    let subscription = parse_subscription(subscription_doc)?;
    apply_subscription(&mut profile, &subscription);
    Ok(profile)
}

/// Like [`synthesize`], but takes the subscription as text and returns the rendered profile.
pub fn synthesize_to_yaml(template_text: &str, subscription_text: &str) -> Result<String> {
    let subscription_doc: Value = serde_yaml::from_str(subscription_text)?;
    let profile = synthesize(template_text, &subscription_doc)?;
    render_profile(&profile)
}

pub fn apply_subscription(profile: &mut Profile, subscription: &Subscription) -> RewriteSummary {
    let proxies = dedupe_proxies_by_name(&subscription.proxies);
    tracing::debug!(proxies = proxies.len(), "installing subscription proxies");
    profile.set(PROXIES_KEY, Value::Sequence(proxies));

    let providers = synthesize_providers(profile.get(PROXY_PROVIDERS_KEY), subscription);
    profile.set(PROXY_PROVIDERS_KEY, Value::Mapping(providers.providers));
    sync_group_use_fields(profile.proxy_groups_mut(), &providers.names);

    let summary = rewrite_groups(
        profile,
        &subscription.home_proxy_name,
        &subscription.west_cowboy,
    );
    tracing::debug!(
        home = %subscription.home_proxy_name,
        providers = providers.names.len(),
        membership = ?summary.membership,
        candidates = ?summary.candidates,
        legacy_group_dropped = summary.legacy_group_dropped,
        "rewrote proxy groups"
    );
    summary
}

/// First occurrence of each trimmed name wins; unnamed proxies are dropped.
fn dedupe_proxies_by_name(proxies: &[Mapping]) -> Vec<Value> {
    let mut seen = HashSet::new();
    proxies
        .iter()
        .filter(|proxy| match non_empty_trimmed(proxy.get("name")) {
            Some(name) => seen.insert(name.to_string()),
            None => false,
        })
        .cloned()
        .map(Value::Mapping)
        .collect()
}

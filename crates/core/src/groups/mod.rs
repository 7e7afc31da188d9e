use serde_yaml::{Mapping, Sequence, Value};

mod classify;
mod probe;

pub use classify::is_west_cowboy_node;
pub use probe::probe_url_for;

use crate::model::{mapping_slot, name_of, non_empty_trimmed, string_sequence, uniq_strings, Profile};
use crate::providers::HEALTH_CHECK_URL;
use crate::subscription::{is_status_like, WestCowboyOverride};

/// Reserved name of the latency-probe aggregator group. Consumers match on it literally.
pub const WEST_COWBOY_GROUP_NAME: &str = "西部牛仔";
/// Aggregator name used by profiles generated before the West-Cowboy group existed.
pub const LEGACY_DIALER_GROUP_NAME: &str = "dialer-group";

pub const FALLBACK_PROBE_URL: &str = HEALTH_CHECK_URL;
pub const DEFAULT_EXPECTED_STATUS: u64 = 407;
pub const DEFAULT_PROBE_INTERVAL: u64 = 300;

const INCLUDE_ALL_PROXIES_KEY: &str = "include-all-proxies";
const BUILTIN_POLICIES: &[&str] = &["DIRECT", "REJECT"];

/// How the West-Cowboy group ended up selecting its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// `use` lists every provider; `proxies` holds any manual candidates.
    Providers,
    /// Explicit `proxies` list only (possibly empty).
    Manual,
}

/// What [`rewrite_groups`] did, for the pipeline's log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteSummary {
    pub membership: Membership,
    pub candidates: Vec<String>,
    pub legacy_group_dropped: bool,
}

/// Rewrites proxy groups around the home node.
///
/// Never fails: missing or malformed optional fields fall back to defaults so
/// the profile always ends up with a usable West-Cowboy group.
pub fn rewrite_groups(
    profile: &mut Profile,
    home_proxy_name: &str,
    overrides: &WestCowboyOverride,
) -> RewriteSummary {
    let home_probe_url = match profile.find_proxy_mut(home_proxy_name) {
        Some(home) => {
            home.insert(
                Value::from("dialer-proxy"),
                Value::from(WEST_COWBOY_GROUP_NAME),
            );
            probe_url_for(home)
        }
        None => {
            tracing::debug!(home = home_proxy_name, "home proxy not found in merged proxies");
            None
        }
    };

    let candidates: Vec<String> = profile
        .proxy_names()
        .into_iter()
        .filter(|name| is_west_cowboy_node(name, home_proxy_name))
        .filter(|name| !BUILTIN_POLICIES.contains(&name.as_str()))
        .collect();
    let provider_names = profile.provider_names();

    let groups = profile.proxy_groups_mut();
    let group = west_cowboy_group(groups);
    configure_probe(group, overrides, home_probe_url);
    let membership = assign_members(group, &candidates, &provider_names);
    attach_home_proxy(groups, home_proxy_name);

    let legacy_group_dropped = prune_legacy_group(profile);

    RewriteSummary {
        membership,
        candidates,
        legacy_group_dropped,
    }
}

fn west_cowboy_group(groups: &mut Sequence) -> &mut Mapping {
    let index = match groups
        .iter()
        .position(|group| name_of(group) == Some(WEST_COWBOY_GROUP_NAME))
    {
        Some(index) => index,
        None => {
            let mut group = Mapping::new();
            group.insert(Value::from("name"), Value::from(WEST_COWBOY_GROUP_NAME));
            groups.push(Value::Mapping(group));
            groups.len() - 1
        }
    };
    mapping_slot(&mut groups[index])
}

fn configure_probe(group: &mut Mapping, overrides: &WestCowboyOverride, home_probe_url: Option<String>) {
    group.insert(Value::from("type"), Value::from("url-test"));

    let url = overrides
        .url
        .clone()
        .or_else(|| non_empty_trimmed(group.get("url")).map(str::to_string))
        .or(home_probe_url)
        .unwrap_or_else(|| {
            tracing::debug!("no probe URL derivable, using fallback");
            FALLBACK_PROBE_URL.to_string()
        });
    group.insert(Value::from("url"), Value::from(url));

    let expected_status = overrides
        .expected_status
        .clone()
        .or_else(|| {
            group
                .get("expected-status")
                .filter(|value| is_status_like(value))
                .cloned()
        })
        .unwrap_or_else(|| Value::from(DEFAULT_EXPECTED_STATUS));
    group.insert(Value::from("expected-status"), expected_status);

    let has_integer_interval = matches!(
        group.get("interval"),
        Some(Value::Number(number)) if number.is_i64() || number.is_u64()
    );
    if !has_integer_interval {
        group.insert(Value::from("interval"), Value::from(DEFAULT_PROBE_INTERVAL));
    }
}

fn assign_members(group: &mut Mapping, candidates: &[String], provider_names: &[String]) -> Membership {
    if provider_names.is_empty() {
        group.insert(Value::from("proxies"), string_sequence(candidates));
        group.shift_remove("use");
        group.shift_remove("filter");
        return Membership::Manual;
    }

    if candidates.is_empty() {
        group.shift_remove("proxies");
    } else {
        group.insert(Value::from("proxies"), string_sequence(candidates));
    }
    group.insert(Value::from("use"), string_sequence(provider_names));
    group.shift_remove("filter");
    Membership::Providers
}

fn attach_home_proxy(groups: &mut Sequence, home_proxy_name: &str) {
    for group in groups.iter_mut().filter_map(Value::as_mapping_mut) {
        if group.get("name").and_then(Value::as_str) == Some(WEST_COWBOY_GROUP_NAME) {
            continue;
        }
        let include_all = group.get(INCLUDE_ALL_PROXIES_KEY).and_then(Value::as_bool) == Some(true);
        let Some(Value::Sequence(members)) = group.get_mut("proxies") else {
            continue;
        };

        let mut refreshed = uniq_strings(members.iter().filter_map(Value::as_str));
        if !include_all && !refreshed.iter().any(|name| name == home_proxy_name) {
            refreshed.push(home_proxy_name.to_string());
        }
        *members = refreshed.into_iter().map(Value::from).collect();
    }
}

/// Drops the legacy aggregator group unless a proxy dials through it or a group lists it.
fn prune_legacy_group(profile: &mut Profile) -> bool {
    let dialed = profile
        .proxies()
        .iter()
        .filter_map(Value::as_mapping)
        .any(|proxy| proxy.get("dialer-proxy").and_then(Value::as_str) == Some(LEGACY_DIALER_GROUP_NAME));
    let listed = profile.proxy_groups().iter().any(|group| {
        group
            .as_mapping()
            .and_then(|group| group.get("proxies"))
            .and_then(Value::as_sequence)
            .is_some_and(|members| {
                members
                    .iter()
                    .any(|member| member.as_str() == Some(LEGACY_DIALER_GROUP_NAME))
            })
    });
    if dialed || listed {
        return false;
    }

    let groups = profile.proxy_groups_mut();
    let before = groups.len();
    groups.retain(|group| name_of(group) != Some(LEGACY_DIALER_GROUP_NAME));
    groups.len() != before
}

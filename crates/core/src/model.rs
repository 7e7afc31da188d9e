use std::collections::HashSet;

use serde_yaml::{Mapping, Sequence, Value};

use crate::error::{Result, SynthesisError};

pub const PROXIES_KEY: &str = "proxies";
pub const PROXY_GROUPS_KEY: &str = "proxy-groups";
pub const PROXY_PROVIDERS_KEY: &str = "proxy-providers";

/// Working copy of a mihomo profile.
///
/// The document stays an untyped, insertion-ordered mapping so that keys the
/// engine does not know about (DNS, rules, general settings) survive the merge
/// untouched and in their original order. Every field read goes through a
/// narrowing accessor; nothing assumes a shape it has not checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    root: Mapping,
}

impl Profile {
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(input)?;
        Self::from_value(value)
    }

    /// An empty document (`null`) is accepted as an empty mapping.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Mapping(root) => Ok(Self { root }),
            other => Err(SynthesisError::validation(format!(
                "template must be a YAML mapping, got {}",
                kind_name(&other)
            ))),
        }
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Replaces the value under `key`, keeping the key's position if it already exists.
    pub fn set(&mut self, key: &str, value: Value) {
        self.root.insert(Value::from(key), value);
    }

    pub fn proxies(&self) -> &[Value] {
        sequence_or_empty(self.root.get(PROXIES_KEY))
    }

    /// The `proxies` list, replaced by an empty list first if it is missing or not a sequence.
    pub fn proxies_mut(&mut self) -> &mut Sequence {
        ensure_sequence(&mut self.root, PROXIES_KEY)
    }

    pub fn proxy_groups(&self) -> &[Value] {
        sequence_or_empty(self.root.get(PROXY_GROUPS_KEY))
    }

    pub fn proxy_groups_mut(&mut self) -> &mut Sequence {
        ensure_sequence(&mut self.root, PROXY_GROUPS_KEY)
    }

    pub fn proxy_providers(&self) -> Option<&Mapping> {
        self.root.get(PROXY_PROVIDERS_KEY).and_then(Value::as_mapping)
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.proxy_providers()
            .map(|providers| {
                providers
                    .keys()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Trimmed, non-empty, de-duplicated proxy names in declaration order.
    pub fn proxy_names(&self) -> Vec<String> {
        uniq_strings(
            self.proxies()
                .iter()
                .filter_map(|proxy| non_empty_trimmed(proxy.as_mapping()?.get("name"))),
        )
    }

    pub fn proxy_group_names(&self) -> Vec<String> {
        self.proxy_groups()
            .iter()
            .filter_map(name_of)
            .map(str::to_string)
            .collect()
    }

    pub fn find_proxy_mut(&mut self, name: &str) -> Option<&mut Mapping> {
        self.proxies_mut()
            .iter_mut()
            .filter_map(Value::as_mapping_mut)
            .find(|proxy| non_empty_trimmed(proxy.get("name")) == Some(name))
    }
}

/// The `name` field of a mapping, verbatim.
pub fn name_of(value: &Value) -> Option<&str> {
    value.as_mapping()?.get("name")?.as_str()
}

/// A string value trimmed of surrounding whitespace, or `None` if absent, not a
/// string, or blank.
pub fn non_empty_trimmed(value: Option<&Value>) -> Option<&str> {
    let trimmed = value?.as_str()?.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// De-duplicates while keeping first occurrences in order.
pub fn uniq_strings<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        let value = value.as_ref();
        if seen.insert(value.to_string()) {
            out.push(value.to_string());
        }
    }
    out
}

pub fn string_sequence<I, S>(values: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Value::Sequence(
        values
            .into_iter()
            .map(|value| Value::from(value.as_ref()))
            .collect(),
    )
}

pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

fn sequence_or_empty(value: Option<&Value>) -> &[Value] {
    value
        .and_then(Value::as_sequence)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn ensure_sequence<'a>(map: &'a mut Mapping, key: &str) -> &'a mut Sequence {
    sequence_slot(map.entry(Value::from(key)).or_insert(Value::Null))
}

/// Narrows `slot` to a sequence, replacing any other value with an empty one.
pub(crate) fn sequence_slot(slot: &mut Value) -> &mut Sequence {
    match slot {
        Value::Sequence(seq) => seq,
        other => {
            *other = Value::Sequence(Sequence::new());
            sequence_slot(other)
        }
    }
}

/// Narrows `slot` to a mapping, replacing any other value with an empty one.
pub(crate) fn mapping_slot(slot: &mut Value) -> &mut Mapping {
    match slot {
        Value::Mapping(map) => map,
        other => {
            *other = Value::Mapping(Mapping::new());
            mapping_slot(other)
        }
    }
}

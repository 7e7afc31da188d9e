mod emitter;

pub use emitter::{Emitter, PathSegment};

use crate::error::Result;
use crate::model::{Profile, PROXY_GROUPS_KEY};
use serde_yaml::Value;

/// Group fields rendered inline as `[a, b, c]`.
const FLOW_GROUP_KEYS: &[&str] = &["proxies", "use"];

/// True for `proxy-groups[*].proxies` and `proxy-groups[*].use`.
pub fn is_flow_path(path: &[PathSegment]) -> bool {
    matches!(
        path,
        [PathSegment::Key(root), PathSegment::Index(_), PathSegment::Key(field)]
            if root == PROXY_GROUPS_KEY && FLOW_GROUP_KEYS.contains(&field.as_str())
    )
}

/// Serializes a merged profile, keeping key order and inlining group member lists.
pub fn render_profile(profile: &Profile) -> Result<String> {
    render_value(&Value::Mapping(profile.as_mapping().clone()))
}

pub fn render_value(value: &Value) -> Result<String> {
    Emitter::new(is_flow_path).emit(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_member_lists_are_inline() {
        let profile = Profile::from_yaml_str(
            r#"
proxies:
  - name: a
    alpn:
      - h2
proxy-groups:
  - name: Select
    type: select
    proxies:
      - a
      - DIRECT
    use:
      - provider
  - name: Empty
    type: select
    proxies: []
rules:
  - MATCH,Select
"#,
        )
        .unwrap();

        let rendered = render_profile(&profile).unwrap();
        assert_eq!(
            rendered,
            "proxies:\n- name: a\n  alpn:\n  - h2\nproxy-groups:\n- name: Select\n  type: select\n  proxies: [a, DIRECT]\n  use: [provider]\n- name: Empty\n  type: select\n  proxies: []\nrules:\n- MATCH,Select\n"
        );
    }

    #[test]
    fn flow_style_does_not_change_structure() {
        let profile = Profile::from_yaml_str(
            "proxy-groups:\n  - {name: G, proxies: ['x, y', '[z]', '42', '?x', 'a:?b', '-x', '-', 'x: y', 'a #b', 'US:LA', '&anchor', '*alias', '!tag'], use: ['?p', 'p:1']}\n",
        )
        .unwrap();
        let rendered = render_profile(&profile).unwrap();
        let reparsed = Profile::from_yaml_str(&rendered).unwrap();
        assert_eq!(reparsed, profile);
    }

    #[test]
    fn only_group_fields_match_flow_path() {
        let key = |k: &str| PathSegment::Key(k.to_string());
        assert!(is_flow_path(&[key("proxy-groups"), PathSegment::Index(3), key("use")]));
        assert!(!is_flow_path(&[key("proxy-groups"), PathSegment::Index(0), key("filter")]));
        assert!(!is_flow_path(&[key("proxies")]));
        assert!(!is_flow_path(&[key("rules"), PathSegment::Index(0), key("proxies")]));
    }
}

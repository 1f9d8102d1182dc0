use super::{components_mut, UpgradeContext};
use crate::config_doc::MapExt;
use crate::errors::UpgradeStepError;

const MOVED: [(&str, &str); 2] = [
    ("cors_allowed_origins", "allowed_origins"),
    ("cors_allowed_headers", "allowed_headers"),
];

/// CORS settings of the otlp http protocol moved under a `cors` section.
pub(super) fn upgrade(ctx: &mut UpgradeContext) -> Result<(), UpgradeStepError> {
    let mut warnings = Vec::new();
    for (name, settings) in components_mut(ctx.config()?, "receivers", "otlp") {
        let Ok(http) = settings.map_at_mut(&["protocols", "http"]) else {
            continue;
        };
        for (old, new) in MOVED {
            if !http.contains_key(old) {
                continue;
            }
            if let Err(reason) = http.ensure_map_at(&["cors"]) {
                warnings.push(format!(
                    "left '{}' of the '{}' receiver in place: {}",
                    old, name, reason
                ));
                continue;
            }
            if let Some(value) = http.shift_remove(old) {
                if let Err(reason) = http.set_at(&["cors", new], value) {
                    warnings.push(format!(
                        "couldn't move '{}' of the '{}' receiver: {}",
                        old, name, reason
                    ));
                }
            }
        }
    }
    for message in warnings {
        ctx.warn(message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_doc::{ConfigDocument, ConfigNode};
    use crate::upgrade::run_step;
    use pretty_assertions::assert_eq;
    use semver::Version;

    #[test]
    fn test_cors_settings_moved() {
        let outcome = run_step(
            upgrade,
            Version::new(0, 41, 0),
            r#"
receivers:
  otlp:
    protocols:
      http:
        endpoint: 0.0.0.0:4318
        cors_allowed_origins:
          - https://example.com
        cors_allowed_headers: [X-Custom]
"#,
        );
        assert!(outcome.error.is_none());
        assert!(outcome.warnings.is_empty());

        let doc = ConfigDocument::parse(&outcome.instance.spec.config).unwrap();
        let http = doc.map_at(&["receivers", "otlp", "protocols", "http"]).unwrap();
        assert!(!http.contains_key("cors_allowed_origins"));
        assert!(!http.contains_key("cors_allowed_headers"));
        assert_eq!(
            doc.get(&["receivers", "otlp", "protocols", "http", "cors", "allowed_origins"]),
            Some(&ConfigNode::Seq(vec![ConfigNode::from("https://example.com")]))
        );
        assert_eq!(
            doc.get(&["receivers", "otlp", "protocols", "http", "cors", "allowed_headers"]),
            Some(&ConfigNode::Seq(vec![ConfigNode::from("X-Custom")]))
        );
    }

    #[test]
    fn test_conflicting_cors_is_left_alone() {
        let config = concat!(
            "receivers:\n  otlp:\n    protocols:\n      http:\n",
            "        cors: everything\n        cors_allowed_origins: [a]\n",
        );
        let outcome = run_step(upgrade, Version::new(0, 41, 0), config);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.instance.spec.config, config);
    }
}

use std::collections::BTreeMap;

use kube::ResourceExt;
use otel_defs::{
    OpenTelemetryCollector, LABEL_COMPONENT, LABEL_INSTANCE, LABEL_MANAGED_BY, LABEL_NAME,
    LABEL_PART_OF, LABEL_VERSION, OPERATOR_NAME, PART_OF,
};
use otel_utils::image_tag;
use regex::Regex;

use crate::descriptor::ComponentRole;
use crate::naming;

pub type Labels = BTreeMap<String, String>;

/// `<namespace>.<name>`, the value of the instance label, cut to the 63
/// characters a label value may hold.
pub fn instance_value(instance: &OpenTelemetryCollector) -> String {
    naming::dns_name(&format!(
        "{}.{}",
        instance.namespace().unwrap_or_default(),
        instance.name_any()
    ))
}

/// Labels identifying every object managed on behalf of `instance`.
pub fn ownership(instance: &OpenTelemetryCollector) -> Labels {
    BTreeMap::from([
        (LABEL_MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
        (LABEL_INSTANCE.to_string(), instance_value(instance)),
    ])
}

pub fn selector(instance: &OpenTelemetryCollector, role: ComponentRole) -> Labels {
    let mut labels = ownership(instance);
    labels.insert(LABEL_PART_OF.to_string(), PART_OF.to_string());
    labels.insert(LABEL_COMPONENT.to_string(), role.label_value().to_string());
    labels
}

/// Full label set of a rendered object. Instance labels are propagated unless
/// they match one of `filter`; the managed keys always take precedence.
pub fn common(
    instance: &OpenTelemetryCollector,
    name: &str,
    role: ComponentRole,
    image: &str,
    filter: &[Regex],
) -> Labels {
    let mut labels: Labels = instance
        .labels()
        .iter()
        .filter(|(key, _)| !filter.iter().any(|re| re.is_match(key)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    labels.extend(selector(instance, role));
    labels.insert(LABEL_NAME.to_string(), name.to_string());
    labels.insert(LABEL_VERSION.to_string(), naming::dns_name(&image_tag(image)));
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use otel_defs::OpenTelemetryCollectorSpec;
    use pretty_assertions::assert_eq;

    fn instance() -> OpenTelemetryCollector {
        let mut instance =
            OpenTelemetryCollector::new("test", OpenTelemetryCollectorSpec::default());
        instance.metadata.namespace = Some("observability".to_string());
        instance.metadata.labels = Some(BTreeMap::from([
            ("team".to_string(), "platform".to_string()),
            ("internal.example.com/cost".to_string(), "42".to_string()),
            (LABEL_MANAGED_BY.to_string(), "someone-else".to_string()),
        ]));
        instance
    }

    #[test]
    fn test_common_labels() {
        let filter = vec![Regex::new(r"^internal\.example\.com/").unwrap()];
        let labels = common(
            &instance(),
            "test-collector",
            ComponentRole::Collector,
            "otel/collector:0.88.0",
            &filter,
        );

        let expected = BTreeMap::from([
            ("team".to_string(), "platform".to_string()),
            (LABEL_MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
            (LABEL_PART_OF.to_string(), PART_OF.to_string()),
            (LABEL_COMPONENT.to_string(), "opentelemetry-collector".to_string()),
            (LABEL_INSTANCE.to_string(), "observability.test".to_string()),
            (LABEL_NAME.to_string(), "test-collector".to_string()),
            (LABEL_VERSION.to_string(), "0.88.0".to_string()),
        ]);
        assert_eq!(labels, expected);
    }

    #[test]
    fn test_long_label_values_are_truncated() {
        let mut instance = OpenTelemetryCollector::new(
            "payments-tracing-collector-eu-west-1",
            OpenTelemetryCollectorSpec::default(),
        );
        instance.metadata.namespace = Some("observability-platform-production".to_string());

        let value = instance_value(&instance);
        assert_eq!(
            value,
            "observability-platform-production.payments-tracing-collector-eu"
        );
        assert!(value.len() <= 63);

        let tag = format!("1.2.3-{}", "a".repeat(120));
        let labels = common(
            &instance,
            "payments-tracing-collector-eu-west-1-collector",
            ComponentRole::Collector,
            &format!("otel/collector:{}", tag),
            &[],
        );
        assert_eq!(labels[LABEL_INSTANCE], value);
        assert_eq!(labels[LABEL_VERSION].len(), 63);
        assert!(tag.starts_with(&labels[LABEL_VERSION]));
    }

    #[test]
    fn test_truncated_instance_value_has_no_trailing_separator() {
        // Cut lands right after the dot.
        let mut instance =
            OpenTelemetryCollector::new("collector", OpenTelemetryCollectorSpec::default());
        instance.metadata.namespace = Some("n".repeat(62));
        let value = instance_value(&instance);
        assert_eq!(value, "n".repeat(62));
        assert!(!value.ends_with(['-', '.']));
    }

    #[test]
    fn test_selector_is_subset_of_common() {
        let selector = selector(&instance(), ComponentRole::TargetAllocator);
        let labels = common(
            &instance(),
            "test-targetallocator",
            ComponentRole::TargetAllocator,
            "ta",
            &[],
        );
        for (key, value) in &selector {
            assert_eq!(labels.get(key), Some(value));
        }
        assert_eq!(labels.get("team").map(String::as_str), Some("platform"));
    }
}

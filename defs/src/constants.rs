pub const KUBERNETES_GROUP: &str = "opentelemetry.io";
pub const OPERATOR_NAME: &str = "opentelemetry-operator";

pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_VERSION: &str = "app.kubernetes.io/version";
pub const LABEL_HEADLESS_SERVICE: &str = "operator.opentelemetry.io/collector-headless-service";

pub const PART_OF: &str = "opentelemetry";

pub const ANNOTATION_CONFIG_HASH: &str = "opentelemetry-operator-config/sha256";
pub const ANNOTATION_TA_CONFIG_HASH: &str = "opentelemetry-targetallocator-config/hash";

pub const METRICS_PORT: i32 = 8888;
pub const TARGET_ALLOCATOR_CONTAINER_PORT: i32 = 8080;
pub const TARGET_ALLOCATOR_SERVICE_PORT: i32 = 80;

pub const DEFAULT_COLLECTOR_CONFIG_MAP_ENTRY: &str = "collector.yaml";
pub const DEFAULT_TARGET_ALLOCATOR_CONFIG_MAP_ENTRY: &str = "targetallocator.yaml";

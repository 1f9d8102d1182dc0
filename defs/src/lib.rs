mod collector;
mod constants;

pub use collector::{
    AllocationStrategy, IngressSpec, IngressType, MetricsConfigSpec, Mode, ObservabilitySpec,
    OpenTelemetryCollector, OpenTelemetryCollectorSpec, OpenTelemetryCollectorStatus, PortSpec,
    PrometheusCrSpec, TargetAllocatorSpec, UpgradeStrategy,
};
pub use constants::*;

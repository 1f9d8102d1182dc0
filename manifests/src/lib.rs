mod adapters;
mod builder;
mod collector;
mod config_doc;
mod descriptor;
mod errors;
mod labels;
mod naming;
mod params;
mod targetallocator;
mod upgrade;

pub use adapters::{collector_ports, receiver_ports, ContainerPort};
pub use builder::{build_all, collector_image};
pub use collector::{workload_kind, WorkloadKind};
pub use config_doc::{ConfigDocument, ConfigNode, MapExt, NodeMap};
pub use descriptor::{ComponentRole, ResourceDescriptor, ResourceKind};
pub use errors::{BuildError, NotApplicable, ParseError, UpgradeError, UpgradeStepError};
pub use labels::{instance_value, ownership as ownership_labels, Labels};
pub use params::{ClusterFeatures, ManifestConfig};
pub use upgrade::{UpgradeChain, UpgradeContext, UpgradeFn, UpgradeOutcome, UpgradeWarning};

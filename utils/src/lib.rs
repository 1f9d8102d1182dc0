mod hash;
mod logging;
mod versioning;

pub use hash::sha256_hex;
pub use logging::setup_logging;
pub use versioning::{image_tag, semver_parse, semver_parse_without_build};

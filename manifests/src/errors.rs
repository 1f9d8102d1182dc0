use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("the configuration is not valid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("the configuration must be a mapping at the top level, found {0}")]
    NotAMapping(&'static str),

    #[error("unsupported {0} key in configuration mapping")]
    UnsupportedKey(&'static str),
}

/// Recoverable outcome of a structural transform that found nothing to act on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotApplicable {
    #[error("field '{0}' is not present")]
    Missing(String),

    #[error("field '{path}' is a {found}, expected a {expected}")]
    WrongType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Error, Debug)]
#[error("upgrade step to v{version} failed: {reason}")]
pub struct UpgradeStepError {
    pub version: semver::Version,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum UpgradeError {
    #[error("stored version '{version}' is not a valid semantic version: {source}")]
    InvalidStoredVersion {
        version: String,
        source: semver::Error,
    },

    #[error(transparent)]
    Step(#[from] UpgradeStepError),
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("failed to parse the collector configuration: {0}")]
    Parse(#[from] ParseError),

    #[error("failed to serialize rendered configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

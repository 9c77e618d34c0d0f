//! Build identification for the zkOracle validator.

use git_version::git_version;
use target_info::Target;

/// Name the validator reports itself under.
pub const CLIENT_NAME: &str = "ZkOracle";

/// `<client>/v<crate version>-<commit>`, where the commit carries a trailing `+` when built
/// from a dirty tree and is left out when git is unavailable.
///
/// ## Example
///
/// `ZkOracle/v0.1.0-67da032+`
pub const VERSION: &str = git_version!(
    args = ["--always", "--dirty=+", "--abbrev=7", "--match=^$"],
    prefix = "ZkOracle/v0.1.0-",
    fallback = "ZkOracle/v0.1.0"
);

lazy_static::lazy_static! {
    /// [`VERSION`] without [`CLIENT_NAME`], shown by `zkoracle --version`.
    pub static ref SHORT_VERSION: String = VERSION
        .trim_start_matches(CLIENT_NAME)
        .trim_start_matches('/')
        .to_string();
}

/// [`VERSION`] followed by the target architecture and OS, logged when the validator starts.
pub fn version_with_platform() -> String {
    format!("{}/{}-{}", VERSION, Target::arch(), Target::os())
}

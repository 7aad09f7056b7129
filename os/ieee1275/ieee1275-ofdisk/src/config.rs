//! Runtime tunables.

use alloc::collections::BTreeMap;
use alloc::string::String;
use log::warn;

/// Environment variable holding the retry timeout in seconds.
pub const RETRY_TIMEOUT_VAR: &str = "ofdisk_retry_timeout";

pub const DEFAULT_RETRY_TIMEOUT_SECS: u64 = 15;

/// Read access to the boot loader's environment variables.
pub trait Environment {
    fn var(&self, name: &str) -> Option<String>;
}

/// An environment without any variables.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoEnvironment;

impl Environment for NoEnvironment {
    fn var(&self, _name: &str) -> Option<String> {
        None
    }
}

impl Environment for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// The configured retry timeout.
#[must_use]
pub fn retry_timeout_secs<E: Environment + ?Sized>(env: &E) -> u64 {
    parse_retry_timeout(env.var(RETRY_TIMEOUT_VAR).as_deref())
}

/// Parses a timeout in decimal seconds. Unset, malformed and zero values
/// yield [`DEFAULT_RETRY_TIMEOUT_SECS`].
#[must_use]
pub fn parse_retry_timeout(value: Option<&str>) -> u64 {
    let Some(value) = value else {
        return DEFAULT_RETRY_TIMEOUT_SECS;
    };
    match value.trim().parse::<u64>() {
        Ok(0) => DEFAULT_RETRY_TIMEOUT_SECS,
        Ok(secs) => secs,
        Err(e) => {
            warn!(target: "ofdisk", "{RETRY_TIMEOUT_VAR}={value:?}: {e}");
            DEFAULT_RETRY_TIMEOUT_SECS
        }
    }
}

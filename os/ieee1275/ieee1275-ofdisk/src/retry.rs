//! Retrying opens and reads of network-attached disks.
//!
//! Fibre Channel links may take several seconds to come up after the
//! firmware hands over control. Opening or reading a disk behind such a link
//! fails with [`DiskError::UnknownDevice`] until then, so those operations are
//! retried once per second until a deadline passes.

use crate::error::DiskError;
use log::debug;

/// Pause between two attempts.
pub const RETRY_INTERVAL_MS: u64 = 1000;

const FIBRE_CHANNEL_MARKER: &str = "fibre-channel@";
const VFC_CLIENT_MARKER: &str = "vfc-client";
const NVMEOF_MARKER: &str = "nvme-of";

/// Monotonic time source the retry loop waits on.
pub trait Clock {
    fn now_ms(&self) -> u64;
    fn sleep_ms(&mut self, ms: u64);
}

/// Whether a disk is reached over Fibre Channel (physical or virtual) and
/// not through an NVMe-oF controller.
///
/// This looks at the exposed name only. Paths whose node names do not follow
/// the usual `fibre-channel@`/`vfc-client` naming are never retried, and
/// any name containing `nvme-of` is excluded.
#[must_use]
pub fn is_retryable(name: &str) -> bool {
    (name.contains(FIBRE_CHANNEL_MARKER) || name.contains(VFC_CLIENT_MARKER))
        && !name.contains(NVMEOF_MARKER)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    timeout_secs: u64,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    /// A single attempt.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0)
    }

    /// The policy for the disk exposed as `name`.
    #[must_use]
    pub fn for_target(name: &str, timeout_secs: u64) -> Self {
        if is_retryable(name) {
            Self::new(timeout_secs)
        } else {
            Self::none()
        }
    }

    #[must_use]
    pub const fn timeout_secs(self) -> u64 {
        self.timeout_secs
    }

    /// Runs `op` until it succeeds, fails with anything but
    /// [`DiskError::UnknownDevice`], or the deadline has passed.
    ///
    /// # Errors
    /// The error of the last attempt.
    pub fn run<S, T, O>(self, state: &mut S, what: &str, mut op: O) -> Result<T, DiskError>
    where
        S: Clock + ?Sized,
        O: FnMut(&mut S) -> Result<T, DiskError>,
    {
        let deadline = state
            .now_ms()
            .saturating_add(self.timeout_secs.saturating_mul(1000));
        loop {
            let result = op(state);
            let cont = state.now_ms() < deadline;
            match result {
                Err(DiskError::UnknownDevice(reason)) if cont => {
                    debug!(target: "ofdisk", "failed to {what}: {reason}. Retrying...");
                    state.sleep_ms(RETRY_INTERVAL_MS);
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    struct FakeClock {
        now: u64,
        attempts: usize,
    }

    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            self.now
        }

        fn sleep_ms(&mut self, ms: u64) {
            self.now += ms;
        }
    }

    #[test]
    fn classifies_network_paths() {
        assert!(is_retryable(
            "ieee1275/pci@800000020000015/fibre-channel@0/disk@500507680b215660\\,0"
        ));
        assert!(is_retryable("ieee1275/vdevice/vfc-client@30000004/disk@5005076802232ade"));
        assert!(!is_retryable(
            "ieee1275/pci@0/fibre-channel@0/nvme-of/controller@a\\,ffff/namespace@1"
        ));
        assert!(!is_retryable("ieee1275/vdevice/v-scsi@30000002/disk@8100000000000000"));
    }

    #[test]
    fn unknown_device_is_retried_until_the_deadline() {
        let mut clock = FakeClock { now: 0, attempts: 0 };
        let result: Result<(), _> = RetryPolicy::new(2).run(&mut clock, "open", |c| {
            c.attempts += 1;
            Err(DiskError::UnknownDevice(String::from("can't open device")))
        });
        assert!(matches!(result, Err(DiskError::UnknownDevice(_))));
        assert_eq!(clock.attempts, 3);
        assert_eq!(clock.now, 2000);
    }

    #[test]
    fn other_errors_are_not_retried() {
        let mut clock = FakeClock { now: 0, attempts: 0 };
        let result: Result<(), _> = RetryPolicy::new(15).run(&mut clock, "read", |c| {
            c.attempts += 1;
            Err(DiskError::ReadError(String::from("short read")))
        });
        assert!(matches!(result, Err(DiskError::ReadError(_))));
        assert_eq!(clock.attempts, 1);
        assert_eq!(clock.now, 0);
    }

    #[test]
    fn success_after_a_transient_failure() {
        let mut clock = FakeClock { now: 0, attempts: 0 };
        let result = RetryPolicy::new(15).run(&mut clock, "open", |c| {
            c.attempts += 1;
            if c.attempts < 4 {
                Err(DiskError::UnknownDevice(String::from("link down")))
            } else {
                Ok(c.attempts)
            }
        });
        assert_eq!(result, Ok(4));
        assert_eq!(clock.now, 3000);
    }

    #[test]
    fn local_disks_get_a_single_attempt() {
        let policy = RetryPolicy::for_target("ieee1275/pci@0/scsi@1/disk@0", 15);
        assert_eq!(policy, RetryPolicy::none());

        let mut clock = FakeClock { now: 0, attempts: 0 };
        let result: Result<(), _> = policy.run(&mut clock, "open", |c| {
            c.attempts += 1;
            Err(DiskError::UnknownDevice(String::from("can't open device")))
        });
        assert!(result.is_err());
        assert_eq!(clock.attempts, 1);
    }
}

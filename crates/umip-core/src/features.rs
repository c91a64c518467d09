//! Host feature gate.
//!
//! UMIP faults only occur on hardware that advertises the capability, so the
//! gate's job is cheap refusal everywhere else: foreign architectures, and
//! x86 parts without the feature bit. The CPUID probe is pure and
//! side-effect free, so concurrent first calls may compute it redundantly;
//! the published [`OnceLock`] value guarantees it is not repeated forever.

use std::sync::OnceLock;

/// Configuration for a [`crate::UmipEmulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmulatorConfig {
    /// Whether this platform/architecture combination should attempt
    /// emulation at all. Defaults to true only on x86/x86-64 hosts; the
    /// emulated instructions do not exist anywhere else.
    pub enabled: bool,
    /// Overrides the host CPUID probe when set. Embedders that virtualize
    /// CPUID (and tests that must not depend on the build machine's CPU)
    /// decide UMIP availability themselves.
    pub umip_override: Option<bool>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            enabled: cfg!(any(target_arch = "x86", target_arch = "x86_64")),
            umip_override: None,
        }
    }
}

static HOST_UMIP: OnceLock<bool> = OnceLock::new();

/// Whether the host CPU advertises UMIP, computed at most once per process.
pub(crate) fn host_has_umip() -> bool {
    *HOST_UMIP.get_or_init(probe_host_umip)
}

/// CPUID.07H.0H:ECX.UMIP[bit 2].
///
/// CR4.UMIP (whether the feature is actually *enabled*) is not readable from
/// user space, so the capability bit is the best available signal.
#[cfg(target_arch = "x86_64")]
fn probe_host_umip() -> bool {
    use std::arch::x86_64::{__cpuid, __cpuid_count};

    // CPUID is unprivileged and always present on x86-64.
    let max_basic_leaf = unsafe { __cpuid(0) }.eax;
    if max_basic_leaf < 7 {
        return false;
    }
    unsafe { __cpuid_count(7, 0) }.ecx & (1 << 2) != 0
}

#[cfg(target_arch = "x86")]
fn probe_host_umip() -> bool {
    use std::arch::x86::{__cpuid, __cpuid_count, has_cpuid};

    if !has_cpuid() {
        return false;
    }
    let max_basic_leaf = unsafe { __cpuid(0) }.eax;
    if max_basic_leaf < 7 {
        return false;
    }
    unsafe { __cpuid_count(7, 0) }.ecx & (1 << 2) != 0
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn probe_host_umip() -> bool {
    false
}

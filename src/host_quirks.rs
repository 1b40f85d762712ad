//! Host engine quirks, detected once from the hosting environment's
//! identifier string (`spec.md` §5 "Process-wide state", §9 "Host engine
//! quirks").
//!
//! Both quirks are compiled in as boolean feature checks and treated as
//! configuration, never as platform branches inside the remux components
//! themselves.

/// Engine-specific compensations detected once at `Remuxer::new` time.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostQuirks {
    /// Old engines reject a negative `tfdt` base media decode time; clamp
    /// the first video DTS of a fragment to zero (`spec.md` §4.3 Step F).
    pub requires_positive_dts: bool,
    /// Chromium < 70 drops the first fragment of a stream if its first
    /// sample is flagged non-sync; force it to look like a keyframe
    /// (`spec.md` §4.3 Step I).
    pub legacy_keyframe_workaround: bool,
}

impl HostQuirks {
    /// Detect quirks from a host/user-agent-like identifier string.
    pub fn detect(vendor: &str) -> Self {
        Self {
            requires_positive_dts: is_legacy_safari(vendor),
            legacy_keyframe_workaround: chromium_version(vendor).is_some_and(|v| v < 70),
        }
    }
}

fn is_legacy_safari(vendor: &str) -> bool {
    vendor.contains("AppleWebKit") && !vendor.contains("Chrome") && !vendor.contains("CriOS")
}

/// Extract the major Chromium/Chrome version number from a UA-like string,
/// e.g. `"... Chrome/69.0.3497.100 ..."` -> `Some(69)`.
fn chromium_version(vendor: &str) -> Option<u32> {
    let marker = "Chrome/";
    let start = vendor.find(marker)? + marker.len();
    let rest = &vendor[start..];
    let end = rest.find('.').unwrap_or(rest.len());
    rest[..end].parse().ok()
}

use common::{DISCOVERY_FAMILY, PROTOCOL_VERSION};
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSkew {
    Older,
    Newer,
}

/// Watches group joins for peers speaking another protocol version.
///
/// Versions compare as plain strings, so `"10"` sorts before `"4"`. Peers
/// apply the same ordering when they warn about us; keep the two in step.
#[derive(Debug, Clone)]
pub struct VersionGate {
    family: String,
    supported: String,
    warned_older: bool,
    warned_newer: bool,
}

impl VersionGate {
    pub fn new(family: impl Into<String>, supported: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            supported: supported.into(),
            warned_older: false,
            warned_newer: false,
        }
    }

    /// Splits `<base>-v<version>`; a bare `<base>` is version `"0"`.
    pub fn split_group(group: &str) -> (&str, &str) {
        group.rsplit_once("-v").unwrap_or((group, "0"))
    }

    /// Inspects a joined group name.
    ///
    /// Returns the skew only the first time each direction is seen.
    pub fn observe(&mut self, group: &str) -> Option<VersionSkew> {
        let (base, version) = Self::split_group(group);
        if base != self.family {
            return None;
        }
        if !self.warned_older && version < self.supported.as_str() {
            warn!(
                "Peers with an outdated protocol version found ({}). Please update these devices.",
                group
            );
            self.warned_older = true;
            Some(VersionSkew::Older)
        } else if !self.warned_newer && version > self.supported.as_str() {
            warn!("Peers with a newer protocol version found ({}). You should update.", group);
            self.warned_newer = true;
            Some(VersionSkew::Newer)
        } else {
            None
        }
    }

    pub fn warned_older(&self) -> bool {
        self.warned_older
    }

    pub fn warned_newer(&self) -> bool {
        self.warned_newer
    }
}

impl Default for VersionGate {
    fn default() -> Self {
        Self::new(DISCOVERY_FAMILY, PROTOCOL_VERSION)
    }
}

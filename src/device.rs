//! Device identity. The spec treats the numeric backend as an external
//! collaborator (§4.F, §6); this crate ships exactly one, [`crate::cpu_backend`],
//! and this module only carries the identity two tensors compare to decide
//! whether they may interact.

/// Coarse backend family, used in error messages. A backend author adding a
/// second concrete backend would extend this enum alongside [`Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceLocation {
    Cpu,
}

/// A device handle. `id` disambiguates multiple instances of the same
/// backend family (e.g. two independent arenas); tensors may only interact
/// when both `location` and `id` match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    location: DeviceLocation,
    id: u64,
}

impl Device {
    pub const fn cpu() -> Self {
        Self { location: DeviceLocation::Cpu, id: 0 }
    }

    pub const fn cpu_with_id(id: u64) -> Self {
        Self { location: DeviceLocation::Cpu, id }
    }

    pub fn location(&self) -> DeviceLocation {
        self.location
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn same_device(&self, other: &Self) -> bool {
        self == other
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::cpu()
    }
}

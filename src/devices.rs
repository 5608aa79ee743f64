//! Injected device-inventory repository.
//!
//! The engine never reaches for an ambient device registry: the session
//! receives an inventory implementation and asks it which categories are
//! configured and which concrete device a candidate should target.

use serde::{Deserialize, Serialize};

use crate::intent::{DeviceAvailability, DeviceCategory};

/// A configured smart-home device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Collaborator-side device id.
    pub id: String,
    /// Human-readable name ("bedroom lamp").
    pub name: String,
    pub category: DeviceCategory,
    /// Room the device lives in, when known.
    pub room: Option<String>,
}

/// Repository contract for the household's device inventory.
pub trait DeviceInventory: Send + Sync {
    /// Which categories have at least one configured device.
    fn availability(&self) -> DeviceAvailability;

    /// Pick the device a candidate should target: a room match when the
    /// candidate names a room, otherwise the first device in category.
    fn resolve(&self, category: DeviceCategory, room: Option<&str>) -> Option<Device>;
}

/// Fixed in-memory inventory, built once from host configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceInventory {
    devices: Vec<Device>,
}

impl StaticDeviceInventory {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }
}

impl DeviceInventory for StaticDeviceInventory {
    fn availability(&self) -> DeviceAvailability {
        let mut availability = DeviceAvailability::none();
        for device in &self.devices {
            match device.category {
                DeviceCategory::Lights => availability.lights = true,
                DeviceCategory::Entertainment => availability.entertainment = true,
                DeviceCategory::Thermostat => availability.thermostat = true,
                DeviceCategory::Locks => availability.locks = true,
            }
        }
        availability
    }

    fn resolve(&self, category: DeviceCategory, room: Option<&str>) -> Option<Device> {
        let in_category = || self.devices.iter().filter(|d| d.category == category);

        if let Some(room) = room
            && let Some(device) = in_category().find(|d| d.room.as_deref() == Some(room))
        {
            return Some(device.clone());
        }
        in_category().next().cloned()
    }
}

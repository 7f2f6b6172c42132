//! The vendor client this bridge drives.
//!
//! Session handling and the transport live behind [`SaveConnectApi`]; the rest of the crate only
//! sees devices and register updates.

use crate::fan::{SettableAirflow, UserMode};
use crate::value::RegisterUpdate;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, serde::Serialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "UNITS_CELSIUS")]
    Celsius,
    #[serde(rename = "UNITS_FAHRENHEIT")]
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }
}

/// A unit as listed by the vendor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VendorDevice {
    pub identifier: String,
    pub name: String,
    pub temperature_unit: TemperatureUnit,
    /// Register values known at listing time.
    pub registry: Vec<RegisterUpdate>,
}

#[allow(async_fn_in_trait)]
pub trait SaveConnectApi {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns `false` if the credentials were rejected.
    async fn login(&mut self) -> Result<bool, Self::Error>;

    async fn get_devices(
        &mut self,
        update: bool,
        fetch_device_info: bool,
    ) -> Result<Vec<VendorDevice>, Self::Error>;

    async fn update_device_info(&mut self, devices: &mut [VendorDevice]) -> Result<(), Self::Error>;

    /// Fetch the current register values of a device.
    async fn read_registers(
        &mut self,
        device: &VendorDevice,
    ) -> Result<Vec<RegisterUpdate>, Self::Error>;

    async fn set_airflow(
        &mut self,
        device: &VendorDevice,
        airflow: SettableAirflow,
    ) -> Result<bool, Self::Error>;

    /// `duration` applies to the timed modes and is in the unit of the mode's time register.
    async fn set_mode(
        &mut self,
        device: &VendorDevice,
        mode: UserMode,
        duration: u16,
    ) -> Result<bool, Self::Error>;
}

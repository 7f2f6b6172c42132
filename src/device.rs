use crate::api::{SaveConnectApi, TemperatureUnit, VendorDevice};
use crate::availability::Availability;
use crate::fan::{SettableAirflow, UserMode};
use crate::registers::Register;
use crate::state::{DeviceState, Field};
use crate::value::{RegisterUpdate, RegisterValue};
use std::collections::BTreeMap;

pub const DOMAIN: &str = "systemair";
pub const MANUFACTURER: &str = "Systemair";

/// Device entry as registered with the host.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<(&'static str, String)>,
    pub manufacturer: &'static str,
    pub model: String,
    pub name: String,
    pub device_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ExtraAttributes {
    pub main_board_version: Option<String>,
    pub iam_version: Option<String>,
}

/// A ventilation unit along with everything this bridge has learned about it.
#[derive(Debug)]
pub struct SaveConnectDevice {
    vendor: VendorDevice,
    state: DeviceState,
    /// Latest raw value of every known register, including those the state does not track.
    registry: BTreeMap<Register, RegisterValue>,
    availability: Availability,
    mode_duration: u16,
}

impl SaveConnectDevice {
    pub fn new(vendor: VendorDevice, mode_duration: u16) -> Self {
        let mut device = Self {
            state: DeviceState::default(),
            registry: BTreeMap::new(),
            availability: Availability::default(),
            mode_duration,
            vendor,
        };
        let snapshot = std::mem::take(&mut device.vendor.registry);
        for update in &snapshot {
            device.on_register_update(update);
        }
        device.vendor.registry = snapshot;
        device
    }

    pub fn on_register_update(&mut self, update: &RegisterUpdate) -> Option<Field> {
        if let Some(register) = update.known_register() {
            self.registry.insert(register, update.value.clone());
        }
        self.state.apply(update)
    }

    /// Poll the vendor once. Returns whether the poll succeeded.
    pub async fn update<A: SaveConnectApi>(&mut self, api: &mut A) -> bool {
        match api.read_registers(&self.vendor).await {
            Ok(updates) => {
                for update in &updates {
                    self.on_register_update(update);
                }
                self.availability.record_success();
                tracing::debug!(device = self.device_id(), count = updates.len(), "device updated");
                true
            }
            Err(e) => {
                self.availability.record_failure();
                tracing::warn!(
                    device = %self.name(),
                    failures = self.availability.failures(),
                    err = %e,
                    "update failed"
                );
                false
            }
        }
    }

    pub async fn set_fan_mode<A: SaveConnectApi>(
        &self,
        api: &mut A,
        airflow: SettableAirflow,
    ) -> Result<bool, A::Error> {
        api.set_airflow(&self.vendor, airflow).await
    }

    pub async fn set_mode<A: SaveConnectApi>(
        &self,
        api: &mut A,
        mode: UserMode,
    ) -> Result<bool, A::Error> {
        api.set_mode(&self.vendor, mode, self.mode_duration).await
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn vendor(&self) -> &VendorDevice {
        &self.vendor
    }

    pub fn register_value(&self, register: Register) -> Option<&RegisterValue> {
        self.registry.get(&register)
    }

    pub fn device_model(&self) -> Option<&str> {
        self.state.device_model.as_deref()
    }

    pub fn device_id(&self) -> &str {
        &self.vendor.identifier
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        self.vendor.temperature_unit
    }

    pub fn name(&self) -> String {
        match self.device_model() {
            Some(model) => format!("{MANUFACTURER} {model}"),
            None => self.vendor.name.clone(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.availability.is_available()
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifiers: vec![(DOMAIN, self.device_id().to_string())],
            manufacturer: MANUFACTURER,
            model: format!("{MANUFACTURER} ({})", self.device_id()),
            name: self.name(),
            device_id: self.device_id().to_string(),
        }
    }

    pub fn extra_attributes(&self) -> ExtraAttributes {
        ExtraAttributes {
            main_board_version: self.state.main_board_version.complete(),
            iam_version: self.state.iam_version.complete(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{self, Call, FakeApi};
    use crate::fan::Airflow;

    #[test]
    fn populated_from_snapshot() {
        let device = SaveConnectDevice::new(fake::device("IAM_1"), 60);
        assert_eq!(device.device_model(), Some("VTR 300"));
        assert_eq!(device.state().user_mode, Some(UserMode::Manual));
        assert_eq!(device.state().airflow_level, Some(Airflow::Normal));
        assert_eq!(device.vendor().registry.len(), 3);
        assert_eq!(device.name(), "Systemair VTR 300");
        assert_eq!(
            device.register_value(Register::SystemUnitModel),
            Some(&RegisterValue::from("VTR 300"))
        );
    }

    #[test]
    fn naming_and_info() {
        let mut vendor = fake::device("IAM_7");
        vendor.registry.clear();
        let device = SaveConnectDevice::new(vendor, 60);
        assert_eq!(device.name(), "Living room");
        let info = device.device_info();
        assert_eq!(info.identifiers, [("systemair", "IAM_7".to_string())]);
        assert_eq!(info.manufacturer, "Systemair");
        assert_eq!(info.model, "Systemair (IAM_7)");
        assert_eq!(info.device_id, "IAM_7");
    }

    #[test]
    fn versions_as_attributes() {
        let mut device = SaveConnectDevice::new(fake::device("IAM_1"), 60);
        for (register, value) in [
            (Register::RunningVersionMajor, 1),
            (Register::RunningVersionMinor, 22),
            (Register::RunningVersionBuild, 3),
        ] {
            device.on_register_update(&RegisterUpdate::new(register, value).with_device_type(2));
        }
        assert_eq!(device.extra_attributes(), ExtraAttributes {
            main_board_version: None,
            iam_version: Some("1.22.3".into()),
        });
    }

    #[tokio::test]
    async fn polling_tracks_availability() {
        let mut api = FakeApi::new();
        api.registers = vec![RegisterUpdate::new(Register::SpeedIndicationApp, "high")];
        let mut device = SaveConnectDevice::new(fake::device("IAM_1"), 60);
        assert!(device.update(&mut api).await);
        assert_eq!(device.state().airflow_level, Some(Airflow::High));
        assert_eq!(api.calls, [Call::ReadRegisters("IAM_1".into())]);

        api.reachable = false;
        for _ in 0..31 {
            assert!(!device.update(&mut api).await);
        }
        assert!(!device.is_available());
        assert_eq!(device.state().airflow_level, Some(Airflow::High));

        api.reachable = true;
        assert!(device.update(&mut api).await);
        assert!(device.is_available());
    }

    #[tokio::test]
    async fn mode_uses_configured_duration() {
        let mut api = FakeApi::new();
        let device = SaveConnectDevice::new(fake::device("IAM_1"), 4);
        assert!(device.set_mode(&mut api, UserMode::Crowded).await.unwrap());
        assert!(device.set_fan_mode(&mut api, SettableAirflow::Low).await.unwrap());
        assert_eq!(api.calls, [
            Call::SetMode(UserMode::Crowded, 4),
            Call::SetAirflow(SettableAirflow::Low)
        ]);
    }
}

//! Entities exposed to the host: sensors, alarm binary sensors and the ventilation fan.

use crate::api::{SaveConnectApi, TemperatureUnit};
use crate::device::{DeviceInfo, ExtraAttributes, SaveConnectDevice};
use crate::fan::{self, Airflow, InvalidPreset, SettableAirflow};
use crate::registers::Register;
use crate::state::{Alarm, AlarmState};
use crate::value::RegisterValue;

pub const SAVECONNECT_NAME: &str = "SAVE Connect";

pub fn unique_id(device: &SaveConnectDevice, key: &str) -> String {
    format!("{SAVECONNECT_NAME}-{}-{key}", device.device_id())
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Humidity,
    Temperature,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
}

pub struct SensorDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    /// Unit of the reading. Temperatures instead follow the unit configured on the device.
    pub unit: &'static str,
    pub device_class: DeviceClass,
    pub state_class: StateClass,
    pub register: Register,
    pub value_fn: fn(&RegisterValue) -> Option<f64>,
}

fn percent(value: &RegisterValue) -> Option<f64> {
    Some(value.as_integer()? as f64)
}

fn tenths(value: &RegisterValue) -> Option<f64> {
    Some(value.as_integer()? as f64 / 10.0)
}

pub static SENSORS: [SensorDescription; 5] = [
    SensorDescription {
        key: "internal_relative_humidity",
        name: "Internal Relative Humidity",
        icon: "mdi:water-percent",
        unit: "%",
        device_class: DeviceClass::Humidity,
        state_class: StateClass::Measurement,
        register: Register::SensorRhsPdm,
        value_fn: percent,
    },
    SensorDescription {
        key: "internal_extract_temperature",
        name: "Internal Extract Temperature",
        icon: "mdi:temperature-celsius",
        unit: "°C",
        device_class: DeviceClass::Temperature,
        state_class: StateClass::Measurement,
        register: Register::SensorPdmEatValue,
        value_fn: tenths,
    },
    SensorDescription {
        key: "outdoor_temperature",
        name: "Outdoor Temperature",
        icon: "mdi:temperature-celsius",
        unit: "°C",
        device_class: DeviceClass::Temperature,
        state_class: StateClass::Measurement,
        register: Register::SensorOat,
        value_fn: tenths,
    },
    SensorDescription {
        key: "overheating_temperature",
        name: "Overheating Temperature",
        icon: "mdi:temperature-celsius",
        unit: "°C",
        device_class: DeviceClass::Temperature,
        state_class: StateClass::Measurement,
        register: Register::SensorOht,
        value_fn: tenths,
    },
    SensorDescription {
        key: "supply_temperature",
        name: "Supply Temperature",
        icon: "mdi:temperature-celsius",
        unit: "°C",
        device_class: DeviceClass::Temperature,
        state_class: StateClass::Measurement,
        register: Register::SensorSat,
        value_fn: tenths,
    },
];

pub struct Sensor<'a> {
    device: &'a SaveConnectDevice,
    pub description: &'static SensorDescription,
}

pub fn sensors(device: &SaveConnectDevice) -> impl Iterator<Item = Sensor<'_>> {
    SENSORS.iter().map(move |description| Sensor { device, description })
}

impl Sensor<'_> {
    pub fn name(&self) -> &'static str {
        self.description.name
    }

    pub fn unique_id(&self) -> String {
        unique_id(self.device, self.description.key)
    }

    pub fn native_value(&self) -> Option<f64> {
        let value = self.device.register_value(self.description.register)?;
        (self.description.value_fn)(value)
    }

    pub fn is_available(&self) -> bool {
        self.device.is_available() && self.native_value().is_some()
    }

    pub fn unit(&self) -> &'static str {
        match self.description.device_class {
            DeviceClass::Temperature => self.device.temperature_unit().symbol(),
            DeviceClass::Humidity => self.description.unit,
        }
    }

    pub fn icon(&self) -> &'static str {
        match (self.description.device_class, self.device.temperature_unit()) {
            (DeviceClass::Temperature, TemperatureUnit::Celsius) => "mdi:temperature-celsius",
            (DeviceClass::Temperature, TemperatureUnit::Fahrenheit) => "mdi:temperature-fahrenheit",
            (DeviceClass::Humidity, _) => self.description.icon,
        }
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.device.device_info()
    }

    pub fn extra_attributes(&self) -> ExtraAttributes {
        self.device.extra_attributes()
    }
}

/// One binary sensor per alarm.
pub struct AlarmSensor<'a> {
    device: &'a SaveConnectDevice,
    pub alarm: Alarm,
}

pub fn alarm_sensors(device: &SaveConnectDevice) -> impl Iterator<Item = AlarmSensor<'_>> {
    Alarm::ALL.iter().map(move |&alarm| AlarmSensor { device, alarm })
}

impl AlarmSensor<'_> {
    pub fn key(&self) -> &'static str {
        self.alarm.key()
    }

    pub fn name(&self) -> String {
        self.alarm.display_name()
    }

    pub fn unique_id(&self) -> String {
        unique_id(self.device, self.alarm.key())
    }

    /// `None` while the alarm has not been reported.
    pub fn is_on(&self) -> Option<bool> {
        self.device.state().alarm(self.alarm).map(|s| s == AlarmState::Active)
    }

    pub fn state(&self) -> Option<AlarmState> {
        self.device.state().alarm(self.alarm)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CommandError<E: std::error::Error + 'static> {
    #[error("preset mode was not accepted")]
    InvalidPreset(#[from] InvalidPreset),
    #[error("the device did not accept the {0} request")]
    Rejected(String),
    #[error("could not send the {1} request to the device")]
    Vendor(#[source] E, String),
}

/// What a fan command ended up doing.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    /// The device already is in the requested state.
    Unchanged,
    /// The request was accepted; `refreshed` tells whether the follow-up poll succeeded.
    Sent { refreshed: bool },
}

/// The ventilation fan of a device.
pub struct Ventilation<'a> {
    device: &'a mut SaveConnectDevice,
}

impl<'a> Ventilation<'a> {
    pub const NAME: &'static str = "Ventilation";

    pub fn new(device: &'a mut SaveConnectDevice) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &SaveConnectDevice {
        &*self.device
    }

    pub fn unique_id(&self) -> String {
        unique_id(&*self.device, "fan")
    }

    pub fn airflow(&self) -> Option<Airflow> {
        self.device.state().airflow_level
    }

    pub fn is_available(&self) -> bool {
        self.device.is_available() && self.airflow().is_some()
    }

    pub fn percentage(&self) -> Option<u8> {
        self.airflow().map(fan::airflow_to_percentage)
    }

    pub fn speed_count(&self) -> u8 {
        fan::SPEED_COUNT
    }

    pub fn preset_modes(&self) -> Vec<&'static str> {
        fan::preset_modes().collect()
    }

    pub fn preset_mode(&self) -> Option<&'static str> {
        fan::mode_to_preset(self.device.state().user_mode?)
    }

    /// `None` while the airflow level is unknown.
    pub fn is_on(&self) -> Option<bool> {
        self.airflow().map(|a| SettableAirflow::from(a) != SettableAirflow::Off)
    }

    /// The `fan_speed` state attribute: the airflow level as reported by the unit.
    pub fn fan_speed(&self) -> Option<Airflow> {
        self.airflow()
    }

    pub async fn set_percentage<A: SaveConnectApi>(
        &mut self,
        api: &mut A,
        percentage: u8,
    ) -> Result<Outcome, CommandError<A::Error>> {
        let level = fan::percentage_to_airflow(percentage);
        self.send_airflow(api, level).await
    }

    pub async fn set_preset_mode<A: SaveConnectApi>(
        &mut self,
        api: &mut A,
        preset: &str,
    ) -> Result<Outcome, CommandError<A::Error>> {
        let mode = match fan::preset_to_mode(preset) {
            Ok(mode) => mode,
            Err(e) => {
                tracing::warn!(device = self.device.device_id(), preset, "{e}");
                return Err(e.into());
            }
        };
        if self.preset_mode() == Some(preset) {
            return Ok(Outcome::Unchanged);
        }
        let description = format!("preset {preset}");
        let accepted = self.device.set_mode(api, mode).await;
        self.finish(api, accepted, description).await
    }

    /// Turn the fan on. Without a requested speed or preset this selects the low speed, unless
    /// the fan is already known to be running.
    pub async fn turn_on<A: SaveConnectApi>(
        &mut self,
        api: &mut A,
        percentage: Option<u8>,
        preset: Option<&str>,
    ) -> Result<Outcome, CommandError<A::Error>> {
        tracing::debug!(device = self.device.device_id(), ?percentage, ?preset, "turn on");
        if let Some(preset) = preset {
            return self.set_preset_mode(api, preset).await;
        }
        if let Some(percentage) = percentage {
            return self.set_percentage(api, percentage).await;
        }
        if self.is_on() == Some(true) {
            return Ok(Outcome::Unchanged);
        }
        self.send_airflow(api, SettableAirflow::Low).await
    }

    pub async fn turn_off<A: SaveConnectApi>(
        &mut self,
        api: &mut A,
    ) -> Result<Outcome, CommandError<A::Error>> {
        if self.is_on() == Some(false) {
            return Ok(Outcome::Unchanged);
        }
        self.send_airflow(api, SettableAirflow::Off).await
    }

    async fn send_airflow<A: SaveConnectApi>(
        &mut self,
        api: &mut A,
        level: SettableAirflow,
    ) -> Result<Outcome, CommandError<A::Error>> {
        let description = format!("fan level {level}");
        let accepted = self.device.set_fan_mode(api, level).await;
        self.finish(api, accepted, description).await
    }

    async fn finish<A: SaveConnectApi>(
        &mut self,
        api: &mut A,
        accepted: Result<bool, A::Error>,
        description: String,
    ) -> Result<Outcome, CommandError<A::Error>> {
        match accepted {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(device = self.device.device_id(), "error setting {description}");
                return Err(CommandError::Rejected(description));
            }
            Err(e) => return Err(CommandError::Vendor(e, description)),
        }
        let refreshed = self.device.update(api).await;
        Ok(Outcome::Sent { refreshed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{self, Call, FakeApi};
    use crate::fan::UserMode;
    use crate::value::RegisterUpdate;

    fn device() -> SaveConnectDevice {
        SaveConnectDevice::new(fake::device("IAM_1"), 60)
    }

    #[test]
    fn sensor_values() {
        let mut device = device();
        device.on_register_update(&RegisterUpdate::new(Register::SensorOat, -55));
        device.on_register_update(&RegisterUpdate::new(Register::SensorRhsPdm, "41"));
        let readings = sensors(&device)
            .map(|s| (s.description.key, s.native_value(), s.unit()))
            .collect::<Vec<_>>();
        assert_eq!(readings, [
            ("internal_relative_humidity", Some(41.0), "%"),
            ("internal_extract_temperature", None, "°C"),
            ("outdoor_temperature", Some(-5.5), "°C"),
            ("overheating_temperature", None, "°C"),
            ("supply_temperature", None, "°C"),
        ]);
        let supply = sensors(&device).last().unwrap();
        assert!(!supply.is_available());
        assert_eq!(supply.unique_id(), "SAVE Connect-IAM_1-supply_temperature");
    }

    #[test]
    fn fahrenheit_units() {
        let mut vendor = fake::device("IAM_1");
        vendor.temperature_unit = TemperatureUnit::Fahrenheit;
        let device = SaveConnectDevice::new(vendor, 60);
        let outdoor = sensors(&device).find(|s| s.description.key == "outdoor_temperature").unwrap();
        assert_eq!(outdoor.unit(), "°F");
        assert_eq!(outdoor.icon(), "mdi:temperature-fahrenheit");
        let humidity = sensors(&device).next().unwrap();
        assert_eq!(humidity.unit(), "%");
    }

    #[test]
    fn alarm_sensors_are_three_state() {
        let mut device = device();
        device.on_register_update(&RegisterUpdate::new(Register::AlarmFilter, "active"));
        device.on_register_update(&RegisterUpdate::new(Register::AlarmCo2, "waiting"));
        let all = alarm_sensors(&device).collect::<Vec<_>>();
        assert_eq!(all.len(), 31);
        let filter = all.iter().find(|s| s.alarm == Alarm::FilterChange).unwrap();
        assert_eq!(filter.is_on(), Some(true));
        assert_eq!(filter.name(), "Alarm Filter Change");
        assert_eq!(filter.unique_id(), "SAVE Connect-IAM_1-alarm_filter_change");
        let co2 = all.iter().find(|s| s.alarm == Alarm::Co2Sensor).unwrap();
        assert_eq!(co2.is_on(), Some(false));
        let fire = all.iter().find(|s| s.alarm == Alarm::FireAlarm).unwrap();
        assert_eq!(fire.is_on(), None);
    }

    #[test]
    fn fan_state() {
        let mut device = device();
        let fan = Ventilation::new(&mut device);
        assert_eq!(fan.percentage(), Some(66));
        assert_eq!(fan.preset_mode(), Some("Manual"));
        assert_eq!(fan.is_on(), Some(true));
        assert_eq!(fan.speed_count(), 3);
        assert_eq!(fan.preset_modes().len(), 6);
        assert_eq!(fan.unique_id(), "SAVE Connect-IAM_1-fan");
        assert!(fan.is_available());

        let mut vendor = fake::device("IAM_2");
        vendor.registry.clear();
        let mut device = SaveConnectDevice::new(vendor, 60);
        let fan = Ventilation::new(&mut device);
        assert_eq!(fan.percentage(), None);
        assert_eq!(fan.is_on(), None);
        assert!(!fan.is_available());
    }

    #[tokio::test]
    async fn percentage_command_refreshes() {
        let mut api = FakeApi::new();
        let mut device = device();
        let mut fan = Ventilation::new(&mut device);
        let outcome = fan.set_percentage(&mut api, 34).await.unwrap();
        assert_eq!(outcome, Outcome::Sent { refreshed: true });
        assert_eq!(api.calls, [
            Call::SetAirflow(SettableAirflow::Normal),
            Call::ReadRegisters("IAM_1".into())
        ]);
    }

    #[tokio::test]
    async fn invalid_preset_is_not_sent() {
        let mut api = FakeApi::new();
        let mut device = device();
        let mut fan = Ventilation::new(&mut device);
        let err = fan.set_preset_mode(&mut api, "Turbo").await.unwrap_err();
        assert!(matches!(err, CommandError::InvalidPreset(_)));
        assert!(api.calls.is_empty());
    }

    #[tokio::test]
    async fn same_preset_is_a_no_op() {
        let mut api = FakeApi::new();
        let mut device = device();
        let mut fan = Ventilation::new(&mut device);
        assert_eq!(fan.set_preset_mode(&mut api, "Manual").await.unwrap(), Outcome::Unchanged);
        assert!(api.calls.is_empty());
        fan.set_preset_mode(&mut api, "Away").await.unwrap();
        assert_eq!(api.calls[0], Call::SetMode(UserMode::Away, 60));
    }

    #[tokio::test]
    async fn rejected_commands_are_errors() {
        let mut api = FakeApi::new();
        api.command_result = false;
        let mut device = device();
        let mut fan = Ventilation::new(&mut device);
        let err = fan.set_percentage(&mut api, 100).await.unwrap_err();
        assert!(matches!(err, CommandError::Rejected(_)));
        assert_eq!(api.calls, [Call::SetAirflow(SettableAirflow::High)]);

        api.reachable = false;
        let err = fan.turn_off(&mut api).await.unwrap_err();
        assert!(matches!(err, CommandError::Vendor(..)));
    }

    #[tokio::test]
    async fn turning_on_and_off() {
        let mut api = FakeApi::new();
        let mut device = device();
        let mut fan = Ventilation::new(&mut device);
        assert_eq!(fan.turn_on(&mut api, None, None).await.unwrap(), Outcome::Unchanged);
        assert!(api.calls.is_empty());

        api.registers = vec![RegisterUpdate::new(Register::SpeedIndicationApp, "off")];
        fan.turn_off(&mut api).await.unwrap();
        assert_eq!(fan.is_on(), Some(false));
        assert_eq!(fan.turn_off(&mut api).await.unwrap(), Outcome::Unchanged);

        api.calls.clear();
        api.registers = vec![RegisterUpdate::new(Register::SpeedIndicationApp, "low")];
        fan.turn_on(&mut api, None, None).await.unwrap();
        assert_eq!(api.calls, [
            Call::SetAirflow(SettableAirflow::Low),
            Call::ReadRegisters("IAM_1".into())
        ]);
        assert_eq!(fan.percentage(), Some(33));
    }
}

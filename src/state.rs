//! Projection of register updates onto the device state.
//!
//! Every update changes at most one field of [`DeviceState`]. Fields stay `None` until their
//! register has been observed, so a reader can tell "never seen" from "seen as off".

use crate::fan::{Airflow, UserMode};
use crate::registers::Register;
use crate::value::{RegisterUpdate, vendor_enum_from_value};
use std::collections::BTreeMap;

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, strum::FromRepr, strum::EnumString, strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[repr(u8)]
pub enum AlarmState {
    Inactive = 0,
    Active = 1,
    Waiting = 2,
    ClearedErrorActive = 3,
}

vendor_enum_from_value!(AlarmState);

impl serde::Serialize for AlarmState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(<&'static str>::from(self))
    }
}

macro_rules! for_each_alarm {
    ($m:ident) => {
        $m! {
            SupplyAirFanControl = AlarmSafCtrl, "alarm_supply_air_fan_control";
            ExtractAirFanControl = AlarmEafCtrl, "alarm_extract_air_fan_control";
            FrostProtection = AlarmFrostProt, "alarm_frost_protection";
            DefrostingMalfunction = AlarmDefrosting, "alarm_defrosting_malfunction";
            SupplyAirFanRpm = AlarmSafRpm, "alarm_supply_air_fan_rpm";
            ExtractAirFanRpm = AlarmEafRpm, "alarm_extract_air_fan_rpm";
            FrostProtectionSensor = AlarmFpt, "alarm_frost_protection_sensor";
            OutdoorAirTemperatureSensor = AlarmOat, "alarm_outdoor_air_temperature_sensor";
            SupplyAirTemperatureSensor = AlarmSat, "alarm_supply_air_temperature_sensor";
            RoomAirTemperatureSensor = AlarmRat, "alarm_room_air_temperature_sensor";
            ExtractAirTemperatureSensor = AlarmEat, "alarm_extract_air_temperature_sensor";
            ExtraControllerTemperature = AlarmEct, "alarm_extra_controller_temperature";
            EfficiencyTemperature = AlarmEft, "alarm_efficiency_temperature";
            OverheatTemperature = AlarmOht, "alarm_overheat_temperature";
            EmergencyThermostat = AlarmEmt, "alarm_emergency_thermostat";
            RotorGuardSensor = AlarmRgs, "alarm_rotor_guard_sensor";
            BypassDamperMalfunction = AlarmBys, "alarm_bypass_damper_malfunction";
            SecondaryAirDamperPosition = AlarmSecondaryAir, "alarm_secondary_air_damper_position";
            FilterChange = AlarmFilter, "alarm_filter_change";
            ExtraControllerMalfunction = AlarmExtraController, "alarm_extra_controller_malfunction";
            ExternalStop = AlarmExternalStop, "alarm_external_stop";
            RelativeHumiditySensor = AlarmRh, "alarm_relative_humidity_sensor";
            Co2Sensor = AlarmCo2, "alarm_co2_sensor";
            SupplyAirTemperatureLow = AlarmLowSat, "alarm_supply_air_temperature_low";
            BypassDamperFeedback = AlarmByf, "alarm_bypass_damper_feedback";
            BuiltinRelativeHumiditySensor = AlarmPdmRhs, "alarm_builtin_relative_humidity_sensor";
            BuiltinExtractAirTemperature = AlarmPdmEat, "alarm_builtin_extract_air_temperature";
            ManualStop = AlarmManualFanStop, "alarm_manual_stop";
            OverheatTemperature2 = AlarmOverheatTemperature, "alarm_overheat_temperature2";
            FireAlarm = AlarmFireAlarm, "alarm_fire_alarm";
            FilterWarning = AlarmFilterWarning, "alarm_filter_warning";
        }
    };
}

macro_rules! make_alarm_enum {
    ($($variant: ident = $register: ident, $key: literal;)+) => {
        /// An alarm the unit reports, each backed by one register.
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        pub enum Alarm {
            $($variant),+
        }

        impl Alarm {
            pub const ALL: &[Alarm] = &[$(Alarm::$variant),+];

            pub const fn key(self) -> &'static str {
                match self {
                    $(Alarm::$variant => $key),+
                }
            }

            pub const fn register(self) -> Register {
                match self {
                    $(Alarm::$variant => Register::$register),+
                }
            }

            pub const fn from_register(register: Register) -> Option<Alarm> {
                match register {
                    $(Register::$register => Some(Alarm::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

for_each_alarm!(make_alarm_enum);

impl Alarm {
    /// Human readable name derived from the key, e.g. `Alarm Co2 Sensor`.
    pub fn display_name(self) -> String {
        self.key()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl serde::Serialize for Alarm {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// The board a version register belongs to, selected by the `internalDeviceType` metadata.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Board {
    Main,
    Iam,
}

impl Board {
    pub fn from_device_type(device_type: Option<u8>) -> Option<Board> {
        match device_type? {
            1 => Some(Board::Main),
            2 => Some(Board::Iam),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VersionPart {
    Major,
    Minor,
    Build,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, serde::Serialize)]
pub struct VersionTriple {
    pub major: Option<u32>,
    pub minor: Option<u32>,
    pub build: Option<u32>,
}

impl VersionTriple {
    fn part_mut(&mut self, part: VersionPart) -> &mut Option<u32> {
        match part {
            VersionPart::Major => &mut self.major,
            VersionPart::Minor => &mut self.minor,
            VersionPart::Build => &mut self.build,
        }
    }

    /// `major.minor.build`, once all three parts are known.
    pub fn complete(&self) -> Option<String> {
        Some(format!("{}.{}.{}", self.major?, self.minor?, self.build?))
    }
}

/// The field an update was applied to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Field {
    DeviceModel,
    UserMode,
    AirflowLevel,
    Version(Board, VersionPart),
    Alarm(Alarm),
}

/// Where the value of a register goes. The board of a version register is only known once the
/// update's metadata is inspected.
enum Target {
    DeviceModel,
    UserMode,
    /// A user mode expressed as a change request code.
    RequestedMode,
    AirflowLevel,
    Version(VersionPart),
    Alarm(Alarm),
}

fn target_of(register: Register) -> Option<Target> {
    Some(match register {
        Register::UserModeHmi => Target::UserMode,
        Register::UserModeHmiChangeRequest => Target::RequestedMode,
        Register::ManualAirflowLevelSaf | Register::SpeedIndicationApp => Target::AirflowLevel,
        Register::SystemUnitModel => Target::DeviceModel,
        Register::RunningVersionMajor => Target::Version(VersionPart::Major),
        Register::RunningVersionMinor => Target::Version(VersionPart::Minor),
        Register::RunningVersionBuild => Target::Version(VersionPart::Build),
        other => Target::Alarm(Alarm::from_register(other)?),
    })
}

#[derive(Clone, Default, PartialEq, Eq, Debug, serde::Serialize)]
pub struct DeviceState {
    pub device_model: Option<String>,
    pub user_mode: Option<UserMode>,
    pub airflow_level: Option<Airflow>,
    pub main_board_version: VersionTriple,
    pub iam_version: VersionTriple,
    pub alarms: BTreeMap<Alarm, AlarmState>,
}

impl DeviceState {
    /// Record a single register update.
    ///
    /// Returns the field that was written, or `None` if the register is not one the state
    /// tracks or its value could not be interpreted.
    pub fn apply(&mut self, update: &RegisterUpdate) -> Option<Field> {
        let Some(target) = Register::from_name(&update.register).and_then(target_of) else {
            tracing::trace!(register = %update.register, "register does not map to device state");
            return None;
        };
        let field = match target {
            Target::DeviceModel => {
                self.device_model = Some(update.value.as_text().into_owned());
                Field::DeviceModel
            }
            Target::UserMode => {
                self.user_mode = Some(parse(update, UserMode::try_from(&update.value))?);
                Field::UserMode
            }
            Target::RequestedMode => {
                let mode = match update.value.as_integer() {
                    Some(0) => {
                        tracing::trace!(register = %update.register, "no user mode requested");
                        return None;
                    }
                    Some(code) => UserMode::from_change_request(code).ok_or(()),
                    None => UserMode::try_from(&update.value),
                };
                self.user_mode = Some(parse(update, mode)?);
                Field::UserMode
            }
            Target::AirflowLevel => {
                self.airflow_level = Some(parse(update, Airflow::try_from(&update.value))?);
                Field::AirflowLevel
            }
            Target::Version(part) => {
                let Some(board) = Board::from_device_type(update.metadata.internal_device_type)
                else {
                    tracing::debug!(
                        register = %update.register,
                        device_type = ?update.metadata.internal_device_type,
                        "version register for an unknown board"
                    );
                    return None;
                };
                let number = update.value.as_integer().and_then(|v| u32::try_from(v).ok());
                let number = parse(update, number.ok_or(()))?;
                let triple = match board {
                    Board::Main => &mut self.main_board_version,
                    Board::Iam => &mut self.iam_version,
                };
                *triple.part_mut(part) = Some(number);
                Field::Version(board, part)
            }
            Target::Alarm(alarm) => {
                let state = parse(update, AlarmState::try_from(&update.value))?;
                self.alarms.insert(alarm, state);
                Field::Alarm(alarm)
            }
        };
        Some(field)
    }

    /// `None` if the alarm has not been reported yet.
    pub fn alarm(&self, alarm: Alarm) -> Option<AlarmState> {
        self.alarms.get(&alarm).copied()
    }

    pub fn active_alarms(&self) -> impl Iterator<Item = Alarm> + '_ {
        self.alarms.iter().filter(|(_, s)| **s == AlarmState::Active).map(|(a, _)| *a)
    }
}

fn parse<T>(update: &RegisterUpdate, result: Result<T, ()>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(()) => {
            tracing::debug!(
                register = %update.register,
                value = %update.value,
                "could not interpret the register value"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RegisterValue;

    #[test]
    fn user_mode_registers_alias() {
        let mut state = DeviceState::default();
        let update = RegisterUpdate::new(Register::UserModeHmi, 1);
        assert_eq!(state.apply(&update), Some(Field::UserMode));
        assert_eq!(state.user_mode, Some(UserMode::Manual));
        let update = RegisterUpdate::new(Register::UserModeHmiChangeRequest, "away");
        assert_eq!(state.apply(&update), Some(Field::UserMode));
        assert_eq!(state.user_mode, Some(UserMode::Away));
        assert_eq!(state, DeviceState { user_mode: Some(UserMode::Away), ..Default::default() });
    }

    #[test]
    fn change_requests_use_their_own_codes() {
        let mut state = DeviceState::default();
        let update = RegisterUpdate::new(Register::UserModeHmiChangeRequest, 0);
        assert_eq!(state.apply(&update), None);
        assert_eq!(state, DeviceState::default());
        for (code, mode) in [
            (1, UserMode::Auto),
            (2, UserMode::Manual),
            (3, UserMode::Crowded),
            (4, UserMode::Refresh),
            (5, UserMode::Fireplace),
            (6, UserMode::Away),
            (7, UserMode::Holiday),
        ] {
            let update = RegisterUpdate::new(Register::UserModeHmiChangeRequest, code);
            assert_eq!(state.apply(&update), Some(Field::UserMode));
            assert_eq!(state.user_mode, Some(mode));
        }
        // A pending "no request" leaves the last known mode alone.
        assert_eq!(state.apply(&RegisterUpdate::new(Register::UserModeHmiChangeRequest, 0)), None);
        assert_eq!(state.apply(&RegisterUpdate::new(Register::UserModeHmiChangeRequest, 8)), None);
        assert_eq!(state.user_mode, Some(UserMode::Holiday));
        let update = RegisterUpdate::new(Register::UserModeHmiChangeRequest, "fireplace");
        assert_eq!(state.apply(&update), Some(Field::UserMode));
        assert_eq!(state, DeviceState {
            user_mode: Some(UserMode::Fireplace),
            ..Default::default()
        });
    }

    fn sample(register: Register) -> RegisterValue {
        match register {
            Register::SystemUnitModel => "VTR 300".into(),
            Register::SpeedIndicationApp => "normal".into(),
            Register::UserModeHmiChangeRequest => 6.into(),
            _ => 1.into(),
        }
    }

    /// The state after applying `sample(register)` with the given board metadata to an empty
    /// state.
    fn expected(register: Register, device_type: Option<u8>) -> DeviceState {
        let mut state = DeviceState::default();
        match register {
            Register::UserModeHmi => state.user_mode = Some(UserMode::Manual),
            Register::UserModeHmiChangeRequest => state.user_mode = Some(UserMode::Away),
            Register::ManualAirflowLevelSaf => state.airflow_level = Some(Airflow::Minimum),
            Register::SpeedIndicationApp => state.airflow_level = Some(Airflow::Normal),
            Register::SystemUnitModel => state.device_model = Some("VTR 300".into()),
            Register::RunningVersionMajor
            | Register::RunningVersionMinor
            | Register::RunningVersionBuild => {
                let triple = match device_type {
                    Some(1) => &mut state.main_board_version,
                    Some(2) => &mut state.iam_version,
                    _ => return state,
                };
                let part = match register {
                    Register::RunningVersionMajor => &mut triple.major,
                    Register::RunningVersionMinor => &mut triple.minor,
                    _ => &mut triple.build,
                };
                *part = Some(1);
            }
            other => {
                if let Some(alarm) = Alarm::from_register(other) {
                    state.alarms.insert(alarm, AlarmState::Active);
                }
            }
        }
        state
    }

    #[test]
    fn each_update_sets_exactly_one_field() {
        for &register in Register::ALL {
            for device_type in [None, Some(1), Some(2), Some(3)] {
                let mut update = RegisterUpdate::new(register, sample(register));
                update.metadata.internal_device_type = device_type;
                let mut state = DeviceState::default();
                let field = state.apply(&update);
                let expected = expected(register, device_type);
                assert_eq!(state, expected, "{register} with device type {device_type:?}");
                assert_eq!(
                    field.is_some(),
                    expected != DeviceState::default(),
                    "{register} with device type {device_type:?}"
                );
            }
        }
    }

    #[test]
    fn airflow_registers_alias() {
        let mut state = DeviceState::default();
        let update = RegisterUpdate::new(Register::ManualAirflowLevelSaf, "high");
        assert_eq!(state.apply(&update), Some(Field::AirflowLevel));
        assert_eq!(state.airflow_level, Some(Airflow::High));
        let update = RegisterUpdate::new(Register::SpeedIndicationApp, "maximum");
        assert_eq!(state.apply(&update), Some(Field::AirflowLevel));
        assert_eq!(state.airflow_level, Some(Airflow::Maximum));
    }

    #[test]
    fn versions_follow_device_type() {
        let mut state = DeviceState::default();
        let main = RegisterUpdate::new(Register::RunningVersionMajor, 1).with_device_type(1);
        let iam = RegisterUpdate::new(Register::RunningVersionMajor, 2).with_device_type(2);
        let other = RegisterUpdate::new(Register::RunningVersionMajor, 3).with_device_type(3);
        let none = RegisterUpdate::new(Register::RunningVersionMajor, 4);
        assert_eq!(state.apply(&main), Some(Field::Version(Board::Main, VersionPart::Major)));
        assert_eq!(state.apply(&iam), Some(Field::Version(Board::Iam, VersionPart::Major)));
        assert_eq!(state.apply(&other), None);
        assert_eq!(state.apply(&none), None);
        assert_eq!(state.main_board_version.major, Some(1));
        assert_eq!(state.iam_version.major, Some(2));
        assert_eq!(state.main_board_version.complete(), None);

        state.apply(&RegisterUpdate::new(Register::RunningVersionMinor, 20).with_device_type(1));
        state.apply(&RegisterUpdate::new(Register::RunningVersionBuild, 7).with_device_type(1));
        assert_eq!(state.main_board_version.complete().as_deref(), Some("1.20.7"));
        assert_eq!(state.iam_version.complete(), None);
    }

    #[test]
    fn every_alarm_register_sets_its_alarm() {
        for &alarm in Alarm::ALL {
            let mut state = DeviceState::default();
            let update = RegisterUpdate::new(alarm.register(), "active");
            assert_eq!(state.apply(&update), Some(Field::Alarm(alarm)));
            assert_eq!(state.alarms.len(), 1);
            assert_eq!(state.alarm(alarm), Some(AlarmState::Active));
        }
        assert_eq!(Alarm::ALL.len(), 31);
    }

    #[test]
    fn ignores_unknown_and_unparseable() {
        let mut state = DeviceState::default();
        let unknown = RegisterUpdate {
            register: "REG_SOMETHING_ELSE".into(),
            value: RegisterValue::Integer(1),
            metadata: Default::default(),
        };
        assert_eq!(state.apply(&unknown), None);
        // Known register, but not one that feeds the state.
        assert_eq!(state.apply(&RegisterUpdate::new(Register::SensorOat, 215)), None);
        assert_eq!(state.apply(&RegisterUpdate::new(Register::UserModeHmi, 99)), None);
        assert_eq!(state.apply(&RegisterUpdate::new(Register::AlarmCo2, "sideways")), None);
        assert_eq!(state, DeviceState::default());
    }

    #[test]
    fn unobserved_alarms_are_unknown() {
        let mut state = DeviceState::default();
        state.apply(&RegisterUpdate::new(Register::AlarmFilter, 0));
        state.apply(&RegisterUpdate::new(Register::AlarmCo2, 1));
        assert_eq!(state.alarm(Alarm::FilterChange), Some(AlarmState::Inactive));
        assert_eq!(state.alarm(Alarm::Co2Sensor), Some(AlarmState::Active));
        assert_eq!(state.alarm(Alarm::FireAlarm), None);
        assert_eq!(state.active_alarms().collect::<Vec<_>>(), [Alarm::Co2Sensor]);
    }

    #[test]
    fn display_names() {
        assert_eq!(Alarm::Co2Sensor.display_name(), "Alarm Co2 Sensor");
        assert_eq!(Alarm::FilterWarning.display_name(), "Alarm Filter Warning");
    }

    #[test]
    fn model_user_mode_and_alarm() {
        let mut state = DeviceState::default();
        state.apply(&RegisterUpdate::new(Register::SystemUnitModel, "VTR 300"));
        state.apply(&RegisterUpdate::new(Register::UserModeHmi, "auto"));
        state.apply(&RegisterUpdate::new(Register::AlarmFilterWarning, "active"));
        let expected = DeviceState {
            device_model: Some("VTR 300".into()),
            user_mode: Some(UserMode::Auto),
            alarms: [(Alarm::FilterWarning, AlarmState::Active)].into(),
            ..Default::default()
        };
        assert_eq!(state, expected);
        assert_eq!(state.alarm(Alarm::FilterChange), None);
    }
}

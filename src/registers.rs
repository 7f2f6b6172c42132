//! Registers this bridge knows how to interpret.
//!
//! The SAVE Connect cloud refers to registers by their `REG_*` identifier, while the local IAM
//! module uses the Modbus register number. Registers that only exist in the cloud's view of the
//! unit (model name, board versions, the app speed indication) have no address.

#[derive(Clone, Copy, serde::Serialize, PartialEq, Eq, Debug)]
pub struct DataType {
    scale: u8,
    signed: bool,
    text: bool,
}

impl DataType {
    // Convenience aliases for nicely tabulated `for_each_register` macro definition below.
    pub const U16: Self = Self { scale: 1, signed: false, text: false };
    pub const CEL: Self = Self { scale: 10, signed: true, text: false };
    /// Values that the cloud reports as text.
    pub const STR: Self = Self { scale: 1, signed: false, text: true };

    /// Interpret a raw 16-bit register word.
    pub const fn decode(self, word: u16) -> i64 {
        if self.signed { word as i16 as i64 } else { word as i64 }
    }

    pub const fn scale(&self) -> u8 {
        self.scale
    }

    /// Short name of the value type: `i16`, `u16` or `text`.
    pub const fn kind(&self) -> &'static str {
        match (self.text, self.signed) {
            (true, _) => "text",
            (false, true) => "i16",
            (false, false) => "u16",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.text {
            return f.write_str("T");
        }
        f.write_str(if self.signed { "S/" } else { "U/" })?;
        f.write_fmt(format_args!("{}", self.scale))?;
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct Mode(u8);

impl serde::Serialize for Mode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.0 & Self::R.0 == 0 { "-" } else { "R" })?;
        f.write_str(if self.0 & Self::W.0 == 0 { "-" } else { "W" })?;
        Ok(())
    }
}

impl Mode {
    pub const R: Self = Self(1 << 0);
    pub const W: Self = Self(1 << 1);
    pub const RW: Self = Self(Self::R.0 | Self::W.0);
    const R_: Self = Self::R;
}

macro_rules! for_each_register {
    ($m:ident) => {
        $m! {
            UserModeHmi = "REG_USERMODE_MODE_HMI", U16, R_, address = 1161, min = 0, max = 12;
            UserModeHmiChangeRequest = "REG_USERMODE_HMI_CHANGE_REQUEST", U16, RW, address = 1162, min = 0, max = 7;
            ManualAirflowLevelSaf = "REG_USERMODE_MANUAL_AIRFLOW_LEVEL_SAF", U16, RW, address = 1131, min = 0, max = 4;
            SpeedIndicationApp = "REG_SPEED_INDICATION_APP", STR, R_;
            SystemUnitModel = "REG_SYSTEM_UNIT_MODEL1", STR, R_;
            RunningVersionMajor = "REG_PU_RUNNING_VERSION_MAJOR", U16, R_;
            RunningVersionMinor = "REG_PU_RUNNING_VERSION_MINOR", U16, R_;
            RunningVersionBuild = "REG_PU_RUNNING_VERSION_BUILD", U16, R_;
            HolidayTime = "REG_USERMODE_HOLIDAY_TIME", U16, RW, address = 1101, min = 1, max = 365;
            AwayTime = "REG_USERMODE_AWAY_TIME", U16, RW, address = 1102, min = 1, max = 72;
            FireplaceTime = "REG_USERMODE_FIREPLACE_TIME", U16, RW, address = 1103, min = 1, max = 60;
            CrowdedTime = "REG_USERMODE_CROWDED_TIME", U16, RW, address = 1105, min = 1, max = 8;
            SystemUnitTemperature = "REG_SYSTEM_UNIT_TEMPERATURE", U16, RW, address = 9003, min = 0, max = 1;
            SensorOat = "REG_SENSOR_OAT", CEL, R_, address = 12102, min = -400, max = 800;
            SensorSat = "REG_SENSOR_SAT", CEL, R_, address = 12103, min = -400, max = 800;
            SensorOht = "REG_SENSOR_OHT", CEL, R_, address = 12108, min = -400, max = 800;
            SensorRhsPdm = "REG_SENSOR_RHS_PDM", U16, R_, address = 12136, min = 0, max = 100;
            SensorPdmEatValue = "REG_SENSOR_PDM_EAT_VALUE", CEL, R_, address = 12544, min = -400, max = 800;
            AlarmSafCtrl = "REG_ALARM_SAF_CTRL_ALARM", U16, R_, address = 15002, min = 0, max = 3;
            AlarmEafCtrl = "REG_ALARM_EAF_CTRL_ALARM", U16, R_, address = 15009, min = 0, max = 3;
            AlarmFrostProt = "REG_ALARM_FROST_PROT_ALARM", U16, R_, address = 15016, min = 0, max = 3;
            AlarmDefrosting = "REG_ALARM_DEFROSTING_ALARM", U16, R_, address = 15023, min = 0, max = 3;
            AlarmSafRpm = "REG_ALARM_SAF_RPM_ALARM", U16, R_, address = 15030, min = 0, max = 3;
            AlarmEafRpm = "REG_ALARM_EAF_RPM_ALARM", U16, R_, address = 15037, min = 0, max = 3;
            AlarmFpt = "REG_ALARM_FPT_ALARM", U16, R_, address = 15058, min = 0, max = 3;
            AlarmOat = "REG_ALARM_OAT_ALARM", U16, R_, address = 15065, min = 0, max = 3;
            AlarmSat = "REG_ALARM_SAT_ALARM", U16, R_, address = 15072, min = 0, max = 3;
            AlarmRat = "REG_ALARM_RAT_ALARM", U16, R_, address = 15079, min = 0, max = 3;
            AlarmEat = "REG_ALARM_EAT_ALARM", U16, R_, address = 15086, min = 0, max = 3;
            AlarmEct = "REG_ALARM_ECT_ALARM", U16, R_, address = 15093, min = 0, max = 3;
            AlarmEft = "REG_ALARM_EFT_ALARM", U16, R_, address = 15100, min = 0, max = 3;
            AlarmOht = "REG_ALARM_OHT_ALARM", U16, R_, address = 15107, min = 0, max = 3;
            AlarmEmt = "REG_ALARM_EMT_ALARM", U16, R_, address = 15114, min = 0, max = 3;
            AlarmRgs = "REG_ALARM_RGS_ALARM", U16, R_, address = 15121, min = 0, max = 3;
            AlarmBys = "REG_ALARM_BYS_ALARM", U16, R_, address = 15128, min = 0, max = 3;
            AlarmSecondaryAir = "REG_ALARM_SECONDARY_AIR_ALARM", U16, R_, address = 15135, min = 0, max = 3;
            AlarmFilter = "REG_ALARM_FILTER_ALARM", U16, R_, address = 15142, min = 0, max = 3;
            AlarmExtraController = "REG_ALARM_EXTRA_CONTROLLER_ALARM", U16, R_, address = 15149, min = 0, max = 3;
            AlarmExternalStop = "REG_ALARM_EXTERNAL_STOP_ALARM", U16, R_, address = 15156, min = 0, max = 3;
            AlarmRh = "REG_ALARM_RH_ALARM", U16, R_, address = 15163, min = 0, max = 3;
            AlarmCo2 = "REG_ALARM_CO2_ALARM", U16, R_, address = 15170, min = 0, max = 3;
            AlarmLowSat = "REG_ALARM_LOW_SAT_ALARM", U16, R_, address = 15177, min = 0, max = 3;
            AlarmByf = "REG_ALARM_BYF_ALARM", U16, R_, address = 15184, min = 0, max = 3;
            AlarmPdmRhs = "REG_ALARM_PDM_RHS_ALARM", U16, R_, address = 15509, min = 0, max = 3;
            AlarmPdmEat = "REG_ALARM_PDM_EAT_ALARM", U16, R_, address = 15516, min = 0, max = 3;
            AlarmManualFanStop = "REG_ALARM_MANUAL_FAN_STOP_ALARM", U16, R_, address = 15523, min = 0, max = 3;
            AlarmOverheatTemperature = "REG_ALARM_OVERHEAT_TEMPERATURE_ALARM", U16, R_, address = 15530, min = 0, max = 3;
            AlarmFireAlarm = "REG_ALARM_FIRE_ALARM_ALARM", U16, R_, address = 15537, min = 0, max = 3;
            AlarmFilterWarning = "REG_ALARM_FILTER_WARNING_ALARM", U16, R_, address = 15544, min = 0, max = 3;
        }
    };
}

macro_rules! optional {
    () => {
        None
    };
    ($($lit: tt)+) => {
        Some($($lit)*)
    };
}

macro_rules! make_register_enum {
    ($(
        $variant: ident = $name: literal, $dt: ident, $mode: ident
        $(, address = $address: literal)?
        $(, min = $min: literal)?
        $(, max = $max: literal)?;
    )+) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        pub enum Register {
            $($variant),+
        }

        impl Register {
            pub const ALL: &[Register] = &[$(Register::$variant),+];

            /// The identifier used by the SAVE Connect cloud.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Register::$variant => $name),+
                }
            }

            pub fn from_name(name: &str) -> Option<Register> {
                match name {
                    $($name => Some(Register::$variant),)+
                    _ => None,
                }
            }

            /// The Modbus register number, if the register is available locally.
            pub const fn address(self) -> Option<u16> {
                match self {
                    $(Register::$variant => optional!($($address)?)),+
                }
            }

            pub const fn data_type(self) -> DataType {
                match self {
                    $(Register::$variant => DataType::$dt),+
                }
            }

            pub const fn mode(self) -> Mode {
                match self {
                    $(Register::$variant => Mode::$mode),+
                }
            }

            pub const fn minimum(self) -> Option<i64> {
                match self {
                    $(Register::$variant => optional!($($min)?)),+
                }
            }

            pub const fn maximum(self) -> Option<i64> {
                match self {
                    $(Register::$variant => optional!($($max)?)),+
                }
            }
        }
    };
}

for_each_register!(make_register_enum);

impl Register {
    pub const fn description(self) -> &'static str {
        match self {
            Register::UserModeHmi => {
                "Active User mode. 0=Auto, 1=Manual, 2=Crowded, 3=Refresh, 4=Fireplace, 5=Away, \
                 6=Holiday, 7=Cooker Hood, 8=Vacuum Cleaner, 9=CDI1, 10=CDI2, 11=CDI3, \
                 12=PressureGuard"
            }
            Register::UserModeHmiChangeRequest => {
                "New desired user mode as requested by HMI. 0=None, 1=AUTO, 2=Manual, \
                 3=Crowded, 4=Refresh, 5=Fireplace, 6=Away, 7=Holiday"
            }
            Register::ManualAirflowLevelSaf => {
                "Fan speed level for mode Manual. 0=Off, 2=Low, 3=Normal, 4=High"
            }
            Register::SpeedIndicationApp => "Fan speed level as shown in the mobile application",
            Register::SystemUnitModel => "Unit model name",
            Register::RunningVersionMajor => {
                "Running firmware major version of the board named by the device type"
            }
            Register::RunningVersionMinor => {
                "Running firmware minor version of the board named by the device type"
            }
            Register::RunningVersionBuild => {
                "Running firmware build number of the board named by the device type"
            }
            Register::HolidayTime => "Time delay setting for user mode Holiday (days)",
            Register::AwayTime => "Time delay setting for user mode Away (hours)",
            Register::FireplaceTime => "Time delay setting for user mode Fire Place (minutes)",
            Register::CrowdedTime => "Time delay setting for user mode Crowded (hours)",
            Register::SystemUnitTemperature => "Temperature unit. 0=Celsius, 1=Fahrenheit",
            Register::SensorOat => "Outdoor air temperature sensor",
            Register::SensorSat => "Supply air temperature sensor",
            Register::SensorOht => "Overheat temperature sensor",
            Register::SensorRhsPdm => "Relative humidity sensor built into the unit",
            Register::SensorPdmEatValue => "Extract air temperature sensor built into the unit",
            Register::AlarmSafCtrl => "Supply air fan control alarm",
            Register::AlarmEafCtrl => "Extract air fan control alarm",
            Register::AlarmFrostProt => "Frost protection alarm",
            Register::AlarmDefrosting => "Defrosting alarm",
            Register::AlarmSafRpm => "Supply air fan RPM alarm",
            Register::AlarmEafRpm => "Extract air fan RPM alarm",
            Register::AlarmFpt => "Frost protection temperature sensor alarm",
            Register::AlarmOat => "Outdoor air temperature sensor alarm",
            Register::AlarmSat => "Supply air temperature sensor alarm",
            Register::AlarmRat => "Room air temperature sensor alarm",
            Register::AlarmEat => "Extract air temperature sensor alarm",
            Register::AlarmEct => "Extra controller temperature sensor alarm",
            Register::AlarmEft => "Efficiency temperature sensor alarm",
            Register::AlarmOht => "Overheat temperature sensor alarm",
            Register::AlarmEmt => "Emergency thermostat alarm",
            Register::AlarmRgs => "Rotor guard sensor alarm",
            Register::AlarmBys => "Bypass damper position sensor alarm",
            Register::AlarmSecondaryAir => "Secondary air damper alarm",
            Register::AlarmFilter => "Filter change alarm",
            Register::AlarmExtraController => "Extra controller alarm",
            Register::AlarmExternalStop => "External stop alarm",
            Register::AlarmRh => "Relative humidity sensor alarm",
            Register::AlarmCo2 => "CO2 sensor alarm",
            Register::AlarmLowSat => "Low supply air temperature alarm",
            Register::AlarmByf => "Bypass damper feedback alarm",
            Register::AlarmPdmRhs => "Built-in relative humidity sensor alarm",
            Register::AlarmPdmEat => "Built-in extract air temperature sensor alarm",
            Register::AlarmManualFanStop => "Manual fan stop alarm",
            Register::AlarmOverheatTemperature => "Overheat temperature alarm",
            Register::AlarmFireAlarm => "Fire alarm",
            Register::AlarmFilterWarning => "Filter warning alarm",
        }
    }

    pub fn from_address(address: u16) -> Option<Register> {
        Register::ALL.iter().copied().find(|r| r.address() == Some(address))
    }

    /// Clamp a value to the range the device accepts for this register.
    pub fn clamp(self, value: i64) -> i64 {
        let value = self.minimum().map_or(value, |min| value.max(min));
        self.maximum().map_or(value, |max| value.min(max))
    }

    pub fn is_match(self, pattern: &str) -> bool {
        let pattern = pattern.to_uppercase();
        if self.name().contains(&pattern) {
            return true;
        }
        if self.description().to_uppercase().contains(&pattern) {
            return true;
        }
        self.address().is_some_and(|a| a.to_string().contains(&pattern))
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl serde::Serialize for Register {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

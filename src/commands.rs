fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}

pub mod registers {
    use crate::output;
    use crate::registers::{Mode, Register};

    /// Search and output the registers this bridge knows about.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        output: output::Args,
        /// Only show registers whose name, description or address contain this text.
        filter: Option<String>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not output the register list")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    struct RegisterSchema {
        name: Register,
        address: Option<u16>,
        mode: Mode,
        kind: &'static str,
        scale: u8,
        minimum: Option<i64>,
        maximum: Option<i64>,
        description: &'static str,
    }

    impl From<Register> for RegisterSchema {
        fn from(register: Register) -> Self {
            let data_type = register.data_type();
            Self {
                name: register,
                address: register.address(),
                mode: register.mode(),
                kind: data_type.kind(),
                scale: data_type.scale(),
                minimum: register.minimum(),
                maximum: register.maximum(),
                description: register.description(),
            }
        }
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output
            .headers(&["Name", "Address", "Mode", "Type", "Scale", "Min", "Max", "Description"])
            .map_err(Error::Output)?;
        for &register in Register::ALL {
            if let Some(pattern) = &args.filter {
                if !register.is_match(pattern) {
                    continue;
                }
            }
            let schema = RegisterSchema::from(register);
            output
                .record(
                    || {
                        let optional = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_default();
                        vec![
                            schema.name.to_string(),
                            schema.address.map(|a| a.to_string()).unwrap_or_default(),
                            schema.mode.to_string(),
                            schema.kind.to_string(),
                            schema.scale.to_string(),
                            optional(schema.minimum),
                            optional(schema.maximum),
                            schema.description.to_string(),
                        ]
                    },
                    || &schema,
                )
                .map_err(Error::Output)?;
        }
        output.commit().map_err(Error::Output)
    }
}

pub mod status {
    use crate::device::SaveConnectDevice;
    use crate::entity::{self, Ventilation};
    use crate::integration::{self, SetupError};
    use crate::{iam2, output};

    /// Connect to the unit, poll it once and print the state of every entity.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: iam2::Args,
        #[clap(flatten)]
        config: integration::Config,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not set up the IAM2 client")]
        Client(#[source] iam2::Error),
        #[error("could not set up the devices")]
        Setup(#[source] SetupError<iam2::Error>),
        #[error("could not output the entity states")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    pub(super) struct EntityRecord<'a> {
        pub device: &'a str,
        pub entity: String,
        pub unique_id: String,
        pub available: bool,
        pub state: serde_json::Value,
        pub attributes: serde_json::Value,
    }

    impl EntityRecord<'_> {
        pub(super) fn row(&self) -> Vec<String> {
            let state = match &self.state {
                serde_json::Value::Null => "unknown".to_string(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let attributes = match &self.attributes {
                serde_json::Value::Object(map) => map
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| match v {
                        serde_json::Value::String(s) => format!("{k}={s}"),
                        v => format!("{k}={v}"),
                    })
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => String::new(),
            };
            let state = if self.available { state } else { "unavailable".to_string() };
            vec![self.entity.clone(), self.unique_id.clone(), state, attributes]
        }
    }

    pub(super) const HEADERS: [&str; 4] = ["Entity", "Unique ID", "State", "Attributes"];

    pub(super) fn fan_record<'a>(fan: &'a Ventilation<'_>) -> EntityRecord<'a> {
        EntityRecord {
            device: fan.device().device_id(),
            entity: Ventilation::NAME.to_string(),
            unique_id: fan.unique_id(),
            available: fan.is_available(),
            state: serde_json::json!(fan.is_on().map(|on| if on { "on" } else { "off" })),
            attributes: serde_json::json!({
                "percentage": fan.percentage(),
                "preset_mode": fan.preset_mode(),
                "fan_speed": fan.fan_speed(),
                "speed_count": fan.speed_count(),
            }),
        }
    }

    pub(super) fn records(device: &SaveConnectDevice) -> Vec<EntityRecord<'_>> {
        let mut records = Vec::new();
        let device_id = device.device_id();
        let extra = serde_json::to_value(device.extra_attributes()).unwrap_or_default();
        for sensor in entity::sensors(device) {
            records.push(EntityRecord {
                device: device_id,
                entity: sensor.name().to_string(),
                unique_id: sensor.unique_id(),
                available: sensor.is_available(),
                state: serde_json::json!(sensor.native_value()),
                attributes: {
                    let mut attributes = extra.clone();
                    if let serde_json::Value::Object(map) = &mut attributes {
                        map.insert("unit".into(), sensor.unit().into());
                    }
                    attributes
                },
            });
        }
        for alarm in entity::alarm_sensors(device) {
            records.push(EntityRecord {
                device: device_id,
                entity: alarm.name(),
                unique_id: alarm.unique_id(),
                available: device.is_available(),
                state: serde_json::json!(alarm.is_on().map(|on| if on { "on" } else { "off" })),
                attributes: serde_json::json!({ "alarm_state": alarm.state() }),
            });
        }
        let active = device.state().active_alarms().map(|a| a.key()).collect::<Vec<_>>();
        records.push(EntityRecord {
            device: device_id,
            entity: "Active Alarms".to_string(),
            unique_id: entity::unique_id(device, "active_alarms"),
            available: device.is_available(),
            state: serde_json::json!(active.len()),
            attributes: serde_json::json!({ "alarms": active.join(", ") }),
        });
        records
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut output = args.output.to_output().map_err(Error::Output)?;
        let mut client = iam2::Client::new(&args.connection).map_err(Error::Client)?;
        let rt = super::runtime().map_err(Error::Runtime)?;
        let mut devices =
            rt.block_on(integration::setup(&mut client, &args.config)).map_err(Error::Setup)?;
        output.headers(&HEADERS).map_err(Error::Output)?;
        for device in &mut devices {
            tracing::info!(device = device.device_id(), name = %device.name(), "device");
            for record in records(device) {
                output.record(|| record.row(), || &record).map_err(Error::Output)?;
            }
            let fan = Ventilation::new(device);
            let record = fan_record(&fan);
            output.record(|| record.row(), || &record).map_err(Error::Output)?;
        }
        output.commit().map_err(Error::Output)
    }
}

pub mod fan {
    use super::status::{HEADERS, fan_record};
    use crate::entity::{CommandError, Outcome, Ventilation};
    use crate::integration::{self, SetupError};
    use crate::{iam2, output};

    /// Control the ventilation fan of the unit.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: iam2::Args,
        #[clap(flatten)]
        config: integration::Config,
        #[clap(flatten)]
        output: output::Args,
        #[command(subcommand)]
        action: Action,
    }

    #[derive(clap::Subcommand, Clone, Debug)]
    pub enum Action {
        /// Set the fan speed as a percentage.
        Percentage { percentage: u8 },
        /// Select a preset mode (Auto, Manual, Away, Crowded, Fireplace or Holiday).
        Preset { name: String },
        /// Turn the fan on, optionally at a specific speed or preset.
        On {
            #[arg(long, conflicts_with = "preset")]
            percentage: Option<u8>,
            #[arg(long)]
            preset: Option<String>,
        },
        /// Turn the fan off.
        Off,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not set up the IAM2 client")]
        Client(#[source] iam2::Error),
        #[error("could not set up the devices")]
        Setup(#[source] SetupError<iam2::Error>),
        #[error("fan command for {1} failed")]
        Command(#[source] CommandError<iam2::Error>, String),
        #[error("could not output the fan state")]
        Output(#[source] output::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut output = args.output.to_output().map_err(Error::Output)?;
        let mut client = iam2::Client::new(&args.connection).map_err(Error::Client)?;
        let rt = super::runtime().map_err(Error::Runtime)?;
        rt.block_on(async {
            let mut devices =
                integration::setup(&mut client, &args.config).await.map_err(Error::Setup)?;
            output.headers(&HEADERS).map_err(Error::Output)?;
            for device in &mut devices {
                let device_id = device.device_id().to_string();
                let mut fan = Ventilation::new(device);
                let outcome = match &args.action {
                    Action::Percentage { percentage } => {
                        fan.set_percentage(&mut client, *percentage).await
                    }
                    Action::Preset { name } => fan.set_preset_mode(&mut client, name).await,
                    Action::On { percentage, preset } => {
                        fan.turn_on(&mut client, *percentage, preset.as_deref()).await
                    }
                    Action::Off => fan.turn_off(&mut client).await,
                }
                .map_err(|e| Error::Command(e, device_id.clone()))?;
                match outcome {
                    Outcome::Unchanged => tracing::info!(device = %device_id, "already in that state"),
                    Outcome::Sent { refreshed: false } => {
                        tracing::warn!(device = %device_id, "could not read back the new state")
                    }
                    Outcome::Sent { refreshed: true } => {}
                }
                let record = fan_record(&fan);
                output.record(|| record.row(), || &record).map_err(Error::Output)?;
            }
            output.commit().map_err(Error::Output)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::status::records;
    use crate::api::fake;
    use crate::device::SaveConnectDevice;
    use crate::registers::Register;
    use crate::value::RegisterUpdate;

    #[test]
    fn status_lists_active_alarms() {
        let mut vendor = fake::device("IAM_1");
        vendor.registry.extend([
            RegisterUpdate::new(Register::AlarmCo2, "active"),
            RegisterUpdate::new(Register::AlarmFilter, "inactive"),
            RegisterUpdate::new(Register::AlarmFireAlarm, 1),
        ]);
        let device = SaveConnectDevice::new(vendor, 60);
        let records = records(&device);
        let active = records.iter().find(|r| r.entity == "Active Alarms").unwrap();
        assert_eq!(active.unique_id, "SAVE Connect-IAM_1-active_alarms");
        assert_eq!(active.state, serde_json::json!(2));
        assert_eq!(active.row()[3], "alarms=alarm_co2_sensor, alarm_fire_alarm");
    }
}

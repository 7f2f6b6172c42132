//! Vendor client talking to the IAM v2 module over its local HTTP API.
//!
//! The module exposes two endpoints taking a JSON object as the query string:
//!
//! * `mread?{"<address>":<count>}` reads `count` holding registers starting at `address` and
//!   responds with an object mapping each address to its value;
//! * `mwrite?{"<address>":<value>,...}` writes the given registers.
//!
//! Values are signed 16-bit integers on the wire.

use crate::api::{SaveConnectApi, TemperatureUnit, VendorDevice};
use crate::fan::{SettableAirflow, UserMode};
use crate::registers::Register;
use crate::value::RegisterUpdate;
use std::ops::Range;

/// Largest number of registers requested in a single `mread` call.
const MAX_READ_COUNT: u16 = 123;

#[derive(clap::Parser, Clone, Debug)]
#[group(id = "iam2::Args")]
pub struct Args {
    /// Connect to the SystemAIR device over IAM v2 HTTP API, e.g. `http://192.168.1.20/`.
    #[arg(long)]
    iam2: reqwest::Url,

    /// Consider the request failed if no data arrives for this long.
    #[arg(long, default_value = "1s")]
    read_timeout: humantime::Duration,

    /// Additional time allowed for the whole request on top of the read timeout.
    #[arg(long, default_value = "3s")]
    send_timeout: humantime::Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not construct the HTTP client")]
    CreateReqwest(#[source] reqwest::Error),
    #[error("{0} cannot be used as the base for IAM2 API URLs")]
    BadUrl(reqwest::Url),
    #[error("modbus read API request failed")]
    Read(#[source] reqwest::Error),
    #[error("modbus write API request failed")]
    Write(#[source] reqwest::Error),
    #[error("IAM2 response returned malformed JSON response")]
    JsonDecode(#[source] reqwest::Error),
    #[error("IAM2 response is not an object")]
    ResponseIsntObject,
    #[error(
        "IAM2 response does not contain values for all the registers (requested {0:?}, got {1})"
    )]
    ResponseIncomplete(Range<u16>, usize),
}

pub struct Client {
    http: reqwest::Client,
    base: reqwest::Url,
}

impl Client {
    pub fn new(args: &Args) -> Result<Self, Error> {
        let mut base = args.iam2.clone();
        if base.path_segments_mut().is_err() {
            return Err(Error::BadUrl(base));
        }
        base.set_query(None);
        let http = reqwest::Client::builder()
            .read_timeout(*args.read_timeout)
            .timeout(args.read_timeout.saturating_add(*args.send_timeout))
            .build()
            .map_err(Error::CreateReqwest)?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, operation: &str, query: &serde_json::Value) -> Result<reqwest::Url, Error> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::BadUrl(self.base.clone()))?
            .pop_if_empty()
            .push(operation);
        url.set_query(Some(&query.to_string()));
        Ok(url)
    }

    fn identifier(&self) -> String {
        match (self.base.host_str(), self.base.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => self.base.to_string(),
        }
    }

    /// Read the raw words of a contiguous range of registers.
    async fn read_range(&self, range: Range<u16>) -> Result<Vec<(u16, u16)>, Error> {
        let count = range.end - range.start;
        let url = self.endpoint("mread", &serde_json::json!({ range.start.to_string(): count }))?;
        tracing::trace!(%url, "reading registers");
        let response = self.http.get(url).send().await.map_err(Error::Read)?;
        let response = response.json::<serde_json::Value>().await.map_err(Error::JsonDecode)?;
        let object = response.as_object().ok_or(Error::ResponseIsntObject)?;
        let mut words = object
            .iter()
            .filter_map(|(key, value)| {
                let address = key.parse::<u16>().ok().filter(|a| range.contains(a))?;
                let Some(value) = value.as_i64() else {
                    tracing::warn!(key, unexpected_val = ?value, "address value isn't integer");
                    return None;
                };
                Some((address, value as i16 as u16))
            })
            .collect::<Vec<_>>();
        words.sort_unstable();
        if words.len() != usize::from(count) {
            return Err(Error::ResponseIncomplete(range, words.len()));
        }
        Ok(words)
    }

    async fn write(&self, register: Register, value: u16) -> Result<bool, Error> {
        let Some(address) = register.address() else {
            tracing::warn!(%register, "register is not available over IAM2");
            return Ok(false);
        };
        let url = self.endpoint("mwrite", &serde_json::json!({ address.to_string(): value }))?;
        tracing::debug!(%register, value, "writing register");
        let response = self.http.get(url).send().await.map_err(Error::Write)?;
        let response = response.json::<serde_json::Value>().await.map_err(Error::JsonDecode)?;
        response.as_object().ok_or(Error::ResponseIsntObject)?;
        Ok(true)
    }

    async fn read(&self, registers: &[Register]) -> Result<Vec<RegisterUpdate>, Error> {
        let mut addresses = registers.iter().filter_map(|r| r.address()).collect::<Vec<_>>();
        addresses.sort_unstable();
        addresses.dedup();
        let mut updates = Vec::with_capacity(addresses.len());
        for range in plan_reads(&addresses) {
            for (address, word) in self.read_range(range).await? {
                let Some(register) = Register::from_address(address) else { continue };
                if !registers.contains(&register) {
                    continue;
                }
                updates.push(RegisterUpdate::new(register, register.data_type().decode(word)));
            }
        }
        Ok(updates)
    }
}

/// Group sorted addresses into as few ranges as possible, none longer than `MAX_READ_COUNT`.
fn plan_reads(addresses: &[u16]) -> Vec<Range<u16>> {
    let mut ranges: Vec<Range<u16>> = Vec::new();
    for &address in addresses {
        match ranges.last_mut() {
            Some(range) if address - range.start < MAX_READ_COUNT => range.end = address + 1,
            _ => ranges.push(address..address + 1),
        }
    }
    ranges
}

/// Registers reported on every poll. The change request register only echoes the last request
/// and would mask the active mode.
fn polled_registers() -> Vec<Register> {
    Register::ALL
        .iter()
        .copied()
        .filter(|r| r.address().is_some() && *r != Register::UserModeHmiChangeRequest)
        .collect()
}

fn duration_register(mode: UserMode) -> Option<Register> {
    match mode {
        UserMode::Crowded => Some(Register::CrowdedTime),
        UserMode::Fireplace => Some(Register::FireplaceTime),
        UserMode::Away => Some(Register::AwayTime),
        UserMode::Holiday => Some(Register::HolidayTime),
        _ => None,
    }
}

impl SaveConnectApi for Client {
    type Error = Error;

    async fn login(&mut self) -> Result<bool, Self::Error> {
        // The local API has no authentication.
        Ok(true)
    }

    async fn get_devices(
        &mut self,
        update: bool,
        fetch_device_info: bool,
    ) -> Result<Vec<VendorDevice>, Self::Error> {
        let identifier = self.identifier();
        let mut device = VendorDevice {
            name: format!("SAVE ({identifier})"),
            identifier,
            temperature_unit: TemperatureUnit::Celsius,
            registry: Vec::new(),
        };
        if update {
            device.registry = self.read(&polled_registers()).await?;
        }
        if fetch_device_info {
            self.update_device_info(std::slice::from_mut(&mut device)).await?;
        }
        Ok(vec![device])
    }

    async fn update_device_info(&mut self, devices: &mut [VendorDevice]) -> Result<(), Self::Error> {
        for device in devices {
            let updates = self.read(&[Register::SystemUnitTemperature]).await?;
            let fahrenheit = updates.iter().any(|u| u.value.as_integer() == Some(1));
            device.temperature_unit =
                if fahrenheit { TemperatureUnit::Fahrenheit } else { TemperatureUnit::Celsius };
        }
        Ok(())
    }

    async fn read_registers(
        &mut self,
        _: &VendorDevice,
    ) -> Result<Vec<RegisterUpdate>, Self::Error> {
        self.read(&polled_registers()).await
    }

    async fn set_airflow(
        &mut self,
        _: &VendorDevice,
        airflow: SettableAirflow,
    ) -> Result<bool, Self::Error> {
        let Some(manual) = UserMode::Manual.change_request() else { return Ok(false) };
        if !self.write(Register::UserModeHmiChangeRequest, manual).await? {
            return Ok(false);
        }
        self.write(Register::ManualAirflowLevelSaf, airflow.code()).await
    }

    async fn set_mode(
        &mut self,
        _: &VendorDevice,
        mode: UserMode,
        duration: u16,
    ) -> Result<bool, Self::Error> {
        let Some(request) = mode.change_request() else {
            tracing::warn!(%mode, "user mode cannot be selected");
            return Ok(false);
        };
        if let Some(register) = duration_register(mode) {
            let duration = register.clamp(i64::from(duration)) as u16;
            if !self.write(register, duration).await? {
                return Ok(false);
            }
        }
        self.write(Register::UserModeHmiChangeRequest, request).await
    }
}

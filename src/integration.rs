use crate::api::SaveConnectApi;
use crate::device::SaveConnectDevice;

#[derive(clap::Parser, Clone, Debug)]
#[group(id = "integration::Config")]
pub struct Config {
    /// How long the timed user modes (Away, Crowded, Fireplace, Holiday) last once selected.
    ///
    /// Expressed in the unit of the mode's own timer: days for Holiday, hours for Away and
    /// Crowded, minutes for Fireplace. Values outside of the range the unit accepts are clamped.
    #[arg(long, default_value = "60")]
    pub mode_duration: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self { mode_duration: 60 }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SetupError<E: std::error::Error + 'static> {
    #[error("the vendor rejected the credentials")]
    InvalidAuth,
    #[error("could not connect to the vendor")]
    CannotConnect(#[source] E),
    #[error("could not list the devices")]
    ListDevices(#[source] E),
    #[error("could not fetch device information for {1}")]
    DeviceInfo(#[source] E, String),
}

/// Log in and discover all devices, polling each of them once.
pub async fn setup<A: SaveConnectApi>(
    api: &mut A,
    config: &Config,
) -> Result<Vec<SaveConnectDevice>, SetupError<A::Error>> {
    match api.login().await {
        Ok(true) => {}
        Ok(false) => {
            tracing::error!("could not authenticate to SAVE Connect");
            return Err(SetupError::InvalidAuth);
        }
        Err(e) => {
            tracing::error!(err = %e, "could not authenticate to SAVE Connect");
            return Err(SetupError::CannotConnect(e));
        }
    }
    let mut vendor_devices = api.get_devices(true, false).await.map_err(SetupError::ListDevices)?;
    for device in &mut vendor_devices {
        api.update_device_info(std::slice::from_mut(device))
            .await
            .map_err(|e| SetupError::DeviceInfo(e, device.identifier.clone()))?;
    }
    tracing::info!(count = vendor_devices.len(), "discovered devices");
    let mut devices = Vec::with_capacity(vendor_devices.len());
    for vendor in vendor_devices {
        let mut device = SaveConnectDevice::new(vendor, config.mode_duration);
        device.update(api).await;
        devices.push(device);
    }
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{self, Call, FakeApi};

    #[tokio::test]
    async fn discovers_and_polls() {
        let mut api = FakeApi::new();
        api.devices.push(fake::device("IAM_2"));
        let devices = setup(&mut api, &Config::default()).await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].device_id(), "IAM_2");
        assert_eq!(api.calls, [
            Call::Login,
            Call::GetDevices { update: true, fetch_device_info: false },
            Call::UpdateDeviceInfo(vec!["IAM_1".into()]),
            Call::UpdateDeviceInfo(vec!["IAM_2".into()]),
            Call::ReadRegisters("IAM_1".into()),
            Call::ReadRegisters("IAM_2".into()),
        ]);
    }

    #[tokio::test]
    async fn rejected_credentials() {
        let mut api = FakeApi::new();
        api.credentials_valid = false;
        let err = setup(&mut api, &Config::default()).await.unwrap_err();
        assert!(matches!(err, SetupError::InvalidAuth));
        assert_eq!(api.calls, [Call::Login]);
    }

    #[tokio::test]
    async fn unreachable_vendor() {
        let mut api = FakeApi::new();
        api.reachable = false;
        let err = setup(&mut api, &Config::default()).await.unwrap_err();
        assert!(matches!(err, SetupError::CannotConnect(_)));
    }
}

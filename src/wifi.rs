//! WiFi bring-up: stored credentials, station join, setup AP fallback,
//! and the bits of NVS state the boot policy needs.

use anyhow::{Context, Result};
use embedded_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration,
};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{info, warn};

use crate::config;

/// Credentials as persisted in NVS.
#[derive(Debug)]
pub struct StoredCredentials {
    pub ssid: String,
    pub password: String,
}

/// Read the stored credentials, if a complete pair exists.
pub fn load_credentials(nvs: &EspNvs<NvsDefault>) -> Option<StoredCredentials> {
    let mut ssid_buf = [0u8; 64];
    let mut pass_buf = [0u8; 96];
    let ssid = nvs
        .get_str(config::NVS_KEY_SSID, &mut ssid_buf)
        .ok()
        .flatten()?
        .to_string();
    let password = nvs
        .get_str(config::NVS_KEY_PASS, &mut pass_buf)
        .ok()
        .flatten()?
        .to_string();
    if ssid.is_empty() {
        return None;
    }
    Some(StoredCredentials { ssid, password })
}

/// Persist credentials; they take effect on the next boot.
pub fn store_credentials(nvs: &mut EspNvs<NvsDefault>, ssid: &str, password: &str) -> Result<()> {
    nvs.set_str(config::NVS_KEY_SSID, ssid)?;
    nvs.set_str(config::NVS_KEY_PASS, password)?;
    info!("stored credentials for {}", ssid);
    Ok(())
}

/// Address acquired on the previous boot, for the redraw-skip policy.
pub fn load_last_ip(nvs: &EspNvs<NvsDefault>) -> Option<String> {
    let mut buf = [0u8; 48];
    Some(
        nvs.get_str(config::NVS_KEY_LAST_IP, &mut buf)
            .ok()
            .flatten()?
            .to_string(),
    )
}

pub fn store_last_ip(nvs: &mut EspNvs<NvsDefault>, ip: &str) -> Result<()> {
    nvs.set_str(config::NVS_KEY_LAST_IP, ip)?;
    Ok(())
}

/// Owns the radio for the lifetime of the firmware.
pub struct WifiManager {
    wifi: Box<BlockingWifi<EspWifi<'static>>>,
}

impl WifiManager {
    pub fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self> {
        let wifi = Box::new(BlockingWifi::wrap(
            EspWifi::new(modem, sys_loop.clone(), Some(nvs))?,
            sys_loop,
        )?);
        Ok(WifiManager { wifi })
    }

    /// Join as a station and return the acquired address.
    pub fn connect(&mut self, creds: &StoredCredentials) -> Result<String> {
        info!("joining {}", creds.ssid);
        let wifi_config = Configuration::Client(ClientConfiguration {
            ssid: creds
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow::anyhow!("SSID too long"))?,
            password: creds
                .password
                .as_str()
                .try_into()
                .map_err(|_| anyhow::anyhow!("passphrase too long"))?,
            auth_method: if creds.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });

        self.wifi.set_configuration(&wifi_config)?;
        self.wifi.start()?;
        self.wifi.connect()?;
        self.wifi.wait_netif_up()?;

        let ip = self
            .wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .context("no address after join")?
            .ip;
        info!("connected to {} as {}", creds.ssid, ip);
        Ok(ip.to_string())
    }

    /// Fall back to an open setup AP and return its address. The HTTP
    /// API on it is how credentials get provisioned.
    pub fn start_access_point(&mut self) -> Result<String> {
        warn!("starting setup AP {}", config::SETUP_AP_SSID);
        let ap_config = Configuration::AccessPoint(AccessPointConfiguration {
            ssid: config::SETUP_AP_SSID
                .try_into()
                .map_err(|_| anyhow::anyhow!("AP SSID too long"))?,
            auth_method: AuthMethod::None,
            ..Default::default()
        });

        self.wifi.set_configuration(&ap_config)?;
        self.wifi.start()?;
        self.wifi.wait_netif_up()?;

        let ip = self.wifi.wifi().ap_netif().get_ip_info()?.ip;
        info!("setup AP up at {}", ip);
        Ok(ip.to_string())
    }
}

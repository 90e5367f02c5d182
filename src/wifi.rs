use embassy_executor::Spawner;
use embassy_net::{Runner, Stack, StackResources};
use embassy_time::{with_timeout, Duration, Timer};

use esp_hal::rng::Rng;
use esp_wifi::{
    wifi::{ClientConfiguration, Configuration, WifiController, WifiDevice},
    EspWifiController,
};

use core::str::FromStr;
use heapless::String;
use log::{info, warn};
use smart_leds::{SmartLedsWrite, RGB8};
use static_cell::StaticCell;

use crate::config::Network;
use crate::constants::{DHCP_TIMEOUT_SECS, MAX_SCAN_RESULTS, WIFI_CONNECT_TIMEOUT_SECS};
use crate::heap::MemoryMonitor;
use crate::indicator::{colors, StatusLed};

static RESOURCES: StaticCell<StackResources<5>> = StaticCell::new();

pub struct Wifi {
    pub stack: Stack<'static>,
    controller: WifiController<'static>,
}

#[derive(Debug)]
pub enum Error {
    WifiInitFailed,
    HostnameTooLong,
    ConfigFailed,
    StartFailed,
    ConnectFailed,
    ConnectTimeout,
    DhcpTimeout,
    /// Every configured candidate was tried and none connected.
    NoNetwork,
}

impl Wifi {
    pub async fn new(
        init: &'static EspWifiController<'static>,
        wifi: esp_hal::peripherals::WIFI<'static>,
        mut rng: Rng,
        hostname: &str,
        spawner: Spawner,
    ) -> Result<Self, Error> {
        let (controller, interfaces) =
            esp_wifi::wifi::new(init, wifi).map_err(|_| Error::WifiInitFailed)?;

        let mut dhcp_config = embassy_net::DhcpConfig::default();
        dhcp_config.hostname =
            Some(String::<32>::from_str(hostname).map_err(|_| Error::HostnameTooLong)?);

        let seed = (rng.random() as u64) << 32 | rng.random() as u64;
        let config = embassy_net::Config::dhcpv4(dhcp_config);

        let resources = RESOURCES.init(StackResources::new());
        let (stack, runner) = embassy_net::new(interfaces.sta, config, resources, seed);

        spawner
            .spawn(net_task(runner))
            .expect("Failed to spawn network task");

        Ok(Self { stack, controller })
    }

    /// Try the configured candidates in order and stop at the first one
    /// that associates and gets a DHCP lease. Priority is purely the
    /// configured order; no signal-strength reordering. On total failure
    /// the visible networks are logged as a diagnostic before the caller
    /// escalates.
    pub async fn connect_any<W: SmartLedsWrite<Color = RGB8>>(
        &mut self,
        networks: &[Network],
        led: &mut StatusLed<W>,
        monitor: &MemoryMonitor,
        scan_on_fail: bool,
    ) -> Result<(), Error> {
        for network in networks {
            info!(
                "Trying to connect to Wi-Fi network {} ({})",
                network.label, network.ssid
            );

            match self.try_connect(network).await {
                Ok(()) => {
                    info!("Successfully connected to {}", network.label);
                    if let Some(config) = self.stack.config_v4() {
                        info!("Allocated IP address: {}", config.address);
                    }
                    led.hold(colors::MAGENTA, Duration::from_secs(2)).await;
                    return Ok(());
                }
                Err(e) => {
                    warn!("Connect to network failed: {e:?}");
                    monitor.reclaim(None);
                }
            }
        }

        warn!("Not able to connect to any Wi-Fi");
        if scan_on_fail {
            self.log_visible_networks().await;
        }
        Err(Error::NoNetwork)
    }

    async fn try_connect(&mut self, network: &Network) -> Result<(), Error> {
        // a previous candidate may have left the controller started
        if matches!(self.controller.is_started(), Ok(true)) {
            self.controller.stop_async().await.ok();
        }

        let client_config = Configuration::Client(ClientConfiguration {
            ssid: network.ssid.into(),
            password: network.password.into(),
            ..Default::default()
        });
        self.controller
            .set_configuration(&client_config)
            .map_err(|_| Error::ConfigFailed)?;

        self.controller
            .start_async()
            .await
            .map_err(|_| Error::StartFailed)?;

        with_timeout(
            Duration::from_secs(WIFI_CONNECT_TIMEOUT_SECS),
            self.controller.connect_async(),
        )
        .await
        .map_err(|_| Error::ConnectTimeout)?
        .map_err(|_| Error::ConnectFailed)?;

        info!("Waiting to get IP address...");
        with_timeout(Duration::from_secs(DHCP_TIMEOUT_SECS), self.wait_for_ip())
            .await
            .map_err(|_| Error::DhcpTimeout)
    }

    async fn wait_for_ip(&self) {
        loop {
            if self.stack.is_link_up() && self.stack.config_v4().is_some() {
                break;
            }
            Timer::after(Duration::from_millis(500)).await;
        }
    }

    async fn log_visible_networks(&mut self) {
        info!("Available Wi-Fi networks:");
        match self.controller.scan_n_async(MAX_SCAN_RESULTS).await {
            Ok(access_points) => {
                for ap in access_points {
                    info!(
                        "\t{}\t\tRSSI: {}\tChannel: {}",
                        ap.ssid, ap.signal_strength, ap.channel
                    );
                }
            }
            Err(e) => warn!("Network scan failed: {e:?}"),
        }
    }
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

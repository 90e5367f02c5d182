#![no_std]
#![no_main]

use static_cell::StaticCell;

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};

use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{self as hal};
use esp_hal_smartled::{smart_led_buffer, SmartLedsAdapter};
use esp_println::logger::init_logger;
use esp_wifi::EspWifiController;
use smart_leds::{SmartLedsWrite, RGB8};

use hal::{
    efuse::Efuse,
    i2c::master::{BusTimeout, I2c},
    rng::Rng,
    rtc_cntl::Rtc,
    time::Rate,
    timer::timg::TimerGroup,
    Async,
};

use log::{info, warn};

extern crate alloc;

pub mod config;
pub mod constants;
mod heap;
mod identity;
mod indicator;
mod power;
mod recovery;
mod rest;
mod sensor;
mod wifi;

use config::{Config, SETTINGS};
use constants::*;
use heap::MemoryMonitor;
use indicator::{colors, StatusLed};
use power::Power;
use recovery::{classify_post, PostVerdict, Preflight, RecoveryState};
use rest::RestClient;
use sensor::{EnvSensor, TelemetryReading};
use wifi::Wifi;

static WIFI_INIT: StaticCell<EspWifiController<'static>> = StaticCell::new();

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    init_logger(log::LevelFilter::Info);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    let mut rng = Rng::new(peripherals.RNG);

    esp_alloc::heap_allocator!(size: HEAP_SIZE);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let timg1 = TimerGroup::new(peripherals.TIMG1);

    esp_hal_embassy::init(timg0.timer0);

    // possibly high transient required at init
    // https://github.com/esp-rs/esp-hal/issues/1626
    Timer::after(Duration::from_millis(1000)).await;

    let mac = Efuse::mac_address();
    let device_tag = identity::device_tag(mac);
    info!("Start: firmware version {VERSION}, device: {device_tag}");
    info!(
        "Device MAC address: {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );

    let config = Config::load(&SETTINGS).expect("invalid configuration");
    let monitor = MemoryMonitor::new(config.debug_level);
    monitor.reclaim(None);

    // onboard NeoPixel data pin
    let rmt = hal::rmt::Rmt::new(peripherals.RMT, Rate::from_mhz(80)).unwrap();
    let adapter = SmartLedsAdapter::new(rmt.channel0, peripherals.GPIO2, smart_led_buffer!(1));
    let mut led = StatusLed::new(adapter);

    info!("Start - white->green");
    led.sweep(colors::WHITE, colors::GREEN).await;
    Timer::after(Duration::from_secs(5)).await;

    let mut power = Power::new(Rtc::new(peripherals.LPWR));

    let wifi_init = WIFI_INIT.init(
        esp_wifi::init(timg1.timer0, rng.clone(), peripherals.RADIO_CLK)
            .expect("Wi-Fi controller init failed"),
    );

    info!("Connecting to Wi-Fi");
    let mut wifi = Wifi::new(wifi_init, peripherals.WIFI, rng.clone(), &device_tag, spawner)
        .await
        .expect("Wi-Fi bring-up failed");

    let connected = wifi
        .connect_any(
            &config.networks,
            &mut led,
            &monitor,
            config.scan_on_fail,
        )
        .await;

    led.hold(colors::YELLOW, Duration::from_secs(2)).await;

    if connected.is_err() {
        // no candidate network worked; the only way out is a fresh boot
        warn!("No Wi-Fi connection - blue - deep sleep and restart");
        monitor.reclaim(None);
        led.hold(colors::BLUE, Duration::from_secs(NO_NETWORK_HOLD_SECS))
            .await;
        power.deep_sleep_then_restart(NO_NETWORK_SLEEP_SECS);
    }

    let (sda, scl) = (peripherals.GPIO21, peripherals.GPIO22);
    let i2c_config = hal::i2c::master::Config::default()
        .with_frequency(Rate::from_khz(100))
        .with_timeout(BusTimeout::BusCycles(24));
    let i2c: I2c<'static, Async> = I2c::new(peripherals.I2C0, i2c_config)
        .unwrap()
        .with_sda(sda)
        .with_scl(scl)
        .into_async();

    // a missing sensor is not fatal; the loop substitutes defaults
    let mut env_sensor = match EnvSensor::new(i2c).await {
        Ok(sensor) => Some(sensor),
        Err(e) => {
            warn!("Sensor init failed: {e:?}, continuing without sensor");
            None
        }
    };

    let tls_seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let mut rest = RestClient::new(&wifi.stack, tls_seed, &config, &monitor, &device_tag)
        .expect("invalid REST endpoint configuration");

    control_loop(
        &config,
        &monitor,
        &mut led,
        &mut power,
        &mut env_sensor,
        &mut rest,
    )
    .await
}

/// The recovery controller. Every iteration runs the cheap watchdog
/// checks first, then the telemetry sequence, and maps the publish
/// outcome onto a recovery branch. The loop only ever exits through a
/// restart or a deep sleep.
async fn control_loop<W, I2C>(
    config: &Config,
    monitor: &MemoryMonitor,
    led: &mut StatusLed<W>,
    power: &mut Power,
    env_sensor: &mut Option<EnvSensor<I2C>>,
    rest: &mut RestClient<'_>,
) -> !
where
    W: SmartLedsWrite<Color = RGB8>,
    I2C: embedded_hal_async::i2c::I2c,
{
    let mut state = RecoveryState::new();

    loop {
        let free_heap = monitor.reclaim(None);

        match state.preflight(free_heap, config.memory_threshold, config.max_iterations) {
            Preflight::MemoryCritical { free_heap } => {
                warn!("Free heap {free_heap} below threshold - green->red, restart");
                led.sweep(colors::GREEN, colors::RED).await;
                power.restart();
            }
            Preflight::AgedOut { iterations } => {
                info!("Max iterations reached ({iterations}), preventive restart - white 20 sec");
                monitor.reclaim(None);
                led.hold(colors::WHITE, Duration::from_secs(AGED_OUT_HOLD_SECS))
                    .await;
                power.restart();
            }
            Preflight::Proceed => {}
        }

        info!("Iteration {}", state.iterations());

        info!("Loop start - white 2 sec");
        led.hold(colors::WHITE, Duration::from_secs(2)).await;
        led.hold(colors::CYAN, Duration::from_secs(2)).await;

        let (temp_milli, humidity_pct) = acquire_telemetry(env_sensor, led).await;
        led.hold(colors::YELLOW, Duration::from_millis(1_500)).await;

        monitor.reclaim(Some("before REST"));

        let reference = match rest.fetch_reference().await {
            Ok(value) => value,
            Err(e) => {
                // the sentinel still gets published; fetch failure never
                // blocks the post
                warn!("Reference fetch failed: {e:?}");
                REFERENCE_UNAVAILABLE
            }
        };

        let reading = TelemetryReading {
            temp_milli,
            humidity_pct,
            reference,
        };
        let post_result = rest.publish(&reading).await;

        monitor.reclaim(Some("after REST"));
        info!("Post status: {post_result:?}");

        match classify_post(&post_result) {
            PostVerdict::HardFailure => {
                warn!("Post failed hard - red - deep sleep and restart");
                monitor.reclaim(None);
                led.hold(colors::RED, Duration::from_secs(HARD_FAILURE_HOLD_SECS))
                    .await;
                power.deep_sleep_then_restart(HARD_FAILURE_SLEEP_SECS);
            }
            PostVerdict::Accepted(status) => {
                info!(
                    "Post OK ({status}) - green {} sec",
                    config.post_sleep_secs
                );
                monitor.reclaim(None);
                led.fill(colors::GREEN);
                Timer::after(Duration::from_secs(config.post_sleep_secs)).await;
            }
            PostVerdict::SoftError(status) => {
                warn!(
                    "Post soft error ({status}) - orange {} sec, retrying next iteration",
                    config.post_sleep_secs
                );
                monitor.reclaim(None);
                led.fill(colors::ORANGE);
                Timer::after(Duration::from_secs(config.post_sleep_secs)).await;
            }
        }

        // heartbeat sweep before the next iteration
        led.sweep(colors::GREEN, colors::BLUE).await;
    }
}

/// Read the sensor, or substitute the fixed defaults and flash the
/// failure pattern. Acquisition is never fatal to the loop.
async fn acquire_telemetry<W, I2C>(
    env_sensor: &mut Option<EnvSensor<I2C>>,
    led: &mut StatusLed<W>,
) -> (i32, u8)
where
    W: SmartLedsWrite<Color = RGB8>,
    I2C: embedded_hal_async::i2c::I2c,
{
    if let Some(sensor) = env_sensor {
        match sensor.read().await {
            Ok(reading) => return reading,
            Err(e) => warn!("Sensor read failed: {e:?}"),
        }
    }

    let (temp_milli, humidity_pct) = sensor::default_reading();
    warn!("No sensor - default temperature: {temp_milli} mC");
    led.flash_alternate(colors::YELLOW, colors::RED, 2).await;
    (temp_milli, humidity_pct)
}

use bme280_rs::{AsyncBme280, Oversampling, SensorMode};
use embassy_time::Delay;
use log::info;

use crate::constants::DEFAULT_TEMP_MILLI;

#[derive(Debug)]
pub enum Error {
    InitFailure,
    MeasurementFailure,
    NoData,
}

/// One loop iteration's worth of telemetry. Produced fresh each pass,
/// never retained across iterations.
pub struct TelemetryReading {
    /// Temperature in milli-degrees Celsius
    pub temp_milli: i32,
    /// Relative humidity as integer percent
    pub humidity_pct: u8,
    /// External reference value, or the failure sentinel
    pub reference: f32,
}

pub struct EnvSensor<I2C> {
    sensor: AsyncBme280<I2C, Delay>,
}

impl<I2C: embedded_hal_async::i2c::I2c> EnvSensor<I2C> {
    pub async fn new(i2c: I2C) -> Result<Self, Error> {
        info!("Initialising BME280...");
        let mut sensor = AsyncBme280::new(i2c, Delay);
        sensor.init().await.map_err(|_| Error::InitFailure)?;

        sensor
            .set_sampling_configuration(
                bme280_rs::Configuration::default()
                    .with_temperature_oversampling(Oversampling::Oversample1)
                    .with_pressure_oversampling(Oversampling::Oversample1)
                    .with_humidity_oversampling(Oversampling::Oversample1)
                    .with_sensor_mode(SensorMode::Normal),
            )
            .await
            .map_err(|_| Error::InitFailure)?;

        info!("Initialised BME280");

        Ok(Self { sensor })
    }

    /// Read temperature and humidity, already converted to the units the
    /// payload carries.
    pub async fn read(&mut self) -> Result<(i32, u8), Error> {
        let sample = self
            .sensor
            .read_sample()
            .await
            .map_err(|_| Error::MeasurementFailure)?;

        let temperature = sample.temperature.ok_or(Error::NoData)?;
        let humidity = sample.humidity.ok_or(Error::NoData)?;

        info!("Temperature: {temperature:.1} C, humidity: {humidity:.1} %");

        Ok((to_milli(temperature), to_percent(humidity)))
    }
}

/// Substituted when the sensor is absent or unreadable, so the pipeline
/// is never blocked by missing hardware.
pub fn default_reading() -> (i32, u8) {
    (DEFAULT_TEMP_MILLI, 0)
}

fn to_milli(temperature: f32) -> i32 {
    let scaled = temperature * 1000.0;
    // no_std f32 has no round()
    if scaled >= 0.0 {
        (scaled + 0.5) as i32
    } else {
        (scaled - 0.5) as i32
    }
}

fn to_percent(humidity: f32) -> u8 {
    humidity.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_rounds_to_milli_units() {
        assert_eq!(to_milli(23.4567), 23_457);
        assert_eq!(to_milli(31.3), 31_300);
        assert_eq!(to_milli(0.0), 0);
        assert_eq!(to_milli(-5.0004), -5_000);
        assert_eq!(to_milli(-5.0006), -5_001);
    }

    #[test]
    fn humidity_truncates_to_integer_percent() {
        assert_eq!(to_percent(41.9), 41);
        assert_eq!(to_percent(0.2), 0);
        assert_eq!(to_percent(123.0), 100);
    }

    #[test]
    fn default_reading_substitutes_fixed_values() {
        assert_eq!(default_reading(), (DEFAULT_TEMP_MILLI, 0));
    }
}

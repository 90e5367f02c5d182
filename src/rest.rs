use embassy_net::{
    dns::DnsSocket,
    tcp::client::{TcpClient, TcpClientState},
    Stack,
};
use heapless::{String, Vec};
use log::{info, warn};
use reqwless::client::{HttpClient, TlsConfig, TlsVerify};
use reqwless::headers::ContentType;
use reqwless::request::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use static_cell::StaticCell;

use crate::config::Config;
use crate::constants::*;
use crate::heap::MemoryMonitor;
use crate::sensor::TelemetryReading;

const URL_MAX: usize = 192;
const PAYLOAD_MAX: usize = 256;

static TCP_STATE: StaticCell<TcpClientState<1, TX_BUFFER_SIZE, RX_BUFFER_SIZE>> = StaticCell::new();
static TLS_READ_BUF: StaticCell<[u8; TLS_BUFFER_SIZE]> = StaticCell::new();
static TLS_WRITE_BUF: StaticCell<[u8; TLS_BUFFER_SIZE]> = StaticCell::new();
static HTTP_RX_BUF: StaticCell<[u8; HTTP_RX_BUFFER_SIZE]> = StaticCell::new();

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// Joined URL does not fit the fixed buffer. Configuration problem,
    /// surfaced at client construction.
    UrlTooLong,
    /// DNS, TCP, TLS or HTTP wire failure.
    Transport,
    /// Response arrived but the JSON envelope could not be decoded.
    Decode,
    /// Response arrived with a status outside the GET success band.
    Status(u16),
    /// Payload could not be serialized.
    Format,
}

/// REST client for the ORDS endpoints. Transport sessions are built
/// fresh for every call and torn down with it, so no socket or TLS
/// state is held between the infrequent requests.
pub struct RestClient<'a> {
    tcp: TcpClient<'a, 1, TX_BUFFER_SIZE, RX_BUFFER_SIZE>,
    dns: DnsSocket<'a>,
    tls_seed: u64,
    tls_read_buf: &'static mut [u8; TLS_BUFFER_SIZE],
    tls_write_buf: &'static mut [u8; TLS_BUFFER_SIZE],
    rx_buf: &'static mut [u8; HTTP_RX_BUFFER_SIZE],
    monitor: &'a MemoryMonitor,
    device_tag: &'a str,
    reference_url: String<URL_MAX>,
    sensor_url: String<URL_MAX>,
}

impl<'a> RestClient<'a> {
    pub fn new(
        stack: &'a Stack<'static>,
        tls_seed: u64,
        config: &Config,
        monitor: &'a MemoryMonitor,
        device_tag: &'a str,
    ) -> Result<Self, Error> {
        let tcp_state = TCP_STATE.init(TcpClientState::new());

        Ok(Self {
            tcp: TcpClient::new(*stack, tcp_state),
            dns: DnsSocket::new(*stack),
            tls_seed,
            tls_read_buf: TLS_READ_BUF.init([0; TLS_BUFFER_SIZE]),
            tls_write_buf: TLS_WRITE_BUF.init([0; TLS_BUFFER_SIZE]),
            rx_buf: HTTP_RX_BUF.init([0; HTTP_RX_BUFFER_SIZE]),
            monitor,
            device_tag,
            reference_url: api_url(config.rest_uri, config.ords_user, config.reference_api)?,
            sensor_url: api_url(config.rest_uri, config.ords_user, config.sensor_api)?,
        })
    }

    /// GET the current reference value. Exactly one request per call;
    /// every failure mode is reported as its own error kind and none of
    /// them escapes past the caller's sentinel substitution.
    pub async fn fetch_reference(&mut self) -> Result<f32, Error> {
        info!("HTTP GET reference value, URL: {}", self.reference_url);

        // free as much heap as possible before the socket pool and TLS
        // session are allocated
        self.monitor.reclaim(None);

        let tls = TlsConfig::new(
            self.tls_seed,
            &mut self.tls_read_buf[..],
            &mut self.tls_write_buf[..],
            TlsVerify::None,
        );
        let mut client = HttpClient::new_with_tls(&self.tcp, &self.dns, tls);

        let mut request = client
            .request(Method::GET, &self.reference_url)
            .await
            .map_err(|e| {
                warn!("GET request setup failed: {e:?}");
                Error::Transport
            })?
            .content_type(ContentType::ApplicationJson);

        let response = request.send(&mut self.rx_buf[..]).await.map_err(|e| {
            warn!("GET failed: {e:?}");
            Error::Transport
        })?;

        let status = response.status.0;
        if !is_get_success(status) {
            warn!("GET failed, status code: {status}");
            return Err(Error::Status(status));
        }

        let body = response.body().read_to_end().await.map_err(|e| {
            warn!("GET body read failed: {e:?}");
            Error::Transport
        })?;

        let value = parse_reference(body)?;
        info!("Current reference value: {value}");
        Ok(value)
    }

    /// POST one telemetry reading. Returns the raw status code; what the
    /// code means for recovery is the caller's decision.
    pub async fn publish(&mut self, reading: &TelemetryReading) -> Result<u16, Error> {
        let payload = telemetry_payload(self.device_tag, reading)?;
        info!("HTTP POST to {}, payload {}", self.sensor_url, payload);

        self.monitor.reclaim(None);

        let tls = TlsConfig::new(
            self.tls_seed,
            &mut self.tls_read_buf[..],
            &mut self.tls_write_buf[..],
            TlsVerify::None,
        );
        let mut client = HttpClient::new_with_tls(&self.tcp, &self.dns, tls);

        let mut request = client
            .request(Method::POST, &self.sensor_url)
            .await
            .map_err(|e| {
                warn!("POST request setup failed: {e:?}");
                Error::Transport
            })?
            .body(payload.as_bytes())
            .content_type(ContentType::ApplicationJson);

        let response = request.send(&mut self.rx_buf[..]).await.map_err(|e| {
            warn!("POST failed: {e:?}");
            Error::Transport
        })?;

        let status = response.status.0;
        if is_post_success(status) {
            info!("Posted successfully");
        }
        Ok(status)
    }
}

/// The GET success band is any status up to and including 201, unlike
/// the stricter publish band.
pub fn is_get_success(status: u16) -> bool {
    status <= 201
}

/// The publish success band is exactly 200 or 201; anything else is the
/// caller's problem to classify.
pub fn is_post_success(status: u16) -> bool {
    matches!(status, 200 | 201)
}

/// Join base URI, the fixed ORDS segment, the API user and a sub-path.
fn api_url(base: &str, user: &str, path: &str) -> Result<String<URL_MAX>, Error> {
    let mut url: String<URL_MAX> = String::new();
    for part in [base.trim_end_matches('/'), "/ords/", user, path] {
        url.push_str(part).map_err(|_| Error::UrlTooLong)?;
    }
    Ok(url)
}

/// ORDS collection endpoints page up to `limit` rows, 25 by default.
/// Only `items[0]` is consumed, but the full page must deserialize.
const REFERENCE_ITEMS_MAX: usize = 25;

#[derive(Deserialize)]
struct ReferenceEnvelope {
    items: Vec<ReferenceItem, REFERENCE_ITEMS_MAX>,
}

#[derive(Deserialize)]
struct ReferenceItem {
    kmh: f32,
}

/// Extract `items[0].kmh` from the ORDS collection envelope.
fn parse_reference(body: &[u8]) -> Result<f32, Error> {
    let (envelope, _) =
        serde_json_core::from_slice::<ReferenceEnvelope>(body).map_err(|_| Error::Decode)?;
    envelope
        .items
        .first()
        .map(|item| item.kmh)
        .ok_or(Error::Decode)
}

#[derive(Serialize)]
struct TelemetryEnvelope<'a> {
    objecttag: &'a str,
    sensors: [SensorEntry<'a>; 3],
}

#[derive(Serialize)]
struct SensorEntry<'a> {
    sensortag: &'a str,
    sensorvalue: String<16>,
}

/// Build the publish body. All sensor values are rendered as strings,
/// including the reference sentinel when the fetch failed.
fn telemetry_payload(
    device_tag: &str,
    reading: &TelemetryReading,
) -> Result<String<PAYLOAD_MAX>, Error> {
    let envelope = TelemetryEnvelope {
        objecttag: device_tag,
        sensors: [
            entry("mC", &reading.temp_milli)?,
            entry("Humidity", &reading.humidity_pct)?,
            entry("KMH", &reading.reference)?,
        ],
    };

    serde_json_core::to_string(&envelope).map_err(|_| Error::Format)
}

fn entry<'a>(tag: &'a str, value: &dyn core::fmt::Display) -> Result<SensorEntry<'a>, Error> {
    use core::fmt::Write;

    let mut rendered: String<16> = String::new();
    write!(rendered, "{value}").map_err(|_| Error::Format)?;
    Ok(SensorEntry {
        sensortag: tag,
        sensorvalue: rendered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_user_and_path() {
        let url = api_url("https://db.example.com", "scott", "/wsapi/V1/kmh").unwrap();
        assert_eq!(url, "https://db.example.com/ords/scott/wsapi/V1/kmh");
    }

    #[test]
    fn url_trims_trailing_slash_on_base() {
        let url = api_url("https://db.example.com/", "scott", "/sensorapi/").unwrap();
        assert_eq!(url, "https://db.example.com/ords/scott/sensorapi/");
    }

    #[test]
    fn oversized_url_is_rejected() {
        let long = core::str::from_utf8(&[b'a'; 200]).unwrap();
        assert_eq!(
            api_url("https://db.example.com", long, "/x").unwrap_err(),
            Error::UrlTooLong
        );
    }

    #[test]
    fn get_success_band_includes_200_and_201() {
        assert!(is_get_success(200));
        assert!(is_get_success(201));
        assert!(!is_get_success(202));
        assert!(!is_get_success(500));
    }

    #[test]
    fn post_success_band_is_narrower_than_get_band() {
        assert!(is_post_success(200));
        assert!(is_post_success(201));
        // 1xx passes the GET band but is not a successful publish
        assert!(is_get_success(102));
        assert!(!is_post_success(102));
        assert!(!is_post_success(202));
    }

    #[test]
    fn reference_parses_first_item() {
        let body = br#"{"items":[{"kmh":3.14,"recorded":"2024-09-06"}],"hasMore":false,"limit":25}"#;
        assert_eq!(parse_reference(body), Ok(3.14));
    }

    #[test]
    fn reference_parses_first_item_of_paged_envelope() {
        // a full result page must not be mistaken for a decode failure
        let body =
            br#"{"items":[{"kmh":3.14},{"kmh":2.0},{"kmh":1.0}],"hasMore":false,"limit":25}"#;
        assert_eq!(parse_reference(body), Ok(3.14));
    }

    #[test]
    fn reference_with_no_items_is_a_decode_error() {
        let body = br#"{"items":[],"hasMore":false}"#;
        assert_eq!(parse_reference(body), Err(Error::Decode));
    }

    #[test]
    fn reference_garbage_is_a_decode_error() {
        assert_eq!(parse_reference(b"<html>500</html>"), Err(Error::Decode));
    }

    #[test]
    fn payload_embeds_values_as_strings() {
        let reading = TelemetryReading {
            temp_milli: 23_450,
            humidity_pct: 41,
            reference: 3.14,
        };
        let payload = telemetry_payload("ESP32-TN-01ABCD", &reading).unwrap();
        assert_eq!(
            payload,
            r#"{"objecttag":"ESP32-TN-01ABCD","sensors":[{"sensortag":"mC","sensorvalue":"23450"},{"sensortag":"Humidity","sensorvalue":"41"},{"sensortag":"KMH","sensorvalue":"3.14"}]}"#
        );
    }

    #[test]
    fn failed_reference_fetch_still_appears_in_payload() {
        // the sentinel travels verbatim; a fetch failure never blocks
        // publication
        let reading = TelemetryReading {
            temp_milli: DEFAULT_TEMP_MILLI,
            humidity_pct: 0,
            reference: REFERENCE_UNAVAILABLE,
        };
        let payload = telemetry_payload("ESP32-TN-01ABCD", &reading).unwrap();
        assert!(payload.contains(r#"{"sensortag":"KMH","sensorvalue":"-1"}"#));
    }
}

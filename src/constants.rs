/// Current firmware version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Size of the heap in DRAM (internal memory)
pub const HEAP_SIZE: usize = 72 * 1024;

/// Size of the TCP socket receive buffer
pub const RX_BUFFER_SIZE: usize = 4096;
/// Size of the TCP socket transmit buffer
pub const TX_BUFFER_SIZE: usize = 4096;

/// TLS record buffers required by embedded-tls (16 KiB records + overhead)
pub const TLS_BUFFER_SIZE: usize = 16640;

/// Size of the buffer HTTP response bodies are read into
pub const HTTP_RX_BUFFER_SIZE: usize = 2048;

/// Upper bound on configured Wi-Fi candidates (`net1`..`net9`)
pub const MAX_NETWORKS: usize = 9;

/// Access points reported by the diagnostic scan after total connect failure
pub const MAX_SCAN_RESULTS: usize = 16;

/// Per-candidate Wi-Fi association timeout
pub const WIFI_CONNECT_TIMEOUT_SECS: u64 = 15;
/// How long to wait for a DHCP lease after association
pub const DHCP_TIMEOUT_SECS: u64 = 20;

/// Temperature substituted when the sensor is absent or unreadable,
/// in milli-degrees Celsius
pub const DEFAULT_TEMP_MILLI: i32 = 31_300;

/// Embedded verbatim in the published payload when the reference value
/// could not be obtained
pub const REFERENCE_UNAVAILABLE: f32 = -1.0;

/// Hold time on the aged-out warning color before the preventive restart
pub const AGED_OUT_HOLD_SECS: u64 = 20;
/// Hold time on the failure color before the post-failure deep sleep
pub const HARD_FAILURE_HOLD_SECS: u64 = 30;
/// Deep-sleep duration after a publish transport failure
pub const HARD_FAILURE_SLEEP_SECS: u64 = 5;
/// Hold and deep-sleep durations when no network candidate connects
pub const NO_NETWORK_HOLD_SECS: u64 = 10;
pub const NO_NETWORK_SLEEP_SECS: u64 = 10;

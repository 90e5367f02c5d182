use heapless::Vec;

use crate::constants::MAX_NETWORKS;

/// Compile-time-embedded settings table. Values are kept as the strings
/// they were written with in `cfg.toml`; typed parsing happens in
/// [`Config::load`] so that a malformed value is a startup error.
pub struct Settings {
    pub entries: &'static [(&'static str, &'static str)],
}

impl Settings {
    pub fn get(&self, key: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    fn get_str(&self, key: &str, default: &'static str) -> &'static str {
        self.get(key).unwrap_or(default)
    }

    fn get_u32(&self, key: &'static str, default: u32) -> Result<u32, Error> {
        match self.get(key) {
            Some(raw) => raw.parse().map_err(|_| Error::InvalidInt(key)),
            None => Ok(default),
        }
    }

    fn get_bool(&self, key: &'static str, default: bool) -> Result<bool, Error> {
        match self.get(key) {
            Some(raw) if raw.eq_ignore_ascii_case("true") => Ok(true),
            Some(raw) if raw.eq_ignore_ascii_case("false") => Ok(false),
            Some(_) => Err(Error::InvalidBool(key)),
            None => Ok(default),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// Value could not be parsed as an integer.
    InvalidInt(&'static str),
    /// Value was neither "true" nor "false" (case-insensitive).
    InvalidBool(&'static str),
    /// No `net1_wifi_ssid`/`net1_wifi_password` pair was configured.
    NoNetworks,
}

/// One Wi-Fi candidate, tried in configuration order.
pub struct Network {
    /// Display label derived from the key index (`Net-1`, `Net-2`, ...).
    pub label: heapless::String<8>,
    pub ssid: &'static str,
    pub password: &'static str,
}

/// Typed configuration, immutable after load.
pub struct Config {
    pub rest_uri: &'static str,
    pub ords_user: &'static str,
    pub sensor_api: &'static str,
    pub reference_api: &'static str,
    pub debug_level: u32,
    pub memory_threshold: usize,
    pub max_iterations: u32,
    pub post_sleep_secs: u64,
    pub scan_on_fail: bool,
    pub networks: Vec<Network, MAX_NETWORKS>,
}

impl Config {
    pub fn load(settings: &Settings) -> Result<Self, Error> {
        Ok(Self {
            rest_uri: settings.get_str("rest_uri", ""),
            ords_user: settings.get_str("ords_user", ""),
            sensor_api: settings.get_str("sensor_api", "/sensorapi/"),
            reference_api: settings.get_str("reference_api", "/wsapi/V1/kmh"),
            debug_level: settings.get_u32("debug_level", 1)?,
            memory_threshold: settings.get_u32("memory_threshold", 20_000)? as usize,
            max_iterations: settings.get_u32("iterations", 1_000)?,
            post_sleep_secs: settings.get_u32("post_sleep_time", 5)? as u64,
            scan_on_fail: settings.get_bool("scan_on_fail", true)?,
            networks: load_networks(settings)?,
        })
    }
}

/// Collect `net{i}_wifi_ssid` / `net{i}_wifi_password` pairs in order,
/// stopping at the first index with either key missing.
fn load_networks(settings: &Settings) -> Result<Vec<Network, MAX_NETWORKS>, Error> {
    let mut networks = Vec::new();

    for i in 1..=MAX_NETWORKS {
        let mut ssid_key: heapless::String<24> = heapless::String::new();
        let mut password_key: heapless::String<24> = heapless::String::new();
        let mut label: heapless::String<8> = heapless::String::new();

        use core::fmt::Write;
        write!(ssid_key, "net{i}_wifi_ssid").ok();
        write!(password_key, "net{i}_wifi_password").ok();
        write!(label, "Net-{i}").ok();

        let (Some(ssid), Some(password)) =
            (settings.get(&ssid_key), settings.get(&password_key))
        else {
            break;
        };

        networks
            .push(Network {
                label,
                ssid,
                password,
            })
            .ok();
    }

    if networks.is_empty() {
        return Err(Error::NoNetworks);
    }

    Ok(networks)
}

// settings table is generated at compile time from cfg.toml
include!(concat!(env!("OUT_DIR"), "/settings.rs"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_values_parse_from_strings() {
        let settings = Settings {
            entries: &[
                ("net1_wifi_ssid", "home"),
                ("net1_wifi_password", "secret"),
                ("iterations", "42"),
            ],
        };
        let config = Config::load(&settings).unwrap();
        assert_eq!(config.max_iterations, 42);
    }

    #[test]
    fn malformed_integer_is_fatal() {
        let settings = Settings {
            entries: &[
                ("net1_wifi_ssid", "home"),
                ("net1_wifi_password", "secret"),
                ("memory_threshold", "plenty"),
            ],
        };
        assert_eq!(
            Config::load(&settings).unwrap_err(),
            Error::InvalidInt("memory_threshold")
        );
    }

    #[test]
    fn booleans_parse_case_insensitively() {
        for raw in ["true", "TRUE", "True"] {
            let settings = Settings {
                entries: &[
                    ("net1_wifi_ssid", "home"),
                    ("net1_wifi_password", "secret"),
                    ("scan_on_fail", raw),
                ],
            };
            assert!(Config::load(&settings).unwrap().scan_on_fail);
        }
        let settings = Settings {
            entries: &[
                ("net1_wifi_ssid", "home"),
                ("net1_wifi_password", "secret"),
                ("scan_on_fail", "FaLsE"),
            ],
        };
        assert!(!Config::load(&settings).unwrap().scan_on_fail);
    }

    #[test]
    fn malformed_boolean_is_fatal() {
        let settings = Settings {
            entries: &[
                ("net1_wifi_ssid", "home"),
                ("net1_wifi_password", "secret"),
                ("scan_on_fail", "yes"),
            ],
        };
        assert_eq!(
            Config::load(&settings).unwrap_err(),
            Error::InvalidBool("scan_on_fail")
        );
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let settings = Settings {
            entries: &[
                ("net1_wifi_ssid", "home"),
                ("net1_wifi_password", "secret"),
            ],
        };
        let config = Config::load(&settings).unwrap();
        assert_eq!(config.debug_level, 1);
        assert_eq!(config.memory_threshold, 20_000);
        assert_eq!(config.max_iterations, 1_000);
        assert_eq!(config.post_sleep_secs, 5);
        assert!(config.scan_on_fail);
    }

    #[test]
    fn empty_network_list_is_fatal() {
        let settings = Settings {
            entries: &[("rest_uri", "https://example.com")],
        };
        assert_eq!(Config::load(&settings).unwrap_err(), Error::NoNetworks);
    }

    #[test]
    fn network_list_keeps_configuration_order() {
        let settings = Settings {
            entries: &[
                ("net1_wifi_ssid", "first"),
                ("net1_wifi_password", "a"),
                ("net2_wifi_ssid", "second"),
                ("net2_wifi_password", "b"),
            ],
        };
        let config = Config::load(&settings).unwrap();
        assert_eq!(config.networks.len(), 2);
        assert_eq!(config.networks[0].ssid, "first");
        assert_eq!(config.networks[0].label, "Net-1");
        assert_eq!(config.networks[1].ssid, "second");
        assert_eq!(config.networks[1].label, "Net-2");
    }

    #[test]
    fn network_numbering_stops_at_first_gap() {
        // net2 has no password, so net3 must never be picked up
        let settings = Settings {
            entries: &[
                ("net1_wifi_ssid", "first"),
                ("net1_wifi_password", "a"),
                ("net2_wifi_ssid", "second"),
                ("net3_wifi_ssid", "third"),
                ("net3_wifi_password", "c"),
            ],
        };
        let config = Config::load(&settings).unwrap();
        assert_eq!(config.networks.len(), 1);
        assert_eq!(config.networks[0].ssid, "first");
    }
}

use core::fmt::Write;

use heapless::String;

/// Derive the process-lifetime device tag from the factory MAC address.
/// Computed once at startup; embedded verbatim in published payloads and
/// used as the DHCP hostname.
pub fn device_tag(mac: [u8; 6]) -> String<24> {
    let mut tag = String::new();
    // the last three octets are the unique part of the address
    write!(tag, "ESP32-TN-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]).ok();
    tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_uses_unique_mac_octets() {
        let tag = device_tag([0x24, 0x0a, 0xc4, 0x01, 0xab, 0xcd]);
        assert_eq!(tag, "ESP32-TN-01ABCD");
    }

    #[test]
    fn tag_is_stable_for_same_hardware() {
        let mac = [0x24, 0x0a, 0xc4, 0xde, 0xad, 0x42];
        assert_eq!(device_tag(mac), device_tag(mac));
    }
}

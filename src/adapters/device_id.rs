//! Session identity derived from the ESP32 factory MAC address.
//!
//! The broker client id is `<node_id>-<HEX>`, where HEX is the low 32
//! bits of the MAC read little-endian, upper-case, without leading zeros.
//! It is deterministic across reboots (factory-burned eFuse MAC) and
//! unique per board even when several nodes share a `node_id`.

use core::fmt::Write;

/// Client id buffer: 32-byte node id, dash, up to 8 hex digits.
pub type ClientIdString = heapless::String<48>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Build the broker client id for `node_id` on the board with `mac`.
pub fn client_id(node_id: &str, mac: &MacAddress) -> ClientIdString {
    let suffix = u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]]);
    let mut id = ClientIdString::new();
    // node_id is at most 32 bytes, so this cannot overflow.
    let _ = write!(id, "{}-{:X}", node_id, suffix);
    id
}

// crates/lake-indexer/src/serviceability/types.rs
// ============================================================================
// Module: Serviceability Types
// Description: Raw program records and converted domain records.
// Purpose: Model the network topology snapshot at both boundaries.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! `Raw*` records mirror what the serviceability program returns: public keys
//! as base58 text, addresses as octet arrays, prefix lengths as a trailing
//! octet. Domain records are what the warehouse stores.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Raw Program Data
// ============================================================================

/// Full program snapshot returned by a serviceability source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramData {
    /// Contributor accounts.
    #[serde(default)]
    pub contributors: Vec<RawContributor>,
    /// Device accounts.
    #[serde(default)]
    pub devices: Vec<RawDevice>,
    /// User accounts.
    #[serde(default)]
    pub users: Vec<RawUser>,
    /// Link accounts.
    #[serde(default)]
    pub links: Vec<RawLink>,
    /// Exchange (metro) accounts.
    #[serde(default)]
    pub exchanges: Vec<RawExchange>,
    /// Multicast group accounts.
    #[serde(default)]
    pub multicast_groups: Vec<RawMulticastGroup>,
}

/// Contributor account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContributor {
    /// Account public key.
    pub pubkey: String,
    /// Short contributor code.
    pub code: String,
}

/// Device interface with an `[a, b, c, d, prefix_len]` network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInterface {
    /// Interface name.
    pub name: String,
    /// IPv4 octets followed by the prefix length.
    pub ip_net: [u8; 5],
    /// Interface status label.
    pub status: String,
}

/// Device account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDevice {
    /// Account public key.
    pub pubkey: String,
    /// Device status label.
    pub status: String,
    /// Device type label.
    pub device_type: String,
    /// Device code.
    pub code: String,
    /// Public IPv4 octets.
    pub public_ip: [u8; 4],
    /// Owning contributor public key.
    pub contributor_pubkey: String,
    /// Exchange public key.
    pub exchange_pubkey: String,
    /// Maximum users served.
    pub max_users: u16,
    /// Interfaces.
    #[serde(default)]
    pub interfaces: Vec<RawInterface>,
}

/// User account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUser {
    /// Account public key.
    pub pubkey: String,
    /// Owner public key.
    pub owner: String,
    /// User status label.
    pub status: String,
    /// User type label.
    pub user_type: String,
    /// Client IPv4 octets.
    pub client_ip: [u8; 4],
    /// Assigned IPv4 octets.
    pub dz_ip: [u8; 4],
    /// Serving device public key.
    pub device_pubkey: String,
    /// Tunnel identifier.
    pub tunnel_id: u16,
    /// Multicast groups the user publishes to.
    #[serde(default)]
    pub publishers: Vec<String>,
    /// Multicast groups the user subscribes to.
    #[serde(default)]
    pub subscribers: Vec<String>,
}

/// Link account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    /// Account public key.
    pub pubkey: String,
    /// Link status label.
    pub status: String,
    /// Link code.
    pub code: String,
    /// Tunnel network octets followed by the prefix length.
    pub tunnel_net: [u8; 5],
    /// Owning contributor public key.
    pub contributor_pubkey: String,
    /// Side A device public key.
    pub side_a_pubkey: String,
    /// Side Z device public key.
    pub side_z_pubkey: String,
    /// Side A interface name.
    pub side_a_iface_name: String,
    /// Side Z interface name.
    pub side_z_iface_name: String,
    /// Link type label.
    pub link_type: String,
    /// Committed delay in nanoseconds.
    pub delay_ns: u64,
    /// Committed jitter in nanoseconds.
    pub jitter_ns: u64,
    /// Bandwidth in bits per second.
    pub bandwidth: u64,
    /// IS-IS delay override in nanoseconds.
    pub delay_override_ns: u64,
}

/// Exchange account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExchange {
    /// Account public key.
    pub pubkey: String,
    /// Metro code.
    pub code: String,
    /// Metro name.
    pub name: String,
    /// Longitude.
    pub lng: f64,
    /// Latitude.
    pub lat: f64,
}

/// Multicast group account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMulticastGroup {
    /// Account public key.
    pub pubkey: String,
    /// Owner public key.
    pub owner: String,
    /// Group code.
    pub code: String,
    /// Multicast IPv4 octets.
    pub multicast_ip: [u8; 4],
    /// Maximum bandwidth.
    pub max_bandwidth: u64,
    /// Numeric status code.
    pub status: u8,
    /// Publisher count.
    pub publisher_count: u32,
    /// Subscriber count.
    pub subscriber_count: u32,
}

// ============================================================================
// SECTION: Domain Records
// ============================================================================

/// Contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    /// Public key.
    pub pk: String,
    /// Contributor code.
    pub code: String,
    /// Display name, empty when the code is unknown.
    pub name: String,
}

/// Device interface as stored in the device's `interfaces` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    /// Interface name.
    pub name: String,
    /// `a.b.c.d/len`, or empty when no address is assigned.
    pub ip: String,
    /// Interface status.
    pub status: String,
}

/// Device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Public key.
    pub pk: String,
    /// Status.
    pub status: String,
    /// Device type.
    pub device_type: String,
    /// Device code.
    pub code: String,
    /// Public IPv4 address.
    pub public_ip: String,
    /// Contributor public key.
    pub contributor_pk: String,
    /// Metro public key.
    pub metro_pk: String,
    /// Maximum users.
    pub max_users: u16,
    /// Interfaces.
    pub interfaces: Vec<Interface>,
}

/// User.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Public key.
    pub pk: String,
    /// Owner public key.
    pub owner_pubkey: String,
    /// Status.
    pub status: String,
    /// User kind.
    pub kind: String,
    /// Client IPv4 address.
    pub client_ip: String,
    /// Assigned IPv4 address.
    pub dz_ip: String,
    /// Serving device public key.
    pub device_pk: String,
    /// Tunnel identifier.
    pub tunnel_id: u16,
    /// Multicast groups published to.
    pub publishers: Vec<String>,
    /// Multicast groups subscribed to.
    pub subscribers: Vec<String>,
}

/// Metro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metro {
    /// Public key.
    pub pk: String,
    /// Metro code.
    pub code: String,
    /// Metro name.
    pub name: String,
    /// Longitude.
    pub longitude: f64,
    /// Latitude.
    pub latitude: f64,
}

/// Link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Public key.
    pub pk: String,
    /// Status.
    pub status: String,
    /// Link code.
    pub code: String,
    /// Tunnel network in CIDR form.
    pub tunnel_net: String,
    /// Contributor public key.
    pub contributor_pk: String,
    /// Side A device public key.
    pub side_a_pk: String,
    /// Side Z device public key.
    pub side_z_pk: String,
    /// Side A interface name.
    pub side_a_iface_name: String,
    /// Side Z interface name.
    pub side_z_iface_name: String,
    /// Side A interface address, empty when unknown.
    pub side_a_ip: String,
    /// Side Z interface address, empty when unknown.
    pub side_z_ip: String,
    /// Link type.
    pub link_type: String,
    /// Committed round-trip time in nanoseconds.
    pub committed_rtt_ns: u64,
    /// Committed jitter in nanoseconds.
    pub committed_jitter_ns: u64,
    /// Bandwidth in bits per second.
    pub bandwidth_bps: u64,
    /// IS-IS delay override in nanoseconds.
    pub isis_delay_override_ns: u64,
}

/// Multicast group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulticastGroup {
    /// Public key.
    pub pk: String,
    /// Owner public key.
    pub owner_pubkey: String,
    /// Group code.
    pub code: String,
    /// Multicast IPv4 address.
    pub multicast_ip: String,
    /// Maximum bandwidth.
    pub max_bandwidth: u64,
    /// Status label.
    pub status: String,
    /// Publisher count.
    pub publisher_count: u32,
    /// Subscriber count.
    pub subscriber_count: u32,
}

/// Converted snapshot ready to be written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceabilitySnapshot {
    /// Contributors.
    pub contributors: Vec<Contributor>,
    /// Devices.
    pub devices: Vec<Device>,
    /// Users.
    pub users: Vec<User>,
    /// Metros.
    pub metros: Vec<Metro>,
    /// Links.
    pub links: Vec<Link>,
    /// Multicast groups.
    pub multicast_groups: Vec<MulticastGroup>,
}

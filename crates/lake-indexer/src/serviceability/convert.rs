// crates/lake-indexer/src/serviceability/convert.rs
// ============================================================================
// Module: Serviceability Conversion
// Description: Raw program records -> domain records.
// Purpose: Render addresses, resolve names, and join link interface IPs.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Pure conversion functions. Interface networks render as `a.b.c.d/len`
//! only when the prefix length is within `1..=32`; otherwise the address is
//! left empty. Link side addresses are joined from the device interface
//! tables of the same snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::serviceability::types::Contributor;
use crate::serviceability::types::Device;
use crate::serviceability::types::Interface;
use crate::serviceability::types::Link;
use crate::serviceability::types::Metro;
use crate::serviceability::types::MulticastGroup;
use crate::serviceability::types::ProgramData;
use crate::serviceability::types::RawContributor;
use crate::serviceability::types::RawDevice;
use crate::serviceability::types::RawExchange;
use crate::serviceability::types::RawLink;
use crate::serviceability::types::RawMulticastGroup;
use crate::serviceability::types::RawUser;
use crate::serviceability::types::ServiceabilitySnapshot;
use crate::serviceability::types::User;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Display names of known contributors, keyed by code.
const CONTRIBUTOR_NAMES: &[(&str, &str)] = &[
    ("jump_", "Jump Crypto"),
    ("dgt", "Distributed Global"),
    ("cherry", "Cherry Servers"),
    ("cdrw", "Cumberland/DRW"),
    ("glxy", "Galaxy"),
    ("latitude", "Latitude"),
    ("rox", "RockawayX"),
    ("s3v", "S3V"),
    ("stakefac", "Staking Facilities"),
    ("tsw", "Terraswitch"),
];

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Converts a full program snapshot.
#[must_use]
pub fn convert_program_data(data: &ProgramData) -> ServiceabilitySnapshot {
    ServiceabilitySnapshot {
        contributors: convert_contributors(&data.contributors),
        devices: convert_devices(&data.devices),
        users: convert_users(&data.users),
        metros: convert_metros(&data.exchanges),
        links: convert_links(&data.links, &data.devices),
        multicast_groups: convert_multicast_groups(&data.multicast_groups),
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Converts contributors, resolving display names by code.
#[must_use]
pub fn convert_contributors(raw: &[RawContributor]) -> Vec<Contributor> {
    raw.iter()
        .map(|contributor| Contributor {
            pk: contributor.pubkey.clone(),
            code: contributor.code.clone(),
            name: contributor_name(&contributor.code).unwrap_or_default().to_string(),
        })
        .collect()
}

/// Converts devices and their interfaces.
#[must_use]
pub fn convert_devices(raw: &[RawDevice]) -> Vec<Device> {
    raw.iter()
        .map(|device| Device {
            pk: device.pubkey.clone(),
            status: device.status.clone(),
            device_type: device.device_type.clone(),
            code: device.code.clone(),
            public_ip: Ipv4Addr::from(device.public_ip).to_string(),
            contributor_pk: device.contributor_pubkey.clone(),
            metro_pk: device.exchange_pubkey.clone(),
            max_users: device.max_users,
            interfaces: device
                .interfaces
                .iter()
                .map(|iface| Interface {
                    name: iface.name.clone(),
                    ip: interface_cidr(iface.ip_net).unwrap_or_default(),
                    status: iface.status.clone(),
                })
                .collect(),
        })
        .collect()
}

/// Converts users.
#[must_use]
pub fn convert_users(raw: &[RawUser]) -> Vec<User> {
    raw.iter()
        .map(|user| User {
            pk: user.pubkey.clone(),
            owner_pubkey: user.owner.clone(),
            status: user.status.clone(),
            kind: user.user_type.clone(),
            client_ip: Ipv4Addr::from(user.client_ip).to_string(),
            dz_ip: Ipv4Addr::from(user.dz_ip).to_string(),
            device_pk: user.device_pubkey.clone(),
            tunnel_id: user.tunnel_id,
            publishers: user.publishers.clone(),
            subscribers: user.subscribers.clone(),
        })
        .collect()
}

/// Converts exchanges into metros.
#[must_use]
pub fn convert_metros(raw: &[RawExchange]) -> Vec<Metro> {
    raw.iter()
        .map(|exchange| Metro {
            pk: exchange.pubkey.clone(),
            code: exchange.code.clone(),
            name: exchange.name.clone(),
            longitude: exchange.lng,
            latitude: exchange.lat,
        })
        .collect()
}

/// Converts links, joining side addresses from the device interface tables.
#[must_use]
pub fn convert_links(raw: &[RawLink], devices: &[RawDevice]) -> Vec<Link> {
    let mut interface_ips: BTreeMap<&str, BTreeMap<&str, String>> = BTreeMap::new();
    for device in devices {
        let by_name = interface_ips.entry(device.pubkey.as_str()).or_default();
        for iface in &device.interfaces {
            if prefix_len_valid(iface.ip_net[4]) {
                by_name.insert(iface.name.as_str(), ipv4(iface.ip_net).to_string());
            }
        }
    }
    let side_ip = |device: &str, iface: &str| {
        interface_ips
            .get(device)
            .and_then(|by_name| by_name.get(iface))
            .cloned()
            .unwrap_or_default()
    };

    raw.iter()
        .map(|link| Link {
            pk: link.pubkey.clone(),
            status: link.status.clone(),
            code: link.code.clone(),
            tunnel_net: tunnel_cidr(link.tunnel_net),
            contributor_pk: link.contributor_pubkey.clone(),
            side_a_pk: link.side_a_pubkey.clone(),
            side_z_pk: link.side_z_pubkey.clone(),
            side_a_iface_name: link.side_a_iface_name.clone(),
            side_z_iface_name: link.side_z_iface_name.clone(),
            side_a_ip: side_ip(&link.side_a_pubkey, &link.side_a_iface_name),
            side_z_ip: side_ip(&link.side_z_pubkey, &link.side_z_iface_name),
            link_type: link.link_type.clone(),
            committed_rtt_ns: link.delay_ns,
            committed_jitter_ns: link.jitter_ns,
            bandwidth_bps: link.bandwidth,
            isis_delay_override_ns: link.delay_override_ns,
        })
        .collect()
}

/// Converts multicast groups, mapping numeric status codes to labels.
#[must_use]
pub fn convert_multicast_groups(raw: &[RawMulticastGroup]) -> Vec<MulticastGroup> {
    raw.iter()
        .map(|group| MulticastGroup {
            pk: group.pubkey.clone(),
            owner_pubkey: group.owner.clone(),
            code: group.code.clone(),
            multicast_ip: Ipv4Addr::from(group.multicast_ip).to_string(),
            max_bandwidth: group.max_bandwidth,
            status: multicast_status(group.status).to_string(),
            publisher_count: group.publisher_count,
            subscriber_count: group.subscriber_count,
        })
        .collect()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the display name for a contributor code.
#[must_use]
pub fn contributor_name(code: &str) -> Option<&'static str> {
    CONTRIBUTOR_NAMES.iter().find(|(known, _)| *known == code).map(|(_, name)| *name)
}

/// Returns the label for a multicast group status code.
#[must_use]
pub const fn multicast_status(code: u8) -> &'static str {
    match code {
        0 => "pending",
        1 => "activated",
        2 => "suspended",
        3 => "deleted",
        _ => "unknown",
    }
}

/// Renders `[a, b, c, d, len]` as `a.b.c.d/len` when `len` is within `1..=32`.
#[must_use]
pub fn interface_cidr(ip_net: [u8; 5]) -> Option<String> {
    prefix_len_valid(ip_net[4]).then(|| format!("{}/{}", ipv4(ip_net), ip_net[4]))
}

/// Renders a tunnel network; prefix lengths above 32 render as empty.
fn tunnel_cidr(net: [u8; 5]) -> String {
    if net[4] > 32 { String::new() } else { format!("{}/{}", ipv4(net), net[4]) }
}

/// Returns true when a prefix length is usable for an interface address.
const fn prefix_len_valid(len: u8) -> bool {
    len > 0 && len <= 32
}

/// Extracts the address octets of a network.
const fn ipv4(net: [u8; 5]) -> Ipv4Addr {
    Ipv4Addr::new(net[0], net[1], net[2], net[3])
}

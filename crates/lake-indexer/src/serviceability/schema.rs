// crates/lake-indexer/src/serviceability/schema.rs
// ============================================================================
// Module: Serviceability Schemas
// Description: Dimension schemas and row codecs for topology records.
// Purpose: Describe each topology entity type to the dimension engine.
// Dependencies: lake-core, lake-store-sqlite, serde_json
// ============================================================================

//! ## Overview
//! Every topology entity type is a versioned dimension keyed by its public
//! key (`pk:VARCHAR`). [`DimensionRecord`] ties a domain record to its schema
//! and encodes it to, and decodes it from, warehouse rows. List-valued fields
//! are stored as JSON text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use lake_core::DimensionSchema;
use lake_core::RowResult;
use lake_core::RowSourceError;
use lake_core::Value;
use lake_store_sqlite::DimensionRow;

use crate::error::StoreError;
use crate::serviceability::types::Contributor;
use crate::serviceability::types::Device;
use crate::serviceability::types::Interface;
use crate::serviceability::types::Link;
use crate::serviceability::types::Metro;
use crate::serviceability::types::MulticastGroup;
use crate::serviceability::types::User;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Primary key shared by every topology dimension.
const PK_COLUMNS: &[&str] = &["pk:VARCHAR"];

// ============================================================================
// SECTION: Record Trait
// ============================================================================

/// Domain record stored as a versioned dimension.
pub trait DimensionRecord: Sized {
    /// Schema describing the record's dimension.
    type Schema: DimensionSchema + Default;

    /// Encodes the record as `pk + payload` values in schema order.
    ///
    /// # Errors
    ///
    /// Returns [`RowSourceError`] when a field cannot be encoded.
    fn to_row(&self) -> RowResult;

    /// Decodes a current-state row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] when a column is missing or out of
    /// range.
    fn from_row(row: &DimensionRow) -> Result<Self, StoreError>;
}

// ============================================================================
// SECTION: Schemas
// ============================================================================

/// Declares a unit schema type for a topology dimension.
macro_rules! topology_schema {
    ($(#[$meta:meta])* $schema:ident, $name:literal, [$($column:literal),+ $(,)?]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $schema;

        impl DimensionSchema for $schema {
            fn name(&self) -> &str {
                $name
            }

            fn primary_key_columns(&self) -> &[&str] {
                PK_COLUMNS
            }

            fn payload_columns(&self) -> &[&str] {
                &[$($column),+]
            }
        }
    };
}

topology_schema!(
    /// `dz_contributors` dimension.
    ContributorSchema,
    "dz_contributors",
    ["code:VARCHAR", "name:VARCHAR"]
);

topology_schema!(
    /// `dz_devices` dimension.
    DeviceSchema,
    "dz_devices",
    [
        "status:VARCHAR",
        "device_type:VARCHAR",
        "code:VARCHAR",
        "public_ip:VARCHAR",
        "contributor_pk:VARCHAR",
        "metro_pk:VARCHAR",
        "max_users:INTEGER",
        "interfaces:VARCHAR",
    ]
);

topology_schema!(
    /// `dz_users` dimension.
    UserSchema,
    "dz_users",
    [
        "owner_pubkey:VARCHAR",
        "status:VARCHAR",
        "kind:VARCHAR",
        "client_ip:VARCHAR",
        "dz_ip:VARCHAR",
        "device_pk:VARCHAR",
        "tunnel_id:INTEGER",
        "publishers:VARCHAR",
        "subscribers:VARCHAR",
    ]
);

topology_schema!(
    /// `dz_metros` dimension.
    MetroSchema,
    "dz_metros",
    ["code:VARCHAR", "name:VARCHAR", "longitude:DOUBLE", "latitude:DOUBLE"]
);

topology_schema!(
    /// `dz_links` dimension.
    LinkSchema,
    "dz_links",
    [
        "status:VARCHAR",
        "code:VARCHAR",
        "tunnel_net:VARCHAR",
        "contributor_pk:VARCHAR",
        "side_a_pk:VARCHAR",
        "side_z_pk:VARCHAR",
        "side_a_iface_name:VARCHAR",
        "side_z_iface_name:VARCHAR",
        "side_a_ip:VARCHAR",
        "side_z_ip:VARCHAR",
        "link_type:VARCHAR",
        "committed_rtt_ns:BIGINT",
        "committed_jitter_ns:BIGINT",
        "bandwidth_bps:BIGINT",
        "isis_delay_override_ns:BIGINT",
    ]
);

topology_schema!(
    /// `dz_multicast_groups` dimension.
    MulticastGroupSchema,
    "dz_multicast_groups",
    [
        "owner_pubkey:VARCHAR",
        "code:VARCHAR",
        "multicast_ip:VARCHAR",
        "max_bandwidth:BIGINT",
        "status:VARCHAR",
        "publisher_count:INTEGER",
        "subscriber_count:INTEGER",
    ]
);

/// Every topology dimension, in refresh order.
pub const TOPOLOGY_SCHEMAS: [&dyn DimensionSchema; 6] = [
    &ContributorSchema,
    &DeviceSchema,
    &UserSchema,
    &MetroSchema,
    &LinkSchema,
    &MulticastGroupSchema,
];

/// Looks up a topology dimension schema by dataset name.
#[must_use]
pub fn schema_by_name(name: &str) -> Option<&'static dyn DimensionSchema> {
    TOPOLOGY_SCHEMAS.into_iter().find(|schema| schema.name() == name)
}

// ============================================================================
// SECTION: Records
// ============================================================================

impl DimensionRecord for Contributor {
    type Schema = ContributorSchema;

    fn to_row(&self) -> RowResult {
        Ok(vec![text(&self.pk), text(&self.code), text(&self.name)])
    }

    fn from_row(row: &DimensionRow) -> Result<Self, StoreError> {
        Ok(Self {
            pk: read_text(row, "pk")?,
            code: read_text(row, "code")?,
            name: read_text(row, "name")?,
        })
    }
}

impl DimensionRecord for Device {
    type Schema = DeviceSchema;

    fn to_row(&self) -> RowResult {
        Ok(vec![
            text(&self.pk),
            text(&self.status),
            text(&self.device_type),
            text(&self.code),
            text(&self.public_ip),
            text(&self.contributor_pk),
            text(&self.metro_pk),
            Value::from(self.max_users),
            Value::Text(to_json(&self.interfaces)?),
        ])
    }

    fn from_row(row: &DimensionRow) -> Result<Self, StoreError> {
        Ok(Self {
            pk: read_text(row, "pk")?,
            status: read_text(row, "status")?,
            device_type: read_text(row, "device_type")?,
            code: read_text(row, "code")?,
            public_ip: read_text(row, "public_ip")?,
            contributor_pk: read_text(row, "contributor_pk")?,
            metro_pk: read_text(row, "metro_pk")?,
            max_users: read_int(row, "max_users")?,
            interfaces: from_json::<Vec<Interface>>(row, "interfaces")?,
        })
    }
}

impl DimensionRecord for User {
    type Schema = UserSchema;

    fn to_row(&self) -> RowResult {
        Ok(vec![
            text(&self.pk),
            text(&self.owner_pubkey),
            text(&self.status),
            text(&self.kind),
            text(&self.client_ip),
            text(&self.dz_ip),
            text(&self.device_pk),
            Value::from(self.tunnel_id),
            Value::Text(to_json(&self.publishers)?),
            Value::Text(to_json(&self.subscribers)?),
        ])
    }

    fn from_row(row: &DimensionRow) -> Result<Self, StoreError> {
        Ok(Self {
            pk: read_text(row, "pk")?,
            owner_pubkey: read_text(row, "owner_pubkey")?,
            status: read_text(row, "status")?,
            kind: read_text(row, "kind")?,
            client_ip: read_text(row, "client_ip")?,
            dz_ip: read_text(row, "dz_ip")?,
            device_pk: read_text(row, "device_pk")?,
            tunnel_id: read_int(row, "tunnel_id")?,
            publishers: from_json(row, "publishers")?,
            subscribers: from_json(row, "subscribers")?,
        })
    }
}

impl DimensionRecord for Metro {
    type Schema = MetroSchema;

    fn to_row(&self) -> RowResult {
        Ok(vec![
            text(&self.pk),
            text(&self.code),
            text(&self.name),
            Value::Float(self.longitude),
            Value::Float(self.latitude),
        ])
    }

    fn from_row(row: &DimensionRow) -> Result<Self, StoreError> {
        Ok(Self {
            pk: read_text(row, "pk")?,
            code: read_text(row, "code")?,
            name: read_text(row, "name")?,
            longitude: read_float(row, "longitude")?,
            latitude: read_float(row, "latitude")?,
        })
    }
}

impl DimensionRecord for Link {
    type Schema = LinkSchema;

    fn to_row(&self) -> RowResult {
        Ok(vec![
            text(&self.pk),
            text(&self.status),
            text(&self.code),
            text(&self.tunnel_net),
            text(&self.contributor_pk),
            text(&self.side_a_pk),
            text(&self.side_z_pk),
            text(&self.side_a_iface_name),
            text(&self.side_z_iface_name),
            text(&self.side_a_ip),
            text(&self.side_z_ip),
            text(&self.link_type),
            unsigned("committed_rtt_ns", self.committed_rtt_ns)?,
            unsigned("committed_jitter_ns", self.committed_jitter_ns)?,
            unsigned("bandwidth_bps", self.bandwidth_bps)?,
            unsigned("isis_delay_override_ns", self.isis_delay_override_ns)?,
        ])
    }

    fn from_row(row: &DimensionRow) -> Result<Self, StoreError> {
        Ok(Self {
            pk: read_text(row, "pk")?,
            status: read_text(row, "status")?,
            code: read_text(row, "code")?,
            tunnel_net: read_text(row, "tunnel_net")?,
            contributor_pk: read_text(row, "contributor_pk")?,
            side_a_pk: read_text(row, "side_a_pk")?,
            side_z_pk: read_text(row, "side_z_pk")?,
            side_a_iface_name: read_text(row, "side_a_iface_name")?,
            side_z_iface_name: read_text(row, "side_z_iface_name")?,
            side_a_ip: read_text(row, "side_a_ip")?,
            side_z_ip: read_text(row, "side_z_ip")?,
            link_type: read_text(row, "link_type")?,
            committed_rtt_ns: read_int(row, "committed_rtt_ns")?,
            committed_jitter_ns: read_int(row, "committed_jitter_ns")?,
            bandwidth_bps: read_int(row, "bandwidth_bps")?,
            isis_delay_override_ns: read_int(row, "isis_delay_override_ns")?,
        })
    }
}

impl DimensionRecord for MulticastGroup {
    type Schema = MulticastGroupSchema;

    fn to_row(&self) -> RowResult {
        Ok(vec![
            text(&self.pk),
            text(&self.owner_pubkey),
            text(&self.code),
            text(&self.multicast_ip),
            unsigned("max_bandwidth", self.max_bandwidth)?,
            text(&self.status),
            Value::from(self.publisher_count),
            Value::from(self.subscriber_count),
        ])
    }

    fn from_row(row: &DimensionRow) -> Result<Self, StoreError> {
        Ok(Self {
            pk: read_text(row, "pk")?,
            owner_pubkey: read_text(row, "owner_pubkey")?,
            code: read_text(row, "code")?,
            multicast_ip: read_text(row, "multicast_ip")?,
            max_bandwidth: read_int(row, "max_bandwidth")?,
            status: read_text(row, "status")?,
            publisher_count: read_int(row, "publisher_count")?,
            subscriber_count: read_int(row, "subscriber_count")?,
        })
    }
}

// ============================================================================
// SECTION: Encoding Helpers
// ============================================================================

/// Wraps a string field.
pub(crate) fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

/// Encodes an unsigned field into a signed 64-bit column.
pub(crate) fn unsigned(column: &str, value: u64) -> Result<Value, RowSourceError> {
    i64::try_from(value)
        .map(Value::Int)
        .map_err(|_| RowSourceError::new(format!("{column} value {value} exceeds BIGINT range")))
}

/// Encodes a list field as JSON text.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RowSourceError> {
    serde_json::to_string(value).map_err(|err| RowSourceError::new(err.to_string()))
}

// ============================================================================
// SECTION: Decoding Helpers
// ============================================================================

/// Reads a text column; NULL decodes as empty.
pub(crate) fn read_text(row: &DimensionRow, column: &str) -> Result<String, StoreError> {
    match row.get(column) {
        Some(Value::Text(value)) => Ok(value.clone()),
        Some(Value::Null) => Ok(String::new()),
        other => Err(unexpected(column, "text", other)),
    }
}

/// Reads an integer column into a narrower unsigned type; NULL decodes as 0.
pub(crate) fn read_int<T: TryFrom<i64> + Default>(row: &DimensionRow, column: &str) -> Result<T, StoreError> {
    match row.get(column) {
        Some(Value::Int(value)) => T::try_from(*value).map_err(|_| {
            StoreError::Decode(format!("column {column} value {value} is out of range"))
        }),
        Some(Value::Null) => Ok(T::default()),
        other => Err(unexpected(column, "int", other)),
    }
}

/// Reads a double column; NULL decodes as 0.0.
pub(crate) fn read_float(row: &DimensionRow, column: &str) -> Result<f64, StoreError> {
    match row.get(column) {
        Some(Value::Float(value)) => Ok(*value),
        Some(Value::Null) => Ok(0.0),
        other => Err(unexpected(column, "float", other)),
    }
}

/// Parses a JSON text column; NULL or empty decodes as the default.
pub(crate) fn from_json<T>(row: &DimensionRow, column: &str) -> Result<T, StoreError>
where
    T: serde::de::DeserializeOwned + Default,
{
    let raw = read_text(row, column)?;
    if raw.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&raw)
        .map_err(|err| StoreError::Decode(format!("column {column} is not valid JSON: {err}")))
}

/// Builds a decode error for a missing or mistyped column.
fn unexpected(column: &str, expected: &str, actual: Option<&Value>) -> StoreError {
    match actual {
        Some(value) => StoreError::Decode(format!(
            "column {column} expects {expected}, got {}",
            value.kind()
        )),
        None => StoreError::Decode(format!("column {column} is missing")),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use lake_core::DimensionLayout;

    use super::*;

    #[test]
    fn every_schema_parses() {
        for schema in TOPOLOGY_SCHEMAS {
            let layout = DimensionLayout::from_schema(schema).unwrap();
            assert_eq!(layout.primary_key().len(), 1);
        }
    }

    #[test]
    fn schemas_resolve_by_name() {
        assert_eq!(schema_by_name("dz_links").map(|schema| schema.name()), Some("dz_links"));
        assert!(schema_by_name("dz_unknown").is_none());
    }

    #[test]
    fn device_row_matches_schema_width() {
        let device = Device {
            pk: "dev1".to_string(),
            status: "activated".to_string(),
            device_type: "hybrid".to_string(),
            code: "ams-dz1".to_string(),
            public_ip: "1.2.3.4".to_string(),
            contributor_pk: "c1".to_string(),
            metro_pk: "m1".to_string(),
            max_users: 128,
            interfaces: vec![Interface {
                name: "Loopback0".to_string(),
                ip: "10.0.0.1/32".to_string(),
                status: "activated".to_string(),
            }],
        };
        let row = device.to_row().unwrap();
        let layout = DimensionLayout::from_schema(&DeviceSchema).unwrap();
        assert_eq!(row.len(), layout.column_count());
        assert_eq!(
            row[8],
            Value::from("[{\"name\":\"Loopback0\",\"ip\":\"10.0.0.1/32\",\"status\":\"activated\"}]")
        );
    }

    #[test]
    fn oversized_unsigned_is_rejected() {
        let err = unsigned("bandwidth_bps", u64::MAX).unwrap_err();
        assert!(err.to_string().contains("exceeds BIGINT range"));
    }
}

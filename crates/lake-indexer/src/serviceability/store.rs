// crates/lake-indexer/src/serviceability/store.rs
// ============================================================================
// Module: Serviceability Store
// Description: Typed facade over the topology dimensions.
// Purpose: Replace full snapshots and read current state per entity type.
// Dependencies: lake-core, lake-store-sqlite
// ============================================================================

//! ## Overview
//! Every `replace_*` call writes a complete snapshot of one entity type with
//! `missing_means_deleted = true`, so entities absent from the snapshot are
//! tombstoned. `current_*` calls return every live entity sorted by
//! surrogate key. All calls are synchronous; async callers run them on the
//! blocking pool.

// ============================================================================
// SECTION: Imports
// ============================================================================

use lake_core::CancelToken;
use lake_store_sqlite::DimensionDataset;
use lake_store_sqlite::DimensionWriteConfig;
use lake_store_sqlite::Warehouse;
use lake_store_sqlite::WriteSummary;
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::serviceability::schema::DimensionRecord;
use crate::serviceability::types::Contributor;
use crate::serviceability::types::Device;
use crate::serviceability::types::Link;
use crate::serviceability::types::Metro;
use crate::serviceability::types::MulticastGroup;
use crate::serviceability::types::User;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Store for serviceability dimensions.
#[derive(Clone)]
pub struct ServiceabilityStore {
    /// Warehouse handle.
    warehouse: Warehouse,
}

impl ServiceabilityStore {
    /// Creates a store over an open warehouse.
    #[must_use]
    pub const fn new(warehouse: Warehouse) -> Self {
        Self {
            warehouse,
        }
    }

    /// Returns the warehouse handle.
    #[must_use]
    pub const fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    /// Replaces the contributor snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn replace_contributors(
        &self,
        records: &[Contributor],
        snapshot_ts: Option<OffsetDateTime>,
    ) -> Result<WriteSummary, StoreError> {
        self.replace(records, snapshot_ts)
    }

    /// Replaces the device snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn replace_devices(
        &self,
        records: &[Device],
        snapshot_ts: Option<OffsetDateTime>,
    ) -> Result<WriteSummary, StoreError> {
        self.replace(records, snapshot_ts)
    }

    /// Replaces the user snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn replace_users(
        &self,
        records: &[User],
        snapshot_ts: Option<OffsetDateTime>,
    ) -> Result<WriteSummary, StoreError> {
        self.replace(records, snapshot_ts)
    }

    /// Replaces the metro snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn replace_metros(
        &self,
        records: &[Metro],
        snapshot_ts: Option<OffsetDateTime>,
    ) -> Result<WriteSummary, StoreError> {
        self.replace(records, snapshot_ts)
    }

    /// Replaces the link snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn replace_links(
        &self,
        records: &[Link],
        snapshot_ts: Option<OffsetDateTime>,
    ) -> Result<WriteSummary, StoreError> {
        self.replace(records, snapshot_ts)
    }

    /// Replaces the multicast group snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn replace_multicast_groups(
        &self,
        records: &[MulticastGroup],
        snapshot_ts: Option<OffsetDateTime>,
    ) -> Result<WriteSummary, StoreError> {
        self.replace(records, snapshot_ts)
    }

    /// Returns live contributors.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read or decode fails.
    pub fn current_contributors(&self) -> Result<Vec<Contributor>, StoreError> {
        self.current()
    }

    /// Returns live devices.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read or decode fails.
    pub fn current_devices(&self) -> Result<Vec<Device>, StoreError> {
        self.current()
    }

    /// Returns live users.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read or decode fails.
    pub fn current_users(&self) -> Result<Vec<User>, StoreError> {
        self.current()
    }

    /// Returns live metros.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read or decode fails.
    pub fn current_metros(&self) -> Result<Vec<Metro>, StoreError> {
        self.current()
    }

    /// Returns live links.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read or decode fails.
    pub fn current_links(&self) -> Result<Vec<Link>, StoreError> {
        self.current()
    }

    /// Returns live multicast groups.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read or decode fails.
    pub fn current_multicast_groups(&self) -> Result<Vec<MulticastGroup>, StoreError> {
        self.current()
    }

    // ------------------------------------------------------------------------
    // Generic paths
    // ------------------------------------------------------------------------

    /// Writes a full snapshot of one record type.
    fn replace<T: DimensionRecord>(
        &self,
        records: &[T],
        snapshot_ts: Option<OffsetDateTime>,
    ) -> Result<WriteSummary, StoreError> {
        replace_records(&self.warehouse, records, snapshot_ts)
    }

    /// Reads and decodes every live record of one type.
    fn current<T: DimensionRecord>(&self) -> Result<Vec<T>, StoreError> {
        current_records(&self.warehouse)
    }
}

// ============================================================================
// SECTION: Shared Dimension Paths
// ============================================================================

/// Writes a full snapshot of one record type, tombstoning absent entities.
pub(crate) fn replace_records<T: DimensionRecord>(
    warehouse: &Warehouse,
    records: &[T],
    snapshot_ts: Option<OffsetDateTime>,
) -> Result<WriteSummary, StoreError> {
    let dataset = DimensionDataset::new(&T::Schema::default())?;
    let config = DimensionWriteConfig {
        snapshot_ts,
        missing_means_deleted: true,
        ..DimensionWriteConfig::default()
    };
    let summary = dataset.write_batch(
        warehouse,
        records.len(),
        |index| records[index].to_row(),
        &config,
        &CancelToken::new(),
    )?;
    Ok(summary)
}

/// Reads and decodes every live record of one type.
pub(crate) fn current_records<T: DimensionRecord>(
    warehouse: &Warehouse,
) -> Result<Vec<T>, StoreError> {
    let dataset = DimensionDataset::new(&T::Schema::default())?;
    dataset.get_current_rows(warehouse, None)?.iter().map(T::from_row).collect()
}

// crates/lake-indexer/src/indexer.rs
// ============================================================================
// Module: Indexer
// Description: Wires sources, stores, and views into one runnable unit.
// Purpose: Build every configured view over a shared warehouse.
// Dependencies: lake-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! The [`Indexer`] always runs the serviceability view. The usage view is
//! added when both its settings and a counter source are supplied; it waits
//! on the serviceability view's readiness before each refresh. The
//! validators and block production views are added together when validator
//! settings and a cluster source are supplied.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use lake_store_sqlite::Warehouse;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::IndexerError;
use crate::metrics::ViewMetrics;
use crate::readiness::ReadinessError;
use crate::serviceability::ServiceabilityRefresher;
use crate::serviceability::ServiceabilitySource;
use crate::serviceability::ServiceabilityStore;
use crate::usage::CounterSource;
use crate::usage::UsageRefresher;
use crate::usage::UsageSettings;
use crate::usage::UsageStore;
use crate::validators::BlockProductionRefresher;
use crate::validators::ClusterSource;
use crate::validators::ValidatorStore;
use crate::validators::ValidatorsRefresher;
use crate::view::View;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Usage view settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageViewConfig {
    /// Refresh interval.
    pub interval: Duration,
    /// Refresher settings.
    pub settings: UsageSettings,
}

/// Validator view settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorsViewConfig {
    /// Validator set refresh interval.
    pub interval: Duration,
    /// Block production refresh interval.
    pub block_production_interval: Duration,
}

/// Indexer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexerConfig {
    /// Serviceability refresh interval.
    pub serviceability_interval: Duration,
    /// Usage view settings; `None` disables the view.
    pub usage: Option<UsageViewConfig>,
    /// Validator view settings; `None` disables both validator views.
    pub validators: Option<ValidatorsViewConfig>,
}

/// External sources feeding the views.
#[derive(Clone)]
pub struct IndexerSources {
    /// Topology snapshot source.
    pub serviceability: Arc<dyn ServiceabilitySource>,
    /// Counter sample source; required when usage is configured.
    pub counters: Option<Arc<dyn CounterSource>>,
    /// Cluster snapshot source; required when validators are configured.
    pub cluster: Option<Arc<dyn ClusterSource>>,
}

// ============================================================================
// SECTION: Indexer
// ============================================================================

/// Set of views over one warehouse.
pub struct Indexer {
    /// Serviceability view.
    serviceability: View<ServiceabilityRefresher>,
    /// Optional usage view.
    usage: Option<View<UsageRefresher>>,
    /// Optional validator set view.
    validators: Option<View<ValidatorsRefresher>>,
    /// Optional block production view; present whenever `validators` is.
    block_production: Option<View<BlockProductionRefresher>>,
}

impl Indexer {
    /// Builds the configured views.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Invalid`] when usage is configured without a
    /// counter source, validators are configured without a cluster source,
    /// or an interval is zero.
    pub fn new(
        warehouse: &Warehouse,
        sources: IndexerSources,
        config: IndexerConfig,
        metrics: Arc<dyn ViewMetrics>,
    ) -> Result<Self, IndexerError> {
        let topology = ServiceabilityStore::new(warehouse.clone());
        let serviceability = View::new(
            ServiceabilityRefresher::new(sources.serviceability, topology.clone()),
            config.serviceability_interval,
            Arc::clone(&metrics),
        )?;
        let usage = match (config.usage, sources.counters) {
            (Some(usage), Some(counters)) => {
                let refresher = UsageRefresher::new(
                    counters,
                    UsageStore::new(warehouse.clone())?,
                    topology,
                    serviceability.readiness(),
                    usage.settings,
                );
                Some(View::new(refresher, usage.interval, Arc::clone(&metrics))?)
            }
            (Some(_), None) => {
                return Err(IndexerError::Invalid(
                    "usage view is configured but no counter source was supplied".to_string(),
                ));
            }
            (None, _) => None,
        };
        let (validators, block_production) = match (config.validators, sources.cluster) {
            (Some(settings), Some(cluster)) => {
                let store = ValidatorStore::new(warehouse.clone())?;
                let validators = View::new(
                    ValidatorsRefresher::new(Arc::clone(&cluster), store.clone()),
                    settings.interval,
                    Arc::clone(&metrics),
                )?;
                let block_production = View::new(
                    BlockProductionRefresher::new(cluster, store),
                    settings.block_production_interval,
                    metrics,
                )?;
                (Some(validators), Some(block_production))
            }
            (Some(_), None) => {
                return Err(IndexerError::Invalid(
                    "validators view is configured but no cluster source was supplied"
                        .to_string(),
                ));
            }
            (None, _) => (None, None),
        };
        Ok(Self {
            serviceability,
            usage,
            validators,
            block_production,
        })
    }

    /// Returns the serviceability view.
    #[must_use]
    pub const fn serviceability(&self) -> &View<ServiceabilityRefresher> {
        &self.serviceability
    }

    /// Returns the usage view when configured.
    #[must_use]
    pub const fn usage(&self) -> Option<&View<UsageRefresher>> {
        self.usage.as_ref()
    }

    /// Returns the validator set view when configured.
    #[must_use]
    pub const fn validators(&self) -> Option<&View<ValidatorsRefresher>> {
        self.validators.as_ref()
    }

    /// Returns the block production view when configured.
    #[must_use]
    pub const fn block_production(&self) -> Option<&View<BlockProductionRefresher>> {
        self.block_production.as_ref()
    }

    /// Returns true once the serviceability view has loaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.serviceability.is_ready()
    }

    /// Waits for the serviceability view to load.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessError`] on timeout.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), ReadinessError> {
        self.serviceability.wait_ready(timeout).await
    }

    /// Starts every view loop.
    #[must_use]
    pub fn start(&self, shutdown: &watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = vec![self.serviceability.start(shutdown.clone())];
        if let Some(usage) = &self.usage {
            handles.push(usage.start(shutdown.clone()));
        }
        if let Some(validators) = &self.validators {
            handles.push(validators.start(shutdown.clone()));
        }
        if let Some(block_production) = &self.block_production {
            handles.push(block_production.start(shutdown.clone()));
        }
        handles
    }
}

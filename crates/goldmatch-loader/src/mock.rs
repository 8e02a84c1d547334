//! Mock table loader for testing
//!
//! This loader returns predefined tables without touching any filesystem or
//! query service. It's useful for:
//! - Unit testing the batch scorer
//! - Simulating missing results and execution failures
//! - Simulating slow loads to exercise timeouts
//!
//! ## Usage
//!
//! ```rust,ignore
//! use goldmatch_loader::{MockLoader, TableLoader};
//!
//! let loader = MockLoader::new();
//! loader.add_table("local001", table).await;
//!
//! let fetched = loader.load("local001").await?;
//! ```
//!
//! ## Simulating Failures
//!
//! ```rust,ignore
//! let loader = MockLoaderBuilder::new()
//!     .with_error("bq002", LoadError::Execution("quota exceeded".into()))
//!     .with_delay_for("bq003", 5_000)
//!     .build();
//! ```

use crate::adapter::{LoadError, TableLoader};
use goldmatch_core::Table;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Mock loader for testing
///
/// Tables are stored per instance id (one or more variants each). Clones
/// share the same storage.
#[derive(Clone)]
pub struct MockLoader {
    /// Predefined tables by instance id
    tables: Arc<RwLock<HashMap<String, Vec<Table>>>>,

    /// Errors to return for specific instances
    errors: Arc<RwLock<HashMap<String, LoadError>>>,

    /// Per-instance simulated latency (milliseconds)
    delays: Arc<RwLock<HashMap<String, u64>>>,

    /// Simulated latency for every load (milliseconds)
    latency_ms: u64,

    /// Name to return from name() method
    loader_name: &'static str,
}

impl MockLoader {
    /// Create a new mock loader with no tables
    pub fn new() -> Self {
        MockLoaderBuilder::new().build()
    }

    /// Add a single table for an instance
    pub async fn add_table(&self, instance_id: impl Into<String>, table: Table) {
        self.tables.write().await.insert(instance_id.into(), vec![table]);
    }

    /// Add several acceptable tables for an instance
    pub async fn add_variants(&self, instance_id: impl Into<String>, tables: Vec<Table>) {
        self.tables.write().await.insert(instance_id.into(), tables);
    }

    /// Configure an error to be returned for a specific instance
    pub async fn add_error(&self, instance_id: impl Into<String>, error: LoadError) {
        self.errors.write().await.insert(instance_id.into(), error);
    }

    /// Configure simulated latency for all loads
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set a custom loader name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.loader_name = name;
        self
    }

    /// Get the number of instances with tables
    pub async fn table_count(&self) -> usize {
        self.tables.read().await.len()
    }

    /// Check if a table exists for an instance
    pub async fn has_table(&self, instance_id: &str) -> bool {
        self.tables.read().await.contains_key(instance_id)
    }

    async fn simulate_latency(&self, instance_id: &str) {
        let delay = self
            .delays
            .read()
            .await
            .get(instance_id)
            .copied()
            .unwrap_or(self.latency_ms);

        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

impl Default for MockLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TableLoader for MockLoader {
    fn name(&self) -> &'static str {
        self.loader_name
    }

    async fn load(&self, instance_id: &str) -> Result<Table, LoadError> {
        let mut variants = self.load_variants(instance_id).await?;
        if variants.is_empty() {
            return Err(LoadError::NotFound(instance_id.to_string()));
        }
        Ok(variants.swap_remove(0))
    }

    async fn load_variants(&self, instance_id: &str) -> Result<Vec<Table>, LoadError> {
        self.simulate_latency(instance_id).await;

        // Configured errors win over stored tables
        if let Some(error) = self.errors.read().await.get(instance_id) {
            return Err(error.clone());
        }

        self.tables
            .read()
            .await
            .get(instance_id)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(instance_id.to_string()))
    }
}

/// Builder for creating a MockLoader with predefined tables
///
/// # Example
///
/// ```rust,ignore
/// let loader = MockLoaderBuilder::new()
///     .with_table("local001", orders)
///     .with_variants("bq011", vec![variant_a, variant_b])
///     .with_latency(50)
///     .build();
/// ```
pub struct MockLoaderBuilder {
    tables: HashMap<String, Vec<Table>>,
    errors: HashMap<String, LoadError>,
    delays: HashMap<String, u64>,
    latency_ms: u64,
    loader_name: &'static str,
}

impl MockLoaderBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            errors: HashMap::new(),
            delays: HashMap::new(),
            latency_ms: 0,
            loader_name: "mock",
        }
    }

    /// Add a table for an instance
    pub fn with_table(mut self, instance_id: impl Into<String>, table: Table) -> Self {
        self.tables.insert(instance_id.into(), vec![table]);
        self
    }

    /// Add several acceptable tables for an instance
    pub fn with_variants(mut self, instance_id: impl Into<String>, tables: Vec<Table>) -> Self {
        self.tables.insert(instance_id.into(), tables);
        self
    }

    /// Add an error for a specific instance
    pub fn with_error(mut self, instance_id: impl Into<String>, error: LoadError) -> Self {
        self.errors.insert(instance_id.into(), error);
        self
    }

    /// Delay loads of one instance
    pub fn with_delay_for(mut self, instance_id: impl Into<String>, delay_ms: u64) -> Self {
        self.delays.insert(instance_id.into(), delay_ms);
        self
    }

    /// Configure latency for every load
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set loader name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.loader_name = name;
        self
    }

    /// Build the MockLoader
    pub fn build(self) -> MockLoader {
        MockLoader {
            tables: Arc::new(RwLock::new(self.tables)),
            errors: Arc::new(RwLock::new(self.errors)),
            delays: Arc::new(RwLock::new(self.delays)),
            latency_ms: self.latency_ms,
            loader_name: self.loader_name,
        }
    }
}

impl Default for MockLoaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Per-entity sync strategy registry.

use crate::error::{SyncError, SyncResult};
use fibersync_store::KeyPath;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How an entity is brought up to date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Drain the remote relation and atomically replace the local table.
    Full,
    /// Fetch rows newer than the local cursor and merge them in.
    Incremental {
        /// Monotonic column used as the cursor.
        #[serde(rename = "timestampColumn")]
        timestamp_column: String,
    },
}

impl SyncStrategy {
    /// Returns true for [`SyncStrategy::Incremental`].
    pub fn is_incremental(&self) -> bool {
        matches!(self, SyncStrategy::Incremental { .. })
    }

    /// Returns the cursor column of incremental strategies.
    pub fn timestamp_column(&self) -> Option<&str> {
        match self {
            SyncStrategy::Full => None,
            SyncStrategy::Incremental { timestamp_column } => Some(timestamp_column),
        }
    }
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStrategy::Full => f.write_str("full"),
            SyncStrategy::Incremental { timestamp_column } => {
                write!(f, "incremental({timestamp_column})")
            }
        }
    }
}

/// Sync configuration of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStrategyConfig {
    /// Consistency strategy.
    #[serde(flatten)]
    pub strategy: SyncStrategy,
    /// Primary-key path of the local table.
    #[serde(default)]
    pub key: KeyPath,
    /// Base table a view is derived from; its caches are invalidated too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_table: Option<String>,
}

impl SyncStrategyConfig {
    /// A full-sync entity keyed by `id`.
    pub fn full() -> Self {
        Self {
            strategy: SyncStrategy::Full,
            key: KeyPath::id(),
            related_table: None,
        }
    }

    /// An incremental entity keyed by `id`.
    pub fn incremental(timestamp_column: impl Into<String>) -> Self {
        Self {
            strategy: SyncStrategy::Incremental {
                timestamp_column: timestamp_column.into(),
            },
            key: KeyPath::id(),
            related_table: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryEntry {
    name: String,
    #[serde(flatten)]
    config: SyncStrategyConfig,
}

/// Immutable mapping from entity name to its sync configuration.
///
/// Entities keep their registration order, which is the order a full run
/// visits them in.
///
/// # Example
///
/// ```rust
/// use fibersync_engine::StrategyRegistry;
///
/// let registry = StrategyRegistry::builder()
///     .full("nodes")
///     .incremental("file_movements", "created_at")
///     .with_related_table("v_file_movements_extended", "file_movements")
///     .build();
///
/// assert_eq!(registry.entities(), vec!["nodes", "file_movements"]);
/// assert!(registry.lookup("file_movements").unwrap().strategy.is_incremental());
/// assert!(registry.lookup("ghost").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    entries: Vec<(String, SyncStrategyConfig)>,
    index: HashMap<String, usize>,
}

impl StrategyRegistry {
    /// Starts an empty registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Returns the config of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownEntity`] for unregistered names.
    pub fn lookup(&self, entity: &str) -> SyncResult<&SyncStrategyConfig> {
        self.get(entity)
            .ok_or_else(|| SyncError::UnknownEntity(entity.to_string()))
    }

    /// Returns the config of `entity`, if registered.
    pub fn get(&self, entity: &str) -> Option<&SyncStrategyConfig> {
        self.index.get(entity).map(|&i| &self.entries[i].1)
    }

    /// Returns every entity in registration order.
    pub fn entities(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Iterates `(entity, config)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SyncStrategyConfig)> {
        self.entries.iter().map(|(name, config)| (name.as_str(), config))
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if `entity` is registered.
    pub fn contains(&self, entity: &str) -> bool {
        self.index.contains_key(entity)
    }

    /// Loads a registry from a JSON array of entries:
    ///
    /// ```json
    /// [
    ///   { "name": "nodes", "strategy": "full" },
    ///   { "name": "file_movements", "strategy": "incremental", "timestampColumn": "created_at" },
    ///   { "name": "ring_based_systems", "strategy": "full", "key": ["system_id", "ring_id"] }
    /// ]
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] on malformed JSON, an incremental entry
    /// without `timestampColumn`, or a duplicated name.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let entries: Vec<RegistryEntry> = serde_json::from_str(json)
            .map_err(|e| SyncError::Config(format!("invalid registry: {e}")))?;

        let mut builder = Self::builder();
        for entry in entries {
            if builder.registry.contains(&entry.name) {
                return Err(SyncError::Config(format!(
                    "entity {} registered twice",
                    entry.name
                )));
            }
            builder = builder.entity(entry.name, entry.config);
        }
        Ok(builder.build())
    }

    /// The dashboard's entity set.
    ///
    /// Append-only logs and transaction histories are incremental on
    /// `created_at`; everything else is replaced wholesale. Views name the
    /// base table they derive from.
    pub fn dashboard_default() -> Self {
        const FULL_TABLES: &[&str] = &[
            "systems",
            "system_connections",
            "ports_management",
            "ofc_connections",
            "services",
            "nodes",
            "rings",
            "ofc_cables",
            "lookup_types",
            "employee_designations",
            "user_profiles",
            "maintenance_areas",
            "employees",
            "ring_based_systems",
            "logical_fiber_paths",
            "logical_paths",
            "inventory_items",
            "diary_notes",
            "e_files",
            "files",
            "folders",
            "cable_segments",
            "junction_closures",
            "fiber_splices",
            "logical_path_segments",
            "sdh_connections",
            "technical_notes",
            "advances",
            "expenses",
        ];
        const VIEWS: &[(&str, &str)] = &[
            ("v_advances_complete", "advances"),
            ("v_expenses_complete", "expenses"),
            ("v_systems_complete", "systems"),
            ("v_system_connections_complete", "system_connections"),
            ("v_ports_management_complete", "ports_management"),
            ("v_ofc_connections_complete", "ofc_connections"),
            ("v_services", "services"),
            ("v_nodes_complete", "nodes"),
            ("v_ring_nodes", "systems"),
            ("v_rings", "rings"),
            ("v_ofc_cables_complete", "ofc_cables"),
            ("v_cable_utilization", "ofc_cables"),
            ("v_end_to_end_paths", "logical_fiber_paths"),
            ("v_inventory_items", "inventory_items"),
            ("v_e_files_extended", "e_files"),
            ("v_employee_designations", "employee_designations"),
            ("v_junction_closures_complete", "junction_closures"),
            ("v_cable_segments_at_jc", "cable_segments"),
            ("v_maintenance_areas", "maintenance_areas"),
            ("v_lookup_types", "lookup_types"),
            ("v_user_profiles_extended", "user_profiles"),
            ("v_employees", "employees"),
            ("v_technical_notes", "technical_notes"),
        ];

        let mut builder = Self::builder()
            .incremental("v_audit_logs", "created_at")
            .with_related_table("v_audit_logs", "user_activity_logs")
            .incremental("user_activity_logs", "created_at")
            .incremental("v_inventory_transactions_extended", "created_at")
            .with_related_table("v_inventory_transactions_extended", "inventory_transactions")
            .incremental("inventory_transactions", "created_at")
            .incremental("v_file_movements_extended", "created_at")
            .with_related_table("v_file_movements_extended", "file_movements")
            .incremental("file_movements", "created_at");

        for table in FULL_TABLES {
            builder = builder.full(*table);
        }
        for (view, base) in VIEWS {
            builder = builder.full(*view).with_related_table(*view, *base);
        }

        builder
            .with_key("ring_based_systems", KeyPath::compound(["system_id", "ring_id"]))
            .with_key("v_ring_nodes", KeyPath::compound(["id", "ring_id"]))
            .with_key("v_end_to_end_paths", KeyPath::single("path_id"))
            .with_key("sdh_connections", KeyPath::single("system_connection_id"))
            .build()
    }
}

/// Builder for [`StrategyRegistry`].
///
/// Registering a name twice replaces its config in place.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: StrategyRegistry,
}

impl RegistryBuilder {
    /// Registers `entity` with an explicit config.
    pub fn entity(mut self, entity: impl Into<String>, config: SyncStrategyConfig) -> Self {
        let entity = entity.into();
        let registry = &mut self.registry;
        match registry.index.get(&entity) {
            Some(&i) => registry.entries[i].1 = config,
            None => {
                registry.index.insert(entity.clone(), registry.entries.len());
                registry.entries.push((entity, config));
            }
        }
        self
    }

    /// Registers a full-sync entity.
    pub fn full(self, entity: impl Into<String>) -> Self {
        self.entity(entity, SyncStrategyConfig::full())
    }

    /// Registers an incremental entity.
    pub fn incremental(self, entity: impl Into<String>, timestamp_column: impl Into<String>) -> Self {
        self.entity(entity, SyncStrategyConfig::incremental(timestamp_column))
    }

    /// Sets the key path of an already registered entity.
    pub fn with_key(mut self, entity: &str, key: KeyPath) -> Self {
        if let Some(&i) = self.registry.index.get(entity) {
            self.registry.entries[i].1.key = key;
        }
        self
    }

    /// Sets the related base table of an already registered entity.
    pub fn with_related_table(mut self, entity: &str, table: impl Into<String>) -> Self {
        if let Some(&i) = self.registry.index.get(entity) {
            self.registry.entries[i].1.related_table = Some(table.into());
        }
        self
    }

    /// Finishes the registry.
    pub fn build(self) -> StrategyRegistry {
        self.registry
    }
}

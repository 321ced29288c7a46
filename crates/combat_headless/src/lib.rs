//! Headless battle prediction runner for tuning and CI verification.
//!
//! This crate wraps `combat_core` with file IO: it loads the unit catalog
//! and RON scenarios, runs single predictions, composition searches and
//! seeded batches, and writes JSON results.
//!
//! - **stdout**: results (JSON with `--json`, CSV recordings)
//! - **stderr**: logs and human-readable summaries
//!
//! # Example
//!
//! ```bash
//! # Predict one battle
//! cargo run -p combat_headless -- predict --scenario assets/scenarios/marines_vs_zerglings.ron
//!
//! # Search for a counter composition
//! cargo run -p combat_headless -- optimize --scenario assets/scenarios/counter_roach_ling.ron
//!
//! # Verify determinism
//! cargo run -p combat_headless -- verify --scenario assets/scenarios/bio_vs_ling.ron --runs 10
//! ```

pub mod batch;
pub mod catalog_loader;
pub mod metrics;
pub mod scenario;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, VerifyReport};
pub use catalog_loader::{default_catalog_path, load_catalog, CatalogLoadError};
pub use metrics::{BatchSummary, BattleMetrics, OptimizationReport};
pub use scenario::{Scenario, ScenarioError, SearchScenario, UnitGroup};

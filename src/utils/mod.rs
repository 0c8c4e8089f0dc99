//! # Utility Functions (`utils`)
//!
//! File naming, logging setup, serialization, checkpoints, seeding, the
//! function registry, metrics and validation.

pub mod checkpoint;
mod finite;
pub mod logging;
pub mod metrics;
pub mod naming;
pub mod random;
pub mod registry;
pub mod serialization;
pub mod validation;

pub use checkpoint::{load_model, save_model_iteration};
pub use logging::{client_log, create_custom_logger};
pub use metrics::{default_metric, Metric};
pub use random::{id_generator, set_seed};
pub use registry::{get_executable_func, load_source_file, Registry};
pub use serialization::{dump_data_to_file, load_data_from_file};
pub use validation::{evaluate_model_on_tests, validation};

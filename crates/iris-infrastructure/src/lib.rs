//! Infrastructure adapters for the Iris runtime: configuration loading,
//! Linux sensors, backend stores, safety filtering, model storage and a
//! development token generator.

pub mod backend_store;
pub mod config_service;
pub mod device_provider;
pub mod echo_generator;
pub mod model_storage;
pub mod paths;
pub mod pattern_safety_filter;
pub mod sysfs_sensor;

pub use backend_store::{FileBackendPreferenceStore, InMemoryBenchmarkStore};
pub use config_service::ConfigService;
pub use device_provider::ConfiguredDeviceProfileProvider;
pub use echo_generator::EchoTokenGenerator;
pub use model_storage::FsModelStorage;
pub use paths::IrisPaths;
pub use pattern_safety_filter::PatternSafetyFilter;
pub use sysfs_sensor::SysfsThermalSensor;

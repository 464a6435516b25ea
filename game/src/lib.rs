pub mod agent_api;
pub mod blockfit_core;
pub mod logging;
pub mod persistence;
pub mod playtest;
pub mod randomizer;
pub mod serde_duration;
pub mod settings;

pub mod config;
pub mod file_config;
pub mod geo;
pub mod types;

pub use config::AppConfig;
pub use file_config::FileConfig;
pub use geo::{haversine_meters, GeoError, GeoPoint};
pub use types::*;

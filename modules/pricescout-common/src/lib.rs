pub mod config;
pub mod error;
pub mod price;
pub mod sites;
pub mod types;

pub use config::Config;
pub use error::SearchError;
pub use sites::SiteCatalog;
pub use types::*;

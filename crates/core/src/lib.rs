pub mod config;
pub mod config_loader;
pub mod table;
pub mod traits;

pub use config::{
    AppConfig, ConfigError, DataConfig, FeatureConfig, LabelConfig, MetricsConfig, ModelConfig,
    WalkForwardConfig,
};
pub use config_loader::ConfigLoader;
pub use table::{ColumnAlignment, Series, TableError, TimeSeriesTable, Timestamp};
pub use traits::{ModelTrainer, ProbabilityModel};

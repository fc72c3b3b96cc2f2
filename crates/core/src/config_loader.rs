use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

/// Loads [`AppConfig`] from a config directory plus `WF_`-prefixed environment variables.
///
/// Nested keys use `__` in the environment, e.g. `WF_WALK_FORWARD__TRAIN_SIZE=500`.
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    #[must_use]
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn base(&self) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(self.config_dir.join("Config.toml")))
    }

    /// Loads configuration by merging defaults, `Config.toml`, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a present configuration file cannot be parsed.
    pub fn load(&self) -> Result<AppConfig> {
        let config: AppConfig = self
            .base()
            .merge(Env::prefixed("WF_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Loads configuration with a profile overlay `Config.{profile}.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if a present configuration file cannot be parsed.
    pub fn load_with_profile(&self, profile: &str) -> Result<AppConfig> {
        let config: AppConfig = self
            .base()
            .merge(Toml::file(
                self.config_dir.join(format!("Config.{profile}.toml")),
            ))
            .merge(Env::prefixed("WF_").split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_falls_back_to_defaults_when_files_missing() {
        figment::Jail::expect_with(|_jail| {
            let config = ConfigLoader::new("does-not-exist").load().unwrap();
            assert_eq!(config.walk_forward.test_size, 730);
            Ok(())
        });
    }

    #[test]
    fn load_merges_toml_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/Config.toml",
                r#"
                [walk_forward]
                train_size = 300
                threshold = 0.6
                "#,
            )?;
            jail.set_env("WF_WALK_FORWARD__TEST_SIZE", "40");

            let config = ConfigLoader::new("config").load().unwrap();
            assert_eq!(config.walk_forward.train_size, 300);
            assert_eq!(config.walk_forward.test_size, 40);
            assert!((config.walk_forward.threshold - 0.6).abs() < f64::EPSILON);
            Ok(())
        });
    }

    #[test]
    fn profile_overrides_base_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file("config/Config.toml", "[metrics]\nperiods_per_year = 2920.0")?;
            jail.create_file("config/Config.daily.toml", "[metrics]\nperiods_per_year = 365.0")?;

            let config = ConfigLoader::new("config").load_with_profile("daily").unwrap();
            assert!((config.metrics.periods_per_year - 365.0).abs() < f64::EPSILON);
            Ok(())
        });
    }
}

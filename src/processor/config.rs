//! Processor configuration and environment defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::{Mapping, Value};

use crate::model::DeliveryConfig;

/// Default delivery config file name.
pub const DEFAULT_FILE_NAME: &str = "spinnaker.yml";

/// Default directory holding the delivery config.
pub const DEFAULT_DIR: &str = ".";

/// Environment names always offered by
/// [`DeliveryConfigProcessor::all_environments`](super::DeliveryConfigProcessor::all_environments).
pub const DEFAULT_ENVIRONMENTS: [&str; 3] = ["testing", "staging", "production"];

/// Produces the list value for one environment key, given the environment
/// name and the current typed config.
pub type EnvironmentProvider = Arc<dyn Fn(&str, &DeliveryConfig) -> Vec<Value> + Send + Sync>;

/// Returns the default constraint, `{type: manual-judgement}`.
#[must_use]
pub fn default_constraint() -> Value {
    let mut constraint = Mapping::new();
    constraint.insert(
        Value::String(String::from("type")),
        Value::String(String::from("manual-judgement")),
    );
    Value::Mapping(constraint)
}

fn empty_provider() -> EnvironmentProvider {
    Arc::new(|_: &str, _: &DeliveryConfig| Vec::new())
}

/// Configuration for a [`DeliveryConfigProcessor`](super::DeliveryConfigProcessor).
///
/// ```
/// use managed_delivery::processor::ProcessorConfig;
///
/// let config = ProcessorConfig::default()
///     .with_dir("./.spinnaker")
///     .with_app_name("myapp");
/// assert_eq!(config.file_name, "spinnaker.yml");
/// ```
#[derive(Clone)]
pub struct ProcessorConfig {
    /// Directory holding the config file. Defaults to `.`.
    pub dir: PathBuf,
    /// Config file name. Defaults to `spinnaker.yml`.
    pub file_name: String,
    /// Application name, used as the default `application` and `name`.
    pub app_name: String,
    /// Service account, used as the default `serviceAccount`.
    pub service_account: String,
    /// Constraints for new environments. Defaults to manual judgement.
    pub constraints: EnvironmentProvider,
    /// Notifications for new environments. Defaults to none.
    pub notifications: EnvironmentProvider,
    /// Verifications, refreshed on every upsert. Defaults to none.
    pub verify_with: EnvironmentProvider,
    /// Post-deploy actions, refreshed on every upsert. Defaults to none.
    pub post_deploy: EnvironmentProvider,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_DIR),
            file_name: String::from(DEFAULT_FILE_NAME),
            app_name: String::new(),
            service_account: String::new(),
            constraints: Arc::new(|_: &str, _: &DeliveryConfig| vec![default_constraint()]),
            notifications: empty_provider(),
            verify_with: empty_provider(),
            post_deploy: empty_provider(),
        }
    }
}

impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("dir", &self.dir)
            .field("file_name", &self.file_name)
            .field("app_name", &self.app_name)
            .field("service_account", &self.service_account)
            .finish_non_exhaustive()
    }
}

impl ProcessorConfig {
    /// Sets the directory holding the config file.
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Sets the config file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Sets the application name.
    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Sets the service account.
    #[must_use]
    pub fn with_service_account(mut self, service_account: impl Into<String>) -> Self {
        self.service_account = service_account.into();
        self
    }

    /// Sets the constraints provider.
    #[must_use]
    pub fn with_constraints<F>(mut self, provider: F) -> Self
    where
        F: Fn(&str, &DeliveryConfig) -> Vec<Value> + Send + Sync + 'static,
    {
        self.constraints = Arc::new(provider);
        self
    }

    /// Sets the notifications provider.
    #[must_use]
    pub fn with_notifications<F>(mut self, provider: F) -> Self
    where
        F: Fn(&str, &DeliveryConfig) -> Vec<Value> + Send + Sync + 'static,
    {
        self.notifications = Arc::new(provider);
        self
    }

    /// Sets the verifications provider.
    #[must_use]
    pub fn with_verify_with<F>(mut self, provider: F) -> Self
    where
        F: Fn(&str, &DeliveryConfig) -> Vec<Value> + Send + Sync + 'static,
    {
        self.verify_with = Arc::new(provider);
        self
    }

    /// Sets the post-deploy provider.
    #[must_use]
    pub fn with_post_deploy<F>(mut self, provider: F) -> Self
    where
        F: Fn(&str, &DeliveryConfig) -> Vec<Value> + Send + Sync + 'static,
    {
        self.post_deploy = Arc::new(provider);
        self
    }

    /// Returns the full path of the config file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProcessorConfig::default();
        let current = DeliveryConfig::default();

        assert_eq!(config.path(), PathBuf::from("./spinnaker.yml"));
        assert_eq!((config.constraints)("testing", &current), vec![default_constraint()]);
        assert!((config.notifications)("testing", &current).is_empty());
        assert!((config.verify_with)("testing", &current).is_empty());
        assert!((config.post_deploy)("testing", &current).is_empty());
    }

    #[test]
    fn test_builder() {
        let config = ProcessorConfig::default()
            .with_dir("/tmp/app")
            .with_file_name("delivery.yml")
            .with_app_name("myapp")
            .with_service_account("me@example.com")
            .with_notifications(|env, _| vec![Value::String(format!("#{env}-alerts"))]);

        assert_eq!(config.path(), PathBuf::from("/tmp/app/delivery.yml"));
        assert_eq!(config.app_name, "myapp");
        assert_eq!(
            (config.notifications)("prod", &DeliveryConfig::default()),
            vec![Value::String(String::from("#prod-alerts"))]
        );
    }
}

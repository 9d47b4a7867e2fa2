//! Configuration types for ipseek
//!
//! The configuration is loaded once at startup, validated, and then shared
//! read-only (behind an `Arc`) with every dispatch. Nothing in the core
//! mutates it afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::retry::{MAX_ATTEMPTS, RETRY_DELAY};

/// Main ipseek configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Update groups, in declaration order
    #[serde(default)]
    pub update_groups: Vec<UpdateGroup>,

    /// Optional dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl Configuration {
    /// Create a configuration from a list of groups with default dispatch settings
    pub fn new(update_groups: Vec<UpdateGroup>) -> Self {
        Self {
            update_groups,
            dispatch: DispatchConfig::default(),
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(raw: &str) -> crate::Result<Self> {
        let config: Configuration = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML configuration file
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.update_groups.is_empty() {
            return Err(crate::Error::config("No update groups configured"));
        }

        let mut seen = HashSet::new();
        for group in &self.update_groups {
            group.validate()?;
            if !seen.insert(group.name.as_str()) {
                warn!(
                    "Update group \"{}\" is declared more than once, only the first one is used",
                    group.name
                );
            }
        }

        self.dispatch.validate()
    }

    /// Find a group by name (first match wins)
    pub fn find_group(&self, name: &str) -> Option<&UpdateGroup> {
        self.update_groups.iter().find(|g| g.name == name)
    }
}

/// A named, ordered collection of objects reconciled together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGroup {
    /// Dispatch key
    pub name: String,

    /// Managed objects
    #[serde(default)]
    pub objects: Vec<ManagedObject>,
}

impl UpdateGroup {
    /// Create a new group
    pub fn new(name: impl Into<String>, objects: Vec<ManagedObject>) -> Self {
        Self {
            name: name.into(),
            objects,
        }
    }

    fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() {
            return Err(crate::Error::config("Update group name cannot be empty"));
        }
        for object in &self.objects {
            if object.name.is_empty() {
                return Err(crate::Error::config(format!(
                    "Object name cannot be empty (group \"{}\")",
                    self.name
                )));
            }
            if object.object_type.is_empty() {
                return Err(crate::Error::config(format!(
                    "Object {}@{} has no type",
                    object.name, self.name
                )));
            }
        }
        Ok(())
    }
}

/// One remote resource to reconcile
///
/// `configuration` is opaque to the core; its keys are defined by the
/// backend driver selected through `object_type`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedObject {
    /// Object name (for logging)
    pub name: String,

    /// Backend type identifier, the registry key
    #[serde(rename = "type")]
    pub object_type: String,

    /// Driver-specific settings
    #[serde(default)]
    pub configuration: HashMap<String, String>,
}

impl ManagedObject {
    /// Create a new managed object with an empty configuration
    pub fn new(name: impl Into<String>, object_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object_type: object_type.into(),
            configuration: HashMap::new(),
        }
    }

    /// Add a configuration setting
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }
}

// The configuration bag routinely carries credentials.
impl std::fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.configuration.keys().collect();
        keys.sort();
        f.debug_struct("ManagedObject")
            .field("name", &self.name)
            .field("object_type", &self.object_type)
            .field("configuration_keys", &keys)
            .finish()
    }
}

/// Dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum reconciliation attempts per object
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts (in seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Upper bound on concurrently running reconciliation tasks
    ///
    /// `None` leaves dispatch unbounded: a group with N objects yields N
    /// concurrent tasks.
    #[serde(default)]
    pub max_concurrent_tasks: Option<usize>,

    /// Timeout applied to every outbound backend request (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl DispatchConfig {
    /// Validate the dispatch settings
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_attempts == 0 {
            return Err(crate::Error::config("dispatch.max_attempts must be >= 1"));
        }
        if self.max_concurrent_tasks == Some(0) {
            return Err(crate::Error::config(
                "dispatch.max_concurrent_tasks must be >= 1 when set",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config(
                "dispatch.request_timeout_secs must be >= 1",
            ));
        }
        Ok(())
    }

    /// Outbound request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            max_concurrent_tasks: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    MAX_ATTEMPTS
}

fn default_retry_delay_secs() -> u64 {
    RETRY_DELAY.as_secs()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
update_groups:
  - name: vpn1
    objects:
      - name: conn-a
        type: openstack_ipsec_site_connection
        configuration:
          user: admin
          domain: Default
          password: secret
          authURL: https://keystone.example.net/v3/auth/tokens
          url: https://neutron.example.net/v2.0/vpn/ipsec-site-connections
          id: 0a1b2c
  - name: vpn2
    objects: []
"#;

    #[test]
    fn parses_groups_and_objects() {
        let config = Configuration::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(config.update_groups.len(), 2);
        let group = config.find_group("vpn1").unwrap();
        assert_eq!(group.objects.len(), 1);

        let object = &group.objects[0];
        assert_eq!(object.name, "conn-a");
        assert_eq!(object.object_type, "openstack_ipsec_site_connection");
        assert_eq!(object.configuration["authURL"], "https://keystone.example.net/v3/auth/tokens");
    }

    #[test]
    fn dispatch_defaults_apply_when_section_absent() {
        let config = Configuration::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(config.dispatch.max_attempts, 5);
        assert_eq!(config.dispatch.retry_delay_secs, 5);
        assert_eq!(config.dispatch.max_concurrent_tasks, None);
        assert_eq!(config.dispatch.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn dispatch_section_overrides_defaults() {
        let raw = format!(
            "{}dispatch:\n  max_attempts: 2\n  max_concurrent_tasks: 4\n",
            SAMPLE
        );
        let config = Configuration::from_yaml_str(&raw).unwrap();

        assert_eq!(config.dispatch.max_attempts, 2);
        assert_eq!(config.dispatch.max_concurrent_tasks, Some(4));
        assert_eq!(config.dispatch.retry_delay_secs, 5);
    }

    #[test]
    fn first_matching_group_wins() {
        let config = Configuration::new(vec![
            UpdateGroup::new("dup", vec![ManagedObject::new("first", "t")]),
            UpdateGroup::new("dup", vec![ManagedObject::new("second", "t")]),
        ]);

        assert!(config.validate().is_ok());
        assert_eq!(config.find_group("dup").unwrap().objects[0].name, "first");
        assert!(config.find_group("missing").is_none());
    }

    #[test]
    fn rejects_invalid_configurations() {
        assert!(Configuration::default().validate().is_err());

        let unnamed = Configuration::new(vec![UpdateGroup::new("", vec![])]);
        assert!(unnamed.validate().is_err());

        let untyped = Configuration::new(vec![UpdateGroup::new(
            "g",
            vec![ManagedObject::new("o", "")],
        )]);
        assert!(untyped.validate().is_err());

        let mut zero_attempts = Configuration::new(vec![UpdateGroup::new("g", vec![])]);
        zero_attempts.dispatch.max_attempts = 0;
        assert!(zero_attempts.validate().is_err());

        let mut zero_limit = Configuration::new(vec![UpdateGroup::new("g", vec![])]);
        zero_limit.dispatch.max_concurrent_tasks = Some(0);
        assert!(zero_limit.validate().is_err());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = Configuration::from_yaml_str("update_groups: [ {name: ");
        assert!(matches!(result, Err(crate::Error::Yaml(_))));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipseek.yml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Configuration::load(&path).unwrap();
        assert!(config.find_group("vpn2").is_some());

        let missing = Configuration::load(dir.path().join("absent.yml"));
        assert!(matches!(missing, Err(crate::Error::Io(_))));
    }

    #[test]
    fn debug_output_hides_setting_values() {
        let object = ManagedObject::new("conn-a", "openstack_ipsec_site_connection")
            .with_setting("password", "hunter2");

        let debug_str = format!("{:?}", object);
        assert!(debug_str.contains("password"));
        assert!(!debug_str.contains("hunter2"));
    }
}

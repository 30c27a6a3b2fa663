//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::job::WaitSettings;
use crate::request::{
    DEFAULT_DISPLAY_NAME_PREFIX, NetworkRefs, ProvisioningRequest, RequestError, ResourceRef,
};
use crate::user_data::{UserDataSourceError, load_user_data};

/// Deploy step configuration derived from configuration files, environment
/// variables, and CLI flags.
///
/// Every resource can be given either by identifier or by name; when both
/// are set the identifier wins and no lookup is made.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "CLOUDSTACK",
    discovery(
        app_name = "cloudstack-deploy",
        env_var = "CLOUDSTACK_DEPLOY_CONFIG_PATH",
        config_file_name = "cloudstack-deploy.toml",
        dotfile_name = ".cloudstack-deploy.toml",
        project_file_name = "cloudstack-deploy.toml"
    )
)]
pub struct DeployConfig {
    /// Service offering name (for example `Small Instance`).
    pub service_offering: Option<String>,
    /// Service offering identifier.
    pub service_offering_id: Option<String>,
    /// Optional disk offering name.
    pub disk_offering: Option<String>,
    /// Optional disk offering identifier.
    pub disk_offering_id: Option<String>,
    /// Zone name.
    pub zone: Option<String>,
    /// Zone identifier.
    pub zone_id: Option<String>,
    /// Template name, resolved among executable templates of the zone.
    pub template: Option<String>,
    /// Template identifier.
    pub template_id: Option<String>,
    /// Comma-separated network names.
    pub networks: Option<String>,
    /// Comma-separated network identifiers.
    pub network_ids: Option<String>,
    /// Hypervisor tag (for example `KVM`).
    pub hypervisor: String,
    /// Inline user data template.
    pub user_data: Option<String>,
    /// Path to a user data template file.
    pub user_data_file: Option<String>,
    /// Name exposed to the user data template as `name`.
    pub template_name: Option<String>,
    /// Prefix for the temporary virtual machine name.
    #[ortho_config(default = DEFAULT_DISPLAY_NAME_PREFIX.to_owned())]
    pub display_name_prefix: String,
    /// Seconds to wait for an async job before giving up.
    #[ortho_config(default = 300)]
    pub state_timeout_secs: u64,
    /// Seconds between async job status queries.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to cloudstack-deploy.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|text| text.trim().is_empty())
}

fn split_list(value: Option<&str>) -> Vec<&str> {
    value
        .map(|text| text.split(',').collect())
        .unwrap_or_default()
}

impl DeployConfig {
    fn require_one_of(
        id: Option<&str>,
        name: Option<&str>,
        metadata: &FieldMetadata,
    ) -> Result<(), ConfigError> {
        if is_blank(id) && is_blank(name) {
            return Err(metadata.missing());
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("cloudstack-deploy")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages explain how to supply
    /// missing values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the service offering,
    /// template, zone or hypervisor is missing, and
    /// [`ConfigError::InvalidDuration`] when a wait duration is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_one_of(
            self.service_offering_id.as_deref(),
            self.service_offering.as_deref(),
            &FieldMetadata::new(
                "service offering",
                "CLOUDSTACK_SERVICE_OFFERING or CLOUDSTACK_SERVICE_OFFERING_ID",
                "service_offering",
            ),
        )?;
        Self::require_one_of(
            self.template_id.as_deref(),
            self.template.as_deref(),
            &FieldMetadata::new(
                "template",
                "CLOUDSTACK_TEMPLATE or CLOUDSTACK_TEMPLATE_ID",
                "template",
            ),
        )?;
        Self::require_one_of(
            self.zone_id.as_deref(),
            self.zone.as_deref(),
            &FieldMetadata::new("zone", "CLOUDSTACK_ZONE or CLOUDSTACK_ZONE_ID", "zone"),
        )?;
        if self.hypervisor.trim().is_empty() {
            return Err(
                FieldMetadata::new("hypervisor", "CLOUDSTACK_HYPERVISOR", "hypervisor").missing(),
            );
        }
        if self.state_timeout_secs == 0 {
            return Err(ConfigError::InvalidDuration("state_timeout_secs".to_owned()));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidDuration("poll_interval_secs".to_owned()));
        }
        Ok(())
    }

    /// Returns the async job wait settings.
    #[must_use]
    pub const fn wait_settings(&self) -> WaitSettings {
        WaitSettings::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.state_timeout_secs),
        )
    }

    /// Builds a [`ProvisioningRequest`] from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails or the user data file
    /// cannot be loaded.
    pub fn as_request(&self) -> Result<ProvisioningRequest, ConfigError> {
        self.validate()?;
        let user_data = load_user_data(self.user_data.as_deref(), self.user_data_file.as_deref())?;
        let request = ProvisioningRequest::builder()
            .service_offering(ResourceRef::from_parts(
                self.service_offering_id.as_deref(),
                self.service_offering.as_deref(),
            ))
            .disk_offering(ResourceRef::from_parts(
                self.disk_offering_id.as_deref(),
                self.disk_offering.as_deref(),
            ))
            .zone(ResourceRef::from_parts(
                self.zone_id.as_deref(),
                self.zone.as_deref(),
            ))
            .template(ResourceRef::from_parts(
                self.template_id.as_deref(),
                self.template.as_deref(),
            ))
            .networks(NetworkRefs::from_parts(
                split_list(self.network_ids.as_deref()),
                split_list(self.networks.as_deref()),
            ))
            .hypervisor(&self.hypervisor)
            .user_data(user_data)
            .template_name(self.template_name.clone().unwrap_or_default())
            .display_name_prefix(&self.display_name_prefix)
            .wait(self.wait_settings())
            .build()?;
        Ok(request)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a wait duration of zero seconds.
    #[error("{0} must be greater than zero")]
    InvalidDuration(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Surfaces user data loading failures.
    #[error(transparent)]
    UserData(#[from] UserDataSourceError),
    /// Surfaces request validation failures.
    #[error("invalid provisioning request: {0}")]
    Request(#[from] RequestError),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

//! Input model for the deploy step.

use thiserror::Error;

use crate::job::WaitSettings;

/// Default prefix for the temporary virtual machine display name.
pub const DEFAULT_DISPLAY_NAME_PREFIX: &str = "cloudstack-deploy";

/// Reference to a single control-plane resource.
///
/// A reference is either absent, a display name that still needs resolving,
/// or an identifier that can be sent to the control plane as is.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum ResourceRef {
    /// Neither an identifier nor a name was supplied.
    #[default]
    Unset,
    /// Display name to resolve before use.
    Name(String),
    /// Identifier known up front.
    Id(String),
}

impl ResourceRef {
    /// Builds a reference from optional identifier and name inputs.
    ///
    /// A non-blank identifier takes precedence over the name. Blank inputs
    /// count as absent.
    #[must_use]
    pub fn from_parts(id: Option<&str>, name: Option<&str>) -> Self {
        let trimmed_id = id.map(str::trim).filter(|value| !value.is_empty());
        let trimmed_name = name.map(str::trim).filter(|value| !value.is_empty());
        match (trimmed_id, trimmed_name) {
            (Some(value), _) => Self::Id(value.to_owned()),
            (None, Some(value)) => Self::Name(value.to_owned()),
            (None, None) => Self::Unset,
        }
    }
}

/// Guest networks attached to the new virtual machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NetworkRefs {
    /// Network names resolved one by one, keeping their order.
    Names(Vec<String>),
    /// Network identifiers known up front.
    Ids(Vec<String>),
}

impl Default for NetworkRefs {
    fn default() -> Self {
        Self::Names(Vec::new())
    }
}

impl NetworkRefs {
    /// Builds network references; a non-empty identifier list wins over
    /// names. Blank entries are dropped.
    #[must_use]
    pub fn from_parts<I, N>(ids: I, names: N) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        let trimmed_ids = non_blank(ids);
        if trimmed_ids.is_empty() {
            Self::Names(non_blank(names))
        } else {
            Self::Ids(trimmed_ids)
        }
    }

    /// Returns `true` when no network was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Names(values) | Self::Ids(values) => values.is_empty(),
        }
    }
}

fn non_blank<I>(values: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| value.as_ref().trim().to_owned())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Errors raised while building a [`ProvisioningRequest`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// Raised when a required field is empty.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Everything the deploy step needs to create one virtual machine.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProvisioningRequest {
    /// Compute offering.
    pub service_offering: ResourceRef,
    /// Optional disk offering.
    pub disk_offering: ResourceRef,
    /// Target zone.
    pub zone: ResourceRef,
    /// Boot template, looked up within the zone.
    pub template: ResourceRef,
    /// Guest networks.
    pub networks: NetworkRefs,
    /// Hypervisor tag passed through to the deploy call.
    pub hypervisor: String,
    /// User data template; empty when no user data is sent.
    pub user_data: String,
    /// Name exposed to the user data template as `name`.
    pub template_name: String,
    /// Prefix for the temporary display name.
    pub display_name_prefix: String,
    /// Poll cadence and timeout for async jobs.
    pub wait: WaitSettings,
}

impl ProvisioningRequest {
    /// Starts a builder for a [`ProvisioningRequest`].
    #[must_use]
    pub fn builder() -> ProvisioningRequestBuilder {
        ProvisioningRequestBuilder::new()
    }
}

/// Builder for [`ProvisioningRequest`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProvisioningRequestBuilder {
    request: ProvisioningRequest,
}

impl ProvisioningRequestBuilder {
    /// Creates a builder with default wait settings and display name prefix.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request: ProvisioningRequest {
                display_name_prefix: DEFAULT_DISPLAY_NAME_PREFIX.to_owned(),
                ..ProvisioningRequest::default()
            },
        }
    }

    /// Sets the service offering.
    #[must_use]
    pub fn service_offering(mut self, value: ResourceRef) -> Self {
        self.request.service_offering = value;
        self
    }

    /// Sets the disk offering.
    #[must_use]
    pub fn disk_offering(mut self, value: ResourceRef) -> Self {
        self.request.disk_offering = value;
        self
    }

    /// Sets the zone.
    #[must_use]
    pub fn zone(mut self, value: ResourceRef) -> Self {
        self.request.zone = value;
        self
    }

    /// Sets the template.
    #[must_use]
    pub fn template(mut self, value: ResourceRef) -> Self {
        self.request.template = value;
        self
    }

    /// Sets the networks.
    #[must_use]
    pub fn networks(mut self, value: NetworkRefs) -> Self {
        self.request.networks = value;
        self
    }

    /// Sets the hypervisor tag.
    #[must_use]
    pub fn hypervisor(mut self, value: impl Into<String>) -> Self {
        self.request.hypervisor = value.into();
        self
    }

    /// Sets the user data template.
    #[must_use]
    pub fn user_data(mut self, value: impl Into<String>) -> Self {
        self.request.user_data = value.into();
        self
    }

    /// Sets the name exposed to the user data template.
    #[must_use]
    pub fn template_name(mut self, value: impl Into<String>) -> Self {
        self.request.template_name = value.into();
        self
    }

    /// Overrides the display name prefix.
    #[must_use]
    pub fn display_name_prefix(mut self, value: impl Into<String>) -> Self {
        self.request.display_name_prefix = value.into();
        self
    }

    /// Overrides the async job wait settings.
    #[must_use]
    pub const fn wait(mut self, value: WaitSettings) -> Self {
        self.request.wait = value;
        self
    }

    /// Builds the request, trimming the hypervisor and display name prefix.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when the display name prefix is
    /// blank or a wait duration is zero.
    pub fn build(mut self) -> Result<ProvisioningRequest, RequestError> {
        self.request.hypervisor = self.request.hypervisor.trim().to_owned();
        self.request.display_name_prefix = self.request.display_name_prefix.trim().to_owned();
        if self.request.display_name_prefix.is_empty() {
            return Err(RequestError::Validation("display_name_prefix".to_owned()));
        }
        if self.request.wait.poll_interval.is_zero() {
            return Err(RequestError::Validation("poll_interval".to_owned()));
        }
        if self.request.wait.timeout.is_zero() {
            return Err(RequestError::Validation("timeout".to_owned()));
        }
        Ok(self.request)
    }
}

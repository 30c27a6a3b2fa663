//! Name-to-identifier resolution for the resources a deploy call needs.

use thiserror::Error;
use tracing::debug;

use crate::control_plane::{ControlPlane, LookupFilters, ResourceKind};
use crate::request::{NetworkRefs, ProvisioningRequest, ResourceRef};

/// Raised when a name cannot be resolved to an identifier.
#[derive(Debug, Error)]
#[error("failed to resolve {kind} id for '{name}': {source}")]
pub struct ResolutionError<E>
where
    E: std::error::Error + 'static,
{
    /// Kind of resource being resolved.
    pub kind: ResourceKind,
    /// Name that failed to resolve.
    pub name: String,
    /// Client error.
    #[source]
    pub source: E,
}

/// Identifiers for every resource of a [`ProvisioningRequest`].
///
/// Fields left unset in the request stay empty and are passed through to
/// the deploy call unchanged.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResolvedReferences {
    /// Service offering identifier.
    pub service_offering_id: String,
    /// Disk offering identifier.
    pub disk_offering_id: String,
    /// Zone identifier.
    pub zone_id: String,
    /// Template identifier.
    pub template_id: String,
    /// Network identifiers in request order.
    pub network_ids: Vec<String>,
}

/// Filters used when resolving a zone by name.
#[must_use]
pub fn zone_filters() -> LookupFilters {
    LookupFilters::new().with("available", "true")
}

/// Filters used when resolving a template by name within `zone_id`.
///
/// The zone constraint is left out when no zone identifier is known.
#[must_use]
pub fn template_filters(zone_id: &str) -> LookupFilters {
    let filters = LookupFilters::new().with("templatefilter", "executable");
    if zone_id.is_empty() {
        filters
    } else {
        filters.with("zoneid", zone_id)
    }
}

/// Resolves resource names through a [`ControlPlane`].
#[derive(Debug)]
pub struct Resolver<'a, C: ?Sized> {
    plane: &'a C,
}

impl<'a, C> Resolver<'a, C>
where
    C: ControlPlane + ?Sized,
{
    /// Creates a resolver backed by `plane`.
    #[must_use]
    pub const fn new(plane: &'a C) -> Self {
        Self { plane }
    }

    /// Resolves one name with a single remote lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError`] when the control plane cannot resolve the
    /// name, including when it is ambiguous.
    pub async fn resolve(
        &self,
        name: &str,
        kind: ResourceKind,
        filters: &LookupFilters,
    ) -> Result<String, ResolutionError<C::Error>> {
        let id = self
            .plane
            .resolve_name_to_id(name, kind, filters)
            .await
            .map_err(|source| ResolutionError {
                kind,
                name: name.to_owned(),
                source,
            })?;
        debug!(
            %kind,
            api_type = kind.api_name(),
            resource = name,
            id = %id,
            "resolved resource name"
        );
        Ok(id)
    }

    async fn resolve_ref(
        &self,
        reference: &ResourceRef,
        kind: ResourceKind,
        filters: &LookupFilters,
    ) -> Result<String, ResolutionError<C::Error>> {
        match reference {
            ResourceRef::Unset => Ok(String::new()),
            ResourceRef::Id(id) => Ok(id.clone()),
            ResourceRef::Name(name) => self.resolve(name, kind, filters).await,
        }
    }

    /// Resolves every name in `request`, stopping at the first failure.
    ///
    /// Identifiers given up front are used without a lookup. The zone is
    /// resolved before the template because template lookups are scoped to
    /// the zone. Networks are resolved one by one, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns the [`ResolutionError`] of the first lookup that fails.
    pub async fn resolve_all(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<ResolvedReferences, ResolutionError<C::Error>> {
        let no_filters = LookupFilters::new();
        let mut resolved = ResolvedReferences {
            service_offering_id: self
                .resolve_ref(
                    &request.service_offering,
                    ResourceKind::ServiceOffering,
                    &no_filters,
                )
                .await?,
            ..ResolvedReferences::default()
        };
        resolved.disk_offering_id = self
            .resolve_ref(&request.disk_offering, ResourceKind::DiskOffering, &no_filters)
            .await?;
        resolved.zone_id = self
            .resolve_ref(&request.zone, ResourceKind::Zone, &zone_filters())
            .await?;
        resolved.template_id = self
            .resolve_ref(
                &request.template,
                ResourceKind::Template,
                &template_filters(&resolved.zone_id),
            )
            .await?;
        resolved.network_ids = self.resolve_networks(&request.networks).await?;
        Ok(resolved)
    }

    async fn resolve_networks(
        &self,
        networks: &NetworkRefs,
    ) -> Result<Vec<String>, ResolutionError<C::Error>> {
        match networks {
            NetworkRefs::Ids(ids) => Ok(ids.clone()),
            NetworkRefs::Names(names) => {
                let no_filters = LookupFilters::new();
                let mut ids = Vec::with_capacity(names.len());
                for name in names {
                    ids.push(
                        self.resolve(name, ResourceKind::Network, &no_filters)
                            .await?,
                    );
                }
                Ok(ids)
            }
        }
    }
}

#[cfg(test)]
mod tests;

//! Unit tests for resource resolution.

use super::*;
use crate::control_plane::ResourceKind::{DiskOffering, Network, ServiceOffering, Template, Zone};
use crate::request::{NetworkRefs, ProvisioningRequest, ResourceRef};
use crate::test_support::{ScriptedControlPlane, ScriptedControlPlaneError};
use rstest::{fixture, rstest};

fn name(value: &str) -> ResourceRef {
    ResourceRef::Name(value.to_owned())
}

fn id(value: &str) -> ResourceRef {
    ResourceRef::Id(value.to_owned())
}

#[fixture]
fn plane() -> ScriptedControlPlane {
    ScriptedControlPlane::new()
        .register(ServiceOffering, "small", "so-1")
        .register(DiskOffering, "ssd-20", "do-1")
        .register(Zone, "zone1", "zone-1")
        .register(Template, "ubuntu", "tmpl-1")
        .register(Network, "net-a", "net-1")
        .register(Network, "net-b", "net-2")
}

#[rstest]
#[tokio::test]
async fn resolves_every_name(plane: ScriptedControlPlane) {
    let request = ProvisioningRequest::builder()
        .service_offering(name("small"))
        .disk_offering(name("ssd-20"))
        .zone(name("zone1"))
        .template(name("ubuntu"))
        .networks(NetworkRefs::Names(vec!["net-a".to_owned(), "net-b".to_owned()]))
        .build()
        .expect("request");

    let resolved = Resolver::new(&plane)
        .resolve_all(&request)
        .await
        .expect("names should resolve");

    assert_eq!(
        resolved,
        ResolvedReferences {
            service_offering_id: "so-1".to_owned(),
            disk_offering_id: "do-1".to_owned(),
            zone_id: "zone-1".to_owned(),
            template_id: "tmpl-1".to_owned(),
            network_ids: vec!["net-1".to_owned(), "net-2".to_owned()],
        }
    );
}

#[rstest]
#[tokio::test]
async fn identifiers_skip_lookups(plane: ScriptedControlPlane) {
    let request = ProvisioningRequest::builder()
        .service_offering(id("so-9"))
        .disk_offering(id("do-9"))
        .zone(id("zone-9"))
        .template(id("tmpl-9"))
        .networks(NetworkRefs::Ids(vec!["net-9".to_owned()]))
        .build()
        .expect("request");

    let resolved = Resolver::new(&plane)
        .resolve_all(&request)
        .await
        .expect("identifiers pass through");

    assert!(plane.lookups().is_empty(), "no lookup expected");
    assert_eq!(resolved.template_id, "tmpl-9");
    assert_eq!(resolved.network_ids, vec!["net-9".to_owned()]);
}

#[rstest]
#[tokio::test]
async fn unset_references_stay_empty(plane: ScriptedControlPlane) {
    let request = ProvisioningRequest::builder().build().expect("request");

    let resolved = Resolver::new(&plane)
        .resolve_all(&request)
        .await
        .expect("nothing to resolve");

    assert_eq!(resolved, ResolvedReferences::default());
    assert!(plane.lookups().is_empty());
}

#[rstest]
#[tokio::test]
async fn template_lookup_is_scoped_to_resolved_zone(plane: ScriptedControlPlane) {
    let request = ProvisioningRequest::builder()
        .zone(name("zone1"))
        .template(name("ubuntu"))
        .build()
        .expect("request");

    Resolver::new(&plane)
        .resolve_all(&request)
        .await
        .expect("names should resolve");

    let lookups = plane.lookups();
    let kinds: Vec<_> = lookups.iter().map(|lookup| lookup.kind).collect();
    assert_eq!(kinds, vec![Zone, Template]);
    let zone = lookups.first().expect("zone lookup");
    assert_eq!(zone.filters.get("available"), Some("true"));
    let template = lookups.get(1).expect("template lookup");
    assert_eq!(template.filters.get("zoneid"), Some("zone-1"));
    assert_eq!(template.filters.get("templatefilter"), Some("executable"));
}

#[rstest]
#[tokio::test]
async fn template_lookup_uses_given_zone_id(plane: ScriptedControlPlane) {
    let request = ProvisioningRequest::builder()
        .zone(id("zone-7"))
        .template(name("ubuntu"))
        .build()
        .expect("request");

    Resolver::new(&plane)
        .resolve_all(&request)
        .await
        .expect("template should resolve");

    let lookups = plane.lookups();
    assert_eq!(lookups.len(), 1);
    let template = lookups.first().expect("template lookup");
    assert_eq!(template.filters.get("zoneid"), Some("zone-7"));
}

#[rstest]
fn template_filters_omit_unknown_zone() {
    let filters = template_filters("");
    assert_eq!(filters.get("zoneid"), None);
    assert_eq!(filters.get("templatefilter"), Some("executable"));
}

#[rstest]
#[tokio::test]
async fn failure_stops_before_later_kinds(plane: ScriptedControlPlane) {
    let request = ProvisioningRequest::builder()
        .service_offering(name("small"))
        .zone(name("atlantis"))
        .template(name("ubuntu"))
        .build()
        .expect("request");

    let err = Resolver::new(&plane)
        .resolve_all(&request)
        .await
        .expect_err("unknown zone should fail");

    assert_eq!(err.kind, Zone);
    assert_eq!(err.name, "atlantis");
    assert_eq!(
        err.source,
        ScriptedControlPlaneError::UnknownResource {
            kind: Zone,
            name: "atlantis".to_owned(),
        }
    );
    assert!(plane.lookups().iter().all(|lookup| lookup.kind != Template));
}

#[rstest]
#[tokio::test]
async fn network_failure_aborts_remaining_networks(plane: ScriptedControlPlane) {
    let request = ProvisioningRequest::builder()
        .networks(NetworkRefs::Names(vec![
            "net-a".to_owned(),
            "net-missing".to_owned(),
            "net-b".to_owned(),
        ]))
        .build()
        .expect("request");

    let err = Resolver::new(&plane)
        .resolve_all(&request)
        .await
        .expect_err("second network should fail");

    assert_eq!(err.kind, Network);
    assert_eq!(
        err.to_string(),
        "failed to resolve network id for 'net-missing': no network named 'net-missing'"
    );
    let names: Vec<_> = plane.lookups().into_iter().map(|lookup| lookup.name).collect();
    assert_eq!(names, vec!["net-a".to_owned(), "net-missing".to_owned()]);
}

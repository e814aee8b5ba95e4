//! Headless Service generation.
//!
//! Memcached clients shard across pods themselves, so the Service carries no
//! cluster IP and only publishes per-pod DNS records.

use k8s_openapi::api::core::v1::{Service, ServicePort};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use crate::crd::Memcached;
use crate::resources::common::{apply_owned_metadata, exposed_ports, standard_labels};
use crate::resources::{BuildContext, Dependent};

impl Dependent for Service {
    const KIND: &'static str = "Service";

    fn construct(resource: &Memcached, _ctx: &BuildContext<'_>, target: &mut Self) {
        let spec = &resource.spec;

        apply_owned_metadata(&mut target.metadata, resource);
        target.metadata.annotations = spec.service_annotations().cloned();

        let svc = target.spec.get_or_insert_with(Default::default);
        svc.cluster_ip = Some("None".to_string());
        svc.selector = Some(standard_labels(&resource.name_any()));
        svc.ports = Some(
            exposed_ports(spec)
                .into_iter()
                .map(|(name, port)| ServicePort {
                    name: Some(name.to_string()),
                    port,
                    target_port: Some(IntOrString::String(name.to_string())),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                })
                .collect(),
        );
    }
}

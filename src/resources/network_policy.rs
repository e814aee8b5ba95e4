//! NetworkPolicy generation.
//!
//! Restricts ingress to the exposed ports. Egress is left unrestricted.

use k8s_openapi::api::networking::v1::{NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPort};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use crate::crd::Memcached;
use crate::resources::common::{apply_owned_metadata, exposed_ports, standard_selector};
use crate::resources::{BuildContext, Dependent};

impl Dependent for NetworkPolicy {
    const KIND: &'static str = "NetworkPolicy";

    fn construct(resource: &Memcached, _ctx: &BuildContext<'_>, target: &mut Self) {
        let spec = &resource.spec;

        apply_owned_metadata(&mut target.metadata, resource);

        let sources = spec
            .enabled_network_policy()
            .map(|np| np.allowed_sources.clone())
            .unwrap_or_default();
        let ports = exposed_ports(spec)
            .into_iter()
            .map(|(_, port)| NetworkPolicyPort {
                port: Some(IntOrString::Int(port)),
                protocol: Some("TCP".to_string()),
                end_port: None,
            })
            .collect();

        let np = target.spec.get_or_insert_with(Default::default);
        np.pod_selector = Some(standard_selector(&resource.name_any()));
        np.policy_types = Some(vec!["Ingress".to_string()]);
        np.ingress = Some(vec![NetworkPolicyIngressRule {
            // No peers means any source
            from: if sources.is_empty() {
                None
            } else {
                Some(sources)
            },
            ports: Some(ports),
        }]);
        np.egress = None;
    }
}

//! HorizontalPodAutoscaler generation.

use k8s_openapi::api::autoscaling::v2::{CrossVersionObjectReference, HorizontalPodAutoscaler};

use crate::crd::Memcached;
use crate::resources::common::apply_owned_metadata;
use crate::resources::{BuildContext, Dependent};

impl Dependent for HorizontalPodAutoscaler {
    const KIND: &'static str = "HorizontalPodAutoscaler";

    fn construct(resource: &Memcached, _ctx: &BuildContext<'_>, target: &mut Self) {
        apply_owned_metadata(&mut target.metadata, resource);

        let autoscaling = resource.spec.enabled_autoscaling();
        let hpa = target.spec.get_or_insert_with(Default::default);
        hpa.scale_target_ref = CrossVersionObjectReference {
            api_version: Some("apps/v1".to_string()),
            kind: "Deployment".to_string(),
            name: Self::object_name(resource),
        };
        hpa.min_replicas = autoscaling.and_then(|a| a.min_replicas);
        hpa.max_replicas = autoscaling.map(|a| a.max_replicas).unwrap_or_default();
        hpa.metrics = autoscaling.and_then(|a| a.metrics.clone());
        hpa.behavior = autoscaling.and_then(|a| a.behavior.clone());
    }
}

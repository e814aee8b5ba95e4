//! PodDisruptionBudget generation.

use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use crate::crd::Memcached;
use crate::resources::common::{apply_owned_metadata, standard_selector};
use crate::resources::{BuildContext, Dependent};

impl Dependent for PodDisruptionBudget {
    const KIND: &'static str = "PodDisruptionBudget";

    /// Exactly one of `minAvailable` and `maxUnavailable` is set. An explicit
    /// `minAvailable` wins, then `maxUnavailable`, then the default minimum.
    fn construct(resource: &Memcached, ctx: &BuildContext<'_>, target: &mut Self) {
        apply_owned_metadata(&mut target.metadata, resource);

        let config = resource.spec.enabled_pdb();
        let pdb = target.spec.get_or_insert_with(Default::default);
        pdb.selector = Some(standard_selector(&resource.name_any()));

        let min_available = config.and_then(|c| c.min_available.clone());
        let max_unavailable = config.and_then(|c| c.max_unavailable.clone());

        match (min_available, max_unavailable) {
            (Some(min), _) => {
                pdb.min_available = Some(min);
                pdb.max_unavailable = None;
            }
            (None, Some(max)) => {
                pdb.min_available = None;
                pdb.max_unavailable = Some(max);
            }
            (None, None) => {
                pdb.min_available = Some(IntOrString::Int(ctx.defaults.pdb_min_available));
                pdb.max_unavailable = None;
            }
        }
    }
}

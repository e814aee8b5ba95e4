//! Reconciliation loop for Memcached.
//!
//! One pass runs in a fixed order: resolve referenced secrets, apply the
//! Deployment, apply or delete the optional dependents, then derive and
//! write status. Dependents owned through garbage collection need no
//! finalizer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::{
    Api, ResourceExt,
    api::{DeleteParams, DynamicObject, Patch, PatchParams},
    runtime::controller::Action,
};
use tracing::{debug, error, info, warn};

use crate::{
    controller::{
        apply::{Applied, apply_dependent, delete_dependent},
        context::{Context, FIELD_MANAGER},
        error::{Error, Result},
        secrets::resolve_secrets,
        status::{DeploymentObservation, StatusInputs, build_status, desired_replicas},
    },
    crd::Memcached,
    resources::{
        BuildContext, Dependent,
        common::{foreign_controller, is_controlled_by},
        service_monitor::{SERVICE_MONITOR_KIND, build_service_monitor},
    },
};

/// Periodic resync interval
const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Reconcile a Memcached
pub async fn reconcile(obj: Arc<Memcached>, ctx: Arc<Context>) -> Result<Action> {
    let start_time = Instant::now();
    let name = obj.name_any();
    let namespace = obj
        .namespace()
        .ok_or_else(|| Error::MissingField("metadata.namespace".to_string()))?;

    debug!(name = %name, namespace = %namespace, "Reconciling Memcached");

    if obj.metadata.deletion_timestamp.is_some() {
        debug!(name = %name, "Being deleted, dependents are garbage collected");
        return Ok(Action::await_change());
    }

    // Secrets
    let secret_api: Api<Secret> = Api::namespaced(ctx.client.clone(), &namespace);
    let secrets = resolve_secrets(&obj.spec, &secret_api).await?;
    if !secrets.missing.is_empty() {
        warn!(
            name = %name,
            missing = ?secrets.missing,
            "Referenced secrets not found"
        );
        ctx.publish_warning_event(
            &obj,
            "SecretNotFound",
            "ResolveSecrets",
            Some(format!(
                "Referenced secret(s) not found: {}",
                secrets.missing.join(", ")
            )),
        )
        .await;
    }

    let build_ctx = BuildContext::new(&ctx.defaults, &secrets.hash);

    // Workload first; nothing else is useful without it
    let deploy_api: Api<Deployment> = Api::namespaced(ctx.client.clone(), &namespace);
    let deployment = apply_dependent(&deploy_api, &obj, &build_ctx).await?;
    announce_created(&obj, &ctx, &namespace, &deployment).await;

    let mut failures = Vec::new();
    let spec = &obj.spec;

    let svc_api: Api<Service> = Api::namespaced(ctx.client.clone(), &namespace);
    record(
        &obj,
        &ctx,
        &namespace,
        apply_dependent(&svc_api, &obj, &build_ctx).await,
        &mut failures,
    )
    .await;

    let pdb_api: Api<PodDisruptionBudget> = Api::namespaced(ctx.client.clone(), &namespace);
    reconcile_optional(
        &obj,
        &ctx,
        &namespace,
        &pdb_api,
        &build_ctx,
        spec.enabled_pdb().is_some(),
        &mut failures,
    )
    .await;

    let hpa_api: Api<HorizontalPodAutoscaler> = Api::namespaced(ctx.client.clone(), &namespace);
    reconcile_optional(
        &obj,
        &ctx,
        &namespace,
        &hpa_api,
        &build_ctx,
        spec.autoscaling_active(),
        &mut failures,
    )
    .await;

    let np_api: Api<NetworkPolicy> = Api::namespaced(ctx.client.clone(), &namespace);
    reconcile_optional(
        &obj,
        &ctx,
        &namespace,
        &np_api,
        &build_ctx,
        spec.enabled_network_policy().is_some(),
        &mut failures,
    )
    .await;

    if let Err(e) = reconcile_service_monitor(&obj, &ctx, &namespace).await {
        failures.push(e);
    }

    // Status
    let observation = DeploymentObservation::from_deployment(&deployment.object);
    let inputs = StatusInputs {
        deployment: Some(observation),
        missing_secrets: &secrets.missing,
        autoscaling_active: spec.autoscaling_active(),
    };
    let status = build_status(
        &obj,
        &ctx.defaults,
        &inputs,
        &jiff::Timestamp::now().to_string(),
    );

    let api: Api<Memcached> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = serde_json::json!({ "status": status });
    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(Error::StatusPatch)?;

    if let Some(ref health_state) = ctx.health_state {
        let desired = desired_replicas(
            &obj,
            &ctx.defaults,
            Some(&observation),
            spec.autoscaling_active(),
        );
        health_state.metrics.record_reconcile(
            &namespace,
            &name,
            start_time.elapsed().as_secs_f64(),
        );
        health_state.metrics.set_resource_replicas(
            &namespace,
            &name,
            i64::from(desired),
            i64::from(observation.ready_replicas),
        );
        health_state.metrics.set_missing_secrets(
            &namespace,
            &name,
            i64::try_from(secrets.missing.len()).unwrap_or(i64::MAX),
        );
        health_state.touch_reconcile();
    }

    if !failures.is_empty() {
        return Err(Error::DependentApply(failures));
    }

    debug!(
        name = %name,
        ready = observation.ready_replicas,
        "Reconciled"
    );
    Ok(Action::requeue(RESYNC_INTERVAL))
}

/// Error policy for the controller
pub fn error_policy(obj: Arc<Memcached>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    if let Some(ref health_state) = ctx.health_state {
        health_state
            .metrics
            .record_error(&namespace, error.metric_label());
    }

    if error.is_not_found() {
        debug!(name = %name, "Resource not found (likely deleted)");
        return Action::await_change();
    }

    if error.is_retryable() {
        warn!(name = %name, error = %error, "Retryable error, will retry");
    } else {
        error!(name = %name, error = %error, "Non-retryable error");
    }
    Action::requeue(error.requeue_after())
}

async fn announce_created<K: Dependent>(
    obj: &Memcached,
    ctx: &Context,
    namespace: &str,
    applied: &Applied<K>,
) {
    if !applied.created {
        return;
    }
    info!(kind = K::KIND, name = %obj.name_any(), "Created dependent");
    if let Some(ref health_state) = ctx.health_state {
        health_state.metrics.record_created(namespace, K::KIND);
    }
    ctx.publish_normal_event(
        obj,
        "Created",
        "Reconciling",
        Some(format!("Created {} {}", K::KIND, K::object_name(obj))),
    )
    .await;
}

async fn record<K: Dependent>(
    obj: &Memcached,
    ctx: &Context,
    namespace: &str,
    result: Result<Applied<K>>,
    failures: &mut Vec<Error>,
) {
    match result {
        Ok(applied) => announce_created(obj, ctx, namespace, &applied).await,
        Err(e) => {
            warn!(kind = K::KIND, name = %obj.name_any(), error = %e, "Dependent apply failed");
            failures.push(e);
        }
    }
}

/// Apply `K` when its feature is on, delete it otherwise.
async fn reconcile_optional<K: Dependent>(
    obj: &Memcached,
    ctx: &Context,
    namespace: &str,
    api: &Api<K>,
    build_ctx: &BuildContext<'_>,
    enabled: bool,
    failures: &mut Vec<Error>,
) {
    if enabled {
        let result = apply_dependent(api, obj, build_ctx).await;
        record(obj, ctx, namespace, result, failures).await;
    } else if let Err(e) = delete_dependent(api, obj).await {
        warn!(kind = K::KIND, name = %obj.name_any(), error = %e, "Dependent delete failed");
        failures.push(e);
    }
}

/// Server-side apply the ServiceMonitor, or delete it when monitoring is off.
///
/// A ServiceMonitor of the same name controlled by someone else is left
/// untouched in both directions.
async fn reconcile_service_monitor(obj: &Memcached, ctx: &Context, namespace: &str) -> Result<()> {
    let Some(ar) = ctx.service_monitor.as_ref() else {
        if obj.spec.enabled_monitoring().is_some() {
            debug!(name = %obj.name_any(), "ServiceMonitor CRD not installed, skipping");
        }
        return Ok(());
    };

    let name = obj.name_any();
    let api: Api<DynamicObject> = Api::namespaced_with(ctx.client.clone(), namespace, ar);
    let wrap = |source| Error::Apply {
        kind: SERVICE_MONITOR_KIND,
        name: name.clone(),
        source,
    };

    let live = api.get_opt(&name).await.map_err(wrap)?;

    if obj.spec.enabled_monitoring().is_some() {
        if let Some(owner) = live
            .as_ref()
            .and_then(|l| foreign_controller(&l.metadata, obj))
        {
            return Err(Error::ForeignOwner {
                kind: SERVICE_MONITOR_KIND,
                name: name.clone(),
                owner: format!("{}/{}", owner.kind, owner.name),
            });
        }
        let monitor = build_service_monitor(obj);
        api.patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&monitor),
        )
        .await
        .map_err(wrap)?;
        return Ok(());
    }

    match live {
        Some(l) if is_controlled_by(&l.metadata, obj) => {
            match api.delete(&name, &DeleteParams::default()).await {
                Ok(_) => Ok(()),
                Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
                Err(e) => Err(wrap(e)),
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::controller::test_client::ApiServer;
    use crate::crd::{Defaults, MemcachedSpec};

    const DEPLOYMENTS: &str = "/apis/apps/v1/namespaces/apps/deployments";
    const DEPLOYMENT: &str = "/apis/apps/v1/namespaces/apps/deployments/web";
    const SERVICES: &str = "/api/v1/namespaces/apps/services";
    const SERVICE: &str = "/api/v1/namespaces/apps/services/web";
    const PDB: &str = "/apis/policy/v1/namespaces/apps/poddisruptionbudgets/web";
    const HPA: &str = "/apis/autoscaling/v2/namespaces/apps/horizontalpodautoscalers/web";
    const NETWORK_POLICY: &str = "/apis/networking.k8s.io/v1/namespaces/apps/networkpolicies/web";
    const STATUS: &str = "/apis/memcached.smoketurner.com/v1alpha1/namespaces/apps/memcacheds/web/status";

    fn resource() -> Memcached {
        let mut mc = Memcached::new("web", MemcachedSpec::default());
        mc.metadata.namespace = Some("apps".to_string());
        mc.metadata.uid = Some("uid-1".to_string());
        mc.metadata.generation = Some(1);
        mc
    }

    fn desired<K: Dependent>(mc: &Memcached) -> K {
        let mut object = K::default();
        object.meta_mut().name = Some("web".to_string());
        object.meta_mut().namespace = Some("apps".to_string());
        K::construct(mc, &BuildContext::new(&Defaults::STANDARD, ""), &mut object);
        object
    }

    fn context(server: &ApiServer) -> Arc<Context> {
        Arc::new(Context::new(server.client(), None, None))
    }

    fn optional_lookups() -> Vec<String> {
        vec![
            format!("GET {PDB}"),
            format!("GET {HPA}"),
            format!("GET {NETWORK_POLICY}"),
        ]
    }

    #[tokio::test]
    async fn test_status_written_when_service_fails() {
        let mc = resource();
        let server = ApiServer::new();
        server
            .fail("GET", DEPLOYMENT, 404)
            .reply("POST", DEPLOYMENTS, &desired::<Deployment>(&mc))
            .fail("GET", SERVICE, 404)
            .fail("POST", SERVICES, 500)
            .reply("PATCH", STATUS, &mc);

        let err = reconcile(Arc::new(mc), context(&server)).await.unwrap_err();
        match &err {
            Error::DependentApply(failures) => {
                assert_eq!(failures.len(), 1);
                assert!(matches!(failures[0], Error::Apply { kind: "Service", .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_retryable());

        let mut expected = vec![
            format!("GET {DEPLOYMENT}"),
            format!("POST {DEPLOYMENTS}"),
            format!("GET {SERVICE}"),
            format!("POST {SERVICES}"),
        ];
        expected.extend(optional_lookups());
        expected.push(format!("PATCH {STATUS}"));
        assert_eq!(server.requests(), expected);
    }

    #[tokio::test]
    async fn test_status_patch_failure_after_applies() {
        let mc = resource();
        let server = ApiServer::new();
        server
            .reply("GET", DEPLOYMENT, &desired::<Deployment>(&mc))
            .reply("GET", SERVICE, &desired::<Service>(&mc))
            .fail("PATCH", STATUS, 409);

        let err = reconcile(Arc::new(mc), context(&server)).await.unwrap_err();
        assert!(matches!(err, Error::StatusPatch(_)));
        assert!(err.is_retryable());

        let mut expected = vec![format!("GET {DEPLOYMENT}"), format!("GET {SERVICE}")];
        expected.extend(optional_lookups());
        expected.push(format!("PATCH {STATUS}"));
        assert_eq!(server.requests(), expected);
    }

    #[tokio::test]
    async fn test_deployment_failure_stops_the_pass() {
        let mc = resource();
        let server = ApiServer::new();
        server.fail("GET", DEPLOYMENT, 500);

        let err = reconcile(Arc::new(mc), context(&server)).await.unwrap_err();
        assert!(matches!(err, Error::Apply { kind: "Deployment", .. }));
        assert_eq!(server.requests(), vec![format!("GET {DEPLOYMENT}")]);
    }

    #[tokio::test]
    async fn test_disabled_feature_removes_owned_object() {
        let mc = resource();
        let owned = desired::<NetworkPolicy>(&mc);
        let server = ApiServer::new();
        server
            .reply("GET", DEPLOYMENT, &desired::<Deployment>(&mc))
            .reply("GET", SERVICE, &desired::<Service>(&mc))
            .reply("GET", NETWORK_POLICY, &owned)
            .reply("DELETE", NETWORK_POLICY, &owned)
            .reply("PATCH", STATUS, &mc);

        let action = reconcile(Arc::new(mc), context(&server)).await.unwrap();
        assert_eq!(action, Action::requeue(RESYNC_INTERVAL));
        assert!(
            server
                .requests()
                .contains(&format!("DELETE {NETWORK_POLICY}"))
        );
        assert_eq!(server.unused(), 0);
    }
}

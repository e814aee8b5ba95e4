//! Create-or-update harness for dependent objects.
//!
//! Fetches the live object (or starts from an empty one), runs the kind's
//! constructor over it and writes it back only when something changed.
//! Write conflicts re-read and retry. Objects of the same name controlled by
//! another owner are never modified or deleted.

use kube::api::{DeleteParams, PostParams};
use kube::{Api, ResourceExt};
use tracing::debug;

use crate::controller::error::{Error, Result};
use crate::crd::Memcached;
use crate::resources::common::{foreign_controller, is_controlled_by};
use crate::resources::{BuildContext, Dependent};

const MAX_CONFLICT_RETRIES: usize = 3;

/// Result of applying one dependent object.
#[derive(Clone, Debug)]
pub struct Applied<K> {
    pub object: K,
    pub created: bool,
}

/// Create or update the `K` owned by `resource`.
pub async fn apply_dependent<K: Dependent>(
    api: &Api<K>,
    resource: &Memcached,
    ctx: &BuildContext<'_>,
) -> Result<Applied<K>> {
    let name = K::object_name(resource);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match apply_once(api, resource, ctx, &name).await {
            Err(e) if e.is_conflict() && attempt < MAX_CONFLICT_RETRIES => {
                debug!(kind = K::KIND, name = %name, attempt, "Conflict, retrying");
            }
            result => return result,
        }
    }
}

async fn apply_once<K: Dependent>(
    api: &Api<K>,
    resource: &Memcached,
    ctx: &BuildContext<'_>,
    name: &str,
) -> Result<Applied<K>> {
    let wrap = |source| Error::Apply {
        kind: K::KIND,
        name: name.to_string(),
        source,
    };

    match api.get_opt(name).await.map_err(wrap)? {
        Some(live) => {
            if let Some(owner) = foreign_controller(live.meta(), resource) {
                return Err(Error::ForeignOwner {
                    kind: K::KIND,
                    name: name.to_string(),
                    owner: format!("{}/{}", owner.kind, owner.name),
                });
            }
            let mut desired = live.clone();
            K::construct(resource, ctx, &mut desired);
            if desired == live {
                return Ok(Applied {
                    object: live,
                    created: false,
                });
            }
            let object = api
                .replace(name, &PostParams::default(), &desired)
                .await
                .map_err(wrap)?;
            Ok(Applied {
                object,
                created: false,
            })
        }
        None => {
            let mut desired = K::default();
            desired.meta_mut().name = Some(name.to_string());
            desired.meta_mut().namespace = resource.namespace();
            K::construct(resource, ctx, &mut desired);
            let object = api
                .create(&PostParams::default(), &desired)
                .await
                .map_err(wrap)?;
            Ok(Applied {
                object,
                created: true,
            })
        }
    }
}

/// Delete a dependent whose feature is turned off.
///
/// Only an object controlled by `resource` is deleted; absent, unowned and
/// foreign-owned objects are left alone.
pub async fn delete_dependent<K: Dependent>(api: &Api<K>, resource: &Memcached) -> Result<()> {
    let name = K::object_name(resource);
    let wrap = |source| Error::Apply {
        kind: K::KIND,
        name: name.clone(),
        source,
    };

    let Some(live) = api.get_opt(&name).await.map_err(wrap)? else {
        return Ok(());
    };
    if !is_controlled_by(live.meta(), resource) {
        debug!(kind = K::KIND, name = %name, "Not controlled by this resource, leaving it");
        return Ok(());
    }

    match api.delete(&name, &DeleteParams::default()).await {
        Ok(_) => {
            debug!(kind = K::KIND, name = %name, "Deleted disabled dependent");
            Ok(())
        }
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(source) => Err(wrap(source)),
    }
}

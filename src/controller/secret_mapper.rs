//! Maps secret changes to the Memcached resources that mount them.

use kube::ResourceExt;
use kube::runtime::reflector::ObjectRef;

use crate::controller::secrets::referenced_secret_names;
use crate::crd::Memcached;

/// Resources in `secret_namespace` whose enabled SASL or TLS block names
/// `secret_name`.
pub fn secret_reconcile_targets<'a, I>(
    secret_name: &str,
    secret_namespace: &str,
    resources: I,
) -> Vec<ObjectRef<Memcached>>
where
    I: IntoIterator<Item = &'a Memcached>,
{
    resources
        .into_iter()
        .filter(|mc| mc.namespace().as_deref() == Some(secret_namespace))
        .filter(|mc| referenced_secret_names(&mc.spec).contains(secret_name))
        .map(|mc| ObjectRef::new(&mc.name_any()).within(secret_namespace))
        .collect()
}

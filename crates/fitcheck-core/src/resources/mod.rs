pub mod quantity;

pub use quantity::{Quantity, QuantityFormat};

use crate::Result;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use std::collections::{BTreeMap, HashMap};

/// CPU, in cores
pub const RESOURCE_CPU: &str = "cpu";
/// Memory, in bytes
pub const RESOURCE_MEMORY: &str = "memory";

/// Resource name to amount.
///
/// A `HashMap` so that `clear()` keeps its allocated buckets, which lets a
/// single list be reused as an accumulator across many calculations.
pub type ResourceList = HashMap<String, Quantity>;

/// Parse a k8s-openapi resource map (e.g. container requests, node allocatable)
pub fn resource_list_from_k8s(resources: &BTreeMap<String, K8sQuantity>) -> Result<ResourceList> {
    let mut list = ResourceList::with_capacity(resources.len());
    for (name, quantity) in resources {
        list.insert(name.clone(), Quantity::try_from(quantity)?);
    }
    Ok(list)
}

/// Render a resource list back into the k8s-openapi form, sorted by name
pub fn resource_list_to_k8s(list: &ResourceList) -> BTreeMap<String, K8sQuantity> {
    list.iter()
        .map(|(name, quantity)| (name.clone(), K8sQuantity::from(*quantity)))
        .collect()
}

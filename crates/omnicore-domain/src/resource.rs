use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metadata::Metadata;
use crate::pointer::Pointer;

/// A resource with a statically-known spec type.
///
/// Per the "reflective generics" design note (§9), the store itself only
/// ever handles [`AnyResource`] — `Resource<S>` is the ergonomic, typed view
/// a controller works with after `serde_json::from_value`/`to_value` through
/// [`AnyResource::spec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource<S> {
    pub pointer: Pointer,
    pub metadata: Metadata,
    pub spec: S,
}

impl<S> Resource<S> {
    pub fn new(pointer: Pointer, metadata: Metadata, spec: S) -> Self {
        Self { pointer, metadata, spec }
    }
}

impl<S: Serialize> Resource<S> {
    pub fn into_any(self) -> Result<AnyResource, serde_json::Error> {
        Ok(AnyResource { pointer: self.pointer, metadata: self.metadata, spec: serde_json::to_value(self.spec)? })
    }
}

impl<S: serde::de::DeserializeOwned> TryFrom<AnyResource> for Resource<S> {
    type Error = serde_json::Error;

    fn try_from(any: AnyResource) -> Result<Self, Self::Error> {
        Ok(Resource { pointer: any.pointer, metadata: any.metadata, spec: serde_json::from_value(any.spec)? })
    }
}

/// The store's native, type-erased carrier: `(metadata, spec-bytes, type-name)`
/// collapsed into one struct, with `pointer.resource_type` standing in for
/// the type name (§9 "Reflective generics over resource types").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnyResource {
    pub pointer: Pointer,
    pub metadata: Metadata,
    pub spec: Value,
}

impl AnyResource {
    pub fn typed<S: serde::de::DeserializeOwned>(self) -> Result<Resource<S>, serde_json::Error> {
        self.try_into()
    }
}

//! Local `$ref` resolution.
//!
//! `openapiv3` models `$ref`s as `ReferenceOr<T>` without resolving them. Only references into
//! the same document (`#/components/...`) are followed; anything else is reported as unsupported.

use crate::error::{OpenApiImportError, Result};
use openapiv3::{OpenAPI, ReferenceOr};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug)]
pub struct LocalResolver {
    root: Value,
}

impl LocalResolver {
    /// # Errors
    ///
    /// Returns an error if the spec cannot be converted into JSON.
    pub fn new(spec: &OpenAPI) -> Result<Self> {
        Ok(Self {
            root: serde_json::to_value(spec)?,
        })
    }

    /// Follow `r` (and any chained refs) to its item.
    ///
    /// # Errors
    ///
    /// Returns an error for non-local, dangling or cyclic references, or when the target does
    /// not deserialize as `T`.
    pub fn resolve<T>(&self, r: &ReferenceOr<T>) -> Result<T>
    where
        T: Clone + DeserializeOwned,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut cur = r.clone();
        loop {
            match cur {
                ReferenceOr::Item(item) => return Ok(item),
                ReferenceOr::Reference { reference } => {
                    if !seen.insert(reference.clone()) {
                        return Err(OpenApiImportError::CyclicRef(reference));
                    }
                    let value = self.pointer(&reference)?;
                    cur = serde_json::from_value(value.clone()).map_err(|source| {
                        OpenApiImportError::RefShape {
                            reference: reference.clone(),
                            source,
                        }
                    })?;
                }
            }
        }
    }

    fn pointer(&self, reference: &str) -> Result<&Value> {
        let Some(ptr) = reference.strip_prefix('#') else {
            return Err(OpenApiImportError::UnsupportedRef(reference.to_string()));
        };
        if !ptr.starts_with('/') {
            return Err(OpenApiImportError::UnsupportedRef(reference.to_string()));
        }
        self.root
            .pointer(ptr)
            .ok_or_else(|| OpenApiImportError::UnresolvedRef(reference.to_string()))
    }
}

use indexmap::IndexMap;

use crate::{ArtifactRef, Error};

/// Symbolic resource name -> artifact, owned by one strategy.
/// Names are unique; insertion order is kept so enumeration is deterministic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResourcePool {
    resources: IndexMap<String, ArtifactRef>,
}

impl ResourcePool {
    /// Get the artifact stored under `name`.
    pub fn get(&self, name: &str) -> Result<ArtifactRef, Error> {
        self.resources
            .get(name)
            .copied()
            .ok_or_else(|| Error::ResourceNotFound(name.to_owned()))
    }

    /// Store `artifact` under `name`.
    /// Writing an existing name fails unless `override_existing` is set,
    /// in which case the earlier value is replaced in place.
    pub fn put(&mut self, name: &str, artifact: ArtifactRef, override_existing: bool) -> Result<(), Error> {
        if let Some(existing) = self.resources.get_mut(name) {
            if !override_existing {
                return Err(Error::ResourceCollision(name.to_owned()));
            }
            log::trace!("overriding resource {name}");
            *existing = artifact;
        } else {
            self.resources.insert(name.to_owned(), artifact);
        }
        Ok(())
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Resource names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.resources.keys().map(String::as_str)
    }

    /// (name, artifact) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ArtifactRef)> + '_ {
        self.resources.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

use std::marker::PhantomData;

/// Vec wrapper that uses typed indexes.
/// Values are only ever appended, so an id handed out by `push` stays valid
/// for the lifetime of the `IdVec`.
#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub struct IdVec<K, V> {
    vec: Vec<V>,
    _phantom: PhantomData<K>,
}

impl<K, V> Default for IdVec<K, V> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<K, V> IdVec<K, V> {
    fn new(vec: Vec<V>) -> Self {
        Self {
            vec,
            _phantom: PhantomData,
        }
    }

    /// Create a new `IdVec` with the given capacity.
    pub fn with_capacity(cap: usize) -> Self {
        Self::new(Vec::with_capacity(cap))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vec.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Iterate through values in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.vec.iter()
    }
}

impl<K: From<usize>, V> IdVec<K, V> {
    /// Push `v` into the underlying vec, and return an id that can be used to retrieve it later.
    #[inline]
    pub fn push(&mut self, v: V) -> K {
        let id = self.vec.len().into();
        self.vec.push(v);
        id
    }

    /// Iterate through (id, value) pairs in insertion order.
    pub fn enumerate(&self) -> impl Iterator<Item = (K, &V)> + '_ {
        self.vec.iter().enumerate().map(|(i, v)| (i.into(), v))
    }

    /// The id that the next call to `push` will return.
    #[inline]
    pub fn next_id(&self) -> K {
        self.vec.len().into()
    }
}

impl<K: Into<usize>, V> IdVec<K, V> {
    /// Get the value with id `k`, if it exists.
    #[inline]
    pub fn get(&self, k: K) -> Option<&V> {
        self.vec.get(k.into())
    }
}

mod id_vec;
pub use id_vec::IdVec;

mod timer;
pub use timer::Timer;

pub type Hasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;
pub type HashSet<T> = std::collections::HashSet<T, Hasher>;

/// Returned when a path can't be represented as a `str`.
#[derive(thiserror::Error, Debug)]
#[error("Path is not valid UTF-8")]
pub struct PathEncodingError;

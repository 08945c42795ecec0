//! Page allocation backends.
//!
//! Pages are bump allocators over device heaps; pools group them per resource
//! kind and scope.

pub(crate) mod page;
pub(crate) mod pool;

#![forbid(unsafe_code)]

mod entry;
mod iter;
mod map;
mod timer;

pub use entry::{Entry, Expiration, Ttl};
pub use iter::Iter;
pub use map::ExpiringMap;

//! Collectors for host metrics.
//!
//! Each collector reads one source (procfs, sysfs or a vendor tool) and turns
//! it into [`Metric`](crate::metric::Metric) batches. They are wrapped into
//! producers by [`crate::producers`].

pub mod diskstats;
pub mod flashcache;
pub mod netdev;
pub mod sysinfo;
pub mod system;
pub mod thermal;

//! The extraction job scheduler.
//!
//! Five cooperating pieces, sharing only the cluster client and one
//! in-process queue:
//!
//! - [`watch`] — one task per watched directory, turning filesystem
//!   notifications into [`QueueEntry`] items
//! - [`admission`] — the single consumer draining that queue under the
//!   pipeline's `max_jobs` cap
//! - [`launch`] — builds and submits worker specs
//! - [`harvest`] — periodic sweep deleting settled workers past their
//!   maximum age
//! - [`api_source`] — start/stop of the single long-lived worker an
//!   API-style source owns

pub mod admission;
pub mod api_source;
pub mod harvest;
pub mod launch;
pub mod watch;

pub use admission::{run_admission_loop, AdmissionConfig};
pub use api_source::{start_api_source, stop_api_source};
pub use harvest::run_harvester;
pub use launch::{launch_worker, LaunchConfig};
pub use watch::{arm_watch, QueueEntry, WatchRegistry};

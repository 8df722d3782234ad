//! Records of training metrics.
//!
//! The [`TrainingOrchestrator`](crate::TrainingOrchestrator) writes one
//! [`Record`] per trajectory to a [`Recorder`].
//!
//! ```rust
//! use advantage_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("trajectories", RecordValue::Scalar(10.0));
//! record.insert("episode_return", RecordValue::Scalar(-3.5));
//! assert_eq!(record.get_scalar("episode_return").unwrap(), -3.5);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;

//! Core functionalities.
mod env;
mod normalizer;
mod q_function;
mod replay_buffer;
mod step;
pub use env::Env;
pub use normalizer::{IdentityNormalizer, Normalizer};
pub use q_function::{QFunction, TrainingSample};
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
pub use step::{Step, Transition};

pub mod decoder;
pub mod models;
pub mod notifications;
pub mod progress;
pub mod reducer;
pub mod runner;
pub mod status;

pub use decoder::{ByteStream, FrameDecoder, decode_frames};
pub use models::{BulkResource, BulkUpdateStatus, ProcessedItem, ProgressFrame, SingleUpdateResult};
pub use progress::ProgressTracker;
pub use reducer::{JobPhase, ProgressState, reduce};
pub use runner::{JobHandle, JobOutcome, JobRunner, RunnerSettings};
pub use status::{CachedStatus, StatusCache};

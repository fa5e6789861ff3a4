mod job;
mod state;

pub use job::{GenerationRequest, Job, JobError, JobRequest, JobView, Lease, MAX_TOPIC_CHARS};
pub use state::{JobState, StateMachine, Transition};

pub mod recording_machine;
pub mod status;

pub use recording_machine::{RecordingStateMachine, SessionError, SessionState};
pub use status::{SessionPhase, SessionStatus, SessionStatusHandle};

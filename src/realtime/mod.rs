pub mod session;

pub use session::{Frame, RealtimeSession, RealtimeSettings, SessionEnd};

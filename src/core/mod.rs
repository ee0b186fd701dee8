pub mod agent;
pub mod audio;
pub mod call;
pub mod realtime;
pub mod telephony;

// Re-export commonly used types for convenience
pub use agent::{AgentClient, AgentError, AgentResult, HttpAgent, SubprocessAgent};
pub use audio::{decode_mulaw_to_pcm16, encode_pcm16_to_mulaw, mulaw_to_wav, wav_from_pcm16le};
pub use call::{CallLogger, CallSession, TelephonyCommand, TelephonyEvent};
pub use realtime::{RealtimeConfig, RealtimeError, RealtimeHandle, RealtimeResult};
pub use telephony::{TelephonyError, TelephonyResult, TwilioRestClient};

//! G.711 mu-law codec and WAV framing.
//!
//! Both modules are allocation-light and synchronous: they run on every
//! 20 ms telephony frame and must not pull in async machinery.

pub mod mulaw;
pub mod wav;

pub use mulaw::{decode, decode_buf, rms_db};
pub use wav::pcm_to_wav;

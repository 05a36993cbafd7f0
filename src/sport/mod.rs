//! # S.Port Module
//!
//! FrSky S.Port passthrough frame construction: payload bit-packing, the
//! priority scheduler that decides which sensor value goes out next, and
//! wire framing (checksum plus byte stuffing).

pub mod crc;
pub mod framer;
pub mod pack;
pub mod protocol;
pub mod scheduler;

pub use pack::PackRequest;
pub use scheduler::SensorTable;

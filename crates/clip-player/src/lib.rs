pub mod config;
pub mod decode;
pub mod device;
pub mod gain;
pub mod playback;
pub mod sink;

pub mod pixel;
pub mod sample_region;
pub mod quality;
pub mod device;
pub mod playback;
pub mod refresh;
pub mod surface;
pub mod guide;
pub mod encode;
pub mod palm_line;
pub mod reading;
pub mod sequence;

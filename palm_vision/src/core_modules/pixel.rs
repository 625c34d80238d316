// THEORY (single-pixel heuristics):
// The `Pixel` module is the smallest unit of the quality analysis. It is a "dumb"
// data container for one RGBA pixel plus the handful of metrics that can be computed
// from that pixel alone, with no knowledge of its neighbors or of earlier frames.
// Anything that needs more than one pixel (crop averages, classification) lives in
// `sample_region` and `quality`.
//
// Brightness is `channel_mean`, the unweighted mean of R, G and B. The viewfinder
// gate thresholds on it, so it must stay unweighted. Alpha never contributes.

pub mod pixel {
    pub type Channel = u8;
    pub type Brightness = f64;

    pub const CHANNELS: usize = 4;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha (transparency) channel value (0-255).
        pub alpha: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Pixel {
                red,
                green,
                blue,
                alpha,
            }
        }

        /// Sum of the three color channels (0..=765).
        #[inline]
        pub fn sum(&self) -> u32 {
            self.red as u32 + self.green as u32 + self.blue as u32
        }

        /// Unweighted mean of the three color channels (0.0..=255.0).
        #[inline]
        pub fn channel_mean(&self) -> Brightness {
            self.sum() as Brightness / 3.0
        }
    }

    impl From<&[u8]> for Pixel {
        /// Reads the first four bytes as RGBA. Missing channels read as zero, a
        /// missing alpha as opaque.
        fn from(bytes: &[u8]) -> Self {
            let channel = |i: usize| bytes.get(i).copied().unwrap_or(0);
            Pixel {
                red: channel(0),
                green: channel(1),
                blue: channel(2),
                alpha: bytes.get(3).copied().unwrap_or(u8::MAX),
            }
        }
    }

}

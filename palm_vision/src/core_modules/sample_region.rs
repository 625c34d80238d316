// THEORY:
// The `SampleRegion` module is the bridge between a full camera frame and the single
// brightness number the quality gate needs. Rather than averaging millions of pixels
// every refresh, it pools a fixed-size square crop at the center of the frame, where
// the palm is expected to sit inside the guide.
//
// Key principles:
// 1.  **Fixed geometry**: The crop is a square of `side` frame pixels centered on
//     the frame. When the frame is smaller than the crop, the crop is clamped to
//     the frame; only pixels actually inside the frame are averaged.
// 2.  **Noise reduction**: The output is an average, so sensor noise in individual
//     pixels washes out.
// 3.  **Data container**: The region knows its own placement and how to summarize
//     a frame buffer. It does not know what counts as "bright enough".

pub mod sample_region {
    use crate::core_modules::pixel::pixel::{Brightness, CHANNELS, Pixel};

    /// A rectangular crop of a frame, in frame pixel coordinates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SampleRegion {
        /// Left edge of the crop.
        pub x: u32,
        /// Top edge of the crop.
        pub y: u32,
        /// Width of the crop in pixels.
        pub width: u32,
        /// Height of the crop in pixels.
        pub height: u32,
    }

    impl SampleRegion {
        /// A `side` x `side` square centered in a `frame_width` x `frame_height`
        /// frame, clamped to the frame bounds.
        pub fn centered(frame_width: u32, frame_height: u32, side: u32) -> Self {
            let width = side.min(frame_width);
            let height = side.min(frame_height);
            Self {
                x: (frame_width - width) / 2,
                y: (frame_height - height) / 2,
                width,
                height,
            }
        }

        pub fn pixel_count(&self) -> u64 {
            self.width as u64 * self.height as u64
        }

        /// Iterates the crop's pixels row by row from a tightly packed RGBA buffer.
        /// Pixels past the end of a short buffer are skipped.
        pub fn pixels<'a>(
            &self,
            frame_buffer: &'a [u8],
            frame_width: u32,
        ) -> impl Iterator<Item = Pixel> + 'a {
            let region = *self;
            (0..region.height).flat_map(move |row| {
                let y = (region.y + row) as usize;
                let start = (y * frame_width as usize + region.x as usize) * CHANNELS;
                let end = (start + region.width as usize * CHANNELS).min(frame_buffer.len());
                let row_bytes = frame_buffer.get(start..end).unwrap_or(&[]);
                row_bytes.chunks_exact(CHANNELS).map(Pixel::from)
            })
        }

        /// Mean of each pixel's unweighted RGB mean across the crop. An empty crop
        /// reads as fully dark.
        pub fn mean_brightness(&self, frame_buffer: &[u8], frame_width: u32) -> Brightness {
            let mut total = 0u64;
            let mut count = 0u64;
            for pixel in self.pixels(frame_buffer, frame_width) {
                total += pixel.sum() as u64;
                count += 1;
            }
            if count == 0 {
                return 0.0;
            }
            total as Brightness / 3.0 / count as Brightness
        }
    }

}

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Error;
use crate::frame::Frame;

/// An opened video source. `read` returns `None` on a failed grab or at the
/// end of the stream; the session treats both as a reason to reopen.
pub trait Capture {
    /// (width, height) reported by the source when it was opened.
    fn dims(&self) -> (u32, u32);
    fn read(&mut self) -> Option<Frame>;
}

/// Knows how to (re)acquire a capture for one configured source.
pub trait CaptureOpener {
    type Capture: Capture;

    fn uri(&self) -> &str;
    fn open(&self) -> Result<Self::Capture, Error>;
}

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Directory of still images played back in file name order.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    dir: PathBuf,
    uri: String,
}

impl ImageSequence {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let uri = dir.to_string_lossy().into_owned();

        Self { dir, uri }
    }

    /// Frame files that will be played, in playback order.
    pub fn paths(&self) -> Result<Vec<PathBuf>, Error> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();

        paths.sort();

        Ok(paths)
    }
}

impl CaptureOpener for ImageSequence {
    type Capture = ImageSequenceCapture;

    fn uri(&self) -> &str {
        &self.uri
    }

    fn open(&self) -> Result<ImageSequenceCapture, Error> {
        let source_open = || Error::SourceOpen {
            uri: self.uri.clone(),
        };

        let paths = self.paths().map_err(|_| source_open())?;
        let first = paths.first().ok_or_else(source_open)?;
        let dims = image::image_dimensions(first).map_err(|_| source_open())?;

        debug!(uri = %self.uri, frames = paths.len(), "image sequence opened");

        Ok(ImageSequenceCapture {
            paths,
            next: 0,
            dims,
        })
    }
}

pub struct ImageSequenceCapture {
    paths: Vec<PathBuf>,
    next: usize,
    dims: (u32, u32),
}

impl Capture for ImageSequenceCapture {
    fn dims(&self) -> (u32, u32) {
        self.dims
    }

    /// Undecodable files are skipped; the frame index stays the file's
    /// position in the sequence.
    fn read(&mut self) -> Option<Frame> {
        while let Some(path) = self.paths.get(self.next) {
            let index = self.next as u64;
            self.next += 1;

            match image::open(path) {
                Ok(img) => return Some(Frame::new(img.to_rgb8(), index)),
                Err(err) => warn!(path = %path.display(), "skipping undecodable frame: {}", err),
            }
        }

        None
    }
}

#[cfg(feature = "opencv")]
pub use self::cv::{OpencvCapture, OpencvSource};

#[cfg(feature = "opencv")]
mod cv {
    use image::RgbImage;
    use opencv::{core::Mat, prelude::*, videoio};

    use super::{Capture, CaptureOpener};
    use crate::error::Error;
    use crate::frame::Frame;

    /// Camera index (`"0"`) or anything `VideoCapture` can open by name.
    #[derive(Debug, Clone)]
    pub struct OpencvSource {
        uri: String,
    }

    impl OpencvSource {
        pub fn new<S: ToString>(uri: S) -> Self {
            Self {
                uri: uri.to_string(),
            }
        }
    }

    impl CaptureOpener for OpencvSource {
        type Capture = OpencvCapture;

        fn uri(&self) -> &str {
            &self.uri
        }

        fn open(&self) -> Result<OpencvCapture, Error> {
            let cam = match self.uri.parse::<i32>() {
                Ok(index) => videoio::VideoCapture::new(index, videoio::CAP_ANY)?,
                Err(_) => videoio::VideoCapture::from_file(&self.uri, videoio::CAP_ANY)?,
            };

            if !videoio::VideoCapture::is_opened(&cam)? {
                return Err(Error::SourceOpen {
                    uri: self.uri.clone(),
                });
            }

            let width = cam.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
            let height = cam.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;

            Ok(OpencvCapture {
                cam,
                mat: Mat::default(),
                dims: (width, height),
                index: 0,
            })
        }
    }

    pub struct OpencvCapture {
        cam: videoio::VideoCapture,
        mat: Mat,
        dims: (u32, u32),
        index: u64,
    }

    impl OpencvCapture {
        fn grab(&mut self) -> opencv::Result<Option<RgbImage>> {
            if !self.cam.read(&mut self.mat)? {
                return Ok(None);
            }

            let (w, h) = (self.mat.cols() as u32, self.mat.rows() as u32);
            if w == 0 || h == 0 {
                return Ok(None);
            }

            // BGR8 -> RGB8
            let mut rgb = Vec::with_capacity((w * h * 3) as usize);
            for px in self.mat.data_bytes()?.chunks_exact(3) {
                rgb.extend_from_slice(&[px[2], px[1], px[0]]);
            }

            Ok(RgbImage::from_raw(w, h, rgb))
        }
    }

    impl Capture for OpencvCapture {
        fn dims(&self) -> (u32, u32) {
            self.dims
        }

        fn read(&mut self) -> Option<Frame> {
            match self.grab() {
                Ok(Some(img)) => {
                    let frame = Frame::new(img, self.index);
                    self.index += 1;
                    Some(frame)
                }
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!("capture read failed: {}", err);
                    None
                }
            }
        }
    }

    impl Drop for OpencvCapture {
        fn drop(&mut self) {
            let _ = self.cam.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("flowcount-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn plays_images_in_name_order() {
        let dir = scratch_dir("seq");
        for (i, shade) in [(1u8, 10u8), (0, 20), (2, 30)] {
            RgbImage::from_pixel(8, 6, Rgb([shade, 0, 0]))
                .save(dir.join(format!("{:03}.png", i)))
                .unwrap();
        }
        std::fs::write(dir.join("notes.txt"), b"skip me").unwrap();

        let source = ImageSequence::new(&dir);
        let mut cap = source.open().unwrap();
        assert_eq!(cap.dims(), (8, 6));

        let shades: Vec<u8> = std::iter::from_fn(|| cap.read())
            .map(|f| f.image.get_pixel(0, 0)[0])
            .collect();
        assert_eq!(shades, vec![20, 10, 30]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn undecodable_frames_are_skipped() {
        let dir = scratch_dir("corrupt");
        for i in [0u8, 2] {
            RgbImage::from_pixel(8, 6, Rgb([i, 0, 0]))
                .save(dir.join(format!("{:03}.png", i)))
                .unwrap();
        }
        std::fs::write(dir.join("001.png"), b"not a png").unwrap();

        let source = ImageSequence::new(&dir);
        assert_eq!(source.paths().unwrap().len(), 3);

        let mut cap = source.open().unwrap();
        let indices: Vec<u64> = std::iter::from_fn(|| cap.read()).map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 2]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_directory_fails_to_open() {
        let dir = scratch_dir("empty");
        let err = ImageSequence::new(&dir).open().err().unwrap();
        assert!(matches!(err, Error::SourceOpen { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_fails_to_open() {
        let err = ImageSequence::new("/nonexistent/flowcount/frames")
            .open()
            .err()
            .unwrap();
        assert!(matches!(err, Error::SourceOpen { .. }));
    }
}

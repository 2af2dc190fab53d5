use std::thread;
use std::time::{Duration, Instant};

use opencv::core::{CV_8U, Scalar};
use opencv::prelude::*;

use crate::camera::FrameSource;
use crate::cloak::ensure_same_shape;
use crate::cloak::error::CloakError;

/// Estimates the static scene behind the subject from a burst of camera frames.
///
/// All samples are buffered and reduced with a per-pixel, per-channel median. The median
/// ignores a subject that only briefly walks through the frame, which an average would not.
pub struct BackgroundEstimator {
    sample_count: usize,
    interval: Duration,
}

impl BackgroundEstimator {
    pub fn new(sample_count: usize, interval: Duration) -> Result<Self, CloakError> {
        if sample_count == 0 {
            return Err(CloakError::InvalidConfig(
                "background sample count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            sample_count,
            interval,
        })
    }

    /// Try to grab `sample_count` frames from `source` and return their median.
    ///
    /// Failed grabs are skipped. Fails with [`CloakError::EmptyCapture`] only if none of the
    /// attempts produced a frame.
    pub fn capture<S: FrameSource + ?Sized>(&self, source: &mut S) -> Result<Mat, CloakError> {
        log::info!(
            "Capturing {} frames for background. Please move out of frame.",
            self.sample_count
        );
        let mut samples: Vec<Mat> = Vec::with_capacity(self.sample_count);
        let start_time = Instant::now();

        for i in 0..self.sample_count {
            let frame = match source.grab_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::warn!("Could not read frame {}/{}", i + 1, self.sample_count);
                    continue;
                }
                Err(e) => {
                    log::warn!(
                        "Could not read frame {}/{}: {}",
                        i + 1,
                        self.sample_count,
                        e
                    );
                    continue;
                }
            };
            if let Some(first) = samples.first() {
                if let Err(e) = ensure_same_shape("background sample", first, &frame, true) {
                    log::warn!("Skipping frame {}/{}: {}", i + 1, self.sample_count, e);
                    continue;
                }
            }
            samples.push(frame);

            // the remaining time is estimated from the nominal interval, not measured
            let elapsed = start_time.elapsed().as_secs_f64();
            let remaining = (self.sample_count - i - 1) as f64 * self.interval.as_secs_f64();
            log::info!(
                "Progress: {}/{} | Elapsed: {:.1}s | Remaining: {:.1}s",
                i + 1,
                self.sample_count,
                elapsed,
                remaining
            );

            thread::sleep(self.interval);
        }

        if samples.is_empty() {
            return Err(CloakError::EmptyCapture {
                attempts: self.sample_count,
            });
        }
        log::info!(
            "Background built from {}/{} frames.",
            samples.len(),
            self.sample_count
        );
        median_frame(&samples)
    }
}

/// Median of an odd or even number of intensities. Even counts take the mean of the two
/// middle values, rounding halves up.
fn median_u8(values: &mut [u8]) -> u8 {
    let mid = values.len() / 2;
    let odd = values.len() % 2 == 1;
    let (lower, upper, _) = values.select_nth_unstable(mid);
    let upper = *upper;
    if odd {
        return upper;
    }
    let lower_mid = lower.iter().copied().max().unwrap_or(upper);
    ((lower_mid as u16 + upper as u16 + 1) / 2) as u8
}

/// Per-pixel, per-channel median across `frames`.
///
/// Every frame must be an 8-bit image with the same size and type as the first one.
pub fn median_frame(frames: &[Mat]) -> Result<Mat, CloakError> {
    let first = frames.first().ok_or(CloakError::EmptyCapture { attempts: 0 })?;
    if first.depth() != CV_8U {
        return Err(CloakError::InvalidConfig(format!(
            "background frames must have 8-bit depth, got depth {}",
            first.depth()
        )));
    }

    // `data_bytes` needs continuous storage; camera frames normally already are
    let mut continuous = Vec::with_capacity(frames.len());
    for frame in frames {
        ensure_same_shape("background sample", first, frame, true)?;
        continuous.push(if frame.is_continuous() {
            None
        } else {
            Some(frame.try_clone()?)
        });
    }
    let mut planes: Vec<&[u8]> = Vec::with_capacity(frames.len());
    for (frame, copy) in frames.iter().zip(continuous.iter()) {
        planes.push(copy.as_ref().unwrap_or(frame).data_bytes()?);
    }

    let mut result =
        Mat::new_rows_cols_with_default(first.rows(), first.cols(), first.typ(), Scalar::all(0.0))?;
    let out = result.data_bytes_mut()?;
    let mut values = vec![0u8; planes.len()];
    for (index, out_value) in out.iter_mut().enumerate() {
        for (value, plane) in values.iter_mut().zip(planes.iter()) {
            *value = plane[index];
        }
        *out_value = median_u8(&mut values);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use opencv::core::CV_8UC3;
    use rand::Rng;

    use super::*;

    struct ScriptedSource(VecDeque<Option<Mat>>);

    impl FrameSource for ScriptedSource {
        fn grab_frame(&mut self) -> Result<Option<Mat>, CloakError> {
            Ok(self.0.pop_front().flatten())
        }

        fn release(&mut self) -> Result<(), CloakError> {
            Ok(())
        }
    }

    fn frame_from_bytes(rows: i32, cols: i32, bytes: &[u8]) -> Mat {
        let mut frame =
            Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(0.0)).unwrap();
        frame.data_bytes_mut().unwrap().copy_from_slice(bytes);
        frame
    }

    fn reference_median(values: &[u8]) -> u8 {
        let mut sorted = values.to_vec();
        sorted.sort();
        let n = sorted.len();
        if n % 2 == 1 {
            sorted[n / 2]
        } else {
            let sum = sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64;
            (sum / 2.0).round() as u8
        }
    }

    #[test]
    fn test_median_u8() {
        assert_eq!(median_u8(&mut [7]), 7);
        assert_eq!(median_u8(&mut [3, 1, 2]), 2);
        assert_eq!(median_u8(&mut [10, 0]), 5);
        assert_eq!(median_u8(&mut [0, 255, 1, 254]), 128);
        // halves round up
        assert_eq!(median_u8(&mut [1, 2]), 2);
        assert_eq!(median_u8(&mut [255, 255, 0, 0]), 128);
    }

    #[test]
    fn test_median_of_single_frame() {
        let bytes: Vec<u8> = (0..2 * 3 * 3).map(|v| v as u8 * 13).collect();
        let frame = frame_from_bytes(2, 3, &bytes);
        let median = median_frame(&[frame]).unwrap();
        assert_eq!(median.data_bytes().unwrap(), &bytes[..]);
    }

    #[test]
    fn test_median_matches_reference() {
        let mut rng = rand::rng();
        let (rows, cols) = (4, 5);
        let len = (rows * cols * 3) as usize;
        for n in [1, 2, 3, 4, 7, 30] {
            let samples: Vec<Vec<u8>> = (0..n)
                .map(|_| (0..len).map(|_| rng.random::<u8>()).collect())
                .collect();
            let frames: Vec<Mat> = samples
                .iter()
                .map(|bytes| frame_from_bytes(rows, cols, bytes))
                .collect();
            let median = median_frame(&frames).unwrap();
            let median_bytes = median.data_bytes().unwrap();
            for i in 0..len {
                let column: Vec<u8> = samples.iter().map(|s| s[i]).collect();
                assert_eq!(
                    median_bytes[i],
                    reference_median(&column),
                    "n = {}, index = {}",
                    n,
                    i
                );
            }
        }
    }

    #[test]
    fn test_median_rejects_transient_intruder() {
        let background = vec![40u8; 2 * 2 * 3];
        let intruder = vec![250u8; 2 * 2 * 3];
        let frames = vec![
            frame_from_bytes(2, 2, &background),
            frame_from_bytes(2, 2, &intruder),
            frame_from_bytes(2, 2, &background),
        ];
        let median = median_frame(&frames).unwrap();
        assert!(median.data_bytes().unwrap().iter().all(|&v| v == 40));
    }

    #[test]
    fn test_median_size_mismatch() {
        let a = frame_from_bytes(2, 2, &[0; 12]);
        let b = frame_from_bytes(1, 2, &[0; 6]);
        assert!(matches!(
            median_frame(&[a, b]),
            Err(CloakError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_capture_skips_failed_reads() {
        let mut source = ScriptedSource(VecDeque::from(vec![
            None,
            Some(frame_from_bytes(1, 1, &[10, 20, 30])),
            None,
            Some(frame_from_bytes(1, 1, &[30, 40, 50])),
        ]));
        let estimator = BackgroundEstimator::new(4, Duration::ZERO).unwrap();
        let background = estimator.capture(&mut source).unwrap();
        assert_eq!(background.data_bytes().unwrap(), &[20, 30, 40]);
    }

    #[test]
    fn test_capture_skips_wrong_resolution() {
        let mut source = ScriptedSource(VecDeque::from(vec![
            Some(frame_from_bytes(1, 1, &[10, 10, 10])),
            Some(frame_from_bytes(1, 2, &[0; 6])),
        ]));
        let estimator = BackgroundEstimator::new(2, Duration::ZERO).unwrap();
        let background = estimator.capture(&mut source).unwrap();
        assert_eq!(background.data_bytes().unwrap(), &[10, 10, 10]);
    }

    #[test]
    fn test_capture_without_frames() {
        let mut source = ScriptedSource(VecDeque::new());
        let estimator = BackgroundEstimator::new(5, Duration::ZERO).unwrap();
        assert!(matches!(
            estimator.capture(&mut source),
            Err(CloakError::EmptyCapture { attempts: 5 })
        ));
    }

    #[test]
    fn test_failed_attempts_do_not_wait() {
        let mut source = ScriptedSource(VecDeque::from(vec![None, None, None]));
        let estimator = BackgroundEstimator::new(3, Duration::from_secs(10)).unwrap();
        let start = Instant::now();
        assert!(estimator.capture(&mut source).is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_zero_samples_rejected() {
        assert!(matches!(
            BackgroundEstimator::new(0, Duration::ZERO),
            Err(CloakError::InvalidConfig(_))
        ));
    }
}

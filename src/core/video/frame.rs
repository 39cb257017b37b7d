use std::time::Duration;

use image::RgbImage;

use super::error::ShotError;

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGB 格式，每像素 3 字节
    pub timestamp: Duration,
    pub frame_number: u64,
}

impl Frame {
    /// 从紧凑的 RGB 缓冲创建帧，长度必须等于 `width * height * 3`
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: f64,
        frame_number: u64,
    ) -> Result<Self, ShotError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(ShotError::InvalidPixelBuffer {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            data,
            timestamp: timestamp_from_ms(timestamp_ms)?,
            frame_number,
        })
    }

    /// 丢弃 alpha 通道
    pub fn from_rgba(
        width: u32,
        height: u32,
        rgba: &[u8],
        timestamp_ms: f64,
        frame_number: u64,
    ) -> Result<Self, ShotError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(ShotError::InvalidPixelBuffer {
                expected,
                actual: rgba.len(),
            });
        }

        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for chunk in rgba.chunks_exact(4) {
            rgb.extend_from_slice(&chunk[..3]);
        }
        Self::new(width, height, rgb, timestamp_ms, frame_number)
    }

    /// OpenCV 风格的解码器输出 BGR，这里换回 RGB
    pub fn from_bgr(
        width: u32,
        height: u32,
        mut bgr: Vec<u8>,
        timestamp_ms: f64,
        frame_number: u64,
    ) -> Result<Self, ShotError> {
        for px in bgr.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        Self::new(width, height, bgr, timestamp_ms, frame_number)
    }

    pub fn from_image(
        image: &RgbImage,
        timestamp_ms: f64,
        frame_number: u64,
    ) -> Result<Self, ShotError> {
        Ok(Self {
            width: image.width(),
            height: image.height(),
            data: image.as_raw().clone(),
            timestamp: timestamp_from_ms(timestamp_ms)?,
            frame_number,
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// 解码器给出的时间戳可带小数，如 29.97fps 下的 33.3667ms
    pub fn timestamp_ms(&self) -> f64 {
        self.timestamp.as_secs_f64() * 1000.0
    }

    pub fn to_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

fn timestamp_from_ms(timestamp_ms: f64) -> Result<Duration, ShotError> {
    if !timestamp_ms.is_finite() || timestamp_ms < 0.0 {
        return Err(ShotError::InvalidTimestamp(timestamp_ms));
    }
    Ok(Duration::from_secs_f64(timestamp_ms / 1000.0))
}

/// 帧元数据（轻量级，像素释放后仍可用于时间戳查询）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: f64,
    pub frame_number: u64,
}

impl FrameInfo {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            timestamp_ms: frame.timestamp_ms(),
            frame_number: frame.frame_number,
        }
    }
}

/// 从原生解码器传递的 YUV 4:2:0 平面帧
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub y_plane: Vec<u8>,
    pub u_plane: Vec<u8>,
    pub v_plane: Vec<u8>,
    pub timestamp_ms: f64,
    pub frame_number: u64,
}

impl RawFrame {
    pub fn to_rgb(&self) -> Result<Frame, ShotError> {
        let w = self.width as usize;
        let h = self.height as usize;
        let chroma_w = w.div_ceil(2);
        let chroma_len = chroma_w * h.div_ceil(2);

        if self.y_plane.len() < w * h {
            return Err(ShotError::InvalidPixelBuffer {
                expected: w * h,
                actual: self.y_plane.len(),
            });
        }
        for plane in [&self.u_plane, &self.v_plane] {
            if plane.len() < chroma_len {
                return Err(ShotError::InvalidPixelBuffer {
                    expected: chroma_len,
                    actual: plane.len(),
                });
            }
        }

        let mut rgb = vec![0u8; w * h * 3];
        for y in 0..h {
            for x in 0..w {
                let y_idx = y * w + x;
                let uv_idx = (y / 2) * chroma_w + x / 2;

                let y_val = self.y_plane[y_idx] as f32;
                let u_val = self.u_plane[uv_idx] as f32 - 128.0;
                let v_val = self.v_plane[uv_idx] as f32 - 128.0;

                let rgb_idx = y_idx * 3;
                rgb[rgb_idx] = (y_val + 1.402 * v_val).clamp(0.0, 255.0) as u8;
                rgb[rgb_idx + 1] =
                    (y_val - 0.344136 * u_val - 0.714136 * v_val).clamp(0.0, 255.0) as u8;
                rgb[rgb_idx + 2] = (y_val + 1.772 * u_val).clamp(0.0, 255.0) as u8;
            }
        }

        Frame::new(
            self.width,
            self.height,
            rgb,
            self.timestamp_ms,
            self.frame_number,
        )
    }
}

use image::ImageFormat;
use image::imageops::FilterType;

use super::Embed;
use crate::error::{Error, Result};

/// 本地灰度网格嵌入（降级后端）
///
/// 图片转灰度后缩放到恰好覆盖 D 个像素的正方形网格，像素值归一化到 [0, 1]
/// 后截断为 D 维。不依赖外部服务，对固定输入完全确定。
pub struct LocalEmbedder {
    dim: usize,
    /// 网格边长，为 ceil(sqrt(dim))
    side: u32,
}

impl LocalEmbedder {
    pub const MODEL_ID: &'static str = "grid-gray-v1";

    pub fn new(dim: usize) -> Self {
        let side = (dim as f64).sqrt().ceil() as u32;
        Self { dim, side }
    }
}

impl Embed for LocalEmbedder {
    fn model_id(&self) -> &str {
        Self::MODEL_ID
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, image: &[u8]) -> Result<Vec<f32>> {
        let format = image::guess_format(image)
            .map_err(|e| Error::InputValidation(format!("无法识别图片格式: {e}")))?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Tiff) {
            return Err(Error::InputValidation(format!("不支持的图片格式: {format:?}")));
        }

        let img = image::load_from_memory_with_format(image, format)?;
        let gray = img.resize_exact(self.side, self.side, FilterType::Triangle).into_luma8();

        let mut vector: Vec<f32> =
            gray.pixels().map(|p| p.0[0] as f32 / 255.0).take(self.dim).collect();
        // dim 不是完全平方数时网格像素多于 dim，截断；反之不可能发生
        debug_assert!(vector.len() >= self.dim.min((self.side * self.side) as usize));
        vector.truncate(self.dim);
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, GrayImage, Luma};

    use super::*;

    fn png_bytes(width: u32, height: u32, seed: u8) -> Vec<u8> {
        let img = GrayImage::from_fn(width, height, |x, y| {
            Luma([((x * 7 + y * 13) as u8).wrapping_add(seed)])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn output_has_declared_dimension() {
        let embedder = LocalEmbedder::new(512);
        let vector = embedder.embed(&png_bytes(64, 48, 0)).await.unwrap();
        assert_eq!(vector.len(), 512);
        assert!(vector.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[tokio::test]
    async fn same_input_gives_same_vector() {
        let embedder = LocalEmbedder::new(64);
        let image = png_bytes(100, 80, 42);
        let a = embedder.embed(&image).await.unwrap();
        let b = embedder.embed(&image).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_images_differ() {
        let embedder = LocalEmbedder::new(64);
        let a = embedder.embed(&png_bytes(64, 64, 0)).await.unwrap();
        let b = embedder.embed(&png_bytes(64, 64, 200)).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn garbage_bytes_are_rejected_as_input_error() {
        let embedder = LocalEmbedder::new(64);
        match embedder.embed(b"not an image at all").await {
            Err(Error::InputValidation(_)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }
}

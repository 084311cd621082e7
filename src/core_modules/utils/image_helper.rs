pub mod image_helper {
    use crate::core_modules::pixel_buffer::PixelBuffer;
    use crate::error::Result;
    use image::ImageEncoder;
    use image::codecs::png::PngEncoder;
    use std::io::Cursor;
    use std::path::Path;

    /// Encodes an RGBA buffer as PNG bytes.
    pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let encoder = PngEncoder::new(&mut bytes);
        encoder.write_image(
            buffer.as_bytes(),
            buffer.width(),
            buffer.height(),
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(bytes)
    }

    /// Decodes any format `image` understands into RGBA.
    pub fn decode(bytes: &[u8]) -> Result<PixelBuffer> {
        let decoded = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .decode()?;
        PixelBuffer::try_from(decoded.to_rgba8())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<PixelBuffer> {
        let decoded = image::open(path)?;
        PixelBuffer::try_from(decoded.to_rgba8())
    }

    pub fn save(path: impl AsRef<Path>, buffer: &PixelBuffer) -> Result<()> {
        let output = std::fs::File::create(path)?;
        let encoder = PngEncoder::new(output);
        encoder.write_image(
            buffer.as_bytes(),
            buffer.width(),
            buffer.height(),
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(())
    }
}

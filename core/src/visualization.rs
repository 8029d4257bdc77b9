use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    str::FromStr,
};

use image::{
    codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, GrayImage, ImageFormat, Rgb,
    RgbImage,
};

use crate::error::{Result, StoreError};

/// Default format for [`ConfigStore::save_figure`](crate::ConfigStore::save_figure).
pub const DEFAULT_FIGURE_FORMAT: &str = "png";

/// Anything that can be rasterized and written as a figure artifact.
pub trait Figure {
    fn render(&self) -> Result<DynamicImage>;
}

impl Figure for DynamicImage {
    fn render(&self) -> Result<DynamicImage> {
        Ok(self.clone())
    }
}

impl Figure for RgbImage {
    fn render(&self) -> Result<DynamicImage> {
        Ok(DynamicImage::ImageRgb8(self.clone()))
    }
}

impl Figure for GrayImage {
    fn render(&self) -> Result<DynamicImage> {
        Ok(DynamicImage::ImageLuma8(self.clone()))
    }
}

/// Encoder-specific knobs for figure output.
#[derive(Clone, Debug)]
pub struct FigureOptions {
    /// Integer upscaling factor applied with nearest-neighbour sampling.
    pub scale: u32,
    /// JPEG quality in `1..=100`; other formats ignore it.
    pub jpeg_quality: u8,
    pub verbose: u8,
}

impl Default for FigureOptions {
    fn default() -> Self {
        Self {
            scale: 1,
            jpeg_quality: 90,
            verbose: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FigureFormat {
    Png,
    Jpeg,
    Bmp,
}

impl FigureFormat {
    pub const EXPECTED: &'static str = "png, jpg, jpeg, bmp";
}

impl FromStr for FigureFormat {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self> {
        match ImageFormat::from_extension(value) {
            Some(ImageFormat::Png) => Ok(Self::Png),
            Some(ImageFormat::Jpeg) => Ok(Self::Jpeg),
            Some(ImageFormat::Bmp) => Ok(Self::Bmp),
            _ => Err(StoreError::UnsupportedFormat {
                format: value.to_string(),
                expected: Self::EXPECTED,
            }),
        }
    }
}

pub(crate) fn write_figure(
    image: DynamicImage,
    path: &Path,
    format: FigureFormat,
    options: &FigureOptions,
) -> Result<()> {
    let image = if options.scale > 1 {
        let (width, height) = (image.width(), image.height());
        image.resize_exact(
            width * options.scale,
            height * options.scale,
            FilterType::Nearest,
        )
    } else {
        image
    };

    let file = File::create(path).map_err(|err| StoreError::io(path, err))?;
    let mut writer = BufWriter::new(file);
    match format {
        FigureFormat::Png => image.write_to(&mut writer, ImageFormat::Png)?,
        FigureFormat::Bmp => image.write_to(&mut writer, ImageFormat::Bmp)?,
        FigureFormat::Jpeg => {
            let quality = options.jpeg_quality.clamp(1, 100);
            let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
        }
    }
    writer.flush().map_err(|err| StoreError::io(path, err))?;
    Ok(())
}

/// Build a grayscale image from values in [0, 1].
pub fn luma_image(width: u32, height: u32, pixels: &[f32]) -> Result<GrayImage> {
    if pixels.len() != (width * height) as usize {
        return Err(StoreError::InvalidFigure(format!(
            "pixel buffer length {} does not match image size {}x{}",
            pixels.len(),
            width,
            height
        )));
    }

    let encoded: Vec<u8> = pixels.iter().map(|&value| unit_to_byte(value)).collect();
    GrayImage::from_raw(width, height, encoded)
        .ok_or_else(|| StoreError::InvalidFigure("grayscale buffer rejected".to_string()))
}

/// Build an RGB image from interleaved values in [0, 1].
pub fn rgb_image(width: u32, height: u32, pixels: &[f32]) -> Result<RgbImage> {
    let expected_len = (width * height * 3) as usize;
    if pixels.len() != expected_len {
        return Err(StoreError::InvalidFigure(format!(
            "pixel buffer length {} does not match RGB image size {}x{}",
            pixels.len(),
            width,
            height
        )));
    }

    let encoded: Vec<u8> = pixels.iter().map(|&value| unit_to_byte(value)).collect();
    RgbImage::from_raw(width, height, encoded)
        .ok_or_else(|| StoreError::InvalidFigure("RGB buffer rejected".to_string()))
}

fn unit_to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

const MARGIN: u32 = 24;
const LEGEND_SWATCH: u32 = 10;
const PALETTE: [[u8; 3]; 6] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
];

#[derive(Clone, Debug)]
struct Series {
    label: String,
    color: [u8; 3],
    points: Vec<(f64, f64)>,
}

/// A minimal line chart: axes, one polyline per series and a colour legend.
#[derive(Clone, Debug)]
pub struct LinePlot {
    width: u32,
    height: u32,
    series: Vec<Series>,
}

impl LinePlot {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            series: Vec::new(),
        }
    }

    /// Add a series; colours cycle through a fixed palette.
    pub fn series(mut self, label: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        let color = PALETTE[self.series.len() % PALETTE.len()];
        self.series.push(Series {
            label: label.into(),
            color,
            points,
        });
        self
    }

    fn bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        let mut finite = self
            .series
            .iter()
            .flat_map(|s| s.points.iter())
            .filter(|(x, y)| x.is_finite() && y.is_finite());
        let &(x0, y0) = finite.next()?;
        let (mut x_range, mut y_range) = ((x0, x0), (y0, y0));
        for &(x, y) in finite {
            x_range = (x_range.0.min(x), x_range.1.max(x));
            y_range = (y_range.0.min(y), y_range.1.max(y));
        }
        Some((widen(x_range), widen(y_range)))
    }
}

fn widen((low, high): (f64, f64)) -> (f64, f64) {
    if high - low < f64::EPSILON {
        (low - 0.5, high + 0.5)
    } else {
        (low, high)
    }
}

impl Figure for LinePlot {
    fn render(&self) -> Result<DynamicImage> {
        if self.width <= 2 * MARGIN || self.height <= 2 * MARGIN {
            return Err(StoreError::InvalidFigure(format!(
                "plot size {}x{} leaves no room inside the {MARGIN}px margins",
                self.width, self.height
            )));
        }
        let ((x_min, x_max), (y_min, y_max)) = self
            .bounds()
            .ok_or_else(|| StoreError::InvalidFigure("plot has no finite points".to_string()))?;

        let mut canvas = RgbImage::from_pixel(self.width, self.height, Rgb([255, 255, 255]));
        let left = MARGIN as i64;
        let right = (self.width - MARGIN) as i64;
        let top = MARGIN as i64;
        let bottom = (self.height - MARGIN) as i64;
        let axis = Rgb([0, 0, 0]);
        draw_line(&mut canvas, (left, bottom), (right, bottom), axis);
        draw_line(&mut canvas, (left, top), (left, bottom), axis);

        let project = |(x, y): (f64, f64)| -> (i64, i64) {
            let px = left as f64 + (x - x_min) / (x_max - x_min) * (right - left) as f64;
            let py = bottom as f64 - (y - y_min) / (y_max - y_min) * (bottom - top) as f64;
            (px.round() as i64, py.round() as i64)
        };

        for series in &self.series {
            tracing::debug!(series = %series.label, points = series.points.len(), "drawing series");
            let color = Rgb(series.color);
            let mut previous: Option<(i64, i64)> = None;
            for &point in &series.points {
                if !(point.0.is_finite() && point.1.is_finite()) {
                    previous = None;
                    continue;
                }
                let current = project(point);
                match previous {
                    Some(start) => draw_line(&mut canvas, start, current, color),
                    None => put_pixel(&mut canvas, current, color),
                }
                previous = Some(current);
            }
        }

        for (index, series) in self.series.iter().enumerate() {
            let x = right - LEGEND_SWATCH as i64 - 2;
            let y = top + 2 + index as i64 * (LEGEND_SWATCH as i64 + 4);
            for dy in 0..LEGEND_SWATCH as i64 {
                for dx in 0..LEGEND_SWATCH as i64 {
                    put_pixel(&mut canvas, (x + dx, y + dy), Rgb(series.color));
                }
            }
        }

        Ok(DynamicImage::ImageRgb8(canvas))
    }
}

fn put_pixel(canvas: &mut RgbImage, (x, y): (i64, i64), color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

// Bresenham over all octants.
fn draw_line(canvas: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let step_x = if x < to.0 { 1 } else { -1 };
    let step_y = if y < to.1 { 1 } else { -1 };
    let mut error = dx + dy;

    loop {
        put_pixel(canvas, (x, y), color);
        if (x, y) == to {
            break;
        }
        let doubled = 2 * error;
        if doubled >= dy {
            error += dy;
            x += step_x;
        }
        if doubled <= dx {
            error += dx;
            y += step_y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_image_checks_length() {
        assert!(luma_image(2, 2, &[0.0; 3]).is_err());
        let image = luma_image(2, 1, &[0.0, 2.0]).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [0]);
        assert_eq!(image.get_pixel(1, 0).0, [255]);
    }

    #[test]
    fn test_rgb_image_checks_length() {
        assert!(rgb_image(1, 1, &[0.5; 2]).is_err());
        let image = rgb_image(1, 1, &[1.0, 0.5, 0.0]).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [255, 128, 0]);
    }

    #[test]
    fn test_figure_format_parsing() {
        assert_eq!("png".parse::<FigureFormat>().unwrap(), FigureFormat::Png);
        assert_eq!("jpg".parse::<FigureFormat>().unwrap(), FigureFormat::Jpeg);
        assert!(matches!(
            "svg".parse::<FigureFormat>(),
            Err(StoreError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_line_plot_draws_series_colour() {
        let plot = LinePlot::new(120, 80).series("prey", vec![(0.0, 0.0), (1.0, 1.0)]);
        let image = plot.render().unwrap().to_rgb8();
        let colored = image.pixels().filter(|p| p.0 == PALETTE[0]).count();
        assert!(colored > LEGEND_SWATCH as usize * LEGEND_SWATCH as usize);
        // bottom-left corner of the plot area is on the line
        assert_eq!(image.get_pixel(MARGIN, 80 - MARGIN).0, PALETTE[0]);
    }

    #[test]
    fn test_line_plot_rejects_empty_or_tiny() {
        assert!(LinePlot::new(120, 80).render().is_err());
        let tiny = LinePlot::new(20, 20).series("x", vec![(0.0, 1.0)]);
        assert!(tiny.render().is_err());
    }

    #[test]
    fn test_flat_series_still_renders() {
        let plot = LinePlot::new(100, 100).series("flat", vec![(0.0, 3.0), (5.0, 3.0)]);
        assert!(plot.render().is_ok());
    }
}

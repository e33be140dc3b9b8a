mod codec;
mod error;
mod fonts;
mod hwpx;
pub mod model;
mod numbering;
mod pdf;
mod style;

pub use codec::{
    Bitmap, Channels, CodecError, RasterFormat, crc32, decode_bmp, decode_gif, encode_png, to_png,
};
pub use error::Error;
pub use fonts::{
    BuiltinFace, FontClass, FontKey, FontLocator, FontMetrics, FontProgram, FontSource,
    NoSystemFonts, SystemFontLocator, classify_face,
};
pub use hwpx::{parse as parse_hwpx, parse_bytes as parse_hwpx_bytes};
pub use model::Document;
pub use numbering::{NumberingState, format_numeral};
pub use pdf::{
    Canvas, Dash, EmbeddedImage, FontId, GenerateOptions, ImageId, PageId, PageSummary, PdfCanvas,
    RenderSummary, Stroke, TextPaint, generate, infer_column_widths, render_into, signed_offset,
    wrap_text,
};
pub use style::{
    LineSpacing, ResolvedCharStyle, ResolvedParaStyle, line_height, resolve_char_style,
    resolve_para_style,
};

use std::path::Path;
use std::time::Instant;

/// Convert an HWPX file to a PDF file.
pub fn convert_hwpx_to_pdf(
    input: &Path,
    output: &Path,
    options: &GenerateOptions,
) -> Result<(), Error> {
    let t0 = Instant::now();

    let doc = hwpx::parse(input)?;
    let t_parse = t0.elapsed();

    write_pdf(&doc, output, options, t0, t_parse)
}

/// Convert an in-memory HWPX package to a PDF file.
pub fn convert_hwpx_bytes_to_pdf(
    input: &[u8],
    output: &Path,
    options: &GenerateOptions,
) -> Result<(), Error> {
    let t0 = Instant::now();

    let doc = hwpx::parse_bytes(input)?;
    let t_parse = t0.elapsed();

    write_pdf(&doc, output, options, t0, t_parse)
}

fn write_pdf(
    doc: &Document,
    output: &Path,
    options: &GenerateOptions,
    t0: Instant,
    t_parse: std::time::Duration,
) -> Result<(), Error> {
    let bytes = pdf::generate(doc, options)?;
    let t_render = t0.elapsed();

    std::fs::write(output, &bytes).map_err(Error::Io)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, render={:.1}ms, write={:.1}ms, total={:.1}ms (output {} bytes)",
        t_parse.as_secs_f64() * 1000.0,
        (t_render - t_parse).as_secs_f64() * 1000.0,
        (t_total - t_render).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        bytes.len(),
    );

    Ok(())
}

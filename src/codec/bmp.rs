use super::{Bitmap, Channels, CodecError, read_u16_le, read_u32_le};

const FILE_HEADER_LEN: usize = 14;
const CORE_HEADER_LEN: u32 = 12;
const INFO_HEADER_LEN: u32 = 40;

const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;
const BI_ALPHABITFIELDS: u32 = 6;

struct Header {
    width: u32,
    height: u32,
    top_down: bool,
    bpp: u16,
    compression: u32,
    colors_used: u32,
    dib_len: u32,
    palette_entry_len: usize,
}

fn read_header(data: &[u8]) -> Result<Header, CodecError> {
    if !data.starts_with(b"BM") {
        return Err(CodecError::Malformed("missing BM signature"));
    }
    let dib_len = read_u32_le(data, FILE_HEADER_LEN)?;
    if dib_len == CORE_HEADER_LEN {
        // OS/2 core header: unsigned 16-bit dimensions, always bottom-up, RGB triples.
        let width = read_u16_le(data, 18)? as u32;
        let height = read_u16_le(data, 20)? as u32;
        return Ok(Header {
            width,
            height,
            top_down: false,
            bpp: read_u16_le(data, 24)?,
            compression: BI_RGB,
            colors_used: 0,
            dib_len,
            palette_entry_len: 3,
        });
    }
    if dib_len < INFO_HEADER_LEN {
        return Err(CodecError::Malformed("unknown DIB header size"));
    }
    let width = read_u32_le(data, 18)? as i32;
    let height = read_u32_le(data, 22)? as i32;
    if width <= 0 || height == 0 {
        return Err(CodecError::Malformed("non-positive bitmap dimension"));
    }
    Ok(Header {
        width: width as u32,
        height: height.unsigned_abs(),
        top_down: height < 0,
        bpp: read_u16_le(data, 28)?,
        compression: read_u32_le(data, 30)?,
        colors_used: read_u32_le(data, 46)?,
        dib_len,
        palette_entry_len: 4,
    })
}

/// Channel masks for 32-bit bitfield images.
struct Masks {
    red: u32,
    green: u32,
    blue: u32,
    alpha: u32,
}

impl Masks {
    fn extract(mask: u32, px: u32) -> u8 {
        if mask == 0 {
            return 0;
        }
        let shift = mask.trailing_zeros();
        let bits = (mask >> shift).count_ones();
        let v = (px & mask) >> shift;
        if bits >= 8 {
            (v >> (bits - 8)) as u8
        } else {
            let max = (1u32 << bits) - 1;
            (v * 255 / max) as u8
        }
    }
}

fn read_masks(data: &[u8], header: &Header) -> Result<Masks, CodecError> {
    let at = FILE_HEADER_LEN + INFO_HEADER_LEN as usize;
    let alpha = if header.compression == BI_ALPHABITFIELDS || header.dib_len >= 56 {
        read_u32_le(data, at + 12)?
    } else {
        0
    };
    Ok(Masks {
        red: read_u32_le(data, at)?,
        green: read_u32_le(data, at + 4)?,
        blue: read_u32_le(data, at + 8)?,
        alpha,
    })
}

fn read_palette(data: &[u8], header: &Header) -> Result<Vec<[u8; 3]>, CodecError> {
    if header.bpp > 8 {
        return Ok(Vec::new());
    }
    let max = 1usize << header.bpp;
    let count = if header.colors_used > 0 {
        (header.colors_used as usize).min(max)
    } else {
        max
    };
    let start = FILE_HEADER_LEN + header.dib_len as usize;
    let mut palette = Vec::with_capacity(count);
    for i in 0..count {
        let at = start + i * header.palette_entry_len;
        let entry = data.get(at..at + 3).ok_or(CodecError::Truncated)?;
        palette.push([entry[2], entry[1], entry[0]]);
    }
    Ok(palette)
}

/// Decode an uncompressed 1/4/8/24/32-bit BMP into top-down pixels.
pub fn decode_bmp(data: &[u8]) -> Result<Bitmap, CodecError> {
    let header = read_header(data)?;
    if !matches!(header.bpp, 1 | 4 | 8 | 24 | 32) {
        return Err(CodecError::Malformed("unsupported bit depth"));
    }
    let masks = match header.compression {
        BI_RGB => None,
        BI_BITFIELDS | BI_ALPHABITFIELDS if header.bpp == 32 => Some(read_masks(data, &header)?),
        _ => return Err(CodecError::Malformed("compressed bitmaps are not supported")),
    };
    let palette = read_palette(data, &header)?;
    let pixel_offset = read_u32_le(data, 10)? as usize;

    let stride = ((header.bpp as u64 * header.width as u64).div_ceil(32) * 4) as usize;
    let mut rgba = Bitmap::new(header.width, header.height, Channels::Rgba)?;
    let mut alpha_nonzero = false;
    let mut alpha_translucent = false;

    for y in 0..header.height as usize {
        let src_row = if header.top_down {
            y
        } else {
            header.height as usize - 1 - y
        };
        let at = pixel_offset + src_row * stride;
        let row = data.get(at..at + stride).ok_or(CodecError::Truncated)?;
        for x in 0..header.width as usize {
            let px: [u8; 4] = match header.bpp {
                1 | 4 | 8 => {
                    let index = match header.bpp {
                        1 => (row[x / 8] >> (7 - (x % 8))) & 1,
                        4 if x % 2 == 0 => row[x / 2] >> 4,
                        4 => row[x / 2] & 0x0F,
                        _ => row[x],
                    };
                    let [r, g, b] = palette.get(index as usize).copied().unwrap_or([0, 0, 0]);
                    [r, g, b, 255]
                }
                24 => [row[x * 3 + 2], row[x * 3 + 1], row[x * 3], 255],
                _ => {
                    let b = &row[x * 4..x * 4 + 4];
                    let px = match &masks {
                        Some(m) => {
                            let v = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                            [
                                Masks::extract(m.red, v),
                                Masks::extract(m.green, v),
                                Masks::extract(m.blue, v),
                                if m.alpha == 0 { 255 } else { Masks::extract(m.alpha, v) },
                            ]
                        }
                        None => [b[2], b[1], b[0], b[3]],
                    };
                    alpha_nonzero |= px[3] != 0;
                    alpha_translucent |= px[3] != 255;
                    px
                }
            };
            let o = (y * header.width as usize + x) * 4;
            rgba.pixels[o..o + 4].copy_from_slice(&px);
        }
    }

    // A 32-bit bitmap whose alpha bytes are all zero carries no alpha at all.
    if header.bpp == 32 && alpha_nonzero && alpha_translucent {
        return Ok(rgba);
    }
    let pixels = rgba
        .pixels
        .chunks_exact(4)
        .flat_map(|p| [p[0], p[1], p[2]])
        .collect();
    Ok(Bitmap {
        width: rgba.width,
        height: rgba.height,
        channels: Channels::Rgb,
        pixels,
    })
}

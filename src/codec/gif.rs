use super::{Bitmap, Channels, CodecError, read_u16_le};

const EXTENSION: u8 = 0x21;
const IMAGE_DESCRIPTOR: u8 = 0x2C;
const TRAILER: u8 = 0x3B;
const GRAPHIC_CONTROL: u8 = 0xF9;
const MAX_CODE_SIZE: u32 = 12;

struct Frame {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
    interlaced: bool,
    palette: Vec<[u8; 3]>,
    indices: Vec<u8>,
}

fn read_palette(data: &[u8], at: usize, size_field: u8) -> Result<(Vec<[u8; 3]>, usize), CodecError> {
    let count = 1usize << ((size_field & 0x07) + 1);
    let bytes = data.get(at..at + count * 3).ok_or(CodecError::Truncated)?;
    let palette = bytes.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
    Ok((palette, at + count * 3))
}

/// Concatenate data sub-blocks starting at `at`; returns the payload and the offset past the terminator.
fn read_sub_blocks(data: &[u8], mut at: usize) -> Result<(Vec<u8>, usize), CodecError> {
    let mut out = Vec::new();
    loop {
        let len = *data.get(at).ok_or(CodecError::Truncated)? as usize;
        at += 1;
        if len == 0 {
            return Ok((out, at));
        }
        out.extend_from_slice(data.get(at..at + len).ok_or(CodecError::Truncated)?);
        at += len;
    }
}

/// Variable-width LZW decoder as used by GIF: codes are packed LSB-first.
pub(crate) fn lzw_decode(data: &[u8], min_code_size: u8, expected: usize) -> Result<Vec<u8>, CodecError> {
    if !(1..=11).contains(&min_code_size) {
        return Err(CodecError::Malformed("invalid LZW code size"));
    }
    let clear = 1u32 << min_code_size;
    let end = clear + 1;

    // Each entry is (prefix code, last byte, first byte, length).
    let mut prefix: Vec<u16> = vec![0; 4096];
    let mut suffix: Vec<u8> = vec![0; 4096];
    let mut first: Vec<u8> = vec![0; 4096];
    let mut length: Vec<u16> = vec![0; 4096];
    for code in 0..clear {
        suffix[code as usize] = code as u8;
        first[code as usize] = code as u8;
        length[code as usize] = 1;
    }

    let mut out = Vec::with_capacity(expected);
    let mut code_size = min_code_size as u32 + 1;
    let mut next_code = end + 1;
    let mut prev: Option<u32> = None;
    let mut bit_buf = 0u32;
    let mut bit_count = 0u32;
    let mut bytes = data.iter();
    let mut scratch = Vec::new();

    loop {
        while bit_count < code_size {
            let Some(&b) = bytes.next() else {
                // Data ran out without an end code; keep what was decoded.
                return Ok(out);
            };
            bit_buf |= (b as u32) << bit_count;
            bit_count += 8;
        }
        let code = bit_buf & ((1 << code_size) - 1);
        bit_buf >>= code_size;
        bit_count -= code_size;

        if code == clear {
            code_size = min_code_size as u32 + 1;
            next_code = end + 1;
            prev = None;
            continue;
        }
        if code == end {
            break;
        }

        let Some(p) = prev else {
            if code >= clear {
                return Err(CodecError::Malformed("LZW stream starts with a non-literal"));
            }
            out.push(code as u8);
            prev = Some(code);
            continue;
        };

        let emitted_first = if code < next_code {
            emit(code, &prefix, &suffix, &length, &mut scratch, &mut out);
            first[code as usize]
        } else if code == next_code {
            // The KwKwK case: the new entry is prev + first(prev).
            let f = first[p as usize];
            emit(p, &prefix, &suffix, &length, &mut scratch, &mut out);
            out.push(f);
            f
        } else {
            return Err(CodecError::Malformed("LZW code out of range"));
        };

        if next_code < 4096 {
            let n = next_code as usize;
            prefix[n] = p as u16;
            suffix[n] = emitted_first;
            first[n] = first[p as usize];
            length[n] = length[p as usize] + 1;
            next_code += 1;
            if next_code == (1 << code_size) && code_size < MAX_CODE_SIZE {
                code_size += 1;
            }
        }
        prev = Some(code);

        if out.len() >= expected {
            break;
        }
    }
    Ok(out)
}

fn emit(code: u32, prefix: &[u16], suffix: &[u8], length: &[u16], scratch: &mut Vec<u8>, out: &mut Vec<u8>) {
    scratch.clear();
    let mut c = code as usize;
    for _ in 0..length[code as usize] {
        scratch.push(suffix[c]);
        c = prefix[c] as usize;
    }
    out.extend(scratch.iter().rev());
}

/// Storage-order row → display row for a 4-pass interlaced frame.
pub(crate) fn interlaced_rows(height: u32) -> Vec<u32> {
    let mut rows = Vec::with_capacity(height as usize);
    for (start, step) in [(0, 8), (4, 8), (2, 4), (1, 2)] {
        let mut y = start;
        while y < height {
            rows.push(y);
            y += step;
        }
    }
    rows
}

/// Decode the first frame of a GIF87a/GIF89a stream.
pub fn decode_gif(data: &[u8]) -> Result<Bitmap, CodecError> {
    if !(data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a")) {
        return Err(CodecError::Malformed("missing GIF signature"));
    }
    let screen_w = read_u16_le(data, 6)? as u32;
    let screen_h = read_u16_le(data, 8)? as u32;
    let flags = *data.get(10).ok_or(CodecError::Truncated)?;
    let background = *data.get(11).ok_or(CodecError::Truncated)?;
    let mut at = 13;
    let mut global = Vec::new();
    if flags & 0x80 != 0 {
        let (palette, next) = read_palette(data, at, flags)?;
        global = palette;
        at = next;
    }

    let mut transparent: Option<u8> = None;
    let frame = loop {
        match *data.get(at).ok_or(CodecError::Truncated)? {
            EXTENSION => {
                let label = *data.get(at + 1).ok_or(CodecError::Truncated)?;
                let (payload, next) = read_sub_blocks(data, at + 2)?;
                if label == GRAPHIC_CONTROL && payload.len() >= 4 && payload[0] & 0x01 != 0 {
                    transparent = Some(payload[3]);
                }
                at = next;
            }
            IMAGE_DESCRIPTOR => {
                let left = read_u16_le(data, at + 1)? as u32;
                let top = read_u16_le(data, at + 3)? as u32;
                let width = read_u16_le(data, at + 5)? as u32;
                let height = read_u16_le(data, at + 7)? as u32;
                let packed = *data.get(at + 9).ok_or(CodecError::Truncated)?;
                at += 10;
                let palette = if packed & 0x80 != 0 {
                    let (palette, next) = read_palette(data, at, packed)?;
                    at = next;
                    palette
                } else {
                    global.clone()
                };
                let min_code_size = *data.get(at).ok_or(CodecError::Truncated)?;
                let (lzw, _) = read_sub_blocks(data, at + 1)?;
                let expected = width as usize * height as usize;
                let indices = lzw_decode(&lzw, min_code_size, expected)?;
                break Frame {
                    left,
                    top,
                    width,
                    height,
                    interlaced: packed & 0x40 != 0,
                    palette,
                    indices,
                };
            }
            TRAILER => return Err(CodecError::Malformed("GIF contains no image")),
            _ => return Err(CodecError::Malformed("unknown GIF block")),
        }
    };

    if frame.palette.is_empty() {
        return Err(CodecError::Malformed("GIF has no color table"));
    }
    let width = if screen_w > 0 { screen_w } else { frame.width };
    let height = if screen_h > 0 { screen_h } else { frame.height };
    let channels = if transparent.is_some() {
        Channels::Rgba
    } else {
        Channels::Rgb
    };
    let mut bitmap = Bitmap::new(width, height, channels)?;
    let n = channels.count();

    if transparent.is_none() {
        let bg = global.get(background as usize).copied().unwrap_or([255, 255, 255]);
        for px in bitmap.pixels.chunks_exact_mut(3) {
            px.copy_from_slice(&bg);
        }
    }

    let row_order: Vec<u32> = if frame.interlaced {
        interlaced_rows(frame.height)
    } else {
        (0..frame.height).collect()
    };
    for (stored, &display_row) in row_order.iter().enumerate() {
        let y = frame.top + display_row;
        if y >= height {
            continue;
        }
        for fx in 0..frame.width {
            let x = frame.left + fx;
            if x >= width {
                continue;
            }
            // Short streams leave the remaining pixels at the background.
            let Some(&index) = frame.indices.get(stored * frame.width as usize + fx as usize) else {
                continue;
            };
            let o = (y as usize * width as usize + x as usize) * n;
            if Some(index) == transparent {
                continue;
            }
            let [r, g, b] = frame.palette.get(index as usize).copied().unwrap_or([0, 0, 0]);
            bitmap.pixels[o] = r;
            bitmap.pixels[o + 1] = g;
            bitmap.pixels[o + 2] = b;
            if n == 4 {
                bitmap.pixels[o + 3] = 255;
            }
        }
    }
    Ok(bitmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x2 image with a 4-entry global table; codes clear,0,1,2,3,end.
    fn four_color_gif() -> Vec<u8> {
        let mut gif = Vec::new();
        gif.extend_from_slice(b"GIF89a");
        gif.extend_from_slice(&[2, 0, 2, 0, 0x81, 0, 0]);
        gif.extend_from_slice(&[255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255]);
        gif.extend_from_slice(&[0x2C, 0, 0, 0, 0, 2, 0, 2, 0, 0]);
        gif.extend_from_slice(&[2, 3, 0x44, 0x34, 0x05, 0]);
        gif.push(0x3B);
        gif
    }

    #[test]
    fn decodes_palette_image() {
        let bmp = decode_gif(&four_color_gif()).unwrap();
        assert_eq!((bmp.width, bmp.height), (2, 2));
        assert_eq!(bmp.channels, Channels::Rgb);
        assert_eq!(
            bmp.pixels,
            vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255]
        );
    }

    #[test]
    fn transparency_index_yields_alpha() {
        let gif: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00\
            \x21\xf9\x04\x01\x00\x00\x00\x00\
            \x2c\x00\x00\x00\x00\x01\x00\x01\x00\x00\
            \x02\x02\x44\x01\x00\x3b";
        let bmp = decode_gif(gif).unwrap();
        assert_eq!(bmp.channels, Channels::Rgba);
        assert_eq!(bmp.rgba_at(0, 0)[3], 0);
    }

    #[test]
    fn interlace_pass_order() {
        assert_eq!(interlaced_rows(4), vec![0, 2, 1, 3]);
        assert_eq!(interlaced_rows(10), vec![0, 8, 4, 2, 6, 1, 3, 5, 7, 9]);
    }

    #[test]
    fn lzw_repeated_run() {
        // clear, 1, 6 (KwKwK: "1 1"), end with min code size 2.
        // Bits: 100 001 110 101 packed LSB-first.
        let data = [0b1000_1100, 0b0000_1011];
        let out = lzw_decode(&data, 2, 3).unwrap();
        assert_eq!(out, vec![1, 1, 1]);
    }

    #[test]
    fn missing_image_is_malformed() {
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00\x3b";
        assert!(matches!(decode_gif(gif), Err(CodecError::Malformed(_))));
    }
}

use super::{Bitmap, Channels};

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// Reflected CRC-32 (polynomial 0xEDB88320) over the concatenation of `parts`.
pub fn crc32(parts: &[&[u8]]) -> u32 {
    let mut c = 0xFFFF_FFFFu32;
    for part in parts {
        for &b in *part {
            c = CRC_TABLE[((c ^ b as u32) & 0xFF) as usize] ^ (c >> 8);
        }
    }
    c ^ 0xFFFF_FFFF
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out.extend_from_slice(&crc32(&[kind.as_slice(), payload]).to_be_bytes());
}

/// Encode as an 8-bit RGB/RGBA PNG with one IDAT of unfiltered scanlines.
pub fn encode_png(bitmap: &Bitmap) -> Vec<u8> {
    let color_type = match bitmap.channels {
        Channels::Rgb => 2u8,
        Channels::Rgba => 6u8,
    };
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&bitmap.width.to_be_bytes());
    ihdr.extend_from_slice(&bitmap.height.to_be_bytes());
    ihdr.extend_from_slice(&[8, color_type, 0, 0, 0]);

    let row_len = bitmap.width as usize * bitmap.channels.count();
    let mut raw = Vec::with_capacity((row_len + 1) * bitmap.height as usize);
    for row in bitmap.pixels.chunks_exact(row_len) {
        raw.push(0);
        raw.extend_from_slice(row);
    }
    let idat = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);

    let mut out = Vec::with_capacity(SIGNATURE.len() + idat.len() + 64);
    out.extend_from_slice(&SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr);
    write_chunk(&mut out, b"IDAT", &idat);
    write_chunk(&mut out, b"IEND", &[]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_check_values() {
        assert_eq!(crc32(&[&b"123456789"[..]]), 0xCBF4_3926);
        assert_eq!(crc32(&[&b"IEND"[..]]), 0xAE42_6082);
        assert_eq!(crc32(&[&b"1234"[..], &b"56789"[..]]), 0xCBF4_3926);
    }

    #[test]
    fn chunk_layout() {
        let bitmap = Bitmap {
            width: 1,
            height: 1,
            channels: Channels::Rgba,
            pixels: vec![1, 2, 3, 4],
        };
        let png = encode_png(&bitmap);
        assert_eq!(&png[..8], &SIGNATURE);
        assert_eq!(&png[8..12], &13u32.to_be_bytes());
        assert_eq!(&png[12..16], b"IHDR");
        assert_eq!(&png[16..20], &1u32.to_be_bytes());
        assert_eq!(png[24], 8);
        assert_eq!(png[25], 6);
        assert_eq!(&png[png.len() - 12..], &[0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82]);
    }

    #[test]
    fn idat_inflates_to_filtered_rows() {
        let bitmap = Bitmap {
            width: 2,
            height: 1,
            channels: Channels::Rgb,
            pixels: vec![9, 8, 7, 6, 5, 4],
        };
        let png = encode_png(&bitmap);
        let idat_len = u32::from_be_bytes([png[33], png[34], png[35], png[36]]) as usize;
        assert_eq!(&png[37..41], b"IDAT");
        let inflated = miniz_oxide::inflate::decompress_to_vec_zlib(&png[41..41 + idat_len]).unwrap();
        assert_eq!(inflated, vec![0, 9, 8, 7, 6, 5, 4]);
    }
}

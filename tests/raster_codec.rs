mod common;

use hwpx_pdf::{CodecError, RasterFormat, decode_bmp, to_png};

/// 1×1 GIF whose only pixel is palette entry 0 (red).
const RED_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\x00\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

#[test]
fn bmp_transcodes_to_an_equivalent_png() {
    let bmp = common::bmp_24(5, 3, |x, y| [(x * 50) as u8, (y * 100) as u8, 7]);
    let png = to_png(&bmp).expect("transcode");
    assert_eq!(RasterFormat::detect(&png), RasterFormat::Png);

    let decoded = image::load_from_memory(&png).expect("valid PNG").to_rgba8();
    assert_eq!(decoded.dimensions(), (5, 3));
    let bitmap = decode_bmp(&bmp).unwrap();
    for y in 0..3 {
        for x in 0..5 {
            assert_eq!(decoded.get_pixel(x, y).0, bitmap.rgba_at(x, y), "pixel ({x}, {y})");
            assert_eq!(decoded.get_pixel(x, y).0, [(x * 50) as u8, (y * 100) as u8, 7, 255]);
        }
    }
}

#[test]
fn gif_transcodes_to_png() {
    let png = to_png(RED_GIF).expect("transcode");
    let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (1, 1));
    assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
}

#[test]
fn png_passes_through_and_metafiles_are_refused() {
    let png = to_png(&common::bmp_24(1, 1, |_, _| [0, 0, 0])).unwrap();
    assert_eq!(to_png(&png).unwrap(), png);

    let mut emf = vec![0u8; 64];
    emf[0] = 1;
    emf[40..44].copy_from_slice(b" EMF");
    assert_eq!(RasterFormat::detect(&emf), RasterFormat::Emf);
    assert_eq!(to_png(&emf), Err(CodecError::Unsupported(RasterFormat::Emf)));
}

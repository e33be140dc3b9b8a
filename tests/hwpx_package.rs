mod common;

use std::path::Path;

use common::{RecordingCanvas, bmp_24, hwpx_package, section_xml};
use hwpx_pdf::{Error, GenerateOptions, NoSystemFonts};
use rayon::prelude::*;

const HEADER: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<hh:head xmlns:hh="http://www.hancom.co.kr/hwpml/2011/head" xmlns:hc="http://www.hancom.co.kr/hwpml/2011/core">
  <hh:beginNum page="1"/>
  <hh:refList>
    <hh:fontfaces>
      <hh:fontface lang="HANGUL"><hh:font id="0" face="함초롬바탕"/></hh:fontface>
      <hh:fontface lang="LATIN"><hh:font id="0" face="함초롬바탕"/></hh:fontface>
    </hh:fontfaces>
    <hh:borderFills>
      <hh:borderFill id="1">
        <hh:leftBorder type="SOLID" width="0.12 mm" color="#000000"/>
        <hh:rightBorder type="SOLID" width="0.12 mm" color="#000000"/>
        <hh:topBorder type="SOLID" width="0.12 mm" color="#000000"/>
        <hh:bottomBorder type="SOLID" width="0.12 mm" color="#000000"/>
      </hh:borderFill>
    </hh:borderFills>
    <hh:charProperties>
      <hh:charPr id="0" height="1000" textColor="#000000" shadeColor="none"><hh:fontRef hangul="0" latin="0"/></hh:charPr>
    </hh:charProperties>
    <hh:paraProperties>
      <hh:paraPr id="0"><hh:align horizontal="LEFT"/><hh:lineSpacing type="PERCENT" value="160"/></hh:paraPr>
      <hh:paraPr id="1"><hh:align horizontal="LEFT"/><hh:heading type="NUMBER" idRef="1" level="0"/><hh:lineSpacing type="PERCENT" value="160"/></hh:paraPr>
    </hh:paraProperties>
    <hh:numberings>
      <hh:numbering id="1"><hh:paraHead start="1" level="1" numFormat="DIGIT">^1.</hh:paraHead></hh:numbering>
    </hh:numberings>
  </hh:refList>
</hh:head>"##;

fn cell(col: u32, text: &str) -> String {
    format!(
        r#"<hp:tc borderFillIDRef="1"><hp:subList vertAlign="TOP"><hp:p paraPrIDRef="0"><hp:run charPrIDRef="0"><hp:t>{text}</hp:t></hp:run></hp:p></hp:subList>
           <hp:cellAddr colAddr="{col}" rowAddr="0"/><hp:cellSpan colSpan="1" rowSpan="1"/><hp:cellSz width="10000" height="1500"/></hp:tc>"#
    )
}

fn sample_package() -> Vec<u8> {
    let body = format!(
        r#"<hp:p paraPrIDRef="1"><hp:run charPrIDRef="0"><hp:t>Intro</hp:t></hp:run></hp:p>
           <hp:p paraPrIDRef="1"><hp:run charPrIDRef="0"><hp:t>Details</hp:t>
             <hp:ctrl><hp:footNote><hp:subList><hp:p><hp:run><hp:t>see appendix</hp:t></hp:run></hp:p></hp:subList></hp:footNote></hp:ctrl>
           </hp:run></hp:p>
           <hp:p paraPrIDRef="0"><hp:run charPrIDRef="0">
             <hp:tbl rowCnt="1" colCnt="2" borderFillIDRef="1"><hp:sz width="20000" height="1500"/><hp:pos treatAsChar="1"/>
               <hp:tr>{}{}</hp:tr>
             </hp:tbl>
           </hp:run></hp:p>
           <hp:p paraPrIDRef="0"><hp:run charPrIDRef="0">
             <hp:pic><hp:sz width="7200" height="3600"/><hp:pos treatAsChar="1"/><hc:img binaryItemIDRef="image1"/></hp:pic>
           </hp:run></hp:p>"#,
        cell(0, "cellA"),
        cell(1, "cellB"),
    );
    let bmp = bmp_24(4, 2, |x, _| if x < 2 { [255, 0, 0] } else { [0, 0, 255] });
    hwpx_package(Some(HEADER), &[section_xml(&body)], &[("image1", "BinData/image1.bmp", bmp.as_slice())])
}

fn options() -> GenerateOptions {
    GenerateOptions {
        use_system_fonts: false,
        ..GenerateOptions::default()
    }
}

#[test]
fn package_lays_out_numbering_tables_images_and_notes() {
    let doc = hwpx_pdf::parse_hwpx_bytes(&sample_package()).expect("parse package");
    assert_eq!(doc.sections.len(), 1);
    assert_eq!(doc.images.len(), 1);

    let mut canvas = RecordingCanvas::default();
    let summary = hwpx_pdf::render_into(&doc, &mut canvas, &options(), &NoSystemFonts).unwrap();
    assert_eq!(summary.pages.len(), 1);
    assert_eq!(summary.pages[0].footnotes, vec![1]);

    let one = canvas.find("1.").expect("first heading number");
    let two = canvas.find("2.").expect("second heading number");
    assert!(two.y < one.y);
    assert!(canvas.find("Intro").unwrap().x > one.x);

    let a = canvas.find("cellA").unwrap();
    let b = canvas.find("cellB").unwrap();
    assert!(b.x > a.x);
    assert!((a.y - b.y).abs() < 0.01);
    assert!(a.y < canvas.find("Details").unwrap().y);
    assert!(canvas.lines.len() >= 4, "cell borders drawn");

    assert_eq!(canvas.images.len(), 1);
    let (_, _, _, y, w, h) = canvas.images[0];
    assert_eq!((w, h), (72.0, 36.0));
    assert!(y + h < a.y, "picture sits below the table");

    let note = canvas.find("see appendix").expect("footnote lines are drawn whole");
    assert!(note.y < summary.pages[0].body_floor + summary.pages[0].footnote_reserve);
}

#[test]
fn generated_pdf_is_complete_and_deterministic() {
    let data = sample_package();
    let doc = hwpx_pdf::parse_hwpx_bytes(&data).unwrap();
    let first = hwpx_pdf::generate(&doc, &options()).unwrap();
    assert!(first.starts_with(b"%PDF-"));
    assert!(first.windows(5).any(|w| w == b"%%EOF"));

    let runs: Vec<Vec<u8>> = (0..4)
        .into_par_iter()
        .map(|_| {
            let doc = hwpx_pdf::parse_hwpx_bytes(&data).unwrap();
            hwpx_pdf::generate(&doc, &options()).unwrap()
        })
        .collect();
    for bytes in &runs {
        assert_eq!(bytes, &first);
    }
}

#[test]
fn conversion_writes_the_output_file() {
    let out = std::env::temp_dir().join(format!("hwpx-pdf-test-{}.pdf", std::process::id()));
    hwpx_pdf::convert_hwpx_bytes_to_pdf(&sample_package(), &out, &options()).unwrap();
    let bytes = std::fs::read(&out).unwrap();
    std::fs::remove_file(&out).ok();
    assert!(bytes.starts_with(b"%PDF-"));
}

#[test]
fn unreadable_inputs_are_reported() {
    let missing = hwpx_pdf::convert_hwpx_to_pdf(
        Path::new("does/not/exist.hwpx"),
        Path::new("unused.pdf"),
        &options(),
    );
    assert!(matches!(missing, Err(Error::Io(_))));
    assert!(matches!(hwpx_pdf::parse_hwpx_bytes(b"PK but not really"), Err(Error::InvalidHwpx(_))));
}

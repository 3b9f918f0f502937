// 戦略の実行順: FlateDecode -> DCTDecode -> JPEGバイナリ走査 -> 見つからない

use std::io::Write;
use std::time::{Duration, Instant};

use cv_photo_extract::config::ExtractionLimits;
use cv_photo_extract::pdf::flate::extract_flate_image;
use cv_photo_extract::photo::{MIME_JPEG, MIME_PNG, PhotoExtractor, PhotoSource, Strategy};
use cv_photo_extract::{extract_pdf_photo, extract_photo};
use flate2::Compression;
use flate2::write::ZlibEncoder;

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).expect("compress");
    enc.finish().expect("compress")
}

fn flate_image_object(width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
    let stream = zlib(pixels);
    let mut out = format!(
        "<< /Type /XObject /Subtype /Image /Width {width} /Height {height} /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /FlateDecode /Length {} >>\nstream\n",
        stream.len()
    )
    .into_bytes();
    out.extend_from_slice(&stream);
    out.extend_from_slice(b"\nendstream");
    out
}

fn dct_image_object(length_entry: &str, jpeg: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "<< /Type /XObject /Subtype /Image /Width 120 /Height 120 /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode /Length {length_entry} >>\r\nstream\r\n"
    )
    .into_bytes();
    out.extend_from_slice(jpeg);
    out.extend_from_slice(b"\r\nendstream");
    out
}

fn build_pdf(objects: &[Vec<u8>]) -> Vec<u8> {
    let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    for (i, body) in objects.iter().enumerate() {
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }
    out.extend_from_slice(b"trailer\n<< /Root 1 0 R >>\n%%EOF\n");
    out
}

/// SOI/EOIで囲まれたダミーJPEG
fn fake_jpeg(len: usize) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE0];
    out.extend((0..len - 6).map(|i| (i % 97) as u8));
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// imageクレートでエンコードした本物のJPEG
fn real_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut state = 0xDEAD_BEEFu32;
    let raw: Vec<u8> = (0..width * height * 3)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect();
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 90)
        .encode(&raw, width, height, image::ExtendedColorType::Rgb8)
        .expect("encode test JPEG");
    buf
}

// ============================================================
// 1. 実行順
// ============================================================

#[test]
fn test_flate_preferred_over_dct() {
    let jpeg = fake_jpeg(50_000);
    let pdf = build_pdf(&[
        dct_image_object(&jpeg.len().to_string(), &jpeg),
        flate_image_object(64, 64, &vec![200; 64 * 64 * 3]),
    ]);

    let photo = extract_pdf_photo(&pdf).expect("photo");
    assert_eq!(photo.source, PhotoSource::Flate);
    assert_eq!(photo.mime_type, MIME_PNG);

    let decoded = image::load_from_memory(&photo.data).expect("decode PNG");
    assert_eq!((decoded.width(), decoded.height()), (64, 64));
}

#[test]
fn test_dct_used_when_no_flate_image() {
    let jpeg = fake_jpeg(5000);
    let pdf = build_pdf(&[dct_image_object("5000", &jpeg)]);

    let photo = extract_pdf_photo(&pdf).expect("photo");
    assert_eq!(photo.source, PhotoSource::Dct);
    assert_eq!(photo.mime_type, MIME_JPEG);
    assert_eq!(photo.data, jpeg, "JPEG must be returned byte-for-byte");
}

#[test]
fn test_binary_scan_used_when_length_is_indirect() {
    let jpeg = fake_jpeg(5000);
    let pdf = build_pdf(&[dct_image_object("9 0 R", &jpeg), b"5000".to_vec()]);

    let extractor = PhotoExtractor::default();
    assert!(extractor.run_strategy(Strategy::Dct, &pdf).is_none());

    let photo = extractor.extract_pdf(&pdf).expect("photo");
    assert_eq!(photo.source, PhotoSource::BinaryScan);
    assert_eq!(photo.data, jpeg);
}

#[test]
fn test_small_flate_image_falls_through_to_dct() {
    let jpeg = fake_jpeg(3000);
    let pdf = build_pdf(&[
        flate_image_object(20, 20, &vec![0; 20 * 20 * 3]),
        dct_image_object("3000", &jpeg),
    ]);
    let photo = extract_pdf_photo(&pdf).expect("photo");
    assert_eq!(photo.source, PhotoSource::Dct);
}

#[test]
fn test_real_jpeg_roundtrips_through_dct() {
    let jpeg = real_jpeg(120, 120);
    assert!(jpeg.len() >= 2048, "fixture must exceed the JPEG floor");
    let pdf = build_pdf(&[dct_image_object(&jpeg.len().to_string(), &jpeg)]);

    let photo = extract_pdf_photo(&pdf).expect("photo");
    assert_eq!(photo.source, PhotoSource::Dct);
    let decoded = image::load_from_memory(&photo.data).expect("decode JPEG");
    assert_eq!((decoded.width(), decoded.height()), (120, 120));
}

// ============================================================
// 2. 写真が無い文書
// ============================================================

#[test]
fn test_document_without_images_is_not_found() {
    let mut pdf = b"%PDF-1.4\n".to_vec();
    for i in 0..20_000 {
        pdf.extend_from_slice(
            format!("{i} 0 obj\n<< /Type /Page /Parent 1 0 R /Contents {i} 0 R >>\nendobj\n")
                .as_bytes(),
        );
    }
    pdf.extend_from_slice(b"%%EOF\n");

    let started = Instant::now();
    assert!(extract_pdf_photo(&pdf).is_none());
    assert!(
        started.elapsed() < Duration::from_secs(20),
        "scan of {} bytes took {:?}",
        pdf.len(),
        started.elapsed()
    );
}

#[test]
fn test_tiny_jpeg_like_spans_are_not_found() {
    let pdf = build_pdf(&[fake_jpeg(500), fake_jpeg(1000)]);
    assert!(extract_pdf_photo(&pdf).is_none());
}

#[test]
fn test_unbalanced_dictionaries_do_not_hang() {
    let mut pdf = Vec::new();
    for _ in 0..20_000 {
        pdf.extend_from_slice(b"<< /Subtype /Image ");
    }
    let started = Instant::now();
    assert!(extract_pdf_photo(&pdf).is_none());
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[test]
fn test_many_unterminated_streams_scan_in_linear_time() {
    // 終端が文書末尾に1つしかない候補を大量に並べる
    let mut pdf = Vec::new();
    for i in 0..20_000 {
        pdf.extend_from_slice(
            format!(
                "<</Subtype/Image/Width {}/Height 50/ColorSpace/DeviceGray/Filter/FlateDecode>>\nstream\nX",
                50 + i
            )
            .as_bytes(),
        );
    }
    pdf.extend_from_slice(b"\nendstream");

    let started = Instant::now();
    assert!(extract_flate_image(&pdf, &ExtractionLimits::default()).is_none());
    assert!(extract_pdf_photo(&pdf).is_none());
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "scan of {} bytes took {:?}",
        pdf.len(),
        started.elapsed()
    );
}

// ============================================================
// 3. MIMEタイプによる振り分け
// ============================================================

#[test]
fn test_extract_photo_routes_pdf() {
    let jpeg = fake_jpeg(4000);
    let pdf = build_pdf(&[dct_image_object("4000", &jpeg)]);
    let photo = extract_photo(&pdf, "application/pdf", &ExtractionLimits::default())
        .expect("no error")
        .expect("photo");
    assert_eq!(photo.source, PhotoSource::Dct);

    let data_url = photo.to_data_url();
    assert!(data_url.starts_with("data:image/jpeg;base64,/9j/"));
}

#[test]
fn test_extract_photo_unknown_mime_is_none() {
    let jpeg = fake_jpeg(4000);
    let result = extract_photo(&jpeg, "image/jpeg", &ExtractionLimits::default());
    assert!(matches!(result, Ok(None)));
}

// ============================================================
// 4. 汎用PDFライブラリで生成した文書
// ============================================================

#[test]
fn test_pdf_written_by_lopdf() {
    use lopdf::{Document, Object, Stream, dictionary};

    let (w, h) = (90u32, 110u32);
    let pixels: Vec<u8> = (0..w * h).map(|i| (i % 256) as u8).collect();

    // lopdfの書き出しで終端が `\nendstream` になるよう改行を足す
    let mut content = zlib(&pixels);
    content.push(b'\n');

    let mut doc = Document::with_version("1.4");
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        content,
    ));
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        b"q 90 0 0 110 0 0 cm /Im1 Do Q".to_vec(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(595),
            Object::Integer(842),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im1" => image_id },
        },
    });
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => Object::Integer(1),
    });
    if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
        dict.set("Parent", pages_id);
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save PDF");

    let photo = extract_pdf_photo(&bytes).expect("photo");
    assert_eq!(photo.source, PhotoSource::Flate);
    let decoded = image::load_from_memory(&photo.data).expect("decode PNG");
    assert_eq!((decoded.width(), decoded.height()), (w, h));
    assert_eq!(decoded.into_luma8().into_raw(), pixels);
}

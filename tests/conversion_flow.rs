// End-to-end checks through the public manager API with the real infer sniffer.
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, Rgba};

use image_converter::converter::{BoxError, HeicBackend, HeicBackendFactory, HeicOutput};
use image_converter::progress::IdentityMessages;
use image_converter::sniff::{FormatSniffer, SniffedFormat};
use image_converter::{
    CancelFlag, ChannelProgressSink, ConvertError, ConverterConfig, ConverterRegistry,
    FormatDescriptor, HeicConverter, HostEnvironment, ImageConverterManager, NoopProgress,
    OutputFormat, RawImageBlob, StaticCapabilities,
};

fn tiff_bytes(image: DynamicImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Tiff)
        .expect("tiff encode");
    cursor.into_inner()
}

fn sample_tiff() -> Vec<u8> {
    let img = ImageBuffer::from_fn(16, 8, |x, y| Rgb([(x * 15) as u8, (y * 30) as u8, 90u8]));
    tiff_bytes(DynamicImage::ImageRgb8(img))
}

fn sample_png() -> Vec<u8> {
    let img = ImageBuffer::from_fn(4, 4, |_, _| Rgba([10u8, 20, 30, 255]));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("png encode");
    cursor.into_inner()
}

#[tokio::test]
async fn tiff_becomes_jpeg() {
    let manager = ImageConverterManager::with_config(&ConverterConfig::default());
    let blob = RawImageBlob::new(sample_tiff());

    let result = manager
        .convert_image(&blob, "scan.tif", &NoopProgress)
        .await
        .expect("conversion ok")
        .expect("tiff needs conversion");

    assert_eq!(result.output_format.mime_type, "image/jpeg");
    assert_eq!(result.output.mime_type(), "image/jpeg");
    assert!(result.converted_size_bytes > 0);
    assert_eq!(result.converted_size_bytes, result.output.as_bytes().len() as u64);
    assert_eq!(result.original_size_bytes, blob.size_bytes());
    assert_eq!(&result.output.as_bytes()[..2], &[0xFF, 0xD8]);

    let decoded = image::load_from_memory(result.output.as_bytes()).expect("valid jpeg");
    assert_eq!((decoded.width(), decoded.height()), (16, 8));
}

#[tokio::test]
async fn tiff_becomes_png_when_configured() {
    let config = ConverterConfig {
        output_format: OutputFormat::Png,
        ..ConverterConfig::default()
    };
    let manager = ImageConverterManager::with_config(&config);
    let blob = RawImageBlob::new(sample_tiff());

    let result = manager.convert(&blob, "scan.tif").await.unwrap().unwrap();
    assert_eq!(result.output_format.mime_type, "image/png");

    let decoded = image::load_from_memory(result.output.as_bytes()).unwrap();
    let pixel = decoded.to_rgba8().get_pixel(1, 1).0;
    assert_eq!(pixel, [15, 30, 90, 255]);
}

#[tokio::test]
async fn png_passes_through() {
    let manager = ImageConverterManager::with_config(&ConverterConfig::default());
    let blob = RawImageBlob::new(sample_png());

    assert!(manager.find_suitable_strategy(&blob).await.is_none());
    assert!(manager.convert(&blob, "a.png").await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_bytes_pass_through() {
    let manager = ImageConverterManager::with_config(&ConverterConfig::default());
    let blob = RawImageBlob::new(b"definitely not an image".to_vec());

    assert!(manager.convert(&blob, "a.bin").await.unwrap().is_none());
}

#[tokio::test]
async fn tiff_header_without_ifd_fails_and_keeps_blob() {
    let manager = ImageConverterManager::with_config(&ConverterConfig::default());
    let mut bytes = vec![0x49, 0x49, 0x2A, 0x00];
    bytes.resize(16, 0);
    let blob = RawImageBlob::new(bytes.clone());

    let err = manager.convert(&blob, "broken.tif").await.unwrap_err();
    assert!(matches!(err, ConvertError::DecodeFailed { format: "TIFF", .. }));
    assert_eq!(err.code(), "E_DECODE");
    assert_eq!(blob.as_bytes(), bytes.as_slice());
}

#[tokio::test]
async fn safari_renders_tiff_itself() {
    let config = ConverterConfig {
        host: HostEnvironment::Safari,
        ..ConverterConfig::default()
    };
    let manager = ImageConverterManager::with_config(&config);
    let blob = RawImageBlob::new(sample_tiff());

    assert!(manager.convert(&blob, "scan.tif").await.unwrap().is_none());
}

#[tokio::test]
async fn progress_is_forwarded_in_order() {
    let manager = ImageConverterManager::with_config(&ConverterConfig::default());
    let blob = RawImageBlob::new(sample_tiff());
    let (sink, mut events) = ChannelProgressSink::new();

    manager
        .convert_image(&blob, "scan.tif", &sink)
        .await
        .unwrap()
        .unwrap();
    drop(sink);

    let mut percents = Vec::new();
    while let Some(event) = events.recv().await {
        assert!(event.is_converting);
        percents.push(event.progress_percent);
    }
    assert_eq!(percents, vec![Some(0), Some(50), Some(75)]);
}

#[tokio::test]
async fn cancelled_before_start() {
    let manager = ImageConverterManager::with_config(&ConverterConfig::default());
    let blob = RawImageBlob::new(sample_tiff());
    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = manager
        .convert_image_with_cancel(&blob, "scan.tif", &NoopProgress, cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::Cancelled(_)));
}

#[test]
fn registry_management() {
    let manager = ImageConverterManager::with_config(&ConverterConfig::default());

    assert!(!manager.remove_converter("nonexistent"));
    assert_eq!(manager.list_converters().len(), 2);

    assert!(manager.remove_converter("TIFF"));
    let formats = manager.list_supported_formats();
    assert!(!formats.contains("image/tiff"));
    assert!(formats.contains("image/heic"));
}

#[tokio::test]
async fn removed_tiff_converter_means_no_conversion() {
    let manager = ImageConverterManager::with_config(&ConverterConfig::default());
    manager.remove_converter("TIFF");
    let blob = RawImageBlob::new(sample_tiff());

    assert!(manager.convert(&blob, "scan.tif").await.unwrap().is_none());
}

struct HeicSniffer;

impl FormatSniffer for HeicSniffer {
    fn sniff(&self, _bytes: &[u8]) -> Option<SniffedFormat> {
        Some(SniffedFormat {
            extension: "heic".to_string(),
            mime_type: "image/heic".to_string(),
        })
    }
}

struct FakeHeicBackend;

#[async_trait]
impl HeicBackend for FakeHeicBackend {
    async fn decode(&self, blob: &RawImageBlob, _source_locator: &str) -> Result<HeicOutput, BoxError> {
        let jpeg = Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]);
        Ok(HeicOutput {
            converted_size_bytes: jpeg.len() as u64,
            bytes: jpeg,
            output_format: FormatDescriptor::jpeg(),
            original_size_bytes: blob.size_bytes(),
        })
    }
}

#[tokio::test]
async fn injected_heic_backend_is_loaded_once() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let factory: HeicBackendFactory = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<Arc<dyn HeicBackend>, BoxError>(Arc::new(FakeHeicBackend))
    });

    let registry = Arc::new(ConverterRegistry::new());
    registry.register(Arc::new(HeicConverter::new(
        Arc::new(StaticCapabilities::none()),
        Arc::new(IdentityMessages),
        factory,
    )));
    let manager = ImageConverterManager::new(registry, Arc::new(HeicSniffer));
    let blob = RawImageBlob::new(vec![0u8; 32]);

    for _ in 0..2 {
        let result = manager.convert(&blob, "photo.heic").await.unwrap().unwrap();
        assert_eq!(result.output_format.mime_type, "image/jpeg");
        assert_eq!(result.original_size_bytes, 32);
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn heic_without_backend_fails_with_decode_error() {
    let registry = Arc::new(ConverterRegistry::with_builtin_converters(&ConverterConfig::default()));
    let manager = ImageConverterManager::new(registry, Arc::new(HeicSniffer));
    let blob = RawImageBlob::new(vec![0u8; 32]);

    let err = manager.convert(&blob, "photo.heic").await.unwrap_err();
    assert!(matches!(err, ConvertError::DecodeFailed { format: "HEIC", .. }));
}

#[tokio::test]
async fn data_url_input_converts() {
    use base64::Engine;

    let encoded = base64::engine::general_purpose::STANDARD.encode(sample_tiff());
    let data_url = format!("data:image/tiff;base64,{}", encoded);
    let blob = RawImageBlob::from_data_url(&data_url, 50 * 1024 * 1024).unwrap();
    assert_eq!(blob.declared_mime(), Some("image/tiff"));

    let manager = ImageConverterManager::with_config(&ConverterConfig::default());
    let result = manager.convert(&blob, "clipboard").await.unwrap().unwrap();
    assert!(result.output.to_data_url().starts_with("data:image/jpeg;base64,"));
}

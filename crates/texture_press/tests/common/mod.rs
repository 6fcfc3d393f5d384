#![allow(dead_code)]

use actix_web::http::header;
use actix_web::test;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use texture_press::config::Config;

pub const BOUNDARY: &str = "----texture-press-test-boundary";

/// Writes `{-output_file}` with a real signature for its extension.
const BASISU_OK: &str = r#"#!/bin/sh
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-output_file" ]; then out="$arg"; fi
  prev="$arg"
done
case "$out" in
  *.basis) printf 'sBs1basis-payload' > "$out" ;;
  *.ktx2) printf '\253KTX 20\273\r\n\032\nktx2-payload' > "$out" ;;
esac
echo "basisu: wrote $out"
"#;

/// Always writes KTX2 content, whatever extension it was asked for.
const BASISU_MISLABEL: &str = r#"#!/bin/sh
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-output_file" ]; then out="$arg"; fi
  prev="$arg"
done
printf '\253KTX 20\273\r\n\032\nktx2-payload' > "$out"
"#;

const BASISU_FAIL: &str = "#!/bin/sh\necho boom >&2\nexit 3\n";

const BASISU_SILENT: &str = "#!/bin/sh\nexit 0\n";

#[derive(Debug, Clone, Copy)]
pub enum FakeCompressor {
    Ok,
    Mislabel,
    Fail,
    Silent,
}

struct Scripts {
    _dir: tempfile::TempDir,
    ok: PathBuf,
    mislabel: PathBuf,
    fail: PathBuf,
    silent: PathBuf,
}

static SCRIPTS: OnceLock<Scripts> = OnceLock::new();

/// Every script is written and closed before any test can spawn a process,
/// so executing them never races an open write handle.
#[cfg(unix)]
pub fn fake_basisu(kind: FakeCompressor) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let scripts = SCRIPTS.get_or_init(|| {
        let dir = tempfile::tempdir().expect("script dir");
        let write = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, body).expect("write script");
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("chmod script");
            path
        };
        Scripts {
            ok: write("basisu-ok", BASISU_OK),
            mislabel: write("basisu-mislabel", BASISU_MISLABEL),
            fail: write("basisu-fail", BASISU_FAIL),
            silent: write("basisu-silent", BASISU_SILENT),
            _dir: dir,
        }
    });

    match kind {
        FakeCompressor::Ok => scripts.ok.clone(),
        FakeCompressor::Mislabel => scripts.mislabel.clone(),
        FakeCompressor::Fail => scripts.fail.clone(),
        FakeCompressor::Silent => scripts.silent.clone(),
    }
}

pub fn test_config(root: &Path, binary: PathBuf) -> Config {
    let mut config = Config::default().rooted_at(root);
    config.compressor.binary_path = binary;
    config.compressor.timeout = Duration::from_secs(30);
    config.housekeeping.sweep_interval = Duration::ZERO;
    config
}

/// Builds the service the way `main` does, minus CORS.
macro_rules! init_app {
    ($config:expr) => {{
        let config: texture_press::config::Config = $config;
        let storage = config.storage.clone();
        let metrics = config.metrics.clone();
        let state = texture_press::AppState::initialize(config)
            .await
            .expect("app state");
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(state))
                .configure(|cfg| texture_press::routes::configure(cfg, &storage, &metrics)),
        )
        .await
    }};
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([120, 80, 40, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, format)
        .expect("encode image");
    out.into_inner()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub fn webp(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::WebP)
}

fn push_field(body: &mut Vec<u8>, name: &str, value: &str) {
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .as_bytes(),
    );
}

fn push_file(body: &mut Vec<u8>, filename: &str, bytes: &[u8]) {
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
}

/// Text fields first, then the image.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        push_field(&mut body, name, value);
    }
    if let Some((filename, bytes)) = file {
        push_file(&mut body, filename, bytes);
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// The image first, so later fields are parsed after the upload hit the disk.
pub fn multipart_body_image_first(file: (&str, &[u8]), fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    push_file(&mut body, file.0, file.1);
    for (name, value) in fields {
        push_field(&mut body, name, value);
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(body: Vec<u8>) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/compress")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(body)
}

pub fn compress_request(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> test::TestRequest {
    multipart_request(multipart_body(fields, file))
}

pub fn dir_entries(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(path)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

//! Loading tests: every accepted source kind, the default location, and the
//! Load / Instantiation failure split.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header;
use axum::routing::get;
use axum::Router;
use bindbridge::fetch::{FetchError, FetchRequest, FetchResponse, FsFetcher, MemFetcher};
use bindbridge::{init, BridgeError, ErrorKind, InitInput, Loader, LoaderConfig};

use common::*;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

fn bundle_app() -> Router {
    let bytes = fixture_bytes();
    let octet = fixture_bytes();
    Router::new()
        .route(
            "/pkg/app_bg.wasm",
            get(move || {
                let bytes = bytes.clone();
                async move { ([(header::CONTENT_TYPE, "application/wasm")], bytes) }
            }),
        )
        .route(
            "/pkg/octet_bg.wasm",
            get(move || {
                let octet = octet.clone();
                async move { ([(header::CONTENT_TYPE, "application/octet-stream")], octet) }
            }),
        )
}

// ── Sources ──

#[tokio::test]
async fn test_load_from_bytes_and_render() {
    let mut handle = loader().load(Some(fixture_bytes().into())).await.unwrap();
    assert!(handle.is_ready());
    handle.render().unwrap();
    assert_eq!(render_count(&handle), 1);
}

#[tokio::test]
async fn test_load_from_wat_text() {
    let mut handle = loader()
        .load(Some(fixture_wat().into_bytes().into()))
        .await
        .unwrap();
    handle.render().unwrap();
}

#[tokio::test]
async fn test_load_from_url_via_fetcher() {
    let (loader, fetcher) = mem_loader(MemFetcher::new().with("pkg/app_bg.wasm", fixture_bytes()));
    let mut handle = loader
        .load(Some(InitInput::Url("pkg/app_bg.wasm".into())))
        .await
        .unwrap();
    handle.render().unwrap();
    assert_eq!(fetcher.requested(), vec!["pkg/app_bg.wasm".to_string()]);
}

#[tokio::test]
async fn test_load_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app_bg.wasm");
    std::fs::write(&path, fixture_bytes()).unwrap();

    let mut handle = loader().load(Some(path.into())).await.unwrap();
    handle.render().unwrap();
    assert_eq!(render_count(&handle), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_load_from_non_utf8_path() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(OsStr::from_bytes(b"app_\xff_bg.wasm"));
    std::fs::write(&path, fixture_bytes()).unwrap();

    let mut handle = loader().load(Some(path.into())).await.unwrap();
    handle.render().unwrap();
}

#[tokio::test]
async fn test_load_from_escaped_and_localhost_file_urls() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("my dir");
    std::fs::create_dir(&sub).unwrap();
    std::fs::write(sub.join("app_bg.wasm"), fixture_bytes()).unwrap();

    let base = dir.path().display().to_string();
    for url in [
        format!("file://{}/my%20dir/app_bg.wasm", base),
        format!("file://localhost{}/my%20dir/app_bg.wasm", base),
    ] {
        let mut handle = loader().load(Some(InitInput::Url(url))).await.unwrap();
        handle.render().unwrap();
    }
}

#[tokio::test]
async fn test_file_url_with_remote_host_is_load_error() {
    let err = loader()
        .load(Some(InitInput::Url("file://fileserver/pkg/app_bg.wasm".into())))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Load(FetchError::InvalidUrl { .. })));
}

#[tokio::test]
async fn test_load_from_file_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app_bg.wasm");
    std::fs::write(&path, fixture_bytes()).unwrap();

    let url = format!("file://{}", path.display());
    let mut handle = loader().load(Some(InitInput::Url(url))).await.unwrap();
    handle.render().unwrap();
}

#[tokio::test]
async fn test_load_from_request() {
    let (loader, fetcher) = mem_loader(MemFetcher::new().with("app_bg.wasm", fixture_bytes()));
    let request = FetchRequest::get("app_bg.wasm").with_header("accept", "application/wasm");
    loader.load(Some(request.into())).await.unwrap();
    assert_eq!(fetcher.requested().len(), 1);
}

#[tokio::test]
async fn test_load_from_response() {
    let response = FetchResponse::ok("served/app_bg.wasm", fixture_bytes());
    let mut handle = loader().load(Some(response.into())).await.unwrap();
    handle.render().unwrap();
}

#[tokio::test]
async fn test_response_with_unexpected_media_type_still_loads() {
    let mut response = FetchResponse::ok("served/app_bg.wasm", fixture_bytes());
    response.content_type = Some("application/octet-stream".into());
    let mut handle = loader().load(Some(response.into())).await.unwrap();
    handle.render().unwrap();
}

#[tokio::test]
async fn test_load_from_deferred_source() {
    let bytes = fixture_bytes();
    let input = InitInput::deferred(async move { Ok(InitInput::Bytes(bytes)) });
    let mut handle = loader().load(Some(input)).await.unwrap();
    handle.render().unwrap();
}

#[tokio::test]
async fn test_deferred_chain_reaches_fetcher() {
    let (loader, fetcher) = mem_loader(MemFetcher::new().with("late_bg.wasm", fixture_bytes()));
    let input = InitInput::deferred(async {
        Ok(InitInput::deferred(async {
            Ok(InitInput::Url("late_bg.wasm".into()))
        }))
    });
    loader.load(Some(input)).await.unwrap();
    assert_eq!(fetcher.requested(), vec!["late_bg.wasm".to_string()]);
}

#[tokio::test]
async fn test_load_precompiled_module() {
    let loader = loader();
    let module = loader.compile(&fixture_bytes()).unwrap();
    let mut handle = loader.load(Some(module.into())).await.unwrap();
    handle.render().unwrap();
}

#[tokio::test]
async fn test_module_from_other_engine_is_instantiation_error() {
    let other = loader();
    let module = other.compile(&fixture_bytes()).unwrap();
    let err = loader().load(Some(module.into())).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Instantiation);
}

#[tokio::test]
async fn test_request_then_await() {
    let loader = loader();
    let pending = loader.request(Some(fixture_bytes().into()));
    let mut handle = pending.await.unwrap();
    handle.render().unwrap();
}

// ── Default location ──

#[tokio::test]
async fn test_omitted_source_fetches_default_location() {
    let (loader, fetcher) = mem_loader(MemFetcher::new().with("package_bg.wasm", fixture_bytes()));
    loader.load(None).await.unwrap();
    loader.load(None).await.unwrap();
    assert_eq!(
        fetcher.requested(),
        vec!["package_bg.wasm".to_string(), "package_bg.wasm".to_string()]
    );
}

#[tokio::test]
async fn test_configured_default_location() {
    let config = LoaderConfig::from_json(r#"{"default_location": "dist/site_bg.wasm"}"#).unwrap();
    let fetcher = Arc::new(MemFetcher::new().with("dist/site_bg.wasm", fixture_bytes()));
    let loader = Loader::with_fetcher(config, fetcher.clone()).unwrap();
    loader.load(None).await.unwrap();
    assert_eq!(fetcher.requested(), vec!["dist/site_bg.wasm".to_string()]);
}

#[tokio::test]
async fn test_default_location_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("package_bg.wasm"), fixture_bytes()).unwrap();

    let fetcher = Arc::new(FsFetcher::with_root(dir.path()));
    let loader = Loader::with_fetcher(LoaderConfig::default(), fetcher).unwrap();
    let mut handle = loader.load(None).await.unwrap();
    handle.render().unwrap();
}

#[tokio::test]
async fn test_missing_default_location_is_load_error() {
    let (loader, _) = mem_loader(MemFetcher::new());
    let err = loader.load(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Load);
}

// ── HTTP ──

#[tokio::test]
async fn test_load_over_http() {
    let addr = serve(bundle_app()).await;
    let url = format!("http://{}/pkg/app_bg.wasm", addr);
    let mut handle = net_loader().load(Some(InitInput::Url(url))).await.unwrap();
    handle.render().unwrap();
    assert_eq!(render_count(&handle), 1);
}

#[tokio::test]
async fn test_http_wrong_media_type_still_loads() {
    let addr = serve(bundle_app()).await;
    let url = format!("http://{}/pkg/octet_bg.wasm", addr);
    net_loader().load(Some(InitInput::Url(url))).await.unwrap();
}

#[tokio::test]
async fn test_http_not_found_is_load_error() {
    let addr = serve(bundle_app()).await;
    let url = format!("http://{}/pkg/missing_bg.wasm", addr);
    let err = net_loader().load(Some(InitInput::Url(url))).await.unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Load(FetchError::Status { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_unreachable_server_is_load_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{}/pkg/app_bg.wasm", addr);
    let err = net_loader().load(Some(InitInput::Url(url))).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Load);
}

// ── Load errors ──

#[tokio::test]
async fn test_missing_file_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = loader()
        .load(Some(dir.path().join("absent_bg.wasm").into()))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Load(FetchError::NotFound(_))));
    assert_eq!(err.kind(), ErrorKind::Load);
}

#[tokio::test]
async fn test_unsupported_scheme_is_load_error() {
    let err = loader()
        .load(Some(InitInput::Url("ftp://mirror.invalid/app_bg.wasm".into())))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Load(FetchError::UnsupportedScheme { .. })
    ));
}

#[tokio::test]
async fn test_failed_status_is_load_error() {
    let mut fetcher = MemFetcher::new();
    fetcher.insert_response(FetchResponse::with_status("gone_bg.wasm", 404));
    let (loader, _) = mem_loader(fetcher);
    let err = loader
        .load(Some(InitInput::Url("gone_bg.wasm".into())))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Load(FetchError::Status { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_rejected_deferred_is_load_error() {
    let input = InitInput::deferred(async { Err(FetchError::Rejected("upstream closed".into())) });
    let err = loader().load(Some(input)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Load);
}

// ── Instantiation errors ──

#[tokio::test]
async fn test_corrupt_bytes_are_instantiation_errors() {
    let cases: Vec<Vec<u8>> = vec![
        b"\0asm\x01\0\0".to_vec(),
        b"\0asm\x02\0\0\0".to_vec(),
        vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0x01],
        b"(module (func".to_vec(),
    ];
    let loader = loader();
    for bytes in cases {
        let err = loader.load(Some(bytes.clone().into())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Instantiation, "bytes {:?}", bytes);
    }
}

#[tokio::test]
async fn test_corrupt_file_is_instantiation_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app_bg.wasm");
    let mut bytes = fixture_bytes();
    bytes.truncate(bytes.len() / 2);
    std::fs::write(&path, bytes).unwrap();

    let err = loader().load(Some(path.into())).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Instantiation);
}

#[tokio::test]
async fn test_missing_render_is_instantiation_error() {
    let err = loader()
        .load(Some(renderless_bytes().into()))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Validation(_)));
    assert_eq!(err.kind(), ErrorKind::Instantiation);
}

#[tokio::test]
async fn test_imports_are_rejected() {
    let err = loader()
        .load(Some(importing_bytes().into()))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Validation(ref m) if m.contains("env::now")));
}

#[tokio::test]
async fn test_memory_over_limit_is_instantiation_error() {
    let config = LoaderConfig {
        max_memory_pages: 2,
        ..LoaderConfig::default()
    };
    let err = loader_with(config)
        .load(Some(sized_fixture_bytes(3).into()))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Instantiation(_)));
}

#[tokio::test]
async fn test_memory_at_limit_loads() {
    let config = LoaderConfig {
        max_memory_pages: 2,
        ..LoaderConfig::default()
    };
    let handle = loader_with(config)
        .load(Some(sized_fixture_bytes(2).into()))
        .await
        .unwrap();
    assert_eq!(handle.memory_pages(), 2);
}

// ── Start routine ──

#[tokio::test]
async fn test_start_runs_on_load() {
    let handle = load_fixture().await;
    assert_eq!(handle.read_bytes(0, 1).unwrap(), vec![START_MARKER]);
}

#[tokio::test]
async fn test_start_skipped_when_disabled() {
    let config = LoaderConfig {
        run_start: false,
        ..LoaderConfig::default()
    };
    let handle = loader_with(config)
        .load(Some(fixture_bytes().into()))
        .await
        .unwrap();
    assert_eq!(handle.read_bytes(0, 1).unwrap(), vec![0]);
}

#[tokio::test]
async fn test_trapping_start_is_execution_trap() {
    let err = loader()
        .load(Some(trapping_start_bytes().into()))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Trapped { ref export, .. } if export == "__wbindgen_start"));
    assert_eq!(err.kind(), ErrorKind::ExecutionTrap);
}

#[tokio::test]
async fn test_trapping_start_section_is_execution_trap() {
    let wat = r#"(module
  (memory (export "memory") 1)
  (func $boot unreachable)
  (start $boot)
  (func (export "render"))
  (func (export "__wbindgen_malloc") (param i32) (result i32) (i32.const 0))
  (func (export "__wbindgen_realloc") (param i32 i32 i32) (result i32) (i32.const 0))
  (func (export "__wbindgen_free") (param i32 i32))
  (func (export "__wbindgen_exn_store") (param i32))
)"#;
    let err = loader()
        .load(Some(wat.as_bytes().into()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExecutionTrap);
}

// ── init ──

#[tokio::test]
async fn test_init_with_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app_bg.wasm");
    std::fs::write(&path, fixture_bytes()).unwrap();

    let mut handle = init(Some(path.into())).await.unwrap();
    handle.render().unwrap();
}

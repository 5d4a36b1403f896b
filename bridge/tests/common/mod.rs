//! Shared test helpers for integration tests.
//!
//! Provides a wasm-bindgen shaped fixture unit, variants of it with altered
//! entry points, and loader factories. Fixtures are written as WAT and
//! assembled to the binary format, which is what a real bundle ships.

#![allow(dead_code)]

use std::sync::Arc;

use bindbridge::fetch::reqwest::Client;
use bindbridge::fetch::{DefaultFetcher, FsFetcher, HttpFetcher, MemFetcher};
use bindbridge::{Loader, LoaderConfig, ModuleHandle};

/// Byte written at offset 0 by `__wbindgen_start`.
pub const START_MARKER: u8 = 0xAB;
/// `render` stores its call count here.
pub const RENDER_COUNT_PTR: u32 = 16;
/// `__wbindgen_exn_store` stores the last heap index here.
pub const EXN_SLOT_PTR: u32 = 20;
/// Closure trampolines accumulate into this word.
pub const CLOSURE_ACC_PTR: u32 = 24;
/// First address handed out by the fixture's bump allocator.
pub const HEAP_START: u32 = 1024;

/// Build the fixture with custom bodies for `render` and `__wbindgen_start`
/// and a custom initial memory size in pages.
pub fn fixture_with(render_body: &str, start_body: &str, pages: u32) -> String {
    format!(
        r#"(module
  (memory (export "memory") {pages})
  (global $heap (mut i32) (i32.const {heap}))
  (table (export "__wbindgen_export_2") 4 funcref)
  (elem (i32.const 1) $double $add)

  (func $double (param i32) (result i32)
    (i32.mul (local.get 0) (i32.const 2)))
  (func $add (param i32 i32) (result i32)
    (i32.add (local.get 0) (local.get 1)))

  (func (export "render")
    {render_body})

  (func $malloc (export "__wbindgen_malloc") (param $len i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $heap))
    (global.set $heap
      (i32.and
        (i32.add (i32.add (global.get $heap) (local.get $len)) (i32.const 7))
        (i32.const -8)))
    (local.get $ptr))

  (func (export "__wbindgen_realloc") (param $ptr i32) (param $old i32) (param $new i32) (result i32)
    (local $dst i32)
    (local.set $dst (call $malloc (local.get $new)))
    (memory.copy
      (local.get $dst)
      (local.get $ptr)
      (select (local.get $old) (local.get $new) (i32.lt_u (local.get $old) (local.get $new))))
    (local.get $dst))

  (func (export "__wbindgen_free") (param i32 i32))

  (func (export "__wbindgen_exn_store") (param i32)
    (i32.store (i32.const {exn}) (local.get 0)))

  (func (export "__wbindgen_start")
    {start_body})

  (func (export "closure0__invoke__h1a2b") (param $a i32) (param $b i32)
    (i32.store (i32.const {acc})
      (i32.add (i32.load (i32.const {acc})) (i32.add (local.get $a) (local.get $b)))))

  (func (export "closure1__invoke__h3c4d") (param $a i32) (param $b i32) (param $x i32)
    (i32.store (i32.const {acc})
      (i32.add (i32.load (i32.const {acc})) (i32.mul (local.get $a) (local.get $x)))))

  (func (export "wasm_bindgen__convert__closures__invoke3_mut__h5e6f") (param i32 i32 i32 i32 i32)
    (i32.store (i32.const {acc})
      (i32.add (local.get 2) (i32.add (local.get 3) (local.get 4)))))

  (func (export "invoke_handler") (param i32 i32))

  (func (export "answer") (result i32)
    (i32.const 42))

  (func (export "explode")
    unreachable)
)"#,
        pages = pages,
        heap = HEAP_START,
        exn = EXN_SLOT_PTR,
        acc = CLOSURE_ACC_PTR,
        render_body = render_body,
        start_body = start_body,
    )
}

/// `render` body that bumps the counter at [`RENDER_COUNT_PTR`].
pub const COUNTING_RENDER: &str = "(i32.store (i32.const 16) (i32.add (i32.load (i32.const 16)) (i32.const 1)))";

/// `__wbindgen_start` body that writes [`START_MARKER`] at offset 0.
pub const MARKING_START: &str = "(i32.store8 (i32.const 0) (i32.const 0xAB))";

/// The well-behaved fixture unit.
pub fn fixture_wat() -> String {
    fixture_with(COUNTING_RENDER, MARKING_START, 1)
}

/// Assemble WAT text into a binary module.
pub fn assemble(wat: &str) -> Vec<u8> {
    wat::parse_str(wat).unwrap()
}

/// The well-behaved fixture as a binary module.
pub fn fixture_bytes() -> Vec<u8> {
    assemble(&fixture_wat())
}

/// Fixture whose `render` traps unconditionally.
pub fn trapping_render_bytes() -> Vec<u8> {
    assemble(&fixture_with("unreachable", MARKING_START, 1))
}

/// Fixture whose `render` never returns.
pub fn looping_render_bytes() -> Vec<u8> {
    assemble(&fixture_with("(loop $spin (br $spin))", MARKING_START, 1))
}

/// Fixture whose start routine traps.
pub fn trapping_start_bytes() -> Vec<u8> {
    assemble(&fixture_with(COUNTING_RENDER, "unreachable", 1))
}

/// Fixture asking for `pages` pages of initial memory.
pub fn sized_fixture_bytes(pages: u32) -> Vec<u8> {
    assemble(&fixture_with(COUNTING_RENDER, MARKING_START, pages))
}

/// A unit that needs a host import the bridge does not provide.
pub fn importing_bytes() -> Vec<u8> {
    assemble(
        r#"(module
  (import "env" "now" (func $now (result i32)))
  (memory (export "memory") 1)
  (func (export "render") (drop (call $now)))
  (func (export "__wbindgen_malloc") (param i32) (result i32) (i32.const 0))
  (func (export "__wbindgen_realloc") (param i32 i32 i32) (result i32) (i32.const 0))
  (func (export "__wbindgen_free") (param i32 i32))
  (func (export "__wbindgen_exn_store") (param i32))
)"#,
    )
}

/// A unit missing `render`.
pub fn renderless_bytes() -> Vec<u8> {
    assemble(r#"(module (memory (export "memory") 1))"#)
}

/// A unit missing `render`, distinct for each `n`.
pub fn numbered_renderless_bytes(n: u32) -> Vec<u8> {
    assemble(&format!(
        r#"(module (memory (export "memory") 1) (global i32 (i32.const {})))"#,
        n
    ))
}

pub fn loader() -> Loader {
    Loader::new(LoaderConfig::default()).unwrap()
}

pub fn loader_with(config: LoaderConfig) -> Loader {
    Loader::new(config).unwrap()
}

/// Loader backed by an in-memory fetcher; returns the fetcher for inspection.
pub fn mem_loader(fetcher: MemFetcher) -> (Loader, Arc<MemFetcher>) {
    let fetcher = Arc::new(fetcher);
    let loader = Loader::with_fetcher(LoaderConfig::default(), fetcher.clone()).unwrap();
    (loader, fetcher)
}

/// Loader using the default file + HTTP dispatch, with proxies disabled so
/// loopback servers are reached directly.
pub fn net_loader() -> Loader {
    let client = Client::builder().no_proxy().build().unwrap();
    let fetcher = DefaultFetcher::from_parts(FsFetcher::new(), HttpFetcher::with_client(client));
    Loader::with_fetcher(LoaderConfig::default(), Arc::new(fetcher)).unwrap()
}

/// Load the well-behaved fixture from bytes.
pub async fn load_fixture() -> ModuleHandle {
    loader().load(Some(fixture_bytes().into())).await.unwrap()
}

pub fn render_count(handle: &ModuleHandle) -> u32 {
    handle.read_u32(RENDER_COUNT_PTR).unwrap()
}

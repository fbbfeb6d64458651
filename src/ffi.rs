//! C-compatible FFI API for cross-language bindings.
//!
//! # ABI Contract
//!
//! All exported functions use `extern "C"` calling convention and `#[no_mangle]`
//! to ensure stable symbol names.
//!
//! ## Input
//! Content streams are passed as UTF-8 JSON (pointer + length, not
//! necessarily null-terminated) in the same shape `ContentStream::from_json`
//! accepts.
//!
//! ## Memory management
//! - Buffers returned by `cpager_*` functions are allocated on the Rust heap.
//! - Callers **must** free them with `cpager_free_buffer` / `cpager_free_string`.
//! - Passing a null pointer to a free function is a no-op.
//!
//! ## Error handling
//! - Functions that can fail return a `c_int` (0 = success, non-zero = error):
//!   1 null pointer, 2 invalid UTF-8, 3 invalid JSON, 4 layout or render failure.
//! - Error details can be retrieved via `cpager_last_error`.
//!
//! ## Thread safety
//! - `cpager_last_error` uses a thread-local, so it is safe to call from
//!   multiple threads.
//!
//! ## Usage from Go (cgo)
//! ```go
//! // #cgo LDFLAGS: -lchat_pager
//! // #include "chat_pager.h"
//! import "C"
//! ```

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;

use crate::content::ContentStream;
use crate::metrics::TextMetrics;
use crate::pipeline::{export_pdf, plan_with_metrics, ExportConfig, PageOrientation};
use crate::plan::PagePlan;
use crate::render::render_pdf;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

const ERR_NULL: c_int = 1;
const ERR_UTF8: c_int = 2;
const ERR_JSON: c_int = 3;
const ERR_EXPORT: c_int = 4;

// ---------------------------------------------------------------------------
// C-compatible configuration types
// ---------------------------------------------------------------------------

/// Page orientation for use in [`CpagerExportConfig`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub enum CpagerPageOrientation {
    /// Portrait mode: height > width (default).
    Portrait = 0,
    /// Landscape mode: width > height.
    Landscape = 1,
}

/// Optional export configuration.
///
/// Numeric fields set to `0` (or `NULL` for `title`) fall back to defaults:
/// - `page_width`      → 595.28 pt
/// - `page_height`     → 841.89 pt
/// - `page_margin`     → 40 pt
/// - `max_token_chars` → 80
/// - `title`           → "chat-pager export"
///
/// The bool fields have no "unset" value and are always taken as given, so a
/// zeroed struct turns references off. Passing a `NULL` config instead keeps
/// the defaults: references on, title banner off.
#[repr(C)]
#[derive(Debug)]
pub struct CpagerExportConfig {
    /// Null-terminated UTF-8 document title. `NULL` for the default.
    pub title: *const c_char,
    pub page_width: f32,
    pub page_height: f32,
    pub page_margin: f32,
    pub orientation: CpagerPageOrientation,
    pub max_token_chars: u32,
    /// Append collected references on trailing pages.
    pub append_references: bool,
    /// Open the document with the title as a heading.
    pub title_banner: bool,
}

/// Convert a [`CpagerExportConfig`] (FFI) to an [`ExportConfig`] (Rust).
///
/// # Safety
/// `cfg.title`, if non-null, must point to a valid null-terminated UTF-8 string.
unsafe fn export_config_from_c(cfg: &CpagerExportConfig) -> ExportConfig {
    let defaults = ExportConfig::default();
    let or_default = |value: f32, default: f32| if value == 0.0 { default } else { value };

    let title = if cfg.title.is_null() {
        defaults.title.clone()
    } else {
        CStr::from_ptr(cfg.title)
            .to_str()
            .map(str::to_string)
            .unwrap_or_else(|_| defaults.title.clone())
    };

    ExportConfig {
        title,
        page_width: or_default(cfg.page_width, defaults.page_width),
        page_height: or_default(cfg.page_height, defaults.page_height),
        page_margin: or_default(cfg.page_margin, defaults.page_margin),
        orientation: match cfg.orientation {
            CpagerPageOrientation::Portrait => PageOrientation::Portrait,
            CpagerPageOrientation::Landscape => PageOrientation::Landscape,
        },
        max_token_chars: match cfg.max_token_chars {
            0 => defaults.max_token_chars,
            n => n as usize,
        },
        append_references: cfg.append_references,
        title_banner: cfg.title_banner,
        style: defaults.style,
    }
}

unsafe fn config_or_default(cfg: *const CpagerExportConfig) -> ExportConfig {
    if cfg.is_null() {
        ExportConfig::default()
    } else {
        export_config_from_c(&*cfg)
    }
}

/// Decode a content stream from `len` bytes at `ptr`.
unsafe fn read_stream(ptr: *const u8, len: u32) -> Result<ContentStream, c_int> {
    let bytes = slice::from_raw_parts(ptr, len as usize);
    let json = std::str::from_utf8(bytes).map_err(|e| {
        set_last_error(&format!("Invalid UTF-8: {e}"));
        ERR_UTF8
    })?;
    ContentStream::from_json(json).map_err(|e| {
        set_last_error(&format!("Invalid content JSON: {e}"));
        ERR_JSON
    })
}

/// Buffer lengths cross the ABI as `u32`.
fn buffer_len(len: usize) -> Result<u32, c_int> {
    u32::try_from(len).map_err(|_| {
        set_last_error(&format!("PDF of {len} bytes exceeds the 4 GiB buffer limit"));
        ERR_EXPORT
    })
}

unsafe fn write_buffer(bytes: Vec<u8>, out_buf: *mut *mut u8, out_len: *mut u32) -> c_int {
    let len = match buffer_len(bytes.len()) {
        Ok(len) => len,
        Err(code) => return code,
    };
    let buf = bytes.into_boxed_slice();
    *out_buf = Box::into_raw(buf) as *mut u8;
    *out_len = len;
    0
}

unsafe fn write_plan_json(plan: &PagePlan, out_json_ptr: *mut *mut c_char) -> c_int {
    let json = match plan.to_json() {
        Ok(json) => json,
        Err(e) => {
            set_last_error(&e.to_string());
            return ERR_JSON;
        }
    };
    match CString::new(json) {
        Ok(cs) => {
            *out_json_ptr = cs.into_raw();
            0
        }
        Err(_) => {
            set_last_error("JSON contained null byte");
            ERR_JSON
        }
    }
}

// ---------------------------------------------------------------------------
// Core API
// ---------------------------------------------------------------------------

/// Plan a content stream into pages and return the plan as JSON.
///
/// # Parameters
/// - `json_ptr`, `json_len`: UTF-8 content stream JSON
/// - `cfg`: optional pointer to a [`CpagerExportConfig`]; pass `NULL` for defaults
/// - `out_json_ptr`: receives a null-terminated page plan JSON string
///
/// # Returns
/// `0` on success.
///
/// # Safety
/// - `json_ptr` must point to `json_len` valid bytes.
/// - `cfg`, if non-null, must point to a fully-initialised config.
/// - The caller must free `*out_json_ptr` with `cpager_free_string`.
#[no_mangle]
pub unsafe extern "C" fn cpager_plan(
    json_ptr: *const u8,
    json_len: u32,
    cfg: *const CpagerExportConfig,
    out_json_ptr: *mut *mut c_char,
) -> c_int {
    if json_ptr.is_null() || out_json_ptr.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    let stream = match read_stream(json_ptr, json_len) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match plan_with_metrics(&stream, &config_or_default(cfg)) {
        Ok(plan) => write_plan_json(&plan, out_json_ptr),
        Err(e) => {
            set_last_error(&e.to_string());
            ERR_EXPORT
        }
    }
}

/// Export a content stream to PDF, optionally returning the plan JSON too.
///
/// # Parameters
/// - `json_ptr`, `json_len`: UTF-8 content stream JSON
/// - `cfg`: optional pointer to a [`CpagerExportConfig`]; pass `NULL` for defaults
/// - `out_buf`, `out_len`: PDF output (free with `cpager_free_buffer`)
/// - `out_plan_ptr`: optional; receives the plan JSON (free with
///   `cpager_free_string`). Pass `NULL` to skip.
///
/// # Returns
/// `0` on success.
///
/// # Safety
/// Same as `cpager_plan`; `out_buf` and `out_len` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn cpager_export_pdf(
    json_ptr: *const u8,
    json_len: u32,
    cfg: *const CpagerExportConfig,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
    out_plan_ptr: *mut *mut c_char,
) -> c_int {
    if json_ptr.is_null() || out_buf.is_null() || out_len.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    let stream = match read_stream(json_ptr, json_len) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match export_pdf(&stream, &config_or_default(cfg)) {
        Ok((pdf_bytes, plan)) => {
            let code = write_buffer(pdf_bytes, out_buf, out_len);
            if code != 0 || out_plan_ptr.is_null() {
                return code;
            }
            match write_plan_json(&plan, out_plan_ptr) {
                0 => 0,
                code => {
                    *out_plan_ptr = ptr::null_mut();
                    code
                }
            }
        }
        Err(e) => {
            set_last_error(&e.to_string());
            ERR_EXPORT
        }
    }
}

/// Render a PDF from a page plan JSON string.
///
/// This allows planning once and rendering separately.
///
/// # Safety
/// `plan_json` must be a valid null-terminated string; `out_buf` and
/// `out_len` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn cpager_render_plan(
    plan_json: *const c_char,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    if plan_json.is_null() || out_buf.is_null() || out_len.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }

    let json = match CStr::from_ptr(plan_json).to_str() {
        Ok(s) => s,
        Err(e) => {
            set_last_error(&format!("Invalid UTF-8 in JSON: {e}"));
            return ERR_UTF8;
        }
    };
    let plan = match PagePlan::from_json(json) {
        Ok(p) => p,
        Err(e) => {
            set_last_error(&format!("Invalid plan JSON: {e}"));
            return ERR_JSON;
        }
    };

    match render_pdf(&plan, &TextMetrics::default()) {
        Ok(pdf_bytes) => write_buffer(pdf_bytes, out_buf, out_len),
        Err(e) => {
            set_last_error(&e.to_string());
            ERR_EXPORT
        }
    }
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free a PDF buffer returned by `cpager_export_pdf` or `cpager_render_plan`.
///
/// # Safety
/// `buf` must have been returned by one of those calls, and `len` must be the
/// corresponding length.
#[no_mangle]
pub unsafe extern "C" fn cpager_free_buffer(buf: *mut u8, len: u32) {
    if !buf.is_null() {
        let _ = Box::from_raw(slice::from_raw_parts_mut(buf, len as usize));
    }
}

/// Free a plan JSON string.
///
/// # Safety
/// `s` must have been returned by Rust's `CString::into_raw`.
#[no_mangle]
pub unsafe extern "C" fn cpager_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

/// Retrieve the last error message. Returns a null-terminated string.
///
/// The returned pointer is valid until the next failing `cpager_*` call on
/// the same thread. The caller should **not** free this pointer.
///
/// Returns null if no error has occurred.
#[no_mangle]
pub extern "C" fn cpager_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cs) => cs.as_ptr(),
        None => ptr::null(),
    })
}

/// Return the library version as a null-terminated string.
/// The caller must **not** free this pointer.
#[no_mangle]
pub extern "C" fn cpager_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

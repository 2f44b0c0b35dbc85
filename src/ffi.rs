//! C FFI — bridges the decode pipeline to iOS / Android callers.
//!
//! The language model runs elsewhere (on-device runtime, server); the host
//! app hands the generated token ids to [`orpheus_decode_tokens_to_file`] and
//! gets a WAV file back.
//!
//! ## Memory contract
//!
//! | Function                          | Caller frees with         |
//! |-----------------------------------|---------------------------|
//! | [`orpheus_codec_load`]            | [`orpheus_codec_free`]    |
//! | [`orpheus_voices`]                | [`orpheus_free_string`]   |
//! | [`orpheus_format_prompt`]         | [`orpheus_free_string`]   |
//! | [`orpheus_decode_tokens_to_file`] | [`orpheus_free_error`]    |

use std::ffi::{c_char, CStr, CString};
use std::path::Path;

use crate::{
    config::{GenerationConfig, DEFAULT_MAX_TOKENS},
    model::SnacOnnx,
    pipeline::Engine,
    source::ScriptedSource,
    voice::{format_prompt, validate_text, Voice},
};

/// Opaque handle to a loaded codec and its pipeline.
pub struct OrpheusCodecHandle {
    engine: Engine,
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Convert a `*const c_char` to an owned `String`; `None` if `ptr` is null.
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Heap-allocate an owned C string.  Returns null on interior nul bytes.
fn to_c_str(s: &str) -> *const c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => std::ptr::null(),
    }
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Return a JSON array of voice tags, e.g. `["tara","leah",…]`.
///
/// Free with [`orpheus_free_string`].
#[no_mangle]
pub extern "C" fn orpheus_voices() -> *const c_char {
    let json = serde_json::to_string(&Voice::tags()).unwrap_or_else(|_| "[]".to_string());
    to_c_str(&json)
}

/// Build the model prompt for `text` in `voice`.
///
/// @return  Heap-allocated prompt, or `NULL` for an unknown voice or empty
///          text.  Free with [`orpheus_free_string`].
#[no_mangle]
pub unsafe extern "C" fn orpheus_format_prompt(
    voice: *const c_char,
    text: *const c_char,
) -> *const c_char {
    let (Some(voice), Some(text)) = (unsafe { cstr_to_string(voice) }, unsafe { cstr_to_string(text) })
    else {
        return std::ptr::null();
    };
    let Ok(voice) = voice.parse::<Voice>() else {
        return std::ptr::null();
    };
    match validate_text(&text) {
        Ok(text) => to_c_str(&format_prompt(voice, text)),
        Err(_) => std::ptr::null(),
    }
}

/// Load the SNAC decoder graph.
///
/// @param onnx_path  UTF-8 path to the decoder `.onnx` file.
/// @return           Opaque handle, or `NULL` on failure (details to stderr).
///                   Free with [`orpheus_codec_free`].
#[no_mangle]
pub unsafe extern "C" fn orpheus_codec_load(onnx_path: *const c_char) -> *mut OrpheusCodecHandle {
    let Some(path) = (unsafe { cstr_to_string(onnx_path) }) else {
        eprintln!("[orpheus] orpheus_codec_load: null argument");
        return std::ptr::null_mut();
    };
    let engine = SnacOnnx::load(Path::new(&path))
        .and_then(|snac| Ok(Engine::new(snac, GenerationConfig::default())?));
    match engine {
        Ok(engine) => Box::into_raw(Box::new(OrpheusCodecHandle { engine })),
        Err(e) => {
            eprintln!("[orpheus] load error: {e:#}");
            std::ptr::null_mut()
        }
    }
}

/// Decode generated token ids to a 16-bit PCM WAV at `output_path`.
///
/// @param codec        Handle from [`orpheus_codec_load`].
/// @param ids          Token ids in generation order.
/// @param len          Number of ids.
/// @param max_tokens   Audio token cap; 0 uses the default (8192).
/// @param output_path  Writable path for the `.wav` file.
/// @return             `NULL` on success; otherwise an error message the
///                     caller must release with [`orpheus_free_error`].
#[no_mangle]
pub unsafe extern "C" fn orpheus_decode_tokens_to_file(
    codec: *mut OrpheusCodecHandle,
    ids: *const u32,
    len: usize,
    max_tokens: u32,
    output_path: *const c_char,
) -> *const c_char {
    macro_rules! bail {
        ($msg:literal) => {
            return to_c_str($msg);
        };
    }

    if codec.is_null() {
        bail!("null codec handle");
    }
    if ids.is_null() && len > 0 {
        bail!("null token buffer");
    }
    let Some(out) = (unsafe { cstr_to_string(output_path) }) else {
        bail!("null output_path");
    };

    let ids = if len == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(ids, len) }.to_vec()
    };

    let h = unsafe { &mut *codec };
    let max_tokens = if max_tokens == 0 { DEFAULT_MAX_TOKENS } else { max_tokens as usize };
    h.engine.set_max_tokens(max_tokens);
    let result = h
        .engine
        .decode_stream(&mut ScriptedSource::new(ids))
        .and_then(|decoded| decoded.write_wav(Path::new(&out)));
    match result {
        Ok(_) => std::ptr::null(),
        Err(e) => to_c_str(&e.to_string()),
    }
}

/// Free a string returned by [`orpheus_voices`] or [`orpheus_format_prompt`].
#[no_mangle]
pub unsafe extern "C" fn orpheus_free_string(s: *const c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s as *mut c_char) });
    }
}

/// Free an error string returned by [`orpheus_decode_tokens_to_file`].
#[no_mangle]
pub unsafe extern "C" fn orpheus_free_error(s: *const c_char) {
    unsafe { orpheus_free_string(s) };
}

/// Destroy a codec handle.
#[no_mangle]
pub unsafe extern "C" fn orpheus_codec_free(codec: *mut OrpheusCodecHandle) {
    if !codec.is_null() {
        drop(unsafe { Box::from_raw(codec) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take(s: *const c_char) -> Option<String> {
        let out = unsafe { cstr_to_string(s) };
        unsafe { orpheus_free_string(s) };
        out
    }

    #[test]
    fn test_voices_json() {
        let json = unsafe { take(orpheus_voices()) }.unwrap();
        let voices: Vec<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(voices.len(), 8);
        assert_eq!(voices[0], "tara");
    }

    #[test]
    fn test_format_prompt() {
        let voice = CString::new("zoe").unwrap();
        let text = CString::new("  Hello.  ").unwrap();
        let prompt = unsafe { take(orpheus_format_prompt(voice.as_ptr(), text.as_ptr())) };
        assert_eq!(prompt.as_deref(), Some("<|audio|>zoe: Hello.<|eot_id|>"));

        let bad = CString::new("nobody").unwrap();
        assert!(unsafe { orpheus_format_prompt(bad.as_ptr(), text.as_ptr()) }.is_null());
        assert!(unsafe { orpheus_format_prompt(std::ptr::null(), text.as_ptr()) }.is_null());
    }

    #[test]
    fn test_null_arguments() {
        assert!(unsafe { orpheus_codec_load(std::ptr::null()) }.is_null());
        let out = CString::new("out.wav").unwrap();
        let err = unsafe {
            take(orpheus_decode_tokens_to_file(
                std::ptr::null_mut(),
                std::ptr::null(),
                0,
                0,
                out.as_ptr(),
            ))
        };
        assert_eq!(err.as_deref(), Some("null codec handle"));
        unsafe { orpheus_codec_free(std::ptr::null_mut()) };
    }
}

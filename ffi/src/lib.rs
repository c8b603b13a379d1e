#![allow(clippy::missing_safety_doc)]

use anyhow::Context;
use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char};
use tessel_core::prelude::*;

/// Used as a return type of functions that can encounter errors.
/// If the function encountered an error, you can retrieve it using the `tessel_get_last_error`
/// function
#[repr(C)]
#[allow(non_camel_case_types)]
#[derive(Debug, PartialEq, Eq)]
pub enum TESSEL_RESULT {
    /// The function returned successfully
    TESSEL_RESULT_OK = 0,
    /// The function returned an error
    TESSEL_RESULT_KO = 1,
}

thread_local! {
    pub(crate) static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn wrap<F: FnOnce() -> anyhow::Result<()>>(func: F) -> TESSEL_RESULT {
    match func() {
        Ok(_) => TESSEL_RESULT::TESSEL_RESULT_OK,
        Err(e) => {
            let msg = format!("{e:?}");
            if std::env::var("TESSEL_ERROR_STDERR").is_ok() {
                eprintln!("{msg}");
            }
            LAST_ERROR.with(|p| {
                *p.borrow_mut() = Some(CString::new(msg).unwrap_or_else(|_| {
                    CString::new("tessel error message contains 0, can't convert to CString")
                        .unwrap()
                }))
            });
            TESSEL_RESULT::TESSEL_RESULT_KO
        }
    }
}

/// Retrieve the last error that happened in this thread. A function encountered an error if
/// its return type is of type `TESSEL_RESULT` and it returned `TESSEL_RESULT_KO`.
///
/// # Return value
///  It returns a pointer to a null-terminated UTF-8 string that will contain the error description.
///  Rust side keeps ownership of the buffer. It will be valid as long as no other tessel calls is
///  performed by the thread.
///  If no error occured, null is returned.
#[unsafe(no_mangle)]
pub extern "C" fn tessel_get_last_error() -> *const c_char {
    LAST_ERROR.with(|msg| msg.borrow().as_ref().map(|s| s.as_ptr()).unwrap_or(std::ptr::null()))
}

/// Returns a pointer to a static buffer containing a null-terminated version string.
///
/// Loaders compare it to their own version before trusting a backend module.
/// The returned pointer must not be freed.
#[unsafe(no_mangle)]
pub extern "C" fn tessel_version() -> *const c_char {
    unsafe {
        CStr::from_bytes_with_nul_unchecked(concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes())
            .as_ptr()
    }
}

/// Frees a string allocated by libtessel.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tessel_free_cstring(ptr: *mut c_char) {
    unsafe {
        if !ptr.is_null() {
            let _ = CString::from_raw(ptr);
        }
    }
}

macro_rules! check_not_null {
    ($($ptr:expr),*) => {
        $(
            if $ptr.is_null() {
                anyhow::bail!(concat!("Unexpected null pointer ", stringify!($ptr)));
            }
         )*
    }
}

macro_rules! release {
    ($ptr:expr) => {
        wrap(|| unsafe {
            check_not_null!($ptr, *$ptr);
            let _ = Box::from_raw(*$ptr);
            *$ptr = std::ptr::null_mut();
            Ok(())
        })
    };
}

pub struct TesselBackend(Box<dyn Backend>);

/// Constructs a backend from a null-terminated configuration string, like
/// `cpu` or `hybrid:cpu,interpreter`.
///
/// The returned backend must be destroyed by `tessel_backend_destroy`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tessel_new_backend(
    config: *const c_char,
    backend: *mut *mut TesselBackend,
) -> TESSEL_RESULT {
    wrap(|| unsafe {
        check_not_null!(config, backend);
        *backend = std::ptr::null_mut();
        let config = CStr::from_ptr(config).to_str().context("Backend configuration is not UTF-8")?;
        let b = new_backend(config).with_context(|| format!("Creating backend {config:?}"))?;
        *backend = Box::into_raw(Box::new(TesselBackend(b)));
        Ok(())
    })
}

/// Retrieves the name of a backend.
///
/// The string must be freed by `tessel_free_cstring`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tessel_backend_name(
    backend: *const TesselBackend,
    name: *mut *mut c_char,
) -> TESSEL_RESULT {
    wrap(|| unsafe {
        check_not_null!(backend, name);
        *name = CString::new((*backend).0.name().to_string())?.into_raw();
        Ok(())
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn tessel_backend_destroy(backend: *mut *mut TesselBackend) -> TESSEL_RESULT {
    release!(backend)
}

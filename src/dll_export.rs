use crate::class_factory::{FlifClassFactory, ProviderKind, is_factory_iid};
use crate::can_unload_now;
use crate::log::log;
use crate::registration::{RegistryScope, apply_plan, registration_plan, remove_plan};
use crate::utils::guid::GuidExt;
use std::ffi::c_void;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicPtr, Ordering};
use windows::Win32::Foundation::{
    CLASS_E_CLASSNOTAVAILABLE, E_FAIL, E_NOINTERFACE, E_POINTER, E_UNEXPECTED, HINSTANCE,
    HMODULE, MAX_PATH, S_FALSE, S_OK,
};
use windows::Win32::System::LibraryLoader::GetModuleFileNameW;
use windows::Win32::System::SystemServices::DLL_PROCESS_ATTACH;
use windows::Win32::UI::Shell::{SHCNE_ASSOCCHANGED, SHCNF_IDLIST, SHChangeNotify};
use windows_core::{BOOL, GUID, HRESULT, Interface};

static MODULE: AtomicPtr<c_void> = AtomicPtr::new(null_mut());

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "system" fn DllMain(hinst: HINSTANCE, reason: u32, _reserved: *mut c_void) -> BOOL {
    if reason == DLL_PROCESS_ATTACH {
        MODULE.store(hinst.0, Ordering::SeqCst);
    }
    BOOL::from(true)
}

/// Instance handle window classes are registered under.
pub(crate) fn module_instance() -> HINSTANCE {
    HINSTANCE(MODULE.load(Ordering::SeqCst))
}

/// Full path of this DLL, as written to `InprocServer32`.
pub(crate) fn module_path() -> Option<String> {
    let module = HMODULE(MODULE.load(Ordering::SeqCst));
    if module.is_invalid() {
        return None;
    }
    let mut buf = vec![0u16; MAX_PATH as usize];
    loop {
        let len = unsafe { GetModuleFileNameW(Some(module), &mut buf) } as usize;
        if len == 0 {
            return None;
        }
        if len < buf.len() {
            return Some(String::from_utf16_lossy(&buf[..len]));
        }
        buf.resize(buf.len() * 2, 0);
    }
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "system" fn DllGetClassObject(
    rclsid: *const GUID,
    riid: *const GUID,
    ppv: *mut *mut c_void,
) -> HRESULT {
    if ppv.is_null() {
        return E_POINTER;
    }
    unsafe {
        *ppv = null_mut();
    }
    if rclsid.is_null() || riid.is_null() {
        return E_POINTER;
    }

    let (clsid, iid) = unsafe { (*rclsid, *riid) };
    let Some(kind) = ProviderKind::from_clsid(&clsid) else {
        log(format!(
            "DllGetClassObject: unknown clsid {}",
            clsid.to_braced_upper()
        ));
        return CLASS_E_CLASSNOTAVAILABLE;
    };
    log(format!("DllGetClassObject: {kind:?}"));
    if !is_factory_iid(&iid) {
        return E_NOINTERFACE;
    }

    let factory = FlifClassFactory::new(kind).into_factory();
    unsafe {
        *ppv = factory.into_raw();
    }
    S_OK
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "system" fn DllCanUnloadNow() -> HRESULT {
    let unload = can_unload_now();
    log(format!("DllCanUnloadNow -> {unload}"));
    if unload { S_OK } else { S_FALSE }
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "system" fn DllRegisterServer() -> HRESULT {
    let Some(path) = module_path() else {
        log("DllRegisterServer: module path unavailable");
        return E_UNEXPECTED;
    };
    log(format!("DllRegisterServer: {path}"));

    let plan = registration_plan(&path);
    if let Err(err) = apply_plan(RegistryScope::LocalMachine, &plan) {
        log(format!("DllRegisterServer: {err}"));
        remove_plan(RegistryScope::LocalMachine, &plan);
        return E_FAIL;
    }
    unsafe {
        SHChangeNotify(SHCNE_ASSOCCHANGED, SHCNF_IDLIST, None, None);
    }
    S_OK
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "system" fn DllUnregisterServer() -> HRESULT {
    log("DllUnregisterServer");
    let plan = registration_plan(&module_path().unwrap_or_default());
    remove_plan(RegistryScope::LocalMachine, &plan);
    unsafe {
        SHChangeNotify(SHCNE_ASSOCCHANGED, SHCNF_IDLIST, None, None);
    }
    S_OK
}

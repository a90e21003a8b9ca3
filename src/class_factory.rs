use crate::keys::{CLSID_FLIF_DECODER, CLSID_FLIF_PREVIEW, CLSID_FLIF_PROPERTIES, CLSID_FLIF_THUMB};
use crate::log::log;
use crate::preview_handler::FlifPreviewHandler;
use crate::property_handler::FlifPropertyHandler;
use crate::thumbnail_provider::FlifThumbProvider;
use crate::wic_decoder::FlifWicDecoder;
use crate::{dll_add_ref, dll_release};
use std::ffi::c_void;
use std::ptr::null_mut;
use windows::Win32::Foundation::{CLASS_E_NOAGGREGATION, E_POINTER};
use windows::Win32::System::Com::{IClassFactory, IClassFactory_Impl};
use windows_core::{BOOL, Error, GUID, IUnknown, Interface, Ref, Result};
use windows_implement::implement;

/// The things this DLL can create, one per CLSID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Thumbnail,
    Properties,
    Preview,
    Decoder,
}

impl ProviderKind {
    pub fn from_clsid(clsid: &GUID) -> Option<Self> {
        match clsid.to_u128() {
            CLSID_FLIF_THUMB => Some(ProviderKind::Thumbnail),
            CLSID_FLIF_PROPERTIES => Some(ProviderKind::Properties),
            CLSID_FLIF_PREVIEW => Some(ProviderKind::Preview),
            CLSID_FLIF_DECODER => Some(ProviderKind::Decoder),
            _ => None,
        }
    }

    fn create(self) -> IUnknown {
        match self {
            ProviderKind::Thumbnail => FlifThumbProvider::new().into(),
            ProviderKind::Properties => FlifPropertyHandler::new().into(),
            ProviderKind::Preview => FlifPreviewHandler::new().into(),
            ProviderKind::Decoder => FlifWicDecoder::new().into(),
        }
    }
}

#[implement(IClassFactory)]
pub struct FlifClassFactory {
    kind: ProviderKind,
}

impl FlifClassFactory {
    pub fn new(kind: ProviderKind) -> Self {
        Self { kind }
    }

    pub fn into_factory(self) -> IClassFactory {
        self.into()
    }
}

impl IClassFactory_Impl for FlifClassFactory_Impl {
    #[allow(non_snake_case)]
    fn CreateInstance(
        &self,
        outer: Ref<'_, IUnknown>,
        riid: *const GUID,
        ppv: *mut *mut c_void,
    ) -> Result<()> {
        if ppv.is_null() || riid.is_null() {
            return Err(Error::from(E_POINTER));
        }
        unsafe {
            *ppv = null_mut();
        }
        if outer.is_some() {
            return Err(Error::from(CLASS_E_NOAGGREGATION));
        }

        log(format!("FlifClassFactory::CreateInstance kind={:?}", self.kind));

        // The object answers QueryInterface for exactly the interfaces its
        // role implements; anything else is E_NOINTERFACE.
        let unk = self.kind.create();
        let hr = unsafe { unk.query(riid, ppv) };
        if hr.is_err() {
            log(format!(
                "FlifClassFactory::CreateInstance kind={:?} riid={:?} -> 0x{:08X}",
                self.kind,
                unsafe { *riid },
                hr.0
            ));
        }
        hr.ok()
    }

    #[allow(non_snake_case)]
    fn LockServer(&self, f_lock: BOOL) -> Result<()> {
        if f_lock.as_bool() {
            let n = dll_add_ref();
            log(format!("FlifClassFactory::LockServer lock (count={n})"));
        } else {
            let n = dll_release();
            log(format!("FlifClassFactory::LockServer unlock (count={n})"));
        }
        Ok(())
    }
}

/// Keeps `IClassFactory`/`IUnknown` IID checks next to the factory.
pub fn is_factory_iid(riid: &GUID) -> bool {
    *riid == IClassFactory::IID || *riid == IUnknown::IID
}

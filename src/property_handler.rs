use crate::DllRef;
use crate::codec::default_codec;
use crate::log::log;
use crate::properties::{ImageProperties, ImageProperty, PropertyValue};
use crate::utils::read_stream::read_stream_to_end;
use std::sync::{Mutex, MutexGuard};

use windows_implement::implement;

use windows::Win32::Foundation::{
    E_BOUNDS, E_FAIL, E_POINTER, E_UNEXPECTED, ERROR_ALREADY_INITIALIZED, PROPERTYKEY,
    STG_E_INVALIDPARAMETER,
};
use windows::Win32::Storage::EnhancedStorage::{
    PKEY_Image_BitDepth, PKEY_Image_Dimensions, PKEY_Image_HorizontalSize,
    PKEY_Image_VerticalSize,
};
use windows::Win32::System::Com::IStream;
use windows::Win32::System::Com::StructuredStorage::PROPVARIANT;
use windows::Win32::UI::Shell::PropertiesSystem::{
    IInitializeWithStream, IInitializeWithStream_Impl, IPropertyStore, IPropertyStore_Impl,
};
use windows::core::{Error, Ref, Result};

fn property_key(property: ImageProperty) -> PROPERTYKEY {
    match property {
        ImageProperty::HorizontalSize => PKEY_Image_HorizontalSize,
        ImageProperty::VerticalSize => PKEY_Image_VerticalSize,
        ImageProperty::Dimensions => PKEY_Image_Dimensions,
        ImageProperty::BitDepth => PKEY_Image_BitDepth,
    }
}

fn property_for_key(key: &PROPERTYKEY) -> Option<ImageProperty> {
    ImageProperty::ALL
        .into_iter()
        .find(|p| property_key(*p) == *key)
}

/// Read-only `IPropertyStore` over the header of one FLIF stream.
#[implement(IPropertyStore, IInitializeWithStream)]
pub struct FlifPropertyHandler {
    props: Mutex<Option<ImageProperties>>,
    _dll: DllRef,
}

impl FlifPropertyHandler {
    pub fn new() -> Self {
        Self {
            props: Mutex::new(None),
            _dll: DllRef::new(),
        }
    }

    fn props(&self) -> Result<MutexGuard<'_, Option<ImageProperties>>> {
        self.props.lock().map_err(|_| Error::from(E_UNEXPECTED))
    }
}

impl IInitializeWithStream_Impl for FlifPropertyHandler_Impl {
    #[allow(non_snake_case)]
    fn Initialize(&self, pstream: Ref<'_, IStream>, _grf_mode: u32) -> Result<()> {
        let mut props = self.props()?;
        if props.is_some() {
            return Err(Error::from(ERROR_ALREADY_INITIALIZED.to_hresult()));
        }

        let stream: &IStream = pstream.ok()?;
        let data = read_stream_to_end(stream)?;
        let info = default_codec().read_info(&data).map_err(|err| {
            log(format!("FlifPropertyHandler: header unreadable: {err}"));
            Error::from(E_FAIL)
        })?;

        let read = ImageProperties::from_info(&info);
        log(format!(
            "FlifPropertyHandler: {}x{} @ {} bpp",
            read.width, read.height, read.bit_depth
        ));
        *props = Some(read);
        Ok(())
    }
}

impl IPropertyStore_Impl for FlifPropertyHandler_Impl {
    #[allow(non_snake_case)]
    fn GetCount(&self) -> Result<u32> {
        Ok(ImageProperty::ALL.len() as u32)
    }

    #[allow(non_snake_case)]
    fn GetAt(&self, iprop: u32, pkey: *mut PROPERTYKEY) -> Result<()> {
        if pkey.is_null() {
            return Err(Error::from(E_POINTER));
        }
        let property = ImageProperty::ALL
            .get(iprop as usize)
            .copied()
            .ok_or_else(|| Error::from(E_BOUNDS))?;
        unsafe {
            *pkey = property_key(property);
        }
        Ok(())
    }

    #[allow(non_snake_case)]
    fn GetValue(&self, key: *const PROPERTYKEY) -> Result<PROPVARIANT> {
        if key.is_null() {
            return Err(Error::from(E_POINTER));
        }
        let key = unsafe { *key };
        let Some(property) = property_for_key(&key) else {
            return Ok(PROPVARIANT::default());
        };
        let props = self.props()?;
        // Before Initialize every known key reads as zero.
        let props = props.unwrap_or_default();
        log(format!("GetValue {}", property.canonical_name()));
        Ok(match props.value(property) {
            PropertyValue::U32(v) => PROPVARIANT::from(v),
            PropertyValue::Text(s) => PROPVARIANT::from(s.as_str()),
        })
    }

    #[allow(non_snake_case)]
    fn SetValue(&self, _key: *const PROPERTYKEY, _propvar: *const PROPVARIANT) -> Result<()> {
        Err(Error::from(STG_E_INVALIDPARAMETER))
    }

    #[allow(non_snake_case)]
    fn Commit(&self) -> Result<()> {
        Err(Error::from(STG_E_INVALIDPARAMETER))
    }
}

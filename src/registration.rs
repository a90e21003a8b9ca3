//! Registry layout for the shell handlers and the WIC decoder.
//!
//! The plan is plain data so it can be inspected anywhere; writing it out
//! needs Windows. Paths are relative to a hive root (HKLM or HKCU), the same
//! layout under both.

use crate::codec::FLIF_MAGIC;
use crate::keys::{
    CATID_WIC_BITMAP_DECODERS, CONTENT_TYPE, DECODER_FRIENDLY_NAME, DEFAULT_EXT, DEFAULT_PROGID,
    GUID_CONTAINER_FORMAT_FLIF, KIND, PERCEIVED_TYPE, PREVHOST_APPID_X64, PREVIEW_FRIENDLY_NAME,
    PROGID_FRIENDLY_NAME, PROPERTIES_FRIENDLY_NAME, THUMB_FRIENDLY_NAME, WIC_PIXEL_FORMAT_RGBA,
    WIC_VENDOR_ID, clsid_str, decoder_clsid_str, guid_braced_upper, preview_clsid_str,
    properties_clsid_str, shell_preview_handler_catid_str, shell_thumb_handler_catid_str,
};

pub const APPROVED_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Shell Extensions\Approved";
pub const THUMBNAIL_HANDLERS_KEY: &str =
    r"Software\Microsoft\Windows\CurrentVersion\Explorer\ThumbnailHandlers";
pub const PREVIEW_HANDLERS_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\PreviewHandlers";
pub const PROPERTY_HANDLERS_KEY: &str =
    r"Software\Microsoft\Windows\CurrentVersion\PropertySystem\PropertyHandlers";
pub const KIND_MAP_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Explorer\KindMap";

const PREVIEW_DETAILS: &str = "prop:System.DateModified;System.Image.Dimensions;System.Size;\
*System.OfflineAvailability;*System.OfflineStatus;System.DateCreated;*System.SharedWith";
const FULL_DETAILS: &str = "prop:System.PropGroup.Image;System.Image.Dimensions;\
System.Image.HorizontalSize;System.Image.VerticalSize;System.Image.BitDepth;\
System.PropGroup.FileSystem;System.ItemNameDisplay;System.ItemType;System.ItemFolderPathDisplay;\
System.DateCreated;System.DateModified;System.Size;System.FileAttributes;\
System.OfflineAvailability;System.OfflineStatus;System.SharedWith;System.FileOwner;\
System.ComputerName";
const INFO_TIP: &str = "prop:System.ItemType;System.Image.Dimensions;System.Size";
/// Lets the Photos viewer open `.flif` through the WIC decoder.
const PHOTO_VIEWER: &str = "PhotoViewer.dll";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Thumbnail,
    Properties,
    Preview,
    Decoder,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Thumbnail, Role::Properties, Role::Preview, Role::Decoder];

    pub fn clsid(self) -> String {
        match self {
            Role::Thumbnail => clsid_str(),
            Role::Properties => properties_clsid_str(),
            Role::Preview => preview_clsid_str(),
            Role::Decoder => decoder_clsid_str(),
        }
    }

    pub fn friendly_name(self) -> &'static str {
        match self {
            Role::Thumbnail => THUMB_FRIENDLY_NAME,
            Role::Properties => PROPERTIES_FRIENDLY_NAME,
            Role::Preview => PREVIEW_FRIENDLY_NAME,
            Role::Decoder => DECODER_FRIENDLY_NAME,
        }
    }

    pub fn threading_model(self) -> &'static str {
        match self {
            Role::Properties | Role::Decoder => "Both",
            Role::Thumbnail | Role::Preview => "Apartment",
        }
    }

    /// ShellEx category the role is bound under, if any.
    pub fn shellex_category(self) -> Option<String> {
        match self {
            Role::Thumbnail => Some(shell_thumb_handler_catid_str()),
            Role::Preview => Some(shell_preview_handler_catid_str()),
            Role::Properties | Role::Decoder => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValue {
    Str(String),
    Dword(u32),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEntry {
    /// Key that must exist but carries no values.
    Key { path: String },
    Value {
        path: String,
        /// Empty for the default value.
        name: String,
        value: EntryValue,
        /// Leave an existing non-empty value alone.
        keep_existing: bool,
    },
}

impl RegistryEntry {
    fn key(path: impl Into<String>) -> Self {
        RegistryEntry::Key { path: path.into() }
    }

    fn string(path: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        RegistryEntry::Value {
            path: path.into(),
            name: name.into(),
            value: EntryValue::Str(value.into()),
            keep_existing: false,
        }
    }

    fn dword(path: impl Into<String>, name: impl Into<String>, value: u32) -> Self {
        RegistryEntry::Value {
            path: path.into(),
            name: name.into(),
            value: EntryValue::Dword(value),
            keep_existing: false,
        }
    }

    fn binary(path: impl Into<String>, name: impl Into<String>, value: &[u8]) -> Self {
        RegistryEntry::Value {
            path: path.into(),
            name: name.into(),
            value: EntryValue::Binary(value.to_vec()),
            keep_existing: false,
        }
    }

    fn keep_existing(mut self) -> Self {
        if let RegistryEntry::Value { keep_existing, .. } = &mut self {
            *keep_existing = true;
        }
        self
    }

    pub fn path(&self) -> &str {
        match self {
            RegistryEntry::Key { path } | RegistryEntry::Value { path, .. } => path,
        }
    }
}

/// What unregistration removes: whole trees we own and single values in
/// keys shared with the rest of the system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalPlan {
    pub trees: Vec<String>,
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationPlan {
    pub entries: Vec<RegistryEntry>,
    pub removal: RemovalPlan,
}

fn classes(path: impl AsRef<str>) -> String {
    format!(r"Software\Classes\{}", path.as_ref())
}

/// WIC decoder description: container format, capabilities, the pixel
/// format it hands out and the byte pattern that identifies a FLIF stream.
fn decoder_entries(clsid_key: &str, entries: &mut Vec<RegistryEntry>) {
    let strings = [
        ("ContainerFormat", guid_braced_upper(GUID_CONTAINER_FORMAT_FLIF)),
        ("FileExtensions", DEFAULT_EXT.to_string()),
        ("FriendlyName", DECODER_FRIENDLY_NAME.to_string()),
        ("MimeTypes", CONTENT_TYPE.to_string()),
        ("VendorGUID", guid_braced_upper(WIC_VENDOR_ID)),
        ("Version", env!("CARGO_PKG_VERSION").to_string()),
    ];
    for (name, value) in strings {
        entries.push(RegistryEntry::string(clsid_key, name, value));
    }
    for name in ["SupportsAnimation", "SupportLossless", "SupportMultiframe"] {
        entries.push(RegistryEntry::dword(clsid_key, name, 1));
    }
    entries.push(RegistryEntry::dword(clsid_key, "SupportChromakey", 0));
    entries.push(RegistryEntry::key(format!(
        r"{clsid_key}\Formats\{}",
        guid_braced_upper(WIC_PIXEL_FORMAT_RGBA)
    )));

    let pattern = format!(r"{clsid_key}\Patterns\0");
    entries.push(RegistryEntry::dword(&pattern, "Position", 0));
    entries.push(RegistryEntry::dword(&pattern, "Length", FLIF_MAGIC.len() as u32));
    entries.push(RegistryEntry::binary(&pattern, "Pattern", FLIF_MAGIC));
    entries.push(RegistryEntry::binary(&pattern, "Mask", &[0xFF; FLIF_MAGIC.len()]));
}

/// Every key and value needed to register `dll_path` for all roles.
pub fn registration_plan(dll_path: &str) -> RegistrationPlan {
    let mut entries = Vec::new();
    let mut removal = RemovalPlan::default();
    let ext = DEFAULT_EXT;

    for role in Role::ALL {
        let clsid = role.clsid();
        let clsid_key = classes(format!(r"CLSID\{clsid}"));
        entries.push(RegistryEntry::string(&clsid_key, "", role.friendly_name()));
        entries.push(RegistryEntry::string(
            format!(r"{clsid_key}\InprocServer32"),
            "",
            dll_path,
        ));
        entries.push(RegistryEntry::string(
            format!(r"{clsid_key}\InprocServer32"),
            "ThreadingModel",
            role.threading_model(),
        ));
        if let Some(catid) = role.shellex_category() {
            entries.push(RegistryEntry::key(format!(
                r"{clsid_key}\Implemented Categories\{catid}"
            )));
        }
        match role {
            Role::Thumbnail => {
                entries.push(RegistryEntry::dword(&clsid_key, "DisableProcessIsolation", 1));
            }
            Role::Properties => {
                entries.push(RegistryEntry::dword(&clsid_key, "ManualSafeSave", 1));
            }
            Role::Preview => {
                entries.push(RegistryEntry::string(
                    &clsid_key,
                    "AppID",
                    guid_braced_upper(PREVHOST_APPID_X64),
                ));
            }
            Role::Decoder => {
                decoder_entries(&clsid_key, &mut entries);
                let instance = classes(format!(
                    r"CLSID\{}\Instance\{clsid}",
                    guid_braced_upper(CATID_WIC_BITMAP_DECODERS)
                ));
                entries.push(RegistryEntry::string(&instance, "CLSID", &clsid));
                entries.push(RegistryEntry::string(&instance, "FriendlyName", role.friendly_name()));
                removal.trees.push(instance);
                // WIC components are not shell extensions.
                removal.trees.push(clsid_key);
                continue;
            }
        }
        entries.push(RegistryEntry::string(APPROVED_KEY, &clsid, role.friendly_name()));

        removal.trees.push(clsid_key);
        removal.values.push((APPROVED_KEY.to_string(), clsid));
    }

    let ext_key = classes(ext);
    entries.push(RegistryEntry::string(&ext_key, "", DEFAULT_PROGID).keep_existing());
    entries.push(RegistryEntry::string(&ext_key, "Content Type", CONTENT_TYPE).keep_existing());
    entries.push(RegistryEntry::string(&ext_key, "PerceivedType", PERCEIVED_TYPE));
    let open_with_list = format!(r"{ext_key}\OpenWithList\{PHOTO_VIEWER}");
    entries.push(RegistryEntry::key(&open_with_list));
    entries.push(RegistryEntry::string(
        format!(r"{ext_key}\OpenWithProgids"),
        DEFAULT_PROGID,
        "",
    ));
    removal.trees.push(open_with_list);
    removal.values.push((format!(r"{ext_key}\OpenWithProgids"), DEFAULT_PROGID.to_string()));

    let progid_key = classes(DEFAULT_PROGID);
    entries.push(RegistryEntry::string(&progid_key, "", PROGID_FRIENDLY_NAME).keep_existing());

    let sys_key = classes(format!(r"SystemFileAssociations\{ext}"));
    for base in [&ext_key, &progid_key, &sys_key] {
        for role in Role::ALL {
            if let Some(catid) = role.shellex_category() {
                let path = format!(r"{base}\ShellEx\{catid}");
                entries.push(RegistryEntry::string(&path, "", role.clsid()));
                removal.trees.push(path);
            }
        }
    }
    entries.push(RegistryEntry::string(&sys_key, "PreviewDetails", PREVIEW_DETAILS));
    entries.push(RegistryEntry::string(&sys_key, "FullDetails", FULL_DETAILS));
    entries.push(RegistryEntry::string(&sys_key, "InfoTip", INFO_TIP));
    for name in ["PreviewDetails", "FullDetails", "InfoTip"] {
        removal.values.push((sys_key.clone(), name.to_string()));
    }

    entries.push(RegistryEntry::string(THUMBNAIL_HANDLERS_KEY, ext, clsid_str()));
    entries.push(RegistryEntry::string(
        PREVIEW_HANDLERS_KEY,
        preview_clsid_str(),
        PREVIEW_FRIENDLY_NAME,
    ));
    let property_key = format!(r"{PROPERTY_HANDLERS_KEY}\{ext}");
    entries.push(RegistryEntry::string(&property_key, "", properties_clsid_str()));
    entries.push(RegistryEntry::string(KIND_MAP_KEY, ext, KIND));

    removal.trees.push(property_key);
    removal.trees.push(progid_key);
    removal.values.push((THUMBNAIL_HANDLERS_KEY.to_string(), ext.to_string()));
    removal.values.push((PREVIEW_HANDLERS_KEY.to_string(), preview_clsid_str()));
    removal.values.push((KIND_MAP_KEY.to_string(), ext.to_string()));
    removal.values.push((ext_key.clone(), "Content Type".to_string()));
    removal.values.push((ext_key, "PerceivedType".to_string()));

    RegistrationPlan { entries, removal }
}

#[cfg(windows)]
pub use win::{RegistryScope, apply_plan, remove_plan};

#[cfg(windows)]
mod win {
    use super::{EntryValue, RegistrationPlan, RegistryEntry};
    use crate::log::log;
    use std::io;
    use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_SET_VALUE, REG_BINARY};
    use winreg::{RegKey, RegValue};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum RegistryScope {
        CurrentUser,
        LocalMachine,
    }

    impl RegistryScope {
        pub fn name(self) -> &'static str {
            match self {
                RegistryScope::CurrentUser => "HKCU",
                RegistryScope::LocalMachine => "HKLM",
            }
        }

        pub fn root(self) -> RegKey {
            match self {
                RegistryScope::CurrentUser => RegKey::predef(HKEY_CURRENT_USER),
                RegistryScope::LocalMachine => RegKey::predef(HKEY_LOCAL_MACHINE),
            }
        }
    }

    fn is_blank(s: &str) -> bool {
        s.trim_matches(char::from(0)).trim().is_empty()
    }

    pub fn apply_plan(scope: RegistryScope, plan: &RegistrationPlan) -> io::Result<()> {
        let root = scope.root();
        log(format!(
            "Register [{}]: writing {} entries",
            scope.name(),
            plan.entries.len()
        ));
        for entry in &plan.entries {
            let (key, _) = root.create_subkey(entry.path())?;
            let RegistryEntry::Value {
                name,
                value,
                keep_existing,
                ..
            } = entry
            else {
                continue;
            };
            if *keep_existing {
                if let Ok(existing) = key.get_value::<String, _>(name) {
                    if !is_blank(&existing) {
                        log(format!(
                            "Register [{}]: keeping {}\\{} = {}",
                            scope.name(),
                            entry.path(),
                            name,
                            existing
                        ));
                        continue;
                    }
                }
            }
            match value {
                EntryValue::Str(s) => key.set_value(name, s)?,
                EntryValue::Dword(d) => key.set_value(name, d)?,
                EntryValue::Binary(bytes) => key.set_raw_value(
                    name,
                    &RegValue {
                        bytes: bytes.clone(),
                        vtype: REG_BINARY,
                    },
                )?,
            }
        }
        log(format!("Register [{}]: completed", scope.name()));
        Ok(())
    }

    /// Best effort: missing keys are not errors.
    pub fn remove_plan(scope: RegistryScope, plan: &RegistrationPlan) {
        let root = scope.root();
        for tree in &plan.removal.trees {
            if root.delete_subkey_all(tree).is_ok() {
                log(format!("Unregister [{}]: removed {}", scope.name(), tree));
            }
        }
        for (path, name) in &plan.removal.values {
            if let Ok(key) = root.open_subkey_with_flags(path, KEY_SET_VALUE) {
                let _ = key.delete_value(name);
            }
        }
        log(format!("Unregister [{}]: completed", scope.name()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(plan: &'a RegistrationPlan, path: &str, name: &str) -> Option<&'a RegistryEntry> {
        plan.entries.iter().find(|e| match e {
            RegistryEntry::Value { path: p, name: n, .. } => p == path && n == name,
            RegistryEntry::Key { .. } => false,
        })
    }

    fn str_value(plan: &RegistrationPlan, path: &str, name: &str) -> Option<String> {
        match find(plan, path, name)? {
            RegistryEntry::Value {
                value: EntryValue::Str(s),
                ..
            } => Some(s.clone()),
            _ => None,
        }
    }

    #[test]
    fn test_inproc_servers_point_at_dll() {
        let plan = registration_plan(r"C:\Program Files\flif-shell-win\flif_shell_win.dll");
        for role in Role::ALL {
            let key = format!(r"Software\Classes\CLSID\{}\InprocServer32", role.clsid());
            assert_eq!(
                str_value(&plan, &key, "").as_deref(),
                Some(r"C:\Program Files\flif-shell-win\flif_shell_win.dll")
            );
            assert_eq!(
                str_value(&plan, &key, "ThreadingModel").as_deref(),
                Some(role.threading_model())
            );
        }
    }

    #[test]
    fn test_preview_binding_and_surrogate() {
        let plan = registration_plan("x.dll");
        let preview = preview_clsid_str();
        assert_eq!(
            str_value(
                &plan,
                &format!(r"Software\Classes\.flif\ShellEx\{}", shell_preview_handler_catid_str()),
                ""
            ),
            Some(preview.clone())
        );
        assert_eq!(
            str_value(&plan, &format!(r"Software\Classes\CLSID\{preview}"), "AppID").as_deref(),
            Some("{6D2B5079-2F0B-48DD-AB7F-97CEC514D30B}")
        );
        assert_eq!(
            str_value(&plan, PREVIEW_HANDLERS_KEY, &preview).as_deref(),
            Some(PREVIEW_FRIENDLY_NAME)
        );
    }

    #[test]
    fn test_property_handler_entries() {
        let plan = registration_plan("x.dll");
        assert_eq!(
            str_value(&plan, &format!(r"{PROPERTY_HANDLERS_KEY}\.flif"), ""),
            Some(properties_clsid_str())
        );
        assert_eq!(str_value(&plan, KIND_MAP_KEY, ".flif").as_deref(), Some("Picture"));
        let full = str_value(&plan, r"Software\Classes\SystemFileAssociations\.flif", "FullDetails")
            .unwrap();
        assert!(full.contains("System.Image.BitDepth"));
    }

    #[test]
    fn test_extension_defaults_do_not_clobber() {
        let plan = registration_plan("x.dll");
        match find(&plan, r"Software\Classes\.flif", "").unwrap() {
            RegistryEntry::Value {
                value,
                keep_existing,
                ..
            } => {
                assert_eq!(value, &EntryValue::Str(DEFAULT_PROGID.into()));
                assert!(keep_existing);
            }
            RegistryEntry::Key { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_removal_covers_owned_keys() {
        let plan = registration_plan("x.dll");
        for role in Role::ALL {
            let key = format!(r"Software\Classes\CLSID\{}", role.clsid());
            assert!(plan.removal.trees.contains(&key));
        }
        let instance = format!(
            r"Software\Classes\CLSID\{}\Instance\{}",
            guid_braced_upper(CATID_WIC_BITMAP_DECODERS),
            decoder_clsid_str()
        );
        assert!(plan.removal.trees.contains(&instance));
        // The extension key itself is shared with other software.
        assert!(!plan.removal.trees.iter().any(|t| t == r"Software\Classes\.flif"));
    }

    fn dword_value(plan: &RegistrationPlan, path: &str, name: &str) -> Option<u32> {
        match find(plan, path, name)? {
            RegistryEntry::Value {
                value: EntryValue::Dword(d),
                ..
            } => Some(*d),
            _ => None,
        }
    }

    #[test]
    fn test_decoder_is_listed_with_wic() {
        let plan = registration_plan("x.dll");
        let decoder = decoder_clsid_str();
        let instance = format!(
            r"Software\Classes\CLSID\{{7ED96837-96F0-4812-B211-F13C24117ED3}}\Instance\{decoder}"
        );
        assert_eq!(str_value(&plan, &instance, "CLSID"), Some(decoder.clone()));
        assert_eq!(
            str_value(&plan, &instance, "FriendlyName").as_deref(),
            Some(DECODER_FRIENDLY_NAME)
        );

        let key = format!(r"Software\Classes\CLSID\{decoder}");
        assert_eq!(
            str_value(&plan, &key, "ContainerFormat").as_deref(),
            Some("{3B9D0588-14A5-4DF3-9C53-7EFCF8BFD65D}")
        );
        assert_eq!(str_value(&plan, &key, "FileExtensions").as_deref(), Some(".flif"));
        assert_eq!(str_value(&plan, &key, "MimeTypes").as_deref(), Some("image/flif"));
        assert_eq!(dword_value(&plan, &key, "SupportsAnimation"), Some(1));
        assert_eq!(dword_value(&plan, &key, "SupportMultiframe"), Some(1));
        assert!(plan.entries.contains(&RegistryEntry::Key {
            path: format!(r"{key}\Formats\{{F5C7AD2D-6A8D-43DD-A7A8-A29935261AE9}}"),
        }));

        // Not a shell extension: no approval and no ShellEx binding.
        assert!(find(&plan, APPROVED_KEY, &decoder).is_none());
        assert!(!plan.entries.iter().any(|e| match e {
            RegistryEntry::Value {
                value: EntryValue::Str(s),
                ..
            } => s == &decoder && e.path().contains("ShellEx"),
            RegistryEntry::Value { .. } | RegistryEntry::Key { .. } => false,
        }));
    }

    #[test]
    fn test_decoder_pattern_matches_magic() {
        let plan = registration_plan("x.dll");
        let pattern = format!(r"Software\Classes\CLSID\{}\Patterns\0", decoder_clsid_str());
        assert_eq!(dword_value(&plan, &pattern, "Position"), Some(0));
        assert_eq!(dword_value(&plan, &pattern, "Length"), Some(4));
        match find(&plan, &pattern, "Pattern") {
            Some(RegistryEntry::Value {
                value: EntryValue::Binary(bytes),
                ..
            }) => assert_eq!(bytes.as_slice(), b"FLIF"),
            other => panic!("unexpected pattern entry {other:?}"),
        }
        match find(&plan, &pattern, "Mask") {
            Some(RegistryEntry::Value {
                value: EntryValue::Binary(bytes),
                ..
            }) => assert_eq!(bytes.as_slice(), &[0xFF; 4]),
            other => panic!("unexpected mask entry {other:?}"),
        }
    }

    #[test]
    fn test_open_with_photo_viewer() {
        let plan = registration_plan("x.dll");
        assert!(plan.entries.contains(&RegistryEntry::Key {
            path: r"Software\Classes\.flif\OpenWithList\PhotoViewer.dll".to_string(),
        }));
        assert_eq!(
            str_value(&plan, r"Software\Classes\.flif\OpenWithProgids", DEFAULT_PROGID).as_deref(),
            Some("")
        );
    }
}

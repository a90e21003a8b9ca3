use flif_shell_win::keys::{
    CATID_WIC_BITMAP_DECODERS, CLSID_FLIF_DECODER, CLSID_FLIF_PREVIEW, CLSID_FLIF_PROPERTIES,
    CLSID_FLIF_THUMB, DEFAULT_EXT, LOG_SETTINGS_SUBKEY, guid_braced_upper,
};
use flif_shell_win::log::{log_cli, log_enabled, log_file_path};
use flif_shell_win::registration::{PROPERTY_HANDLERS_KEY, RegistryScope, Role};
use std::io;
use std::path::Path;
use windows::Win32::Foundation::{S_FALSE, S_OK};
use windows::Win32::System::Com::{
    CLSCTX_INPROC_SERVER, COINIT_APARTMENTTHREADED, CoCreateInstance, CoInitializeEx,
    CoUninitialize,
};
use windows::core::{GUID, IUnknown};
use winreg::RegKey;
use winreg::enums::HKEY_CLASSES_ROOT;

fn mark(b: bool) -> &'static str {
    if b { "OK" } else { "NO" }
}

fn clsid_u128(role: Role) -> u128 {
    match role {
        Role::Thumbnail => CLSID_FLIF_THUMB,
        Role::Properties => CLSID_FLIF_PROPERTIES,
        Role::Preview => CLSID_FLIF_PREVIEW,
        Role::Decoder => CLSID_FLIF_DECODER,
    }
}

fn read_default(root: &RegKey, path: &str) -> Option<String> {
    root.open_subkey(path)
        .ok()?
        .get_value::<String, _>("")
        .ok()
        .filter(|s| !s.is_empty())
}

struct RoleReport {
    role: Role,
    server: Option<String>,
    bound: bool,
    creates: Result<(), String>,
}

impl RoleReport {
    fn server_exists(&self) -> bool {
        self.server.as_deref().is_some_and(|p| Path::new(p).is_file())
    }

    fn is_ready(&self) -> bool {
        self.server_exists() && self.bound && self.creates.is_ok()
    }
}

/// HKCR merges HKLM and HKCU, which is what Explorer sees.
fn inspect(role: Role, com_ready: bool) -> RoleReport {
    let hkcr = RegKey::predef(HKEY_CLASSES_ROOT);
    let clsid = role.clsid();
    let server = read_default(&hkcr, &format!(r"CLSID\{clsid}\InprocServer32"));

    let bound = match (role, role.shellex_category()) {
        (_, Some(cat)) => read_default(&hkcr, &format!(r"{DEFAULT_EXT}\ShellEx\{cat}"))
            .is_some_and(|v| v.eq_ignore_ascii_case(&clsid)),
        // WIC finds decoders through its category's Instance list.
        (Role::Decoder, None) => hkcr
            .open_subkey(format!(
                r"CLSID\{}\Instance\{clsid}",
                guid_braced_upper(CATID_WIC_BITMAP_DECODERS)
            ))
            .and_then(|key| key.get_value::<String, _>("CLSID"))
            .is_ok_and(|v| v.eq_ignore_ascii_case(&clsid)),
        (_, None) => [RegistryScope::LocalMachine, RegistryScope::CurrentUser]
            .iter()
            .filter_map(|scope| {
                read_default(&scope.root(), &format!(r"{PROPERTY_HANDLERS_KEY}\{DEFAULT_EXT}"))
            })
            .any(|v| v.eq_ignore_ascii_case(&clsid)),
    };

    let creates = if com_ready {
        let guid = GUID::from_u128(clsid_u128(role));
        unsafe { CoCreateInstance::<Option<&IUnknown>, IUnknown>(&guid, None, CLSCTX_INPROC_SERVER) }
            .map(|_| ())
            .map_err(|err| format!("{err:?}"))
    } else {
        Err("COM not initialized".to_string())
    };

    RoleReport {
        role,
        server,
        bound,
        creates,
    }
}

pub fn status() -> io::Result<()> {
    log_cli("Status: start");
    let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
    let com_ready = hr == S_OK || hr == S_FALSE;

    let reports: Vec<RoleReport> = Role::ALL.iter().map(|&r| inspect(r, com_ready)).collect();

    if com_ready {
        unsafe { CoUninitialize() };
    }

    println!("FLIF shell extension status ({DEFAULT_EXT})");
    for report in &reports {
        println!("\n  {} {}", report.role.friendly_name(), report.role.clsid());
        println!(
            "    InprocServer32:  {}",
            report.server.as_deref().unwrap_or("<missing>")
        );
        println!("    DLL on disk:     {}", mark(report.server_exists()));
        println!("    Bound to {DEFAULT_EXT}:   {}", mark(report.bound));
        match &report.creates {
            Ok(()) => println!("    CoCreateInstance: OK"),
            Err(err) => {
                println!("    CoCreateInstance: NO ({err})");
                log_cli(format!(
                    "Status: {} CoCreateInstance failed: {err}",
                    report.role.friendly_name()
                ));
            }
        }
        println!("    Ready:           {}", mark(report.is_ready()));
    }

    println!(
        "\n  Logging:         {} (HKCU\\{LOG_SETTINGS_SUBKEY})",
        if log_enabled() { "enabled" } else { "disabled" }
    );
    if let Some(path) = log_file_path() {
        println!("  Log file:        {}", path.display());
    }

    log_cli(format!(
        "Status: ready {}/{}",
        reports.iter().filter(|r| r.is_ready()).count(),
        reports.len()
    ));
    Ok(())
}

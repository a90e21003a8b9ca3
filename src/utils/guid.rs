use windows_core::GUID;

use crate::keys::guid_braced_upper;

pub trait GuidExt {
    /// `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}` upper-case with braces.
    fn to_braced_upper(&self) -> String;
}

impl GuidExt for GUID {
    fn to_braced_upper(&self) -> String {
        guid_braced_upper(self.to_u128())
    }
}

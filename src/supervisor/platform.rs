//! Host-specific unmount commands.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;

/// Known unmount invocations keyed by `std::env::consts::OS`.
const UNMOUNT_TABLE: &[(&str, &str, &[&str])] = &[
    ("macos", "umount", &[]),
    ("linux", "fusermount", &["-u"]),
    ("freebsd", "umount", &[]),
];

/// Fallback for hosts missing from the table.
const DEFAULT_UNMOUNT: (&str, &[&str]) = ("fusermount", &["-u"]);

/// An unmount invocation; the mount path is appended as the final argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmountCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl UnmountCommand {
    /// Resolve the command for the host this binary is running on.
    pub fn for_host() -> Self {
        Self::for_platform(std::env::consts::OS)
    }

    pub fn for_platform(os: &str) -> Self {
        let (program, args) = UNMOUNT_TABLE
            .iter()
            .find(|(name, _, _)| *name == os)
            .map(|(_, program, args)| (*program, *args))
            .unwrap_or(DEFAULT_UNMOUNT);
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Arguments for unmounting `mount_path`.
    pub fn args_for(&self, mount_path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.push(mount_path.as_os_str().to_owned());
        args
    }
}

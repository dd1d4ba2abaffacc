//! Shared test utilities for integration tests
//!
//! A `Rig` is a temporary workspace holding shell stand-ins for every external
//! collaborator: a filesystem service that "mounts" a plain directory and exits 0
//! once unmounted, a signature tool, tar-based save/load and checkpoint/restore
//! tools, and a stress script. The orchestration protocol runs unchanged against it.

use snapverify::config::{HarnessConfig, IntRange};
use snapverify::snapshot::SnapshotBackend;
use snapverify::supervisor::UnmountCommand;
use snapverify::verifier::scenario::ScenarioCounts;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SERVICE: &str = "#!/bin/sh
if [ $# -lt 1 ]; then
  echo \"USAGE: $(basename \"$0\") MOUNTPOINT\" >&2
  exit 1
fi
marker=\"$1.unmounted\"
while [ ! -e \"$marker\" ]; do sleep 0.05; done
rm -f \"$marker\"
exit 0
";

/// Prints a header line, then a checksum over paths, modes and types.
pub const SIGNATURE: &str = "#!/bin/sh
echo \"Current abstract state is:\"
cd \"$1\" || exit 2
find . -mindepth 1 -printf '%p %m %y\\n' | LC_ALL=C sort | cksum | cut -d' ' -f1
";

pub const TRANSIENT_SIGNATURE: &str = "#!/bin/sh
echo \"iterating...\"
";

pub const SAVE: &str = "#!/bin/sh
tar -cf \"$2\" -C \"$1\" .
";

pub const LOAD: &str = "#!/bin/sh
find \"$1\" -mindepth 1 -maxdepth 1 -exec rm -rf {} + && tar -xf \"$2\" -C \"$1\"
";

/// Accepts the request and restores nothing.
pub const NOOP_LOAD: &str = "#!/bin/sh
exit 0
";

pub const CHECKPOINT: &str = "#!/bin/sh
tar -cf \"$(dirname \"$0\")/ckpt-$2.tar\" -C \"$1\" .
";

pub const RESTORE: &str = "#!/bin/sh
find \"$1\" -mindepth 1 -maxdepth 1 -exec rm -rf {} + && tar -xf \"$(dirname \"$0\")/ckpt-$2.tar\" -C \"$1\"
";

/// Records its arguments, then creates `threads` fresh directories.
pub const STRESS: &str = "#!/bin/sh
echo \"$@\" >> \"$(dirname \"$0\")/stress.log\"
i=0
while [ $i -lt \"$3\" ]; do
  mkdir -p \"$1/stress_$$_$i\" && touch \"$1/stress_$$_$i/f\"
  i=$((i+1))
done
";

/// Write an executable script.
pub fn write_script(path: &Path, body: &str) -> PathBuf {
    fs::write(path, body).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
    path.to_path_buf()
}

pub struct Rig {
    pub temp: TempDir,
    pub root: PathBuf,
    pub bin: PathBuf,
}

impl Rig {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let bin = root.join("bin");
        fs::create_dir_all(&bin).unwrap();
        for (name, body) in [
            ("fake-fs", SERVICE),
            ("sig", SIGNATURE),
            ("sig-transient", TRANSIENT_SIGNATURE),
            ("pkl", SAVE),
            ("load", LOAD),
            ("load-noop", NOOP_LOAD),
            ("ckpt", CHECKPOINT),
            ("restore", RESTORE),
            ("racer", STRESS),
        ] {
            write_script(&bin.join(name), body);
        }
        Self { temp, root, bin }
    }

    pub fn tool(&self, name: &str) -> PathBuf {
        self.bin.join(name)
    }

    pub fn mount_path(&self) -> PathBuf {
        self.root.join("mnt")
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    /// Sentinel the fake service deletes when it exits after an unmount.
    pub fn unmount_marker(&self) -> PathBuf {
        self.root.join("mnt.unmounted")
    }

    pub fn stress_log(&self) -> Vec<String> {
        fs::read_to_string(self.bin.join("stress.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Small, fast configuration wired to the stand-in tools.
    pub fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::default();
        config.service.executable = self.tool("fake-fs");
        config.service.mount_path = self.mount_path();
        config.tools.signature = self.tool("sig");
        config.tools.save = self.tool("pkl");
        config.tools.load = self.tool("load");
        config.tools.checkpoint = self.tool("ckpt");
        config.tools.restore = self.tool("restore");
        config.tools.stress = Some(self.tool("racer"));
        config.snapshot.prefix = "pickle_tmp".to_string();
        config.snapshot.artifact_dir = self.artifact_dir();
        config.snapshot.backend = SnapshotBackend::Pickle;
        config.timing.mount_settle_ms = 50;
        config.timing.restore_settle_ms = 0;
        config.timing.stress_settle_ms = 0;
        config.timing.cleanup_settle_ms = 0;
        config.timing.unmount_timeout_ms = 5_000;
        config.stress.duration_secs = IntRange::new(1, 2);
        config.stress.threads = IntRange::new(1, 4);
        config.stress.rounds = IntRange::new(2, 3);
        config.stress.seed = Some(17);
        config.unmount = Some(UnmountCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "touch \"$0.unmounted\"".to_string()],
        });
        config.scenario = ScenarioCounts {
            entries: 5,
            nested_files: 2,
        };
        config
    }

    /// Same configuration as TOML in `<root>/config/config.toml`, for CLI runs.
    pub fn write_workspace_config(&self) -> PathBuf {
        let dir = self.root.join("config");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let body = format!(
            r#"
[service]
executable = "{fs}"
mount_path = "mnt"

[tools]
signature = "{sig}"
save = "{pkl}"
load = "{load}"
stress = "{racer}"

[snapshot]
prefix = "pickle_tmp"
artifact_dir = "artifacts"

[timing]
mount_settle_ms = 50
restore_settle_ms = 0
stress_settle_ms = 0
cleanup_settle_ms = 0

[stress]
duration_secs = {{ low = 1, high = 2 }}
threads = {{ low = 1, high = 3 }}
rounds = {{ low = 1, high = 2 }}
seed = 5

[unmount]
program = "sh"
args = ["-c", "touch \"$0.unmounted\""]

[scenario]
entries = 4
nested_files = 1
"#,
            fs = self.tool("fake-fs").display(),
            sig = self.tool("sig").display(),
            pkl = self.tool("pkl").display(),
            load = self.tool("load").display(),
            racer = self.tool("racer").display(),
        );
        fs::write(&path, body).unwrap();
        path
    }

    /// Entries left in the artifact directory that carry the snapshot prefix.
    pub fn leftover_artifacts(&self) -> Vec<String> {
        match fs::read_dir(self.artifact_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.starts_with("pickle_tmp"))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

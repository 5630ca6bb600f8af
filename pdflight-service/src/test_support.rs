//! Fake gs/qpdf/ocrmypdf executables for tests.
//!
//! Each fake appends its name to `calls.log` next to it, then copies its input
//! PDF to its output path (or fails/hangs, depending on the variant).

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tempfile::TempDir;

use crate::config::Config;

const GS_OK: &str = r#"#!/bin/sh
echo gs >> "$(dirname "$0")/calls.log"
out=""
for arg in "$@"; do
  case "$arg" in
    -sOutputFile=*) out="${arg#-sOutputFile=}" ;;
  esac
  last="$arg"
done
cp "$last" "$out"
"#;

const GS_FAIL: &str = r#"#!/bin/sh
echo gs >> "$(dirname "$0")/calls.log"
echo "Error: /syntaxerror, unrecoverable error in xref" >&2
exit 1
"#;

const GS_HANG: &str = r#"#!/bin/sh
echo gs >> "$(dirname "$0")/calls.log"
sleep 30 &
wait
"#;

/// `<tool> [options...] <input> <output>`
fn copy_script(name: &str) -> String {
    format!(
        r#"#!/bin/sh
echo {name} >> "$(dirname "$0")/calls.log"
prev=""
last=""
for arg in "$@"; do
  prev="$last"
  last="$arg"
done
cp "$prev" "$last"
"#
    )
}

fn fail_script(name: &str) -> String {
    format!(
        r#"#!/bin/sh
echo {name} >> "$(dirname "$0")/calls.log"
echo "{name}: operation failed" >&2
exit 2
"#
    )
}

pub struct FakeTools {
    bin: TempDir,
    work: TempDir,
}

impl FakeTools {
    fn with_scripts(gs: &str, qpdf: &str, ocrmypdf: &str) -> Self {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        install(bin.path(), "gs", gs);
        install(bin.path(), "qpdf", qpdf);
        install(bin.path(), "ocrmypdf", ocrmypdf);
        Self { bin, work }
    }

    pub fn working() -> Self {
        Self::with_scripts(GS_OK, &copy_script("qpdf"), &copy_script("ocrmypdf"))
    }

    pub fn failing_ghostscript() -> Self {
        Self::with_scripts(GS_FAIL, &copy_script("qpdf"), &copy_script("ocrmypdf"))
    }

    pub fn failing_qpdf() -> Self {
        Self::with_scripts(GS_OK, &fail_script("qpdf"), &copy_script("ocrmypdf"))
    }

    pub fn hanging_ghostscript() -> Self {
        Self::with_scripts(GS_HANG, &copy_script("qpdf"), &copy_script("ocrmypdf"))
    }

    /// Config pointing at the fakes, with workspaces under a private dir.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        let program = |name: &str| self.bin.path().join(name).to_string_lossy().into_owned();
        config.tools.ghostscript = program("gs");
        config.tools.qpdf = program("qpdf");
        config.tools.ocrmypdf = program("ocrmypdf");
        config.tools.timeout_secs = 30;
        config.tools.work_dir = Some(self.work.path().to_path_buf());
        config
    }

    /// Tools invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.bin.path().join("calls.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn work_dir_is_empty(&self) -> bool {
        fs::read_dir(self.work.path()).unwrap().next().is_none()
    }
}

fn install(dir: &Path, name: &str, script: &str) {
    let path = dir.join(name);
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

use std::{
    fs::{self, File},
    io::{self, ErrorKind},
    path::Path,
    process,
    sync::atomic::{AtomicU64, Ordering},
};

/// every run file starts with this prefix...
pub const RUN_FILE_PREFIX: &str = "spillsort_run_";
/// ...and ends with this suffix, so leftovers can be recognised and swept.
pub const RUN_FILE_SUFFIX: &str = ".run";

/// process wide so that two sorters sharing a directory never pick the same name.
static NEXT_RUN_INDEX: AtomicU64 = AtomicU64::new(0);

/// Builds the name of the next run file: prefix, pid, a monotonically
/// increasing index and the suffix.
pub fn next_run_file_name() -> String {
    let index = NEXT_RUN_INDEX.fetch_add(1, Ordering::Relaxed);
    format!("{RUN_FILE_PREFIX}{}_{index}{RUN_FILE_SUFFIX}", process::id())
}

/// true if the file name follows the run file naming convention.
pub fn is_run_file_name(name: &str) -> bool {
    name.strip_prefix(RUN_FILE_PREFIX)
        .and_then(|rest| rest.strip_suffix(RUN_FILE_SUFFIX))
        .map(|middle| {
            !middle.is_empty() && middle.chars().all(|c| c.is_ascii_digit() || c == '_')
        })
        .unwrap_or(false)
}

/// the id of the process that created the run file, if the name carries one.
fn run_file_pid(name: &str) -> Option<u32> {
    name.strip_prefix(RUN_FILE_PREFIX)?
        .split_once('_')?
        .0
        .parse()
        .ok()
}

/// true for run files left behind by another process.
/// Runs created by this process may belong to a live sorter and are never stale.
pub fn is_stale_run_file_name(name: &str) -> bool {
    is_run_file_name(name) && run_file_pid(name) != Some(process::id())
}

/// Creates a fresh run file. Fails if the file already exists.
pub fn create_file(path: &Path) -> io::Result<File> {
    fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
}

/// Removes a run file. A file that is already gone counts as removed.
pub fn remove_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

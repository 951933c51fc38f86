use chrono::Local;
use std::{
    backtrace::Backtrace,
    fs::OpenOptions,
    io::Write,
    panic::{PanicHookInfo, take_hook},
    path::{Path, PathBuf},
    thread,
};

/// Installs a global panic hook that logs panics via `tracing`.
///
/// In `panic = "abort"` builds the record is also appended to the current
/// daily log file `{log_dir}/{file_prefix}.YYYY-MM-DD`, since the background
/// log writer may not flush before the process aborts.
pub fn install(log_dir: impl AsRef<Path>, file_prefix: &str) {
    let log_dir = log_dir.as_ref().to_path_buf();
    let file_prefix = file_prefix.to_string();
    let previous_hook = take_hook();

    std::panic::set_hook(Box::new(move |panic_info: &PanicHookInfo<'_>| {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let panic_record = format_panic_record(panic_info);

            tracing::error!(target: "task_notify::panic", "{panic_record}");

            if cfg!(panic = "abort") {
                let _ = append_panic_record(&log_dir, &file_prefix, &panic_record);
            }
        }));

        previous_hook(panic_info);
    }));
}

fn append_panic_record(log_dir: &Path, file_prefix: &str, record: &str) -> std::io::Result<()> {
    let filename = format!("{file_prefix}.{}", Local::now().format("%Y-%m-%d"));
    let path = PathBuf::from(log_dir).join(filename);

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{record}")?;
    file.flush()
}

fn format_panic_record(panic_info: &PanicHookInfo<'_>) -> String {
    let payload = panic_payload_to_string(panic_info);
    let location = panic_info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
        .unwrap_or_else(|| "<unknown>".to_string());

    let thread_name = thread::current()
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| "<unnamed>".to_string());

    let backtrace = Backtrace::force_capture();
    let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");

    format!(
        "{ts} PANIC thread={thread_name} location={location} payload={payload}\nBacktrace:\n{backtrace}"
    )
}

fn panic_payload_to_string(panic_info: &PanicHookInfo<'_>) -> String {
    if let Some(s) = panic_info.payload().downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        return s.clone();
    }
    panic_info.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_panic_record() {
        let dir = tempfile::tempdir().unwrap();
        append_panic_record(dir.path(), "task-api.log", "PANIC one").unwrap();
        append_panic_record(dir.path(), "task-api.log", "PANIC two").unwrap();

        let filename = format!("task-api.log.{}", Local::now().format("%Y-%m-%d"));
        let contents = std::fs::read_to_string(dir.path().join(filename)).unwrap();
        assert_eq!(contents, "PANIC one\nPANIC two\n");
    }
}

use cfg_if::cfg_if;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

/// `RUST_LOG` when set; otherwise info, with the GPU stack kept to warnings.
fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wgpu_core=warn,wgpu_hal=warn,naga=warn"))
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init() {
    let registry = tracing_subscriber::registry().with(default_filter());

    cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            registry
                .with(tracing_wasm::WASMLayer::new(tracing_wasm::WASMLayerConfig::default()))
                .init();

            #[cfg(feature = "console_error_panic_hook")]
            console_error_panic_hook::set_once();
        } else {
            let (file_writer, guard) = tracing_appender::non_blocking(native::rolling_file());
            let _ = native::FILE_GUARD.set(guard);

            registry
                .with(native::fmt_layer(std::io::stderr))
                .with(native::fmt_layer(file_writer))
                .init();

            std::panic::set_hook(Box::new(native::log_panic));
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::ffi::OsStr;
    use std::path::Path;

    use once_cell::sync::OnceCell;
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_appender::rolling::RollingFileAppender;
    use tracing_subscriber::fmt::{self, MakeWriter};
    use tracing_subscriber::registry::LookupSpan;

    /// Keeps the non-blocking file writer flushing until exit.
    pub(super) static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

    const DEFAULT_LOG_FILE: &str = "logs/walkthrough.log";

    /// `WALKTHROUGH_LOG_FILE` or `logs/walkthrough.log`, rotated daily.
    pub(super) fn rolling_file() -> RollingFileAppender {
        let log_path = std::env::var("WALKTHROUGH_LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
        let (dir, file) = split_log_path(&log_path);
        tracing_appender::rolling::daily(dir, file)
    }

    /// Directory and file prefix for the appender. A bare file name logs
    /// into the working directory.
    fn split_log_path(log_path: &str) -> (&Path, &OsStr) {
        let path = Path::new(log_path);
        let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let file = path.file_name().unwrap_or(OsStr::new("walkthrough.log"));
        (dir, file)
    }

    pub(super) fn fmt_layer<S, W>(writer: W) -> impl tracing_subscriber::Layer<S>
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .compact()
    }

    pub(super) fn log_panic(info: &std::panic::PanicHookInfo<'_>) {
        let location = info
            .location()
            .map(|loc| format!("panic at {}:{}:{} ", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic>");
        let bt = std::backtrace::Backtrace::force_capture();
        tracing::error!("{location}{payload}\nBacktrace:\n{bt:?}");
    }

}

use std::process::ExitCode;

use configs::{AppConfig, ServerConfig};
use tokio::runtime::Runtime;
use tracing::{error, info};
use uuid::Uuid;

fn build_runtime(server: &ServerConfig) -> std::io::Result<Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(w) = server.worker_threads {
        builder.worker_threads(w);
    }
    builder.build()
}

fn main() -> ExitCode {
    // .env 需在日志初始化前加载，RUST_LOG / LOG_FORMAT 才能生效
    dotenvy::dotenv().ok();
    common::utils::logging::init_logging_from_env();

    let cfg = match AppConfig::load_or_default() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(event = "config_invalid", error = %e, "refusing to start with invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let instance = Uuid::new_v4();
    std::panic::set_hook(Box::new(move |panic| {
        error!(event = "panic", %instance, message = %panic, "unhandled panic");
    }));

    let rt = match build_runtime(&cfg.server) {
        Ok(rt) => rt,
        Err(e) => {
            error!(event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };
    info!(
        event = "start",
        %instance,
        version = env!("CARGO_PKG_VERSION"),
        host = %cfg.server.host,
        port = cfg.server.port,
        threads = cfg.server.worker_threads.unwrap_or_default(),
        "rates service starting"
    );

    rt.block_on(async move {
        tokio::select! {
            res = server::run(cfg) => match res {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(event = "run_failed", error = %e, "rates server stopped with an error");
                    ExitCode::FAILURE
                }
            },
            // 每次变更都已同步写入数据文件，直接退出即可
            _ = tokio::signal::ctrl_c() => {
                info!(event = "shutdown_signal", %instance, "received Ctrl+C, shutting down");
                ExitCode::SUCCESS
            }
        }
    })
}

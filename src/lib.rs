pub mod adapter;
pub mod api;
pub mod audio;
pub mod backgrounds;
pub mod config;
pub mod corpus;
pub mod error;
pub mod ffmpeg;
pub mod init;
pub mod ledger;
pub mod logging;
pub mod pipeline;
pub mod plan;
pub mod render;
pub mod validator;
pub mod verse;

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!("{}", message),
        "OK" => tracing::info!(status = "ok", "{}", message),
        _ => tracing::info!("{}", message),
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}

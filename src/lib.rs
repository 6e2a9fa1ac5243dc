pub mod bridge;
pub mod capability;
pub mod config;
pub mod platform;
pub mod service;

#[cfg(feature = "shell")]
pub mod commands;

#[cfg(feature = "shell")]
use std::sync::Arc;

#[cfg(feature = "shell")]
use tauri::{Manager, RunEvent, WebviewUrl, WebviewWindowBuilder, WindowEvent};

#[cfg(feature = "shell")]
use crate::bridge::{BridgeHandle, PermissionBridge};
#[cfg(feature = "shell")]
use crate::config::ShellConfig;
#[cfg(feature = "shell")]
use crate::platform::{Platform, PlatformPermissions};
#[cfg(feature = "shell")]
use crate::service::{BackgroundCapture, KeepAliveService};

#[cfg(feature = "shell")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tracing_subscriber::fmt::init();

    let config = ShellConfig::load();

    let service = Arc::new(KeepAliveService::new(&config, Platform::native()));
    let bridge: BridgeHandle = Arc::new(tokio::sync::Mutex::new(PermissionBridge::new(
        Arc::new(PlatformPermissions::new()),
        Arc::new(BackgroundCapture::new(service.clone())),
        config.grant_non_audio,
    )));
    crate::bridge::register(bridge.clone());

    let app = tauri::Builder::default()
        .manage(service.clone())
        .manage(bridge)
        .setup(move |app| {
            let url = WebviewUrl::App(config.content_root.clone().into());
            let builder = WebviewWindowBuilder::new(app, "main", url);
            #[cfg(desktop)]
            let builder = builder.title(&config.notification_title);
            builder.build()?;

            tracing::info!("Web shell started");
            Ok(())
        })
        .on_window_event(|window, event| {
            if let WindowEvent::Destroyed = event {
                // Pending requests die with the view
                let bridge = window.state::<BridgeHandle>().inner().clone();
                tauri::async_runtime::spawn(async move {
                    bridge.lock().await.abandon();
                });
            }
        })
        .invoke_handler(tauri::generate_handler![
            commands::request_capability,
            commands::capture_status,
            commands::stop_capture,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(move |_app, event| {
        if let RunEvent::Exit = event {
            service.stop();
        }
    });
}

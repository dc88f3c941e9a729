pub mod auth;
pub mod chat;
#[cfg(feature = "tauri-app")]
pub mod commands;
pub mod config;
pub mod context;
pub mod core_state;
pub mod device;
pub mod http;
pub mod models;
pub mod permissions;
pub mod pipeline;
pub mod report;
pub mod session_store;
pub mod share;
pub mod teahub;
pub mod translation;
pub mod weather;

#[cfg(test)]
mod test_support;

#[cfg(feature = "tauri-app")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Arc;
    use tracing_subscriber::EnvFilter;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    // The quality sampler spawns onto the runtime, so build state inside it.
    let state = match tauri::async_runtime::block_on(async {
        core_state::CoreState::from_env(Arc::new(device::AlwaysGranted))
    }) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize core state");
            return;
        }
    };

    let result = tauri::Builder::default()
        .setup({
            let state = state.clone();
            move |app| {
                use tauri::Emitter;

                state
                    .share_broker()
                    .attach(Arc::new(commands::share::TauriShareSink::new(app.handle().clone())));

                // Push location/weather updates so open screens can re-hydrate.
                let handle = app.handle().clone();
                let context = state.context().clone();
                let mut changes = context.subscribe();
                tauri::async_runtime::spawn(async move {
                    while changes.changed().await.is_ok() {
                        if let Err(e) = handle.emit("context-updated", context.snapshot()) {
                            tracing::warn!(error = %e, "Could not emit context update");
                        }
                    }
                });
                Ok(())
            }
        })
        .manage(state)
        .invoke_handler(tauri::generate_handler![
            commands::health_check,
            commands::app_info,
            commands::capture::start_capture,
            commands::capture::detach_capture,
            commands::capture::capture_status,
            commands::capture::submit_preview_frame,
            commands::capture::last_result,
            commands::capture::rehydrate_result,
            commands::permissions::record_permission,
            commands::permissions::permission_status,
            commands::permissions::report_location,
            commands::session::initial_route,
            commands::session::get_profile,
            commands::session::register_user,
            commands::session::verify_otp,
            commands::session::list_languages,
            commands::session::get_language,
            commands::session::set_language,
            commands::translation::translate_labels,
            commands::weather::weather_report,
            commands::chat::ask_assistant,
            commands::teahub::search_products,
            commands::teahub::get_cart,
            commands::teahub::add_to_cart,
            commands::teahub::remove_from_cart,
            commands::report::report_html,
            commands::report::export_report_pdf,
            commands::share::share_result,
            commands::share::resolve_share,
        ])
        .run(tauri::generate_context!());

    if let Err(e) = result {
        tracing::error!(error = %e, "Tauri application exited with an error");
    }
}

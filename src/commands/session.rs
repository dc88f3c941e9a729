//! Onboarding, registration and language commands.

use std::sync::Arc;

use tauri::State;

use crate::auth::AuthFailure;
use crate::core_state::CoreState;
use crate::models::{Language, LanguageOption, UserProfile};
use crate::session_store::InitialRoute;

/// Home when a user is stored, onboarding otherwise.
#[tauri::command]
pub fn initial_route(state: State<'_, Arc<CoreState>>) -> InitialRoute {
    state.store().initial_route()
}

#[tauri::command]
pub fn get_profile(state: State<'_, Arc<CoreState>>) -> Option<UserProfile> {
    state.store().user()
}

#[tauri::command]
pub async fn register_user(
    profile: UserProfile,
    state: State<'_, Arc<CoreState>>,
) -> Result<UserProfile, AuthFailure> {
    state
        .auth()
        .register(state.store(), profile)
        .await
        .map_err(AuthFailure::from)
}

#[tauri::command]
pub async fn verify_otp(
    phone_number: String,
    otp: String,
    state: State<'_, Arc<CoreState>>,
) -> Result<(), AuthFailure> {
    state
        .auth()
        .verify_otp(state.store(), &phone_number, &otp)
        .await
        .map_err(AuthFailure::from)
}

#[tauri::command]
pub fn list_languages() -> Vec<LanguageOption> {
    Language::options()
}

#[tauri::command]
pub fn get_language(state: State<'_, Arc<CoreState>>) -> Language {
    state.store().language()
}

#[tauri::command]
pub fn set_language(code: String, state: State<'_, Arc<CoreState>>) -> Result<Language, String> {
    let language = code.parse::<Language>().map_err(|e| e.to_string())?;
    state
        .store()
        .set_language(language)
        .map_err(|e| e.to_string())?;
    tracing::info!(%language, "Language changed");
    Ok(language)
}

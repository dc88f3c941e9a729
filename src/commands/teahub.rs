//! Tea Hub store commands.

use std::sync::Arc;

use tauri::State;

use crate::core_state::CoreState;
use crate::teahub::{self, CartView, Product};

#[tauri::command]
pub fn search_products(term: String) -> Vec<Product> {
    teahub::search(&term).into_iter().cloned().collect()
}

#[tauri::command]
pub fn get_cart(state: State<'_, Arc<CoreState>>) -> Result<CartView, String> {
    let cart = state.cart().map_err(|e| e.to_string())?;
    Ok(CartView::from(&*cart))
}

/// Add one product. A duplicate is refused with the message to show.
#[tauri::command]
pub fn add_to_cart(product_id: u32, state: State<'_, Arc<CoreState>>) -> Result<CartView, String> {
    let mut cart = state.cart().map_err(|e| e.to_string())?;
    cart.add(product_id).map_err(|e| e.to_string())?;
    Ok(CartView::from(&*cart))
}

#[tauri::command]
pub fn remove_from_cart(
    product_id: u32,
    state: State<'_, Arc<CoreState>>,
) -> Result<CartView, String> {
    let mut cart = state.cart().map_err(|e| e.to_string())?;
    cart.remove(product_id);
    Ok(CartView::from(&*cart))
}

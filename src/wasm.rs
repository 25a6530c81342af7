//! Browser bindings for the pure parts of the pipeline.
//!
//! Rendering belongs to the host page (there is no rasterizer inside the
//! wasm module), so only analysis, config resolution and table estimates are
//! exported here.

use js_sys::{Object, Reflect};
use wasm_bindgen::prelude::*;

use crate::analyzer;
use crate::backend::LopdfSource;
use crate::policy::Policy;
use crate::types::{AdaptiveConfig, CompressionLevel, ContentProfile};

fn set(target: &Object, key: &str, value: JsValue) -> Result<(), JsError> {
    Reflect::set(target, &JsValue::from_str(key), &value)
        .map(|_| ())
        .map_err(|_| JsError::new(&format!("Failed to set '{}'", key)))
}

fn config_to_js(config: &AdaptiveConfig) -> Result<JsValue, JsError> {
    let object = Object::new();
    set(&object, "scale", JsValue::from_f64(config.scale() as f64))?;
    set(&object, "quality", JsValue::from_f64(config.quality() as f64))?;
    set(
        &object,
        "projectedDPI",
        JsValue::from_f64(config.projected_dpi() as f64),
    )?;
    Ok(object.into())
}

fn parse_level(level: &str) -> Result<CompressionLevel, JsError> {
    level
        .parse::<CompressionLevel>()
        .map_err(|e| JsError::new(&e.to_string()))
}

#[wasm_bindgen]
pub fn resolve_level_config(level: &str, is_text_heavy: bool) -> Result<JsValue, JsError> {
    let level = parse_level(level)?;
    config_to_js(&Policy::default().resolve_level(level, is_text_heavy))
}

#[wasm_bindgen]
pub fn resolve_slider_config(value: f64, is_text_heavy: bool) -> Result<JsValue, JsError> {
    config_to_js(&Policy::default().resolve_slider(value, is_text_heavy))
}

#[wasm_bindgen]
pub fn estimate_target_size(
    original_size: f64,
    level: &str,
    is_text_heavy: bool,
) -> Result<f64, JsError> {
    let level = parse_level(level)?;
    let original = original_size.max(0.0) as u64;
    Ok(Policy::default().estimate_target_size(original, level, is_text_heavy) as f64)
}

#[wasm_bindgen]
pub fn is_config_safe(scale: f32, quality: f32, override_safety: bool) -> bool {
    Policy::default()
        .gate(&AdaptiveConfig::new(scale, quality), override_safety)
        .is_allowed()
}

#[wasm_bindgen]
pub fn analyze_content(input: &[u8]) -> Result<JsValue, JsError> {
    let profile = match LopdfSource::load(input.to_vec()) {
        Ok(source) => analyzer::analyze(&source),
        Err(e) => {
            web_sys::console::warn_1(&format!("Content analysis failed: {:#}", e).into());
            ContentProfile::default()
        }
    };

    let object = Object::new();
    set(&object, "isTextHeavy", JsValue::from_bool(profile.is_text_heavy))?;
    set(
        &object,
        "pageCount",
        JsValue::from_f64(profile.page_count as f64),
    )?;
    Ok(object.into())
}

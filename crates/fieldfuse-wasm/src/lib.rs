//! WASM bindings for the form field fusion engine.
//!
//! The browser-hosted field editor fetches OCR and semantic evidence itself
//! and runs the engine in-process through these bindings.

use std::fmt::Display;

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use fieldfuse_core::extraction::slugify;
use fieldfuse_core::layout::dominant_direction;
use fieldfuse_core::{FormExtractor, FuseConfig, FusionEngine, OcrDocument, OcrPage, SemanticDocument, SemanticPage};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn js_error(err: impl Display) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn from_js<T: DeserializeOwned>(value: JsValue, what: &str) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| js_error(format!("invalid {}: {}", what, e)))
}

/// Plain JS objects rather than `Map`s, so results can be posted to workers as-is.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(js_error)
}

/// Extract the fields of one page with the default configuration.
///
/// Throws when the two records disagree about the page.
#[wasm_bindgen]
pub fn extract_page(ocr: JsValue, semantic: JsValue) -> Result<JsValue, JsValue> {
    FieldExtractor::new().extract_page(ocr, semantic)
}

/// Extract every page of a document with the default configuration.
#[wasm_bindgen]
pub fn extract_document(ocr: JsValue, semantic: JsValue) -> Result<JsValue, JsValue> {
    FieldExtractor::new().extract_document(ocr, semantic)
}

/// Default engine configuration.
#[wasm_bindgen]
pub fn default_config() -> Result<JsValue, JsValue> {
    to_js(&FuseConfig::default())
}

/// Field extractor class for browser use.
#[wasm_bindgen]
pub struct FieldExtractor {
    engine: FusionEngine,
}

#[wasm_bindgen]
impl FieldExtractor {
    /// Create an extractor with the default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            engine: FusionEngine::new(Self::sequential(FuseConfig::default())),
        }
    }

    /// Create an extractor from a (partial) configuration object.
    #[wasm_bindgen]
    pub fn with_config(config: JsValue) -> Result<FieldExtractor, JsValue> {
        let config: FuseConfig = from_js(config, "configuration")?;
        config.validate().map_err(js_error)?;
        Ok(Self {
            engine: FusionEngine::new(Self::sequential(config)),
        })
    }

    /// Current configuration.
    #[wasm_bindgen]
    pub fn config(&self) -> Result<JsValue, JsValue> {
        to_js(self.engine.config())
    }

    /// Extract the fields of one page.
    #[wasm_bindgen]
    pub fn extract_page(&self, ocr: JsValue, semantic: JsValue) -> Result<JsValue, JsValue> {
        let ocr: OcrPage = from_js(ocr, "OCR page")?;
        let semantic: SemanticPage = from_js(semantic, "semantic page")?;

        let page = self.engine.extract_page(&ocr, &semantic).map_err(js_error)?;
        to_js(&page)
    }

    /// Extract every page of a document; failed pages are listed in `errors`.
    #[wasm_bindgen]
    pub fn extract_document(&self, ocr: JsValue, semantic: JsValue) -> Result<JsValue, JsValue> {
        let ocr: OcrDocument = from_js(ocr, "OCR document")?;
        let semantic: SemanticDocument = from_js(semantic, "semantic document")?;

        to_js(&self.engine.extract_document(&ocr, &semantic))
    }

    fn sequential(mut config: FuseConfig) -> FuseConfig {
        config.parallel.enabled = false;
        config
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Helpers the editor uses when the user adds or renames fields.
#[wasm_bindgen]
pub struct FormUtils;

#[wasm_bindgen]
impl FormUtils {
    /// Machine name for a label ("שם הסוכן" -> "shm_hsvkn").
    #[wasm_bindgen]
    pub fn field_name(label: &str) -> String {
        slugify(label)
    }

    /// Reading direction of a label: "rtl" or "ltr".
    #[wasm_bindgen]
    pub fn direction(text: &str) -> String {
        if dominant_direction(text).is_rtl() {
            "rtl".to_string()
        } else {
            "ltr".to_string()
        }
    }
}

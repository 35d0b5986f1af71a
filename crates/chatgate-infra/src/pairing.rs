//! QR implementation of `PairingRenderer`.
//!
//! The operator console gets a compact Unicode QR code; callers get an SVG
//! rendering wrapped in a `data:image/svg+xml;base64,` URL.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use qrcode::QrCode;
use qrcode::render::{svg, unicode};

use chatgate_core::session::PairingRenderer;
use chatgate_types::error::PairingError;
use chatgate_types::session::PairingArtifact;

const SVG_MIN_DIMENSION: u32 = 256;

#[derive(Debug, Clone)]
pub struct QrPairingRenderer {
    print_to_console: bool,
}

impl QrPairingRenderer {
    pub fn new(print_to_console: bool) -> Self {
        Self { print_to_console }
    }
}

/// Render `code` as an SVG document.
pub fn render_svg(code: &str) -> Result<String, PairingError> {
    let qr = QrCode::new(code.as_bytes()).map_err(|e| PairingError::Encode(e.to_string()))?;
    Ok(qr
        .render::<svg::Color<'_>>()
        .min_dimensions(SVG_MIN_DIMENSION, SVG_MIN_DIMENSION)
        .build())
}

/// Render `code` for a terminal, two modules per character cell.
pub fn render_terminal(code: &str) -> Result<String, PairingError> {
    let qr = QrCode::new(code.as_bytes()).map_err(|e| PairingError::Encode(e.to_string()))?;
    Ok(qr
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}

/// Wrap an SVG document in a base64 `data:` URL.
pub fn svg_data_url(svg: &str) -> String {
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

impl PairingRenderer for QrPairingRenderer {
    fn display(&self, session_id: &str, code: &str) {
        if !self.print_to_console {
            return;
        }
        match render_terminal(code) {
            Ok(image) => println!("Pairing code for session '{session_id}':\n{image}"),
            Err(e) => tracing::warn!(session_id = %session_id, error = %e, "Cannot print pairing code"),
        }
    }

    async fn encode(&self, code: &str) -> Result<PairingArtifact, PairingError> {
        let code = code.to_string();
        let svg = tokio::task::spawn_blocking(move || render_svg(&code))
            .await
            .map_err(|e| PairingError::Encode(format!("render task failed: {e}")))??;
        Ok(PairingArtifact {
            data_url: svg_data_url(&svg),
        })
    }
}

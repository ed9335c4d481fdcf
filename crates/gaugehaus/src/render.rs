//! SVG waterfall rendering of an attribution vector.
//!
//! Each prediction gets its own artifact file named
//! `shap_explanation_{uuid}.svg` under the configured directory, plus a
//! public URL assembled from the configured prefix. Rendering itself is pure
//! string assembly; only the final write touches the filesystem.

use std::path::PathBuf;

use bon::Builder;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::explain::AttributionVector;

// ============================================================================
// Configuration
// ============================================================================

/// Invalid renderer configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    WidthTooSmall(u32),
    BarHeightTooSmall(u32),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WidthTooSmall(value) => {
                write!(f, "width must be at least 320 pixels, got {}", value)
            }
            Self::BarHeightTooSmall(value) => {
                write!(f, "bar height must be at least 16 pixels, got {}", value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Artifact output settings.
#[derive(Debug, Clone, Builder)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
pub struct RendererConfig {
    /// Directory artifacts are written into. Created on renderer start.
    #[builder(into)]
    pub artifact_dir: PathBuf,

    /// URL prefix under which the artifact directory is served.
    #[builder(into, default = String::from("/static"))]
    pub public_prefix: String,

    /// Total image width in pixels.
    #[builder(default = 860)]
    pub width: u32,

    /// Height of one contribution bar in pixels.
    #[builder(default = 34)]
    pub bar_height: u32,
}

impl RendererConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width < 320 {
            return Err(ConfigError::WidthTooSmall(self.width));
        }
        if self.bar_height < 16 {
            return Err(ConfigError::BarHeightTooSmall(self.bar_height));
        }
        Ok(())
    }
}

impl<S: renderer_config_builder::IsComplete> RendererConfigBuilder<S> {
    /// Finalize the configuration, validating field values.
    pub fn build(self) -> Result<RendererConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Artifact write failures.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to write explanation artifact at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A written explanation artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactHandle {
    /// The UUID embedded in the file name.
    pub id: String,
    pub file_name: String,
    /// Filesystem location of the written SVG.
    pub path: PathBuf,
    /// Public URL under the configured prefix.
    pub url: String,
}

/// Writes waterfall SVGs for attribution vectors.
#[derive(Debug, Clone)]
pub struct ExplanationRenderer {
    config: RendererConfig,
}

impl ExplanationRenderer {
    /// Create the renderer, ensuring the artifact directory exists.
    pub fn new(config: RendererConfig) -> Result<Self, ArtifactError> {
        std::fs::create_dir_all(&config.artifact_dir).map_err(|source| ArtifactError::Io {
            path: config.artifact_dir.clone(),
            source,
        })?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Render the attribution to a fresh uniquely named SVG file.
    pub fn render(&self, attribution: &AttributionVector) -> Result<ArtifactHandle, ArtifactError> {
        let id = Uuid::new_v4();
        let file_name = format!("shap_explanation_{}.svg", id);
        let path = self.config.artifact_dir.join(&file_name);

        let svg = render_svg(attribution, &self.config);
        std::fs::write(&path, svg).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;

        let url = format!(
            "{}/{}",
            self.config.public_prefix.trim_end_matches('/'),
            file_name
        );
        debug!(artifact = %file_name, "wrote explanation artifact");

        Ok(ArtifactHandle {
            id: id.to_string(),
            file_name,
            path,
            url,
        })
    }
}

/// Build the waterfall SVG for an attribution vector.
///
/// Bars follow the attribution's own order: one row per feature, running
/// left-to-right from the baseline, green for positive contributions and red
/// for negative ones, with a dashed marker at the baseline.
pub fn render_svg(attribution: &AttributionVector, config: &RendererConfig) -> String {
    const LABEL_WIDTH: f64 = 250.0;
    const RIGHT_MARGIN: f64 = 90.0;
    const TOP_MARGIN: f64 = 46.0;
    const BOTTOM_MARGIN: f64 = 44.0;
    const BAR_GAP: f64 = 10.0;
    const POSITIVE_FILL: &str = "#2e8b57";
    const NEGATIVE_FILL: &str = "#c0392b";

    let width = config.width as f64;
    let bar_height = config.bar_height as f64;
    let n = attribution.len();
    let plot_height = if n == 0 {
        0.0
    } else {
        n as f64 * (bar_height + BAR_GAP) - BAR_GAP
    };
    let height = TOP_MARGIN + plot_height + BOTTOM_MARGIN;

    // Cumulative trail: baseline, then one point after each contribution.
    let baseline = attribution.baseline();
    let mut trail = Vec::with_capacity(n + 1);
    trail.push(baseline);
    let mut running = baseline;
    for item in attribution {
        running += item.contribution;
        trail.push(running);
    }
    let predicted = running;

    let min_v = trail.iter().copied().fold(f64::INFINITY, f64::min);
    let max_v = trail.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max_v - min_v;
    let pad = if span > 0.0 { span * 0.05 } else { 1.0 };
    let (lo, hi) = (min_v - pad, max_v + pad);
    let plot_width = width - LABEL_WIDTH - RIGHT_MARGIN;
    let x = |v: f64| LABEL_WIDTH + (v - lo) / (hi - lo) * plot_width;

    let mut out = String::with_capacity(2048 + n * 256);
    out.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{:.0}\" height=\"{:.0}\" \
         viewBox=\"0 0 {:.0} {:.0}\" font-family=\"monospace\" font-size=\"13\">\n",
        width, height, width, height
    ));
    out.push_str(&format!(
        "  <rect width=\"{:.0}\" height=\"{:.0}\" fill=\"white\"/>\n",
        width, height
    ));
    out.push_str(&format!(
        "  <text x=\"{:.0}\" y=\"24\" font-size=\"15\" font-weight=\"bold\">\
         Predicted price {:.2}</text>\n",
        LABEL_WIDTH, predicted
    ));

    let mut start = baseline;
    for (i, item) in attribution.iter().enumerate() {
        let end = start + item.contribution;
        let y = TOP_MARGIN + i as f64 * (bar_height + BAR_GAP);
        let x0 = x(start.min(end));
        let x1 = x(start.max(end));
        let bar_width = (x1 - x0).max(1.0);
        let fill = if item.contribution > 0.0 {
            POSITIVE_FILL
        } else {
            NEGATIVE_FILL
        };

        out.push_str(&format!(
            "  <text x=\"8\" y=\"{:.1}\" dominant-baseline=\"middle\">{} = {}</text>\n",
            y + bar_height / 2.0,
            xml_escape(item.name),
            xml_escape(&item.value)
        ));
        out.push_str(&format!(
            "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{}\"/>\n",
            x0, y, bar_width, bar_height, fill
        ));
        out.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{:.1}\" dominant-baseline=\"middle\">{:+.2}</text>\n",
            x1 + 6.0,
            y + bar_height / 2.0,
            item.contribution
        ));

        start = end;
    }

    // Baseline marker across the bar area.
    let x_base = x(baseline);
    out.push_str(&format!(
        "  <line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" \
         stroke=\"#555555\" stroke-dasharray=\"4 3\"/>\n",
        x_base,
        TOP_MARGIN - 8.0,
        x_base,
        TOP_MARGIN + plot_height + 8.0
    ));
    out.push_str(&format!(
        "  <text x=\"8\" y=\"{:.1}\" fill=\"#555555\">baseline {:.2}, predicted {:.2}</text>\n",
        height - 16.0,
        baseline,
        predicted
    ));
    out.push_str("</svg>\n");

    out
}

fn xml_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

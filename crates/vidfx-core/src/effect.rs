// crates/vidfx-core/src/effect.rs
//
// The effect selection surface. Exactly one effect is active at a time —
// there is no stacking — so a plain enum is the whole model.

use serde::{Deserialize, Serialize};

/// Pixel transform applied to every frame during effect playback and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    #[default]
    None,
    Grayscale,
    Negative,
    Sepia,
    Posterize,
    Vignette,
}

impl EffectKind {
    /// All selectable kinds, in menu order.
    pub const ALL: [EffectKind; 6] = [
        EffectKind::None,
        EffectKind::Grayscale,
        EffectKind::Negative,
        EffectKind::Sepia,
        EffectKind::Posterize,
        EffectKind::Vignette,
    ];

    pub fn is_none(self) -> bool {
        self == EffectKind::None
    }

    /// Stable lowercase identifier — used in output filenames and the CLI.
    pub fn id(self) -> &'static str {
        match self {
            EffectKind::None      => "none",
            EffectKind::Grayscale => "grayscale",
            EffectKind::Negative  => "negative",
            EffectKind::Sepia     => "sepia",
            EffectKind::Posterize => "posterize",
            EffectKind::Vignette  => "vignette",
        }
    }

    /// Human-readable label for status lines and menus.
    pub fn label(self) -> &'static str {
        match self {
            EffectKind::None      => "No effect",
            EffectKind::Grayscale => "Black & white",
            EffectKind::Negative  => "Negative",
            EffectKind::Sepia     => "Sepia",
            EffectKind::Posterize => "Posterize",
            EffectKind::Vignette  => "Vignette",
        }
    }
}

impl std::str::FromStr for EffectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none"            => Ok(EffectKind::None),
            // "bw" is the legacy identifier for black & white.
            "grayscale" | "bw" => Ok(EffectKind::Grayscale),
            "negative"        => Ok(EffectKind::Negative),
            "sepia"           => Ok(EffectKind::Sepia),
            "posterize"       => Ok(EffectKind::Posterize),
            "vignette"        => Ok(EffectKind::Vignette),
            other             => Err(format!("unknown effect '{other}'")),
        }
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

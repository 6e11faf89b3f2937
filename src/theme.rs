use std::collections::BTreeMap;
use std::path::Path;

use ratatui::style::Color;
use serde::Deserialize;

use crate::artifact_io::read_text_file_if_exists;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub explorer_bg: Color,
    pub main_bg: Color,
    pub modal_bg: Color,
    pub input_bg: Color,
    pub status_bg: Color,
    pub text_fg: Color,
    pub muted_fg: Color,
    pub active_fg: Color,
    pub danger_fg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            explorer_bg: Color::Rgb(44, 44, 44),
            main_bg: Color::Rgb(54, 54, 54),
            modal_bg: Color::Rgb(36, 36, 40),
            input_bg: Color::Rgb(62, 62, 62),
            status_bg: Color::Rgb(36, 36, 36),
            text_fg: Color::Rgb(225, 225, 225),
            muted_fg: Color::Rgb(185, 185, 185),
            active_fg: Color::Rgb(255, 255, 255),
            danger_fg: Color::Rgb(230, 90, 80),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ThemeFile {
    #[serde(default)]
    colors: BTreeMap<String, Rgb>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Rgb {
    r: u8,
    g: u8,
    b: u8,
}

impl Theme {
    /// Loads `path` over the defaults. A missing file is not an error; an
    /// unreadable or malformed one is logged and ignored.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let text = match read_text_file_if_exists(path) {
            Ok(Some(text)) => text,
            Ok(None) => return Self::default(),
            Err(err) => {
                tracing::warn!(path = %path.display(), "failed to read theme: {err}");
                return Self::default();
            }
        };
        Self::from_toml_str(&text).unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), "failed to parse theme: {err}");
            Self::default()
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        let file: ThemeFile = toml::from_str(s)?;
        let mut theme = Self::default();
        for (name, rgb) in file.colors {
            match theme.slot_mut(&name) {
                Some(slot) => *slot = Color::Rgb(rgb.r, rgb.g, rgb.b),
                None => tracing::warn!("unknown theme color '{name}'"),
            }
        }
        Ok(theme)
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut Color> {
        let slot = match name {
            "explorer_bg" => &mut self.explorer_bg,
            "main_bg" => &mut self.main_bg,
            "modal_bg" => &mut self.modal_bg,
            "input_bg" => &mut self.input_bg,
            "status_bg" => &mut self.status_bg,
            "text_fg" => &mut self.text_fg,
            "muted_fg" => &mut self.muted_fg,
            "active_fg" => &mut self.active_fg,
            "danger_fg" => &mut self.danger_fg,
            _ => return None,
        };
        Some(slot)
    }
}

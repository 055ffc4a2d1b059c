//! # Map surface
//!
//! Interfaces to the hosting map: the marker and polyline primitives the
//! tracking layer drives, and the icon factory that renders vehicle symbols.

use std::fmt;

/// Geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// CSS colour string, e.g. `#f97316`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Color(String);

impl Color {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the value is a hex, named or functional CSS colour that can
    /// be written into markup attributes unescaped.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let value = self.0.as_str();
        if let Some(hex) = value.strip_prefix('#') {
            return matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
        }
        if let Some((name, args)) = value.split_once('(') {
            return !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphabetic())
                && args.strip_suffix(')').is_some_and(|args| {
                    args.chars().all(|c| c.is_ascii_alphanumeric() || " ,.%/-".contains(c))
                });
        }
        !value.is_empty() && value.chars().all(|c| c.is_ascii_alphabetic())
    }
}

impl From<&str> for Color {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl From<String> for Color {
    fn from(value: String) -> Self {
        value.as_str().into()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Colours used by the tracking layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    /// Registered vehicles.
    pub accent: Color,
    /// GPS-only vehicles.
    pub neutral: Color,
    /// Selected vehicle history line.
    pub track: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self { accent: "#f97316".into(), neutral: "#9ca3af".into(), track: "#2563eb".into() }
    }
}

/// Rendered vehicle symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Icon {
    pub rotation: f64,
    pub color: Color,
    pub svg: String,
}

/// Opaque marker handle issued by a [`MapSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(pub u64);

/// Opaque layer group handle issued by a [`MapSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

/// Opaque polyline handle issued by a [`MapSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineId(pub u64);

/// The hosting map. Implementations own tile rendering and marker placement;
/// the tracking layer only issues the calls below.
pub trait MapSurface {
    fn create_layer_group(&mut self) -> LayerId;
    fn attach_layer(&mut self, layer: LayerId);
    fn detach_layer(&mut self, layer: LayerId);

    fn create_marker(&mut self, at: LatLng, icon: &Icon) -> MarkerId;
    fn add_marker(&mut self, layer: LayerId, marker: MarkerId);
    fn remove_marker(&mut self, layer: LayerId, marker: MarkerId);
    fn set_position(&mut self, marker: MarkerId, at: LatLng);
    fn set_icon(&mut self, marker: MarkerId, icon: &Icon);
    fn bind_tooltip(&mut self, marker: MarkerId, text: &str);
    fn bind_popup(&mut self, marker: MarkerId, content: &str);
    fn set_popup_content(&mut self, marker: MarkerId, content: &str);

    /// Route clicks on `marker` to a selection of `vehicle_id`.
    fn subscribe_click(&mut self, marker: MarkerId, vehicle_id: &str);

    fn draw_polyline(&mut self, points: &[LatLng], color: &Color) -> LineId;
    fn remove_polyline(&mut self, line: LineId);
}

/// Renders vehicle symbols.
pub trait IconFactory {
    fn vehicle_icon(&self, heading: f64, color: &Color) -> Icon;
    fn vehicle_color(&self, known: bool) -> Color;
}

/// Arrow icon pointing along the heading, coloured by registration.
#[derive(Debug, Clone, Default)]
pub struct DefaultIconFactory {
    palette: Palette,
}

impl DefaultIconFactory {
    #[must_use]
    pub const fn new(palette: Palette) -> Self {
        Self { palette }
    }
}

impl IconFactory for DefaultIconFactory {
    fn vehicle_icon(&self, heading: f64, color: &Color) -> Icon {
        let rotation = heading.rem_euclid(360.0);
        let svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24"><g transform="rotate({rotation} 12 12)"><path d="M12 2 L19 21 L12 17 L5 21 Z" fill="{color}" stroke="#1f2937" stroke-width="1"/></g></svg>"##
        );
        Icon { rotation, color: color.clone(), svg }
    }

    fn vehicle_color(&self, known: bool) -> Color {
        if known { self.palette.accent.clone() } else { self.palette.neutral.clone() }
    }
}

/// Explicitly owned surface reference. Mutations go through
/// [`MapHandle::get_mut`] and short-circuit once detached.
#[derive(Debug)]
pub enum MapHandle<S> {
    Attached(S),
    Detached,
}

impl<S> MapHandle<S> {
    pub const fn get_mut(&mut self) -> Option<&mut S> {
        match self {
            Self::Attached(surface) => Some(surface),
            Self::Detached => None,
        }
    }

    #[must_use]
    pub const fn get(&self) -> Option<&S> {
        match self {
            Self::Attached(surface) => Some(surface),
            Self::Detached => None,
        }
    }

    #[must_use]
    pub const fn is_attached(&self) -> bool {
        matches!(self, Self::Attached(_))
    }

    /// Releases the surface, leaving the handle detached.
    pub fn take(&mut self) -> Option<S> {
        match std::mem::replace(self, Self::Detached) {
            Self::Attached(surface) => Some(surface),
            Self::Detached => None,
        }
    }
}

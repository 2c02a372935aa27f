//! Render requests and the option bounds that form the public contract.
//!
//! Requests are validated once, at construction. Every numeric option is
//! checked against its declared range here so that nothing out of bounds can
//! reach layout or the render pool.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

pub const FONT_SIZE_RANGE: RangeInclusive<u32> = 8..=100;
pub const LINE_HEIGHT_RANGE: RangeInclusive<f32> = 1.0..=3.0;
pub const LETTER_SPACING_RANGE: RangeInclusive<f32> = 0.0..=0.5;
pub const PADDING_RANGE: RangeInclusive<u32> = 0..=100;
pub const MAX_CHARS_PER_LINE_RANGE: RangeInclusive<u32> = 1..=100;

pub const DEFAULT_FONT_SIZE: u32 = 20;
pub const DEFAULT_LINE_HEIGHT: f32 = 1.6;
pub const DEFAULT_LETTER_SPACING: f32 = 0.05;
pub const DEFAULT_PADDING: u32 = 20;

/// Logical font choice. Anything unrecognised resolves to [`FontSelector::Default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSelector {
    /// The antique face used when nothing (or nothing valid) was requested.
    #[default]
    Default,
    Gothic,
    Mincho,
}

impl FontSelector {
    pub const ALL: [FontSelector; 3] = [Self::Default, Self::Gothic, Self::Mincho];

    /// Parse a requested font name, case-insensitively.
    pub fn from_name(name: Option<&str>) -> Self {
        name.and_then(Self::parse).unwrap_or_default()
    }

    /// Strict variant of [`FontSelector::from_name`]; `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gothic" => Some(Self::Gothic),
            "mincho" => Some(Self::Mincho),
            "antique" | "default" => Some(Self::Default),
            _ => None,
        }
    }

    /// Name reported back to callers.
    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "antique",
            Self::Gothic => "gothic",
            Self::Mincho => "mincho",
        }
    }
}

/// Fully resolved options for one render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub font: FontSelector,
    pub font_size: u32,
    pub line_height: f32,
    /// Extra advance between clusters, in em.
    pub letter_spacing: f32,
    pub padding: u32,
    pub max_chars_per_line: Option<u32>,
    /// Balanced auto-wrapping when no explicit line limit is set.
    pub use_alternate_layout_mode: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            font: FontSelector::Default,
            font_size: DEFAULT_FONT_SIZE,
            line_height: DEFAULT_LINE_HEIGHT,
            letter_spacing: DEFAULT_LETTER_SPACING,
            padding: DEFAULT_PADDING,
            max_chars_per_line: None,
            use_alternate_layout_mode: false,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<(), DomainError> {
        check_range("font_size", self.font_size, &FONT_SIZE_RANGE)?;
        check_range("line_height", self.line_height, &LINE_HEIGHT_RANGE)?;
        check_range("letter_spacing", self.letter_spacing, &LETTER_SPACING_RANGE)?;
        check_range("padding", self.padding, &PADDING_RANGE)?;
        if let Some(limit) = self.max_chars_per_line {
            check_range("max_chars_per_line", limit, &MAX_CHARS_PER_LINE_RANGE)?;
        }
        Ok(())
    }
}

pub(crate) fn check_range<T>(
    field: &'static str,
    value: T,
    range: &RangeInclusive<T>,
) -> Result<(), DomainError>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(DomainError::invalid_option(
            field,
            format!(
                "{value} is outside {}..={}",
                range.start(),
                range.end()
            ),
        ))
    }
}

/// Partially specified options as they arrive on the wire.
///
/// Used both for single requests and for batch defaults/items, where item
/// values win over batch defaults field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptionsPatch {
    pub font: Option<String>,
    pub font_size: Option<u32>,
    pub line_height: Option<f32>,
    pub letter_spacing: Option<f32>,
    pub padding: Option<u32>,
    pub max_chars_per_line: Option<u32>,
    #[serde(rename = "use_tategaki_js", alias = "use_alternate_layout_mode")]
    pub use_alternate_layout_mode: Option<bool>,
}

impl RenderOptionsPatch {
    /// Overlay `self` on top of `defaults`.
    pub fn merged_over(&self, defaults: &RenderOptionsPatch) -> RenderOptionsPatch {
        RenderOptionsPatch {
            font: self.font.clone().or_else(|| defaults.font.clone()),
            font_size: self.font_size.or(defaults.font_size),
            line_height: self.line_height.or(defaults.line_height),
            letter_spacing: self.letter_spacing.or(defaults.letter_spacing),
            padding: self.padding.or(defaults.padding),
            max_chars_per_line: self.max_chars_per_line.or(defaults.max_chars_per_line),
            use_alternate_layout_mode: self
                .use_alternate_layout_mode
                .or(defaults.use_alternate_layout_mode),
        }
    }

    /// Fill unset fields with the built-in defaults. Does not validate.
    pub fn resolve(&self) -> RenderOptions {
        let base = RenderOptions::default();
        RenderOptions {
            font: FontSelector::from_name(self.font.as_deref()),
            font_size: self.font_size.unwrap_or(base.font_size),
            line_height: self.line_height.unwrap_or(base.line_height),
            letter_spacing: self.letter_spacing.unwrap_or(base.letter_spacing),
            padding: self.padding.unwrap_or(base.padding),
            max_chars_per_line: self.max_chars_per_line,
            use_alternate_layout_mode: self
                .use_alternate_layout_mode
                .unwrap_or(base.use_alternate_layout_mode),
        }
    }
}

/// JSON body of a single render request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequestBody {
    pub text: String,
    #[serde(flatten)]
    pub options: RenderOptionsPatch,
}

/// A validated, immutable render request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    text: String,
    requested_font: Option<String>,
    options: RenderOptions,
}

impl RenderRequest {
    pub fn new(text: impl Into<String>, options: RenderOptions) -> Result<Self, DomainError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DomainError::invalid_input("text must not be empty"));
        }
        options.validate()?;
        Ok(Self {
            text,
            requested_font: None,
            options,
        })
    }

    pub fn from_patch(
        text: impl Into<String>,
        patch: &RenderOptionsPatch,
    ) -> Result<Self, DomainError> {
        let mut request = Self::new(text, patch.resolve())?;
        request.requested_font = patch.font.clone();
        Ok(request)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// The font name exactly as the caller sent it, if any.
    pub fn requested_font(&self) -> Option<&str> {
        self.requested_font.as_deref()
    }

    /// True when a font was named but not recognised.
    pub fn font_fell_back(&self) -> bool {
        self.requested_font
            .as_deref()
            .is_some_and(|name| FontSelector::parse(name).is_none())
    }
}

impl TryFrom<RenderRequestBody> for RenderRequest {
    type Error = DomainError;

    fn try_from(body: RenderRequestBody) -> Result<Self, Self::Error> {
        Self::from_patch(body.text, &body.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_font_names_resolve_to_default() {
        assert_eq!(
            FontSelector::from_name(Some("unknown_font")),
            FontSelector::Default
        );
        assert_eq!(FontSelector::from_name(None), FontSelector::Default);
        assert_eq!(FontSelector::from_name(Some("Gothic")), FontSelector::Gothic);
        assert_eq!(FontSelector::from_name(Some(" mincho ")), FontSelector::Mincho);
        assert_eq!(FontSelector::Default.name(), "antique");
    }

    #[test]
    fn blank_text_is_invalid_input() {
        let err = RenderRequest::new("  \n ", RenderOptions::default()).expect_err("blank");
        assert!(matches!(err, DomainError::InvalidInput { .. }));

        let err = RenderRequest::new("", RenderOptions::default()).expect_err("empty");
        assert!(matches!(err, DomainError::InvalidInput { .. }));
    }

    #[test]
    fn out_of_range_options_are_rejected() {
        let cases: Vec<(RenderOptions, &str)> = vec![
            (
                RenderOptions {
                    font_size: 7,
                    ..Default::default()
                },
                "font_size",
            ),
            (
                RenderOptions {
                    font_size: 101,
                    ..Default::default()
                },
                "font_size",
            ),
            (
                RenderOptions {
                    line_height: 3.5,
                    ..Default::default()
                },
                "line_height",
            ),
            (
                RenderOptions {
                    letter_spacing: -0.1,
                    ..Default::default()
                },
                "letter_spacing",
            ),
            (
                RenderOptions {
                    letter_spacing: f32::NAN,
                    ..Default::default()
                },
                "letter_spacing",
            ),
            (
                RenderOptions {
                    padding: 101,
                    ..Default::default()
                },
                "padding",
            ),
            (
                RenderOptions {
                    max_chars_per_line: Some(0),
                    ..Default::default()
                },
                "max_chars_per_line",
            ),
        ];

        for (options, expected_field) in cases {
            match RenderRequest::new("縦書き", options) {
                Err(DomainError::InvalidOption { field, .. }) => {
                    assert_eq!(field, expected_field);
                }
                other => panic!("expected InvalidOption for {expected_field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn item_values_win_over_batch_defaults() {
        let defaults = RenderOptionsPatch {
            font: Some("mincho".to_string()),
            font_size: Some(30),
            padding: Some(5),
            ..Default::default()
        };
        let item = RenderOptionsPatch {
            font_size: Some(12),
            ..Default::default()
        };

        let merged = item.merged_over(&defaults).resolve();
        assert_eq!(merged.font, FontSelector::Mincho);
        assert_eq!(merged.font_size, 12);
        assert_eq!(merged.padding, 5);
        assert_eq!(merged.line_height, DEFAULT_LINE_HEIGHT);
    }

    #[test]
    fn request_body_uses_wire_names() {
        let body: RenderRequestBody = serde_json::from_value(serde_json::json!({
            "text": "縦書き",
            "font": "unknown_font",
            "font_size": 32,
            "use_tategaki_js": true
        }))
        .expect("body parses");

        let request = RenderRequest::try_from(body).expect("valid request");
        assert_eq!(request.options().font_size, 32);
        assert!(request.options().use_alternate_layout_mode);
        assert_eq!(request.options().font, FontSelector::Default);
        assert!(request.font_fell_back());
        assert_eq!(request.requested_font(), Some("unknown_font"));
    }
}

//! Screenshot request options
//!
//! [`TakeOptions`] is built with chained setters and serialized three ways:
//! the grouped JSON body for `POST /v1/screenshot`, the flat string map that
//! gets signed into URLs, and a query string for plain GET usage.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Output image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format - lossless compression
    Png,
    /// JPEG format - lossy compression, smaller files
    Jpeg,
    /// WebP format - modern compression
    Webp,
    /// PDF document
    Pdf,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::Pdf => "pdf",
        }
    }

    /// File extension for saved output.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            other => other.as_str(),
        }
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            "pdf" => Ok(Self::Pdf),
            other => Err(format!("unsupported format: {other}")),
        }
    }
}

/// Page readiness condition to wait for before capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitCondition {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

impl WaitCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "domcontentloaded",
            Self::NetworkIdle => "networkidle",
        }
    }
}

/// CSS media type to emulate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Screen,
    Print,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Print => "print",
        }
    }
}

/// Options for a single screenshot.
///
/// Unset fields are omitted from every serialization. Boolean flags are
/// tri-state: `None` is never sent, `Some(false)` is sent in the JSON body
/// but not in flat maps.
///
/// ```rust
/// use renderscreenshot::{ImageFormat, TakeOptions};
///
/// let options = TakeOptions::url("https://example.com")
///     .width(1200)
///     .height(630)
///     .format(ImageFormat::Png)
///     .block_ads(true);
/// assert_eq!(options.to_params()["viewport"]["width"], 1200);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TakeOptions {
    pub url: Option<String>,
    pub html: Option<String>,
    pub preset: Option<String>,

    pub width: Option<u32>,
    pub height: Option<u32>,
    pub scale: Option<f64>,
    pub mobile: Option<bool>,
    pub device: Option<String>,

    pub full_page: Option<bool>,
    pub element: Option<String>,

    pub format: Option<ImageFormat>,
    pub quality: Option<u8>,

    pub wait_for: Option<WaitCondition>,
    /// Milliseconds.
    pub delay: Option<u32>,
    pub wait_for_selector: Option<String>,
    /// Milliseconds.
    pub wait_for_timeout: Option<u32>,

    pub block_ads: Option<bool>,
    pub block_trackers: Option<bool>,
    pub block_cookie_banners: Option<bool>,
    pub block_chat_widgets: Option<bool>,

    pub dark_mode: Option<bool>,
    pub reduced_motion: Option<bool>,
    pub media_type: Option<MediaType>,
    pub user_agent: Option<String>,
    pub timezone: Option<String>,
    pub locale: Option<String>,

    /// Seconds.
    pub cache_ttl: Option<u32>,
    pub cache_refresh: Option<bool>,
}

macro_rules! setter {
    ($name:ident, into $ty:ty) => {
        pub fn $name(mut self, value: impl Into<$ty>) -> Self {
            self.$name = Some(value.into());
            self
        }
    };
    ($name:ident, $ty:ty) => {
        pub fn $name(mut self, value: $ty) -> Self {
            self.$name = Some(value);
            self
        }
    };
}

impl TakeOptions {
    /// Options capturing the page at `url`.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Options rendering raw `html`.
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            ..Default::default()
        }
    }

    setter!(preset, into String);
    setter!(width, u32);
    setter!(height, u32);
    setter!(scale, f64);
    setter!(mobile, bool);
    setter!(device, into String);
    setter!(full_page, bool);
    setter!(element, into String);
    setter!(format, ImageFormat);
    setter!(quality, u8);
    setter!(wait_for, WaitCondition);
    setter!(delay, u32);
    setter!(wait_for_selector, into String);
    setter!(wait_for_timeout, u32);
    setter!(block_ads, bool);
    setter!(block_trackers, bool);
    setter!(block_cookie_banners, bool);
    setter!(block_chat_widgets, bool);
    setter!(dark_mode, bool);
    setter!(reduced_motion, bool);
    setter!(media_type, MediaType);
    setter!(user_agent, into String);
    setter!(timezone, into String);
    setter!(locale, into String);
    setter!(cache_ttl, u32);
    setter!(cache_refresh, bool);

    /// Grouped JSON body for `POST /v1/screenshot`.
    pub fn to_params(&self) -> Map<String, Value> {
        let mut result = Map::new();

        put(&mut result, "url", self.url.as_deref());
        put(&mut result, "html", self.html.as_deref());
        put(&mut result, "preset", self.preset.as_deref());

        let mut viewport = Map::new();
        put(&mut viewport, "width", self.width);
        put(&mut viewport, "height", self.height);
        put(&mut viewport, "scale", self.scale);
        put(&mut viewport, "mobile", self.mobile);
        put(&mut viewport, "device", self.device.as_deref());
        group(&mut result, "viewport", viewport);

        let mut capture = Map::new();
        if self.full_page == Some(true) {
            capture.insert("mode".into(), json!("full_page"));
        }
        put(&mut capture, "selector", self.element.as_deref());
        group(&mut result, "capture", capture);

        let mut output = Map::new();
        put(&mut output, "format", self.format.map(|f| f.as_str()));
        put(&mut output, "quality", self.quality);
        group(&mut result, "output", output);

        let mut wait = Map::new();
        put(&mut wait, "until", self.wait_for.map(|w| w.as_str()));
        put(&mut wait, "delay", self.delay);
        put(&mut wait, "for_selector", self.wait_for_selector.as_deref());
        put(&mut wait, "timeout", self.wait_for_timeout);
        group(&mut result, "wait", wait);

        let mut block = Map::new();
        put(&mut block, "ads", self.block_ads);
        put(&mut block, "trackers", self.block_trackers);
        put(&mut block, "cookie_banners", self.block_cookie_banners);
        put(&mut block, "chat_widgets", self.block_chat_widgets);
        group(&mut result, "block", block);

        let mut browser = Map::new();
        put(&mut browser, "dark_mode", self.dark_mode);
        put(&mut browser, "reduced_motion", self.reduced_motion);
        put(&mut browser, "media", self.media_type.map(|m| m.as_str()));
        put(&mut browser, "user_agent", self.user_agent.as_deref());
        put(&mut browser, "timezone", self.timezone.as_deref());
        put(&mut browser, "locale", self.locale.as_deref());
        group(&mut result, "browser", browser);

        let mut cache = Map::new();
        put(&mut cache, "ttl", self.cache_ttl);
        put(&mut cache, "refresh", self.cache_refresh);
        group(&mut result, "cache", cache);

        result
    }

    /// Flat string map used for URL signing.
    pub fn to_flat_map(&self) -> BTreeMap<String, String> {
        let mut result = BTreeMap::new();
        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                result.insert(key.to_string(), value);
            }
        };
        let flag = |value: Option<bool>| (value == Some(true)).then(|| "true".to_string());

        set("url", self.url.clone());
        set("html", self.html.clone());
        set("preset", self.preset.clone());
        set("width", self.width.map(|v| v.to_string()));
        set("height", self.height.map(|v| v.to_string()));
        set("device", self.device.clone());
        set("scale", self.scale.map(format_float));
        set("full_page", flag(self.full_page));
        set("selector", self.element.clone());
        set("format", self.format.map(|f| f.as_str().to_string()));
        set("quality", self.quality.map(|v| v.to_string()));
        set("mobile", flag(self.mobile));
        set("wait_for", self.wait_for.map(|w| w.as_str().to_string()));
        set("delay", self.delay.map(|v| v.to_string()));
        set("block_ads", flag(self.block_ads));
        set("block_trackers", flag(self.block_trackers));
        set("dark_mode", flag(self.dark_mode));
        set("cache_ttl", self.cache_ttl.map(|v| v.to_string()));

        result
    }

    /// Form-encoded query for GET requests, keys sorted.
    pub fn to_query_string(&self) -> String {
        let mut params = self.to_flat_map();
        params.remove("mobile");
        params.remove("wait_for");
        params.remove("block_trackers");
        if let Some(timeout) = self.wait_for_timeout {
            params.insert("timeout".to_string(), timeout.to_string());
        }
        if self.block_cookie_banners == Some(true) {
            params.insert("block_cookies".to_string(), "true".to_string());
        }

        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish()
    }
}

fn put<T: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value.into());
    }
}

fn group(result: &mut Map<String, Value>, key: &str, group: Map<String, Value>) {
    if !group.is_empty() {
        result.insert(key.to_string(), Value::Object(group));
    }
}

/// Shortest decimal form that always carries a fractional part.
fn format_float(value: f64) -> String {
    let mut formatted = value.to_string();
    if !formatted.contains('.') && value.is_finite() {
        formatted.push_str(".0");
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_groups_are_omitted() {
        let params = TakeOptions::url("https://example.com").to_params();
        assert_eq!(params.len(), 1);
        assert_eq!(params["url"], "https://example.com");
    }

    #[test]
    fn test_grouped_params() {
        let params = TakeOptions::url("https://example.com")
            .width(1200)
            .height(630)
            .scale(2.0)
            .mobile(false)
            .full_page(true)
            .element("#main")
            .format(ImageFormat::Webp)
            .quality(80)
            .wait_for(WaitCondition::NetworkIdle)
            .delay(500)
            .block_ads(true)
            .block_cookie_banners(false)
            .dark_mode(true)
            .media_type(MediaType::Print)
            .cache_ttl(3600)
            .cache_refresh(true)
            .to_params();

        assert_eq!(
            Value::Object(params),
            json!({
                "url": "https://example.com",
                "viewport": {"width": 1200, "height": 630, "scale": 2.0, "mobile": false},
                "capture": {"mode": "full_page", "selector": "#main"},
                "output": {"format": "webp", "quality": 80},
                "wait": {"until": "networkidle", "delay": 500},
                "block": {"ads": true, "cookie_banners": false},
                "browser": {"dark_mode": true, "media": "print"},
                "cache": {"ttl": 3600, "refresh": true},
            })
        );
    }

    #[test]
    fn test_full_page_false_has_no_capture_mode() {
        let params = TakeOptions::url("https://example.com")
            .full_page(false)
            .to_params();
        assert!(!params.contains_key("capture"));
    }

    #[test]
    fn test_flat_map() {
        let flat = TakeOptions::url("https://example.com")
            .preset("og_card")
            .scale(2.0)
            .full_page(true)
            .mobile(false)
            .block_ads(true)
            .dark_mode(false)
            .quality(90)
            .to_flat_map();

        assert_eq!(flat["url"], "https://example.com");
        assert_eq!(flat["preset"], "og_card");
        assert_eq!(flat["scale"], "2.0");
        assert_eq!(flat["full_page"], "true");
        assert_eq!(flat["block_ads"], "true");
        assert_eq!(flat["quality"], "90");
        assert!(!flat.contains_key("mobile"));
        assert!(!flat.contains_key("dark_mode"));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(0.75), "0.75");
    }

    #[test]
    fn test_query_string() {
        let query = TakeOptions::url("https://example.com/?a=1")
            .width(800)
            .wait_for_timeout(5000)
            .block_cookie_banners(true)
            .to_query_string();

        assert_eq!(
            query,
            "block_cookies=true&timeout=5000&url=https%3A%2F%2Fexample.com%2F%3Fa%3D1&width=800"
        );
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
        assert!("gif".parse::<ImageFormat>().is_err());
    }
}

//! Coarse device and browser classification for page-view tracking.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
    Bot,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Desktop => "desktop",
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Bot => "bot",
        }
    }
}

const BOT_MARKERS: &[&str] = &[
    "bot", "crawler", "spider", "slurp", "facebookexternalhit", "embedly", "preview",
];

pub fn classify_device(user_agent: &str) -> DeviceClass {
    let ua = user_agent.to_ascii_lowercase();
    if BOT_MARKERS.iter().any(|marker| ua.contains(marker)) {
        return DeviceClass::Bot;
    }
    if ua.contains("ipad") || ua.contains("tablet") || (ua.contains("android") && !ua.contains("mobile")) {
        return DeviceClass::Tablet;
    }
    if ua.contains("mobi") || ua.contains("iphone") || ua.contains("ipod") {
        return DeviceClass::Mobile;
    }
    DeviceClass::Desktop
}

/// Browser family name. Order matters: Edge and Opera also advertise Chrome,
/// Chrome also advertises Safari.
pub fn classify_browser(user_agent: &str) -> &'static str {
    let ua = user_agent.to_ascii_lowercase();
    if ua.is_empty() {
        "Unknown"
    } else if ua.contains("edg/") || ua.contains("edge/") {
        "Edge"
    } else if ua.contains("opr/") || ua.contains("opera") {
        "Opera"
    } else if ua.contains("samsungbrowser") {
        "Samsung Internet"
    } else if ua.contains("firefox/") || ua.contains("fxios") {
        "Firefox"
    } else if ua.contains("chrome/") || ua.contains("crios") {
        "Chrome"
    } else if ua.contains("safari/") {
        "Safari"
    } else {
        "Other"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const EDGE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X200) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    #[test]
    fn classify_device_detects_families() {
        assert_eq!(classify_device(CHROME_DESKTOP), DeviceClass::Desktop);
        assert_eq!(classify_device(SAFARI_IPHONE), DeviceClass::Mobile);
        assert_eq!(classify_device(ANDROID_TABLET), DeviceClass::Tablet);
        assert_eq!(classify_device("Googlebot/2.1"), DeviceClass::Bot);
    }

    #[test]
    fn classify_browser_prefers_specific_tokens() {
        assert_eq!(classify_browser(CHROME_DESKTOP), "Chrome");
        assert_eq!(classify_browser(EDGE), "Edge");
        assert_eq!(classify_browser(SAFARI_IPHONE), "Safari");
        assert_eq!(classify_browser(""), "Unknown");
    }
}

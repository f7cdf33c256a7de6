// SPDX-License-Identifier: MPL-2.0

//! Classification of decoded payloads
//!
//! A decoded QR string is opaque to the pipeline. Hosts that want to show
//! something better than raw text can classify it here.

use serde::Serialize;

/// WiFi security type parsed from QR code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WifiSecurity {
    /// No security (open network)
    None,
    /// WEP security (legacy, insecure)
    Wep,
    /// WPA/WPA2 Personal
    Wpa,
    /// WPA2 Enterprise
    Wpa2Enterprise,
    /// WPA3
    Wpa3,
}

impl WifiSecurity {
    /// Parse the `T:` field of a WiFi payload
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "WEP" => Self::Wep,
            "WPA" | "WPA2" => Self::Wpa,
            "WPA2-EAP" | "WPA3-EAP" => Self::Wpa2Enterprise,
            "WPA3" | "SAE" => Self::Wpa3,
            "NOPASS" | "" => Self::None,
            _ => Self::Wpa,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::None => "Open",
            Self::Wep => "WEP",
            Self::Wpa => "WPA/WPA2",
            Self::Wpa2Enterprise => "Enterprise",
            Self::Wpa3 => "WPA3",
        }
    }
}

/// What a decoded payload looks like
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PayloadKind {
    /// Web link (scheme added for bare domains)
    Url { url: String },

    /// WiFi network credentials
    Wifi {
        ssid: String,
        password: Option<String>,
        security: WifiSecurity,
        hidden: bool,
    },

    /// `tel:` number
    Phone { number: String },

    /// `mailto:` address
    Email {
        address: String,
        subject: Option<String>,
        body: Option<String>,
    },

    /// `sms:` or `smsto:` message
    Sms {
        number: String,
        message: Option<String>,
    },

    /// `geo:` coordinates
    Location {
        latitude: f64,
        longitude: f64,
        label: Option<String>,
    },

    /// vCard block
    Contact { card: String },

    /// iCalendar block
    Event { event: String },

    Text { text: String },
}

impl PayloadKind {
    /// Classify a payload, falling back to [`PayloadKind::Text`]
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();

        if trimmed.starts_with("WIFI:") {
            return parse_wifi(trimmed);
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Self::Url {
                url: trimmed.to_string(),
            };
        }

        if let Some(number) = strip_scheme(trimmed, "tel:") {
            return Self::Phone {
                number: number.to_string(),
            };
        }

        if let Some(rest) = strip_scheme(trimmed, "mailto:") {
            return parse_mailto(rest);
        }

        if let Some(rest) =
            strip_scheme(trimmed, "smsto:").or_else(|| strip_scheme(trimmed, "sms:"))
        {
            return parse_sms(rest);
        }

        if let Some(location) = strip_scheme(trimmed, "geo:").and_then(parse_geo) {
            return location;
        }

        if trimmed.starts_with("BEGIN:VCARD") {
            return Self::Contact {
                card: trimmed.to_string(),
            };
        }

        if trimmed.starts_with("BEGIN:VCALENDAR") || trimmed.starts_with("BEGIN:VEVENT") {
            return Self::Event {
                event: trimmed.to_string(),
            };
        }

        if looks_like_domain(trimmed) {
            return Self::Url {
                url: format!("https://{}", trimmed),
            };
        }

        Self::Text {
            text: trimmed.to_string(),
        }
    }

    /// Short label used in CLI output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Url { .. } => "url",
            Self::Wifi { .. } => "wifi",
            Self::Phone { .. } => "phone",
            Self::Email { .. } => "email",
            Self::Sms { .. } => "sms",
            Self::Location { .. } => "location",
            Self::Contact { .. } => "contact",
            Self::Event { .. } => "event",
            Self::Text { .. } => "text",
        }
    }

    /// Link a desktop handler can open, if any
    pub fn openable_link(&self) -> Option<String> {
        match self {
            Self::Url { url } => Some(url.clone()),
            Self::Phone { number } => Some(format!("tel:{}", number)),
            Self::Email { address, .. } => Some(format!("mailto:{}", address)),
            Self::Location {
                latitude,
                longitude,
                ..
            } => Some(format!("geo:{},{}", latitude, longitude)),
            _ => None,
        }
    }
}

/// Case-insensitive scheme prefix removal
fn strip_scheme<'a>(content: &'a str, scheme: &str) -> Option<&'a str> {
    let head = content.get(..scheme.len())?;
    head.eq_ignore_ascii_case(scheme)
        .then(|| &content[scheme.len()..])
}

fn looks_like_domain(content: &str) -> bool {
    if !content.contains('.') || content.contains(' ') || content.len() >= 256 {
        return false;
    }
    content.starts_with("www.")
        || [".com", ".org", ".net", ".io"]
            .iter()
            .any(|tld| content.ends_with(tld))
}

/// `WIFI:T:WPA;S:network;P:password;H:true;;`
fn parse_wifi(content: &str) -> PayloadKind {
    let mut ssid = String::new();
    let mut password = None;
    let mut security = WifiSecurity::None;
    let mut hidden = false;

    let body = content.strip_prefix("WIFI:").unwrap_or(content);
    for field in split_unescaped(body, ';') {
        let Some((key, value)) = field.split_once(':') else {
            continue;
        };
        let value = unescape_wifi(value);
        match key {
            "S" => ssid = value,
            "P" if !value.is_empty() => password = Some(value),
            "T" => security = WifiSecurity::parse(&value),
            "H" => hidden = value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    PayloadKind::Wifi {
        ssid,
        password,
        security,
        hidden,
    }
}

/// Split on `sep` unless it is backslash-escaped
fn split_unescaped(content: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in content.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&content[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&content[start..]);
    parts.retain(|p| !p.is_empty());
    parts
}

fn unescape_wifi(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn parse_mailto(content: &str) -> PayloadKind {
    let (address, params) = content.split_once('?').unwrap_or((content, ""));

    let mut subject = None;
    let mut body = None;
    for (key, value) in query_pairs(params) {
        match key.to_lowercase().as_str() {
            "subject" => subject = Some(value),
            "body" => body = Some(value),
            _ => {}
        }
    }

    PayloadKind::Email {
        address: address.to_string(),
        subject,
        body,
    }
}

/// `sms:<number>?body=<msg>` or `smsto:<number>:<msg>`
fn parse_sms(content: &str) -> PayloadKind {
    let Some((number, params)) = content.split_once('?') else {
        let (number, message) = content.split_once(':').unwrap_or((content, ""));
        return PayloadKind::Sms {
            number: number.to_string(),
            message: Some(message.to_string()).filter(|m| !m.is_empty()),
        };
    };

    let message = query_pairs(params)
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("body"))
        .map(|(_, value)| value);

    PayloadKind::Sms {
        number: number.to_string(),
        message,
    }
}

fn parse_geo(content: &str) -> Option<PayloadKind> {
    let (coords, params) = content.split_once('?').unwrap_or((content, ""));

    let mut parts = coords.split(',');
    let latitude = parts.next()?.trim().parse::<f64>().ok()?;
    let longitude = parts.next()?.trim().parse::<f64>().ok()?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }

    let label = query_pairs(params)
        .into_iter()
        .find(|(key, _)| key == "q" || key == "label")
        .map(|(_, value)| value);

    Some(PayloadKind::Location {
        latitude,
        longitude,
        label,
    })
}

fn query_pairs(params: &str) -> Vec<(String, String)> {
    params
        .split('&')
        .filter_map(|param| param.split_once('='))
        .map(|(key, value)| (key.to_string(), percent_decode(value)))
        .collect()
}

/// Decode `%XX` escapes and `+` in query values
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let decoded = s
                    .get(i + 1..i + 3)
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match decoded {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                        continue;
                    }
                    None => out.push(b'%'),
                }
            }
            b'+' => out.push(b' '),
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

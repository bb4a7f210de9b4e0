//! Keyboard layout token from the window manager's input list.

use log::debug;
use serde_json::Value;
use sway_protocol::{parse_inputs, IpcError, SwayClient};

const LAYOUT_KEY: &str = "xkb_active_layout_name";

/// Shown when the layout cannot be determined
pub const UNKNOWN_LAYOUT: &str = "??";

/// First non-null, non-empty active layout name in an input list payload.
///
/// Accepts a JSON array of devices, a single device object or a stream of
/// concatenated objects. A payload that stops parsing part way (for example
/// a capped read) is scanned textually instead.
pub fn extract_layout(payload: &str) -> Option<String> {
    // Well-formed device list, the usual reply
    if let Ok(devices) = parse_inputs(payload) {
        return devices
            .into_iter()
            .filter_map(|device| device.xkb_active_layout_name)
            .find(|name| !name.is_empty());
    }

    for item in serde_json::Deserializer::from_str(payload).into_iter::<Value>() {
        match item {
            Ok(value) => {
                if let Some(layout) = layout_in_value(&value) {
                    return Some(layout);
                }
            }
            Err(e) => {
                debug!("Input list is not valid JSON ({}), scanning text", e);
                return scan_layout(payload);
            }
        }
    }
    None
}

fn layout_in_value(value: &Value) -> Option<String> {
    match value {
        Value::Array(devices) => devices.iter().find_map(layout_in_value),
        Value::Object(device) => match device.get(LAYOUT_KEY) {
            Some(Value::String(name)) if !name.is_empty() => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Lenient scan for `"xkb_active_layout_name": "<name>"`, skipping `null`
/// and empty values and anything cut off before its closing quote
fn scan_layout(text: &str) -> Option<String> {
    let key = format!("\"{}\"", LAYOUT_KEY);
    let mut rest = text;

    while let Some(pos) = rest.find(&key) {
        rest = &rest[pos + key.len()..];

        let after_colon = match rest.trim_start().strip_prefix(':') {
            Some(value) => value.trim_start(),
            None => continue,
        };
        let Some(quoted) = after_colon.strip_prefix('"') else {
            // null or some other non-string value
            continue;
        };
        let Some(end) = quoted.find('"') else {
            return None;
        };
        let name = &quoted[..end];
        rest = &quoted[end + 1..];
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }
    None
}

/// Two-letter token for a layout name
pub fn abbreviate_layout(name: &str) -> String {
    if name.contains("UK") || name.contains("United Kingdom") || name.contains("British") {
        return "UK".to_string();
    }
    if name.contains("Romanian") {
        return "RO".to_string();
    }

    let mut chars = name.chars().map(|c| c.to_ascii_uppercase());
    let first = chars.next().unwrap_or('?');
    let second = chars.next().unwrap_or('?');
    format!("{}{}", first, second)
}

/// Token for the bar given the outcome of an input list query
pub fn keyboard_token(reply: Result<String, IpcError>) -> String {
    match reply {
        Ok(payload) => match extract_layout(&payload) {
            Some(layout) => abbreviate_layout(&layout),
            None => {
                debug!("No active keyboard layout in input list");
                UNKNOWN_LAYOUT.to_string()
            }
        },
        Err(e) => {
            debug!("Keyboard layout query failed: {}", e);
            UNKNOWN_LAYOUT.to_string()
        }
    }
}

/// Settings for querying the window manager on every sample
#[derive(Debug, Clone)]
pub struct KeyboardSampler {
    socket_env: String,
    io_timeout: std::time::Duration,
}

impl KeyboardSampler {
    pub fn new(socket_env: impl Into<String>, io_timeout: std::time::Duration) -> Self {
        Self {
            socket_env: socket_env.into(),
            io_timeout,
        }
    }

    /// Resolves the socket afresh each time, so a restarted compositor is
    /// picked up
    pub fn sample(&self) -> String {
        let reply = SwayClient::from_env_var(&self.socket_env)
            .and_then(|client| client.with_timeout(Some(self.io_timeout)).query_inputs());
        keyboard_token(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUTS: &str = r#"[
        {"identifier": "1:1:AT_Translated_Set_2_keyboard", "name": "AT Translated Set 2 keyboard",
         "type": "keyboard", "xkb_active_layout_name": null},
        {"identifier": "1133:49948:Logitech_USB_Keyboard", "name": "Logitech USB Keyboard",
         "type": "keyboard", "xkb_active_layout_name": "Romanian"},
        {"identifier": "1267:12693:ELAN_Touchpad", "name": "ELAN Touchpad", "type": "touchpad"}
    ]"#;

    #[test]
    fn test_extract_skips_null_layout() {
        assert_eq!(extract_layout(INPUTS).as_deref(), Some("Romanian"));
        assert_eq!(keyboard_token(Ok(INPUTS.to_string())), "RO");
    }

    #[test]
    fn test_extract_from_full_device_records() {
        let json = r#"[
            {"identifier": "1:1:kbd", "name": "kbd", "type": "keyboard",
             "xkb_layout_names": ["English (US)", "French"], "xkb_active_layout_index": 1,
             "xkb_active_layout_name": "French", "libinput": {"send_events": "enabled"}},
            {"identifier": "2:2:pad", "name": "pad", "type": "touchpad", "libinput": {}}
        ]"#;
        let devices = parse_inputs(json).unwrap();
        assert_eq!(devices[0].device_type, "keyboard");
        assert_eq!(extract_layout(json).as_deref(), Some("French"));
        assert_eq!(keyboard_token(Ok(json.to_string())), "FR");
    }

    #[test]
    fn test_extract_skips_empty_layout() {
        let json = r#"[{"xkb_active_layout_name": ""}, {"xkb_active_layout_name": "German"}]"#;
        assert_eq!(extract_layout(json).as_deref(), Some("German"));
    }

    #[test]
    fn test_extract_single_object_and_stream() {
        assert_eq!(
            extract_layout(r#"{"xkb_active_layout_name": "English (US)"}"#).as_deref(),
            Some("English (US)")
        );
        assert_eq!(
            extract_layout(r#"{"type":"pointer"} {"xkb_active_layout_name":"French"}"#).as_deref(),
            Some("French")
        );
    }

    #[test]
    fn test_extract_from_truncated_payload() {
        let cut = &INPUTS[..INPUTS.find("ELAN_Touchpad").unwrap()];
        assert_eq!(extract_layout(cut).as_deref(), Some("Romanian"));

        // Value itself cut off
        let cut = r#"[{"xkb_active_layout_name": null}, {"xkb_active_layout_name": "Roma"#;
        assert_eq!(extract_layout(cut), None);
    }

    #[test]
    fn test_extract_without_layout() {
        assert_eq!(extract_layout("[]"), None);
        assert_eq!(extract_layout(""), None);
        assert_eq!(
            extract_layout(r#"[{"xkb_active_layout_name": null}]"#),
            None
        );
    }

    #[test]
    fn test_abbreviations() {
        assert_eq!(abbreviate_layout("English (UK)"), "UK");
        assert_eq!(abbreviate_layout("English (United Kingdom)"), "UK");
        assert_eq!(abbreviate_layout("British"), "UK");
        assert_eq!(abbreviate_layout("Romanian (standard)"), "RO");
        assert_eq!(abbreviate_layout("German"), "GE");
        assert_eq!(abbreviate_layout("us"), "US");
        assert_eq!(abbreviate_layout("x"), "X?");
        assert_eq!(abbreviate_layout(""), "??");
    }

    #[test]
    fn test_token_on_ipc_error() {
        assert_eq!(keyboard_token(Err(IpcError::Empty)), "??");
        assert_eq!(
            keyboard_token(Err(IpcError::ConfigMissing("SWAYSOCK".to_string()))),
            "??"
        );
        assert_eq!(keyboard_token(Ok("[]".to_string())), "??");
    }

    #[test]
    fn test_sampler_without_socket() {
        let sampler = KeyboardSampler::new(
            "BARSTAT_TEST_SOCKET_THAT_IS_NEVER_SET",
            std::time::Duration::from_millis(50),
        );
        assert_eq!(sampler.sample(), "??");
    }
}

use mac_address::get_mac_address;
use tracing::warn;

/// Fallback when the host has no resolvable hardware address.
const UNKNOWN_MAC: &str = "00:00:00:00:00:00";

/// Resolve the host's hardware address, normalized for the device registry.
pub(crate) fn host_mac() -> String {
    match get_mac_address() {
        Ok(Some(mac)) => format_mac(&mac.to_string()),
        Ok(None) => {
            warn!("No hardware address found for this host, using all zeroes");
            UNKNOWN_MAC.to_string()
        }
        Err(e) => {
            warn!("Failed to look up the hardware address: {}", e);
            UNKNOWN_MAC.to_string()
        }
    }
}

/// Format a hardware address string for entry into the device registry.
///
/// Accepts colon, dash, and dot groupings. Anything else is returned
/// unmodified.
pub(crate) fn format_mac(mac: &str) -> String {
    if mac.len() == 17 && mac.matches(':').count() == 5 {
        return mac.to_ascii_lowercase();
    }

    let digits: Vec<char> = mac.chars().filter(|c| !matches!(c, '-' | '.')).collect();

    if digits.len() == 12 {
        let mut formatted = String::with_capacity(17);
        for (i, pair) in digits.chunks(2).enumerate() {
            if i > 0 {
                formatted.push(':');
            }
            for c in pair {
                formatted.extend(c.to_lowercase());
            }
        }
        return formatted;
    }

    warn!("Not sure on the hardware address format, bypassing this: {}", mac);
    mac.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colon_separated_is_lowercased() {
        assert_eq!(format_mac("AA:BB:CC:DD:EE:FF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(format_mac("aa:bb:cc:dd:ee:ff"), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_dash_separated_is_normalized() {
        assert_eq!(format_mac("AA-BB-CC-DD-EE-FF"), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_dot_separated_is_normalized() {
        assert_eq!(format_mac("AABB.CCDD.EEFF"), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_bare_digits_are_normalized() {
        assert_eq!(format_mac("AABBCCDDEEFF"), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_unparsable_input_is_returned_unmodified() {
        assert_eq!(format_mac("AA:BB:CC:DD"), "AA:BB:CC:DD");
        assert_eq!(format_mac("0123456789"), "0123456789");
    }
}

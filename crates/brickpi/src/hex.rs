//! Hex text for frames on the command line.

/// Lower-case hex with a space between bytes.
pub fn encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| ::hex::encode([*byte]))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse hex bytes. Whitespace, commas, `:` separators and `0x` prefixes
/// are accepted, so `"05 01 04"`, `"050104"` and `"0x05,0x01,0x04"` agree.
pub fn decode(text: &str) -> Result<Vec<u8>, String> {
    let mut digits = String::with_capacity(text.len());
    for token in text.split(|c: char| c.is_whitespace() || c == ',' || c == ':') {
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if token.len() % 2 == 1 {
            digits.push('0');
        }
        digits.push_str(token);
    }

    ::hex::decode(&digits).map_err(|err| format!("invalid hex text: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_and_prefixes() {
        assert_eq!(decode("05 01 04").unwrap(), vec![5, 1, 4]);
        assert_eq!(decode("050104").unwrap(), vec![5, 1, 4]);
        assert_eq!(decode("0x05,0x01,0x4").unwrap(), vec![5, 1, 4]);
        assert_eq!(decode("0E:ab").unwrap(), vec![0x0E, 0xAB]);
        assert_eq!(decode("  ").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(decode("zz").is_err());
        assert!(decode("0g").is_err());
        assert!(decode("é").is_err());
    }

    #[test]
    fn encodes_spaced_lowercase() {
        assert_eq!(encode(&[0x00, 0x0E, 0xAB]), "00 0e ab");
        assert_eq!(encode(&[]), "");
    }
}

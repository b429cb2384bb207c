//! Wire filename codec.
//!
//! Names travel in a fixed 24-byte field:
//! - Bytes 0-5: basename, space-padded
//! - Bytes 6-23: extension (including the dot), NUL-padded
//!
//! With DME active, folders are sent as their first 6 characters,
//! space-padded, followed by the literal `.<>` suffix.

/// Width of the filename field in reference requests and returns.
pub const NAME_FIELD_SIZE: usize = 24;

/// Suffix marking a folder name in DME mode.
pub const DME_SUFFIX: &str = ".<>";

/// Width of the basename slot at the start of the field.
pub const BASENAME_LEN: usize = 6;

/// A filename decoded from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WireName {
    /// Logical name with padding and any folder suffix removed.
    pub name: String,
    /// Set when the field carried the DME folder suffix.
    pub is_folder: bool,
}

impl WireName {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// Encode a stored name into the 24-byte wire field.
///
/// Basenames longer than 6 characters spill into the extension area so the
/// full stored name still decodes back to itself.
///
/// # Examples
/// ```
/// use tpdd_core::protocol::encode_wire_name;
/// assert_eq!(&encode_wire_name("ABC.DO", false, false)[..9], b"ABC   .DO");
/// assert_eq!(&encode_wire_name("GAMES", true, true)[..9], b"GAMES .<>");
/// ```
pub fn encode_wire_name(name: &str, is_folder: bool, dme: bool) -> [u8; NAME_FIELD_SIZE] {
    let mut field = [0u8; NAME_FIELD_SIZE];
    let bytes = name.as_bytes();

    if is_folder && dme {
        let len = bytes.len().min(BASENAME_LEN);
        field[..len].copy_from_slice(&bytes[..len]);
        field[len..BASENAME_LEN].fill(b' ');
        field[BASENAME_LEN..BASENAME_LEN + DME_SUFFIX.len()].copy_from_slice(DME_SUFFIX.as_bytes());
        return field;
    }

    let base_len = bytes
        .iter()
        .take(BASENAME_LEN)
        .position(|&b| b == b'.')
        .unwrap_or(bytes.len().min(BASENAME_LEN));
    field[..base_len].copy_from_slice(&bytes[..base_len]);
    field[base_len..BASENAME_LEN].fill(b' ');

    let rest = &bytes[base_len..];
    let rest_len = rest.len().min(NAME_FIELD_SIZE - BASENAME_LEN);
    field[BASENAME_LEN..BASENAME_LEN + rest_len].copy_from_slice(&rest[..rest_len]);
    field
}

/// Decode a wire name field.
///
/// Spaces are dropped wherever they appear and decoding stops at the first
/// NUL. With DME active, a `.<>` suffix is stripped and marks a folder.
pub fn decode_wire_name(field: &[u8], dme: bool) -> WireName {
    let bytes: Vec<u8> = field
        .iter()
        .take(NAME_FIELD_SIZE)
        .take_while(|&&b| b != 0)
        .filter(|&&b| b != b' ')
        .copied()
        .collect();
    let mut name = String::from_utf8_lossy(&bytes).into_owned();

    let mut is_folder = false;
    if dme {
        if let Some(pos) = name.find(DME_SUFFIX) {
            name.truncate(pos);
            is_folder = true;
        }
    }

    WireName { name, is_folder }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(s: &str) -> [u8; NAME_FIELD_SIZE] {
        let mut field = [0u8; NAME_FIELD_SIZE];
        field[..s.len()].copy_from_slice(s.as_bytes());
        field
    }

    #[test]
    fn test_encode_file() {
        assert_eq!(encode_wire_name("LOADER.DO", false, false), padded("LOADER.DO"));
        assert_eq!(encode_wire_name("ABC.BA", false, true), padded("ABC   .BA"));
        assert_eq!(encode_wire_name("NOEXT", false, false), padded("NOEXT "));
    }

    #[test]
    fn test_encode_long_basename_spills() {
        assert_eq!(
            encode_wire_name("LONGNAME.TXT", false, false),
            padded("LONGNAME.TXT")
        );
    }

    #[test]
    fn test_encode_truncates_to_field() {
        let field = encode_wire_name("A.abcdefghijklmnopqrstuvwxyz", false, false);
        assert_eq!(&field[..6], b"A     ");
        assert_eq!(&field[6..], b".abcdefghijklmnopq");
    }

    #[test]
    fn test_encode_folder() {
        assert_eq!(encode_wire_name("GAMES", true, true), padded("GAMES .<>"));
        // folder names are never split at a dot
        assert_eq!(encode_wire_name("V1.2", true, true), padded("V1.2  .<>"));
        assert_eq!(encode_wire_name("PROJECTS", true, true), padded("PROJEC.<>"));
        // without DME a folder is sent like a file
        assert_eq!(encode_wire_name("GAMES", true, false), padded("GAMES "));
    }

    #[test]
    fn test_decode_strips_padding() {
        let name = decode_wire_name(&padded("ABC   .DO     "), false);
        assert_eq!(name.name, "ABC.DO");
        assert!(!name.is_folder);
    }

    #[test]
    fn test_decode_folder_suffix() {
        let name = decode_wire_name(&padded("GAMES .<>"), true);
        assert_eq!(name.name, "GAMES");
        assert!(name.is_folder);

        let name = decode_wire_name(&padded("GAMES .<>"), false);
        assert_eq!(name.name, "GAMES.<>");
        assert!(!name.is_folder);
    }

    #[test]
    fn test_decode_blank() {
        assert!(decode_wire_name(&[0u8; NAME_FIELD_SIZE], true).is_empty());
    }

    #[test]
    fn test_round_trip_of_encoded_fields() {
        for (name, folder, dme) in [
            ("LOADER.DO", false, false),
            ("A.BA", false, true),
            ("LONGNAME.TXT", false, true),
            ("GAMES", true, true),
            ("PARENT", true, true),
        ] {
            let field = encode_wire_name(name, folder, dme);
            let decoded = decode_wire_name(&field, dme);
            assert_eq!(encode_wire_name(&decoded.name, folder, dme), field);
        }
    }
}

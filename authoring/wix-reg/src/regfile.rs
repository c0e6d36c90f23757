//! Import of registry editor exports (`.reg` files)
//!
//! Supports `Windows Registry Editor Version 5.00` (UTF-16 strings in hex
//! data) and `REGEDIT4` (single-byte strings). Deleting sections and
//! values are skipped with a warning since an installer only writes.
//!
//! # Example
//!
//! ```
//! use wix_reg::{parse_reg, Hive, RegValue};
//!
//! let reg = r#"Windows Registry Editor Version 5.00
//!
//! [HKEY_LOCAL_MACHINE\Software\My Company]
//! "Message"="Hello"
//! "Count"=dword:00000309
//! "#;
//!
//! let entries = parse_reg(reg).unwrap();
//! assert_eq!(entries.len(), 2);
//! assert_eq!(entries[0].hive, Hive::LocalMachine);
//! assert_eq!(entries[1].value, Some(RegValue::Int32(777)));
//! ```

use crate::types::{Hive, RegValue, RegistryEntry};
use crate::{RegError, Result};
use std::path::{Path, PathBuf};

const HEADER_V5: &str = "Windows Registry Editor Version 5.00";
const HEADER_V4: &str = "REGEDIT4";

/// A `.reg` file whose values are installed as registry entries
#[derive(Debug, Clone)]
pub struct RegFile {
    pub path: PathBuf,
}

impl RegFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read and parse the file. regedit writes UTF-16LE with a BOM, or the
    /// ANSI code page for REGEDIT4; UTF-8 files are accepted as well.
    pub fn entries(&self) -> Result<Vec<RegistryEntry>> {
        let bytes = std::fs::read(&self.path)?;
        let text = decode_text(&bytes)?;
        log::info!("Importing {}", self.path.display());
        parse_reg(&text)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Vec<RegistryEntry>> {
        Self::new(path.as_ref()).entries()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Format {
    Regedit4,
    Regedit5,
}

/// Section currently being read
enum Section {
    None,
    Key { hive: Hive, key: String },
    Deleted,
}

/// Parse `.reg` text into entries, in file order
pub fn parse_reg(text: &str) -> Result<Vec<RegistryEntry>> {
    let mut lines = logical_lines(text).into_iter();

    let format = loop {
        match lines.next() {
            Some((_, line)) if line.is_empty() => continue,
            Some((_, line)) if line == HEADER_V5 => break Format::Regedit5,
            Some((_, line)) if line == HEADER_V4 => break Format::Regedit4,
            Some((number, _)) => return Err(syntax(number, "missing registry editor header")),
            None => return Err(syntax(1, "missing registry editor header")),
        }
    };

    let mut entries = Vec::new();
    let mut section = Section::None;

    for (number, line) in lines {
        if line.is_empty() || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            section = parse_section(number, &line)?;
            continue;
        }

        let (hive, key) = match &section {
            Section::Key { hive, key } => (*hive, key),
            Section::Deleted => continue,
            Section::None => return Err(syntax(number, "value outside of a key section")),
        };

        let (name, data) = split_value_line(number, &line)?;
        match parse_data(number, data, format)? {
            Some(value) => entries.push(RegistryEntry::new(hive, key.clone(), name, value)),
            None => log::warn!(
                "line {}: skipping deletion of {}\\{}\\{}",
                number,
                hive,
                key,
                name
            ),
        }
    }

    Ok(entries)
}

/// UTF-16LE with a BOM (v5), the ANSI code page (REGEDIT4), or UTF-8
fn decode_text(bytes: &[u8]) -> Result<String> {
    if let Some(rest) = bytes.strip_prefix(b"\xFF\xFE") {
        return utf16le(rest).map_err(|message| syntax(1, &message));
    }
    if bytes.starts_with(HEADER_V4.as_bytes()) {
        return Ok(ansi(bytes));
    }

    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|e| {
        let valid = &bytes[..e.utf8_error().valid_up_to()];
        let line = valid.iter().filter(|b| **b == b'\n').count() + 1;
        syntax(line, "invalid UTF-8 text")
    })
}

/// Join `\`-continued hex data and trim lines. Yields the line number the
/// logical line started on.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        let (number, mut current) = pending.take().unwrap_or((i + 1, String::new()));
        current.push_str(line);

        if current.ends_with('\\') && has_hex_data(&current) {
            current.pop();
            pending = Some((number, current));
        } else {
            out.push((number, current));
        }
    }

    if let Some(last) = pending {
        out.push(last);
    }
    out
}

/// True for a value line whose data is `hex:` or `hex(n):`
fn has_hex_data(line: &str) -> bool {
    let rest = match line.strip_prefix('@') {
        Some(rest) => rest,
        None => match parse_quoted(line) {
            Some((_, rest)) => rest,
            None => return false,
        },
    };
    rest.trim_start()
        .strip_prefix('=')
        .map_or(false, |data| data.trim_start().starts_with("hex"))
}

fn parse_section(number: usize, line: &str) -> Result<Section> {
    let inner = line
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| syntax(number, "unterminated key section"))?;

    if inner.starts_with('-') {
        log::warn!("line {}: skipping deleted key {}", number, &inner[1..]);
        return Ok(Section::Deleted);
    }

    let (root, key) = inner.split_once('\\').unwrap_or((inner, ""));
    let hive = root
        .parse::<Hive>()
        .map_err(|message| syntax(number, &message))?;

    Ok(Section::Key {
        hive,
        key: key.to_string(),
    })
}

/// Split `"name"=data` or `@=data`
fn split_value_line(number: usize, line: &str) -> Result<(String, &str)> {
    let (name, rest) = if let Some(rest) = line.strip_prefix('@') {
        (String::new(), rest)
    } else {
        parse_quoted(line).ok_or_else(|| syntax(number, "expected a quoted value name"))?
    };

    let data = rest
        .trim_start()
        .strip_prefix('=')
        .ok_or_else(|| syntax(number, "expected '=' after value name"))?;

    Ok((name, data.trim()))
}

/// Read a `"..."` string with `\\` and `\"` escapes, returning it and the
/// remaining input.
fn parse_quoted(input: &str) -> Option<(String, &str)> {
    let body = input.strip_prefix('"')?;
    let mut out = String::new();
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((out, &body[i + 1..])),
            '\\' => match chars.next() {
                Some((_, e @ ('\\' | '"'))) => out.push(e),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return None,
            },
            _ => out.push(c),
        }
    }
    None
}

/// Parse value data; `None` marks a deletion (`-`)
fn parse_data(number: usize, data: &str, format: Format) -> Result<Option<RegValue>> {
    if data == "-" {
        return Ok(None);
    }

    if data.starts_with('"') {
        let (text, rest) =
            parse_quoted(data).ok_or_else(|| syntax(number, "unterminated string value"))?;
        if !rest.trim().is_empty() {
            return Err(syntax(number, "unexpected text after string value"));
        }
        return Ok(Some(RegValue::Text(text)));
    }

    if let Some(digits) = data.strip_prefix("dword:") {
        let dword = u32::from_str_radix(digits, 16)
            .map_err(|e| syntax(number, &format!("invalid dword: {}", e)))?;
        return Ok(Some(RegValue::Int32(dword as i32)));
    }

    if let Some(bytes) = data.strip_prefix("hex:") {
        return Ok(Some(RegValue::Binary(parse_hex(number, bytes)?)));
    }

    let (kind, bytes) = data
        .strip_prefix("hex(")
        .and_then(|s| s.split_once("):"))
        .ok_or_else(|| syntax(number, &format!("unrecognized value data: {}", data)))?;
    let bytes = parse_hex(number, bytes)?;

    let value = match kind.to_ascii_lowercase().as_str() {
        // REG_SZ and REG_EXPAND_SZ
        "1" | "2" => RegValue::Text(decode_string(number, &bytes, format)?),
        // REG_DWORD (little endian)
        "4" => {
            let raw: [u8; 4] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| syntax(number, "hex(4) data must be 4 bytes"))?;
            RegValue::Int32(i32::from_le_bytes(raw))
        }
        "7" => {
            let text = decode_string(number, &bytes, format)?;
            RegValue::Text(multi_string_lines(&text))
        }
        "3" => RegValue::Binary(bytes),
        "b" => return Err(RegError::UnsupportedValueType("REG_QWORD".to_string())),
        other => {
            return Err(RegError::UnsupportedValueType(format!(
                "registry data type hex({})",
                other
            )))
        }
    };

    Ok(Some(value))
}

fn parse_hex(number: usize, data: &str) -> Result<Vec<u8>> {
    let digits: String = data
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    hex::decode(digits).map_err(|e| syntax(number, &format!("invalid hex data: {}", e)))
}

/// Decode string data, dropping the terminating NUL(s) of the last string
fn decode_string(number: usize, bytes: &[u8], format: Format) -> Result<String> {
    let text = match format {
        Format::Regedit5 => utf16le(bytes).map_err(|message| syntax(number, &message))?,
        Format::Regedit4 => ansi(bytes),
    };
    Ok(text.trim_end_matches('\0').to_string())
}

/// NUL-separated REG_MULTI_SZ strings as newline-separated text
fn multi_string_lines(text: &str) -> String {
    text.split('\0').collect::<Vec<_>>().join("\n")
}

fn ansi(bytes: &[u8]) -> String {
    encoding_rs::WINDOWS_1252
        .decode_without_bom_handling(bytes)
        .0
        .into_owned()
}

fn utf16le(bytes: &[u8]) -> std::result::Result<String, String> {
    if bytes.len() % 2 != 0 {
        return Err("odd number of bytes in UTF-16 data".to_string());
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| e.to_string())
}

fn syntax(line: usize, message: &str) -> RegError {
    RegError::RegSyntax {
        line,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse_v5(body: &str) -> Result<Vec<RegistryEntry>> {
        parse_reg(&format!("{}\n\n{}", HEADER_V5, body))
    }

    #[test]
    fn test_string_values() {
        let entries = parse_v5(
            "[HKEY_CURRENT_USER\\Software\\Test]\n\"Message\"=\"Hello\"\n@=\"Default\"\n",
        )
        .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].hive, Hive::CurrentUser);
        assert_eq!(entries[0].key, "Software\\Test");
        assert_eq!(entries[0].name, "Message");
        assert_eq!(entries[0].value, Some(RegValue::Text("Hello".into())));
        assert_eq!(entries[1].name, "");
        assert_eq!(entries[1].value, Some(RegValue::Text("Default".into())));
    }

    #[test]
    fn test_escapes() {
        let entries =
            parse_v5("[HKEY_LOCAL_MACHINE\\Software]\n\"Path\"=\"C:\\\\App\\\\\"\n\"Q\"=\"say \\\"hi\\\"\"\n")
                .unwrap();
        assert_eq!(entries[0].value, Some(RegValue::Text("C:\\App\\".into())));
        assert_eq!(entries[1].value, Some(RegValue::Text("say \"hi\"".into())));
    }

    #[test]
    fn test_quoted_name_with_equals() {
        let entries = parse_v5("[HKEY_CURRENT_USER\\K]\n\"a=b\"=\"c\"\n").unwrap();
        assert_eq!(entries[0].name, "a=b");
    }

    #[test]
    fn test_dword() {
        let entries = parse_v5(
            "[HKEY_LOCAL_MACHINE\\Software]\n\"Count\"=dword:00000309\n\"All\"=dword:ffffffff\n",
        )
        .unwrap();
        assert_eq!(entries[0].value, Some(RegValue::Int32(777)));
        assert_eq!(entries[1].value, Some(RegValue::Int32(-1)));
    }

    #[test]
    fn test_binary_with_continuation() {
        let entries = parse_v5(
            "[HKEY_CURRENT_USER\\Software]\n\"Blob\"=hex:de,ad,\\\n  be,ef\n\"Next\"=\"x\"\n",
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value, Some(RegValue::Binary(vec![0xDE, 0xAD, 0xBE, 0xEF])));
        assert_eq!(entries[1].name, "Next");
    }

    #[test]
    fn test_expand_string_v5() {
        // "%TEMP%" in UTF-16LE plus terminator
        let entries = parse_v5(
            "[HKEY_CURRENT_USER\\Env]\n\"Dir\"=hex(2):25,00,54,00,45,00,4d,00,50,00,25,00,00,00\n",
        )
        .unwrap();
        assert_eq!(entries[0].value, Some(RegValue::Text("%TEMP%".into())));
    }

    #[test]
    fn test_multi_string_v5() {
        // "a", "b" as REG_MULTI_SZ
        let entries = parse_v5(
            "[HKEY_CURRENT_USER\\Env]\n\"List\"=hex(7):61,00,00,00,62,00,00,00,00,00\n",
        )
        .unwrap();
        assert_eq!(entries[0].value, Some(RegValue::Text("a\nb".into())));
    }

    #[test]
    fn test_regedit4_strings_are_single_byte() {
        let entries = parse_reg(
            "REGEDIT4\n\n[HKEY_CURRENT_USER\\Env]\n\"Dir\"=hex(2):25,54,25,00\n\"List\"=hex(7):61,00,62,00,00\n",
        )
        .unwrap();
        assert_eq!(entries[0].value, Some(RegValue::Text("%T%".into())));
        assert_eq!(entries[1].value, Some(RegValue::Text("a\nb".into())));
    }

    #[test]
    fn test_hex4_dword() {
        let entries = parse_v5("[HKEY_CURRENT_USER\\K]\n\"N\"=hex(4):09,03,00,00\n").unwrap();
        assert_eq!(entries[0].value, Some(RegValue::Int32(777)));
    }

    #[test]
    fn test_qword_is_unsupported() {
        let err = parse_v5("[HKEY_CURRENT_USER\\K]\n\"Q\"=hex(b):01,00,00,00,00,00,00,00\n")
            .unwrap_err();
        assert!(matches!(err, RegError::UnsupportedValueType(_)));
    }

    #[test]
    fn test_deletions_are_skipped() {
        let entries = parse_v5(
            "[-HKEY_CURRENT_USER\\Old]\n\"Gone\"=\"x\"\n\n[HKEY_CURRENT_USER\\New]\n\"Removed\"=-\n\"Kept\"=\"y\"\n",
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Kept");
        assert_eq!(entries[0].key, "New");
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let entries =
            parse_v5("; exported settings\n\n[HKEY_CLASSES_ROOT\\.myapp]\n\n@=\"MyApp.Document\"\n")
                .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hive, Hive::ClassesRoot);
    }

    #[test]
    fn test_missing_header() {
        let err = parse_reg("[HKEY_CURRENT_USER\\K]\n").unwrap_err();
        assert!(matches!(err, RegError::RegSyntax { line: 1, .. }));
        assert!(parse_reg("").is_err());
    }

    #[test]
    fn test_value_outside_section() {
        let err = parse_v5("\"A\"=\"b\"\n").unwrap_err();
        assert!(matches!(err, RegError::RegSyntax { line: 3, .. }));
    }

    #[test]
    fn test_unknown_hive() {
        let err = parse_v5("[HKEY_NOWHERE\\K]\n").unwrap_err();
        assert!(matches!(err, RegError::RegSyntax { .. }));
    }

    #[test]
    fn test_bad_data() {
        assert!(parse_v5("[HKCU\\K]\n\"A\"=dword:zz\n").is_err());
        assert!(parse_v5("[HKCU\\K]\n\"A\"=hex:1\n").is_err());
        assert!(parse_v5("[HKCU\\K]\n\"A\"=\"open\n").is_err());
        assert!(parse_v5("[HKCU\\K]\n\"A\"=weird\n").is_err());
        assert!(parse_v5("[HKCU\\K]\nA=\"b\"\n").is_err());
    }

    #[test]
    fn test_load_utf16_file() {
        let text = format!("{}\r\n\r\n[HKEY_CURRENT_USER\\K]\r\n\"A\"=\"b\"\r\n", HEADER_V5);
        let mut bytes = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();

        let entries = RegFile::load(file.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, Some(RegValue::Text("b".into())));
    }

    #[test]
    fn test_commented_hex_line_does_not_continue() {
        let entries = parse_v5(
            "[HKEY_CURRENT_USER\\K]\n; old: \"B\"=hex:01,\\\n\"A\"=\"kept\"\n",
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "A");
        assert_eq!(entries[0].value, Some(RegValue::Text("kept".into())));
    }

    #[test]
    fn test_load_regedit4_ansi_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"REGEDIT4\r\n\r\n[HKEY_CURRENT_USER\\K]\r\n\"Name\"=\"Caf\xE9\"\r\n")
            .unwrap();

        let entries = RegFile::load(file.path()).unwrap();
        assert_eq!(entries[0].value, Some(RegValue::Text("Caf\u{e9}".into())));
    }

    #[test]
    fn test_load_invalid_utf8_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"Windows Registry Editor Version 5.00\n\n[HKEY_CURRENT_USER\\K]\n\"Name\"=\"Caf\xE9\"\n",
        )
        .unwrap();

        let err = RegFile::load(file.path()).unwrap_err();
        assert!(matches!(err, RegError::RegSyntax { line: 4, .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = RegFile::new("/nonexistent/settings.reg").entries().unwrap_err();
        assert!(matches!(err, RegError::IoError(_)));
    }
}

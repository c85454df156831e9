//! Font dictionaries: style heuristics, glyph widths and text decoding.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use super::objects::{number, resolve, resolve_dict, stream_bytes};

const BOLD_TOKENS: &[&str] = &[
    "bold",
    "black",
    "heavy",
    "semibold",
    "demibold",
    "extrabold",
    "ultrabold",
];
const ITALIC_TOKENS: &[&str] = &["italic", "oblique", "slanted", "inclined"];

const FLAG_ITALIC: i64 = 1 << 6;
const FLAG_FORCE_BOLD: i64 = 1 << 18;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontStyle {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

impl FontStyle {
    /// Infer weight and slant from a PostScript font name such as
    /// `ABCDEF+Helvetica-BoldOblique`.
    pub fn from_font_name(raw: &str) -> Self {
        let name = strip_subset_prefix(raw);
        let lower = name.to_ascii_lowercase();
        let family = name
            .split(|c| c == '-' || c == ',')
            .next()
            .unwrap_or(name)
            .trim()
            .to_string();
        Self {
            family,
            bold: BOLD_TOKENS.iter().any(|token| lower.contains(token)),
            italic: ITALIC_TOKENS.iter().any(|token| lower.contains(token)),
        }
    }
}

fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

/// One decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    /// Advance in text space (glyph width / 1000).
    pub width: f64,
    /// Single-byte code 32; the only code word spacing applies to.
    pub is_space: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FontInfo {
    pub style: FontStyle,
    two_byte: bool,
    to_unicode: Option<HashMap<u32, String>>,
    first_char: u32,
    widths: Vec<f64>,
    cid_widths: HashMap<u32, f64>,
    default_width: f64,
}

impl FontInfo {
    pub fn fallback() -> Self {
        Self {
            default_width: 500.0,
            ..Self::default()
        }
    }

    pub fn load(doc: &Document, dict: &Dictionary) -> Self {
        let base_font = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_name().ok())
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .unwrap_or_default();
        let mut style = FontStyle::from_font_name(&base_font);

        let subtype = dict
            .get(b"Subtype")
            .ok()
            .and_then(|obj| obj.as_name().ok())
            .unwrap_or(b"Type1".as_slice());
        let two_byte = subtype == b"Type0";

        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_stream().ok())
            .and_then(|stream| stream_bytes(stream).ok())
            .map(|bytes| parse_to_unicode(&bytes))
            .filter(|map| !map.is_empty());

        let mut info = Self {
            style: FontStyle::default(),
            two_byte,
            to_unicode,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: 500.0,
        };

        let descriptor_owner = if two_byte {
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .and_then(|obj| resolve(doc, obj).as_array().ok())
                .and_then(|array| array.first())
                .and_then(|obj| resolve_dict(doc, obj));
            if let Some(cid_font) = descendant {
                info.default_width = cid_font
                    .get(b"DW")
                    .ok()
                    .and_then(|obj| number(resolve(doc, obj)))
                    .unwrap_or(1000.0);
                if let Some(w) = cid_font.get(b"W").ok().and_then(|obj| resolve(doc, obj).as_array().ok()) {
                    info.cid_widths = parse_cid_widths(doc, w);
                }
            }
            descendant
        } else {
            info.first_char = dict
                .get(b"FirstChar")
                .ok()
                .and_then(|obj| number(resolve(doc, obj)))
                .map(|v| v.max(0.0) as u32)
                .unwrap_or(0);
            if let Some(widths) = dict.get(b"Widths").ok().and_then(|obj| resolve(doc, obj).as_array().ok()) {
                info.widths = widths
                    .iter()
                    .map(|obj| number(resolve(doc, obj)).unwrap_or(0.0))
                    .collect();
            }
            Some(dict)
        };

        if let Some(descriptor) = descriptor_owner
            .and_then(|owner| owner.get(b"FontDescriptor").ok())
            .and_then(|obj| resolve_dict(doc, obj))
        {
            let flags = descriptor
                .get(b"Flags")
                .ok()
                .and_then(|obj| resolve(doc, obj).as_i64().ok())
                .unwrap_or(0);
            let weight = descriptor
                .get(b"FontWeight")
                .ok()
                .and_then(|obj| number(resolve(doc, obj)))
                .unwrap_or(0.0);
            let italic_angle = descriptor
                .get(b"ItalicAngle")
                .ok()
                .and_then(|obj| number(resolve(doc, obj)))
                .unwrap_or(0.0);
            style.bold |= flags & FLAG_FORCE_BOLD != 0 || weight >= 600.0;
            style.italic |= flags & FLAG_ITALIC != 0 || italic_angle != 0.0;
        }

        info.style = style;
        info
    }

    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        if self.two_byte {
            bytes
                .chunks_exact(2)
                .map(|pair| {
                    let code = u32::from(pair[0]) << 8 | u32::from(pair[1]);
                    Glyph {
                        text: self.lookup(code).unwrap_or_else(|| {
                            char::from_u32(code)
                                .filter(|c| !c.is_control())
                                .unwrap_or('\u{FFFD}')
                                .to_string()
                        }),
                        width: self.cid_widths.get(&code).copied().unwrap_or(self.default_width) / 1000.0,
                        is_space: false,
                    }
                })
                .collect()
        } else {
            bytes
                .iter()
                .map(|&byte| {
                    let code = u32::from(byte);
                    Glyph {
                        text: self.lookup(code).unwrap_or_else(|| latin1_char(byte).to_string()),
                        width: self.simple_width(code) / 1000.0,
                        is_space: byte == b' ',
                    }
                })
                .collect()
        }
    }

    fn lookup(&self, code: u32) -> Option<String> {
        self.to_unicode.as_ref().and_then(|map| map.get(&code).cloned())
    }

    fn simple_width(&self, code: u32) -> f64 {
        code.checked_sub(self.first_char)
            .and_then(|offset| self.widths.get(offset as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }
}

/// WinAnsi punctuation in 0x80..0x9F, Latin-1 elsewhere.
fn latin1_char(byte: u8) -> char {
    match byte {
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x85 => '\u{2026}',
        0x80 => '\u{20AC}',
        b if b < 0x20 => ' ',
        b => char::from(b),
    }
}

/// `/W` array: `c [w1 w2 ...]` or `c_first c_last w`.
fn parse_cid_widths(doc: &Document, array: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < array.len() {
        let Some(first) = number(resolve(doc, &array[i])) else {
            break;
        };
        let first = first.max(0.0) as u32;
        match array.get(i + 1).map(|obj| resolve(doc, obj)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    let code = u32::try_from(offset).ok().and_then(|offset| first.checked_add(offset));
                    if let (Some(code), Some(w)) = (code, number(resolve(doc, w))) {
                        widths.insert(code, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(w)) = (
                    number(last),
                    array.get(i + 2).and_then(|obj| number(resolve(doc, obj))),
                ) else {
                    break;
                };
                let last = (last.max(0.0) as u32).min(first.saturating_add(0xFFFF));
                for code in first..=last {
                    widths.insert(code, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

#[derive(Debug, Clone, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

fn tokenize_cmap(data: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        match byte {
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let start = i + 1;
                let end = data[start..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map(|p| start + p)
                    .unwrap_or(data.len());
                tokens.push(CMapToken::Hex(decode_hex(&data[start..end])));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CMapToken::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(CMapToken::ArrayEnd);
                i += 1;
            }
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'(' => {
                // literal strings only appear in header entries we ignore
                while i < data.len() && data[i] != b')' {
                    i += 1;
                }
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'>' | b'[' | b']' | b'(' | b'%')
                {
                    i += 1;
                }
                tokens.push(CMapToken::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }
    tokens
}

fn decode_hex(raw: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = raw
        .iter()
        .filter_map(|&b| (b as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().take(4).fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn utf16be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| u16::from(pair[0]) << 8 | u16::from(pair.get(1).copied().unwrap_or(0)))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let tokens = tokenize_cmap(data);
    let mut map = HashMap::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            CMapToken::Word(word) if word == "beginbfchar" => {
                i += 1;
                while i + 1 < tokens.len() {
                    match (&tokens[i], &tokens[i + 1]) {
                        (CMapToken::Hex(src), CMapToken::Hex(dst)) => {
                            map.insert(code_value(src), utf16be(dst));
                            i += 2;
                        }
                        _ => break,
                    }
                }
            }
            CMapToken::Word(word) if word == "beginbfrange" => {
                i += 1;
                while i + 2 < tokens.len() {
                    let (CMapToken::Hex(lo), CMapToken::Hex(hi)) = (&tokens[i], &tokens[i + 1]) else {
                        break;
                    };
                    let lo = code_value(lo);
                    let hi = code_value(hi).min(lo.saturating_add(0xFFFF));
                    match &tokens[i + 2] {
                        CMapToken::Hex(dst) => {
                            insert_range(&mut map, lo, hi, dst);
                            i += 3;
                        }
                        CMapToken::ArrayStart => {
                            let mut j = i + 3;
                            let mut code = lo;
                            while let Some(CMapToken::Hex(dst)) = tokens.get(j) {
                                if code <= hi {
                                    map.insert(code, utf16be(dst));
                                }
                                code = code.saturating_add(1);
                                j += 1;
                            }
                            // skip the closing bracket
                            i = j + 1;
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }
    map
}

fn insert_range(map: &mut HashMap<u32, String>, lo: u32, hi: u32, dst: &[u8]) {
    if dst.len() < 2 {
        return;
    }
    let mut units: Vec<u16> = dst
        .chunks(2)
        .map(|pair| u16::from(pair[0]) << 8 | u16::from(pair.get(1).copied().unwrap_or(0)))
        .collect();
    let Some(last) = units.last().copied() else {
        return;
    };
    for (offset, code) in (lo..=hi).enumerate() {
        if let Some(slot) = units.last_mut() {
            *slot = last.wrapping_add(offset as u16);
        }
        map.insert(code, String::from_utf16_lossy(&units));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_tokens_from_font_names() {
        let bold = FontStyle::from_font_name("ABCDEF+Helvetica-BoldOblique");
        assert_eq!(bold.family, "Helvetica");
        assert!(bold.bold);
        assert!(bold.italic);

        let heavy = FontStyle::from_font_name("Avenir,Heavy");
        assert_eq!(heavy.family, "Avenir");
        assert!(heavy.bold);
        assert!(!heavy.italic);

        let regular = FontStyle::from_font_name("TimesNewRomanPSMT");
        assert!(!regular.bold);
        assert!(!regular.italic);
        assert_eq!(regular.family, "TimesNewRomanPSMT");
    }

    #[test]
    fn subset_prefix_needs_six_capitals() {
        assert_eq!(strip_subset_prefix("QWERTY+Arial"), "Arial");
        assert_eq!(strip_subset_prefix("Abc+Arial"), "Abc+Arial");
    }

    #[test]
    fn cid_widths_skip_codes_past_the_code_space() {
        let doc = Document::with_version("1.5");
        let w = vec![
            Object::Integer(1),
            Object::Array(vec![Object::Integer(400), Object::Integer(450)]),
            Object::Real(1e10),
            Object::Array(vec![Object::Integer(500), Object::Integer(500)]),
        ];
        let widths = parse_cid_widths(&doc, &w);
        assert_eq!(widths.get(&1), Some(&400.0));
        assert_eq!(widths.get(&2), Some(&450.0));
        assert_eq!(widths.get(&u32::MAX), Some(&500.0));
        assert_eq!(widths.len(), 3);
    }

    #[test]
    fn to_unicode_reads_chars_and_ranges() {
        let cmap = br#"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
1 begincodespacerange <0000> <FFFF> endcodespacerange
2 beginbfchar
<0003> <0020>
<0024> <0041>
endbfchar
2 beginbfrange
<0044> <0046> <0061>
<0050> <0051> [<0078> <00660069>]
endbfrange
endcmap"#;
        let map = parse_to_unicode(cmap);
        assert_eq!(map.get(&0x03).map(String::as_str), Some(" "));
        assert_eq!(map.get(&0x24).map(String::as_str), Some("A"));
        assert_eq!(map.get(&0x44).map(String::as_str), Some("a"));
        assert_eq!(map.get(&0x46).map(String::as_str), Some("c"));
        assert_eq!(map.get(&0x50).map(String::as_str), Some("x"));
        assert_eq!(map.get(&0x51).map(String::as_str), Some("fi"));
    }

    #[test]
    fn simple_font_decodes_latin1_with_widths() {
        let font = FontInfo {
            first_char: 65,
            widths: vec![700.0, 600.0],
            default_width: 500.0,
            ..FontInfo::default()
        };
        let glyphs = font.decode(b"AB C");
        let text: String = glyphs.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(text, "AB C");
        assert!((glyphs[0].width - 0.7).abs() < 1e-9);
        assert!((glyphs[1].width - 0.6).abs() < 1e-9);
        assert!(glyphs[2].is_space);
        assert!((glyphs[3].width - 0.5).abs() < 1e-9);
    }
}

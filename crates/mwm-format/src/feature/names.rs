//! Feature names in several languages.

use mwm_coding::source::{write_string, ArraySource};
use mwm_coding::varint::write_var_u32;

/// Language codes in on-disk order; the position is the stored code.
const LANGUAGES: &[&str] = &[
    "default", "en", "ja", "fr", "ko_rm", "ar", "de", "int_name", "ru", "sv", "zh", "fi", "be",
    "ka", "ko", "he", "nl", "ga", "ja_rm", "el", "it", "es", "zh_pinyin", "th", "cy", "sr", "uk",
    "ca", "hu", "hsb", "eu", "fa", "br", "pl", "hy", "kn", "sl", "ro", "sq", "am", "fy", "cs",
    "gd", "sk", "af", "ja_kana", "lb", "pt", "hr", "fur", "vi", "tr", "bg", "eo", "lt", "la",
    "kk", "gsw", "et", "ku", "mn", "mk", "lv", "hi",
];

pub const DEFAULT_CODE: i8 = 0;
pub const ENGLISH_CODE: i8 = 1;
pub const INTERNATIONAL_CODE: i8 = 7;

/// Stored code of a language, e.g. `"de"` -> 6.
pub fn lang_index(code: &str) -> Option<i8> {
    LANGUAGES.iter().position(|&l| l == code).map(|i| i as i8)
}

pub fn lang_code(index: i8) -> Option<&'static str> {
    usize::try_from(index).ok().and_then(|i| LANGUAGES.get(i).copied())
}

/// `(language, name)` pairs of one feature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultilangNames {
    entries: Vec<(i8, String)>,
}

impl MultilangNames {
    /// Sets or replaces the name for `lang`. Empty names are not stored.
    pub fn add(&mut self, lang: i8, name: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(l, _)| *l != lang);
        if !name.is_empty() {
            self.entries.push((lang, name));
        }
    }

    pub fn get(&self, lang: i8) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| *l == lang)
            .map(|(_, s)| s.as_str())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i8, &str)> + '_ {
        self.entries.iter().map(|(l, s)| (*l, s.as_str()))
    }

    /// Name to show a user whose device language is `device_lang`:
    /// that language, else the default name, else the international one,
    /// else English.
    pub fn readable_name(&self, device_lang: i8) -> Option<&str> {
        [device_lang, DEFAULT_CODE, INTERNATIONAL_CODE, ENGLISH_CODE]
            .into_iter()
            .find_map(|lang| self.get(lang))
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        write_var_u32(out, self.entries.len() as u32);
        for (lang, name) in &self.entries {
            out.push(*lang as u8);
            write_string(out, name);
        }
    }

    pub fn read(src: &mut ArraySource<'_>) -> mwm_coding::Result<Self> {
        let count = src.read_var_u32()? as usize;
        let mut entries = Vec::with_capacity(count.min(LANGUAGES.len()));
        for _ in 0..count {
            let lang = src.read_i8()?;
            let name = src.read_string()?.to_owned();
            entries.push((lang, name));
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_table_lookups() {
        assert_eq!(lang_index("default"), Some(DEFAULT_CODE));
        assert_eq!(lang_index("int_name"), Some(INTERNATIONAL_CODE));
        assert_eq!(lang_index("en"), Some(ENGLISH_CODE));
        assert_eq!(lang_code(6), Some("de"));
        assert_eq!(lang_code(-1), None);
        assert_eq!(lang_index("xx"), None);
    }

    #[test]
    fn readable_name_priority() {
        let de = lang_index("de").unwrap();
        let mut names = MultilangNames::default();
        names.add(ENGLISH_CODE, "Main Street");
        assert_eq!(names.readable_name(de), Some("Main Street"));
        names.add(INTERNATIONAL_CODE, "Main St");
        assert_eq!(names.readable_name(de), Some("Main St"));
        names.add(DEFAULT_CODE, "Hauptstrasse");
        assert_eq!(names.readable_name(de), Some("Hauptstrasse"));
        names.add(de, "Hauptstraße");
        assert_eq!(names.readable_name(de), Some("Hauptstraße"));
        assert_eq!(MultilangNames::default().readable_name(de), None);
    }

    #[test]
    fn add_replaces_and_skips_empty() {
        let mut names = MultilangNames::default();
        names.add(DEFAULT_CODE, "a");
        names.add(DEFAULT_CODE, "b");
        names.add(ENGLISH_CODE, "");
        assert_eq!(names.len(), 1);
        assert_eq!(names.get(DEFAULT_CODE), Some("b"));
    }

    #[test]
    fn reads_what_it_writes() {
        let mut names = MultilangNames::default();
        names.add(DEFAULT_CODE, "Москва");
        names.add(ENGLISH_CODE, "Moscow");
        let mut buf = Vec::new();
        names.write(&mut buf);
        let back = MultilangNames::read(&mut ArraySource::new(&buf)).unwrap();
        assert_eq!(back, names);
    }
}

//! Corpus document model
//!
//! Input JSON comes in three shapes: a single work object, a list of work
//! objects, or `{"books": [...]}`. Field names vary between sources, so each
//! semantic slot accepts an ordered list of aliases and the first present,
//! non-empty value wins. Keys that belong to no slot are kept in `extra` and
//! written back out by `to_value`.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{CorpusError, Result};

pub const WORK_TITLE_KEYS: &[&str] = &["title", "short", "name"];
pub const WORK_TYPE_KEYS: &[&str] = &["type"];
pub const WORK_TITLE_SA_KEYS: &[&str] = &["title_sa", "sanskrit_title"];
pub const CHAPTER_LABEL_KEYS: &[&str] = &["title", "label"];
pub const NUMBER_KEYS: &[&str] = &["number"];
pub const REF_KEYS: &[&str] = &["ref"];
pub const DEVANAGARI_KEYS: &[&str] = &[
    "devanagari",
    "deva",
    "sanskrit",
    "sa_deva",
    "saDeva",
    "sa_devanagari",
];
pub const IAST_KEYS: &[&str] = &[
    "iast",
    "sa_iast",
    "roman",
    "transliteration",
    "latn",
    "latin",
];
pub const ENGLISH_KEYS: &[&str] = &["translation", "english", "en"];
pub const SURFACE_KEYS: &[&str] = &["sanskrit", "surface", "word", "sa", "deva"];
pub const GLOSS_KEYS: &[&str] = &["english", "gloss", "en", "meaning"];

const BOOKS_KEY: &str = "books";
const CHAPTERS_KEY: &str = "chapters";
const VERSES_KEY: &str = "verses";
const WORD_BY_WORD_KEY: &str = "word_by_word";

/// First alias whose value is present: not null, not `""`, not `[]`
pub fn first_key<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| map.get(*k)).find(|v| is_present(v))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => true,
    }
}

/// Alias that supplied the slot's value
fn winning_key(map: &Map<String, Value>, keys: &[&'static str]) -> Option<&'static str> {
    keys.iter()
        .copied()
        .find(|k| map.get(*k).map_or(false, is_present))
}

/// The winning alias, but only when its value was actually used
fn claim(map: &Map<String, Value>, keys: &[&'static str], used: bool) -> Option<&'static str> {
    if used {
        winning_key(map, keys)
    } else {
        None
    }
}

fn first_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_key(map, keys).and_then(value_to_text)
}

/// Text slots accept strings, numbers, and lists of strings (joined by lines)
fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let lines: Vec<&str> = items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .collect();
            if lines.is_empty() {
                None
            } else {
                Some(lines.join("\n"))
            }
        }
        _ => None,
    }
}

fn first_number(map: &Map<String, Value>, keys: &[&str]) -> std::result::Result<Option<i64>, String> {
    let Some(value) = first_key(map, keys) else {
        return Ok(None);
    };
    match value {
        // a literal 0 counts as absent, like `false`
        Value::Number(n) if n.as_f64() == Some(0.0) => Ok(None),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Some(i))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 => Ok(Some(f as i64)),
                    _ => Err(format!("number {} is not an integer", n)),
                }
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("number '{}' is not an integer", s)),
        Value::Bool(false) => Ok(None),
        other => Err(format!("unsupported number value: {}", other)),
    }
}

/// Every key except the ones whose values were taken into typed fields.
/// Losing aliases stay here so they survive `to_value`.
fn extension(map: &Map<String, Value>, claimed: &[Option<&str>]) -> Map<String, Value> {
    map.iter()
        .filter(|(k, _)| !claimed.iter().flatten().any(|c| *c == k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn object_list<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    what: &str,
) -> std::result::Result<Vec<&'a Map<String, Value>>, String> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_object()
                    .ok_or_else(|| format!("{} #{} is not an object", what, i + 1))
            })
            .collect(),
        Some(_) => Err(format!("'{}' must be a list", key)),
    }
}

/// One word-by-word entry of a verse
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordDoc {
    pub surface: Option<String>,
    pub glosses: Vec<String>,
    pub extra: Map<String, Value>,
}

impl WordDoc {
    fn from_map(map: &Map<String, Value>) -> Self {
        let surface = first_text(map, SURFACE_KEYS);
        let glosses = match first_key(map, GLOSS_KEYS) {
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        };
        let extra = extension(
            map,
            &[
                claim(map, SURFACE_KEYS, surface.is_some()),
                claim(map, GLOSS_KEYS, !glosses.is_empty()),
            ],
        );
        Self {
            surface,
            glosses,
            extra,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        if let Some(surface) = &self.surface {
            map.insert("sanskrit".into(), Value::String(surface.clone()));
        }
        match self.glosses.as_slice() {
            [] => {}
            [one] => {
                map.insert("english".into(), Value::String(one.clone()));
            }
            many => {
                map.insert(
                    "english".into(),
                    Value::Array(many.iter().cloned().map(Value::String).collect()),
                );
            }
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerseDoc {
    pub number: Option<i64>,
    pub reference: Option<String>,
    pub devanagari: Option<String>,
    pub iast: Option<String>,
    pub translation: Option<String>,
    pub word_by_word: Vec<WordDoc>,
    pub extra: Map<String, Value>,
}

impl VerseDoc {
    fn from_map(map: &Map<String, Value>) -> std::result::Result<Self, String> {
        let words = object_list(map, WORD_BY_WORD_KEY, "word_by_word entry")?
            .into_iter()
            .map(WordDoc::from_map)
            .collect();
        let number = first_number(map, NUMBER_KEYS)?;
        let reference = first_text(map, REF_KEYS);
        let devanagari = first_text(map, DEVANAGARI_KEYS);
        let iast = first_text(map, IAST_KEYS);
        let translation = first_text(map, ENGLISH_KEYS);
        let extra = extension(
            map,
            &[
                claim(map, NUMBER_KEYS, number.is_some()),
                claim(map, REF_KEYS, reference.is_some()),
                claim(map, DEVANAGARI_KEYS, devanagari.is_some()),
                claim(map, IAST_KEYS, iast.is_some()),
                claim(map, ENGLISH_KEYS, translation.is_some()),
                Some(WORD_BY_WORD_KEY),
            ],
        );
        Ok(Self {
            number,
            reference,
            devanagari,
            iast,
            translation,
            word_by_word: words,
            extra,
        })
    }

    pub fn has_text(&self) -> bool {
        self.devanagari.is_some() || self.iast.is_some() || self.translation.is_some()
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        if let Some(n) = self.number {
            map.insert("number".into(), Value::from(n));
        }
        let slots = [
            ("ref", &self.reference),
            ("devanagari", &self.devanagari),
            ("iast", &self.iast),
            ("translation", &self.translation),
        ];
        for (key, value) in slots {
            if let Some(v) = value {
                map.insert(key.into(), Value::String(v.clone()));
            }
        }
        if !self.word_by_word.is_empty() {
            map.insert(
                WORD_BY_WORD_KEY.into(),
                Value::Array(self.word_by_word.iter().map(WordDoc::to_value).collect()),
            );
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterDoc {
    pub number: Option<i64>,
    pub label: Option<String>,
    pub verses: Vec<VerseDoc>,
    pub extra: Map<String, Value>,
}

impl ChapterDoc {
    fn from_map(map: &Map<String, Value>) -> std::result::Result<Self, String> {
        let verses = object_list(map, VERSES_KEY, "verse")?
            .into_iter()
            .enumerate()
            .map(|(i, v)| VerseDoc::from_map(v).map_err(|e| format!("verse #{}: {}", i + 1, e)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let number = first_number(map, NUMBER_KEYS)?;
        let label = first_text(map, CHAPTER_LABEL_KEYS);
        let extra = extension(
            map,
            &[
                claim(map, NUMBER_KEYS, number.is_some()),
                claim(map, CHAPTER_LABEL_KEYS, label.is_some()),
                Some(VERSES_KEY),
            ],
        );
        Ok(Self {
            number,
            label,
            verses,
            extra,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        if let Some(n) = self.number {
            map.insert("number".into(), Value::from(n));
        }
        if let Some(label) = &self.label {
            map.insert("title".into(), Value::String(label.clone()));
        }
        map.insert(
            VERSES_KEY.into(),
            Value::Array(self.verses.iter().map(VerseDoc::to_value).collect()),
        );
        Value::Object(map)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkDoc {
    pub title: Option<String>,
    pub work_type: Option<String>,
    pub title_sa: Option<String>,
    pub chapters: Vec<ChapterDoc>,
    pub extra: Map<String, Value>,
}

impl WorkDoc {
    /// An object is a work when it names itself or carries chapters
    fn looks_like_work(map: &Map<String, Value>) -> bool {
        map.contains_key(CHAPTERS_KEY) || first_key(map, WORK_TITLE_KEYS).is_some()
    }

    fn from_map(map: &Map<String, Value>) -> std::result::Result<Self, String> {
        let chapters = object_list(map, CHAPTERS_KEY, "chapter")?
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                ChapterDoc::from_map(c).map_err(|e| format!("chapter #{}: {}", i + 1, e))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let title = first_text(map, WORK_TITLE_KEYS);
        let work_type = first_text(map, WORK_TYPE_KEYS);
        let title_sa = first_text(map, WORK_TITLE_SA_KEYS);
        let extra = extension(
            map,
            &[
                claim(map, WORK_TITLE_KEYS, title.is_some()),
                claim(map, WORK_TYPE_KEYS, work_type.is_some()),
                claim(map, WORK_TITLE_SA_KEYS, title_sa.is_some()),
                Some(CHAPTERS_KEY),
            ],
        );
        Ok(Self {
            title,
            work_type,
            title_sa,
            chapters,
            extra,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        if let Some(title) = &self.title {
            map.insert("title".into(), Value::String(title.clone()));
        }
        if let Some(t) = &self.work_type {
            map.insert("type".into(), Value::String(t.clone()));
        }
        if let Some(t) = &self.title_sa {
            map.insert("title_sa".into(), Value::String(t.clone()));
        }
        map.insert(
            CHAPTERS_KEY.into(),
            Value::Array(self.chapters.iter().map(ChapterDoc::to_value).collect()),
        );
        Value::Object(map)
    }
}

/// The three accepted top-level shapes
#[derive(Debug, Clone, PartialEq)]
pub enum CorpusDocument {
    Work(WorkDoc),
    List(Vec<WorkDoc>),
    Books {
        books: Vec<WorkDoc>,
        extra: Map<String, Value>,
    },
}

impl CorpusDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| CorpusError::structural(path, format!("invalid JSON: {}", e)))?;
        Self::from_value(&value, path)
    }

    pub fn from_value(value: &Value, origin: &Path) -> Result<Self> {
        Self::parse(value).map_err(|message| CorpusError::structural(origin, message))
    }

    fn parse(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Array(items) => Ok(CorpusDocument::List(parse_works(items)?)),
            Value::Object(map) if map.contains_key(BOOKS_KEY) => match &map[BOOKS_KEY] {
                Value::Array(items) => Ok(CorpusDocument::Books {
                    books: parse_works(items)?,
                    extra: extension(map, &[Some(BOOKS_KEY)]),
                }),
                _ => Err("'books' must be a list of works".to_string()),
            },
            Value::Object(map) if WorkDoc::looks_like_work(map) => {
                Ok(CorpusDocument::Work(WorkDoc::from_map(map)?))
            }
            Value::Object(_) => {
                Err("object is neither a work nor a {\"books\": [...]} wrapper".to_string())
            }
            other => Err(format!(
                "expected a work object, a list, or {{\"books\": [...]}}, found {}",
                json_kind(other)
            )),
        }
    }

    pub fn works(&self) -> &[WorkDoc] {
        match self {
            CorpusDocument::Work(w) => std::slice::from_ref(w),
            CorpusDocument::List(ws) => ws,
            CorpusDocument::Books { books, .. } => books,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            CorpusDocument::Work(w) => w.to_value(),
            CorpusDocument::List(ws) => Value::Array(ws.iter().map(WorkDoc::to_value).collect()),
            CorpusDocument::Books { books, extra } => {
                let mut map = extra.clone();
                map.insert(
                    BOOKS_KEY.into(),
                    Value::Array(books.iter().map(WorkDoc::to_value).collect()),
                );
                Value::Object(map)
            }
        }
    }
}

fn parse_works(items: &[Value]) -> std::result::Result<Vec<WorkDoc>, String> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => {
                WorkDoc::from_map(map).map_err(|e| format!("work #{}: {}", i + 1, e))
            }
            other => Err(format!("work #{} is {}, not an object", i + 1, json_kind(other))),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

//! Structured screenplay documents.
//!
//! Scripts arrive as JSON produced by an external screenplay parser:
//!
//! ```json
//! {"head": {"Title": "Pilot"},
//!  "scenes": [{"title": "INT. KITCHEN",
//!              "lines": [{"speaker": "ANNA", "text": "你好，世界。"}]}]}
//! ```
//!
//! Dialogue text is split into phrase tokens on CJK and ASCII punctuation.
//! Entries without a speaker (action, description) are not kept because
//! there is no track to align them against.

use crate::error::Result;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const UNTITLED: &str = "untitled";

/// Full-width punctuation that separates phrases in CJK dialogue.
const CJK_DELIMITERS: &[char] = &[
    '。', '；', '，', '：', '“', '”', '（', '）', '、', '？', '《', '》', '！', '…',
];

#[derive(Debug, Deserialize)]
struct RawScript {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    head: BTreeMap<String, String>,
    #[serde(default)]
    scenes: Vec<RawScene>,
}

#[derive(Debug, Deserialize)]
struct RawScene {
    #[serde(default)]
    title: String,
    #[serde(default)]
    lines: Vec<RawLine>,
}

#[derive(Debug, Deserialize)]
struct RawLine {
    #[serde(default)]
    speaker: Option<String>,
    #[serde(default)]
    text: String,
}

/// One line of dialogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Position in script order, starting at zero.
    pub id: usize,
    /// Index of the scene the line belongs to.
    pub scene: usize,
    pub speaker: String,
    pub tokens: Vec<String>,
}

impl Line {
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }
}

/// A parsed script: scenes, speakers and dialogue lines in script order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptDocument {
    pub title: String,
    pub head: BTreeMap<String, String>,
    pub scenes: Vec<String>,
    pub speakers: BTreeSet<String>,
    pub lines: Vec<Line>,
}

impl ScriptDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Parse the JSON shape emitted by the screenplay parser.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawScript = serde_json::from_str(text)?;

        let title = raw
            .title
            .filter(|t| !t.trim().is_empty())
            .or_else(|| raw.head.get("Title").cloned())
            .unwrap_or_else(|| UNTITLED.to_string());

        let mut doc = Self::new(title.trim());
        doc.head = raw.head;
        for scene in raw.scenes {
            let index = doc.push_scene(scene.title.trim());
            for line in scene.lines {
                if let Some(speaker) = line.speaker {
                    doc.push_line(index, &speaker, &line.text);
                }
            }
        }
        Ok(doc)
    }

    /// Read and parse a script JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Append a scene and return its index.
    pub fn push_scene(&mut self, title: &str) -> usize {
        self.scenes.push(title.trim_start_matches('.').to_string());
        self.scenes.len() - 1
    }

    /// Append a dialogue line.
    ///
    /// Returns false when the speaker name or the text is empty after
    /// cleanup; such lines are not kept.
    pub fn push_line(&mut self, scene: usize, speaker: &str, text: &str) -> bool {
        let speaker = clean_speaker(speaker);
        let tokens = split_tokens(text);
        if speaker.is_empty() || tokens.is_empty() {
            return false;
        }
        self.speakers.insert(speaker.clone());
        self.lines.push(Line {
            id: self.lines.len(),
            scene,
            speaker,
            tokens,
        });
        true
    }

    /// Builder-style [`push_line`](Self::push_line) into the last scene.
    pub fn with_line(mut self, speaker: &str, text: &str) -> Self {
        if self.scenes.is_empty() {
            self.push_scene("");
        }
        let scene = self.scenes.len() - 1;
        self.push_line(scene, speaker, text);
        self
    }

    /// Lines spoken by `speaker`, in script order.
    pub fn lines_of<'a>(&'a self, speaker: &'a str) -> impl Iterator<Item = &'a Line> + 'a {
        self.lines.iter().filter(move |l| l.speaker == speaker)
    }

    pub fn line(&self, id: usize) -> Option<&Line> {
        self.lines.get(id)
    }
}

fn clean_speaker(name: &str) -> String {
    name.trim().trim_start_matches('@').trim().to_string()
}

/// Split dialogue into phrase tokens.
pub fn split_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| CJK_DELIMITERS.contains(&c) || (c.is_ascii_punctuation() && c != '\''))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "head": {"Title": "Pilot", "Author": "Someone"},
        "scenes": [
            {"title": ".INT. KITCHEN", "lines": [
                {"speaker": "@ANNA", "text": "你好，世界。"},
                {"text": "She puts the kettle on."},
                {"speaker": "BORIS", "text": "早上好！"}
            ]},
            {"title": "EXT. STREET", "lines": [
                {"speaker": " ANNA ", "text": "Well, let's go."},
                {"speaker": "BORIS", "text": "……"}
            ]}
        ]
    }"#;

    #[test]
    fn test_from_json_keeps_dialogue_in_order() {
        let doc = ScriptDocument::from_json(SAMPLE).unwrap();

        assert_eq!(doc.title, "Pilot");
        assert_eq!(doc.head.get("Author").map(String::as_str), Some("Someone"));
        assert_eq!(doc.scenes, vec!["INT. KITCHEN", "EXT. STREET"]);
        assert_eq!(
            doc.speakers.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["ANNA", "BORIS"]
        );

        assert_eq!(doc.lines.len(), 3);
        assert_eq!(doc.lines[0].speaker, "ANNA");
        assert_eq!(doc.lines[0].tokens, vec!["你好", "世界"]);
        assert_eq!(doc.lines[1].speaker, "BORIS");
        assert_eq!(doc.lines[2].tokens, vec!["Well", "let's go"]);
        assert_eq!(doc.lines[2].scene, 1);
        for (i, line) in doc.lines.iter().enumerate() {
            assert_eq!(line.id, i);
        }
    }

    #[test]
    fn test_explicit_title_wins_over_head() {
        let doc = ScriptDocument::from_json(r#"{"title": "Final", "head": {"Title": "Draft"}}"#)
            .unwrap();
        assert_eq!(doc.title, "Final");
    }

    #[test]
    fn test_missing_title_is_untitled() {
        let doc = ScriptDocument::from_json(r#"{"scenes": []}"#).unwrap();
        assert_eq!(doc.title, "untitled");
        assert!(doc.lines.is_empty());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(ScriptDocument::from_json("{not json").is_err());
        assert!(ScriptDocument::from_json(r#"{"scenes": 3}"#).is_err());
    }

    #[test]
    fn test_split_tokens_on_mixed_punctuation() {
        assert_eq!(split_tokens("你好，我是《小王》。"), vec!["你好", "我是", "小王"]);
        assert_eq!(split_tokens("Wait... what?!"), vec!["Wait", "what"]);
        assert!(split_tokens("。。！").is_empty());
    }

    #[test]
    fn test_builder_and_lines_of() {
        let doc = ScriptDocument::new("t")
            .with_line("A", "one")
            .with_line("B", "two")
            .with_line("A", "three")
            .with_line("", "dropped");

        let ids: Vec<usize> = doc.lines_of("A").map(|l| l.id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(doc.line(1).map(Line::text), Some("two".to_string()));
        assert_eq!(doc.speakers.len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pilot.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let doc = ScriptDocument::load(&path).unwrap();
        assert_eq!(doc.lines.len(), 3);
    }
}

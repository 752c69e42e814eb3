use rand::RngCore;
use serde::{Deserialize, Serialize};

pub fn new_uuid() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    // set version 4 and variant bits
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{}{}{}{}-{}{}-{}{}-{}{}-{}{}{}{}{}{}",
        hex[0], hex[1], hex[2], hex[3], hex[4], hex[5], hex[6], hex[7], hex[8], hex[9], hex[10],
        hex[11], hex[12], hex[13], hex[14], hex[15]
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Real,
    Dummy,
}

/// On-disk credential layout: four independent values.
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct CredentialRecord {
    #[serde(rename = "pin_hash_v2", default, skip_serializing_if = "Option::is_none")]
    pub real_digest: Option<String>,
    #[serde(rename = "pin_length_v2", default, skip_serializing_if = "Option::is_none")]
    pub real_length: Option<usize>,
    #[serde(rename = "dummy_pin_hash_v2", default, skip_serializing_if = "Option::is_none")]
    pub dummy_digest: Option<String>,
    #[serde(rename = "dummy_pin_length_v2", default, skip_serializing_if = "Option::is_none")]
    pub dummy_length: Option<usize>,
}

/// Decoy notes; stored in plaintext.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Note {
    #[serde(default = "new_uuid")]
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub updated_at: u64,
}

#[derive(Serialize, Deserialize, Default, Debug)]
pub struct NoteBook {
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl NoteBook {
    /// Most recently edited first.
    pub fn sort_newest_first(&mut self) {
        self.notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }

    /// Removes the note at `idx`. A book is never left empty: removing the
    /// last note leaves a blank "Untitled" one in its place.
    pub fn remove(&mut self, idx: usize, now: u64) -> Option<Note> {
        if idx >= self.notes.len() {
            return None;
        }
        let removed = self.notes.remove(idx);
        if self.notes.is_empty() {
            self.notes.push(Note {
                id: new_uuid(),
                title: "Untitled".to_string(),
                content: String::new(),
                updated_at: now,
            });
        }
        Some(removed)
    }

    /// Case-insensitive match on title or content; empty query matches all.
    pub fn search(&self, query: &str) -> Vec<usize> {
        let q = query.trim().to_lowercase();
        self.notes
            .iter()
            .enumerate()
            .filter(|(_, n)| {
                q.is_empty()
                    || n.title.to_lowercase().contains(&q)
                    || n.content.to_lowercase().contains(&q)
            })
            .map(|(idx, _)| idx)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_has_v4_shape() {
        let id = new_uuid();
        assert_eq!(id.len(), 36);
        assert_eq!(&id[14..15], "4");
    }

    #[test]
    fn record_uses_stable_keys() {
        let rec = CredentialRecord {
            real_digest: Some("abc".into()),
            real_length: Some(4),
            dummy_digest: None,
            dummy_length: None,
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["pin_hash_v2"], "abc");
        assert_eq!(json["pin_length_v2"], 4);
        assert!(json.get("dummy_pin_hash_v2").is_none());
    }

    fn note(title: &str, updated_at: u64) -> Note {
        Note { id: new_uuid(), title: title.into(), content: String::new(), updated_at }
    }

    #[test]
    fn sorts_newest_first() {
        let mut book = NoteBook { notes: vec![note("old", 1), note("new", 9), note("mid", 5)] };
        book.sort_newest_first();
        let titles: Vec<&str> = book.notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
    }

    #[test]
    fn removing_last_note_leaves_untitled() {
        let mut book = NoteBook { notes: vec![note("a", 1), note("b", 2)] };
        assert_eq!(book.remove(0, 10).map(|n| n.title), Some("a".to_string()));
        assert_eq!(book.notes.len(), 1);
        assert!(book.remove(5, 10).is_none());

        book.remove(0, 10);
        assert_eq!(book.notes.len(), 1);
        assert_eq!(book.notes[0].title, "Untitled");
        assert_eq!(book.notes[0].updated_at, 10);
        assert!(book.notes[0].content.is_empty());
    }

    #[test]
    fn search_filters_by_title_and_content() {
        let book = NoteBook {
            notes: vec![
                Note { id: new_uuid(), title: "Groceries".into(), content: "milk".into(), updated_at: 0 },
                Note { id: new_uuid(), title: "Homework".into(), content: "Due Wednesday".into(), updated_at: 0 },
            ],
        };
        assert_eq!(book.search(""), vec![0, 1]);
        assert_eq!(book.search("MILK"), vec![0]);
        assert_eq!(book.search("wednesday"), vec![1]);
        assert!(book.search("nothing").is_empty());
    }
}

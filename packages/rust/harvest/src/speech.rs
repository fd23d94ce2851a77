//! Multi-schema speech extraction.
//!
//! Story payloads come in several shapes: flat `{"dialogue": [...]}` lists,
//! nested `{"chapters": [{"scenes": [...]}]}` trees, or any mix of the two.
//! The extractor walks known container keys and reads speech records from
//! known list keys, in a fixed order, until the per-story cap is reached.

use serde_json::{Map, Value};

use akdata_shared::{Chapter, Scene, Speech};

/// Keys holding a list of speech records.
const SPEECH_LIST_KEYS: &[&str] = &["speeches", "content", "dialogue", "talk"];

/// Keys holding the speaker inside a speech record.
const SPEAKER_KEYS: &[&str] = &["speaker", "actor", "name", "char"];

/// Keys holding the spoken line inside a speech record.
const LINE_KEYS: &[&str] = &["text", "content", "line"];

/// Keys holding nested story structure (single object or list).
const CONTAINER_KEYS: &[&str] = &[
    "story", "stories", "chapters", "chapter", "scenes", "sections", "parts", "nodes", "lines",
];

/// Keys checked for a story's display title.
const TITLE_KEYS: &[&str] = &["title", "name", "storyName"];

/// Extract up to `cap` speeches from `payload`, in traversal order.
pub fn extract_speeches(payload: &Value, cap: usize) -> Vec<Speech> {
    let mut out = Vec::new();
    walk(payload, cap, &mut out);
    out
}

fn walk(value: &Value, cap: usize, out: &mut Vec<Speech>) {
    if out.len() >= cap {
        return;
    }

    match value {
        Value::Array(items) => {
            for item in items {
                walk(item, cap, out);
                if out.len() >= cap {
                    return;
                }
            }
        }
        Value::Object(map) => {
            for key in SPEECH_LIST_KEYS {
                let Some(Value::Array(records)) = map.get(*key) else {
                    continue;
                };
                for record in records {
                    if out.len() >= cap {
                        return;
                    }
                    if let Some(speech) = speech_from_record(record) {
                        out.push(speech);
                    }
                }
            }

            for key in CONTAINER_KEYS {
                match map.get(*key) {
                    Some(child @ (Value::Object(_) | Value::Array(_))) => walk(child, cap, out),
                    _ => continue,
                }
                if out.len() >= cap {
                    return;
                }
            }
        }
        _ => {}
    }
}

/// Read one speech record; both speaker and line must be non-blank.
fn speech_from_record(record: &Value) -> Option<Speech> {
    let map = record.as_object()?;
    let speaker = first_non_blank(map, SPEAKER_KEYS)?;
    let text = first_non_blank(map, LINE_KEYS)?;
    Some(Speech::new(speaker, text))
}

fn first_non_blank<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim()),
        _ => None,
    })
}

/// The payload's own title, if it declares one.
pub fn payload_title(payload: &Value) -> Option<String> {
    let map = payload.as_object()?;
    first_non_blank(map, TITLE_KEYS).map(str::to_string)
}

/// Build the persisted chapter list for one story payload.
///
/// A payload that already spells out `chapters[].scenes[]` keeps that
/// structure. Anything else is flattened into a single chapter holding a
/// single scene. The `cap` is shared across the whole story.
pub fn build_chapters(payload: &Value, story_title: &str, cap: usize) -> Vec<Chapter> {
    if let Some(chapters) = explicit_chapters(payload) {
        let mut remaining = cap;
        let mut out = Vec::with_capacity(chapters.len());

        for (i, chapter) in chapters.iter().enumerate() {
            let title = payload_title(chapter).unwrap_or_else(|| format!("Chapter {}", i + 1));
            let scenes = chapter
                .get("scenes")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let mut built = Vec::with_capacity(scenes.len());
            for scene in scenes {
                let speeches = extract_speeches(scene, remaining);
                remaining -= speeches.len();
                built.push(Scene {
                    title: payload_title(scene).unwrap_or_default(),
                    speeches,
                });
            }
            out.push(Chapter {
                title,
                scenes: built,
            });
        }
        return out;
    }

    vec![single_scene_chapter(story_title, extract_speeches(payload, cap))]
}

/// Wrap a flat speech list into the one-chapter, one-scene shape.
pub fn single_scene_chapter(title: &str, speeches: Vec<Speech>) -> Chapter {
    Chapter {
        title: title.to_string(),
        scenes: vec![Scene {
            title: String::new(),
            speeches,
        }],
    }
}

/// `chapters` is a non-empty list whose every element carries a `scenes` list.
fn explicit_chapters(payload: &Value) -> Option<&Vec<Value>> {
    let chapters = payload.get("chapters")?.as_array()?;
    let all_structured = !chapters.is_empty()
        && chapters
            .iter()
            .all(|c| matches!(c.get("scenes"), Some(Value::Array(_))));
    all_structured.then_some(chapters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dialogue_list_with_actor() {
        let payload = json!({"dialogue": [{"actor": "A", "text": "hi"}]});
        assert_eq!(extract_speeches(&payload, 10), vec![Speech::new("A", "hi")]);
    }

    #[test]
    fn record_missing_a_field_is_dropped() {
        let payload = json!({"speeches": [
            {"speaker": "A"},
            {"text": "orphan line"},
            {"speaker": "  ", "text": "blank speaker"},
            {"speaker": "B", "line": "   "}
        ]});
        assert!(extract_speeches(&payload, 10).is_empty());
    }

    #[test]
    fn alternate_field_names_and_trimming() {
        let payload = json!({"talk": [
            {"char": " Kal'tsit ", "content": " Listen. "},
            {"name": "Amiya", "line": "Doctor?"}
        ]});
        assert_eq!(
            extract_speeches(&payload, 10),
            vec![Speech::new("Kal'tsit", "Listen."), Speech::new("Amiya", "Doctor?")]
        );
    }

    #[test]
    fn string_content_is_not_a_speech_list() {
        let payload = json!({"content": "narration only", "name": "Prologue"});
        assert!(extract_speeches(&payload, 10).is_empty());
    }

    #[test]
    fn nested_containers_are_walked_in_order() {
        let payload = json!({
            "story": {
                "chapters": [
                    {"scenes": [{"speeches": [{"speaker": "A", "text": "1"}]}]},
                    {"sections": {"nodes": [{"dialogue": [{"actor": "B", "text": "2"}]}]}}
                ]
            },
            "lines": [{"talk": [{"speaker": "C", "text": "3"}]}]
        });
        let texts: Vec<_> = extract_speeches(&payload, 100)
            .into_iter()
            .map(|s| s.text)
            .collect();
        assert_eq!(texts, ["1", "2", "3"]);
    }

    #[test]
    fn top_level_list_is_walked() {
        let payload = json!([
            {"speeches": [{"speaker": "A", "text": "x"}]},
            {"speeches": [{"speaker": "B", "text": "y"}]}
        ]);
        assert_eq!(extract_speeches(&payload, 10).len(), 2);
    }

    #[test]
    fn cap_bounds_output() {
        let records: Vec<_> = (0..50)
            .map(|i| json!({"speaker": "A", "text": format!("line {i}")}))
            .collect();
        let payload = json!({
            "speeches": records.clone(),
            "chapters": [{"dialogue": records}]
        });
        assert_eq!(extract_speeches(&payload, 30).len(), 30);
        assert_eq!(extract_speeches(&payload, 75).len(), 75);
        assert_eq!(extract_speeches(&payload, 1000).len(), 100);
        assert!(extract_speeches(&payload, 0).is_empty());
    }

    #[test]
    fn flat_payload_builds_one_chapter_one_scene() {
        let payload = json!({"title": "Act 1", "dialogue": [{"actor": "A", "text": "hi"}]});
        let chapters = build_chapters(&payload, "Act 1", 10);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Act 1");
        assert_eq!(chapters[0].scenes.len(), 1);
        assert_eq!(chapters[0].scenes[0].speeches, vec![Speech::new("A", "hi")]);
    }

    #[test]
    fn explicit_structure_is_preserved_with_shared_cap() {
        let payload = json!({"chapters": [
            {"title": "One", "scenes": [
                {"title": "a", "speeches": [{"speaker": "A", "text": "1"}, {"speaker": "A", "text": "2"}]},
                {"speeches": [{"speaker": "B", "text": "3"}]}
            ]},
            {"scenes": [{"speeches": [{"speaker": "C", "text": "4"}]}]}
        ]});
        let chapters = build_chapters(&payload, "ignored", 3);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "One");
        assert_eq!(chapters[1].title, "Chapter 2");
        assert_eq!(chapters[0].scenes[0].title, "a");
        assert_eq!(chapters[0].scenes[0].speeches.len(), 2);
        assert_eq!(chapters[0].scenes[1].speeches.len(), 1);
        assert!(chapters[1].scenes[0].speeches.is_empty());
    }

    #[test]
    fn partially_structured_chapters_are_flattened() {
        let payload = json!({"chapters": [
            {"scenes": [{"speeches": [{"speaker": "A", "text": "1"}]}]},
            {"dialogue": [{"actor": "B", "text": "2"}]}
        ]});
        let chapters = build_chapters(&payload, "Flat", 10);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].scenes[0].speeches.len(), 2);
    }

    #[test]
    fn title_key_order() {
        assert_eq!(payload_title(&json!({"storyName": "S", "name": "N"})), Some("N".into()));
        assert_eq!(payload_title(&json!({"title": " "})), None);
        assert_eq!(payload_title(&json!("not an object")), None);
    }
}

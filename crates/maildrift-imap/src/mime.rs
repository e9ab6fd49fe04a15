//! Traversal helpers over reshaped BODYSTRUCTURE trees.
//!
//! These answer the three questions mail clients ask of a structure: where
//! is the displayable text, which parts do `cid:` references resolve to,
//! and which node does a dotted part number address.

use std::collections::{BTreeMap, VecDeque};

use crate::parser::BodyPart;

/// Subtypes of `text/*` that qualify as displayable body text, in collapse
/// priority order. `html` is kept independently of the plain family.
const PLAIN_FAMILY: [&str; 4] = ["plain", "text", "enriched", "calendar"];

/// Locates the primary text parts of a structure.
///
/// Breadth-first walk collecting the first acceptable `text/*` leaf per
/// subtype. Parts marked as attachments (or inline with a filename) are
/// skipped; `multipart/alternative` and `multipart/signed` children are
/// examined ahead of their siblings. The result holds at most one
/// plain-family entry (first of plain/text/enriched/calendar wins) plus,
/// independently, the `html` part if any.
#[must_use]
pub fn find_text_part(structure: &BodyPart) -> BTreeMap<String, &BodyPart> {
    let mut found: BTreeMap<&str, &BodyPart> = BTreeMap::new();
    let mut queue: VecDeque<&BodyPart> = VecDeque::new();
    queue.push_back(structure);

    while let Some(part) = queue.pop_front() {
        if part.is_multipart() {
            if part.subtype == "alternative" || part.subtype == "signed" {
                // Alternatives outrank siblings: examine them next
                for sub in part.subparts.iter().rev() {
                    queue.push_front(sub);
                }
            } else {
                for sub in &part.subparts {
                    queue.push_back(sub);
                }
            }
            continue;
        }

        if part.kind != "text" || part.is_attachment() {
            continue;
        }
        let subtype = part.subtype.as_str();
        if subtype != "html" && !PLAIN_FAMILY.contains(&subtype) {
            continue;
        }

        // An empty earlier candidate yields to a non-empty later one
        let replace = match found.get(subtype) {
            None => true,
            Some(existing) => existing.size.unwrap_or(0) == 0 && part.size.unwrap_or(0) > 0,
        };
        if replace {
            found.insert(subtype, part);
        }
    }

    let mut result = BTreeMap::new();
    for family in PLAIN_FAMILY {
        if let Some(part) = found.get(family) {
            result.insert(family.to_string(), *part);
            break;
        }
    }
    if let Some(part) = found.get("html") {
        result.insert("html".to_string(), *part);
    }
    result
}

/// Maps Content-IDs (angle brackets stripped) to their structure nodes.
///
/// Multiparts recurse into their sub-parts; leaves without a Content-ID are
/// skipped. The first part carrying a given id wins.
#[must_use]
pub fn build_cid_map(structure: &BodyPart) -> BTreeMap<String, &BodyPart> {
    let mut map = BTreeMap::new();
    let mut stack = vec![structure];

    while let Some(part) = stack.pop() {
        for sub in &part.subparts {
            stack.push(sub);
        }

        if part.is_multipart() {
            continue;
        }
        if let Some(cid) = &part.content_id {
            let key = cid
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string();
            map.entry(key).or_insert(part);
        }
    }

    map
}

/// Resolves a dotted part number to its node, descending through sub-part
/// arrays and embedded message bodies.
#[must_use]
pub fn get_body_part<'a>(structure: &'a BodyPart, number: &str) -> Option<&'a BodyPart> {
    let mut stack = vec![structure];

    while let Some(part) = stack.pop() {
        if part.part_number == number {
            return Some(part);
        }
        for sub in &part.subparts {
            stack.push(sub);
        }
        if let Some(message) = &part.message {
            stack.push(&message.body);
        }
    }

    None
}

use std::ops::Range;

use crate::{strip_rating_suffix, EnrichConfig};

// === Page model ===
// Headless stand-in for the host schedule page. Parsing splits the raw HTML
// into untouched segments plus instructor slots; rendering splices mutated
// slots back in place. The tool only mutates slots, never creates or removes
// nodes, so everything outside a slot round-trips byte for byte.

pub(crate) type NodeId = usize;

/// Attributes owned by the enrichment pass. Parsed out of existing markup on
/// load (so idempotence survives re-annotating our own output) and rebuilt on
/// render; everything else is carried through untouched.
const ATTR_PROCESSED: &str = "data-rating-processed";
const ATTR_FORCE: &str = "data-rating-force";

#[derive(Debug, Clone)]
pub(crate) struct InstructorSlot {
    pub(crate) text: String,
    pub(crate) shade: Option<String>,
    pub(crate) profile_url: Option<String>,
    pub(crate) processed: bool,
    pub(crate) force_reprocess: bool,
    /// Original attributes minus the managed ones, in source order.
    extra_attrs: Vec<(String, String)>,
    /// Whether this slot sits inside the observed anchor subtree.
    in_anchor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MutationRecord {
    /// In-place edit of one instructor slot (text, style, or data markers).
    SlotEdit(NodeId),
    /// A change somewhere in the observed subtree that is not one of our own
    /// slot edits, e.g. the host re-rendering the page.
    Subtree,
}

enum Chunk {
    Raw(String),
    Slot(NodeId),
}

pub(crate) struct SchedulePage {
    chunks: Vec<Chunk>,
    slots: Vec<InstructorSlot>,
    anchor_present: bool,
    observer_attached: bool,
    pending: Vec<MutationRecord>,
    slot_class: String,
    slot_title: String,
    anchor_id: String,
}

impl SchedulePage {
    pub(crate) fn parse(html: &str, cfg: &EnrichConfig) -> SchedulePage {
        let mut page = SchedulePage {
            chunks: Vec::new(),
            slots: Vec::new(),
            anchor_present: false,
            observer_attached: false,
            pending: Vec::new(),
            slot_class: cfg.slot_class.clone(),
            slot_title: cfg.slot_title.clone(),
            anchor_id: cfg.anchor_id.clone(),
        };
        page.ingest(html);
        page
    }

    /// Replace the page content with a fresh parse of `html`, carrying over
    /// enrichment state for slots that are unchanged (same position, same base
    /// name, already processed). Used when the host page re-renders. Counts as
    /// a subtree mutation if an observer is watching. Returns the node ids
    /// whose state was carried over.
    pub(crate) fn reload(&mut self, html: &str) -> Vec<NodeId> {
        let old_slots = std::mem::take(&mut self.slots);
        self.chunks.clear();
        self.anchor_present = false;
        self.ingest(html);

        let mut carried = Vec::new();
        for (id, slot) in self.slots.iter_mut().enumerate() {
            let Some(old) = old_slots.get(id) else { continue };
            if !old.processed {
                continue;
            }
            if strip_rating_suffix(&old.text) != strip_rating_suffix(&slot.text) {
                continue;
            }
            slot.text = old.text.clone();
            slot.shade = old.shade.clone();
            slot.profile_url = old.profile_url.clone();
            slot.processed = true;
            slot.force_reprocess = old.force_reprocess;
            carried.push(id);
        }

        if self.observer_attached {
            self.pending.push(MutationRecord::Subtree);
        }
        carried
    }

    fn ingest(&mut self, html: &str) {
        let anchor_span = find_element_span(html, &self.anchor_id);
        self.anchor_present = anchor_span.is_some();

        let mut cursor = 0usize;
        for (span, raw) in scan_slots(html, &self.slot_class, &self.slot_title) {
            if span.start > cursor {
                self.chunks.push(Chunk::Raw(html[cursor..span.start].to_string()));
            }
            let in_anchor = anchor_span
                .as_ref()
                .is_some_and(|a| span.start >= a.start && span.end <= a.end);
            let id = self.slots.len();
            self.slots.push(slot_from_raw(raw, in_anchor));
            self.chunks.push(Chunk::Slot(id));
            cursor = span.end;
        }
        if cursor < html.len() {
            self.chunks.push(Chunk::Raw(html[cursor..].to_string()));
        }
    }

    pub(crate) fn render(&self) -> String {
        let mut out = String::new();
        for chunk in &self.chunks {
            match chunk {
                Chunk::Raw(raw) => out.push_str(raw),
                Chunk::Slot(id) => render_slot(&mut out, &self.slots[*id]),
            }
        }
        out
    }

    pub(crate) fn slot_ids(&self) -> Vec<NodeId> {
        (0..self.slots.len()).collect()
    }

    pub(crate) fn slot(&self, id: NodeId) -> &InstructorSlot {
        &self.slots[id]
    }

    pub(crate) fn set_slot_text(&mut self, id: NodeId, text: String) {
        self.slots[id].text = text;
        self.record(MutationRecord::SlotEdit(id));
    }

    pub(crate) fn set_slot_shade(&mut self, id: NodeId, shade: Option<String>) {
        self.slots[id].shade = shade;
        self.record(MutationRecord::SlotEdit(id));
    }

    pub(crate) fn set_slot_link(&mut self, id: NodeId, url: Option<String>) {
        self.slots[id].profile_url = url;
        self.record(MutationRecord::SlotEdit(id));
    }

    /// Guaranteed-cleanup marker: set regardless of enrichment outcome, and
    /// always clears any force-reprocess flag.
    pub(crate) fn mark_processed(&mut self, id: NodeId) {
        self.slots[id].processed = true;
        self.slots[id].force_reprocess = false;
        self.record(MutationRecord::SlotEdit(id));
    }

    pub(crate) fn set_force_reprocess(&mut self, id: NodeId, force: bool) {
        self.slots[id].force_reprocess = force;
        self.record(MutationRecord::SlotEdit(id));
    }

    pub(crate) fn anchor_present(&self) -> bool {
        self.anchor_present
    }

    pub(crate) fn anchor_id(&self) -> &str {
        &self.anchor_id
    }

    pub(crate) fn observer_attached(&self) -> bool {
        self.observer_attached
    }

    pub(crate) fn attach_observer(&mut self) -> Result<(), String> {
        if !self.anchor_present {
            return Err(format!("anchor node '{}' not present", self.anchor_id));
        }
        self.observer_attached = true;
        Ok(())
    }

    pub(crate) fn detach_observer(&mut self) {
        self.observer_attached = false;
    }

    pub(crate) fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending)
    }

    fn record(&mut self, mutation: MutationRecord) {
        if !self.observer_attached {
            return;
        }
        let observed = match mutation {
            MutationRecord::SlotEdit(id) => self.slots[id].in_anchor,
            MutationRecord::Subtree => true,
        };
        if observed {
            self.pending.push(mutation);
        }
    }
}

fn slot_from_raw(raw: RawSlot, in_anchor: bool) -> InstructorSlot {
    let mut slot = InstructorSlot {
        text: raw.text,
        shade: None,
        profile_url: None,
        processed: false,
        force_reprocess: false,
        extra_attrs: Vec::new(),
        in_anchor,
    };
    for (name, value) in raw.attrs {
        match name.as_str() {
            "style" => match parse_shade(&value) {
                Some(shade) => slot.shade = Some(shade),
                None => slot.extra_attrs.push((name, value)),
            },
            "onclick" => match parse_profile_url(&value) {
                Some(url) => slot.profile_url = Some(url),
                None => slot.extra_attrs.push((name, value)),
            },
            ATTR_PROCESSED => slot.processed = value == "true",
            ATTR_FORCE => slot.force_reprocess = true,
            _ => slot.extra_attrs.push((name, value)),
        }
    }
    slot
}

fn render_slot(out: &mut String, slot: &InstructorSlot) {
    out.push_str("<div");
    for (name, value) in &slot.extra_attrs {
        if value.is_empty() {
            out.push_str(&format!(" {name}"));
        } else {
            out.push_str(&format!(" {name}=\"{value}\""));
        }
    }
    if let Some(shade) = &slot.shade {
        out.push_str(&format!(" style=\"background-color: {shade};\""));
    }
    if let Some(url) = &slot.profile_url {
        out.push_str(&format!(" onclick=\"window.open('{url}', '_blank')\""));
    }
    if slot.processed {
        out.push_str(&format!(" {ATTR_PROCESSED}=\"true\""));
    }
    if slot.force_reprocess {
        out.push_str(&format!(" {ATTR_FORCE}=\"true\""));
    }
    out.push('>');
    out.push_str(&slot.text);
    out.push_str("</div>");
}

fn parse_shade(style: &str) -> Option<String> {
    let rest = style.trim().strip_prefix("background-color:")?;
    Some(rest.trim_end_matches(';').trim().to_string())
}

fn parse_profile_url(onclick: &str) -> Option<String> {
    let rest = onclick.trim().strip_prefix("window.open('")?;
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}

// ── HTML scanning ────────────────────────────────────────────────────────
// Deliberately narrow: the host renders instructor slots as flat <div>
// elements containing plain text, so a quote-aware tag scan is all the
// parsing this needs.

struct RawSlot {
    attrs: Vec<(String, String)>,
    text: String,
}

/// Find every `<div>` whose class list contains `slot_class` and whose title
/// attribute equals `slot_title`. Returns source spans (open tag through
/// closing `</div>`) in document order.
fn scan_slots(html: &str, slot_class: &str, slot_title: &str) -> Vec<(Range<usize>, RawSlot)> {
    let mut found = Vec::new();
    let mut cursor = 0usize;

    while let Some(off) = html[cursor..].find("<div") {
        let start = cursor + off;
        let after = html.as_bytes().get(start + 4).copied();
        if !matches!(after, Some(b) if b.is_ascii_whitespace() || b == b'>') {
            cursor = start + 4;
            continue;
        }
        let Some(open_end) = find_tag_end(html, start + 4) else {
            break;
        };
        let attrs = parse_attrs(&html[start + 4..open_end]);
        let is_slot = attr_value(&attrs, "class")
            .is_some_and(|c| c.split_whitespace().any(|t| t == slot_class))
            && attr_value(&attrs, "title") == Some(slot_title);
        if !is_slot {
            cursor = open_end + 1;
            continue;
        }
        let Some(close_off) = html[open_end + 1..].find("</div>") else {
            cursor = open_end + 1;
            continue;
        };
        let close_start = open_end + 1 + close_off;
        let end = close_start + "</div>".len();
        let text = html[open_end + 1..close_start].to_string();
        found.push((start..end, RawSlot { attrs, text }));
        cursor = end;
    }
    found
}

/// Index of the `>` terminating an open tag, honoring quoted attribute
/// values.
fn find_tag_end(html: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in html[from..].char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '>') => return Some(from + i),
            (None, _) => {}
        }
    }
    None
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut chars = raw.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() || ch == '/' {
            chars.next();
            continue;
        }
        // attribute name
        let mut name_end = start;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() || c == '=' {
                break;
            }
            name_end = i + c.len_utf8();
            chars.next();
        }
        let name = raw[start..name_end].to_string();
        // optional value
        while chars.peek().is_some_and(|&(_, c)| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_some_and(|&(_, c)| c == '=') {
            chars.next();
            while chars.peek().is_some_and(|&(_, c)| c.is_whitespace()) {
                chars.next();
            }
            let value = match chars.peek().copied() {
                Some((vstart, q)) if q == '"' || q == '\'' => {
                    chars.next();
                    let mut vend = vstart + q.len_utf8();
                    while let Some(&(i, c)) = chars.peek() {
                        chars.next();
                        if c == q {
                            vend = i;
                            break;
                        }
                        vend = i + c.len_utf8();
                    }
                    raw[vstart + q.len_utf8()..vend].to_string()
                }
                Some((vstart, _)) => {
                    let mut vend = vstart;
                    while let Some(&(i, c)) = chars.peek() {
                        if c.is_whitespace() {
                            break;
                        }
                        vend = i + c.len_utf8();
                        chars.next();
                    }
                    raw[vstart..vend].to_string()
                }
                None => String::new(),
            };
            attrs.push((name, value));
        } else {
            attrs.push((name, String::new()));
        }
    }
    attrs
}

fn attr_value<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Source span of the element carrying `id="{dom_id}"`, from its open tag
/// through its matching close tag (same-name nesting respected).
fn find_element_span(html: &str, dom_id: &str) -> Option<Range<usize>> {
    let at = html
        .find(&format!("id=\"{dom_id}\""))
        .or_else(|| html.find(&format!("id='{dom_id}'")))?;
    let tag_start = html[..at].rfind('<')?;
    let name: String = html[tag_start + 1..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if name.is_empty() {
        return None;
    }

    let bytes = html.as_bytes();
    let open = format!("<{name}");
    let close = format!("</{name}");
    let mut depth = 0usize;
    let mut i = tag_start;
    while i < bytes.len() {
        if bytes[i..].starts_with(close.as_bytes()) {
            if depth <= 1 {
                let after = i + close.len();
                let end = html[after..]
                    .find('>')
                    .map(|g| after + g + 1)
                    .unwrap_or(after);
                return Some(tag_start..end);
            }
            depth -= 1;
            i += close.len();
        } else if bytes[i..].starts_with(open.as_bytes())
            && bytes
                .get(i + open.len())
                .is_some_and(|b| b.is_ascii_whitespace() || *b == b'>')
        {
            depth += 1;
            i += open.len();
        } else {
            i += 1;
        }
    }
    None
}

// ── Tests ────────────────────────────────────────────────────────────────

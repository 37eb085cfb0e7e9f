//! LDIF (RFC 2849) rendering of search results.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::Entry;

/// Render `entries` as an LDIF content file, parents before children.
///
/// Attributes are emitted `objectClass` first, then in name order; values
/// that are not SAFE-STRINGs, binary values included, are base64-encoded
/// (`attr:: …`).
pub fn render(entries: &[Entry]) -> String {
    let mut sorted: Vec<&Entry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        depth(a.dn.as_str())
            .cmp(&depth(b.dn.as_str()))
            .then_with(|| a.dn.as_str().cmp(b.dn.as_str()))
    });

    let mut out = String::from("version: 1\n");
    for entry in sorted {
        out.push('\n');
        push_line(&mut out, "dn", entry.dn.as_str().as_bytes());

        let text = entry
            .attributes
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_bytes())));
        let binary = entry
            .binary
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_slice())));
        let mut lines: Vec<(&str, &[u8])> = text.chain(binary).collect();
        lines.sort_by_key(|(name, _)| (!name.eq_ignore_ascii_case("objectClass"), *name));

        for (name, value) in lines {
            push_line(&mut out, name, value);
        }
    }
    out
}

fn push_line(out: &mut String, name: &str, value: &[u8]) {
    match std::str::from_utf8(value) {
        Ok(text) if is_safe(text) => out.push_str(&format!("{name}: {text}\n")),
        _ => out.push_str(&format!("{name}:: {}\n", STANDARD.encode(value))),
    }
}

fn is_safe(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        None => true,
        Some(first) if matches!(first, ' ' | ':' | '<') => false,
        Some(_) => {
            !value.ends_with(' ')
                && value
                    .chars()
                    .all(|c| c.is_ascii() && c != '\0' && c != '\n' && c != '\r')
        }
    }
}

fn depth(dn: &str) -> usize {
    dn.split(',').count()
}

use sha2::{Digest, Sha256};

const MAX_NAME_LEN: usize = 120;

/// Extracts `filename=` from a `Content-Disposition` header value, quotes stripped.
pub fn content_disposition_filename(header: &str) -> Option<String> {
    let (_, rest) = header.split_once("filename=")?;
    let rest = rest.trim_start();
    let value = match rest.strip_prefix('"') {
        // Quoted values may contain `;`.
        Some(quoted) => quoted.split('"').next().unwrap_or(quoted),
        None => rest.split(';').next().unwrap_or(rest),
    };
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Windows-safe file name, keeping the extension when there is one.
pub fn sanitize_filename(input: &str) -> String {
    let mut cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    if cleaned.is_empty() {
        cleaned = "document".to_string();
    }
    // Collapse multiple underscores
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }

    let (stem, extension) = split_extension(&compacted);
    let mut stem = truncate_chars(stem, MAX_NAME_LEN);
    if is_reserved_windows_name(&stem) {
        stem.push('_');
    }
    match extension {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

/// Collision-free name for a document saved next to others: `{stem}--{hash}.{ext}`.
pub fn deterministic_filename(name: &str, envelope_id: &str, document_id: &str) -> String {
    let sanitized = sanitize_filename(name);
    let hash = short_hash(&format!("{envelope_id}/{document_id}"));
    let (stem, extension) = split_extension(&sanitized);
    match extension {
        Some(ext) => format!("{stem}--{hash}.{ext}"),
        None => format!("{stem}--{hash}"),
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 8
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem, Some(ext))
        }
        _ => (name, None),
    }
}

fn truncate_chars(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_quoted_and_bare_filenames() {
        assert_eq!(
            content_disposition_filename("attachment; filename=\"NDA signed.pdf\""),
            Some("NDA signed.pdf".to_string())
        );
        assert_eq!(
            content_disposition_filename("attachment; filename=lease.pdf; size=10"),
            Some("lease.pdf".to_string())
        );
        assert_eq!(
            content_disposition_filename("attachment; filename=\"a;b.pdf\"; size=3"),
            Some("a;b.pdf".to_string())
        );
        assert_eq!(content_disposition_filename("inline"), None);
        assert_eq!(content_disposition_filename("attachment; filename=\"\""), None);
    }

    #[test]
    fn sanitizes_path_separators_and_reserved_names() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("a<b>:c.pdf"), "a_b_c.pdf");
        assert_eq!(sanitize_filename("CON.pdf"), "CON_.pdf");
        assert_eq!(sanitize_filename("   "), "document");
    }

    #[test]
    fn long_names_keep_extension() {
        let long = format!("{}.pdf", "x".repeat(300));
        let sanitized = sanitize_filename(&long);
        assert!(sanitized.ends_with(".pdf"));
        assert_eq!(sanitized.len(), MAX_NAME_LEN + 4);
    }

    #[test]
    fn deterministic_names_differ_per_document() {
        let a = deterministic_filename("contract.pdf", "E1", "1");
        let b = deterministic_filename("contract.pdf", "E1", "2");
        assert_ne!(a, b);
        assert_eq!(a, deterministic_filename("contract.pdf", "E1", "1"));
        assert!(a.starts_with("contract--"));
        assert!(a.ends_with(".pdf"));
    }
}

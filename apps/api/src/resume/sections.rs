//! Section extractor — heuristic splitting of raw résumé text into the
//! labeled spans the system prompt is personalized with.

use serde::{Deserialize, Serialize};

/// Heading synonyms per target label. Scans are independent per label, so
/// out-of-order headings can produce overlapping captures; that is a known
/// limitation of the heuristic, not a bug to fix here.
const EXPERIENCE_HEADINGS: &[&str] = &["experience", "work history", "professional experience"];
const EDUCATION_HEADINGS: &[&str] = &["education", "academic background"];
const PROJECT_HEADINGS: &[&str] = &["projects", "personal projects"];

/// Headings that terminate a capture but are not extracted themselves.
const BOUNDARY_ONLY_HEADINGS: &[&str] = &["skills"];

/// Labeled spans pulled out of a résumé. A missing heading yields an empty
/// field, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeSections {
    pub experience: String,
    pub education: String,
    pub projects: String,
}

/// Extracts the experience / education / projects spans from `text`.
///
/// For each label: find the first case-insensitive occurrence of any of its
/// heading synonyms, then capture from that heading up to (excluding) the
/// next occurrence of any *other* recognized heading, or end of text.
/// Whitespace at span boundaries is trimmed.
pub fn extract_sections(text: &str) -> ResumeSections {
    ResumeSections {
        experience: capture(text, EXPERIENCE_HEADINGS, &[EDUCATION_HEADINGS, PROJECT_HEADINGS]),
        education: capture(text, EDUCATION_HEADINGS, &[EXPERIENCE_HEADINGS, PROJECT_HEADINGS]),
        projects: capture(text, PROJECT_HEADINGS, &[EXPERIENCE_HEADINGS, EDUCATION_HEADINGS]),
    }
}

fn capture(text: &str, own: &[&str], others: &[&[&str]]) -> String {
    // Earliest synonym occurrence wins; ties (e.g. "professional experience"
    // vs the "experience" inside it) resolve to the longer match implicitly
    // because both captures start at the same boundary scan point.
    let Some(start) = own.iter().filter_map(|h| find_ci(text, h, 0)).min() else {
        return String::new();
    };

    let scan_from = start + 1;
    let end = others
        .iter()
        .flat_map(|set| set.iter())
        .chain(BOUNDARY_ONLY_HEADINGS.iter())
        .filter_map(|h| find_ci(text, h, scan_from))
        .min()
        .unwrap_or(text.len());

    text[start..end].trim().to_string()
}

/// ASCII case-insensitive substring search starting at byte offset `from`.
/// Headings are ASCII, so a match can only begin at a character boundary.
fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || from + n.len() > h.len() {
        return None;
    }
    (from..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

//! Page analysis helpers
//!
//! Small, synchronous HTML utilities shared by the processors: title and
//! visible-text extraction, anchor naming, and contact/about link
//! discovery. All functions take raw HTML and return owned strings so no
//! parsed document ever crosses an await point.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};
use url::Url;

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("head > title").unwrap());
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// Title suffixes CMSes commonly tack on, stripped before use.
const TITLE_SUFFIXES: &[&str] = &[
    " - Home",
    " | Home",
    " - Contact",
    " | Contact",
    " - About",
    " | About",
];

/// Anchor texts that are navigation chrome, not a name.
const SKIP_PHRASES: &[&str] = &["skip to", "menu", "navigation", "search", "logo", "home"];

/// A link discovered on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLink {
    pub text: String,
    pub href: String,
}

/// Ensures a URL carries a scheme; bare domains get `https://`.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    }
}

/// Extracts the document title, cleaned of common suffixes.
#[must_use]
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let raw = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>())?;
    let cleaned = clean_title(&raw);
    (!cleaned.is_empty()).then_some(cleaned)
}

fn clean_title(raw: &str) -> String {
    let mut title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    for suffix in TITLE_SUFFIXES {
        if let Some(stripped) = title.strip_suffix(suffix) {
            title = stripped.trim().to_string();
        }
    }
    title
}

/// Collects the page's human-visible text, one line per text node.
#[must_use]
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();
    for node in document.tree.nodes() {
        if let Node::Text(text) = node.value() {
            let hidden = node.ancestors().any(|ancestor| {
                matches!(
                    ancestor.value(),
                    Node::Element(el)
                        if matches!(el.name(), "script" | "style" | "noscript" | "head" | "template")
                )
            });
            if hidden {
                continue;
            }
            let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !line.is_empty() {
                lines.push(line);
            }
        }
    }
    lines.join("\n")
}

/// Finds display text for a link that points at `target_url`.
///
/// Tries an exact URL match first, then a containment match, and finally
/// derives a name from the target's host. Mirrors how an operator would
/// name a lead from the page that mentioned it.
#[must_use]
pub fn anchor_text_for(html: &str, target_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let target = normalize_url(target_url);

    let mut containment_match = None;
    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let text = clean_anchor_text(&anchor.text().collect::<String>());
        if text.is_empty() {
            continue;
        }
        if urls_equal(href, &target) {
            return Some(text);
        }
        if containment_match.is_none() && (href.contains(&target) || target.contains(href)) {
            containment_match = Some(text);
        }
    }

    containment_match.or_else(|| name_from_host(&target))
}

fn urls_equal(a: &str, b: &str) -> bool {
    match (Url::parse(&normalize_url(a)), Url::parse(b)) {
        (Ok(left), Ok(right)) => left == right,
        _ => a == b,
    }
}

fn clean_anchor_text(raw: &str) -> String {
    let text = clean_title(raw);
    let lower = text.to_lowercase();
    if text.len() <= 1 || SKIP_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return String::new();
    }
    text
}

/// Derives a display name from a URL host: `river-yoga.example` becomes
/// "River Yoga".
fn name_from_host(url: &str) -> Option<String> {
    let host = Url::parse(url).ok()?.host_str()?.to_string();
    let company = host.trim_start_matches("www.").split('.').next()?.to_string();
    if company.len() <= 3 {
        return None;
    }
    let name = company
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");
    (!name.is_empty()).then_some(name)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Same-domain contact/about links worth visiting for a lead check,
/// absolute, deduplicated, capped at `limit`.
#[must_use]
pub fn contact_about_links(html: &str, base_url: &str, limit: usize) -> Vec<PageLink> {
    let Ok(base) = Url::parse(&normalize_url(base_url)) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut links = Vec::new();
    let mut seen = Vec::new();
    for anchor in document.select(&ANCHOR_SELECTOR) {
        if links.len() >= limit {
            break;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if href.starts_with('#') {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if resolved.host_str() != base.host_str() {
            continue;
        }

        let text = anchor.text().collect::<String>();
        let lower = format!("{} {}", text.to_lowercase(), resolved.path().to_lowercase());
        if !lower.contains("contact") && !lower.contains("about") {
            continue;
        }

        let href = resolved.to_string();
        if seen.contains(&href) {
            continue;
        }
        seen.push(href.clone());
        links.push(PageLink {
            text: text.trim().to_string(),
            href,
        });
    }
    links
}

/// Syntactic email validity check used before drafting.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && EMAIL_RE.is_match(email)
}

/// Formats note text as bullet points, one per non-empty line.
#[must_use]
pub fn bulletize(notes: &str) -> String {
    if notes.trim_start().starts_with('•') {
        return notes.trim().to_string();
    }
    notes
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("• {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

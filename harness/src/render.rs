//! Plain-text rendering of CMS content for the terminal.

use cms::{Article, Card, CollectionResult, Organization, Page, Section};
use std::fmt::Write;

pub const PREVIEW_CHARS: usize = 100;

/// Cuts `text` to at most `max_chars` characters, appending "..." when
/// anything was dropped. Counts chars, not bytes.
pub fn preview(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

pub fn article_line(article: &Article) -> String {
    let mut line = format!("[{}] {}", article.meta.id, article.title);
    if article.featured {
        line.push_str(" *");
    }
    if let Some(published) = article.meta.published_at {
        let _ = write!(line, " ({})", published.format("%-d %B %Y"));
    }
    if !article.author.is_empty() {
        let _ = write!(line, " by {}", article.author);
    }
    line
}

pub fn article_block(article: &Article) -> String {
    let mut out = article_line(article);
    let _ = write!(out, "\n    {}", preview(&article.summary(), PREVIEW_CHARS));
    match (&article.external_link, article.is_external()) {
        (Some(link), true) => {
            let _ = write!(out, "\n    read more: {}", link);
        }
        _ => {
            let _ = write!(out, "\n    slug: {}", article.slug);
        }
    }
    if let Some(image) = &article.featured_image {
        let _ = write!(out, "\n    image: {}", image.url);
    }
    out
}

pub fn organization_block(org: &Organization) -> String {
    let mut out = format!("[{}] {}", org.meta.id, org.name);
    let description = org.description.extract_text();
    if !description.is_empty() {
        let _ = write!(out, "\n    {}", preview(&description, PREVIEW_CHARS));
    }
    if !org.website.is_empty() {
        let _ = write!(out, "\n    {}", org.website);
    }
    for contact in [&org.email, &org.phone].into_iter().flatten() {
        let _ = write!(out, "\n    {}", contact);
    }
    out
}

pub fn page_block(page: &Page) -> String {
    let mut out = format!("[{}] {} (/{})", page.meta.id, page.title, page.slug);
    let description = page
        .meta_description
        .clone()
        .unwrap_or_else(|| page.content.extract_text());
    if !description.is_empty() {
        let _ = write!(out, "\n    {}", preview(&description, PREVIEW_CHARS));
    }
    out
}

pub fn card_block(card: &Card) -> String {
    let mut out = format!("[{}] {}", card.id, card.title);
    let text = card.content.extract_text();
    if !text.is_empty() {
        let _ = write!(out, "\n    {}", preview(&text, PREVIEW_CHARS));
    }
    if let Some((label, link)) = card.button() {
        let _ = write!(out, "\n    [{}] -> {}", label, link);
    }
    out
}

/// Renders every record with `block`, followed by a pagination footer.
pub fn collection<E>(result: &CollectionResult<E>, block: impl Fn(&E) -> String) -> String {
    if result.is_empty() {
        return "  (none)".to_string();
    }

    let mut out = String::new();
    for item in &result.data {
        for line in block(item).lines() {
            let _ = writeln!(out, "  {}", line);
        }
    }
    let p = &result.pagination;
    let _ = write!(
        out,
        "  page {}/{}, {} total",
        p.page,
        p.page_count.max(1),
        p.total
    );
    out
}

pub fn section<E>(title: &str, section: &Section<E>, block: impl Fn(&E) -> String) -> String {
    format!(
        "{} ({})\n{}",
        title,
        section.source.status_message(),
        collection(&section.data, block)
    )
}

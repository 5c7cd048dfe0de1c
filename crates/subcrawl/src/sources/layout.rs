//! Submission page layouts
//!
//! The site has served two page designs. Captured snapshots use the archived
//! ("classic") design; authenticated live fetches get the current one. Both
//! are parsed into a [`Record`] by the same routine with different selectors.

use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use subcrawl_common::types::{format_utc, iso_timestamp_from_unix};
use subcrawl_common::{Outcome, Record, SubmissionId};

use super::submission::scheme_qualify;
use crate::error::{CrawlError, Result};

const RATING_SUFFIX: &str = " rating";
const DOWNLOAD_LABEL: &str = "Download";

#[allow(clippy::unwrap_used)]
static ORDINAL_DAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)(st|nd|rd|th)").unwrap());

#[allow(clippy::unwrap_used)]
static REGISTERED_ONLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d,]+)\s*registered").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLayout {
    /// Current design, served to authenticated sessions
    Live,
    /// Classic design found in captured snapshots
    Archived,
}

/// Where the posting date lives and how it is encoded
#[derive(Debug, Clone, Copy)]
enum DateEncoding {
    /// `data-time` attribute in unix seconds
    UnixAttr(&'static str),
    /// Human readable attribute such as `Jan 1st, 2020 12:00 AM`
    OrdinalAttr(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct LayoutSelectors {
    content: &'static str,
    author: &'static str,
    title: &'static str,
    description: &'static str,
    keywords: &'static str,
    date: &'static str,
    date_encoding: DateEncoding,
    rating: &'static str,
}

impl PageLayout {
    pub fn name(self) -> &'static str {
        match self {
            PageLayout::Live => "live",
            PageLayout::Archived => "archived",
        }
    }

    fn selectors(self) -> LayoutSelectors {
        match self {
            PageLayout::Live => LayoutSelectors {
                content: "#submission_page",
                author: r#".submission-id-sub-container a[href*="/user/"]"#,
                title: ".submission-title h2",
                description: ".submission-description",
                keywords: "section.tags-row span.tags a",
                date: "span.popup_date[data-time]",
                date_encoding: DateEncoding::UnixAttr("data-time"),
                rating: ".rating img[alt]",
            },
            PageLayout::Archived => LayoutSelectors {
                content: "#page-submission",
                author: r#".classic-submission-title a[href*="/user/"]"#,
                title: ".classic-submission-title h2",
                description: ".maintable td.alt1",
                keywords: "#keywords a",
                date: "span.popup_date[title]",
                date_encoding: DateEncoding::OrdinalAttr("title"),
                rating: ".stats-container img[alt]",
            },
        }
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CrawlError::parse(format!("bad selector {css}: {e:?}")))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn missing(layout: PageLayout, id: SubmissionId, field: &str) -> CrawlError {
    CrawlError::parse(format!("{} page for {id} has no {field}", layout.name()))
}

/// Parse a submission page.
///
/// A page without the primary content block is a withdrawn, private or
/// deleted submission and resolves to [`Outcome::Absent`].
pub fn parse_page(html: &str, layout: PageLayout, id: SubmissionId) -> Result<Outcome> {
    let document = Html::parse_document(html);
    let css = layout.selectors();

    let Some(content) = document.select(&selector(css.content)?).next() else {
        return Ok(Outcome::Absent);
    };

    let username = content
        .select(&selector(css.author)?)
        .filter_map(|a| a.value().attr("href"))
        .find_map(username_from_href)
        .ok_or_else(|| missing(layout, id, "author link"))?;

    let title = content
        .select(&selector(css.title)?)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| missing(layout, id, "title"))?;

    let description = content
        .select(&selector(css.description)?)
        .last()
        .map(text_of)
        .unwrap_or_default();

    let keywords = content
        .select(&selector(css.keywords)?)
        .map(text_of)
        .filter(|k| !k.is_empty())
        .collect();

    let timestamp = parse_date(content, &css, layout, id)?;

    let rating = content
        .select(&selector(css.rating)?)
        .find_map(|img| img.value().attr("alt"))
        .map(|alt| {
            let alt = alt.trim();
            alt.strip_suffix(RATING_SUFFIX).unwrap_or(alt).to_string()
        })
        .ok_or_else(|| missing(layout, id, "rating"))?;

    let download_url = content
        .select(&selector("a[href]")?)
        .find(|a| text_of(*a) == DOWNLOAD_LABEL)
        .and_then(|a| a.value().attr("href"))
        .map(scheme_qualify)
        .ok_or_else(|| missing(layout, id, "download link"))?;

    Ok(Outcome::Found(Record {
        id,
        username,
        title,
        description,
        keywords,
        timestamp,
        rating,
        download_url,
    }))
}

fn parse_date(
    content: ElementRef<'_>,
    css: &LayoutSelectors,
    layout: PageLayout,
    id: SubmissionId,
) -> Result<String> {
    let attr = match css.date_encoding {
        DateEncoding::UnixAttr(attr) | DateEncoding::OrdinalAttr(attr) => attr,
    };
    let raw = content
        .select(&selector(css.date)?)
        .find_map(|span| span.value().attr(attr))
        .ok_or_else(|| missing(layout, id, "date"))?;

    match css.date_encoding {
        DateEncoding::UnixAttr(_) => {
            let secs: i64 = raw
                .trim()
                .parse()
                .map_err(|_| CrawlError::parse(format!("bad unix date {raw:?} for {id}")))?;
            Ok(iso_timestamp_from_unix(secs)?)
        }
        DateEncoding::OrdinalAttr(_) => parse_ordinal_date(raw),
    }
}

/// Parse `Jan 1st, 2020 12:00 AM` style dates, read as UTC
pub fn parse_ordinal_date(raw: &str) -> Result<String> {
    let cleaned = ORDINAL_DAY.replace_all(raw.trim(), "$1");
    NaiveDateTime::parse_from_str(&cleaned, "%b %d, %Y %I:%M %p")
        .map(|naive| format_utc(naive.and_utc()))
        .map_err(|e| CrawlError::parse(format!("bad date {raw:?}: {e}")))
}

/// Path segment following `user` in a profile link
fn username_from_href(href: &str) -> Option<String> {
    let mut segments = href.split('/').filter(|s| !s.is_empty());
    segments.find(|s| *s == "user")?;
    segments.next().map(str::to_string)
}

/// Registered users online, from the live layout's footer counter
pub fn parse_online_registered(html: &str) -> Option<u64> {
    let document = Html::parse_document(html);
    let stats = selector(".online-stats").ok()?;
    let text: String = document.select(&stats).next()?.text().collect();
    let digits = REGISTERED_ONLINE.captures(&text)?.get(1)?.as_str().replace(',', "");
    digits.parse().ok()
}

//! Readable text extraction from rendered HTML.
//!
//! A page is reduced to its visible text: non-content elements and hidden
//! nodes are skipped and block elements break lines. Several candidate
//! containers are scored by how much substantive text they hold and the
//! best one wins. Bot-check pages are recognized before anything else.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::pipeline::normalize::normalize_for_storage;

/// Elements whose subtree never contributes readable text.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "canvas", "iframe", "head", "nav",
    "header", "footer", "aside", "form", "button", "select", "textarea",
];

/// Elements that start and end a line of text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "dd", "div", "dl", "dt", "fieldset", "figcaption",
    "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre",
    "section", "table", "tbody", "td", "th", "thead", "tr", "ul",
];

/// Containers that usually hold the document itself. Their score gets a bonus.
const SEMANTIC_CANDIDATES: &[&str] = &["main", "article", "[role=main]"];

/// Common content wrappers, tried after the semantic ones.
const CONTAINER_CANDIDATES: &[&str] = &[
    "#content",
    ".content",
    "#main",
    "#main-content",
    ".main-content",
    ".terms",
    ".legal",
    ".policy",
    ".document",
];

const MAX_MATCHES_PER_SELECTOR: usize = 5;
const SEMANTIC_BONUS_PERCENT: usize = 125;

const MIN_SCORED_LINE_CHARS: usize = 25;
const NAV_LINE_MAX_CHARS: usize = 60;
const NAV_PHRASES: &[&str] = &[
    "home",
    "menu",
    "log in",
    "login",
    "sign in",
    "sign up",
    "search",
    "contact us",
    "back to top",
    "skip to content",
    "главная",
    "меню",
    "войти",
    "вход",
    "регистрация",
    "поиск",
    "контакты",
];

/// Share buttons and cookie banners are a handful of words mentioning the
/// widget. Longer lines with the same words are clauses of the document.
const WIDGET_LINE_MAX_CHARS: usize = 48;
const WIDGET_LINE_MAX_WORDS: usize = 6;
static WIDGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:cookies?|consent|share|куки|поделиться)\b")
        .expect("widget pattern is valid")
});

const FOOTER_LINE_MAX_CHARS: usize = 160;
static FOOTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)©|\bcopyright\s*(?:\(c\)|\d{4})|\ball rights reserved\b|\bhelp and feedback\b|все права защищены|помощь и обратная связь",
    )
    .expect("footer pattern is valid")
});

const URL_LINE_MAX_CHARS: usize = 200;

const BOT_SCAN_CHARS: usize = 3000;
const BOT_MARKERS: &[&str] = &[
    "captcha",
    "are you human",
    "are you a robot",
    "verify you are human",
    "checking your browser",
    "security check",
    "attention required",
    "just a moment",
    "access denied",
    "вы не робот",
    "подтвердите, что вы человек",
    "проверка безопасности",
    "доступ запрещен",
    "доступ ограничен",
    "капча",
];

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://|www\.)\S+").expect("url pattern is valid"));

/// Visible text of a rendered page.
#[derive(Debug, Clone, Default)]
pub struct PageText {
    pub title: String,
    /// Visible text of the whole body
    pub body_text: String,
    /// Visible text of the best-scoring content container
    pub main_text: String,
}

/// Parse rendered HTML and pick its main content.
pub fn analyze(html: &str) -> PageText {
    let document = Html::parse_document(html);
    let title = page_title(&document);

    let body_text = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next().map(visible_text))
        .unwrap_or_default();

    let mut best: Option<(usize, usize, String)> = None;
    let mut consider = |text: String, semantic: bool| {
        let mut score = score_block(&text);
        if semantic {
            score = score * SEMANTIC_BONUS_PERCENT / 100;
        }
        let key = (score, text.chars().count());
        if best.as_ref().is_none_or(|(s, len, _)| key > (*s, *len)) {
            best = Some((key.0, key.1, text));
        }
    };

    for (selectors, semantic) in [(SEMANTIC_CANDIDATES, true), (CONTAINER_CANDIDATES, false)] {
        for raw in selectors {
            let Ok(selector) = Selector::parse(raw) else {
                continue;
            };
            for element in document.select(&selector).take(MAX_MATCHES_PER_SELECTOR) {
                consider(visible_text(element), semantic);
            }
        }
    }
    consider(body_text.clone(), false);

    let main_text = best.map(|(_, _, text)| text).unwrap_or_default();
    log::debug!(
        "Extracted {} chars of main text from {} chars of body text",
        main_text.chars().count(),
        body_text.chars().count()
    );

    PageText {
        title,
        body_text,
        main_text,
    }
}

fn page_title(document: &Html) -> String {
    Selector::parse("title")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .map(|el| el.text().collect::<String>())
        })
        .map(|title| title.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Visible text of an element, one line per block.
pub fn visible_text(element: ElementRef) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    normalize_for_storage(&raw)
}

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_inline(out, text),
            Node::Element(el) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = el.name();
                if SKIP_TAGS.contains(&name) || is_hidden(child_ref) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                collect_text(child_ref, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

// Source newlines inside a text node are layout, not line breaks.
fn push_inline(out: &mut String, text: &str) {
    out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
}

fn is_hidden(element: ElementRef) -> bool {
    let el = element.value();
    if el.attr("hidden").is_some() || el.attr("aria-hidden") == Some("true") {
        return true;
    }
    el.attr("style").is_some_and(|style| {
        let compact: String = style
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        compact.contains("display:none") || compact.contains("visibility:hidden")
    })
}

/// Characters of substantive text in a block.
///
/// Short lines, URL-dominated lines and short navigation lines do not count.
pub fn score_block(text: &str) -> usize {
    text.lines()
        .filter(|line| is_substantive(line))
        .map(|line| line.chars().count())
        .sum()
}

fn is_substantive(line: &str) -> bool {
    let length = line.chars().count();
    if length < MIN_SCORED_LINE_CHARS || is_url_dominated(line) {
        return false;
    }
    if length <= NAV_LINE_MAX_CHARS {
        let lowered = line.to_lowercase();
        if NAV_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
            return false;
        }
    }
    true
}

fn is_url_dominated(line: &str) -> bool {
    let url_chars: usize = URL
        .find_iter(line)
        .map(|m| m.as_str().chars().count())
        .sum();
    url_chars * 2 > line.chars().count()
}

/// Drop cookie banners, share widgets, copyright footers and bare links.
pub fn strip_boilerplate(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_boilerplate(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_boilerplate(line: &str) -> bool {
    let length = line.chars().count();
    if length <= WIDGET_LINE_MAX_CHARS
        && line.split_whitespace().count() <= WIDGET_LINE_MAX_WORDS
        && WIDGET.is_match(line)
    {
        return true;
    }
    if length <= FOOTER_LINE_MAX_CHARS && FOOTER.is_match(line) {
        return true;
    }
    length <= URL_LINE_MAX_CHARS && is_url_dominated(line)
}

/// The bot-check marker found in the title or leading body text, if any.
pub fn detect_bot_block(title: &str, body_text: &str) -> Option<&'static str> {
    let leading: String = body_text.chars().take(BOT_SCAN_CHARS).collect();
    let haystack = format!("{title}\n{leading}").to_lowercase();
    BOT_MARKERS
        .iter()
        .find(|marker| haystack.contains(*marker))
        .copied()
}

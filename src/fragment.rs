//! Fragment parsing and resolution.
//!
//! A fragment names a sub-location inside an RFC:
//!
//! - `page-<n>`: a form-feed page, see [`crate::pages`]
//! - `section-<name>`, `appendix-<name>`, `ref-<name>`: a structural marker
//!   found by scanning the text
//! - `L<row>[C<col>]` or `L<row>[C<col>]-L<row>[C<col>]`: a one-based
//!   line/column position or range
//!
//! Anything else resolves to "document opened, cursor unchanged".

use std::sync::LazyLock;

use regex::Regex;

use crate::document::{Editor, Point, ScrollAnchor, Selection};
use crate::pages;

static STRUCTURAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(appendix|section|ref|page)-([^-].*)$").expect("valid structural pattern")
});

static LINE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"L([0-9]+)(?:C([0-9]+))?(?:-L([0-9]+)(?:C([0-9]+))?)?")
        .expect("valid line range pattern")
});

/// The structural markers an RFC is searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Appendix,
    Section,
    Ref,
}

impl MarkerKind {
    /// Build the line pattern locating `token` for this kind of marker.
    pub fn pattern(self, token: &str) -> MarkerPattern {
        let (prefix, suffix) = match self {
            // "Appendix A.  Collected ABNF"
            Self::Appendix => (r"^ *Appendix +", ""),
            // "3.2  Header Compression"
            Self::Section => (r"^ *", r"\.? "),
            // "   [RFC2119]  Bradner, S., ..."
            Self::Ref => (r"^ +\[", r"\] "),
        };
        MarkerPattern {
            prefix,
            literal: regex::escape(token),
            suffix,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "appendix" => Some(Self::Appendix),
            "section" => Some(Self::Section),
            "ref" => Some(Self::Ref),
            _ => None,
        }
    }
}

/// A per-line search pattern: regex prefix, an escaped literal token, then a
/// regex suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerPattern {
    pub prefix: &'static str,
    pub literal: String,
    pub suffix: &'static str,
}

impl MarkerPattern {
    /// The assembled regular expression source.
    pub fn source(&self) -> String {
        format!("{}{}{}", self.prefix, self.literal, self.suffix)
    }

    /// Compile the pattern.
    ///
    /// # Errors
    /// Returns an error if the assembled expression is invalid.
    pub fn compile(&self) -> Result<Regex, regex::Error> {
        Regex::new(&self.source())
    }
}

/// A parsed fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// `page-<n>`.
    Page(u64),
    /// `section-`, `appendix-` or `ref-` followed by a name.
    Marker(MarkerKind, String),
    /// Zero-based position (zero width) or range.
    Range(Selection),
    /// Empty, absent or unrecognized.
    None,
}

impl Fragment {
    /// Parse a fragment, with or without its leading `#`.
    pub fn parse(input: &str) -> Self {
        let input = input.strip_prefix('#').unwrap_or(input);

        if let Some(caps) = STRUCTURAL.captures(input) {
            let token = &caps[2];
            return match &caps[1] {
                "page" => token.parse().map_or(Self::None, Self::Page),
                kind => MarkerKind::from_name(kind)
                    .map_or(Self::None, |kind| Self::Marker(kind, token.to_string())),
            };
        }

        let Some(caps) = LINE_RANGE.captures(input) else {
            return Self::None;
        };
        let start = Point::new(
            one_based(caps.get(1).map(|m| m.as_str())),
            one_based(caps.get(2).map(|m| m.as_str())),
        );
        let end = caps.get(3).map_or(start, |row| {
            Point::new(
                one_based(Some(row.as_str())),
                one_based(caps.get(4).map(|m| m.as_str())),
            )
        });
        Self::Range(Selection::new(start, end))
    }
}

// One-based digits to a zero-based index, clamped at zero.
fn one_based(digits: Option<&str>) -> usize {
    digits.map_or(0, |d| d.parse::<usize>().unwrap_or(usize::MAX).saturating_sub(1))
}

/// What resolving a fragment did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// Nothing matched; selection and viewport are untouched.
    Unchanged,
    /// Jumped to a page, landing here.
    Page(Point),
    /// Found a structural marker here.
    Marker(Point),
    /// Selected a line/column position or range.
    Selected(Selection),
}

/// Resolve `fragment` against `editor`, moving its selection.
pub fn apply_fragment<E: Editor + ?Sized>(
    fragment: Option<&str>,
    editor: &mut E,
) -> FragmentOutcome {
    let fragment = Fragment::parse(fragment.unwrap_or_default());
    tracing::debug!(?fragment, "applying fragment");
    match fragment {
        Fragment::Page(page) => {
            let page = i64::try_from(page).unwrap_or(i64::MAX);
            FragmentOutcome::Page(pages::go_to_page(editor, page))
        }
        Fragment::Marker(kind, token) => find_marker(editor, &kind.pattern(&token))
            .map_or(FragmentOutcome::Unchanged, |point| {
                editor.set_selection(Selection::at(point));
                editor.scroll_to(point, ScrollAnchor::Center);
                FragmentOutcome::Marker(point)
            }),
        Fragment::Range(selection) => {
            editor.set_selection(selection);
            let selection = editor.selection();
            editor.scroll_to(selection.start, ScrollAnchor::Visible);
            FragmentOutcome::Selected(selection)
        }
        Fragment::None => FragmentOutcome::Unchanged,
    }
}

/// The first line matching `pattern`, top-down.
pub fn find_marker<E: Editor + ?Sized>(editor: &E, pattern: &MarkerPattern) -> Option<Point> {
    let re = match pattern.compile() {
        Ok(re) => re,
        Err(err) => {
            tracing::warn!(pattern = %pattern.source(), %err, "invalid marker pattern");
            return None;
        }
    };
    (0..editor.line_count()).find_map(|row| {
        let line = editor.line(row)?;
        let found = re.find(&line)?;
        Some(Point::new(row, line[..found.start()].chars().count()))
    })
}

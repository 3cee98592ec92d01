//! Command surface.
//!
//! The four commands a host binds (`go-to-page`, `next-page`, `prev-page`,
//! `open-rfc`) plus the `rfc:` URI opener. Commands never fail loudly:
//! malformed input is ignored, and cache failures are reported through
//! [`DocumentHost::notify_error`].

use std::error::Error;

use crate::address::RfcAddress;
use crate::cache::{DocumentCache, Fetcher, Resolution, SkipReason};
use crate::document::{DocumentHost, DocumentId, Point};
use crate::fragment::FragmentOutcome;
use crate::pages;

/// Interactive single-value input.
pub trait Prompt {
    /// Ask for a value. `None` means the user cancelled.
    fn prompt(&mut self, message: &str) -> Option<String>;
}

impl<F> Prompt for F
where
    F: FnMut(&str) -> Option<String>,
{
    fn prompt(&mut self, message: &str) -> Option<String> {
        self(message)
    }
}

/// A bindable command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Jump to a page; prompts when no page is given.
    GoToPage(Option<i64>),
    NextPage,
    PrevPage,
    /// Open an RFC; prompts when no address is given.
    OpenRfc(Option<String>),
}

impl Command {
    /// Every command name, in registration order.
    pub const NAMES: [&'static str; 4] = ["go-to-page", "next-page", "prev-page", "open-rfc"];

    /// Look a command up by its registered name.
    pub fn from_name(name: &str, argument: Option<&str>) -> Option<Self> {
        match name {
            "go-to-page" => Some(Self::GoToPage(
                argument.and_then(|a| a.trim().parse().ok()),
            )),
            "next-page" => Some(Self::NextPage),
            "prev-page" => Some(Self::PrevPage),
            "open-rfc" => Some(Self::OpenRfc(argument.map(ToOwned::to_owned))),
            _ => None,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::GoToPage(_) => "go-to-page",
            Self::NextPage => "next-page",
            Self::PrevPage => "prev-page",
            Self::OpenRfc(_) => "open-rfc",
        }
    }
}

/// What a command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The active document's selection moved here.
    Moved(Point),
    /// A document was opened and positioned.
    Opened(DocumentId, FragmentOutcome),
    /// The request was valid but nothing could be done.
    Skipped(SkipReason),
    /// The failure was reported to the user.
    Failed,
    /// No input, no active document, or input for someone else.
    Ignored,
}

/// Run `command` against `host`.
pub fn dispatch<H, F, P>(
    command: Command,
    host: &mut H,
    cache: &DocumentCache<F>,
    prompt: &mut P,
) -> CommandOutcome
where
    H: DocumentHost,
    F: Fetcher,
    P: Prompt + ?Sized,
{
    tracing::debug!(command = command.name(), "dispatch");
    match command {
        Command::GoToPage(page) => {
            let Some(page) = page.or_else(|| prompt_page(prompt)) else {
                return CommandOutcome::Ignored;
            };
            with_active(host, |editor| pages::go_to_page(editor, page))
        }
        Command::NextPage => with_active(host, pages::next_page),
        Command::PrevPage => with_active(host, pages::prev_page),
        Command::OpenRfc(input) => open_rfc(cache, host, input.as_deref(), prompt),
    }
}

fn prompt_page<P: Prompt + ?Sized>(prompt: &mut P) -> Option<i64> {
    prompt.prompt("Go to page")?.trim().parse().ok()
}

fn with_active<H: DocumentHost>(
    host: &mut H,
    action: impl FnOnce(&mut H::Editor) -> Point,
) -> CommandOutcome {
    host.active()
        .and_then(|id| host.editor_mut(id))
        .map_or(CommandOutcome::Ignored, |editor| {
            CommandOutcome::Moved(action(editor))
        })
}

/// Open an RFC from user input, prompting when `input` is `None`.
pub fn open_rfc<H, F, P>(
    cache: &DocumentCache<F>,
    host: &mut H,
    input: Option<&str>,
    prompt: &mut P,
) -> CommandOutcome
where
    H: DocumentHost,
    F: Fetcher,
    P: Prompt + ?Sized,
{
    let input = match input {
        Some(input) => input.to_string(),
        None => match prompt.prompt("RFC number") {
            Some(input) => input,
            None => return CommandOutcome::Ignored,
        },
    };
    let Some(address) = RfcAddress::parse_input(&input) else {
        tracing::debug!(input, "not an RFC address");
        return CommandOutcome::Ignored;
    };
    open_address(cache, host, &address)
}

/// The `rfc:` URI opener.
///
/// Returns `None` when the URI is not ours, so the host can offer it to
/// other openers.
pub fn open_uri<H, F>(
    cache: &DocumentCache<F>,
    host: &mut H,
    uri: &str,
) -> Option<CommandOutcome>
where
    H: DocumentHost,
    F: Fetcher,
{
    let address = RfcAddress::parse_uri(uri)?;
    Some(open_address(cache, host, &address))
}

fn open_address<H, F>(
    cache: &DocumentCache<F>,
    host: &mut H,
    address: &RfcAddress,
) -> CommandOutcome
where
    H: DocumentHost,
    F: Fetcher,
{
    match cache.open_address(address, host) {
        Ok(Resolution::Opened { id, outcome }) => CommandOutcome::Opened(id, outcome),
        Ok(Resolution::Skipped(reason)) => CommandOutcome::Skipped(reason),
        Err(err) => {
            let message = format!("Unable to open RFC {}", address.number);
            host.notify_error(&message, &error_chain(err));
            CommandOutcome::Failed
        }
    }
}

/// Render an error and its sources as `outer: inner: root`.
pub fn error_chain<E>(err: E) -> String
where
    E: Error + Send + Sync + 'static,
{
    format!("{:#}", anyhow::Error::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FetchError;
    use crate::config::Settings;
    use crate::document::{Editor, Selection, TextEditor, Workspace};
    use crate::paths::{NoDirectoryService, PathResolver, UserDirectory};
    use std::path::Path;

    struct Offline;

    impl Fetcher for Offline {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::IoError(std::io::Error::other(format!(
                "no route to {url}"
            ))))
        }
    }

    fn offline_cache(home: &Path) -> DocumentCache<Offline> {
        let resolver = PathResolver::new(
            Some(home.to_path_buf()),
            UserDirectory::new(home.join("passwd"), Box::new(NoDirectoryService)),
        );
        DocumentCache::new(resolver, Offline).with_settings(&Settings {
            cache_dir: "~/cache".to_string(),
            ..Settings::default()
        })
    }

    fn no_prompt(_: &str) -> Option<String> {
        None
    }

    fn paged_workspace() -> Workspace {
        let mut ws = Workspace::new();
        let text = ["one", "two", "\u{c}", "three", "four", "\u{c}", "five"].join("\n");
        ws.insert(TextEditor::from_text(&text));
        ws
    }

    #[test]
    fn test_command_names_round_trip() {
        for name in Command::NAMES {
            let command = Command::from_name(name, None).unwrap();
            assert_eq!(command.name(), name);
        }
        assert_eq!(Command::from_name("scroll", None), None);
        assert_eq!(
            Command::from_name("go-to-page", Some(" 3 ")),
            Some(Command::GoToPage(Some(3)))
        );
    }

    #[test]
    fn test_go_to_page_with_argument() {
        let home = tempfile::tempdir().unwrap();
        let cache = offline_cache(home.path());
        let mut ws = paged_workspace();
        let outcome = dispatch(Command::GoToPage(Some(2)), &mut ws, &cache, &mut no_prompt);
        assert_eq!(outcome, CommandOutcome::Moved(Point::new(3, 0)));
    }

    #[test]
    fn test_go_to_page_prompts_when_missing() {
        let home = tempfile::tempdir().unwrap();
        let cache = offline_cache(home.path());
        let mut ws = paged_workspace();
        let mut asked = Vec::new();
        let mut prompt = |message: &str| {
            asked.push(message.to_string());
            Some("3".to_string())
        };
        let outcome = dispatch(Command::GoToPage(None), &mut ws, &cache, &mut prompt);
        assert_eq!(outcome, CommandOutcome::Moved(Point::new(6, 0)));
        assert_eq!(asked, vec!["Go to page".to_string()]);
    }

    #[test]
    fn test_go_to_page_ignores_bad_or_cancelled_input() {
        let home = tempfile::tempdir().unwrap();
        let cache = offline_cache(home.path());
        let mut ws = paged_workspace();
        let id = ws.active().unwrap();
        ws.editor_mut(id)
            .unwrap()
            .set_selection(Selection::at(Point::new(4, 1)));

        let mut junk = |_: &str| Some("three".to_string());
        assert_eq!(
            dispatch(Command::GoToPage(None), &mut ws, &cache, &mut junk),
            CommandOutcome::Ignored
        );
        assert_eq!(
            dispatch(Command::GoToPage(None), &mut ws, &cache, &mut no_prompt),
            CommandOutcome::Ignored
        );
        assert_eq!(
            ws.editor(id).unwrap().selection(),
            Selection::at(Point::new(4, 1))
        );
    }

    #[test]
    fn test_next_and_prev_page_act_on_active_document() {
        let home = tempfile::tempdir().unwrap();
        let cache = offline_cache(home.path());
        let mut ws = paged_workspace();
        assert_eq!(
            dispatch(Command::NextPage, &mut ws, &cache, &mut no_prompt),
            CommandOutcome::Moved(Point::new(2, 0))
        );
        assert_eq!(
            dispatch(Command::NextPage, &mut ws, &cache, &mut no_prompt),
            CommandOutcome::Moved(Point::new(5, 0))
        );
        assert_eq!(
            dispatch(Command::PrevPage, &mut ws, &cache, &mut no_prompt),
            CommandOutcome::Moved(Point::new(2, 0))
        );
    }

    #[test]
    fn test_page_commands_without_document_are_ignored() {
        let home = tempfile::tempdir().unwrap();
        let cache = offline_cache(home.path());
        let mut ws = Workspace::new();
        assert_eq!(
            dispatch(Command::NextPage, &mut ws, &cache, &mut no_prompt),
            CommandOutcome::Ignored
        );
    }

    #[test]
    fn test_open_rfc_ignores_non_numeric_input() {
        let home = tempfile::tempdir().unwrap();
        let cache = offline_cache(home.path());
        let mut ws = Workspace::new();
        let mut prompt = |_: &str| Some("hello".to_string());
        assert_eq!(
            dispatch(Command::OpenRfc(None), &mut ws, &cache, &mut prompt),
            CommandOutcome::Ignored
        );
        assert!(ws.notifications().is_empty());
    }

    #[test]
    fn test_open_rfc_fetch_failure_is_notified() {
        let home = tempfile::tempdir().unwrap();
        let cache = offline_cache(home.path());
        let mut ws = Workspace::new();

        let outcome = dispatch(
            Command::OpenRfc(Some("2223".to_string())),
            &mut ws,
            &cache,
            &mut no_prompt,
        );
        assert_eq!(outcome, CommandOutcome::Failed);
        let notes = ws.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "Unable to open RFC 2223");
        assert!(notes[0].detail.contains("failed to download RFC 2223"));
        assert!(notes[0].detail.contains("no route to https://www.rfc-editor.org/rfc/rfc2223.txt"));
    }

    #[test]
    fn test_open_uri_declines_foreign_schemes() {
        let home = tempfile::tempdir().unwrap();
        let cache = offline_cache(home.path());
        let mut ws = Workspace::new();
        assert_eq!(open_uri(&cache, &mut ws, "https://example.com"), None);
        assert_eq!(open_uri(&cache, &mut ws, "rfc:notanumber"), None);
    }

    #[test]
    fn test_open_uri_opens_cached_document() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join("cache");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("rfc1.txt"), "a\nb\nc\nd\n").unwrap();
        let cache = offline_cache(home.path());
        let mut ws = Workspace::new();

        let outcome = open_uri(&cache, &mut ws, "rfc://1/L3").unwrap();
        let CommandOutcome::Opened(id, FragmentOutcome::Selected(selection)) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(selection, Selection::at(Point::new(2, 0)));
        assert_eq!(ws.active(), Some(id));
    }

    #[test]
    fn test_error_chain_joins_sources() {
        let inner = std::io::Error::other("disk full");
        let err = crate::cache::CacheError::Write {
            path: "/tmp/rfc1.txt".into(),
            source: inner,
        };
        assert_eq!(error_chain(err), "failed to write /tmp/rfc1.txt: disk full");
    }
}

//! Suggestion dropdown state for a single text field.
//!
//! The component owns no table data. Callers hand it the candidate list on
//! every text change and get the confirmed selection back as a return value.

use std::ops::Range;

pub const DEFAULT_MAX_SUGGESTIONS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AutocompleteState {
    #[default]
    Idle,
    Suggesting {
        matches: Vec<String>,
        highlighted: Option<usize>,
    },
}

/// What the dropdown should look like right now.
#[derive(Debug, PartialEq, Eq)]
pub enum DropdownView<'a> {
    Closed,
    Results {
        matches: &'a [String],
        highlighted: Option<usize>,
    },
    NoMatches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct Autocomplete {
    state: AutocompleteState,
    max_suggestions: usize,
}

impl Default for Autocomplete {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SUGGESTIONS)
    }
}

impl Autocomplete {
    pub fn new(max_suggestions: usize) -> Self {
        Self {
            state: AutocompleteState::Idle,
            max_suggestions,
        }
    }

    pub fn state(&self) -> &AutocompleteState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, AutocompleteState::Suggesting { .. })
    }

    pub fn view(&self) -> DropdownView<'_> {
        match &self.state {
            AutocompleteState::Idle => DropdownView::Closed,
            AutocompleteState::Suggesting { matches, .. } if matches.is_empty() => DropdownView::NoMatches,
            AutocompleteState::Suggesting { matches, highlighted } => DropdownView::Results {
                matches,
                highlighted: *highlighted,
            },
        }
    }

    /// Recomputes suggestions for `input`. Empty input closes the dropdown.
    pub fn on_input<S: AsRef<str>>(&mut self, input: &str, candidates: &[S]) {
        if input.is_empty() {
            self.state = AutocompleteState::Idle;
            return;
        }
        let matches = candidates
            .iter()
            .map(S::as_ref)
            .filter(|candidate| highlight_span(candidate, input).is_some())
            .take(self.max_suggestions)
            .map(str::to_string)
            .collect();
        self.state = AutocompleteState::Suggesting {
            matches,
            highlighted: None,
        };
    }

    /// Re-opens the dropdown when a field that already has text gains focus.
    pub fn on_focus<S: AsRef<str>>(&mut self, input: &str, candidates: &[S]) {
        if !input.is_empty() {
            self.on_input(input, candidates);
        }
    }

    /// Moves the highlight one step, wrapping at both ends.
    pub fn navigate(&mut self, direction: Direction) {
        let AutocompleteState::Suggesting { matches, highlighted } = &mut self.state else {
            return;
        };
        let count = matches.len();
        if count == 0 {
            return;
        }
        *highlighted = Some(match (direction, *highlighted) {
            (Direction::Down, None) => 0,
            (Direction::Down, Some(i)) => (i + 1) % count,
            (Direction::Up, None) | (Direction::Up, Some(0)) => count - 1,
            (Direction::Up, Some(i)) => i - 1,
        });
    }

    /// Accepts the highlighted suggestion. Does nothing when nothing is highlighted.
    pub fn accept(&mut self) -> Option<String> {
        let AutocompleteState::Suggesting { highlighted: Some(index), .. } = self.state else {
            return None;
        };
        self.select(index)
    }

    /// Accepts the suggestion at `index`, e.g. after a click.
    pub fn select(&mut self, index: usize) -> Option<String> {
        let AutocompleteState::Suggesting { matches, .. } = &mut self.state else {
            return None;
        };
        if index >= matches.len() {
            return None;
        }
        let chosen = matches.swap_remove(index);
        self.state = AutocompleteState::Idle;
        Some(chosen)
    }

    /// Escape or a click elsewhere.
    pub fn dismiss(&mut self) {
        self.state = AutocompleteState::Idle;
    }
}

/// Byte range of the first case-insensitive occurrence of `input` in `candidate`.
///
/// Characters are compared by their uppercase mapping, the same rule that
/// decides whether a candidate is suggested at all.
pub fn highlight_span(candidate: &str, input: &str) -> Option<Range<usize>> {
    if input.is_empty() {
        return None;
    }
    candidate
        .char_indices()
        .find_map(|(start, _)| folded_prefix_len(&candidate[start..], input).map(|len| start..start + len))
}

/// Length in bytes of the prefix of `text` that case-folds equal to `prefix`.
fn folded_prefix_len(text: &str, prefix: &str) -> Option<usize> {
    let mut text_chars = text.char_indices();
    for wanted in prefix.chars() {
        let (_, got) = text_chars.next()?;
        if !got.to_uppercase().eq(wanted.to_uppercase()) {
            return None;
        }
    }
    Some(text_chars.next().map_or(text.len(), |(end, _)| end))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANDIDATES: [&str; 3] = ["Pitx2", "Pitx3", "Otx2"];

    fn results(ac: &Autocomplete) -> Vec<String> {
        match ac.view() {
            DropdownView::Results { matches, .. } => matches.to_vec(),
            other => panic!("expected results, got {:?}", other),
        }
    }

    #[test]
    fn matches_keep_candidate_order() {
        let mut ac = Autocomplete::default();
        ac.on_input("pit", &CANDIDATES);
        assert_eq!(results(&ac), vec!["Pitx2", "Pitx3"]);

        ac.on_input("X2", &CANDIDATES);
        assert_eq!(results(&ac), vec!["Pitx2", "Otx2"]);
    }

    #[test]
    fn empty_input_closes() {
        let mut ac = Autocomplete::default();
        ac.on_input("pit", &CANDIDATES);
        assert!(ac.is_open());
        ac.on_input("", &CANDIDATES);
        assert_eq!(ac.view(), DropdownView::Closed);
    }

    #[test]
    fn zero_matches_stays_open_with_indicator() {
        let mut ac = Autocomplete::default();
        ac.on_input("zzz", &CANDIDATES);
        assert_eq!(ac.view(), DropdownView::NoMatches);
        assert!(ac.is_open());
        ac.navigate(Direction::Down);
        assert_eq!(ac.accept(), None);
    }

    #[test]
    fn down_twice_then_enter_picks_second_item() {
        let mut ac = Autocomplete::default();
        ac.on_input("pit", &CANDIDATES);
        ac.navigate(Direction::Down);
        ac.navigate(Direction::Down);
        assert_eq!(ac.accept().as_deref(), Some("Pitx3"));
        assert_eq!(ac.state(), &AutocompleteState::Idle);
    }

    #[test]
    fn navigation_wraps_both_ways() {
        let mut ac = Autocomplete::default();
        ac.on_input("pit", &CANDIDATES);
        ac.navigate(Direction::Up);
        assert_eq!(
            ac.view(),
            DropdownView::Results { matches: &["Pitx2".to_string(), "Pitx3".to_string()], highlighted: Some(1) }
        );
        ac.navigate(Direction::Down);
        ac.navigate(Direction::Down);
        match ac.view() {
            DropdownView::Results { highlighted, .. } => assert_eq!(highlighted, Some(1)),
            other => panic!("unexpected {:?}", other),
        }
        ac.navigate(Direction::Up);
        ac.navigate(Direction::Up);
        match ac.view() {
            DropdownView::Results { highlighted, .. } => assert_eq!(highlighted, Some(1)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn typing_resets_highlight() {
        let mut ac = Autocomplete::default();
        ac.on_input("pit", &CANDIDATES);
        ac.navigate(Direction::Down);
        ac.on_input("pitx", &CANDIDATES);
        assert_eq!(ac.accept(), None);
        assert!(ac.is_open());
    }

    #[test]
    fn escape_closes_without_selection() {
        let mut ac = Autocomplete::default();
        ac.on_input("otx", &CANDIDATES);
        ac.navigate(Direction::Down);
        ac.dismiss();
        assert_eq!(ac.view(), DropdownView::Closed);
        assert_eq!(ac.accept(), None);
    }

    #[test]
    fn click_selects_by_index() {
        let mut ac = Autocomplete::default();
        ac.on_input("2", &CANDIDATES);
        assert_eq!(ac.select(5), None);
        assert_eq!(ac.select(1).as_deref(), Some("Otx2"));
        assert!(!ac.is_open());
    }

    #[test]
    fn suggestions_are_capped() {
        let many: Vec<String> = (0..40).map(|i| format!("gene{}", i)).collect();
        let mut ac = Autocomplete::default();
        ac.on_input("gene", &many);
        assert_eq!(results(&ac).len(), DEFAULT_MAX_SUGGESTIONS);
        assert_eq!(results(&ac)[0], "gene0");

        let mut small = Autocomplete::new(3);
        small.on_input("gene", &many);
        assert_eq!(results(&small).len(), 3);
    }

    #[test]
    fn focus_reopens_only_with_text() {
        let mut ac = Autocomplete::default();
        ac.on_focus("", &CANDIDATES);
        assert!(!ac.is_open());
        ac.on_focus("otx", &CANDIDATES);
        assert_eq!(results(&ac), vec!["Otx2"]);
    }

    #[test]
    fn highlight_span_is_case_insensitive() {
        assert_eq!(highlight_span("Pitx2", "TX"), Some(2..4));
        assert_eq!(highlight_span("Pitx2", "otx"), None);
        assert_eq!(highlight_span("Pitx2", ""), None);
    }

    #[test]
    fn non_ascii_match_is_both_suggested_and_bolded() {
        let mut ac = Autocomplete::default();
        ac.on_input("ä", &["Ärger1", "Pitx2"]);
        assert_eq!(results(&ac), vec!["Ärger1"]);
        assert_eq!(highlight_span("Ärger1", "ä"), Some(0.."Ä".len()));
        assert_eq!(highlight_span("Ärger1", "RG"), Some(2..4));
    }

    #[test]
    fn every_suggestion_has_a_highlight() {
        let candidates = ["Ćwiczenie", "gène", "ÉTOILE", "Pitx2"];
        for input in ["é", "È", "ć", "ne", "x"] {
            let mut ac = Autocomplete::default();
            ac.on_input(input, &candidates);
            if let DropdownView::Results { matches, .. } = ac.view() {
                for name in matches {
                    assert!(highlight_span(name, input).is_some(), "{} / {}", name, input);
                }
            }
        }
    }
}

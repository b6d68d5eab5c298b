//! Incremental stop-sequence detection.
//!
//! Engine chunks can split a stop sequence across several pulls ("</", "s>"),
//! so the matcher holds back any trailing text that could still grow into a
//! stop sequence and only releases it once it is disambiguated.

/// Result of feeding one piece of text to a [`StopMatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopScan {
    /// Text that is safe to emit now.
    pub text: String,
    /// A stop sequence was found; nothing after it may be emitted.
    pub matched: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StopMatcher {
    stops: Vec<String>,
    pending: String,
}

impl StopMatcher {
    pub fn new(stops: &[String]) -> Self {
        Self {
            stops: stops.iter().filter(|s| !s.is_empty()).cloned().collect(),
            pending: String::new(),
        }
    }

    /// Feed the next piece of generated text.
    pub fn push(&mut self, text: &str) -> StopScan {
        if self.stops.is_empty() {
            return StopScan {
                text: text.to_string(),
                matched: false,
            };
        }

        self.pending.push_str(text);

        let earliest = self
            .stops
            .iter()
            .filter_map(|stop| self.pending.find(stop.as_str()))
            .min();
        if let Some(pos) = earliest {
            let text = self.pending[..pos].to_string();
            self.pending.clear();
            return StopScan {
                text,
                matched: true,
            };
        }

        let hold_from = self
            .pending
            .char_indices()
            .map(|(i, _)| i)
            .find(|&i| {
                let tail = &self.pending[i..];
                self.stops.iter().any(|stop| stop.starts_with(tail))
            })
            .unwrap_or(self.pending.len());

        let held = self.pending.split_off(hold_from);
        let text = std::mem::replace(&mut self.pending, held);
        StopScan {
            text,
            matched: false,
        }
    }

    /// Release any held-back text. Called once the stream is over.
    pub fn flush(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(stops: &[&str]) -> StopMatcher {
        let stops: Vec<String> = stops.iter().map(|s| s.to_string()).collect();
        StopMatcher::new(&stops)
    }

    #[test]
    fn passes_through_without_stops() {
        let mut m = matcher(&[]);
        let scan = m.push("hello");
        assert_eq!(scan.text, "hello");
        assert!(!scan.matched);
        assert_eq!(m.flush(), "");
    }

    #[test]
    fn truncates_at_match_in_single_chunk() {
        let mut m = matcher(&["END"]);
        let scan = m.push("foo END bar");
        assert_eq!(scan.text, "foo ");
        assert!(scan.matched);
    }

    #[test]
    fn holds_back_partial_match_across_chunks() {
        let mut m = matcher(&["</s>"]);

        let scan = m.push("answer </");
        assert_eq!(scan.text, "answer ");
        assert!(!scan.matched);

        let scan = m.push("s> trailing");
        assert_eq!(scan.text, "");
        assert!(scan.matched);
    }

    #[test]
    fn releases_false_alarm() {
        let mut m = matcher(&["</s>"]);
        assert_eq!(m.push("a <").text, "a ");
        let scan = m.push("b");
        assert_eq!(scan.text, "<b");
        assert!(!scan.matched);
    }

    #[test]
    fn earliest_stop_wins() {
        let mut m = matcher(&["zzz", "\n\n"]);
        let scan = m.push("one\n\ntwo zzz");
        assert_eq!(scan.text, "one");
        assert!(scan.matched);
    }

    #[test]
    fn flush_returns_held_text() {
        let mut m = matcher(&["###"]);
        assert_eq!(m.push("x #").text, "x ");
        assert_eq!(m.flush(), "#");
    }

    #[test]
    fn respects_char_boundaries() {
        let mut m = matcher(&["ü!"]);
        let scan = m.push("grüß ü");
        assert_eq!(scan.text, "grüß ");
        assert_eq!(m.flush(), "ü");
    }
}

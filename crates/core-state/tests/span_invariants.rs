//! Property tests: after any sequence of tracker operations interleaved with
//! native edits, every span spells its display name and no two spans overlap.

use core_state::{DeleteDirection, SpanTracker, UserCandidate};
use core_text::span::is_disjoint;
use core_text::{clamp_offset, next_grapheme_boundary, prev_grapheme_boundary, splice};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Commit { at: usize, query_len: usize, user: usize },
    Type { at: usize, ch: char },
    Delete { a: usize, b: usize, backward: bool },
}

fn users() -> Vec<UserCandidate> {
    vec![
        UserCandidate::new("u1", "Ann", "Lee"),
        UserCandidate::new("u2", "Bo", ""),
        UserCandidate::new("u3", "Zo\u{e9}", "\u{65e5}\u{672c}"),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..64, 0usize..4, 0usize..3).prop_map(|(at, query_len, user)| Op::Commit {
            at,
            query_len,
            user
        }),
        (0usize..64, prop::sample::select(vec!['a', ' ', '@', '\u{e9}', '\u{65e5}']))
            .prop_map(|(at, ch)| Op::Type { at, ch }),
        (0usize..64, 0usize..64, any::<bool>()).prop_map(|(a, b, backward)| Op::Delete {
            a,
            b,
            backward
        }),
    ]
}

fn assert_invariants(tracker: &SpanTracker, text: &str) -> Result<(), TestCaseError> {
    for span in tracker.spans() {
        prop_assert!(span.end <= text.len());
        prop_assert!(span.start < span.end);
        prop_assert_eq!(&text[span.start..span.end], span.display_name.as_str());
    }
    prop_assert!(is_disjoint(tracker.spans()));
    Ok(())
}

proptest! {
    #[test]
    fn spans_stay_valid_and_disjoint(seed in "[a-z @]{0,24}", ops in prop::collection::vec(op(), 1..40)) {
        let people = users();
        let mut tracker = SpanTracker::new();
        let mut text = seed;
        for op in ops {
            match op {
                Op::Commit { at, query_len, user } => {
                    let anchor = at % (text.len() + 1);
                    let ins = tracker.insert_mention(&text, anchor, query_len, &people[user]);
                    prop_assert_eq!(ins.caret, ins.span.end);
                    text = ins.text;
                }
                Op::Type { at, ch } => {
                    let at = clamp_offset(&text, at);
                    let mut buf = [0u8; 4];
                    text = splice(&text, at, at, ch.encode_utf8(&mut buf));
                    tracker.on_external_text_change(&text, at + ch.len_utf8());
                }
                Op::Delete { a, b, backward } => {
                    let dir = if backward { DeleteDirection::Backward } else { DeleteDirection::Forward };
                    match tracker.intercept_deletion(&text, a, b, dir) {
                        Some(s) => {
                            prop_assert!(s.caret <= s.text.len());
                            text = s.text;
                        }
                        None => {
                            // Native edit: one grapheme or the selection.
                            let (lo, hi) = if a == b {
                                let c = clamp_offset(&text, a);
                                if backward { (prev_grapheme_boundary(&text, c), c) } else { (c, next_grapheme_boundary(&text, c)) }
                            } else {
                                core_text::clamp_range(&text, a, b)
                            };
                            text = splice(&text, lo, hi, "");
                            tracker.on_external_text_change(&text, lo);
                        }
                    }
                }
            }
            assert_invariants(&tracker, &text)?;
        }
    }

    #[test]
    fn validation_is_idempotent(seed in "[a-z @]{0,16}", at in 0usize..16, user in 0usize..3, noise in "[a-z]{0,3}") {
        let people = users();
        let mut tracker = SpanTracker::new();
        let anchor = at % (seed.len() + 1);
        let ins = tracker.insert_mention(&seed, anchor, 0, &people[user]);
        let edited = format!("{noise}{}", ins.text);
        let first = tracker.on_external_text_change(&edited, 0).to_vec();
        let second = tracker.on_external_text_change(&edited, 0).to_vec();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn handled_deletion_never_cuts_a_mention(a in 0usize..40, b in 0usize..40, backward in any::<bool>()) {
        let mut tracker = SpanTracker::new();
        let people = users();
        let first = tracker.insert_mention("hi @a and @b ok", 3, 1, &people[0]);
        let anchor = first.text.find("@b").unwrap();
        let second = tracker.insert_mention(&first.text, anchor, 1, &people[1]);
        let before = tracker.spans().to_vec();
        let dir = if backward { DeleteDirection::Backward } else { DeleteDirection::Forward };
        if let Some(s) = tracker.intercept_deletion(&second.text, a, b, dir) {
            for span in &before {
                let inside = span.start >= s.removed.start && span.end <= s.removed.end;
                let outside = span.end <= s.removed.start || span.start >= s.removed.end;
                prop_assert!(inside || outside, "span {:?} cut by {:?}", span.range(), s.removed);
            }
        }
    }
}

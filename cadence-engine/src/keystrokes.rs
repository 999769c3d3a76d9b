//! Per-character keystroke emission with human typing texture.
//!
//! Characters go out one at a time with variable dwell, occasional thinking
//! pauses, digraph speed-ups for common two-letter sequences, and a small
//! chance of a deliberate typo that is backspaced and corrected. The visible
//! sink value always ends up exactly equal to the requested text; the noise
//! lives only in the event sequence.

use anyhow::Result;
use cadence_common::DelayRange;
use rand::Rng;
use tokio::time::sleep;
use tracing::debug;

use crate::delay::DelayGenerator;
use crate::ports::TextSink;

/// Common English two-letter sequences typed faster than unrelated pairs.
const COMMON_DIGRAPHS: [(char, char); 12] = [
    ('t', 'h'),
    ('h', 'e'),
    ('i', 'n'),
    ('e', 'r'),
    ('a', 'n'),
    ('r', 'e'),
    ('e', 'd'),
    ('o', 'n'),
    ('e', 's'),
    ('s', 't'),
    ('e', 'n'),
    ('a', 't'),
];

/// Speed-up factor applied to the second key of a recognized digraph.
const DIGRAPH_FACTOR: f64 = 0.7;

const THINKING_PAUSE_PROBABILITY: f64 = 0.05;
const TYPO_PROBABILITY: f64 = 0.02;

/// Whether `prev` followed by `cur` is a recognized common digraph.
pub fn is_common_pair(prev: char, cur: char) -> bool {
    COMMON_DIGRAPHS
        .iter()
        .any(|&(a, b)| a == prev && b == cur)
}

/// A plausible mistyped neighbor: the character one code point away, in a
/// randomly chosen direction, skipping anything unprintable.
fn adjacent_typo(ch: char) -> Option<char> {
    let code = ch as u32;
    let candidates = if rand::thread_rng().gen_bool(0.5) {
        [code + 1, code.wrapping_sub(1)]
    } else {
        [code.wrapping_sub(1), code + 1]
    };
    candidates
        .into_iter()
        .filter_map(char::from_u32)
        .find(|c| !c.is_control())
}

/// Emits text into a [`TextSink`] one keystroke at a time.
#[derive(Clone)]
pub struct KeystrokeSimulator {
    delays: DelayGenerator,
}

impl KeystrokeSimulator {
    pub fn new(delays: DelayGenerator) -> Self {
        Self { delays }
    }

    /// Type `text` into `sink`.
    ///
    /// With humanization off this degrades to a single atomic value-set plus
    /// one commit signal. Either way the sink's final value equals `text`
    /// exactly and the sequence ends with a short pause and a blur.
    pub async fn type_text(&self, sink: &dyn TextSink, text: &str, humanize: bool) -> Result<()> {
        sink.focus().await?;
        sink.clear().await?;

        if !humanize {
            sink.set_value(text).await?;
            sink.commit().await?;
            sink.blur().await?;
            return Ok(());
        }

        let chars: Vec<char> = text.chars().collect();
        debug!(target: "keystrokes", chars = chars.len(), "typing with humanized cadence");

        let mut prev: Option<char> = None;
        for (i, &ch) in chars.iter().enumerate() {
            let mut dwell = self.delays.delay(DelayRange::new(50, 150));
            if rand::thread_rng().gen_bool(THINKING_PAUSE_PROBABILITY) {
                dwell += self.delays.delay(DelayRange::new(200, 500));
            }
            if prev.is_some_and(|p| is_common_pair(p, ch)) {
                dwell = dwell.mul_f64(DIGRAPH_FACTOR);
            }
            sleep(dwell).await;

            let last = i + 1 == chars.len();
            if !last && rand::thread_rng().gen_bool(TYPO_PROBABILITY) {
                if let Some(typo) = adjacent_typo(ch) {
                    self.emit_key(sink, typo).await?;
                    self.delays.pause(DelayRange::new(120, 300)).await;
                    sink.backspace().await?;
                    self.delays.pause(DelayRange::new(60, 160)).await;
                }
            }

            self.emit_key(sink, ch).await?;
            prev = Some(ch);
        }

        self.delays.pause(DelayRange::new(150, 400)).await;
        sink.commit().await?;
        sink.blur().await?;
        Ok(())
    }

    /// One full keystroke: key-down, value-append, key-up.
    async fn emit_key(&self, sink: &dyn TextSink, ch: char) -> Result<()> {
        sink.key_down(ch).await?;
        sink.append(ch).await?;
        sink.key_up(ch).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimPage, Signal};

    #[test]
    fn recognizes_common_pairs() {
        assert!(is_common_pair('t', 'h'));
        assert!(is_common_pair('a', 't'));
        assert!(!is_common_pair('x', 'z'));
        // Direction matters: "ht" is not a recognized digraph.
        assert!(!is_common_pair('h', 't'));
    }

    #[test]
    fn adjacent_typo_is_one_code_point_away() {
        for ch in ['a', 'm', 'Z', '5'] {
            let typo = adjacent_typo(ch).unwrap();
            let delta = (typo as i64 - ch as i64).abs();
            assert_eq!(delta, 1, "typo for {ch:?} was {typo:?}");
            assert!(!typo.is_control());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn final_value_matches_input_exactly() {
        let sim = KeystrokeSimulator::new(DelayGenerator::new(true));
        let text = "the rain in spain stays mainly on the plain";
        // Typos fire ~2% per char; many repetitions make it near-certain the
        // correction path runs at least once and still nets the exact text.
        for _ in 0..25 {
            let page = SimPage::new();
            sim.type_text(page.as_ref(), text, true).await.unwrap();
            assert_eq!(page.value(), text);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn every_keystroke_follows_down_input_up_order() {
        let sim = KeystrokeSimulator::new(DelayGenerator::new(true));
        let page = SimPage::new();
        sim.type_text(page.as_ref(), "then", true).await.unwrap();

        let signals = page.signals();
        assert_eq!(signals[0], Signal::Focus);
        assert_eq!(signals[1], Signal::Clear);
        assert_eq!(*signals.last().unwrap(), Signal::Blur);
        assert_eq!(signals[signals.len() - 2], Signal::Commit);

        // Each KeyDown is immediately followed by its Input then KeyUp.
        for (i, sig) in signals.iter().enumerate() {
            if let Signal::KeyDown(ch) = sig {
                assert_eq!(signals[i + 1], Signal::Input(*ch));
                assert_eq!(signals[i + 2], Signal::KeyUp(*ch));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_humanization_sets_the_value_atomically() {
        let sim = KeystrokeSimulator::new(DelayGenerator::new(true));
        let page = SimPage::new();
        sim.type_text(page.as_ref(), "hello", false).await.unwrap();

        assert_eq!(page.value(), "hello");
        assert_eq!(
            page.signals(),
            vec![
                Signal::Focus,
                Signal::Clear,
                Signal::SetValue("hello".into()),
                Signal::Commit,
                Signal::Blur,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_text_still_focuses_and_blurs() {
        let sim = KeystrokeSimulator::new(DelayGenerator::new(true));
        let page = SimPage::new();
        sim.type_text(page.as_ref(), "", true).await.unwrap();
        assert_eq!(page.value(), "");
        assert_eq!(page.signals().first(), Some(&Signal::Focus));
        assert_eq!(page.signals().last(), Some(&Signal::Blur));
    }
}

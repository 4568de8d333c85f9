use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Sentence,
    Character,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresentationChunk {
    pub text: String,
    pub is_final: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Presenter {
    granularity: Granularity,
    delay: Duration,
}

impl Presenter {
    pub fn new(granularity: Granularity, delay: Duration) -> Self {
        Self { granularity, delay }
    }

    pub fn chunks(&self, answer: &str) -> Vec<PresentationChunk> {
        if answer.trim().is_empty() {
            return Vec::new();
        }

        let pieces: Vec<String> = match self.granularity {
            Granularity::Sentence => split_sentences(answer),
            Granularity::Character => answer.chars().map(String::from).collect(),
        };

        let last = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(position, text)| PresentationChunk {
                text,
                is_final: position + 1 == last,
            })
            .collect()
    }

    pub fn stream(&self, answer: &str) -> PresentationStream {
        PresentationStream {
            chunks: self.chunks(answer).into_iter(),
            delay: self.delay,
            started: false,
        }
    }
}

pub struct PresentationStream {
    chunks: std::vec::IntoIter<PresentationChunk>,
    delay: Duration,
    started: bool,
}

impl PresentationStream {
    pub async fn next(&mut self) -> Option<PresentationChunk> {
        let chunk = self.chunks.next()?;
        if self.started && !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.started = true;
        Some(chunk)
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if !is_terminator(c) {
            continue;
        }

        // absorb the whole terminator run, "Wait..." stays together
        while let Some(&next) = chars.peek() {
            if !is_terminator(next) {
                break;
            }
            current.push(next);
            chars.next();
        }

        if chars.peek().map_or(true, |next| next.is_whitespace()) {
            let sentence = current.trim().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current.clear();
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
        }
    }

    let trailing = current.trim().to_string();
    if !trailing.is_empty() {
        sentences.push(trailing);
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::normalize_whitespace;

    #[test]
    fn three_sentences_yield_three_chunks_with_final_on_the_last() {
        let presenter = Presenter::new(Granularity::Sentence, Duration::ZERO);

        let chunks = presenter.chunks("One. Two! Three?");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "One.");
        assert_eq!(chunks[1].text, "Two!");
        assert_eq!(chunks[2].text, "Three?");
        assert!(!chunks[0].is_final);
        assert!(!chunks[1].is_final);
        assert!(chunks[2].is_final);
    }

    #[test]
    fn character_granularity_yields_one_chunk_per_char() {
        let presenter = Presenter::new(Granularity::Character, Duration::ZERO);

        let chunks = presenter.chunks("Hi!");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "H");
        assert_eq!(chunks[2].text, "!");
        assert!(chunks.iter().take(2).all(|chunk| !chunk.is_final));
        assert!(chunks[2].is_final);
    }

    #[test]
    fn sentence_chunks_reconstruct_the_answer() {
        let presenter = Presenter::new(Granularity::Sentence, Duration::ZERO);
        let answers = [
            "Hello world. Goodbye.",
            "One. Two! Three?",
            "No terminator here",
            "Wait... is this one? Yes!",
            "  Padded.  And spaced.  ",
            "Runs  inside  a sentence. Next!",
        ];

        for answer in answers {
            let rejoined = presenter
                .chunks(answer)
                .into_iter()
                .map(|chunk| chunk.text)
                .collect::<Vec<_>>()
                .join(" ");

            // whitespace runs inside a sentence survive splitting
            assert_eq!(
                normalize_whitespace(&rejoined),
                normalize_whitespace(answer),
                "answer: {answer:?}"
            );
        }
    }

    #[test]
    fn ellipsis_is_not_split_mid_run() {
        let presenter = Presenter::new(Granularity::Sentence, Duration::ZERO);

        let chunks = presenter.chunks("Wait... done.");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Wait...");
        assert_eq!(chunks[1].text, "done.");
    }

    #[test]
    fn abbreviation_without_following_whitespace_stays_whole() {
        let presenter = Presenter::new(Granularity::Sentence, Duration::ZERO);

        let chunks = presenter.chunks("See v1.2 of the manual");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "See v1.2 of the manual");
    }

    #[test]
    fn single_sentence_is_final_immediately() {
        let presenter = Presenter::new(Granularity::Sentence, Duration::ZERO);

        let chunks = presenter.chunks("Hello");

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_final);
    }

    #[test]
    fn empty_answer_yields_no_chunks_in_either_granularity() {
        let by_sentence = Presenter::new(Granularity::Sentence, Duration::ZERO);
        let by_character = Presenter::new(Granularity::Character, Duration::ZERO);

        assert!(by_sentence.chunks("").is_empty());
        assert!(by_sentence.chunks("   ").is_empty());
        assert!(by_character.chunks("").is_empty());
        assert!(by_character.chunks("   ").is_empty());
    }

    #[test]
    fn restarting_reproduces_the_same_sequence() {
        let presenter = Presenter::new(Granularity::Sentence, Duration::from_millis(5));

        let first = presenter.chunks("One. Two! Three?");
        let second = presenter.chunks("One. Two! Three?");

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn stream_drains_to_the_same_chunks() {
        let presenter = Presenter::new(Granularity::Sentence, Duration::from_millis(1));
        let mut stream = presenter.stream("One. Two! Three?");

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.push(chunk);
        }

        assert_eq!(collected, presenter.chunks("One. Two! Three?"));
        assert!(stream.next().await.is_none());
    }
}

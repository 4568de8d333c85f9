use crate::embeddings::Embedder;
use crate::error::{GenerationError, RetrievalError, SessionError};
use crate::generation::Generator;
use crate::index::VectorIndex;
use crate::models::{Message, Role, ScoredPassage, SessionOptions};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub const ERROR_REPLY: &str = "Sorry, I couldn't generate a response.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Retrieving,
    Generating,
    Streaming,
    Error,
}

#[derive(Debug, Error)]
pub enum TurnFailure {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
}

#[derive(Debug)]
pub struct Turn {
    pub reply: String,
    pub passages: Vec<ScoredPassage>,
    pub failure: Option<TurnFailure>,
}

impl Turn {
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

pub struct ChatSession<E, G> {
    id: Uuid,
    history: Vec<Message>,
    state: SessionState,
    index: Arc<VectorIndex<E>>,
    generator: G,
    options: SessionOptions,
}

impl<E, G> ChatSession<E, G>
where
    E: Embedder + Send + Sync,
    G: Generator + Send + Sync,
{
    pub fn new(index: Arc<VectorIndex<E>>, generator: G, options: SessionOptions) -> Self {
        let mut history = Vec::new();
        if let Some(greeting) = &options.greeting {
            history.push(Message::assistant(greeting.clone()));
        }

        Self {
            id: Uuid::new_v4(),
            history,
            state: SessionState::Idle,
            index,
            generator,
            options,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub async fn ask(&mut self, question: &str) -> Result<Turn, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }

        // a dropped ask future leaves a mid-turn state behind
        if self.state != SessionState::Idle {
            self.recover_abandoned_turn();
        }

        self.history.push(Message::user(question));
        self.state = SessionState::Retrieving;

        let passages = match self.index.query(question, self.options.top_k).await {
            Ok(result) => result.passages,
            Err(error) => return Ok(self.fail_turn(Vec::new(), error.into())),
        };

        self.state = SessionState::Generating;
        let prior = &self.history[..self.history.len() - 1];
        let prompt = build_prompt(prior, &passages, question, &self.options);

        let answer = match self.generator.generate(&prompt).await {
            Ok(answer) => answer,
            Err(error) => return Ok(self.fail_turn(passages, error.into())),
        };

        self.state = SessionState::Streaming;
        self.history.push(Message::assistant(answer.clone()));
        self.state = SessionState::Idle;

        Ok(Turn {
            reply: answer,
            passages,
            failure: None,
        })
    }

    fn fail_turn(&mut self, passages: Vec<ScoredPassage>, failure: TurnFailure) -> Turn {
        self.state = SessionState::Error;
        self.history.push(Message::assistant(ERROR_REPLY));
        self.state = SessionState::Idle;

        Turn {
            reply: ERROR_REPLY.to_string(),
            passages,
            failure: Some(failure),
        }
    }

    fn recover_abandoned_turn(&mut self) {
        if matches!(self.history.last(), Some(last) if last.role == Role::User) {
            self.history.push(Message::assistant(ERROR_REPLY));
        }
        self.state = SessionState::Idle;
    }
}

fn build_prompt(
    prior: &[Message],
    passages: &[ScoredPassage],
    question: &str,
    options: &SessionOptions,
) -> String {
    let mut prompt = String::from(
        "You answer questions using the provided document context. \
         If the context does not contain the answer, say so.\n",
    );

    let context = render_context(passages, options.max_context_chars);
    if !context.is_empty() {
        prompt.push_str("\nContext:\n");
        prompt.push_str(&context);
        prompt.push('\n');
    }

    let transcript = render_history(prior, options.history_turns);
    if !transcript.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        prompt.push_str(&transcript);
        prompt.push('\n');
    }

    prompt.push_str("\nQuestion: ");
    prompt.push_str(question);
    prompt.push_str("\nAnswer:");
    prompt
}

fn render_context(passages: &[ScoredPassage], max_chars: usize) -> String {
    let mut context = String::new();

    for passage in passages {
        let block = format!(
            "[source: {}#{}]\n{}",
            passage.source_name, passage.chunk_index, passage.text
        );

        // the first block is truncated rather than dropped when it alone
        // exceeds the cap
        if context.is_empty() {
            context = truncate_chars(&block, max_chars);
            continue;
        }

        if context.chars().count() + block.chars().count() + 2 > max_chars {
            break;
        }

        context.push_str("\n\n");
        context.push_str(&block);
    }

    context
}

fn render_history(history: &[Message], turns: usize) -> String {
    let window = turns.saturating_mul(2);
    let start = history.len().saturating_sub(window);

    history[start..]
        .iter()
        .map(|message| format!("{}: {}", message.role.label(), message.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

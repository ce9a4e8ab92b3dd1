//! Sequential, memory-carrying prompt execution
//!
//! Prompt *i* is submitted as the memory prefix (cleaned outputs of prompts
//! `0..i`) followed by the prompt text. Outputs are cleaned with
//! [`strip_think`](crate::strip_think) before they are stored or fed back.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::memory::MemoryBuffer;
use crate::prompts::{Prompt, PromptCatalog, PromptSequence, TemplateId};
use finsight_llm::{CompletionRequest, LLMError, LLMProvider, Message, TextStream};
use futures::{Stream, StreamExt, stream};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Progress of a streaming run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisEvent {
    /// Incremental model output for prompt `index`, raw (not yet cleaned)
    Fragment { index: usize, text: String },
    /// Prompt `index` finished; `text` is its cleaned output
    SectionComplete {
        index: usize,
        template: TemplateId,
        text: String,
    },
    /// Every prompt finished; always the last item
    Completed,
}

/// Stream of [`AnalysisEvent`]s, ending after `Completed` or the first error
pub type AnalysisStream = Pin<Box<dyn Stream<Item = Result<AnalysisEvent>> + Send>>;

/// Runs a [`PromptSequence`] against an [`LLMProvider`], carrying cleaned
/// outputs forward
#[derive(Clone)]
pub struct MemoryInvoker {
    provider: Arc<dyn LLMProvider>,
    catalog: PromptCatalog,
    model: String,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
}

impl MemoryInvoker {
    /// Create an invoker using the model settings from `config`
    pub fn new(provider: Arc<dyn LLMProvider>, catalog: PromptCatalog, config: &AnalysisConfig) -> Self {
        Self {
            provider,
            catalog,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Run every prompt, waiting for each full response
    ///
    /// Returns one cleaned output per prompt, in prompt order. If the model
    /// fails, the error carries the outputs completed before it.
    #[instrument(skip(self, prompts), fields(provider = %self.provider.name(), prompts = prompts.len()))]
    pub async fn run(&self, prompts: &PromptSequence) -> Result<Vec<String>> {
        let mut memory = MemoryBuffer::new();

        for (index, prompt) in prompts.iter().enumerate() {
            let request = self.request(&memory, prompt)?;
            let response = self
                .provider
                .complete(request)
                .await
                .map_err(|source| inference_error(index, &memory, source))?;

            debug!(index, template = %prompt.template, response = response.text(), "Model response");
            if response.truncated() {
                warn!(index, template = %prompt.template, "Response hit the token limit");
            }
            let cleaned = memory.record(response.text());
            info!(index, template = %prompt.template, chars = cleaned.len(), "Section complete");
        }

        Ok(memory.into_entries())
    }

    /// Run every prompt, yielding output fragments as they arrive
    ///
    /// The returned stream is lazy: nothing is submitted until it is polled,
    /// and dropping it stops the run.
    pub fn stream(&self, prompts: PromptSequence) -> AnalysisStream {
        let state = StreamState {
            invoker: self.clone(),
            prompts: prompts.into_iter().enumerate(),
            memory: MemoryBuffer::new(),
            current: None,
            done: false,
        };

        Box::pin(stream::unfold(state, |mut state| async move {
            let item = state.step().await?;
            Some((item, state))
        }))
    }

    fn request(&self, memory: &MemoryBuffer, prompt: &Prompt) -> Result<CompletionRequest> {
        let text = memory.submission(&self.catalog, &prompt.text)?;
        let mut builder = CompletionRequest::builder(&self.model).add_message(Message::user(text));
        if let Some(max_tokens) = self.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        Ok(builder.build())
    }
}

impl std::fmt::Debug for MemoryInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryInvoker")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

fn inference_error(prompt: usize, memory: &MemoryBuffer, source: LLMError) -> AnalysisError {
    AnalysisError::Inference {
        prompt,
        completed: memory.entries().to_vec(),
        source,
    }
}

struct InFlight {
    index: usize,
    template: TemplateId,
    fragments: TextStream,
    response: String,
}

struct StreamState {
    invoker: MemoryInvoker,
    prompts: std::iter::Enumerate<std::vec::IntoIter<Prompt>>,
    memory: MemoryBuffer,
    current: Option<InFlight>,
    done: bool,
}

impl StreamState {
    async fn step(&mut self) -> Option<Result<AnalysisEvent>> {
        loop {
            if self.done {
                return None;
            }

            let next = match self.current.as_mut() {
                Some(in_flight) => Some(in_flight.fragments.next().await),
                None => None,
            };

            match next {
                Some(Some(Ok(fragment))) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    if let Some(in_flight) = self.current.as_mut() {
                        in_flight.response.push_str(&fragment);
                        return Some(Ok(AnalysisEvent::Fragment {
                            index: in_flight.index,
                            text: fragment,
                        }));
                    }
                }
                Some(Some(Err(source))) => {
                    self.done = true;
                    let index = self.current.as_ref().map_or(self.memory.len(), |f| f.index);
                    return Some(Err(inference_error(index, &self.memory, source)));
                }
                Some(None) => {
                    if let Some(finished) = self.current.take() {
                        return Some(Ok(self.finish(finished)));
                    }
                }
                None => {
                    if let Err(e) = self.start_next().await {
                        self.done = true;
                        return Some(Err(e));
                    }
                    if self.current.is_none() {
                        self.done = true;
                        return Some(Ok(AnalysisEvent::Completed));
                    }
                }
            }
        }
    }

    async fn start_next(&mut self) -> Result<()> {
        let Some((index, prompt)) = self.prompts.next() else {
            return Ok(());
        };

        let request = self.invoker.request(&self.memory, &prompt)?;
        let fragments = self
            .invoker
            .provider
            .stream(request)
            .await
            .map_err(|source| inference_error(index, &self.memory, source))?;

        debug!(index, template = %prompt.template, "Streaming prompt");
        self.current = Some(InFlight {
            index,
            template: prompt.template,
            fragments,
            response: String::new(),
        });
        Ok(())
    }

    fn finish(&mut self, finished: InFlight) -> AnalysisEvent {
        debug!(
            index = finished.index,
            template = %finished.template,
            response = finished.response.as_str(),
            "Model response"
        );
        let text = self.memory.record(&finished.response);
        info!(
            index = finished.index,
            template = %finished.template,
            chars = text.len(),
            "Section complete"
        );
        AnalysisEvent::SectionComplete {
            index: finished.index,
            template: finished.template,
            text,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use finsight_llm::{CompletionResponse, StopReason, TokenUsage};
    use std::sync::Mutex;

    /// Deterministic provider replaying canned responses in order
    pub(crate) struct ScriptedProvider {
        responses: Vec<String>,
        fail_at: Option<usize>,
        submissions: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub(crate) fn new(responses: &[&str]) -> Self {
            Self {
                responses: responses.iter().map(ToString::to_string).collect(),
                fail_at: None,
                submissions: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing_at(mut self, index: usize) -> Self {
            self.fail_at = Some(index);
            self
        }

        pub(crate) fn submissions(&self) -> Vec<String> {
            self.submissions.lock().unwrap().clone()
        }

        fn next_response(&self, request: &CompletionRequest) -> finsight_llm::Result<String> {
            let mut submissions = self.submissions.lock().unwrap();
            let index = submissions.len();
            submissions.push(request.prompt_text());
            if self.fail_at == Some(index) {
                return Err(LLMError::RequestFailed("backend unavailable".to_string()));
            }
            Ok(self.responses[index % self.responses.len()].clone())
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(&self, request: CompletionRequest) -> finsight_llm::Result<CompletionResponse> {
            let text = self.next_response(&request)?;
            Ok(CompletionResponse {
                message: Message::assistant(text),
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
        }

        async fn stream(&self, request: CompletionRequest) -> finsight_llm::Result<TextStream> {
            let text = self.next_response(&request)?;
            let chars: Vec<char> = text.chars().collect();
            let fragments: Vec<finsight_llm::Result<String>> = chars
                .chunks(4)
                .map(|chunk| Ok(chunk.iter().collect()))
                .collect();
            Ok(Box::pin(stream::iter(fragments)))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    const RESPONSES: [&str; 3] = [
        "<think>\nlooking at the sector\n</think>\n\nApple sells hardware.",
        "Margins are strong.<think>double-check EPS</think>",
        "Buy.",
    ];

    fn sequence(n: usize) -> PromptSequence {
        PromptSequence::new(
            TemplateId::ALL
                .iter()
                .take(n)
                .map(|id| Prompt {
                    template: *id,
                    text: format!("prompt {}", id.name()),
                })
                .collect(),
        )
    }

    fn invoker(provider: Arc<ScriptedProvider>) -> MemoryInvoker {
        MemoryInvoker::new(provider, PromptCatalog::new().unwrap(), &AnalysisConfig::default())
    }

    #[tokio::test]
    async fn test_run_returns_cleaned_outputs_in_order() {
        let provider = Arc::new(ScriptedProvider::new(&RESPONSES));
        let outputs = invoker(provider.clone()).run(&sequence(3)).await.unwrap();

        assert_eq!(
            outputs,
            vec!["\n\nApple sells hardware.", "Margins are strong.", "Buy."]
        );
        assert_eq!(provider.submissions().len(), 3);
    }

    #[tokio::test]
    async fn test_memory_holds_only_cleaned_outputs() {
        let provider = Arc::new(ScriptedProvider::new(&RESPONSES));
        invoker(provider.clone()).run(&sequence(3)).await.unwrap();

        let submissions = provider.submissions();
        assert_eq!(submissions[0], "prompt company-overview");

        assert!(submissions[1].contains("Apple sells hardware."));
        assert!(submissions[1].ends_with("prompt health-check"));
        assert!(!submissions[1].contains("looking at the sector"));

        assert!(submissions[2].contains("Apple sells hardware."));
        assert!(submissions[2].contains("Margins are strong."));
        assert!(!submissions[2].contains("<think>"));
        assert!(!submissions[2].contains("double-check EPS"));
        assert!(submissions[2].find("Apple").unwrap() < submissions[2].find("Margins").unwrap());
    }

    /// Each submission must be the memory of exactly the earlier cleaned
    /// outputs, followed by the prompt
    fn assert_exact_submissions(submissions: &[String], outputs: &[String], prompts: &PromptSequence) {
        let catalog = PromptCatalog::new().unwrap();
        assert_eq!(submissions.len(), prompts.len());
        for (i, prompt) in prompts.iter().enumerate() {
            let expected = catalog.render_memory(&outputs[..i]).unwrap() + &prompt.text;
            assert_eq!(submissions[i], expected, "submission {i}");
        }
    }

    #[tokio::test]
    async fn test_blocking_submissions_are_exact() {
        let prompts = sequence(3);
        let provider = Arc::new(ScriptedProvider::new(&RESPONSES));
        let outputs = invoker(provider.clone()).run(&prompts).await.unwrap();

        let submissions = provider.submissions();
        assert_exact_submissions(&submissions, &outputs, &prompts);
        assert_eq!(submissions[2].matches("Apple sells hardware.").count(), 1);
    }

    #[tokio::test]
    async fn test_streaming_submissions_are_exact() {
        let prompts = sequence(3);
        let outputs = invoker(Arc::new(ScriptedProvider::new(&RESPONSES)))
            .run(&prompts)
            .await
            .unwrap();

        let provider = Arc::new(ScriptedProvider::new(&RESPONSES));
        let events: Vec<AnalysisEvent> = invoker(provider.clone())
            .stream(prompts.clone())
            .map(|event| event.unwrap())
            .collect()
            .await;
        assert_eq!(events.last(), Some(&AnalysisEvent::Completed));

        assert_exact_submissions(&provider.submissions(), &outputs, &prompts);
    }

    #[tokio::test]
    async fn test_max_tokens_forwarded_only_when_set() {
        let prompts = sequence(1);
        let provider = Arc::new(ScriptedProvider::new(&["ok"]));
        let uncapped = invoker(provider);
        let memory = MemoryBuffer::new();
        let request = uncapped.request(&memory, &prompts.prompts()[0]).unwrap();
        assert!(request.max_tokens.is_none());

        let config = AnalysisConfig::builder().max_tokens(2048).build().unwrap();
        let capped = MemoryInvoker::new(
            Arc::new(ScriptedProvider::new(&["ok"])),
            PromptCatalog::new().unwrap(),
            &config,
        );
        let request = capped.request(&memory, &prompts.prompts()[0]).unwrap();
        assert_eq!(request.max_tokens, Some(2048));
    }

    #[tokio::test]
    async fn test_run_error_keeps_completed_outputs() {
        let provider = Arc::new(ScriptedProvider::new(&RESPONSES).failing_at(2));
        let err = invoker(provider).run(&sequence(3)).await.unwrap_err();

        match err {
            AnalysisError::Inference { prompt, completed, .. } => {
                assert_eq!(prompt, 2);
                assert_eq!(completed, vec!["\n\nApple sells hardware.", "Margins are strong."]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_stream_matches_blocking() {
        let blocking = invoker(Arc::new(ScriptedProvider::new(&RESPONSES)))
            .run(&sequence(3))
            .await
            .unwrap();

        let events: Vec<AnalysisEvent> = invoker(Arc::new(ScriptedProvider::new(&RESPONSES)))
            .stream(sequence(3))
            .map(|event| event.unwrap())
            .collect()
            .await;

        let mut raw = vec![String::new(); 3];
        let mut sections = Vec::new();
        for event in &events {
            match event {
                AnalysisEvent::Fragment { index, text } => raw[*index].push_str(text),
                AnalysisEvent::SectionComplete { text, .. } => sections.push(text.clone()),
                AnalysisEvent::Completed => {}
            }
        }

        let stripped: Vec<String> = raw.iter().map(|r| crate::strip_think(r)).collect();
        assert_eq!(stripped, blocking);
        assert_eq!(sections, blocking);
        assert_eq!(events.last(), Some(&AnalysisEvent::Completed));
    }

    #[tokio::test]
    async fn test_stream_event_order() {
        let events: Vec<AnalysisEvent> = invoker(Arc::new(ScriptedProvider::new(&["abc"])))
            .stream(sequence(2))
            .map(|event| event.unwrap())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                AnalysisEvent::Fragment { index: 0, text: "abc".to_string() },
                AnalysisEvent::SectionComplete {
                    index: 0,
                    template: TemplateId::CompanyOverview,
                    text: "abc".to_string()
                },
                AnalysisEvent::Fragment { index: 1, text: "abc".to_string() },
                AnalysisEvent::SectionComplete {
                    index: 1,
                    template: TemplateId::HealthCheck,
                    text: "abc".to_string()
                },
                AnalysisEvent::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_is_lazy_and_stops_on_error() {
        let provider = Arc::new(ScriptedProvider::new(&RESPONSES).failing_at(1));
        let mut events = invoker(provider.clone()).stream(sequence(3));
        assert!(provider.submissions().is_empty());

        let mut sections = 0;
        let mut error = None;
        while let Some(event) = events.next().await {
            match event {
                Ok(AnalysisEvent::SectionComplete { .. }) => sections += 1,
                Ok(AnalysisEvent::Completed) => panic!("completed after failure"),
                Ok(AnalysisEvent::Fragment { .. }) => {}
                Err(e) => error = Some(e),
            }
        }

        assert_eq!(sections, 1);
        assert!(matches!(
            error,
            Some(AnalysisError::Inference { prompt: 1, ref completed, .. }) if completed.len() == 1
        ));
        assert_eq!(provider.submissions().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_sequence_completes_immediately() {
        let events: Vec<AnalysisEvent> = invoker(Arc::new(ScriptedProvider::new(&["x"])))
            .stream(PromptSequence::new(Vec::new()))
            .map(|event| event.unwrap())
            .collect()
            .await;
        assert_eq!(events, vec![AnalysisEvent::Completed]);
    }
}

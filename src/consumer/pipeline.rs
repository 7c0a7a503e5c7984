//! Output pipeline: drains the funnel into a sink.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::coordinator::Coordinator;
use super::error::ConsumeError;
use super::message::ConsumedMessage;
use super::tail::TailWindow;
use crate::decode::DeserializerChain;
use crate::output::Sink;

/// How the pipeline emits messages. Chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Decode and emit each message as it arrives.
    Direct,
    /// Keep the N most recent messages and emit them oldest first once the
    /// funnel closes.
    Tail(usize),
}

/// Drains the funnel, decodes messages and writes them to a sink.
pub struct OutputPipeline<'a> {
    chain: &'a DeserializerChain,
    sink: &'a mut dyn Sink,
    coordinator: Arc<Coordinator>,
}

impl<'a> OutputPipeline<'a> {
    /// Creates a pipeline writing to `sink`.
    pub fn new(
        chain: &'a DeserializerChain,
        sink: &'a mut dyn Sink,
        coordinator: Arc<Coordinator>,
    ) -> Self {
        Self {
            chain,
            sink,
            coordinator,
        }
    }

    /// Runs until the funnel closes, or until shutdown in direct mode.
    ///
    /// Decode errors go to the coordinator. Returns the number of emitted
    /// records.
    ///
    /// # Errors
    ///
    /// Returns `ConsumeError::Output` as soon as the sink fails.
    pub async fn drain(
        &mut self,
        mode: OutputMode,
        funnel: mpsc::Receiver<ConsumedMessage>,
    ) -> Result<usize, ConsumeError> {
        match mode {
            OutputMode::Direct => self.drain_direct(funnel).await,
            OutputMode::Tail(capacity) => self.drain_tail(capacity, funnel).await,
        }
    }

    async fn drain_direct(
        &mut self,
        mut funnel: mpsc::Receiver<ConsumedMessage>,
    ) -> Result<usize, ConsumeError> {
        let closing = self.coordinator.closing_token();
        let mut emitted = 0;

        loop {
            let message = tokio::select! {
                biased;
                _ = closing.cancelled() => break,
                message = funnel.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            match self.chain.deserialize(&message) {
                Ok(record) => {
                    self.sink.emit(&record)?;
                    emitted += 1;
                }
                Err(source) => {
                    let error = ConsumeError::Decode {
                        partition: message.partition,
                        offset: message.offset,
                        source,
                    };
                    // A followed run would otherwise hang on an
                    // undecodable stream.
                    if self.coordinator.record(error) {
                        self.coordinator.shutdown();
                    }
                }
            }
        }

        debug!(emitted, "Direct output finished");
        Ok(emitted)
    }

    async fn drain_tail(
        &mut self,
        capacity: usize,
        mut funnel: mpsc::Receiver<ConsumedMessage>,
    ) -> Result<usize, ConsumeError> {
        let mut window = TailWindow::new(capacity);
        while let Some(message) = funnel.recv().await {
            window.insert(message);
        }
        debug!(retained = window.len(), capacity, "Tail window collected");

        let mut emitted = 0;
        for message in window.into_ascending() {
            match self.chain.deserialize(&message) {
                Ok(record) => {
                    self.sink.emit(&record)?;
                    emitted += 1;
                }
                Err(source) => {
                    warn!(
                        partition = message.partition,
                        offset = message.offset,
                        error = %source,
                        "Failed to decode message in tail window"
                    );
                    self.coordinator.record(ConsumeError::Decode {
                        partition: message.partition,
                        offset: message.offset,
                        source,
                    });
                }
            }
        }

        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::json::JsonDeserializer;
    use crate::decode::{DecodeError, Deserializer, Encoding, Field};
    use crate::output::MemorySink;
    use std::io;

    /// Claims values starting with `!` and rejects them.
    struct Rejecting;

    impl Deserializer for Rejecting {
        fn name(&self) -> &str {
            "rejecting"
        }

        fn applies_to(&self, field: Field, payload: &[u8]) -> bool {
            field == Field::Value && payload.first() == Some(&b'!')
        }

        fn deserialize(&self, _field: Field, _payload: &[u8]) -> Result<String, DecodeError> {
            Err(DecodeError::new("rejecting", "unsupported payload"))
        }
    }

    fn chain() -> DeserializerChain {
        DeserializerChain::new(
            vec![Box::new(Rejecting), Box::new(JsonDeserializer::new())],
            Encoding::Raw,
            Encoding::Raw,
        )
    }

    fn msg(partition: i32, offset: i64, millis: i64, value: &str) -> ConsumedMessage {
        ConsumedMessage::new(partition, offset)
            .with_timestamp_millis(millis)
            .with_value(value)
    }

    async fn feed(messages: Vec<ConsumedMessage>) -> mpsc::Receiver<ConsumedMessage> {
        let (tx, rx) = mpsc::channel(messages.len().max(1));
        for message in messages {
            tx.send(message).await.unwrap();
        }
        rx
    }

    #[tokio::test]
    async fn test_direct_emits_in_arrival_order() {
        let chain = chain();
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        let coordinator = Arc::new(Coordinator::new());

        let rx = feed(vec![msg(1, 0, 30, "a"), msg(0, 0, 10, "b")]).await;
        let emitted = OutputPipeline::new(&chain, &mut writer, Arc::clone(&coordinator))
            .drain(OutputMode::Direct, rx)
            .await
            .unwrap();

        assert_eq!(emitted, 2);
        assert_eq!(sink.positions(), vec![(1, 0), (0, 0)]);
        assert!(!coordinator.has_error());
    }

    #[tokio::test]
    async fn test_direct_decode_error_shuts_down() {
        let chain = chain();
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        let coordinator = Arc::new(Coordinator::new());

        let rx = feed(vec![
            msg(0, 0, 1, "{\"ok\":1}"),
            msg(0, 1, 2, "!broken"),
            msg(0, 2, 3, "later"),
        ])
        .await;
        OutputPipeline::new(&chain, &mut writer, Arc::clone(&coordinator))
            .drain(OutputMode::Direct, rx)
            .await
            .unwrap();

        assert_eq!(sink.positions(), vec![(0, 0)]);
        assert!(coordinator.is_closing());
        assert!(matches!(
            coordinator.take_error(),
            Some(ConsumeError::Decode { offset: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_direct_bracketed_text_keeps_following() {
        let chain = DeserializerChain::default();
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        let coordinator = Arc::new(Coordinator::new());

        let rx = feed(vec![
            msg(0, 0, 1, "[INFO] service started"),
            msg(0, 1, 2, "{\"ok\":true}"),
        ])
        .await;
        let emitted = OutputPipeline::new(&chain, &mut writer, Arc::clone(&coordinator))
            .drain(OutputMode::Direct, rx)
            .await
            .unwrap();

        assert_eq!(emitted, 2);
        let values: Vec<String> = sink.records().into_iter().filter_map(|r| r.value).collect();
        assert_eq!(values, vec!["[INFO] service started", "{\n  \"ok\": true\n}"]);
        assert!(!coordinator.is_closing());
        assert!(!coordinator.has_error());
    }

    #[tokio::test]
    async fn test_direct_stops_on_shutdown() {
        let chain = chain();
        let mut sink = MemorySink::new();
        let coordinator = Arc::new(Coordinator::new());
        coordinator.shutdown();

        let rx = feed(vec![msg(0, 0, 1, "a")]).await;
        let emitted = OutputPipeline::new(&chain, &mut sink, coordinator)
            .drain(OutputMode::Direct, rx)
            .await
            .unwrap();
        assert_eq!(emitted, 0);
    }

    #[tokio::test]
    async fn test_tail_emits_oldest_first() {
        let chain = chain();
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        let coordinator = Arc::new(Coordinator::new());

        let rx = feed(vec![
            msg(0, 0, 10, "a"),
            msg(0, 1, 40, "b"),
            msg(1, 0, 20, "c"),
            msg(1, 1, 30, "d"),
        ])
        .await;
        let emitted = OutputPipeline::new(&chain, &mut writer, coordinator)
            .drain(OutputMode::Tail(3), rx)
            .await
            .unwrap();

        assert_eq!(emitted, 3);
        assert_eq!(sink.positions(), vec![(1, 0), (1, 1), (0, 1)]);
    }

    #[tokio::test]
    async fn test_tail_decode_error_keeps_emitting() {
        let chain = chain();
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        let coordinator = Arc::new(Coordinator::new());

        let rx = feed(vec![
            msg(0, 0, 10, "a"),
            msg(0, 1, 20, "!oops"),
            msg(0, 2, 30, "c"),
        ])
        .await;
        OutputPipeline::new(&chain, &mut writer, Arc::clone(&coordinator))
            .drain(OutputMode::Tail(3), rx)
            .await
            .unwrap();

        assert_eq!(sink.positions(), vec![(0, 0), (0, 2)]);
        assert!(!coordinator.is_closing());
        assert!(coordinator.has_error());
    }

    #[tokio::test]
    async fn test_sink_failure_is_fatal() {
        struct Failing;
        impl Sink for Failing {
            fn emit(&mut self, _record: &crate::output::Record) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
        }

        let chain = chain();
        let mut sink = Failing;
        let coordinator = Arc::new(Coordinator::new());

        let rx = feed(vec![msg(0, 0, 1, "a")]).await;
        let err = OutputPipeline::new(&chain, &mut sink, coordinator)
            .drain(OutputMode::Direct, rx)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsumeError::Output(_)));
    }
}

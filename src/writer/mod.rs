//! Sinks for collector events.

pub mod console;
pub mod json;

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::collector::CollectorEvent;
use crate::config::{OutputConfig, WriterKind};
use crate::error::{GuerreroError, Result};
use crate::media::FileInfo;

pub use console::ConsoleWriter;
pub use json::JsonFileWriter;

/// Receives the results of a collection run.
///
/// `initialize` is called before the first event and `finalize` after the
/// last one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Writer: Send {
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    async fn info(&mut self, file: &FileInfo) -> Result<()>;

    async fn problem(&mut self, _file: &FileInfo, _error: &str) -> Result<()> {
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullWriter;

#[async_trait]
impl Writer for NullWriter {
    async fn info(&mut self, _file: &FileInfo) -> Result<()> {
        Ok(())
    }
}

/// Factory for creating writers
pub struct WriterFactory;

impl WriterFactory {
    pub fn create_writer(config: &OutputConfig) -> Result<Box<dyn Writer>> {
        match config.writer {
            WriterKind::Console => Ok(Box::new(ConsoleWriter::stdout())),
            WriterKind::Null => Ok(Box::new(NullWriter)),
            WriterKind::Json => {
                let path = config.path.as_ref().ok_or_else(|| {
                    GuerreroError::Config("The JSON writer needs an output path".to_string())
                })?;
                Ok(Box::new(JsonFileWriter::new(PathBuf::from(path))))
            }
        }
    }
}

/// Feeds every event from `events` into `writer` until the channel closes.
///
/// Returns the number of events written. A failing write is logged and does
/// not stop the loop.
pub async fn drain_events(
    writer: &mut dyn Writer,
    mut events: UnboundedReceiver<CollectorEvent>,
) -> Result<usize> {
    writer.initialize().await?;

    let mut count = 0;
    while let Some(event) = events.recv().await {
        let result = match &event {
            CollectorEvent::Info(file) => writer.info(file).await,
            CollectorEvent::Problem { file, error } => writer.problem(file, error).await,
        };
        match result {
            Ok(()) => count += 1,
            Err(e) => warn!("Writer failed to handle an event: {}", e),
        }
    }

    debug!("Event channel closed after {} events", count);
    writer.finalize().await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use tokio::sync::mpsc;

    fn file(name: &str) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            formatted_name: name.to_string(),
            size: 1,
            info: None,
        }
    }

    #[tokio::test]
    async fn test_drain_events_calls_writer_in_order() {
        let mut seq = Sequence::new();
        let mut writer = MockWriter::new();
        writer
            .expect_initialize()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        writer
            .expect_info()
            .withf(|f| f.name == "/a.mkv")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        writer
            .expect_problem()
            .withf(|f, error| f.name == "/b.mkv" && error == "boom")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        writer
            .expect_finalize()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(CollectorEvent::Info(file("/a.mkv"))).unwrap();
        tx.send(CollectorEvent::Problem {
            file: file("/b.mkv"),
            error: "boom".to_string(),
        })
        .unwrap();
        drop(tx);

        assert_eq!(drain_events(&mut writer, rx).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_drain_events_survives_failing_writes() {
        let mut writer = MockWriter::new();
        writer.expect_initialize().returning(|| Ok(()));
        writer
            .expect_info()
            .returning(|_| Err(GuerreroError::Config("disk full".to_string())));
        writer.expect_finalize().times(1).returning(|| Ok(()));

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(CollectorEvent::Info(file("/a.mkv"))).unwrap();
        tx.send(CollectorEvent::Info(file("/b.mkv"))).unwrap();
        drop(tx);

        assert_eq!(drain_events(&mut writer, rx).await.unwrap(), 0);
    }

    #[test]
    fn test_factory_requires_path_for_json() {
        let config = OutputConfig {
            writer: WriterKind::Json,
            path: None,
        };
        assert!(matches!(
            WriterFactory::create_writer(&config),
            Err(GuerreroError::Config(_))
        ));

        let config = OutputConfig {
            writer: WriterKind::Null,
            path: None,
        };
        assert!(WriterFactory::create_writer(&config).is_ok());
    }

    #[tokio::test]
    async fn test_null_writer_accepts_everything() {
        let mut writer = NullWriter;
        writer.initialize().await.unwrap();
        writer.info(&file("/a.mkv")).await.unwrap();
        writer.problem(&file("/b.mkv"), "boom").await.unwrap();
        writer.finalize().await.unwrap();
    }
}

//! End-to-end scan/dispatch properties with substitute collaborators.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use callwatch::application::{
    CallProcessor, MessageHandle, NotificationDispatcher, Notify, RecordingPipeline,
};
use callwatch::domain::call::CallRecord;
use callwatch::domain::InMemorySeenCalls;
use callwatch::infrastructure::CallTableParser;

/// Records every transport interaction instead of performing it.
#[derive(Default)]
struct FakeNotify {
    sent: Mutex<Vec<String>>,
    deleted: Mutex<Vec<MessageHandle>>,
    next_id: AtomicI64,
}

#[async_trait]
impl Notify for FakeNotify {
    async fn send(&self, text: &str) -> anyhow::Result<MessageHandle> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn send_audio(&self, _file: &Path, _caption: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn delete(&self, handle: MessageHandle) -> anyhow::Result<()> {
        self.deleted.lock().unwrap().push(handle);
        Ok(())
    }
}

/// Records scheduled pipeline runs.
#[derive(Default)]
struct FakePipeline {
    runs: Mutex<Vec<(String, Option<MessageHandle>)>>,
}

#[async_trait]
impl RecordingPipeline for FakePipeline {
    async fn process(&self, call: CallRecord, handle: Option<MessageHandle>) {
        self.runs.lock().unwrap().push((call.cli_number, handle));
    }
}

fn processor(
    notify: Arc<FakeNotify>,
    pipeline: Arc<FakePipeline>,
) -> CallProcessor<InMemorySeenCalls, FakeNotify, FakePipeline> {
    CallProcessor::new(
        CallTableParser::new().unwrap(),
        InMemorySeenCalls::new(),
        Arc::new(NotificationDispatcher::new(notify)),
        pipeline,
        Duration::from_secs(20),
    )
}

const PENDING_ROW_PAGE: &str = r#"
    <table id="livecalls"><tbody>
        <tr>
            <td>UNITED KINGDOM MOBILE 07</td>
            <td>447911223344</td>
            <td>X</td>
            <td><a onclick="playSound('dev-1','uuid-1')">play</a></td>
            <td>ANSWERED</td>
        </tr>
    </tbody></table>
"#;

const FAILED_ROW_PAGE: &str = r#"
    <table id="livecalls"><tbody>
        <tr>
            <td>SPAIN</td>
            <td>34911222333</td>
            <td>34600111222</td>
            <td><a onclick="playSound('dev-2','uuid-2')">play</a></td>
            <td>FAILED</td>
        </tr>
    </tbody></table>
"#;

const AUDIOLESS_ROW_PAGE: &str = r#"
    <table id="livecalls"><tbody>
        <tr>
            <td>FRANCE</td>
            <td>33142334455</td>
            <td>33601020304</td>
            <td><span onclick="playSound(broken)">play</span></td>
            <td>RINGING</td>
        </tr>
    </tbody></table>
"#;

#[tokio::test(start_paused = true)]
async fn same_row_across_two_scans_dispatches_once() {
    let notify = Arc::new(FakeNotify::default());
    let pipeline = Arc::new(FakePipeline::default());
    let mut proc = processor(notify.clone(), pipeline.clone());

    assert_eq!(proc.process_markup(PENDING_ROW_PAGE).await, 1);
    assert_eq!(proc.process_markup(PENDING_ROW_PAGE).await, 0);

    // Let the delayed pipeline task fire.
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(notify.sent.lock().unwrap().len(), 1, "exactly one detected alert");
    let runs = pipeline.runs.lock().unwrap();
    assert_eq!(runs.len(), 1, "at most one pipeline run");
    assert_eq!(runs[0].0, "X");
    assert_eq!(runs[0].1, Some(1), "pipeline received the alert handle");
}

#[tokio::test(start_paused = true)]
async fn failed_row_never_schedules_a_pipeline() {
    let notify = Arc::new(FakeNotify::default());
    let pipeline = Arc::new(FakePipeline::default());
    let mut proc = processor(notify.clone(), pipeline.clone());

    assert_eq!(proc.process_markup(FAILED_ROW_PAGE).await, 1);
    tokio::time::sleep(Duration::from_secs(30)).await;

    let sent = notify.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("failed") || sent[0].contains("Call failed"));
    assert!(pipeline.runs.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn audioless_pending_row_is_marked_but_not_dispatched() {
    let notify = Arc::new(FakeNotify::default());
    let pipeline = Arc::new(FakePipeline::default());
    let mut proc = processor(notify.clone(), pipeline.clone());

    assert_eq!(proc.process_markup(AUDIOLESS_ROW_PAGE).await, 0);
    // A second scan must not dispatch either: the row is already seen.
    assert_eq!(proc.process_markup(AUDIOLESS_ROW_PAGE).await, 0);
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(notify.sent.lock().unwrap().is_empty());
    assert!(pipeline.runs.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pipeline_delay_precedes_processing() {
    let notify = Arc::new(FakeNotify::default());
    let pipeline = Arc::new(FakePipeline::default());
    let mut proc = processor(notify, pipeline.clone());

    proc.process_markup(PENDING_ROW_PAGE).await;

    // Before the delay elapses the pipeline must not have run.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(pipeline.runs.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(pipeline.runs.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn distinct_rows_each_dispatch() {
    let notify = Arc::new(FakeNotify::default());
    let pipeline = Arc::new(FakePipeline::default());
    let mut proc = processor(notify.clone(), pipeline.clone());

    assert_eq!(proc.process_markup(PENDING_ROW_PAGE).await, 1);
    assert_eq!(proc.process_markup(FAILED_ROW_PAGE).await, 1);
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(notify.sent.lock().unwrap().len(), 2);
    assert_eq!(pipeline.runs.lock().unwrap().len(), 1);
}

// Test fixtures shared across modules

use async_trait::async_trait;
use lopdf::content::Content;
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{MailConfig, PipelineConfig};
use crate::documents::ManualGenerator;
use crate::mail::{MailError, MailTransport, Mailer, OutboundMessage};
use crate::queue::Pipeline;

/// In-memory transport recording every message it is asked to send
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<OutboundMessage>>,
    connects: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    fail_connect: bool,
    fail_send: bool,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_send(mut self) -> Self {
        self.fail_send = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Highest number of sends observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn connect(&self) -> Result<(), MailError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(MailError::Connect("connection refused".to_string()));
        }
        Ok(())
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), MailError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_send {
            return Err(MailError::Send("550 mailbox unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub fn mail_config(template_dir: &Path) -> MailConfig {
    MailConfig {
        template_dir: template_dir.to_path_buf(),
        ..MailConfig::default()
    }
}

/// Write `<name>.html` and `<name>.plain` templates with the given body
pub fn write_template(dir: &Path, name: &str, body: &str) {
    std::fs::write(
        dir.join(format!("{name}.html")),
        format!(r#"{{{{#*inline "body"}}}}<html><body><p>{body}</p></body></html>{{{{/inline}}}}"#),
    )
    .unwrap();
    std::fs::write(
        dir.join(format!("{name}.plain")),
        format!(r#"{{{{#*inline "body"}}}}{body}{{{{/inline}}}}"#),
    )
    .unwrap();
}

/// Templates that echo a plain string payload
pub fn write_mail_templates(dir: &Path, names: &[&str]) {
    for name in names {
        write_template(dir, name, "{{message}}");
    }
}

/// Write a `manual.pdf` template with the given number of blank pages
pub fn write_manual_template(dir: &Path, pages: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for _ in 0..pages {
        let content = Content { operations: vec![] };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(Object::from(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(dir.join(crate::documents::MANUAL_TEMPLATE_FILE)).unwrap();
}

/// Start a pipeline over a mock transport
pub fn start_pipeline(
    config: &PipelineConfig,
    template_dir: &Path,
    documents: ManualGenerator,
    transport: Arc<MockTransport>,
) -> Pipeline {
    let mailer = Mailer::new(mail_config(template_dir), transport);
    Pipeline::start(config, mailer, documents)
}

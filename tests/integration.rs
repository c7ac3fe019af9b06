//! Integration tests against the public API.
//!
//! LibreOffice is replaced by small shell scripts that speak the same
//! command line (`--convert-to`, `--outdir`, input last), so conversion
//! behaviour is exercised end to end without an office suite installed. The
//! LLM is replaced by an in-process [`TextGenerator`].

use async_trait::async_trait;
use edgequake_doc2json::convert::leftover_scratch_dirs;
use edgequake_doc2json::{
    extract_from_file, BatchProgressCallback, ConversionOutcome, DocError, DocumentEngine,
    EngineConfig, ErrorKind, ExtractionTemplate, GenerationRequest, LlmConfig,
    StructuredExtractor, TargetFormat, TextGenerator,
};
use edgequake_doc2json::pipeline::formats::PdfBackend;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

// ── Fake converter ───────────────────────────────────────────────────────

/// Shared prelude: log the argv next to the script, then pick out the
/// format, output directory and input path.
const PRELUDE: &str = r#"#!/bin/sh
printf '%s\n' "$@" > "$(dirname "$0")/args.log"
fmt=""; outdir=""; input=""
while [ $# -gt 0 ]; do
  case "$1" in
    --convert-to) fmt="${2%%:*}"; shift 2 ;;
    --outdir) outdir="$2"; shift 2 ;;
    -*) shift ;;
    *) input="$1"; shift ;;
  esac
done
base="$(basename "$input")"
stem="${base%.*}"
"#;

const COPY: &str = r#"cp "$input" "$outdir/$stem.$fmt"
"#;

const UPPERCASE: &str = r#"tr a-z A-Z < "$input" > "$outdir/$stem.$fmt"
"#;

const FAIL: &str = r#"echo "source file could not be loaded" >&2
exit 1
"#;

const SILENT: &str = "exit 0\n";

const HANG: &str = "exec sleep 5\n";

const CANNED_TEXT: &str = r#"printf 'converted by fake office\n' > "$outdir/$stem.$fmt"
"#;

struct Workspace {
    _dir: TempDir,
    storage: PathBuf,
    bin: PathBuf,
    docs: PathBuf,
}

/// Route library logs to the test harness; `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Workspace {
    fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("storage");
        let bin = dir.path().join("bin");
        let docs = dir.path().join("docs");
        for d in [&storage, &bin, &docs] {
            std::fs::create_dir_all(d).unwrap();
        }
        Self {
            _dir: dir,
            storage,
            bin,
            docs,
        }
    }

    #[cfg(unix)]
    fn converter(&self, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = self.bin.join("fake-office");
        std::fs::write(&path, format!("{PRELUDE}{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn doc(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.docs.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn args_log(&self) -> Vec<String> {
        std::fs::read_to_string(self.bin.join("args.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn engine_with(&self, converter: &Path, timeout: u64, explicit_filters: bool) -> DocumentEngine {
        let config = EngineConfig::builder()
            .storage_root(&self.storage)
            .converter_program(converter.to_string_lossy())
            .converter_timeout_secs(timeout)
            .explicit_filters(explicit_filters)
            .build()
            .unwrap();
        DocumentEngine::with_pdf_backend(config, PdfBackend::Unavailable)
    }

    fn engine(&self, converter: &Path) -> DocumentEngine {
        self.engine_with(converter, 10, false)
    }

    fn conversions(&self) -> PathBuf {
        self.storage.join("conversions")
    }
}

fn assert_failure(outcome: &ConversionOutcome, kind: ErrorKind, needle: &str) {
    assert_eq!(outcome.error_kind(), Some(kind), "{outcome:?}");
    let message = outcome.error_message().unwrap_or_default();
    assert!(message.contains(needle), "expected {needle:?} in {message:?}");
}

// ── Conversion ───────────────────────────────────────────────────────────

#[cfg(unix)]
#[tokio::test]
async fn conversion_lands_in_storage_with_size() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(COPY));
    let input = ws.doc("Q3 report.odt", b"quarterly numbers");

    let outcome = engine.convert(&input, "pdf").await;
    let ConversionOutcome::Success {
        output_path,
        file_size,
        format,
    } = outcome.clone()
    else {
        panic!("expected success, got {outcome:?}");
    };

    assert_eq!(output_path, ws.conversions().join("Q3 report_pdf.pdf"));
    assert_eq!(file_size, 17);
    assert_eq!(format, TargetFormat::Pdf);
    assert_eq!(std::fs::read(&output_path).unwrap(), b"quarterly numbers");
    assert!(leftover_scratch_dirs(&ws.storage).is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn converter_runs_headless_with_isolated_profile() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(COPY));
    let input = ws.doc("memo.docx", b"x");

    assert!(engine.convert(&input, "HTML").await.is_success());

    let args = ws.args_log();
    assert!(args[0].starts_with("-env:UserInstallation=file://"), "{args:?}");
    assert!(args.contains(&"--headless".to_string()));
    let at = args.iter().position(|a| a == "--convert-to").unwrap();
    assert_eq!(args[at + 1], "html");
    assert_eq!(args.last().map(String::as_str), input.to_str());
}

#[cfg(unix)]
#[tokio::test]
async fn explicit_filters_are_passed_when_enabled() {
    let ws = Workspace::new();
    let engine = ws.engine_with(&ws.converter(COPY), 10, true);
    let input = ws.doc("sheet.xlsx", b"a,b");

    let outcome = engine.convert(&input, "csv").await;
    assert_eq!(
        outcome.output_path(),
        Some(ws.conversions().join("sheet_csv.csv").as_path())
    );
    assert!(ws
        .args_log()
        .contains(&"csv:Text - txt - csv (StarCalc)".to_string()));
}

#[cfg(unix)]
#[tokio::test]
async fn converter_error_is_reported_with_stderr() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(FAIL));
    let input = ws.doc("broken.docx", b"x");

    let outcome = engine.convert(&input, "pdf").await;
    assert_failure(
        &outcome,
        ErrorKind::ConversionFailed,
        "LibreOffice conversion failed: source file could not be loaded",
    );
    assert!(leftover_scratch_dirs(&ws.storage).is_empty());
    assert!(!ws.conversions().join("broken_pdf.pdf").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn silent_converter_is_no_output() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(SILENT));
    let input = ws.doc("empty.docx", b"x");

    let outcome = engine.convert(&input, "txt").await;
    assert_failure(&outcome, ErrorKind::ConversionFailed, "No converted file found");
    assert!(leftover_scratch_dirs(&ws.storage).is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn hung_converter_times_out_and_cleans_up() {
    let ws = Workspace::new();
    let engine = ws.engine_with(&ws.converter(HANG), 1, false);
    let input = ws.doc("slow.docx", b"x");

    let started = std::time::Instant::now();
    let outcome = engine.convert(&input, "pdf").await;
    assert_failure(&outcome, ErrorKind::ConversionFailed, "timed out after 1 seconds");
    assert!(started.elapsed() < std::time::Duration::from_secs(4));
    assert!(leftover_scratch_dirs(&ws.storage).is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn unsupported_format_never_launches_converter() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(COPY));
    let input = ws.doc("memo.txt", b"x");

    for format in ["docx", "jpg", ""] {
        let outcome = engine.convert(&input, format).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::UnsupportedFormat));
    }
    assert!(ws.args_log().is_empty());
    assert!(!ws.conversions().exists());
}

#[cfg(unix)]
#[tokio::test]
async fn missing_input_wins_over_bad_format() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(COPY));

    let outcome = engine.convert(ws.docs.join("ghost.docx"), "jpg").await;
    assert_failure(&outcome, ErrorKind::NotFound, "ghost.docx");
    assert!(ws.args_log().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn converting_again_overwrites_previous_output() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(UPPERCASE));
    let input = ws.doc("notes.odt", b"first draft");

    let first = engine.convert(&input, "txt").await;
    std::fs::write(&input, b"final").unwrap();
    let second = engine.convert(&input, "txt").await;

    assert_eq!(first.output_path(), second.output_path());
    let path = second.output_path().unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), "FINAL");
    assert_eq!(std::fs::read_dir(ws.conversions()).unwrap().count(), 1);
}

#[derive(Default)]
struct Recorder {
    started: AtomicUsize,
    completed: AtomicUsize,
    finished: Mutex<Option<(usize, usize)>>,
}

impl BatchProgressCallback for Recorder {
    fn on_item_start(&self, _index: usize, _total: usize, _input: &Path) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_item_complete(&self, _index: usize, _total: usize, _outcome: &ConversionOutcome) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        *self.finished.lock().unwrap() = Some((total, success_count));
    }
}

#[cfg(unix)]
#[tokio::test]
async fn batch_keeps_input_order_and_reports_progress() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(COPY));
    let inputs = vec![
        ws.doc("a.docx", b"a"),
        ws.docs.join("missing.docx"),
        ws.doc("c.docx", b"ccc"),
    ];
    let recorder = Arc::new(Recorder::default());
    let callback: edgequake_doc2json::ProgressCallback = recorder.clone();

    let outcomes = engine
        .convert_batch_with_progress(&inputs, "pdf", 3, Some(&callback))
        .await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(
        outcomes[0].output_path(),
        Some(ws.conversions().join("a_pdf.pdf").as_path())
    );
    assert_eq!(outcomes[1].error_kind(), Some(ErrorKind::NotFound));
    assert_eq!(
        outcomes[2].output_path(),
        Some(ws.conversions().join("c_pdf.pdf").as_path())
    );
    assert_eq!(recorder.started.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 3);
    assert_eq!(*recorder.finished.lock().unwrap(), Some((3, 2)));
    assert!(leftover_scratch_dirs(&ws.storage).is_empty());
}

// ── Text extraction ──────────────────────────────────────────────────────

#[cfg(unix)]
#[tokio::test]
async fn plain_text_is_read_directly() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(FAIL));
    let input = ws.doc("invoice.pdf", "Vendor: Acme\nTotal: 9720\n".as_bytes());

    // Wrong extension; content decides.
    assert_eq!(engine.extract_text(&input).await, "Vendor: Acme\nTotal: 9720\n");
    assert!(ws.args_log().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn undecodable_bytes_are_dropped() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(FAIL));
    let input = ws.doc("menu.txt", b"Caf\xe9 au lait\n");

    assert_eq!(engine.extract_text(&input).await, "Caf au lait\n");
}

#[cfg(unix)]
#[tokio::test]
async fn unknown_container_goes_through_converter() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(CANNED_TEXT));
    let mut zip = b"PK\x03\x04".to_vec();
    zip.extend_from_slice(&[0u8; 22]);
    zip.extend_from_slice(&16u16.to_le_bytes());
    zip.extend_from_slice(&0u16.to_le_bytes());
    zip.extend_from_slice(b"notes/readme.txt");
    let input = ws.doc("bundle.bin", &zip);

    assert_eq!(engine.extract_text(&input).await, "converted by fake office\n");
    let at = ws
        .args_log()
        .iter()
        .position(|a| a == "--convert-to")
        .unwrap();
    assert_eq!(ws.args_log()[at + 1], "txt");
}

#[cfg(unix)]
#[tokio::test]
async fn presentation_failure_is_returned_as_text() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(FAIL));
    let name = b"ppt/slides/slide1.xml";
    let mut pptx = b"PK\x03\x04".to_vec();
    pptx.extend_from_slice(&[0u8; 22]);
    pptx.extend_from_slice(&(name.len() as u16).to_le_bytes());
    pptx.extend_from_slice(&0u16.to_le_bytes());
    pptx.extend_from_slice(name);
    let input = ws.doc("deck.pptx", &pptx);

    let text = engine.extract_text(&input).await;
    assert!(
        text.starts_with("Error extracting PowerPoint text: "),
        "{text}"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_inputs_degrade_to_empty() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(FAIL));

    assert_eq!(engine.extract_text(ws.docs.join("nope.docx")).await, "");
    let pdf = ws.doc("scan.pdf", b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n");
    assert_eq!(engine.extract_text(&pdf).await, "");
    let docx_like = ws.doc("garbled.bin", &[0u8, 159, 146, 150, 0, 1, 2, 3]);
    assert_eq!(engine.extract_text(&docx_like).await, "");
    let blank = ws.doc("blank.docx", b"");
    assert_eq!(engine.extract_text(&blank).await, "");
}

// ── Structured extraction ────────────────────────────────────────────────

struct Scripted {
    reply: String,
    prompts: Mutex<Vec<(String, String)>>,
}

impl Scripted {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn last_user_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().unwrap().1.clone()
    }
}

#[async_trait]
impl TextGenerator for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, DocError> {
        self.prompts
            .lock()
            .unwrap()
            .push((request.system.to_string(), request.user.to_string()));
        Ok(self.reply.clone())
    }
}

fn invoice_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["vendor", "total"],
        "properties": {
            "vendor": {"type": "string"},
            "total": {"type": "number"},
            "items": {"type": "array"}
        }
    })
}

fn extractor(generator: Arc<Scripted>) -> StructuredExtractor {
    let config = LlmConfig::builder().model("test-model").build().unwrap();
    StructuredExtractor::new(generator, &config)
}

#[tokio::test]
async fn fenced_reply_is_parsed() {
    for reply in [
        "```json\n{\"vendor\": \"Acme\", \"total\": 9720}\n```",
        "```\n{\"vendor\": \"Acme\", \"total\": 9720}\n```",
        "  {\"vendor\": \"Acme\", \"total\": 9720}  ",
    ] {
        let outcome = extractor(Scripted::new(reply))
            .extract("Invoice", "Extract.", "{document}", &invoice_schema())
            .await;
        assert_eq!(
            outcome.data(),
            Some(&json!({"vendor": "Acme", "total": 9720})),
            "{reply}"
        );
        assert_eq!(outcome.raw_response(), Some(reply));
        assert_eq!(outcome.model(), "test-model");
    }
}

#[tokio::test]
async fn string_where_number_expected_fails_validation() {
    let reply = "{\"vendor\": \"Acme\", \"total\": \"9720\"}";
    let outcome = extractor(Scripted::new(reply))
        .extract("Invoice", "Extract.", "{document}", &invoice_schema())
        .await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::InvalidResponse));
    assert!(outcome
        .error_message()
        .unwrap()
        .contains("Field 'total' should be number"));
    assert_eq!(outcome.raw_response(), Some(reply));
}

#[tokio::test]
async fn missing_required_field_fails_validation() {
    let outcome = extractor(Scripted::new("{\"total\": 1}"))
        .extract("Invoice", "Extract.", "{document}", &invoice_schema())
        .await;
    assert!(outcome
        .error_message()
        .unwrap()
        .contains("Required field 'vendor' missing from response"));
}

#[tokio::test]
async fn prose_reply_is_invalid_json() {
    let outcome = extractor(Scripted::new("Sure! The vendor is Acme."))
        .extract("Invoice", "Extract.", "{document}", &invoice_schema())
        .await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::InvalidResponse));
    assert!(outcome
        .error_message()
        .unwrap()
        .starts_with("Invalid JSON response"));
}

#[tokio::test]
async fn placeholder_is_substituted() {
    let generator = Scripted::new("{\"vendor\": \"x\", \"total\": 1}");
    extractor(generator.clone())
        .extract("Hello", "Extract.", "Doc: {document}", &invoice_schema())
        .await;
    assert_eq!(generator.last_user_prompt(), "Doc: Hello");
}

#[tokio::test]
async fn malformed_template_falls_back_to_literal_replace() {
    let generator = Scripted::new("{\"vendor\": \"x\", \"total\": 1}");
    extractor(generator.clone())
        .extract("Hello", "Extract.", "Use {format} for {document}", &invoice_schema())
        .await;
    assert_eq!(generator.last_user_prompt(), "Use {format} for Hello");
}

#[cfg(unix)]
#[tokio::test]
async fn extract_from_file_with_text_template() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(FAIL));
    let input = ws.doc("invoice.txt", b"Vendor: Acme\nTotal: 9720\n");
    let generator = Scripted::new("```json\n{\"vendor\": \"Acme\", \"total\": 9720}\n```");
    let template = ExtractionTemplate::new(
        "invoice",
        "You extract invoice fields.",
        "Extract from:\n{document}",
        invoice_schema(),
    );

    let outcome = extract_from_file(&engine, &extractor(generator.clone()), &input, &template).await;
    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(
        generator.last_user_prompt(),
        "Extract from:\nVendor: Acme\nTotal: 9720\n"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn extract_from_file_converts_first_when_asked() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(UPPERCASE));
    let input = ws.doc("invoice.odt", b"vendor: acme");
    let generator = Scripted::new("{\"vendor\": \"ACME\", \"total\": 1}");
    let template =
        ExtractionTemplate::new("invoice", "s", "{document}", invoice_schema()).with_preferred_format("txt");

    let outcome = extract_from_file(&engine, &extractor(generator.clone()), &input, &template).await;
    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(generator.last_user_prompt(), "VENDOR: ACME");
}

#[cfg(unix)]
#[tokio::test]
async fn extract_from_file_stops_on_conversion_failure() {
    let ws = Workspace::new();
    let engine = ws.engine(&ws.converter(FAIL));
    let input = ws.doc("invoice.odt", b"x");
    let generator = Scripted::new("{}");
    let template =
        ExtractionTemplate::new("invoice", "s", "{document}", invoice_schema()).with_preferred_format("pdf");

    let outcome = extract_from_file(&engine, &extractor(generator.clone()), &input, &template).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::ConversionFailed));
    assert!(outcome.error_message().unwrap().starts_with("Conversion failed: "));
    assert!(generator.prompts.lock().unwrap().is_empty());
}

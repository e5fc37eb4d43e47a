//! Integration tests for the method coordinator.
//!
//! These tests run the registry against small `/bin/sh` method programs that
//! speak the acquisition protocol:
//! - capabilities exchange and one-shot configuration
//! - pipelined downloads, redirects, fallback and terminal failures
//! - protocol violations, general failures and abnormal exits
//! - respawn in a later run and cooperative cancellation
//!
//! Children are reaped with `waitpid(-1)`, so the tests in this file must not
//! run concurrently; each one holds `SERIAL` for its whole duration.
//!
//! Run with: `cargo test --test acquire_integration`

use std::cell::{Cell, RefCell};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use debfetch::acquire::{
    AcquireError, AcquireResult, CallbackResult, Delivery, MethodRegistry, MethodStatus, Outcome,
    ProtocolError, Uncompressor,
};
use debfetch::checksums::HashKind;
use debfetch::config::RunConfig;

static SERIAL: Mutex<()> = Mutex::new(());

// ============================================================================
// Helper Functions
// ============================================================================

/// Answer every acquire with success.
const RESPOND_DONE: &str = r#"printf '201 URI Done\nURI: %s\nFilename: %s\nMD5-Hash: 0123456789abcdef0123456789abcdef\nSize: 1234\n\n' "$uri" "$file""#;

/// Redirect requests for http://example/ to http://example2/, answer the rest.
const RESPOND_REDIRECT_ONCE: &str = r#"case "$uri" in
  http://example/*) printf '103 Redirect\nURI: %s\nNew-URI: http://example2/%s\n\n' "$uri" "${uri#http://example/}" ;;
  *) printf '201 URI Done\nURI: %s\nFilename: %s\nSize: 4\n\n' "$uri" "$file" ;;
esac"#;

/// Fail on the primary base, succeed on the mirror.
const RESPOND_PRIMARY_BROKEN: &str = r#"case "$uri" in
  http://example/*) printf '400 URI Failure\nURI: %s\nMessage: not found\n\n' "$uri" ;;
  *) printf '201 URI Done\nURI: %s\nFilename: %s\nSize: 4\n\n' "$uri" "$file" ;;
esac"#;

const RESPOND_ALWAYS_FAIL: &str =
    r#"printf '400 URI Failure\nURI: %s\nMessage: not found\n\n' "$uri""#;

const RESPOND_REDIRECT_FOREVER: &str =
    r#"printf '103 Redirect\nURI: %s\nNew-URI: %sx\n\n' "$uri" "$uri""#;

const RESPOND_UNKNOWN_STATUS: &str = r#"printf '351 Aux Request\nURI: %s\n\n' "$uri""#;

const RESPOND_GENERAL_FAILURE: &str = r#"printf '401 General Failure\nMessage: disk full\n\n'"#;

const RESPOND_CRASH: &str = "exit 3";

/// Report a general failure, then keep running for a while before reading on.
const RESPOND_GENERAL_FAILURE_AND_LINGER: &str = r#"printf '401 General Failure\nMessage: disk full\n\n'
sleep 2"#;

/// Answer one request, then quit.
const RESPOND_DONE_THEN_EXIT: &str = r#"printf '201 URI Done\nURI: %s\nFilename: %s\nSize: 4\n\n' "$uri" "$file"
exit 0"#;

/// A method program that logs everything it receives and calls `respond`
/// for every acquire block.
fn method_script(send_config: bool, respond: &str) -> String {
    format!(
        r#"#!/bin/sh
respond() {{
{respond}
}}
printf '100 Capabilities\nVersion: 1.0\nSend-Config: {send}\n\n'
uri=""
file=""
while IFS= read -r line; do
  printf '%s\n' "$line" >> "$DEBFETCH_TEST_LOG"
  case "$line" in
    "URI: "*) uri="${{line#URI: }}" ;;
    "Filename: "*) file="${{line#Filename: }}" ;;
    "")
      if [ -n "$uri" ]; then
        respond
      fi
      uri=""
      file=""
      ;;
  esac
done
"#,
        respond = respond,
        send = if send_config { "yes" } else { "no" },
    )
}

struct Fixture {
    dir: TempDir,
    _guard: MutexGuard<'static, ()>,
}

impl Fixture {
    fn new() -> Self {
        let guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("methods")).unwrap();
        Self { dir, _guard: guard }
    }

    fn method_dir(&self) -> PathBuf {
        self.dir.path().join("methods")
    }

    fn log_path(&self) -> PathBuf {
        self.dir.path().join("transcript.log")
    }

    fn dest(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn install(&self, name: &str, send_config: bool, respond: &str) {
        let path = self.method_dir().join(name);
        fs::write(&path, method_script(send_config, respond)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn config(&self) -> RunConfig {
        RunConfig::new(self.method_dir())
            .with_env("DEBFETCH_TEST_LOG", self.log_path().display().to_string())
    }

    fn transcript(&self) -> String {
        fs::read_to_string(self.log_path()).unwrap_or_default()
    }
}

type Deliveries = Rc<RefCell<Vec<Delivery>>>;

/// Decompression helper stand-in owning a single `sleep` child.
struct SleepingHelper {
    pid: u32,
    claimed: Rc<Cell<Option<u32>>>,
}

impl SleepingHelper {
    fn start(seconds: &str, claimed: &Rc<Cell<Option<u32>>>) -> Self {
        let child = Command::new("sleep").arg(seconds).spawn().unwrap();
        Self {
            pid: child.id(),
            claimed: Rc::clone(claimed),
        }
    }
}

impl Uncompressor for SleepingHelper {
    fn child_exited(&mut self, pid: u32, _status: ExitStatus) -> AcquireResult<bool> {
        if pid != self.pid {
            return Ok(false);
        }
        self.claimed.set(Some(pid));
        Ok(true)
    }

    fn is_running(&self) -> bool {
        self.claimed.get().is_none()
    }
}

fn collect(deliveries: &Deliveries) -> impl FnOnce(Delivery) -> CallbackResult + 'static {
    let sink = Rc::clone(deliveries);
    move |delivery| {
        sink.borrow_mut().push(delivery);
        Ok(())
    }
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

fn error_message(delivery: &Delivery) -> &str {
    match &delivery.outcome {
        Outcome::Error { message } => message.as_str(),
        other => panic!("expected an error outcome, got {:?}", other),
    }
}

// ============================================================================
// Successful downloads
// ============================================================================

#[test]
fn test_pipelined_downloads_succeed() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_DONE);

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config());
    let http = registry.new_method("http://example/pool", None, &[]).unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();
    registry
        .enqueue(http, "c/d.deb", fixture.dest("d.deb"), collect(&deliveries))
        .unwrap();

    let report = registry.run().unwrap();
    assert_eq!(report.completed, 2);
    assert!(report.is_clean(), "unexpected problems: {:?}", report);
    assert_eq!(registry.pending_requests(), 0);

    {
        let deliveries = deliveries.borrow();
        assert_eq!(deliveries.len(), 2);
        let first = &deliveries[0];
        assert_eq!(first.reported_uri, "http://example/pool/a/b.deb");
        assert_eq!(first.destination, fixture.dest("b.deb"));
        assert_eq!(first.method, "http");
        match &first.outcome {
            Outcome::Got {
                local_filename,
                checksums,
            } => {
                assert_eq!(local_filename, &fixture.dest("b.deb"));
                assert_eq!(
                    checksums.hash(HashKind::Md5),
                    Some("0123456789abcdef0123456789abcdef")
                );
                assert_eq!(checksums.size(), Some(1234));
            }
            other => panic!("expected Got, got {:?}", other),
        }
    }

    let transcript = fixture.transcript();
    assert_eq!(count(&transcript, "601 Configuration"), 1);
    assert!(transcript.contains("Config-Item: Dir=/"));
    assert_eq!(count(&transcript, "600 URI Acquire"), 2);
    assert!(transcript.contains("URI: http://example/pool/a/b.deb"));
    assert!(transcript.contains(&format!("Filename: {}", fixture.dest("b.deb").display())));

    let report = registry.shutdown().unwrap();
    assert!(report.is_clean());
    assert!(report.failed.is_empty());
}

#[test]
fn test_configuration_withheld_unless_requested() {
    let fixture = Fixture::new();
    fixture.install("http", false, RESPOND_DONE);

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config());
    let http = registry
        .new_method("http://example/pool", None, &["Acquire::Retries=3".to_string()])
        .unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();

    let report = registry.run().unwrap();
    assert_eq!(report.completed, 1);
    assert!(!registry.method(http).unwrap().has_pending_config());

    let transcript = fixture.transcript();
    assert_eq!(count(&transcript, "601 Configuration"), 0);
    assert!(!transcript.contains("Acquire::Retries"));
    registry.shutdown().unwrap();
}

#[test]
fn test_custom_configuration_items_are_sent() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_DONE);

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config());
    let http = registry
        .new_method(
            "http://example/pool",
            None,
            &["Acquire::Retries=3".to_string(), "Dir::State=/var/lib".to_string()],
        )
        .unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();
    registry.run().unwrap();

    let transcript = fixture.transcript();
    assert!(transcript.contains("Config-Item: Acquire::Retries=3"));
    assert!(transcript.contains("Config-Item: Dir::State=/var/lib"));
    assert!(!transcript.contains("Config-Item: Dir=/\n"));
    registry.shutdown().unwrap();
}

// ============================================================================
// Redirects and fallback
// ============================================================================

#[test]
fn test_redirect_then_success() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_REDIRECT_ONCE);

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config());
    let http = registry.new_method("http://example/pool", None, &[]).unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();

    let report = registry.run().unwrap();
    assert_eq!(report.completed, 1);

    let deliveries = deliveries.borrow();
    assert_eq!(deliveries.len(), 1);
    assert!(deliveries[0].outcome.is_got());
    assert_eq!(deliveries[0].reported_uri, "http://example/pool/a/b.deb");

    let transcript = fixture.transcript();
    assert_eq!(count(&transcript, "600 URI Acquire"), 2);
    assert!(transcript.contains("URI: http://example2/pool/a/b.deb"));
    drop(deliveries);
    registry.shutdown().unwrap();
}

#[test]
fn test_fallback_after_failure() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_PRIMARY_BROKEN);

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config());
    let http = registry
        .new_method("http://example/pool", Some("http://mirror/pool"), &[])
        .unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();

    let report = registry.run().unwrap();
    assert_eq!(report.completed, 1);
    assert!(report.failed.is_empty());

    {
        let deliveries = deliveries.borrow();
        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].outcome.is_got());
        assert_eq!(deliveries[0].reported_uri, "http://example/pool/a/b.deb");
    }
    assert!(fixture
        .transcript()
        .contains("URI: http://mirror/pool/a/b.deb"));
    registry.shutdown().unwrap();
}

#[test]
fn test_terminal_failure_after_fallback() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_ALWAYS_FAIL);

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config());
    let http = registry
        .new_method("http://example/pool", Some("http://mirror/pool"), &[])
        .unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();

    let report = registry.run().unwrap();
    assert_eq!(report.completed, 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].uri, "http://example/pool/a/b.deb");
    assert!(!report.is_clean());

    {
        let deliveries = deliveries.borrow();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(error_message(&deliveries[0]), "not found");
    }

    // One attempt per base, nothing afterwards.
    let transcript = fixture.transcript();
    assert_eq!(count(&transcript, "600 URI Acquire"), 2);
    assert_eq!(count(&transcript, "URI: http://example/pool/a/b.deb"), 1);
    assert_eq!(count(&transcript, "URI: http://mirror/pool/a/b.deb"), 1);

    let report = registry.shutdown().unwrap();
    assert!(report.failed.is_empty());
    assert_eq!(deliveries.borrow().len(), 1);
}

#[test]
fn test_redirect_loop_is_bounded() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_REDIRECT_FOREVER);

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config());
    let http = registry.new_method("http://example/pool", None, &[]).unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();

    let report = registry.run().unwrap();
    assert_eq!(report.failed.len(), 1);

    // The original request plus ten followed redirects.
    assert_eq!(count(&fixture.transcript(), "600 URI Acquire"), 11);
    {
        let deliveries = deliveries.borrow();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(error_message(&deliveries[0]), "too many redirects");
        assert_eq!(deliveries[0].reported_uri, "http://example/pool/a/b.deb");
    }
    registry.shutdown().unwrap();
}

// ============================================================================
// Misbehaving methods
// ============================================================================

#[test]
fn test_unknown_status_aborts_run() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_UNKNOWN_STATUS);

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config());
    let http = registry.new_method("http://example/pool", None, &[]).unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();

    let err = registry.run().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        AcquireError::Protocol {
            source: ProtocolError::UnknownStatus { code: 351, .. },
            ..
        }
    ));
    assert_eq!(registry.method(http).unwrap().status(), MethodStatus::Failed);
    assert!(deliveries.borrow().is_empty());

    let report = registry.shutdown().unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(deliveries.borrow().len(), 1);
}

#[test]
fn test_general_failure_is_method_scoped() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_GENERAL_FAILURE);
    fixture.install("ftp", true, RESPOND_DONE);

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config());
    let http = registry.new_method("http://example/pool", None, &[]).unwrap();
    let ftp = registry.new_method("ftp://example/pool", None, &[]).unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();
    registry
        .enqueue(ftp, "c/d.deb", fixture.dest("d.deb"), collect(&deliveries))
        .unwrap();

    let report = registry.run().unwrap();
    assert_eq!(report.completed, 1);
    assert!(report
        .method_errors
        .iter()
        .any(|e| matches!(e, AcquireError::GeneralFailure { message, .. } if message == "disk full")));
    assert_eq!(registry.method(http).unwrap().status(), MethodStatus::Failed);
    assert_eq!(registry.pending_requests(), 1);

    let report = registry.shutdown().unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].method, "http");
    assert_eq!(deliveries.borrow().len(), 2);
}

#[test]
fn test_missing_program_does_not_stop_other_methods() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_DONE);

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config());
    let missing = registry.new_method("nosuch://host/x", None, &[]).unwrap();
    let http = registry.new_method("http://example/pool", None, &[]).unwrap();
    registry
        .enqueue(missing, "f", fixture.dest("f"), collect(&deliveries))
        .unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();

    let report = registry.run().unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.method_errors.len(), 1);
    assert!(matches!(
        &report.method_errors[0],
        AcquireError::Spawn { method, .. } if method == "nosuch"
    ));

    let report = registry.shutdown().unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].uri, "nosuch://host/x/f");
}

#[test]
fn test_abnormal_exit_is_reported() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_CRASH);

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config());
    let http = registry.new_method("http://example/pool", None, &[]).unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();

    let mut report = registry.run().unwrap();
    assert_eq!(registry.method(http).unwrap().status(), MethodStatus::Failed);
    report.merge(registry.shutdown().unwrap());

    assert!(report.method_errors.iter().any(|e| matches!(
        e,
        AcquireError::AbnormalExit { status, .. } if status == "exit code 3"
    )));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(deliveries.borrow().len(), 1);
}

// ============================================================================
// Decompression helper
// ============================================================================

#[test]
fn test_run_waits_for_helper_children() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_DONE);

    let claimed = Rc::new(Cell::new(None));
    let helper = SleepingHelper::start("0.2", &claimed);
    let helper_pid = helper.pid;

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config()).with_uncompressor(helper);
    let http = registry.new_method("http://example/pool", None, &[]).unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();

    let report = registry.run().unwrap();
    assert_eq!(claimed.get(), Some(helper_pid));
    assert_eq!(report.completed, 1);
    assert_eq!(report.unclaimed_children, 0);
    assert!(report.is_clean(), "unexpected problems: {:?}", report);
    registry.shutdown().unwrap();
}

#[test]
fn test_unknown_child_is_counted_as_unclaimed() {
    let fixture = Fixture::new();

    let stray = Command::new("true").spawn().unwrap();
    let stray_pid = stray.id();
    let claimed = Rc::new(Cell::new(None));
    let helper = SleepingHelper::start("0.5", &claimed);
    assert_ne!(stray_pid, helper.pid);

    let mut registry = MethodRegistry::new(fixture.config()).with_uncompressor(helper);
    let report = registry.run().unwrap();

    assert!(claimed.get().is_some());
    assert_eq!(report.unclaimed_children, 1);
    assert!(report.is_clean());
    registry.shutdown().unwrap();
}

// ============================================================================
// Run lifecycle
// ============================================================================

#[test]
fn test_exited_method_is_respawned_by_next_run() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_DONE_THEN_EXIT);

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config());
    let http = registry.new_method("http://example/pool", None, &[]).unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();

    let first = registry.run().unwrap();
    assert_eq!(first.completed, 1);
    assert!(first.is_clean());
    let method = registry.method(http).unwrap();
    assert_eq!(method.pid(), None);
    assert_eq!(method.status(), MethodStatus::NotStarted);

    registry
        .enqueue(http, "c/d.deb", fixture.dest("d.deb"), collect(&deliveries))
        .unwrap();
    let second = registry.run().unwrap();
    assert_eq!(second.completed, 1);
    assert_eq!(registry.pending_requests(), 0);

    assert_eq!(deliveries.borrow().len(), 2);
    assert!(deliveries.borrow().iter().all(|d| d.outcome.is_got()));
    // The configuration went to the first child only.
    let transcript = fixture.transcript();
    assert_eq!(count(&transcript, "601 Configuration"), 1);
    assert_eq!(count(&transcript, "600 URI Acquire"), 2);
    registry.shutdown().unwrap();
}

#[test]
fn test_lingering_method_does_not_stall_run() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_GENERAL_FAILURE_AND_LINGER);

    let deliveries = Deliveries::default();
    let config = fixture.config().with_exit_grace(Duration::from_millis(100));
    let mut registry = MethodRegistry::new(config);
    let http = registry.new_method("http://example/pool", None, &[]).unwrap();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();

    let started = Instant::now();
    let report = registry.run().unwrap();
    assert!(
        started.elapsed() < Duration::from_millis(1500),
        "run waited {:?} for a closed method",
        started.elapsed()
    );
    assert!(report
        .method_errors
        .iter()
        .any(|e| matches!(e, AcquireError::GeneralFailure { .. })));
    let method = registry.method(http).unwrap();
    assert!(method.is_exiting());
    assert_eq!(method.status(), MethodStatus::Failed);

    // Shutdown still collects the child and reports the open request.
    let report = registry.shutdown().unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(deliveries.borrow().len(), 1);
}

#[test]
fn test_cancellation_drains_in_flight_work() {
    let fixture = Fixture::new();
    fixture.install("http", true, RESPOND_DONE);

    let token = CancellationToken::new();
    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config().with_interrupt(token.clone()));
    let http = registry.new_method("http://example/pool", None, &[]).unwrap();

    let sink = Rc::clone(&deliveries);
    let cancel = token.clone();
    registry
        .enqueue(http, "a/b.deb", fixture.dest("b.deb"), move |delivery| {
            sink.borrow_mut().push(delivery);
            cancel.cancel();
            Ok(())
        })
        .unwrap();
    for name in ["c", "d", "e"] {
        registry
            .enqueue(
                http,
                &format!("{}/{}.deb", name, name),
                fixture.dest(name),
                collect(&deliveries),
            )
            .unwrap();
    }

    assert!(matches!(registry.run(), Err(AcquireError::Interrupted)));
    assert!(!deliveries.borrow().is_empty());

    // Whatever was not answered is reported by shutdown.
    registry.shutdown().unwrap();
    assert_eq!(deliveries.borrow().len(), 4);
}

#[test]
fn test_environment_reaches_method() {
    let fixture = Fixture::new();
    fixture.install("file", true, RESPOND_DONE);

    let deliveries = Deliveries::default();
    let mut registry = MethodRegistry::new(fixture.config());
    let file = registry.new_method("file:/srv/mirror", None, &[]).unwrap();
    registry
        .enqueue(file, "a/b.deb", fixture.dest("b.deb"), collect(&deliveries))
        .unwrap();
    registry.run().unwrap();

    // The transcript only exists if DEBFETCH_TEST_LOG was passed through.
    assert!(Path::new(&fixture.log_path()).exists());
    assert!(fixture.transcript().contains("URI: file:/srv/mirror/a/b.deb"));
    registry.shutdown().unwrap();
}

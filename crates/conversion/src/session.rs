use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use config::Config;
use config::host::SYS_CLASS_NET;
use expect::{ExpectHandle, ReadOutcome};
use nbd::{NbdPrograms, NbdServer, NbdServerKind, READY_TIMEOUT};
use ssh::quote::single_quote;
use ssh::{RemoteCapabilities, RemoteFile, SshDriver};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::data::DiskExports;
use crate::diagnostics::{DiagnosticCommand, capture_diagnostics, default_diagnostics};
use crate::error::ConversionError;
use crate::filter::OutputFilter;
use crate::notify::Notification;
use crate::physical::{PHYSICAL_XML, physical_xml};
use crate::remote_dir::{DEFAULT_REMOTE_TMP, remote_dir_name};
use crate::wrapper::{WRAPPER_SCRIPT, wrapper_script};

/// How long one read of virt-v2v output waits, bounding how late a
/// cancellation is noticed while the remote side is quiet.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long the remote side gets to hang up after an interrupt before the
/// control connection is closed from this end.
pub const CANCEL_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const READ_CHUNK: usize = 4096;

/// Everything needed to convert the machine described by a [`Config`].
///
/// A session runs one operation at a time; a second concurrent call gets
/// [`ConversionError::AlreadyRunning`].
#[derive(Debug)]
pub struct ConversionSession {
    config: Config,
    driver: Mutex<SshDriver>,
    nbd_kind: NbdServerKind,
    nbd_programs: NbdPrograms,
    diagnostics: Vec<DiagnosticCommand>,
    remote_tmp: String,
    sys_class_net: PathBuf,
    colours_option: AtomicBool,
    pub(crate) running: AtomicBool,
}

impl ConversionSession {
    /// A session converting `config` through `driver`, exporting disks with
    /// `nbd_kind` servers.
    pub fn new(config: Config, driver: SshDriver, nbd_kind: NbdServerKind) -> Self {
        Self {
            config,
            driver: Mutex::new(driver),
            nbd_kind,
            nbd_programs: NbdPrograms::default(),
            diagnostics: default_diagnostics(),
            remote_tmp: DEFAULT_REMOTE_TMP.to_owned(),
            sys_class_net: PathBuf::from(SYS_CLASS_NET),
            colours_option: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    /// Uses these programs for the NBD servers.
    pub fn with_nbd_programs(mut self, programs: NbdPrograms) -> Self {
        self.nbd_programs = programs;
        self
    }

    /// Captures these commands' output instead of the default set.
    pub fn with_diagnostics(mut self, commands: Vec<DiagnosticCommand>) -> Self {
        self.diagnostics = commands;
        self
    }

    /// Creates the per-run directory under `dir` on the server instead of
    /// `/tmp`.
    pub fn with_remote_tmp(mut self, dir: impl Into<String>) -> Self {
        self.remote_tmp = dir.into();
        self
    }

    /// Reads MAC addresses from `dir` instead of `/sys/class/net`.
    pub fn with_sys_class_net(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sys_class_net = dir.into();
        self
    }

    /// The configuration being converted.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// True while [`run`](Self::run) or
    /// [`test_connection`](Self::test_connection) is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Logs in to the conversion server and checks its virt-v2v.
    pub fn test_connection(&self) -> Result<RemoteCapabilities, ConversionError> {
        let _running = RunGuard::acquire(&self.running)?;
        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
        let capabilities = driver.test_connection(&self.config)?;
        self.colours_option
            .store(capabilities.colours_option, Ordering::Relaxed);
        Ok(capabilities)
    }

    /// Converts the machine, reporting progress through `notify`, until
    /// virt-v2v finishes or `cancel` is triggered.
    ///
    /// Data connections and NBD servers are torn down on every return
    /// path. The remote directory is left in place.
    pub fn run(
        &self,
        cancel: &CancelToken,
        mut notify: impl FnMut(Notification),
    ) -> Result<(), ConversionError> {
        let _running = RunGuard::acquire(&self.running)?;
        let config = &self.config;
        if config.disks.is_empty() {
            return Err(ConversionError::NoDisks);
        }
        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);

        let mut exports = DiskExports::default();
        for disk in &config.disks {
            if cancel.is_cancelled() {
                return Err(ConversionError::Cancelled);
            }
            notify(Notification::Status(format!(
                "Opening data connection for {disk} ..."
            )));
            let port = driver.next_local_port();
            let device = Config::device_path(disk);
            let nbd_error = |source| ConversionError::Nbd {
                disk: disk.clone(),
                source,
            };

            let mut server = NbdServer::start(self.nbd_kind, &self.nbd_programs, port, &device)
                .map_err(nbd_error)?;
            server.wait_ready(READY_TIMEOUT).map_err(nbd_error)?;
            exports.add_server(server);

            let forward = driver
                .open_data_connection(config, port)
                .map_err(ConversionError::DataConnection)?;
            debug!(
                disk,
                local_port = port,
                remote_port = forward.remote_port(),
                "disk exported"
            );
            exports.add_forward(forward);
        }

        let remote_dir = remote_dir_name(&self.remote_tmp)?;
        notify(Notification::LogDir(remote_dir.clone()));

        let colours = config.colours && self.colours_option.load(Ordering::Relaxed);
        let xml = physical_xml(config, &exports.remote_ports(), &self.sys_class_net)?;
        let mut files = vec![
            RemoteFile::new("name", format!("{}\n", config.guestname)),
            RemoteFile::new(PHYSICAL_XML, xml),
            RemoteFile::executable(WRAPPER_SCRIPT, wrapper_script(config, &remote_dir, colours)),
        ];
        if config.collect_diagnostics {
            files.extend(capture_diagnostics(&self.diagnostics));
        }

        if cancel.is_cancelled() {
            return Err(ConversionError::Cancelled);
        }
        notify(Notification::Status(
            "Setting up the control connection ...".to_owned(),
        ));
        let mut control = driver
            .start_remote_connection(config, &remote_dir, &files)
            .map_err(ConversionError::ControlConnection)?;

        notify(Notification::Status("Doing conversion ...".to_owned()));
        info!(remote_dir, disks = config.disks.len(), "starting virt-v2v");
        let wrapper = single_quote(&format!("{remote_dir}/{WRAPPER_SCRIPT}"));
        control
            .send_line(&format!("exec {wrapper}"))
            .map_err(ConversionError::ControlConnection)?;

        let cancelled = stream_output(control.handle_mut(), config.colours, cancel, &mut notify)?;
        let status = control.close().map_err(ConversionError::Close)?;
        drop(exports);

        if cancelled {
            notify(Notification::Status(
                "Conversion cancelled by user.".to_owned(),
            ));
            return Err(ConversionError::Cancelled);
        }
        notify(Notification::Status(
            "Control connection closed by remote.".to_owned(),
        ));
        info!(%status, "control connection closed");
        match status.code() {
            Some(code) if code != 0 => Err(ConversionError::V2vFailed { status: code }),
            _ => Ok(()),
        }
    }
}

/// Relays output from `handle` until end of stream. Returns true when the
/// stream ended because of `cancel`.
fn stream_output(
    handle: &mut ExpectHandle,
    keep_colours: bool,
    cancel: &CancelToken,
    notify: &mut impl FnMut(Notification),
) -> Result<bool, ConversionError> {
    let mut filter = OutputFilter::new(keep_colours);
    let mut buf = vec![0_u8; READ_CHUNK];
    let mut interrupted_at: Option<Instant> = None;

    loop {
        if interrupted_at.is_none() && cancel.is_cancelled() {
            info!("cancelling conversion");
            handle.send_interrupt().map_err(ConversionError::Send)?;
            interrupted_at = Some(Instant::now());
        }
        if interrupted_at.is_some_and(|at| at.elapsed() >= CANCEL_DRAIN_TIMEOUT) {
            warn!("conversion server did not hang up after the interrupt");
            break;
        }

        match handle
            .read_chunk(&mut buf, Some(POLL_INTERVAL))
            .map_err(ConversionError::Stream)?
        {
            ReadOutcome::Data(len) => {
                let text = filter.push(&buf[..len]);
                if !text.is_empty() {
                    notify(Notification::RemoteMessage(text));
                }
            }
            ReadOutcome::Eof => break,
            ReadOutcome::Timeout => {}
        }
    }

    let rest = filter.finish();
    if !rest.is_empty() {
        notify(Notification::RemoteMessage(rest));
    }
    Ok(interrupted_at.is_some())
}

struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Result<Self, ConversionError> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ConversionError::AlreadyRunning)?;
        Ok(Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

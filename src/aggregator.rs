//! Two-thread pipeline: a stats thread refreshes the shared line every
//! interval, the output thread prints it with the date on each whole second.

use crate::audio::{AudioBackend, AudioSession, DefaultBackend};
use crate::config::BarConfig;
use crate::error::{BarError, Result};
use crate::keyboard::KeyboardSampler;
use crate::samplers::{
    BatterySampler, CpuSampler, DiskSampler, MemorySampler, NetSampler, ThermalSampler,
};
use chrono::{DateTime, Local, TimeZone};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

pub const DATE_FORMAT: &str = "%a, %e %b, %H:%M";

/// Latest status line, shared between the stats and output threads
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    inner: Arc<Mutex<String>>,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, line: String) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = line;
    }

    pub fn snapshot(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Sender side of the stop signal. Stopping drops the sender, which every
/// receiver observes as a disconnect.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<Mutex<Option<Sender<()>>>>,
}

impl StopHandle {
    pub fn stop(&self) {
        if self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            debug!("🛑 Stop requested");
        }
    }
}

pub fn stop_channel() -> (StopHandle, Receiver<()>) {
    let (tx, rx) = bounded(0);
    (
        StopHandle {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        rx,
    )
}

/// Sleep for `period` unless the stop signal arrives first; `true` if it did
fn stopped_within(stop: &Receiver<()>, period: Duration) -> bool {
    !matches!(stop.recv_timeout(period), Err(RecvTimeoutError::Timeout))
}

/// System samplers feeding one status line
#[derive(Debug)]
pub struct Samplers {
    pub memory: MemorySampler,
    pub cpu: CpuSampler,
    pub thermal: ThermalSampler,
    pub disk: DiskSampler,
    pub net: NetSampler,
    pub battery: BatterySampler,
}

impl Samplers {
    pub fn from_config(config: &BarConfig) -> Self {
        Self {
            memory: MemorySampler::new(),
            cpu: CpuSampler::new(),
            thermal: ThermalSampler::new(),
            disk: DiskSampler::new(),
            net: NetSampler::new(config.net_iface.clone(), config.interval),
            battery: BatterySampler::new(&config.battery),
        }
    }
}

pub struct Collector<B: AudioBackend = DefaultBackend> {
    samplers: Samplers,
    audio: AudioSession<B>,
    keyboard: KeyboardSampler,
}

impl Collector<DefaultBackend> {
    /// Collector over the live system. The audio session is not `Send`, so
    /// build this on the thread that will use it.
    pub fn from_config(config: &BarConfig) -> Self {
        Self::new(
            Samplers::from_config(config),
            AudioSession::new(DefaultBackend::default(), config.audio),
            KeyboardSampler::new(config.socket_env.clone(), config.ipc_timeout),
        )
    }
}

impl<B: AudioBackend> Collector<B> {
    pub fn new(samplers: Samplers, audio: AudioSession<B>, keyboard: KeyboardSampler) -> Self {
        Self {
            samplers,
            audio,
            keyboard,
        }
    }

    pub fn audio(&self) -> &AudioSession<B> {
        &self.audio
    }

    /// Sample everything once and render the line
    pub fn collect(&mut self) -> String {
        let mem = self.samplers.memory.sample();
        let cpu = self.samplers.cpu.sample();
        let temp = self.samplers.thermal.sample();
        let disk = self.samplers.disk.sample();
        let net = self.samplers.net.sample();
        let vol = self.audio.volume();
        let kb = self.keyboard.sample();
        let batt = self.samplers.battery.sample();

        format!(
            "| RAM: {} | CPU: {} | Temp: {} | Disk: {} | {} | Vol: {:>4} | 🖮  {} | ↯ {}",
            mem, cpu, temp, disk, net, vol, kb, batt
        )
    }
}

/// Refresh `line` every `interval` until stopped
pub fn run_stats_loop<B: AudioBackend>(
    collector: &mut Collector<B>,
    line: &StatusLine,
    interval: Duration,
    stop: &Receiver<()>,
) {
    info!("📊 Stats loop started, interval {:?}", interval);
    loop {
        line.publish(collector.collect());
        if stopped_within(stop, interval) {
            break;
        }
    }
    info!("📊 Stats loop stopped");
}

/// `"{line} | {date}\n"`
pub fn render_output<Tz: TimeZone>(line: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("{} | {}\n", line, now.format(DATE_FORMAT))
}

/// Time left until the next whole second of `now`
fn until_next_second<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let into_second =
        Duration::from_nanos(u64::from(now.timestamp_subsec_nanos() % 1_000_000_000));
    Duration::from_secs(1).saturating_sub(into_second)
}

/// Print the current line on every whole second until stopped. Nothing is
/// printed while the line is still empty.
pub fn run_output_loop<W: Write>(
    line: &StatusLine,
    stop: &Receiver<()>,
    out: &mut W,
) -> io::Result<()> {
    loop {
        if stopped_within(stop, until_next_second(&Local::now())) {
            return Ok(());
        }

        let current = line.snapshot();
        if current.is_empty() {
            continue;
        }

        out.write_all(render_output(&current, &Local::now()).as_bytes())?;
        out.flush()?;
    }
}

/// Run both loops until interrupted or stdout goes away
pub fn run(config: &BarConfig) -> Result<()> {
    let line = StatusLine::new();
    let (stop, stop_rx) = stop_channel();

    let on_signal = stop.clone();
    ctrlc::set_handler(move || {
        info!("🛑 Received shutdown signal");
        on_signal.stop();
    })
    .map_err(|e| BarError::Signal(e.to_string()))?;

    let stats_config = config.clone();
    let stats_line = line.clone();
    let stats_stop = stop_rx.clone();
    let stats = thread::Builder::new()
        .name("stats".to_string())
        .spawn(move || {
            let mut collector = Collector::from_config(&stats_config);
            run_stats_loop(
                &mut collector,
                &stats_line,
                stats_config.interval,
                &stats_stop,
            );
        })?;

    let result = run_output_loop(&line, &stop_rx, &mut io::stdout().lock());
    if let Err(e) = &result {
        warn!("⚠️ Output closed: {}", e);
    }

    stop.stop();
    if stats.join().is_err() {
        warn!("⚠️ Stats thread panicked");
    }
    Ok(result?)
}

/// Collect a single line and print it with the date
pub fn print_once(config: &BarConfig) -> Result<()> {
    let mut collector = Collector::from_config(config);
    let line = collector.collect();

    let mut out = io::stdout().lock();
    out.write_all(render_output(&line, &Local::now()).as_bytes())?;
    out.flush()?;
    Ok(())
}

use super::{AudioBackend, AudioError, FirstReply, SinkTarget, VolumeReading};
use crate::timing::{wait_for, Deadline, Wait};
use crossbeam_channel::{bounded, Sender};
use libpulse_binding as pulse;
use log::{debug, info};
use pulse::callbacks::ListResult;
use pulse::context::introspect::SinkInfo;
use pulse::context::{Context, FlagSet, State};
use pulse::error::PAErr;
use pulse::mainloop::threaded::Mainloop;
use pulse::operation::{Operation, State as OperationState};
use pulse::volume::Volume;
use std::time::Duration;

/// PulseAudio implementation of AudioBackend.
///
/// Runs a threaded mainloop; every context call happens with the loop
/// locked, and replies come back from the loop thread over a channel.
pub struct PulseBackend {
    app_name: String,
    conn: Option<Connection>,
}

impl PulseBackend {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            conn: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn connection(&mut self) -> Result<&mut Connection, AudioError> {
        self.conn
            .as_mut()
            .ok_or_else(|| AudioError::ConnectionLost("not connected".to_string()))
    }
}

impl Default for PulseBackend {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"))
    }
}

impl AudioBackend for PulseBackend {
    fn connect(&mut self, timeout: Duration) -> Result<(), AudioError> {
        // Drop any previous connection before opening a new one
        self.conn = None;
        let conn = Connection::open(&self.app_name, timeout)?;
        info!("PulseAudio: context ready as '{}'", self.app_name);
        self.conn = Some(conn);
        Ok(())
    }

    fn default_sink(&mut self, timeout: Duration) -> Result<Option<String>, AudioError> {
        let conn = self.connection()?;
        let name = conn.await_reply(timeout, |context, tx| {
            let mut reply = FirstReply::new(tx);
            context.introspect().get_server_info(move |info| {
                reply.offer(info.default_sink_name.as_deref().map(str::to_owned));
            })
        })?;
        if name.is_none() {
            debug!("PulseAudio: server info not received within {:?}", timeout);
        }
        Ok(name.flatten())
    }

    fn sink_volume(
        &mut self,
        target: SinkTarget<'_>,
        timeout: Duration,
    ) -> Result<VolumeReading, AudioError> {
        let conn = self.connection()?;
        let reading = conn.await_reply(timeout, |context, tx| match target {
            SinkTarget::Named(name) => context
                .introspect()
                .get_sink_info_by_name(name, first_sink_volume(tx)),
            SinkTarget::First => context.introspect().get_sink_info_list(first_sink_volume(tx)),
        })?;
        reading.ok_or(AudioError::OperationTimeout(timeout))
    }

    fn disconnect(&mut self) {
        if self.conn.take().is_some() {
            debug!("PulseAudio: context released");
        }
    }
}

/// Sink info callback forwarding the first record, or `NoSink` if the list
/// ends empty
fn first_sink_volume(tx: Sender<VolumeReading>) -> impl FnMut(ListResult<&SinkInfo>) + 'static {
    let mut reply = FirstReply::new(tx);
    move |result| match result {
        ListResult::Item(info) => reply.offer(VolumeReading::Level {
            average: info.volume.avg().0,
            normal: Volume::NORMAL.0,
        }),
        ListResult::End | ListResult::Error => reply.offer(VolumeReading::NoSink),
    }
}

/// `PAErr` has an inherent `to_string` returning `Option`, so go through
/// `Display` explicitly
fn connect_failed(step: &str, error: PAErr) -> AudioError {
    AudioError::ConnectFailed(format!("{}: {}", step, error))
}

/// Mainloop plus context; torn down together on drop.
///
/// `context` is declared first so it is released before the loop it runs on.
struct Connection {
    context: Context,
    mainloop: Mainloop,
}

impl Connection {
    fn open(app_name: &str, timeout: Duration) -> Result<Self, AudioError> {
        let deadline = Deadline::after(timeout);

        let mut mainloop = Mainloop::new()
            .ok_or_else(|| AudioError::ConnectFailed("could not create mainloop".to_string()))?;
        let mut context = Context::new(&mainloop, app_name)
            .ok_or_else(|| AudioError::ConnectFailed("could not create context".to_string()))?;

        let (tx, rx) = bounded::<()>(1);
        context.set_state_callback(Some(Box::new(move || {
            // A pending signal already covers this change
            let _ = tx.try_send(());
        })));

        mainloop.start().map_err(|e| connect_failed("mainloop start", e))?;

        // From here on Drop takes care of cleanup
        let mut conn = Connection { context, mainloop };

        conn.mainloop.lock();
        let started = conn.context.connect(None, FlagSet::NOFLAGS, None);
        conn.mainloop.unlock();
        started.map_err(|e| connect_failed("context connect", e))?;

        loop {
            conn.mainloop.lock();
            let state = conn.context.get_state();
            conn.mainloop.unlock();

            match state {
                State::Ready => return Ok(conn),
                State::Failed | State::Terminated => {
                    return Err(AudioError::ConnectFailed(format!(
                        "context entered {:?}",
                        state
                    )))
                }
                _ => {}
            }

            match wait_for(&rx, &deadline) {
                Wait::Signalled(()) => {}
                Wait::TimedOut => return Err(AudioError::InitTimeout(timeout)),
                Wait::Closed => {
                    return Err(AudioError::ConnectFailed(
                        "state callback released".to_string(),
                    ))
                }
            }
        }
    }

    /// Issue one request and wait for its first reply.
    ///
    /// `Ok(None)` means nothing arrived within `timeout`; the request is
    /// cancelled before returning so no callback outlives the call.
    fn await_reply<T, G: ?Sized>(
        &mut self,
        timeout: Duration,
        issue: impl FnOnce(&Context, Sender<T>) -> Operation<G>,
    ) -> Result<Option<T>, AudioError> {
        let deadline = Deadline::after(timeout);
        let (tx, rx) = bounded(1);

        self.mainloop.lock();
        let state = self.context.get_state();
        if state != State::Ready {
            self.mainloop.unlock();
            return Err(AudioError::ConnectionLost(format!("context is {:?}", state)));
        }
        let mut op = issue(&self.context, tx);
        self.mainloop.unlock();

        let reply = match wait_for(&rx, &deadline) {
            Wait::Signalled(value) => Some(value),
            Wait::TimedOut | Wait::Closed => None,
        };

        self.mainloop.lock();
        if op.get_state() == OperationState::Running {
            op.cancel();
        }
        drop(op);
        let state = self.context.get_state();
        self.mainloop.unlock();

        if reply.is_none() && state != State::Ready {
            return Err(AudioError::ConnectionLost(format!("context is {:?}", state)));
        }
        Ok(reply)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.mainloop.lock();
        self.context.set_state_callback(None);
        self.context.disconnect();
        self.mainloop.unlock();
        self.mainloop.stop();
    }
}
